//! Wallet connection core.
//!
//! This module provides:
//! - [`Eip1193Provider`] the seam to the wallet, with [`InjectedProvider`] for browsers
//! - [`WalletManager`] connect/disconnect and reconciliation
//! - [`NetworkEnforcer`] required-chain switching
//! - [`EventBridge`] wallet event subscription

pub mod error;
mod events;
mod injected;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
mod network;
pub mod preference;
pub mod provider;
mod store;
mod wallet;

pub use error::{ConfigError, ProviderError, StorageError, WalletError};
pub use events::{EventBridge, EventPump};
pub use injected::InjectedProvider;
pub use network::{NetworkEnforcer, parse_chain_id};
pub use provider::{Eip1193Provider, EventKind, Listener, ListenerId, ProviderEvent};
pub use store::{StateStore, Subscription};
pub use wallet::{ProviderHandle, WalletManager};
