//! Data models and types for the application.
//!
//! Contains domain types for:
//! - [`ConnectionState`], [`WalletState`], [`Session`], [`Phase`] - Wallet connection read model
//! - [`ChainConfig`], [`NativeCurrency`] - The required network record

mod chain;
mod wallet;

pub use chain::{ChainConfig, NativeCurrency};
pub use wallet::{ConnectionState, Phase, Session, WalletState};
