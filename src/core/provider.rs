//! EIP-1193 provider abstraction.
//!
//! The wallet core only ever talks to a wallet through [`Eip1193Provider`],
//! so the injected browser object and the test double are interchangeable.

use std::rc::Rc;

use async_trait::async_trait;
use serde_json::Value;

use super::error::ProviderError;

/// RPC method names used by the wallet core.
pub mod methods {
    pub const REQUEST_ACCOUNTS: &str = "eth_requestAccounts";
    pub const ACCOUNTS: &str = "eth_accounts";
    pub const CHAIN_ID: &str = "eth_chainId";
    pub const SWITCH_CHAIN: &str = "wallet_switchEthereumChain";
    pub const ADD_CHAIN: &str = "wallet_addEthereumChain";

    /// Methods that never open a wallet prompt.
    pub fn is_silent(method: &str) -> bool {
        matches!(method, ACCOUNTS | CHAIN_ID)
    }
}

/// Provider notification channels the core listens on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    AccountsChanged,
    ChainChanged,
}

impl EventKind {
    /// Event name as passed to `ethereum.on(...)`.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::AccountsChanged => "accountsChanged",
            EventKind::ChainChanged => "chainChanged",
        }
    }
}

/// A provider-level notification with its raw payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderEvent {
    AccountsChanged(Vec<String>),
    /// Hex chain ID as reported by the wallet.
    ChainChanged(String),
}

impl ProviderEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ProviderEvent::AccountsChanged(_) => EventKind::AccountsChanged,
            ProviderEvent::ChainChanged(_) => EventKind::ChainChanged,
        }
    }
}

/// Callback registered through [`Eip1193Provider::on`].
pub type Listener = Rc<dyn Fn(ProviderEvent)>;

/// Token returned by [`Eip1193Provider::on`], used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Request/event surface of an injected wallet (EIP-1193).
#[async_trait(?Send)]
pub trait Eip1193Provider {
    /// Whether a provider object is present in the execution context.
    ///
    /// Synchronous and side-effect free; absence is a normal outcome.
    fn is_available(&self) -> bool;

    /// `provider.request({ method, params })`. Pass `Value::Null` for no params.
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;

    fn on(&self, kind: EventKind, listener: Listener) -> Result<ListenerId, ProviderError>;

    fn remove_listener(&self, id: ListenerId);
}
