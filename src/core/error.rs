//! Custom error types for the application.
//!
//! Provides structured error handling with meaningful error messages
//! and proper error categorization for each domain:
//!
//! - [`ProviderError`] - Raw failure reported by an EIP-1193 provider
//! - [`WalletError`] - Connection lifecycle failures surfaced to callers
//! - [`ConfigError`] - Invalid required-chain configuration
//! - [`StorageError`] - localStorage operations for UI preferences

use serde_json::Value;
use thiserror::Error;

use crate::config::{chain_name, provider_codes};

/// Error object returned by an injected provider (EIP-1193 `ProviderRpcError`).
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}{}", .code.map(|c| format!(" (code {c})")).unwrap_or_default())]
pub struct ProviderError {
    pub code: Option<i64>,
    pub message: String,
    pub data: Option<Value>,
}

impl ProviderError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
            data: None,
        }
    }

    /// Error without a provider code (transport or conversion failure).
    pub fn other(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn user_rejected() -> Self {
        Self::new(provider_codes::USER_REJECTED, "User rejected the request.")
    }

    pub fn unrecognized_chain(hex_chain_id: &str) -> Self {
        Self::new(
            provider_codes::UNRECOGNIZED_CHAIN,
            format!("Unrecognized chain ID \"{hex_chain_id}\"."),
        )
    }

    pub fn is_user_rejection(&self) -> bool {
        self.code == Some(provider_codes::USER_REJECTED)
    }

    /// True for 4902, including wallets that nest it under
    /// `data.originalError.code`.
    pub fn is_unrecognized_chain(&self) -> bool {
        if self.code == Some(provider_codes::UNRECOGNIZED_CHAIN) {
            return true;
        }
        self.data
            .as_ref()
            .and_then(|d| d.pointer("/originalError/code"))
            .and_then(Value::as_i64)
            == Some(provider_codes::UNRECOGNIZED_CHAIN)
    }

    pub fn is_request_pending(&self) -> bool {
        self.code == Some(provider_codes::REQUEST_PENDING)
    }
}

fn network_name(chain_id: &u64) -> &'static str {
    chain_name(*chain_id)
}

/// Wallet connection failures.
///
/// `Clone` so a coalesced connect attempt can hand the same outcome to
/// every caller awaiting it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WalletError {
    #[error("No wallet provider found. Please install MetaMask or a compatible wallet.")]
    ProviderMissing,

    #[error("Request rejected in wallet")]
    UserRejected,

    #[error("No accounts returned from wallet")]
    NoAccounts,

    #[error("Failed to switch network: {0}")]
    NetworkSwitchFailed(ProviderError),

    #[error(
        "Wrong network: expected {} ({expected}), wallet is on {} ({actual})",
        network_name(.expected),
        network_name(.actual)
    )]
    WrongNetworkObserved { expected: u64, actual: u64 },

    #[error("Wallet request failed: {0}")]
    Rpc(ProviderError),

    #[error("Malformed wallet response: {0}")]
    MalformedResponse(String),

    #[error("Wallet not connected")]
    NotConnected,

    #[error("Connection attempt superseded by disconnect")]
    Superseded,
}

impl WalletError {
    /// Maps a failed account or query request, lifting 4001 to `UserRejected`.
    pub fn from_request(err: ProviderError) -> Self {
        if err.is_user_rejection() {
            Self::UserRejected
        } else {
            Self::Rpc(err)
        }
    }

    /// True when the user dismissed a prompt, whichever step raised it.
    pub fn is_user_rejection(&self) -> bool {
        match self {
            Self::UserRejected => true,
            Self::NetworkSwitchFailed(e) => e.is_user_rejection(),
            _ => false,
        }
    }
}

/// Required-chain configuration errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("failed to parse chain config: {0}")]
    Parse(String),

    #[error("chain id must be non-zero")]
    ZeroChainId,

    #[error("at least one RPC URL is required")]
    MissingRpcUrl,

    #[error("invalid URL (expected http or https): {0}")]
    InvalidUrl(String),

    #[error("native currency symbol must not be empty")]
    EmptySymbol,

    #[error("native currency decimals out of range: {0}")]
    InvalidDecimals(u8),
}

/// localStorage errors for UI preferences.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StorageError {
    #[error("localStorage not available")]
    StorageUnavailable,

    #[error("failed to save to localStorage")]
    SaveFailed,

    #[error("failed to register storage listener")]
    ListenerFailed,
}
