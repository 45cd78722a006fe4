//! Required-chain enforcement.
//!
//! Switches the wallet onto the configured chain, adding the chain first
//! when the wallet does not know it yet.

use log::{debug, info};
use serde_json::Value;

use super::error::{ProviderError, WalletError};
use super::provider::{Eip1193Provider, methods};
use crate::models::ChainConfig;

/// Parse a chain ID as returned by `eth_chainId` or a `chainChanged` event.
///
/// Wallets report a `0x`-prefixed hex string; a few legacy providers send a
/// decimal string or a bare number.
pub fn parse_chain_id(value: &Value) -> Option<u64> {
    match value {
        Value::String(s) => match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16).ok(),
            None => s.parse().ok(),
        },
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

pub struct NetworkEnforcer<'a> {
    provider: &'a dyn Eip1193Provider,
    chain: &'a ChainConfig,
}

impl<'a> NetworkEnforcer<'a> {
    pub fn new(provider: &'a dyn Eip1193Provider, chain: &'a ChainConfig) -> Self {
        Self { provider, chain }
    }

    /// Active chain as the wallet reports it right now.
    pub async fn current_chain_id(&self) -> Result<u64, WalletError> {
        let value = self
            .provider
            .request(methods::CHAIN_ID, Value::Null)
            .await
            .map_err(WalletError::from_request)?;
        parse_chain_id(&value)
            .ok_or_else(|| WalletError::MalformedResponse(format!("chain id {value}")))
    }

    /// Make the required chain the wallet's active chain.
    ///
    /// A switch rejected as "unrecognized chain" is answered with an add-chain
    /// request, which activates the chain on success. Every other failure,
    /// including the user dismissing the prompt, is `NetworkSwitchFailed`.
    /// Callers must still re-query the active chain afterwards.
    pub async fn ensure_required_chain(&self) -> Result<(), WalletError> {
        if self.current_chain_id().await.ok() == Some(self.chain.chain_id) {
            debug!("already on chain {}", self.chain.chain_id);
            return Ok(());
        }

        self.switch_to_required().await
    }

    /// Switch unconditionally, adding the chain when the wallet reports it
    /// as unrecognized.
    pub async fn switch_to_required(&self) -> Result<(), WalletError> {
        match self.switch().await {
            Ok(()) => Ok(()),
            Err(e) if e.is_unrecognized_chain() => {
                info!(
                    "{} unknown to wallet, requesting add-chain",
                    self.chain.chain_name
                );
                self.add().await.map_err(WalletError::NetworkSwitchFailed)
            }
            Err(e) => Err(WalletError::NetworkSwitchFailed(e)),
        }
    }

    async fn switch(&self) -> Result<(), ProviderError> {
        debug!("switching to {}", self.chain.hex_chain_id());
        self.provider
            .request(methods::SWITCH_CHAIN, self.chain.switch_chain_params())
            .await
            .map(|_| ())
    }

    async fn add(&self) -> Result<(), ProviderError> {
        self.provider
            .request(methods::ADD_CHAIN, self.chain.add_chain_params())
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mock::MockProvider;
    use serde_json::json;

    #[test]
    fn test_parse_chain_id_formats() {
        assert_eq!(parse_chain_id(&json!("0x1388")), Some(5000));
        assert_eq!(parse_chain_id(&json!("0XA4EC")), Some(42220));
        assert_eq!(parse_chain_id(&json!("42220")), Some(42220));
        assert_eq!(parse_chain_id(&json!(8453)), Some(8453));
        assert_eq!(parse_chain_id(&json!("0xzz")), None);
        assert_eq!(parse_chain_id(&Value::Null), None);
    }

    #[tokio::test]
    async fn test_skips_switch_when_already_on_chain() {
        let mock = MockProvider::new().with_chain(5000);
        let chain = ChainConfig::mantle();

        NetworkEnforcer::new(&mock, &chain)
            .ensure_required_chain()
            .await
            .unwrap();

        assert_eq!(mock.calls_to(methods::SWITCH_CHAIN), 0);
    }

    #[tokio::test]
    async fn test_switches_known_chain() {
        let mock = MockProvider::new().with_chain(1).with_known_chain(5000);
        let chain = ChainConfig::mantle();

        NetworkEnforcer::new(&mock, &chain)
            .ensure_required_chain()
            .await
            .unwrap();

        assert_eq!(mock.chain_id(), 5000);
        assert_eq!(mock.calls_to(methods::ADD_CHAIN), 0);
        assert_eq!(
            mock.last_params(methods::SWITCH_CHAIN),
            Some(json!([{ "chainId": "0x1388" }]))
        );
    }

    #[tokio::test]
    async fn test_adds_unknown_chain() {
        let mock = MockProvider::new().with_chain(1);
        let chain = ChainConfig::celo();

        let enforcer = NetworkEnforcer::new(&mock, &chain);
        enforcer.ensure_required_chain().await.unwrap();

        assert_eq!(mock.calls_to(methods::ADD_CHAIN), 1);
        assert_eq!(enforcer.current_chain_id().await, Ok(42220));
    }

    #[tokio::test]
    async fn test_rejected_switch_is_network_switch_failure() {
        let mock = MockProvider::new().with_chain(1).with_known_chain(5000);
        mock.fail(methods::SWITCH_CHAIN, ProviderError::user_rejected());
        let chain = ChainConfig::mantle();

        let err = NetworkEnforcer::new(&mock, &chain)
            .ensure_required_chain()
            .await
            .unwrap_err();

        assert_eq!(
            err,
            WalletError::NetworkSwitchFailed(ProviderError::user_rejected())
        );
        assert!(err.is_user_rejection());
        assert_eq!(mock.calls_to(methods::ADD_CHAIN), 0);
    }

    #[tokio::test]
    async fn test_malformed_chain_id() {
        let mock = MockProvider::new();
        mock.respond(methods::CHAIN_ID, json!({ "id": 1 }));
        let chain = ChainConfig::mantle();

        let err = NetworkEnforcer::new(&mock, &chain)
            .current_chain_id()
            .await
            .unwrap_err();

        assert!(matches!(err, WalletError::MalformedResponse(_)));
    }
}
