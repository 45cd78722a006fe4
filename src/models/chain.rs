use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::core::error::ConfigError;

/// Native currency metadata advertised to the wallet when adding a chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// The single network every on-chain action must happen on.
///
/// Supplied once at startup and immutable thereafter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub chain_name: String,
    pub native_currency: NativeCurrency,
    pub rpc_urls: Vec<String>,
    #[serde(default)]
    pub block_explorer_urls: Vec<String>,
}

impl ChainConfig {
    pub fn mantle() -> Self {
        Self {
            chain_id: 5000,
            chain_name: "Mantle Network".to_string(),
            native_currency: NativeCurrency {
                name: "Mantle".to_string(),
                symbol: "MNT".to_string(),
                decimals: 18,
            },
            rpc_urls: vec!["https://rpc.mantle.xyz".to_string()],
            block_explorer_urls: vec!["https://explorer.mantle.xyz".to_string()],
        }
    }

    pub fn base() -> Self {
        Self {
            chain_id: 8453,
            chain_name: "Base".to_string(),
            native_currency: NativeCurrency {
                name: "Ether".to_string(),
                symbol: "ETH".to_string(),
                decimals: 18,
            },
            rpc_urls: vec!["https://mainnet.base.org".to_string()],
            block_explorer_urls: vec!["https://basescan.org".to_string()],
        }
    }

    pub fn celo() -> Self {
        Self {
            chain_id: 42220,
            chain_name: "Celo".to_string(),
            native_currency: NativeCurrency {
                name: "Celo".to_string(),
                symbol: "CELO".to_string(),
                decimals: 18,
            },
            rpc_urls: vec!["https://forno.celo.org".to_string()],
            block_explorer_urls: vec!["https://celoscan.io".to_string()],
        }
    }

    pub fn celo_alfajores() -> Self {
        Self {
            chain_id: 44787,
            chain_name: "Celo Alfajores".to_string(),
            native_currency: NativeCurrency {
                name: "Celo".to_string(),
                symbol: "CELO".to_string(),
                decimals: 18,
            },
            rpc_urls: vec!["https://alfajores-forno.celo-testnet.org".to_string()],
            block_explorer_urls: vec!["https://sepolia.celoscan.io".to_string()],
        }
    }

    /// Parse and validate a chain record from TOML.
    ///
    /// ```toml
    /// chain_id = 42220
    /// chain_name = "Celo"
    /// rpc_urls = ["https://forno.celo.org"]
    /// block_explorer_urls = ["https://celoscan.io"]
    ///
    /// [native_currency]
    /// name = "Celo"
    /// symbol = "CELO"
    /// decimals = 18
    /// ```
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain_id == 0 {
            return Err(ConfigError::ZeroChainId);
        }
        if self.rpc_urls.is_empty() {
            return Err(ConfigError::MissingRpcUrl);
        }
        if let Some(url) = self
            .rpc_urls
            .iter()
            .chain(&self.block_explorer_urls)
            .find(|u| !is_http_url(u))
        {
            return Err(ConfigError::InvalidUrl(url.clone()));
        }
        if self.native_currency.symbol.trim().is_empty() {
            return Err(ConfigError::EmptySymbol);
        }
        if self.native_currency.decimals > 36 {
            return Err(ConfigError::InvalidDecimals(self.native_currency.decimals));
        }
        Ok(())
    }

    /// Chain ID as the `0x`-prefixed hex string wallets expect.
    pub fn hex_chain_id(&self) -> String {
        format!("0x{:x}", self.chain_id)
    }

    /// Params for `wallet_switchEthereumChain`.
    pub fn switch_chain_params(&self) -> Value {
        json!([{ "chainId": self.hex_chain_id() }])
    }

    /// Params for `wallet_addEthereumChain` (EIP-3085).
    pub fn add_chain_params(&self) -> Value {
        json!([{
            "chainId": self.hex_chain_id(),
            "chainName": self.chain_name,
            "nativeCurrency": {
                "name": self.native_currency.name,
                "symbol": self.native_currency.symbol,
                "decimals": self.native_currency.decimals,
            },
            "rpcUrls": self.rpc_urls,
            "blockExplorerUrls": self.block_explorer_urls,
        }])
    }

    pub fn explorer_base_url(&self) -> Option<&str> {
        self.block_explorer_urls
            .first()
            .map(|u| u.trim_end_matches('/'))
    }

    pub fn explorer_tx_url(&self, tx_hash: &str) -> Option<String> {
        self.explorer_base_url()
            .map(|base| format!("{}/tx/{}", base, tx_hash))
    }

    pub fn explorer_address_url(&self, address: &str) -> Option<String> {
        self.explorer_base_url()
            .map(|base| format!("{}/address/{}", base, address))
    }
}

fn is_http_url(url: &str) -> bool {
    url.strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .is_some_and(|rest| !rest.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_chain_id() {
        assert_eq!(ChainConfig::mantle().hex_chain_id(), "0x1388");
        assert_eq!(ChainConfig::celo().hex_chain_id(), "0xa4ec");
    }

    #[test]
    fn test_presets_validate() {
        for chain in [
            ChainConfig::mantle(),
            ChainConfig::base(),
            ChainConfig::celo(),
            ChainConfig::celo_alfajores(),
        ] {
            assert_eq!(chain.validate(), Ok(()), "{}", chain.chain_name);
        }
    }

    #[test]
    fn test_add_chain_params_shape() {
        let params = ChainConfig::celo().add_chain_params();
        let entry = &params[0];
        assert_eq!(entry["chainId"], "0xa4ec");
        assert_eq!(entry["chainName"], "Celo");
        assert_eq!(entry["nativeCurrency"]["symbol"], "CELO");
        assert_eq!(entry["nativeCurrency"]["decimals"], 18);
        assert_eq!(entry["rpcUrls"][0], "https://forno.celo.org");
        assert_eq!(entry["blockExplorerUrls"][0], "https://celoscan.io");
    }

    #[test]
    fn test_explorer_urls() {
        let chain = ChainConfig::base();
        assert_eq!(
            chain.explorer_tx_url("0xabc").as_deref(),
            Some("https://basescan.org/tx/0xabc")
        );
        assert_eq!(
            chain.explorer_address_url("0xdef").as_deref(),
            Some("https://basescan.org/address/0xdef")
        );

        let mut bare = chain;
        bare.block_explorer_urls.clear();
        assert_eq!(bare.explorer_tx_url("0xabc"), None);
    }

    #[test]
    fn test_from_toml() {
        let input = r#"
            chain_id = 44787
            chain_name = "Celo Alfajores"
            rpc_urls = ["https://alfajores-forno.celo-testnet.org"]

            [native_currency]
            name = "Celo"
            symbol = "CELO"
            decimals = 18
        "#;
        let chain = ChainConfig::from_toml_str(input).unwrap();
        assert_eq!(chain.chain_id, 44787);
        assert!(chain.block_explorer_urls.is_empty());
    }

    #[test]
    fn test_from_toml_rejects_invalid() {
        let missing_rpc = r#"
            chain_id = 5000
            chain_name = "Mantle"
            rpc_urls = []

            [native_currency]
            name = "Mantle"
            symbol = "MNT"
            decimals = 18
        "#;
        assert_eq!(
            ChainConfig::from_toml_str(missing_rpc),
            Err(ConfigError::MissingRpcUrl)
        );

        assert!(matches!(
            ChainConfig::from_toml_str("chain_id = \"five\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_urls() {
        let mut chain = ChainConfig::mantle();
        chain.rpc_urls = vec!["wss://rpc.mantle.xyz".to_string()];
        assert_eq!(
            chain.validate(),
            Err(ConfigError::InvalidUrl("wss://rpc.mantle.xyz".to_string()))
        );

        let mut chain = ChainConfig::mantle();
        chain.chain_id = 0;
        assert_eq!(chain.validate(), Err(ConfigError::ZeroChainId));
    }
}
