//! Application configuration.
//!
//! Centralizes all configuration constants used throughout the application,
//! plus the required-chain record handed to the wallet core at startup.

use crate::models::ChainConfig;

// =============================================================================
// Application Metadata
// =============================================================================

/// Application name displayed in the header.
pub const APP_NAME: &str = "chainward";

/// Application version.
pub const APP_VERSION: &str = "0.1.0";

/// Where users without an injected wallet are sent.
pub const WALLET_INSTALL_URL: &str = "https://metamask.io/download/";

// =============================================================================
// Wallet Configuration
// =============================================================================

/// Timeout for silent provider queries (`eth_accounts`, `eth_chainId`) in
/// milliseconds. Prompting requests are never timed out.
pub const WALLET_TIMEOUT_MS: u32 = 2000;

/// Ethereum address display constants.
pub mod eth_address {
    /// Length of a full `0x`-prefixed address.
    pub const FULL_LEN: usize = 42;
    /// Characters kept at the start when shortening (`0x` + 4 hex digits).
    pub const PREFIX_LEN: usize = 6;
    /// Index from which the trailing 4 hex digits are kept.
    pub const SUFFIX_START: usize = 38;
}

/// EIP-1193 / EIP-3085 provider error codes.
pub mod provider_codes {
    /// The user rejected the request.
    pub const USER_REJECTED: i64 = 4001;
    /// The requested chain has not been added to the wallet.
    pub const UNRECOGNIZED_CHAIN: i64 = 4902;
    /// A request of the same kind is already awaiting the user.
    pub const REQUEST_PENDING: i64 = -32002;
}

// =============================================================================
// UI Preferences
// =============================================================================

/// localStorage key holding the selected game mode.
pub const GAME_MODE_KEY: &str = "currentGameMode";

// =============================================================================
// Required Chain
// =============================================================================

/// Chain the application operates on.
///
/// Every connected state is guaranteed to be on this chain. Swap the preset
/// (or load one with [`ChainConfig::from_toml_str`]) to retarget the client.
pub fn required_chain() -> ChainConfig {
    ChainConfig::mantle()
}

/// Convert chain ID to network name
pub fn chain_name(chain_id: u64) -> &'static str {
    match chain_id {
        1 => "Ethereum",
        11155111 => "Sepolia",
        17000 => "Holesky",
        42161 => "Arbitrum",
        10 => "Optimism",
        8453 => "Base",
        137 => "Polygon",
        56 => "BNB Chain",
        43114 => "Avalanche",
        5000 => "Mantle",
        5003 => "Mantle Sepolia",
        42220 => "Celo",
        44787 => "Celo Alfajores",
        324 => "zkSync Era",
        59144 => "Linea",
        534352 => "Scroll",
        _ => "Unknown",
    }
}
