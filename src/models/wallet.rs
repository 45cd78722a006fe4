use alloy_primitives::Address;

use crate::config::eth_address;

/// Coarse connection status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// An authorized account on the required chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub address: Address,
    pub chain_id: u64,
}

impl Session {
    /// EIP-55 checksummed address.
    pub fn checksum_address(&self) -> String {
        self.address.to_checksum(None)
    }
}

/// Wallet connection state
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum WalletState {
    #[default]
    Disconnected,
    Connecting,
    Connected(Session),
}

impl WalletState {
    pub fn phase(&self) -> Phase {
        match self {
            WalletState::Disconnected => Phase::Disconnected,
            WalletState::Connecting => Phase::Connecting,
            WalletState::Connected(_) => Phase::Connected,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            WalletState::Connected(session) => Some(session),
            _ => None,
        }
    }
}

/// Snapshot published to every consumer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectionState {
    pub wallet: WalletState,
    /// Last human-readable failure, cleared when a connect attempt starts.
    pub error: Option<String>,
}

impl ConnectionState {
    pub fn connecting() -> Self {
        Self {
            wallet: WalletState::Connecting,
            error: None,
        }
    }

    pub fn connected(session: Session) -> Self {
        Self {
            wallet: WalletState::Connected(session),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            wallet: WalletState::Disconnected,
            error: Some(message.into()),
        }
    }

    pub fn phase(&self) -> Phase {
        self.wallet.phase()
    }

    /// Check if wallet is connected
    pub fn is_connected(&self) -> bool {
        matches!(self.wallet, WalletState::Connected(_))
    }

    pub fn session(&self) -> Option<&Session> {
        self.wallet.session()
    }

    /// Checksummed address, present iff connected.
    pub fn address(&self) -> Option<String> {
        self.session().map(Session::checksum_address)
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Format for display (0x1234...5678)
    pub fn display_name(&self) -> String {
        match &self.wallet {
            WalletState::Connected(session) => {
                let address = session.checksum_address();
                if address.len() >= eth_address::FULL_LEN {
                    format!(
                        "{}...{}",
                        &address[..eth_address::PREFIX_LEN],
                        &address[eth_address::SUFFIX_START..]
                    )
                } else {
                    address
                }
            }
            WalletState::Connecting => "connecting...".to_string(),
            WalletState::Disconnected => "guest".to_string(),
        }
    }
}
