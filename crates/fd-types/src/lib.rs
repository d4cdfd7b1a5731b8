use serde::{Deserialize, Serialize};
use std::fmt;

pub mod units;

pub use alloy_primitives::{Address, U256};

/// Faucet contract deployed on the local Ganache chain.
pub const FAUCET_CONTRACT_ADDRESS: &str = "0xE53461a555925ebFB8D437E6A37716B53d47354b";

pub const FAUCET_CONTRACT: Address = alloy_primitives::address!("0xE53461a555925ebFB8D437E6A37716B53d47354b");

/// `net_version` reported by Ganache.
pub const GANACHE_NETWORK_ID: u64 = 5777;

pub const GANACHE_NETWORK_NAME: &str = "Ganache";

/// Amount moved by a single donate or withdraw, in ether.
pub const TRANSFER_AMOUNT_ETHER: &str = "0.1";

pub const DEFAULT_MAX_LISTENERS: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct WalletAddress(pub String);

impl WalletAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Addresses compare case-insensitively on chain; wallets mix checksum and lowercase forms.
    pub fn same_as(&self, other: &WalletAddress) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WalletAddress {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<Address> for WalletAddress {
    fn from(value: Address) -> Self {
        Self(value.to_checksum(None))
    }
}

/// Network identifier as returned by `net_version`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct NetworkId(pub u64);

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Chain identifier as carried by `eth_chainId` and `chainChanged` (hex string).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ChainId(pub String);

impl ChainId {
    pub fn from_number(value: u64) -> Self {
        Self(format!("{value:#x}"))
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_address_is_valid_checksum() {
        let parsed = Address::parse_checksummed(FAUCET_CONTRACT_ADDRESS, None)
            .expect("constant should be checksummed");
        assert_eq!(parsed, FAUCET_CONTRACT);
        assert_eq!(WalletAddress::from(parsed).as_str(), FAUCET_CONTRACT_ADDRESS);
    }

    #[test]
    fn chain_id_renders_hex_quantity() {
        assert_eq!(ChainId::from_number(1337).0, "0x539");
    }

    #[test]
    fn wallet_address_comparison_ignores_case() {
        let checksum = WalletAddress::from(FAUCET_CONTRACT_ADDRESS);
        let lower = WalletAddress(FAUCET_CONTRACT_ADDRESS.to_lowercase());
        assert!(checksum.same_as(&lower));
        assert_ne!(checksum, lower);
    }
}
