use fd_chain_client::ReceiptPolicy;
use fd_types::units::{UnitError, to_wei};
use fd_types::{
    Address, DEFAULT_MAX_LISTENERS, FAUCET_CONTRACT, GANACHE_NETWORK_ID, GANACHE_NETWORK_NAME,
    NetworkId, TRANSFER_AMOUNT_ETHER, U256,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaucetConfig {
    pub contract_address: Address,
    pub expected_network_id: NetworkId,
    pub network_name: String,
    /// Ether moved by one donate or withdraw.
    pub transfer_amount: String,
    pub max_listeners: usize,
    pub receipt_policy: ReceiptPolicy,
}

impl Default for FaucetConfig {
    fn default() -> Self {
        Self {
            contract_address: FAUCET_CONTRACT,
            expected_network_id: NetworkId(GANACHE_NETWORK_ID),
            network_name: GANACHE_NETWORK_NAME.to_string(),
            transfer_amount: TRANSFER_AMOUNT_ETHER.to_string(),
            max_listeners: DEFAULT_MAX_LISTENERS,
            receipt_policy: ReceiptPolicy::default(),
        }
    }
}

impl FaucetConfig {
    pub fn transfer_wei(&self) -> Result<U256, UnitError> {
        to_wei(&self.transfer_amount)
    }
}
