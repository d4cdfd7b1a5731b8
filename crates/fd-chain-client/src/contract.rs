//! Faucet contract handle.

use crate::web3::{ReceiptPolicy, TransactionRequest, TxReceipt, Web3};
use crate::ProviderError;
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{SolCall, sol};
use fd_types::WalletAddress;

sol! {
    #[derive(Debug, PartialEq, Eq)]
    interface IFaucet {
        function deposit(uint256 amount) external payable;
        function withdraw(uint256 amount) external;
    }
}

/// A decoded Faucet call, as seen by a node executing the calldata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaucetCall {
    Deposit(U256),
    Withdraw(U256),
}

impl FaucetCall {
    pub fn encode(&self) -> Bytes {
        let encoded = match *self {
            Self::Deposit(amount) => IFaucet::depositCall { amount }.abi_encode(),
            Self::Withdraw(amount) => IFaucet::withdrawCall { amount }.abi_encode(),
        };
        Bytes::from(encoded)
    }

    /// `None` for calldata that does not match either entry point.
    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() != 4 + 32 {
            return None;
        }
        let (selector, argument) = data.split_at(4);
        let amount = U256::from_be_slice(argument);
        if selector == &IFaucet::depositCall::SELECTOR[..] {
            Some(Self::Deposit(amount))
        } else if selector == &IFaucet::withdrawCall::SELECTOR[..] {
            Some(Self::Withdraw(amount))
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct FaucetContract {
    web3: Web3,
    address: Address,
}

impl FaucetContract {
    pub fn new(web3: Web3, address: Address) -> Self {
        Self { web3, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    fn call(&self, call: FaucetCall, from: &WalletAddress) -> TransactionRequest {
        TransactionRequest {
            from: Some(from.clone()),
            to: Some(self.address),
            value: None,
            gas: None,
            data: call.encode(),
        }
    }

    /// `deposit(amount)` with `amount` also attached as value.
    pub fn deposit_request(&self, amount: U256, from: &WalletAddress) -> TransactionRequest {
        TransactionRequest {
            value: Some(amount),
            ..self.call(FaucetCall::Deposit(amount), from)
        }
    }

    pub fn withdraw_request(&self, amount: U256, from: &WalletAddress) -> TransactionRequest {
        self.call(FaucetCall::Withdraw(amount), from)
    }

    pub async fn deposit(
        &self,
        amount: U256,
        from: &WalletAddress,
        policy: &ReceiptPolicy,
    ) -> Result<TxReceipt, ProviderError> {
        self.web3
            .send_and_confirm(&self.deposit_request(amount, from), policy)
            .await
    }

    pub async fn estimate_withdraw(&self, amount: U256, from: &WalletAddress) -> Result<u64, ProviderError> {
        self.web3
            .estimate_gas(&self.withdraw_request(amount, from))
            .await
    }

    pub async fn withdraw(
        &self,
        amount: U256,
        from: &WalletAddress,
        gas: u64,
        policy: &ReceiptPolicy,
    ) -> Result<TxReceipt, ProviderError> {
        let request = self.withdraw_request(amount, from).with_gas(gas);
        self.web3.send_and_confirm(&request, policy).await
    }
}
