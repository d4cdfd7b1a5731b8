//! In-process chain with a deployed Faucet, for tests and offline demos.
//!
//! Mining is instant and gas is free. Wallet behaviour (authorisation, signature
//! rejection, account and chain switching) is driven through the control methods.

use crate::contract::FaucetCall;
use crate::registry::ListenerRegistry;
use crate::web3::{TransactionRequest, TxReceipt};
use crate::{Listener, ListenerId, ProviderError, ProviderEvent, ProviderEventKind, WalletProvider};
use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use fd_types::{ChainId, FAUCET_CONTRACT, GANACHE_NETWORK_ID, WalletAddress};
use serde_json::{Value, json};
use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

pub const GANACHE_CHAIN_ID: u64 = 1337;

pub const TRANSFER_GAS: u64 = 21_000;
pub const DEPOSIT_GAS: u64 = 43_724;
pub const WITHDRAW_GAS: u64 = 35_190;

const REVERTED: &str = "execution reverted";
const VM_REVERT: &str = "VM Exception while processing transaction: revert";

struct Chain {
    network_id: u64,
    chain_id: u64,
    wallet_accounts: Vec<WalletAddress>,
    authorized: bool,
    balances: HashMap<String, U256>,
    faucet: Address,
    next_block: u64,
    receipts: HashMap<String, TxReceipt>,
    withhold_receipts: bool,
    reject_signatures: bool,
    failures: HashMap<String, ProviderError>,
    latency: HashMap<String, u32>,
    calls: Vec<String>,
}

impl Chain {
    fn balance(&self, address: &str) -> U256 {
        self.balances
            .get(&address.to_ascii_lowercase())
            .copied()
            .unwrap_or(U256::ZERO)
    }

    fn set_balance(&mut self, address: &str, amount: U256) {
        self.balances.insert(address.to_ascii_lowercase(), amount);
    }

    fn faucet_key(&self) -> String {
        self.faucet.to_checksum(None)
    }

    fn visible_accounts(&self) -> Vec<WalletAddress> {
        if self.authorized {
            self.wallet_accounts.clone()
        } else {
            Vec::new()
        }
    }

    fn owns(&self, address: &WalletAddress) -> bool {
        self.authorized && self.wallet_accounts.iter().any(|a| a.same_as(address))
    }

    /// Gas the transaction needs, or the error a node reports when it would fail.
    fn required_gas(&self, tx: &TransactionRequest) -> Result<u64, ProviderError> {
        let sender = tx.from.as_ref().map(|a| self.balance(a.as_str())).unwrap_or(U256::ZERO);
        let value = tx.value.unwrap_or(U256::ZERO);
        if value > sender {
            return Err(ProviderError::rpc(-32000, "insufficient funds for gas * price + value"));
        }

        let Some(to) = tx.to else {
            return Err(ProviderError::rpc(-32000, "contract creation is not supported"));
        };
        if to != self.faucet {
            return Ok(TRANSFER_GAS);
        }

        match FaucetCall::decode(&tx.data) {
            Some(FaucetCall::Deposit(_)) => Ok(DEPOSIT_GAS),
            Some(FaucetCall::Withdraw(amount)) if amount <= self.balance(&self.faucet_key()) => {
                Ok(WITHDRAW_GAS)
            }
            _ => Err(ProviderError::rpc(-32000, REVERTED)),
        }
    }

    fn apply(&mut self, tx: &TransactionRequest) -> Result<String, ProviderError> {
        let Some(from) = tx.from.clone() else {
            return Err(ProviderError::rpc(-32602, "missing from address"));
        };
        if !self.owns(&from) {
            return Err(ProviderError::rpc(
                4100,
                "The requested account and/or method has not been authorized by the user.",
            ));
        }

        let gas = self
            .required_gas(tx)
            .map_err(|err| match err {
                ProviderError::Rpc { message, .. } if message == REVERTED => {
                    ProviderError::rpc(-32000, VM_REVERT)
                }
                other => other,
            })?;
        if let Some(limit) = tx.gas {
            if limit < gas {
                return Err(ProviderError::rpc(
                    -32000,
                    "VM Exception while processing transaction: out of gas",
                ));
            }
        }

        let value = tx.value.unwrap_or(U256::ZERO);
        let faucet_key = self.faucet_key();
        let to_key = tx.to.map(|to| to.to_checksum(None)).unwrap_or_default();

        let sender_balance = self.balance(from.as_str());
        self.set_balance(from.as_str(), sender_balance - value);
        let recipient_balance = self.balance(&to_key);
        self.set_balance(&to_key, recipient_balance + value);

        if to_key == faucet_key {
            if let Some(FaucetCall::Withdraw(amount)) = FaucetCall::decode(&tx.data) {
                let faucet_balance = self.balance(&faucet_key);
                self.set_balance(&faucet_key, faucet_balance - amount);
                let sender_balance = self.balance(from.as_str());
                self.set_balance(from.as_str(), sender_balance + amount);
            }
        }

        let block_number = self.next_block;
        self.next_block += 1;
        let tx_hash = format!("0x{block_number:064x}");
        self.receipts.insert(
            tx_hash.clone(),
            TxReceipt {
                transaction_hash: tx_hash.clone(),
                block_number,
                gas_used: gas,
                status: true,
            },
        );
        Ok(tx_hash)
    }
}

pub struct SimulatedProvider {
    chain: RefCell<Chain>,
    listeners: ListenerRegistry,
}

impl Default for SimulatedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedProvider {
    /// Ganache-like chain (network 5777, chain 1337) with the Faucet deployed and empty.
    pub fn new() -> Self {
        Self {
            chain: RefCell::new(Chain {
                network_id: GANACHE_NETWORK_ID,
                chain_id: GANACHE_CHAIN_ID,
                wallet_accounts: Vec::new(),
                authorized: false,
                balances: HashMap::new(),
                faucet: FAUCET_CONTRACT,
                next_block: 1,
                receipts: HashMap::new(),
                withhold_receipts: false,
                reject_signatures: false,
                failures: HashMap::new(),
                latency: HashMap::new(),
                calls: Vec::new(),
            }),
            listeners: ListenerRegistry::default(),
        }
    }

    pub fn with_network_id(self, network_id: u64) -> Self {
        self.chain.borrow_mut().network_id = network_id;
        self
    }

    /// Add a wallet account holding `balance` wei.
    pub fn with_account(self, address: WalletAddress, balance: U256) -> Self {
        {
            let mut chain = self.chain.borrow_mut();
            chain.set_balance(address.as_str(), balance);
            chain.wallet_accounts.push(address);
        }
        self
    }

    /// Accounts are exposed without an `eth_requestAccounts` prompt.
    pub fn authorized(self) -> Self {
        self.chain.borrow_mut().authorized = true;
        self
    }

    pub fn with_faucet_balance(self, balance: U256) -> Self {
        {
            let mut chain = self.chain.borrow_mut();
            let key = chain.faucet_key();
            chain.set_balance(&key, balance);
        }
        self
    }

    pub fn faucet_address(&self) -> Address {
        self.chain.borrow().faucet
    }

    pub fn faucet_balance(&self) -> U256 {
        let chain = self.chain.borrow();
        chain.balance(&chain.faucet_key())
    }

    pub fn balance_of(&self, address: &WalletAddress) -> U256 {
        self.chain.borrow().balance(address.as_str())
    }

    pub fn set_balance(&self, address: &WalletAddress, balance: U256) {
        self.chain.borrow_mut().set_balance(address.as_str(), balance);
    }

    /// Replace the wallet's accounts (user switched or imported accounts).
    pub fn set_accounts(&self, accounts: Vec<WalletAddress>) {
        let visible = {
            let mut chain = self.chain.borrow_mut();
            chain.wallet_accounts = accounts;
            chain.visible_accounts()
        };
        self.listeners.emit(&ProviderEvent::AccountsChanged(visible));
    }

    /// The user revoked the site's access.
    pub fn disconnect(&self) {
        self.chain.borrow_mut().authorized = false;
        self.listeners.emit(&ProviderEvent::AccountsChanged(Vec::new()));
    }

    /// The user switched the wallet to another network.
    pub fn switch_chain(&self, chain_id: u64, network_id: u64) {
        {
            let mut chain = self.chain.borrow_mut();
            chain.chain_id = chain_id;
            chain.network_id = network_id;
        }
        self.listeners
            .emit(&ProviderEvent::ChainChanged(ChainId::from_number(chain_id)));
    }

    pub fn reject_signatures(&self, reject: bool) {
        self.chain.borrow_mut().reject_signatures = reject;
    }

    /// Transactions are accepted but never mined.
    pub fn withhold_receipts(&self, withhold: bool) {
        self.chain.borrow_mut().withhold_receipts = withhold;
    }

    /// The next `method` request fails with `error`.
    pub fn fail_next(&self, method: &str, error: ProviderError) {
        self.chain
            .borrow_mut()
            .failures
            .insert(method.to_owned(), error);
    }

    /// Hold every `method` response back for `yields` scheduler turns.
    pub fn set_latency(&self, method: &str, yields: u32) {
        self.chain
            .borrow_mut()
            .latency
            .insert(method.to_owned(), yields);
    }

    pub fn calls(&self) -> Vec<String> {
        self.chain.borrow().calls.clone()
    }

    pub fn count_calls(&self, method: &str) -> usize {
        self.chain
            .borrow()
            .calls
            .iter()
            .filter(|call| call.as_str() == method)
            .count()
    }

    pub fn clear_calls(&self) {
        self.chain.borrow_mut().calls.clear();
    }

    pub fn max_listeners(&self) -> usize {
        self.listeners.max()
    }

    fn first_param(method: &str, params: &Value) -> Result<Value, ProviderError> {
        params
            .get(0)
            .cloned()
            .ok_or_else(|| ProviderError::decode(method, "missing first parameter"))
    }

    fn dispatch(
        &self,
        method: &str,
        params: &Value,
    ) -> (Result<Value, ProviderError>, Option<ProviderEvent>) {
        let mut chain = self.chain.borrow_mut();
        let result = match method {
            "net_version" => Ok(Value::String(chain.network_id.to_string())),
            "eth_chainId" => Ok(Value::String(ChainId::from_number(chain.chain_id).0)),
            "eth_accounts" => Ok(json!(chain.visible_accounts())),
            "eth_requestAccounts" => {
                if chain.reject_signatures {
                    Err(ProviderError::rpc(
                        ProviderError::USER_REJECTED_CODE,
                        "User rejected the request.",
                    ))
                } else if chain.authorized {
                    Ok(json!(chain.visible_accounts()))
                } else {
                    chain.authorized = true;
                    let accounts = chain.visible_accounts();
                    let event = ProviderEvent::AccountsChanged(accounts.clone());
                    return (Ok(json!(accounts)), Some(event));
                }
            }
            "eth_getBalance" => Self::first_param(method, params).and_then(|address| {
                let address = address
                    .as_str()
                    .ok_or_else(|| ProviderError::decode(method, "address must be a string"))?;
                Ok(Value::String(format!("0x{:x}", chain.balance(address))))
            }),
            "eth_estimateGas" => Self::first_param(method, params)
                .and_then(|raw| TransactionRequest::from_params(method, &raw))
                .and_then(|tx| chain.required_gas(&tx))
                .map(|gas| Value::String(format!("0x{gas:x}"))),
            "eth_sendTransaction" => {
                if chain.reject_signatures {
                    Err(ProviderError::user_rejected_signature())
                } else {
                    Self::first_param(method, params)
                        .and_then(|raw| TransactionRequest::from_params(method, &raw))
                        .and_then(|tx| chain.apply(&tx))
                        .map(Value::String)
                }
            }
            "eth_getTransactionReceipt" => Self::first_param(method, params).map(|hash| {
                let hash = hash.as_str().unwrap_or_default();
                match chain.receipts.get(hash) {
                    Some(receipt) if !chain.withhold_receipts => receipt.to_json(),
                    _ => Value::Null,
                }
            }),
            other => Err(ProviderError::rpc(
                -32601,
                format!("The method {other} does not exist/is not available"),
            )),
        };
        (result, None)
    }
}

#[async_trait(?Send)]
impl WalletProvider for SimulatedProvider {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let (failure, latency) = {
            let mut chain = self.chain.borrow_mut();
            chain.calls.push(method.to_owned());
            let latency = chain.latency.get(method).copied().unwrap_or(0);
            (chain.failures.remove(method), latency)
        };

        let (result, event) = match failure {
            Some(err) => (Err(err), None),
            None => self.dispatch(method, &params),
        };
        if let Some(event) = event {
            self.listeners.emit(&event);
        }

        for _ in 0..latency {
            YieldNow::default().await;
        }
        result
    }

    fn on(&self, kind: ProviderEventKind, listener: Listener) -> ListenerId {
        self.listeners.on(kind, listener)
    }

    fn remove_listener(&self, kind: ProviderEventKind, id: ListenerId) -> bool {
        self.listeners.remove(kind, id)
    }

    fn listener_count(&self, kind: ProviderEventKind) -> usize {
        self.listeners.count(kind)
    }

    fn set_max_listeners(&self, max: usize) {
        self.listeners.set_max(max);
    }

    async fn pause(&self, _duration: Duration) {}
}

/// Gives up the current poll once so other futures on the same task can run.
/// Hand-written so this crate stays free of a tokio runtime and still builds for wasm.
#[derive(Default)]
struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            return Poll::Ready(());
        }
        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}
