use async_trait::async_trait;
use fd_types::{ChainId, WalletAddress};
use serde_json::Value;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use thiserror::Error;

pub mod contract;
pub mod registry;
pub mod simulated;
pub mod web3;

pub use contract::{FaucetCall, FaucetContract};
pub use registry::ListenerRegistry;
pub use simulated::SimulatedProvider;
pub use web3::{ReceiptPolicy, TransactionRequest, TxReceipt, Web3};

/// Message fragment wallets put in the error raised when the user dismisses a signature prompt.
pub const USER_DENIED_SIGNATURE: &str = "User denied transaction signature";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// Error object returned by the wallet or node (EIP-1193 / JSON-RPC).
    #[error("{message}")]
    Rpc { code: i64, message: String },
    #[error("provider transport error: {0}")]
    Transport(String),
    #[error("unexpected {method} response: {reason}")]
    Decode { method: String, reason: String },
    #[error("Transaction has been reverted by the EVM: {tx_hash}")]
    Reverted { tx_hash: String },
    #[error("transaction {tx_hash} was not mined after {attempts} receipt polls")]
    ReceiptTimeout { tx_hash: String, attempts: u32 },
}

impl ProviderError {
    pub const USER_REJECTED_CODE: i64 = 4001;

    pub fn rpc(code: i64, message: impl Into<String>) -> Self {
        Self::Rpc {
            code,
            message: message.into(),
        }
    }

    /// The error MetaMask raises when a transaction prompt is rejected.
    pub fn user_rejected_signature() -> Self {
        Self::rpc(
            Self::USER_REJECTED_CODE,
            format!("MetaMask Tx Signature: {USER_DENIED_SIGNATURE}."),
        )
    }

    pub fn decode(method: &str, reason: impl Into<String>) -> Self {
        Self::Decode {
            method: method.to_owned(),
            reason: reason.into(),
        }
    }

    pub fn is_user_rejection(&self) -> bool {
        self.to_string().contains(USER_DENIED_SIGNATURE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderEventKind {
    AccountsChanged,
    ChainChanged,
}

impl ProviderEventKind {
    pub const ALL: [ProviderEventKind; 2] = [Self::AccountsChanged, Self::ChainChanged];

    /// Event name as used by injected providers.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccountsChanged => "accountsChanged",
            Self::ChainChanged => "chainChanged",
        }
    }
}

impl fmt::Display for ProviderEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    AccountsChanged(Vec<WalletAddress>),
    ChainChanged(ChainId),
}

impl ProviderEvent {
    pub fn kind(&self) -> ProviderEventKind {
        match self {
            Self::AccountsChanged(_) => ProviderEventKind::AccountsChanged,
            Self::ChainChanged(_) => ProviderEventKind::ChainChanged,
        }
    }
}

pub type Listener = Rc<dyn Fn(&ProviderEvent)>;

/// Handle returned by [`WalletProvider::on`]; closures have no identity, so removal goes by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// A wallet provider in the EIP-1193 shape: one request entry point plus wallet events.
///
/// Providers live on a single-threaded event loop (the browser, or a current-thread
/// runtime), so neither the trait nor its futures are `Send`.
#[async_trait(?Send)]
pub trait WalletProvider {
    fn name(&self) -> &str;

    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;

    fn on(&self, kind: ProviderEventKind, listener: Listener) -> ListenerId;

    fn remove_listener(&self, kind: ProviderEventKind, id: ListenerId) -> bool;

    fn listener_count(&self, kind: ProviderEventKind) -> usize;

    fn set_max_listeners(&self, max: usize);

    /// Suspend the caller on the provider's own timer (used between receipt polls).
    async fn pause(&self, duration: Duration);
}

pub fn same_provider(a: &Rc<dyn WalletProvider>, b: &Rc<dyn WalletProvider>) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}
