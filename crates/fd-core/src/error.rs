use std::cell::RefCell;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Please connect to the {expected_name} Network")]
    WrongNetwork { expected_name: String, actual: String },
    #[error("{0}")]
    NetworkUnavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("Transaction is canceled!")]
    Canceled,
    #[error("Donation failed: {0}")]
    DonationFailed(String),
    #[error("Web3 or contract is not initialized properly.")]
    NotInitialized,
    #[error("there's no wallet to withdraw to!")]
    NoWallet,
    /// Every chain-side withdraw failure reads the same; `cause` is kept for logs.
    #[error("Withdraw failed: Insufficient contract balance")]
    WithdrawFailed { cause: String },
    #[error("{0}")]
    ConnectFailed(String),
}

/// The one user-visible error slot. Each attempt overwrites it.
#[derive(Debug, Default)]
pub struct ErrorBanner {
    current: RefCell<Option<String>>,
}

impl ErrorBanner {
    pub fn set(&self, err: impl fmt::Display) {
        *self.current.borrow_mut() = Some(err.to_string());
    }

    pub fn clear(&self) {
        self.current.borrow_mut().take();
    }

    pub fn current(&self) -> Option<String> {
        self.current.borrow().clone()
    }
}
