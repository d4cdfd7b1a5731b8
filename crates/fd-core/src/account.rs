use crate::error::ErrorBanner;
use fd_chain_client::Web3;
use fd_types::WalletAddress;
use fd_types::units::from_wei;
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::{debug, warn};

/// Active account and its ether balance. `connected` implies `address`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountState {
    pub address: Option<WalletAddress>,
    pub connected: bool,
    pub balance: String,
}

impl Default for AccountState {
    fn default() -> Self {
        Self {
            address: None,
            connected: false,
            balance: "0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Connected,
    /// The wallet exposes no account yet.
    Disconnected,
    /// A read failed; the previous state was kept.
    Failed,
    /// A newer resolution started while this one was waiting.
    Stale,
}

pub struct AccountResolver {
    state: RefCell<AccountState>,
    errors: Rc<ErrorBanner>,
    attempts: Cell<u64>,
}

impl AccountResolver {
    pub fn new(errors: Rc<ErrorBanner>) -> Self {
        Self {
            state: RefCell::new(AccountState::default()),
            errors,
            attempts: Cell::new(0),
        }
    }

    pub fn state(&self) -> AccountState {
        self.state.borrow().clone()
    }

    /// Re-derive the account and balance from the bound provider.
    pub async fn resolve(&self, web3: &Web3) -> Resolution {
        let attempt = self.attempts.get() + 1;
        self.attempts.set(attempt);

        let accounts = match web3.accounts().await {
            Ok(accounts) => accounts,
            Err(err) => return self.fail(attempt, err),
        };
        if self.is_stale(attempt) {
            return Resolution::Stale;
        }

        let Some(address) = accounts.into_iter().next() else {
            *self.state.borrow_mut() = AccountState::default();
            return Resolution::Disconnected;
        };

        let wei = match web3.balance(&address).await {
            Ok(wei) => wei,
            Err(err) => return self.fail(attempt, err),
        };
        if self.is_stale(attempt) {
            return Resolution::Stale;
        }

        *self.state.borrow_mut() = AccountState {
            address: Some(address),
            connected: true,
            balance: from_wei(wei),
        };
        Resolution::Connected
    }

    fn fail(&self, attempt: u64, err: impl std::fmt::Display) -> Resolution {
        if self.is_stale(attempt) {
            return Resolution::Stale;
        }
        warn!("account resolution failed: {}", err);
        self.errors.set(err);
        Resolution::Failed
    }

    fn is_stale(&self, attempt: u64) -> bool {
        let stale = attempt != self.attempts.get();
        if stale {
            debug!("discarding stale account resolution #{attempt}");
        }
        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fd_chain_client::{ProviderError, SimulatedProvider};
    use fd_types::units::to_wei;

    fn alice() -> WalletAddress {
        WalletAddress::from("0xAaAaAaAaAaAaAaAaAaAaAaAaAaAaAaAaAaAaAaAa")
    }

    fn bob() -> WalletAddress {
        WalletAddress::from("0xBbBbBbBbBbBbBbBbBbBbBbBbBbBbBbBbBbBbBbBb")
    }

    #[tokio::test]
    async fn resolves_first_account_and_balance() -> anyhow::Result<()> {
        let provider = Rc::new(
            SimulatedProvider::new()
                .with_account(alice(), to_wei("12.5")?)
                .with_account(bob(), to_wei("1")?)
                .authorized(),
        );
        let resolver = AccountResolver::new(Rc::new(ErrorBanner::default()));

        assert_eq!(resolver.resolve(&Web3::new(provider)).await, Resolution::Connected);
        assert_eq!(
            resolver.state(),
            AccountState {
                address: Some(alice()),
                connected: true,
                balance: "12.5".to_string(),
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn empty_account_list_is_not_an_error() {
        let provider = Rc::new(SimulatedProvider::new().with_account(alice(), Default::default()));
        let errors = Rc::new(ErrorBanner::default());
        let resolver = AccountResolver::new(errors.clone());

        assert_eq!(
            resolver.resolve(&Web3::new(provider)).await,
            Resolution::Disconnected
        );
        assert_eq!(resolver.state(), AccountState::default());
        assert_eq!(errors.current(), None);
    }

    #[tokio::test]
    async fn balance_failure_keeps_previous_state() -> anyhow::Result<()> {
        let provider = Rc::new(
            SimulatedProvider::new()
                .with_account(alice(), to_wei("2")?)
                .authorized(),
        );
        let web3 = Web3::new(provider.clone());
        let errors = Rc::new(ErrorBanner::default());
        let resolver = AccountResolver::new(errors.clone());
        resolver.resolve(&web3).await;

        provider.set_accounts(vec![bob()]);
        provider.fail_next("eth_getBalance", ProviderError::rpc(-32603, "Internal JSON-RPC error."));
        assert_eq!(resolver.resolve(&web3).await, Resolution::Failed);

        let state = resolver.state();
        assert_eq!(state.address, Some(alice()));
        assert!(state.connected);
        assert_eq!(state.balance, "2");
        assert_eq!(errors.current().as_deref(), Some("Internal JSON-RPC error."));
        Ok(())
    }

    #[tokio::test]
    async fn slower_earlier_resolution_is_dropped() -> anyhow::Result<()> {
        let provider = Rc::new(
            SimulatedProvider::new()
                .with_account(alice(), to_wei("1")?)
                .authorized(),
        );
        let web3 = Web3::new(provider.clone());
        let resolver = AccountResolver::new(Rc::new(ErrorBanner::default()));

        provider.set_latency("eth_getBalance", 4);
        let slow = resolver.resolve(&web3);
        let fast = async {
            // let the slow resolution reach its balance read first
            tokio::task::yield_now().await;
            provider.set_latency("eth_getBalance", 0);
            provider.set_balance(&alice(), to_wei("3")?);
            anyhow::Ok(resolver.resolve(&web3).await)
        };
        let (slow, fast) = tokio::join!(slow, fast);

        assert_eq!(slow, Resolution::Stale);
        assert_eq!(fast?, Resolution::Connected);
        assert_eq!(resolver.state().balance, "3");
        Ok(())
    }
}
