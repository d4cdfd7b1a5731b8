//! Donate and withdraw against the bound Faucet contract.
//!
//! Both operations clear the banner first and leave their outcome in it, so the
//! banner always describes the latest attempt.

use crate::config::FaucetConfig;
use crate::error::{ActionError, ErrorBanner};
use crate::reload::ReloadSignal;
use crate::session::Session;
use fd_chain_client::{ProviderError, TxReceipt};
use fd_types::WalletAddress;
use std::rc::Rc;
use tracing::{info, warn};

pub struct ActionExecutor {
    config: FaucetConfig,
    errors: Rc<ErrorBanner>,
    reload: Rc<ReloadSignal>,
}

impl ActionExecutor {
    pub fn new(config: FaucetConfig, errors: Rc<ErrorBanner>, reload: Rc<ReloadSignal>) -> Self {
        Self {
            config,
            errors,
            reload,
        }
    }

    /// Send the transfer amount to the Faucet's `deposit`.
    pub async fn donate(
        &self,
        session: &Session,
        account: Option<&WalletAddress>,
    ) -> Result<TxReceipt, ActionError> {
        self.errors.clear();
        let outcome = self.try_donate(session, account).await;
        self.finish("donation", outcome)
    }

    async fn try_donate(
        &self,
        session: &Session,
        account: Option<&WalletAddress>,
    ) -> Result<TxReceipt, ActionError> {
        let Some(contract) = &session.contract else {
            return Err(ActionError::DonationFailed("Contract is not loaded.".into()));
        };
        let Some(from) = account else {
            return Err(ActionError::DonationFailed("no connected account".into()));
        };
        let amount = self
            .config
            .transfer_wei()
            .map_err(|err| ActionError::DonationFailed(err.to_string()))?;

        contract
            .deposit(amount, from, &self.config.receipt_policy)
            .await
            .map_err(classify_donation)
    }

    /// Estimate gas for `withdraw`, then submit it with that limit.
    pub async fn withdraw(
        &self,
        session: &Session,
        account: Option<&WalletAddress>,
    ) -> Result<TxReceipt, ActionError> {
        self.errors.clear();
        let outcome = self.try_withdraw(session, account).await;
        self.finish("withdrawal", outcome)
    }

    async fn try_withdraw(
        &self,
        session: &Session,
        account: Option<&WalletAddress>,
    ) -> Result<TxReceipt, ActionError> {
        let (Some(_), Some(contract)) = (&session.web3, &session.contract) else {
            return Err(ActionError::NotInitialized);
        };
        if session.provider.is_none() {
            return Err(ActionError::NoWallet);
        }

        let from = account.ok_or_else(|| withdraw_failed("no connected account"))?;
        let amount = self.config.transfer_wei().map_err(withdraw_failed)?;
        let gas = contract
            .estimate_withdraw(amount, from)
            .await
            .map_err(withdraw_failed)?;
        contract
            .withdraw(amount, from, gas, &self.config.receipt_policy)
            .await
            .map_err(withdraw_failed)
    }

    fn finish(
        &self,
        action: &str,
        outcome: Result<TxReceipt, ActionError>,
    ) -> Result<TxReceipt, ActionError> {
        match &outcome {
            Ok(receipt) => {
                info!(
                    "{} confirmed in block {}: {}",
                    action, receipt.block_number, receipt.transaction_hash
                );
                self.reload.trigger();
            }
            Err(err) => {
                match err {
                    ActionError::WithdrawFailed { cause } => warn!("{} failed: {}", action, cause),
                    other => warn!("{} failed: {}", action, other),
                }
                self.errors.set(err);
            }
        }
        outcome
    }
}

fn classify_donation(err: ProviderError) -> ActionError {
    if err.is_user_rejection() {
        ActionError::Canceled
    } else {
        ActionError::DonationFailed(err.to_string())
    }
}

fn withdraw_failed(cause: impl ToString) -> ActionError {
    ActionError::WithdrawFailed {
        cause: cause.to_string(),
    }
}
