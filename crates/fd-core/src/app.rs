use crate::account::{AccountResolver, AccountState};
use crate::actions::ActionExecutor;
use crate::config::FaucetConfig;
use crate::detector::ProviderDetector;
use crate::error::{ActionError, ErrorBanner};
use crate::reload::ReloadSignal;
use crate::session::{Session, SessionManager, SessionPhase};
use fd_chain_client::{TxReceipt, Web3};
use fd_types::{ChainId, NetworkId, WalletAddress};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::{debug, info};

/// Inputs that force a new provider detection.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SessionKey {
    last_known_chain: Option<ChainId>,
    refreshes: u64,
}

/// Inputs that force a new account resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
struct AccountKey {
    session_generation: u64,
    reload_flips: u64,
    chain_binding: Option<NetworkId>,
    account_epoch: u64,
}

/// Everything the page renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppView {
    pub loaded: bool,
    pub phase: SessionPhase,
    pub install_prompt: bool,
    pub account: Option<WalletAddress>,
    pub connected: bool,
    pub balance: String,
    pub error: Option<String>,
    pub actions_enabled: bool,
    pub connect_label: &'static str,
}

/// The faucet client: session, account and actions wired to one error banner.
pub struct FaucetApp {
    errors: Rc<ErrorBanner>,
    reload: Rc<ReloadSignal>,
    session: SessionManager,
    accounts: AccountResolver,
    actions: ActionExecutor,
    refreshes: Cell<u64>,
    session_key: RefCell<Option<SessionKey>>,
    account_key: RefCell<Option<AccountKey>>,
}

impl FaucetApp {
    pub fn new(config: FaucetConfig, detector: Rc<dyn ProviderDetector>) -> Self {
        let errors = Rc::new(ErrorBanner::default());
        let reload = Rc::new(ReloadSignal::default());
        Self {
            session: SessionManager::new(config.clone(), detector, errors.clone()),
            accounts: AccountResolver::new(errors.clone()),
            actions: ActionExecutor::new(config, errors.clone(), reload.clone()),
            errors,
            reload,
            refreshes: Cell::new(0),
            session_key: RefCell::new(None),
            account_key: RefCell::new(None),
        }
    }

    pub async fn mount(&self) {
        info!("mounting faucet client");
        self.settle().await;
    }

    /// Re-run detection and resolution until neither has stale inputs.
    pub async fn settle(&self) {
        loop {
            let session_key = SessionKey {
                last_known_chain: self.session.notifications().last_known_chain(),
                refreshes: self.refreshes.get(),
            };
            let detect = self.session_key.borrow().as_ref() != Some(&session_key);
            if detect {
                debug!("session inputs changed: {:?}", session_key);
                *self.session_key.borrow_mut() = Some(session_key);
                self.session.reconcile().await;
                continue;
            }

            let snapshot = self.session.snapshot();
            let account_key = AccountKey {
                session_generation: self.session.generation(),
                reload_flips: self.reload.flips(),
                chain_binding: snapshot.chain_binding,
                account_epoch: self.session.notifications().account_epoch(),
            };
            let resolve = self.account_key.borrow().as_ref() != Some(&account_key);
            if resolve {
                *self.account_key.borrow_mut() = Some(account_key);
                if let (true, Some(web3)) = (snapshot.is_ready(), snapshot.web3) {
                    self.accounts.resolve(&web3).await;
                }
                continue;
            }
            break;
        }
    }

    /// Ask the wallet to expose its accounts.
    pub async fn connect(&self) -> Result<Vec<WalletAddress>, ActionError> {
        self.errors.clear();
        let Some(provider) = self.session.snapshot().provider else {
            let err = ActionError::ConnectFailed("no wallet provider detected".into());
            self.errors.set(&err);
            return Err(err);
        };

        let granted = Web3::new(provider).request_accounts().await;
        let outcome = granted.map_err(|err| ActionError::ConnectFailed(err.to_string()));
        match &outcome {
            Ok(accounts) => info!("wallet granted {} account(s)", accounts.len()),
            Err(err) => self.errors.set(err),
        }
        self.settle().await;
        outcome
    }

    pub async fn donate(&self) -> Result<TxReceipt, ActionError> {
        let account = self.accounts.state().address;
        let outcome = self
            .actions
            .donate(&self.session.snapshot(), account.as_ref())
            .await;
        self.settle().await;
        outcome
    }

    pub async fn withdraw(&self) -> Result<TxReceipt, ActionError> {
        let account = self.accounts.state().address;
        let outcome = self
            .actions
            .withdraw(&self.session.snapshot(), account.as_ref())
            .await;
        self.settle().await;
        outcome
    }

    /// Force a fresh detection on the next [`FaucetApp::settle`].
    pub fn refresh(&self) {
        self.refreshes.set(self.refreshes.get() + 1);
    }

    pub fn unmount(&self) {
        self.session.teardown();
        self.session_key.borrow_mut().take();
        self.account_key.borrow_mut().take();
        info!("faucet client unmounted");
    }

    /// Called after every wallet notification; hosts schedule a `settle` from it.
    pub fn on_change(&self, observer: impl Fn() + 'static) {
        self.session.notifications().set_observer(Rc::new(observer));
    }

    pub fn session(&self) -> Session {
        self.session.snapshot()
    }

    pub fn account(&self) -> AccountState {
        self.accounts.state()
    }

    pub fn error(&self) -> Option<String> {
        self.errors.current()
    }

    pub fn reload_flips(&self) -> u64 {
        self.reload.flips()
    }

    pub fn is_subscribed(&self) -> bool {
        self.session.is_subscribed()
    }

    pub fn view(&self) -> AppView {
        let session = self.session.snapshot();
        let account = self.accounts.state();
        AppView {
            loaded: session.loaded,
            phase: session.phase,
            install_prompt: session.phase == SessionPhase::NoProvider && account.address.is_none(),
            actions_enabled: session.phase == SessionPhase::Ready && account.address.is_some(),
            connect_label: if account.connected { "Connected" } else { "Connect" },
            account: account.address,
            connected: account.connected,
            balance: account.balance,
            error: self.errors.current(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::StaticDetector;
    use async_trait::async_trait;
    use fd_chain_client::{ProviderEventKind, SimulatedProvider, WalletProvider};
    use fd_types::units::to_wei;
    use std::collections::VecDeque;

    fn alice() -> WalletAddress {
        WalletAddress::from("0xAaAaAaAaAaAaAaAaAaAaAaAaAaAaAaAaAaAaAaAa")
    }

    fn app(provider: &Rc<SimulatedProvider>) -> FaucetApp {
        FaucetApp::new(
            FaucetConfig::default(),
            Rc::new(StaticDetector::new(provider.clone())),
        )
    }

    #[tokio::test]
    async fn settle_is_idle_without_new_inputs() -> anyhow::Result<()> {
        let provider = Rc::new(
            SimulatedProvider::new()
                .with_account(alice(), to_wei("1")?)
                .authorized(),
        );
        let app = app(&provider);
        app.mount().await;
        provider.clear_calls();

        app.settle().await;
        assert!(provider.calls().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn reload_flip_reresolves_without_redetecting() -> anyhow::Result<()> {
        let provider = Rc::new(
            SimulatedProvider::new()
                .with_account(alice(), to_wei("1")?)
                .authorized(),
        );
        let app = app(&provider);
        app.mount().await;
        provider.clear_calls();

        app.donate().await?;
        assert_eq!(provider.count_calls("net_version"), 0);
        assert_eq!(provider.count_calls("eth_accounts"), 1);
        assert_eq!(app.account().balance, "0.9");
        Ok(())
    }

    #[tokio::test]
    async fn refresh_redetects() {
        let provider = Rc::new(SimulatedProvider::new().with_network_id(1));
        let app = app(&provider);
        app.mount().await;
        assert_eq!(app.session().phase, SessionPhase::WrongNetwork);

        // user fixes the network in the wallet; no listener is attached to tell us
        provider.switch_chain(1337, 5777);
        app.settle().await;
        assert_eq!(app.session().phase, SessionPhase::WrongNetwork);

        app.refresh();
        app.settle().await;
        assert_eq!(app.session().phase, SessionPhase::Ready);
    }

    #[tokio::test]
    async fn connect_without_provider_reports() {
        let app = FaucetApp::new(FaucetConfig::default(), Rc::new(StaticDetector::absent()));
        app.mount().await;
        assert!(app.connect().await.is_err());
        assert_eq!(app.error().as_deref(), Some("no wallet provider detected"));
    }

    #[tokio::test]
    async fn rejected_connect_surfaces_wallet_message() {
        let provider = Rc::new(SimulatedProvider::new().with_account(alice(), Default::default()));
        provider.reject_signatures(true);
        let app = app(&provider);
        app.mount().await;

        assert!(app.connect().await.is_err());
        assert_eq!(app.error().as_deref(), Some("User rejected the request."));
        assert!(!app.view().connected);
    }

    /// Hands out each provider in turn, then keeps returning the last one.
    struct SwappingDetector {
        providers: RefCell<VecDeque<Rc<SimulatedProvider>>>,
    }

    #[async_trait(?Send)]
    impl ProviderDetector for SwappingDetector {
        async fn detect(&self) -> Option<Rc<dyn WalletProvider>> {
            let mut providers = self.providers.borrow_mut();
            let next = if providers.len() > 1 {
                providers.pop_front()
            } else {
                providers.front().cloned()
            };
            next.map(|p| p as Rc<dyn WalletProvider>)
        }
    }

    fn listener_pair(provider: &SimulatedProvider) -> (usize, usize) {
        (
            provider.listener_count(ProviderEventKind::AccountsChanged),
            provider.listener_count(ProviderEventKind::ChainChanged),
        )
    }

    #[tokio::test]
    async fn replaced_provider_moves_listeners() {
        let first = Rc::new(SimulatedProvider::new());
        let second = Rc::new(SimulatedProvider::new());
        let detector = SwappingDetector {
            providers: RefCell::new(VecDeque::from([first.clone(), second.clone()])),
        };
        let app = FaucetApp::new(FaucetConfig::default(), Rc::new(detector));
        app.mount().await;
        assert_eq!(listener_pair(&first), (1, 1));
        assert_eq!(listener_pair(&second), (0, 0));

        app.refresh();
        app.settle().await;
        assert_eq!(app.session().phase, SessionPhase::Ready);
        assert_eq!(listener_pair(&first), (0, 0));
        assert_eq!(listener_pair(&second), (1, 1));

        app.refresh();
        app.settle().await;
        assert_eq!(listener_pair(&second), (1, 1));
    }

    #[tokio::test]
    async fn actions_disabled_off_the_expected_network() -> anyhow::Result<()> {
        let provider = Rc::new(
            SimulatedProvider::new()
                .with_account(alice(), to_wei("1")?)
                .authorized(),
        );
        let app = app(&provider);
        app.mount().await;
        assert!(app.view().actions_enabled);

        provider.switch_chain(1, 1);
        app.settle().await;
        let view = app.view();
        assert_eq!(view.phase, SessionPhase::WrongNetwork);
        assert!(!view.actions_enabled);
        Ok(())
    }
}
