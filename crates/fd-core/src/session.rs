//! Provider session lifecycle.
//!
//! The manager is the only writer of [`Session`]. Wallet notifications are
//! recorded in [`Notifications`] and picked up by the next reconciliation; the
//! handlers never touch session or account state themselves.

use crate::config::FaucetConfig;
use crate::detector::ProviderDetector;
use crate::error::{ErrorBanner, SessionError};
use crate::network::validate_network;
use fd_chain_client::{
    FaucetContract, Listener, ListenerId, ProviderEvent, ProviderEventKind, WalletProvider, Web3,
    same_provider,
};
use fd_types::{ChainId, NetworkId};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum SessionPhase {
    #[default]
    Uninitialized,
    Detecting,
    NoProvider,
    WrongNetwork,
    /// The network query itself failed.
    Unreachable,
    Ready,
}

/// Settled view of the session. `contract` is only ever set in `Ready`.
#[derive(Clone, Default)]
pub struct Session {
    pub provider: Option<Rc<dyn WalletProvider>>,
    pub web3: Option<Web3>,
    pub chain_binding: Option<NetworkId>,
    pub contract: Option<FaucetContract>,
    pub loaded: bool,
    pub last_known_chain: Option<ChainId>,
    pub phase: SessionPhase,
}

impl Session {
    pub fn is_ready(&self) -> bool {
        self.phase == SessionPhase::Ready
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("provider", &self.provider.as_ref().map(|p| p.name().to_string()))
            .field("chain_binding", &self.chain_binding)
            .field("contract", &self.contract.as_ref().map(FaucetContract::address))
            .field("loaded", &self.loaded)
            .field("last_known_chain", &self.last_known_chain)
            .field("phase", &self.phase)
            .finish()
    }
}

/// What the wallet told us since the last reconciliation.
#[derive(Default)]
pub struct Notifications {
    last_known_chain: RefCell<Option<ChainId>>,
    account_epoch: Cell<u64>,
    observer: RefCell<Option<Rc<dyn Fn()>>>,
}

impl Notifications {
    pub fn last_known_chain(&self) -> Option<ChainId> {
        self.last_known_chain.borrow().clone()
    }

    pub fn account_epoch(&self) -> u64 {
        self.account_epoch.get()
    }

    pub fn set_observer(&self, observer: Rc<dyn Fn()>) {
        *self.observer.borrow_mut() = Some(observer);
    }

    fn record_chain(&self, chain: ChainId) {
        *self.last_known_chain.borrow_mut() = Some(chain);
        self.notify();
    }

    fn bump_accounts(&self) {
        self.account_epoch.set(self.account_epoch.get() + 1);
        self.notify();
    }

    fn notify(&self) {
        let observer = self.observer.borrow().clone();
        if let Some(observer) = observer {
            observer();
        }
    }
}

struct Subscription {
    provider: Rc<dyn WalletProvider>,
    accounts: ListenerId,
    chain: ListenerId,
}

pub struct SessionManager {
    config: FaucetConfig,
    detector: Rc<dyn ProviderDetector>,
    errors: Rc<ErrorBanner>,
    session: RefCell<Session>,
    subscription: RefCell<Option<Subscription>>,
    notifications: Rc<Notifications>,
    attempts: Cell<u64>,
    generation: Cell<u64>,
}

impl SessionManager {
    pub fn new(
        config: FaucetConfig,
        detector: Rc<dyn ProviderDetector>,
        errors: Rc<ErrorBanner>,
    ) -> Self {
        Self {
            config,
            detector,
            errors,
            session: RefCell::new(Session::default()),
            subscription: RefCell::new(None),
            notifications: Rc::new(Notifications::default()),
            attempts: Cell::new(0),
            generation: Cell::new(0),
        }
    }

    pub fn snapshot(&self) -> Session {
        self.session.borrow().clone()
    }

    pub fn phase(&self) -> SessionPhase {
        self.session.borrow().phase
    }

    /// Bumped on every committed reconciliation.
    pub fn generation(&self) -> u64 {
        self.generation.get()
    }

    pub fn notifications(&self) -> Rc<Notifications> {
        self.notifications.clone()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.borrow().is_some()
    }

    /// Detect the provider, check its network and bind the contract.
    ///
    /// A reconciliation overtaken by a newer one commits nothing.
    pub async fn reconcile(&self) -> SessionPhase {
        let attempt = self.attempts.get() + 1;
        self.attempts.set(attempt);
        self.session.borrow_mut().phase = SessionPhase::Detecting;

        let Some(provider) = self.detector.detect().await else {
            if self.is_stale(attempt) {
                return self.phase();
            }
            warn!("Please, Install Metamask wallet.");
            self.ensure_unsubscribed();
            self.commit(Session {
                loaded: true,
                phase: SessionPhase::NoProvider,
                ..Session::default()
            });
            return SessionPhase::NoProvider;
        };

        let web3 = Web3::new(provider.clone());
        let checked = validate_network(
            &web3,
            self.config.expected_network_id,
            &self.config.network_name,
        )
        .await;
        if self.is_stale(attempt) {
            return self.phase();
        }

        match checked {
            Err(err) => {
                let phase = match err {
                    SessionError::WrongNetwork { .. } => SessionPhase::WrongNetwork,
                    SessionError::NetworkUnavailable(_) => SessionPhase::Unreachable,
                };
                warn!("session refused on {}: {}", provider.name(), err);
                self.ensure_unsubscribed();
                self.errors.set(&err);
                self.commit(Session {
                    loaded: true,
                    phase,
                    ..Session::default()
                });
                phase
            }
            Ok(network) => {
                self.ensure_subscribed(&provider);
                provider.set_max_listeners(self.config.max_listeners);
                let contract = web3.faucet(self.config.contract_address);
                info!(
                    "session ready on network {} with faucet {}",
                    network,
                    contract.address()
                );
                self.commit(Session {
                    provider: Some(provider),
                    web3: Some(web3),
                    chain_binding: Some(network),
                    contract: Some(contract),
                    loaded: true,
                    last_known_chain: None,
                    phase: SessionPhase::Ready,
                });
                SessionPhase::Ready
            }
        }
    }

    /// Detach listeners and forget the session; in-flight reconciliations are discarded.
    pub fn teardown(&self) {
        self.attempts.set(self.attempts.get() + 1);
        self.ensure_unsubscribed();
        *self.session.borrow_mut() = Session::default();
        self.generation.set(self.generation.get() + 1);
        debug!("session torn down");
    }

    fn is_stale(&self, attempt: u64) -> bool {
        let stale = attempt != self.attempts.get();
        if stale {
            debug!("discarding stale session reconciliation #{attempt}");
        }
        stale
    }

    fn commit(&self, mut session: Session) {
        session.last_known_chain = self.notifications.last_known_chain();
        *self.session.borrow_mut() = session;
        self.generation.set(self.generation.get() + 1);
    }

    fn ensure_subscribed(&self, provider: &Rc<dyn WalletProvider>) {
        let already = self
            .subscription
            .borrow()
            .as_ref()
            .is_some_and(|sub| same_provider(&sub.provider, provider));
        if already {
            return;
        }

        self.ensure_unsubscribed();
        let accounts = provider.on(ProviderEventKind::AccountsChanged, self.accounts_handler());
        let chain = provider.on(ProviderEventKind::ChainChanged, self.chain_handler());
        debug!("subscribed to {} events", provider.name());
        *self.subscription.borrow_mut() = Some(Subscription {
            provider: provider.clone(),
            accounts,
            chain,
        });
    }

    fn ensure_unsubscribed(&self) {
        let Some(sub) = self.subscription.borrow_mut().take() else {
            return;
        };
        sub.provider
            .remove_listener(ProviderEventKind::AccountsChanged, sub.accounts);
        sub.provider
            .remove_listener(ProviderEventKind::ChainChanged, sub.chain);
        debug!("unsubscribed from {} events", sub.provider.name());
    }

    fn accounts_handler(&self) -> Listener {
        let notifications = self.notifications.clone();
        Rc::new(move |event: &ProviderEvent| {
            if let ProviderEvent::AccountsChanged(accounts) = event {
                match accounts.first() {
                    None => info!("Please connect to MetaMask."),
                    Some(account) => info!("Account changed to {}", account),
                }
                notifications.bump_accounts();
            }
        })
    }

    fn chain_handler(&self) -> Listener {
        let notifications = self.notifications.clone();
        Rc::new(move |event: &ProviderEvent| {
            if let ProviderEvent::ChainChanged(chain) = event {
                info!("Chain changed to {}", chain);
                notifications.record_chain(chain.clone());
            }
        })
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.ensure_unsubscribed();
    }
}
