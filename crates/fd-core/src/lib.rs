//! Faucet client core: provider session, account derivation and contract actions.

pub mod account;
pub mod actions;
pub mod app;
pub mod config;
pub mod detector;
pub mod error;
pub mod network;
pub mod reload;
pub mod session;

pub use account::{AccountResolver, AccountState, Resolution};
pub use actions::ActionExecutor;
pub use app::{AppView, FaucetApp};
pub use config::FaucetConfig;
pub use detector::{ProviderDetector, StaticDetector};
pub use error::{ActionError, ErrorBanner, SessionError};
pub use network::validate_network;
pub use reload::ReloadSignal;
pub use session::{Notifications, Session, SessionManager, SessionPhase};
