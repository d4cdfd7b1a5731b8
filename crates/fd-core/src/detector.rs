use async_trait::async_trait;
use fd_chain_client::WalletProvider;
use std::rc::Rc;

/// Finds the wallet provider injected into the host. Absence is an answer, not an error.
#[async_trait(?Send)]
pub trait ProviderDetector {
    async fn detect(&self) -> Option<Rc<dyn WalletProvider>>;
}

/// Detector over a provider known up front (native driver, tests).
#[derive(Clone, Default)]
pub struct StaticDetector {
    provider: Option<Rc<dyn WalletProvider>>,
}

impl StaticDetector {
    pub fn new(provider: Rc<dyn WalletProvider>) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    pub fn absent() -> Self {
        Self::default()
    }
}

#[async_trait(?Send)]
impl ProviderDetector for StaticDetector {
    async fn detect(&self) -> Option<Rc<dyn WalletProvider>> {
        self.provider.clone()
    }
}
