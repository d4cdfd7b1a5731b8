use crate::error::SessionError;
use fd_chain_client::Web3;
use fd_types::NetworkId;
use tracing::warn;

/// Accept the provider only when it reports the expected `net_version`.
pub async fn validate_network(
    web3: &Web3,
    expected: NetworkId,
    expected_name: &str,
) -> Result<NetworkId, SessionError> {
    let actual = web3
        .network_id()
        .await
        .map_err(|err| SessionError::NetworkUnavailable(err.to_string()))?;

    if actual != expected {
        warn!("provider is on network {actual}, expected {expected} ({expected_name})");
        return Err(SessionError::WrongNetwork {
            expected_name: expected_name.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(actual)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fd_chain_client::{ProviderError, SimulatedProvider};
    use std::rc::Rc;

    #[tokio::test]
    async fn accepts_expected_network() -> anyhow::Result<()> {
        let web3 = Web3::new(Rc::new(SimulatedProvider::new()));
        let network = validate_network(&web3, NetworkId(5777), "Ganache").await?;
        assert_eq!(network, NetworkId(5777));
        Ok(())
    }

    #[tokio::test]
    async fn rejects_other_networks() {
        let web3 = Web3::new(Rc::new(SimulatedProvider::new().with_network_id(1)));
        let err = validate_network(&web3, NetworkId(5777), "Ganache")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Please connect to the Ganache Network");
    }

    #[tokio::test]
    async fn query_failure_is_unavailable() {
        let provider = Rc::new(SimulatedProvider::new());
        provider.fail_next("net_version", ProviderError::Transport("connection refused".into()));
        let err = validate_network(&Web3::new(provider), NetworkId(5777), "Ganache")
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NetworkUnavailable(_)));
    }
}
