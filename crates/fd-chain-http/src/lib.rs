use anyhow::Context;
use async_trait::async_trait;
use fd_chain_client::{
    Listener, ListenerId, ListenerRegistry, ProviderError, ProviderEvent, ProviderEventKind,
    WalletProvider,
};
use fd_types::{ChainId, WalletAddress};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::cell::{Cell, RefCell};
use std::time::Duration;
use tracing::{debug, info};

/// Ganache GUI default endpoint.
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:7545";

/// Wallet provider backed by a JSON-RPC node over HTTP.
///
/// Nodes push no wallet events over HTTP, so `accountsChanged` / `chainChanged`
/// are synthesised by [`HttpProvider::poll_changes`].
pub struct HttpProvider {
    endpoint: String,
    http: reqwest::Client,
    next_id: Cell<u64>,
    listeners: ListenerRegistry,
    observed: RefCell<Observed>,
}

impl HttpProvider {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let endpoint: String = endpoint.into();
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            next_id: Cell::new(1),
            listeners: ListenerRegistry::default(),
            observed: RefCell::new(Observed::default()),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let body = RpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("json-rpc {method} transport"))
            .map_err(transport)?;

        let status = response.status();
        let text = response
            .text()
            .await
            .with_context(|| format!("json-rpc {method} body"))
            .map_err(transport)?;

        if !status.is_success() {
            return Err(ProviderError::Transport(format!(
                "json-rpc {method} HTTP {status}: {text}"
            )));
        }

        decode_response(method, &text)
    }

    /// Compare the node's accounts and chain with the last observation and emit
    /// events for what changed. The first call only records a baseline.
    pub async fn poll_changes(&self) -> Result<usize, ProviderError> {
        let accounts = self.rpc("eth_accounts", json!([])).await?;
        let accounts = match accounts {
            Value::Array(entries) => entries
                .into_iter()
                .filter_map(|entry| entry.as_str().map(WalletAddress::from))
                .collect(),
            other => {
                return Err(ProviderError::decode(
                    "eth_accounts",
                    format!("expected an array, got {other}"),
                ));
            }
        };
        let chain = self
            .rpc("eth_chainId", json!([]))
            .await?
            .as_str()
            .map(|raw| ChainId(raw.to_owned()))
            .ok_or_else(|| ProviderError::decode("eth_chainId", "expected a hex string"))?;

        let events = self.observed.borrow_mut().update(accounts, chain);
        for event in &events {
            info!("{} observed {}", self.endpoint, event.kind());
            self.listeners.emit(event);
        }
        Ok(events.len())
    }
}

fn transport(err: anyhow::Error) -> ProviderError {
    ProviderError::Transport(format!("{err:#}"))
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// A missing or `null` result is a valid answer (e.g. a receipt not yet mined).
fn decode_response(method: &str, body: &str) -> Result<Value, ProviderError> {
    let response: RpcResponse = serde_json::from_str(body)
        .map_err(|err| ProviderError::decode(method, format!("{err}: {body}")))?;

    if let Some(error) = response.error {
        return Err(ProviderError::rpc(error.code, error.message));
    }
    Ok(response.result.unwrap_or(Value::Null))
}

#[derive(Debug, Default)]
struct Observed {
    accounts: Option<Vec<WalletAddress>>,
    chain: Option<ChainId>,
}

impl Observed {
    fn update(&mut self, accounts: Vec<WalletAddress>, chain: ChainId) -> Vec<ProviderEvent> {
        let mut events = Vec::new();

        match &self.accounts {
            Some(previous) if *previous != accounts => {
                events.push(ProviderEvent::AccountsChanged(accounts.clone()));
            }
            _ => {}
        }
        match &self.chain {
            Some(previous) if *previous != chain => {
                events.push(ProviderEvent::ChainChanged(chain.clone()));
            }
            _ => {}
        }

        self.accounts = Some(accounts);
        self.chain = Some(chain);
        events
    }
}

#[async_trait(?Send)]
impl WalletProvider for HttpProvider {
    fn name(&self) -> &str {
        "json-rpc"
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        // Node accounts are unlocked; there is no authorisation prompt.
        let method = match method {
            "eth_requestAccounts" => "eth_accounts",
            other => other,
        };
        debug!("{} -> {}", self.endpoint, method);
        self.rpc(method, params).await
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

    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_envelope_is_jsonrpc_2() {
        let body = RpcRequest {
            jsonrpc: "2.0",
            id: 7,
            method: "net_version",
            params: json!([]),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"jsonrpc": "2.0", "id": 7, "method": "net_version", "params": []})
        );
    }

    #[test]
    fn decodes_results_and_errors() {
        assert_eq!(
            decode_response("net_version", r#"{"jsonrpc":"2.0","id":1,"result":"5777"}"#).unwrap(),
            json!("5777")
        );
        assert_eq!(
            decode_response(
                "eth_getTransactionReceipt",
                r#"{"jsonrpc":"2.0","id":2,"result":null}"#
            )
            .unwrap(),
            Value::Null
        );

        let err = decode_response(
            "eth_sendTransaction",
            r#"{"jsonrpc":"2.0","id":3,"error":{"code":-32000,"message":"VM Exception while processing transaction: revert"}}"#,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ProviderError::rpc(-32000, "VM Exception while processing transaction: revert")
        );

        assert!(matches!(
            decode_response("net_version", "<html>bad gateway</html>"),
            Err(ProviderError::Decode { .. })
        ));
    }

    #[test]
    fn first_observation_is_a_baseline() {
        let mut observed = Observed::default();
        let alice = WalletAddress::from("0xaaaa");
        let bob = WalletAddress::from("0xbbbb");

        assert!(observed
            .update(vec![alice.clone()], ChainId::from_number(1337))
            .is_empty());
        assert!(observed
            .update(vec![alice.clone()], ChainId::from_number(1337))
            .is_empty());

        let events = observed.update(vec![bob.clone()], ChainId::from_number(1));
        assert_eq!(
            events,
            vec![
                ProviderEvent::AccountsChanged(vec![bob]),
                ProviderEvent::ChainChanged(ChainId::from_number(1)),
            ]
        );
    }

    #[test]
    fn trims_trailing_slash_from_endpoint() {
        let provider = HttpProvider::new("http://localhost:8545/");
        assert_eq!(provider.endpoint(), "http://localhost:8545");
    }
}
