//! Typed JSON-RPC calls over a [`WalletProvider`].

use crate::contract::FaucetContract;
use crate::{ProviderError, WalletProvider};
use alloy_primitives::{Address, Bytes, U256, hex};
use fd_types::{ChainId, NetworkId, WalletAddress};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptPolicy {
    pub interval_ms: u64,
    pub attempts: u32,
}

impl Default for ReceiptPolicy {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            attempts: 120,
        }
    }
}

impl ReceiptPolicy {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionRequest {
    pub from: Option<WalletAddress>,
    pub to: Option<Address>,
    pub value: Option<U256>,
    pub gas: Option<u64>,
    pub data: Bytes,
}

impl TransactionRequest {
    pub fn with_gas(mut self, gas: u64) -> Self {
        self.gas = Some(gas);
        self
    }

    /// JSON-RPC transaction object; quantities are hex, absent fields are omitted.
    pub fn to_params(&self) -> Value {
        let mut object = Map::new();
        if let Some(from) = &self.from {
            object.insert("from".into(), Value::String(from.0.clone()));
        }
        if let Some(to) = &self.to {
            object.insert("to".into(), Value::String(to.to_checksum(None)));
        }
        if let Some(value) = &self.value {
            object.insert("value".into(), Value::String(format!("0x{value:x}")));
        }
        if let Some(gas) = self.gas {
            object.insert("gas".into(), Value::String(format!("0x{gas:x}")));
        }
        if !self.data.is_empty() {
            object.insert("data".into(), Value::String(hex::encode_prefixed(&self.data)));
        }
        Value::Object(object)
    }

    pub fn from_params(method: &str, params: &Value) -> Result<Self, ProviderError> {
        let object = params
            .as_object()
            .ok_or_else(|| ProviderError::decode(method, "transaction must be an object"))?;

        let text = |key: &str| object.get(key).and_then(Value::as_str);

        let to = text("to")
            .map(|raw| {
                raw.parse::<Address>()
                    .map_err(|err| ProviderError::decode(method, format!("invalid to: {err}")))
            })
            .transpose()?;
        let value = object
            .get("value")
            .map(|raw| parse_quantity(method, raw))
            .transpose()?;
        let gas = object
            .get("gas")
            .map(|raw| parse_u64_quantity(method, raw))
            .transpose()?;
        let data = match text("data").or_else(|| text("input")) {
            Some(raw) => hex::decode(raw)
                .map(Bytes::from)
                .map_err(|err| ProviderError::decode(method, format!("invalid data: {err}")))?,
            None => Bytes::new(),
        };

        Ok(Self {
            from: text("from").map(WalletAddress::from),
            to,
            value,
            gas,
            data,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxReceipt {
    pub transaction_hash: String,
    pub block_number: u64,
    pub gas_used: u64,
    pub status: bool,
}

impl TxReceipt {
    pub fn from_json(value: &Value) -> Result<Self, ProviderError> {
        const METHOD: &str = "eth_getTransactionReceipt";
        let field = |key: &str| {
            value
                .get(key)
                .ok_or_else(|| ProviderError::decode(METHOD, format!("missing {key}")))
        };

        let transaction_hash = field("transactionHash")?
            .as_str()
            .ok_or_else(|| ProviderError::decode(METHOD, "transactionHash must be a string"))?
            .to_owned();

        // Pre-Byzantium receipts carry no status; treat them as successful.
        let status = match value.get("status") {
            Some(Value::Null) | None => true,
            Some(raw) => parse_u64_quantity(METHOD, raw)? == 1,
        };

        Ok(Self {
            transaction_hash,
            block_number: parse_u64_quantity(METHOD, field("blockNumber")?)?,
            gas_used: parse_u64_quantity(METHOD, field("gasUsed")?)?,
            status,
        })
    }

    pub fn to_json(&self) -> Value {
        json!({
            "transactionHash": self.transaction_hash,
            "blockNumber": format!("0x{:x}", self.block_number),
            "gasUsed": format!("0x{:x}", self.gas_used),
            "status": if self.status { "0x1" } else { "0x0" },
        })
    }
}

pub fn parse_quantity(method: &str, raw: &Value) -> Result<U256, ProviderError> {
    let text = raw
        .as_str()
        .ok_or_else(|| ProviderError::decode(method, format!("expected hex quantity, got {raw}")))?;
    let digits = text
        .strip_prefix("0x")
        .ok_or_else(|| ProviderError::decode(method, format!("quantity '{text}' lacks 0x prefix")))?;
    if digits.is_empty() {
        return Err(ProviderError::decode(method, "empty quantity"));
    }
    U256::from_str_radix(digits, 16)
        .map_err(|err| ProviderError::decode(method, format!("invalid quantity '{text}': {err}")))
}

pub fn parse_u64_quantity(method: &str, raw: &Value) -> Result<u64, ProviderError> {
    let value = parse_quantity(method, raw)?;
    u64::try_from(value)
        .map_err(|_| ProviderError::decode(method, format!("quantity {value} exceeds u64")))
}

/// Blockchain client bound to one provider. Cloning shares the provider.
#[derive(Clone)]
pub struct Web3 {
    provider: Rc<dyn WalletProvider>,
}

impl fmt::Debug for Web3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Web3")
            .field("provider", &self.provider.name())
            .finish()
    }
}

impl Web3 {
    pub fn new(provider: Rc<dyn WalletProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Rc<dyn WalletProvider> {
        &self.provider
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        debug!("{} request {}", self.provider.name(), method);
        self.provider.request(method, params).await
    }

    /// `net_version`; nodes answer with a decimal string, some wallets with a number.
    pub async fn network_id(&self) -> Result<NetworkId, ProviderError> {
        const METHOD: &str = "net_version";
        let value = self.call(METHOD, json!([])).await?;
        let parsed = match &value {
            Value::String(text) => text.trim().parse::<u64>().ok(),
            Value::Number(number) => number.as_u64(),
            _ => None,
        };
        parsed
            .map(NetworkId)
            .ok_or_else(|| ProviderError::decode(METHOD, format!("invalid network id {value}")))
    }

    pub async fn chain_id(&self) -> Result<ChainId, ProviderError> {
        const METHOD: &str = "eth_chainId";
        let value = self.call(METHOD, json!([])).await?;
        value
            .as_str()
            .map(|text| ChainId(text.to_owned()))
            .ok_or_else(|| ProviderError::decode(METHOD, format!("invalid chain id {value}")))
    }

    pub async fn accounts(&self) -> Result<Vec<WalletAddress>, ProviderError> {
        let value = self.call("eth_accounts", json!([])).await?;
        parse_accounts("eth_accounts", value)
    }

    /// Prompt the wallet for account access.
    pub async fn request_accounts(&self) -> Result<Vec<WalletAddress>, ProviderError> {
        let value = self.call("eth_requestAccounts", json!([])).await?;
        parse_accounts("eth_requestAccounts", value)
    }

    /// Balance in wei.
    pub async fn balance(&self, address: &WalletAddress) -> Result<U256, ProviderError> {
        const METHOD: &str = "eth_getBalance";
        let value = self.call(METHOD, json!([address.0, "latest"])).await?;
        parse_quantity(METHOD, &value)
    }

    pub async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64, ProviderError> {
        const METHOD: &str = "eth_estimateGas";
        let value = self.call(METHOD, json!([tx.to_params()])).await?;
        parse_u64_quantity(METHOD, &value)
    }

    pub async fn send_transaction(&self, tx: &TransactionRequest) -> Result<String, ProviderError> {
        const METHOD: &str = "eth_sendTransaction";
        let value = self.call(METHOD, json!([tx.to_params()])).await?;
        value
            .as_str()
            .map(ToOwned::to_owned)
            .ok_or_else(|| ProviderError::decode(METHOD, format!("invalid tx hash {value}")))
    }

    pub async fn transaction_receipt(&self, tx_hash: &str) -> Result<Option<TxReceipt>, ProviderError> {
        let value = self.call("eth_getTransactionReceipt", json!([tx_hash])).await?;
        if value.is_null() {
            return Ok(None);
        }
        TxReceipt::from_json(&value).map(Some)
    }

    /// Submit and wait until mined; a receipt with failed status is an error.
    pub async fn send_and_confirm(
        &self,
        tx: &TransactionRequest,
        policy: &ReceiptPolicy,
    ) -> Result<TxReceipt, ProviderError> {
        let tx_hash = self.send_transaction(tx).await?;
        info!("submitted transaction {}", tx_hash);

        for attempt in 0..policy.attempts {
            if let Some(receipt) = self.transaction_receipt(&tx_hash).await? {
                if !receipt.status {
                    return Err(ProviderError::Reverted { tx_hash });
                }
                return Ok(receipt);
            }
            if attempt + 1 < policy.attempts {
                self.provider.pause(policy.interval()).await;
            }
        }

        Err(ProviderError::ReceiptTimeout {
            tx_hash,
            attempts: policy.attempts,
        })
    }

    /// Contract handle for the Faucet interface at `address`.
    pub fn faucet(&self, address: Address) -> FaucetContract {
        FaucetContract::new(self.clone(), address)
    }
}

fn parse_accounts(method: &str, value: Value) -> Result<Vec<WalletAddress>, ProviderError> {
    let Value::Array(entries) = value else {
        return Err(ProviderError::decode(method, "expected an array of addresses"));
    };
    entries
        .into_iter()
        .map(|entry| match entry {
            Value::String(address) => Ok(WalletAddress(address)),
            other => Err(ProviderError::decode(method, format!("invalid address {other}"))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SimulatedProvider;

    #[test]
    fn transaction_params_use_hex_quantities() {
        let tx = TransactionRequest {
            from: Some(WalletAddress::from("0xabc")),
            to: Some(Address::ZERO),
            value: Some(U256::from(100_000_000_000_000_000u128)),
            gas: Some(21_000),
            data: Bytes::from(vec![0xb6, 0xb5, 0x5f, 0x25]),
        };
        let params = tx.to_params();
        assert_eq!(params["value"], "0x16345785d8a0000");
        assert_eq!(params["gas"], "0x5208");
        assert_eq!(params["data"], "0xb6b55f25");
        assert_eq!(TransactionRequest::from_params("eth_sendTransaction", &params).unwrap(), tx);
    }

    #[test]
    fn omits_absent_fields() {
        let params = TransactionRequest::default().to_params();
        assert_eq!(params, json!({}));
    }

    #[test]
    fn rejects_malformed_quantities() {
        assert!(parse_quantity("m", &json!("12")).is_err());
        assert!(parse_quantity("m", &json!("0x")).is_err());
        assert!(parse_quantity("m", &json!(12)).is_err());
        assert_eq!(parse_u64_quantity("m", &json!("0x1f")).unwrap(), 31);
    }

    #[test]
    fn receipt_without_status_counts_as_success() {
        let receipt = TxReceipt::from_json(&json!({
            "transactionHash": "0x01",
            "blockNumber": "0x2",
            "gasUsed": "0x5208",
        }))
        .unwrap();
        assert!(receipt.status);
        assert_eq!(receipt.block_number, 2);
    }

    #[tokio::test]
    async fn reads_network_and_balance() -> anyhow::Result<()> {
        let account = WalletAddress::from("0x1111111111111111111111111111111111111111");
        let provider = Rc::new(
            SimulatedProvider::new()
                .with_account(account.clone(), U256::from(5u8))
                .authorized(),
        );
        let web3 = Web3::new(provider);

        assert_eq!(web3.network_id().await?, NetworkId(fd_types::GANACHE_NETWORK_ID));
        assert_eq!(web3.chain_id().await?, ChainId::from_number(1337));
        assert_eq!(web3.accounts().await?, vec![account.clone()]);
        assert_eq!(web3.balance(&account).await?, U256::from(5u8));
        Ok(())
    }

    #[tokio::test]
    async fn confirm_times_out_without_receipt() -> anyhow::Result<()> {
        let account = WalletAddress::from("0x1111111111111111111111111111111111111111");
        let provider = Rc::new(
            SimulatedProvider::new()
                .with_account(account.clone(), U256::from(10u8))
                .authorized(),
        );
        provider.withhold_receipts(true);
        let web3 = Web3::new(provider.clone());

        let tx = TransactionRequest {
            from: Some(account),
            to: Some(Address::repeat_byte(0x22)),
            value: Some(U256::from(1u8)),
            ..Default::default()
        };
        let policy = ReceiptPolicy {
            interval_ms: 1,
            attempts: 3,
        };
        let err = web3.send_and_confirm(&tx, &policy).await.unwrap_err();
        assert!(matches!(err, ProviderError::ReceiptTimeout { attempts: 3, .. }));
        assert_eq!(provider.count_calls("eth_getTransactionReceipt"), 3);
        Ok(())
    }
}
