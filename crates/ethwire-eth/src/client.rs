//! Typed Ethereum API over [`RpcClient`].

use std::sync::Arc;
use std::time::Duration;

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{Address, Bytes, B256, U256};
use ethwire_core::quantity;
use ethwire_core::{ClientConfig, RpcClient, Transport};
use ethwire_http::HttpTransport;
use ethwire_ws::WsTransport;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::OnceCell;

use crate::abi::{AbiError, MethodCall};
use crate::error::EthError;
use crate::methods::{self, kinds};
use crate::signer::TransactionSigner;
use crate::subscription::TypedSubscription;
use crate::types::{
    AddressFilter, Block, BlockParameter, FilterChanges, FilterId, LogData, LogFilter, NewHead,
    StateOverride, TopicsFilter, TxData, TxParams, TxReceipt,
};

fn param<T: Serialize>(value: &T) -> Result<Value, EthError> {
    serde_json::to_value(value).map_err(|e| EthError::Client(e.into()))
}

/// Pick a transport by URL scheme: `http(s)://`, `ws(s)://`, otherwise a
/// Unix socket path (an `ipc://` prefix is stripped).
pub fn transport_for(url: &str) -> Result<Arc<dyn Transport>, EthError> {
    let scheme = url.split_once("://").map(|(s, _)| s.to_ascii_lowercase());
    match scheme.as_deref() {
        Some("http" | "https") => Ok(Arc::new(HttpTransport::default_for(url)?)),
        Some("ws" | "wss") => Ok(Arc::new(WsTransport::new(url))),
        None | Some("ipc") => ipc_transport(url.strip_prefix("ipc://").unwrap_or(url)),
        Some(_) => Err(EthError::UnsupportedEndpoint(url.to_string())),
    }
}

#[cfg(unix)]
fn ipc_transport(path: &str) -> Result<Arc<dyn Transport>, EthError> {
    Ok(Arc::new(ethwire_ipc::IpcTransport::new(path)))
}

#[cfg(not(unix))]
fn ipc_transport(path: &str) -> Result<Arc<dyn Transport>, EthError> {
    Err(EthError::UnsupportedEndpoint(path.to_string()))
}

/// Ethereum JSON-RPC client.
///
/// Cloning is cheap; clones share the connection and the cached chain id.
///
/// ```no_run
/// # async fn demo() -> Result<(), ethwire_eth::EthError> {
/// use ethwire_eth::{BlockParameter, EthClient};
///
/// let eth = EthClient::connect("ws://127.0.0.1:8546").await?;
/// let head = eth.block_number().await?;
/// let block = eth.get_block_by_number(BlockParameter::Number(head)).await?;
/// println!("{head}: {:?}", block.map(|b| b.hash));
/// eth.close().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct EthClient {
    rpc: RpcClient,
    chain_id: Arc<OnceCell<u64>>,
}

impl std::fmt::Debug for EthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EthClient")
            .field("rpc", &self.rpc)
            .field("chain_id", &self.chain_id.get())
            .finish()
    }
}

impl EthClient {
    /// Connect to `url` with default settings.
    pub async fn connect(url: &str) -> Result<Self, EthError> {
        Self::connect_with(ClientConfig::new(url)).await
    }

    /// Connect to `config.endpoint_url`.
    pub async fn connect_with(config: ClientConfig) -> Result<Self, EthError> {
        let transport = transport_for(&config.endpoint_url)?;
        let rpc = RpcClient::connect(transport, config).await?;
        Ok(Self::from_rpc(rpc))
    }

    pub fn from_rpc(rpc: RpcClient) -> Self {
        Self { rpc, chain_id: Arc::new(OnceCell::new()) }
    }

    /// The underlying JSON-RPC client.
    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    /// Send an arbitrary request.
    pub async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, EthError> {
        Ok(self.rpc.call(method, params).await?)
    }

    async fn typed<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> Result<T, EthError> {
        Ok(self.rpc.call_as(method, params).await?)
    }

    async fn quantity(&self, method: &str, params: Vec<Value>) -> Result<u64, EthError> {
        let raw: String = self.typed(method, params).await?;
        Ok(quantity::parse_u64(&raw)?)
    }

    // ─── Node ─────────────────────────────────────────────────────────────────

    pub async fn client_version(&self) -> Result<String, EthError> {
        self.typed(methods::WEB3_CLIENT_VERSION, vec![]).await
    }

    /// `true` if the node answers `web3_clientVersion`.
    pub async fn is_connected(&self) -> bool {
        match self.client_version().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(error = %e, "node did not answer clientVersion");
                false
            }
        }
    }

    /// The chain id, fetched once per client.
    pub async fn chain_id(&self) -> Result<u64, EthError> {
        self.chain_id
            .get_or_try_init(|| self.quantity(methods::ETH_CHAIN_ID, vec![]))
            .await
            .copied()
    }

    pub async fn accounts(&self) -> Result<Vec<Address>, EthError> {
        self.typed(methods::ETH_ACCOUNTS, vec![]).await
    }

    pub async fn block_number(&self) -> Result<u64, EthError> {
        self.quantity(methods::ETH_BLOCK_NUMBER, vec![]).await
    }

    pub async fn gas_price(&self) -> Result<U256, EthError> {
        self.typed(methods::ETH_GAS_PRICE, vec![]).await
    }

    // ─── Account state ────────────────────────────────────────────────────────

    pub async fn get_balance(&self, address: Address, block: BlockParameter) -> Result<U256, EthError> {
        self.typed(methods::ETH_GET_BALANCE, vec![param(&address)?, block.to_value()]).await
    }

    pub async fn get_transaction_count(&self, address: Address, block: BlockParameter) -> Result<u64, EthError> {
        self.quantity(methods::ETH_GET_TRANSACTION_COUNT, vec![param(&address)?, block.to_value()])
            .await
    }

    /// Contract code at `address`, or `None` for an externally owned account.
    pub async fn get_code(&self, address: Address, block: BlockParameter) -> Result<Option<Bytes>, EthError> {
        let code: Bytes = self
            .typed(methods::ETH_GET_CODE, vec![param(&address)?, block.to_value()])
            .await?;
        Ok((!code.is_empty()).then_some(code))
    }

    pub async fn get_storage_at(&self, address: Address, slot: U256, block: BlockParameter) -> Result<B256, EthError> {
        self.typed(
            methods::ETH_GET_STORAGE_AT,
            vec![param(&address)?, param(&slot)?, block.to_value()],
        )
        .await
    }

    // ─── Calls ────────────────────────────────────────────────────────────────

    /// `eth_call`, optionally against overridden account state.
    pub async fn call(
        &self,
        tx: &TxParams,
        block: BlockParameter,
        overrides: Option<&StateOverride>,
    ) -> Result<Bytes, EthError> {
        let mut params = vec![param(tx)?, block.to_value()];
        if let Some(overrides) = overrides {
            params.push(param(overrides)?);
        }
        self.typed(methods::ETH_CALL, params).await
    }

    /// Call a bound contract function and decode its return values.
    pub async fn call_method(
        &self,
        method: &MethodCall,
        args: &[DynSolValue],
        block: BlockParameter,
    ) -> Result<Vec<DynSolValue>, EthError> {
        if method.to.is_none() {
            return Err(AbiError::Unbound(method.signature()).into());
        }
        let tx = method.tx_params(args)?;
        tracing::debug!(
            method = %method.signature(),
            selector = %hex::encode(method.selector()),
            to = ?method.to,
            "eth_call"
        );
        let output = self.call(&tx, block, None).await?;
        Ok(method.decode_output(&output)?)
    }

    /// `eth_estimateGas`; `block` is omitted from the request when `None`.
    pub async fn estimate_gas(&self, tx: &TxParams, block: Option<BlockParameter>) -> Result<u64, EthError> {
        let mut params = vec![param(tx)?];
        if let Some(block) = block {
            params.push(block.to_value());
        }
        self.quantity(methods::ETH_ESTIMATE_GAS, params).await
    }

    // ─── Transactions ─────────────────────────────────────────────────────────

    pub async fn send_raw_transaction(&self, raw: &Bytes) -> Result<B256, EthError> {
        self.typed(methods::ETH_SEND_RAW_TRANSACTION, vec![param(raw)?]).await
    }

    /// Complete `tx` for signing by `from`.
    ///
    /// Missing fields are fetched concurrently: the chain id, gas (twice the
    /// node's estimate), a legacy gas price unless EIP-1559 fee fields are
    /// set, and the pending nonce of `from`.
    pub async fn fill_transaction(&self, tx: &TxParams, from: Address) -> Result<TxParams, EthError> {
        let mut tx = tx.clone();
        tx.from.get_or_insert(from);
        let draft = &tx;

        let chain_id = async {
            match draft.chain_id {
                Some(id) => Ok(id),
                None => self.chain_id().await,
            }
        };
        let gas = async {
            match draft.gas {
                Some(gas) => Ok(gas),
                None => Ok::<_, EthError>(self.estimate_gas(draft, None).await?.saturating_mul(2)),
            }
        };
        let gas_price = async {
            if draft.gas_price.is_some() || draft.uses_dynamic_fee() {
                Ok(draft.gas_price)
            } else {
                self.gas_price().await.map(Some)
            }
        };
        let nonce = async {
            match draft.nonce {
                Some(nonce) => Ok(nonce),
                None => self.get_transaction_count(from, BlockParameter::Pending).await,
            }
        };
        let (chain_id, gas, gas_price, nonce) = tokio::try_join!(chain_id, gas, gas_price, nonce)?;

        tx.chain_id = Some(chain_id);
        tx.gas = Some(gas);
        tx.gas_price = gas_price;
        tx.nonce = Some(nonce);
        Ok(tx)
    }

    /// Fill, sign and broadcast `tx`; returns the transaction hash.
    pub async fn send_transaction(
        &self,
        tx: &TxParams,
        signer: &dyn TransactionSigner,
    ) -> Result<B256, EthError> {
        let started = std::time::Instant::now();
        let filled = self.fill_transaction(tx, signer.address()).await?;
        let raw = signer.sign_transaction(&filled).await?;
        let hash = self.send_raw_transaction(&raw).await?;
        tracing::info!(
            %hash,
            from = %signer.address(),
            nonce = ?filled.nonce,
            gas = ?filled.gas,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "transaction sent"
        );
        Ok(hash)
    }

    pub async fn get_transaction_by_hash(&self, hash: B256) -> Result<Option<TxData>, EthError> {
        self.typed(methods::ETH_GET_TRANSACTION_BY_HASH, vec![param(&hash)?]).await
    }

    /// The signed transaction bytes, where the node supports it.
    pub async fn get_raw_transaction_by_hash(&self, hash: B256) -> Result<Option<Bytes>, EthError> {
        self.typed(methods::ETH_GET_RAW_TRANSACTION_BY_HASH, vec![param(&hash)?]).await
    }

    pub async fn get_transaction_receipt(&self, hash: B256) -> Result<Option<TxReceipt>, EthError> {
        self.typed(methods::ETH_GET_TRANSACTION_RECEIPT, vec![param(&hash)?]).await
    }

    /// Poll until the receipt for `hash` is available.
    ///
    /// Never gives up on its own; wrap it in `tokio::time::timeout` to bound
    /// the wait.
    pub async fn wait_for_transaction_receipt(
        &self,
        hash: B256,
        poll_interval: Duration,
    ) -> Result<TxReceipt, EthError> {
        loop {
            if let Some(receipt) = self.get_transaction_receipt(hash).await? {
                return Ok(receipt);
            }
            tracing::trace!(%hash, "receipt not yet available");
            tokio::time::sleep(poll_interval).await;
        }
    }

    // ─── Blocks ───────────────────────────────────────────────────────────────

    /// Block with transaction hashes only.
    pub async fn get_block_by_number(&self, block: BlockParameter) -> Result<Option<Block<B256>>, EthError> {
        self.typed(methods::ETH_GET_BLOCK_BY_NUMBER, vec![block.to_value(), json!(false)])
            .await
    }

    /// Block with full transaction objects.
    pub async fn get_full_block_by_number(&self, block: BlockParameter) -> Result<Option<Block<TxData>>, EthError> {
        self.typed(methods::ETH_GET_BLOCK_BY_NUMBER, vec![block.to_value(), json!(true)])
            .await
    }

    pub async fn get_block_by_hash(&self, hash: B256) -> Result<Option<Block<B256>>, EthError> {
        self.typed(methods::ETH_GET_BLOCK_BY_HASH, vec![param(&hash)?, json!(false)])
            .await
    }

    // ─── Filters ──────────────────────────────────────────────────────────────

    pub async fn new_filter(&self, filter: &LogFilter) -> Result<FilterId, EthError> {
        self.typed(methods::ETH_NEW_FILTER, vec![param(filter)?]).await
    }

    pub async fn new_block_filter(&self) -> Result<FilterId, EthError> {
        self.typed(methods::ETH_NEW_BLOCK_FILTER, vec![]).await
    }

    pub async fn new_pending_transaction_filter(&self) -> Result<FilterId, EthError> {
        self.typed(methods::ETH_NEW_PENDING_TRANSACTION_FILTER, vec![]).await
    }

    pub async fn uninstall_filter(&self, id: &FilterId) -> Result<bool, EthError> {
        self.typed(methods::ETH_UNINSTALL_FILTER, vec![param(id)?]).await
    }

    pub async fn get_filter_logs(&self, id: &FilterId) -> Result<Vec<LogData>, EthError> {
        self.typed(methods::ETH_GET_FILTER_LOGS, vec![param(id)?]).await
    }

    /// New entries since the last poll: logs for log filters, hashes for
    /// block and pending-transaction filters.
    pub async fn get_filter_changes(&self, id: &FilterId) -> Result<FilterChanges, EthError> {
        self.typed(methods::ETH_GET_FILTER_CHANGES, vec![param(id)?]).await
    }

    pub async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<LogData>, EthError> {
        self.typed(methods::ETH_GET_LOGS, vec![param(filter)?]).await
    }

    // ─── Subscriptions ────────────────────────────────────────────────────────

    async fn subscribe<T: DeserializeOwned>(&self, params: Vec<Value>) -> Result<TypedSubscription<T>, EthError> {
        let inner = self
            .rpc
            .subscribe_with(methods::ETH_SUBSCRIBE, methods::ETH_UNSUBSCRIBE, params)
            .await?;
        Ok(TypedSubscription::new(inner))
    }

    pub async fn subscribe_new_heads(&self) -> Result<TypedSubscription<NewHead>, EthError> {
        self.subscribe(vec![json!(kinds::NEW_HEADS)]).await
    }

    /// Sync status updates: `false`, or an object describing progress.
    pub async fn subscribe_syncing(&self) -> Result<TypedSubscription<Value>, EthError> {
        self.subscribe(vec![json!(kinds::SYNCING)]).await
    }

    pub async fn subscribe_new_pending_transactions(&self) -> Result<TypedSubscription<B256>, EthError> {
        self.subscribe(vec![json!(kinds::NEW_PENDING_TRANSACTIONS)]).await
    }

    /// Logs matching `address` and `topics`; both `None` subscribes to every log.
    pub async fn subscribe_logs(
        &self,
        address: Option<AddressFilter>,
        topics: Option<TopicsFilter>,
    ) -> Result<TypedSubscription<LogData>, EthError> {
        let mut params = vec![json!(kinds::LOGS)];
        let mut spec = serde_json::Map::new();
        if let Some(address) = address {
            spec.insert("address".into(), param(&address)?);
        }
        if let Some(topics) = topics {
            spec.insert("topics".into(), param(&topics)?);
        }
        if !spec.is_empty() {
            params.push(Value::Object(spec));
        }
        self.subscribe(params).await
    }

    /// Close the connection. Further calls fail with a connection error.
    pub async fn close(&self) {
        self.rpc.close().await;
    }
}

impl From<RpcClient> for EthClient {
    fn from(rpc: RpcClient) -> Self {
        Self::from_rpc(rpc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_selection_by_scheme() {
        let http = transport_for("https://rpc.example.org").unwrap();
        assert_eq!(http.url(), "https://rpc.example.org");
        assert!(!http.kind().supports_subscriptions());

        let ws = transport_for("WSS://rpc.example.org/ws").unwrap();
        assert!(ws.kind().supports_subscriptions());

        assert!(matches!(
            transport_for("ftp://rpc.example.org"),
            Err(EthError::UnsupportedEndpoint(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn paths_select_ipc() {
        let ipc = transport_for("ipc:///tmp/geth.ipc").unwrap();
        assert_eq!(ipc.url(), "/tmp/geth.ipc");
        assert!(ipc.kind().supports_subscriptions());
        assert_eq!(transport_for("/tmp/geth.ipc").unwrap().url(), "/tmp/geth.ipc");
    }
}
