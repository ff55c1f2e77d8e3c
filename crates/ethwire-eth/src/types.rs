//! Ethereum JSON-RPC data types.
//!
//! Integer fields that always fit 64 bits are decoded strictly from hex
//! quantities into `u64`; wei amounts and other 256-bit values use alloy's
//! `U256`. Addresses, hashes and byte strings use alloy primitives as well.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use alloy_primitives::{Address, Bytes, B256, B64, U256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use ethwire_core::quantity::{self, opt_u64_hex, u64_hex, QuantityError};

// ─── Block parameter ──────────────────────────────────────────────────────────

/// Which block a state query runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockParameter {
    Earliest,
    #[default]
    Latest,
    Pending,
    Safe,
    Finalized,
    Number(u64),
}

impl BlockParameter {
    pub fn to_value(self) -> Value {
        Value::String(self.to_string())
    }
}

impl fmt::Display for BlockParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Earliest => f.write_str("earliest"),
            Self::Latest => f.write_str("latest"),
            Self::Pending => f.write_str("pending"),
            Self::Safe => f.write_str("safe"),
            Self::Finalized => f.write_str("finalized"),
            Self::Number(n) => f.write_str(&quantity::to_quantity(*n)),
        }
    }
}

impl From<u64> for BlockParameter {
    fn from(n: u64) -> Self {
        Self::Number(n)
    }
}

/// Accepts a tag, a hex quantity or a decimal block number.
impl FromStr for BlockParameter {
    type Err = QuantityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "earliest" => Ok(Self::Earliest),
            "latest" => Ok(Self::Latest),
            "pending" => Ok(Self::Pending),
            "safe" => Ok(Self::Safe),
            "finalized" => Ok(Self::Finalized),
            s if s.starts_with("0x") || s.starts_with("0X") => quantity::parse_u64(s).map(Self::Number),
            s => s
                .parse()
                .map(Self::Number)
                .map_err(|_| QuantityError::InvalidDigit(s.to_string())),
        }
    }
}

impl Serialize for BlockParameter {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for BlockParameter {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ─── Requests ─────────────────────────────────────────────────────────────────

/// Transaction fields for `eth_call`, `eth_estimateGas` and signing.
///
/// Unset fields are omitted on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    /// `None` for contract creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "opt_u64_hex")]
    pub gas: Option<u64>,
    /// Legacy gas price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "opt_u64_hex")]
    pub nonce: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "opt_u64_hex")]
    pub chain_id: Option<u64>,
}

impl TxParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    pub fn to(mut self, to: Address) -> Self {
        self.to = Some(to);
        self
    }

    pub fn data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn value(mut self, value: U256) -> Self {
        self.value = Some(value);
        self
    }

    pub fn gas(mut self, gas: u64) -> Self {
        self.gas = Some(gas);
        self
    }

    pub fn gas_price(mut self, gas_price: U256) -> Self {
        self.gas_price = Some(gas_price);
        self
    }

    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    /// Returns `true` if EIP-1559 fee fields are set.
    pub fn uses_dynamic_fee(&self) -> bool {
        self.max_fee_per_gas.is_some() || self.max_priority_fee_per_gas.is_some()
    }
}

/// Per-account state replacement for `eth_call` (geth extension).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "opt_u64_hex")]
    pub nonce: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<Bytes>,
    /// Replaces the whole storage of the account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<BTreeMap<B256, B256>>,
    /// Replaces individual storage slots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_diff: Option<BTreeMap<B256, B256>>,
}

/// State overrides keyed by account.
pub type StateOverride = BTreeMap<Address, AccountOverride>;

/// One address or any of several.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AddressFilter {
    Single(Address),
    Any(Vec<Address>),
}

impl From<Address> for AddressFilter {
    fn from(a: Address) -> Self {
        Self::Single(a)
    }
}

impl From<Vec<Address>> for AddressFilter {
    fn from(v: Vec<Address>) -> Self {
        Self::Any(v)
    }
}

/// One topic or any of several, for a single topic position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TopicFilter {
    Single(B256),
    Any(Vec<B256>),
}

impl From<B256> for TopicFilter {
    fn from(t: B256) -> Self {
        Self::Single(t)
    }
}

/// Topic positions; `None` matches anything at that position.
pub type TopicsFilter = Vec<Option<TopicFilter>>;

/// Log query for `eth_getLogs` and `eth_newFilter`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_block: Option<BlockParameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_block: Option<BlockParameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<AddressFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topics: Option<TopicsFilter>,
    /// Exclusive with the block range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<B256>,
}

impl LogFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_block(mut self, block: impl Into<BlockParameter>) -> Self {
        self.from_block = Some(block.into());
        self
    }

    pub fn to_block(mut self, block: impl Into<BlockParameter>) -> Self {
        self.to_block = Some(block.into());
        self
    }

    pub fn address(mut self, address: impl Into<AddressFilter>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn topics(mut self, topics: TopicsFilter) -> Self {
        self.topics = Some(topics);
        self
    }

    pub fn block_hash(mut self, hash: B256) -> Self {
        self.block_hash = Some(hash);
        self
    }
}

/// Identifier of a node-side filter, kept exactly as the node issued it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterId(pub String);

impl fmt::Display for FilterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Left-pad an address into a 32-byte log topic.
pub fn address_topic(address: Address) -> B256 {
    address.into_word()
}

// ─── Responses ────────────────────────────────────────────────────────────────

/// A transaction as returned by `eth_getTransactionByHash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxData {
    /// `None` while pending.
    pub block_hash: Option<B256>,
    #[serde(default, with = "opt_u64_hex")]
    pub block_number: Option<u64>,
    pub from: Address,
    #[serde(with = "u64_hex")]
    pub gas: u64,
    #[serde(default)]
    pub gas_price: Option<U256>,
    pub hash: B256,
    pub input: Bytes,
    #[serde(with = "u64_hex")]
    pub nonce: u64,
    /// `None` for contract creation.
    pub to: Option<Address>,
    #[serde(default, with = "opt_u64_hex")]
    pub transaction_index: Option<u64>,
    pub value: U256,
    pub v: U256,
    pub r: U256,
    pub s: U256,
}

/// A log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogData {
    #[serde(default)]
    pub removed: bool,
    #[serde(with = "u64_hex")]
    pub log_index: u64,
    #[serde(with = "u64_hex")]
    pub transaction_index: u64,
    pub transaction_hash: B256,
    pub block_hash: B256,
    #[serde(with = "u64_hex")]
    pub block_number: u64,
    pub address: Address,
    pub data: Bytes,
    pub topics: Vec<B256>,
}

/// A receipt as returned by `eth_getTransactionReceipt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub transaction_hash: B256,
    #[serde(with = "u64_hex")]
    pub transaction_index: u64,
    pub block_hash: B256,
    #[serde(with = "u64_hex")]
    pub block_number: u64,
    pub from: Address,
    pub to: Option<Address>,
    #[serde(with = "u64_hex")]
    pub cumulative_gas_used: u64,
    #[serde(with = "u64_hex")]
    pub gas_used: u64,
    pub contract_address: Option<Address>,
    pub logs: Vec<LogData>,
    pub logs_bloom: Bytes,
    /// 1 on success, 0 on failure. Absent before Byzantium.
    #[serde(default, with = "opt_u64_hex")]
    pub status: Option<u64>,
    #[serde(default)]
    pub effective_gas_price: Option<U256>,
}

impl TxReceipt {
    pub fn is_success(&self) -> bool {
        self.status == Some(1)
    }
}

/// A block; `T` is `B256` for hash-only blocks or [`TxData`] for full ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block<T> {
    #[serde(with = "u64_hex")]
    pub number: u64,
    pub hash: B256,
    pub parent_hash: B256,
    #[serde(default)]
    pub nonce: Option<B64>,
    pub sha3_uncles: B256,
    #[serde(default)]
    pub logs_bloom: Option<Bytes>,
    pub transactions_root: B256,
    pub state_root: B256,
    pub receipts_root: B256,
    pub miner: Address,
    pub difficulty: U256,
    #[serde(default)]
    pub total_difficulty: Option<U256>,
    pub extra_data: Bytes,
    #[serde(with = "u64_hex")]
    pub size: u64,
    #[serde(with = "u64_hex")]
    pub gas_limit: u64,
    #[serde(with = "u64_hex")]
    pub gas_used: u64,
    #[serde(with = "u64_hex")]
    pub timestamp: u64,
    #[serde(default)]
    pub base_fee_per_gas: Option<U256>,
    pub transactions: Vec<T>,
    #[serde(default)]
    pub uncles: Vec<B256>,
}

/// A header pushed by a `newHeads` subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHead {
    #[serde(with = "u64_hex")]
    pub number: u64,
    pub hash: B256,
    pub parent_hash: B256,
    #[serde(default)]
    pub nonce: Option<B64>,
    pub sha3_uncles: B256,
    #[serde(default)]
    pub logs_bloom: Option<Bytes>,
    pub transactions_root: B256,
    pub state_root: B256,
    pub receipts_root: B256,
    pub miner: Address,
    pub difficulty: U256,
    pub extra_data: Bytes,
    #[serde(with = "u64_hex")]
    pub gas_limit: u64,
    #[serde(with = "u64_hex")]
    pub gas_used: u64,
    #[serde(with = "u64_hex")]
    pub timestamp: u64,
    #[serde(default)]
    pub base_fee_per_gas: Option<U256>,
}

/// Result of `eth_getFilterChanges`: logs for log filters, hashes for block
/// and pending-transaction filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterChanges {
    Logs(Vec<LogData>),
    Hashes(Vec<B256>),
}

impl FilterChanges {
    pub fn len(&self) -> usize {
        match self {
            Self::Logs(l) => l.len(),
            Self::Hashes(h) => h.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_log() -> Value {
        json!({
            "address": "0x547a355e70cd1f8caf531b950905af751dbef5e6",
            "blockHash": "0xbe8888feb5f2924967b40cd024d2e88138b6c096371abe4f9a739b742eaf0674",
            "blockNumber": "0x93e02f",
            "data": "0x0000000000000000000000000000000000000000006c97c7265005587d9adae300000000000000000000000000000000000000000000013495768fe4bbc0f1ef",
            "logIndex": "0x4",
            "removed": false,
            "topics": ["0x1c411e9a96e071241c2f21f7726b17ae89e3cab4c78be50e062b03a9fffbbad1"],
            "transactionHash": "0xcf804a5b1b45e29d4ddfa6edb16381ce07d9de1044e9d6d62a1737d6c9565abf",
            "transactionIndex": "0x0",
        })
    }

    #[test]
    fn checksum_address_round_trip() {
        let checksummed = "0x18C2ccD3e937bb5b1560A6f70DE9bDB1340D849d";
        let addr: Address = checksummed.to_lowercase().parse().unwrap();
        assert_eq!(addr.to_checksum(None), checksummed);
        assert!(Address::parse_checksummed(&checksummed[..checksummed.len() - 1], None).is_err());
    }

    #[test]
    fn address_topic_is_left_padded() {
        let addr: Address = "0x18c2ccd3e937bb5b1560a6f70de9bdb1340d849d".parse().unwrap();
        assert_eq!(
            address_topic(addr).to_string(),
            "0x00000000000000000000000018c2ccd3e937bb5b1560a6f70de9bdb1340d849d"
        );
    }

    #[test]
    fn block_parameter_forms() {
        assert_eq!(BlockParameter::default().to_value(), json!("latest"));
        assert_eq!(BlockParameter::Number(6_139_707).to_value(), json!("0x5daf3b"));
        assert_eq!("finalized".parse::<BlockParameter>().unwrap(), BlockParameter::Finalized);
        assert_eq!("0x10".parse::<BlockParameter>().unwrap(), BlockParameter::Number(16));
        assert_eq!("16".parse::<BlockParameter>().unwrap(), BlockParameter::Number(16));
        assert!("earlist".parse::<BlockParameter>().is_err());
    }

    #[test]
    fn log_data_parses() {
        let log: LogData = serde_json::from_value(sample_log()).unwrap();
        assert_eq!(log.block_number, 0x93e02f);
        assert_eq!(log.log_index, 4);
        assert_eq!(
            log.address,
            "0x547a355e70cd1f8caf531b950905af751dbef5e6".parse::<Address>().unwrap()
        );
        assert_eq!(log.data.len(), 64);
    }

    #[test]
    fn tx_data_parses_quantities() {
        let tx: TxData = serde_json::from_value(json!({
            "blockHash": "0x1d59ff54b1eb26b013ce3cb5fc9dab3705b415a67127a003c3e61eb445bb8df2",
            "blockNumber": "0x5daf3b",
            "from": "0xa7d9ddbe1f17865597fbd27ec712455208b6b76d",
            "gas": "0xc350",
            "gasPrice": "0x4a817c800",
            "hash": "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b",
            "input": "0x68656c6c6f21",
            "nonce": "0x15",
            "to": "0xf02c1c8e6114b1dbe8937a39260b5b0a374432bb",
            "transactionIndex": "0x41",
            "value": "0xf3dbb76162000",
            "v": "0x25",
            "r": "0x1b5e176d927f8e9ab405058b2d2457392da3e20f328b16ddabcebc33eaac5fea",
            "s": "0x4ba69724e8f69de52f0125ad8b3c5c2cef33019bac3249e2c0a2192766d1721c",
        }))
        .unwrap();
        assert_eq!(tx.block_number, Some(6_139_707));
        assert_eq!(tx.gas, 50_000);
        assert_eq!(tx.gas_price, Some(U256::from(20_000_000_000u64)));
        assert_eq!(tx.nonce, 21);
        assert_eq!(tx.value, U256::from(4_290_000_000_000_000u64));
        assert_eq!(tx.transaction_index, Some(65));
        assert_eq!(tx.v, U256::from(37));
        assert_eq!(tx.input.as_ref(), b"hello!");
    }

    #[test]
    fn pending_tx_has_no_block() {
        let tx: TxData = serde_json::from_value(json!({
            "blockHash": null,
            "blockNumber": null,
            "from": "0xa7d9ddbe1f17865597fbd27ec712455208b6b76d",
            "gas": "0x5208",
            "hash": "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b",
            "input": "0x",
            "nonce": "0x0",
            "to": null,
            "transactionIndex": null,
            "value": "0x0",
            "v": "0x0",
            "r": "0x0",
            "s": "0x0",
        }))
        .unwrap();
        assert!(tx.block_hash.is_none());
        assert!(tx.block_number.is_none());
        assert!(tx.to.is_none());
    }

    #[test]
    fn receipt_parses_with_logs() {
        let receipt: TxReceipt = serde_json::from_value(json!({
            "blockHash": "0xc7316bf1631a01df297ac8540f0ec159593bb856a52b289290313cdce679b1a9",
            "blockNumber": "0xa8b319",
            "contractAddress": null,
            "cumulativeGasUsed": "0xa09c7",
            "from": "0xeba0de32fddb36751a83ac4a10ab0fa9a6f339ce",
            "gasUsed": "0x5208",
            "logs": [sample_log()],
            "logsBloom": format!("0x{}", "00".repeat(256)),
            "status": "0x1",
            "to": "0x0678aa21a3485eed7e9bdfb802d620ea8efff860",
            "transactionHash": "0xdecc513528b35a17dd76b7f776f7977a8a5c93f67ee89dd9c77936591c636908",
            "transactionIndex": "0x4",
            "type": "0x0",
        }))
        .unwrap();
        assert!(receipt.is_success());
        assert_eq!(receipt.gas_used, 21_000);
        assert_eq!(receipt.logs.len(), 1);
        assert_eq!(receipt.logs_bloom.len(), 256);
        assert!(receipt.contract_address.is_none());
    }

    #[test]
    fn malformed_quantity_is_rejected() {
        let mut log = sample_log();
        log["blockNumber"] = json!("93e02f");
        assert!(serde_json::from_value::<LogData>(log).is_err());
    }

    #[test]
    fn tx_params_omit_unset_fields() {
        let to: Address = "0xf02c1c8e6114b1dbe8937a39260b5b0a374432bb".parse().unwrap();
        let params = TxParams::new().to(to).gas(90_000).data(vec![0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(
            serde_json::to_value(&params).unwrap(),
            json!({
                "to": "0xf02c1c8e6114b1dbe8937a39260b5b0a374432bb",
                "gas": "0x15f90",
                "data": "0xa9059cbb",
            })
        );
    }

    #[test]
    fn log_filter_wire_shape() {
        let token: Address = "0x547a355e70cd1f8caf531b950905af751dbef5e6".parse().unwrap();
        let filter = LogFilter::new()
            .from_block(100u64)
            .to_block(BlockParameter::Latest)
            .address(token)
            .topics(vec![Some(TopicFilter::Single(B256::ZERO)), None]);
        let wire = serde_json::to_value(&filter).unwrap();
        assert_eq!(wire["fromBlock"], "0x64");
        assert_eq!(wire["toBlock"], "latest");
        assert_eq!(wire["address"], "0x547a355e70cd1f8caf531b950905af751dbef5e6");
        assert_eq!(wire["topics"][1], Value::Null);
        assert!(wire.get("blockHash").is_none());
    }

    #[test]
    fn filter_changes_variants() {
        let hashes: FilterChanges = serde_json::from_value(json!([
            "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b"
        ]))
        .unwrap();
        assert!(matches!(hashes, FilterChanges::Hashes(ref h) if h.len() == 1));

        let logs: FilterChanges = serde_json::from_value(json!([sample_log()])).unwrap();
        assert!(matches!(logs, FilterChanges::Logs(_)));
    }
}
