//! Contract ABI helpers over `alloy-dyn-abi`.
//!
//! [`MethodCall`] describes a contract function by name and parameter types
//! and turns arguments into calldata; [`EventSpec`] and [`EventParser`]
//! turn logs back into named fields.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};

use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{Address, Bytes, B256};
use thiserror::Error;
use tiny_keccak::{Hasher, Keccak};

use crate::types::{LogData, TxParams};

#[derive(Debug, Error)]
pub enum AbiError {
    #[error("invalid type {ty:?}: {reason}")]
    InvalidType { ty: String, reason: String },

    #[error("expected {expected} values, got {got}")]
    Arity { expected: usize, got: usize },

    #[error("value #{index} does not match type {ty}")]
    TypeMismatch { index: usize, ty: String },

    #[error("cannot read {input:?} as {ty}: {reason}")]
    Coerce { input: String, ty: String, reason: String },

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("{0} has no target address")]
    Unbound(String),

    #[error("log topic {found} is not {event}")]
    WrongEvent { event: String, found: String },

    #[error("{event} expects {expected} topics, log has {got}")]
    TopicCount { event: String, expected: usize, got: usize },
}

/// keccak-256 of `data`.
pub fn keccak256(data: impl AsRef<[u8]>) -> B256 {
    let mut hasher = Keccak::v256();
    let mut out = [0u8; 32];
    hasher.update(data.as_ref());
    hasher.finalize(&mut out);
    B256::from(out)
}

/// First four bytes of the keccak hash of a function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Parse Solidity type names such as `"uint256"` or `"address[]"`.
pub fn parse_types<S: AsRef<str>>(types: &[S]) -> Result<Vec<DynSolType>, AbiError> {
    types
        .iter()
        .map(|ty| {
            let ty = ty.as_ref();
            ty.parse().map_err(|e: alloy_dyn_abi::Error| AbiError::InvalidType {
                ty: ty.to_string(),
                reason: e.to_string(),
            })
        })
        .collect()
}

/// ABI-encode `values` as a parameter list of `types`.
pub fn encode(types: &[DynSolType], values: &[DynSolValue]) -> Result<Vec<u8>, AbiError> {
    if types.len() != values.len() {
        return Err(AbiError::Arity { expected: types.len(), got: values.len() });
    }
    for (index, (ty, value)) in types.iter().zip(values).enumerate() {
        if !ty.matches(value) {
            return Err(AbiError::TypeMismatch { index, ty: ty.sol_type_name().into_owned() });
        }
    }
    Ok(DynSolValue::Tuple(values.to_vec()).abi_encode_params())
}

/// Decode a parameter list of `types` from `data`.
pub fn decode(types: &[DynSolType], data: &[u8]) -> Result<Vec<DynSolValue>, AbiError> {
    let decoded = DynSolType::Tuple(types.to_vec())
        .abi_decode_params(data)
        .map_err(|e| AbiError::Decode(e.to_string()))?;
    match decoded {
        DynSolValue::Tuple(values) => Ok(values),
        other => Ok(vec![other]),
    }
}

/// Read textual arguments (`"0xabc…"`, `"1000"`, `"true"`) as values of `types`.
pub fn coerce<S: AsRef<str>>(types: &[DynSolType], inputs: &[S]) -> Result<Vec<DynSolValue>, AbiError> {
    if types.len() != inputs.len() {
        return Err(AbiError::Arity { expected: types.len(), got: inputs.len() });
    }
    types
        .iter()
        .zip(inputs)
        .map(|(ty, input)| {
            let input = input.as_ref();
            ty.coerce_str(input).map_err(|e| AbiError::Coerce {
                input: input.to_string(),
                ty: ty.sol_type_name().into_owned(),
                reason: e.to_string(),
            })
        })
        .collect()
}

fn type_list(types: &[DynSolType]) -> String {
    types
        .iter()
        .map(DynSolType::sol_type_name)
        .collect::<Vec<Cow<'_, str>>>()
        .join(",")
}

// ─── Function calls ───────────────────────────────────────────────────────────

/// A contract function: name, parameter types, return types and optionally
/// the contract it is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodCall {
    pub name: String,
    pub input_types: Vec<DynSolType>,
    pub output_types: Vec<DynSolType>,
    pub to: Option<Address>,
}

impl MethodCall {
    pub fn new(name: impl Into<String>, input_types: Vec<DynSolType>, output_types: Vec<DynSolType>) -> Self {
        Self { name: name.into(), input_types, output_types, to: None }
    }

    /// Build from Solidity type names.
    ///
    /// ```
    /// # use ethwire_eth::abi::MethodCall;
    /// let get_pair = MethodCall::parse("getPair", &["address", "address"], &["address"]).unwrap();
    /// assert_eq!(get_pair.signature(), "getPair(address,address)");
    /// ```
    pub fn parse<S: AsRef<str>>(name: &str, inputs: &[S], outputs: &[S]) -> Result<Self, AbiError> {
        Ok(Self::new(name, parse_types(inputs)?, parse_types(outputs)?))
    }

    /// A copy bound to the contract at `to`.
    pub fn bind(&self, to: Address) -> Self {
        Self { to: Some(to), ..self.clone() }
    }

    /// Canonical signature, e.g. `transfer(address,uint256)`.
    pub fn signature(&self) -> String {
        format!("{}({})", self.name, type_list(&self.input_types))
    }

    pub fn selector(&self) -> [u8; 4] {
        selector(&self.signature())
    }

    /// Selector followed by the encoded arguments.
    pub fn encode_input(&self, args: &[DynSolValue]) -> Result<Bytes, AbiError> {
        let encoded = encode(&self.input_types, args)?;
        let mut calldata = Vec::with_capacity(4 + encoded.len());
        calldata.extend_from_slice(&self.selector());
        calldata.extend_from_slice(&encoded);
        Ok(calldata.into())
    }

    pub fn decode_output(&self, data: &[u8]) -> Result<Vec<DynSolValue>, AbiError> {
        decode(&self.output_types, data)
    }

    /// Transaction fields calling this function with `args`.
    pub fn tx_params(&self, args: &[DynSolValue]) -> Result<TxParams, AbiError> {
        let mut params = TxParams::new().data(self.encode_input(args)?);
        params.to = self.to;
        Ok(params)
    }
}

// ─── Events ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventArg {
    pub name: String,
    pub ty: DynSolType,
    pub indexed: bool,
}

impl EventArg {
    pub fn indexed(name: impl Into<String>, ty: DynSolType) -> Self {
        Self { name: name.into(), ty, indexed: true }
    }

    pub fn data(name: impl Into<String>, ty: DynSolType) -> Self {
        Self { name: name.into(), ty, indexed: false }
    }
}

/// Indexed values of these types are stored as their keccak hash.
fn hashed_when_indexed(ty: &DynSolType) -> bool {
    matches!(
        ty,
        DynSolType::String
            | DynSolType::Bytes
            | DynSolType::Array(_)
            | DynSolType::FixedArray(..)
            | DynSolType::Tuple(_)
    )
}

/// An event definition that decodes matching logs into named fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSpec {
    name: String,
    args: Vec<EventArg>,
    topic: B256,
}

impl EventSpec {
    pub fn new(name: impl Into<String>, args: Vec<EventArg>) -> Self {
        let name = name.into();
        let types: Vec<DynSolType> = args.iter().map(|a| a.ty.clone()).collect();
        let topic = keccak256(format!("{name}({})", type_list(&types)));
        Self { name, args, topic }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[EventArg] {
        &self.args
    }

    pub fn signature(&self) -> String {
        let types: Vec<DynSolType> = self.args.iter().map(|a| a.ty.clone()).collect();
        format!("{}({})", self.name, type_list(&types))
    }

    /// The signature hash, carried as `topics[0]` of every matching log.
    pub fn topic(&self) -> B256 {
        self.topic
    }

    pub fn indexed_count(&self) -> usize {
        self.args.iter().filter(|a| a.indexed).count()
    }

    /// Decode `log` into its named fields.
    ///
    /// Indexed strings, byte strings, arrays and tuples come back as the
    /// 32-byte hash the log carries.
    pub fn parse_log(&self, log: &LogData) -> Result<BTreeMap<String, DynSolValue>, AbiError> {
        match log.topics.first() {
            Some(t) if *t == self.topic => {}
            found => {
                return Err(AbiError::WrongEvent {
                    event: self.signature(),
                    found: found.map_or_else(|| "none".to_string(), ToString::to_string),
                })
            }
        }
        let expected = self.indexed_count() + 1;
        if log.topics.len() != expected {
            return Err(AbiError::TopicCount {
                event: self.signature(),
                expected,
                got: log.topics.len(),
            });
        }

        let mut fields = BTreeMap::new();
        let indexed = self.args.iter().filter(|a| a.indexed);
        for (arg, topic) in indexed.zip(&log.topics[1..]) {
            let value = if hashed_when_indexed(&arg.ty) {
                DynSolValue::FixedBytes(*topic, 32)
            } else {
                arg.ty
                    .abi_decode(topic.as_slice())
                    .map_err(|e| AbiError::Decode(format!("{}: {e}", arg.name)))?
            };
            fields.insert(arg.name.clone(), value);
        }

        let (names, types): (Vec<&str>, Vec<DynSolType>) = self
            .args
            .iter()
            .filter(|a| !a.indexed)
            .map(|a| (a.name.as_str(), a.ty.clone()))
            .unzip();
        let values = decode(&types, &log.data)?;
        fields.extend(names.into_iter().map(str::to_string).zip(values));
        Ok(fields)
    }
}

/// A log decoded by an [`EventParser`].
#[derive(Debug, Clone)]
pub struct ParsedEvent<'a> {
    pub spec: &'a EventSpec,
    pub fields: BTreeMap<String, DynSolValue>,
    pub log: &'a LogData,
}

/// Decodes logs of several event kinds, keyed by signature topic.
#[derive(Debug, Clone, Default)]
pub struct EventParser {
    specs: HashMap<B256, EventSpec>,
}

impl EventParser {
    pub fn new(specs: impl IntoIterator<Item = EventSpec>) -> Self {
        Self { specs: specs.into_iter().map(|s| (s.topic(), s)).collect() }
    }

    pub fn topics(&self) -> Vec<B256> {
        self.specs.keys().copied().collect()
    }

    /// Decode `log` if its signature topic and topic count match a known
    /// event; `None` otherwise.
    pub fn parse_log<'a>(&'a self, log: &'a LogData) -> Option<Result<ParsedEvent<'a>, AbiError>> {
        let spec = self.specs.get(log.topics.first()?)?;
        if spec.indexed_count() + 1 != log.topics.len() {
            tracing::debug!(event = %spec.name(), topics = log.topics.len(), "skipping log with unexpected topic count");
            return None;
        }
        Some(spec.parse_log(log).map(|fields| ParsedEvent { spec, fields, log }))
    }

    /// Decode every recognised log in `logs`, skipping the rest.
    pub fn parse_logs<'a>(
        &'a self,
        logs: &'a [LogData],
    ) -> impl Iterator<Item = Result<ParsedEvent<'a>, AbiError>> + 'a {
        logs.iter().filter_map(move |log| self.parse_log(log))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{erc20, uniswap_v2};
    use crate::types::address_topic;
    use alloy_primitives::U256;

    fn addr(s: &str) -> Address {
        s.parse().unwrap()
    }

    fn log(topics: Vec<B256>, data: Vec<u8>) -> LogData {
        LogData {
            removed: false,
            log_index: 0,
            transaction_index: 0,
            transaction_hash: B256::ZERO,
            block_hash: B256::ZERO,
            block_number: 1,
            address: Address::ZERO,
            data: data.into(),
            topics,
        }
    }

    #[test]
    fn transfer_selector_and_topic() {
        assert_eq!(hex::encode(erc20::transfer().selector()), "a9059cbb");
        assert_eq!(
            erc20::transfer_event().topic().to_string(),
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
        assert_eq!(erc20::transfer_event().signature(), "Transfer(address,address,uint256)");
    }

    #[test]
    fn encode_transfer_calldata() {
        let to = addr("0x18c2ccd3e937bb5b1560a6f70de9bdb1340d849d");
        let data = erc20::transfer()
            .encode_input(&[DynSolValue::Address(to), DynSolValue::Uint(U256::from(1000u64), 256)])
            .unwrap();
        assert_eq!(data.len(), 4 + 64);
        assert_eq!(&data[..4], &[0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(&data[16..36], to.as_slice());
        assert_eq!(data[67], 0xe8);
        assert_eq!(data[66], 0x03);
    }

    #[test]
    fn encode_rejects_wrong_arity_and_type() {
        let transfer = erc20::transfer();
        assert!(matches!(
            transfer.encode_input(&[DynSolValue::Bool(true)]),
            Err(AbiError::Arity { expected: 2, got: 1 })
        ));
        assert!(matches!(
            transfer.encode_input(&[DynSolValue::Bool(true), DynSolValue::Uint(U256::ZERO, 256)]),
            Err(AbiError::TypeMismatch { index: 0, .. })
        ));
    }

    #[test]
    fn dynamic_values_survive_encode_decode() {
        let types = parse_types(&["string", "address[]", "uint8"]).unwrap();
        let values = vec![
            DynSolValue::String("WETH".into()),
            DynSolValue::Array(vec![DynSolValue::Address(Address::ZERO)]),
            DynSolValue::Uint(U256::from(18u8), 8),
        ];
        let encoded = encode(&types, &values).unwrap();
        assert_eq!(decode(&types, &encoded).unwrap(), values);
    }

    #[test]
    fn decode_output_of_truncated_data_fails() {
        let decimals = erc20::decimals();
        assert!(matches!(decimals.decode_output(&[0u8; 16]), Err(AbiError::Decode(_))));
    }

    #[test]
    fn coerce_text_arguments() {
        let types = parse_types(&["address", "uint256", "bool"]).unwrap();
        let values = coerce(&types, &["0x18c2ccd3e937bb5b1560a6f70de9bdb1340d849d", "1000", "true"]).unwrap();
        assert_eq!(values[0], DynSolValue::Address(addr("0x18c2ccd3e937bb5b1560a6f70de9bdb1340d849d")));
        assert_eq!(values[1], DynSolValue::Uint(U256::from(1000u64), 256));
        assert_eq!(values[2], DynSolValue::Bool(true));

        assert!(matches!(coerce(&types[..1], &["nope"]), Err(AbiError::Coerce { .. })));
        assert!(matches!(parse_types(&["uint7"]), Err(AbiError::InvalidType { .. })));
    }

    #[test]
    fn bound_call_targets_contract() {
        let token = addr("0x547a355e70cd1f8caf531b950905af751dbef5e6");
        let params = erc20::total_supply().bind(token).tx_params(&[]).unwrap();
        assert_eq!(params.to, Some(token));
        assert_eq!(params.data.unwrap().len(), 4);
    }

    #[test]
    fn parse_swap_log() {
        let sender = addr("0x7a250d5630b4cf539739df2c5dacb4c659f2488d");
        let to = addr("0x18c2ccd3e937bb5b1560a6f70de9bdb1340d849d");
        let amounts = [0u64, 5_000, 1_234, 0];
        let data = encode(
            &vec![DynSolType::Uint(256); 4],
            &amounts.map(|a| DynSolValue::Uint(U256::from(a), 256)),
        )
        .unwrap();
        let swap = uniswap_v2::swap_event();
        let entry = log(vec![swap.topic(), address_topic(sender), address_topic(to)], data);

        let fields = swap.parse_log(&entry).unwrap();
        assert_eq!(fields["sender"], DynSolValue::Address(sender));
        assert_eq!(fields["to"], DynSolValue::Address(to));
        assert_eq!(fields["amount1In"], DynSolValue::Uint(U256::from(5_000u64), 256));
        assert_eq!(fields["amount0Out"], DynSolValue::Uint(U256::from(1_234u64), 256));
        assert_eq!(fields.len(), 6);
    }

    #[test]
    fn indexed_string_is_a_hash() {
        let spec = EventSpec::new(
            "Named",
            vec![EventArg::indexed("name", DynSolType::String), EventArg::data("n", DynSolType::Uint(256))],
        );
        let hash = keccak256("alice");
        let entry = log(
            vec![spec.topic(), hash],
            encode(&[DynSolType::Uint(256)], &[DynSolValue::Uint(U256::from(7u8), 256)]).unwrap(),
        );
        let fields = spec.parse_log(&entry).unwrap();
        assert_eq!(fields["name"], DynSolValue::FixedBytes(hash, 32));
    }

    #[test]
    fn parse_log_checks_topics() {
        let transfer = erc20::transfer_event();
        let wrong = log(vec![uniswap_v2::sync_event().topic()], vec![]);
        assert!(matches!(transfer.parse_log(&wrong), Err(AbiError::WrongEvent { .. })));

        let short = log(vec![transfer.topic()], vec![0u8; 32]);
        assert!(matches!(
            transfer.parse_log(&short),
            Err(AbiError::TopicCount { expected: 3, got: 1, .. })
        ));
    }

    #[test]
    fn parser_skips_unknown_and_mismatched_logs() {
        let parser = EventParser::new([erc20::transfer_event(), uniswap_v2::sync_event()]);
        let reserves = encode(
            &[DynSolType::Uint(112), DynSolType::Uint(112)],
            &[DynSolValue::Uint(U256::from(10u8), 112), DynSolValue::Uint(U256::from(20u8), 112)],
        )
        .unwrap();
        let logs = vec![
            log(vec![], vec![]),
            log(vec![B256::repeat_byte(0x11)], vec![]),
            log(vec![erc20::transfer_event().topic()], vec![]),
            log(vec![uniswap_v2::sync_event().topic()], reserves),
        ];

        let parsed: Vec<_> = parser.parse_logs(&logs).collect::<Result<_, _>>().unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].spec.name(), "Sync");
        assert_eq!(parsed[0].fields["reserve1"], DynSolValue::Uint(U256::from(20u8), 112));
        assert_eq!(parser.topics().len(), 2);
    }
}
