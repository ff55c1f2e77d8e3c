//! Hex-encoded quantities (`"0x1b4"`) as used throughout the Ethereum JSON-RPC API.
//!
//! Decoding is strict: a missing `0x` prefix, an empty digit string, a
//! non-hex character or a value that does not fit the target type is an
//! error, never a silent truncation.

use thiserror::Error;

/// A quantity string that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("quantity {0:?} is missing the 0x prefix")]
    MissingPrefix(String),

    #[error("quantity {0:?} has no digits")]
    Empty(String),

    #[error("quantity {0:?} contains a non-hex character")]
    InvalidDigit(String),

    #[error("quantity {input:?} overflows {bits} bits")]
    Overflow { input: String, bits: u32 },
}

fn digits(input: &str) -> Result<&str, QuantityError> {
    let digits = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .ok_or_else(|| QuantityError::MissingPrefix(input.to_string()))?;
    if digits.is_empty() {
        return Err(QuantityError::Empty(input.to_string()));
    }
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(QuantityError::InvalidDigit(input.to_string()));
    }
    Ok(digits)
}

/// Decode a quantity into a `u64`.
pub fn parse_u64(input: &str) -> Result<u64, QuantityError> {
    let digits = digits(input)?;
    u64::from_str_radix(digits, 16).map_err(|_| QuantityError::Overflow {
        input: input.to_string(),
        bits: 64,
    })
}

/// Decode a quantity into a `u128`.
pub fn parse_u128(input: &str) -> Result<u128, QuantityError> {
    let digits = digits(input)?;
    u128::from_str_radix(digits, 16).map_err(|_| QuantityError::Overflow {
        input: input.to_string(),
        bits: 128,
    })
}

/// Encode a `u64` as a quantity.
pub fn to_quantity(n: u64) -> String {
    format!("{n:#x}")
}

/// Serde adapter for `u64` fields carried as hex quantities.
///
/// Plain JSON numbers are accepted on input as well; some nodes emit them
/// for small fields.
pub mod u64_hex {
    use serde::de::{self, Deserializer, Visitor};
    use serde::Serializer;

    pub fn serialize<S: Serializer>(n: &u64, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::to_quantity(*n))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        d.deserialize_any(QuantityVisitor)
    }

    struct QuantityVisitor;

    impl<'de> Visitor<'de> for QuantityVisitor {
        type Value = u64;

        fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("a hex quantity string")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<u64, E> {
            super::parse_u64(v).map_err(E::custom)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<u64, E> {
            Ok(v)
        }
    }
}

/// Serde adapter for `Option<u64>` quantities (`null` → `None`).
pub mod opt_u64_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(n: &Option<u64>, s: S) -> Result<S::Ok, S::Error> {
        match n {
            Some(n) => s.serialize_str(&super::to_quantity(*n)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
        #[derive(Deserialize)]
        struct Wrapped(#[serde(with = "super::u64_hex")] u64);

        Ok(Option::<Wrapped>::deserialize(d)?.map(|Wrapped(n)| n))
    }
}
