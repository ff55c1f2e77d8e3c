use ethwire_core::error::{ClientError, TransportError};
use ethwire_core::quantity::QuantityError;
use ethwire_core::ConnectionLost;
use thiserror::Error;

use crate::abi::AbiError;
use crate::signer::SignerError;

/// Errors returned by [`EthClient`](crate::EthClient).
#[derive(Debug, Error)]
pub enum EthError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("ABI error: {0}")]
    Abi(#[from] AbiError),

    #[error("bad quantity: {0}")]
    Quantity(#[from] QuantityError),

    #[error("signer error: {0}")]
    Signer(#[from] SignerError),

    #[error(transparent)]
    ConnectionLost(#[from] ConnectionLost),

    /// A subscription payload did not match the expected type.
    #[error("decode error: {0}")]
    Decode(String),

    /// The endpoint URL maps to no transport available on this platform.
    #[error("unsupported endpoint: {0}")]
    UnsupportedEndpoint(String),
}

impl From<TransportError> for EthError {
    fn from(e: TransportError) -> Self {
        Self::Client(e.into())
    }
}

impl EthError {
    /// Returns `true` if the node rejected the request (reverts included).
    pub fn is_execution_error(&self) -> bool {
        matches!(self, Self::Client(e) if e.is_execution_error())
    }

    /// Returns `true` if the connection is unusable.
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::Client(e) => e.is_connection_error(),
            Self::ConnectionLost(_) => true,
            _ => false,
        }
    }
}
