//! The seam between the client and whatever holds the keys.

use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use thiserror::Error;

use crate::types::TxParams;

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("transaction is missing {0}")]
    MissingField(&'static str),

    #[error("signing failed: {0}")]
    Signing(String),
}

/// Signs fully populated transactions.
///
/// [`EthClient::send_transaction`](crate::EthClient::send_transaction) fills
/// `from`, `chainId`, `gas`, the fee fields and `nonce` before calling
/// [`sign_transaction`](Self::sign_transaction), so implementations only
/// serialize and sign.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    /// The account this signer signs for.
    fn address(&self) -> Address;

    /// Return the raw signed transaction, ready for `eth_sendRawTransaction`.
    async fn sign_transaction(&self, tx: &TxParams) -> Result<Bytes, SignerError>;
}
