//! ethwire-eth: typed Ethereum JSON-RPC on top of `ethwire-core`.
//!
//! [`EthClient`] picks a transport from the endpoint URL and exposes the
//! `eth_*` namespace with strongly typed parameters and results. The [`abi`]
//! module encodes contract calls and decodes event logs; [`contracts`] has
//! ready-made definitions for ERC-20 and Uniswap V2.
//!
//! # Quick start
//! ```rust,no_run
//! use ethwire_eth::{contracts::erc20, BlockParameter, EthClient};
//! use alloy_dyn_abi::DynSolValue;
//!
//! # async fn demo() -> Result<(), ethwire_eth::EthError> {
//! let eth = EthClient::connect("http://127.0.0.1:8545").await?;
//! let token = "0x547a355e70cd1f8caf531b950905af751dbef5e6".parse().unwrap();
//! let holder = "0x18c2ccd3e937bb5b1560a6f70de9bdb1340d849d".parse().unwrap();
//! let balance = eth
//!     .call_method(&erc20::balance_of().bind(token), &[DynSolValue::Address(holder)], BlockParameter::Latest)
//!     .await?;
//! println!("{balance:?}");
//! # Ok(())
//! # }
//! ```

pub mod abi;
pub mod client;
pub mod contracts;
pub mod error;
pub mod methods;
pub mod signer;
pub mod subscription;
pub mod types;

pub use client::{transport_for, EthClient};
pub use error::EthError;
pub use signer::{SignerError, TransactionSigner};
pub use subscription::TypedSubscription;
pub use types::{
    address_topic, AccountOverride, AddressFilter, Block, BlockParameter, FilterChanges, FilterId,
    LogData, LogFilter, NewHead, StateOverride, TopicFilter, TopicsFilter, TxData, TxParams,
    TxReceipt,
};
