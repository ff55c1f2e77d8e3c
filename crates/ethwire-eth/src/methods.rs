//! JSON-RPC method names used by [`EthClient`](crate::EthClient).

pub const WEB3_CLIENT_VERSION: &str = "web3_clientVersion";

pub const ETH_CHAIN_ID: &str = "eth_chainId";
pub const ETH_ACCOUNTS: &str = "eth_accounts";
pub const ETH_BLOCK_NUMBER: &str = "eth_blockNumber";
pub const ETH_GAS_PRICE: &str = "eth_gasPrice";

pub const ETH_GET_BALANCE: &str = "eth_getBalance";
pub const ETH_GET_STORAGE_AT: &str = "eth_getStorageAt";
pub const ETH_GET_BLOCK_BY_HASH: &str = "eth_getBlockByHash";
pub const ETH_GET_BLOCK_BY_NUMBER: &str = "eth_getBlockByNumber";
pub const ETH_GET_TRANSACTION_COUNT: &str = "eth_getTransactionCount";
pub const ETH_GET_TRANSACTION_RECEIPT: &str = "eth_getTransactionReceipt";
pub const ETH_GET_TRANSACTION_BY_HASH: &str = "eth_getTransactionByHash";
pub const ETH_GET_RAW_TRANSACTION_BY_HASH: &str = "eth_getRawTransactionByHash";

pub const ETH_CALL: &str = "eth_call";
pub const ETH_ESTIMATE_GAS: &str = "eth_estimateGas";
pub const ETH_GET_CODE: &str = "eth_getCode";
pub const ETH_SEND_RAW_TRANSACTION: &str = "eth_sendRawTransaction";

pub const ETH_SUBSCRIBE: &str = "eth_subscribe";
pub const ETH_UNSUBSCRIBE: &str = "eth_unsubscribe";

pub const ETH_NEW_FILTER: &str = "eth_newFilter";
pub const ETH_NEW_BLOCK_FILTER: &str = "eth_newBlockFilter";
pub const ETH_NEW_PENDING_TRANSACTION_FILTER: &str = "eth_newPendingTransactionFilter";
pub const ETH_UNINSTALL_FILTER: &str = "eth_uninstallFilter";
pub const ETH_GET_FILTER_LOGS: &str = "eth_getFilterLogs";
pub const ETH_GET_FILTER_CHANGES: &str = "eth_getFilterChanges";
pub const ETH_GET_LOGS: &str = "eth_getLogs";

/// `eth_subscribe` subscription kinds.
pub mod kinds {
    pub const NEW_HEADS: &str = "newHeads";
    pub const LOGS: &str = "logs";
    pub const NEW_PENDING_TRANSACTIONS: &str = "newPendingTransactions";
    pub const SYNCING: &str = "syncing";
}
