//! Definitions for widely deployed contracts.

/// ERC-20 token interface.
pub mod erc20 {
    use alloy_dyn_abi::DynSolType::{Address, Bool, String, Uint};

    use crate::abi::{EventArg, EventSpec, MethodCall};

    pub fn name() -> MethodCall {
        MethodCall::new("name", vec![], vec![String])
    }

    pub fn symbol() -> MethodCall {
        MethodCall::new("symbol", vec![], vec![String])
    }

    pub fn decimals() -> MethodCall {
        MethodCall::new("decimals", vec![], vec![Uint(8)])
    }

    pub fn total_supply() -> MethodCall {
        MethodCall::new("totalSupply", vec![], vec![Uint(256)])
    }

    pub fn balance_of() -> MethodCall {
        MethodCall::new("balanceOf", vec![Address], vec![Uint(256)])
    }

    pub fn transfer() -> MethodCall {
        MethodCall::new("transfer", vec![Address, Uint(256)], vec![Bool])
    }

    pub fn allowance() -> MethodCall {
        MethodCall::new("allowance", vec![Address, Address], vec![Uint(256)])
    }

    pub fn approve() -> MethodCall {
        MethodCall::new("approve", vec![Address, Uint(256)], vec![Bool])
    }

    pub fn transfer_from() -> MethodCall {
        MethodCall::new("transferFrom", vec![Address, Address, Uint(256)], vec![Bool])
    }

    /// `Transfer(address indexed from, address indexed to, uint256 value)`
    pub fn transfer_event() -> EventSpec {
        EventSpec::new(
            "Transfer",
            vec![
                EventArg::indexed("from", Address),
                EventArg::indexed("to", Address),
                EventArg::data("value", Uint(256)),
            ],
        )
    }

    /// `Approval(address indexed owner, address indexed spender, uint256 value)`
    pub fn approval_event() -> EventSpec {
        EventSpec::new(
            "Approval",
            vec![
                EventArg::indexed("owner", Address),
                EventArg::indexed("spender", Address),
                EventArg::data("value", Uint(256)),
            ],
        )
    }
}

/// Uniswap V2 pair, factory and router. Pairs are also ERC-20 tokens.
pub mod uniswap_v2 {
    use alloy_dyn_abi::DynSolType::{self, Address, Uint};

    use crate::abi::{EventArg, EventSpec, MethodCall};

    fn addresses() -> DynSolType {
        DynSolType::Array(Box::new(Address))
    }

    fn amounts() -> DynSolType {
        DynSolType::Array(Box::new(Uint(256)))
    }

    pub fn factory() -> MethodCall {
        MethodCall::new("factory", vec![], vec![Address])
    }

    pub fn token0() -> MethodCall {
        MethodCall::new("token0", vec![], vec![Address])
    }

    pub fn token1() -> MethodCall {
        MethodCall::new("token1", vec![], vec![Address])
    }

    /// Returns `(reserve0, reserve1, blockTimestampLast)`.
    pub fn get_reserves() -> MethodCall {
        MethodCall::new("getReserves", vec![], vec![Uint(112), Uint(112), Uint(32)])
    }

    pub fn sync_event() -> EventSpec {
        EventSpec::new(
            "Sync",
            vec![EventArg::data("reserve0", Uint(112)), EventArg::data("reserve1", Uint(112))],
        )
    }

    pub fn swap_event() -> EventSpec {
        EventSpec::new(
            "Swap",
            vec![
                EventArg::indexed("sender", Address),
                EventArg::data("amount0In", Uint(256)),
                EventArg::data("amount1In", Uint(256)),
                EventArg::data("amount0Out", Uint(256)),
                EventArg::data("amount1Out", Uint(256)),
                EventArg::indexed("to", Address),
            ],
        )
    }

    pub fn get_pair() -> MethodCall {
        MethodCall::new("getPair", vec![Address, Address], vec![Address])
    }

    pub fn all_pairs_length() -> MethodCall {
        MethodCall::new("allPairsLength", vec![], vec![Uint(256)])
    }

    pub fn all_pairs() -> MethodCall {
        MethodCall::new("allPairs", vec![Uint(256)], vec![Address])
    }

    pub fn get_amounts_out() -> MethodCall {
        MethodCall::new("getAmountsOut", vec![Uint(256), addresses()], vec![amounts()])
    }

    pub fn swap_exact_tokens_for_tokens() -> MethodCall {
        MethodCall::new(
            "swapExactTokensForTokens",
            vec![Uint(256), Uint(256), addresses(), Address, Uint(256)],
            vec![amounts()],
        )
    }
}
