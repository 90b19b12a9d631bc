//! Token registry for Base mainnet

use alloy_primitives::{Address, address};
use serde::Serialize;

/// ERC-20 or native token metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Token {
    pub symbol: &'static str,
    pub name: &'static str,
    pub address: Address,
    pub decimals: u8,
}

/// Native USDC on Base
pub const USDC: Token = Token {
    symbol: "USDC",
    name: "USD Coin",
    address: address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"),
    decimals: 6,
};

/// Wrapped ether (OP-stack predeploy)
pub const WETH: Token = Token {
    symbol: "WETH",
    name: "Wrapped Ether",
    address: address!("4200000000000000000000000000000000000006"),
    decimals: 18,
};

/// Native ether, zero-address convention
pub const ETH: Token = Token {
    symbol: "ETH",
    name: "Ether",
    address: Address::ZERO,
    decimals: 18,
};

/// Native ether placeholder used by aggregators
pub const NATIVE_PLACEHOLDER: Address = address!("EeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE");

/// All registered tokens
pub const BASE_TOKENS: [Token; 3] = [USDC, WETH, ETH];

/// Look up a token by address (the aggregator placeholder maps to ETH)
pub fn token_by_address(address: &Address) -> Option<Token> {
    if *address == NATIVE_PLACEHOLDER {
        return Some(ETH);
    }
    BASE_TOKENS.iter().copied().find(|t| t.address == *address)
}

/// Look up a token by case-insensitive symbol
pub fn token_by_symbol(symbol: &str) -> Option<Token> {
    BASE_TOKENS
        .iter()
        .copied()
        .find(|t| t.symbol.eq_ignore_ascii_case(symbol))
}

/// True for any native-ether representation
pub fn is_native(address: &Address) -> bool {
    *address == Address::ZERO || *address == NATIVE_PLACEHOLDER
}

/// Whether the relay sponsors a swap from `from` into `to`
///
/// Only stablecoin into wrapped or native ether is relayed.
pub fn is_gasless_available(from: &Address, to: &Address) -> bool {
    *from == USDC.address && (*to == WETH.address || is_native(to))
}
