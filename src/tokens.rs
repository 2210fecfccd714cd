//! Token directory for Polygon (chain id 137)
//!
//! Static metadata the quote flow needs to resolve a symbol into an
//! address and decimal count. The set mirrors the tokens the dashboard
//! exposes from the Uniswap token list, pinned to their Polygon bridge
//! addresses.

use alloy_primitives::{address, Address};
use lazy_static::lazy_static;
use std::collections::HashMap;

use crate::error::{QuoteError, QuoteResult};

/// Sentinel address both aggregators accept for the chain-native asset
pub const NATIVE_SENTINEL: Address = address!("EeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE");

/// A token the directory can resolve
#[derive(Debug, Clone)]
pub struct Token {
    pub symbol: &'static str,
    pub name: &'static str,
    pub address: Address,
    pub decimals: u8,
    pub logo_uri: &'static str,
    /// Native MATIC: no ERC-20 contract, balance comes from the chain
    /// account itself
    pub is_native: bool,
}

/// Token categories for grouping and display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenCategory {
    /// Chain-native asset and its wrapped form
    Native,

    /// Fiat-pegged stablecoins
    Stable,

    /// Bridged majors (WBTC, WETH)
    BridgedMajor,

    /// DeFi governance tokens
    DeFi,
}

impl Token {
    pub fn category(&self) -> TokenCategory {
        match self.symbol {
            "MATIC" | "WMATIC" => TokenCategory::Native,
            "USDT" | "USDC" | "USDC.e" | "DAI" => TokenCategory::Stable,
            "WBTC" | "WETH" => TokenCategory::BridgedMajor,
            _ => TokenCategory::DeFi,
        }
    }
}

// ============================================
// DIRECTORY ENTRIES
// ============================================

pub fn native_tokens() -> Vec<Token> {
    vec![
        Token {
            symbol: "MATIC",
            name: "Polygon",
            address: NATIVE_SENTINEL,
            decimals: 18,
            logo_uri: "https://raw.githubusercontent.com/trustwallet/assets/master/blockchains/polygon/info/logo.png",
            is_native: true,
        },
        Token {
            symbol: "WMATIC",
            name: "Wrapped Matic",
            address: address!("0d500B1d8E8eF31E21C99d1Db9A6444d3ADf1270"),
            decimals: 18,
            logo_uri: "https://raw.githubusercontent.com/trustwallet/assets/master/blockchains/polygon/assets/0x0d500B1d8E8eF31E21C99d1Db9A6444d3ADf1270/logo.png",
            is_native: false,
        },
    ]
}

pub fn stable_tokens() -> Vec<Token> {
    vec![
        Token {
            symbol: "USDT",
            name: "Tether USD",
            address: address!("c2132D05D31c914a87C6611C10748AEb04B58e8F"),
            decimals: 6,
            logo_uri: "https://raw.githubusercontent.com/trustwallet/assets/master/blockchains/ethereum/assets/0xdAC17F958D2ee523a2206206994597C13D831ec7/logo.png",
            is_native: false,
        },
        Token {
            symbol: "USDC",
            name: "USD Coin",
            address: address!("3c499c542cEF5E3811e1192ce70d8cC03d5c3359"),
            decimals: 6,
            logo_uri: "https://raw.githubusercontent.com/trustwallet/assets/master/blockchains/ethereum/assets/0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48/logo.png",
            is_native: false,
        },
        Token {
            symbol: "USDC.e",
            name: "Bridged USD Coin",
            address: address!("2791Bca1f2de4661ED88A30C99A7a9449Aa84174"),
            decimals: 6,
            logo_uri: "https://raw.githubusercontent.com/trustwallet/assets/master/blockchains/ethereum/assets/0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48/logo.png",
            is_native: false,
        },
        Token {
            symbol: "DAI",
            name: "Dai Stablecoin",
            address: address!("8f3Cf7ad23Cd3CaDbD9735AFf958023239c6A063"),
            decimals: 18,
            logo_uri: "https://raw.githubusercontent.com/trustwallet/assets/master/blockchains/ethereum/assets/0x6B175474E89094C44Da98b954EedcdeCB5BE3830/logo.png",
            is_native: false,
        },
    ]
}

pub fn bridged_major_tokens() -> Vec<Token> {
    vec![
        Token {
            symbol: "WBTC",
            name: "Wrapped BTC",
            address: address!("1BFD67037B42Cf73acF2047067bd4F2C47D9BfD6"),
            decimals: 8,
            logo_uri: "https://raw.githubusercontent.com/trustwallet/assets/master/blockchains/ethereum/assets/0x2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599/logo.png",
            is_native: false,
        },
        Token {
            symbol: "WETH",
            name: "Wrapped Ether",
            address: address!("7ceB23fD6bC0adD59E62ac25578270cFf1b9f619"),
            decimals: 18,
            logo_uri: "https://raw.githubusercontent.com/trustwallet/assets/master/blockchains/ethereum/assets/0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2/logo.png",
            is_native: false,
        },
    ]
}

pub fn defi_tokens() -> Vec<Token> {
    vec![
        Token {
            symbol: "LINK",
            name: "ChainLink Token",
            address: address!("53E0bca35eC356BD5ddDFebbD1Fc0fD03FaBad39"),
            decimals: 18,
            logo_uri: "https://raw.githubusercontent.com/trustwallet/assets/master/blockchains/ethereum/assets/0x514910771AF9Ca656af840dff83E8264EcF986CA/logo.png",
            is_native: false,
        },
        Token {
            symbol: "AAVE",
            name: "Aave",
            address: address!("D6DF932A45C0f255f85145f286eA0b292B21C90B"),
            decimals: 18,
            logo_uri: "https://raw.githubusercontent.com/trustwallet/assets/master/blockchains/ethereum/assets/0x7Fc66500c84A76Ad7e9c93437bFc5Ac33E2DDaE9/logo.png",
            is_native: false,
        },
        Token {
            symbol: "UNI",
            name: "Uniswap",
            address: address!("b33EaAd8d922B1083446DC23f610c2567fB5180f"),
            decimals: 18,
            logo_uri: "https://raw.githubusercontent.com/trustwallet/assets/master/blockchains/ethereum/assets/0x1f9840a85d5aF5bf1D1762F925BDADdC4201F984/logo.png",
            is_native: false,
        },
        Token {
            symbol: "CRV",
            name: "Curve DAO Token",
            address: address!("172370d5Cd63279eFa6d502DAB29171933a610AF"),
            decimals: 18,
            logo_uri: "https://raw.githubusercontent.com/trustwallet/assets/master/blockchains/ethereum/assets/0xD533a949740bb3306d119CC777fa900bA034cd52/logo.png",
            is_native: false,
        },
    ]
}

// ============================================
// DIRECTORY
// ============================================

/// All tokens the directory can resolve
pub fn all_tokens() -> Vec<Token> {
    let mut tokens = native_tokens();
    tokens.extend(stable_tokens());
    tokens.extend(bridged_major_tokens());
    tokens.extend(defi_tokens());
    tokens
}

lazy_static! {
    static ref BY_SYMBOL: HashMap<&'static str, Token> = {
        let mut map = HashMap::new();
        for token in all_tokens() {
            map.insert(token.symbol, token);
        }
        map
    };
}

/// Map user-facing symbols to directory symbols. The token list
/// predates the POL rebrand, so POL resolves to the MATIC entry.
pub fn canonical_symbol(symbol: &str) -> &str {
    match symbol {
        "POL" => "MATIC",
        other => other,
    }
}

/// Resolve a symbol to its token metadata
pub fn get_token_by_symbol(symbol: &str) -> QuoteResult<&'static Token> {
    BY_SYMBOL
        .get(canonical_symbol(symbol))
        .ok_or_else(|| QuoteError::UnknownToken(symbol.to_string()))
}
