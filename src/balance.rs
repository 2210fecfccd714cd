//! Balance oracle - chain balance reads for intent validation
//!
//! Only used to flag "amount exceeds balance" on the source side; a
//! failed read degrades to unknown and never blocks quoting.

use alloy_primitives::{Address, U256};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_sol_types::{sol, SolCall};
use async_trait::async_trait;
use eyre::{eyre, Result};
use tracing::debug;

use crate::tokens::Token;

sol! {
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256);
    }
}

/// A token balance, still in base units
#[derive(Debug, Clone)]
pub struct BalanceInfo {
    pub value: U256,
    pub decimals: u8,
    pub symbol: &'static str,
}

impl BalanceInfo {
    /// Normalized balance for display/validation
    pub fn normalized(&self) -> f64 {
        // Balances that overflow u128 are beyond anything the
        // validation path cares about; saturate instead of failing
        let raw = self.value.try_into().unwrap_or(u128::MAX) as f64;
        raw / 10f64.powi(self.decimals as i32)
    }
}

/// Source of chain balances. Abstracted so session tests can script
/// balances without an RPC endpoint
#[async_trait]
pub trait BalanceSource: Send + Sync {
    async fn get_balance(&self, owner: Address, token: &'static Token) -> Result<BalanceInfo>;
}

/// Balance reads over an HTTP RPC provider
pub struct RpcBalanceSource {
    rpc_url: String,
}

impl RpcBalanceSource {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
        }
    }
}

#[async_trait]
impl BalanceSource for RpcBalanceSource {
    async fn get_balance(&self, owner: Address, token: &'static Token) -> Result<BalanceInfo> {
        let provider = ProviderBuilder::new().connect_http(self.rpc_url.parse()?);

        let value = if token.is_native {
            provider
                .get_balance(owner)
                .await
                .map_err(|e| eyre!("native balance read failed: {}", e))?
        } else {
            let calldata = IERC20::balanceOfCall { owner }.abi_encode();

            let tx = TransactionRequest::default()
                .to(token.address)
                .input(calldata.into());

            let result = provider
                .call(tx)
                .await
                .map_err(|e| eyre!("balanceOf call failed: {}", e))?;

            IERC20::balanceOfCall::abi_decode_returns(&result)
                .map_err(|e| eyre!("failed to decode balanceOf: {}", e))?
        };

        debug!("balance of {} for {:?}: {}", token.symbol, owner, value);

        Ok(BalanceInfo {
            value,
            decimals: token.decimals,
            symbol: token.symbol,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_balance() {
        let info = BalanceInfo {
            value: U256::from(150_000_000u64),
            decimals: 8,
            symbol: "WBTC",
        };
        assert!((info.normalized() - 1.5).abs() < 1e-12);
    }
}
