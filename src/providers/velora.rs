//! Velora (ParaSwap) quote client
//!
//! Single-call provider: one GET returns the price route and a ready
//! to broadcast transaction in the same payload.
//!
//! API: https://api.paraswap.io/swap?srcToken=..&destToken=..&amount=..

use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;
use tracing::debug;

use super::{ProviderId, ProviderQuote, ProviderRequest, QuoteProvider, RouteCall};
use crate::amount::from_base_units;
use crate::error::{QuoteError, QuoteResult};

// ============================================
// API RESPONSE TYPES
// ============================================

#[derive(Debug, Deserialize)]
struct SwapResponse {
    #[serde(rename = "txParams")]
    tx_params: TxParams,
    #[serde(rename = "priceRoute")]
    price_route: PriceRoute,
}

#[derive(Debug, Deserialize)]
struct TxParams {
    to: Address,
    data: String,
    value: String,
    #[serde(rename = "gasPrice")]
    gas_price: String,
}

#[derive(Debug, Deserialize)]
struct PriceRoute {
    #[serde(rename = "destAmount")]
    dest_amount: String,
    // The API is inconsistent about numbers-as-strings for USD fields,
    // so these stay loose and get coerced below
    #[serde(rename = "srcUSD")]
    src_usd: Option<Value>,
    #[serde(rename = "destUSD")]
    dest_usd: Option<Value>,
    #[serde(rename = "gasCostUSD")]
    gas_cost_usd: Option<Value>,
}

fn coerce_usd(value: &Option<Value>) -> Option<f64> {
    match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    }
}

// ============================================
// CLIENT
// ============================================

/// HTTP client for the Velora swap API
pub struct VeloraClient {
    http_client: Client,
    base_url: String,
    chain_id: u64,
}

impl VeloraClient {
    /// Production endpoint
    pub const DEFAULT_BASE_URL: &'static str = "https://api.paraswap.io";

    pub fn new(base_url: impl Into<String>, chain_id: u64) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.into(),
            chain_id,
        }
    }

    /// Client against the production endpoint
    pub fn mainnet(chain_id: u64) -> Self {
        Self::new(Self::DEFAULT_BASE_URL, chain_id)
    }

    fn parse_quote(
        &self,
        response: SwapResponse,
        request: &ProviderRequest,
    ) -> QuoteResult<ProviderQuote> {
        let malformed = |reason: &str| QuoteError::MalformedResponse {
            provider: ProviderId::Velora,
            reason: reason.to_string(),
        };

        let out_amount =
            from_base_units(&response.price_route.dest_amount, request.normalize_decimals)?;

        let data = Bytes::from_str(&response.tx_params.data)
            .map_err(|_| malformed("txParams.data is not hex"))?;
        let value = U256::from_str(&response.tx_params.value)
            .map_err(|_| malformed("txParams.value is not an integer"))?;
        let gas_price = response.tx_params.gas_price.parse::<u128>().ok();

        Ok(ProviderQuote {
            provider: ProviderId::Velora,
            out_amount,
            src_usd: coerce_usd(&response.price_route.src_usd),
            dest_usd: coerce_usd(&response.price_route.dest_usd),
            gas_usd: coerce_usd(&response.price_route.gas_cost_usd),
            call: RouteCall {
                to: response.tx_params.to,
                data,
                value,
                gas_price,
            },
        })
    }
}

#[async_trait]
impl QuoteProvider for VeloraClient {
    fn id(&self) -> ProviderId {
        ProviderId::Velora
    }

    async fn fetch_quote(&self, request: &ProviderRequest) -> QuoteResult<ProviderQuote> {
        let url = format!("{}/swap", self.base_url);

        debug!(
            "Velora quote: {} {} -> {}",
            request.amount_in, request.token_in.symbol, request.token_out.symbol
        );

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("srcToken", format!("{:?}", request.token_in.address)),
                ("srcDecimals", request.token_in.decimals.to_string()),
                ("destToken", format!("{:?}", request.token_out.address)),
                ("destDecimals", request.token_out.decimals.to_string()),
                ("amount", request.amount_in.to_string()),
                ("userAddress", format!("{:?}", request.taker)),
                ("slippage", request.slippage_bps.to_string()),
                ("network", self.chain_id.to_string()),
                // BUY intents are quoted as a SELL of the reverse pair,
                // so the wire side is always SELL
                ("side", "SELL".to_string()),
            ])
            .send()
            .await
            .map_err(|e| QuoteError::from_transport(ProviderId::Velora, e))?
            .error_for_status()
            .map_err(|e| QuoteError::from_transport(ProviderId::Velora, e))?;

        let payload: SwapResponse = response.json().await.map_err(|e| {
            QuoteError::MalformedResponse {
                provider: ProviderId::Velora,
                reason: e.to_string(),
            }
        })?;

        self.parse_quote(payload, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::get_token_by_symbol;

    fn sample_request() -> ProviderRequest {
        ProviderRequest {
            token_in: get_token_by_symbol("WBTC").unwrap(),
            token_out: get_token_by_symbol("USDT").unwrap(),
            amount_in: U256::from(100_000_000u64),
            normalize_decimals: 6,
            taker: Address::ZERO,
            slippage_bps: 50,
        }
    }

    #[test]
    fn test_parse_swap_response() {
        let raw = r#"{
            "txParams": {
                "to": "0xDEF171Fe48CF0115B1d80b88dc8eAB59176FEe57",
                "data": "0xa94e78ef",
                "value": "0",
                "gasPrice": "31000000000"
            },
            "priceRoute": {
                "destAmount": "65000000000",
                "srcUSD": "64950.50",
                "destUSD": 64999.12,
                "gasCostUSD": "0.42"
            }
        }"#;

        let parsed: SwapResponse = serde_json::from_str(raw).unwrap();
        let client = VeloraClient::mainnet(137);
        let quote = client.parse_quote(parsed, &sample_request()).unwrap();

        // 65000000000 at 6 decimals -> 65000.0 USDT
        assert!((quote.out_amount - 65000.0).abs() < 1e-9);
        assert_eq!(quote.provider, ProviderId::Velora);
        assert_eq!(quote.call.gas_price, Some(31_000_000_000));
        assert_eq!(quote.src_usd, Some(64950.50));
        assert_eq!(quote.dest_usd, Some(64999.12));
    }

    #[test]
    fn test_rejects_bad_calldata() {
        let raw = r#"{
            "txParams": {
                "to": "0xDEF171Fe48CF0115B1d80b88dc8eAB59176FEe57",
                "data": "not-hex",
                "value": "0",
                "gasPrice": "0"
            },
            "priceRoute": { "destAmount": "1" }
        }"#;

        let parsed: SwapResponse = serde_json::from_str(raw).unwrap();
        let client = VeloraClient::mainnet(137);
        let err = client.parse_quote(parsed, &sample_request()).unwrap_err();
        assert!(matches!(err, QuoteError::MalformedResponse { .. }));
    }
}
