//! KyberSwap aggregator client
//!
//! Two-step provider: a GET for the route summary, then the summary is
//! POSTed back (plus slippage/sender/recipient) to the build endpoint
//! which returns the executable calldata.
//!
//! API: https://aggregator-api.kyberswap.com/polygon/api/v1/routes
//!      https://aggregator-api.kyberswap.com/polygon/api/v1/route/build

use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::str::FromStr;
use tracing::debug;

use super::{ProviderId, ProviderQuote, ProviderRequest, QuoteProvider, RouteCall};
use crate::amount::from_base_units;
use crate::error::{QuoteError, QuoteResult};

/// Client identifier sent with every build request
const CLIENT_SOURCE: &str = "arbiter";

// ============================================
// CLIENT
// ============================================

/// HTTP client for the KyberSwap aggregator API
pub struct KyberClient {
    http_client: Client,
    base_url: String,
}

impl KyberClient {
    /// Production endpoint for the Polygon deployment
    pub const DEFAULT_BASE_URL: &'static str =
        "https://aggregator-api.kyberswap.com/polygon/api/v1";

    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Client against the production Polygon endpoint
    pub fn polygon() -> Self {
        Self::new(Self::DEFAULT_BASE_URL)
    }

    fn malformed(reason: impl Into<String>) -> QuoteError {
        QuoteError::MalformedResponse {
            provider: ProviderId::Kyber,
            reason: reason.into(),
        }
    }

    fn transport(err: reqwest::Error) -> QuoteError {
        QuoteError::from_transport(ProviderId::Kyber, err)
    }

    /// Step 1: route summary for the pair/amount. The payload is kept
    /// opaque - the build endpoint wants it back verbatim
    async fn fetch_route_summary(&self, request: &ProviderRequest) -> QuoteResult<Value> {
        let url = format!("{}/routes", self.base_url);

        let response: Value = self
            .http_client
            .get(&url)
            .query(&[
                ("tokenIn", format!("{:?}", request.token_in.address)),
                ("tokenOut", format!("{:?}", request.token_out.address)),
                ("amountIn", request.amount_in.to_string()),
                ("gasInclude", "false".to_string()),
            ])
            .send()
            .await
            .map_err(Self::transport)?
            .error_for_status()
            .map_err(Self::transport)?
            .json()
            .await
            .map_err(|e| Self::malformed(e.to_string()))?;

        match response.get("data") {
            Some(data) if data.is_object() => Ok(data.clone()),
            _ => Err(Self::malformed("routes response carried no data object")),
        }
    }

    /// Step 2: turn the summary into an executable route
    async fn build_route(
        &self,
        route_summary: Value,
        request: &ProviderRequest,
    ) -> QuoteResult<Value> {
        let url = format!("{}/route/build", self.base_url);

        let mut payload = route_summary;
        let fields = payload
            .as_object_mut()
            .ok_or_else(|| Self::malformed("route summary is not an object"))?;
        fields.insert("slippageTolerance".into(), json!(request.slippage_bps));
        fields.insert("sender".into(), json!(format!("{:?}", request.taker)));
        fields.insert("recipient".into(), json!(format!("{:?}", request.taker)));
        fields.insert("source".into(), json!(CLIENT_SOURCE));
        fields.insert("skipSimulateTx".into(), json!(false));
        fields.insert("enableGasEstimation".into(), json!(false));
        fields.insert("referral".into(), json!(""));

        let response: Value = self
            .http_client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(Self::transport)?
            .error_for_status()
            .map_err(Self::transport)?
            .json()
            .await
            .map_err(|e| Self::malformed(e.to_string()))?;

        match response.get("data") {
            Some(data) if data.is_object() => Ok(data.clone()),
            _ => Err(Self::malformed("build response carried no data object")),
        }
    }

    fn parse_quote(&self, built: &Value, request: &ProviderRequest) -> QuoteResult<ProviderQuote> {
        let field_str = |name: &str| -> QuoteResult<&str> {
            built
                .get(name)
                .and_then(|v| v.as_str())
                .ok_or_else(|| Self::malformed(format!("missing field {name}")))
        };

        let router = Address::from_str(field_str("routerAddress")?)
            .map_err(|_| Self::malformed("routerAddress is not an address"))?;
        let data = Bytes::from_str(field_str("data")?)
            .map_err(|_| Self::malformed("data is not hex"))?;
        let out_amount = from_base_units(field_str("amountOut")?, request.normalize_decimals)?;

        // transactionValue is only non-zero when the input side is the
        // native asset
        let value = match built.get("transactionValue") {
            Some(Value::String(s)) => {
                U256::from_str(s).map_err(|_| Self::malformed("transactionValue not an integer"))?
            }
            Some(Value::Number(n)) => U256::from(n.as_u64().unwrap_or(0)),
            _ => U256::ZERO,
        };

        let gas_usd = match built.get("gasUsd") {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.parse().ok(),
            _ => None,
        };

        Ok(ProviderQuote {
            provider: ProviderId::Kyber,
            out_amount,
            src_usd: None,
            dest_usd: None,
            gas_usd,
            call: RouteCall {
                to: router,
                data,
                value,
                gas_price: None,
            },
        })
    }
}

#[async_trait]
impl QuoteProvider for KyberClient {
    fn id(&self) -> ProviderId {
        ProviderId::Kyber
    }

    async fn fetch_quote(&self, request: &ProviderRequest) -> QuoteResult<ProviderQuote> {
        debug!(
            "Kyber quote: {} {} -> {}",
            request.amount_in, request.token_in.symbol, request.token_out.symbol
        );

        let summary = self.fetch_route_summary(request).await?;
        let built = self.build_route(summary, request).await?;
        self.parse_quote(&built, request)
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
    fn test_parse_build_response() {
        let built = serde_json::json!({
            "routerAddress": "0x6131B5fae19EA4f9D964eAc0408E4408b66337b5",
            "data": "0xe21fd0e9",
            "amountOut": "64875000000",
            "transactionValue": "0",
            "gasUsd": 0.31
        });

        let client = KyberClient::polygon();
        let quote = client.parse_quote(&built, &sample_request()).unwrap();

        assert!((quote.out_amount - 64875.0).abs() < 1e-9);
        assert_eq!(quote.provider, ProviderId::Kyber);
        assert_eq!(quote.call.value, U256::ZERO);
        assert_eq!(quote.gas_usd, Some(0.31));
        assert!(quote.call.gas_price.is_none());
    }

    #[test]
    fn test_missing_amount_out_is_malformed() {
        let built = serde_json::json!({
            "routerAddress": "0x6131B5fae19EA4f9D964eAc0408E4408b66337b5",
            "data": "0xe21fd0e9"
        });

        let client = KyberClient::polygon();
        let err = client.parse_quote(&built, &sample_request()).unwrap_err();
        assert!(matches!(err, QuoteError::MalformedResponse { .. }));
    }

    #[test]
    fn test_build_payload_merges_summary() {
        // The build payload is the summary object with the client
        // fields layered on top - verify the merge shape
        let summary = serde_json::json!({
            "routeSummary": { "amountIn": "100000000" },
            "routerAddress": "0x6131B5fae19EA4f9D964eAc0408E4408b66337b5"
        });

        let mut payload = summary;
        let fields = payload.as_object_mut().unwrap();
        fields.insert("slippageTolerance".into(), json!(50u16));
        fields.insert("source".into(), json!(CLIENT_SOURCE));

        assert_eq!(payload["routeSummary"]["amountIn"], "100000000");
        assert_eq!(payload["slippageTolerance"], 50);
        assert_eq!(payload["source"], "arbiter");
    }
}
