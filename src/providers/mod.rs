//! Aggregator quote providers
//!
//! Two external route providers compete on every quote cycle:
//! - Velora (ParaSwap): price + route + tx build in a single call
//! - KyberSwap: route summary first, then a build step
//!
//! Each provider normalizes its own output amount so the engine only
//! ever compares like-for-like decimal quantities.

mod kyber;
mod velora;

pub use kyber::KyberClient;
pub use velora::VeloraClient;

use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::QuoteResult;
use crate::tokens::Token;

/// Identity of a quote provider. The engine evaluates Velora first,
/// which makes it the stable winner of exact price ties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderId {
    Velora,
    Kyber,
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderId::Velora => write!(f, "Velora"),
            ProviderId::Kyber => write!(f, "KyberSwap"),
        }
    }
}

/// A provider call, already oriented for the wire: `token_in` is what
/// the route consumes. For BUY intents the engine quotes the reverse
/// pair, so `normalize_decimals` carries whichever token's decimals
/// the response amount must be normalized with (the *source* token's
/// for BUY, the destination's for SELL).
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub token_in: &'static Token,
    pub token_out: &'static Token,
    /// Base units of `token_in`
    pub amount_in: U256,
    pub normalize_decimals: u8,
    pub taker: Address,
    /// Percent * 100, i.e. 50 = 0.5%
    pub slippage_bps: u16,
}

/// The executable call descriptor a winning route carries. Opaque to
/// the engine beyond what broadcasting needs
#[derive(Debug, Clone)]
pub struct RouteCall {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    /// Only Velora reports a gas price with the route
    pub gas_price: Option<u128>,
}

/// A normalized quote from one provider
#[derive(Debug, Clone)]
pub struct ProviderQuote {
    pub provider: ProviderId,
    /// Output amount normalized per `ProviderRequest::normalize_decimals`
    pub out_amount: f64,
    pub src_usd: Option<f64>,
    pub dest_usd: Option<f64>,
    pub gas_usd: Option<f64>,
    pub call: RouteCall,
}

/// A single external aggregator the engine can race
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Fetch one quote. A failure means this provider contributes no
    /// quote for the cycle; it never aborts the whole request
    async fn fetch_quote(&self, request: &ProviderRequest) -> QuoteResult<ProviderQuote>;
}

#[cfg(test)]
pub mod testutil {
    //! Scriptable provider for engine/session tests

    use super::*;
    use crate::error::QuoteError;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    pub struct MockProvider {
        id: ProviderId,
        out_amount: Option<f64>,
        delay: Duration,
        pub calls: AtomicU64,
    }

    impl MockProvider {
        pub fn quoting(id: ProviderId, out_amount: f64) -> Self {
            Self {
                id,
                out_amount: Some(out_amount),
                delay: Duration::ZERO,
                calls: AtomicU64::new(0),
            }
        }

        pub fn failing(id: ProviderId) -> Self {
            Self {
                id,
                out_amount: None,
                delay: Duration::ZERO,
                calls: AtomicU64::new(0),
            }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl QuoteProvider for MockProvider {
        fn id(&self) -> ProviderId {
            self.id
        }

        async fn fetch_quote(&self, _request: &ProviderRequest) -> QuoteResult<ProviderQuote> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match self.out_amount {
                Some(out) => Ok(ProviderQuote {
                    provider: self.id,
                    out_amount: out,
                    src_usd: None,
                    dest_usd: None,
                    gas_usd: None,
                    call: RouteCall {
                        to: Address::ZERO,
                        data: Bytes::new(),
                        value: U256::ZERO,
                        gas_price: None,
                    },
                }),
                None => Err(QuoteError::ProviderRequestFailed {
                    provider: self.id,
                    reason: "mock failure".to_string(),
                }),
            }
        }
    }
}
