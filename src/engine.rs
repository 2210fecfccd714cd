//! Quote arbitration engine
//!
//! Turns a trade intent into zero, one, or two provider quotes, keeps
//! at most one request live at a time, and picks the better route.
//!
//! Concurrency model: both providers are fired in parallel and raced
//! against a cancellation token. Issuing a new request first cancels
//! the previous token, so a response from a superseded request can
//! never be applied - cancellation is best-effort at the network layer
//! and authoritative at the request-id check.

use alloy_primitives::{Address, Bytes, U256};
use futures::future::join_all;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::amount::to_base_units;
use crate::error::{QuoteError, QuoteResult};
use crate::providers::{ProviderQuote, ProviderRequest, QuoteProvider};
use crate::tokens::{get_token_by_symbol, Token};

// ============================================
// TRADE INTENT
// ============================================

/// Which amount field the user fixed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Fixed source amount, solve for destination
    Sell,

    /// Fixed destination amount, solve for source
    Buy,
}

/// What the user wants to trade. An immutable snapshot is taken the
/// moment a quote request is issued
#[derive(Debug, Clone)]
pub struct TradeIntent {
    pub src_symbol: String,
    pub dest_symbol: String,
    /// Decimal amount of the side the user last edited
    pub amount: String,
    pub side: Side,
    /// Percent * 100, i.e. 50 = 0.5%
    pub slippage_bps: u16,
}

impl TradeIntent {
    pub fn sell(src: &str, dest: &str, amount: &str, slippage_bps: u16) -> Self {
        Self {
            src_symbol: src.to_string(),
            dest_symbol: dest.to_string(),
            amount: amount.to_string(),
            side: Side::Sell,
            slippage_bps,
        }
    }

    pub fn buy(src: &str, dest: &str, amount: &str, slippage_bps: u16) -> Self {
        Self {
            src_symbol: src.to_string(),
            dest_symbol: dest.to_string(),
            amount: amount.to_string(),
            side: Side::Buy,
            slippage_bps,
        }
    }
}

/// Orient an intent for the wire. SELL quotes src -> dest and the
/// response amount is in destination units; BUY quotes the *reverse*
/// pair (how much source buys the fixed destination amount), so the
/// response is normalized with the source token's decimals.
pub(crate) fn wire_request(intent: &TradeIntent, taker: Address) -> QuoteResult<ProviderRequest> {
    let src: &'static Token = get_token_by_symbol(&intent.src_symbol)?;
    let dest: &'static Token = get_token_by_symbol(&intent.dest_symbol)?;

    let (token_in, token_out, normalize_decimals) = match intent.side {
        Side::Sell => (src, dest, dest.decimals),
        Side::Buy => (dest, src, src.decimals),
    };

    let amount_in = to_base_units(&intent.amount, token_in.decimals)?;
    if amount_in.is_zero() {
        return Err(QuoteError::InvalidAmount(intent.amount.clone()));
    }

    Ok(ProviderRequest {
        token_in,
        token_out,
        amount_in,
        normalize_decimals,
        taker,
        slippage_bps: intent.slippage_bps,
    })
}

// ============================================
// QUOTE BATCH
// ============================================

/// Quotes collected for one (still live at completion) request
#[derive(Debug)]
pub struct QuoteBatch {
    pub request_id: u64,
    pub issued_at: Instant,
    /// Whichever subset of the providers answered in time; preserved
    /// in provider registration order (Velora first)
    pub quotes: Vec<ProviderQuote>,
}

/// Pick the quote with the larger normalized output amount.
///
/// Deterministic and side-effect-free. The comparison is strictly
/// greater, so the first-evaluated provider keeps exact ties - with
/// the engine's registration order that makes Velora the stable
/// default.
pub fn select_best_quote(quotes: &[ProviderQuote]) -> Option<&ProviderQuote> {
    let mut best: Option<&ProviderQuote> = None;
    for quote in quotes {
        match best {
            None => best = Some(quote),
            Some(current) if quote.out_amount > current.out_amount => best = Some(quote),
            _ => {}
        }
    }
    best
}

/// Chain-call descriptor for the winning route, ready for fee display
/// and (mode permitting) broadcast
#[derive(Debug, Clone)]
pub struct ExecutableTx {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

/// Gas price for executing this cycle: whatever any quote in the
/// batch reported (Velora routes carry one, Kyber's never do), else
/// the configured fallback. A Kyber win still executes with the same
/// cycle's Velora gas price when one was quoted.
pub fn batch_gas_price(quotes: &[ProviderQuote], fallback: u128) -> u128 {
    quotes
        .iter()
        .find_map(|q| q.call.gas_price)
        .unwrap_or(fallback)
}

/// Assemble the executable descriptor from the winning quote. The
/// winner's own gas price takes precedence over the cycle fallback.
pub fn build_executable(best: &ProviderQuote, fallback_gas_price: u128) -> ExecutableTx {
    let gas_price = best.call.gas_price.unwrap_or(fallback_gas_price);
    ExecutableTx {
        to: best.call.to,
        data: best.call.data.clone(),
        value: best.call.value,
        max_fee_per_gas: gas_price,
        max_priority_fee_per_gas: gas_price,
    }
}

// ============================================
// ENGINE
// ============================================

struct LiveRequest {
    id: u64,
    token: CancellationToken,
}

/// The arbitration engine. At most one quote request is live at any
/// time; issuing a new one supersedes the previous
pub struct QuoteEngine {
    providers: Vec<Arc<dyn QuoteProvider>>,
    taker: Address,
    live: Mutex<LiveRequest>,
}

impl QuoteEngine {
    /// Providers are raced in the order given; the first one is the
    /// tie-break winner in `select_best_quote`
    pub fn new(providers: Vec<Arc<dyn QuoteProvider>>, taker: Address) -> Self {
        Self {
            providers,
            taker,
            live: Mutex::new(LiveRequest {
                id: 0,
                token: CancellationToken::new(),
            }),
        }
    }

    /// Cancel the previous request and mint the next one
    fn issue(&self) -> (u64, CancellationToken) {
        let mut live = self.live.lock().expect("live request lock poisoned");
        live.token.cancel();
        live.id += 1;
        live.token = CancellationToken::new();
        (live.id, live.token.clone())
    }

    /// Whether `request_id` still belongs to the live request. Results
    /// from anything else must be discarded
    pub fn is_live(&self, request_id: u64) -> bool {
        let live = self.live.lock().expect("live request lock poisoned");
        live.id == request_id && !live.token.is_cancelled()
    }

    /// Fetch quotes for the intent from all providers in parallel.
    ///
    /// Individual provider failures degrade to partial results. The
    /// whole batch fails only when the tokens are unknown, the amount
    /// is unusable, or the request was superseded mid-flight.
    pub async fn request_quotes(&self, intent: &TradeIntent) -> QuoteResult<QuoteBatch> {
        let wire = wire_request(intent, self.taker)?;
        let (request_id, token) = self.issue();
        let issued_at = Instant::now();

        debug!(
            "issuing quote request #{}: {} {} -> {} ({:?})",
            request_id, intent.amount, intent.src_symbol, intent.dest_symbol, intent.side
        );

        let tasks = self.providers.iter().map(|provider| {
            let provider = Arc::clone(provider);
            let wire = wire.clone();
            let token = token.clone();

            tokio::spawn(async move {
                tokio::select! {
                    _ = token.cancelled() => Err(QuoteError::Cancelled),
                    result = provider.fetch_quote(&wire) => result,
                }
            })
        });

        let results = join_all(tasks).await;

        let mut quotes = Vec::with_capacity(self.providers.len());
        for result in results {
            match result {
                Ok(Ok(quote)) => quotes.push(quote),
                Ok(Err(err)) if err.is_loggable() => {
                    warn!("provider contributed no quote: {}", err);
                }
                Ok(Err(_)) => debug!("provider call superseded"),
                Err(join_err) => warn!("provider task failed: {}", join_err),
            }
        }

        // Authoritative staleness check: even fully collected results
        // are discarded once a newer request exists
        if token.is_cancelled() {
            return Err(QuoteError::Cancelled);
        }

        debug!(
            "request #{} completed with {}/{} quotes in {:?}",
            request_id,
            quotes.len(),
            self.providers.len(),
            issued_at.elapsed()
        );

        Ok(QuoteBatch {
            request_id,
            issued_at,
            quotes,
        })
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::testutil::MockProvider;
    use crate::providers::ProviderId;
    use std::time::Duration;

    fn engine_with(providers: Vec<Arc<dyn QuoteProvider>>) -> Arc<QuoteEngine> {
        Arc::new(QuoteEngine::new(providers, Address::ZERO))
    }

    fn sell_intent() -> TradeIntent {
        TradeIntent::sell("WBTC", "USDT", "1", 50)
    }

    #[test]
    fn test_wire_request_sell_uses_dest_decimals() {
        let req = wire_request(&sell_intent(), Address::ZERO).unwrap();
        assert_eq!(req.token_in.symbol, "WBTC");
        assert_eq!(req.token_out.symbol, "USDT");
        // 1 WBTC at 8 decimals
        assert_eq!(req.amount_in, U256::from(100_000_000u64));
        // SELL normalizes with the destination token's decimals
        assert_eq!(req.normalize_decimals, 6);
    }

    #[test]
    fn test_wire_request_buy_reverses_pair() {
        // Fixed destination amount: quote the reverse pair, normalize
        // the answer with the *source* token's decimals
        let intent = TradeIntent::buy("WBTC", "USDT", "65000", 50);
        let req = wire_request(&intent, Address::ZERO).unwrap();
        assert_eq!(req.token_in.symbol, "USDT");
        assert_eq!(req.token_out.symbol, "WBTC");
        assert_eq!(req.amount_in, U256::from(65_000_000_000u64));
        assert_eq!(req.normalize_decimals, 8);
    }

    #[test]
    fn test_wire_request_unknown_token() {
        let intent = TradeIntent::sell("NOPE", "USDT", "1", 50);
        let err = wire_request(&intent, Address::ZERO).unwrap_err();
        assert!(matches!(err, QuoteError::UnknownToken(_)));
    }

    #[test]
    fn test_wire_request_rejects_zero_amount() {
        let intent = TradeIntent::sell("WBTC", "USDT", "0", 50);
        assert!(matches!(
            wire_request(&intent, Address::ZERO),
            Err(QuoteError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_best_quote_strictly_greater() {
        fn quote(provider: ProviderId, out: f64) -> ProviderQuote {
            ProviderQuote {
                provider,
                out_amount: out,
                src_usd: None,
                dest_usd: None,
                gas_usd: None,
                call: crate::providers::RouteCall {
                    to: Address::ZERO,
                    data: Bytes::new(),
                    value: U256::ZERO,
                    gas_price: None,
                },
            }
        }

        // Kyber strictly better -> Kyber
        let quotes = vec![quote(ProviderId::Velora, 64000.0), quote(ProviderId::Kyber, 65000.0)];
        assert_eq!(select_best_quote(&quotes).unwrap().provider, ProviderId::Kyber);

        // Exact tie -> first-evaluated provider (Velora) keeps it
        let quotes = vec![quote(ProviderId::Velora, 65000.0), quote(ProviderId::Kyber, 65000.0)];
        assert_eq!(select_best_quote(&quotes).unwrap().provider, ProviderId::Velora);

        // Empty -> no best quote
        assert!(select_best_quote(&[]).is_none());
    }

    #[tokio::test]
    async fn test_partial_results_on_one_failure() {
        let engine = engine_with(vec![
            Arc::new(MockProvider::failing(ProviderId::Velora)),
            Arc::new(MockProvider::quoting(ProviderId::Kyber, 64900.0)),
        ]);

        let batch = engine.request_quotes(&sell_intent()).await.unwrap();
        assert_eq!(batch.quotes.len(), 1);
        assert_eq!(batch.quotes[0].provider, ProviderId::Kyber);
        assert!(engine.is_live(batch.request_id));
    }

    #[tokio::test]
    async fn test_both_fail_yields_empty_batch() {
        let engine = engine_with(vec![
            Arc::new(MockProvider::failing(ProviderId::Velora)),
            Arc::new(MockProvider::failing(ProviderId::Kyber)),
        ]);

        // No error escapes; the batch is simply empty and no best
        // quote exists
        let batch = engine.request_quotes(&sell_intent()).await.unwrap();
        assert!(batch.quotes.is_empty());
        assert!(select_best_quote(&batch.quotes).is_none());
    }

    #[tokio::test]
    async fn test_stale_request_is_suppressed() {
        let engine = engine_with(vec![
            Arc::new(
                MockProvider::quoting(ProviderId::Velora, 64000.0)
                    .with_delay(Duration::from_millis(150)),
            ),
            Arc::new(
                MockProvider::quoting(ProviderId::Kyber, 64100.0)
                    .with_delay(Duration::from_millis(150)),
            ),
        ]);

        // R1 is still in flight when R2 is issued 40ms later; R1 must
        // come back Cancelled even though its network calls complete
        let slow_engine = Arc::clone(&engine);
        let r1 = tokio::spawn(async move {
            slow_engine.request_quotes(&sell_intent()).await
        });

        tokio::time::sleep(Duration::from_millis(40)).await;
        let intent2 = TradeIntent::sell("WBTC", "USDT", "2", 50);
        let r2 = engine.request_quotes(&intent2).await.unwrap();

        let r1 = r1.await.unwrap();
        assert!(matches!(r1, Err(QuoteError::Cancelled)));

        assert_eq!(r2.quotes.len(), 2);
        assert!(engine.is_live(r2.request_id));
    }

    #[tokio::test]
    async fn test_request_ids_are_monotonic() {
        let engine = engine_with(vec![Arc::new(MockProvider::quoting(
            ProviderId::Velora,
            1.0,
        ))]);

        let a = engine.request_quotes(&sell_intent()).await.unwrap();
        let b = engine.request_quotes(&sell_intent()).await.unwrap();
        assert!(b.request_id > a.request_id);
        assert!(!engine.is_live(a.request_id));
        assert!(engine.is_live(b.request_id));
    }

    #[test]
    fn test_kyber_win_inherits_cycle_gas_price() {
        fn quote(provider: ProviderId, out: f64, gas_price: Option<u128>) -> ProviderQuote {
            ProviderQuote {
                provider,
                out_amount: out,
                src_usd: None,
                dest_usd: None,
                gas_usd: None,
                call: crate::providers::RouteCall {
                    to: Address::ZERO,
                    data: Bytes::new(),
                    value: U256::ZERO,
                    gas_price,
                },
            }
        }

        let quotes = vec![
            quote(ProviderId::Velora, 64000.0, Some(31_000_000_000)),
            quote(ProviderId::Kyber, 65000.0, None),
        ];

        // Kyber wins the price but its route carries no gas price; the
        // cycle's Velora gas price is reused instead of the static
        // fallback
        let best = select_best_quote(&quotes).unwrap();
        assert_eq!(best.provider, ProviderId::Kyber);
        let tx = build_executable(best, batch_gas_price(&quotes, 50_000_000_000));
        assert_eq!(tx.max_fee_per_gas, 31_000_000_000);

        // No quote in the batch reported one: static fallback applies
        assert_eq!(batch_gas_price(&quotes[1..], 50_000_000_000), 50_000_000_000);
    }

    #[test]
    fn test_build_executable_prefers_route_gas_price() {
        let quote = ProviderQuote {
            provider: ProviderId::Velora,
            out_amount: 1.0,
            src_usd: None,
            dest_usd: None,
            gas_usd: None,
            call: crate::providers::RouteCall {
                to: Address::ZERO,
                data: Bytes::from(vec![0xde, 0xad]),
                value: U256::from(7u64),
                gas_price: Some(31_000_000_000),
            },
        };

        let tx = build_executable(&quote, 50_000_000_000);
        assert_eq!(tx.max_fee_per_gas, 31_000_000_000);
        assert_eq!(tx.max_priority_fee_per_gas, 31_000_000_000);
        assert_eq!(tx.value, U256::from(7u64));

        let mut no_gas = quote.clone();
        no_gas.call.gas_price = None;
        let tx = build_executable(&no_gas, 50_000_000_000);
        assert_eq!(tx.max_fee_per_gas, 50_000_000_000);
    }
}
