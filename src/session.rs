//! Quote session - the single writer of displayed swap state
//!
//! One task owns all mutable state: token selection, the two amount
//! fields, the latest winning quote, and the validation flags. Edits
//! arrive as events, get debounced, and trigger a quote cycle; an idle
//! refresh timer re-runs the cycle every few seconds so a displayed
//! price never goes stale. State is published through a watch channel
//! so any number of readers can render it.
//!
//! Debounce windows differ by direction on purpose: source-amount
//! edits wait a full second (the user is usually still typing), while
//! destination-amount edits settle after 250ms.

use alloy_primitives::Address;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::amount::format_amount;
use crate::balance::BalanceSource;
use crate::engine::{
    batch_gas_price, build_executable, select_best_quote, ExecutableTx, QuoteEngine, Side,
    TradeIntent,
};
use crate::error::QuoteError;
use crate::providers::ProviderId;
use crate::tokens::{canonical_symbol, get_token_by_symbol};

// ============================================
// EVENTS AND STATE
// ============================================

/// Fraction of the source balance the portion buttons snap to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Portion {
    Third,
    Half,
    Max,
}

impl Portion {
    fn factor(&self) -> f64 {
        match self {
            Portion::Third => 1.0 / 3.0,
            Portion::Half => 0.50,
            Portion::Max => 1.0,
        }
    }
}

/// Everything a user can do to the session
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The pay field changed (SELL direction)
    EditSourceAmount(String),

    /// The receive field changed (BUY direction)
    EditDestAmount(String),

    SelectSourceToken(String),
    SelectDestToken(String),

    /// Swap the pay/receive tokens in place
    FlipTokens,

    SetSlippageBps(u16),

    /// Snap the source amount to a fraction of the balance
    SelectPortion(Portion),
}

/// Direction of the displayed price since the previous quote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceDrift {
    Neutral,
    /// Price moved in the user's favor
    Favorable,
    Unfavorable,
}

/// The winning quote as the session displays it
#[derive(Debug, Clone)]
pub struct BestView {
    pub provider: ProviderId,
    pub out_amount: f64,
    pub gas_usd: Option<f64>,
    pub tx: ExecutableTx,
}

/// Snapshot of displayed state, published after every change
#[derive(Debug, Clone)]
pub struct SessionState {
    pub src_symbol: String,
    pub dest_symbol: String,
    pub src_amount: String,
    pub dest_amount: String,
    /// Which field the user last edited
    pub side: Side,
    pub slippage_bps: u16,
    pub best: Option<BestView>,
    pub drift: PriceDrift,
    /// Known source balance, normalized. None while unknown
    pub src_balance: Option<f64>,
    /// Entered source amount exceeds the known balance. A flag, not a
    /// blocker - quoting still runs
    pub insufficient_balance: bool,
    /// A quote cycle is in flight
    pub quoting: bool,
}

impl SessionState {
    fn new(src: &str, dest: &str, slippage_bps: u16) -> Self {
        Self {
            src_symbol: src.to_string(),
            dest_symbol: dest.to_string(),
            src_amount: String::new(),
            dest_amount: String::new(),
            side: Side::Sell,
            slippage_bps,
            best: None,
            drift: PriceDrift::Neutral,
            src_balance: None,
            insufficient_balance: false,
            quoting: false,
        }
    }

    /// Whether the execute action should be offered
    pub fn can_execute(&self) -> bool {
        self.best.is_some() && !self.quoting
    }

    /// `1 SRC = x DST` and the inverse, from the displayed amounts
    pub fn rate_strings(&self) -> Option<(String, String)> {
        let src: f64 = self.src_amount.parse().ok()?;
        let dest: f64 = self.dest_amount.parse().ok()?;
        if src <= 0.0 || dest <= 0.0 {
            return None;
        }
        let forward = format!(
            "1 {} = {} {}",
            self.src_symbol,
            format_amount(dest / src, 8),
            self.dest_symbol
        );
        let inverse = format!(
            "1 {} = {} {}",
            self.dest_symbol,
            format_amount(src / dest, 8),
            self.src_symbol
        );
        Some((forward, inverse))
    }
}

// ============================================
// SESSION
// ============================================

/// Session timing knobs, lifted from Config so tests can shrink them
#[derive(Debug, Clone)]
pub struct SessionTiming {
    pub sell_debounce: Duration,
    pub buy_debounce: Duration,
    pub refresh_interval: Duration,
}

impl SessionTiming {
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            sell_debounce: Duration::from_millis(config.sell_debounce_ms),
            buy_debounce: Duration::from_millis(config.buy_debounce_ms),
            refresh_interval: Duration::from_secs(config.refresh_interval_secs),
        }
    }
}

/// Single-writer owner of swap state. Construct, then drive with
/// [`Session::run`] or (in tests) call the handlers directly.
pub struct Session {
    engine: Arc<QuoteEngine>,
    balances: Arc<dyn BalanceSource>,
    owner: Address,
    timing: SessionTiming,
    fallback_gas_price: u128,

    state: SessionState,
    publisher: watch::Sender<SessionState>,
}

impl Session {
    pub fn new(
        engine: Arc<QuoteEngine>,
        balances: Arc<dyn BalanceSource>,
        owner: Address,
        timing: SessionTiming,
        fallback_gas_price: u128,
        src: &str,
        dest: &str,
        slippage_bps: u16,
    ) -> (Self, watch::Receiver<SessionState>) {
        let state = SessionState::new(
            canonical_symbol(src),
            canonical_symbol(dest),
            slippage_bps,
        );
        let (publisher, receiver) = watch::channel(state.clone());

        (
            Self {
                engine,
                balances,
                owner,
                timing,
                fallback_gas_price,
                state,
                publisher,
            },
            receiver,
        )
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    fn publish(&self) {
        // Receivers may all be gone in one-shot mode; that is fine
        let _ = self.publisher.send(self.state.clone());
    }

    /// Apply an event to session state. Returns the debounce window
    /// after which a quote cycle should run, or None when the event
    /// does not call for one.
    pub async fn handle_event(&mut self, event: SessionEvent) -> Option<Duration> {
        let window = match event {
            SessionEvent::EditSourceAmount(amount) => {
                self.state.src_amount = amount;
                self.state.side = Side::Sell;
                self.revalidate_balance().await;
                Some(self.timing.sell_debounce)
            }
            SessionEvent::EditDestAmount(amount) => {
                self.state.dest_amount = amount;
                self.state.side = Side::Buy;
                Some(self.timing.buy_debounce)
            }
            SessionEvent::SelectSourceToken(symbol) => {
                self.state.src_symbol = canonical_symbol(&symbol).to_string();
                self.state.src_balance = None;
                self.revalidate_balance().await;
                Some(Duration::ZERO)
            }
            SessionEvent::SelectDestToken(symbol) => {
                self.state.dest_symbol = canonical_symbol(&symbol).to_string();
                Some(Duration::ZERO)
            }
            SessionEvent::FlipTokens => {
                std::mem::swap(&mut self.state.src_symbol, &mut self.state.dest_symbol);
                std::mem::swap(&mut self.state.src_amount, &mut self.state.dest_amount);
                self.state.src_balance = None;
                self.revalidate_balance().await;
                Some(Duration::ZERO)
            }
            SessionEvent::SetSlippageBps(bps) => {
                self.state.slippage_bps = bps;
                Some(Duration::ZERO)
            }
            SessionEvent::SelectPortion(portion) => {
                self.apply_portion(portion).await;
                Some(Duration::ZERO)
            }
        };

        self.publish();
        window
    }

    /// Snap the source amount to a fraction of the balance, truncated
    /// to the token's displayable decimals
    async fn apply_portion(&mut self, portion: Portion) {
        self.revalidate_balance().await;
        let Some(balance) = self.state.src_balance else {
            warn!("portion selected with unknown {} balance", self.state.src_symbol);
            return;
        };

        let decimals = get_token_by_symbol(&self.state.src_symbol)
            .map(|t| t.decimals)
            .unwrap_or(18);

        self.state.src_amount = format_amount(balance * portion.factor(), decimals);
        self.state.side = Side::Sell;
        self.state.insufficient_balance = false;
    }

    /// Refresh the source balance and the insufficient flag. A failed
    /// read clears the balance and counts as valid
    async fn revalidate_balance(&mut self) {
        let Ok(token) = get_token_by_symbol(&self.state.src_symbol) else {
            self.state.src_balance = None;
            self.state.insufficient_balance = false;
            return;
        };

        match self.balances.get_balance(self.owner, token).await {
            Ok(info) => {
                self.state.src_balance = Some(info.normalized());
            }
            Err(e) => {
                debug!("balance read failed for {}: {}", token.symbol, e);
                self.state.src_balance = None;
            }
        }

        self.state.insufficient_balance = match (
            self.state.src_balance,
            self.state.src_amount.parse::<f64>().ok(),
        ) {
            (Some(balance), Some(amount)) => amount > balance,
            _ => false,
        };
    }

    fn current_intent(&self) -> TradeIntent {
        let amount = match self.state.side {
            Side::Sell => &self.state.src_amount,
            Side::Buy => &self.state.dest_amount,
        };
        TradeIntent {
            src_symbol: self.state.src_symbol.clone(),
            dest_symbol: self.state.dest_symbol.clone(),
            amount: amount.clone(),
            side: self.state.side,
            slippage_bps: self.state.slippage_bps,
        }
    }

    /// One full quote cycle: race the providers, arbitrate, and (if
    /// the batch is still live) apply the winner to displayed state
    pub async fn run_cycle(&mut self) {
        self.state.quoting = true;
        self.publish();

        let intent = self.current_intent();
        let result = self.engine.request_quotes(&intent).await;
        self.state.quoting = false;

        match result {
            Ok(batch) => {
                // Completed but superseded between collection and apply
                if !self.engine.is_live(batch.request_id) {
                    debug!("batch #{} arrived stale, dropping", batch.request_id);
                    self.publish();
                    return;
                }
                self.apply_batch(&batch.quotes);
                // A BUY cycle writes the source field, so the balance
                // flag must be recomputed after every apply
                self.revalidate_balance().await;
            }
            Err(QuoteError::Cancelled) => {
                debug!("quote cycle superseded");
            }
            Err(QuoteError::UnknownToken(symbol)) => {
                // Selection widgets should never produce this; abort
                // the cycle without touching displayed amounts
                debug!("unknown token {}, cycle aborted", symbol);
            }
            Err(QuoteError::InvalidAmount(_)) => {
                // Empty or zero input: clear the derived field
                match self.state.side {
                    Side::Sell => self.state.dest_amount.clear(),
                    Side::Buy => self.state.src_amount.clear(),
                }
                self.state.best = None;
                self.state.drift = PriceDrift::Neutral;
            }
            Err(e) => warn!("quote cycle failed: {}", e),
        }

        self.publish();
    }

    fn apply_batch(&mut self, quotes: &[crate::providers::ProviderQuote]) {
        let Some(best) = select_best_quote(quotes) else {
            info!("no provider produced a quote");
            self.state.best = None;
            self.state.drift = PriceDrift::Neutral;
            return;
        };

        // The derived field: destination for SELL, source for BUY
        let (field_decimals, previous) = match self.state.side {
            Side::Sell => (
                get_token_by_symbol(&self.state.dest_symbol)
                    .map(|t| t.decimals)
                    .unwrap_or(18),
                self.state.dest_amount.parse::<f64>().ok(),
            ),
            Side::Buy => (
                get_token_by_symbol(&self.state.src_symbol)
                    .map(|t| t.decimals)
                    .unwrap_or(18),
                self.state.src_amount.parse::<f64>().ok(),
            ),
        };

        self.state.drift = match previous {
            Some(prev) if best.out_amount != prev => {
                // More out is better when selling; needing less in is
                // better when buying
                let favorable = match self.state.side {
                    Side::Sell => best.out_amount > prev,
                    Side::Buy => best.out_amount < prev,
                };
                if favorable {
                    PriceDrift::Favorable
                } else {
                    PriceDrift::Unfavorable
                }
            }
            _ => PriceDrift::Neutral,
        };

        let formatted = format_amount(best.out_amount, field_decimals);
        match self.state.side {
            Side::Sell => self.state.dest_amount = formatted,
            Side::Buy => self.state.src_amount = formatted,
        }

        info!(
            "💱 {} wins: {} {} -> {} {}",
            best.provider,
            self.state.src_amount,
            self.state.src_symbol,
            self.state.dest_amount,
            self.state.dest_symbol
        );

        self.state.best = Some(BestView {
            provider: best.provider,
            out_amount: best.out_amount,
            gas_usd: best.gas_usd,
            tx: build_executable(best, batch_gas_price(quotes, self.fallback_gas_price)),
        });
    }

    /// Event loop: debounce edits, re-quote on the refresh cadence.
    /// The refresh timer restarts from zero after every completed
    /// cycle, so a manual edit pushes the next automatic refresh out.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<SessionEvent>) {
        let mut pending_cycle: Option<Instant> = None;
        let mut refresh_at = Instant::now() + self.timing.refresh_interval;

        loop {
            let next_deadline = match pending_cycle {
                Some(at) => at.min(refresh_at),
                None => refresh_at,
            };

            tokio::select! {
                event = events.recv() => {
                    match event {
                        Some(event) => {
                            if let Some(window) = self.handle_event(event).await {
                                pending_cycle = Some(Instant::now() + window);
                            }
                        }
                        // All senders dropped: session over
                        None => return,
                    }
                }
                _ = tokio::time::sleep_until(next_deadline) => {
                    pending_cycle = None;
                    self.run_cycle().await;
                    refresh_at = Instant::now() + self.timing.refresh_interval;
                }
            }
        }
    }
}

// ============================================
// TESTS
// ============================================
