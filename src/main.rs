//! Arbiter - best-price swap routing for Polygon
//!
//! Races Velora (ParaSwap) and KyberSwap on every quote, suppresses
//! stale in-flight requests, and surfaces whichever route pays more.
//!
//! Run with: cargo run -- quote 1 WBTC USDT

use alloy_primitives::Address;
use color_eyre::eyre::Result;
use console::style;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod amount;
mod balance;
mod config;
mod engine;
mod error;
mod executor;
mod providers;
mod session;
mod tokens;

use clap::{Parser, Subcommand};
use config::{Config, ExecutionMode};
use engine::{batch_gas_price, build_executable, select_best_quote, QuoteEngine, TradeIntent};
use executor::TransactionSubmitter;
use providers::{KyberClient, ProviderQuote, QuoteProvider, VeloraClient};
use session::{Session, SessionEvent, SessionTiming};
use tokens::all_tokens;

#[derive(Parser)]
#[command(name = "arbiter", version, about = "Best-price swap routing for Polygon")]
struct Cli {
    /// Load configuration from a TOML file instead of the environment
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Race both aggregators once and show the winning route
    Quote {
        /// Decimal amount of the fixed side
        amount: String,
        /// Token to pay with
        src: String,
        /// Token to receive
        dest: String,

        /// Fix the receive amount instead of the pay amount
        #[arg(long)]
        buy: bool,

        /// Slippage tolerance override, percent * 100
        #[arg(long)]
        slippage_bps: Option<u16>,

        /// Broadcast the winning route (requires live mode)
        #[arg(long)]
        send: bool,
    },

    /// Keep re-quoting a pair on the refresh cadence
    Watch {
        amount: String,
        src: String,
        dest: String,
    },

    /// List the token directory
    Tokens,

    /// Write a default configuration file to edit
    Init {
        #[arg(default_value = "arbiter.toml")]
        path: std::path::PathBuf,
    },
}

fn print_banner() {
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!(
        "{}",
        style(" ⚖️  ARBITER - Best-Price Swap Routing").cyan().bold()
    );
    println!(
        "{}",
        style("    Velora vs KyberSwap | Polygon | Stale-Quote Suppression").cyan()
    );
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!();
}

fn build_engine(config: &Config) -> Arc<QuoteEngine> {
    // Registration order matters: the first provider keeps exact ties
    let providers: Vec<Arc<dyn QuoteProvider>> = vec![
        Arc::new(VeloraClient::new(
            config.velora_base_url.clone(),
            config.chain_id,
        )),
        Arc::new(KyberClient::new(config.kyber_base_url.clone())),
    ];

    Arc::new(QuoteEngine::new(
        providers,
        config.taker_address().unwrap_or(Address::ZERO),
    ))
}

fn print_provider_quote(quote: &ProviderQuote, dest_symbol: &str) {
    print!(
        "  {} {}: {} {}",
        style("✓").green(),
        quote.provider,
        amount::format_amount(quote.out_amount, 8),
        dest_symbol
    );
    if let Some(gas) = quote.gas_usd {
        print!("  (gas ~${:.2})", gas);
    }
    if let (Some(src), Some(dest)) = (quote.src_usd, quote.dest_usd) {
        print!("  [${:.2} in, ${:.2} out]", src, dest);
    }
    println!();
}

async fn run_quote(
    config: &Config,
    amount: String,
    src: String,
    dest: String,
    buy: bool,
    slippage_bps: Option<u16>,
    send: bool,
) -> Result<()> {
    let engine = build_engine(config);
    let slippage = slippage_bps.unwrap_or(config.slippage_bps);

    let intent = if buy {
        TradeIntent::buy(&src, &dest, &amount, slippage)
    } else {
        TradeIntent::sell(&src, &dest, &amount, slippage)
    };

    // =============================================
    // PHASE 1: THE RACE
    // =============================================
    println!("{}", style("═══ PHASE 1: THE RACE ═══").blue().bold());
    println!();
    if buy {
        println!("Quoting: pay {} for exactly {} {}", src, amount, dest);
    } else {
        println!("Quoting: sell {} {} for {}", amount, src, dest);
    }
    println!();

    let start = Instant::now();
    let batch = engine.request_quotes(&intent).await?;

    println!(
        "{} {}/2 providers answered in {:?}",
        style("✓").green(),
        batch.quotes.len(),
        start.elapsed()
    );

    // The filled field is the source for BUY, the destination for SELL
    let filled_symbol = if buy { &src } else { &dest };
    for quote in &batch.quotes {
        print_provider_quote(quote, filled_symbol);
    }

    // =============================================
    // PHASE 2: ARBITRATION
    // =============================================
    println!();
    println!("{}", style("═══ PHASE 2: ARBITRATION ═══").magenta().bold());
    println!();

    let Some(best) = select_best_quote(&batch.quotes) else {
        println!("{}", style("No provider produced a quote.").yellow());
        return Ok(());
    };

    println!(
        "{} Winner: {} at {} {}",
        style("🏆").magenta(),
        style(best.provider.to_string()).magenta().bold(),
        amount::format_amount(best.out_amount, 8),
        filled_symbol
    );

    let fixed: f64 = amount.parse().unwrap_or(0.0);
    if fixed > 0.0 && best.out_amount > 0.0 {
        let (rate_src, rate_dest, rate) = if buy {
            (&src, &dest, fixed / best.out_amount)
        } else {
            (&src, &dest, best.out_amount / fixed)
        };
        println!(
            "   Rate: 1 {} = {} {}",
            rate_src,
            amount::format_amount(rate, 8),
            rate_dest
        );
    }

    // =============================================
    // PHASE 3: EXECUTION
    // =============================================
    println!();
    println!("{}", style("═══ PHASE 3: EXECUTION ═══").yellow().bold());
    println!();

    let tx = build_executable(best, batch_gas_price(&batch.quotes, config.fallback_gas_price));
    println!("  Router: {:?}", tx.to);
    println!("  Calldata: {} bytes", tx.data.len());

    let submitter = TransactionSubmitter::new(config);

    if let Some(taker) = config.taker_address() {
        match submitter.estimate_fee(&tx, taker).await {
            Ok(fee) => println!(
                "  Fee estimate: {} gas, ~{:.6} MATIC",
                fee.gas_units, fee.native_cost
            ),
            Err(e) => warn!("fee estimate unavailable: {}", e),
        }
    }

    if send {
        let result = submitter.send(&tx).await?;
        match result {
            executor::SubmitResult::Broadcast { tx_hash } => {
                println!("{} Broadcast: {:?}", style("🚀").red(), tx_hash);
            }
            executor::SubmitResult::Skipped { reason } => {
                println!(
                    "{} Not broadcast ({}). Set EXECUTION_MODE=live to enable.",
                    style("📋").cyan(),
                    reason
                );
            }
        }
    } else if config.execution_mode == ExecutionMode::QuoteOnly {
        println!(
            "{} Mode: {} - pass --send with live mode to execute",
            style("📋").cyan(),
            style("QUOTE_ONLY").cyan().bold()
        );
    }

    Ok(())
}

async fn run_watch(config: &Config, amount: String, src: String, dest: String) -> Result<()> {
    let engine = build_engine(config);
    let balances = Arc::new(balance::RpcBalanceSource::new(config.rpc_url.clone()));
    let owner = config.taker_address().unwrap_or(Address::ZERO);

    let (session, mut state_rx) = Session::new(
        engine,
        balances,
        owner,
        SessionTiming::from_config(config),
        config.fallback_gas_price,
        &src,
        &dest,
        config.slippage_bps,
    );

    let (events_tx, events_rx) = tokio::sync::mpsc::unbounded_channel();
    events_tx.send(SessionEvent::EditSourceAmount(amount))?;

    let session_task = tokio::spawn(session.run(events_rx));

    println!(
        "Watching {} -> {} every {}s (ctrl-c to stop)",
        src, dest, config.refresh_interval_secs
    );
    println!();

    loop {
        tokio::select! {
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = state_rx.borrow_and_update().clone();
                if state.quoting {
                    continue;
                }
                if let Some(best) = &state.best {
                    let drift = match state.drift {
                        session::PriceDrift::Favorable => style("▲").green(),
                        session::PriceDrift::Unfavorable => style("▼").red(),
                        session::PriceDrift::Neutral => style("•").dim(),
                    };
                    print!(
                        "{} {} {} -> {} {}  via {}",
                        drift,
                        state.src_amount,
                        state.src_symbol,
                        state.dest_amount,
                        state.dest_symbol,
                        style(best.provider.to_string()).cyan()
                    );
                    if let Some((rate, _)) = state.rate_strings() {
                        print!("  ({})", rate);
                    }
                    if state.insufficient_balance {
                        print!("  {}", style("insufficient balance").yellow());
                    }
                    println!();
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("{}", style("Stopped.").dim());
                break;
            }
        }
    }

    session_task.abort();
    Ok(())
}

fn run_tokens() {
    println!("Token directory (Polygon, chain id 137):");
    println!();
    for token in all_tokens() {
        println!(
            "  {:8} {:28} {} decimals  {:?}",
            style(token.symbol).bold(),
            token.name,
            token.decimals,
            token.address
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("arbiter=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    print_banner();

    if let Command::Init { path } = &cli.command {
        let config = Config::default();
        config.save_to_file(path)?;
        println!(
            "{} Wrote default configuration to {}",
            style("✓").green(),
            path.display()
        );
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        error!("Please check your .env file");
        return Err(e);
    }
    config.print_summary();
    println!();

    match cli.command {
        Command::Quote {
            amount,
            src,
            dest,
            buy,
            slippage_bps,
            send,
        } => run_quote(&config, amount, src, dest, buy, slippage_bps, send).await,
        Command::Watch { amount, src, dest } => run_watch(&config, amount, src, dest).await,
        Command::Tokens => {
            run_tokens();
            Ok(())
        }
        // Handled before configuration loading
        Command::Init { .. } => Ok(()),
    }
}
