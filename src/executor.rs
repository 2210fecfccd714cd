//! Transaction submitter
//!
//! Takes the winning route's executable descriptor, produces a single
//! best-effort fee estimate for display, and (in live mode only) signs
//! and broadcasts it. There is no simulation, no gas-estimation retry,
//! and no receipt tracking - the flow ends at broadcast.
//!
//! ⚠️  Live mode spends real funds. The default is quote-only.

use alloy_network::EthereumWallet;
use alloy_primitives::{Address, B256};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_signer_local::PrivateKeySigner;
use eyre::{eyre, Result};
use tracing::{info, warn};

use crate::config::{Config, ExecutionMode};
use crate::engine::ExecutableTx;

/// Single best-effort fee estimate, display only
#[derive(Debug, Clone)]
pub struct FeeEstimate {
    pub gas_units: u64,
    /// Cost in the chain-native asset (MATIC)
    pub native_cost: f64,
}

/// Outcome of a submit attempt
#[derive(Debug, Clone)]
pub enum SubmitResult {
    /// Quote-only mode, nothing was broadcast
    Skipped { reason: String },

    /// Transaction handed to the network
    Broadcast { tx_hash: B256 },
}

impl SubmitResult {
    pub fn is_broadcast(&self) -> bool {
        matches!(self, SubmitResult::Broadcast { .. })
    }
}

/// Signs and broadcasts winning routes, gated by execution mode
pub struct TransactionSubmitter {
    rpc_url: String,
    signer_key: Option<String>,
    mode: ExecutionMode,
}

impl TransactionSubmitter {
    pub fn new(config: &Config) -> Self {
        Self {
            rpc_url: config.rpc_url.clone(),
            signer_key: config.signer_key.clone(),
            mode: config.execution_mode,
        }
    }

    /// Live mode needs a signing key before anything can be broadcast
    pub fn is_live_ready(&self) -> bool {
        self.mode == ExecutionMode::Live && self.signer_key.is_some()
    }

    fn to_request(tx: &ExecutableTx, from: Option<Address>) -> TransactionRequest {
        let mut request = TransactionRequest::default()
            .to(tx.to)
            .input(tx.data.clone().into())
            .value(tx.value)
            .max_fee_per_gas(tx.max_fee_per_gas)
            .max_priority_fee_per_gas(tx.max_priority_fee_per_gas);
        if let Some(from) = from {
            request = request.from(from);
        }
        request
    }

    /// One `eth_estimateGas` for the fee line. Failures surface as an
    /// error the caller may ignore - the quote itself is unaffected
    pub async fn estimate_fee(&self, tx: &ExecutableTx, from: Address) -> Result<FeeEstimate> {
        let provider = ProviderBuilder::new().connect_http(self.rpc_url.parse()?);

        let gas_units = provider
            .estimate_gas(Self::to_request(tx, Some(from)))
            .await
            .map_err(|e| eyre!("gas estimate failed: {}", e))?;

        let native_cost = (gas_units as f64) * (tx.max_fee_per_gas as f64) / 1e18;

        Ok(FeeEstimate {
            gas_units,
            native_cost,
        })
    }

    /// Broadcast the winning route. In quote-only mode this logs what
    /// would happen and returns `Skipped`
    pub async fn send(&self, tx: &ExecutableTx) -> Result<SubmitResult> {
        match self.mode {
            ExecutionMode::QuoteOnly => {
                info!("📋 quote-only mode: would send {} bytes to {:?}", tx.data.len(), tx.to);
                Ok(SubmitResult::Skipped {
                    reason: "quote-only mode".to_string(),
                })
            }
            ExecutionMode::Live => {
                let key = self
                    .signer_key
                    .as_ref()
                    .ok_or_else(|| eyre!("live mode requires SIGNER_KEY"))?;

                let signer: PrivateKeySigner = key
                    .parse()
                    .map_err(|_| eyre!("SIGNER_KEY is not a valid private key"))?;
                let wallet = EthereumWallet::from(signer);

                let provider = ProviderBuilder::new()
                    .wallet(wallet)
                    .connect_http(self.rpc_url.parse()?);

                warn!("🚀 broadcasting swap to {:?} (live mode)", tx.to);

                let pending = provider
                    .send_transaction(Self::to_request(tx, None))
                    .await
                    .map_err(|e| eyre!("broadcast failed: {}", e))?;

                let tx_hash = *pending.tx_hash();
                info!("swap broadcast: {:?}", tx_hash);

                Ok(SubmitResult::Broadcast { tx_hash })
            }
        }
    }
}
