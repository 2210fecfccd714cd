//! Error taxonomy for the quote arbitration flow
//!
//! Provider failures degrade to partial results and never escape the
//! flow; `Cancelled` is an expected outcome of superseding a request
//! and must be kept out of the error-logging path.

use thiserror::Error;

use crate::providers::ProviderId;

/// Errors produced while turning a trade intent into quotes
#[derive(Debug, Error)]
pub enum QuoteError {
    /// Symbol not present in the token directory; the quote cycle
    /// aborts silently (no state update)
    #[error("token {0} not found in directory")]
    UnknownToken(String),

    /// Network/HTTP failure from one provider. That provider simply
    /// contributes no quote this cycle
    #[error("{provider} request failed: {reason}")]
    ProviderRequestFailed {
        provider: ProviderId,
        reason: String,
    },

    /// A newer request superseded this one. Not a real failure
    #[error("request superseded before completion")]
    Cancelled,

    /// The provider answered but the payload was not usable
    #[error("{provider} returned a malformed response: {reason}")]
    MalformedResponse {
        provider: ProviderId,
        reason: String,
    },

    /// The user-entered amount could not be parsed as a decimal
    #[error("invalid amount {0:?}")]
    InvalidAmount(String),
}

impl QuoteError {
    /// Whether this error should appear in error logs. Cancellations
    /// are routine and stay at debug level
    pub fn is_loggable(&self) -> bool {
        !matches!(self, QuoteError::Cancelled)
    }

    /// Wrap a reqwest failure for the given provider
    pub fn from_transport(provider: ProviderId, err: reqwest::Error) -> Self {
        QuoteError::ProviderRequestFailed {
            provider,
            reason: err.to_string(),
        }
    }
}

pub type QuoteResult<T> = Result<T, QuoteError>;
