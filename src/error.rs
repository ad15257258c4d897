use thiserror::Error;

use crate::types::ShiftStatus;

/// Failures surfaced by the odds engine, the bet dialog, and the
/// market/quote/settlement service.
#[derive(Debug, Clone, Error)]
pub enum BetError {
    /// Non-numeric, non-positive, or below the minimum deposit.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("market not found: {0}")]
    MarketNotFound(String),

    /// Confirm attempted after the quote window elapsed.
    #[error("quote {0} has expired")]
    QuoteExpired(String),

    /// The settlement service reported a status that moved backward.
    /// Fatal to the polling session.
    #[error("settlement status regressed from {from:?} to {to:?}")]
    SettlementAnomaly { from: ShiftStatus, to: ShiftStatus },

    /// Network or service failure, including request timeouts.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Rejected request (bad market-creation payload, unknown quote id,
    /// action not allowed in the current state).
    #[error("validation failed: {0}")]
    Validation(String),
}
