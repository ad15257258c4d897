pub mod dialog;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;

/// Where the dialog currently is in the bet flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BetStep {
    /// Side selection and amount entry.
    Input,
    /// Holding a quote, awaiting confirm or back.
    Quoted,
    /// Shift open, settlement poller running.
    Depositing,
    /// Deposit confirmed. Terminal; only close() leaves it.
    Settled,
    /// Settlement ended without a confirmed deposit (failed shift or
    /// anomalous status). Terminal; only close() leaves it.
    Failed,
}

#[derive(Debug, Clone)]
pub struct DialogConfig {
    pub min_bet: Decimal,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self {
            min_bet: dec!(10),
            poll_interval: Duration::from_secs(3),
            request_timeout: Duration::from_secs(10),
        }
    }
}

pub use dialog::BetDialog;
