use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketStatus {
    Active,
    Resolved,
    Canceled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketCategory {
    Crypto,
    Sports,
    Politics,
    Tech,
}

impl MarketCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            MarketCategory::Crypto => "Crypto",
            MarketCategory::Sports => "Sports",
            MarketCategory::Politics => "Politics",
            MarketCategory::Tech => "Tech",
        }
    }
}

/// Which outcome a bet backs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BetSide {
    Yes,
    No,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub id: String,
    pub question: String,
    pub category: MarketCategory,
    pub end_date: DateTime<Utc>,
    pub status: MarketStatus,
    pub pool_yes: Decimal,
    pub pool_no: Decimal,
    pub participants: u64,
    #[serde(default)]
    pub resolved_winner: Option<BetSide>,
}

impl Market {
    /// Total staked across both sides. Derived so it can never drift from
    /// the side pools.
    pub fn pool_total(&self) -> Decimal {
        self.pool_yes + self.pool_no
    }
}

/// Time-bounded, non-binding payout estimate for a proposed bet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub id: String,
    pub market_id: String,
    pub side: BetSide,
    pub deposit_amount: Decimal,
    pub expected_payout: Decimal,
    pub rate: Decimal,
    pub expires_at: DateTime<Utc>,
}

/// Settlement status of a deposit. Moves forward only:
/// waiting -> received -> confirmed, or any non-terminal -> failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShiftStatus {
    Waiting,
    Received,
    Confirmed,
    Failed,
}

impl ShiftStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ShiftStatus::Confirmed | ShiftStatus::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            ShiftStatus::Waiting => 0,
            ShiftStatus::Received => 1,
            ShiftStatus::Confirmed => 2,
            ShiftStatus::Failed => 3,
        }
    }

    /// A read that moves backward through the ordering violates the
    /// settlement service contract.
    pub fn regresses_from(self, prev: ShiftStatus) -> bool {
        self.rank() < prev.rank()
    }
}

/// Tracked deposit-to-settlement record for one bet entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shift {
    pub id: String,
    pub market_id: String,
    pub side: BetSide,
    pub deposit_address: String,
    pub deposit_amount: Decimal,
    pub deposit_asset: String,
    pub status: ShiftStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    Active,
    Won,
    Lost,
    Claimed,
}

/// A user's stake in a market outcome, from entry to resolution/claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub market_id: String,
    pub market_question: String,
    pub side: BetSide,
    pub amount: Decimal,
    /// Implied probability of the chosen side at entry, 0..1.
    pub entry_price: Decimal,
    /// Implied probability now; tracks live odds while the position is active.
    pub current_price: Decimal,
    pub status: PositionStatus,
    #[serde(default)]
    pub pnl: Option<Decimal>,
}

/// Market-creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMarket {
    pub question: String,
    pub category: MarketCategory,
    pub end_date: DateTime<Utc>,
    pub min_bet: Decimal,
}
