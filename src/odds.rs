//! Pool-based odds and quote math. Pure arithmetic, no I/O.
//!
//! Payout follows the winner-take-all parimutuel model: the bettor's share of
//! the (post-deposit) side pool is applied to the whole (post-deposit) total
//! pool, so losers' stakes are redistributed pro-rata among winners.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

use crate::error::BetError;
use crate::types::{BetSide, Market};

/// Display odds for both sides, as whole percentages.
///
/// Each side is rounded independently from its true ratio, so the two
/// values may sum to 99 or 101. That is accepted; neither side is derived
/// from the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OddsPair {
    pub yes_pct: u8,
    pub no_pct: u8,
}

/// Convert pooled liquidity into display odds.
///
/// An uninitialized market (both pools zero) reports the neutral 50/50
/// prior. YES maps to the YES pool's share of the total: the more money
/// already backing a side, the likelier (and less lucrative) that side.
/// Negative pools are a caller bug; validate at the boundary.
pub fn compute_odds(pool_yes: Decimal, pool_no: Decimal) -> OddsPair {
    debug_assert!(pool_yes >= Decimal::ZERO && pool_no >= Decimal::ZERO);

    let total = pool_yes + pool_no;
    if total.is_zero() {
        return OddsPair {
            yes_pct: 50,
            no_pct: 50,
        };
    }

    OddsPair {
        yes_pct: pool_pct(pool_yes, total),
        no_pct: pool_pct(pool_no, total),
    }
}

fn pool_pct(side: Decimal, total: Decimal) -> u8 {
    let pct = (side * dec!(100) / total)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    // ratio is in [0, 1], so this always fits
    pct.to_u8().unwrap_or(100).min(100)
}

/// Implied probability of one side, 0..1. Empty markets price at 0.5.
pub fn implied_price(pool_yes: Decimal, pool_no: Decimal, side: BetSide) -> Decimal {
    let total = pool_yes + pool_no;
    if total.is_zero() {
        return dec!(0.5);
    }
    match side {
        BetSide::Yes => pool_yes / total,
        BetSide::No => pool_no / total,
    }
}

/// Priced terms for a proposed bet.
#[derive(Debug, Clone)]
pub struct QuoteTerms {
    pub expected_payout: Decimal,
    /// Payout per unit deposited, for display.
    pub rate: Decimal,
    pub expires_at: DateTime<Utc>,
}

/// Price a deposit against the current pool state.
///
/// Payout and rate depend only on the pools and the amount; only
/// `expires_at` reads the clock.
pub fn compute_quote(
    market: &Market,
    side: BetSide,
    deposit: Decimal,
    window: Duration,
) -> Result<QuoteTerms, BetError> {
    if deposit <= Decimal::ZERO {
        return Err(BetError::InvalidAmount(format!(
            "deposit must be positive, got {deposit}"
        )));
    }

    let side_pool = match side {
        BetSide::Yes => market.pool_yes,
        BetSide::No => market.pool_no,
    };

    // deposit > 0 keeps the denominator strictly positive even for a
    // freshly created market
    let share = deposit / (side_pool + deposit);
    let expected_payout = share * (market.pool_total() + deposit);
    let rate = expected_payout / deposit;

    Ok(QuoteTerms {
        expected_payout,
        rate,
        expires_at: Utc::now() + window,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MarketCategory, MarketStatus};

    fn market(pool_yes: Decimal, pool_no: Decimal) -> Market {
        Market {
            id: "m-test".into(),
            question: "test market".into(),
            category: MarketCategory::Crypto,
            end_date: Utc::now() + Duration::days(30),
            status: MarketStatus::Active,
            pool_yes,
            pool_no,
            participants: 0,
            resolved_winner: None,
        }
    }

    #[test]
    fn empty_market_is_even_odds() {
        let odds = compute_odds(dec!(0), dec!(0));
        assert_eq!(odds.yes_pct, 50);
        assert_eq!(odds.no_pct, 50);
    }

    #[test]
    fn odds_match_pool_shares() {
        // 850000 / 1542050 = 55.12% -> 55, 692050 / 1542050 = 44.88% -> 45
        let odds = compute_odds(dec!(850000), dec!(692050));
        assert_eq!(odds.yes_pct, 55);
        assert_eq!(odds.no_pct, 45);
    }

    #[test]
    fn odds_are_bounded() {
        for (y, n) in [
            (dec!(0), dec!(1)),
            (dec!(1), dec!(0)),
            (dec!(0.0001), dec!(999999)),
            (dec!(123456.78), dec!(0.01)),
            (dec!(1), dec!(1)),
        ] {
            let odds = compute_odds(y, n);
            assert!(odds.yes_pct <= 100);
            assert!(odds.no_pct <= 100);
            let sum = odds.yes_pct as i32 + odds.no_pct as i32;
            assert!((99..=101).contains(&sum), "sum {sum} for {y}/{n}");
        }
    }

    #[test]
    fn yes_pct_grows_with_yes_pool() {
        let mut prev = 0u8;
        for y in [1u32, 10, 100, 1000, 10000, 100000] {
            let odds = compute_odds(Decimal::from(y), dec!(500));
            assert!(odds.yes_pct >= prev, "not monotonic at pool_yes={y}");
            prev = odds.yes_pct;
        }
    }

    #[test]
    fn implied_price_defaults_to_half() {
        assert_eq!(implied_price(dec!(0), dec!(0), BetSide::Yes), dec!(0.5));
        assert_eq!(implied_price(dec!(75), dec!(25), BetSide::Yes), dec!(0.75));
        assert_eq!(implied_price(dec!(75), dec!(25), BetSide::No), dec!(0.25));
    }

    #[test]
    fn quote_rejects_non_positive_deposits() {
        let m = market(dec!(100), dec!(100));
        for bad in [dec!(0), dec!(-1), dec!(-0.01)] {
            let err = compute_quote(&m, BetSide::Yes, bad, Duration::seconds(120));
            assert!(matches!(err, Err(BetError::InvalidAmount(_))), "{bad}");
        }
    }

    #[test]
    fn quote_matches_parimutuel_example() {
        // $100 on YES into 850000/692050: share = 100/850100 of a
        // 1542150 total pool
        let m = market(dec!(850000), dec!(692050));
        let terms = compute_quote(&m, BetSide::Yes, dec!(100), Duration::seconds(120)).unwrap();
        assert_eq!(terms.expected_payout.round_dp(2), dec!(181.41));
        assert_eq!(terms.rate.round_dp(4), dec!(1.8141));
    }

    #[test]
    fn quote_is_pure_in_payout_and_rate() {
        let m = market(dec!(850000), dec!(692050));
        let a = compute_quote(&m, BetSide::Yes, dec!(100), Duration::seconds(120)).unwrap();
        let b = compute_quote(&m, BetSide::Yes, dec!(100), Duration::seconds(120)).unwrap();
        assert_eq!(a.expected_payout, b.expected_payout);
        assert_eq!(a.rate, b.rate);
    }

    #[test]
    fn payout_never_below_deposit() {
        // total + d >= side + d for any non-negative opposite pool, so the
        // rate is >= 1; it degrades toward 1 as the chosen side dominates
        let balanced = compute_quote(&market(dec!(50), dec!(50)), BetSide::Yes, dec!(10), Duration::seconds(120)).unwrap();
        assert!(balanced.expected_payout > dec!(10));

        let lopsided = compute_quote(&market(dec!(1000000), dec!(1)), BetSide::Yes, dec!(10), Duration::seconds(120)).unwrap();
        assert!(lopsided.expected_payout >= dec!(10));
        assert!(lopsided.rate < dec!(1.01));

        // nothing on the other side: winners only get their own stakes back
        let solo = compute_quote(&market(dec!(500), dec!(0)), BetSide::Yes, dec!(10), Duration::seconds(120)).unwrap();
        assert_eq!(solo.expected_payout.round_dp(6), dec!(10));
    }

    #[test]
    fn quote_expiry_is_stamped_from_window() {
        let m = market(dec!(100), dec!(100));
        let before = Utc::now();
        let terms = compute_quote(&m, BetSide::No, dec!(25), Duration::seconds(120)).unwrap();
        assert!(terms.expires_at >= before + Duration::seconds(120));
        assert!(terms.expires_at <= Utc::now() + Duration::seconds(120));
    }
}
