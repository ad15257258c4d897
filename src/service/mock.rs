//! In-memory exchange used by tests and the demo binary.
//!
//! Quotes are priced by the odds engine and retained so confirmation can
//! enforce expiry. Shift settlement advances deterministically one step per
//! poll, which keeps the dialog's polling behavior reproducible.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use crate::error::BetError;
use crate::odds;
use crate::service::MarketService;
use crate::types::{
    BetSide, Market, MarketCategory, MarketStatus, NewMarket, Position, PositionStatus, Quote,
    Shift, ShiftStatus,
};

const DEPOSIT_ADDRESS: &str = "0x71C7656EC7ab88b098defB751B7401B5f6d8976F";
const DEPOSIT_ASSET: &str = "USDC";

struct ShiftRecord {
    shift: Shift,
    polls: u32,
}

#[derive(Default)]
struct MockState {
    markets: Vec<Market>,
    quotes: HashMap<String, Quote>,
    shifts: HashMap<String, ShiftRecord>,
    positions: Vec<Position>,
}

pub struct MockExchange {
    state: Mutex<MockState>,
    quote_window: Duration,
}

impl MockExchange {
    pub fn new(quote_window: Duration) -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            quote_window,
        }
    }

    /// Exchange pre-loaded with the demo markets and positions.
    pub fn seeded(quote_window: Duration) -> Self {
        let ex = Self::new(quote_window);
        {
            let mut st = ex.lock();
            st.markets = seed_markets();
            st.positions = seed_positions();
        }
        ex
    }

    /// Settle a market: assign the winner and move its active positions to
    /// won/lost with realized pnl. Winners split the whole pool pro-rata.
    pub fn resolve_market(&self, market_id: &str, winner: BetSide) -> Result<(), BetError> {
        let mut st = self.lock();
        let m = st
            .markets
            .iter_mut()
            .find(|m| m.id == market_id)
            .ok_or_else(|| BetError::MarketNotFound(market_id.to_string()))?;

        m.status = MarketStatus::Resolved;
        m.resolved_winner = Some(winner);
        let winner_pool = match winner {
            BetSide::Yes => m.pool_yes,
            BetSide::No => m.pool_no,
        };
        let total = m.pool_total();

        for p in st
            .positions
            .iter_mut()
            .filter(|p| p.market_id == market_id && p.status == PositionStatus::Active)
        {
            if p.side == winner {
                p.status = PositionStatus::Won;
                let payout = if winner_pool.is_zero() {
                    p.amount
                } else {
                    p.amount / winner_pool * total
                };
                p.pnl = Some(payout - p.amount);
                p.current_price = Decimal::ONE;
            } else {
                p.status = PositionStatus::Lost;
                p.pnl = Some(-p.amount);
                p.current_price = Decimal::ZERO;
            }
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().expect("mock exchange state poisoned")
    }
}

#[async_trait]
impl MarketService for MockExchange {
    async fn list_markets(
        &self,
        category: Option<MarketCategory>,
        search: Option<&str>,
    ) -> Result<Vec<Market>, BetError> {
        let st = self.lock();
        let needle = search.map(|s| s.to_lowercase());
        Ok(st
            .markets
            .iter()
            .filter(|m| category.map_or(true, |c| m.category == c))
            .filter(|m| {
                needle
                    .as_deref()
                    .map_or(true, |q| m.question.to_lowercase().contains(q))
            })
            .cloned()
            .collect())
    }

    async fn get_market(&self, id: &str) -> Result<Market, BetError> {
        let st = self.lock();
        st.markets
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| BetError::MarketNotFound(id.to_string()))
    }

    async fn get_quote(
        &self,
        market_id: &str,
        side: BetSide,
        deposit_amount: Decimal,
    ) -> Result<Quote, BetError> {
        let mut st = self.lock();
        let market = st
            .markets
            .iter()
            .find(|m| m.id == market_id)
            .cloned()
            .ok_or_else(|| BetError::MarketNotFound(market_id.to_string()))?;
        if market.status != MarketStatus::Active {
            return Err(BetError::Validation(format!(
                "market {market_id} is not accepting bets"
            )));
        }

        let terms = odds::compute_quote(&market, side, deposit_amount, self.quote_window)?;
        let quote = Quote {
            id: format!("q-{}", Uuid::new_v4()),
            market_id: market.id,
            side,
            deposit_amount,
            expected_payout: terms.expected_payout,
            rate: terms.rate,
            expires_at: terms.expires_at,
        };
        st.quotes.insert(quote.id.clone(), quote.clone());
        Ok(quote)
    }

    async fn confirm_bet(&self, quote_id: &str) -> Result<Shift, BetError> {
        let mut st = self.lock();
        let quote = st
            .quotes
            .get(quote_id)
            .cloned()
            .ok_or_else(|| BetError::Validation(format!("unknown quote id {quote_id}")))?;
        if Utc::now() >= quote.expires_at {
            st.quotes.remove(quote_id);
            return Err(BetError::QuoteExpired(quote_id.to_string()));
        }
        st.quotes.remove(quote_id);

        // entry odds are the pre-deposit implied price
        let (entry_price, question) = {
            let m = st
                .markets
                .iter_mut()
                .find(|m| m.id == quote.market_id)
                .ok_or_else(|| BetError::MarketNotFound(quote.market_id.clone()))?;
            let entry = odds::implied_price(m.pool_yes, m.pool_no, quote.side);
            match quote.side {
                BetSide::Yes => m.pool_yes += quote.deposit_amount,
                BetSide::No => m.pool_no += quote.deposit_amount,
            }
            m.participants += 1;
            (entry, m.question.clone())
        };

        let shift = Shift {
            id: format!("shift-{}", Uuid::new_v4()),
            market_id: quote.market_id.clone(),
            side: quote.side,
            deposit_address: DEPOSIT_ADDRESS.to_string(),
            deposit_amount: quote.deposit_amount,
            deposit_asset: DEPOSIT_ASSET.to_string(),
            status: ShiftStatus::Waiting,
        };
        st.shifts.insert(
            shift.id.clone(),
            ShiftRecord {
                shift: shift.clone(),
                polls: 0,
            },
        );
        st.positions.push(Position {
            id: format!("pos-{}", Uuid::new_v4()),
            market_id: quote.market_id,
            market_question: question,
            side: quote.side,
            amount: quote.deposit_amount,
            entry_price,
            current_price: entry_price,
            status: PositionStatus::Active,
            pnl: None,
        });
        Ok(shift)
    }

    async fn get_shift_status(&self, shift_id: &str) -> Result<ShiftStatus, BetError> {
        let mut st = self.lock();
        let rec = st
            .shifts
            .get_mut(shift_id)
            .ok_or_else(|| BetError::Validation(format!("unknown shift id {shift_id}")))?;
        rec.polls += 1;
        let status = match rec.polls {
            1 => ShiftStatus::Waiting,
            2 => ShiftStatus::Received,
            _ => ShiftStatus::Confirmed,
        };
        rec.shift.status = status;
        Ok(status)
    }

    async fn list_positions(&self, _account: &str) -> Result<Vec<Position>, BetError> {
        Ok(self.lock().positions.clone())
    }

    async fn create_market(&self, req: NewMarket) -> Result<Market, BetError> {
        if req.question.trim().is_empty() {
            return Err(BetError::Validation("question must not be empty".into()));
        }
        if req.end_date <= Utc::now() {
            return Err(BetError::Validation("end date must be in the future".into()));
        }
        if req.min_bet <= Decimal::ZERO {
            return Err(BetError::Validation("minimum bet must be positive".into()));
        }

        let market = Market {
            id: format!("m-{}", Uuid::new_v4()),
            question: req.question,
            category: req.category,
            end_date: req.end_date,
            status: MarketStatus::Active,
            pool_yes: Decimal::ZERO,
            pool_no: Decimal::ZERO,
            participants: 0,
            resolved_winner: None,
        };
        self.lock().markets.insert(0, market.clone());
        Ok(market)
    }

    async fn claim_winnings(&self, position_id: &str) -> Result<bool, BetError> {
        let mut st = self.lock();
        let p = st
            .positions
            .iter_mut()
            .find(|p| p.id == position_id)
            .ok_or_else(|| BetError::Validation(format!("unknown position id {position_id}")))?;
        match p.status {
            PositionStatus::Won => {
                p.status = PositionStatus::Claimed;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

fn ts(s: &str) -> DateTime<Utc> {
    s.parse().expect("static timestamp")
}

fn seed_markets() -> Vec<Market> {
    vec![
        Market {
            id: "m-1".into(),
            question: "Will Bitcoin break $150k by end of 2026?".into(),
            category: MarketCategory::Crypto,
            end_date: ts("2026-12-31T23:59:00Z"),
            status: MarketStatus::Active,
            pool_yes: dec!(850000),
            pool_no: dec!(692050),
            participants: 1205,
            resolved_winner: None,
        },
        Market {
            id: "m-2".into(),
            question: "Will SpaceX land Starship on Mars in 2027?".into(),
            category: MarketCategory::Tech,
            end_date: ts("2027-12-31T23:59:00Z"),
            status: MarketStatus::Active,
            pool_yes: dec!(120000),
            pool_no: dec!(420000),
            participants: 450,
            resolved_winner: None,
        },
        Market {
            id: "m-3".into(),
            question: "Will the US Fed cut rates before July 2027?".into(),
            category: MarketCategory::Politics,
            end_date: ts("2027-06-30T23:59:00Z"),
            status: MarketStatus::Active,
            pool_yes: dec!(2600000),
            pool_no: dec!(2600000),
            participants: 15000,
            resolved_winner: None,
        },
        Market {
            id: "m-4".into(),
            question: "Will Ethereum flip Bitcoin in market cap by 2026?".into(),
            category: MarketCategory::Crypto,
            end_date: ts("2026-01-01T00:00:00Z"),
            status: MarketStatus::Resolved,
            pool_yes: dec!(100000),
            pool_no: dec!(790000),
            participants: 890,
            resolved_winner: Some(BetSide::No),
        },
        Market {
            id: "m-5".into(),
            question: "Will Manchester City win the 2027 Champions League?".into(),
            category: MarketCategory::Sports,
            end_date: ts("2027-06-01T23:59:00Z"),
            status: MarketStatus::Active,
            pool_yes: dec!(40000),
            pool_no: dec!(30000),
            participants: 450,
            resolved_winner: None,
        },
    ]
}

fn seed_positions() -> Vec<Position> {
    vec![
        Position {
            id: "pos-1".into(),
            market_id: "m-1".into(),
            market_question: "Will Bitcoin break $150k by end of 2026?".into(),
            side: BetSide::Yes,
            amount: dec!(500),
            entry_price: dec!(0.55),
            current_price: dec!(0.55),
            status: PositionStatus::Active,
            pnl: None,
        },
        Position {
            id: "pos-2".into(),
            market_id: "m-4".into(),
            market_question: "Will Ethereum flip Bitcoin in market cap by 2026?".into(),
            side: BetSide::No,
            amount: dec!(200),
            entry_price: dec!(0.80),
            current_price: dec!(1.00),
            status: PositionStatus::Won,
            pnl: Some(dec!(50)),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange() -> MockExchange {
        MockExchange::seeded(Duration::seconds(120))
    }

    #[tokio::test]
    async fn list_markets_filters_by_category_and_search() {
        let ex = exchange();
        let all = ex.list_markets(None, None).await.unwrap();
        assert_eq!(all.len(), 5);

        let crypto = ex
            .list_markets(Some(MarketCategory::Crypto), None)
            .await
            .unwrap();
        assert_eq!(crypto.len(), 2);
        assert!(crypto.iter().all(|m| m.category == MarketCategory::Crypto));

        let bitcoin = ex.list_markets(None, Some("bitcoin")).await.unwrap();
        assert_eq!(bitcoin.len(), 2);

        let none = ex
            .list_markets(Some(MarketCategory::Sports), Some("bitcoin"))
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn get_market_unknown_id() {
        let ex = exchange();
        let err = ex.get_market("m-999").await;
        assert!(matches!(err, Err(BetError::MarketNotFound(_))));
    }

    #[tokio::test]
    async fn quote_then_confirm_opens_shift_and_position() {
        let ex = exchange();
        let before = ex.get_market("m-5").await.unwrap();

        let quote = ex
            .get_quote("m-5", BetSide::Yes, dec!(100))
            .await
            .unwrap();
        // 100/40100 of a 70100 pool
        assert_eq!(quote.expected_payout.round_dp(2), dec!(174.81));

        let shift = ex.confirm_bet(&quote.id).await.unwrap();
        assert_eq!(shift.status, ShiftStatus::Waiting);
        assert_eq!(shift.market_id, "m-5");
        assert_eq!(shift.deposit_amount, dec!(100));

        let after = ex.get_market("m-5").await.unwrap();
        assert_eq!(after.pool_yes, before.pool_yes + dec!(100));
        assert_eq!(after.pool_no, before.pool_no);
        assert_eq!(after.participants, before.participants + 1);

        let positions = ex.list_positions("0xdemo").await.unwrap();
        let opened = positions
            .iter()
            .find(|p| p.market_id == "m-5")
            .expect("position opened");
        assert_eq!(opened.status, PositionStatus::Active);
        assert_eq!(
            opened.entry_price,
            odds::implied_price(before.pool_yes, before.pool_no, BetSide::Yes)
        );

        // quote was consumed
        let err = ex.confirm_bet(&quote.id).await;
        assert!(matches!(err, Err(BetError::Validation(_))));
    }

    #[tokio::test]
    async fn expired_quote_cannot_be_confirmed() {
        let ex = MockExchange::seeded(Duration::zero());
        let positions_before = ex.list_positions("0xdemo").await.unwrap().len();

        let quote = ex.get_quote("m-1", BetSide::No, dec!(50)).await.unwrap();
        let err = ex.confirm_bet(&quote.id).await;
        assert!(matches!(err, Err(BetError::QuoteExpired(_))));

        // no shift, no position
        assert_eq!(
            ex.list_positions("0xdemo").await.unwrap().len(),
            positions_before
        );
    }

    #[tokio::test]
    async fn quote_rejects_bad_input() {
        let ex = exchange();
        assert!(matches!(
            ex.get_quote("m-1", BetSide::Yes, dec!(0)).await,
            Err(BetError::InvalidAmount(_))
        ));
        assert!(matches!(
            ex.get_quote("m-999", BetSide::Yes, dec!(50)).await,
            Err(BetError::MarketNotFound(_))
        ));
        // resolved market no longer quotes
        assert!(matches!(
            ex.get_quote("m-4", BetSide::Yes, dec!(50)).await,
            Err(BetError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn shift_status_advances_deterministically() {
        let ex = exchange();
        let quote = ex.get_quote("m-1", BetSide::Yes, dec!(25)).await.unwrap();
        let shift = ex.confirm_bet(&quote.id).await.unwrap();

        let mut seen = vec![];
        for _ in 0..4 {
            seen.push(ex.get_shift_status(&shift.id).await.unwrap());
        }
        assert_eq!(
            seen,
            vec![
                ShiftStatus::Waiting,
                ShiftStatus::Received,
                ShiftStatus::Confirmed,
                ShiftStatus::Confirmed,
            ]
        );
    }

    #[tokio::test]
    async fn create_market_validates_payload() {
        let ex = exchange();
        let valid = NewMarket {
            question: "Will it rain tomorrow?".into(),
            category: MarketCategory::Sports,
            end_date: Utc::now() + Duration::days(7),
            min_bet: dec!(10),
        };

        let empty_question = NewMarket {
            question: "   ".into(),
            ..valid.clone()
        };
        assert!(matches!(
            ex.create_market(empty_question).await,
            Err(BetError::Validation(_))
        ));

        let past_end = NewMarket {
            end_date: Utc::now() - Duration::days(1),
            ..valid.clone()
        };
        assert!(matches!(
            ex.create_market(past_end).await,
            Err(BetError::Validation(_))
        ));

        let bad_min = NewMarket {
            min_bet: dec!(0),
            ..valid.clone()
        };
        assert!(matches!(
            ex.create_market(bad_min).await,
            Err(BetError::Validation(_))
        ));

        let created = ex.create_market(valid).await.unwrap();
        assert_eq!(created.status, MarketStatus::Active);
        assert_eq!(created.pool_total(), Decimal::ZERO);
        assert!(ex
            .list_markets(None, Some("rain"))
            .await
            .unwrap()
            .iter()
            .any(|m| m.id == created.id));
    }

    #[tokio::test]
    async fn resolve_then_claim() {
        let ex = exchange();
        ex.resolve_market("m-1", BetSide::Yes).unwrap();

        let m = ex.get_market("m-1").await.unwrap();
        assert_eq!(m.status, MarketStatus::Resolved);
        assert_eq!(m.resolved_winner, Some(BetSide::Yes));

        let positions = ex.list_positions("0xdemo").await.unwrap();
        let p = positions.iter().find(|p| p.id == "pos-1").unwrap();
        assert_eq!(p.status, PositionStatus::Won);
        // 500/850000 of the 1542050 pool, minus the stake
        assert_eq!(p.pnl.unwrap().round_dp(2), dec!(407.09));

        assert!(ex.claim_winnings("pos-1").await.unwrap());
        let positions = ex.list_positions("0xdemo").await.unwrap();
        let p = positions.iter().find(|p| p.id == "pos-1").unwrap();
        assert_eq!(p.status, PositionStatus::Claimed);

        // second claim is a no-op
        assert!(!ex.claim_winnings("pos-1").await.unwrap());
    }

    #[tokio::test]
    async fn losing_side_realizes_negative_pnl() {
        let ex = exchange();
        ex.resolve_market("m-1", BetSide::No).unwrap();
        let positions = ex.list_positions("0xdemo").await.unwrap();
        let p = positions.iter().find(|p| p.id == "pos-1").unwrap();
        assert_eq!(p.status, PositionStatus::Lost);
        assert_eq!(p.pnl, Some(dec!(-500)));
        assert!(!ex.claim_winnings("pos-1").await.unwrap());
    }
}
