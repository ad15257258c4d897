pub mod http;
pub mod mock;

use async_trait::async_trait;
use futures::{stream, StreamExt};
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::error::BetError;
use crate::odds;
use crate::types::{
    BetSide, Market, MarketCategory, NewMarket, Position, PositionStatus, Quote, Shift,
    ShiftStatus,
};

/// Logical contract of the market/quote/settlement backend. The bet dialog
/// and the views are written against this, never against a concrete store.
#[async_trait]
pub trait MarketService: Send + Sync {
    /// List markets, optionally narrowed by category and/or a
    /// case-insensitive question search.
    async fn list_markets(
        &self,
        category: Option<MarketCategory>,
        search: Option<&str>,
    ) -> Result<Vec<Market>, BetError>;

    async fn get_market(&self, id: &str) -> Result<Market, BetError>;

    /// Price a deposit on one side of a market. The quote is held by the
    /// service until it expires or is consumed by `confirm_bet`.
    async fn get_quote(
        &self,
        market_id: &str,
        side: BetSide,
        deposit_amount: Decimal,
    ) -> Result<Quote, BetError>;

    /// Consume a quote, opening a deposit shift. Fails with `QuoteExpired`
    /// when called at or after the quote's expiry.
    async fn confirm_bet(&self, quote_id: &str) -> Result<Shift, BetError>;

    async fn get_shift_status(&self, shift_id: &str) -> Result<ShiftStatus, BetError>;

    async fn list_positions(&self, account: &str) -> Result<Vec<Position>, BetError>;

    async fn create_market(&self, req: NewMarket) -> Result<Market, BetError>;

    /// Claim a won position. Returns false when the position is not
    /// claimable (still active, lost, or already claimed).
    async fn claim_winnings(&self, position_id: &str) -> Result<bool, BetError>;
}

pub use http::HttpMarketService;
pub use mock::MockExchange;

/// Re-derive `current_price` for active positions from live market odds,
/// fetching the referenced markets with bounded concurrency.
pub async fn refresh_position_prices(
    svc: &dyn MarketService,
    positions: &mut [Position],
    concurrency: usize,
) -> Result<(), BetError> {
    let mut ids: Vec<String> = positions
        .iter()
        .filter(|p| p.status == PositionStatus::Active)
        .map(|p| p.market_id.clone())
        .collect();
    ids.sort();
    ids.dedup();
    if ids.is_empty() {
        return Ok(());
    }

    let mut fetched: HashMap<String, Market> = HashMap::with_capacity(ids.len());
    let mut stream = stream::iter(ids.into_iter().map(|id| async move {
        svc.get_market(&id).await
    }))
    .buffer_unordered(concurrency.max(1));

    while let Some(res) = stream.next().await {
        match res {
            Ok(m) => {
                fetched.insert(m.id.clone(), m);
            }
            // a position may reference a delisted market; leave its price
            Err(BetError::MarketNotFound(id)) => {
                tracing::warn!(market_id = %id, "position references unknown market");
            }
            Err(e) => return Err(e),
        }
    }

    for p in positions.iter_mut() {
        if p.status != PositionStatus::Active {
            continue;
        }
        if let Some(m) = fetched.get(&p.market_id) {
            p.current_price = odds::implied_price(m.pool_yes, m.pool_no, p.side);
        }
    }

    Ok(())
}
