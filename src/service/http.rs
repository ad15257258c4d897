//! REST client for a live market backend speaking the same logical
//! contract as the in-memory exchange. Wire DTOs are kept separate from
//! the domain types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::BetError;
use crate::service::MarketService;
use crate::types::{
    BetSide, Market, MarketCategory, MarketStatus, NewMarket, Position, PositionStatus, Quote,
    Shift, ShiftStatus,
};

pub struct HttpMarketService {
    host: String,
    http: reqwest::Client,
}

impl HttpMarketService {
    pub fn new(host: String, timeout: std::time::Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("build reqwest client");
        Self {
            host: host.trim_end_matches('/').to_string(),
            http,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.host, path)
    }
}

fn transport_err(e: reqwest::Error) -> BetError {
    BetError::ServiceUnavailable(e.to_string())
}

fn decode_err(e: reqwest::Error) -> BetError {
    BetError::ServiceUnavailable(format!("decode response failed: {e}"))
}

#[async_trait]
impl MarketService for HttpMarketService {
    async fn list_markets(
        &self,
        category: Option<MarketCategory>,
        search: Option<&str>,
    ) -> Result<Vec<Market>, BetError> {
        let mut req = self.http.get(self.url("/markets"));
        if let Some(c) = category {
            req = req.query(&[("category", c.as_str())]);
        }
        if let Some(q) = search {
            req = req.query(&[("search", q)]);
        }

        let resp = req.send().await.map_err(transport_err)?;
        let resp = resp.error_for_status().map_err(transport_err)?;
        let items: Vec<MarketDto> = resp.json().await.map_err(decode_err)?;
        items.into_iter().map(MarketDto::into_market).collect()
    }

    async fn get_market(&self, id: &str) -> Result<Market, BetError> {
        let resp = self
            .http
            .get(self.url(&format!("/markets/{id}")))
            .send()
            .await
            .map_err(transport_err)?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(BetError::MarketNotFound(id.to_string()));
        }
        let resp = resp.error_for_status().map_err(transport_err)?;
        let dto: MarketDto = resp.json().await.map_err(decode_err)?;
        dto.into_market()
    }

    async fn get_quote(
        &self,
        market_id: &str,
        side: BetSide,
        deposit_amount: Decimal,
    ) -> Result<Quote, BetError> {
        let body = QuoteRequestDto {
            market_id: market_id.to_string(),
            bet_yes: side == BetSide::Yes,
            deposit_amount,
        };
        let resp = self
            .http
            .post(self.url("/quotes"))
            .json(&body)
            .send()
            .await
            .map_err(transport_err)?;
        match resp.status() {
            StatusCode::NOT_FOUND => return Err(BetError::MarketNotFound(market_id.to_string())),
            StatusCode::BAD_REQUEST => {
                return Err(BetError::InvalidAmount(format!(
                    "rejected deposit amount {deposit_amount}"
                )))
            }
            _ => {}
        }
        let resp = resp.error_for_status().map_err(transport_err)?;
        let dto: QuoteDto = resp.json().await.map_err(decode_err)?;
        Ok(dto.into_quote())
    }

    async fn confirm_bet(&self, quote_id: &str) -> Result<Shift, BetError> {
        let body = ConfirmRequestDto {
            quote_id: quote_id.to_string(),
        };
        let resp = self
            .http
            .post(self.url("/bets"))
            .json(&body)
            .send()
            .await
            .map_err(transport_err)?;
        if resp.status() == StatusCode::GONE {
            return Err(BetError::QuoteExpired(quote_id.to_string()));
        }
        let resp = resp.error_for_status().map_err(transport_err)?;
        let dto: ShiftDto = resp.json().await.map_err(decode_err)?;
        Ok(dto.into_shift())
    }

    async fn get_shift_status(&self, shift_id: &str) -> Result<ShiftStatus, BetError> {
        let resp = self
            .http
            .get(self.url(&format!("/shifts/{shift_id}/status")))
            .send()
            .await
            .map_err(transport_err)?;
        let resp = resp.error_for_status().map_err(transport_err)?;
        let dto: ShiftStatusDto = resp.json().await.map_err(decode_err)?;
        Ok(dto.status)
    }

    async fn list_positions(&self, account: &str) -> Result<Vec<Position>, BetError> {
        let resp = self
            .http
            .get(self.url("/positions"))
            .query(&[("account", account)])
            .send()
            .await
            .map_err(transport_err)?;
        let resp = resp.error_for_status().map_err(transport_err)?;
        let items: Vec<PositionDto> = resp.json().await.map_err(decode_err)?;
        Ok(items.into_iter().map(PositionDto::into_position).collect())
    }

    async fn create_market(&self, req: NewMarket) -> Result<Market, BetError> {
        let body = NewMarketDto {
            question: req.question,
            category: req.category,
            end_date: req.end_date,
            min_bet: req.min_bet,
        };
        let resp = self
            .http
            .post(self.url("/markets"))
            .json(&body)
            .send()
            .await
            .map_err(transport_err)?;
        if resp.status() == StatusCode::BAD_REQUEST {
            return Err(BetError::Validation("market payload rejected".into()));
        }
        let resp = resp.error_for_status().map_err(transport_err)?;
        let dto: MarketDto = resp.json().await.map_err(decode_err)?;
        dto.into_market()
    }

    async fn claim_winnings(&self, position_id: &str) -> Result<bool, BetError> {
        let resp = self
            .http
            .post(self.url(&format!("/positions/{position_id}/claim")))
            .send()
            .await
            .map_err(transport_err)?;
        let resp = resp.error_for_status().map_err(transport_err)?;
        let dto: ClaimResponseDto = resp.json().await.map_err(decode_err)?;
        Ok(dto.ok)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarketDto {
    id: String,
    question: String,
    category: MarketCategory,
    end_date: DateTime<Utc>,
    status: MarketStatus,
    pool_yes: Decimal,
    pool_no: Decimal,
    #[serde(default)]
    participants: u64,
    #[serde(default)]
    resolved_winner: Option<BetSide>,
}

impl MarketDto {
    // pool invariants are enforced here, at the wire boundary, so the
    // odds math never sees a negative pool
    fn into_market(self) -> Result<Market, BetError> {
        if self.pool_yes < Decimal::ZERO || self.pool_no < Decimal::ZERO {
            return Err(BetError::ServiceUnavailable(format!(
                "market {}: negative pool in response (yes={}, no={})",
                self.id, self.pool_yes, self.pool_no
            )));
        }
        Ok(Market {
            id: self.id,
            question: self.question,
            category: self.category,
            end_date: self.end_date,
            status: self.status,
            pool_yes: self.pool_yes,
            pool_no: self.pool_no,
            participants: self.participants,
            resolved_winner: self.resolved_winner,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct QuoteRequestDto {
    market_id: String,
    bet_yes: bool,
    deposit_amount: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteDto {
    quote_id: String,
    market_id: String,
    bet_yes: bool,
    deposit_amount: Decimal,
    expected_payout: Decimal,
    rate: Decimal,
    expires_at: DateTime<Utc>,
}

impl QuoteDto {
    fn into_quote(self) -> Quote {
        Quote {
            id: self.quote_id,
            market_id: self.market_id,
            side: side_from_bool(self.bet_yes),
            deposit_amount: self.deposit_amount,
            expected_payout: self.expected_payout,
            rate: self.rate,
            expires_at: self.expires_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmRequestDto {
    quote_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShiftDto {
    shift_id: String,
    market_id: String,
    bet_yes: bool,
    deposit_address: String,
    deposit_amount: Decimal,
    deposit_coin: String,
    status: ShiftStatus,
}

impl ShiftDto {
    fn into_shift(self) -> Shift {
        Shift {
            id: self.shift_id,
            market_id: self.market_id,
            side: side_from_bool(self.bet_yes),
            deposit_address: self.deposit_address,
            deposit_amount: self.deposit_amount,
            deposit_asset: self.deposit_coin,
            status: self.status,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ShiftStatusDto {
    status: ShiftStatus,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PositionDto {
    id: String,
    market_id: String,
    market_question: String,
    bet_yes: bool,
    amount: Decimal,
    entry_price: Decimal,
    current_price: Decimal,
    status: PositionStatus,
    #[serde(default)]
    pnl: Option<Decimal>,
}

impl PositionDto {
    fn into_position(self) -> Position {
        Position {
            id: self.id,
            market_id: self.market_id,
            market_question: self.market_question,
            side: side_from_bool(self.bet_yes),
            amount: self.amount,
            entry_price: self.entry_price,
            current_price: self.current_price,
            status: self.status,
            pnl: self.pnl,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewMarketDto {
    question: String,
    category: MarketCategory,
    end_date: DateTime<Utc>,
    min_bet: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
struct ClaimResponseDto {
    ok: bool,
}

fn side_from_bool(bet_yes: bool) -> BetSide {
    if bet_yes {
        BetSide::Yes
    } else {
        BetSide::No
    }
}
