//! Bet-placement dialog: input -> quoted -> depositing -> settled, with a
//! failed terminal step when settlement dies.
//!
//! One `BetDialog` instance backs one open dialog. Service round trips are
//! guarded by a request timeout and by a generation counter, so a response
//! that lands after the dialog was closed is discarded instead of being
//! applied to a reset dialog. The settlement poller is a spawned task that
//! is aborted on close and also bails out on its own when the generation
//! moves on.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};

use crate::bet::{BetStep, DialogConfig};
use crate::error::BetError;
use crate::service::MarketService;
use crate::stats::Stats;
use crate::types::{BetSide, Market, Quote, Shift, ShiftStatus};

#[derive(Debug, Clone)]
struct DialogState {
    step: BetStep,
    side: Option<BetSide>,
    amount: Option<Decimal>,
    quote: Option<Quote>,
    shift: Option<Shift>,
    shift_status: Option<ShiftStatus>,
    generation: u64,
}

impl DialogState {
    fn fresh(generation: u64) -> Self {
        Self {
            step: BetStep::Input,
            side: None,
            amount: None,
            quote: None,
            shift: None,
            shift_status: None,
            generation,
        }
    }
}

pub struct BetDialog {
    service: Arc<dyn MarketService>,
    market: Market,
    cfg: DialogConfig,
    stats: Arc<Stats>,
    state: Arc<Mutex<DialogState>>,
    poll_task: Option<JoinHandle<()>>,
}

impl BetDialog {
    pub fn new(
        service: Arc<dyn MarketService>,
        market: Market,
        cfg: DialogConfig,
        stats: Arc<Stats>,
    ) -> Self {
        Self {
            service,
            market,
            cfg,
            stats,
            state: Arc::new(Mutex::new(DialogState::fresh(0))),
            poll_task: None,
        }
    }

    pub fn step(&self) -> BetStep {
        self.lock().step
    }

    pub fn side(&self) -> Option<BetSide> {
        self.lock().side
    }

    pub fn amount(&self) -> Option<Decimal> {
        self.lock().amount
    }

    pub fn quote(&self) -> Option<Quote> {
        self.lock().quote.clone()
    }

    pub fn shift(&self) -> Option<Shift> {
        self.lock().shift.clone()
    }

    pub fn shift_status(&self) -> Option<ShiftStatus> {
        self.lock().shift_status
    }

    /// Validate the entered amount and fetch a quote for the chosen side.
    /// On any failure the dialog stays at the input step.
    pub async fn request_quote(
        &mut self,
        side: BetSide,
        raw_amount: &str,
    ) -> Result<Quote, BetError> {
        let gen = {
            let st = self.lock();
            if st.step != BetStep::Input {
                return Err(BetError::Validation(
                    "a quote can only be requested from the input step".into(),
                ));
            }
            st.generation
        };

        let amount = match parse_amount(raw_amount, self.cfg.min_bet) {
            Ok(a) => a,
            Err(e) => {
                self.stats.inc_quote_rejected();
                return Err(e);
            }
        };

        let quote = self
            .with_timeout(self.service.get_quote(&self.market.id, side, amount))
            .await?;

        let mut st = self.lock();
        if st.generation != gen {
            tracing::debug!(quote_id = %quote.id, "quote arrived after dialog reset, discarding");
            return Err(BetError::ServiceUnavailable(
                "dialog was reset while the quote request was in flight".into(),
            ));
        }
        st.step = BetStep::Quoted;
        st.side = Some(side);
        st.amount = Some(amount);
        st.quote = Some(quote.clone());
        drop(st);

        self.stats.inc_quote_issued();
        tracing::info!(
            market_id = %self.market.id,
            quote_id = %quote.id,
            side = ?side,
            amount = %amount,
            payout = %quote.expected_payout,
            "quote acquired"
        );
        Ok(quote)
    }

    /// Return from the quote step to input. The quote is discarded; side
    /// and amount stay editable.
    pub fn back(&mut self) -> Result<(), BetError> {
        let mut st = self.lock();
        if st.step != BetStep::Quoted {
            return Err(BetError::Validation("nothing to go back from".into()));
        }
        st.step = BetStep::Input;
        st.quote = None;
        Ok(())
    }

    /// Consume the held quote and open the deposit shift. Expiry is
    /// re-checked at the moment of the call; a stale rate is never honored.
    pub async fn confirm(&mut self) -> Result<Shift, BetError> {
        let (quote, gen) = {
            let st = self.lock();
            if st.step != BetStep::Quoted {
                return Err(BetError::Validation(
                    "confirm is only valid while holding a quote".into(),
                ));
            }
            let quote = st
                .quote
                .clone()
                .ok_or_else(|| BetError::Validation("no quote held".into()))?;
            (quote, st.generation)
        };

        if Utc::now() >= quote.expires_at {
            self.stats.inc_quote_expired();
            return Err(BetError::QuoteExpired(quote.id));
        }

        let shift = self
            .with_timeout(self.service.confirm_bet(&quote.id))
            .await?;

        let mut st = self.lock();
        if st.generation != gen {
            tracing::debug!(shift_id = %shift.id, "shift arrived after dialog reset, discarding");
            return Err(BetError::ServiceUnavailable(
                "dialog was reset while the confirmation was in flight".into(),
            ));
        }
        st.step = BetStep::Depositing;
        st.shift = Some(shift.clone());
        st.shift_status = Some(shift.status);
        drop(st);

        self.stats.inc_bet_confirmed();
        tracing::info!(
            market_id = %self.market.id,
            shift_id = %shift.id,
            address = %shift.deposit_address,
            "bet confirmed, awaiting deposit"
        );
        self.spawn_poller(shift.id.clone(), gen);
        Ok(shift)
    }

    /// Close the dialog: stop the poller and reset to a fresh input step.
    /// The underlying shift record persists at the service and can be
    /// re-queried later; only this polling session ends.
    pub fn close(&mut self) {
        if let Some(task) = self.poll_task.take() {
            task.abort();
        }
        let mut st = self.lock();
        let gen = st.generation + 1;
        *st = DialogState::fresh(gen);
    }

    fn spawn_poller(&mut self, shift_id: String, gen: u64) {
        let service = Arc::clone(&self.service);
        let state = Arc::clone(&self.state);
        let stats = Arc::clone(&self.stats);
        let poll_interval = self.cfg.poll_interval;
        let request_timeout = self.cfg.request_timeout;

        let handle = tokio::spawn(async move {
            let mut ticker = interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // the first tick fires immediately; consume it so the first
            // poll happens one interval after confirmation
            ticker.tick().await;

            loop {
                ticker.tick().await;
                {
                    let st = state.lock().expect("dialog state poisoned");
                    if st.generation != gen || st.step != BetStep::Depositing {
                        break;
                    }
                }

                stats.inc_poll();
                let res = match timeout(request_timeout, service.get_shift_status(&shift_id)).await
                {
                    Ok(res) => res,
                    Err(_) => Err(BetError::ServiceUnavailable(
                        "status poll timed out".into(),
                    )),
                };
                let status = match res {
                    Ok(s) => s,
                    Err(e) => {
                        // transient; retry on the next tick
                        stats.inc_poll_error();
                        tracing::warn!(shift_id = %shift_id, error = %e, "status poll failed");
                        continue;
                    }
                };

                let mut st = state.lock().expect("dialog state poisoned");
                if st.generation != gen || st.step != BetStep::Depositing {
                    break;
                }

                if let Some(prev) = st.shift_status {
                    if status.regresses_from(prev) {
                        stats.inc_anomaly();
                        let anomaly = BetError::SettlementAnomaly {
                            from: prev,
                            to: status,
                        };
                        tracing::error!(shift_id = %shift_id, error = %anomaly, "ending polling session");
                        st.step = BetStep::Failed;
                        break;
                    }
                }
                st.shift_status = Some(status);
                if let Some(shift) = st.shift.as_mut() {
                    shift.status = status;
                }

                match status {
                    ShiftStatus::Confirmed => {
                        st.step = BetStep::Settled;
                        stats.inc_settlement();
                        tracing::info!(shift_id = %shift_id, "deposit confirmed, bet settled");
                        break;
                    }
                    ShiftStatus::Failed => {
                        st.step = BetStep::Failed;
                        tracing::warn!(shift_id = %shift_id, "deposit failed");
                        break;
                    }
                    ShiftStatus::Waiting | ShiftStatus::Received => {}
                }
            }
        });
        self.poll_task = Some(handle);
    }

    async fn with_timeout<T>(
        &self,
        fut: impl Future<Output = Result<T, BetError>>,
    ) -> Result<T, BetError> {
        match timeout(self.cfg.request_timeout, fut).await {
            Ok(res) => res,
            Err(_) => Err(BetError::ServiceUnavailable(format!(
                "no response within {:?}",
                self.cfg.request_timeout
            ))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DialogState> {
        self.state.lock().expect("dialog state poisoned")
    }
}

impl Drop for BetDialog {
    fn drop(&mut self) {
        if let Some(task) = self.poll_task.take() {
            task.abort();
        }
    }
}

fn parse_amount(raw: &str, min_bet: Decimal) -> Result<Decimal, BetError> {
    let amount = raw
        .trim()
        .parse::<Decimal>()
        .map_err(|_| BetError::InvalidAmount(format!("not a number: {raw:?}")))?;
    if amount <= Decimal::ZERO {
        return Err(BetError::InvalidAmount(format!(
            "deposit must be positive, got {amount}"
        )));
    }
    if amount < min_bet {
        return Err(BetError::InvalidAmount(format!(
            "minimum bet is {min_bet}, got {amount}"
        )));
    }
    Ok(amount)
}
