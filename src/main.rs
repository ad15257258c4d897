use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;

use parimarket::bet::{BetDialog, BetStep, DialogConfig};
use parimarket::config::Settings;
use parimarket::odds;
use parimarket::service::{
    refresh_position_prices, HttpMarketService, MarketService, MockExchange,
};
use parimarket::stats::Stats;
use parimarket::types::{BetSide, MarketStatus};

fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}

async fn maybe_write_jsonl(path: &Option<String>, line: &str) {
    if let Some(p) = path.as_ref().map(|x| x.trim().to_string()).filter(|x| !x.is_empty()) {
        if let Ok(mut f) = tokio::fs::OpenOptions::new().create(true).append(true).open(&p).await {
            use tokio::io::AsyncWriteExt;
            let _ = f.write_all(line.as_bytes()).await;
            let _ = f.write_all(b"\n").await;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let s = Settings::from_env()?;
    let min_bet = s.min_bet.parse::<Decimal>()?;

    let service: Arc<dyn MarketService> = match s.api_host {
        Some(ref host) => {
            tracing::info!(host = %host, "using live market API");
            Arc::new(HttpMarketService::new(
                host.clone(),
                Duration::from_secs(s.request_timeout_sec),
            ))
        }
        None => {
            tracing::info!("no API host configured, using in-memory exchange");
            Arc::new(MockExchange::seeded(chrono::Duration::seconds(
                s.quote_window_sec as i64,
            )))
        }
    };

    let stats = Stats::new(now_ms());

    // market board
    let markets = service.list_markets(None, None).await?;
    tracing::info!(count = markets.len(), "markets loaded");
    for m in &markets {
        let odds = odds::compute_odds(m.pool_yes, m.pool_no);
        tracing::info!(
            market_id = %m.id,
            question = %m.question,
            yes_pct = odds.yes_pct,
            no_pct = odds.no_pct,
            pool_total = %m.pool_total(),
            status = ?m.status,
            "market"
        );
    }

    // portfolio view with live prices
    let mut positions = service.list_positions(&s.demo_account).await?;
    refresh_position_prices(service.as_ref(), &mut positions, 4).await?;
    for p in &positions {
        tracing::info!(
            position_id = %p.id,
            market_id = %p.market_id,
            side = ?p.side,
            amount = %p.amount,
            entry_price = %p.entry_price,
            current_price = %p.current_price,
            status = ?p.status,
            "position"
        );
    }

    // one scripted bet against the first active market
    let Some(target) = markets.iter().find(|m| m.status == MarketStatus::Active) else {
        tracing::warn!("no active market to bet on");
        return Ok(());
    };

    let cfg = DialogConfig {
        min_bet,
        poll_interval: Duration::from_millis(s.poll_interval_ms),
        request_timeout: Duration::from_secs(s.request_timeout_sec),
    };
    let mut dialog = BetDialog::new(Arc::clone(&service), target.clone(), cfg, stats.clone());

    let quote = dialog.request_quote(BetSide::Yes, "25").await?;
    tracing::info!(
        quote_id = %quote.id,
        expected_payout = %quote.expected_payout,
        rate = %quote.rate,
        expires_at = %quote.expires_at,
        "quote received"
    );

    let shift = dialog.confirm().await?;
    tracing::info!(
        shift_id = %shift.id,
        deposit_address = %shift.deposit_address,
        deposit_amount = %shift.deposit_amount,
        deposit_asset = %shift.deposit_asset,
        "awaiting deposit settlement"
    );

    let deadline = std::time::Instant::now() + Duration::from_secs(60);
    while dialog.step() == BetStep::Depositing && std::time::Instant::now() < deadline {
        if let Some(status) = dialog.shift_status() {
            tracing::debug!(status = ?status, "settlement pending");
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    match dialog.step() {
        BetStep::Settled => tracing::info!("bet settled"),
        BetStep::Failed => tracing::warn!("deposit failed, bet not settled"),
        other => tracing::warn!(step = ?other, "bet did not settle before the deadline"),
    }
    dialog.close();

    let t = now_ms();
    let ss = stats.snapshot(t);
    tracing::info!(
        up_sec = ss.up_sec,
        quotes_issued = ss.quotes_issued,
        quotes_rejected = ss.quotes_rejected,
        quotes_expired = ss.quotes_expired,
        bets_confirmed = ss.bets_confirmed,
        polls = ss.polls,
        poll_errors = ss.poll_errors,
        settlements = ss.settlements,
        anomalies = ss.anomalies,
        "stats"
    );
    let line = serde_json::to_string(&ss).unwrap_or_default();
    maybe_write_jsonl(&s.stats_jsonl_path, &line).await;

    Ok(())
}
