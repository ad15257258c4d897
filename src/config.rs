use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Base URL of a live market API. Unset runs against the in-memory
    /// exchange.
    #[serde(default)]
    pub api_host: Option<String>,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_quote_window_sec")]
    pub quote_window_sec: u64,
    #[serde(default = "default_request_timeout_sec")]
    pub request_timeout_sec: u64,

    // Decimal, parsed at startup
    #[serde(default = "default_min_bet")]
    pub min_bet: String,

    #[serde(default = "default_demo_account")]
    pub demo_account: String,

    #[serde(default)]
    pub stats_jsonl_path: Option<String>,
}

fn default_poll_interval_ms() -> u64 {
    3000
}

fn default_quote_window_sec() -> u64 {
    120
}

fn default_request_timeout_sec() -> u64 {
    10
}

fn default_min_bet() -> String {
    "10".to_string()
}

fn default_demo_account() -> String {
    // stub wallet address used by the demo portfolio view
    "0x71C7656EC7ab88b098defB751B7401B5f6d8976F".to_string()
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let c = config::Config::builder()
            .add_source(config::Environment::default())
            .build()?;
        Ok(c.try_deserialize()?)
    }
}
