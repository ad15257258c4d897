//! Parimutuel prediction-market client core: pool-based odds and quote
//! math, the bet-placement dialog state machine with a cancellable
//! settlement poller, and the market/quote/settlement service contract
//! with an in-memory exchange and an HTTP client.

pub mod bet;
pub mod config;
pub mod error;
pub mod odds;
pub mod service;
pub mod stats;
pub mod types;
