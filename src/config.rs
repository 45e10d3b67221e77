// ===============================
// src/config.rs
// ===============================
/*
=============================================================================
Project : pnl_hedge_rust — incremental pnl monitor & stop-loss hedger in Rust
Module  : config.rs
Version : 0.1.0
License : MIT (see LICENSE)

Summary : Consumes trades, mid-price updates and order-done notices for one
          instrument, keeps position / cash / mark-to-market / pnl current
          through a static dependency graph, and issues at most one hedge
          order per breach episode.
=============================================================================
*/
use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};
use dotenvy::dotenv;
use thiserror::Error;

use crate::breach::BreachBand;

/// Sumber event untuk binary
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum FeedMode {
    /// Fixed sample sequence
    Scenario,
    /// Random walk trades & prices
    Mock,
    /// JSONL file, one event per line
    Replay,
}

impl FeedMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedMode::Scenario => "scenario",
            FeedMode::Mock => "mock",
            FeedMode::Replay => "replay",
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(name = "pnl_hedge_rust", about = "Pnl monitor with single-flight stop-loss hedging")]
pub struct Args {
    // ===== Engine =====
    /// Managed instrument; everything else is dropped by the filter stage
    #[arg(long, env = "INSTRUMENT", default_value = "BTC")]
    pub instrument: String,

    #[arg(long, env = "PNL_LOW", default_value_t = -300.0, allow_negative_numbers = true)]
    pub pnl_low: f64,

    #[arg(long, env = "PNL_HIGH", default_value_t = 300.0, allow_negative_numbers = true)]
    pub pnl_high: f64,

    /// Start as if a hedge order were already outstanding
    #[arg(long, env = "HEDGE_IN_FLIGHT_AT_START", action = ArgAction::Set, default_value_t = false)]
    pub hedge_in_flight_at_start: bool,

    /// Let NaN/inf prices propagate instead of rejecting them at ingestion
    #[arg(long, env = "ALLOW_NON_FINITE", action = ArgAction::Set, default_value_t = false)]
    pub allow_non_finite: bool,

    // ===== Feed =====
    #[arg(long = "feed", env = "FEED_MODE", value_enum, default_value_t = FeedMode::Scenario)]
    pub feed_mode: FeedMode,

    #[arg(long, env = "EVENTS_FILE")]
    pub events_file: Option<PathBuf>,

    #[arg(long, env = "MOCK_EVENTS", default_value_t = 200)]
    pub mock_events: usize,

    #[arg(long, env = "MOCK_SEED")]
    pub mock_seed: Option<u64>,

    /// Gateway answers each hedge with OrderDone after this delay; unset = never
    #[arg(long, env = "ORDER_DONE_MS")]
    pub order_done_ms: Option<u64>,

    // ===== Files / metrics =====
    #[arg(long, env = "RECORD_FILE")]
    pub record_file: Option<String>,

    #[arg(long, env = "METRICS_PORT")]
    pub metrics_port: Option<u16>,

    #[arg(long, env = "QUEUE_CAPACITY", default_value_t = 4096)]
    pub queue_capacity: usize,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("pnl band must be finite with low < high, got [{low}, {high}]")]
    InvalidBand { low: f64, high: f64 },
    #[error("instrument must not be empty")]
    EmptyInstrument,
    #[error("replay feed needs --events-file / EVENTS_FILE")]
    MissingEventsFile,
    #[error("queue capacity must be > 0")]
    ZeroQueue,
}

/// Everything the propagation engine needs.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    pub instrument: String,
    pub band: BreachBand,
    pub hedge_in_flight_at_start: bool,
    pub reject_non_finite: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            instrument: "BTC".to_string(),
            band: BreachBand::default(),
            hedge_in_flight_at_start: false,
            reject_non_finite: true,
        }
    }
}

impl Args {
    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        let instrument = self.instrument.trim();
        if instrument.is_empty() {
            return Err(ConfigError::EmptyInstrument);
        }
        // NaN juga gagal di sini (perbandingan NaN selalu false)
        let finite = self.pnl_low.is_finite() && self.pnl_high.is_finite();
        if !finite || !(self.pnl_low < self.pnl_high) {
            return Err(ConfigError::InvalidBand { low: self.pnl_low, high: self.pnl_high });
        }
        Ok(EngineConfig {
            instrument: instrument.to_string(),
            band: BreachBand::new(self.pnl_low, self.pnl_high),
            hedge_in_flight_at_start: self.hedge_in_flight_at_start,
            reject_non_finite: !self.allow_non_finite,
        })
    }

    pub fn validate(&self) -> Result<EngineConfig, ConfigError> {
        if self.feed_mode == FeedMode::Replay && self.events_file.is_none() {
            return Err(ConfigError::MissingEventsFile);
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueue);
        }
        self.engine_config()
    }
}

pub fn load() -> Result<(Args, EngineConfig), ConfigError> {
    // Pastikan .env dibaca dulu supaya env = "..." di atas ikut ter-load
    let _ = dotenv();
    let args = Args::parse();
    let cfg = args.validate()?;
    Ok((args, cfg))
}
