// ===============================
// src/lib.rs
// ===============================
//! Incremental pnl monitor: trades and mid-price updates for one instrument flow
//! through a static dependency graph (filter -> position / cash -> mark-to-market
//! -> pnl -> breach), and a two-state hedge machine issues at most one hedge
//! request per breach episode.
//!
//! The core (`engine` and everything it uses) is synchronous and single-threaded;
//! `feed`, `gateway` and `recorder` are the tokio pieces the binary wires around it.

pub mod breach;
pub mod config;
pub mod domain;
pub mod engine;
pub mod feed;
pub mod filter;
pub mod gateway;
pub mod graph;
pub mod hedge;
pub mod metrics;
pub mod observer;
pub mod primitives;
pub mod recorder;

pub use config::EngineConfig;
pub use domain::{Event, HedgeRequest, OrderDone, PriceUpdate, Trade};
pub use engine::{Engine, EngineError, EngineSnapshot, EngineStats, PassOutcome};
pub use hedge::{HedgeSink, HedgeState};
