// ===============================
// src/main.rs
// ===============================
/*
 # sample scenario (12 event), log per node
 RUST_LOG=debug cargo run

 # mock feed + auto order done + metrics
 FEED_MODE=mock MOCK_EVENTS=2000 ORDER_DONE_MS=50 METRICS_PORT=9898 cargo run
 curl -s localhost:9898/metrics | egrep '^(pnl|position|hedges_total|hedge_in_flight)'

 # record lalu replay
 RECORD_FILE=out/events.jsonl cargo run
 cargo run -- --feed replay --events-file out/events.jsonl
*/
/*
=============================================================================
Project : pnl_hedge_rust — incremental pnl monitor & stop-loss hedger in Rust
Module  : main.rs
Version : 0.1.0
License : MIT (see LICENSE)

Summary : Consumes trades, mid-price updates and order-done notices for one
          instrument, keeps position / cash / mark-to-market / pnl current
          through a static dependency graph, and issues at most one hedge
          order per breach episode.
=============================================================================
*/
use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pnl_hedge_rust::{
    config::{self, FeedMode},
    domain::{Event, HedgeRequest},
    engine::Engine,
    feed, gateway, metrics,
    observer::TracingObserver,
    recorder::{self, Record},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ---- Logging ----
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // ---- Load config ----
    let (args, cfg) = config::load().context("invalid configuration")?;
    info!(
        instrument = %cfg.instrument,
        pnl_low = cfg.band.low,
        pnl_high = cfg.band.high,
        hedge_in_flight_at_start = cfg.hedge_in_flight_at_start,
        reject_non_finite = cfg.reject_non_finite,
        feed_mode = args.feed_mode.as_str(),
        order_done_ms = ?args.order_done_ms,
        "startup config"
    );

    // ---- Metrics ----
    metrics::init();
    metrics::CONFIG_INSTRUMENT.with_label_values(&[cfg.instrument.as_str()]).set(1);
    if let Some(port) = args.metrics_port {
        metrics::serve_metrics(port).with_context(|| format!("metrics bind :{port} failed"))?;
    }

    // ---- Buses ----
    // Satu antrian event (single writer ke engine); feed & gateway sama-sama produsen
    let (ev_tx, mut ev_rx) = mpsc::channel::<Event>(args.queue_capacity);
    let (hedge_tx, hedge_rx) = mpsc::channel::<HedgeRequest>(64);

    // ---- Recorder (optional) ----
    let (rec_tx, recorder_task) = match args.record_file.clone() {
        Some(path) => {
            let (tx, rx) = mpsc::channel::<Record>(8192);
            (Some(tx), Some(tokio::spawn(recorder::run(rx, path))))
        }
        None => (None, None),
    };

    // ---- Gateway (mock order management) ----
    let gateway_task =
        tokio::spawn(gateway::run(hedge_rx, ev_tx.downgrade(), args.order_done_ms, rec_tx.clone()));

    // ---- FEED ----
    let instrument = cfg.instrument.clone();
    match args.feed_mode {
        FeedMode::Scenario => {
            tokio::spawn(feed::run_scenario(ev_tx, instrument));
        }
        FeedMode::Mock => {
            tokio::spawn(feed::run_mock(ev_tx, instrument, args.mock_events, args.mock_seed));
        }
        FeedMode::Replay => {
            let path = args.events_file.clone().context("replay needs an events file")?;
            tokio::spawn(feed::run_replay(ev_tx, path));
        }
    }

    // ---- Engine loop: satu event, satu pass, urut kedatangan ----
    let mut engine = Engine::new(cfg.clone(), hedge_tx)?
        .with_observer(TracingObserver::new(cfg.instrument.clone()))
        .with_observer(metrics::MetricsObserver);

    while let Some(ev) = ev_rx.recv().await {
        if let Some(rec) = &rec_tx {
            let _ = rec.try_send(Record::Event { event: ev.clone() });
        }
        info!(seq = engine.seq() + 1, event = %ev, "event");
        if let Err(e) = engine.on_event(&ev) {
            warn!(error = %e, "pass aborted, state unchanged");
        }
        metrics::publish_stats(&engine.stats());
    }

    // ---- Summary ----
    let stats = engine.stats();
    let snapshot = engine.snapshot();
    info!(?stats, ?snapshot, "feed drained");
    if let Some(rec) = &rec_tx {
        let _ = rec.send(Record::Summary { stats, snapshot }).await;
    }

    // Tutup hedge channel -> gateway selesai -> recorder ikut tutup
    drop(engine);
    drop(rec_tx);
    if let Err(e) = gateway_task.await {
        warn!(?e, "gateway task failed");
    }
    if let Some(task) = recorder_task {
        if let Err(e) = task.await {
            warn!(?e, "recorder task failed");
        }
    }
    Ok(())
}
