// ===============================
// src/metrics.rs
// ===============================
use once_cell::sync::Lazy;
use prometheus::{Encoder, Gauge, IntCounter, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};
use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use tracing::{info, warn};

use crate::engine::{EngineSnapshot, EngineStats};
use crate::graph::NodeId;
use crate::hedge::HedgeOutcome;
use crate::observer::{NodeValue, Observer};

// Single custom registry (we register everything here)
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

// -------- Node values --------
pub static POSITION: Lazy<IntGauge> =
    Lazy::new(|| IntGauge::new("position", "net traded volume").expect("metric position"));

pub static CASH: Lazy<Gauge> =
    Lazy::new(|| Gauge::new("cash", "running cash flow").expect("metric cash"));

pub static MID_PRICE: Lazy<Gauge> =
    Lazy::new(|| Gauge::new("mid_price", "latest mid price").expect("metric mid_price"));

pub static ASSET_VALUE: Lazy<Gauge> = Lazy::new(|| {
    Gauge::new("asset_value", "position marked to mid").expect("metric asset_value")
});

pub static PNL: Lazy<Gauge> =
    Lazy::new(|| Gauge::new("pnl", "cash + asset value").expect("metric pnl"));

pub static HEDGE_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("hedge_in_flight", "1 while a hedge order is outstanding")
        .expect("metric hedge_in_flight")
});

// -------- Hedge activity --------
pub static BREACHES: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("breaches_total", "pnl band breaches").expect("metric breaches"));

pub static HEDGES: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("hedges_total", "hedge requests issued").expect("metric hedges"));

pub static HEDGES_SUPPRESSED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("hedges_suppressed_total", "breaches while a hedge was in flight")
        .expect("metric hedges_suppressed")
});

// -------- Engine counters (mirrors EngineStats) --------
pub static ENGINE_STATS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("engine_events", "engine event counters (label: stat)"),
        &["stat"],
    )
    .expect("metric engine_events")
});

// ---- Config visibility ----
pub static CONFIG_INSTRUMENT: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("config_instrument", "managed instrument (label: instrument)"),
        &["instrument"],
    )
    .expect("metric config_instrument")
});

pub fn init() {
    for m in [
        REGISTRY.register(Box::new(POSITION.clone())),
        REGISTRY.register(Box::new(CASH.clone())),
        REGISTRY.register(Box::new(MID_PRICE.clone())),
        REGISTRY.register(Box::new(ASSET_VALUE.clone())),
        REGISTRY.register(Box::new(PNL.clone())),
        REGISTRY.register(Box::new(HEDGE_IN_FLIGHT.clone())),
        REGISTRY.register(Box::new(BREACHES.clone())),
        REGISTRY.register(Box::new(HEDGES.clone())),
        REGISTRY.register(Box::new(HEDGES_SUPPRESSED.clone())),
        REGISTRY.register(Box::new(ENGINE_STATS.clone())),
        REGISTRY.register(Box::new(CONFIG_INSTRUMENT.clone())),
    ] {
        if let Err(e) = m {
            warn!(?e, "metric registration failed");
        }
    }
}

pub fn publish_stats(stats: &EngineStats) {
    for (label, v) in [
        ("events", stats.events),
        ("filtered", stats.filtered),
        ("rejected", stats.rejected),
        ("breaches", stats.breaches),
        ("hedges_issued", stats.hedges_issued),
        ("breaches_suppressed", stats.breaches_suppressed),
        ("orders_done", stats.orders_done),
        ("unexpected_order_done", stats.unexpected_order_done),
        ("hedges_rejected", stats.hedges_rejected),
    ] {
        ENGINE_STATS.with_label_values(&[label]).set(v as i64);
    }
}

/// Observer yang menyalin nilai node ke gauge/counter Prometheus.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsObserver;

impl Observer for MetricsObserver {
    fn on_node(&self, node: NodeId, value: NodeValue) {
        match (node, value) {
            (NodeId::Position, NodeValue::Int(v)) => POSITION.set(v),
            (NodeId::Cash, NodeValue::Float(v)) => CASH.set(v),
            (NodeId::MidPrice, NodeValue::Float(v)) => MID_PRICE.set(v),
            (NodeId::AssetValue, NodeValue::Float(v)) => ASSET_VALUE.set(v),
            (NodeId::Pnl, NodeValue::Float(v)) => PNL.set(v),
            (NodeId::Breach, _) => BREACHES.inc(),
            (NodeId::Hedge, NodeValue::Hedge(HedgeOutcome::Issued)) => HEDGES.inc(),
            (NodeId::Hedge, NodeValue::Hedge(HedgeOutcome::Suppressed)) => HEDGES_SUPPRESSED.inc(),
            _ => {}
        }
    }

    fn on_pass(&self, _seq: u64, snapshot: EngineSnapshot) {
        HEDGE_IN_FLIGHT.set(snapshot.hedge_state.in_flight() as i64);
    }
}

// Encode all metrics in Prometheus text format
pub fn encode_metrics() -> Vec<u8> {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    if encoder.encode(&families, &mut buf).is_err() || buf.is_empty() {
        buf.extend_from_slice(b"# no metrics\n");
    }
    buf
}

// Serve one HTTP request (GET / or /metrics), tiny HTTP 1.1 responder
fn handle_client(mut stream: TcpStream) {
    // Read a bit to consume headers (no full parse)
    let mut _req_buf = [0u8; 1024];
    let _ = stream.read(&mut _req_buf);

    let body = encode_metrics();
    let header = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );

    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(&body);
    let _ = stream.flush();
}

/// Binds first (so a bad port fails startup), then serves from a dedicated OS thread.
pub fn serve_metrics(port: u16) -> io::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr)?;
    info!(%addr, "metrics listening (/ and /metrics)");

    thread::spawn(move || {
        for conn in listener.incoming() {
            match conn {
                Ok(stream) => handle_client(stream),
                Err(e) => warn!(?e, "metrics accept error"),
            }
        }
    });
    Ok(())
}
