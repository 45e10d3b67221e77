// ===============================
// src/engine.rs (propagation engine)
// ===============================
//
// Satu event = satu pass:
// 1) validasi event (ingestion)
// 2) salin state -> `next`
// 3) jalan di atas jadwal topologis untuk EventKind tsb; node hanya dievaluasi
//    kalau minimal satu input-nya berubah di pass ini
// 4) kalau ada HedgeRequest: serahkan ke sink dulu; sink menolak = pass gagal
// 5) kalau semua sukses: commit `next`, lalu observer dipanggil
//    kalau ada error: `next` dibuang, state lama utuh
//
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::breach::BreachBand;
use crate::config::EngineConfig;
use crate::domain::{Event, EventKind, HedgeRequest, PriceUpdate, Trade};
use crate::filter::filter_instrument;
use crate::graph::{Graph, GraphError, NodeId};
use crate::hedge::{
    transition, HedgeOutcome, HedgeSignal, HedgeSink, HedgeState, NullSink, SinkError, Transition,
};
use crate::observer::{NodeValue, Observer};
use crate::primitives::{add, multiply, negate, Latest, Sum};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("malformed event {event}: {reason}")]
    MalformedEvent { event: String, reason: &'static str },
    #[error("position overflow: {position} + {volume}")]
    PositionOverflow { position: i64, volume: i64 },
    #[error("hedge request for {quantity} not accepted: {source}")]
    HedgeRejected { quantity: i64, source: SinkError },
    #[error("invalid graph: {0}")]
    Graph(#[from] GraphError),
}

/// Committed value of every stateful / derived node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EngineSnapshot {
    pub position: i64,
    pub cash: f64,
    pub mid_price: f64,
    pub asset_value: f64,
    pub pnl: f64,
    pub hedge_state: HedgeState,
}

impl Default for EngineSnapshot {
    fn default() -> Self {
        NodeState::new(HedgeState::Idle).snapshot()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub events: u64,
    pub filtered: u64,
    pub rejected: u64,
    pub breaches: u64,
    pub hedges_issued: u64,
    pub breaches_suppressed: u64,
    pub orders_done: u64,
    pub unexpected_order_done: u64,
    pub hedges_rejected: u64,
}

#[derive(Debug, Clone)]
pub struct PassOutcome {
    pub seq: u64,
    /// Nodes recomputed in this pass, in evaluation order.
    pub evaluated: Vec<NodeId>,
    pub hedge: Option<HedgeRequest>,
    pub hedge_outcome: Option<HedgeOutcome>,
    pub snapshot: EngineSnapshot,
}

#[derive(Debug, Clone, Copy)]
struct NodeState {
    position: Sum<i64>,
    cash: Sum<f64>,
    mid: Latest<f64>,
    asset_value: f64,
    pnl: f64,
    hedge: HedgeState,
}

impl NodeState {
    fn new(hedge: HedgeState) -> Self {
        Self {
            position: Sum::new(0),
            cash: Sum::new(0.0),
            mid: Latest::new(f64::NAN),
            asset_value: f64::NAN,
            pnl: f64::NAN,
            hedge,
        }
    }

    fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            position: self.position.value(),
            cash: self.cash.value(),
            mid_price: self.mid.value(),
            asset_value: self.asset_value,
            pnl: self.pnl,
            hedge_state: self.hedge,
        }
    }
}

/// Scratch untuk satu pass; dibuang kalau pass gagal.
struct Pass<'a> {
    event: &'a Event,
    instrument: &'a str,
    band: BreachBand,
    next: NodeState,
    dirty: [bool; NodeId::COUNT],
    breach: Option<f64>,
    transition: Option<Transition>,
    emitted: Vec<(NodeId, NodeValue)>,
}

impl<'a> Pass<'a> {
    fn fired(&self, inputs: &[NodeId]) -> bool {
        inputs.is_empty() || inputs.iter().any(|n| self.dirty[n.index()])
    }

    fn trade(&self) -> Option<&'a Trade> {
        match self.event {
            Event::Trade(t) => Some(t),
            _ => None,
        }
    }

    fn price(&self) -> Option<&'a PriceUpdate> {
        match self.event {
            Event::PriceUpdate(p) => Some(p),
            _ => None,
        }
    }

    /// Recomputes `node`. `None` = node ran but does not propagate (filter miss, no breach).
    fn eval(&mut self, node: NodeId) -> Result<Option<NodeValue>, EngineError> {
        let value = match node {
            NodeId::TradeIn | NodeId::PriceIn | NodeId::OrderDoneIn => Some(NodeValue::Passed),
            NodeId::TradeFilter => self
                .trade()
                .filter(|t| filter_instrument(*t, self.instrument))
                .map(|_| NodeValue::Passed),
            NodeId::PriceFilter => self
                .price()
                .filter(|p| filter_instrument(*p, self.instrument))
                .map(|_| NodeValue::Passed),
            NodeId::Position => match self.trade() {
                Some(t) => {
                    let position = self.next.position.value();
                    let v = self.next.position.add(t.volume).ok_or(EngineError::PositionOverflow {
                        position,
                        volume: t.volume,
                    })?;
                    Some(NodeValue::Int(v))
                }
                None => None,
            },
            NodeId::Cash => self.trade().map(|t| {
                let flow = multiply(negate(t.volume as f64), t.price);
                NodeValue::Float(self.next.cash.accumulate(flow))
            }),
            NodeId::MidPrice => self.price().map(|p| NodeValue::Float(self.next.mid.set(p.mid_price()))),
            NodeId::AssetValue => {
                self.next.asset_value =
                    multiply(self.next.position.value() as f64, self.next.mid.value());
                Some(NodeValue::Float(self.next.asset_value))
            }
            NodeId::Pnl => {
                self.next.pnl = add(self.next.cash.value(), self.next.asset_value);
                Some(NodeValue::Float(self.next.pnl))
            }
            NodeId::Breach => {
                let pnl = self.next.pnl;
                if self.band.is_breach(pnl) {
                    self.breach = Some(pnl);
                    Some(NodeValue::Float(pnl))
                } else {
                    None
                }
            }
            NodeId::Hedge => {
                let signal = if self.dirty[NodeId::OrderDoneIn.index()] {
                    HedgeSignal::OrderDone
                } else if let Some(pnl) = self.breach {
                    HedgeSignal::Breach { position: self.next.position.value(), pnl }
                } else {
                    return Ok(None);
                };
                let t = transition(self.next.hedge, signal);
                self.next.hedge = t.next;
                self.transition = Some(t);
                Some(NodeValue::Hedge(t.outcome))
            }
        };
        Ok(value)
    }
}

pub struct Engine<S: HedgeSink = NullSink> {
    cfg: EngineConfig,
    graph: Graph,
    state: NodeState,
    stats: EngineStats,
    seq: u64,
    sink: S,
    observers: Vec<Box<dyn Observer>>,
}

impl<S: HedgeSink> Engine<S> {
    pub fn new(cfg: EngineConfig, sink: S) -> Result<Self, EngineError> {
        let graph = Graph::standard()?;
        let state = NodeState::new(HedgeState::initial(cfg.hedge_in_flight_at_start));
        Ok(Self { cfg, graph, state, stats: EngineStats::default(), seq: 0, sink, observers: Vec::new() })
    }

    pub fn with_observer(mut self, observer: impl Observer + 'static) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    pub fn config(&self) -> &EngineConfig { &self.cfg }
    pub fn graph(&self) -> &Graph { &self.graph }
    pub fn stats(&self) -> EngineStats { self.stats }
    pub fn seq(&self) -> u64 { self.seq }
    pub fn sink(&self) -> &S { &self.sink }
    pub fn sink_mut(&mut self) -> &mut S { &mut self.sink }
    pub fn snapshot(&self) -> EngineSnapshot { self.state.snapshot() }
    pub fn hedge_state(&self) -> HedgeState { self.state.hedge }

    /// Runs one propagation pass. On error nothing is committed.
    pub fn on_event(&mut self, event: &Event) -> Result<PassOutcome, EngineError> {
        self.stats.events += 1;
        if let Err(e) = self.validate(event) {
            self.stats.rejected += 1;
            warn!(%event, error = %e, "event rejected");
            return Err(e);
        }

        let kind = event.kind();
        let mut pass = Pass {
            event,
            instrument: &self.cfg.instrument,
            band: self.cfg.band,
            next: self.state,
            dirty: [false; NodeId::COUNT],
            breach: None,
            transition: None,
            emitted: Vec::new(),
        };

        for &node in self.graph.schedule(kind) {
            if !pass.fired(self.graph.inputs(node)) {
                continue;
            }
            if let Some(value) = pass.eval(node)? {
                pass.dirty[node.index()] = true;
                pass.emitted.push((node, value));
            }
        }

        let Pass { next, dirty, breach, transition, emitted, .. } = pass;
        debug_assert!(
            !(self.state.hedge.in_flight() && transition.is_some_and(|t| t.action.is_some())),
            "hedge issued while a hedge is already in flight"
        );

        // ---- hand-off: Hedging hanya kalau request benar-benar diterima ----
        let hedge = transition.and_then(|t| t.action);
        if let Some(req) = hedge {
            if let Err(e) = self.sink.submit(req) {
                self.stats.hedges_rejected += 1;
                warn!(qty = req.quantity_to_flatten, pnl = req.triggering_pnl, error = %e,
                    "hedge not accepted, pass discarded");
                return Err(EngineError::HedgeRejected { quantity: req.quantity_to_flatten, source: e });
            }
        }

        // ---- commit ----
        self.state = next;
        self.seq += 1;
        self.record_stats(kind, &dirty, breach, transition);

        let snapshot = self.state.snapshot();
        for o in &self.observers {
            for (node, value) in &emitted {
                o.on_node(*node, value.clone());
            }
            o.on_pass(self.seq, snapshot);
        }

        if let Some(t) = transition {
            self.log_transition(t, &snapshot);
        }

        Ok(PassOutcome {
            seq: self.seq,
            evaluated: emitted.iter().map(|(n, _)| *n).collect(),
            hedge,
            hedge_outcome: transition.map(|t| t.outcome),
            snapshot,
        })
    }

    fn validate(&self, event: &Event) -> Result<(), EngineError> {
        if !self.cfg.reject_non_finite {
            return Ok(());
        }
        let reason = match event {
            Event::Trade(t) if !t.price.is_finite() => Some("non-finite trade price"),
            Event::PriceUpdate(p) if !p.bid.is_finite() || !p.offer.is_finite() => {
                Some("non-finite bid/offer")
            }
            _ => None,
        };
        match reason {
            Some(reason) => Err(EngineError::MalformedEvent { event: event.to_string(), reason }),
            None => Ok(()),
        }
    }

    fn record_stats(
        &mut self,
        kind: EventKind,
        dirty: &[bool; NodeId::COUNT],
        breach: Option<f64>,
        transition: Option<Transition>,
    ) {
        let filter = match kind {
            EventKind::Trade => Some(NodeId::TradeFilter),
            EventKind::PriceUpdate => Some(NodeId::PriceFilter),
            EventKind::OrderDone => None,
        };
        if let Some(f) = filter {
            if !dirty[f.index()] {
                self.stats.filtered += 1;
                debug!(kind = kind.as_str(), "event filtered: unmanaged instrument");
            }
        }
        if breach.is_some() {
            self.stats.breaches += 1;
        }
        match transition.map(|t| t.outcome) {
            Some(HedgeOutcome::Issued) => self.stats.hedges_issued += 1,
            Some(HedgeOutcome::Suppressed) => self.stats.breaches_suppressed += 1,
            Some(HedgeOutcome::Completed) => self.stats.orders_done += 1,
            Some(HedgeOutcome::UnexpectedDone) => self.stats.unexpected_order_done += 1,
            None => {}
        }
    }

    fn log_transition(&self, t: Transition, snap: &EngineSnapshot) {
        match t.outcome {
            HedgeOutcome::Issued => info!(
                instrument = %self.cfg.instrument,
                quantity = snap.position,
                pnl = snap.pnl,
                "pnl breach - hedge issued to clear position"
            ),
            HedgeOutcome::Suppressed => {
                debug!(pnl = snap.pnl, "pnl breach while hedge in flight - suppressed")
            }
            HedgeOutcome::Completed => info!("hedge order done - ready to hedge again"),
            HedgeOutcome::UnexpectedDone => warn!("order done received with no hedge in flight"),
        }
    }
}
