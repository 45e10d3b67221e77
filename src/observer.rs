// ===============================
// src/observer.rs
// ===============================
//
// Side channel untuk "peek" nilai node. Observer hanya menerima salinan
// (by value) dan tidak mengembalikan apa pun -> tidak bisa mempengaruhi hitungan.
//
use serde::Serialize;
use tracing::{debug, info};

use crate::engine::EngineSnapshot;
use crate::graph::NodeId;
use crate::hedge::HedgeOutcome;

/// Value a node produced during a pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum NodeValue {
    /// Source / filter nodes: the event passed.
    Passed,
    Int(i64),
    Float(f64),
    Hedge(HedgeOutcome),
}

pub trait Observer {
    /// Called once per recomputed node, in evaluation order, after the pass commits.
    fn on_node(&self, node: NodeId, value: NodeValue);

    fn on_pass(&self, _seq: u64, _snapshot: EngineSnapshot) {}
}

/// Console peek ala sample: cetak nilai tiap node lewat tracing.
#[derive(Debug, Default, Clone)]
pub struct TracingObserver {
    pub instrument: String,
}

impl TracingObserver {
    pub fn new(instrument: impl Into<String>) -> Self {
        Self { instrument: instrument.into() }
    }
}

impl Observer for TracingObserver {
    fn on_node(&self, node: NodeId, value: NodeValue) {
        let inst = self.instrument.as_str();
        match (node, value) {
            (NodeId::Position, NodeValue::Int(v)) => debug!(instrument = inst, position = v, "position"),
            (NodeId::Cash, NodeValue::Float(v)) => debug!(cash = v, "cash position"),
            (NodeId::MidPrice, NodeValue::Float(v)) => debug!(instrument = inst, mid = v, "mid price"),
            (NodeId::AssetValue, NodeValue::Float(v)) => {
                debug!(instrument = inst, asset_value = v, "position mark to market")
            }
            (NodeId::Pnl, NodeValue::Float(v)) => debug!(pnl = v, "trading pnl"),
            (NodeId::Breach, NodeValue::Float(v)) => info!(pnl = v, "pnl breach"),
            (node, value) => debug!(%node, ?value, "node"),
        }
    }

    fn on_pass(&self, seq: u64, snapshot: EngineSnapshot) {
        debug!(seq, ?snapshot, "pass committed");
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use rstest::rstest;
    use tracing_test::traced_test;

    use super::*;

    #[derive(Default)]
    struct Collect(RefCell<Vec<(NodeId, NodeValue)>>);

    impl Observer for Collect {
        fn on_node(&self, node: NodeId, value: NodeValue) {
            self.0.borrow_mut().push((node, value));
        }
    }

    #[rstest]
    fn test_default_on_pass_is_noop() {
        let c = Collect::default();
        c.on_node(NodeId::Pnl, NodeValue::Float(-50.0));
        c.on_pass(1, EngineSnapshot::default());
        assert_eq!(c.0.borrow().as_slice(), &[(NodeId::Pnl, NodeValue::Float(-50.0))]);
    }

    #[test]
    #[traced_test]
    fn test_tracing_observer_logs_node_values() {
        let obs = TracingObserver::new("BTC");
        obs.on_node(NodeId::TradeFilter, NodeValue::Passed);
        obs.on_node(NodeId::Position, NodeValue::Int(100));
        obs.on_node(NodeId::Breach, NodeValue::Float(-350.0));
        obs.on_node(NodeId::Hedge, NodeValue::Hedge(HedgeOutcome::Issued));
        obs.on_pass(3, EngineSnapshot::default());

        assert!(logs_contain("node=trade_filter"));
        assert!(logs_contain("position=100"));
        assert!(logs_contain("pnl breach"));
        assert!(logs_contain("pnl=-350"));
        assert!(logs_contain("value=Hedge(Issued)"));
        assert!(logs_contain("pass committed"));
        assert!(logs_contain("seq=3"));
    }
}
