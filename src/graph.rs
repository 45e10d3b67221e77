// ===============================
// src/graph.rs (static dependency graph)
// ===============================
//
// Graph dibangun sekali saat startup:
// - tiap node mendeklarasikan input-nya
// - urutan topologis dihitung sekali (Kahn), tie-break by declaration order
// - per EventKind disimpan jadwal: node yang reachable dari source node event tsb
//
// Engine cukup jalan linear di atas jadwal -> tiap node dievaluasi max 1x per event,
// dan selalu setelah semua input-nya selesai.
//
use std::collections::VecDeque;
use std::fmt;

use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use serde::Serialize;
use thiserror::Error;

use crate::domain::EventKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum NodeId {
    TradeIn,
    PriceIn,
    OrderDoneIn,
    TradeFilter,
    PriceFilter,
    Position,
    Cash,
    MidPrice,
    AssetValue,
    Pnl,
    Breach,
    Hedge,
}

impl NodeId {
    pub const COUNT: usize = 12;

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn source_for(kind: EventKind) -> NodeId {
        match kind {
            EventKind::Trade => NodeId::TradeIn,
            EventKind::PriceUpdate => NodeId::PriceIn,
            EventKind::OrderDone => NodeId::OrderDoneIn,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeId::TradeIn => "trade_in",
            NodeId::PriceIn => "price_in",
            NodeId::OrderDoneIn => "order_done_in",
            NodeId::TradeFilter => "trade_filter",
            NodeId::PriceFilter => "price_filter",
            NodeId::Position => "position",
            NodeId::Cash => "cash",
            NodeId::MidPrice => "mid_price",
            NodeId::AssetValue => "asset_value",
            NodeId::Pnl => "pnl",
            NodeId::Breach => "breach",
            NodeId::Hedge => "hedge",
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("node {0} declared twice")]
    Duplicate(NodeId),
    #[error("node {node} depends on undeclared node {input}")]
    UnknownInput { node: NodeId, input: NodeId },
    #[error("dependency cycle through {0:?}")]
    Cycle(Vec<NodeId>),
}

#[derive(Debug, Clone)]
pub struct Graph {
    inputs: HashMap<NodeId, Vec<NodeId>>,
    order: Vec<NodeId>,
    schedules: HashMap<EventKind, Vec<NodeId>>,
}

impl Graph {
    /// Builds the graph from `(node, inputs)` declarations. Source nodes declare no inputs.
    pub fn new(decls: Vec<(NodeId, Vec<NodeId>)>) -> Result<Self, GraphError> {
        let mut inputs: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for (node, deps) in &decls {
            if inputs.insert(*node, deps.clone()).is_some() {
                return Err(GraphError::Duplicate(*node));
            }
        }
        for (node, deps) in &decls {
            if let Some(missing) = deps.iter().find(|d| !inputs.contains_key(*d)) {
                return Err(GraphError::UnknownInput { node: *node, input: *missing });
            }
        }

        let declared: Vec<NodeId> = decls.iter().map(|(n, _)| *n).collect();
        let order = topo_sort(&declared, &inputs)?;

        let mut graph = Self { inputs, order, schedules: HashMap::new() };
        for kind in EventKind::ALL {
            let source = NodeId::source_for(kind);
            let reach = graph.reachable_from(source);
            let schedule = graph.order.iter().copied().filter(|n| reach.contains(n)).collect();
            graph.schedules.insert(kind, schedule);
        }
        Ok(graph)
    }

    /// The pnl / hedge graph:
    /// trade -> filter -> {position, cash}; price -> filter -> mid;
    /// position x mid -> asset value; cash + asset value -> pnl -> breach -> hedge <- order done.
    pub fn standard() -> Result<Self, GraphError> {
        use NodeId::*;
        Graph::new(vec![
            (TradeIn, vec![]),
            (PriceIn, vec![]),
            (OrderDoneIn, vec![]),
            (TradeFilter, vec![TradeIn]),
            (PriceFilter, vec![PriceIn]),
            (Position, vec![TradeFilter]),
            (Cash, vec![TradeFilter]),
            (MidPrice, vec![PriceFilter]),
            (AssetValue, vec![Position, MidPrice]),
            (Pnl, vec![Cash, AssetValue]),
            (Breach, vec![Pnl]),
            (Hedge, vec![Breach, OrderDoneIn]),
        ])
    }

    pub fn inputs(&self, node: NodeId) -> &[NodeId] {
        self.inputs.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Full topological order of every declared node.
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    /// Nodes reachable from the source of `kind`, in topological order (source first).
    pub fn schedule(&self, kind: EventKind) -> &[NodeId] {
        self.schedules.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    fn reachable_from(&self, source: NodeId) -> HashSet<NodeId> {
        let mut seen = HashSet::new();
        if !self.inputs.contains_key(&source) {
            return seen;
        }
        let mut queue = VecDeque::from([source]);
        seen.insert(source);
        while let Some(n) = queue.pop_front() {
            for (child, deps) in &self.inputs {
                if deps.contains(&n) && seen.insert(*child) {
                    queue.push_back(*child);
                }
            }
        }
        seen
    }
}

fn topo_sort(
    declared: &[NodeId],
    inputs: &HashMap<NodeId, Vec<NodeId>>,
) -> Result<Vec<NodeId>, GraphError> {
    let mut pending: HashMap<NodeId, usize> =
        declared.iter().map(|n| (*n, inputs[n].len())).collect();
    let mut order = Vec::with_capacity(declared.len());

    // Deterministik: selalu ambil node siap pertama sesuai urutan deklarasi
    loop {
        let ready = declared.iter().copied().find(|n| pending.get(n) == Some(&0));
        let Some(node) = ready else { break };
        pending.remove(&node);
        order.push(node);
        for child in declared {
            if let Some(count) = pending.get_mut(child) {
                *count -= inputs[child].iter().filter(|d| **d == node).count();
            }
        }
    }

    if !pending.is_empty() {
        let mut stuck: Vec<NodeId> = pending.keys().copied().collect();
        stuck.sort();
        return Err(GraphError::Cycle(stuck));
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;
    use super::NodeId::*;

    #[fixture]
    fn graph() -> Graph {
        Graph::standard().unwrap()
    }

    fn pos(order: &[NodeId], n: NodeId) -> usize {
        order.iter().position(|x| *x == n).unwrap()
    }

    #[rstest]
    fn test_order_respects_dependencies(graph: Graph) {
        let order = graph.order();
        assert_eq!(order.len(), NodeId::COUNT);
        for node in order {
            for input in graph.inputs(*node) {
                assert!(pos(order, *input) < pos(order, *node), "{input} must precede {node}");
            }
        }
    }

    #[rstest]
    fn test_trade_schedule(graph: Graph) {
        assert_eq!(
            graph.schedule(EventKind::Trade),
            &[TradeIn, TradeFilter, Position, Cash, AssetValue, Pnl, Breach, Hedge]
        );
    }

    #[rstest]
    fn test_price_schedule_skips_accumulators(graph: Graph) {
        assert_eq!(
            graph.schedule(EventKind::PriceUpdate),
            &[PriceIn, PriceFilter, MidPrice, AssetValue, Pnl, Breach, Hedge]
        );
    }

    #[rstest]
    fn test_order_done_goes_straight_to_hedge(graph: Graph) {
        assert_eq!(graph.schedule(EventKind::OrderDone), &[OrderDoneIn, Hedge]);
    }

    #[rstest]
    fn test_cycle_detected() {
        let err = Graph::new(vec![(TradeIn, vec![]), (Position, vec![TradeIn, Cash]), (Cash, vec![Position])])
            .unwrap_err();
        assert_eq!(err, GraphError::Cycle(vec![Position, Cash]));
    }

    #[rstest]
    fn test_unknown_input() {
        let err = Graph::new(vec![(Position, vec![TradeFilter])]).unwrap_err();
        assert_eq!(err, GraphError::UnknownInput { node: Position, input: TradeFilter });
    }

    #[rstest]
    fn test_duplicate() {
        let err = Graph::new(vec![(TradeIn, vec![]), (TradeIn, vec![])]).unwrap_err();
        assert_eq!(err, GraphError::Duplicate(TradeIn));
    }

    #[rstest]
    fn test_missing_source_gives_empty_schedule() {
        let g = Graph::new(vec![(TradeIn, vec![]), (TradeFilter, vec![TradeIn])]).unwrap();
        assert!(g.schedule(EventKind::OrderDone).is_empty());
    }
}
