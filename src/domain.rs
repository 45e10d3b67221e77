// ===============================
// src/domain.rs
// ===============================
use std::fmt;

use serde::{Deserialize, Serialize};

/// Trade untuk satu instrumen. `volume` positif = buy, negatif = sell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade { pub instrument: String, pub volume: i64, pub price: f64 }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdate { pub instrument: String, pub bid: f64, pub offer: f64 }

impl PriceUpdate {
    pub fn mid_price(&self) -> f64 {
        (self.bid + self.offer) / 2.0
    }
}

/// Completion notice for the outstanding hedge order. Carries no payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDone {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    Trade(Trade),
    PriceUpdate(PriceUpdate),
    OrderDone(OrderDone),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind { Trade, PriceUpdate, OrderDone }

impl EventKind {
    pub const ALL: [EventKind; 3] = [EventKind::Trade, EventKind::PriceUpdate, EventKind::OrderDone];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Trade => "trade",
            EventKind::PriceUpdate => "price_update",
            EventKind::OrderDone => "order_done",
        }
    }
}

impl Event {
    pub fn trade(instrument: &str, volume: i64, price: f64) -> Self {
        Event::Trade(Trade { instrument: instrument.to_string(), volume, price })
    }

    pub fn price(instrument: &str, bid: f64, offer: f64) -> Self {
        Event::PriceUpdate(PriceUpdate { instrument: instrument.to_string(), bid, offer })
    }

    pub fn order_done() -> Self {
        Event::OrderDone(OrderDone {})
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Event::Trade(_) => EventKind::Trade,
            Event::PriceUpdate(_) => EventKind::PriceUpdate,
            Event::OrderDone(_) => EventKind::OrderDone,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Trade(t) => write!(f, "Trade({}, {}, {})", t.instrument, t.volume, t.price),
            Event::PriceUpdate(p) => write!(f, "PriceUpdate({}, {}, {})", p.instrument, p.bid, p.offer),
            Event::OrderDone(_) => write!(f, "OrderDone"),
        }
    }
}

/// Output ke order management: ratakan posisi sebesar `quantity_to_flatten`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HedgeRequest { pub quantity_to_flatten: i64, pub triggering_pnl: f64 }
