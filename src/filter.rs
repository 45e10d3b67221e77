// ===============================
// src/filter.rs
// ===============================
use crate::domain::{PriceUpdate, Trade};

/// Event yang membawa kode instrumen (Trade & PriceUpdate).
/// OrderDone sengaja tidak implement: tidak pernah difilter per instrumen.
pub trait Instrumented {
    fn instrument(&self) -> &str;
}

impl Instrumented for Trade {
    fn instrument(&self) -> &str { &self.instrument }
}

impl Instrumented for PriceUpdate {
    fn instrument(&self) -> &str { &self.instrument }
}

pub fn filter_instrument<E: Instrumented + ?Sized>(event: &E, managed: &str) -> bool {
    event.instrument() == managed
}
