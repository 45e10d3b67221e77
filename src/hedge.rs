// ===============================
// src/hedge.rs (hedge state machine)
// ===============================
//
// Dua state:
//   Idle    -> belum ada hedge order di market
//   Hedging -> hedge order sudah dikirim, menunggu OrderDone
//
// Transisi murni (tanpa side effect); engine yang kirim HedgeRequest ke sink
// setelah pass selesai di-commit.
//
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::domain::HedgeRequest;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HedgeState {
    #[default]
    Idle,
    Hedging,
}

impl HedgeState {
    pub fn initial(hedge_in_flight: bool) -> Self {
        if hedge_in_flight { HedgeState::Hedging } else { HedgeState::Idle }
    }

    pub fn in_flight(&self) -> bool {
        matches!(self, HedgeState::Hedging)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HedgeSignal {
    /// Pnl outside the band; carries the position to flatten and the pnl that tripped it.
    Breach { position: i64, pnl: f64 },
    OrderDone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HedgeOutcome {
    Issued,
    Suppressed,
    Completed,
    /// OrderDone with nothing outstanding.
    UnexpectedDone,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub next: HedgeState,
    pub action: Option<HedgeRequest>,
    pub outcome: HedgeOutcome,
}

pub fn transition(state: HedgeState, signal: HedgeSignal) -> Transition {
    match (state, signal) {
        (HedgeState::Idle, HedgeSignal::Breach { position, pnl }) => Transition {
            next: HedgeState::Hedging,
            action: Some(HedgeRequest { quantity_to_flatten: position, triggering_pnl: pnl }),
            outcome: HedgeOutcome::Issued,
        },
        (HedgeState::Hedging, HedgeSignal::Breach { .. }) => Transition {
            next: HedgeState::Hedging,
            action: None,
            outcome: HedgeOutcome::Suppressed,
        },
        (HedgeState::Hedging, HedgeSignal::OrderDone) => Transition {
            next: HedgeState::Idle,
            action: None,
            outcome: HedgeOutcome::Completed,
        },
        (HedgeState::Idle, HedgeSignal::OrderDone) => Transition {
            next: HedgeState::Idle,
            action: None,
            outcome: HedgeOutcome::UnexpectedDone,
        },
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SinkError {
    #[error("hedge queue full")]
    Full,
    #[error("hedge receiver closed")]
    Closed,
}

/// Penerima HedgeRequest (order management). Dipanggil sinkron di dalam pass,
/// sebelum commit: kalau gagal, pass dibatalkan dan state tetap Idle.
pub trait HedgeSink {
    fn submit(&mut self, request: HedgeRequest) -> Result<(), SinkError>;
}

/// Discards requests; for runs that only observe metrics.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl HedgeSink for NullSink {
    fn submit(&mut self, _request: HedgeRequest) -> Result<(), SinkError> {
        Ok(())
    }
}

impl HedgeSink for Vec<HedgeRequest> {
    fn submit(&mut self, request: HedgeRequest) -> Result<(), SinkError> {
        self.push(request);
        Ok(())
    }
}

// try_send: engine tidak boleh block menunggu gateway
impl HedgeSink for mpsc::Sender<HedgeRequest> {
    fn submit(&mut self, request: HedgeRequest) -> Result<(), SinkError> {
        self.try_send(request).map_err(|e| match e {
            TrySendError::Full(_) => SinkError::Full,
            TrySendError::Closed(_) => SinkError::Closed,
        })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    const BREACH: HedgeSignal = HedgeSignal::Breach { position: 300, pnl: -800.0 };

    #[rstest]
    fn test_idle_breach_issues_hedge() {
        let t = transition(HedgeState::Idle, BREACH);
        assert_eq!(t.next, HedgeState::Hedging);
        assert_eq!(t.outcome, HedgeOutcome::Issued);
        assert_eq!(
            t.action,
            Some(HedgeRequest { quantity_to_flatten: 300, triggering_pnl: -800.0 })
        );
    }

    #[rstest]
    fn test_hedging_breach_is_suppressed() {
        let t = transition(HedgeState::Hedging, BREACH);
        assert_eq!(t.next, HedgeState::Hedging);
        assert_eq!(t.action, None);
        assert_eq!(t.outcome, HedgeOutcome::Suppressed);
    }

    #[rstest]
    #[case(HedgeState::Hedging, HedgeState::Idle, HedgeOutcome::Completed)]
    #[case(HedgeState::Idle, HedgeState::Idle, HedgeOutcome::UnexpectedDone)]
    fn test_order_done(
        #[case] from: HedgeState,
        #[case] to: HedgeState,
        #[case] outcome: HedgeOutcome,
    ) {
        let t = transition(from, HedgeSignal::OrderDone);
        assert_eq!(t.next, to);
        assert_eq!(t.action, None);
        assert_eq!(t.outcome, outcome);
    }

    #[rstest]
    fn test_at_most_one_request_per_episode() {
        let mut state = HedgeState::Idle;
        let mut issued = 0;
        for signal in [BREACH, BREACH, BREACH, HedgeSignal::OrderDone, BREACH, BREACH] {
            let t = transition(state, signal);
            if t.action.is_some() {
                assert_eq!(state, HedgeState::Idle, "hedge issued while already hedging");
                issued += 1;
            }
            state = t.next;
        }
        assert_eq!(issued, 2);
    }

    #[rstest]
    #[case(false, HedgeState::Idle)]
    #[case(true, HedgeState::Hedging)]
    fn test_initial_state(#[case] in_flight: bool, #[case] expected: HedgeState) {
        assert_eq!(HedgeState::initial(in_flight), expected);
        assert_eq!(expected.in_flight(), in_flight);
    }

    #[rstest]
    fn test_channel_sink_reports_full_without_blocking() {
        let (mut tx, mut rx) = mpsc::channel::<HedgeRequest>(1);
        let req = HedgeRequest { quantity_to_flatten: 1, triggering_pnl: -400.0 };
        assert_eq!(tx.submit(req), Ok(()));
        assert_eq!(tx.submit(req), Err(SinkError::Full));
        assert_eq!(rx.try_recv().ok(), Some(req));
        assert!(rx.try_recv().is_err());
    }

    #[rstest]
    fn test_channel_sink_reports_closed() {
        let (mut tx, rx) = mpsc::channel::<HedgeRequest>(1);
        drop(rx);
        let req = HedgeRequest { quantity_to_flatten: 1, triggering_pnl: -400.0 };
        assert_eq!(tx.submit(req), Err(SinkError::Closed));
    }
}
