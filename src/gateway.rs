// ===============================
// src/gateway.rs (mock order management)
// ===============================
//
// Terima HedgeRequest dari engine; kalau `order_done_ms` di-set, balas OrderDone
// ke antrian event setelah delay (ACK -> done, mirip venue mock).
// Pegang WeakSender saja: begitu feed selesai, antrian event boleh tutup.
//
use tokio::{
    sync::mpsc,
    time::{sleep, Duration},
};
use tracing::{info, warn};

use crate::domain::{Event, HedgeRequest};
use crate::recorder::Record;

pub async fn run(
    mut rx: mpsc::Receiver<HedgeRequest>,
    events: mpsc::WeakSender<Event>,
    order_done_ms: Option<u64>,
    rec_tx: Option<mpsc::Sender<Record>>,
) {
    while let Some(req) = rx.recv().await {
        info!(qty = req.quantity_to_flatten, pnl = req.triggering_pnl, "hedge ACK");
        if let Some(rec) = &rec_tx {
            let _ = rec.try_send(Record::Hedge { request: req });
        }

        let Some(ms) = order_done_ms else { continue };
        sleep(Duration::from_millis(ms)).await;

        match events.upgrade() {
            Some(tx) => {
                if tx.send(Event::order_done()).await.is_err() {
                    warn!("event queue closed before order done");
                } else {
                    info!(qty = req.quantity_to_flatten, "hedge FILLED -> order done");
                }
            }
            None => warn!("feed finished, order done dropped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_answers_with_order_done() {
        let (ev_tx, mut ev_rx) = mpsc::channel::<Event>(4);
        let (hedge_tx, hedge_rx) = mpsc::channel::<HedgeRequest>(4);
        let handle = tokio::spawn(run(hedge_rx, ev_tx.downgrade(), Some(1), None));

        hedge_tx
            .send(HedgeRequest { quantity_to_flatten: 300, triggering_pnl: -350.0 })
            .await
            .unwrap();
        assert_eq!(ev_rx.recv().await, Some(Event::order_done()));

        drop(hedge_tx);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_without_delay_only_acks() {
        let (ev_tx, mut ev_rx) = mpsc::channel::<Event>(4);
        let (hedge_tx, hedge_rx) = mpsc::channel::<HedgeRequest>(4);
        let (rec_tx, mut rec_rx) = mpsc::channel::<Record>(4);
        let handle = tokio::spawn(run(hedge_rx, ev_tx.downgrade(), None, Some(rec_tx)));

        hedge_tx
            .send(HedgeRequest { quantity_to_flatten: 1, triggering_pnl: 301.0 })
            .await
            .unwrap();
        drop(hedge_tx);
        handle.await.unwrap();

        assert!(matches!(rec_rx.recv().await, Some(Record::Hedge { .. })));
        drop(ev_tx);
        assert_eq!(ev_rx.recv().await, None);
    }
}
