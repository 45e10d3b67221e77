// ===============================
// src/recorder.rs
// ===============================
//
// JSONL recorder yang ringan & tahan banting:
// - Tulis setiap Record (event masuk, hedge keluar, summary) ke file .jsonl (append).
// - Bufer dengan BufWriter agar hemat syscall.
// - Flush periodik tiap 1s dan/atau tiap 1000 record.
// - Otomatis membuat parent directory jika belum ada.
// - Jika tulis gagal, coba reopen file dan lanjut.
//
// Baris `{"kind":"event",...}` bisa di-replay lagi lewat feed::run_replay.
//
use std::path::Path;

use chrono::Utc;
use serde::Serialize;
use tokio::{
    fs::{self, OpenOptions},
    io::{AsyncWriteExt, BufWriter},
    sync::mpsc,
    time::{interval, Duration, MissedTickBehavior},
};
use tracing::{error, info};

use crate::domain::{Event, HedgeRequest};
use crate::engine::{EngineSnapshot, EngineStats};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Event { event: Event },
    Hedge { request: HedgeRequest },
    Summary { stats: EngineStats, snapshot: EngineSnapshot },
}

#[derive(Debug, Serialize)]
struct Line<'a> {
    ts_ns: i64,
    #[serde(flatten)]
    record: &'a Record,
}

pub fn to_line(record: &Record) -> serde_json::Result<String> {
    let ts_ns = Utc::now().timestamp_nanos_opt().unwrap_or(0);
    serde_json::to_string(&Line { ts_ns, record })
}

async fn open_writer(path: &str) -> std::io::Result<BufWriter<tokio::fs::File>> {
    // Pastikan parent directory ada (kalau ada)
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    let file = OpenOptions::new().create(true).append(true).open(path).await?;
    Ok(BufWriter::new(file))
}

pub async fn run(mut rx: mpsc::Receiver<Record>, path: String) {
    let mut writer = match open_writer(&path).await {
        Ok(w) => w,
        Err(e) => {
            error!(?e, %path, "recorder: open failed, recording disabled");
            return;
        }
    };
    info!(%path, "recorder: started");

    let mut tick = interval(Duration::from_secs(1));
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut since_last_flush: u32 = 0;
    const FLUSH_EVERY_N_RECORDS: u32 = 1000;

    loop {
        tokio::select! {
            maybe_rec = rx.recv() => {
                let Some(rec) = maybe_rec else {
                    // Channel closed: flush dan keluar
                    let _ = writer.flush().await;
                    info!("recorder: channel closed, stopped");
                    break;
                };
                let mut line = match to_line(&rec) {
                    Ok(s) => s,
                    Err(e) => {
                        error!(?e, "recorder: serialize error, skip record");
                        continue;
                    }
                };
                line.push('\n');

                if let Err(e) = writer.write_all(line.as_bytes()).await {
                    error!(?e, "recorder: write_all failed, attempting reopen");
                    match open_writer(&path).await {
                        Ok(w) => writer = w,
                        Err(e2) => {
                            error!(?e2, "recorder: reopen failed, drop record");
                            continue;
                        }
                    }
                    // coba lagi sekali setelah reopen
                    if let Err(e2) = writer.write_all(line.as_bytes()).await {
                        error!(?e2, "recorder: write_all failed again after reopen, drop record");
                        continue;
                    }
                }

                since_last_flush += 1;
                if since_last_flush >= FLUSH_EVERY_N_RECORDS {
                    let _ = writer.flush().await;
                    since_last_flush = 0;
                }
            }

            _ = tick.tick() => {
                let _ = writer.flush().await;
                since_last_flush = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_event_line_shape() {
        let line = to_line(&Record::Event { event: Event::trade("BTC", 100, 3.0) }).unwrap();
        let v: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(v["kind"], "event");
        assert_eq!(v["event"]["type"], "Trade");
        assert_eq!(v["event"]["volume"], 100);
        assert!(v["ts_ns"].as_i64().is_some());
    }

    #[rstest]
    fn test_hedge_line_shape() {
        let req = HedgeRequest { quantity_to_flatten: 300, triggering_pnl: -800.0 };
        let line = to_line(&Record::Hedge { request: req }).unwrap();
        let v: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(v["kind"], "hedge");
        assert_eq!(v["request"]["quantity_to_flatten"], 300);
    }

    #[tokio::test]
    async fn test_run_writes_and_flushes_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("events.jsonl");
        let (tx, rx) = mpsc::channel(16);
        let handle = tokio::spawn(run(rx, path.to_string_lossy().into_owned()));

        tx.send(Record::Event { event: Event::order_done() }).await.unwrap();
        tx.send(Record::Hedge {
            request: HedgeRequest { quantity_to_flatten: 1, triggering_pnl: 400.0 },
        })
        .await
        .unwrap();
        drop(tx);
        handle.await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
    }
}
