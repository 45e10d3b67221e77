// ===============================
// src/feed.rs
// ===============================
//
// Event source untuk binary (semua kirim ke satu antrian mpsc -> engine):
// - run_scenario : urutan sample tetap (12 event, termasuk instrumen lain & OrderDone)
// - run_mock     : random walk trade + quote (~200 event/s)
// - run_replay   : file JSONL, satu event per baris (format Event, atau baris recorder kind=event)
//
use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::domain::Event;

pub fn scenario_events(instrument: &str) -> Vec<Event> {
    vec![
        Event::trade(instrument, 100, 3.0),
        Event::trade("NOT-BTC", 100, 35_000.0),
        Event::price(instrument, 2.0, 3.0),
        Event::trade(instrument, 200, 4.0),
        Event::trade(instrument, 30, 3.5),
        Event::order_done(),
        Event::trade(instrument, 30, 3.5),
        Event::trade(instrument, -300, 3.0),
        Event::price(instrument, 1.0, 2.0),
        Event::order_done(),
        Event::price(instrument, 5.0, 7.0),
        Event::trade(instrument, -60, 6.0),
    ]
}

pub async fn run_scenario(tx: mpsc::Sender<Event>, instrument: String) {
    for ev in scenario_events(&instrument) {
        if tx.send(ev).await.is_err() {
            warn!("event queue closed, scenario stopped");
            return;
        }
    }
    info!("scenario feed finished");
}

/// Random walk quote around 100.0 with trades crossing the spread.
/// Sekitar 1 dari 10 event untuk instrumen lain (dibuang filter).
pub fn mock_events(instrument: &str, count: usize, seed: u64) -> Vec<Event> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut bid: f64 = 100.0;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let step: i32 = rng.gen_range(-3..=3);
        bid = (bid + step as f64 * 0.01).max(50.0);
        let offer = bid + 0.01;
        let roll: u8 = rng.gen_range(0..10);
        let ev = match roll {
            0 => Event::trade("NOT-BTC", rng.gen_range(1..=50), 35_000.0),
            1..=4 => {
                let volume: i64 = rng.gen_range(-20..=20);
                let price = if volume >= 0 { offer } else { bid };
                Event::trade(instrument, volume, price)
            }
            _ => Event::price(instrument, bid, offer),
        };
        out.push(ev);
    }
    out
}

pub async fn run_mock(tx: mpsc::Sender<Event>, instrument: String, count: usize, seed: Option<u64>) {
    let seed = seed.unwrap_or_else(rand::random);
    info!(seed, count, "mock feed started");
    for ev in mock_events(&instrument, count, seed) {
        if tx.send(ev).await.is_err() {
            warn!("event queue closed, mock feed stopped");
            return;
        }
        sleep(Duration::from_millis(5)).await; // ~200 event/s
    }
    info!("mock feed finished");
}

#[derive(Deserialize)]
struct RecordedEvent {
    event: Event,
}

/// Parses one replay line: a bare event or a recorder `kind=event` line.
/// Baris lain dari recorder (hedge, summary) -> Ok(None).
pub fn parse_line(line: &str) -> serde_json::Result<Option<Event>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    match serde_json::from_str::<Event>(line) {
        Ok(ev) => Ok(Some(ev)),
        Err(e) => {
            let v: serde_json::Value = serde_json::from_str(line)?;
            if v.get("kind").is_none() {
                return Err(e);
            }
            if v["kind"] != "event" {
                return Ok(None);
            }
            let rec: RecordedEvent = serde_json::from_value(v)?;
            Ok(Some(rec.event))
        }
    }
}

pub async fn run_replay(tx: mpsc::Sender<Event>, path: PathBuf) {
    if let Err(e) = replay_file(&tx, &path).await {
        warn!(?e, path = %path.display(), "replay aborted");
    }
}

async fn replay_file(tx: &mpsc::Sender<Event>, path: &Path) -> std::io::Result<()> {
    let file = tokio::fs::File::open(path).await?;
    let mut lines = BufReader::new(file).lines();
    let (mut sent, mut bad) = (0u64, 0u64);
    let mut lineno = 0u64;
    while let Some(line) = lines.next_line().await? {
        lineno += 1;
        match parse_line(&line) {
            Ok(Some(ev)) => {
                if tx.send(ev).await.is_err() {
                    warn!("event queue closed, replay stopped");
                    break;
                }
                sent += 1;
            }
            Ok(None) => {}
            Err(e) => {
                bad += 1;
                warn!(lineno, error = %e, "replay: skip unparsable line");
            }
        }
    }
    info!(sent, bad, path = %path.display(), "replay feed finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_scenario_shape() {
        let evs = scenario_events("BTC");
        assert_eq!(evs.len(), 12);
        assert_eq!(evs.iter().filter(|e| **e == Event::order_done()).count(), 2);
    }

    #[rstest]
    fn test_mock_is_deterministic_per_seed() {
        let a = mock_events("BTC", 50, 7);
        let b = mock_events("BTC", 50, 7);
        assert_eq!(a, b);
        assert_eq!(a.len(), 50);
    }

    #[rstest]
    fn test_mock_prices_are_positive() {
        for ev in mock_events("BTC", 500, 42) {
            match ev {
                Event::PriceUpdate(p) => assert!(p.bid >= 50.0 && p.offer > p.bid),
                Event::Trade(t) => assert!(t.price > 0.0),
                Event::OrderDone(_) => {}
            }
        }
    }

    #[rstest]
    #[case(r#"{"type":"Trade","instrument":"BTC","volume":5,"price":2.0}"#, Some(Event::trade("BTC", 5, 2.0)))]
    #[case(r#"{"ts_ns":1,"kind":"event","event":{"type":"OrderDone"}}"#, Some(Event::order_done()))]
    #[case(r#"{"ts_ns":1,"kind":"hedge","request":{"quantity_to_flatten":1,"triggering_pnl":-1.0}}"#, None)]
    #[case("   ", None)]
    fn test_parse_line(#[case] line: &str, #[case] expected: Option<Event>) {
        assert_eq!(parse_line(line).unwrap(), expected);
    }

    #[rstest]
    fn test_parse_line_rejects_garbage() {
        assert!(parse_line("not json").is_err());
        assert!(parse_line(r#"{"type":"Quote"}"#).is_err());
    }

    #[tokio::test]
    async fn test_replay_file_skips_bad_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"type":"PriceUpdate","instrument":"BTC","bid":2.0,"offer":3.0}}"#).unwrap();
        writeln!(file, "garbage").unwrap();
        writeln!(file, r#"{{"type":"OrderDone"}}"#).unwrap();
        file.flush().unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        run_replay(tx, file.path().to_path_buf()).await;

        assert_eq!(rx.recv().await, Some(Event::price("BTC", 2.0, 3.0)));
        assert_eq!(rx.recv().await, Some(Event::order_done()));
        assert_eq!(rx.recv().await, None);
    }
}
