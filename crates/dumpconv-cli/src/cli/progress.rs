//! Terminal progress line, redrawn every 500 ms from a tokio task.

use dumpconv_core::progress::{ProgressAggregator, ProgressSnapshot};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);
const MIB: f64 = 1_048_576.0;

/// What the aggregator counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Bytes,
    Rows,
}

pub struct ProgressTicker {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl ProgressTicker {
    pub fn spawn(progress: Arc<ProgressAggregator>, unit: Unit) -> Self {
        let (stop, mut stopped) = oneshot::channel();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(PROGRESS_INTERVAL);
            loop {
                tokio::select! {
                    _ = interval.tick() => draw(&progress.snapshot(), unit),
                    _ = &mut stopped => break,
                }
            }
            draw(&progress.snapshot(), unit);
            println!();
        });
        Self { stop, handle }
    }

    /// Draw the final line and wait for the task to end.
    pub async fn finish(self) {
        let _ = self.stop.send(());
        let _ = self.handle.await;
    }
}

fn draw(snap: &ProgressSnapshot, unit: Unit) {
    let mut out = std::io::stdout().lock();
    let _ = write!(out, "{}", format_line(snap, unit));
    let _ = out.flush();
}

pub fn format_line(snap: &ProgressSnapshot, unit: Unit) -> String {
    let eta = snap
        .eta()
        .map(|d| format!("{:.0}s", d.as_secs_f64()))
        .unwrap_or_else(|| "?".to_string());
    let pct = snap
        .fraction()
        .map(|f| format!("{:.1}%", f * 100.0))
        .unwrap_or_else(|| "?".to_string());
    match unit {
        Unit::Bytes => {
            let total = snap
                .expected
                .map(|n| format!("{:.1}", n as f64 / MIB))
                .unwrap_or_else(|| "?".to_string());
            format!(
                "\r  {:.1} / {} MiB ({})  {:.2} MiB/s  ETA {}  ",
                snap.total as f64 / MIB,
                total,
                pct,
                snap.rate / MIB,
                eta
            )
        }
        Unit::Rows => {
            let total = snap
                .expected
                .map(|n| n.to_string())
                .unwrap_or_else(|| "?".to_string());
            format!(
                "\r  {} / {} rows ({})  {:.0} rows/s  ETA {}  ",
                snap.total, total, pct, snap.rate, eta
            )
        }
    }
}
