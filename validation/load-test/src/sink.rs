//! Result sink: where step outcomes go once a step finishes.

use crate::error::StepError;
use crate::metrics::MetricsCollector;
use crate::step::StepOutcome;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

/// One step outcome tagged with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeRecord {
    pub client: usize,
    pub run: usize,
    /// Position of the step within the workflow.
    pub step_index: usize,
    pub outcome: StepOutcome,
}

/// Receives outcomes from every virtual client.
///
/// `record` is called concurrently from all clients and must return quickly
/// without waiting on other clients.
pub trait ResultSink: Send + Sync {
    fn record(&self, record: OutcomeRecord);
}

/// Forwards records over an unbounded channel to an aggregator task.
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<OutcomeRecord>,
}

impl ChannelSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OutcomeRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ResultSink for ChannelSink {
    fn record(&self, record: OutcomeRecord) {
        // Receiver only goes away after every client has finished
        let _ = self.tx.send(record);
    }
}

/// A single logged outcome, one JSON object per line.
#[derive(Debug, Serialize)]
pub struct OutcomeLog<'a> {
    pub timestamp: String,
    pub client: usize,
    pub run: usize,
    pub step_index: usize,
    pub step: &'a str,
    pub success: bool,
    pub status: Option<u16>,
    pub latency_ms: f64,
    pub error: Option<&'a StepError>,
}

impl<'a> OutcomeLog<'a> {
    pub fn from_record(record: &'a OutcomeRecord) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            client: record.client,
            run: record.run,
            step_index: record.step_index,
            step: &record.outcome.step,
            success: record.outcome.success,
            status: record.outcome.status,
            latency_ms: record.outcome.latency.as_secs_f64() * 1000.0,
            error: record.outcome.error.as_ref(),
        }
    }
}

/// JSONL log path under `dir`, named after the scenario and start time.
pub fn outcome_log_path(dir: impl AsRef<Path>, scenario_name: &str) -> PathBuf {
    let scenario = scenario_name.replace(' ', "_").to_lowercase();
    dir.as_ref().join(format!(
        "{}_{}.jsonl",
        scenario,
        chrono::Utc::now().format("%Y%m%d_%H%M%S")
    ))
}

/// Drain `rx` into a [`MetricsCollector`], optionally appending every record
/// to a JSONL file and ticking a progress bar (one tick per step outcome).
/// Completes once all senders are dropped.
pub fn spawn_aggregator(
    mut rx: mpsc::UnboundedReceiver<OutcomeRecord>,
    log: Option<File>,
    progress: Option<indicatif::ProgressBar>,
) -> JoinHandle<MetricsCollector> {
    tokio::spawn(async move {
        let mut metrics = MetricsCollector::new();
        let mut writer = log.map(BufWriter::new);

        while let Some(record) = rx.recv().await {
            metrics.record(&record);

            if let Some(w) = writer.as_mut() {
                match serde_json::to_string(&OutcomeLog::from_record(&record)) {
                    Ok(json) => {
                        if let Err(e) = writeln!(w, "{}", json) {
                            warn!(error = %e, "Failed to write outcome log, disabling it");
                            writer = None;
                        }
                    }
                    Err(e) => warn!(error = %e, "Failed to serialize outcome"),
                }
            }

            if let Some(pb) = &progress {
                pb.inc(1);
                pb.set_message(format!("{} failed", metrics.failed()));
            }
        }

        if let Some(mut w) = writer {
            if let Err(e) = w.flush() {
                warn!(error = %e, "Failed to flush outcome log");
            }
        }
        metrics
    })
}
