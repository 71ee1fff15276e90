//! Metrics collection and statistics.

use crate::sink::OutcomeRecord;
use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn new_histogram() -> Histogram<u64> {
    Histogram::new(3).expect("Failed to create histogram")
}

/// Per-step counters and latency distribution.
struct StepStats {
    name: String,
    histogram: Histogram<u64>,
    success: u64,
    failed: u64,
}

impl StepStats {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            histogram: new_histogram(),
            success: 0,
            failed: 0,
        }
    }
}

/// Collects step outcomes during load test execution.
pub struct MetricsCollector {
    histogram: Histogram<u64>,
    steps_total: u64,
    steps_success: u64,
    steps_failed: u64,
    failures_by_kind: BTreeMap<String, u64>,
    /// Indexed by step position in the workflow.
    per_step: Vec<Option<StepStats>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            histogram: new_histogram(),
            steps_total: 0,
            steps_success: 0,
            steps_failed: 0,
            failures_by_kind: BTreeMap::new(),
            per_step: Vec::new(),
        }
    }

    /// Record one step outcome. Latency is only sampled when a response
    /// (of any status) came back.
    pub fn record(&mut self, record: &OutcomeRecord) {
        let outcome = &record.outcome;
        self.steps_total += 1;

        if record.step_index >= self.per_step.len() {
            self.per_step.resize_with(record.step_index + 1, || None);
        }
        let stats = self.per_step[record.step_index]
            .get_or_insert_with(|| StepStats::new(&outcome.step));

        if outcome.status.is_some() {
            let latency_us = outcome.latency.as_micros() as u64;
            self.histogram.record(latency_us).ok();
            stats.histogram.record(latency_us).ok();
        }

        if outcome.success {
            self.steps_success += 1;
            stats.success += 1;
        } else {
            self.steps_failed += 1;
            stats.failed += 1;
            let kind = outcome.error.as_ref().map(|e| e.kind()).unwrap_or("unknown");
            *self.failures_by_kind.entry(kind.to_string()).or_insert(0) += 1;
        }
    }

    pub fn total(&self) -> u64 {
        self.steps_total
    }

    pub fn failed(&self) -> u64 {
        self.steps_failed
    }

    /// Generate final test results.
    pub fn results(&self, meta: RunMeta) -> TestResults {
        let rps = if meta.duration_secs > 0.0 {
            self.steps_total as f64 / meta.duration_secs
        } else {
            0.0
        };

        let steps = self
            .per_step
            .iter()
            .flatten()
            .map(|s| StepResults {
                name: s.name.clone(),
                total: s.success + s.failed,
                successful: s.success,
                failed: s.failed,
                latency_p50: ms(s.histogram.value_at_percentile(50.0)),
                latency_p95: ms(s.histogram.value_at_percentile(95.0)),
                latency_p99: ms(s.histogram.value_at_percentile(99.0)),
                latency_max: ms(s.histogram.max()),
                latency_avg: s.histogram.mean() / 1000.0,
            })
            .collect();

        TestResults {
            timestamp: chrono::Utc::now().to_rfc3339(),
            scenario_name: meta.scenario_name,
            workflow_name: meta.workflow_name,
            duration_secs: meta.duration_secs,
            concurrency: meta.concurrency,
            iterations_per_client: meta.iterations_per_client,
            runs_expected: meta.concurrency as u64 * meta.iterations_per_client as u64,
            runs_completed: meta.runs_completed,
            cancelled: meta.cancelled,
            total_steps: self.steps_total,
            successful_steps: self.steps_success,
            failed_steps: self.steps_failed,
            steps_per_second: rps,
            latency_p50: ms(self.histogram.value_at_percentile(50.0)),
            latency_p75: ms(self.histogram.value_at_percentile(75.0)),
            latency_p90: ms(self.histogram.value_at_percentile(90.0)),
            latency_p95: ms(self.histogram.value_at_percentile(95.0)),
            latency_p99: ms(self.histogram.value_at_percentile(99.0)),
            latency_min: ms(self.histogram.min()),
            latency_max: ms(self.histogram.max()),
            latency_avg: self.histogram.mean() / 1000.0,
            failures_by_kind: self.failures_by_kind.clone(),
            steps,
        }
    }
}

fn ms(us: u64) -> f64 {
    us as f64 / 1000.0
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Run-level facts the collector cannot see from outcomes alone.
#[derive(Debug, Clone)]
pub struct RunMeta {
    pub scenario_name: String,
    pub workflow_name: String,
    pub duration_secs: f64,
    pub concurrency: u32,
    pub iterations_per_client: u32,
    pub runs_completed: u64,
    pub cancelled: bool,
}

/// Final test results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResults {
    pub timestamp: String,
    pub scenario_name: String,
    pub workflow_name: String,
    pub duration_secs: f64,
    pub concurrency: u32,
    pub iterations_per_client: u32,
    pub runs_expected: u64,
    pub runs_completed: u64,
    pub cancelled: bool,

    pub total_steps: u64,
    pub successful_steps: u64,
    pub failed_steps: u64,
    pub steps_per_second: f64,

    // Latency percentiles (ms)
    pub latency_p50: f64,
    pub latency_p75: f64,
    pub latency_p90: f64,
    pub latency_p95: f64,
    pub latency_p99: f64,
    pub latency_min: f64,
    pub latency_max: f64,
    pub latency_avg: f64,

    pub failures_by_kind: BTreeMap<String, u64>,
    pub steps: Vec<StepResults>,
}

impl TestResults {
    pub fn success_rate(&self) -> f64 {
        if self.total_steps == 0 {
            0.0
        } else {
            (self.successful_steps as f64 / self.total_steps as f64) * 100.0
        }
    }
}

/// Per-step breakdown, in workflow order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResults {
    pub name: String,
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub latency_p50: f64,
    pub latency_p95: f64,
    pub latency_p99: f64,
    pub latency_max: f64,
    pub latency_avg: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ContextError, StepError};
    use crate::step::StepOutcome;
    use std::time::Duration;

    fn record(step_index: usize, name: &str, status: Option<u16>, error: Option<StepError>) -> OutcomeRecord {
        OutcomeRecord {
            client: 0,
            run: 0,
            step_index,
            outcome: StepOutcome {
                step: name.to_string(),
                success: error.is_none(),
                status,
                latency: Duration::from_millis(10),
                error,
            },
        }
    }

    fn meta() -> RunMeta {
        RunMeta {
            scenario_name: "s".into(),
            workflow_name: "w".into(),
            duration_secs: 2.0,
            concurrency: 2,
            iterations_per_client: 3,
            runs_completed: 6,
            cancelled: false,
        }
    }

    #[test]
    fn test_counts_and_kinds() {
        let mut m = MetricsCollector::new();
        m.record(&record(0, "create-team", Some(201), None));
        m.record(&record(1, "get-team", Some(500), Some(StepError::Validation { status: 500 })));
        m.record(&record(
            2,
            "get-reviews",
            None,
            Some(StepError::Build(ContextError::MissingKey("k".into()))),
        ));

        let r = m.results(meta());
        assert_eq!(r.total_steps, 3);
        assert_eq!(r.successful_steps, 1);
        assert_eq!(r.failed_steps, 2);
        assert_eq!(r.failures_by_kind["validation"], 1);
        assert_eq!(r.failures_by_kind["build"], 1);
        assert_eq!(r.runs_expected, 6);
        assert!((r.steps_per_second - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_per_step_in_workflow_order() {
        let mut m = MetricsCollector::new();
        m.record(&record(1, "second", Some(200), None));
        m.record(&record(0, "first", Some(200), None));
        m.record(&record(1, "second", Some(200), None));

        let r = m.results(meta());
        let names: Vec<_> = r.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(r.steps[1].total, 2);
        assert!(r.steps[0].latency_p50 >= 9.9);
    }

    #[test]
    fn test_build_failures_do_not_skew_latency() {
        let mut m = MetricsCollector::new();
        m.record(&record(
            0,
            "s",
            None,
            Some(StepError::Build(ContextError::MissingKey("k".into()))),
        ));
        let r = m.results(meta());
        assert_eq!(r.latency_max, 0.0);
        assert_eq!(r.success_rate(), 0.0);
    }
}
