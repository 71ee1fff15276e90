//! Results reporting and formatting.

use crate::metrics::TestResults;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};

/// Formats test results for output.
pub struct ResultsReport;

impl ResultsReport {
    /// Format results as console tables: a summary, then one row per step.
    pub fn format_table(results: &TestResults) -> String {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![format!("Load Test Results: {}", results.scenario_name)]);

        table.add_row(vec!["Workflow:", results.workflow_name.as_str()]);
        table.add_row(vec!["Duration:", &format!("{:.1}s", results.duration_secs)]);
        table.add_row(vec![
            "Runs:",
            &format!(
                "{} / {}{}",
                results.runs_completed,
                results.runs_expected,
                if results.cancelled { " (cancelled)" } else { "" }
            ),
        ]);
        table.add_row(vec!["Total Steps:", &format!("{}", results.total_steps)]);
        table.add_row(vec!["Success Rate:", &format!("{:.1}%", results.success_rate())]);
        table.add_row(vec![
            "Steps/sec:",
            &format!("{:.1}", results.steps_per_second),
        ]);

        table.add_row(vec!["", ""]);
        table.add_row(vec!["Latency (ms)", "p50 / p90 / p95 / p99 / max"]);
        table.add_row(vec![
            "",
            &format!(
                "{:.1} / {:.1} / {:.1} / {:.1} / {:.1}",
                results.latency_p50,
                results.latency_p90,
                results.latency_p95,
                results.latency_p99,
                results.latency_max
            ),
        ]);

        if !results.failures_by_kind.is_empty() {
            table.add_row(vec!["", ""]);
            for (kind, count) in &results.failures_by_kind {
                table.add_row(vec![format!("Failures ({}):", kind), count.to_string()]);
            }
        }

        let mut steps = Table::new();
        steps
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec!["Step", "Total", "OK", "Failed", "p50 ms", "p95 ms", "max ms"]);
        for step in &results.steps {
            steps.add_row(vec![
                step.name.clone(),
                step.total.to_string(),
                step.successful.to_string(),
                step.failed.to_string(),
                format!("{:.1}", step.latency_p50),
                format!("{:.1}", step.latency_p95),
                format!("{:.1}", step.latency_max),
            ]);
        }

        format!("{}\n{}", table, steps)
    }

    /// Format results as JSON.
    pub fn format_json(results: &TestResults) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(results)?)
    }

    /// Format results as CSV row.
    pub fn format_csv(results: &TestResults) -> String {
        format!(
            "{},{},{},{:.1},{},{},{},{:.1},{:.1},{:.1},{:.1}",
            results.timestamp,
            results.scenario_name,
            results.workflow_name,
            results.duration_secs,
            results.runs_completed,
            results.total_steps,
            results.failed_steps,
            results.steps_per_second,
            results.latency_p50,
            results.latency_p90,
            results.latency_p99
        )
    }

    /// CSV header row.
    pub fn csv_header() -> &'static str {
        "timestamp,scenario,workflow,duration,runs,steps,failed,steps_per_sec,p50,p90,p99"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::StepResults;
    use std::collections::BTreeMap;

    fn results() -> TestResults {
        TestResults {
            timestamp: "2026-01-01T00:00:00Z".into(),
            scenario_name: "smoke".into(),
            workflow_name: "pr-review".into(),
            duration_secs: 4.0,
            concurrency: 1,
            iterations_per_client: 2,
            runs_expected: 2,
            runs_completed: 2,
            cancelled: false,
            total_steps: 12,
            successful_steps: 11,
            failed_steps: 1,
            steps_per_second: 3.0,
            latency_p50: 1.0,
            latency_p75: 1.5,
            latency_p90: 2.0,
            latency_p95: 2.5,
            latency_p99: 3.0,
            latency_min: 0.5,
            latency_max: 4.0,
            latency_avg: 1.2,
            failures_by_kind: BTreeMap::from([("validation".to_string(), 1)]),
            steps: vec![StepResults {
                name: "create-team".into(),
                total: 2,
                successful: 1,
                failed: 1,
                latency_p50: 1.0,
                latency_p95: 2.0,
                latency_p99: 2.0,
                latency_max: 2.0,
                latency_avg: 1.5,
            }],
        }
    }

    #[test]
    fn test_table_mentions_steps_and_failures() {
        let out = ResultsReport::format_table(&results());
        assert!(out.contains("smoke"));
        assert!(out.contains("create-team"));
        assert!(out.contains("Failures (validation):"));
        assert!(out.contains("91.7%"));
    }

    #[test]
    fn test_csv_matches_header_width() {
        let header_cols = ResultsReport::csv_header().split(',').count();
        let row_cols = ResultsReport::format_csv(&results()).split(',').count();
        assert_eq!(header_cols, row_cols);
    }

    #[test]
    fn test_json_round_trips() {
        let json = ResultsReport::format_json(&results()).unwrap();
        let parsed: TestResults = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.total_steps, 12);
        assert_eq!(parsed.steps.len(), 1);
    }
}
