//! Load test orchestration: transport, scheduler, aggregation and progress.

use crate::config::TestConfig;
use crate::metrics::{RunMeta, TestResults};
use crate::scheduler::Scheduler;
use crate::sink::{outcome_log_path, spawn_aggregator, ChannelSink, ResultSink};
use crate::transport::{ReqwestTransport, Transport};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Executes a configured load test end to end.
pub struct LoadRunner {
    config: TestConfig,
    transport: Option<Arc<dyn Transport>>,
    shutdown: CancellationToken,
    show_progress: bool,
}

impl LoadRunner {
    /// Create a new load runner.
    pub fn new(config: TestConfig) -> Self {
        Self {
            config,
            transport: None,
            shutdown: CancellationToken::new(),
            show_progress: true,
        }
    }

    /// Use a custom transport instead of HTTP against `base_url`.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Token that cancels the run, e.g. from a Ctrl+C listener.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run the load test.
    pub async fn run(&self) -> anyhow::Result<TestResults> {
        // Everything that can be rejected is rejected before a client starts
        self.config.validate()?;
        let workflow = self.config.workflow()?;
        let schedule = self.config.schedule();

        let transport: Arc<dyn Transport> = match &self.transport {
            Some(t) => Arc::clone(t),
            None => Arc::new(ReqwestTransport::new(
                self.config.base_url.clone(),
                self.config.request_timeout(),
                self.config.concurrency as usize,
            )?),
        };

        info!(
            scenario = %self.config.name,
            workflow = workflow.name(),
            base_url = %self.config.base_url,
            "Starting load test"
        );

        let progress = if self.show_progress {
            let pb = ProgressBar::new(schedule.total_runs() * workflow.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} steps {msg}")?
                    .progress_chars("##-"),
            );
            Some(pb)
        } else {
            None
        };

        let log = if self.config.log_outcomes {
            Some(self.open_outcome_log()?)
        } else {
            None
        };

        let (sink, rx) = ChannelSink::channel();
        let aggregator = spawn_aggregator(rx, log, progress.clone());

        let start = Instant::now();
        let summary = {
            let sink: Arc<dyn ResultSink> = Arc::new(sink);
            Scheduler::new(transport)
                .with_id_range(self.config.id_range)
                .with_seed(self.config.seed)
                .with_shutdown(self.shutdown.clone())
                .run(&workflow, schedule, sink)
                .await?
            // Last sender dropped here, so the aggregator can finish
        };
        let duration = start.elapsed();
        let metrics = aggregator.await?;

        if let Some(pb) = progress {
            pb.finish_with_message(if summary.cancelled { "Cancelled" } else { "Complete!" });
        }

        Ok(metrics.results(RunMeta {
            scenario_name: self.config.name.clone(),
            workflow_name: workflow.name().to_string(),
            duration_secs: duration.as_secs_f64(),
            concurrency: schedule.concurrency,
            iterations_per_client: schedule.iterations_per_client,
            runs_completed: summary.runs_completed,
            cancelled: summary.cancelled,
        }))
    }

    fn open_outcome_log(&self) -> anyhow::Result<File> {
        // Prefer validation/load-test/results when run from the workspace root
        let results_dir = if Path::new("validation/load-test").exists() {
            "validation/load-test/results"
        } else {
            "results"
        };
        std::fs::create_dir_all(results_dir)?;
        let path = outcome_log_path(results_dir, &self.config.name);
        info!(path = %path.display(), "Logging step outcomes");
        Ok(File::create(path)?)
    }
}
