//! Scheduler: runs a pool of virtual clients to completion.

use crate::client::{ClientReport, VirtualClient};
use crate::config::RunSchedule;
use crate::error::ConfigError;
use crate::ids::{IdGenerator, DEFAULT_ID_RANGE};
use crate::sink::ResultSink;
use crate::transport::Transport;
use crate::workflow::Workflow;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Totals across all clients.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub runs_completed: u64,
    pub steps_executed: u64,
    pub steps_failed: u64,
    pub cancelled: bool,
    /// One entry per client that finished, ordered by client index.
    pub clients: Vec<ClientReport>,
}

/// Owns the virtual client pool.
pub struct Scheduler {
    transport: Arc<dyn Transport>,
    id_range: u64,
    seed: Option<u64>,
    shutdown: CancellationToken,
}

impl Scheduler {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            id_range: DEFAULT_ID_RANGE,
            seed: None,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_id_range(mut self, id_range: u64) -> Self {
        self.id_range = id_range;
        self
    }

    /// Base seed; client `i` uses `seed + i`.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Cancelling this token stops the clients at their next run boundary
    /// or inter-step pause.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Start `concurrency` clients and wait for all of them.
    ///
    /// Fails only when the schedule is invalid, before any client starts.
    pub async fn run(
        &self,
        workflow: &Workflow,
        schedule: RunSchedule,
        sink: Arc<dyn ResultSink>,
    ) -> Result<RunSummary, ConfigError> {
        schedule.validate()?;
        if self.id_range == 0 {
            return Err(ConfigError::EmptyIdRange);
        }

        info!(
            workflow = workflow.name(),
            steps = workflow.len(),
            concurrency = schedule.concurrency,
            iterations = schedule.iterations_per_client,
            delay_ms = schedule.inter_step_delay.as_millis() as u64,
            "Starting virtual clients"
        );

        let workflow = Arc::new(workflow.clone());
        let mut clients = JoinSet::new();
        for index in 0..schedule.concurrency as usize {
            let client = VirtualClient::new(
                index,
                Arc::clone(&workflow),
                Arc::clone(&self.transport),
                Arc::clone(&sink),
                IdGenerator::for_client(self.seed, index, self.id_range),
                schedule,
                self.shutdown.clone(),
            );
            clients.spawn(client.run());
        }

        let mut summary = RunSummary::default();
        while let Some(joined) = clients.join_next().await {
            match joined {
                Ok(report) => {
                    summary.runs_completed += report.runs_completed;
                    summary.steps_executed += report.steps_executed;
                    summary.steps_failed += report.steps_failed;
                    summary.clients.push(report);
                }
                Err(e) => error!(error = %e, "Virtual client task failed"),
            }
        }
        summary.clients.sort_by_key(|r| r.client);
        summary.cancelled = self.shutdown.is_cancelled();

        info!(
            runs = summary.runs_completed,
            steps = summary.steps_executed,
            failed = summary.steps_failed,
            cancelled = summary.cancelled,
            "All virtual clients finished"
        );
        Ok(summary)
    }
}
