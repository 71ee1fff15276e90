//! Virtual client: one sequential execution lane.

use crate::config::RunSchedule;
use crate::ids::IdGenerator;
use crate::sink::{OutcomeRecord, ResultSink};
use crate::transport::Transport;
use crate::workflow::Workflow;
use std::sync::Arc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// What one client did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientReport {
    pub client: usize,
    /// Runs in which every step executed.
    pub runs_completed: u64,
    pub steps_executed: u64,
    pub steps_failed: u64,
}

/// Runs the workflow `iterations_per_client` times, one run after another.
///
/// Step failures never stop the client. Only cancellation does, checked
/// before each run and while pausing between steps.
pub struct VirtualClient {
    index: usize,
    workflow: Arc<Workflow>,
    transport: Arc<dyn Transport>,
    sink: Arc<dyn ResultSink>,
    ids: IdGenerator,
    schedule: RunSchedule,
    shutdown: CancellationToken,
}

impl VirtualClient {
    pub fn new(
        index: usize,
        workflow: Arc<Workflow>,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn ResultSink>,
        ids: IdGenerator,
        schedule: RunSchedule,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            index,
            workflow,
            transport,
            sink,
            ids,
            schedule,
            shutdown,
        }
    }

    pub async fn run(mut self) -> ClientReport {
        let mut report = ClientReport {
            client: self.index,
            ..Default::default()
        };

        for run in 0..self.schedule.iterations_per_client as usize {
            if self.shutdown.is_cancelled() {
                debug!(client = self.index, run, "Cancelled, not starting run");
                break;
            }
            if self.execute_run(run, &mut report).await {
                report.runs_completed += 1;
            }
        }

        debug!(
            client = self.index,
            runs = report.runs_completed,
            failed_steps = report.steps_failed,
            "Client finished"
        );
        report
    }

    /// Returns false if the run was cut short by cancellation.
    async fn execute_run(&mut self, run: usize, report: &mut ClientReport) -> bool {
        let workflow = Arc::clone(&self.workflow);
        let mut ctx = workflow.seed_context(&mut self.ids);

        for (step_index, step) in workflow.steps().iter().enumerate() {
            if step_index > 0 && !self.pause().await {
                return false;
            }

            let outcome = step.execute(&mut ctx, self.transport.as_ref()).await;
            report.steps_executed += 1;
            if !outcome.success {
                report.steps_failed += 1;
                warn!(
                    client = self.index,
                    run,
                    step = %outcome.step,
                    status = ?outcome.status,
                    error = ?outcome.error,
                    "Step failed"
                );
            }

            self.sink.record(OutcomeRecord {
                client: self.index,
                run,
                step_index,
                outcome,
            });
        }
        true
    }

    /// Inter-step pacing. Returns false if cancellation arrived first.
    async fn pause(&self) -> bool {
        let delay = self.schedule.inter_step_delay;
        if delay.is_zero() {
            return !self.shutdown.is_cancelled();
        }
        tokio::select! {
            _ = sleep(delay) => true,
            _ = self.shutdown.cancelled() => false,
        }
    }
}
