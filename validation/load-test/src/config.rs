//! Configuration loading and management.

use crate::error::{ConfigError, WorkflowError};
use crate::ids::DEFAULT_ID_RANGE;
use crate::scenarios;
use crate::workflow::{Workflow, WorkflowSpec};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// How many virtual clients run, how often, and how fast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSchedule {
    pub concurrency: u32,
    pub iterations_per_client: u32,
    /// Pause between consecutive steps of one run.
    pub inter_step_delay: Duration,
}

impl RunSchedule {
    pub fn new(concurrency: u32, iterations_per_client: u32, inter_step_delay: Duration) -> Self {
        Self {
            concurrency,
            iterations_per_client,
            inter_step_delay,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.iterations_per_client == 0 {
            return Err(ConfigError::ZeroIterations);
        }
        Ok(())
    }

    pub fn total_runs(&self) -> u64 {
        self.concurrency as u64 * self.iterations_per_client as u64
    }
}

/// Main test configuration loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub base_url: String,
    pub concurrency: u32,
    pub iterations_per_client: u32,
    #[serde(default = "default_inter_step_delay_ms")]
    pub inter_step_delay_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_id_range")]
    pub id_range: u64,
    #[serde(default)]
    pub seed: Option<u64>, // Optional RNG seed for reproducible identifier streams
    #[serde(default)]
    pub log_outcomes: bool, // Write every step outcome to a JSONL file
    /// Falls back to the built-in PR review workflow when absent.
    #[serde(default)]
    pub workflow: Option<WorkflowSpec>,
}

fn default_inter_step_delay_ms() -> u64 {
    100
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_id_range() -> u64 {
    DEFAULT_ID_RANGE
}

impl TestConfig {
    /// Configuration for the built-in workflow against `base_url`, with the
    /// original script's defaults of 5 clients x 50 iterations.
    pub fn quick(base_url: impl Into<String>) -> Self {
        Self {
            name: "quick".to_string(),
            description: "Built-in PR review workflow".to_string(),
            base_url: base_url.into(),
            concurrency: 5,
            iterations_per_client: 50,
            inter_step_delay_ms: default_inter_step_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            id_range: DEFAULT_ID_RANGE,
            seed: None,
            log_outcomes: false,
            workflow: None,
        }
    }

    /// Load configuration from YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TestConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn schedule(&self) -> RunSchedule {
        RunSchedule::new(
            self.concurrency,
            self.iterations_per_client,
            Duration::from_millis(self.inter_step_delay_ms),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Build the workflow, running its static checks.
    pub fn workflow(&self) -> Result<Workflow, WorkflowError> {
        match &self.workflow {
            Some(spec) => Workflow::try_from(spec.clone()),
            None => scenarios::review_workflow(),
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.schedule().validate()?;
        if self.id_range == 0 {
            return Err(ConfigError::EmptyIdRange);
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(self.base_url.clone()));
        }
        self.workflow()?;
        Ok(())
    }
}
