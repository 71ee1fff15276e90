//! Error types for the workflow engine.
//!
//! Only [`ConfigError`] and [`WorkflowError`] ever abort a test. Everything a
//! step can hit ([`StepError`]) is recorded as a failed outcome instead.

use serde::Serialize;
use thiserror::Error;

/// Correlation context access errors.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum ContextError {
    #[error("Context key already set: {0}")]
    DuplicateKey(String),

    #[error("Context key not set: {0}")]
    MissingKey(String),

    #[error("Malformed template: {0}")]
    MalformedTemplate(String),
}

/// Failures reported by the transport collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Request failed: {0}")]
    Request(String),
}

/// Why a single step was recorded as failed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum StepError {
    #[error("Build failed: {0}")]
    Build(ContextError),

    #[error("{0}")]
    Transport(TransportError),

    #[error("Unexpected response status {status}")]
    Validation { status: u16 },

    #[error("Extraction failed: {0}")]
    Extract(String),
}

impl StepError {
    /// Short label used for the per-kind failure breakdown.
    pub fn kind(&self) -> &'static str {
        match self {
            StepError::Build(_) => "build",
            StepError::Transport(_) => "transport",
            StepError::Validation { .. } => "validation",
            StepError::Extract(_) => "extract",
        }
    }
}

impl From<ContextError> for StepError {
    fn from(err: ContextError) -> Self {
        StepError::Build(err)
    }
}

impl From<TransportError> for StepError {
    fn from(err: TransportError) -> Self {
        StepError::Transport(err)
    }
}

/// Workflow definition errors, detected when the workflow is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("Workflow has no steps")]
    Empty,

    #[error("Duplicate step name: {0}")]
    DuplicateStepName(String),

    #[error("Seed key defined more than once: {0}")]
    DuplicateSeed(String),

    #[error("Step '{step}' references key '{key}' that no seed or earlier step provides")]
    UnresolvedKey { step: String, key: String },

    #[error("Step '{step}' extracts key '{key}' which is already defined")]
    KeyRedefined { step: String, key: String },

    #[error("Step '{step}' has a malformed template: {message}")]
    MalformedTemplate { step: String, message: String },
}

/// Run configuration errors. Raised before any virtual client starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("concurrency must be > 0")]
    ZeroConcurrency,

    #[error("iterations_per_client must be > 0")]
    ZeroIterations,

    #[error("id_range must be > 0")]
    EmptyIdRange,

    #[error("base_url must start with http:// or https://, got '{0}'")]
    InvalidBaseUrl(String),

    #[error("Invalid workflow: {0}")]
    Workflow(#[from] WorkflowError),
}
