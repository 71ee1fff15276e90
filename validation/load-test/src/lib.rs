//! Workflow-driven load testing for the PR reviewer assignment service.
//!
//! This crate provides tools to:
//! - Describe an end-to-end scenario as an ordered list of HTTP steps
//! - Correlate generated identifiers and extracted values across steps
//! - Run the scenario across a pool of concurrent virtual clients
//! - Collect per-step outcomes and latency metrics
//! - Output results in multiple formats (console, JSON, CSV)

pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod ids;
pub mod metrics;
pub mod report;
pub mod runner;
pub mod scenarios;
pub mod scheduler;
pub mod sink;
pub mod step;
pub mod transport;
pub mod workflow;

pub use client::{ClientReport, VirtualClient};
pub use config::{RunSchedule, TestConfig};
pub use context::Context;
pub use error::{ConfigError, ContextError, StepError, TransportError, WorkflowError};
pub use ids::{IdGenerator, Identifier};
pub use metrics::{MetricsCollector, TestResults};
pub use report::ResultsReport;
pub use runner::LoadRunner;
pub use scheduler::{RunSummary, Scheduler};
pub use sink::{ChannelSink, OutcomeRecord, ResultSink};
pub use step::{Expectation, RequestTemplate, Step, StepOutcome};
pub use transport::{HttpMethod, HttpRequest, HttpResponse, ReqwestTransport, Transport};
pub use workflow::{SeedSpec, Workflow, WorkflowSpec};
