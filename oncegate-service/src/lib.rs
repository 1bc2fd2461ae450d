//! ONCEGATE Service - Adapters and Runtime for the Uniqueness Cache
//!
//! Wraps [`oncegate_cache::UniquenessCache`] for the collaborators that use
//! it and carries the ambient runtime around it:
//!
//! - `replay`: nonce validation ([`ReplayGuard`])
//! - `submission`: first-writer-wins claims on transaction/job ids ([`SubmissionGate`])
//! - `registry`: one cache per protected domain ([`CacheRegistry`])
//! - `jobs`: the background sweeper
//! - `settings`: environment, TOML and preset configuration
//! - `metrics`: Prometheus series on an owned registry
//! - `telemetry`: tracing subscriber setup
//!
//! Every adapter takes its cache (or registry) as an `Arc` at construction.

pub mod constants;
pub mod error;
pub mod jobs;
pub mod metrics;
pub mod registry;
pub mod replay;
pub mod settings;
pub mod submission;
pub mod telemetry;

pub use error::{ServiceError, ServiceResult};
pub use jobs::{sweep_task, SweepMetrics, SweepSnapshot};
pub use metrics::GuardMetrics;
pub use registry::{CacheRegistry, SweepReport};
pub use replay::{ReplayGuard, ReplayRejection};
pub use settings::GuardSettings;
pub use submission::{Claim, SubmissionGate};
pub use telemetry::{init_tracing, TelemetryConfig};
