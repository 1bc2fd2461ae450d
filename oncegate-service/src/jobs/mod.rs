//! Background Jobs
//!
//! - `sweeper`: periodically purges expired tokens from every registered domain
//!
//! # Usage
//!
//! ```ignore
//! use oncegate_service::jobs::sweep_task;
//! use tokio::sync::watch;
//!
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! tokio::spawn(sweep_task(Arc::clone(&registry), settings, None, shutdown_rx));
//!
//! // On shutdown
//! let _ = shutdown_tx.send(true);
//! ```

pub mod sweeper;

pub use sweeper::{sweep_task, SweepMetrics, SweepSnapshot};
