//! Observability setup for chat pipelines.
//!
//! Libraries in this workspace only emit `tracing` events; binaries call
//! [`init`] once to install a formatted subscriber.

#![warn(missing_docs, clippy::pedantic)]

mod error;
pub mod tracing_support;

pub use error::{TelemetryError, TelemetryResult};
pub use tracing_support::{TelemetryConfig, init};
