//! Conversation-to-prompt compiler for local chat models.
//!
//! This crate bundles the workspace crates behind feature flags: the data model
//! and template catalog are always available, while context-window fitting,
//! reasoning splitting, settings and telemetry can be switched off. With the
//! `pipeline` feature, [`ChatPipeline`] wires them together.

#![warn(missing_docs, clippy::pedantic)]

/// Re-export of the chat data model.
pub use chat_primitives as primitives;

/// Template catalog and prompt rendering.
pub use chat_templates as templates;

/// Context-window fitting (enabled by `window` feature).
#[cfg(feature = "window")]
pub use chat_window as window;

/// Reasoning/answer splitting (enabled by `reasoning` feature).
#[cfg(feature = "reasoning")]
pub use chat_reasoning as reasoning;

/// Settings (enabled by `config` feature).
#[cfg(feature = "config")]
pub use chat_config as config;

/// Subscriber setup (enabled by `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use chat_telemetry as telemetry;

#[cfg(feature = "pipeline")]
mod pipeline;

#[cfg(feature = "pipeline")]
pub use pipeline::ChatPipeline;
