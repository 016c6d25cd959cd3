//! Configuration for the chat prompt pipeline.
//!
//! [`ChatSettings`] mirrors what the application stores in its settings: the
//! template selector, the system prompt, reasoning flags and the model's
//! context length.

#![warn(missing_docs, clippy::pedantic)]

pub mod loader;
pub mod schema;

pub use schema::ChatSettings;
