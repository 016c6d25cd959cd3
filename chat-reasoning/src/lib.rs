//! Post-processing of raw model completions.
//!
//! [`ReasoningSplitter`] separates a model's internal deliberation from the
//! user-facing answer using an ordered list of heuristics; the [`clean`]
//! helpers prepare raw engine output for display.

#![warn(missing_docs, clippy::pedantic)]

pub mod clean;
mod splitter;

pub use clean::{strip_reasoning, trim_stop_marker};
pub use splitter::{ReasoningSplitter, SplitResult, SplitRule, split};
