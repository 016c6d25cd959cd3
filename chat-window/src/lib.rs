//! Context-window fitting for compiled chat prompts.
//!
//! [`WindowFitter`] renders a conversation, asks a [`TokenCounter`] how large the
//! prompt is and evicts the oldest non-system message until the prompt fits the
//! budget or nothing more can be dropped.

#![warn(missing_docs, clippy::pedantic)]

mod counter;
mod fitter;

pub use counter::{AsyncTokenCounter, HeuristicCounter, TokenCounter};
pub use fitter::{FitOutcome, WindowFitter, fit};
