//! Core shared types for chat prompt compilation.
//!
//! Every other crate in the workspace speaks in terms of [`Message`] and
//! [`Conversation`]; nothing here performs I/O or holds state between calls.

#![warn(missing_docs, clippy::pedantic)]

mod conversation;
mod role;

/// Ordered chat history and message records.
pub use conversation::{Conversation, Message};
/// Author role attached to every message.
pub use role::Role;
