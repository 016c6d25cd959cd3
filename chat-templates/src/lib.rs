//! Chat prompt grammars and the conversation-to-prompt compiler.
//!
//! A [`TemplateId`] names one of a closed set of prompt grammars. Rendering is a
//! pure function of the conversation, the system prompt, the template and the
//! reasoning-tag flag; see [`render`] and [`PromptRenderRequest`].

#![warn(missing_docs, clippy::pedantic)]

mod compiler;
mod custom;
mod error;
mod grammar;
mod id;
mod jinja;
mod pattern;

pub use compiler::{ChatTemplate, PromptRenderRequest, render, render_named};
pub use custom::{CustomTemplate, CustomTemplateBuilder, TemplateSource};
pub use error::{TemplateError, TemplateResult};
pub use grammar::{REASONING_CLOSE, REASONING_OPEN};
pub use id::TemplateId;
pub use jinja::JinjaTemplate;
