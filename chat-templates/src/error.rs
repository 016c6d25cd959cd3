//! Errors raised while resolving or building templates.
//!
//! Rendering a built-in template never fails; these errors only surface at the
//! strict parsing and user-template construction boundaries.

use thiserror::Error;

/// Result alias for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Errors that can occur during template operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// The label does not name a built-in template.
    #[error("unknown template `{label}`")]
    UnknownTemplate {
        /// Label as supplied by the caller.
        label: String,
    },

    /// A custom turn pattern does not reference a required placeholder.
    #[error("`{field}` pattern is missing the `{{{{{name}}}}}` placeholder")]
    MissingPlaceholder {
        /// Which pattern of the template was rejected.
        field: &'static str,
        /// Name of the missing placeholder.
        name: &'static str,
    },

    /// A custom turn pattern references a placeholder the renderer does not know.
    #[error("`{field}` pattern uses unknown placeholder `{name}`")]
    UnknownPlaceholder {
        /// Which pattern of the template was rejected.
        field: &'static str,
        /// The unrecognised placeholder name.
        name: String,
    },

    /// A Jinja chat template failed to compile or render.
    #[error("invalid jinja template: {reason}")]
    InvalidJinja {
        /// Message reported by the template engine.
        reason: String,
    },
}
