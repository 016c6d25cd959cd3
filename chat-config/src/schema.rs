//! Strongly typed chat settings.

use chat_reasoning::ReasoningSplitter;
use chat_templates::{CustomTemplate, JinjaTemplate, TemplateId, TemplateSource};
use serde::{Deserialize, Serialize};

/// Tokens held back from the context window for the model's reply.
pub const DEFAULT_GENERATION_RESERVE: usize = 256;

/// Context length assumed when the model does not report one.
pub const DEFAULT_CONTEXT_LENGTH: usize = 4096;

/// Settings driving prompt compilation, trimming and response splitting.
///
/// Every field has a default, so a partial (or empty) JSON object is valid.
///
/// ```
/// use chat_config::ChatSettings;
/// use chat_templates::TemplateId;
///
/// let settings = ChatSettings::from_json_str(r#"{"template": "gemma", "context_length": 2048}"#).unwrap();
/// assert_eq!(settings.template_id(), TemplateId::Gemma);
/// assert_eq!(settings.token_budget(), 2048 - 256);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    /// Template label; unknown labels fall back to ChatML.
    pub template: String,
    /// System prompt placed first in every compiled prompt. May be empty.
    pub system_prompt: String,
    /// Wrap assistant history in reasoning tags.
    pub include_reasoning_tags: bool,
    /// Whether the loaded model emits reasoning worth splitting out.
    pub reasoning_capable: bool,
    /// Model context window, in tokens.
    pub context_length: usize,
    /// Tokens reserved for generation.
    pub generation_reserve: usize,
    /// User-authored template; takes precedence over `template`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_template: Option<CustomTemplate>,
    /// Jinja chat template; takes precedence over both `custom_template` and
    /// `template`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jinja_template: Option<JinjaTemplate>,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            template: TemplateId::default().label().to_owned(),
            system_prompt: String::new(),
            include_reasoning_tags: true,
            reasoning_capable: false,
            context_length: DEFAULT_CONTEXT_LENGTH,
            generation_reserve: DEFAULT_GENERATION_RESERVE,
            custom_template: None,
            jinja_template: None,
        }
    }
}

impl ChatSettings {
    /// Built-in template named by `template`, or the default one.
    #[must_use]
    pub fn template_id(&self) -> TemplateId {
        TemplateId::parse_or_default(&self.template)
    }

    /// The template prompts are rendered with.
    #[must_use]
    pub fn template_source(&self) -> TemplateSource {
        match (&self.jinja_template, &self.custom_template) {
            (Some(jinja), _) => TemplateSource::Jinja(jinja.clone()),
            (None, Some(custom)) => TemplateSource::Custom(custom.clone()),
            (None, None) => TemplateSource::Builtin(self.template_id()),
        }
    }

    /// Tokens a compiled prompt may occupy.
    #[must_use]
    pub fn token_budget(&self) -> usize {
        self.context_length.saturating_sub(self.generation_reserve)
    }

    /// Splitter configured for the loaded model.
    #[must_use]
    pub fn splitter(&self) -> ReasoningSplitter {
        ReasoningSplitter::new(self.reasoning_capable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_application_settings() {
        let settings = ChatSettings::default();
        assert_eq!(settings.template, "CHATML");
        assert!(settings.include_reasoning_tags);
        assert!(!settings.reasoning_capable);
        assert_eq!(settings.token_budget(), 4096 - 256);
        assert_eq!(settings.template_source(), TemplateSource::Builtin(TemplateId::ChatMl));
    }

    #[test]
    fn unknown_template_label_falls_back() {
        let settings = ChatSettings {
            template: "mystery-model".to_owned(),
            ..ChatSettings::default()
        };
        assert_eq!(settings.template_id(), TemplateId::ChatMl);
    }

    #[test]
    fn custom_template_takes_precedence() {
        let custom = CustomTemplate::builder("U: {{content}}\n", "A: {{content}}\n", "A: ")
            .build()
            .unwrap();
        let settings = ChatSettings {
            template: "LLAMA3".to_owned(),
            custom_template: Some(custom.clone()),
            ..ChatSettings::default()
        };
        assert_eq!(settings.template_source(), TemplateSource::Custom(custom.clone()));

        let jinja = JinjaTemplate::new("{% for m in messages %}{{ m.content }}{% endfor %}", "")
            .unwrap();
        let settings = ChatSettings {
            jinja_template: Some(jinja.clone()),
            custom_template: Some(custom),
            ..settings
        };
        assert_eq!(settings.template_source(), TemplateSource::Jinja(jinja));
    }

    #[test]
    fn budget_never_underflows() {
        let settings = ChatSettings {
            context_length: 100,
            generation_reserve: 256,
            ..ChatSettings::default()
        };
        assert_eq!(settings.token_budget(), 0);
    }

    #[test]
    fn splitter_follows_capability_flag() {
        let settings = ChatSettings {
            reasoning_capable: true,
            ..ChatSettings::default()
        };
        assert!(settings.splitter().is_reasoning_capable());
    }
}
