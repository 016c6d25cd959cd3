//! Jinja chat templates, as shipped in model tokenizer configs.

use chat_primitives::{Message, Role};
use minijinja::{Environment, context};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::compiler::ChatTemplate;
use crate::error::{TemplateError, TemplateResult};
use crate::id::TemplateId;

/// A chat template written in Jinja and rendered over `messages`.
///
/// The template sees these variables:
///
/// - `messages`: a list of `{role, content}` maps, with a non-blank system
///   prompt prepended as a `system` entry
/// - `add_generation_prompt`: always `true`
/// - `system_prompt`: the system prompt as given
/// - `bos_token`: the configured begin-of-sequence token
/// - `enable_thinking`: the reasoning-tag flag
///
/// `codeBlock` messages are exposed with the `user` role.
///
/// # Examples
///
/// ```
/// use chat_primitives::Message;
/// use chat_templates::{ChatTemplate, JinjaTemplate};
///
/// let template = JinjaTemplate::new(
///     "{% for m in messages %}{{ m.role }}: {{ m.content }}\n{% endfor %}\
///      {% if add_generation_prompt %}assistant:{% endif %}",
///     "assistant:",
/// )
/// .unwrap();
///
/// let prompt = template.render(&[Message::user("Hi")], "Be brief.", false);
/// assert_eq!(prompt, "system: Be brief.\nuser: Hi\nassistant:");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawJinjaTemplate")]
pub struct JinjaTemplate {
    source: String,
    generation_prefix: String,
    bos: String,
    stop_markers: Vec<String>,
}

#[derive(Deserialize)]
struct RawJinjaTemplate {
    source: String,
    #[serde(default)]
    generation_prefix: String,
    #[serde(default)]
    bos: String,
    #[serde(default)]
    stop_markers: Vec<String>,
}

impl TryFrom<RawJinjaTemplate> for JinjaTemplate {
    type Error = TemplateError;

    fn try_from(raw: RawJinjaTemplate) -> TemplateResult<Self> {
        Ok(Self::new(raw.source, raw.generation_prefix)?
            .with_bos(raw.bos)
            .with_stop_markers(raw.stop_markers))
    }
}

#[derive(Serialize)]
struct TemplateMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> From<&'a Message> for TemplateMessage<'a> {
    fn from(message: &'a Message) -> Self {
        let role = match message.role() {
            Role::CodeBlock => Role::User.label(),
            role => role.label(),
        };
        Self {
            role,
            content: message.content(),
        }
    }
}

impl JinjaTemplate {
    /// Compiles `source` and checks that it renders a sample conversation.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::InvalidJinja`] when the source does not parse
    /// or fails to render.
    pub fn new(
        source: impl Into<String>,
        generation_prefix: impl Into<String>,
    ) -> TemplateResult<Self> {
        let template = Self {
            source: source.into(),
            generation_prefix: generation_prefix.into(),
            bos: String::new(),
            stop_markers: Vec::new(),
        };
        let sample = [Message::user("sample"), Message::assistant("sample")];
        template.try_render(&sample, "sample", true)?;
        Ok(template)
    }

    /// Value exposed as `bos_token`.
    #[must_use]
    pub fn with_bos(mut self, token: impl Into<String>) -> Self {
        self.bos = token.into();
        self
    }

    /// Declares end-of-turn strings.
    #[must_use]
    pub fn with_stop_markers(mut self, markers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.stop_markers = markers.into_iter().map(Into::into).collect();
        self
    }

    /// The Jinja source.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// End-of-turn strings declared for this template.
    #[must_use]
    pub fn stop_markers(&self) -> &[String] {
        &self.stop_markers
    }

    /// Renders the template, reporting engine failures.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::InvalidJinja`] when the engine rejects the
    /// source or raises during evaluation.
    pub fn try_render(
        &self,
        conversation: &[Message],
        system_prompt: &str,
        include_reasoning_tags: bool,
    ) -> TemplateResult<String> {
        let system = (!system_prompt.trim().is_empty()).then(|| Message::system(system_prompt));
        let messages: Vec<TemplateMessage<'_>> = system
            .iter()
            .chain(conversation)
            .map(TemplateMessage::from)
            .collect();

        let env = Environment::new();
        env.render_str(
            &self.source,
            context! {
                messages => messages,
                add_generation_prompt => true,
                system_prompt => system_prompt,
                bos_token => &self.bos,
                enable_thinking => include_reasoning_tags,
            },
        )
        .map_err(|err| TemplateError::InvalidJinja {
            reason: err.to_string(),
        })
    }
}

impl ChatTemplate for JinjaTemplate {
    /// Falls back to the default catalog template if the engine fails at
    /// render time.
    fn render(
        &self,
        conversation: &[Message],
        system_prompt: &str,
        include_reasoning_tags: bool,
    ) -> String {
        self.try_render(conversation, system_prompt, include_reasoning_tags)
            .unwrap_or_else(|err| {
                let fallback = TemplateId::default();
                warn!(error = %err, fallback = %fallback, "jinja template failed to render");
                fallback.render(conversation, system_prompt, include_reasoning_tags)
            })
    }

    fn generation_prefix(&self) -> &str {
        &self.generation_prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHATML: &str = "{% for message in messages %}<|im_start|>{{ message.role }}\n\
        {{ message.content }}<|im_end|>\n{% endfor %}\
        {% if add_generation_prompt %}<|im_start|>assistant\n{% endif %}";

    #[test]
    fn chatml_source_matches_builtin_chatml() {
        let template = JinjaTemplate::new(CHATML, "<|im_start|>assistant\n").unwrap();
        let conversation = [
            Message::user("What is 2+2?"),
            Message::assistant("4"),
            Message::user("And 3+3?"),
        ];
        assert_eq!(
            template.render(&conversation, "Be terse.", false),
            TemplateId::ChatMl.render(&conversation, "Be terse.", false)
        );
    }

    #[test]
    fn exposes_bos_and_code_blocks_as_user() {
        let template = JinjaTemplate::new(
            "{{ bos_token }}{% for m in messages %}[{{ m.role }}]{{ m.content }}{% endfor %}",
            "",
        )
        .unwrap()
        .with_bos("<s>");

        let prompt = template.render(&[Message::new(Role::CodeBlock, "fn main() {}")], "  ", false);
        assert_eq!(prompt, "<s>[user]fn main() {}");
    }

    #[test]
    fn rejects_broken_syntax() {
        let err = JinjaTemplate::new("{% for m in messages %}{{ m.content }}", "")
            .expect_err("unclosed block");
        assert!(matches!(err, TemplateError::InvalidJinja { .. }));
    }

    #[test]
    fn deserialises_and_validates() {
        let template: JinjaTemplate = serde_json::from_str(
            r#"{"source": "{% for m in messages %}{{ m.content }}{% endfor %}", "stop_markers": ["</s>"]}"#,
        )
        .unwrap();
        assert_eq!(template.stop_markers(), ["</s>".to_owned()]);
        assert_eq!(template.generation_prefix(), "");

        assert!(serde_json::from_str::<JinjaTemplate>(r#"{"source": "{% if %}"}"#).is_err());
    }
}
