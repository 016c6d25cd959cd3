//! User-authored templates loaded from settings.

use chat_primitives::Message;
use serde::{Deserialize, Serialize};

use crate::compiler::{ChatTemplate, render_grammar};
use crate::error::{TemplateError, TemplateResult};
use crate::grammar::{Grammar, REASONING_CLOSE, REASONING_OPEN, SystemPlacement};
use crate::id::TemplateId;
use crate::jinja::JinjaTemplate;
use crate::pattern::{KNOWN_PLACEHOLDERS, placeholders};

/// A validated, user-defined prompt grammar.
///
/// Patterns use the same `{{role}}`, `{{content}}`, `{{system}}` and `{{bos}}`
/// placeholders as the built-in catalog. Turn patterns must reference
/// `{{content}}`; unknown placeholders are rejected at construction.
///
/// # Examples
///
/// ```
/// use chat_primitives::Message;
/// use chat_templates::{ChatTemplate, CustomTemplate};
///
/// let template = CustomTemplate::builder("Q: {{content}}\n", "A: {{content}}\n", "A:")
///     .system("{{content}}\n---\n")
///     .build()
///     .unwrap();
///
/// let prompt = template.render(&[Message::user("2+2?")], "Be terse.", false);
/// assert_eq!(prompt, "Be terse.\n---\nQ: 2+2?\nA:");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCustomTemplate")]
pub struct CustomTemplate {
    system: Option<String>,
    user: String,
    assistant: String,
    generation_prefix: String,
    assistant_role: String,
    prologue: String,
    bos: String,
    stop_markers: Vec<String>,
}

#[derive(Deserialize)]
struct RawCustomTemplate {
    #[serde(default)]
    system: Option<String>,
    user: String,
    assistant: String,
    generation_prefix: String,
    #[serde(default = "default_assistant_role")]
    assistant_role: String,
    #[serde(default)]
    prologue: String,
    #[serde(default)]
    bos: String,
    #[serde(default)]
    stop_markers: Vec<String>,
}

fn default_assistant_role() -> String {
    "assistant".to_owned()
}

impl TryFrom<RawCustomTemplate> for CustomTemplate {
    type Error = TemplateError;

    fn try_from(raw: RawCustomTemplate) -> TemplateResult<Self> {
        let template = Self {
            system: raw.system,
            user: raw.user,
            assistant: raw.assistant,
            generation_prefix: raw.generation_prefix,
            assistant_role: raw.assistant_role,
            prologue: raw.prologue,
            bos: raw.bos,
            stop_markers: raw.stop_markers,
        };
        template.validate()?;
        Ok(template)
    }
}

impl CustomTemplate {
    /// Starts building a template from its turn patterns and generation prefix.
    #[must_use]
    pub fn builder(
        user: impl Into<String>,
        assistant: impl Into<String>,
        generation_prefix: impl Into<String>,
    ) -> CustomTemplateBuilder {
        CustomTemplateBuilder {
            template: Self {
                system: None,
                user: user.into(),
                assistant: assistant.into(),
                generation_prefix: generation_prefix.into(),
                assistant_role: default_assistant_role(),
                prologue: String::new(),
                bos: String::new(),
                stop_markers: Vec::new(),
            },
        }
    }

    /// End-of-turn strings declared for this template.
    #[must_use]
    pub fn stop_markers(&self) -> &[String] {
        &self.stop_markers
    }

    /// Checks placeholder usage of every pattern.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::MissingPlaceholder`] when a turn pattern lacks
    /// `{{content}}`, or [`TemplateError::UnknownPlaceholder`] when any pattern
    /// references a name the renderer does not substitute.
    pub fn validate(&self) -> TemplateResult<()> {
        let mut turns = vec![("user", self.user.as_str()), ("assistant", self.assistant.as_str())];
        if let Some(system) = &self.system {
            turns.push(("system", system.as_str()));
        }
        for &(field, pattern) in &turns {
            if !placeholders(pattern).contains(&"content") {
                return Err(TemplateError::MissingPlaceholder {
                    field,
                    name: "content",
                });
            }
        }

        turns.push(("generation_prefix", self.generation_prefix.as_str()));
        turns.push(("prologue", self.prologue.as_str()));
        for (field, pattern) in turns {
            if let Some(unknown) = placeholders(pattern)
                .into_iter()
                .find(|name| !KNOWN_PLACEHOLDERS.contains(name))
            {
                return Err(TemplateError::UnknownPlaceholder {
                    field,
                    name: unknown.to_owned(),
                });
            }
        }

        Ok(())
    }

    fn grammar(&self) -> Grammar<'_> {
        let system = self.system.as_deref().unwrap_or(self.user.as_str());
        Grammar {
            prologue: &self.prologue,
            bos: &self.bos,
            system: SystemPlacement::Standalone(system),
            system_turn: self.system.as_deref(),
            user_turn: &self.user,
            assistant_turn: &self.assistant,
            assistant_role: &self.assistant_role,
            reasoning_open: REASONING_OPEN,
            reasoning_close: REASONING_CLOSE,
            strip_orphan_reasoning: false,
            reopen_turn: "",
            generation_prefix: &self.generation_prefix,
            stop_markers: &[],
        }
    }
}

impl ChatTemplate for CustomTemplate {
    fn render(
        &self,
        conversation: &[Message],
        system_prompt: &str,
        include_reasoning_tags: bool,
    ) -> String {
        render_grammar(
            &self.grammar(),
            conversation,
            system_prompt,
            include_reasoning_tags,
        )
    }

    fn generation_prefix(&self) -> &str {
        &self.generation_prefix
    }
}

/// Either a built-in template or a user-defined one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TemplateSource {
    /// A catalog template.
    Builtin(TemplateId),
    /// A pattern template authored in settings.
    Custom(CustomTemplate),
    /// A Jinja chat template authored in settings.
    Jinja(JinjaTemplate),
}

impl TemplateSource {
    /// End-of-turn strings a completion may end with.
    #[must_use]
    pub fn stop_markers(&self) -> Vec<&str> {
        match self {
            Self::Builtin(id) => id.stop_markers().to_vec(),
            Self::Custom(template) => template.stop_markers.iter().map(String::as_str).collect(),
            Self::Jinja(template) => template.stop_markers().iter().map(String::as_str).collect(),
        }
    }
}

impl Default for TemplateSource {
    fn default() -> Self {
        Self::Builtin(TemplateId::default())
    }
}

impl From<TemplateId> for TemplateSource {
    fn from(id: TemplateId) -> Self {
        Self::Builtin(id)
    }
}

impl From<CustomTemplate> for TemplateSource {
    fn from(template: CustomTemplate) -> Self {
        Self::Custom(template)
    }
}

impl From<JinjaTemplate> for TemplateSource {
    fn from(template: JinjaTemplate) -> Self {
        Self::Jinja(template)
    }
}

impl ChatTemplate for TemplateSource {
    fn render(
        &self,
        conversation: &[Message],
        system_prompt: &str,
        include_reasoning_tags: bool,
    ) -> String {
        match self {
            Self::Builtin(id) => id.render(conversation, system_prompt, include_reasoning_tags),
            Self::Custom(template) => {
                template.render(conversation, system_prompt, include_reasoning_tags)
            }
            Self::Jinja(template) => {
                template.render(conversation, system_prompt, include_reasoning_tags)
            }
        }
    }

    fn generation_prefix(&self) -> &str {
        match self {
            Self::Builtin(id) => ChatTemplate::generation_prefix(id),
            Self::Custom(template) => template.generation_prefix(),
            Self::Jinja(template) => template.generation_prefix(),
        }
    }
}

/// Builder for [`CustomTemplate`].
#[derive(Debug)]
pub struct CustomTemplateBuilder {
    template: CustomTemplate,
}

impl CustomTemplateBuilder {
    /// Pattern for the system prompt and inline system messages. Without one,
    /// the system prompt is rendered through the user pattern.
    #[must_use]
    pub fn system(mut self, pattern: impl Into<String>) -> Self {
        self.template.system = Some(pattern.into());
        self
    }

    /// Value of `{{role}}` in assistant turns.
    #[must_use]
    pub fn assistant_role(mut self, role: impl Into<String>) -> Self {
        self.template.assistant_role = role.into();
        self
    }

    /// Pattern emitted once at the very start of the prompt.
    #[must_use]
    pub fn prologue(mut self, pattern: impl Into<String>) -> Self {
        self.template.prologue = pattern.into();
        self
    }

    /// Value substituted for `{{bos}}`.
    #[must_use]
    pub fn bos(mut self, token: impl Into<String>) -> Self {
        self.template.bos = token.into();
        self
    }

    /// Declares an end-of-turn string.
    #[must_use]
    pub fn stop_marker(mut self, marker: impl Into<String>) -> Self {
        self.template.stop_markers.push(marker.into());
        self
    }

    /// Validates and builds the template.
    ///
    /// # Errors
    ///
    /// See [`CustomTemplate::validate`].
    pub fn build(self) -> TemplateResult<CustomTemplate> {
        self.template.validate()?;
        Ok(self.template)
    }
}
