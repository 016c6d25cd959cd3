//! Template identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{TemplateError, TemplateResult};
use crate::grammar::{self, Grammar};

/// The closed set of supported chat-prompt grammars.
///
/// Labels are matched case-insensitively and ignore `-`, `_`, `.` and spaces,
/// so `"llama-3"`, `"Llama3"` and `"LLAMA_3"` all name [`TemplateId::Llama3`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum TemplateId {
    /// Role-tagged `<|im_start|>` / `<|im_end|>` turns. The fallback template.
    #[default]
    ChatMl,
    /// ChatML with newline-padded reasoning tags and reasoning-leak stripping.
    Qwen3,
    /// `### Instruction` / `### Input` / `### Response` sections.
    Alpaca,
    /// `USER:` / `ASSISTANT:` role prefixes.
    Vicuna,
    /// `[INST]` brackets with the system prompt merged into the first one.
    Llama2,
    /// `<|system|>` / `<|user|>` / `<|assistant|>` pipe tags.
    Zephyr,
    /// Header blocks terminated by `<|eot_id|>`.
    Llama3,
    /// Header blocks terminated by `<|eot|>`.
    Llama4,
    /// `<start_of_turn>` turns; the assistant speaks as `model`.
    Gemma,
    /// Raw `[INST]` instructions behind a substituted begin-of-sequence token.
    RawInstruct,
}

impl TemplateId {
    /// Every built-in template, in catalog order.
    pub const ALL: [Self; 10] = [
        Self::ChatMl,
        Self::Qwen3,
        Self::Alpaca,
        Self::Vicuna,
        Self::Llama2,
        Self::Zephyr,
        Self::Llama3,
        Self::Llama4,
        Self::Gemma,
        Self::RawInstruct,
    ];

    /// Canonical label, as stored in settings.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ChatMl => "CHATML",
            Self::Qwen3 => "QWEN3",
            Self::Alpaca => "ALPACA",
            Self::Vicuna => "VICUNA",
            Self::Llama2 => "LLAMA2",
            Self::Zephyr => "ZEPHYR",
            Self::Llama3 => "LLAMA3",
            Self::Llama4 => "LLAMA4",
            Self::Gemma => "GEMMA",
            Self::RawInstruct => "RAW_INSTRUCT",
        }
    }

    /// Resolves a settings label, falling back to [`TemplateId::ChatMl`] when
    /// the label names no known template.
    ///
    /// # Examples
    ///
    /// ```
    /// use chat_templates::TemplateId;
    ///
    /// assert_eq!(TemplateId::parse_or_default("gemma-2"), TemplateId::Gemma);
    /// assert_eq!(TemplateId::parse_or_default("no-such-model"), TemplateId::ChatMl);
    /// ```
    #[must_use]
    pub fn parse_or_default(label: &str) -> Self {
        label.parse().unwrap_or_else(|_| {
            debug!(label, fallback = Self::default().label(), "unknown template label");
            Self::default()
        })
    }

    /// End-of-turn strings the model family may emit at the end of a completion.
    #[must_use]
    pub fn stop_markers(self) -> &'static [&'static str] {
        self.grammar().stop_markers
    }

    /// The open turn marker every compiled prompt ends with.
    #[must_use]
    pub fn generation_prefix(self) -> &'static str {
        self.grammar().generation_prefix
    }

    pub(crate) fn grammar(self) -> &'static Grammar<'static> {
        match self {
            Self::ChatMl => &grammar::CHATML,
            Self::Qwen3 => &grammar::QWEN3,
            Self::Alpaca => &grammar::ALPACA,
            Self::Vicuna => &grammar::VICUNA,
            Self::Llama2 => &grammar::LLAMA2,
            Self::Zephyr => &grammar::ZEPHYR,
            Self::Llama3 => &grammar::LLAMA3,
            Self::Llama4 => &grammar::LLAMA4,
            Self::Gemma => &grammar::GEMMA,
            Self::RawInstruct => &grammar::RAW_INSTRUCT,
        }
    }
}

fn normalise(label: &str) -> String {
    label
        .chars()
        .filter(|c| !matches!(c, '-' | '_' | '.' | ' '))
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

impl FromStr for TemplateId {
    type Err = TemplateError;

    fn from_str(s: &str) -> TemplateResult<Self> {
        let id = match normalise(s).as_str() {
            "CHATML" => Self::ChatMl,
            "QWEN" | "QWEN3" => Self::Qwen3,
            "ALPACA" => Self::Alpaca,
            "VICUNA" => Self::Vicuna,
            "LLAMA2" => Self::Llama2,
            "ZEPHYR" => Self::Zephyr,
            "LLAMA3" | "LLAMA31" | "LLAMA32" => Self::Llama3,
            "LLAMA4" => Self::Llama4,
            "GEMMA" | "GEMMA2" | "GEMMA3" => Self::Gemma,
            "RAW" | "RAWINSTRUCT" | "INSTRUCT" | "MISTRAL" => Self::RawInstruct,
            _ => {
                return Err(TemplateError::UnknownTemplate {
                    label: s.to_owned(),
                });
            }
        };
        Ok(id)
    }
}

impl TryFrom<String> for TemplateId {
    type Error = TemplateError;

    fn try_from(value: String) -> TemplateResult<Self> {
        value.parse()
    }
}

impl From<TemplateId> for &'static str {
    fn from(value: TemplateId) -> Self {
        value.label()
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_parse_back_to_their_template() {
        for id in TemplateId::ALL {
            assert_eq!(id.label().parse::<TemplateId>().unwrap(), id);
        }
    }

    #[test]
    fn parsing_ignores_case_and_separators() {
        assert_eq!("chatml".parse::<TemplateId>().unwrap(), TemplateId::ChatMl);
        assert_eq!("Llama-3.1".parse::<TemplateId>().unwrap(), TemplateId::Llama3);
        assert_eq!("raw instruct".parse::<TemplateId>().unwrap(), TemplateId::RawInstruct);
    }

    #[test]
    fn strict_parse_rejects_unknown_labels() {
        let err = "PHI3".parse::<TemplateId>().expect_err("unknown label");
        assert_eq!(
            err,
            TemplateError::UnknownTemplate {
                label: "PHI3".to_owned()
            }
        );
    }

    #[test]
    fn unknown_labels_fall_back_to_chatml() {
        assert_eq!(TemplateId::parse_or_default("PHI3"), TemplateId::ChatMl);
        assert_eq!(TemplateId::parse_or_default(""), TemplateId::ChatMl);
    }

    #[test]
    fn serde_uses_canonical_labels() {
        let json = serde_json::to_string(&TemplateId::RawInstruct).unwrap();
        assert_eq!(json, "\"RAW_INSTRUCT\"");

        let id: TemplateId = serde_json::from_str("\"gemma3\"").unwrap();
        assert_eq!(id, TemplateId::Gemma);
    }
}
