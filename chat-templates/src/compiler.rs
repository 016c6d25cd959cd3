//! Conversation-to-prompt compilation.

use std::borrow::Cow;

use chat_primitives::{Message, Role};
use tracing::trace;

use crate::grammar::{Grammar, SystemPlacement};
use crate::id::TemplateId;
use crate::pattern::{Vars, expand, expand_to_string};

/// A prompt grammar the compiler can render.
///
/// Implemented by the built-in [`TemplateId`] catalog, by validated
/// [`CustomTemplate`](crate::CustomTemplate)s and by
/// [`JinjaTemplate`](crate::JinjaTemplate)s. Implementations must be pure:
/// identical arguments always yield identical prompts.
pub trait ChatTemplate: Send + Sync {
    /// Renders `conversation` into a single prompt ending with
    /// [`generation_prefix`](Self::generation_prefix).
    fn render(
        &self,
        conversation: &[Message],
        system_prompt: &str,
        include_reasoning_tags: bool,
    ) -> String;

    /// The open turn marker every rendered prompt ends with.
    fn generation_prefix(&self) -> &str;
}

impl ChatTemplate for TemplateId {
    fn render(
        &self,
        conversation: &[Message],
        system_prompt: &str,
        include_reasoning_tags: bool,
    ) -> String {
        let prompt = render_grammar(
            self.grammar(),
            conversation,
            system_prompt,
            include_reasoning_tags,
        );
        trace!(
            template = %self,
            messages = conversation.len(),
            bytes = prompt.len(),
            "rendered prompt"
        );
        prompt
    }

    fn generation_prefix(&self) -> &str {
        self.grammar().generation_prefix
    }
}

/// Renders a conversation with a built-in template.
///
/// # Examples
///
/// ```
/// use chat_primitives::Message;
/// use chat_templates::{TemplateId, render};
///
/// let prompt = render(TemplateId::ChatMl, &[Message::user("Hi")], "", true);
/// assert_eq!(prompt, "<|im_start|>user\nHi<|im_end|>\n<|im_start|>assistant\n");
/// ```
#[must_use]
pub fn render(
    template: TemplateId,
    conversation: &[Message],
    system_prompt: &str,
    include_reasoning_tags: bool,
) -> String {
    template.render(conversation, system_prompt, include_reasoning_tags)
}

/// Renders with a template named by a settings label, falling back to the
/// default template for unknown labels.
#[must_use]
pub fn render_named(
    label: &str,
    conversation: &[Message],
    system_prompt: &str,
    include_reasoning_tags: bool,
) -> String {
    render(
        TemplateId::parse_or_default(label),
        conversation,
        system_prompt,
        include_reasoning_tags,
    )
}

/// Everything rendering depends on, bundled.
#[derive(Clone, Copy, Debug)]
pub struct PromptRenderRequest<'a> {
    /// Grammar to render with.
    pub template: TemplateId,
    /// Messages in chronological order.
    pub conversation: &'a [Message],
    /// Optional system prompt; blank prompts are omitted.
    pub system_prompt: &'a str,
    /// Wrap assistant turns in reasoning tags.
    pub include_reasoning_tags: bool,
}

impl<'a> PromptRenderRequest<'a> {
    /// Creates a request with no system prompt and reasoning tags enabled.
    #[must_use]
    pub const fn new(template: TemplateId, conversation: &'a [Message]) -> Self {
        Self {
            template,
            conversation,
            system_prompt: "",
            include_reasoning_tags: true,
        }
    }

    /// Sets the system prompt.
    #[must_use]
    pub const fn with_system_prompt(mut self, system_prompt: &'a str) -> Self {
        self.system_prompt = system_prompt;
        self
    }

    /// Enables or disables reasoning tags around assistant turns.
    #[must_use]
    pub const fn with_reasoning_tags(mut self, include: bool) -> Self {
        self.include_reasoning_tags = include;
        self
    }

    /// Renders the request.
    #[must_use]
    pub fn render(&self) -> String {
        render(
            self.template,
            self.conversation,
            self.system_prompt,
            self.include_reasoning_tags,
        )
    }
}

pub(crate) fn render_grammar(
    grammar: &Grammar<'_>,
    conversation: &[Message],
    system_prompt: &str,
    include_reasoning_tags: bool,
) -> String {
    let content_len: usize = conversation.iter().map(|m| m.content.len() + 32).sum();
    let mut out = String::with_capacity(content_len + system_prompt.len() + 64);
    let base = Vars {
        bos: grammar.bos,
        ..Vars::default()
    };

    expand(grammar.prologue, &base, &mut out);

    let mut pending_merge = None;
    let mut user_turn_open = false;
    if !system_prompt.trim().is_empty() {
        match grammar.system {
            SystemPlacement::Standalone(pattern) => {
                let vars = Vars {
                    role: Role::System.label(),
                    content: system_prompt,
                    ..base
                };
                expand(pattern, &vars, &mut out);
            }
            SystemPlacement::MergeIntoFirstUser(pattern) => {
                let first_is_user =
                    matches!(conversation.first(), Some(message) if message.role == Role::User);
                if first_is_user {
                    pending_merge = Some((pattern, system_prompt));
                } else {
                    let merged = expand_to_string(
                        pattern,
                        &Vars {
                            system: system_prompt,
                            ..base
                        },
                    );
                    push_user_turn(grammar, &merged, &base, &mut out);
                    user_turn_open = true;
                }
            }
        }
    }

    for message in conversation {
        match message.role {
            Role::System => {
                let vars = Vars {
                    role: Role::System.label(),
                    content: &message.content,
                    ..base
                };
                user_turn_open = grammar.system_turn.is_none();
                match grammar.system_turn {
                    Some(pattern) => expand(pattern, &vars, &mut out),
                    None => push_user_turn(grammar, &message.content, &base, &mut out),
                }
            }
            Role::User | Role::CodeBlock => {
                user_turn_open = true;
                if let Some((pattern, system)) = pending_merge.take() {
                    let merged = expand_to_string(
                        pattern,
                        &Vars {
                            system,
                            content: &message.content,
                            ..base
                        },
                    );
                    push_user_turn(grammar, &merged, &base, &mut out);
                } else {
                    push_user_turn(grammar, &message.content, &base, &mut out);
                }
            }
            Role::Assistant => {
                let content = assistant_content(grammar, &message.content, include_reasoning_tags);
                let vars = Vars {
                    role: grammar.assistant_role,
                    content: &content,
                    ..base
                };
                expand(grammar.assistant_turn, &vars, &mut out);
                user_turn_open = false;
            }
        }
    }

    if !user_turn_open {
        expand(grammar.reopen_turn, &base, &mut out);
    }
    expand(grammar.generation_prefix, &base, &mut out);
    out
}

fn push_user_turn(grammar: &Grammar<'_>, content: &str, base: &Vars<'_>, out: &mut String) {
    let vars = Vars {
        role: Role::User.label(),
        content,
        ..*base
    };
    expand(grammar.user_turn, &vars, out);
}

fn assistant_content<'c>(
    grammar: &Grammar<'_>,
    content: &'c str,
    include_reasoning_tags: bool,
) -> Cow<'c, str> {
    let mut content = Cow::Borrowed(content);

    if grammar.strip_orphan_reasoning {
        if let Some(answer) = strip_orphan_reasoning(&content) {
            content = Cow::Owned(answer.to_owned());
        }
    }

    if include_reasoning_tags {
        let mut wrapped = String::with_capacity(
            grammar.reasoning_open.len() + content.len() + grammar.reasoning_close.len(),
        );
        wrapped.push_str(grammar.reasoning_open);
        wrapped.push_str(&content);
        wrapped.push_str(grammar.reasoning_close);
        content = Cow::Owned(wrapped);
    }

    content
}

/// Returns the text after the last `</think>` when no `<think>` opens it.
fn strip_orphan_reasoning(content: &str) -> Option<&str> {
    if content.contains(crate::REASONING_OPEN) {
        return None;
    }
    let close = content.rfind(crate::REASONING_CLOSE)?;
    Some(content[close + crate::REASONING_CLOSE.len()..].trim_start_matches('\n'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Message> {
        vec![
            Message::user("question-one"),
            Message::assistant("answer-one"),
            Message::user("question-two"),
        ]
    }

    #[test]
    fn chatml_wraps_user_turn_and_opens_assistant() {
        let prompt = render(TemplateId::ChatMl, &[Message::user("Hi")], "", true);
        assert_eq!(
            prompt,
            "<|im_start|>user\nHi<|im_end|>\n<|im_start|>assistant\n"
        );
    }

    #[test]
    fn chatml_full_transcript() {
        let prompt = render(TemplateId::ChatMl, &sample(), "Be brief.", true);
        assert_eq!(
            prompt,
            "<|im_start|>system\nBe brief.<|im_end|>\n\
             <|im_start|>user\nquestion-one<|im_end|>\n\
             <|im_start|>assistant\n<think>answer-one</think><|im_end|>\n\
             <|im_start|>user\nquestion-two<|im_end|>\n\
             <|im_start|>assistant\n"
        );
    }

    #[test]
    fn reasoning_tags_are_optional() {
        let prompt = render(TemplateId::ChatMl, &sample(), "", false);
        assert!(prompt.contains("<|im_start|>assistant\nanswer-one<|im_end|>"));
        assert!(!prompt.contains("<think>"));
    }

    #[test]
    fn rendering_is_deterministic() {
        for id in TemplateId::ALL {
            let first = render(id, &sample(), "sys", true);
            let second = render(id, &sample(), "sys", true);
            assert_eq!(first, second, "{id} is not deterministic");
        }
    }

    #[test]
    fn system_prompt_is_the_first_block_for_every_template() {
        for id in TemplateId::ALL {
            let prompt = render(id, &sample(), "SYSTEM-MARKER", true);
            let system_at = prompt.find("SYSTEM-MARKER").expect("system prompt rendered");
            let first_message_at = prompt.find("question-one").expect("message rendered");
            assert!(system_at < first_message_at, "{id}: {prompt:?}");

            let head = prompt.strip_prefix(id.grammar().bos).unwrap_or(&prompt);
            let head = &head[..head.find("SYSTEM-MARKER").unwrap()];
            assert!(
                !head.contains("question") && !head.contains("answer"),
                "{id}: conversation content precedes the system prompt"
            );
        }
    }

    #[test]
    fn every_prompt_ends_with_generation_prefix() {
        let conversations = [
            Vec::new(),
            vec![Message::user("Hi")],
            sample(),
            vec![Message::user("q"), Message::assistant("a")],
            vec![Message::system("inline"), Message::assistant("a")],
        ];
        for id in TemplateId::ALL {
            for conversation in &conversations {
                for system in ["", "sys"] {
                    let prompt = render(id, conversation, system, true);
                    assert!(
                        prompt.ends_with(id.generation_prefix()),
                        "{id}: {prompt:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn message_order_is_preserved() {
        for id in TemplateId::ALL {
            let prompt = render(id, &sample(), "", false);
            let a = prompt.find("question-one").unwrap();
            let b = prompt.find("answer-one").unwrap();
            let c = prompt.find("question-two").unwrap();
            assert!(a < b && b < c, "{id}: {prompt:?}");
        }
    }

    #[test]
    fn blank_system_prompt_is_omitted() {
        let prompt = render(TemplateId::ChatMl, &[Message::user("Hi")], "  \n", true);
        assert!(!prompt.contains("system"));
    }

    #[test]
    fn gemma_renames_the_assistant_role() {
        let prompt = render(TemplateId::Gemma, &[Message::assistant("Hello")], "", true);
        assert_eq!(
            prompt,
            "<start_of_turn>model\n<think>Hello</think><end_of_turn>\n<start_of_turn>model\n"
        );
        assert!(!prompt.contains("assistant"));
    }

    #[test]
    fn gemma_merges_system_prompt_into_first_user_turn() {
        let prompt = render(TemplateId::Gemma, &[Message::user("Hi")], "Be kind.", false);
        assert_eq!(
            prompt,
            "<start_of_turn>user\nBe kind.\n\nHi<end_of_turn>\n<start_of_turn>model\n"
        );
    }

    #[test]
    fn llama2_merges_system_prompt_into_first_instruction() {
        let prompt = render(TemplateId::Llama2, &sample(), "Be kind.", false);
        assert_eq!(
            prompt,
            "[INST] <<SYS>>\nBe kind.\n<</SYS>>\n\nquestion-one [/INST] answer-one </s>\
             [INST] question-two [/INST]"
        );
    }

    #[test]
    fn merge_templates_emit_a_standalone_block_without_leading_user_turn() {
        let prompt = render(TemplateId::Llama2, &[Message::assistant("a")], "Be kind.", false);
        assert!(prompt.starts_with("[INST] <<SYS>>\nBe kind.\n<</SYS>>\n\n "));
        assert!(prompt.ends_with("[/INST] a </s>[INST] [/INST]"));
    }

    #[test]
    fn instruction_families_reopen_after_assistant_turn() {
        let history = [Message::user("q"), Message::assistant("a")];
        assert_eq!(
            render(TemplateId::Llama2, &history, "", false),
            "[INST] q [/INST] a </s>[INST] [/INST]"
        );
        assert_eq!(
            render(TemplateId::RawInstruct, &history, "", false),
            "<s>[INST]q[/INST]a</s>[INST][/INST]"
        );
        assert_eq!(render(TemplateId::Llama2, &[], "", false), "[INST] [/INST]");
        assert_eq!(
            render(TemplateId::ChatMl, &history, "", false),
            "<|im_start|>user\nq<|im_end|>\n<|im_start|>assistant\na<|im_end|>\n\
             <|im_start|>assistant\n"
        );
    }

    #[test]
    fn raw_instruct_substitutes_begin_of_sequence() {
        let prompt = render(TemplateId::RawInstruct, &[Message::user("Hi")], "sys", false);
        assert_eq!(prompt, "<s>[SYSTEM_PROMPT]sys[/SYSTEM_PROMPT][INST]Hi[/INST]");
    }

    #[test]
    fn raw_instruct_does_not_expand_placeholders_in_content() {
        let prompt = render(TemplateId::RawInstruct, &[Message::user("{{bos}}")], "", false);
        assert_eq!(prompt, "<s>[INST]{{bos}}[/INST]");
    }

    #[test]
    fn header_families_differ_in_end_of_turn() {
        let conversation = [Message::user("Hi")];
        let llama3 = render(TemplateId::Llama3, &conversation, "", false);
        let llama4 = render(TemplateId::Llama4, &conversation, "", false);
        assert_eq!(
            llama3,
            "<|start_header_id|>user<|end_header_id|>\n\nHi<|eot_id|>\
             <|start_header_id|>assistant<|end_header_id|>\n\n"
        );
        assert_eq!(
            llama4,
            "<|header_start|>user<|header_end|>\n\nHi<|eot|>\
             <|header_start|>assistant<|header_end|>\n\n"
        );
    }

    #[test]
    fn alpaca_vicuna_and_zephyr_grammars() {
        let conversation = [Message::user("q"), Message::assistant("a")];
        assert_eq!(
            render(TemplateId::Alpaca, &conversation, "sys", false),
            "### Instruction:\nsys\n\n### Input:\nq\n\n### Response:\na\n\n### Response:\n"
        );
        assert_eq!(
            render(TemplateId::Vicuna, &conversation, "sys", false),
            "sys\n\nUSER: q\nASSISTANT: a\nASSISTANT: "
        );
        assert_eq!(
            render(TemplateId::Zephyr, &conversation, "sys", false),
            "<|system|>\nsys\n<|end|>\n<|user|>\nq\n<|end|>\n\
             <|assistant|>\na\n<|end|>\n<|assistant|>\n"
        );
    }

    #[test]
    fn qwen3_discards_leaked_reasoning_before_stray_close_tag() {
        let conversation = [Message::assistant("old musings</think>\n\nThe answer.")];
        let prompt = render(TemplateId::Qwen3, &conversation, "", true);
        assert_eq!(
            prompt,
            "<|im_start|>assistant\n<think>\nThe answer.\n</think>\n\n<|im_end|>\n\
             <|im_start|>assistant\n"
        );
    }

    #[test]
    fn qwen3_keeps_balanced_reasoning_tags() {
        let conversation = [Message::assistant("<think>why</think>because")];
        let prompt = render(TemplateId::Qwen3, &conversation, "", false);
        assert!(prompt.contains("<think>why</think>because"));
    }

    #[test]
    fn chatml_keeps_stray_close_tag() {
        let conversation = [Message::assistant("musings</think>answer")];
        let prompt = render(TemplateId::ChatMl, &conversation, "", false);
        assert!(prompt.contains("musings</think>answer"));
    }

    #[test]
    fn code_blocks_render_as_user_turns() {
        let conversation = [Message::new(Role::CodeBlock, "fn main() {}")];
        let prompt = render(TemplateId::ChatMl, &conversation, "", true);
        assert!(prompt.starts_with("<|im_start|>user\nfn main() {}<|im_end|>\n"));
    }

    #[test]
    fn inline_system_messages_use_the_system_turn() {
        let conversation = [Message::system("rules"), Message::user("q")];
        let chatml = render(TemplateId::ChatMl, &conversation, "", false);
        assert!(chatml.starts_with("<|im_start|>system\nrules<|im_end|>\n"));

        let gemma = render(TemplateId::Gemma, &conversation, "", false);
        assert!(gemma.starts_with("<start_of_turn>user\nrules<end_of_turn>\n"));
    }

    #[test]
    fn render_named_falls_back_to_chatml() {
        let conversation = [Message::user("Hi")];
        assert_eq!(
            render_named("does-not-exist", &conversation, "", true),
            render(TemplateId::ChatMl, &conversation, "", true)
        );
        assert_eq!(
            render_named("gemma", &conversation, "", true),
            render(TemplateId::Gemma, &conversation, "", true)
        );
    }

    #[test]
    fn request_renders_like_the_free_function() {
        let conversation = sample();
        let request = PromptRenderRequest::new(TemplateId::Zephyr, &conversation)
            .with_system_prompt("sys")
            .with_reasoning_tags(false);
        assert_eq!(
            request.render(),
            render(TemplateId::Zephyr, &conversation, "sys", false)
        );
    }
}
