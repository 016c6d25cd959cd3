//! Static grammar definitions for every built-in template.
//!
//! Each grammar is a table of turn patterns; `{{role}}`, `{{content}}`,
//! `{{system}}` and `{{bos}}` are substituted at render time.

/// Opening reasoning tag wrapped around assistant turns.
pub const REASONING_OPEN: &str = "<think>";
/// Closing reasoning tag wrapped around assistant turns.
pub const REASONING_CLOSE: &str = "</think>";

/// Where the caller-supplied system prompt goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SystemPlacement<'a> {
    /// Rendered as its own block; the pattern receives the prompt as `{{content}}`.
    Standalone(&'a str),
    /// Merged into the first user turn. The pattern combines `{{system}}` with
    /// the turn's `{{content}}` and the result becomes that turn's content.
    MergeIntoFirstUser(&'a str),
}

/// Structured description of how a conversation is laid out.
#[derive(Clone, Debug)]
pub(crate) struct Grammar<'a> {
    /// Emitted once before anything else.
    pub prologue: &'a str,
    /// Value substituted for `{{bos}}`.
    pub bos: &'a str,
    pub system: SystemPlacement<'a>,
    /// Pattern for system-role messages inside the conversation. `None` renders
    /// them as user turns.
    pub system_turn: Option<&'a str>,
    pub user_turn: &'a str,
    pub assistant_turn: &'a str,
    /// Value of `{{role}}` for assistant turns.
    pub assistant_role: &'a str,
    pub reasoning_open: &'a str,
    pub reasoning_close: &'a str,
    /// Keep only the text after a `</think>` that has no matching `<think>`.
    pub strip_orphan_reasoning: bool,
    /// Opens a user turn before the generation prefix when the prompt would
    /// otherwise end on an assistant or system turn.
    pub reopen_turn: &'a str,
    pub generation_prefix: &'a str,
    pub stop_markers: &'a [&'a str],
}

const CHATML_TURN: &str = "<|im_start|>{{role}}\n{{content}}<|im_end|>\n";
const CHATML_SYSTEM: &str = "<|im_start|>system\n{{content}}<|im_end|>\n";

pub(crate) const CHATML: Grammar<'static> = Grammar {
    prologue: "",
    bos: "",
    system: SystemPlacement::Standalone(CHATML_SYSTEM),
    system_turn: Some(CHATML_SYSTEM),
    user_turn: CHATML_TURN,
    assistant_turn: CHATML_TURN,
    assistant_role: "assistant",
    reasoning_open: REASONING_OPEN,
    reasoning_close: REASONING_CLOSE,
    strip_orphan_reasoning: false,
    reopen_turn: "",
    generation_prefix: "<|im_start|>assistant\n",
    stop_markers: &["<|im_end|>", "<|im_start|>", "<|endoftext|>"],
};

pub(crate) const QWEN3: Grammar<'static> = Grammar {
    reasoning_open: "<think>\n",
    reasoning_close: "\n</think>\n\n",
    strip_orphan_reasoning: true,
    ..CHATML
};

const ALPACA_SYSTEM: &str = "### Instruction:\n{{content}}\n\n";

pub(crate) const ALPACA: Grammar<'static> = Grammar {
    prologue: "",
    bos: "",
    system: SystemPlacement::Standalone(ALPACA_SYSTEM),
    system_turn: Some(ALPACA_SYSTEM),
    user_turn: "### Input:\n{{content}}\n\n",
    assistant_turn: "### Response:\n{{content}}\n\n",
    assistant_role: "assistant",
    reasoning_open: REASONING_OPEN,
    reasoning_close: REASONING_CLOSE,
    strip_orphan_reasoning: false,
    reopen_turn: "",
    generation_prefix: "### Response:\n",
    stop_markers: &["### Input:", "### Instruction:"],
};

pub(crate) const VICUNA: Grammar<'static> = Grammar {
    prologue: "",
    bos: "",
    system: SystemPlacement::Standalone("{{content}}\n\n"),
    system_turn: Some("{{content}}\n\n"),
    user_turn: "USER: {{content}}\n",
    assistant_turn: "ASSISTANT: {{content}}\n",
    assistant_role: "assistant",
    reasoning_open: REASONING_OPEN,
    reasoning_close: REASONING_CLOSE,
    strip_orphan_reasoning: false,
    reopen_turn: "",
    generation_prefix: "ASSISTANT: ",
    stop_markers: &["</s>", "USER:"],
};

// The assistant turn opens with `[/INST]`, so the prompt always ends on the
// marker the model continues from.
pub(crate) const LLAMA2: Grammar<'static> = Grammar {
    prologue: "",
    bos: "",
    system: SystemPlacement::MergeIntoFirstUser("<<SYS>>\n{{system}}\n<</SYS>>\n\n{{content}}"),
    system_turn: None,
    user_turn: "[INST] {{content}} ",
    assistant_turn: "[/INST] {{content}} </s>",
    assistant_role: "assistant",
    reasoning_open: REASONING_OPEN,
    reasoning_close: REASONING_CLOSE,
    strip_orphan_reasoning: false,
    reopen_turn: "[INST] ",
    generation_prefix: "[/INST]",
    stop_markers: &["</s>"],
};

const ZEPHYR_SYSTEM: &str = "<|system|>\n{{content}}\n<|end|>\n";

pub(crate) const ZEPHYR: Grammar<'static> = Grammar {
    prologue: "",
    bos: "",
    system: SystemPlacement::Standalone(ZEPHYR_SYSTEM),
    system_turn: Some(ZEPHYR_SYSTEM),
    user_turn: "<|user|>\n{{content}}\n<|end|>\n",
    assistant_turn: "<|assistant|>\n{{content}}\n<|end|>\n",
    assistant_role: "assistant",
    reasoning_open: REASONING_OPEN,
    reasoning_close: REASONING_CLOSE,
    strip_orphan_reasoning: false,
    reopen_turn: "",
    generation_prefix: "<|assistant|>\n",
    stop_markers: &["<|end|>", "</s>"],
};

const LLAMA3_TURN: &str = "<|start_header_id|>{{role}}<|end_header_id|>\n\n{{content}}<|eot_id|>";
const LLAMA3_SYSTEM: &str = "<|start_header_id|>system<|end_header_id|>\n\n{{content}}<|eot_id|>";

pub(crate) const LLAMA3: Grammar<'static> = Grammar {
    prologue: "",
    bos: "",
    system: SystemPlacement::Standalone(LLAMA3_SYSTEM),
    system_turn: Some(LLAMA3_SYSTEM),
    user_turn: LLAMA3_TURN,
    assistant_turn: LLAMA3_TURN,
    assistant_role: "assistant",
    reasoning_open: REASONING_OPEN,
    reasoning_close: REASONING_CLOSE,
    strip_orphan_reasoning: false,
    reopen_turn: "",
    generation_prefix: "<|start_header_id|>assistant<|end_header_id|>\n\n",
    stop_markers: &["<|eot_id|>", "<|end_of_text|>"],
};

const LLAMA4_TURN: &str = "<|header_start|>{{role}}<|header_end|>\n\n{{content}}<|eot|>";
const LLAMA4_SYSTEM: &str = "<|header_start|>system<|header_end|>\n\n{{content}}<|eot|>";

pub(crate) const LLAMA4: Grammar<'static> = Grammar {
    system: SystemPlacement::Standalone(LLAMA4_SYSTEM),
    system_turn: Some(LLAMA4_SYSTEM),
    user_turn: LLAMA4_TURN,
    assistant_turn: LLAMA4_TURN,
    generation_prefix: "<|header_start|>assistant<|header_end|>\n\n",
    stop_markers: &["<|eot|>", "<|end_of_text|>"],
    ..LLAMA3
};

const GEMMA_TURN: &str = "<start_of_turn>{{role}}\n{{content}}<end_of_turn>\n";

pub(crate) const GEMMA: Grammar<'static> = Grammar {
    prologue: "",
    bos: "",
    system: SystemPlacement::MergeIntoFirstUser("{{system}}\n\n{{content}}"),
    system_turn: None,
    user_turn: GEMMA_TURN,
    assistant_turn: GEMMA_TURN,
    assistant_role: "model",
    reasoning_open: REASONING_OPEN,
    reasoning_close: REASONING_CLOSE,
    strip_orphan_reasoning: false,
    reopen_turn: "",
    generation_prefix: "<start_of_turn>model\n",
    stop_markers: &["<end_of_turn>", "<eos>"],
};

const RAW_SYSTEM: &str = "[SYSTEM_PROMPT]{{content}}[/SYSTEM_PROMPT]";

pub(crate) const RAW_INSTRUCT: Grammar<'static> = Grammar {
    prologue: "{{bos}}",
    bos: "<s>",
    system: SystemPlacement::Standalone(RAW_SYSTEM),
    system_turn: Some(RAW_SYSTEM),
    user_turn: "[INST]{{content}}",
    assistant_turn: "[/INST]{{content}}</s>",
    assistant_role: "assistant",
    reasoning_open: REASONING_OPEN,
    reasoning_close: REASONING_CLOSE,
    strip_orphan_reasoning: false,
    reopen_turn: "[INST]",
    generation_prefix: "[/INST]",
    stop_markers: &["</s>"],
};
