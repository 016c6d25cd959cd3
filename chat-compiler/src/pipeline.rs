//! End-to-end flow from conversation to prompt and from completion to answer.

use chat_config::ChatSettings;
use chat_primitives::{Conversation, Message, Role};
use chat_reasoning::{ReasoningSplitter, SplitResult, SplitRule, trim_stop_marker};
use chat_templates::{ChatTemplate, TemplateSource};
use chat_window::{AsyncTokenCounter, FitOutcome, TokenCounter, WindowFitter};
use tracing::debug;

/// Compiles prompts for one model and post-processes its completions.
///
/// [`prepare`](Self::prepare) renders the conversation with the configured
/// template and trims history to the token budget; the resulting prompt goes
/// to the inference engine. [`finish`](Self::finish) cuts the engine's output
/// at the template's end-of-turn marker and splits reasoning from the answer.
///
/// # Examples
///
/// ```
/// use chat_compiler::ChatPipeline;
/// use chat_compiler::config::ChatSettings;
/// use chat_compiler::primitives::Message;
/// use chat_compiler::window::HeuristicCounter;
///
/// let settings = ChatSettings {
///     system_prompt: "You are a helpful assistant.".to_owned(),
///     reasoning_capable: true,
///     ..ChatSettings::default()
/// };
/// let pipeline = ChatPipeline::new(&settings);
///
/// let outcome = pipeline
///     .prepare(&[Message::user("What is 2+2?")], &HeuristicCounter::default())
///     .unwrap();
/// assert!(outcome.prompt.ends_with("<|im_start|>assistant\n"));
///
/// let reply = pipeline.finish("<think>2+2=4</think>4<|im_end|>");
/// assert_eq!(reply.reasoning, "2+2=4");
/// assert_eq!(reply.answer, "4");
/// ```
#[derive(Clone, Debug)]
pub struct ChatPipeline {
    fitter: WindowFitter<TemplateSource>,
    splitter: ReasoningSplitter,
    stop_markers: Vec<String>,
}

impl ChatPipeline {
    /// Builds a pipeline from stored settings.
    #[must_use]
    pub fn new(settings: &ChatSettings) -> Self {
        Self::with_template(settings.template_source(), settings.token_budget())
            .with_system_prompt(settings.system_prompt.clone())
            .with_reasoning_tags(settings.include_reasoning_tags)
            .with_splitter(settings.splitter())
    }

    /// Builds a pipeline for `template` with defaults for everything else.
    #[must_use]
    pub fn with_template(template: impl Into<TemplateSource>, budget: usize) -> Self {
        let template = template.into();
        let stop_markers = template
            .stop_markers()
            .into_iter()
            .map(str::to_owned)
            .collect();
        Self {
            fitter: WindowFitter::with_template(template, budget),
            splitter: ReasoningSplitter::default(),
            stop_markers,
        }
    }

    /// Sets the system prompt.
    #[must_use]
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.fitter = self.fitter.with_system_prompt(system_prompt);
        self
    }

    /// Controls reasoning tags around assistant history.
    #[must_use]
    pub fn with_reasoning_tags(mut self, include: bool) -> Self {
        self.fitter = self.fitter.with_reasoning_tags(include);
        self
    }

    /// Replaces the completion splitter.
    #[must_use]
    pub fn with_splitter(mut self, splitter: ReasoningSplitter) -> Self {
        self.splitter = splitter;
        self
    }

    /// The template prompts are rendered with.
    #[must_use]
    pub fn template(&self) -> &TemplateSource {
        self.fitter.template()
    }

    /// Token budget for compiled prompts.
    #[must_use]
    pub fn budget(&self) -> usize {
        self.fitter.budget()
    }

    /// Renders and trims `conversation` into a prompt that fits the budget.
    ///
    /// # Errors
    ///
    /// Propagates the counter's error unchanged.
    pub fn prepare<C>(&self, conversation: &[Message], counter: &C) -> Result<FitOutcome, C::Error>
    where
        C: TokenCounter + ?Sized,
    {
        let outcome = self.fitter.fit(conversation, counter)?;
        self.log_prepared(&outcome);
        Ok(outcome)
    }

    /// Same as [`prepare`](Self::prepare) with an asynchronous counter.
    ///
    /// # Errors
    ///
    /// Propagates the counter's error unchanged.
    pub async fn prepare_async<C>(
        &self,
        conversation: &[Message],
        counter: &C,
    ) -> Result<FitOutcome, C::Error>
    where
        C: AsyncTokenCounter + ?Sized,
    {
        let outcome = self.fitter.fit_async(conversation, counter).await?;
        self.log_prepared(&outcome);
        Ok(outcome)
    }

    /// Turns a raw completion into reasoning and answer.
    #[must_use]
    pub fn finish(&self, raw: &str) -> SplitResult {
        self.finish_detailed(raw).0
    }

    /// Like [`finish`](Self::finish), also reporting the splitting rule.
    #[must_use]
    pub fn finish_detailed(&self, raw: &str) -> (SplitResult, SplitRule) {
        let markers: Vec<&str> = self.stop_markers.iter().map(String::as_str).collect();
        self.splitter.split_detailed(trim_stop_marker(raw, &markers))
    }

    /// Appends a streamed completion chunk to `conversation` as assistant text.
    ///
    /// Consecutive chunks are merged into a single assistant message.
    pub fn push_chunk(conversation: &mut Conversation, chunk: &str) {
        conversation.append_chunk(Role::Assistant, chunk);
    }

    fn log_prepared(&self, outcome: &FitOutcome) {
        debug!(
            template = ?self.template(),
            generation_prefix = self.template().generation_prefix(),
            messages = outcome.conversation.len(),
            dropped = outcome.dropped,
            token_count = outcome.token_count,
            budget = outcome.budget,
            "prompt prepared"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use chat_templates::TemplateId;

    use super::*;

    fn bytes(text: &str) -> Result<usize, Infallible> {
        Ok(text.len())
    }

    #[test]
    fn settings_flow_into_the_pipeline() {
        let settings = ChatSettings {
            template: "zephyr".to_owned(),
            system_prompt: "Be kind.".to_owned(),
            ..ChatSettings::default()
        };
        let pipeline = ChatPipeline::new(&settings);

        assert_eq!(pipeline.template(), &TemplateSource::Builtin(TemplateId::Zephyr));
        assert_eq!(pipeline.budget(), settings.token_budget());

        let outcome = pipeline.prepare(&[Message::user("hi")], &bytes).unwrap();
        assert_eq!(
            outcome.prompt,
            "<|system|>\nBe kind.\n<|end|>\n<|user|>\nhi\n<|end|>\n<|assistant|>\n"
        );
    }

    #[test]
    fn finish_cuts_runaway_turns_before_splitting() {
        let pipeline = ChatPipeline::with_template(TemplateId::ChatMl, 1024)
            .with_splitter(ReasoningSplitter::new(true));
        let (result, rule) = pipeline
            .finish_detailed("<think>plan</think>Done.<|im_end|>\n<|im_start|>user\nmore");

        assert_eq!(rule, SplitRule::TagPair);
        assert_eq!(result, SplitResult::new("plan", "Done."));
    }

    #[test]
    fn non_capable_models_keep_raw_answer() {
        let pipeline = ChatPipeline::with_template(TemplateId::Llama3, 1024);
        let result = pipeline.finish("Therefore, yes.<|eot_id|>");
        assert_eq!(result, SplitResult::answer_only("Therefore, yes."));
    }

    #[test]
    fn streamed_chunks_merge_into_one_reply() {
        let mut conversation = Conversation::from(vec![Message::user("hi")]);
        ChatPipeline::push_chunk(&mut conversation, "Hel");
        ChatPipeline::push_chunk(&mut conversation, "lo");

        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation[1], Message::assistant("Hello"));
    }
}
