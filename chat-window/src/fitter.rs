//! Greedy oldest-first trimming of conversation history.

use chat_primitives::{Message, Role};
use chat_templates::{ChatTemplate, TemplateId};
use tracing::{debug, warn};

use crate::counter::{AsyncTokenCounter, TokenCounter};

/// Fits conversations into a token budget for one template and system prompt.
///
/// Each round renders the working conversation, measures it with the caller's
/// counter and, while the prompt is over budget, evicts the earliest
/// non-system message. System messages are never evicted. A conversation of
/// one message is never trimmed further.
///
/// # Examples
///
/// ```
/// use chat_primitives::Message;
/// use chat_templates::TemplateId;
/// use chat_window::{HeuristicCounter, WindowFitter};
///
/// let fitter = WindowFitter::new(TemplateId::ChatMl, 4096).with_system_prompt("Be brief.");
/// let outcome = fitter
///     .fit(&[Message::user("hello")], &HeuristicCounter::default())
///     .unwrap();
///
/// assert_eq!(outcome.dropped, 0);
/// assert!(outcome.prompt.ends_with("<|im_start|>assistant\n"));
/// ```
#[derive(Clone, Debug)]
pub struct WindowFitter<T = TemplateId> {
    template: T,
    system_prompt: String,
    include_reasoning_tags: bool,
    budget: usize,
}

impl WindowFitter<TemplateId> {
    /// Creates a fitter for a built-in template.
    #[must_use]
    pub fn new(template: TemplateId, budget: usize) -> Self {
        Self::with_template(template, budget)
    }
}

impl<T: ChatTemplate> WindowFitter<T> {
    /// Creates a fitter for any template implementation.
    #[must_use]
    pub fn with_template(template: T, budget: usize) -> Self {
        Self {
            template,
            system_prompt: String::new(),
            include_reasoning_tags: true,
            budget,
        }
    }

    /// Sets the system prompt included in every rendering.
    #[must_use]
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    /// Controls whether assistant turns are wrapped in reasoning tags.
    #[must_use]
    pub fn with_reasoning_tags(mut self, include: bool) -> Self {
        self.include_reasoning_tags = include;
        self
    }

    /// The token budget prompts must fit into.
    #[must_use]
    pub fn budget(&self) -> usize {
        self.budget
    }

    /// The template used for rendering.
    #[must_use]
    pub fn template(&self) -> &T {
        &self.template
    }

    /// Trims `conversation` until its rendering fits the budget.
    ///
    /// # Errors
    ///
    /// Returns the counter's error unchanged; no partial result is produced.
    pub fn fit<C>(&self, conversation: &[Message], counter: &C) -> Result<FitOutcome, C::Error>
    where
        C: TokenCounter + ?Sized,
    {
        let mut trim = Trim::start(self, conversation);
        loop {
            let token_count = counter.count_tokens(&trim.prompt)?;
            if !trim.evict(token_count) {
                return Ok(trim.finish(token_count));
            }
        }
    }

    /// Same as [`WindowFitter::fit`] with an asynchronous counter.
    ///
    /// # Errors
    ///
    /// Returns the counter's error unchanged; no partial result is produced.
    pub async fn fit_async<C>(
        &self,
        conversation: &[Message],
        counter: &C,
    ) -> Result<FitOutcome, C::Error>
    where
        C: AsyncTokenCounter + ?Sized,
    {
        let mut trim = Trim::start(self, conversation);
        loop {
            let token_count = counter.count_tokens(&trim.prompt).await?;
            if !trim.evict(token_count) {
                return Ok(trim.finish(token_count));
            }
        }
    }

    fn render(&self, conversation: &[Message]) -> String {
        self.template
            .render(conversation, &self.system_prompt, self.include_reasoning_tags)
    }
}

/// Trims `conversation` for a built-in template in one call.
///
/// # Errors
///
/// Returns the counter's error unchanged.
pub fn fit<C>(
    conversation: &[Message],
    system_prompt: &str,
    template: TemplateId,
    token_budget: usize,
    counter: &C,
) -> Result<FitOutcome, C::Error>
where
    C: TokenCounter + ?Sized,
{
    WindowFitter::new(template, token_budget)
        .with_system_prompt(system_prompt)
        .fit(conversation, counter)
}

/// Result of fitting a conversation into a budget.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FitOutcome {
    /// Surviving messages, in their original order.
    pub conversation: Vec<Message>,
    /// Rendering of `conversation`; ends with the template's generation prefix.
    pub prompt: String,
    /// Token count of `prompt` as reported by the counter.
    pub token_count: usize,
    /// Budget the fit was attempted against.
    pub budget: usize,
    /// Number of messages evicted.
    pub dropped: usize,
    /// Number of times the counter was consulted.
    pub renders: usize,
}

impl FitOutcome {
    /// Whether the prompt still exceeds the budget because nothing more could
    /// be evicted.
    #[must_use]
    pub fn is_over_budget(&self) -> bool {
        self.token_count > self.budget
    }

    /// Splits into `(conversation, prompt, token_count)`.
    #[must_use]
    pub fn into_parts(self) -> (Vec<Message>, String, usize) {
        (self.conversation, self.prompt, self.token_count)
    }
}

struct Trim<'f, T> {
    fitter: &'f WindowFitter<T>,
    working: Vec<Message>,
    prompt: String,
    dropped: usize,
    renders: usize,
}

impl<'f, T: ChatTemplate> Trim<'f, T> {
    fn start(fitter: &'f WindowFitter<T>, conversation: &[Message]) -> Self {
        Self {
            fitter,
            prompt: fitter.render(conversation),
            working: conversation.to_vec(),
            dropped: 0,
            renders: 1,
        }
    }

    /// Evicts one message and re-renders; `false` once the loop must stop.
    fn evict(&mut self, token_count: usize) -> bool {
        if token_count <= self.fitter.budget || self.working.len() <= 1 {
            return false;
        }
        let Some(index) = self
            .working
            .iter()
            .position(|message| message.role != Role::System)
        else {
            return false;
        };

        let evicted = self.working.remove(index);
        self.dropped += 1;
        debug!(
            index,
            role = %evicted.role,
            token_count,
            budget = self.fitter.budget,
            "evicted oldest message"
        );

        self.prompt = self.fitter.render(&self.working);
        self.renders += 1;
        true
    }

    fn finish(self, token_count: usize) -> FitOutcome {
        let outcome = FitOutcome {
            conversation: self.working,
            prompt: self.prompt,
            token_count,
            budget: self.fitter.budget,
            dropped: self.dropped,
            renders: self.renders,
        };
        if outcome.is_over_budget() {
            warn!(
                token_count,
                budget = outcome.budget,
                messages = outcome.conversation.len(),
                "conversation still exceeds token budget"
            );
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::convert::Infallible;

    use super::*;
    use crate::HeuristicCounter;

    fn byte_len(text: &str) -> Result<usize, Infallible> {
        Ok(text.len())
    }

    fn history() -> Vec<Message> {
        vec![
            Message::system("You are a calculator."),
            Message::user("first question about arithmetic"),
            Message::assistant("first answer with some detail"),
            Message::user("second question"),
            Message::assistant("second answer"),
        ]
    }

    #[test]
    fn fitting_conversation_is_untouched() {
        let conversation = history();
        let outcome = WindowFitter::new(TemplateId::ChatMl, 100_000)
            .fit(&conversation, &byte_len)
            .unwrap();

        assert_eq!(outcome.conversation, conversation);
        assert_eq!(outcome.dropped, 0);
        assert_eq!(outcome.renders, 1);
        assert!(!outcome.is_over_budget());
    }

    #[test]
    fn evicts_oldest_turns_until_prompt_fits() {
        let conversation = history();
        let expected = vec![
            conversation[0].clone(),
            conversation[3].clone(),
            conversation[4].clone(),
        ];
        let fitter = WindowFitter::new(TemplateId::ChatMl, 0).with_reasoning_tags(false);
        let budget = fitter.render(&expected).len();
        let fitter = WindowFitter::new(TemplateId::ChatMl, budget).with_reasoning_tags(false);

        let outcome = fitter.fit(&conversation, &byte_len).unwrap();

        assert_eq!(outcome.conversation, expected);
        assert_eq!(outcome.dropped, 2);
        assert_eq!(outcome.token_count, budget);
        assert_eq!(outcome.prompt, fitter.render(&expected));
    }

    #[test]
    fn system_messages_are_never_evicted() {
        let conversation = vec![
            Message::user("old"),
            Message::system("inline rules"),
            Message::user("new"),
        ];
        let outcome = WindowFitter::new(TemplateId::ChatMl, 0)
            .fit(&conversation, &byte_len)
            .unwrap();

        assert_eq!(outcome.conversation, vec![Message::system("inline rules")]);
        assert_eq!(outcome.dropped, 2);
        assert!(outcome.is_over_budget());
    }

    #[test]
    fn stops_when_only_system_messages_remain() {
        let conversation = vec![Message::system("a"), Message::system("b")];
        let outcome = WindowFitter::new(TemplateId::ChatMl, 0)
            .fit(&conversation, &byte_len)
            .unwrap();

        assert_eq!(outcome.conversation, conversation);
        assert_eq!(outcome.dropped, 0);
    }

    #[test]
    fn single_message_is_never_trimmed() {
        let conversation = vec![Message::user("a very long question ".repeat(50))];
        let outcome = WindowFitter::new(TemplateId::ChatMl, 1)
            .fit(&conversation, &byte_len)
            .unwrap();

        assert_eq!(outcome.conversation, conversation);
        assert!(outcome.is_over_budget());
    }

    #[test]
    fn empty_conversation_renders_prefix_only() {
        let outcome = fit(&[], "", TemplateId::ChatMl, 0, &byte_len).unwrap();
        assert_eq!(outcome.prompt, "<|im_start|>assistant\n");
        assert!(outcome.conversation.is_empty());
    }

    #[test]
    fn system_prompt_survives_trimming() {
        let outcome = fit(&history(), "Stay calm.", TemplateId::Zephyr, 0, &byte_len).unwrap();
        assert!(outcome.prompt.starts_with("<|system|>\nStay calm.\n<|end|>\n"));
        assert!(outcome.prompt.ends_with(TemplateId::Zephyr.generation_prefix()));
    }

    #[test]
    fn counter_consultations_are_bounded() {
        let calls = Cell::new(0_usize);
        let counter = |text: &str| {
            calls.set(calls.get() + 1);
            Ok::<_, Infallible>(text.len())
        };
        let conversation = history();
        let outcome = WindowFitter::new(TemplateId::Llama2, 0)
            .fit(&conversation, &counter)
            .unwrap();

        assert_eq!(calls.get(), outcome.renders);
        assert!(outcome.renders <= conversation.len() + 1);
        assert!(outcome.dropped < conversation.len());
    }

    #[test]
    fn counter_errors_propagate_unchanged() {
        let calls = Cell::new(0_usize);
        let counter = |text: &str| {
            calls.set(calls.get() + 1);
            if calls.get() == 2 {
                Err("tokenizer unavailable")
            } else {
                Ok(text.len())
            }
        };
        let err = WindowFitter::new(TemplateId::ChatMl, 0)
            .fit(&history(), &counter)
            .expect_err("second call fails");

        assert_eq!(err, "tokenizer unavailable");
    }

    #[test]
    fn more_budget_never_keeps_fewer_messages() {
        let conversation = history();
        let mut previous = 0;
        for budget in (0..2_000).step_by(50) {
            let kept = fit(&conversation, "sys", TemplateId::ChatMl, budget, &byte_len)
                .unwrap()
                .conversation
                .len();
            assert!(kept >= previous, "budget {budget} kept {kept} < {previous}");
            previous = kept;
        }
    }

    #[tokio::test]
    async fn async_counter_matches_sync_counter() {
        let conversation = history();
        let fitter = WindowFitter::new(TemplateId::Gemma, 30).with_system_prompt("Be brief.");
        let counter = HeuristicCounter::default();

        let sync = fitter.fit(&conversation, &counter).unwrap();
        let not_sync = fitter.fit_async(&conversation, &counter).await.unwrap();

        assert_eq!(sync, not_sync);
    }
}
