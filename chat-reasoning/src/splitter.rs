//! Ordered heuristics separating reasoning from answers.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

static TAG_PAIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<think>(.*?)</think>").expect("valid tag-pair regex"));

const OPEN_TAG: &str = "<think>";
const CLOSE_TAG: &str = "</think>";

/// Phrases of deliberation that escaped without tags.
const LEAK_FRAGMENTS: &[&str] = &[
    "the user is asking",
    "the user wants",
    "okay, let's see",
    "wait, no",
    "hmm,",
    "i need to figure out",
    "first, i need to",
    "let me recall",
];

/// Searched in order; the first pattern present wins.
const ANSWER_PATTERNS: &[&str] = &[
    "final answer:",
    "so the answer is",
    "the answer is",
    "in conclusion,",
    "to summarize,",
    "here's",
    "here is",
];

const KEYWORDS: &[&str] = &[
    "therefore,",
    "the answer is:",
    "answer:",
    "result:",
    "thus,",
    "in conclusion:",
];

const INDICATORS: &[&str] = &[
    "let me think",
    "let me analyze",
    "let me consider",
    "let me work through",
    "let's think",
];

const TRANSITIONS: &[&str] = &[
    "so the answer",
    "the final answer",
    "final answer",
    "that means",
    "which gives",
    "hence",
];

/// Longest sentence, in words, the sentence fallback accepts as an answer.
const MAX_ANSWER_WORDS: usize = 12;

/// A completion divided into deliberation and user-facing answer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitResult {
    /// Internal reasoning; empty when none was detected.
    pub reasoning: String,
    /// Text to show the user.
    pub answer: String,
}

impl SplitResult {
    /// Builds a result from both segments, trimming each.
    #[must_use]
    pub fn new(reasoning: &str, answer: &str) -> Self {
        Self {
            reasoning: reasoning.trim().to_owned(),
            answer: answer.trim().to_owned(),
        }
    }

    /// A result with no reasoning.
    #[must_use]
    pub fn answer_only(answer: &str) -> Self {
        Self::new("", answer)
    }

    /// Whether any reasoning was detected.
    #[must_use]
    pub fn has_reasoning(&self) -> bool {
        !self.reasoning.is_empty()
    }
}

/// The rule that produced a [`SplitResult`], in priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SplitRule {
    /// The model is not reasoning-capable; the text was not inspected.
    Bypass,
    /// A complete `<think>…</think>` pair.
    TagPair,
    /// A `</think>` with no opening tag.
    OrphanClose,
    /// Untagged deliberation detected through known phrases.
    LeakedFragment,
    /// A conclusive connective such as `Therefore,`.
    Keyword,
    /// A `let me think`-style opener.
    ThinkingIndicator,
    /// Nothing matched; the whole text is the answer.
    Default,
}

impl SplitRule {
    /// Stable name used in logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Bypass => "bypass",
            Self::TagPair => "tag_pair",
            Self::OrphanClose => "orphan_close",
            Self::LeakedFragment => "leaked_fragment",
            Self::Keyword => "keyword",
            Self::ThinkingIndicator => "thinking_indicator",
            Self::Default => "default",
        }
    }
}

impl fmt::Display for SplitRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Splits completions of one model into reasoning and answer.
///
/// For reasoning-capable models the first matching tier wins: tag pair,
/// orphaned close tag, leaked fragments, keywords, thinking indicators and
/// finally the default of treating everything as the answer. Splitting never
/// fails.
///
/// # Examples
///
/// ```
/// use chat_reasoning::{ReasoningSplitter, SplitRule};
///
/// let splitter = ReasoningSplitter::new(true);
/// let (result, rule) = splitter.split_detailed("<think>2+2=4</think>It is 4.");
///
/// assert_eq!(rule, SplitRule::TagPair);
/// assert_eq!(result.reasoning, "2+2=4");
/// assert_eq!(result.answer, "It is 4.");
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReasoningSplitter {
    reasoning_capable: bool,
}

impl ReasoningSplitter {
    /// Creates a splitter; non-capable models bypass every tier.
    #[must_use]
    pub const fn new(reasoning_capable: bool) -> Self {
        Self { reasoning_capable }
    }

    /// Whether completions are inspected at all.
    #[must_use]
    pub const fn is_reasoning_capable(&self) -> bool {
        self.reasoning_capable
    }

    /// Splits `raw` into reasoning and answer.
    #[must_use]
    pub fn split(&self, raw: &str) -> SplitResult {
        self.split_detailed(raw).0
    }

    /// Splits `raw` and reports which rule decided the boundary.
    #[must_use]
    pub fn split_detailed(&self, raw: &str) -> (SplitResult, SplitRule) {
        let (result, rule) = if self.reasoning_capable {
            classify(raw)
        } else {
            (SplitResult::answer_only(raw), SplitRule::Bypass)
        };
        debug!(
            rule = %rule,
            reasoning_bytes = result.reasoning.len(),
            answer_bytes = result.answer.len(),
            "split completion"
        );
        (result, rule)
    }
}

/// Splits `raw` with a one-off [`ReasoningSplitter`].
#[must_use]
pub fn split(raw: &str, reasoning_capable: bool) -> SplitResult {
    ReasoningSplitter::new(reasoning_capable).split(raw)
}

/// A tier receives the raw text and its ASCII-lowercased copy; byte offsets
/// are identical in both.
type Tier = fn(&str, &str) -> Option<SplitResult>;

const TIERS: [(SplitRule, Tier); 5] = [
    (SplitRule::TagPair, tag_pair),
    (SplitRule::OrphanClose, orphan_close),
    (SplitRule::LeakedFragment, leaked_fragment),
    (SplitRule::Keyword, keyword),
    (SplitRule::ThinkingIndicator, thinking_indicator),
];

fn classify(raw: &str) -> (SplitResult, SplitRule) {
    let lower = raw.to_ascii_lowercase();
    TIERS
        .iter()
        .find_map(|&(rule, tier)| tier(raw, &lower).map(|result| (result, rule)))
        .unwrap_or_else(|| (SplitResult::answer_only(raw), SplitRule::Default))
}

fn tag_pair(raw: &str, _lower: &str) -> Option<SplitResult> {
    let captures = TAG_PAIR.captures(raw)?;
    let whole = captures.get(0)?;
    let inner = captures.get(1).map_or("", |m| m.as_str());
    Some(SplitResult::new(inner, &raw[whole.end()..]))
}

fn orphan_close(raw: &str, lower: &str) -> Option<SplitResult> {
    if lower.contains(OPEN_TAG) {
        return None;
    }
    let close = lower.find(CLOSE_TAG)?;
    Some(SplitResult::new(
        &raw[..close],
        &raw[close + CLOSE_TAG.len()..],
    ))
}

fn leaked_fragment(raw: &str, lower: &str) -> Option<SplitResult> {
    if !LEAK_FRAGMENTS.iter().any(|fragment| find_word(lower, fragment).is_some()) {
        return None;
    }
    if let Some(at) = ANSWER_PATTERNS.iter().find_map(|pattern| find_word(lower, pattern)) {
        return Some(SplitResult::new(&raw[..at], &raw[at..]));
    }
    if let Some(at) = final_answer_sentence(raw) {
        return Some(SplitResult::new(&raw[..at], &raw[at..]));
    }
    Some(SplitResult::new(raw, ""))
}

fn keyword(raw: &str, lower: &str) -> Option<SplitResult> {
    let at = KEYWORDS.iter().filter_map(|k| find_word(lower, k)).min()?;
    Some(SplitResult::new(&raw[..at], &raw[at..]))
}

fn thinking_indicator(raw: &str, lower: &str) -> Option<SplitResult> {
    let start = INDICATORS.iter().filter_map(|i| find_word(lower, i)).min()?;
    let transition = TRANSITIONS
        .iter()
        .filter_map(|t| find_word(&lower[start..], t))
        .min();
    Some(match transition {
        Some(offset) => SplitResult::new(&raw[start..start + offset], &raw[start + offset..]),
        None => SplitResult::new(&raw[start..], ""),
    })
}

/// First occurrence of `phrase` that starts and ends on a word boundary.
fn find_word(haystack: &str, phrase: &str) -> Option<usize> {
    let bytes = haystack.as_bytes();
    let is_word = |at: usize| bytes.get(at).is_some_and(u8::is_ascii_alphanumeric);
    let ends_in_word = phrase.bytes().last().is_some_and(|b| b.is_ascii_alphanumeric());
    haystack.match_indices(phrase).map(|(at, _)| at).find(|&at| {
        let starts_clean = at == 0 || !is_word(at - 1);
        let ends_clean = !ends_in_word || !is_word(at + phrase.len());
        starts_clean && ends_clean
    })
}

/// Start of the last short sentence carrying a number, never the first one.
fn final_answer_sentence(raw: &str) -> Option<usize> {
    sentences(raw)
        .into_iter()
        .skip(1)
        .rev()
        .find(|&(start, end)| {
            let sentence = &raw[start..end];
            sentence.bytes().any(|b| b.is_ascii_digit())
                && sentence.split_whitespace().count() <= MAX_ANSWER_WORDS
        })
        .map(|(start, _)| start)
}

/// Byte ranges of trimmed, non-empty sentences. A `.` between two digits is
/// part of a number, not a boundary.
fn sentences(text: &str) -> Vec<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut ranges = Vec::new();
    let mut start = 0;
    for (i, &b) in bytes.iter().enumerate() {
        let boundary = match b {
            b'!' | b'?' => true,
            b'.' => {
                let decimal = i > 0
                    && bytes[i - 1].is_ascii_digit()
                    && bytes.get(i + 1).is_some_and(u8::is_ascii_digit);
                !decimal
            }
            _ => false,
        };
        if boundary {
            push_trimmed(text, start, i + 1, &mut ranges);
            start = i + 1;
        }
    }
    push_trimmed(text, start, text.len(), &mut ranges);
    ranges
}

fn push_trimmed(text: &str, start: usize, end: usize, ranges: &mut Vec<(usize, usize)>) {
    let segment = &text[start..end];
    let trimmed = segment.trim();
    if !trimmed.is_empty() {
        let lead = segment.len() - segment.trim_start().len();
        ranges.push((start + lead, start + lead + trimmed.len()));
    }
}
