//! Display-side cleanup of raw completions.

use std::sync::LazyLock;

use regex::Regex;

static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<think>.*?</think>").expect("valid think-block regex"));
static OPEN_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<think>").expect("valid open-tag regex"));
static CLOSE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</think>").expect("valid close-tag regex"));

/// Removes every trace of reasoning from `text`.
///
/// Complete `<think>…</think>` blocks are deleted, text before a stray closing
/// tag is dropped and an unterminated `<think>` hides everything after it.
///
/// ```
/// use chat_reasoning::strip_reasoning;
///
/// assert_eq!(strip_reasoning("<think>hmm</think> Hi!"), "Hi!");
/// assert_eq!(strip_reasoning("leak</think>Hi!"), "Hi!");
/// assert_eq!(strip_reasoning("Hi!<think>still going"), "Hi!");
/// ```
#[must_use]
pub fn strip_reasoning(text: &str) -> String {
    let without_blocks = THINK_BLOCK.replace_all(text, "");
    let mut visible: &str = &without_blocks;
    if let Some(close) = CLOSE_TAG.find_iter(visible).last() {
        visible = &visible[close.end()..];
    }
    if let Some(open) = OPEN_TAG.find(visible) {
        visible = &visible[..open.start()];
    }
    visible.trim().to_owned()
}

/// Cuts `text` at the first end-of-turn marker and trims trailing whitespace.
///
/// Engines that do not stop on their own emit the marker and sometimes keep
/// going with the next turn; everything from the marker on is discarded.
#[must_use]
pub fn trim_stop_marker<'a>(text: &'a str, markers: &[&str]) -> &'a str {
    let cut = markers
        .iter()
        .filter(|marker| !marker.is_empty())
        .filter_map(|marker| text.find(marker))
        .min()
        .unwrap_or(text.len());
    text[..cut].trim_end()
}
