//! Messages and ordered conversations.

use std::ops::Index;
use std::slice;

use serde::{Deserialize, Deserializer, Serialize};

use crate::Role;

/// A single role-tagged chat message.
///
/// Missing or `null` fields decode to defaults: a message without `role` is a
/// user message and one without `content` is empty.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Author of the message.
    #[serde(default)]
    pub role: Role,
    /// Message text.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl Message {
    /// Creates a new message.
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Shorthand for a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Shorthand for a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Shorthand for an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Returns the message role.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Returns the message content.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Chronologically ordered chat history.
///
/// # Examples
///
/// ```
/// use chat_primitives::{Conversation, Message, Role};
///
/// let mut conversation = Conversation::from(vec![Message::user("Hi")]);
/// conversation.append_chunk(Role::Assistant, "Hel");
/// conversation.append_chunk(Role::Assistant, "lo");
///
/// assert_eq!(conversation.len(), 2);
/// assert_eq!(conversation[1].content(), "Hello");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation(Vec<Message>);

impl Conversation {
    /// Creates an empty conversation.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a message at the end of the history.
    pub fn push(&mut self, message: Message) {
        self.0.push(message);
    }

    /// Appends a streamed chunk.
    ///
    /// The chunk is concatenated onto the last message when it carries the same
    /// role, otherwise it opens a new message.
    pub fn append_chunk(&mut self, role: Role, chunk: &str) {
        match self.0.last_mut() {
            Some(last) if last.role == role => last.content.push_str(chunk),
            _ => self.0.push(Message::new(role, chunk)),
        }
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when the conversation holds no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrows the messages in order.
    #[must_use]
    pub fn as_slice(&self) -> &[Message] {
        &self.0
    }

    /// Iterates over the messages in order.
    pub fn iter(&self) -> slice::Iter<'_, Message> {
        self.0.iter()
    }

    /// Consumes the conversation, returning the underlying messages.
    #[must_use]
    pub fn into_messages(self) -> Vec<Message> {
        self.0
    }
}

impl From<Vec<Message>> for Conversation {
    fn from(messages: Vec<Message>) -> Self {
        Self(messages)
    }
}

impl From<&[Message]> for Conversation {
    fn from(messages: &[Message]) -> Self {
        Self(messages.to_vec())
    }
}

impl FromIterator<Message> for Conversation {
    fn from_iter<I: IntoIterator<Item = Message>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl AsRef<[Message]> for Conversation {
    fn as_ref(&self) -> &[Message] {
        &self.0
    }
}

impl Index<usize> for Conversation {
    type Output = Message;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl<'a> IntoIterator for &'a Conversation {
    type Item = &'a Message;
    type IntoIter = slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for Conversation {
    type Item = Message;
    type IntoIter = std::vec::IntoIter<Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
