//! Append-only conversation store and its render projections.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::text::escape_html;

/// Fixed avatar image used for user bubbles in exported transcripts.
pub const USER_AVATAR_URL: &str = "https://static.parley.chat/avatars/user.png";
/// Fixed avatar image used for assistant bubbles in exported transcripts.
pub const ASSISTANT_AVATAR_URL: &str = "https://static.parley.chat/avatars/bot.png";

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// A single conversation entry. Never mutated after creation.
///
/// `text` is plain text for the user role and HTML for the assistant role;
/// the backend formats its answers as markup.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Ordered, append-only message sequence.
///
/// The only mutation is `append`; there is no deletion or reordering, so
/// display order always equals append order.
#[derive(Debug, Default)]
pub struct ConversationStore {
    messages: Vec<Message>,
}

/// One rendered chat bubble: avatar plus markup, ready for an HTML surface.
#[derive(Debug, Clone)]
pub struct Bubble {
    pub role: Role,
    pub avatar_url: &'static str,
    pub html: String,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message and return a reference to the stored record.
    pub fn append(&mut self, role: Role, text: impl Into<String>) -> &Message {
        self.messages.push(Message {
            id: Uuid::new_v4().to_string(),
            role,
            text: text.into(),
            timestamp: Utc::now(),
        });
        self.messages.last().expect("just pushed")
    }

    /// Messages in append order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Project every message into an HTML bubble, in append order.
    ///
    /// User text is escaped here and nowhere else, so it is escaped exactly
    /// once no matter how often the projection runs. Assistant text passes
    /// through verbatim.
    pub fn bubbles(&self) -> Vec<Bubble> {
        self.messages
            .iter()
            .map(|message| match message.role {
                Role::User => Bubble {
                    role: Role::User,
                    avatar_url: USER_AVATAR_URL,
                    html: escape_html(&message.text),
                },
                Role::Assistant => Bubble {
                    role: Role::Assistant,
                    avatar_url: ASSISTANT_AVATAR_URL,
                    html: message.text.clone(),
                },
            })
            .collect()
    }

    /// Render the whole conversation as a standalone HTML transcript.
    pub fn to_html(&self) -> String {
        let mut out = String::from(
            "<!doctype html>\n<html>\n<head><meta charset=\"utf-8\"><title>parley transcript</title></head>\n<body>\n<ul class=\"conversation\">\n",
        );
        for (message, bubble) in self.messages.iter().zip(self.bubbles()) {
            let class = match bubble.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            out.push_str(&format!(
                "  <li id=\"msg-{}\" class=\"{}\"><img src=\"{}\" alt=\"\" class=\"avatar\"><div class=\"bubble\">{}</div></li>\n",
                message.id, class, bubble.avatar_url, bubble.html
            ));
        }
        out.push_str("</ul>\n</body>\n</html>\n");
        out
    }
}
