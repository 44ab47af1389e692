use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Project,
    Chat,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::Project => write!(f, "project"),
            EntryKind::Chat => write!(f, "chat"),
        }
    }
}

// --- Chat files ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,

    // Assistant-only optional metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub timestamp: Option<OffsetDateTime>,

    // Edit lineage: the text before the first edit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_content: Option<String>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            model: None,
            token_usage: None,
            duration_ms: None,
            timestamp: Some(OffsetDateTime::now_utc()),
            original_content: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>, model: Option<String>) -> Self {
        Self {
            model,
            ..Self::new(Role::Assistant, content)
        }
    }
}

/// On-disk chat document. New chats written by older versions are a bare
/// JSON array of messages, which is still accepted on load.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(from = "ChatFileRepr")]
pub struct ChatFile {
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forked_from: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub created_at: Option<OffsetDateTime>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ChatFileRepr {
    Messages(Vec<Message>),
    Document {
        #[serde(default)]
        messages: Vec<Message>,
        #[serde(default)]
        forked_from: Option<String>,
        #[serde(default, with = "time::serde::rfc3339::option")]
        created_at: Option<OffsetDateTime>,
    },
}

impl From<ChatFileRepr> for ChatFile {
    fn from(repr: ChatFileRepr) -> Self {
        match repr {
            ChatFileRepr::Messages(messages) => ChatFile {
                messages,
                forked_from: None,
                created_at: None,
            },
            ChatFileRepr::Document {
                messages,
                forked_from,
                created_at,
            } => ChatFile {
                messages,
                forked_from,
                created_at,
            },
        }
    }
}

impl ChatFile {
    pub fn empty() -> Self {
        Self {
            messages: Vec::new(),
            forked_from: None,
            created_at: Some(OffsetDateTime::now_utc()),
        }
    }
}

// --- Supporting Structs ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LlmResponse {
    pub content: String,
    pub model: String,
    pub token_usage: Option<TokenUsage>,
    pub duration_ms: u64,
}

/// One node of the chat-history tree.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TreeEntry {
    pub name: String,
    pub path: String,
    pub kind: EntryKind,
    pub is_temporary: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeEntry>,
}

/// A message as shown by `show --json`, addressed by its visible index.
#[derive(Debug, Clone, Serialize)]
pub struct IndexedMessage<'a> {
    pub index: usize,
    #[serde(flatten)]
    pub message: &'a Message,
}
