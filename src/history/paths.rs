use crate::consts::{CHAT_EXTENSION, TEMP_CHAT_PREFIX};
use crate::exceptions::ParleyError;
use std::fmt;
use std::path::{Path, PathBuf};

/// A `/`-separated location below the chat-history root, e.g.
/// `Project/Sub/My chat`. The empty path is the root itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ChatPath {
    segments: Vec<String>,
}

/// Rejects names that cannot be a single file or directory below the root.
pub fn validate_name(name: &str) -> Result<(), ParleyError> {
    if name.trim().is_empty() {
        return Err(ParleyError::InvalidInput("Name cannot be empty.".into()));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(ParleyError::InvalidInput(format!(
            "Name '{}' cannot contain path separators.",
            name
        )));
    }
    if name.starts_with('.') {
        return Err(ParleyError::InvalidInput(format!(
            "Name '{}' cannot start with '.'.",
            name
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(ParleyError::InvalidInput(format!(
            "Name '{}' contains control characters.",
            name.escape_debug()
        )));
    }
    Ok(())
}

/// `Chat N` at the root is a temporary chat.
pub fn temp_chat_number(name: &str) -> Option<u32> {
    name.strip_prefix(TEMP_CHAT_PREFIX)?.parse().ok()
}

impl ChatPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn parse(raw: &str) -> Result<Self, ParleyError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ParleyError::InvalidInput("Path cannot be empty.".into()));
        }
        if raw.starts_with('/') || raw.starts_with('\\') || Path::new(raw).is_absolute() {
            return Err(ParleyError::InvalidInput(format!(
                "Path '{}' must be relative to the chat history root.",
                raw
            )));
        }

        let mut segments: Vec<String> = Vec::new();
        for segment in raw.split('/') {
            if segment.is_empty() {
                return Err(ParleyError::InvalidInput(format!(
                    "Path '{}' contains an empty segment.",
                    raw
                )));
            }
            if segment == ".." || segment == "." {
                return Err(ParleyError::InvalidInput(format!(
                    "Path '{}' cannot contain '{}'.",
                    raw, segment
                )));
            }
            validate_name(segment)?;
            segments.push(segment.to_string());
        }

        let suffix = format!(".{}", CHAT_EXTENSION);
        if let Some(last) = segments.last_mut()
            && let Some(stem) = last.strip_suffix(&suffix).map(str::to_string)
        {
            validate_name(&stem)?;
            *last = stem;
        }

        Ok(Self { segments })
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    pub fn parent(&self) -> ChatPath {
        let mut segments = self.segments.clone();
        segments.pop();
        ChatPath { segments }
    }

    pub fn join(&self, name: &str) -> Result<ChatPath, ParleyError> {
        validate_name(name)?;
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Ok(ChatPath { segments })
    }

    /// True for `Chat N` directly under the root.
    pub fn is_temporary(&self) -> bool {
        self.segments.len() == 1 && temp_chat_number(&self.segments[0]).is_some()
    }

    /// Directory this path names when it is a project.
    pub fn to_dir(&self, root: &Path) -> PathBuf {
        self.segments.iter().fold(root.to_path_buf(), |acc, s| acc.join(s))
    }

    /// File this path names when it is a chat.
    pub fn to_chat_file(&self, root: &Path) -> PathBuf {
        let parent = self.parent().to_dir(root);
        parent.join(format!("{}.{}", self.name(), CHAT_EXTENSION))
    }
}

impl fmt::Display for ChatPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

impl std::str::FromStr for ChatPath {
    type Err = ParleyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChatPath::parse(s)
    }
}
