use crate::consts::{CHAT_EXTENSION, LOCK_SUFFIX, MAX_TEMP_CHATS, TEMP_CHAT_PREFIX};
use crate::exceptions::ParleyError;
use crate::fs::{atomic_write_json, is_locked, lock_path, read_json};
use crate::history::paths::{ChatPath, temp_chat_number, validate_name};
use crate::models::{ChatFile, EntryKind, TreeEntry};
use std::fs;
use std::path::{Path, PathBuf};

/// Projects are directories and chats are JSON files below `root`.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    root: PathBuf,
}

impl HistoryStore {
    /// Opens the store, creating the root directory when missing.
    pub fn open(root: &Path) -> Result<Self, ParleyError> {
        fs::create_dir_all(root)?;
        tracing::debug!("Chat history root initialized at: {}", root.display());
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn chat_file(&self, path: &ChatPath) -> PathBuf {
        path.to_chat_file(&self.root)
    }

    pub fn project_dir(&self, path: &ChatPath) -> PathBuf {
        path.to_dir(&self.root)
    }

    /// Chat wins when both a chat file and a project directory carry the name.
    pub fn kind_of(&self, path: &ChatPath) -> Option<EntryKind> {
        if path.is_root() {
            return Some(EntryKind::Project);
        }
        if self.chat_file(path).is_file() {
            Some(EntryKind::Chat)
        } else if self.project_dir(path).is_dir() {
            Some(EntryKind::Project)
        } else {
            None
        }
    }

    fn require_project(&self, path: &ChatPath) -> Result<PathBuf, ParleyError> {
        let dir = self.project_dir(path);
        if !dir.is_dir() {
            return Err(ParleyError::NotFound(format!("Project '{}'", path)));
        }
        Ok(dir)
    }

    pub fn create_project(&self, path: &ChatPath) -> Result<PathBuf, ParleyError> {
        if path.is_root() {
            return Err(ParleyError::InvalidInput("Project name cannot be empty.".into()));
        }
        self.require_project(&path.parent())?;

        let dir = self.project_dir(path);
        if dir.exists() {
            return Err(ParleyError::AlreadyExists(format!(
                "A project named '{}' already exists here.",
                path.name()
            )));
        }
        fs::create_dir(&dir)?;
        tracing::info!("Created new project: {}", dir.display());
        Ok(dir)
    }

    /// Creates an empty chat. Without a name, only the root accepts a chat:
    /// it gets the next free `Chat N`.
    pub fn create_chat(
        &self,
        parent: &ChatPath,
        name: Option<&str>,
    ) -> Result<ChatPath, ParleyError> {
        self.require_project(parent)?;

        let name = match name {
            Some(n) => {
                let n = n.trim();
                let n = n
                    .strip_suffix(&format!(".{}", CHAT_EXTENSION))
                    .unwrap_or(n);
                validate_name(n)?;
                n.to_string()
            }
            None if parent.is_root() => self.next_temp_chat_name()?,
            None => {
                return Err(ParleyError::InvalidInput(format!(
                    "A name is required for a new chat in project '{}'.",
                    parent
                )));
            }
        };

        let path = parent.join(&name)?;
        let file = self.chat_file(&path);
        if file.exists() {
            return Err(ParleyError::AlreadyExists(format!(
                "A chat named '{}' already exists in this location.",
                name
            )));
        }

        atomic_write_json(&file, &ChatFile::empty())?;
        tracing::info!("Created new chat: {}", file.display());
        Ok(path)
    }

    pub fn next_temp_chat_name(&self) -> Result<String, ParleyError> {
        (1..=MAX_TEMP_CHATS)
            .map(|i| format!("{}{}", TEMP_CHAT_PREFIX, i))
            .find(|name| {
                !self
                    .root
                    .join(format!("{}.{}", name, CHAT_EXTENSION))
                    .exists()
            })
            .ok_or_else(|| {
                ParleyError::Chat("Could not find an available chat name.".into())
            })
    }

    pub fn load_chat(&self, path: &ChatPath) -> Result<ChatFile, ParleyError> {
        let file = self.chat_file(path);
        if !file.is_file() {
            return Err(ParleyError::NotFound(format!("Chat '{}'", path)));
        }
        read_json(&file).map_err(|e| match e {
            ParleyError::Serialization(inner) => ParleyError::Chat(format!(
                "Chat file {} is corrupt: {}",
                file.display(),
                inner
            )),
            other => other,
        })
    }

    pub fn save_chat(&self, path: &ChatPath, chat: &ChatFile) -> Result<(), ParleyError> {
        let file = self.chat_file(path);
        atomic_write_json(&file, chat)?;
        tracing::debug!("Saved {} message(s) to {}", chat.messages.len(), file.display());
        Ok(())
    }

    pub fn rename(&self, path: &ChatPath, new_name: &str) -> Result<ChatPath, ParleyError> {
        validate_name(new_name)?;
        let kind = self
            .kind_of(path)
            .filter(|_| !path.is_root())
            .ok_or_else(|| ParleyError::NotFound(format!("'{}'", path)))?;

        let target = path.parent().join(new_name)?;
        let (from, to) = match kind {
            EntryKind::Chat => {
                if is_locked(&self.chat_file(path)) {
                    return Err(ParleyError::Busy(format!(
                        "Chat '{}' has a request in flight.",
                        path
                    )));
                }
                (self.chat_file(path), self.chat_file(&target))
            }
            EntryKind::Project => (self.project_dir(path), self.project_dir(&target)),
        };

        if to.exists() {
            return Err(ParleyError::AlreadyExists(format!(
                "'{}' already exists.",
                target
            )));
        }
        fs::rename(&from, &to)?;
        if kind == EntryKind::Chat {
            let _ = fs::remove_file(lock_path(&from));
        }
        tracing::info!("Renamed {} to {}", from.display(), to.display());
        Ok(target)
    }

    pub fn delete(&self, path: &ChatPath, force: bool) -> Result<EntryKind, ParleyError> {
        if path.is_root() {
            return Err(ParleyError::InvalidInput(
                "Refusing to delete the chat history root.".into(),
            ));
        }
        let kind = self
            .kind_of(path)
            .ok_or_else(|| ParleyError::NotFound(format!("'{}'", path)))?;

        match kind {
            EntryKind::Chat => {
                let file = self.chat_file(path);
                if is_locked(&file) {
                    return Err(ParleyError::Busy(format!(
                        "Chat '{}' has a request in flight.",
                        path
                    )));
                }
                fs::remove_file(&file)?;
                let _ = fs::remove_file(lock_path(&file));
            }
            EntryKind::Project => {
                let dir = self.project_dir(path);
                let is_empty = fs::read_dir(&dir)?.next().is_none();
                if !is_empty && !force {
                    return Err(ParleyError::InvalidInput(format!(
                        "Project '{}' is not empty. Use --force to delete it with its contents.",
                        path
                    )));
                }
                fs::remove_dir_all(&dir)?;
            }
        }
        tracing::info!("Deleted {} '{}'", kind, path);
        Ok(kind)
    }

    /// Temporary chats first, then the project tree.
    pub fn tree(&self) -> Result<Vec<TreeEntry>, ParleyError> {
        let mut entries = self.scan(&ChatPath::root())?;
        entries.sort_by(|a, b| {
            let rank = |e: &TreeEntry| match (e.is_temporary, e.kind) {
                (true, _) => 0,
                (false, EntryKind::Project) => 1,
                (false, EntryKind::Chat) => 2,
            };
            rank(a).cmp(&rank(b)).then_with(|| {
                match (temp_chat_number(&a.name), temp_chat_number(&b.name)) {
                    (Some(x), Some(y)) if a.is_temporary && b.is_temporary => x.cmp(&y),
                    _ => a.name.cmp(&b.name),
                }
            })
        });
        Ok(entries)
    }

    fn scan(&self, parent: &ChatPath) -> Result<Vec<TreeEntry>, ParleyError> {
        let dir = self.project_dir(parent);
        let mut entries = Vec::new();

        let read = match fs::read_dir(&dir) {
            Ok(read) => read,
            Err(e) => {
                tracing::warn!("Error scanning directory {}: {}", dir.display(), e);
                return Ok(entries);
            }
        };

        for entry in read {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if name.starts_with('.') || name.ends_with(LOCK_SUFFIX) {
                continue;
            }

            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                let path = parent.join(name)?;
                let children = self.scan(&path)?;
                entries.push(TreeEntry {
                    name: name.to_string(),
                    path: path.to_string(),
                    kind: EntryKind::Project,
                    is_temporary: false,
                    children,
                });
            } else if let Some(stem) = name.strip_suffix(&format!(".{}", CHAT_EXTENSION))
                && validate_name(stem).is_ok()
            {
                let path = parent.join(stem)?;
                entries.push(TreeEntry {
                    name: stem.to_string(),
                    is_temporary: path.is_temporary(),
                    path: path.to_string(),
                    kind: EntryKind::Chat,
                    children: Vec::new(),
                });
            }
        }

        if !parent.is_root() {
            entries.sort_by(|a, b| {
                let rank = |e: &TreeEntry| matches!(e.kind, EntryKind::Chat);
                rank(a).cmp(&rank(b)).then_with(|| a.name.cmp(&b.name))
            });
        }
        Ok(entries)
    }

    /// Every chat path in tree order.
    pub fn chat_paths(&self) -> Result<Vec<String>, ParleyError> {
        fn walk(entries: &[TreeEntry], out: &mut Vec<String>) {
            for e in entries {
                match e.kind {
                    EntryKind::Chat => out.push(e.path.clone()),
                    EntryKind::Project => walk(&e.children, out),
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.tree()?, &mut out);
        Ok(out)
    }
}
