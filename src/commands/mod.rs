pub mod edit;
pub mod history_cmds;
pub mod imagine;
pub mod keys;
pub mod llm_shared;
pub mod models;
pub mod show;
pub mod system;
pub mod tree;

use crate::app::App;
use crate::exceptions::ParleyError;
use crate::fs::ChatLock;
use crate::history::ChatPath;
use crate::models::ChatFile;

/// A chat loaded under its lock. Dropping it releases the lock.
pub struct LockedChat {
    pub path: ChatPath,
    pub chat: ChatFile,
    _lock: ChatLock,
}

impl LockedChat {
    pub fn open(app: &App, raw: &str) -> Result<Self, ParleyError> {
        let path = ChatPath::parse(raw)?;
        let file = app.store.chat_file(&path);
        if !file.is_file() {
            return Err(ParleyError::NotFound(format!("Chat '{}'", path)));
        }
        let lock = ChatLock::acquire(&file)?;
        let chat = app.store.load_chat(&path)?;
        Ok(Self {
            path,
            chat,
            _lock: lock,
        })
    }

    pub fn save(&self, app: &App) -> Result<(), ParleyError> {
        app.store.save_chat(&self.path, &self.chat)
    }
}
