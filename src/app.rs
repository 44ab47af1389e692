use crate::config::Config;
use crate::exceptions::ParleyError;
use crate::history::HistoryStore;
use crate::keys::{KeyStore, ensure_outside};
use std::path::Path;

/// Everything a command needs after startup.
pub struct App {
    pub config: Config,
    pub store: HistoryStore,
}

impl App {
    /// Loads the properties file, installs logging, checks the key file
    /// placement and opens the chat-history root.
    pub fn bootstrap(properties: &Path) -> Result<Self, ParleyError> {
        let config = tracing::subscriber::with_default(
            crate::logging::startup_subscriber(),
            || Config::load(properties),
        )?;
        crate::logging::init(&config.general.log_level);
        tracing::debug!("Loaded properties from {}", config.path.display());

        if let Err(e) = ensure_outside(config.keys_file(), config.chat_history_root()) {
            tracing::error!("{}", e);
            return Err(e);
        }

        let store = HistoryStore::open(config.chat_history_root())?;
        Ok(Self { config, store })
    }

    pub fn keys(&self) -> Result<KeyStore, ParleyError> {
        KeyStore::load(self.config.keys_file(), self.config.providers())
    }
}
