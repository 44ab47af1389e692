use crate::exceptions::ParleyError;
use crate::fs::{atomic_write_json, is_within, resolve_absolute, set_owner_only};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Provider name to API key, backed by a JSON object file.
#[derive(Debug, Clone)]
pub struct KeyStore {
    path: PathBuf,
    providers: Vec<String>,
    keys: BTreeMap<String, String>,
    /// The file on disk could not be parsed; it is backed up before the
    /// next save replaces it.
    unparsable: bool,
}

impl KeyStore {
    pub fn load(path: &Path, providers: &[String]) -> Result<Self, ParleyError> {
        let mut store = Self {
            path: path.to_path_buf(),
            providers: providers.to_vec(),
            keys: BTreeMap::new(),
            unparsable: false,
        };
        store.reload()?;
        Ok(store)
    }

    /// Re-reads the file. Every configured provider is present afterwards,
    /// missing ones mapped to an empty string.
    pub fn reload(&mut self) -> Result<(), ParleyError> {
        self.unparsable = false;
        let mut saved: BTreeMap<String, String> = if self.path.exists() {
            let content = fs::read_to_string(&self.path)?;
            match serde_json::from_str(&content) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!(
                        "Key file {} is not a valid JSON object ({}); treating it as empty.",
                        self.path.display(),
                        e
                    );
                    self.unparsable = true;
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        for provider in &self.providers {
            saved.entry(provider.clone()).or_default();
        }
        self.keys = saved;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Configured providers first, then any extra entries found in the file.
    pub fn entries(&self) -> Vec<(&str, &str)> {
        let mut out: Vec<(&str, &str)> = self
            .providers
            .iter()
            .map(|p| (p.as_str(), self.get(p)))
            .collect();
        for (name, key) in &self.keys {
            if !self.providers.contains(name) {
                out.push((name.as_str(), key.as_str()));
            }
        }
        out
    }

    pub fn get(&self, provider: &str) -> &str {
        self.keys.get(provider).map(String::as_str).unwrap_or("")
    }

    /// Stored key (provider names compared case-insensitively), else the
    /// first non-empty environment variable from `env_vars`.
    pub fn lookup(&self, provider: &str, env_vars: &[&str]) -> Option<String> {
        let stored = self
            .keys
            .get(provider)
            .filter(|k| !k.is_empty())
            .or_else(|| {
                self.keys
                    .iter()
                    .find(|(name, key)| name.eq_ignore_ascii_case(provider) && !key.is_empty())
                    .map(|(_, key)| key)
            });
        if let Some(key) = stored {
            return Some(key.clone());
        }

        env_vars
            .iter()
            .filter_map(|var| env::var(var).ok())
            .find(|v| !v.trim().is_empty())
    }

    pub fn save(&mut self, keys: BTreeMap<String, String>) -> Result<(), ParleyError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        if self.unparsable && self.path.exists() {
            let backup = backup_path(&self.path);
            fs::copy(&self.path, &backup)?;
            set_owner_only(&backup);
            tracing::warn!(
                "Key file {} could not be parsed; previous contents kept in {}",
                self.path.display(),
                backup.display()
            );
        }
        atomic_write_json(&self.path, &keys)?;
        set_owner_only(&self.path);
        tracing::debug!("Saved {} key(s) to {}", keys.len(), self.path.display());
        self.reload()
    }

    pub fn set(&mut self, provider: &str, key: &str) -> Result<(), ParleyError> {
        if provider.trim().is_empty() {
            return Err(ParleyError::InvalidInput("Provider name cannot be empty.".into()));
        }
        let mut keys = self.keys.clone();
        keys.insert(provider.trim().to_string(), key.trim().to_string());
        self.save(keys)
    }

    /// Returns false when nothing was stored for the provider.
    pub fn remove(&mut self, provider: &str) -> Result<bool, ParleyError> {
        let mut keys = self.keys.clone();
        let had_key = keys.remove(provider).is_some_and(|k| !k.is_empty());
        if self.providers.iter().any(|p| p == provider) {
            keys.insert(provider.to_string(), String::new());
        }
        self.save(keys)?;
        Ok(had_key)
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".bak");
    PathBuf::from(name)
}

/// Masked form for display: never the whole key.
pub fn mask(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    match chars.len() {
        0 => String::new(),
        1..=8 => "*".repeat(chars.len()),
        n => {
            let head: String = chars[..4].iter().collect();
            let tail: String = chars[n - 4..].iter().collect();
            format!("{}…{}", head, tail)
        }
    }
}

/// Refuses a key file stored inside the chat-history root.
pub fn ensure_outside(keys_file: &Path, history_root: &Path) -> Result<(), ParleyError> {
    if is_within(keys_file, history_root) {
        return Err(ParleyError::Configuration(format!(
            "Key file {} must not be inside the chat history directory {}.",
            resolve_absolute(keys_file).display(),
            resolve_absolute(history_root).display()
        )));
    }
    Ok(())
}
