use crate::consts::LOCK_SUFFIX;
use crate::exceptions::ParleyError;
use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;

/// Atomically write bytes to a file using a temporary file + rename strategy.
pub fn atomic_write_bytes<P: AsRef<Path>>(path: P, data: &[u8]) -> Result<(), ParleyError> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    // Create temp file in the same directory to ensure atomic rename works across filesystems
    let mut temp_file = NamedTempFile::new_in(dir)?;

    temp_file.write_all(data)?;

    temp_file
        .persist(path)
        .map_err(|e| ParleyError::Io(e.error))?;

    Ok(())
}

pub fn atomic_write_json<T: serde::Serialize>(path: &Path, data: &T) -> Result<(), ParleyError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut temp_file = NamedTempFile::new_in(dir)?;

    {
        let mut writer = std::io::BufWriter::new(&mut temp_file);
        serde_json::to_writer_pretty(&mut writer, data)?;
        writeln!(writer)?;
        writer.flush()?;
    }

    temp_file
        .persist(path)
        .map_err(|e| ParleyError::Io(e.error))?;
    Ok(())
}

pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ParleyError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Restricts a file to owner read/write. A no-op off unix.
pub fn set_owner_only(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(meta) = fs::metadata(path) {
            let mut perms = meta.permissions();
            perms.set_mode(0o600);
            let _ = fs::set_permissions(path, perms);
        }
    }
    #[cfg(not(unix))]
    let _ = path;
}

pub fn normalize_path(path: &Path) -> PathBuf {
    path.components()
        .fold(PathBuf::new(), |mut acc, component| {
            match component {
                Component::ParentDir => {
                    acc.pop();
                }
                Component::CurDir => {}
                c => acc.push(c.as_os_str()),
            };
            acc
        })
}

/// Absolute form of `path` that works for paths that do not exist yet: the
/// deepest existing ancestor is canonicalised (resolving symlinks) and the
/// missing tail is appended lexically.
pub fn resolve_absolute(path: &Path) -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let logical = normalize_path(&cwd.join(path));

    let mut existing = logical.clone();
    let mut tail = Vec::new();
    loop {
        if let Ok(canon) = fs::canonicalize(&existing) {
            let mut resolved = canon;
            for part in tail.iter().rev() {
                resolved.push(part);
            }
            return resolved;
        }
        match (existing.file_name().map(|n| n.to_os_string()), existing.parent()) {
            (Some(name), Some(parent)) => {
                tail.push(name);
                existing = parent.to_path_buf();
            }
            _ => return logical,
        }
    }
}

/// True when `child` is `root` itself or lies underneath it.
pub fn is_within(child: &Path, root: &Path) -> bool {
    resolve_absolute(child).starts_with(resolve_absolute(root))
}

/// `<chat>.json.lock` next to the chat file.
pub fn lock_path(chat_file: &Path) -> PathBuf {
    let mut name = chat_file.as_os_str().to_os_string();
    name.push(LOCK_SUFFIX);
    PathBuf::from(name)
}

/// Advisory lock on `<chat>.json.lock` guarding a chat file while a command
/// works on it. The kernel drops the lock when the process exits, so a lock
/// file left behind by a killed process does not block later commands.
#[derive(Debug)]
pub struct ChatLock {
    path: PathBuf,
    file: File,
}

impl ChatLock {
    pub fn acquire(chat_file: &Path) -> Result<Self, ParleyError> {
        let path = lock_path(chat_file);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        match file.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => {
                return Err(ParleyError::Busy(format!(
                    "A request for '{}' is already in flight (lock file {}).",
                    chat_file.display(),
                    path.display()
                )));
            }
            Err(TryLockError::Error(e)) => return Err(ParleyError::Io(e)),
        }

        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        Ok(Self { path, file })
    }
}

impl Drop for ChatLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!("Could not remove lock file {}: {}", self.path.display(), e);
        }
        if let Err(e) = self.file.unlock() {
            tracing::debug!("Could not unlock {}: {}", self.path.display(), e);
        }
    }
}

/// True while another handle holds the lock for `chat_file`. A stale lock
/// file nobody holds does not count.
pub fn is_locked(chat_file: &Path) -> bool {
    let path = lock_path(chat_file);
    let Ok(file) = OpenOptions::new().read(true).write(true).open(&path) else {
        return false;
    };
    match file.try_lock() {
        Ok(()) => {
            let _ = file.unlock();
            false
        }
        Err(TryLockError::WouldBlock) => true,
        Err(TryLockError::Error(e)) => {
            tracing::debug!("Could not check lock {}: {}", path.display(), e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_collapses_dots() {
        let p = normalize_path(Path::new("/a/b/../c/./d"));
        assert_eq!(p, PathBuf::from("/a/c/d"));
    }

    #[test]
    fn test_is_within_handles_missing_paths() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path().join("chats");
        assert!(is_within(&root.join("keys.json"), &root));
        assert!(is_within(&root.join("a/../b/keys.json"), &root));
        assert!(!is_within(&temp.path().join("keys.json"), &root));
        assert!(!is_within(&temp.path().join("chats-other/keys.json"), &root));
    }

    #[test]
    fn test_chat_lock_is_exclusive_and_released() {
        let temp = tempfile::tempdir().unwrap();
        let chat = temp.path().join("Chat 1.json");
        fs::write(&chat, "[]").unwrap();

        let lock = ChatLock::acquire(&chat).unwrap();
        assert!(lock_path(&chat).exists());
        assert!(is_locked(&chat));
        assert!(matches!(
            ChatLock::acquire(&chat),
            Err(ParleyError::Busy(_))
        ));

        drop(lock);
        assert!(!lock_path(&chat).exists());
        assert!(!is_locked(&chat));
        assert!(ChatLock::acquire(&chat).is_ok());
    }

    #[test]
    fn test_leftover_lock_file_is_reclaimed() {
        let temp = tempfile::tempdir().unwrap();
        let chat = temp.path().join("Notes.json");
        fs::write(&chat, "[]").unwrap();
        fs::write(lock_path(&chat), "999999\n").unwrap();

        assert!(!is_locked(&chat));
        let lock = ChatLock::acquire(&chat).unwrap();
        let pid = fs::read_to_string(lock_path(&chat)).unwrap();
        assert_eq!(pid.trim(), std::process::id().to_string());
        drop(lock);
        assert!(!lock_path(&chat).exists());
    }
}
