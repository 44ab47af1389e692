use crate::app::App;
use crate::commands::LockedChat;
use crate::exceptions::ParleyError;
use crate::history::ChatPath;
use crate::models::EntryKind;

pub fn project_new(app: &App, path: &str) -> Result<(), ParleyError> {
    let path = ChatPath::parse(path)?;
    app.store.create_project(&path)?;
    println!("Created project '{}'.", path);
    Ok(())
}

pub fn chat_new(app: &App, name: Option<String>, project: Option<String>) -> Result<(), ParleyError> {
    let parent = match project.as_deref().map(str::trim) {
        Some(p) if !p.is_empty() => ChatPath::parse(p)?,
        _ => ChatPath::root(),
    };
    let path = app.store.create_chat(&parent, name.as_deref())?;
    println!("{}", path);
    Ok(())
}

pub fn rename(app: &App, path: &str, new_name: &str) -> Result<(), ParleyError> {
    let path = ChatPath::parse(path)?;
    let target = app.store.rename(&path, new_name.trim())?;
    println!("Renamed '{}' to '{}'.", path, target);
    Ok(())
}

pub fn delete(app: &App, path: &str, force: bool) -> Result<(), ParleyError> {
    let path = ChatPath::parse(path)?;
    let kind = app.store.delete(&path, force)?;
    println!("Deleted {} '{}'.", kind, path);
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutMode {
    Single,
    Pair,
    Below,
}

pub fn cut(app: &App, chat: &str, index: isize, mode: CutMode) -> Result<(), ParleyError> {
    let mut locked = LockedChat::open(app, chat)?;
    let removed = match mode {
        CutMode::Single => locked.chat.cut(index)?,
        CutMode::Pair => locked.chat.cut_pair(index)?,
        CutMode::Below => locked.chat.cut_below(index)?,
    };
    locked.save(app)?;
    println!("Removed {} message(s) from '{}'.", removed.len(), locked.path);
    Ok(())
}

/// Copies a chat to `new_path`, optionally cut after visible index `until`.
pub fn fork(app: &App, chat: &str, new_path: &str, until: Option<isize>) -> Result<(), ParleyError> {
    let source = ChatPath::parse(chat)?;
    let target = ChatPath::parse(new_path)?;

    let original = app.store.load_chat(&source)?;
    let forked = original.forked(&source.to_string(), until)?;

    if let Some(kind) = app.store.kind_of(&target) {
        return Err(ParleyError::AlreadyExists(match kind {
            EntryKind::Chat => format!("A chat named '{}' already exists.", target),
            EntryKind::Project => format!("'{}' is a project.", target),
        }));
    }

    let created = app.store.create_chat(&target.parent(), Some(target.name()))?;
    app.store.save_chat(&created, &forked)?;
    println!(
        "Forked '{}' to '{}' ({} message(s)).",
        source,
        created,
        forked.messages.len()
    );
    Ok(())
}
