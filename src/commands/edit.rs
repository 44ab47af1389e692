use crate::app::App;
use crate::commands::LockedChat;
use crate::exceptions::ParleyError;
use std::env;
use std::fs;
use std::io::{IsTerminal, Read, Write};
use std::process::Command;

fn run_editor(content: &str) -> Result<String, ParleyError> {
    let mut temp = tempfile::Builder::new().suffix(".md").tempfile()?;
    temp.write_all(content.as_bytes())?;
    temp.flush()?;
    let temp_path = temp.path().to_path_buf();

    let editor = env::var("EDITOR").unwrap_or_else(|_| "vi".into());
    let parts = shlex::split(&editor).ok_or_else(|| {
        ParleyError::Configuration(format!("Failed to parse EDITOR variable: '{}'", editor))
    })?;

    let Some((program, args)) = parts.split_first() else {
        return Err(ParleyError::Configuration(
            "EDITOR environment variable is empty".into(),
        ));
    };

    tracing::debug!("Opening {} in {}", temp_path.display(), editor);
    let status = Command::new(program)
        .args(args)
        .arg(&temp_path)
        .status()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ParleyError::InvalidInput(format!(
                    "Editor '{}' not found. Please set $EDITOR.",
                    program
                ))
            } else {
                ParleyError::Io(e)
            }
        })?;

    if !status.success() {
        return Err(ParleyError::InvalidInput(format!(
            "Editor closed with exit code {}. Aborting.",
            status.code().unwrap_or(1)
        )));
    }

    Ok(fs::read_to_string(&temp_path)?)
}

/// Replaces the message at `index` with piped stdin or the result of an
/// `$EDITOR` session. `PARLEY_FORCE_EDITOR` opens the editor even when
/// stdin is piped.
pub fn run(app: &App, chat: &str, index: isize) -> Result<(), ParleyError> {
    let mut locked = LockedChat::open(app, chat)?;
    let pos = locked.chat.resolve_index(index)?;
    let original = locked.chat.messages[pos].content.clone();

    let is_piped = !std::io::stdin().is_terminal();
    let force_editor = env::var("PARLEY_FORCE_EDITOR").is_ok();

    let new_content = if is_piped && !force_editor {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        run_editor(&original)?
    };

    let norm_new = new_content.replace("\r\n", "\n");
    let norm_new = norm_new.trim_end();
    let norm_old = original.replace("\r\n", "\n");

    if norm_new.trim().is_empty() || norm_new == norm_old.trim_end() {
        println!("No changes detected. Aborting.");
        return Ok(());
    }

    locked.chat.edit(index, norm_new)?;
    locked.save(app)?;

    let diff = similar::TextDiff::from_lines(norm_old.trim_end(), norm_new);
    print!(
        "{}",
        diff.unified_diff()
            .context_radius(1)
            .header("before", "after")
            .missing_newline_hint(false)
    );
    println!("Updated message {} in '{}'.", index, locked.path);
    Ok(())
}
