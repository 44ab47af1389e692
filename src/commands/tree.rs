use crate::app::App;
use crate::exceptions::ParleyError;
use crate::models::{EntryKind, TreeEntry};

pub fn run(app: &App, json: bool) -> Result<(), ParleyError> {
    let entries = app.store.tree()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No chats yet. Create one with `parley chat new`.");
        return Ok(());
    }

    for line in render(&entries) {
        println!("{}", line);
    }
    Ok(())
}

/// Root entries flush left, nested entries drawn with box characters.
pub fn render(entries: &[TreeEntry]) -> Vec<String> {
    let mut lines = Vec::new();
    for entry in entries {
        lines.push(label(entry));
        walk(&entry.children, "", &mut lines);
    }
    lines
}

fn walk(entries: &[TreeEntry], prefix: &str, lines: &mut Vec<String>) {
    for (i, entry) in entries.iter().enumerate() {
        let last = i + 1 == entries.len();
        let (branch, indent) = if last {
            ("└── ", "    ")
        } else {
            ("├── ", "│   ")
        };
        lines.push(format!("{}{}{}", prefix, branch, label(entry)));
        walk(&entry.children, &format!("{}{}", prefix, indent), lines);
    }
}

fn label(entry: &TreeEntry) -> String {
    match entry.kind {
        EntryKind::Project => format!("{}/", entry.name),
        EntryKind::Chat if entry.is_temporary => format!("{} (temporary)", entry.name),
        EntryKind::Chat => entry.name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(name: &str, path: &str, temp: bool) -> TreeEntry {
        TreeEntry {
            name: name.into(),
            path: path.into(),
            kind: EntryKind::Chat,
            is_temporary: temp,
            children: vec![],
        }
    }

    #[test]
    fn test_render_nested_tree() {
        let entries = vec![
            chat("Chat 1", "Chat 1", true),
            TreeEntry {
                name: "Work".into(),
                path: "Work".into(),
                kind: EntryKind::Project,
                is_temporary: false,
                children: vec![
                    TreeEntry {
                        name: "Rust".into(),
                        path: "Work/Rust".into(),
                        kind: EntryKind::Project,
                        is_temporary: false,
                        children: vec![chat("borrow", "Work/Rust/borrow", false)],
                    },
                    chat("notes", "Work/notes", false),
                ],
            },
        ];

        assert_eq!(
            render(&entries),
            vec![
                "Chat 1 (temporary)",
                "Work/",
                "├── Rust/",
                "│   └── borrow",
                "└── notes",
            ]
        );
    }
}
