use crate::app::App;
use crate::console::{is_stdout_terminal, role_color};
use crate::exceptions::ParleyError;
use crate::history::ChatPath;
use crate::models::{IndexedMessage, Message};
use crossterm::style::Stylize;

fn header(index: usize, message: &Message) -> String {
    let mut text = format!("[{}] {}", index, message.role);
    if let Some(model) = &message.model {
        text.push_str(&format!(" ({})", model));
    }
    if message.original_content.is_some() {
        text.push_str(" [edited]");
    }

    if is_stdout_terminal() {
        text.with(role_color(&message.role)).bold().to_string()
    } else {
        text
    }
}

pub fn run(app: &App, chat: &str, json: bool, system: bool) -> Result<(), ParleyError> {
    let path = ChatPath::parse(chat)?;
    let chat = app.store.load_chat(&path)?;

    if system {
        match (json, chat.system_message()) {
            (true, msg) => println!("{}", serde_json::to_string_pretty(&msg)?),
            (false, Some(msg)) => println!("{}", msg),
            (false, None) => println!("No system message set."),
        }
        return Ok(());
    }

    let visible = chat.visible();

    if json {
        let items: Vec<IndexedMessage> = visible
            .into_iter()
            .map(|(index, message)| IndexedMessage { index, message })
            .collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    if visible.is_empty() {
        println!("'{}' has no messages.", path);
        return Ok(());
    }

    for (i, (index, message)) in visible.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("{}", header(*index, message));
        println!("{}", message.content.trim_end());
    }
    Ok(())
}
