use crate::app::App;
use crate::console::{get_terminal_width, is_stdin_terminal, print_titled, read_piped_stdin};
use crate::exceptions::ParleyError;
use crate::keys::mask;
use comfy_table::presets::NOTHING;
use comfy_table::*;
use std::io::{self, Write};

pub fn list(app: &App) -> Result<(), ParleyError> {
    let store = app.keys()?;

    let mut table = Table::new();
    table
        .load_preset(NOTHING)
        .set_width(get_terminal_width() as u16)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Provider").add_attribute(Attribute::Bold),
            Cell::new("Key").add_attribute(Attribute::Bold),
        ]);

    for (provider, key) in store.entries() {
        let shown = if key.is_empty() {
            Cell::new("(not set)").add_attribute(Attribute::Dim)
        } else {
            Cell::new(mask(key))
        };
        table.add_row(vec![Cell::new(provider), shown]);
    }

    print_titled("API Keys", &table.to_string());
    println!("\nKey file: {}", store.path().display());
    Ok(())
}

fn prompt_for_key(provider: &str) -> Result<String, ParleyError> {
    if let Some(piped) = read_piped_stdin() {
        return Ok(piped.trim().to_string());
    }
    if !is_stdin_terminal() {
        return Err(ParleyError::InvalidInput("API key is required.".into()));
    }
    print!("API key for {}: ", provider);
    io::stdout().flush()?;
    let mut buffer = String::new();
    io::stdin().read_line(&mut buffer)?;
    Ok(buffer.trim().to_string())
}

pub fn set(app: &App, provider: &str, key: Option<String>) -> Result<(), ParleyError> {
    let key = match key {
        Some(k) => k.trim().to_string(),
        None => prompt_for_key(provider)?,
    };
    if key.is_empty() {
        return Err(ParleyError::InvalidInput("API key cannot be empty.".into()));
    }

    let mut store = app.keys()?;
    store.set(provider, &key)?;
    println!("Saved key for {} ({}).", provider, mask(&key));
    Ok(())
}

pub fn remove(app: &App, provider: &str) -> Result<(), ParleyError> {
    let mut store = app.keys()?;
    if store.remove(provider)? {
        println!("Removed key for {}.", provider);
    } else {
        println!("No key stored for {}.", provider);
    }
    Ok(())
}
