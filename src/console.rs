use crate::models::{Role, TokenUsage};
use crossterm::style::{Color, Stylize};
use std::io::{IsTerminal, Read};
use unicode_width::UnicodeWidthStr;

pub const ANSI_REGEX_PATTERN: &str = r"\x1b\[[0-9;?]*[a-zA-Z]|\x1b].*?(\x1b\\|[\x07])";

pub fn strip_ansi_codes(s: &str) -> String {
    static RE: std::sync::LazyLock<regex::Regex> = std::sync::LazyLock::new(|| {
        regex::Regex::new(ANSI_REGEX_PATTERN).expect("ANSI pattern is a valid regex")
    });
    RE.replace_all(s, "").to_string()
}

pub fn get_terminal_width() -> usize {
    static TERMINAL_WIDTH: std::sync::LazyLock<usize> = std::sync::LazyLock::new(|| {
        for var in ["PARLEY_COLUMNS", "COLUMNS"] {
            if let Ok(w) = std::env::var(var).map(|s| s.parse().unwrap_or(0))
                && w > 0
            {
                return w;
            }
        }

        if is_stdout_terminal()
            && let Ok((w, _)) = crossterm::terminal::size()
        {
            return w as usize;
        }

        80
    });

    *TERMINAL_WIDTH
}

pub fn is_stdout_terminal() -> bool {
    if std::env::var("PARLEY_FORCE_TTY").is_ok() {
        return true;
    }
    std::io::stdout().is_terminal()
}

pub fn is_stdin_terminal() -> bool {
    std::io::stdin().is_terminal()
}

/// Piped stdin content, or `None` when stdin is a terminal or empty.
pub fn read_piped_stdin() -> Option<String> {
    if is_stdin_terminal() {
        return None;
    }
    let mut buffer = String::new();
    match std::io::stdin().read_to_string(&mut buffer) {
        Ok(_) if !buffer.trim().is_empty() => Some(buffer),
        _ => None,
    }
}

pub fn role_color(role: &Role) -> Color {
    match role {
        Role::User => Color::Blue,
        Role::Assistant => Color::Green,
        Role::System => Color::Grey,
    }
}

/// Prints `block` (a rendered table) under a centered title.
pub fn print_titled(title: &str, block: &str) {
    let width = strip_ansi_codes(block)
        .lines()
        .map(UnicodeWidthStr::width)
        .max()
        .unwrap_or(0);
    println!("{}", centered(title, width));
    println!("{}", block);
}

/// Centers `title` over a block whose widest line is `width` columns.
pub fn centered(title: &str, width: usize) -> String {
    let title_width = UnicodeWidthStr::width(title);
    if width > title_width {
        let padding = (width - title_width) / 2;
        format!("{}{}", " ".repeat(padding), title)
    } else {
        title.to_string()
    }
}

pub fn format_tokens(n: u32) -> String {
    if n >= 1000 {
        format!("{:.1}k", n as f64 / 1000.0)
    } else {
        n.to_string()
    }
}

/// Token and timing summary on stderr, dimmed on a terminal.
pub fn display_usage_summary(model: &str, usage: Option<&TokenUsage>, duration_ms: u64) {
    let mut info = format!("Model: {}.", model);
    if let Some(usage) = usage {
        info.push_str(&format!(
            " Tokens: {} sent, {} received.",
            format_tokens(usage.prompt_tokens),
            format_tokens(usage.completion_tokens)
        ));
    }
    info.push_str(&format!(" Time: {:.1}s", duration_ms as f64 / 1000.0));

    if is_stdout_terminal() {
        eprintln!("{}", "---".dim());
        eprintln!("{}", info.dim());
    } else {
        eprintln!("{}", info);
    }
}
