use crossterm::style::Stylize;
use std::io::Write;

/// Streams a reply to a terminal: a dimmed status line until the first
/// delta, then the raw text as it arrives.
pub struct LiveDisplay {
    has_started_content: bool,
    last_status_len: usize,
    width: usize,
    ends_with_newline: bool,
}

impl LiveDisplay {
    pub fn new(width: usize) -> Self {
        Self {
            has_started_content: false,
            last_status_len: 0,
            width,
            ends_with_newline: true,
        }
    }

    pub fn update_status(&mut self, text: &str) {
        if self.has_started_content {
            return;
        }
        let limit = self.width.saturating_sub(10);
        let truncated: String = text.chars().take(limit).collect();

        let mut stdout = std::io::stdout();
        let _ = write!(stdout, "\r{}\r", " ".repeat(self.last_status_len));
        let _ = write!(stdout, "{}", format!("{}...", truncated).dim());
        let _ = stdout.flush();
        self.last_status_len = truncated.chars().count() + 3;
    }

    pub fn render(&mut self, delta: &str) {
        if delta.is_empty() {
            return;
        }
        let mut stdout = std::io::stdout();
        if !self.has_started_content {
            self.has_started_content = true;
            let _ = write!(stdout, "\r{}\r", " ".repeat(self.last_status_len));
        }
        let _ = write!(stdout, "{}", delta);
        let _ = stdout.flush();
        self.ends_with_newline = delta.ends_with('\n');
    }

    /// Clears a pending status line and terminates the last line.
    pub fn finish(&mut self) {
        let mut stdout = std::io::stdout();
        if !self.has_started_content {
            let _ = write!(stdout, "\r{}\r", " ".repeat(self.last_status_len));
        } else if !self.ends_with_newline {
            let _ = writeln!(stdout);
        }
        let _ = stdout.flush();
    }
}
