//! Presentation sink
//!
//! The session talks to the terminal only through [`Presentation`], so it can
//! be driven by a script in tests.

use std::io::{self, BufRead, Write};

/// Severity tag shown in front of status lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Pass,
    Fail,
    Warn,
    Info,
}

impl Status {
    pub fn label(self) -> &'static str {
        match self {
            Status::Pass => "[PASS]",
            Status::Fail => "[FAIL]",
            Status::Warn => "[WARN]",
            Status::Info => "[INFO]",
        }
    }

    fn ansi(self) -> &'static str {
        match self {
            Status::Pass => GREEN,
            Status::Fail => RED,
            Status::Warn => YELLOW,
            Status::Info => BLUE,
        }
    }
}

/// Line-oriented terminal interaction.
pub trait Presentation {
    fn write_line(&mut self, text: &str);

    /// Write `text` without a newline, ready for input on the same line.
    fn write_prompt(&mut self, text: &str);

    /// Read one line without its terminator. `None` means input is closed.
    fn read_line(&mut self) -> Option<String>;

    fn clear(&mut self) {}

    fn status(&mut self, status: Status, text: &str) {
        self.write_line(&format!("{} {}", status.label(), text));
    }
}

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const BLUE: &str = "\x1b[34m";
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Stdin/stdout presentation with optional colors and screen clearing.
#[derive(Debug, Clone)]
pub struct Console {
    color: bool,
    clear: bool,
}

impl Console {
    pub fn new(color: bool, clear: bool) -> Self {
        Self { color, clear }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.color {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    }
}

impl Presentation for Console {
    fn write_line(&mut self, text: &str) {
        println!("{text}");
    }

    fn write_prompt(&mut self, text: &str) {
        print!("{}", self.paint(BOLD, text));
        let _ = io::stdout().flush();
    }

    fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
            Err(err) => {
                tracing::warn!("failed to read input: {err}");
                None
            }
        }
    }

    fn clear(&mut self) {
        if self.clear {
            print!("{CLEAR_SCREEN}");
            let _ = io::stdout().flush();
        }
    }

    fn status(&mut self, status: Status, text: &str) {
        let line = self.paint(status.ansi(), &format!("{} {}", status.label(), text));
        self.write_line(&line);
    }
}
