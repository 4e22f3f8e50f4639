//! The `print` output-capture interface: a plain `PrintWriter` trait and its
//! three implementations, letting an embedder redirect or collect a
//! program's output without touching real stdout.

use std::io::{self, Write as _};

/// Receives the line `print()` produces (§4.5: stringify each argument,
/// join with single spaces, emit one line).
pub trait PrintWriter {
    fn print_line(&mut self, line: &str);
}

/// Writes directly to stdout. The default for `run_file`/`run_prompt`.
#[derive(Debug, Default)]
pub struct StdPrint;

impl PrintWriter for StdPrint {
    fn print_line(&mut self, line: &str) {
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        let _ = writeln!(lock, "{line}");
    }
}

/// Collects every line into a `Vec<String>`. Useful for tests asserting on
/// program output without touching real stdout.
#[derive(Debug, Default)]
pub struct CollectStringPrint(Vec<String>);

impl CollectStringPrint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.0
    }

    pub fn into_lines(self) -> Vec<String> {
        self.0
    }
}

impl PrintWriter for CollectStringPrint {
    fn print_line(&mut self, line: &str) {
        self.0.push(line.to_string());
    }
}

/// Discards all output.
#[derive(Debug, Default)]
pub struct NoPrint;

impl PrintWriter for NoPrint {
    fn print_line(&mut self, _line: &str) {}
}
