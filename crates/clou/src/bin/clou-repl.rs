//! Interactive REPL / one-shot file runner for manual testing.

use std::io::{self, Write};
use std::process::ExitCode;

use clou::{ReplSession, Value, needs_more_input};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    if let Some(path) = args.get(1) {
        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Error reading {path}: {e}");
                return ExitCode::FAILURE;
            }
        };
        let mut session = ReplSession::new();
        return match session.execute(&source) {
            Ok(_) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("{err}");
                ExitCode::FAILURE
            }
        };
    }

    let mut session = ReplSession::new();
    let mut buffer = String::new();

    loop {
        let prompt = if buffer.is_empty() { ">>> " } else { "... " };
        let Some(line) = read_line(prompt) else {
            println!();
            break;
        };

        if buffer.is_empty() && line.trim().is_empty() {
            continue;
        }

        if !buffer.is_empty() {
            buffer.push('\n');
        }
        buffer.push_str(&line);

        if needs_more_input(&buffer) {
            continue;
        }

        match session.execute(&buffer) {
            Ok(value) => {
                if !matches!(value, Value::Null) {
                    println!("{}", value.stringify());
                }
            }
            Err(err) => eprintln!("{err}"),
        }
        buffer.clear();
    }

    ExitCode::SUCCESS
}

/// Reads one line from stdin after printing a prompt. Returns `None` on EOF
/// (Ctrl+D).
fn read_line(prompt: &str) -> Option<String> {
    print!("{prompt}");
    if io::stdout().flush().is_err() {
        return None;
    }
    let mut input = String::new();
    let read = io::stdin().read_line(&mut input).ok()?;
    if read == 0 {
        return None;
    }
    Some(input.trim_end_matches(['\r', '\n']).to_owned())
}
