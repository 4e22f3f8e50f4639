//! Command-line driver that runs a single Clou source file.

use std::{env, fs, process::ExitCode};

use clou::{Clou, ClouError};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let Some(path) = args.get(1) else {
        eprintln!("usage: clou <path>");
        return ExitCode::FAILURE;
    };

    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error reading {path}: {err}");
            return ExitCode::FAILURE;
        }
    };

    let mut engine = Clou::new();
    engine.module_store().add_file(path.clone(), source);

    match engine.run_file(path) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            match err {
                ClouError::Lex(_) | ClouError::Parse(_) => ExitCode::from(65),
                ClouError::Runtime(_) => ExitCode::from(70),
            }
        }
    }
}
