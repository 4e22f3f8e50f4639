//! Clou: a dynamically-typed scripting language with closures, classes, and
//! a synchronous `require`/`exports` module system.
//!
//! This crate is the execution core — lexer, parser, tree-walking evaluator,
//! and module loader (§1). [`Clou`] is the embedding entry point: construct
//! one, then drive it with [`Clou::run_file`] or [`Clou::run_prompt`] (§6).

pub mod ast;
pub mod callable;
pub mod environment;
pub mod error;
pub mod evaluator;
pub mod io;
pub mod lexer;
pub mod module;
pub mod parser;
pub mod repl;
pub mod resource;
pub mod token;
pub mod tracer;
pub mod value;

use std::cell::Cell;
use std::rc::Rc;

pub use callable::{Class, Function, Instance, NativeFunction};
pub use environment::{Env, Frame};
pub use error::{ClouError, CodeLoc, LexError, ParseError, RuntimeError};
pub use evaluator::Evaluator;
pub use io::{CollectStringPrint, NoPrint, PrintWriter, StdPrint};
pub use lexer::Lexer;
pub use module::ModuleStore;
pub use parser::Parser;
pub use repl::{ReplSession, needs_more_input};
pub use resource::{DEFAULT_MAX_RECURSION_DEPTH, RecursionGuard};
pub use token::{Literal as TokenLiteral, Token, TokenKind};
pub use tracer::{NoopTracer, StderrTracer, Tracer};
pub use value::Value;

/// The embedding entry point (§6).
///
/// Owns one module cache and one `globals` frame for its whole lifetime, so
/// repeated [`Clou::run_prompt`] calls see the bindings left behind by
/// earlier ones — the same persistence a REPL session needs, and a plain
/// script run never notices because it only calls in once.
pub struct Clou {
    module_store: Rc<ModuleStore>,
    evaluator: Evaluator,
    had_error: Cell<bool>,
}

impl Clou {
    /// `Clou()` from §6: a fresh engine over a private module store.
    pub fn new() -> Self {
        Self::with_module_store(Rc::new(ModuleStore::new()))
    }

    /// `Clou(module_system)` from §6: a fresh engine sharing the given
    /// module store, so a host can pre-populate module sources before
    /// handing the store to the engine.
    pub fn with_module_store(module_store: Rc<ModuleStore>) -> Self {
        let evaluator = Evaluator::new(Rc::clone(&module_store), Box::new(StdPrint), Box::new(NoopTracer));
        Self { module_store, evaluator, had_error: Cell::new(false) }
    }

    /// The module store backing this engine, for registering sources ahead
    /// of [`Clou::run_file`]/`require()`.
    pub fn module_store(&self) -> &Rc<ModuleStore> {
        &self.module_store
    }

    /// Replaces where `print()` output goes. Defaults to [`StdPrint`].
    pub fn set_print(&mut self, print: impl PrintWriter + 'static) {
        self.evaluator.set_print(Box::new(print));
    }

    /// Replaces the evaluator's execution tracer. Defaults to [`NoopTracer`].
    pub fn set_tracer(&mut self, tracer: impl Tracer + 'static) {
        self.evaluator.set_tracer(Box::new(tracer));
    }

    /// Whether the most recent `run_file`/`run_prompt` call (since the last
    /// latch reset) raised a lex, parse, or runtime error — useful for an
    /// embedder picking a process exit code the way `clou-cli` does.
    pub fn had_error(&self) -> bool {
        self.had_error.get()
    }

    /// Fetches `path`'s source from the module store and evaluates it top to
    /// bottom (§6). `require()` calls made from within that source resolve
    /// relative paths against `path`'s own directory.
    pub fn run_file(&mut self, path: &str) -> Result<Value, ClouError> {
        let source = self
            .module_store
            .get_file(path)
            .ok_or_else(|| ClouError::Runtime(RuntimeError::ModuleNotFound { path: path.to_string(), loc: None }))?;
        self.evaluator.push_module_dir(module::dir_of(path));
        let result = self.run_source(&source);
        self.evaluator.pop_module_dir();
        if result.is_err() {
            self.had_error.set(true);
        }
        result
    }

    /// Evaluates a single REPL input against the persistent globals this
    /// engine has accumulated, then clears any latched error flag so one bad
    /// line doesn't poison the rest of the session (§6, §7).
    pub fn run_prompt(&mut self, source: &str) -> Result<Value, ClouError> {
        let result = self.run_source(source);
        self.had_error.set(false);
        result
    }

    fn run_source(&mut self, source: &str) -> Result<Value, ClouError> {
        let tokens = Lexer::new(source).scan_tokens()?;
        let statements = Parser::new(tokens).parse()?;
        Ok(self.evaluator.interpret(&statements)?)
    }
}

impl Default for Clou {
    fn default() -> Self {
        Self::new()
    }
}
