//! The error taxonomy the embedder sees: [`LexError`], [`ParseError`], and
//! [`RuntimeError`], unified under [`ClouError`].

use std::fmt;
use std::rc::Rc;

use crate::token::Token;

/// A source location carried by an error for later context rendering.
///
/// Only a line number is tracked, because that is all [`crate::token::Token`]
/// carries. Rendering a pretty-printed source excerpt around that line is
/// left to whatever embeds this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeLoc {
    pub line: u32,
}

impl CodeLoc {
    pub fn new(line: u32) -> Self {
        Self { line }
    }
}

impl fmt::Display for CodeLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}", self.line)
    }
}

/// Errors raised while turning source text into a token stream.
#[derive(Debug, Clone)]
pub enum LexError {
    UnterminatedString { line: u32 },
    UnexpectedCharacter { ch: char, line: u32 },
}

impl LexError {
    pub fn loc(&self) -> CodeLoc {
        match *self {
            Self::UnterminatedString { line } | Self::UnexpectedCharacter { line, .. } => CodeLoc::new(line),
        }
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnterminatedString { line } => write!(f, "[line {line}] Unterminated string"),
            Self::UnexpectedCharacter { ch, line } => {
                write!(f, "[line {line}] Unexpected character: '{ch}'")
            }
        }
    }
}

impl std::error::Error for LexError {}

/// Errors raised while turning a token stream into an AST.
///
/// A parse always reports at most one error (the first encountered); the
/// parser synchronizes to the next statement boundary internally but never
/// accumulates more than this single report (§7).
#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub loc: CodeLoc,
}

impl ParseError {
    pub fn new(message: impl Into<String>, token: &Token) -> Self {
        Self {
            message: message.into(),
            loc: CodeLoc::new(token.line),
        }
    }

    pub fn at_line(message: impl Into<String>, line: u32) -> Self {
        Self {
            message: message.into(),
            loc: CodeLoc::new(line),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.loc, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Errors raised while evaluating a parsed program.
#[derive(Debug, Clone)]
pub enum RuntimeError {
    UndefinedVariable { name: Rc<str>, loc: Option<CodeLoc> },
    ConstReassignment { name: Rc<str>, loc: Option<CodeLoc> },
    DivisionByZero { loc: Option<CodeLoc> },
    ModuloByZero { loc: Option<CodeLoc> },
    TypeError { message: String, loc: Option<CodeLoc> },
    ArrayIndexOutOfBounds { loc: Option<CodeLoc> },
    StringIndexOutOfBounds { loc: Option<CodeLoc> },
    ObjectPropertyNotFound { key: String, loc: Option<CodeLoc> },
    NotCallable { loc: Option<CodeLoc> },
    NotAClass { loc: Option<CodeLoc> },
    InvalidSuper { message: String, loc: Option<CodeLoc> },
    InvalidThis { loc: Option<CodeLoc> },
    UndefinedProperty { name: String, loc: Option<CodeLoc> },
    ModuleNotFound { path: String, loc: Option<CodeLoc> },
    ModuleError { message: String, loc: Option<CodeLoc> },
    ExportsNotAnObject { loc: Option<CodeLoc> },
    RecursionLimitExceeded,
}

impl RuntimeError {
    pub fn loc(&self) -> Option<CodeLoc> {
        match self {
            Self::UndefinedVariable { loc, .. }
            | Self::ConstReassignment { loc, .. }
            | Self::DivisionByZero { loc }
            | Self::ModuloByZero { loc }
            | Self::TypeError { loc, .. }
            | Self::ArrayIndexOutOfBounds { loc }
            | Self::StringIndexOutOfBounds { loc }
            | Self::ObjectPropertyNotFound { loc, .. }
            | Self::NotCallable { loc }
            | Self::NotAClass { loc }
            | Self::InvalidSuper { loc, .. }
            | Self::InvalidThis { loc }
            | Self::UndefinedProperty { loc, .. }
            | Self::ModuleNotFound { loc, .. }
            | Self::ModuleError { loc, .. }
            | Self::ExportsNotAnObject { loc } => *loc,
            Self::RecursionLimitExceeded => None,
        }
    }
}

impl RuntimeError {
    /// Fills in `loc` if it isn't already set. Call sites deep in the
    /// evaluator (property lookups, index arithmetic) often don't have a
    /// token handy; the expression-level dispatch that does have one attaches
    /// it here on the way back up.
    pub fn with_loc(self, loc: CodeLoc) -> Self {
        match self {
            Self::UndefinedVariable { name, loc: l } => Self::UndefinedVariable { name, loc: l.or(Some(loc)) },
            Self::ConstReassignment { name, loc: l } => Self::ConstReassignment { name, loc: l.or(Some(loc)) },
            Self::DivisionByZero { loc: l } => Self::DivisionByZero { loc: l.or(Some(loc)) },
            Self::ModuloByZero { loc: l } => Self::ModuloByZero { loc: l.or(Some(loc)) },
            Self::TypeError { message, loc: l } => Self::TypeError { message, loc: l.or(Some(loc)) },
            Self::ArrayIndexOutOfBounds { loc: l } => Self::ArrayIndexOutOfBounds { loc: l.or(Some(loc)) },
            Self::StringIndexOutOfBounds { loc: l } => Self::StringIndexOutOfBounds { loc: l.or(Some(loc)) },
            Self::ObjectPropertyNotFound { key, loc: l } => {
                Self::ObjectPropertyNotFound { key, loc: l.or(Some(loc)) }
            }
            Self::NotCallable { loc: l } => Self::NotCallable { loc: l.or(Some(loc)) },
            Self::NotAClass { loc: l } => Self::NotAClass { loc: l.or(Some(loc)) },
            Self::InvalidSuper { message, loc: l } => Self::InvalidSuper { message, loc: l.or(Some(loc)) },
            Self::InvalidThis { loc: l } => Self::InvalidThis { loc: l.or(Some(loc)) },
            Self::UndefinedProperty { name, loc: l } => Self::UndefinedProperty { name, loc: l.or(Some(loc)) },
            Self::ModuleNotFound { path, loc: l } => Self::ModuleNotFound { path, loc: l.or(Some(loc)) },
            Self::ModuleError { message, loc: l } => Self::ModuleError { message, loc: l.or(Some(loc)) },
            Self::ExportsNotAnObject { loc: l } => Self::ExportsNotAnObject { loc: l.or(Some(loc)) },
            Self::RecursionLimitExceeded => Self::RecursionLimitExceeded,
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UndefinedVariable { name, .. } => write!(f, "Undefined variable '{name}'"),
            Self::ConstReassignment { name, .. } => {
                write!(f, "Cannot reassign const variable '{name}'")
            }
            Self::DivisionByZero { .. } => write!(f, "Division by zero"),
            Self::ModuloByZero { .. } => write!(f, "Modulo by zero"),
            Self::TypeError { message, .. } => write!(f, "{message}"),
            Self::ArrayIndexOutOfBounds { .. } => write!(f, "Array index out of bounds"),
            Self::StringIndexOutOfBounds { .. } => write!(f, "String index out of bounds"),
            Self::ObjectPropertyNotFound { key, .. } => {
                write!(f, "Object property not found: {key}")
            }
            Self::NotCallable { .. } => write!(f, "Can only call functions and classes"),
            Self::NotAClass { .. } => write!(f, "Can only construct instances of classes"),
            Self::InvalidSuper { message, .. } => write!(f, "{message}"),
            Self::InvalidThis { .. } => write!(f, "Cannot use 'this' outside of a method"),
            Self::UndefinedProperty { name, .. } => write!(f, "Undefined property '{name}'"),
            Self::ModuleNotFound { path, .. } => write!(f, "Module not found: {path}"),
            Self::ModuleError { message, .. } => write!(f, "{message}"),
            Self::ExportsNotAnObject { .. } => write!(f, "exports must be an object"),
            Self::RecursionLimitExceeded => write!(f, "Maximum call depth exceeded"),
        }
    }
}

impl std::error::Error for RuntimeError {}

/// Umbrella error type returned across the embedding boundary (§6/§7).
#[derive(Debug, Clone)]
pub enum ClouError {
    Lex(LexError),
    Parse(ParseError),
    Runtime(RuntimeError),
}

impl ClouError {
    pub fn loc(&self) -> Option<CodeLoc> {
        match self {
            Self::Lex(e) => Some(e.loc()),
            Self::Parse(e) => Some(e.loc),
            Self::Runtime(e) => e.loc(),
        }
    }
}

impl fmt::Display for ClouError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lex(e) => write!(f, "{e}"),
            Self::Parse(e) => write!(f, "{e}"),
            Self::Runtime(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ClouError {}

impl From<LexError> for ClouError {
    fn from(e: LexError) -> Self {
        Self::Lex(e)
    }
}

impl From<ParseError> for ClouError {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

impl From<RuntimeError> for ClouError {
    fn from(e: RuntimeError) -> Self {
        Self::Runtime(e)
    }
}
