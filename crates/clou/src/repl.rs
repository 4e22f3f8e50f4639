//! Persistent REPL session support: a thin wrapper that keeps one [`Clou`]
//! engine alive across `execute()` calls so interactive snippets share
//! variables, functions, and classes.

use crate::{Clou, ClouError, Value};

/// Keeps one [`Clou`] engine alive across repeated snippet executions.
pub struct ReplSession {
    engine: Clou,
}

impl ReplSession {
    pub fn new() -> Self {
        Self { engine: Clou::new() }
    }

    /// Evaluates one snippet against the globals accumulated by earlier
    /// calls on this session.
    pub fn execute(&mut self, source: &str) -> Result<Value, ClouError> {
        self.engine.run_prompt(source)
    }

    pub fn had_error(&self) -> bool {
        self.engine.had_error()
    }

    pub fn engine(&self) -> &Clou {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Clou {
        &mut self.engine
    }
}

impl Default for ReplSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Heuristic multiline detector for an interactive prompt: a snippet needs
/// more input while its brackets are unbalanced. Clou has no colon-delimited
/// blocks or backslash line continuation, so this is bracket-balance only.
pub fn needs_more_input(source: &str) -> bool {
    let mut balance = 0i32;
    for ch in source.chars() {
        match ch {
            '(' | '[' | '{' => balance += 1,
            ')' | ']' | '}' => balance -= 1,
            _ => {}
        }
    }
    balance > 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_persists_globals_across_executions() {
        let mut session = ReplSession::new();
        session.execute("let x = 10;").unwrap();
        let result = session.execute("x + 5;").unwrap();
        assert!(matches!(result, Value::Number(n) if n == 15.0));
    }

    #[test]
    fn error_latch_clears_after_execute() {
        let mut session = ReplSession::new();
        assert!(session.execute("print(undefined_name);").is_err());
        assert!(!session.had_error(), "run_prompt should clear the latch on return");
    }

    #[test]
    fn unbalanced_brackets_need_more_input() {
        assert!(needs_more_input("function f(a, b) {"));
        assert!(!needs_more_input("let x = 1;"));
    }
}
