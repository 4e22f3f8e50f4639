//! The recursion guard: turns runaway Clou-level recursion into a catchable
//! runtime error instead of a host stack overflow.

/// Default call-depth ceiling. Conservative because a tree-walking call here
/// recurses through several host stack frames (evaluator dispatch, argument
/// binding, block execution) per Clou call.
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 350;

/// A simple counted call-depth check. `enter` increments and compares against
/// the limit; `leave` decrements. The evaluator pairs one `enter`/`leave` per
/// user function or method call frame it pushes.
#[derive(Debug, Clone, Copy)]
pub struct RecursionGuard {
    depth: usize,
    limit: usize,
}

impl RecursionGuard {
    pub fn new(limit: usize) -> Self {
        Self { depth: 0, limit }
    }

    /// Returns the new depth on success, or `false` if the limit would be
    /// exceeded (the caller should not proceed to execute the call body).
    #[must_use]
    pub fn enter(&mut self) -> bool {
        if self.depth >= self.limit {
            return false;
        }
        self.depth += 1;
        true
    }

    pub fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl Default for RecursionGuard {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RECURSION_DEPTH)
    }
}
