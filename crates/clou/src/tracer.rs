//! Execution tracing hooks for the handful of boundaries the evaluator
//! actually crosses: call/return, class declaration, and module resolution.
//!
//! [`NoopTracer`] is the production default; its methods inline away to
//! nothing via monomorphization.

/// Observes evaluator events without affecting their outcome.
pub trait Tracer {
    fn on_call_enter(&mut self, _callee: &str, _depth: usize) {}
    fn on_call_return(&mut self, _callee: &str, _depth: usize) {}
    fn on_class_declared(&mut self, _name: &str) {}
    fn on_require(&mut self, _path: &str, _cache_hit: bool) {}
}

/// Zero-cost no-op tracer; the production default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {}

/// Renders each event as one line to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrTracer;

impl Tracer for StderrTracer {
    fn on_call_enter(&mut self, callee: &str, depth: usize) {
        eprintln!("[trace] call  {callee} (depth {depth})");
    }

    fn on_call_return(&mut self, callee: &str, depth: usize) {
        eprintln!("[trace] ret   {callee} (depth {depth})");
    }

    fn on_class_declared(&mut self, name: &str) {
        eprintln!("[trace] class {name}");
    }

    fn on_require(&mut self, path: &str, cache_hit: bool) {
        let state = if cache_hit { "cached" } else { "fresh" };
        eprintln!("[trace] require {path} ({state})");
    }
}
