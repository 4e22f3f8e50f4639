//! Lexically-scoped name→binding chains (§3).
//!
//! A frame is a shared, mutable node; closures and cached module records hold
//! a strong [`Env`] reference to whichever frame they captured, which is what
//! lets a closure outlive the syntactic block that created it (§9).

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::RuntimeError;
use crate::value::Value;

/// A shared handle to one environment frame.
pub type Env = Rc<RefCell<Frame>>;

struct Binding {
    value: Value,
    is_const: bool,
}

/// One scope level: a name→binding table plus an optional parent frame.
pub struct Frame {
    values: HashMap<Rc<str>, Binding>,
    parent: Option<Env>,
}

impl Frame {
    /// A fresh frame with no parent — used only for the interpreter's `globals`.
    pub fn root() -> Env {
        Rc::new(RefCell::new(Self {
            values: HashMap::new(),
            parent: None,
        }))
    }

    /// A fresh child frame of `parent` — used for blocks, call frames, and
    /// class-declaration environments.
    pub fn child(parent: &Env) -> Env {
        Rc::new(RefCell::new(Self {
            values: HashMap::new(),
            parent: Some(Rc::clone(parent)),
        }))
    }

    /// Binds `name` in this frame, shadowing any binding of the same name in
    /// an ancestor frame. Used by `let`/`const` declarations and parameter
    /// binding; never fails.
    pub fn define(env: &Env, name: Rc<str>, value: Value, is_const: bool) {
        env.borrow_mut().values.insert(name, Binding { value, is_const });
    }

    /// Looks up `name`, walking the parent chain.
    pub fn get(env: &Env, name: &str) -> Option<Value> {
        let frame = env.borrow();
        if let Some(binding) = frame.values.get(name) {
            return Some(binding.value.clone());
        }
        match &frame.parent {
            Some(parent) => Self::get(parent, name),
            None => None,
        }
    }

    /// Assigns to an existing binding of `name`, walking the parent chain.
    /// Never creates a new global binding (§4.3: "fails on an unknown name —
    /// no implicit global creation").
    pub fn assign(env: &Env, name: &str, value: Value) -> Result<(), RuntimeError> {
        let mut frame = env.borrow_mut();
        if let Some(binding) = frame.values.get_mut(name) {
            if binding.is_const {
                return Err(RuntimeError::ConstReassignment { name: Rc::from(name), loc: None });
            }
            binding.value = value;
            return Ok(());
        }
        let parent = frame.parent.clone();
        drop(frame);
        match parent {
            Some(parent) => Self::assign(&parent, name, value),
            None => Err(RuntimeError::UndefinedVariable { name: Rc::from(name), loc: None }),
        }
    }

    /// The parent of `env`, if any. Used by the module-reentry guard to walk
    /// a closure's frame chain up to the module root that owns it.
    pub(crate) fn parent(env: &Env) -> Option<Env> {
        env.borrow().parent.clone()
    }
}
