//! User functions, classes, and instances — the callable/constructible object
//! kinds of the runtime value model (§3, §4.3 class declaration protocol).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::FunctionDecl;
use crate::environment::Env;
use crate::value::Value;

/// A user-defined function value: its declaration, the environment it closed
/// over, and (for methods) binding state.
pub struct Function {
    pub declaration: Rc<FunctionDecl>,
    pub closure: Env,
    /// True for the method named `init`; its call always returns the bound
    /// instance rather than an explicit return value (§3, §4.3).
    pub is_initializer: bool,
    /// Set when this Function is a bound method (§9: "returning `o.m` yields
    /// a distinct bound Function with `bound_this=o`").
    pub bound_this: Option<Rc<Instance>>,
}

impl Function {
    pub fn new(declaration: Rc<FunctionDecl>, closure: Env, is_initializer: bool) -> Self {
        Self {
            declaration,
            closure,
            is_initializer,
            bound_this: None,
        }
    }

    /// Returns a fresh Function bound to `this`, sharing the declaration and
    /// closure. Every call produces a new object: bound-method identity is
    /// not preserved, only behaviour (§9).
    pub fn bind(self: &Rc<Self>, this: Rc<Instance>) -> Rc<Self> {
        Rc::new(Self {
            declaration: Rc::clone(&self.declaration),
            closure: Rc::clone(&self.closure),
            is_initializer: self.is_initializer,
            bound_this: Some(this),
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.declaration.name.as_deref()
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function {}>", self.name().unwrap_or("anonymous"))
    }
}

/// A class: its name, optional superclass, and its own (non-inherited)
/// method table. `findMethod` walks `superclass` to search the chain (§9).
pub struct Class {
    pub name: Rc<str>,
    pub superclass: Option<Rc<Class>>,
    pub methods: IndexMap<Rc<str>, Rc<Function>>,
}

impl Class {
    /// Looks up `name` in this class's own methods, then its ancestors.
    pub fn find_method(&self, name: &str) -> Option<Rc<Function>> {
        if let Some(method) = self.methods.get(name) {
            return Some(Rc::clone(method));
        }
        self.superclass.as_ref().and_then(|sup| sup.find_method(name))
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<class {}>", self.name)
    }
}

/// An instance of a class: fields grow on first assignment, in insertion
/// order (§3).
pub struct Instance {
    pub class: Rc<Class>,
    pub fields: RefCell<IndexMap<Rc<str>, Value>>,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Rc<Self> {
        Rc::new(Self {
            class,
            fields: RefCell::new(IndexMap::new()),
        })
    }

    pub fn get_field(&self, name: &str) -> Option<Value> {
        self.fields.borrow().get(name).cloned()
    }

    pub fn set_field(&self, name: Rc<str>, value: Value) {
        self.fields.borrow_mut().insert(name, value);
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} instance>", self.class.name)
    }
}

/// A built-in function implemented in the host language (§4.5).
pub struct NativeFunction {
    pub name: &'static str,
    pub arity: Option<usize>,
    #[allow(clippy::type_complexity)]
    pub func: Box<dyn Fn(&mut crate::evaluator::Evaluator, Vec<Value>) -> Result<Value, crate::error::RuntimeError>>,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn {}>", self.name)
    }
}
