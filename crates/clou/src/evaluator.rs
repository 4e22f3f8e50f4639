//! Visitor over the AST producing values; controls scoping and dispatch.
//!
//! The recursion guard and tracer hooks are the ambient engineering surface
//! layered on top of the core evaluation rules.

use std::rc::Rc;

use ahash::AHashSet;
use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::ast::{Expr, FunctionDecl, Literal as AstLiteral, Stmt};
use crate::callable::{Class, Function, Instance, NativeFunction};
use crate::environment::{Env, Frame};
use crate::error::{CodeLoc, RuntimeError};
use crate::io::PrintWriter;
use crate::module::{self, ModuleStore};
use crate::resource::RecursionGuard;
use crate::token::{Token, TokenKind};
use crate::tracer::Tracer;
use crate::value::Value;

/// The non-error control-flow signal a statement can raise: a `return` that
/// unwinds to the nearest enclosing call frame (§4.3). Carries `RuntimeError`
/// too so that `?` composes across both statement and expression evaluation.
enum Unwind {
    Return(Value),
    Error(RuntimeError),
}

impl From<RuntimeError> for Unwind {
    fn from(e: RuntimeError) -> Self {
        Self::Error(e)
    }
}

type StmtResult = Result<(), Unwind>;

/// Walks the AST with a current `environment` pointer, per §4.3.
pub struct Evaluator {
    pub globals: Env,
    environment: Env,
    module_store: Rc<ModuleStore>,
    /// Directory of the module currently executing, one entry per nested
    /// `require()` frame; consulted by relative-path resolution (§4.4).
    module_dirs: Vec<String>,
    /// Frame pointers of every module environment `require()` has created,
    /// so the reentry guard can tell a module-owned function from one
    /// declared directly in the running script or REPL (§4.4 SUPPLEMENT).
    module_frames: AHashSet<usize>,
    /// `(module frame pointer, function name)` pairs currently on the call
    /// stack — the cycle-break sentinel (§4.4/§9 SUPPLEMENT).
    reentrant: AHashSet<(usize, Rc<str>)>,
    recursion: RecursionGuard,
    tracer: Box<dyn Tracer>,
    print: Box<dyn PrintWriter>,
}

impl Evaluator {
    pub fn new(module_store: Rc<ModuleStore>, print: Box<dyn PrintWriter>, tracer: Box<dyn Tracer>) -> Self {
        let globals = Frame::root();
        let mut eval = Self {
            environment: Rc::clone(&globals),
            globals,
            module_store,
            module_dirs: vec![String::new()],
            module_frames: AHashSet::default(),
            reentrant: AHashSet::default(),
            recursion: RecursionGuard::default(),
            tracer,
            print,
        };
        eval.define_builtins();
        eval
    }

    pub fn set_print(&mut self, print: Box<dyn PrintWriter>) {
        self.print = print;
    }

    pub fn set_tracer(&mut self, tracer: Box<dyn Tracer>) {
        self.tracer = tracer;
    }

    pub fn push_module_dir(&mut self, dir: String) {
        self.module_dirs.push(dir);
    }

    pub fn pop_module_dir(&mut self) {
        self.module_dirs.pop();
    }

    fn current_dir(&self) -> String {
        self.module_dirs.last().cloned().unwrap_or_default()
    }

    fn define_builtins(&mut self) {
        let natives: Vec<(&'static str, Option<usize>, NativeFn)> = vec![
            ("print", None, Box::new(native_print)),
            ("len", Some(1), Box::new(native_len)),
            ("clock", Some(0), Box::new(native_clock)),
            ("require", Some(1), Box::new(native_require)),
        ];
        for (name, arity, func) in natives {
            let value = Value::Native(Rc::new(NativeFunction { name, arity, func }));
            Frame::define(&self.globals, Rc::from(name), value, true);
        }
    }

    /// Runs a parsed program's top-level statements in the current
    /// environment (globals, for a fresh script; the persistent globals
    /// across calls, for a REPL session — see `Clou::run_prompt`).
    ///
    /// Returns the value of the final top-level expression statement, for a
    /// REPL's convenience in echoing a result (`Value::Null` otherwise). A
    /// top-level `return` ends the program early rather than erroring, the
    /// same way a `return` at module scope ends a CommonJS module body.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<Value, RuntimeError> {
        let mut last = Value::Null;
        for stmt in statements {
            if let Stmt::Expression(expr) = stmt {
                match self.eval_expr(expr) {
                    Ok(v) => last = v,
                    Err(Unwind::Return(v)) => return Ok(v),
                    Err(Unwind::Error(e)) => return Err(e),
                };
                continue;
            }
            match self.exec_stmt(stmt) {
                Ok(()) => {}
                Err(Unwind::Return(v)) => return Ok(v),
                Err(Unwind::Error(e)) => return Err(e),
            }
        }
        Ok(last)
    }

    // ---- statements ----

    fn exec_stmt(&mut self, stmt: &Stmt) -> StmtResult {
        match stmt {
            Stmt::Expression(expr) => {
                self.eval_expr(expr)?;
            }
            Stmt::Var { name, is_const, initializer } => {
                let value = match initializer {
                    Some(expr) => self.eval_expr(expr)?,
                    None => Value::Null,
                };
                Frame::define(&self.environment, Rc::clone(&name.lexeme), value, *is_const);
            }
            Stmt::Block(statements) => {
                let child = Frame::child(&self.environment);
                self.exec_block(statements, child)?;
            }
            Stmt::If { condition, then_branch, else_branch } => {
                if self.eval_expr(condition)?.is_truthy() {
                    self.exec_stmt(then_branch)?;
                } else if let Some(else_branch) = else_branch {
                    self.exec_stmt(else_branch)?;
                }
            }
            Stmt::While { condition, body } => {
                while self.eval_expr(condition)?.is_truthy() {
                    self.exec_stmt(body)?;
                }
            }
            Stmt::FunctionDecl(decl) => {
                let func = Function::new(Rc::clone(decl), Rc::clone(&self.environment), false);
                let name = decl.name.clone().expect("statement-level function declarations are always named");
                Frame::define(&self.environment, name, Value::Function(Rc::new(func)), false);
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.eval_expr(expr)?,
                    None => Value::Null,
                };
                return Err(Unwind::Return(value));
            }
            Stmt::Class { name, superclass, methods } => {
                self.exec_class_decl(name, superclass.as_ref(), methods)?;
            }
        }
        Ok(())
    }

    fn exec_block(&mut self, statements: &[Stmt], env: Env) -> StmtResult {
        let previous = std::mem::replace(&mut self.environment, env);
        let result = (|| {
            for stmt in statements {
                self.exec_stmt(stmt)?;
            }
            Ok(())
        })();
        self.environment = previous;
        result
    }

    /// The class declaration protocol of §4.3: bind the name early (so
    /// methods can refer to the class by name), open a child environment for
    /// `super` when there's a superclass, build the method table against
    /// that environment, then assign the finished `Class` into the earlier
    /// binding.
    fn exec_class_decl(
        &mut self,
        name: &Token,
        superclass_name: Option<&Token>,
        methods: &[Rc<FunctionDecl>],
    ) -> StmtResult {
        let superclass = match superclass_name {
            Some(sup_tok) => {
                let value = Frame::get(&self.environment, &sup_tok.lexeme).ok_or_else(|| {
                    RuntimeError::UndefinedVariable { name: Rc::clone(&sup_tok.lexeme), loc: Some(CodeLoc::new(sup_tok.line)) }
                })?;
                match value {
                    Value::Class(c) => Some(c),
                    _ => return Err(RuntimeError::NotAClass { loc: Some(CodeLoc::new(sup_tok.line)) }.into()),
                }
            }
            None => None,
        };

        Frame::define(&self.environment, Rc::clone(&name.lexeme), Value::Null, false);

        let method_env = match &superclass {
            Some(sup) => {
                let env = Frame::child(&self.environment);
                Frame::define(&env, Rc::from("super"), Value::Class(Rc::clone(sup)), false);
                env
            }
            None => Rc::clone(&self.environment),
        };

        let mut method_table = IndexMap::new();
        for decl in methods {
            let method_name = decl.name.clone().expect("class methods are always named");
            let is_initializer = &*method_name == "init";
            let func = Rc::new(Function::new(Rc::clone(decl), Rc::clone(&method_env), is_initializer));
            method_table.insert(method_name, func);
        }

        let class = Rc::new(Class { name: Rc::clone(&name.lexeme), superclass, methods: method_table });
        self.tracer.on_class_declared(&name.lexeme);
        Frame::assign(&self.environment, &name.lexeme, Value::Class(class)).expect("class name was just defined above");
        Ok(())
    }

    // ---- expressions ----

    fn eval_expr(&mut self, expr: &Expr) -> Result<Value, Unwind> {
        Ok(match expr {
            Expr::Literal(lit) => eval_literal(lit),
            Expr::Variable(name) => Frame::get(&self.environment, &name.lexeme)
                .ok_or_else(|| RuntimeError::UndefinedVariable { name: Rc::clone(&name.lexeme), loc: Some(CodeLoc::new(name.line)) })?,
            Expr::Grouping(inner) => self.eval_expr(inner)?,
            Expr::Unary { op, right } => self.eval_unary(op, right)?,
            Expr::Binary { left, op, right } => self.eval_binary(left, op, right)?,
            Expr::Logical { left, op, right } => self.eval_logical(left, op, right)?,
            Expr::Assign { name, value } => {
                let value = self.eval_expr(value)?;
                Frame::assign(&self.environment, &name.lexeme, value.clone()).map_err(|e| e.with_loc(CodeLoc::new(name.line)))?;
                value
            }
            Expr::Call { callee, paren, args } => self.eval_call(callee, paren, args)?,
            Expr::Get { object, name } => {
                let obj = self.eval_expr(object)?;
                get_property(&obj, &name.lexeme).map_err(|e| e.with_loc(CodeLoc::new(name.line)))?
            }
            Expr::Set { object, name, value } => {
                let obj = self.eval_expr(object)?;
                let value = self.eval_expr(value)?;
                set_property(&obj, &name.lexeme, value.clone()).map_err(|e| e.with_loc(CodeLoc::new(name.line)))?;
                value
            }
            Expr::This(token) => Frame::get(&self.environment, "this")
                .ok_or_else(|| RuntimeError::InvalidThis { loc: Some(CodeLoc::new(token.line)) })?,
            Expr::Super { keyword, method } => self.eval_super(keyword, method)?,
            Expr::New { class_name, args, .. } => self.eval_new(class_name, args)?,
            Expr::Array { elements, .. } => {
                let mut values = Vec::with_capacity(elements.len());
                for el in elements {
                    values.push(self.eval_expr(el)?);
                }
                Value::new_array(values)
            }
            Expr::Object { entries, .. } => {
                let mut map = IndexMap::new();
                for (key, value_expr) in entries {
                    let value = self.eval_expr(value_expr)?;
                    map.insert(Rc::clone(key), value);
                }
                Value::new_object(map)
            }
            Expr::Index { object, bracket, index } => {
                let obj = self.eval_expr(object)?;
                let idx = self.eval_expr(index)?;
                index_get(&obj, &idx).map_err(|e| e.with_loc(CodeLoc::new(bracket.line)))?
            }
            Expr::IndexAssign { object, bracket, index, value } => {
                let obj = self.eval_expr(object)?;
                let idx = self.eval_expr(index)?;
                let value = self.eval_expr(value)?;
                index_set(&obj, &idx, value.clone()).map_err(|e| e.with_loc(CodeLoc::new(bracket.line)))?;
                value
            }
            Expr::Function(decl) => Value::Function(Rc::new(Function::new(Rc::clone(decl), Rc::clone(&self.environment), false))),
        })
    }

    fn eval_unary(&mut self, op: &Token, right: &Expr) -> Result<Value, Unwind> {
        let value = self.eval_expr(right)?;
        Ok(match op.kind {
            TokenKind::Minus => Value::Number(-expect_number(&value).map_err(|e| e.with_loc(CodeLoc::new(op.line)))?),
            TokenKind::Bang | TokenKind::Not => Value::Boolean(!value.is_truthy()),
            other => unreachable!("parser never produces a unary op of kind {other:?}"),
        })
    }

    fn eval_logical(&mut self, left: &Expr, op: &Token, right: &Expr) -> Result<Value, Unwind> {
        let left_value = self.eval_expr(left)?;
        match op.kind {
            TokenKind::Or if left_value.is_truthy() => Ok(left_value),
            TokenKind::Or => self.eval_expr(right),
            TokenKind::And if !left_value.is_truthy() => Ok(left_value),
            TokenKind::And => self.eval_expr(right),
            other => unreachable!("parser never produces a logical op of kind {other:?}"),
        }
    }

    fn eval_binary(&mut self, left: &Expr, op: &Token, right: &Expr) -> Result<Value, Unwind> {
        let l = self.eval_expr(left)?;
        let r = self.eval_expr(right)?;
        let loc = CodeLoc::new(op.line);
        Ok(match op.kind {
            TokenKind::Plus => match (&l, &r) {
                (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
                _ if matches!(l, Value::String(_)) || matches!(r, Value::String(_)) => {
                    Value::String(Rc::from(format!("{}{}", l.stringify(), r.stringify())))
                }
                _ => return Err(type_error("Operands must be two numbers or at least one string", loc).into()),
            },
            TokenKind::Minus => Value::Number(numeric_operand(&l, loc)? - numeric_operand(&r, loc)?),
            TokenKind::Star => Value::Number(numeric_operand(&l, loc)? * numeric_operand(&r, loc)?),
            TokenKind::Slash => {
                let divisor = numeric_operand(&r, loc)?;
                if divisor == 0.0 {
                    return Err(RuntimeError::DivisionByZero { loc: Some(loc) }.into());
                }
                Value::Number(numeric_operand(&l, loc)? / divisor)
            }
            TokenKind::Percent => {
                let divisor = numeric_operand(&r, loc)?;
                if divisor == 0.0 {
                    return Err(RuntimeError::ModuloByZero { loc: Some(loc) }.into());
                }
                Value::Number(numeric_operand(&l, loc)? % divisor)
            }
            TokenKind::Caret => Value::Number(numeric_operand(&l, loc)?.powf(numeric_operand(&r, loc)?)),
            TokenKind::EqualEqual => Value::Boolean(l.loose_eq(&r)),
            TokenKind::BangEqual => Value::Boolean(!l.loose_eq(&r)),
            TokenKind::Less => Value::Boolean(numeric_operand(&l, loc)? < numeric_operand(&r, loc)?),
            TokenKind::LessEqual => Value::Boolean(numeric_operand(&l, loc)? <= numeric_operand(&r, loc)?),
            TokenKind::Greater => Value::Boolean(numeric_operand(&l, loc)? > numeric_operand(&r, loc)?),
            TokenKind::GreaterEqual => Value::Boolean(numeric_operand(&l, loc)? >= numeric_operand(&r, loc)?),
            other => unreachable!("parser never produces a binary op of kind {other:?}"),
        })
    }

    fn eval_call(&mut self, callee: &Expr, paren: &Token, args: &[Expr]) -> Result<Value, Unwind> {
        let callee_value = self.eval_expr(callee)?;
        // Most Clou calls pass a handful of arguments; a `SmallVec` avoids a
        // heap allocation for the common case.
        let mut arg_values: SmallVec<[Value; 3]> = SmallVec::with_capacity(args.len());
        for arg in args {
            arg_values.push(self.eval_expr(arg)?);
        }
        let arg_values = arg_values.into_vec();
        let loc = CodeLoc::new(paren.line);
        match callee_value {
            Value::Native(native) => {
                if let Some(arity) = native.arity {
                    if arg_values.len() != arity {
                        return Err(type_error(
                            &format!("{} expects {arity} argument(s), got {}", native.name, arg_values.len()),
                            loc,
                        )
                        .into());
                    }
                }
                Ok((native.func)(self, arg_values).map_err(|e| e.with_loc(loc))?)
            }
            Value::Function(func) => Ok(self.call_function(&func, arg_values).map_err(|e| e.with_loc(loc))?),
            _ => Err(RuntimeError::NotCallable { loc: Some(loc) }.into()),
        }
    }

    fn eval_new(&mut self, class_name: &Token, args: &[Expr]) -> Result<Value, Unwind> {
        let class_value = Frame::get(&self.environment, &class_name.lexeme).ok_or_else(|| {
            RuntimeError::UndefinedVariable { name: Rc::clone(&class_name.lexeme), loc: Some(CodeLoc::new(class_name.line)) }
        })?;
        let class = match class_value {
            Value::Class(c) => c,
            _ => return Err(RuntimeError::NotAClass { loc: Some(CodeLoc::new(class_name.line)) }.into()),
        };
        let mut arg_values: SmallVec<[Value; 3]> = SmallVec::with_capacity(args.len());
        for arg in args {
            arg_values.push(self.eval_expr(arg)?);
        }
        let arg_values = arg_values.into_vec();
        let instance = Instance::new(Rc::clone(&class));
        if let Some(init) = class.find_method("init") {
            let bound = init.bind(Rc::clone(&instance));
            self.call_function(&bound, arg_values)
                .map_err(|e| e.with_loc(CodeLoc::new(class_name.line)))?;
        }
        Ok(Value::Instance(instance))
    }

    fn eval_super(&mut self, keyword: &Token, method: &Token) -> Result<Value, Unwind> {
        let superclass = match Frame::get(&self.environment, "super") {
            Some(Value::Class(c)) => c,
            _ => {
                return Err(RuntimeError::InvalidSuper {
                    message: "'super' used outside of a subclass method".to_string(),
                    loc: Some(CodeLoc::new(keyword.line)),
                }
                .into());
            }
        };
        let this = match Frame::get(&self.environment, "this") {
            Some(Value::Instance(i)) => i,
            _ => return Err(RuntimeError::InvalidThis { loc: Some(CodeLoc::new(keyword.line)) }.into()),
        };
        let bound_method = superclass.find_method(&method.lexeme).ok_or_else(|| RuntimeError::UndefinedProperty {
            name: method.lexeme.to_string(),
            loc: Some(CodeLoc::new(method.line)),
        })?;
        Ok(Value::Function(bound_method.bind(this)))
    }

    /// Invokes a user function or bound method: pushes a call frame, binds
    /// parameters (defaults evaluated in that frame, per §4.3/§9 — "closures
    /// close over call-time values, not declaration-time"), defines `this`
    /// for bound methods, and runs the body. `init` methods always return
    /// the bound instance regardless of what the body explicitly returns.
    pub fn call_function(&mut self, func: &Rc<Function>, args: Vec<Value>) -> Result<Value, RuntimeError> {
        if !self.recursion.enter() {
            return Err(RuntimeError::RecursionLimitExceeded);
        }
        let name: Rc<str> = func.name().map_or_else(|| Rc::from("<anonymous>"), Rc::from);
        let module_key = find_module_frame(&func.closure, &self.module_frames);
        let reentry_key = module_key.map(|frame_ptr| (frame_ptr, Rc::clone(&name)));

        if let Some(key) = &reentry_key {
            if self.reentrant.contains(key) {
                self.recursion.leave();
                // The cycle-break sentinel (§4.4/§9): this exact function is
                // already on the stack for this module, so this call returns
                // the empty string instead of recursing further.
                return Ok(Value::String(Rc::from("")));
            }
            self.reentrant.insert(key.clone());
        }

        self.tracer.on_call_enter(&name, self.recursion.depth());
        let result = self.invoke_function_body(func, args);
        self.tracer.on_call_return(&name, self.recursion.depth());

        if let Some(key) = &reentry_key {
            self.reentrant.remove(key);
        }
        self.recursion.leave();
        result
    }

    fn invoke_function_body(&mut self, func: &Rc<Function>, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let call_env = Frame::child(&func.closure);
        let mut args = args.into_iter();
        for param in &func.declaration.params.positional {
            let provided = args.next();
            let value = match (provided, &param.default) {
                (Some(Value::Null), Some(default)) | (None, Some(default)) => self.eval_in_env(default, &call_env)?,
                (Some(v), _) => v,
                (None, None) => Value::Null,
            };
            Frame::define(&call_env, Rc::clone(&param.name), value, false);
        }
        if let Some(rest) = &func.declaration.params.rest {
            let remaining: Vec<Value> = args.collect();
            Frame::define(&call_env, Rc::clone(rest), Value::new_array(remaining), false);
        }
        if let Some(this) = &func.bound_this {
            Frame::define(&call_env, Rc::from("this"), Value::Instance(Rc::clone(this)), false);
        }

        match self.exec_block(&func.declaration.body, call_env) {
            Ok(()) => Ok(if func.is_initializer {
                func.bound_this.clone().map(Value::Instance).unwrap_or(Value::Null)
            } else {
                Value::Null
            }),
            Err(Unwind::Return(value)) => Ok(if func.is_initializer {
                func.bound_this.clone().map(Value::Instance).unwrap_or(Value::Null)
            } else {
                value
            }),
            Err(Unwind::Error(e)) => Err(e),
        }
    }

    /// Evaluates `expr` with `env` temporarily current — used for parameter
    /// defaults, which evaluate in the fresh call frame rather than the
    /// caller's environment (§4.3).
    fn eval_in_env(&mut self, expr: &Expr, env: &Env) -> Result<Value, RuntimeError> {
        let previous = std::mem::replace(&mut self.environment, Rc::clone(env));
        let result = self.eval_expr(expr);
        self.environment = previous;
        match result {
            Ok(v) => Ok(v),
            Err(Unwind::Return(v)) => Ok(v),
            Err(Unwind::Error(e)) => Err(e),
        }
    }

    // ---- module loading ----

    /// `require(path)` per §4.4: cache hit returns the same exports identity
    /// immediately; a fresh load installs an empty exports object into the
    /// cache *before* running the module body, which is what lets a cyclic
    /// `require` see the other side's partially-populated exports.
    pub fn require(&mut self, path: &str) -> Result<Value, RuntimeError> {
        let current_dir = self.current_dir();
        let (resolved, source) = self.module_store.get_module_source(path, &current_dir)?;

        if let Some(cached) = self.module_store.get_cached(&resolved) {
            self.tracer.on_require(path, true);
            return Ok(cached);
        }
        self.tracer.on_require(path, false);

        let exports = Value::new_object(IndexMap::new());
        self.module_store.cache(resolved.clone(), exports.clone());

        let module_env = Frame::child(&self.globals);
        self.module_frames.insert(Rc::as_ptr(&module_env) as usize);
        Frame::define(&module_env, Rc::from("exports"), exports.clone(), false);

        let tokens = crate::lexer::Lexer::new(&source)
            .scan_tokens()
            .map_err(|e| RuntimeError::ModuleError { message: e.to_string(), loc: None })?;
        let statements = crate::parser::Parser::new(tokens)
            .parse()
            .map_err(|e| RuntimeError::ModuleError { message: e.to_string(), loc: None })?;

        self.module_dirs.push(module::dir_of(&resolved));
        let outcome = self.exec_block(&statements, module_env.clone());
        self.module_dirs.pop();

        match outcome {
            Ok(()) | Err(Unwind::Return(_)) => {}
            Err(Unwind::Error(e)) => return Err(e),
        }

        match Frame::get(&module_env, "exports") {
            Some(final_exports @ Value::Object(_)) => {
                self.module_store.cache(resolved, final_exports.clone());
                Ok(final_exports)
            }
            _ => Err(RuntimeError::ExportsNotAnObject { loc: None }),
        }
    }
}

/// Walks from `env` up through parent frames, returning the pointer identity
/// of the first frame recorded as a module root (§4.4 SUPPLEMENT). `None`
/// means the closure never passes through a `require()`-created frame — the
/// script entry point and REPL session — so the reentry guard never applies
/// to it, and ordinary recursion at the top level is unaffected.
fn find_module_frame(env: &Env, module_frames: &AHashSet<usize>) -> Option<usize> {
    let mut current = Rc::clone(env);
    loop {
        let ptr = Rc::as_ptr(&current) as usize;
        if module_frames.contains(&ptr) {
            return Some(ptr);
        }
        current = Frame::parent(&current)?;
    }
}

fn eval_literal(lit: &AstLiteral) -> Value {
    match lit {
        AstLiteral::Number(n) => Value::Number(*n),
        AstLiteral::String(s) => Value::String(Rc::clone(s)),
        AstLiteral::Boolean(b) => Value::Boolean(*b),
        AstLiteral::Null => Value::Null,
    }
}

fn type_error(message: &str, loc: CodeLoc) -> RuntimeError {
    RuntimeError::TypeError { message: message.to_string(), loc: Some(loc) }
}

fn numeric_operand(v: &Value, loc: CodeLoc) -> Result<f64, RuntimeError> {
    expect_number(v).map_err(|e| e.with_loc(loc))
}

fn expect_number(v: &Value) -> Result<f64, RuntimeError> {
    match v {
        Value::Number(n) => Ok(*n),
        other => Err(RuntimeError::TypeError { message: format!("Expected a number, got {}", other.type_name()), loc: None }),
    }
}

fn expect_string(v: &Value) -> Result<Rc<str>, RuntimeError> {
    match v {
        Value::String(s) => Ok(Rc::clone(s)),
        other => Err(RuntimeError::TypeError { message: format!("Expected a string, got {}", other.type_name()), loc: None }),
    }
}

// ---- Get/Set/Index dispatch (§4.3) ----

fn get_property(obj: &Value, name: &str) -> Result<Value, RuntimeError> {
    match obj {
        Value::Instance(inst) => {
            if let Some(field) = inst.get_field(name) {
                return Ok(field);
            }
            if let Some(method) = inst.class.find_method(name) {
                return Ok(Value::Function(method.bind(Rc::clone(inst))));
            }
            Err(RuntimeError::UndefinedProperty { name: name.to_string(), loc: None })
        }
        // A plain Object returns the property name itself when the key is
        // absent rather than erroring — a documented quirk of the source
        // engine relied on by callers (§4.3, §9).
        Value::Object(o) => Ok(o.borrow().get(name).cloned().unwrap_or_else(|| Value::String(Rc::from(name)))),
        Value::String(s) => string_property(Rc::clone(s), name),
        Value::Number(n) => number_property(*n, name),
        _ => Err(RuntimeError::TypeError { message: format!("Cannot read property '{name}' of {}", obj.type_name()), loc: None }),
    }
}

fn set_property(obj: &Value, name: &str, value: Value) -> Result<(), RuntimeError> {
    match obj {
        Value::Instance(inst) => {
            inst.set_field(Rc::from(name), value);
            Ok(())
        }
        Value::Object(o) => {
            o.borrow_mut().insert(Rc::from(name), value);
            Ok(())
        }
        _ => Err(RuntimeError::TypeError { message: format!("Cannot set property '{name}' on {}", obj.type_name()), loc: None }),
    }
}

fn index_get(obj: &Value, index: &Value) -> Result<Value, RuntimeError> {
    match obj {
        Value::Array(a) => {
            let arr = a.borrow();
            array_index(index, arr.len()).map(|i| arr[i].clone()).ok_or(RuntimeError::ArrayIndexOutOfBounds { loc: None })
        }
        Value::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            array_index(index, chars.len())
                .map(|i| Value::String(Rc::from(chars[i].to_string())))
                .ok_or(RuntimeError::StringIndexOutOfBounds { loc: None })
        }
        Value::Object(o) => {
            let key = coerce_key(index);
            o.borrow()
                .get(&*key)
                .cloned()
                .ok_or_else(|| RuntimeError::ObjectPropertyNotFound { key: key.to_string(), loc: None })
        }
        _ => Err(RuntimeError::TypeError { message: format!("Cannot index into {}", obj.type_name()), loc: None }),
    }
}

fn index_set(obj: &Value, index: &Value, value: Value) -> Result<(), RuntimeError> {
    match obj {
        Value::Array(a) => {
            let Value::Number(n) = index else {
                return Err(RuntimeError::TypeError { message: "Array index must be a number".to_string(), loc: None });
            };
            if n.fract() != 0.0 || *n < 0.0 {
                return Err(RuntimeError::ArrayIndexOutOfBounds { loc: None });
            }
            let idx = *n as usize;
            let mut arr = a.borrow_mut();
            if idx >= arr.len() {
                arr.resize(idx, Value::Null);
                arr.push(value);
            } else {
                arr[idx] = value;
            }
            Ok(())
        }
        Value::Object(o) => {
            o.borrow_mut().insert(coerce_key(index), value);
            Ok(())
        }
        _ => Err(RuntimeError::TypeError { message: format!("Cannot index-assign on {}", obj.type_name()), loc: None }),
    }
}

/// Resolves an `Index`/`IndexAssign` subscript to a usable array position:
/// a non-negative integer strictly less than `len`.
fn array_index(index: &Value, len: usize) -> Option<usize> {
    match index {
        Value::Number(n) if n.fract() == 0.0 && *n >= 0.0 && (*n as usize) < len => Some(*n as usize),
        _ => None,
    }
}

/// Coerces an `Object` subscript to a string key (§4.3: "`i` is coerced to a
/// string key").
fn coerce_key(index: &Value) -> Rc<str> {
    match index {
        Value::String(s) => Rc::clone(s),
        other => Rc::from(other.stringify()),
    }
}

fn string_property(s: Rc<str>, name: &str) -> Result<Value, RuntimeError> {
    match name {
        "length" => Ok(Value::Number(s.chars().count() as f64)),
        "includes" => Ok(native_fn("includes", Some(1), move |_, args| {
            let needle = expect_string(&args[0])?;
            Ok(Value::Boolean(s.contains(&*needle)))
        })),
        "split" => Ok(native_fn("split", Some(1), move |_, args| {
            let sep = expect_string(&args[0])?;
            let parts: Vec<Value> = if sep.is_empty() {
                s.chars().map(|c| Value::String(Rc::from(c.to_string()))).collect()
            } else {
                s.split(&*sep).map(|part| Value::String(Rc::from(part))).collect()
            };
            Ok(Value::new_array(parts))
        })),
        "slice" => Ok(native_fn("slice", None, move |_, args| {
            let chars: Vec<char> = s.chars().collect();
            let len = chars.len() as i64;
            let start = args.first().map(expect_number).transpose()?.map_or(0, |n| n as i64).clamp(0, len);
            let end = args.get(1).map(expect_number).transpose()?.map_or(len, |n| n as i64).clamp(0, len);
            let text: String = if start < end { chars[start as usize..end as usize].iter().collect() } else { String::new() };
            Ok(Value::String(Rc::from(text)))
        })),
        _ => Err(RuntimeError::UndefinedProperty { name: name.to_string(), loc: None }),
    }
}

fn number_property(n: f64, name: &str) -> Result<Value, RuntimeError> {
    match name {
        "toFixed" => Ok(native_fn("toFixed", Some(1), move |_, args| {
            let digits = expect_number(&args[0])?.max(0.0) as usize;
            Ok(Value::String(Rc::from(format!("{n:.digits$}"))))
        })),
        _ => Err(RuntimeError::UndefinedProperty { name: name.to_string(), loc: None }),
    }
}

type NativeFn = Box<dyn Fn(&mut Evaluator, Vec<Value>) -> Result<Value, RuntimeError>>;

fn native_fn(name: &'static str, arity: Option<usize>, func: impl Fn(&mut Evaluator, Vec<Value>) -> Result<Value, RuntimeError> + 'static) -> Value {
    Value::Native(Rc::new(NativeFunction { name, arity, func: Box::new(func) }))
}

// ---- built-ins (§4.5) ----

fn native_print(eval: &mut Evaluator, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let line = args.iter().map(Value::stringify).collect::<Vec<_>>().join(" ");
    eval.print.print_line(&line);
    Ok(Value::Null)
}

fn native_len(_eval: &mut Evaluator, args: Vec<Value>) -> Result<Value, RuntimeError> {
    match &args[0] {
        Value::String(s) => Ok(Value::Number(s.chars().count() as f64)),
        Value::Array(a) => Ok(Value::Number(a.borrow().len() as f64)),
        Value::Object(o) => Ok(Value::Number(o.borrow().len() as f64)),
        other => Err(RuntimeError::TypeError { message: format!("len() requires a string, array, or object, got {}", other.type_name()), loc: None }),
    }
}

fn native_clock(_eval: &mut Evaluator, _args: Vec<Value>) -> Result<Value, RuntimeError> {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    Ok(Value::Number(now.as_secs_f64()))
}

fn native_require(eval: &mut Evaluator, args: Vec<Value>) -> Result<Value, RuntimeError> {
    let path = expect_string(&args[0])?;
    eval.require(&path)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::io::{NoPrint, PrintWriter};
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::tracer::NoopTracer;

    /// A `PrintWriter` that hands its lines back to the test via a shared
    /// buffer, since `Evaluator` only exposes its sink through the trait
    /// object (there is no `print.lines()` accessor to call from outside).
    #[derive(Clone, Default)]
    struct SharedCollectPrint(Rc<RefCell<Vec<String>>>);

    impl PrintWriter for SharedCollectPrint {
        fn print_line(&mut self, line: &str) {
            self.0.borrow_mut().push(line.to_string());
        }
    }

    fn run_collecting(source: &str) -> Vec<String> {
        let store = Rc::new(ModuleStore::new());
        let sink = SharedCollectPrint::default();
        let mut eval = Evaluator::new(store, Box::new(sink.clone()), Box::new(NoopTracer));
        let tokens = Lexer::new(source).scan_tokens().unwrap();
        let stmts = Parser::new(tokens).parse().unwrap();
        eval.interpret(&stmts).unwrap();
        sink.0.borrow().clone()
    }

    fn new_eval() -> Evaluator {
        Evaluator::new(Rc::new(ModuleStore::new()), Box::new(NoPrint), Box::new(NoopTracer))
    }

    #[test]
    fn arithmetic_and_print() {
        let lines = run_collecting("let x = 10; const PI = 3.14159; let r = (5+3)*2/(1+1); print(\"Result:\", r);");
        assert_eq!(lines, vec!["Result: 8"]);
    }

    #[test]
    fn recursive_fibonacci() {
        let lines = run_collecting("function fib(n){ if (n <= 1) return n; return fib(n-1)+fib(n-2);} print(fib(10));");
        assert_eq!(lines, vec!["55"]);
    }

    #[test]
    fn classes_inheritance_and_super() {
        let src = r#"
            class A { function init(n){this.n=n;} function s(){print(this.n+" a");}}
            class B extends A {
                function init(n,b){super.init(n); this.b=b;}
                function s(){print(this.n+" b");}
                function d(){print(this.n+" is "+this.b);}
            }
            let x = new B("Rex","GS"); x.s(); x.d();
        "#;
        let lines = run_collecting(src);
        assert_eq!(lines, vec!["Rex b", "Rex is GS"]);
    }

    #[test]
    fn array_grows_on_out_of_bounds_write() {
        let lines = run_collecting("let arr = []; for (let i=0;i<5;i=i+1) arr[i]=i*i; print(arr);");
        assert_eq!(lines, vec!["[0, 1, 4, 9, 16]"]);
    }

    #[test]
    fn undefined_variable_errors() {
        let mut eval = new_eval();
        let tokens = Lexer::new("print(x);").scan_tokens().unwrap();
        let stmts = Parser::new(tokens).parse().unwrap();
        let err = eval.interpret(&stmts).unwrap_err();
        assert!(err.to_string().contains("Undefined variable 'x'"));
    }

    #[test]
    fn const_reassignment_errors() {
        let mut eval = new_eval();
        let tokens = Lexer::new("const x = 10; x = 20;").scan_tokens().unwrap();
        let stmts = Parser::new(tokens).parse().unwrap();
        let err = eval.interpret(&stmts).unwrap_err();
        assert!(err.to_string().contains("Cannot reassign const variable 'x'"));
    }

    #[test]
    fn division_by_zero_errors() {
        let mut eval = new_eval();
        let tokens = Lexer::new("let x=10; let y=0; let z=x/y;").scan_tokens().unwrap();
        let stmts = Parser::new(tokens).parse().unwrap();
        let err = eval.interpret(&stmts).unwrap_err();
        assert!(err.to_string().contains("Division by zero"));
    }

    #[test]
    fn array_index_out_of_bounds_errors() {
        let mut eval = new_eval();
        let tokens = Lexer::new("let a=[1,2,3]; print(a[10]);").scan_tokens().unwrap();
        let stmts = Parser::new(tokens).parse().unwrap();
        let err = eval.interpret(&stmts).unwrap_err();
        assert!(err.to_string().contains("Array index out of bounds"));
    }

    #[test]
    fn calling_non_function_errors() {
        let mut eval = new_eval();
        let tokens = Lexer::new("let x = 10; x();").scan_tokens().unwrap();
        let stmts = Parser::new(tokens).parse().unwrap();
        let err = eval.interpret(&stmts).unwrap_err();
        assert!(err.to_string().contains("Can only call functions and classes"));
    }

    #[test]
    fn object_property_miss_returns_key_name() {
        let lines = run_collecting(r#"let o = {}; print(o.age);"#);
        assert_eq!(lines, vec!["age"]);
    }
}
