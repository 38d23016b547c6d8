use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::mem;
use std::rc::Rc;
use std::slice;
use std::time::Instant;

use crate::script::ast::*;
use crate::script::parser::parse_program;
use crate::script::value::*;
use crate::script::{Limits, ScriptError};

type EvalResult = Result<Value, ScriptError>;

// Native stack frames the evaluator may nest, across calls, `eval` and nested expressions. Sized to fit the
// resolver's script thread stack.
const MAX_FRAMES: usize = 4096;

// Accounting sizes. Containers are charged enough that the number of live ones stays small enough to drop
// without exhausting the stack.
const ELEMENT_COST: usize = 2 * mem::size_of::<Value>();
const CONTAINER_COST: usize = 4096;

#[derive(Clone)]
pub struct Scope(Rc<RefCell<Frame>>);

struct Frame {
    vars: HashMap<String, Value>,
    parent: Option<Scope>,
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Scope({} vars)", self.0.borrow().vars.len())
    }
}

impl Scope {
    fn new(parent: Option<Scope>) -> Scope {
        Scope(Rc::new(RefCell::new(Frame { vars: HashMap::new(), parent })))
    }

    fn declare(&self, name: &str, value: Value) {
        self.0.borrow_mut().vars.insert(name.to_string(), value);
    }

    fn declare_undefined(&self, name: &str) {
        self.0.borrow_mut().vars.entry(name.to_string()).or_insert(Value::Undefined);
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        let mut current = Some(self.clone());
        while let Some(scope) = current {
            let frame = scope.0.borrow();
            if let Some(value) = frame.vars.get(name) {
                return Some(value.clone());
            }
            current = frame.parent.clone();
        }
        None
    }

    fn assign(&self, name: &str, value: Value) -> bool {
        let mut current = Some(self.clone());
        while let Some(scope) = current {
            let mut frame = scope.0.borrow_mut();
            if let Some(slot) = frame.vars.get_mut(name) {
                *slot = value;
                return true;
            }
            current = frame.parent.clone();
        }
        false
    }
}

enum Completion {
    Normal,
    Break,
    Continue,
    Return(Value),
}

enum TimerJob {
    Code(String),
    Call(Value, Vec<Value>),
}

struct Timer {
    due: f64,
    seq: u64,
    job: TimerJob,
}

/// Running total of what a script has allocated, checked against the run's memory budget.
struct Heap {
    used: usize,
    limit: usize,
    max_string_len: usize,
}

impl Heap {
    fn charge(&mut self, bytes: usize) -> Result<(), ScriptError> {
        self.used = self.used.saturating_add(bytes);
        if self.used > self.limit {
            return Err(ScriptError::MemoryLimit(self.limit));
        }
        Ok(())
    }

    fn charge_string(&mut self, len: usize) -> Result<(), ScriptError> {
        if len > self.max_string_len {
            return Err(ScriptError::MemoryLimit(self.max_string_len));
        }
        self.charge(len)
    }

    fn charge_elements(&mut self, count: usize) -> Result<(), ScriptError> {
        self.charge(count.saturating_mul(ELEMENT_COST))
    }

    /// Accounts for a freshly built value before the script can hold on to it.
    fn admit(&mut self, value: Value) -> EvalResult {
        if let Value::Str(s) = &value {
            self.charge_string(s.len())?;
        }
        Ok(value)
    }
}

/// An isolated global environment plus the bookkeeping that bounds a run.
pub struct Sandbox {
    global: Scope,
    limits: Limits,
    deadline: Option<Instant>,
    steps: u64,
    depth: usize,
    frames: usize,
    heap: Heap,
    clock: f64,
    timer_seq: u64,
    timers: Vec<Timer>,
}

impl Sandbox {
    pub fn new(limits: Limits) -> Sandbox {
        let global = Scope::new(None);
        install_globals(&global);
        let heap = Heap { used: 0, limit: limits.max_heap_bytes, max_string_len: limits.max_string_len };
        Sandbox {
            global,
            limits,
            deadline: None,
            steps: 0,
            depth: 0,
            frames: 0,
            heap,
            clock: 0.0,
            timer_seq: 0,
            timers: Vec::new(),
        }
    }

    /// Runs `source` as a top-level program, then fires any queued `setTimeout` jobs in due order.
    pub fn run(&mut self, source: &str) -> Result<(), ScriptError> {
        self.deadline = Some(Instant::now() + self.limits.timeout);
        self.steps = 0;
        let program = parse_program(source)?;
        let global = self.global.clone();
        self.exec_program(&program, &global)?;
        self.drain_timers()
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.global.lookup(name)
    }

    fn tick(&mut self) -> Result<(), ScriptError> {
        self.steps += 1;
        if self.steps > self.limits.max_steps {
            return Err(ScriptError::StepLimit(self.limits.max_steps));
        }
        if self.steps % 1024 == 0 {
            if let Some(deadline) = self.deadline {
                if Instant::now() > deadline {
                    return Err(ScriptError::Timeout(self.limits.timeout));
                }
            }
        }
        Ok(())
    }

    /// Runs `f` one call level deeper, failing once the call depth ceiling is reached.
    fn deeper<T>(&mut self, f: impl FnOnce(&mut Sandbox) -> Result<T, ScriptError>) -> Result<T, ScriptError> {
        if self.depth >= self.limits.max_depth {
            return Err(ScriptError::DepthLimit(self.limits.max_depth));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn enter_frame(&mut self) -> Result<(), ScriptError> {
        if self.frames >= MAX_FRAMES {
            return Err(ScriptError::NestingLimit(MAX_FRAMES));
        }
        self.frames += 1;
        Ok(())
    }

    fn eval_code(&mut self, code: &str, scope: &Scope) -> EvalResult {
        let program = parse_program(code)?;
        self.deeper(|sandbox| sandbox.exec_program(&program, scope))
    }

    fn drain_timers(&mut self) -> Result<(), ScriptError> {
        while let Some(index) = self.next_timer() {
            self.tick()?;
            let timer = self.timers.remove(index);
            self.clock = self.clock.max(timer.due);
            let global = self.global.clone();
            match timer.job {
                TimerJob::Code(code) => {
                    self.eval_code(&code, &global)?;
                }
                TimerJob::Call(callee, args) => {
                    self.call_value(&callee, args, &global, false)?;
                }
            }
        }
        Ok(())
    }

    fn next_timer(&self) -> Option<usize> {
        self.timers
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.due.partial_cmp(&b.due).unwrap_or(Ordering::Equal).then(a.seq.cmp(&b.seq)))
            .map(|(index, _)| index)
    }

    /// Executes a program body, returning the value of the last expression statement like `eval` does.
    fn exec_program(&mut self, body: &[Stmt], scope: &Scope) -> EvalResult {
        let functions = hoist(body, scope);
        self.heap.charge(functions.saturating_mul(CONTAINER_COST))?;
        let mut last = Value::Undefined;
        for stmt in body {
            if let Stmt::Expr(expr) = stmt {
                self.tick()?;
                last = self.eval_expr(expr, scope)?;
                continue;
            }
            match self.exec_stmt(stmt, scope)? {
                Completion::Normal => {}
                _ => {
                    return Err(ScriptError::Syntax {
                        pos: 0,
                        message: "Illegal break, continue or return at top level".to_string(),
                    })
                }
            }
        }
        Ok(last)
    }

    fn exec_block(&mut self, body: &[Stmt], scope: &Scope) -> Result<Completion, ScriptError> {
        for stmt in body {
            match self.exec_stmt(stmt, scope)? {
                Completion::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, scope: &Scope) -> Result<Completion, ScriptError> {
        self.enter_frame()?;
        let completion = self.exec_stmt_inner(stmt, scope);
        self.frames -= 1;
        completion
    }

    fn exec_stmt_inner(&mut self, stmt: &Stmt, scope: &Scope) -> Result<Completion, ScriptError> {
        self.tick()?;
        match stmt {
            Stmt::Var(declarations) => {
                for (name, init) in declarations {
                    if let Some(init) = init {
                        let value = self.eval_expr(init, scope)?;
                        scope.declare(name, value);
                    }
                }
                Ok(Completion::Normal)
            }
            Stmt::Function(_) | Stmt::Empty => Ok(Completion::Normal),
            Stmt::Expr(expr) => {
                self.eval_expr(expr, scope)?;
                Ok(Completion::Normal)
            }
            Stmt::Block(body) => self.exec_block(body, scope),
            Stmt::If(test, consequent, alternate) => {
                if self.eval_expr(test, scope)?.truthy() {
                    self.exec_stmt(consequent, scope)
                } else if let Some(alternate) = alternate {
                    self.exec_stmt(alternate, scope)
                } else {
                    Ok(Completion::Normal)
                }
            }
            Stmt::While(test, body) => {
                while self.eval_expr(test, scope)?.truthy() {
                    match self.exec_stmt(body, scope)? {
                        Completion::Break => break,
                        Completion::Return(value) => return Ok(Completion::Return(value)),
                        Completion::Normal | Completion::Continue => {}
                    }
                }
                Ok(Completion::Normal)
            }
            Stmt::DoWhile(body, test) => {
                loop {
                    match self.exec_stmt(body, scope)? {
                        Completion::Break => break,
                        Completion::Return(value) => return Ok(Completion::Return(value)),
                        Completion::Normal | Completion::Continue => {}
                    }
                    if !self.eval_expr(test, scope)?.truthy() {
                        break;
                    }
                }
                Ok(Completion::Normal)
            }
            Stmt::For { init, test, update, body } => {
                if let Some(init) = init {
                    self.exec_stmt(init, scope)?;
                }
                loop {
                    if let Some(test) = test {
                        if !self.eval_expr(test, scope)?.truthy() {
                            break;
                        }
                    }
                    match self.exec_stmt(body, scope)? {
                        Completion::Break => break,
                        Completion::Return(value) => return Ok(Completion::Return(value)),
                        Completion::Normal | Completion::Continue => {}
                    }
                    if let Some(update) = update {
                        self.eval_expr(update, scope)?;
                    } else {
                        self.tick()?;
                    }
                }
                Ok(Completion::Normal)
            }
            Stmt::Break => Ok(Completion::Break),
            Stmt::Continue => Ok(Completion::Continue),
            Stmt::Return(argument) => {
                let value = match argument {
                    Some(argument) => self.eval_expr(argument, scope)?,
                    None => Value::Undefined,
                };
                Ok(Completion::Return(value))
            }
        }
    }

    fn eval_expr(&mut self, expr: &Expr, scope: &Scope) -> EvalResult {
        self.enter_frame()?;
        let value = self.eval_expr_inner(expr, scope);
        self.frames -= 1;
        value
    }

    fn eval_expr_inner(&mut self, expr: &Expr, scope: &Scope) -> EvalResult {
        self.tick()?;
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::This => Ok(Value::Undefined),
            Expr::Ident(name) => scope.lookup(name).ok_or_else(|| ScriptError::Reference(name.clone())),
            Expr::Array(elements) => {
                let items = elements.iter().map(|e| self.eval_expr(e, scope)).collect::<Result<Vec<_>, _>>()?;
                self.heap.charge(CONTAINER_COST)?;
                self.heap.charge_elements(items.len())?;
                Ok(Value::array(items))
            }
            Expr::Object(properties) => {
                let mut map = HashMap::new();
                for (key, value) in properties {
                    let value = self.eval_expr(value, scope)?;
                    map.insert(key.clone(), value);
                }
                self.heap.charge(CONTAINER_COST)?;
                self.heap.charge_elements(map.len())?;
                Ok(Value::object(map))
            }
            Expr::Function(def) => {
                self.heap.charge(CONTAINER_COST)?;
                Ok(closure(def, scope))
            }
            Expr::Unary(UnaryOp::Typeof, operand) => {
                if let Expr::Ident(name) = operand.as_ref() {
                    if scope.lookup(name).is_none() {
                        return Ok(Value::string("undefined"));
                    }
                }
                Ok(Value::string(self.eval_expr(operand, scope)?.type_name()))
            }
            Expr::Unary(op, operand) => {
                let value = self.eval_expr(operand, scope)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!value.truthy()),
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                    UnaryOp::BitNot => Value::Number(f64::from(!value.to_int32())),
                    UnaryOp::Void | UnaryOp::Typeof => Value::Undefined,
                })
            }
            Expr::Update { delta, prefix, target } => {
                let old = self.read_target(target, scope)?.to_number();
                let new = old + delta;
                self.write_target(target, scope, Value::Number(new))?;
                Ok(Value::Number(if *prefix { new } else { old }))
            }
            Expr::Binary(op, left, right) => {
                let left = self.eval_expr(left, scope)?;
                let right = self.eval_expr(right, scope)?;
                self.heap.admit(binary_op(*op, &left, &right))
            }
            Expr::Logical(op, left, right) => {
                let left = self.eval_expr(left, scope)?;
                match (op, left.truthy()) {
                    (LogicalOp::And, true) | (LogicalOp::Or, false) => self.eval_expr(right, scope),
                    _ => Ok(left),
                }
            }
            Expr::Assign(op, target, value) => self.assign(*op, target, value, scope),
            Expr::Conditional(test, consequent, alternate) => {
                if self.eval_expr(test, scope)?.truthy() {
                    self.eval_expr(consequent, scope)
                } else {
                    self.eval_expr(alternate, scope)
                }
            }
            Expr::Call(callee, args) => self.call(callee, args, scope),
            Expr::Member(object, key) => {
                let object = self.eval_expr(object, scope)?;
                let key = self.eval_expr(key, scope)?;
                let value = get_member(&object, &key)?;
                match object {
                    Value::Str(_) => self.heap.admit(value),
                    _ => Ok(value),
                }
            }
            Expr::Sequence(exprs) => {
                let mut last = Value::Undefined;
                for expr in exprs {
                    last = self.eval_expr(expr, scope)?;
                }
                Ok(last)
            }
        }
    }

    fn read_target(&mut self, target: &Expr, scope: &Scope) -> EvalResult {
        match target {
            Expr::Ident(name) => scope.lookup(name).ok_or_else(|| ScriptError::Reference(name.clone())),
            other => self.eval_expr(other, scope),
        }
    }

    fn write_target(&mut self, target: &Expr, scope: &Scope, value: Value) -> Result<(), ScriptError> {
        match target {
            Expr::Ident(name) => {
                self.assign_ident(name, scope, value);
                Ok(())
            }
            Expr::Member(object, key) => {
                let object = self.eval_expr(object, scope)?;
                let key = self.eval_expr(key, scope)?;
                set_member(&object, &key, value, &mut self.heap)
            }
            _ => Err(ScriptError::Type("Invalid assignment target".to_string())),
        }
    }

    fn assign_ident(&mut self, name: &str, scope: &Scope, value: Value) {
        // Sloppy mode: assigning an undeclared name creates a global.
        if !scope.assign(name, value.clone()) {
            self.global.declare(name, value);
        }
    }

    fn assign(&mut self, op: Option<BinaryOp>, target: &Expr, value: &Expr, scope: &Scope) -> EvalResult {
        match target {
            Expr::Ident(name) => {
                let new = match op {
                    Some(op) => {
                        let old = scope.lookup(name).ok_or_else(|| ScriptError::Reference(name.clone()))?;
                        let rhs = self.eval_expr(value, scope)?;
                        self.heap.admit(binary_op(op, &old, &rhs))?
                    }
                    None => self.eval_expr(value, scope)?,
                };
                self.assign_ident(name, scope, new.clone());
                Ok(new)
            }
            Expr::Member(object, key) => {
                let object = self.eval_expr(object, scope)?;
                let key = self.eval_expr(key, scope)?;
                let new = match op {
                    Some(op) => {
                        let old = get_member(&object, &key)?;
                        let rhs = self.eval_expr(value, scope)?;
                        self.heap.admit(binary_op(op, &old, &rhs))?
                    }
                    None => self.eval_expr(value, scope)?,
                };
                set_member(&object, &key, new.clone(), &mut self.heap)?;
                Ok(new)
            }
            _ => Err(ScriptError::Type("Invalid assignment target".to_string())),
        }
    }

    fn eval_args(&mut self, args: &[Expr], scope: &Scope) -> Result<Vec<Value>, ScriptError> {
        args.iter().map(|arg| self.eval_expr(arg, scope)).collect()
    }

    fn call(&mut self, callee: &Expr, args: &[Expr], scope: &Scope) -> EvalResult {
        if let Expr::Member(object, key) = callee {
            let object = self.eval_expr(object, scope)?;
            let key = self.eval_expr(key, scope)?;
            let args = self.eval_args(args, scope)?;
            return match &object {
                Value::Object(_) => {
                    let function = get_member(&object, &key)?;
                    self.call_value(&function, args, scope, false)
                }
                _ => {
                    let value = call_method(&object, &key.to_js_string(), args, &mut self.heap)?;
                    self.heap.admit(value)
                }
            };
        }
        let direct_eval = matches!(callee, Expr::Ident(name) if name == "eval");
        let function = self.eval_expr(callee, scope)?;
        let args = self.eval_args(args, scope)?;
        self.call_value(&function, args, scope, direct_eval)
    }

    fn call_value(&mut self, callee: &Value, args: Vec<Value>, scope: &Scope, direct_eval: bool) -> EvalResult {
        match callee {
            Value::Function(closure) => self.call_closure(closure.clone(), args),
            Value::Native(native) => {
                let eval_scope = if direct_eval { scope.clone() } else { self.global.clone() };
                self.call_native(*native, args, &eval_scope)
            }
            other => Err(ScriptError::Type(format!("{} is not a function", other.to_js_string()))),
        }
    }

    fn call_closure(&mut self, closure: Rc<Closure>, args: Vec<Value>) -> EvalResult {
        let scope = Scope::new(Some(closure.scope.clone()));
        scope.declare("arguments", Value::array(args.clone()));
        for (index, param) in closure.def.params.iter().enumerate() {
            scope.declare(param, args.get(index).cloned().unwrap_or(Value::Undefined));
        }
        let functions = hoist(&closure.def.body, &scope);
        self.heap.charge(functions.saturating_mul(CONTAINER_COST))?;
        let result = self.deeper(|sandbox| sandbox.exec_block(&closure.def.body, &scope))?;
        match result {
            Completion::Return(value) => Ok(value),
            _ => Ok(Value::Undefined),
        }
    }

    fn call_native(&mut self, native: Native, args: Vec<Value>, eval_scope: &Scope) -> EvalResult {
        let first = arg(&args, 0);
        let value = match native {
            Native::Eval => match first {
                Value::Str(code) => return self.eval_code(&code, eval_scope),
                other => other,
            },
            Native::SetTimeout => {
                let delay = arg(&args, 1).to_number();
                let delay = if delay.is_nan() { 0.0 } else { delay.max(0.0) };
                let job = match first {
                    callee @ (Value::Function(_) | Value::Native(_)) => {
                        TimerJob::Call(callee, args.into_iter().skip(2).collect())
                    }
                    code => {
                        let code = code.to_js_string();
                        self.heap.charge_string(code.len())?;
                        TimerJob::Code(code)
                    }
                };
                self.heap.charge_elements(2)?;
                self.timer_seq += 1;
                self.timers.push(Timer { due: self.clock + delay, seq: self.timer_seq, job });
                Value::Number(self.timer_seq as f64)
            }
            Native::ParseInt => Value::Number(parse_int(&first.to_js_string(), arg(&args, 1))),
            Native::ParseFloat => Value::Number(parse_float(&first.to_js_string())),
            Native::IsNaN => Value::Bool(first.to_number().is_nan()),
            Native::Escape => Value::string(escape(&first.to_js_string())),
            Native::Unescape => Value::string(unescape(&first.to_js_string())),
            Native::FromCharCode => {
                let units: Vec<u16> = args.iter().map(|a| a.to_uint32() as u16).collect();
                Value::string(String::from_utf16_lossy(&units))
            }
            Native::MathFloor => Value::Number(first.to_number().floor()),
            Native::MathCeil => Value::Number(first.to_number().ceil()),
            Native::MathRound => Value::Number((first.to_number() + 0.5).floor()),
            Native::MathAbs => Value::Number(first.to_number().abs()),
            Native::MathMax => Value::Number(fold_numbers(&args, f64::NEG_INFINITY, f64::max)),
            Native::MathMin => Value::Number(fold_numbers(&args, f64::INFINITY, f64::min)),
            Native::MathPow => Value::Number(first.to_number().powf(arg(&args, 1).to_number())),
        };
        self.heap.admit(value)
    }
}

fn install_globals(global: &Scope) {
    let natives = [
        ("eval", Native::Eval),
        ("setTimeout", Native::SetTimeout),
        ("parseInt", Native::ParseInt),
        ("parseFloat", Native::ParseFloat),
        ("isNaN", Native::IsNaN),
        ("escape", Native::Escape),
        ("unescape", Native::Unescape),
    ];
    for (name, native) in natives {
        global.declare(name, Value::Native(native));
    }
    global.declare("undefined", Value::Undefined);
    global.declare("NaN", Value::Number(f64::NAN));
    global.declare("Infinity", Value::Number(f64::INFINITY));
    let string = HashMap::from([("fromCharCode".to_string(), Value::Native(Native::FromCharCode))]);
    global.declare("String", Value::object(string));
    let math = HashMap::from([
        ("floor".to_string(), Value::Native(Native::MathFloor)),
        ("ceil".to_string(), Value::Native(Native::MathCeil)),
        ("round".to_string(), Value::Native(Native::MathRound)),
        ("abs".to_string(), Value::Native(Native::MathAbs)),
        ("max".to_string(), Value::Native(Native::MathMax)),
        ("min".to_string(), Value::Native(Native::MathMin)),
        ("pow".to_string(), Value::Native(Native::MathPow)),
        ("PI".to_string(), Value::Number(std::f64::consts::PI)),
    ]);
    global.declare("Math", Value::object(math));
}

fn closure(def: &Rc<FunctionDef>, scope: &Scope) -> Value {
    Value::Function(Rc::new(Closure { def: def.clone(), scope: scope.clone() }))
}

/// Declares `var` names and function declarations ahead of execution, without entering nested functions.
/// Returns how many closures were created.
fn hoist(body: &[Stmt], scope: &Scope) -> usize {
    let mut functions = 0;
    for stmt in body {
        match stmt {
            Stmt::Var(declarations) => {
                for (name, _) in declarations {
                    scope.declare_undefined(name);
                }
            }
            Stmt::Function(def) => {
                if let Some(name) = &def.name {
                    scope.declare(name, closure(def, scope));
                    functions += 1;
                }
            }
            Stmt::Block(body) => functions += hoist(body, scope),
            Stmt::If(_, consequent, alternate) => {
                functions += hoist(slice::from_ref(consequent.as_ref()), scope);
                if let Some(alternate) = alternate {
                    functions += hoist(slice::from_ref(alternate.as_ref()), scope);
                }
            }
            Stmt::While(_, body) | Stmt::DoWhile(body, _) => functions += hoist(slice::from_ref(body.as_ref()), scope),
            Stmt::For { init, body, .. } => {
                if let Some(init) = init {
                    functions += hoist(slice::from_ref(init.as_ref()), scope);
                }
                functions += hoist(slice::from_ref(body.as_ref()), scope);
            }
            _ => {}
        }
    }
    functions
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Undefined)
}

fn fold_numbers(args: &[Value], init: f64, f: fn(f64, f64) -> f64) -> f64 {
    args.iter().map(Value::to_number).fold(init, |acc, n| if acc.is_nan() || n.is_nan() { f64::NAN } else { f(acc, n) })
}

fn binary_op(op: BinaryOp, left: &Value, right: &Value) -> Value {
    let shift = || right.to_uint32() & 31;
    match op {
        BinaryOp::Add => {
            let (left, right) = (left.to_primitive(), right.to_primitive());
            if matches!(left, Value::Str(_)) || matches!(right, Value::Str(_)) {
                Value::string(left.to_js_string() + &right.to_js_string())
            } else {
                Value::Number(left.to_number() + right.to_number())
            }
        }
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Mod => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Shl => Value::Number(f64::from(left.to_int32().wrapping_shl(shift()))),
        BinaryOp::Shr => Value::Number(f64::from(left.to_int32() >> shift())),
        BinaryOp::UShr => Value::Number(f64::from(left.to_uint32() >> shift())),
        BinaryOp::BitAnd => Value::Number(f64::from(left.to_int32() & right.to_int32())),
        BinaryOp::BitOr => Value::Number(f64::from(left.to_int32() | right.to_int32())),
        BinaryOp::BitXor => Value::Number(f64::from(left.to_int32() ^ right.to_int32())),
        BinaryOp::Eq => Value::Bool(left.loose_equals(right)),
        BinaryOp::NotEq => Value::Bool(!left.loose_equals(right)),
        BinaryOp::StrictEq => Value::Bool(left.strict_equals(right)),
        BinaryOp::StrictNotEq => Value::Bool(!left.strict_equals(right)),
        BinaryOp::Lt | BinaryOp::Gt | BinaryOp::LtEq | BinaryOp::GtEq => {
            let (left, right) = (left.to_primitive(), right.to_primitive());
            let ordering = match (&left, &right) {
                (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                _ => left.to_number().partial_cmp(&right.to_number()),
            };
            Value::Bool(match (op, ordering) {
                (_, None) => false,
                (BinaryOp::Lt, Some(o)) => o == Ordering::Less,
                (BinaryOp::Gt, Some(o)) => o == Ordering::Greater,
                (BinaryOp::LtEq, Some(o)) => o != Ordering::Greater,
                (_, Some(o)) => o != Ordering::Less,
            })
        }
    }
}

fn array_index(key: &Value) -> Option<usize> {
    match key {
        Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 && n.is_finite() => Some(*n as usize),
        Value::Str(s) => s.parse::<usize>().ok().filter(|n| n.to_string() == **s),
        _ => None,
    }
}

fn utf16(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

fn get_member(object: &Value, key: &Value) -> EvalResult {
    let name = key.to_js_string();
    match object {
        Value::Undefined | Value::Null => {
            Err(ScriptError::Type(format!("Cannot read property {:?} of {}", name, object.to_js_string())))
        }
        Value::Str(s) => {
            let units = utf16(s);
            if name == "length" {
                return Ok(Value::Number(units.len() as f64));
            }
            Ok(match array_index(key).and_then(|i| units.get(i)) {
                Some(unit) => Value::string(String::from_utf16_lossy(slice::from_ref(unit))),
                None => Value::Undefined,
            })
        }
        Value::Array(items) => {
            let items = items.borrow();
            if name == "length" {
                return Ok(Value::Number(items.len() as f64));
            }
            Ok(array_index(key).and_then(|i| items.get(i).cloned()).unwrap_or(Value::Undefined))
        }
        Value::Object(properties) => Ok(properties.borrow().get(&name).cloned().unwrap_or(Value::Undefined)),
        _ => Ok(Value::Undefined),
    }
}

fn set_member(object: &Value, key: &Value, value: Value, heap: &mut Heap) -> Result<(), ScriptError> {
    match object {
        Value::Undefined | Value::Null => Err(ScriptError::Type(format!(
            "Cannot set property {:?} of {}",
            key.to_js_string(),
            object.to_js_string()
        ))),
        Value::Array(items) => {
            let mut items = items.borrow_mut();
            let new_len = if key.to_js_string() == "length" {
                Some(array_index(&value).ok_or_else(|| ScriptError::Type("Invalid array length".to_string()))?)
            } else {
                array_index(key).map(|index| index + 1).filter(|len| *len > items.len())
            };
            if let Some(new_len) = new_len {
                heap.charge_elements(new_len.saturating_sub(items.len()))?;
                items.resize(new_len, Value::Undefined);
            }
            if let Some(index) = array_index(key) {
                items[index] = value;
            }
            Ok(())
        }
        Value::Object(properties) => {
            let name = key.to_js_string();
            let mut properties = properties.borrow_mut();
            if !properties.contains_key(&name) {
                heap.charge_string(name.len())?;
                heap.charge_elements(1)?;
            }
            properties.insert(name, value);
            Ok(())
        }
        _ => Ok(()),
    }
}

fn relative_index(value: Value, len: usize, default: usize) -> usize {
    if matches!(value, Value::Undefined) {
        return default;
    }
    let n = value.to_number();
    let n = if n.is_nan() { 0.0 } else { n.trunc() };
    if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        n.min(len as f64) as usize
    }
}

fn clamped_index(value: Value, len: usize, default: usize) -> usize {
    if matches!(value, Value::Undefined) {
        return default;
    }
    let n = value.to_number();
    if n.is_nan() {
        0
    } else {
        n.trunc().max(0.0).min(len as f64) as usize
    }
}

fn find_units(haystack: &[u16], needle: &[u16], from: usize) -> Option<usize> {
    if needle.is_empty() {
        return Some(from.min(haystack.len()));
    }
    (from..haystack.len()).find(|&i| haystack[i..].starts_with(needle))
}

fn rfind_units(haystack: &[u16], needle: &[u16], from: usize) -> Option<usize> {
    let last_start = haystack.len().checked_sub(needle.len())?.min(from);
    (0..=last_start).rev().find(|&i| haystack[i..].starts_with(needle))
}

fn index_result(index: Option<usize>) -> Value {
    Value::Number(index.map_or(-1.0, |i| i as f64))
}

fn call_method(object: &Value, name: &str, args: Vec<Value>, heap: &mut Heap) -> EvalResult {
    match object {
        Value::Str(s) => string_method(s, name, args, heap),
        Value::Array(items) => array_method(object, items, name, args, heap),
        Value::Number(n) => match name {
            "toString" => {
                let radix = match arg(&args, 0) {
                    Value::Undefined => 10,
                    radix => radix.to_number() as u32,
                };
                if !(2..=36).contains(&radix) {
                    return Err(ScriptError::Type("toString() radix must be between 2 and 36".to_string()));
                }
                Ok(Value::string(number_to_radix_string(*n, radix)))
            }
            "toFixed" => {
                let digits = arg(&args, 0).to_number();
                let digits = if digits.is_nan() { 0 } else { digits.clamp(0.0, 20.0) as usize };
                Ok(Value::string(format!("{:.*}", digits, n)))
            }
            "valueOf" => Ok(object.clone()),
            _ => Err(ScriptError::Type(format!("number.{} is not a function", name))),
        },
        Value::Bool(_) if name == "toString" => Ok(Value::string(object.to_js_string())),
        _ => Err(ScriptError::Type(format!("{}.{} is not a function", object.type_name(), name))),
    }
}

fn string_method(s: &str, name: &str, args: Vec<Value>, heap: &mut Heap) -> EvalResult {
    let units = utf16(s);
    let len = units.len();
    let text = |range: &[u16]| Value::string(String::from_utf16_lossy(range));
    let value = match name {
        "charAt" => {
            let index = arg(&args, 0).to_number();
            let index = if index.is_nan() { 0.0 } else { index.trunc() };
            if index >= 0.0 && (index as usize) < len {
                text(&units[index as usize..index as usize + 1])
            } else {
                Value::string("")
            }
        }
        "charCodeAt" => {
            let index = arg(&args, 0).to_number();
            let index = if index.is_nan() { 0.0 } else { index.trunc() };
            if index >= 0.0 && (index as usize) < len {
                Value::Number(f64::from(units[index as usize]))
            } else {
                Value::Number(f64::NAN)
            }
        }
        "indexOf" => {
            let needle = utf16(&arg(&args, 0).to_js_string());
            index_result(find_units(&units, &needle, clamped_index(arg(&args, 1), len, 0)))
        }
        "lastIndexOf" => {
            let needle = utf16(&arg(&args, 0).to_js_string());
            // A missing or NaN position searches from the end.
            let from = match arg(&args, 1).to_number() {
                n if n.is_nan() => len,
                n => n.trunc().clamp(0.0, len as f64) as usize,
            };
            index_result(rfind_units(&units, &needle, from))
        }
        "substring" => {
            let start = clamped_index(arg(&args, 0), len, 0);
            let end = clamped_index(arg(&args, 1), len, len);
            text(&units[start.min(end)..start.max(end)])
        }
        "substr" => {
            let start = relative_index(arg(&args, 0), len, 0);
            let count = clamped_index(arg(&args, 1), len - start, len - start);
            text(&units[start..start + count])
        }
        "slice" => {
            let start = relative_index(arg(&args, 0), len, 0);
            let end = relative_index(arg(&args, 1), len, len);
            text(&units[start..end.max(start)])
        }
        "split" => match arg(&args, 0) {
            Value::Undefined => {
                heap.charge(CONTAINER_COST)?;
                Value::array(vec![Value::string(s)])
            }
            separator => {
                let separator = separator.to_js_string();
                let count = if separator.is_empty() { len } else { s.matches(separator.as_str()).count() + 1 };
                heap.charge(CONTAINER_COST.saturating_add(s.len()))?;
                heap.charge_elements(count)?;
                let parts: Vec<Value> = if separator.is_empty() {
                    units.iter().map(|unit| text(slice::from_ref(unit))).collect()
                } else {
                    s.split(separator.as_str()).map(|part| Value::string(part)).collect()
                };
                Value::array(parts)
            }
        },
        "toLowerCase" => Value::string(s.to_lowercase()),
        "toUpperCase" => Value::string(s.to_uppercase()),
        "trim" => Value::string(s.trim()),
        "replace" => {
            let pattern = arg(&args, 0).to_js_string();
            let replacement = arg(&args, 1).to_js_string();
            Value::string(s.replacen(pattern.as_str(), &replacement, 1))
        }
        "concat" => {
            let mut joined = s.to_string();
            for arg in &args {
                joined.push_str(&arg.to_js_string());
                heap.charge_string(joined.len())?;
            }
            Value::string(joined)
        }
        "toString" | "valueOf" => Value::string(s),
        _ => return Err(ScriptError::Type(format!("string.{} is not a function", name))),
    };
    Ok(value)
}

fn array_method(
    array: &Value,
    items: &Rc<RefCell<Vec<Value>>>,
    name: &str,
    args: Vec<Value>,
    heap: &mut Heap,
) -> EvalResult {
    let value = match name {
        "push" => {
            heap.charge_elements(args.len())?;
            let mut items = items.borrow_mut();
            items.extend(args);
            Value::Number(items.len() as f64)
        }
        "pop" => items.borrow_mut().pop().unwrap_or(Value::Undefined),
        "shift" => {
            let mut items = items.borrow_mut();
            if items.is_empty() {
                Value::Undefined
            } else {
                items.remove(0)
            }
        }
        "join" => {
            let separator = match arg(&args, 0) {
                Value::Undefined => ",".to_string(),
                separator => separator.to_js_string(),
            };
            Value::string(join_array(items, &separator, heap.max_string_len))
        }
        "reverse" => {
            items.borrow_mut().reverse();
            array.clone()
        }
        "slice" => {
            let items = items.borrow();
            let start = relative_index(arg(&args, 0), items.len(), 0);
            let end = relative_index(arg(&args, 1), items.len(), items.len());
            heap.charge(CONTAINER_COST)?;
            heap.charge_elements(end.saturating_sub(start))?;
            Value::array(items[start..end.max(start)].to_vec())
        }
        "concat" => {
            let added: usize = args
                .iter()
                .map(|arg| match arg {
                    Value::Array(other) => other.borrow().len(),
                    _ => 1,
                })
                .sum();
            heap.charge(CONTAINER_COST)?;
            heap.charge_elements(items.borrow().len().saturating_add(added))?;
            let mut result = items.borrow().clone();
            for arg in args {
                match arg {
                    Value::Array(other) => result.extend(other.borrow().iter().cloned()),
                    other => result.push(other),
                }
            }
            Value::array(result)
        }
        "indexOf" => {
            let needle = arg(&args, 0);
            index_result(items.borrow().iter().position(|item| item.strict_equals(&needle)))
        }
        "toString" => Value::string(join_array(items, ",", heap.max_string_len)),
        _ => return Err(ScriptError::Type(format!("array.{} is not a function", name))),
    };
    Ok(value)
}

fn parse_int(text: &str, radix: Value) -> f64 {
    let text = text.trim_start();
    let (sign, text) = match text.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, text.strip_prefix('+').unwrap_or(text)),
    };
    let mut radix = match radix {
        Value::Undefined => 0,
        radix => radix.to_int32(),
    };
    let mut text = text;
    if (radix == 0 || radix == 16) && (text.starts_with("0x") || text.starts_with("0X")) {
        text = &text[2..];
        radix = 16;
    }
    if radix == 0 {
        radix = 10;
    }
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    let digits: Vec<u32> = text.chars().map_while(|c| c.to_digit(radix as u32)).collect();
    if digits.is_empty() {
        return f64::NAN;
    }
    sign * digits.iter().fold(0.0, |acc, d| acc * f64::from(radix) + f64::from(*d))
}

fn parse_float(text: &str) -> f64 {
    let text = text.trim_start();
    let end = text
        .char_indices()
        .take_while(|(i, c)| c.is_ascii_digit() || *c == '.' || (*i == 0 && (*c == '-' || *c == '+')))
        .map(|(i, c)| i + c.len_utf8())
        .last()
        .unwrap_or(0);
    (1..=end).rev().find_map(|len| text[..len].parse::<f64>().ok()).unwrap_or(f64::NAN)
}

fn escape(text: &str) -> String {
    let mut escaped = String::new();
    for unit in text.encode_utf16() {
        match char::from_u32(u32::from(unit)) {
            Some(c) if c.is_ascii_alphanumeric() || "@*_+-./".contains(c) => escaped.push(c),
            _ if unit < 256 => escaped.push_str(&format!("%{:02X}", unit)),
            _ => escaped.push_str(&format!("%u{:04X}", unit)),
        }
    }
    escaped
}

fn unescape(text: &str) -> String {
    let units = utf16(text);
    let mut result = Vec::with_capacity(units.len());
    let hex = |range: &[u16]| String::from_utf16(range).ok().and_then(|s| u16::from_str_radix(&s, 16).ok());
    let mut i = 0;
    while i < units.len() {
        if units[i] == u16::from(b'%') {
            if units.get(i + 1) == Some(&u16::from(b'u')) && i + 6 <= units.len() {
                if let Some(unit) = hex(&units[i + 2..i + 6]) {
                    result.push(unit);
                    i += 6;
                    continue;
                }
            }
            if i + 3 <= units.len() {
                if let Some(unit) = hex(&units[i + 1..i + 3]) {
                    result.push(unit);
                    i += 3;
                    continue;
                }
            }
        }
        result.push(units[i]);
        i += 1;
    }
    String::from_utf16_lossy(&result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn run(source: &str) -> Result<Sandbox, ScriptError> {
        let mut sandbox = Sandbox::new(Limits::default());
        sandbox.run(source)?;
        Ok(sandbox)
    }

    // Runs on a thread with a stack like the resolver's, for scripts that nest deeply before a limit trips.
    fn run_deep(limits: Limits, source: &'static str) -> Result<(), ScriptError> {
        thread::Builder::new()
            .stack_size(64 << 20)
            .spawn(move || Sandbox::new(limits).run(source))
            .expect("script thread to start")
            .join()
            .expect("script thread not to panic")
    }

    fn global_string(sandbox: &Sandbox, name: &str) -> String {
        sandbox.global(name).expect("global to be defined").to_js_string()
    }

    #[test]
    fn test_byte_arithmetic_matches_js() -> Result<(), ScriptError> {
        let sandbox = run("var a = (-5) & 0xff, b = ((200 >> 3) | ((200 << 5) & 0xff)) - 119, c = -1 >>> 28, d = 7 % -3;")?;
        assert_eq!(global_string(&sandbox, "a"), "251");
        assert_eq!(global_string(&sandbox, "b"), "-94");
        assert_eq!(global_string(&sandbox, "c"), "15");
        assert_eq!(global_string(&sandbox, "d"), "1");
        Ok(())
    }

    #[test]
    fn test_loops_and_string_building() -> Result<(), ScriptError> {
        let sandbox = run(r#"
            var oo = [0x68, 0x69, 0x21], po = "", qo;
            for (qo = 0; qo < oo.length; qo++) po += String.fromCharCode(oo[qo]);
            var n = 3, total = 0;
            do { total += n; } while (--n > 0)
            while (true) { n++; if (n > 4) break; else continue; }
        "#)?;
        assert_eq!(global_string(&sandbox, "po"), "hi!");
        assert_eq!(global_string(&sandbox, "total"), "6");
        assert_eq!(global_string(&sandbox, "n"), "5");
        Ok(())
    }

    #[test]
    fn test_direct_eval_runs_in_calling_scope() -> Result<(), ScriptError> {
        let sandbox = run(r#"
            function f(k) { var qo = "qo = k * 2;"; eval(qo); return qo; }
            var result = f(21);
        "#)?;
        assert_eq!(global_string(&sandbox, "result"), "42");
        assert!(sandbox.global("qo").is_none());
        Ok(())
    }

    #[test]
    fn test_indirect_eval_runs_in_global_scope() -> Result<(), ScriptError> {
        let sandbox = run(r#"function f() { var e = eval; e("leaked = 'yes'"); } f();"#)?;
        assert_eq!(global_string(&sandbox, "leaked"), "yes");
        Ok(())
    }

    #[test]
    fn test_set_timeout_runs_after_program_in_delay_order() -> Result<(), ScriptError> {
        let sandbox = run(r#"
            var log = "";
            setTimeout("log += 'b'", 200);
            setTimeout(function () { log += 'a'; }, 10);
            log += "start";
        "#)?;
        assert_eq!(global_string(&sandbox, "log"), "startab");
        Ok(())
    }

    #[test]
    fn test_hoisted_function_called_before_declaration() -> Result<(), ScriptError> {
        let sandbox = run("var x = twice(4); function twice(n) { return n + n; }")?;
        assert_eq!(global_string(&sandbox, "x"), "8");
        Ok(())
    }

    #[test]
    fn test_string_and_array_methods() -> Result<(), ScriptError> {
        let sandbox = run(r#"
            var s = "location=\"/a/b\"";
            var a = s.substring(s.indexOf('/'), s.lastIndexOf('"'));
            var b = "abc".split("").reverse().join("");
            var c = "x-y-z".split("-").length + s.charCodeAt(0);
            var d = parseInt("ff", 16) + parseInt("0x10") + parseInt("12px");
            var e = unescape("%41%u0042") + escape("a b");
            var f = (255).toString(16) + "abcdef".substr(-3, 2) + "abcdef".slice(1, -1);
        "#)?;
        assert_eq!(global_string(&sandbox, "a"), "/a/b");
        assert_eq!(global_string(&sandbox, "b"), "cba");
        assert_eq!(global_string(&sandbox, "c"), "111");
        assert_eq!(global_string(&sandbox, "d"), "283");
        assert_eq!(global_string(&sandbox, "e"), "ABa%20b");
        assert_eq!(global_string(&sandbox, "f"), "ffdebcde");
        Ok(())
    }

    #[test]
    fn test_array_index_assignment_grows_array() -> Result<(), ScriptError> {
        let sandbox = run("var a = []; a[2] = 5; a[0] += 1; var n = a.length;")?;
        assert_eq!(global_string(&sandbox, "n"), "3");
        assert_eq!(global_string(&sandbox, "a"), "NaN,,5");
        Ok(())
    }

    #[test]
    fn test_unknown_identifier_is_reference_error() {
        assert_eq!(run("location.href = '/x'").err(), Some(ScriptError::Reference("location".to_string())));
        assert!(matches!(run("require('fs')"), Err(ScriptError::Reference(_))));
        assert!(matches!(run("var t = typeof window;"), Ok(_)));
    }

    #[test]
    fn test_infinite_loop_hits_step_limit() {
        let mut sandbox = Sandbox::new(Limits { max_steps: 10_000, ..Limits::default() });
        assert_eq!(sandbox.run("while (true) {}"), Err(ScriptError::StepLimit(10_000)));
    }

    #[test]
    fn test_infinite_loop_hits_time_limit() {
        let limits = Limits { timeout: Duration::from_millis(20), max_steps: u64::MAX, ..Limits::default() };
        let mut sandbox = Sandbox::new(limits);
        assert_eq!(sandbox.run("for (;;) {}"), Err(ScriptError::Timeout(Duration::from_millis(20))));
    }

    #[test]
    fn test_unbounded_recursion_hits_depth_limit() {
        let mut sandbox = Sandbox::new(Limits { max_depth: 16, ..Limits::default() });
        assert_eq!(sandbox.run("function f(n) { return f(n + 1); } f(0);"), Err(ScriptError::DepthLimit(16)));
    }

    #[test]
    fn test_self_evaluating_string_hits_depth_limit() {
        let limits = Limits::default();
        assert_eq!(run_deep(limits, "var s = 'eval(s)'; eval(s);"), Err(ScriptError::DepthLimit(256)));
        assert_eq!(run_deep(limits, "var s = 'var e = eval; e(s)'; eval(s);"), Err(ScriptError::DepthLimit(256)));
    }

    #[test]
    fn test_deep_native_recursion_hits_nesting_limit() {
        let limits = Limits { max_depth: 1_000_000, ..Limits::default() };
        let result = run_deep(limits, "function f(n) { return 1 + f(n + 1); } f(0);");
        assert_eq!(result, Err(ScriptError::NestingLimit(MAX_FRAMES)));
    }

    #[test]
    fn test_doubling_string_hits_memory_limit() {
        let result = run("var s = 'a'; for (var i = 0; i < 40; i++) { s += s; }");
        assert_eq!(result.err(), Some(ScriptError::MemoryLimit(1 << 20)));
        let result = run("var s = 'ab'; for (;;) s = s.concat(s);");
        assert_eq!(result.err(), Some(ScriptError::MemoryLimit(1 << 20)));
    }

    #[test]
    fn test_array_growth_hits_memory_limit() {
        assert!(matches!(run("var a = []; a[1e8] = 1;"), Err(ScriptError::MemoryLimit(_))));
        assert!(matches!(run("var a = []; a.length = 4294967295;"), Err(ScriptError::MemoryLimit(_))));
        let nested = run_deep(Limits::default(), "var k = []; for (;;) k = [k];");
        assert_eq!(nested, Err(ScriptError::MemoryLimit(64 << 20)));
        assert!(matches!(run("var a = ['x']; for (;;) a = a.concat(a);"), Err(ScriptError::MemoryLimit(_))));
    }

    #[test]
    fn test_join_of_huge_array_hits_memory_limit() {
        let result = run("var a = []; a[200000] = 0; var s = a.join('0123456789');");
        assert_eq!(result.err(), Some(ScriptError::MemoryLimit(1 << 20)));
    }

    #[test]
    fn test_cyclic_array_joins_as_empty() -> Result<(), ScriptError> {
        let sandbox = run("var a = [1]; a.push(a); var s = a.join('-'); var t = a + '!';")?;
        assert_eq!(global_string(&sandbox, "s"), "1-");
        assert_eq!(global_string(&sandbox, "t"), "1,!");
        Ok(())
    }

    #[test]
    fn test_last_index_of_honours_position() -> Result<(), ScriptError> {
        let sandbox = run(r#"
            var s = "abcabc";
            var r = [s.lastIndexOf("b"), s.lastIndexOf("b", 3), s.lastIndexOf("a", 0), s.lastIndexOf("c", -5),
                     s.lastIndexOf("b", NaN), s.lastIndexOf("", 2)].join(" ");
        "#)?;
        assert_eq!(global_string(&sandbox, "r"), "4 1 0 -1 4 2");
        Ok(())
    }

    #[test]
    fn test_self_rescheduling_timer_is_bounded() {
        let mut sandbox = Sandbox::new(Limits { max_steps: 10_000, ..Limits::default() });
        let result = sandbox.run("function tick() { setTimeout(tick, 1); } tick();");
        assert_eq!(result, Err(ScriptError::StepLimit(10_000)));
    }
}
