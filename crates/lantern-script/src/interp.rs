//! Tree-walking interpreter that reports trace events.
//!
//! Every statement boundary is a `Line` event; `while` conditions report the
//! loop line again on each re-check. Builtins run natively and emit nothing.

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use indexmap::IndexMap;
use lantern_debug::{
    ExecutionFrame, FaultReport, HostRuntime, InspectorGate, ObjectValue, TraceEvent, TraceHook,
    Value,
};
use rustc_hash::FxHashMap;
use smol_str::SmolStr;
use tracing::{debug, error};

use crate::ast::{BinaryOp, Expr, Function, Script, Stmt, StmtKind, UnaryOp};
use crate::error::{RuntimeError, ScriptError};
use crate::parse::parse;

/// Unit identity of the bundled prelude.
pub const PRELUDE_UNIT: &str = "<internal>/prelude.ls";

const PRELUDE: &str = "\
fn max(a, b)
  if a > b
    return a
  end
  return b
end

fn min(a, b)
  if a < b
    return a
  end
  return b
end

fn abs(x)
  if x < 0
    return -x
  end
  return x
end

fn range(n)
  let out = []
  let i = 0
  while i < n
    push(out, i)
    set i = i + 1
  end
  return out
end
";

pub const DEFAULT_MAX_DEPTH: usize = 256;

const MODULE_SYMBOL: &str = "<module>";

/// Activation record of one function or module body.
struct Frame<'a> {
    unit: SmolStr,
    symbol: SmolStr,
    line: Cell<u32>,
    locals: RefCell<IndexMap<SmolStr, Value>>,
    caller: Option<&'a Frame<'a>>,
    depth: usize,
    traced: bool,
}

impl ExecutionFrame for Frame<'_> {
    fn unit(&self) -> &str {
        &self.unit
    }

    fn line(&self) -> u32 {
        self.line.get()
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn locals(&self) -> Vec<(SmolStr, Value)> {
        self.locals
            .borrow()
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    fn caller(&self) -> Option<&dyn ExecutionFrame> {
        self.caller.map(|frame| frame as &dyn ExecutionFrame)
    }
}

enum Flow {
    Normal,
    Return(Value),
}

enum Step {
    Index(Value),
    Field(SmolStr),
}

type ExecResult<T> = Result<T, ScriptError>;

pub struct Interpreter {
    functions: FxHashMap<SmolStr, Arc<Function>>,
    hook: Option<Box<dyn TraceHook>>,
    inspector: Option<InspectorGate>,
    printed: Vec<String>,
    echo: bool,
    max_depth: usize,
    last_fault: Option<FaultReport>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Interpreter with the prelude loaded.
    #[must_use]
    pub fn new() -> Self {
        let mut interp = Self {
            functions: FxHashMap::default(),
            hook: None,
            inspector: None,
            printed: Vec::new(),
            echo: false,
            max_depth: DEFAULT_MAX_DEPTH,
            last_fault: None,
        };
        let prelude = parse(PRELUDE_UNIT, PRELUDE).unwrap_or_else(|err| {
            error!(error = %err, "prelude failed to parse");
            Script {
                unit: PRELUDE_UNIT.into(),
                functions: Vec::new(),
                body: Vec::new(),
            }
        });
        interp.define_functions(&prelude);
        interp
    }

    /// Make the functions of `script` callable. Later definitions win.
    #[must_use]
    pub fn with_library(mut self, script: &Script) -> Self {
        self.define_functions(script);
        self
    }

    /// Also write `print` output to stdout.
    #[must_use]
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    /// Request an inspector through `gate` whenever a run faults.
    #[must_use]
    pub fn with_inspector(mut self, gate: InspectorGate) -> Self {
        self.inspector = Some(gate);
        self
    }

    fn define_functions(&mut self, script: &Script) {
        for function in &script.functions {
            self.functions
                .insert(function.name.clone(), Arc::clone(function));
        }
    }

    /// Lines written by `print`, in order.
    #[must_use]
    pub fn output(&self) -> &[String] {
        &self.printed
    }

    /// Report captured at the innermost frame of the last failed run.
    #[must_use]
    pub fn last_fault(&self) -> Option<&FaultReport> {
        self.last_fault.as_ref()
    }

    /// Execute the module body of `script`.
    pub fn run(&mut self, script: &Script) -> ExecResult<()> {
        self.define_functions(script);
        self.last_fault = None;
        let mut module = Frame {
            unit: script.unit.clone(),
            symbol: MODULE_SYMBOL.into(),
            line: Cell::new(script.body.first().map_or(1, |stmt| stmt.line)),
            locals: RefCell::new(IndexMap::new()),
            caller: None,
            depth: 1,
            traced: true,
        };
        module.traced = self.trace(TraceEvent::Call, &module);
        debug!(unit = %script.unit, traced = module.traced, "module started");
        let result = self.exec_block(&module, &script.body);
        if module.traced {
            self.trace(TraceEvent::Return, &module);
        }
        result.map(|_| ())
    }

    fn trace(&mut self, event: TraceEvent, frame: &Frame<'_>) -> bool {
        match self.hook.as_mut() {
            Some(hook) => hook.on_event(event, frame),
            None => true,
        }
    }

    fn at_line(&mut self, frame: &Frame<'_>, line: u32) {
        frame.line.set(line);
        if frame.traced {
            self.trace(TraceEvent::Line, frame);
        }
    }

    fn fault(&mut self, frame: &Frame<'_>, error: RuntimeError) -> ScriptError {
        let err = ScriptError::Runtime {
            unit: frame.unit.clone(),
            line: frame.line.get(),
            error,
        };
        let report = FaultReport::capture(err.to_string(), frame);
        debug!(message = %report.message, "script fault");
        if let Some(gate) = &self.inspector {
            gate.request(report.clone());
        }
        self.last_fault = Some(report);
        err
    }

    fn exec_block(&mut self, frame: &Frame<'_>, body: &[Stmt]) -> ExecResult<Flow> {
        for stmt in body {
            if let Flow::Return(value) = self.exec_stmt(frame, stmt)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, frame: &Frame<'_>, stmt: &Stmt) -> ExecResult<Flow> {
        self.at_line(frame, stmt.line);
        match &stmt.kind {
            StmtKind::Let { name, value } => {
                let value = self.eval(frame, value)?;
                frame.locals.borrow_mut().insert(name.clone(), value);
            }
            StmtKind::Set { target, value } => {
                let value = self.eval(frame, value)?;
                self.with_place(frame, target, true, |slot| {
                    *slot = value;
                    Ok(())
                })?;
            }
            StmtKind::If {
                cond,
                then_body,
                else_body,
            } => {
                let branch = if self.eval(frame, cond)?.is_truthy() {
                    then_body
                } else {
                    else_body
                };
                return self.exec_block(frame, branch);
            }
            StmtKind::While { cond, body } => loop {
                if !self.eval(frame, cond)?.is_truthy() {
                    break;
                }
                if let Flow::Return(value) = self.exec_block(frame, body)? {
                    return Ok(Flow::Return(value));
                }
                self.at_line(frame, stmt.line);
            },
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(frame, expr)?,
                    None => Value::Null,
                };
                return Ok(Flow::Return(value));
            }
            StmtKind::Print(expr) => {
                let text = self.eval(frame, expr)?.key_text();
                if self.echo {
                    println!("{text}");
                }
                self.printed.push(text);
            }
            StmtKind::Expr(expr) => {
                self.eval(frame, expr)?;
            }
        }
        Ok(Flow::Normal)
    }

    fn eval(&mut self, frame: &Frame<'_>, expr: &Expr) -> ExecResult<Value> {
        let value = match expr {
            Expr::Nil => Value::Null,
            Expr::Bool(value) => Value::Bool(*value),
            Expr::Int(value) => Value::Int(*value),
            Expr::Float(value) => Value::Float(*value),
            Expr::Str(text) => Value::Str(text.clone()),
            Expr::Var(name) => {
                let found = frame.locals.borrow().get(name).cloned();
                match found {
                    Some(value) => value,
                    None => {
                        let err = RuntimeError::UndefinedVariable(name.clone());
                        return Err(self.fault(frame, err));
                    }
                }
            }
            Expr::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(frame, item)?);
                }
                Value::List(values)
            }
            Expr::Map(entries) => {
                let mut values: Vec<(Value, Value)> = Vec::with_capacity(entries.len());
                for (key, item) in entries {
                    let key = self.eval(frame, key)?;
                    let item = self.eval(frame, item)?;
                    match values.iter_mut().find(|(existing, _)| *existing == key) {
                        Some(slot) => slot.1 = item,
                        None => values.push((key, item)),
                    }
                }
                Value::Map(values)
            }
            Expr::New { type_name, fields } => {
                let mut object = ObjectValue::new(type_name.clone());
                for (name, item) in fields {
                    let item = self.eval(frame, item)?;
                    object.fields.insert(name.clone(), item);
                }
                Value::Object(object)
            }
            Expr::Index { target, index } => {
                let target = self.eval(frame, target)?;
                let index = self.eval(frame, index)?;
                index_value(&target, &index).map_err(|err| self.fault(frame, err))?
            }
            Expr::Field { target, name } => {
                let target = self.eval(frame, target)?;
                field_value(&target, name).map_err(|err| self.fault(frame, err))?
            }
            Expr::Call { name, args } => self.call(frame, name, args)?,
            Expr::Unary { op, operand } => {
                let operand = self.eval(frame, operand)?;
                unary(*op, &operand).map_err(|err| self.fault(frame, err))?
            }
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.eval(frame, lhs)?;
                let rhs = self.eval(frame, rhs)?;
                binary(*op, &lhs, &rhs).map_err(|err| self.fault(frame, err))?
            }
            Expr::And(lhs, rhs) => {
                let truthy =
                    self.eval(frame, lhs)?.is_truthy() && self.eval(frame, rhs)?.is_truthy();
                Value::Bool(truthy)
            }
            Expr::Or(lhs, rhs) => {
                let truthy =
                    self.eval(frame, lhs)?.is_truthy() || self.eval(frame, rhs)?.is_truthy();
                Value::Bool(truthy)
            }
        };
        Ok(value)
    }

    fn call(&mut self, frame: &Frame<'_>, name: &SmolStr, args: &[Expr]) -> ExecResult<Value> {
        if name == "push" {
            let [place, item] = args else {
                return Err(self.fault(frame, arity("push", 2, args.len())));
            };
            let item = self.eval(frame, item)?;
            self.with_place(frame, place, false, |slot| match slot {
                Value::List(items) => {
                    items.push(item);
                    Ok(())
                }
                other => Err(mismatch(format!("push expects a list, got {}", other.type_name()))),
            })?;
            return Ok(Value::Null);
        }

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(frame, arg)?);
        }
        if let Some(result) = builtin(name, &values) {
            return result.map_err(|err| self.fault(frame, err));
        }
        match self.functions.get(name).cloned() {
            Some(function) => self.invoke(frame, &function, values),
            None => Err(self.fault(frame, RuntimeError::UndefinedFunction(name.clone()))),
        }
    }

    fn invoke(
        &mut self,
        caller: &Frame<'_>,
        function: &Function,
        args: Vec<Value>,
    ) -> ExecResult<Value> {
        if args.len() != function.params.len() {
            let err = arity(&function.name, function.params.len(), args.len());
            return Err(self.fault(caller, err));
        }
        if caller.depth >= self.max_depth {
            return Err(self.fault(caller, RuntimeError::StackOverflow(self.max_depth)));
        }
        let locals = function.params.iter().cloned().zip(args).collect();
        let mut frame = Frame {
            unit: function.unit.clone(),
            symbol: function.name.clone(),
            line: Cell::new(function.body.first().map_or(function.line, |stmt| stmt.line)),
            locals: RefCell::new(locals),
            caller: Some(caller),
            depth: caller.depth + 1,
            traced: true,
        };
        frame.traced = self.trace(TraceEvent::Call, &frame);
        let result = self.exec_block(&frame, &function.body);
        if frame.traced {
            self.trace(TraceEvent::Return, &frame);
        }
        match result? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Null),
        }
    }

    /// Resolve an assignable place and run `apply` on it. With `insert`, the
    /// last map key or object field is created when missing.
    fn with_place<T>(
        &mut self,
        frame: &Frame<'_>,
        target: &Expr,
        insert: bool,
        apply: impl FnOnce(&mut Value) -> Result<T, RuntimeError>,
    ) -> ExecResult<T> {
        let mut steps = Vec::new();
        let mut current = target;
        let root = loop {
            match current {
                Expr::Var(name) => break name,
                Expr::Index { target, index } => {
                    steps.push(Step::Index(self.eval(frame, index)?));
                    current = &**target;
                }
                Expr::Field { target, name } => {
                    steps.push(Step::Field(name.clone()));
                    current = &**target;
                }
                _ => return Err(self.fault(frame, mismatch("value is not assignable"))),
            }
        };
        steps.reverse();

        let result = {
            let mut locals = frame.locals.borrow_mut();
            match locals.get_mut(root) {
                Some(slot) => resolve(slot, &steps, insert).and_then(apply),
                None => Err(RuntimeError::UndefinedVariable(root.clone())),
            }
        };
        result.map_err(|err| self.fault(frame, err))
    }
}

impl HostRuntime for Interpreter {
    fn attach(&mut self, hook: Box<dyn TraceHook>) {
        self.hook = Some(hook);
    }

    fn detach(&mut self) {
        self.hook = None;
    }

    fn is_attached(&self) -> bool {
        self.hook.is_some()
    }
}

fn resolve<'v>(
    mut slot: &'v mut Value,
    steps: &[Step],
    insert: bool,
) -> Result<&'v mut Value, RuntimeError> {
    for (idx, step) in steps.iter().enumerate() {
        let create = insert && idx + 1 == steps.len();
        slot = match step {
            Step::Index(key) => index_slot(slot, key, create)?,
            Step::Field(name) => field_slot(slot, name, create)?,
        };
    }
    Ok(slot)
}

fn index_slot<'v>(
    slot: &'v mut Value,
    key: &Value,
    create: bool,
) -> Result<&'v mut Value, RuntimeError> {
    match slot {
        Value::List(items) => {
            let Value::Int(index) = key else {
                return Err(mismatch(format!("list index must be int, got {}", key.type_name())));
            };
            let len = items.len();
            match usize::try_from(*index).ok().filter(|pos| *pos < len) {
                Some(pos) => Ok(&mut items[pos]),
                None => Err(RuntimeError::IndexOutOfBounds { index: *index, len }),
            }
        }
        Value::Map(entries) => {
            let pos = match entries.iter().position(|(existing, _)| existing == key) {
                Some(pos) => pos,
                None if create => {
                    entries.push((key.clone(), Value::Null));
                    entries.len() - 1
                }
                None => return Err(RuntimeError::KeyNotFound(key.repr())),
            };
            Ok(&mut entries[pos].1)
        }
        other => Err(mismatch(format!("cannot index {}", other.type_name()))),
    }
}

fn field_slot<'v>(
    slot: &'v mut Value,
    name: &SmolStr,
    create: bool,
) -> Result<&'v mut Value, RuntimeError> {
    match slot {
        Value::Object(object) => {
            if create && !object.fields.contains_key(name.as_str()) {
                object.fields.insert(name.clone(), Value::Null);
            }
            let type_name = object.type_name.clone();
            object
                .fields
                .get_mut(name.as_str())
                .ok_or_else(|| RuntimeError::UndefinedField {
                    type_name,
                    field: name.clone(),
                })
        }
        other => Err(mismatch(format!("{} has no field '{name}'", other.type_name()))),
    }
}

fn builtin(name: &str, args: &[Value]) -> Option<Result<Value, RuntimeError>> {
    let result = match name {
        "len" => one_arg(name, args).and_then(|value| match value {
            Value::List(items) => Ok(items.len()),
            Value::Map(entries) => Ok(entries.len()),
            Value::Str(text) => Ok(text.chars().count()),
            other => Err(mismatch(format!("len of {}", other.type_name()))),
        })
        .and_then(|len| i64::try_from(len).map(Value::Int).map_err(|_| RuntimeError::Overflow)),
        "str" => one_arg(name, args).map(|value| Value::Str(value.key_text())),
        "keys" => one_arg(name, args).and_then(|value| match value {
            Value::Map(entries) => Ok(Value::List(
                entries.iter().map(|(key, _)| key.clone()).collect(),
            )),
            Value::Object(object) => Ok(Value::List(
                object.fields.keys().map(|key| Value::Str(key.to_string())).collect(),
            )),
            other => Err(mismatch(format!("keys of {}", other.type_name()))),
        }),
        _ => return None,
    };
    Some(result)
}

fn one_arg<'v>(name: &str, args: &'v [Value]) -> Result<&'v Value, RuntimeError> {
    match args {
        [value] => Ok(value),
        _ => Err(arity(name, 1, args.len())),
    }
}

fn arity(name: &str, expected: usize, got: usize) -> RuntimeError {
    RuntimeError::InvalidArgumentCount {
        name: name.into(),
        expected,
        got,
    }
}

fn mismatch(message: impl Into<SmolStr>) -> RuntimeError {
    RuntimeError::TypeMismatch(message.into())
}

fn index_value(target: &Value, index: &Value) -> Result<Value, RuntimeError> {
    match (target, index) {
        (Value::List(items), Value::Int(idx)) => usize::try_from(*idx)
            .ok()
            .and_then(|pos| items.get(pos))
            .cloned()
            .ok_or(RuntimeError::IndexOutOfBounds {
                index: *idx,
                len: items.len(),
            }),
        (Value::Map(entries), key) => entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| RuntimeError::KeyNotFound(key.repr())),
        (other, index) => Err(mismatch(format!(
            "cannot index {} with {}",
            other.type_name(),
            index.type_name()
        ))),
    }
}

fn field_value(target: &Value, name: &SmolStr) -> Result<Value, RuntimeError> {
    match target {
        Value::Object(object) => object
            .field(name)
            .cloned()
            .ok_or_else(|| RuntimeError::UndefinedField {
                type_name: object.type_name.clone(),
                field: name.clone(),
            }),
        other => Err(mismatch(format!("{} has no field '{name}'", other.type_name()))),
    }
}

fn unary(op: UnaryOp, operand: &Value) -> Result<Value, RuntimeError> {
    match (op, operand) {
        (UnaryOp::Not, value) => Ok(Value::Bool(!value.is_truthy())),
        (UnaryOp::Neg, Value::Int(value)) => {
            value.checked_neg().map(Value::Int).ok_or(RuntimeError::Overflow)
        }
        (UnaryOp::Neg, Value::Float(value)) => Ok(Value::Float(-value)),
        (UnaryOp::Neg, other) => Err(mismatch(format!("cannot negate {}", other.type_name()))),
    }
}

fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(values_equal(lhs, rhs))),
        BinaryOp::NotEq => Ok(Value::Bool(!values_equal(lhs, rhs))),
        BinaryOp::Less | BinaryOp::LessEq | BinaryOp::Greater | BinaryOp::GreaterEq => {
            compare(op, lhs, rhs).map(Value::Bool)
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            arithmetic(op, lhs, rhs)
        }
    }
}

fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Int(_), Value::Float(_)) | (Value::Float(_), Value::Int(_)) => {
            lhs.as_float() == rhs.as_float()
        }
        _ => lhs == rhs,
    }
}

fn compare(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<bool, RuntimeError> {
    let ordering = match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
        (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
        _ => match (lhs.as_float(), rhs.as_float()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => {
                return Err(mismatch(format!(
                    "cannot compare {} with {}",
                    lhs.type_name(),
                    rhs.type_name()
                )));
            }
        },
    };
    let Some(ordering) = ordering else {
        return Ok(false);
    };
    Ok(match op {
        BinaryOp::Less => ordering.is_lt(),
        BinaryOp::LessEq => ordering.is_le(),
        BinaryOp::Greater => ordering.is_gt(),
        _ => ordering.is_ge(),
    })
}

fn arithmetic(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => {
            let (a, b) = (*a, *b);
            if matches!(op, BinaryOp::Div | BinaryOp::Rem) && b == 0 {
                return Err(RuntimeError::DivisionByZero);
            }
            let result = match op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Sub => a.checked_sub(b),
                BinaryOp::Mul => a.checked_mul(b),
                BinaryOp::Div => a.checked_div(b),
                _ => a.checked_rem(b),
            };
            result.map(Value::Int).ok_or(RuntimeError::Overflow)
        }
        (Value::Str(a), Value::Str(b)) if op == BinaryOp::Add => Ok(Value::Str(format!("{a}{b}"))),
        (Value::List(a), Value::List(b)) if op == BinaryOp::Add => {
            Ok(Value::List(a.iter().chain(b).cloned().collect()))
        }
        _ => {
            let (Some(a), Some(b)) = (lhs.as_float(), rhs.as_float()) else {
                return Err(mismatch(format!(
                    "unsupported operands {} and {}",
                    lhs.type_name(),
                    rhs.type_name()
                )));
            };
            if matches!(op, BinaryOp::Div | BinaryOp::Rem) && b == 0.0 {
                return Err(RuntimeError::DivisionByZero);
            }
            Ok(Value::Float(match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                _ => a % b,
            }))
        }
    }
}
