use std::{path::Path, rc::Rc};

use ahash::AHashSet;
use smallvec::SmallVec;

use crate::{
    dispatch::{Callable, DispatchTable, FnDef, ScriptFn, signature_id},
    engine::ImportState,
    error::{Error, ErrorKind, RunResult},
    expressions::{Accessor, CallArg, Expr, Ident, Initializer, Op, Stmt},
    heap::{Heap, HeapData, HeapId},
    io::PrintWriter,
    libraries::{Library, Registrar},
    machine::Machine,
    native::NativeCtx,
    types::Member,
    types::TypeRegistry,
    value::Value,
};

/// How a statement finished: normally, or by returning out of the
/// enclosing call. A `return` unwinds the machine itself; this flag only
/// tells enclosing statements to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Normal,
    Returned,
}

/// The tree-walking evaluator: drives the machine, heap, registry, and
/// dispatch table in a depth-first traversal of the AST.
///
/// Invariants: evaluating an expression pushes exactly one value; a
/// completed statement leaves the value stack balanced except for the
/// binding statements (`let`, fresh-name assignment), whose bound slot
/// lives until its scope exits.
pub(crate) struct Evaluator<'a> {
    pub machine: &'a mut Machine,
    pub heap: &'a mut Heap,
    pub types: &'a mut TypeRegistry,
    pub dispatch: &'a mut DispatchTable,
    pub imports: &'a mut ImportState,
    pub libraries: &'a [Rc<dyn Library>],
    pub import_dir: &'a Path,
    pub print: &'a mut dyn PrintWriter,
}

impl Evaluator<'_> {
    pub fn eval_stmt(&mut self, stmt: &Stmt) -> RunResult<Flow> {
        match stmt {
            // Assignment to a bare name is the binding form: a fresh name
            // takes over the value's slot exactly like a `let`.
            Stmt::Expr(Expr::Assign { target, value }) if target.path.is_empty() => {
                self.eval_expr(value)?;
                if self.machine.var_slot(&target.name).is_some() {
                    self.machine.set_var(&target.name, 0, self.heap)?;
                    let v = self.machine.pop()?;
                    v.drop_with_heap(self.heap);
                } else {
                    self.machine.create_var(&target.name, 0)?;
                }
                Ok(Flow::Normal)
            }
            Stmt::Expr(expr) => {
                self.eval_expr(expr)?;
                let v = self.machine.pop()?;
                v.drop_with_heap(self.heap);
                Ok(Flow::Normal)
            }
            Stmt::Let { name, expr } => {
                match expr {
                    Some(expr) => self.eval_expr(expr)?,
                    None => self.machine.push(Value::Empty, self.heap)?,
                }
                self.machine.create_var(name, 0)?;
                Ok(Flow::Normal)
            }
            Stmt::If { .. } => self.eval_if(stmt),
            Stmt::While { cond, body } => {
                loop {
                    if !self.eval_condition(cond)? {
                        return Ok(Flow::Normal);
                    }
                    if self.eval_scoped(body)? == Flow::Returned {
                        return Ok(Flow::Returned);
                    }
                }
            }
            Stmt::For { init, cond, step, body } => self.eval_for(init, cond, step, body),
            Stmt::Def { name, args, body } => {
                let param_types: Vec<String> = args
                    .iter()
                    .map(|a| a.type_name.clone().unwrap_or_else(|| "any".to_owned()))
                    .collect();
                let params = args.iter().map(|a| a.name.clone()).collect();
                let def = FnDef {
                    id: signature_id(name, &param_types),
                    name: name.clone(),
                    param_types,
                    callable: Callable::Script(Rc::new(ScriptFn {
                        params,
                        body: Rc::clone(body),
                    })),
                };
                self.dispatch.register(self.types, def)?;
                Ok(Flow::Normal)
            }
            Stmt::Return(expr) => {
                match expr {
                    Some(expr) => self.eval_expr(expr)?,
                    None => self.machine.push(Value::Empty, self.heap)?,
                }
                self.machine.return_(self.heap)?;
                Ok(Flow::Returned)
            }
            Stmt::Block(stmts) => {
                for stmt in stmts {
                    if self.eval_stmt(stmt)? == Flow::Returned {
                        return Ok(Flow::Returned);
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::ObjectDef { name, parent, members } => {
                let members = members
                    .iter()
                    .map(|m| Member {
                        name: m.name.clone(),
                        init: m.init.clone(),
                    })
                    .collect();
                self.types.register_user(name, parent.as_deref(), members)?;
                Ok(Flow::Normal)
            }
            Stmt::Import(name) => {
                self.eval_import(name)?;
                Ok(Flow::Normal)
            }
            // Reserved; the evaluator accepts and ignores it.
            Stmt::LoadLib(_) => Ok(Flow::Normal),
        }
    }

    /// Evaluates a condition expression and pops it as a bool.
    fn eval_condition(&mut self, cond: &Expr) -> RunResult<bool> {
        self.eval_expr(cond)?;
        let v = self.machine.pop()?;
        let truthy = v.truthy();
        v.drop_with_heap(self.heap);
        Ok(truthy)
    }

    /// Runs a statement inside a fresh scope, reclaiming the scope's stack
    /// slots on normal exit. A `return` has already unwound past the scope;
    /// an error leaves cleanup to the top-level unwind.
    fn eval_scoped(&mut self, stmt: &Stmt) -> RunResult<Flow> {
        self.machine.enter_scope()?;
        let mark = self.machine.stack_len();
        let flow = self.eval_stmt(stmt)?;
        if flow == Flow::Normal {
            self.machine.truncate_to(mark, self.heap);
            self.machine.exit_scope();
        }
        Ok(flow)
    }

    fn eval_if(&mut self, stmt: &Stmt) -> RunResult<Flow> {
        let mut current = stmt;
        loop {
            let Stmt::If { cond, body, orelse } = current else {
                // The final `else` branch.
                return self.eval_scoped(current);
            };
            if self.eval_condition(cond)? {
                return self.eval_scoped(body);
            }
            match orelse {
                Some(next) => current = next,
                None => return Ok(Flow::Normal),
            }
        }
    }

    fn eval_for(&mut self, init: &Stmt, cond: &Expr, step: &Expr, body: &Stmt) -> RunResult<Flow> {
        // Outer scope holds the induction variable for the whole loop.
        self.machine.enter_scope()?;
        let mark = self.machine.stack_len();
        if self.eval_stmt(init)? == Flow::Returned {
            return Ok(Flow::Returned);
        }
        loop {
            if !self.eval_condition(cond)? {
                break;
            }
            if self.eval_scoped(body)? == Flow::Returned {
                return Ok(Flow::Returned);
            }
            self.eval_expr(step)?;
            let v = self.machine.pop()?;
            v.drop_with_heap(self.heap);
        }
        self.machine.truncate_to(mark, self.heap);
        self.machine.exit_scope();
        Ok(Flow::Normal)
    }

    pub fn eval_expr(&mut self, expr: &Expr) -> RunResult<()> {
        match expr {
            Expr::Number(n) => self.machine.push(Value::Number(*n), self.heap),
            Expr::Text(s) => self.machine.push(Value::Text(s.clone()), self.heap),
            Expr::FnAddr(name) => self.machine.push(Value::Text(name.clone()), self.heap),
            Expr::Ident(id) => {
                let value = self.read_ident(id)?;
                self.machine.push(value, self.heap)
            }
            Expr::Binary { op, lhs, rhs } => self.eval_binary(*op, lhs, rhs),
            Expr::Assign { target, value } => {
                self.eval_expr(value)?;
                let val = self.machine.top()?.clone_with_heap(self.heap);
                self.write_ident(target, val)
            }
            Expr::Call { name, args } => self.eval_call(name, args),
            Expr::IncDec { op, prefix, target } => self.eval_incdec(*op, *prefix, target),
            Expr::NewBlob(inits) => self.eval_new_blob(inits),
            Expr::NewArray(items) => self.eval_new_array(items),
            Expr::NewInstance { type_name, inits } => self.eval_new_instance(type_name, inits),
        }
    }

    /// Resolves an identifier read: the base name through the scope chain,
    /// then each accessor into nested containers. Returns an owned value.
    fn read_ident(&mut self, id: &Ident) -> RunResult<Value> {
        let mut current = self.machine.load_var(&id.name)?.clone_with_heap(self.heap);
        for acc in &id.path {
            match self.read_child(&current, acc) {
                Ok(child) => {
                    current.drop_with_heap(self.heap);
                    current = child;
                }
                Err(e) => {
                    current.drop_with_heap(self.heap);
                    return Err(e);
                }
            }
        }
        Ok(current)
    }

    /// Resolves one accessor step against a parent value.
    fn read_child(&self, parent: &Value, acc: &Accessor) -> RunResult<Value> {
        let Value::Ref(id) = parent else {
            return Err(Error::bad_access("cannot access into a scalar value"));
        };
        match (self.heap.get(*id), acc) {
            (HeapData::Array(values), acc) => {
                let index = self.array_index(values.len(), acc)?;
                Ok(values[index].clone_with_heap(self.heap))
            }
            (HeapData::Blob(map), Accessor::Field(name)) => map
                .get(name)
                .map(|v| v.clone_with_heap(self.heap))
                .ok_or_else(|| Error::bad_access(format!("no field '{name}'"))),
            (HeapData::Instance(instance), Accessor::Field(name)) => instance
                .members
                .get(name)
                .map(|v| v.clone_with_heap(self.heap))
                .ok_or_else(|| Error::bad_access(format!("no member '{name}'"))),
            (HeapData::Blob(_) | HeapData::Instance(_), Accessor::Index(_)) => {
                Err(Error::bad_access("numeric index on a non-array value"))
            }
            (HeapData::Native(_), _) => Err(Error::bad_access("cannot access into a native value")),
        }
    }

    /// Resolves an array accessor to a bounds-checked index. A name
    /// accessor must be in scope as a number.
    fn array_index(&self, len: usize, acc: &Accessor) -> RunResult<usize> {
        let index = match acc {
            Accessor::Index(i) => *i,
            Accessor::Field(name) => match self.machine.load_var(name)? {
                Value::Number(n) if *n >= 0.0 => *n as usize,
                _ => return Err(Error::bad_access(format!("'{name}' is not an array index"))),
            },
        };
        if index >= len {
            return Err(Error::new(
                ErrorKind::OutOfRange,
                format!("index {index} out of range (size {len})"),
            ));
        }
        Ok(index)
    }

    /// Writes an owned value through an identifier path. Containers are
    /// shared, so the write is visible through every alias of the parent.
    fn write_ident(&mut self, id: &Ident, value: Value) -> RunResult<()> {
        let Some(slot) = self.machine.var_slot(&id.name) else {
            value.drop_with_heap(self.heap);
            return Err(Error::undefined_variable(&id.name));
        };
        if id.path.is_empty() {
            self.machine.replace_slot(slot, value, self.heap);
            return Ok(());
        }

        // Walk to the parent container of the final accessor.
        let mut parent = self.machine.slot(slot).clone_with_heap(self.heap);
        for acc in &id.path[..id.path.len() - 1] {
            match self.read_child(&parent, acc) {
                Ok(child) => {
                    parent.drop_with_heap(self.heap);
                    parent = child;
                }
                Err(e) => {
                    parent.drop_with_heap(self.heap);
                    value.drop_with_heap(self.heap);
                    return Err(e);
                }
            }
        }
        let Value::Ref(pid) = parent else {
            value.drop_with_heap(self.heap);
            return Err(Error::bad_access("cannot access into a scalar value"));
        };
        let result = self.write_child(pid, &id.path[id.path.len() - 1], value);
        parent.drop_with_heap(self.heap);
        result
    }

    /// Writes the final accessor of a path into its parent container.
    fn write_child(&mut self, pid: HeapId, acc: &Accessor, value: Value) -> RunResult<()> {
        if let HeapData::Array(values) = self.heap.get(pid) {
            let index = match self.array_index(values.len(), acc) {
                Ok(index) => index,
                Err(e) => {
                    value.drop_with_heap(self.heap);
                    return Err(e);
                }
            };
            let outcome = match self.heap.get_mut(pid) {
                HeapData::Array(values) => Ok(std::mem::replace(&mut values[index], value)),
                _ => Err(value),
            };
            return self.finish_write(outcome, "array element");
        }

        let Accessor::Field(name) = acc else {
            value.drop_with_heap(self.heap);
            return Err(Error::bad_access("numeric index on a non-array value"));
        };
        let outcome = match self.heap.get_mut(pid) {
            HeapData::Blob(map) => match map.get_mut(name) {
                Some(slot) => Ok(std::mem::replace(slot, value)),
                None => Err(value),
            },
            HeapData::Instance(instance) => match instance.members.get_mut(name) {
                Some(slot) => Ok(std::mem::replace(slot, value)),
                None => Err(value),
            },
            _ => Err(value),
        };
        self.finish_write(outcome, name)
    }

    fn finish_write(&mut self, outcome: Result<Value, Value>, what: &str) -> RunResult<()> {
        match outcome {
            Ok(old) => {
                old.drop_with_heap(self.heap);
                Ok(())
            }
            Err(value) => {
                let message = format!("cannot write '{what}' here");
                value.drop_with_heap(self.heap);
                Err(Error::bad_access(message))
            }
        }
    }

    fn eval_binary(&mut self, op: Op, lhs: &Expr, rhs: &Expr) -> RunResult<()> {
        match op {
            // Short-circuit: when the left operand decides, it stays on
            // the stack as the result.
            Op::And => {
                self.eval_expr(lhs)?;
                if !self.machine.top()?.truthy() {
                    return Ok(());
                }
                let v = self.machine.pop()?;
                v.drop_with_heap(self.heap);
                self.eval_expr(rhs)
            }
            Op::Or => {
                self.eval_expr(lhs)?;
                if self.machine.top()?.truthy() {
                    return Ok(());
                }
                let v = self.machine.pop()?;
                v.drop_with_heap(self.heap);
                self.eval_expr(rhs)
            }
            _ => {
                self.eval_expr(lhs)?;
                self.eval_expr(rhs)?;
                let rv = self.machine.pop()?;
                let lv = self.machine.pop()?;
                let result = self.apply_binary(op, lv, rv)?;
                self.machine.push(result, self.heap)
            }
        }
    }

    /// Applies an arithmetic, comparison, or strict-logical operator.
    /// Coercion is driven by the left operand; container operands are not
    /// valid for any of these operators.
    fn apply_binary(&mut self, op: Op, lv: Value, rv: Value) -> RunResult<Value> {
        if matches!(lv, Value::Ref(_)) || matches!(rv, Value::Ref(_)) {
            let message = format!(
                "cannot apply '{op}' to {} and {}",
                lv.type_name(self.heap),
                rv.type_name(self.heap)
            );
            lv.drop_with_heap(self.heap);
            rv.drop_with_heap(self.heap);
            return Err(Error::bad_cast(message));
        }
        match op {
            Op::AndStrict => Ok(Value::Bool(lv.truthy() && rv.truthy())),
            Op::Add => match lv {
                Value::Empty => Ok(Value::Empty),
                Value::Number(a) => Ok(Value::Number(a + rv.coerce_number(self.heap)?)),
                Value::Text(mut s) => {
                    s.push_str(&rv.to_text(self.heap));
                    Ok(Value::Text(s))
                }
                other => Err(Error::bad_cast(format!(
                    "cannot apply '+' to {}",
                    other.type_name(self.heap)
                ))),
            },
            Op::Sub | Op::Mul | Op::Div | Op::Mod | Op::Pow => match lv {
                Value::Empty => Ok(Value::Empty),
                Value::Number(a) => {
                    let b = rv.coerce_number(self.heap)?;
                    let n = match op {
                        Op::Sub => a - b,
                        Op::Mul => a * b,
                        Op::Div => a / b,
                        Op::Mod => a % b,
                        _ => a.powf(b),
                    };
                    Ok(Value::Number(n))
                }
                other => Err(Error::bad_cast(format!(
                    "cannot apply '{op}' to {}",
                    other.type_name(self.heap)
                ))),
            },
            Op::Eq | Op::Ne => {
                let equal = self.values_equal(&lv, &rv)?;
                Ok(Value::Bool(if op == Op::Eq { equal } else { !equal }))
            }
            Op::Lt | Op::Le | Op::Gt | Op::Ge => self.compare(op, &lv, &rv),
            // `&&`, `||`, `=`, `++`, `--` never reach this point.
            _ => Err(Error::bad_cast(format!("cannot apply '{op}' here"))),
        }
    }

    fn values_equal(&self, lv: &Value, rv: &Value) -> RunResult<bool> {
        match lv {
            Value::Empty => Ok(matches!(rv, Value::Empty)),
            Value::Bool(b) => Ok(*b == rv.truthy()),
            Value::Number(a) => Ok(*a == rv.coerce_number(self.heap)?),
            Value::Text(s) => Ok(*s == rv.to_text(self.heap)),
            Value::Ref(_) => Err(Error::bad_cast("cannot compare container values")),
        }
    }

    fn compare(&self, op: Op, lv: &Value, rv: &Value) -> RunResult<Value> {
        let result = match lv {
            Value::Empty => false,
            Value::Bool(_) | Value::Number(_) => {
                let a = match lv {
                    Value::Bool(b) => f64::from(*b),
                    Value::Number(n) => *n,
                    _ => 0.0,
                };
                let b = rv.coerce_number(self.heap)?;
                match op {
                    Op::Lt => a < b,
                    Op::Le => a <= b,
                    Op::Gt => a > b,
                    _ => a >= b,
                }
            }
            Value::Text(s) => {
                let t = rv.to_text(self.heap);
                match op {
                    Op::Lt => *s < t,
                    Op::Le => *s <= t,
                    Op::Gt => *s > t,
                    _ => *s >= t,
                }
            }
            Value::Ref(_) => return Err(Error::bad_cast("cannot compare container values")),
        };
        Ok(Value::Bool(result))
    }

    /// The calling convention: push a return-slot placeholder, evaluate
    /// arguments left to right (expanding `...` arrays in place), then
    /// dispatch on the runtime argument types.
    fn eval_call(&mut self, name: &str, args: &[CallArg]) -> RunResult<()> {
        self.machine.push(Value::Empty, self.heap)?;
        let mut argc = 0usize;
        for arg in args {
            self.eval_expr(&arg.expr)?;
            if arg.expand {
                let v = self.machine.pop()?;
                let items = match &v {
                    Value::Ref(id) => match self.heap.get(*id) {
                        HeapData::Array(values) => {
                            Some(values.iter().map(|item| item.clone_with_heap(self.heap)).collect::<Vec<_>>())
                        }
                        _ => None,
                    },
                    _ => None,
                };
                let Some(items) = items else {
                    let message = format!("cannot expand {}", v.type_name(self.heap));
                    v.drop_with_heap(self.heap);
                    return Err(Error::new(ErrorKind::InvalidExpansion, message));
                };
                v.drop_with_heap(self.heap);
                for item in items {
                    self.machine.push(item, self.heap)?;
                    argc += 1;
                }
            } else {
                argc += 1;
            }
        }
        self.call_function(name, argc)
    }

    /// Dispatches and runs a function whose return slot and `argc`
    /// arguments are already on the stack, leaving the return value on top.
    pub fn call_function(&mut self, name: &str, argc: usize) -> RunResult<()> {
        let mut arg_types: SmallVec<[String; 4]> = SmallVec::new();
        for i in 0..argc {
            let v = self.machine.offset(argc - 1 - i)?;
            arg_types.push(v.type_name(self.heap).to_owned());
        }
        let (fn_name, callable) = {
            let def = self.dispatch.lookup(self.types, name, &arg_types)?;
            (def.name.clone(), def.callable.clone())
        };
        self.machine.activate(&fn_name, argc)?;
        match callable {
            Callable::Script(f) => {
                // First parameter binds deepest: offset argc-1 down to 0.
                for (i, param) in f.params.iter().enumerate() {
                    self.machine.create_var(param, argc - 1 - i)?;
                }
                let flow = self.eval_stmt(&f.body)?;
                if flow == Flow::Normal {
                    self.machine.push(Value::Empty, self.heap)?;
                    self.machine.return_(self.heap)?;
                }
            }
            Callable::Native(f) => {
                let args_base = self.machine.stack_len() - argc;
                let ret = {
                    let mut ctx = NativeCtx {
                        machine: &mut *self.machine,
                        heap: &mut *self.heap,
                        print: &mut *self.print,
                        args_base,
                        arity: argc,
                    };
                    f(&mut ctx)?
                };
                self.machine.push(ret.unwrap_or(Value::Empty), self.heap)?;
                self.machine.return_(self.heap)?;
            }
        }
        // Pop the argument slots, leaving the return value on top.
        for _ in 0..argc {
            let v = self.machine.pop()?;
            v.drop_with_heap(self.heap);
        }
        Ok(())
    }

    /// Prefix form yields the updated number, postfix the original; both
    /// write the update back through the identifier path.
    fn eval_incdec(&mut self, op: Op, prefix: bool, target: &Ident) -> RunResult<()> {
        let current = self.read_ident(target)?;
        let n = match &current {
            Value::Number(n) => *n,
            other => {
                let message = format!("cannot apply '{op}' to {}", other.type_name(self.heap));
                current.drop_with_heap(self.heap);
                return Err(Error::bad_cast(message));
            }
        };
        let updated = if op == Op::Incr { n + 1.0 } else { n - 1.0 };
        self.write_ident(target, Value::Number(updated))?;
        let result = if prefix { updated } else { n };
        self.machine.push(Value::Number(result), self.heap)
    }

    fn eval_new_blob(&mut self, inits: &[Initializer]) -> RunResult<()> {
        let id = self.heap.alloc_blob();
        self.machine.push(Value::Ref(id), self.heap)?;
        for init in inits {
            self.eval_expr(&init.expr)?;
            let v = self.machine.pop()?;
            let old = match self.heap.get_mut(id) {
                HeapData::Blob(map) => map.insert(init.name.clone(), v),
                _ => Some(v),
            };
            if let Some(old) = old {
                old.drop_with_heap(self.heap);
            }
        }
        Ok(())
    }

    fn eval_new_array(&mut self, items: &[Expr]) -> RunResult<()> {
        let id = self.heap.alloc_array(Vec::new());
        self.machine.push(Value::Ref(id), self.heap)?;
        for item in items {
            self.eval_expr(item)?;
            let v = self.machine.pop()?;
            let leftover = match self.heap.get_mut(id) {
                HeapData::Array(values) => {
                    values.push(v);
                    None
                }
                _ => Some(v),
            };
            if let Some(v) = leftover {
                v.drop_with_heap(self.heap);
            }
        }
        Ok(())
    }

    /// `new TYPE { ... }`: ancestor default initializers run in
    /// root-to-leaf order inside an instantiation scope, so later
    /// initializers can reference earlier members by name; the explicit
    /// initializer list runs last.
    fn eval_new_instance(&mut self, type_name: &str, inits: &[Initializer]) -> RunResult<()> {
        let plan: Vec<(String, Option<Rc<Expr>>)> = {
            let chain = self.types.lineage(type_name)?;
            let mut seen: AHashSet<String> = AHashSet::new();
            let mut plan = Vec::new();
            for def in chain {
                for member in &def.members {
                    if seen.contains(member.name.as_str()) && member.init.is_none() {
                        return Err(Error::new(
                            ErrorKind::RedefinedMember,
                            format!("member '{}' is already defined", member.name),
                        ));
                    }
                    seen.insert(member.name.clone());
                    plan.push((member.name.clone(), member.init.clone()));
                }
            }
            plan
        };

        let id = self.heap.alloc_instance(type_name.to_owned());
        self.machine.push(Value::Ref(id), self.heap)?;
        self.machine.enter_scope()?;
        let mark = self.machine.stack_len();
        for (name, init) in &plan {
            match init {
                Some(expr) => self.eval_expr(expr)?,
                None => self.machine.push(Value::Empty, self.heap)?,
            }
            self.set_member(id, name)?;
        }
        for init in inits {
            self.eval_expr(&init.expr)?;
            self.set_member(id, &init.name)?;
        }
        self.machine.truncate_to(mark, self.heap);
        self.machine.exit_scope();
        Ok(())
    }

    /// Copies the top of the stack into an instance member and binds the
    /// member name in the instantiation scope for later initializers.
    fn set_member(&mut self, id: HeapId, name: &str) -> RunResult<()> {
        let v = self.machine.top()?.clone_with_heap(self.heap);
        let old = match self.heap.get_mut(id) {
            HeapData::Instance(instance) => instance.members.insert(name.to_owned(), v),
            _ => Some(v),
        };
        if let Some(old) = old {
            old.drop_with_heap(self.heap);
        }
        self.machine.create_var(name, 0)
    }

    /// `@import NAME`: a host-registered library loads once; otherwise
    /// `NAME.sl` in the import directory is parsed and evaluated in the
    /// top-level context. Re-import is a no-op, but an import that is
    /// still in progress is a cycle.
    fn eval_import(&mut self, name: &str) -> RunResult<()> {
        if self.imports.in_progress.iter().any(|n| n == name) {
            return Err(Error::new(
                ErrorKind::CyclicalImport,
                format!("cyclical import of '{name}'"),
            ));
        }
        if self.imports.loaded.contains(name) {
            return Ok(());
        }

        if let Some(lib) = self.libraries.iter().find(|lib| lib.name() == name).cloned() {
            self.imports.in_progress.push(name.to_owned());
            let result = {
                let mut registrar = Registrar {
                    dispatch: &mut *self.dispatch,
                    types: &mut *self.types,
                };
                lib.load(&mut registrar)
            };
            self.imports.in_progress.pop();
            result?;
            self.imports.loaded.insert(name.to_owned());
            return Ok(());
        }

        let path = self.import_dir.join(format!("{name}.sl"));
        if !path.is_file() {
            return Err(Error::new(
                ErrorKind::ModuleNotFound,
                format!("module '{name}' not found"),
            ));
        }
        let source = std::fs::read_to_string(&path).map_err(|e| {
            Error::new(ErrorKind::ModuleNotFound, format!("cannot read module '{name}': {e}"))
        })?;
        let program = crate::parse::parse(&source)?;
        self.imports.in_progress.push(name.to_owned());
        let mut result = Ok(());
        for stmt in &program {
            if let Err(e) = self.eval_stmt(stmt) {
                result = Err(e);
                break;
            }
        }
        self.imports.in_progress.pop();
        result?;
        self.imports.loaded.insert(name.to_owned());
        Ok(())
    }
}
