use std::rc::Rc;
use std::time::Duration;

use dncl_core::report::LineIndex;
use dncl_core::Span;

use crate::ast::{Block, Expr, InfixOp, PrefixOp, Program, StepDirection, Stmt};
use crate::builtins::BuiltIn;
use crate::env::{EnvId, Environments};
use crate::host::{
    DebugHook, Event, EventSink, ImportResolver, Input, InputSource, Pacer, StepControl,
};
use crate::object::{FunctionObj, Object, RuntimeError, RuntimeErrorKind};

// Index of the first array element, subtracted from every declared index
// before the backing sequence is addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArrayOrigin {
    #[default]
    Zero,
    One,
}

impl ArrayOrigin {
    pub fn offset(self) -> i64 {
        match self {
            ArrayOrigin::Zero => 0,
            ArrayOrigin::One => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Config {
    pub array_origin: ArrayOrigin,
    pub debug_mode: bool,
    pub debug_delay_ms: u64,
}

// The collaborators a run borrows from its host. The interpreter suspends
// only inside these: the input source, the debug hook and the pacer.
pub struct Host<'h> {
    pub sink: &'h mut dyn EventSink,
    pub input: &'h mut dyn InputSource,
    pub imports: &'h mut dyn ImportResolver,
    pub pacer: &'h mut dyn Pacer,
    pub hook: Option<&'h mut dyn DebugHook>,
}

const MAX_CALL_DEPTH: usize = 1000;

pub struct Interpreter<'h> {
    envs: Environments,
    global: EnvId,
    config: Config,
    line_index: LineIndex,
    host: Host<'h>,

    cancelled: bool,
    last_line: usize,
    call_depth: usize,
}

impl<'h> Interpreter<'h> {
    pub fn new(source: &str, config: Config, host: Host<'h>) -> Self {
        let (envs, global) = Environments::new();
        Interpreter {
            envs,
            global,
            config,
            line_index: LineIndex::new(source),
            host,
            cancelled: false,
            last_line: 0,
            call_depth: 0,
        }
    }

    pub fn interpret(&mut self, program: &Program) -> Result<(), RuntimeError> {
        for stmt in &program.statements {
            if self.cancelled {
                break;
            }
            match self.eval_stmt(stmt, self.global) {
                Object::Error(err) => return Err(err),
                Object::Return(_) => break,
                _ => {}
            }
        }
        Ok(())
    }

    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    // Sentinel values (Return, Error) short-circuit every enclosing
    // construct; a run cancelled at a suspension point unwinds through the
    // same checks without touching any further state.
    fn halted(&self, value: &Object) -> bool {
        self.cancelled || value.is_abrupt()
    }

    pub fn snapshot(&self) -> Vec<(String, String)> {
        self.envs.snapshot(self.global)
    }

    pub(crate) fn emit(&mut self, event: Event) {
        self.host.sink.emit(event);
    }

    pub(crate) fn origin(&self) -> i64 {
        self.config.array_origin.offset()
    }

    pub(crate) fn pace_sleep(&mut self, duration: Duration) {
        if self.host.pacer.sleep(duration) == StepControl::Cancel {
            self.cancelled = true;
        }
    }

    // Evaluates an imported file into the importing call's environment chain;
    // the nested program's own errors propagate unchanged.
    pub(crate) fn import(&mut self, path: &str, env: EnvId, span: Span, node: String) -> Object {
        let source = match self.host.imports.resolve(path) {
            Some(source) => source,
            None => {
                return Object::error(
                    RuntimeErrorKind::General {
                        message: format!("ファイル:{} が見つかりません", path),
                    },
                    span,
                    node,
                )
            }
        };

        let program = match crate::parse(&source) {
            Ok(program) => program,
            Err(err) => {
                return Object::error(
                    RuntimeErrorKind::General {
                        message: err.explain(&source),
                    },
                    span,
                    node,
                )
            }
        };

        for stmt in &program.statements {
            if self.cancelled {
                break;
            }
            let result = self.eval_stmt(stmt, env);
            if self.halted(&result) {
                return result;
            }
        }
        Object::Null
    }

    fn eval_stmt(&mut self, stmt: &Stmt, env: EnvId) -> Object {
        if self.cancelled {
            return Object::Null;
        }
        if self.config.debug_mode {
            self.debug_step(stmt.span(), env);
            if self.cancelled {
                return Object::Null;
            }
        }

        match stmt {
            Stmt::Expression { expr, .. } => self.eval_expr(expr, env),
            Stmt::Assign { target, value, .. } => self.eval_assign(target, value, env),
            Stmt::If {
                condition,
                consequence,
                alternative,
                ..
            } => {
                let cond = self.eval_expr(condition, env);
                if self.halted(&cond) {
                    return cond;
                }
                if cond.truthy() {
                    self.eval_block(consequence, env)
                } else if let Some(alternative) = alternative {
                    self.eval_block(alternative, env)
                } else {
                    Object::Null
                }
            }
            Stmt::While {
                condition, body, ..
            } => loop {
                if self.cancelled {
                    return Object::Null;
                }
                let cond = self.eval_expr(condition, env);
                if self.halted(&cond) {
                    return cond;
                }
                if !cond.truthy() {
                    return Object::Null;
                }
                let result = self.eval_block(body, env);
                if self.halted(&result) {
                    return result;
                }
            },
            Stmt::For {
                counter,
                counter_span,
                start,
                end,
                step,
                direction,
                body,
                ..
            } => self.eval_for(counter, *counter_span, start, end, step, *direction, body, env),
            Stmt::Function { name, func, .. } => {
                let value = self.eval_expr(func, env);
                if self.halted(&value) {
                    return value;
                }
                self.envs.define(env, name, value);
                Object::Null
            }
        }
    }

    // Blocks share the enclosing scope; there is no block-local shadowing in
    // the language.
    fn eval_block(&mut self, block: &Block, env: EnvId) -> Object {
        for stmt in &block.statements {
            if self.cancelled {
                return Object::Null;
            }
            let result = self.eval_stmt(stmt, env);
            if self.halted(&result) {
                return result;
            }
        }
        Object::Null
    }

    #[allow(clippy::too_many_arguments)]
    fn eval_for(
        &mut self,
        counter: &str,
        counter_span: Span,
        start: &Expr,
        end: &Expr,
        step: &Expr,
        direction: StepDirection,
        body: &Block,
        env: EnvId,
    ) -> Object {
        let start_n = match self.eval_int_clause(start, env) {
            Ok(value) => value,
            Err(err) => return err,
        };
        let end_n = match self.eval_int_clause(end, env) {
            Ok(value) => value,
            Err(err) => return err,
        };
        let step_n = match self.eval_int_clause(step, env) {
            Ok(value) => value,
            Err(err) => return err,
        };

        self.envs.set(env, counter, Object::Int(start_n));
        loop {
            if self.cancelled {
                return Object::Null;
            }
            let current = match self.counter_value(counter, counter_span, env) {
                Ok(value) => value,
                Err(err) => return err,
            };
            let done = match direction {
                StepDirection::Increment => current > end_n,
                StepDirection::Decrement => current < end_n,
            };
            if done {
                return Object::Null;
            }

            let result = self.eval_block(body, env);
            if self.halted(&result) {
                return result;
            }

            // Re-read after the body so user mutations of the counter stick,
            // then write a fresh Int back.
            let current = match self.counter_value(counter, counter_span, env) {
                Ok(value) => value,
                Err(err) => return err,
            };
            let next = match direction {
                StepDirection::Increment => current.checked_add(step_n),
                StepDirection::Decrement => current.checked_sub(step_n),
            };
            let next = match next {
                Some(value) => value,
                None => {
                    return Object::error(
                        RuntimeErrorKind::General {
                            message: String::from("整数がオーバーフローしました"),
                        },
                        counter_span,
                        String::from(counter),
                    )
                }
            };
            self.envs.set(env, counter, Object::Int(next));
        }
    }

    fn eval_int_clause(&mut self, expr: &Expr, env: EnvId) -> Result<i64, Object> {
        let value = self.eval_expr(expr, env);
        if self.halted(&value) {
            return Err(value);
        }
        match value {
            Object::Int(n) => Ok(n),
            other => Err(Object::error(
                RuntimeErrorKind::Type {
                    expected: String::from("整数"),
                    found: String::from(other.kind()),
                },
                expr.span(),
                expr.literal(),
            )),
        }
    }

    fn counter_value(&self, counter: &str, counter_span: Span, env: EnvId) -> Result<i64, Object> {
        match self.envs.get(env, counter) {
            Some(Object::Int(value)) => Ok(value),
            Some(other) => Err(Object::error(
                RuntimeErrorKind::Type {
                    expected: String::from("整数"),
                    found: String::from(other.kind()),
                },
                counter_span,
                String::from(counter),
            )),
            None => Err(Object::error(
                RuntimeErrorKind::Undefined {
                    name: String::from(counter),
                },
                counter_span,
                String::from(counter),
            )),
        }
    }

    fn eval_assign(&mut self, target: &Expr, value: &Expr, env: EnvId) -> Object {
        match target {
            Expr::Ident { name, .. } => {
                let value = self.eval_expr(value, env);
                if self.halted(&value) {
                    return value;
                }
                self.envs.set(env, name, value);
                Object::Null
            }
            Expr::Index { left, index, span } => {
                let array = self.eval_expr(left, env);
                if self.halted(&array) {
                    return array;
                }
                let items = match array {
                    Object::Array(items) => items,
                    other => {
                        return Object::error(
                            RuntimeErrorKind::Type {
                                expected: String::from("配列"),
                                found: String::from(other.kind()),
                            },
                            left.span(),
                            left.literal(),
                        )
                    }
                };

                let index_value = self.eval_expr(index, env);
                if self.halted(&index_value) {
                    return index_value;
                }
                let declared = match index_value {
                    Object::Int(n) => n,
                    other => {
                        return Object::error(
                            RuntimeErrorKind::Type {
                                expected: String::from("整数"),
                                found: String::from(other.kind()),
                            },
                            index.span(),
                            index.literal(),
                        )
                    }
                };

                let value = self.eval_expr(value, env);
                if self.halted(&value) {
                    return value;
                }

                let length = items.borrow().len();
                let pos = declared - self.origin();
                if pos < 0 || pos as usize >= length {
                    return Object::error(
                        RuntimeErrorKind::IndexOutOfRange {
                            index: declared,
                            length,
                        },
                        *span,
                        target.literal(),
                    );
                }
                items.borrow_mut()[pos as usize] = value;
                Object::Null
            }
            other => Object::error(
                RuntimeErrorKind::General {
                    message: String::from("代入先には変数か配列要素を指定してください"),
                },
                other.span(),
                other.literal(),
            ),
        }
    }

    fn eval_expr(&mut self, expr: &Expr, env: EnvId) -> Object {
        if self.cancelled {
            return Object::Null;
        }
        if self.config.debug_mode {
            self.debug_step(expr.span(), env);
            if self.cancelled {
                return Object::Null;
            }
        }

        match expr {
            Expr::Int { value, .. } => Object::Int(*value),
            Expr::Float { value, .. } => Object::Float(*value),
            Expr::Str { value, .. } => Object::Str(value.clone()),
            Expr::Bool { value, .. } => Object::Bool(*value),
            Expr::Ident { name, span } => self.lookup(name, *span, env),
            Expr::Array { elements, .. } => {
                let mut items = Vec::with_capacity(elements.len());
                for element in elements {
                    let value = self.eval_expr(element, env);
                    if self.halted(&value) {
                        return value;
                    }
                    items.push(value);
                }
                Object::array(items)
            }
            Expr::SystemInput { span } => self.read_input(*span),
            Expr::Prefix { op, right, span } => {
                let value = self.eval_expr(right, env);
                if self.halted(&value) {
                    return value;
                }
                self.eval_prefix(*op, value, *span, expr)
            }
            Expr::Infix {
                op, left, right, ..
            } if matches!(op, InfixOp::And | InfixOp::Or) => {
                let lhs = self.eval_expr(left, env);
                if self.halted(&lhs) {
                    return lhs;
                }
                match op {
                    InfixOp::And if !lhs.truthy() => return Object::Bool(false),
                    InfixOp::Or if lhs.truthy() => return Object::Bool(true),
                    _ => {}
                }
                let rhs = self.eval_expr(right, env);
                if self.halted(&rhs) {
                    return rhs;
                }
                Object::Bool(rhs.truthy())
            }
            Expr::Infix {
                op,
                left,
                right,
                span,
            } => {
                let lhs = self.eval_expr(left, env);
                if self.halted(&lhs) {
                    return lhs;
                }
                let rhs = self.eval_expr(right, env);
                if self.halted(&rhs) {
                    return rhs;
                }
                self.eval_infix(*op, lhs, rhs, *span, expr)
            }
            Expr::Index { left, index, span } => {
                let array = self.eval_expr(left, env);
                if self.halted(&array) {
                    return array;
                }
                let items = match array {
                    Object::Array(items) => items,
                    other => {
                        return Object::error(
                            RuntimeErrorKind::Type {
                                expected: String::from("配列"),
                                found: String::from(other.kind()),
                            },
                            left.span(),
                            left.literal(),
                        )
                    }
                };

                let index_value = self.eval_expr(index, env);
                if self.halted(&index_value) {
                    return index_value;
                }
                let declared = match index_value {
                    Object::Int(n) => n,
                    other => {
                        return Object::error(
                            RuntimeErrorKind::Type {
                                expected: String::from("整数"),
                                found: String::from(other.kind()),
                            },
                            index.span(),
                            index.literal(),
                        )
                    }
                };

                let length = items.borrow().len();
                let pos = declared - self.origin();
                if pos < 0 || pos as usize >= length {
                    return Object::error(
                        RuntimeErrorKind::IndexOutOfRange {
                            index: declared,
                            length,
                        },
                        *span,
                        expr.literal(),
                    );
                }
                let value = items.borrow()[pos as usize].clone();
                value
            }
            Expr::Call {
                function,
                args,
                span,
            } => self.eval_call(function, args, *span, env, expr),
            Expr::FunctionLiteral {
                name, params, body, ..
            } => Object::Function(Rc::new(FunctionObj {
                name: name.clone(),
                params: params.clone(),
                body: Rc::clone(body),
                env,
            })),
        }
    }

    // Variables shadow built-ins; an unbound name that is not a built-in is
    // an undefined-variable error.
    fn lookup(&mut self, name: &str, span: Span, env: EnvId) -> Object {
        if let Some(value) = self.envs.get(env, name) {
            return value;
        }
        if let Some(builtin) = BuiltIn::lookup(name) {
            return Object::Builtin(builtin);
        }
        Object::error(
            RuntimeErrorKind::Undefined {
                name: String::from(name),
            },
            span,
            String::from(name),
        )
    }

    fn read_input(&mut self, span: Span) -> Object {
        match self.host.input.next_input() {
            Input::Text(text) => parse_input(text),
            Input::Exhausted => Object::error(
                RuntimeErrorKind::General {
                    message: String::from("外部からの入力がありません"),
                },
                span,
                String::from("【外部からの入力】"),
            ),
            Input::Cancelled => {
                self.cancelled = true;
                Object::Null
            }
        }
    }

    fn eval_prefix(&mut self, op: PrefixOp, value: Object, span: Span, node: &Expr) -> Object {
        match (op, value) {
            (PrefixOp::Minus, Object::Int(n)) => match n.checked_neg() {
                Some(negated) => Object::Int(negated),
                None => Object::error(
                    RuntimeErrorKind::General {
                        message: String::from("整数がオーバーフローしました"),
                    },
                    span,
                    node.literal(),
                ),
            },
            (PrefixOp::Minus, Object::Float(x)) => Object::Float(-x),
            (PrefixOp::Plus, value @ (Object::Int(_) | Object::Float(_))) => value,
            (PrefixOp::Not, value) => Object::Bool(!value.truthy()),
            (_, other) => Object::error(
                RuntimeErrorKind::Type {
                    expected: String::from("数値"),
                    found: String::from(other.kind()),
                },
                span,
                node.literal(),
            ),
        }
    }

    // Arithmetic is strict same-kind; only the comparison operators promote
    // Int and Float to a common Float. `/` always yields Float, `//` always
    // yields Int.
    fn eval_infix(
        &mut self,
        op: InfixOp,
        lhs: Object,
        rhs: Object,
        span: Span,
        node: &Expr,
    ) -> Object {
        let type_error = |lhs: &Object, rhs: &Object, expected: &str| {
            Object::error(
                RuntimeErrorKind::Type {
                    expected: String::from(expected),
                    found: format!("{} と {}", lhs.kind(), rhs.kind()),
                },
                span,
                node.literal(),
            )
        };
        let zero_division = || {
            Object::error(
                RuntimeErrorKind::General {
                    message: String::from("0で割ることはできません"),
                },
                span,
                node.literal(),
            )
        };
        let overflow = || {
            Object::error(
                RuntimeErrorKind::General {
                    message: String::from("整数がオーバーフローしました"),
                },
                span,
                node.literal(),
            )
        };

        match op {
            InfixOp::Add => match (lhs, rhs) {
                (Object::Int(a), Object::Int(b)) => match a.checked_add(b) {
                    Some(n) => Object::Int(n),
                    None => overflow(),
                },
                (Object::Float(a), Object::Float(b)) => Object::Float(a + b),
                (Object::Str(a), Object::Str(b)) => Object::Str(a + &b),
                (Object::Array(a), Object::Array(b)) => {
                    let mut items = a.borrow().clone();
                    items.extend(b.borrow().iter().cloned());
                    Object::array(items)
                }
                (lhs, rhs) => type_error(&lhs, &rhs, "同じ型の数値・文字列・配列"),
            },
            InfixOp::Sub => match (lhs, rhs) {
                (Object::Int(a), Object::Int(b)) => match a.checked_sub(b) {
                    Some(n) => Object::Int(n),
                    None => overflow(),
                },
                (Object::Float(a), Object::Float(b)) => Object::Float(a - b),
                (lhs, rhs) => type_error(&lhs, &rhs, "同じ型の数値"),
            },
            InfixOp::Mul => match (lhs, rhs) {
                (Object::Int(a), Object::Int(b)) => match a.checked_mul(b) {
                    Some(n) => Object::Int(n),
                    None => overflow(),
                },
                (Object::Float(a), Object::Float(b)) => Object::Float(a * b),
                (lhs, rhs) => type_error(&lhs, &rhs, "同じ型の数値"),
            },
            InfixOp::Div => match (lhs, rhs) {
                (Object::Int(_), Object::Int(0)) => zero_division(),
                (Object::Int(a), Object::Int(b)) => Object::Float(a as f64 / b as f64),
                (Object::Float(a), Object::Float(b)) => {
                    if b == 0.0 {
                        zero_division()
                    } else {
                        Object::Float(a / b)
                    }
                }
                (lhs, rhs) => type_error(&lhs, &rhs, "同じ型の数値"),
            },
            InfixOp::IntDiv => match (lhs, rhs) {
                (Object::Int(_), Object::Int(0)) => zero_division(),
                (Object::Int(a), Object::Int(b)) => Object::Int(a / b),
                (Object::Float(a), Object::Float(b)) => {
                    if b == 0.0 {
                        zero_division()
                    } else {
                        Object::Int((a / b).trunc() as i64)
                    }
                }
                (lhs, rhs) => type_error(&lhs, &rhs, "同じ型の数値"),
            },
            InfixOp::Rem => match (lhs, rhs) {
                (Object::Int(_), Object::Int(0)) => zero_division(),
                (Object::Int(a), Object::Int(b)) => Object::Int(a % b),
                (Object::Float(a), Object::Float(b)) => {
                    if b == 0.0 {
                        zero_division()
                    } else {
                        Object::Float(a % b)
                    }
                }
                (lhs, rhs) => type_error(&lhs, &rhs, "同じ型の数値"),
            },
            InfixOp::Eq => Object::Bool(lhs == rhs),
            InfixOp::NotEq => Object::Bool(lhs != rhs),
            InfixOp::Lt | InfixOp::Gt | InfixOp::LtEq | InfixOp::GtEq => {
                let ordering = match (&lhs, &rhs) {
                    (Object::Str(a), Object::Str(b)) => a.partial_cmp(b),
                    _ => match (lhs.as_f64(), rhs.as_f64()) {
                        (Some(a), Some(b)) => a.partial_cmp(&b),
                        _ => return type_error(&lhs, &rhs, "数値同士か文字列同士"),
                    },
                };
                let ordering = match ordering {
                    Some(ordering) => ordering,
                    None => return Object::Bool(false),
                };
                let result = match op {
                    InfixOp::Lt => ordering.is_lt(),
                    InfixOp::Gt => ordering.is_gt(),
                    InfixOp::LtEq => ordering.is_le(),
                    _ => ordering.is_ge(),
                };
                Object::Bool(result)
            }
            InfixOp::And | InfixOp::Or => unreachable!("short-circuited before evaluation"),
        }
    }

    fn eval_call(
        &mut self,
        function: &Expr,
        args: &[Expr],
        span: Span,
        env: EnvId,
        node: &Expr,
    ) -> Object {
        let callee = self.eval_expr(function, env);
        if self.halted(&callee) {
            return callee;
        }

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            let value = self.eval_expr(arg, env);
            if self.halted(&value) {
                return value;
            }
            values.push(value);
        }

        match callee {
            Object::Builtin(builtin) => {
                if let Some(expected) = builtin.arity() {
                    if values.len() != expected {
                        return Object::error(
                            RuntimeErrorKind::ArgumentSize {
                                name: String::from(builtin.name()),
                                expected,
                                got: values.len(),
                            },
                            span,
                            node.literal(),
                        );
                    }
                }
                builtin.call(self, env, values, span, node.literal())
            }
            Object::Function(func) => self.call_function(&func, values, span, node),
            other => Object::error(
                RuntimeErrorKind::Type {
                    expected: String::from("関数"),
                    found: String::from(other.kind()),
                },
                function.span(),
                function.literal(),
            ),
        }
    }

    fn call_function(
        &mut self,
        func: &FunctionObj,
        args: Vec<Object>,
        span: Span,
        node: &Expr,
    ) -> Object {
        if self.call_depth >= MAX_CALL_DEPTH {
            return Object::error(
                RuntimeErrorKind::General {
                    message: String::from("関数呼び出しが深すぎます"),
                },
                span,
                node.literal(),
            );
        }

        // One fresh scope per call, chained off the *captured* environment,
        // so recursive calls never alias each other's parameter bindings.
        // User-function arity is deliberately unchecked: extra arguments are
        // dropped, missing parameters stay unbound.
        let local = self.envs.push_child(func.env);
        for (param, arg) in func.params.iter().zip(args) {
            self.envs.define(local, param, arg);
        }

        self.call_depth += 1;
        let result = self.eval_block(&func.body, local);
        self.call_depth -= 1;

        match result {
            Object::Return(value) => *value,
            err @ Object::Error(_) => err,
            _ => Object::Null,
        }
    }

    fn debug_step(&mut self, span: Span, env: EnvId) {
        let (line, _) = self.line_index.line_col(span.start);
        if line != self.last_line {
            self.host.sink.emit(Event::LineEvaluation(line));
            self.last_line = line;
        }

        let snapshot = self.envs.snapshot(env);
        let control = if let Some(hook) = self.host.hook.as_mut() {
            hook.before_node(span, line, &snapshot)
        } else if self.config.debug_delay_ms > 0 {
            self.host
                .pacer
                .sleep(Duration::from_millis(self.config.debug_delay_ms))
        } else {
            StepControl::Continue
        };
        self.host.sink.emit(Event::EnvironmentUpdate(snapshot));

        if control == StepControl::Cancel {
            self.cancelled = true;
        }
    }
}

// External input is coerced the way the language reads literals: an integer
// if it parses as one, then a float, otherwise the raw string.
fn parse_input(text: String) -> Object {
    let trimmed = text.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        return Object::Int(value);
    }
    if let Ok(value) = trimmed.parse::<f64>() {
        return Object::Float(value);
    }
    Object::Str(text)
}
