use std::rc::Rc;

use log::{trace, warn};
use tern_syntax::ast::{Case, Expr, Item, Source};

use crate::{
    environment::Environment,
    error::{make, Error, ErrorKind, Signal},
    ops, stdlib,
    types::{Callable, Func, Generator, Map, UserFunc, Value},
    Output,
};

pub trait Evaluate {
    fn evaluate(&self, env: &Environment) -> Result<Value, Signal>;
}

/// Owns the frozen root scope with the builtins and the program frame
/// below it. The program frame outlives single runs, so the REPL
/// keeps its variables between statements.
#[derive(Debug)]
pub struct Interpreter {
    root: Environment,
    env: Environment,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// An interpreter printing to stdout.
    pub fn new() -> Self {
        Self::with_output(stdlib::stdout())
    }

    pub fn with_output(out: Output) -> Self {
        let root = Environment::new();
        stdlib::init(&root, out);
        root.freeze();
        let env = root.new_frame();
        Self { root, env }
    }

    pub fn root(&self) -> &Environment {
        &self.root
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn interpret(&mut self, source: &Source) -> Result<Value, Error> {
        execute(source, &self.env)
    }
}

/// Run a whole compilation unit in `env`, yielding the value of the
/// last statement.
pub fn execute(source: &Source, env: &Environment) -> Result<Value, Error> {
    trace!("Interpreting {source:#?}");
    let mut last = Value::Null;
    for item in &source.items {
        match item.evaluate(env) {
            Ok(value) => last = value,
            Err(Signal::Return(value)) => return Ok(value),
            Err(Signal::Defer(call)) => {
                warn!("Discarding deferred call outside of a function: {call:?}")
            }
            Err(signal) => return Err(signal.into_error()),
        }
    }
    Ok(last)
}

/// Run `items` directly in `env`, yielding the value of the last one.
pub fn exec_block(items: &[Item], env: &Environment) -> Result<Value, Signal> {
    let mut last = Value::Null;
    for item in items {
        last = item.evaluate(env)?;
    }
    Ok(last)
}

/// Run one loop body in a fresh frame. `Ok(false)` means the loop
/// was broken out of.
fn exec_iteration(body: &[Item], frame: &Environment) -> Result<bool, Signal> {
    match exec_block(body, frame) {
        Ok(_) | Err(Signal::Continue) => Ok(true),
        Err(Signal::Break) => Ok(false),
        Err(signal) => Err(signal),
    }
}

pub(crate) fn call_func(
    func: &UserFunc,
    env: &Environment,
    args: Vec<Value>,
) -> Result<Value, Signal> {
    trace!("Calling {}", func.name);
    let frame = env.new_frame();
    for (param, arg) in func.params.iter().zip(args) {
        frame.define(param, arg)?;
    }
    let mut deferred = vec![];
    let mut result = Ok(Value::Null);
    for item in func.body.iter() {
        match item.evaluate(&frame) {
            Ok(_) => {}
            Err(Signal::Defer(call)) => deferred.push(call),
            Err(Signal::Return(value)) => {
                result = Ok(value);
                break;
            }
            Err(signal) => {
                result = Err(signal);
                break;
            }
        }
    }
    // Deferred calls run in the order they were met, and an error
    // from any of them replaces the result
    for call in deferred {
        call.evaluate(&frame)?;
    }
    result
}

impl Evaluate for Item {
    fn evaluate(&self, env: &Environment) -> Result<Value, Signal> {
        match self {
            Self::ExprStmt(expr) => expr.evaluate(env),
            Self::VarStmt { name, init } => {
                let value = init.as_ref().map(|expr| expr.evaluate(env)).transpose()?;
                env.declare(name)?;
                if let Some(value) = value {
                    env.set(name, value)?;
                }
                Ok(Value::Null)
            }
            Self::ConstStmt { name, value } => {
                let value = value.evaluate(env)?;
                env.declare_const(name, value)?;
                Ok(Value::Null)
            }
            Self::Function(decl) => {
                let func = UserFunc::from(decl);
                let name = func.name.clone();
                env.define(&name, Value::Func(Func::User(Rc::new(func))))?;
                Ok(Value::Null)
            }
            Self::IfStmt {
                condition,
                if_block,
                else_item,
            } => {
                if condition.evaluate(env)?.is_truthy() {
                    exec_block(if_block, &env.new_frame())?;
                } else if let Some(item) = else_item {
                    item.evaluate(env)?;
                }
                Ok(Value::Null)
            }
            Self::WhileStmt { condition, body } => {
                while condition.evaluate(env)?.is_truthy() {
                    if !exec_iteration(body, &env.new_frame())? {
                        break;
                    }
                }
                Ok(Value::Null)
            }
            Self::ForStmt {
                ident,
                iterable,
                body,
            } => {
                let iter = iterable.evaluate(env)?.to_iterator()?;
                while let Some(item) = iter.next_value()? {
                    let frame = env.new_frame();
                    frame.define(ident, item)?;
                    if !exec_iteration(body, &frame)? {
                        break;
                    }
                }
                Ok(Value::Null)
            }
            Self::SwitchStmt {
                subject,
                cases,
                default,
            } => {
                let subject = subject.evaluate(env)?;
                let frame = env.new_frame();
                match matching_case(&subject, cases, env)? {
                    Some(start) => run_cases(&cases[start..], default.as_deref(), &frame)?,
                    None => {
                        if let Some(body) = default {
                            run_default(body, &frame)?;
                        }
                    }
                }
                Ok(Value::Null)
            }
            Self::ReturnStmt(expr) => {
                let value = match expr {
                    Some(expr) => expr.evaluate(env)?,
                    None => Value::Null,
                };
                Err(Signal::Return(value))
            }
            Self::DeferStmt(call) => Err(Signal::Defer(call.clone())),
            Self::Break => Err(Signal::Break),
            Self::Continue => Err(Signal::Continue),
            Self::Fallthrough => Err(Signal::Fallthrough),
            Self::Block(items) => exec_block(items, &env.new_frame()),
        }
    }
}

/// Index of the first case holding a value equal to `subject`. Case
/// values are evaluated in order, stopping at the first match.
fn matching_case(
    subject: &Value,
    cases: &[Case],
    env: &Environment,
) -> Result<Option<usize>, Signal> {
    for (i, case) in cases.iter().enumerate() {
        for value in &case.values {
            if ops::equals(subject, &value.evaluate(env)?) {
                return Ok(Some(i));
            }
        }
    }
    Ok(None)
}

fn run_cases(
    cases: &[Case],
    default: Option<&[Item]>,
    frame: &Environment,
) -> Result<(), Signal> {
    for case in cases {
        match exec_block(&case.body, frame) {
            Err(Signal::Fallthrough) => continue,
            other => return other.map(|_| ()),
        }
    }
    // Falling through the last case lands in the default
    match default {
        Some(body) => run_default(body, frame),
        None => Ok(()),
    }
}

fn run_default(body: &[Item], frame: &Environment) -> Result<(), Signal> {
    match exec_block(body, frame) {
        Ok(_) | Err(Signal::Fallthrough) => Ok(()),
        Err(signal) => Err(signal),
    }
}

/// A resolved assignment target. Object and index expressions are
/// evaluated once, so `xs[f()] += 1` calls `f` a single time.
enum Place {
    Var(String),
    Attr(Value, String),
    Index(Value, Value),
}

impl Place {
    fn resolve(target: &Expr, env: &Environment) -> Result<Self, Signal> {
        let place = match target {
            Expr::Ident(name) => Self::Var(name.clone()),
            Expr::FieldGet { object, field } => Self::Attr(object.evaluate(env)?, field.clone()),
            Expr::Index { object, index } => {
                Self::Index(object.evaluate(env)?, index.evaluate(env)?)
            }
            _ => {
                return Err(make(ErrorKind::SyntaxError, "invalid assignment target").into())
            }
        };
        Ok(place)
    }

    fn load(&self, env: &Environment) -> Result<Value, Error> {
        match self {
            Self::Var(name) => env.get(name),
            Self::Attr(object, name) => object.get_attr(name),
            Self::Index(object, index) => object.get_index(index),
        }
    }

    fn store(&self, env: &Environment, value: Value) -> Result<(), Error> {
        match self {
            Self::Var(name) => env.set(name, value),
            Self::Attr(object, name) => object.set_attr(name, value),
            Self::Index(object, index) => object.set_index(index, value),
        }
    }
}

impl Evaluate for Expr {
    fn evaluate(&self, env: &Environment) -> Result<Value, Signal> {
        match self {
            Self::Literal(literal) => Ok(Value::from(literal)),
            Self::Ident(name) => Ok(env.get(name)?),
            Self::List(items) => {
                let items = items
                    .iter()
                    .map(|item| item.evaluate(env))
                    .collect::<Result<_, _>>()?;
                Ok(Value::new_list(items))
            }
            Self::Map(entries) => {
                let mut map = Map::default();
                for (key, value) in entries {
                    let key = key.evaluate(env)?;
                    map.insert(key, value.evaluate(env)?)?;
                }
                Ok(Value::new_map(map))
            }
            Self::Range { start, stop, step } => {
                let start = start.evaluate(env)?;
                let stop = stop.evaluate(env)?;
                let step = match step {
                    Some(step) => step.evaluate(env)?,
                    None => Value::Int(1),
                };
                Ok(Value::Generator(Rc::new(Generator::range(start, stop, step)?)))
            }
            Self::Unary { op, expr } => Ok(ops::unary(*op, &expr.evaluate(env)?)?),
            // Both operands are always evaluated, `&&` and `||` included
            Self::Binary { lhs, op, rhs } => {
                let lhs = lhs.evaluate(env)?;
                let rhs = rhs.evaluate(env)?;
                Ok(ops::binary(&lhs, *op, &rhs)?)
            }
            Self::Cast { expr, ty } => {
                let value = expr.evaluate(env)?;
                match ty.evaluate(env)? {
                    Value::Type(ty) => Ok(ty.cast(&value)?),
                    other => Err(make(
                        ErrorKind::TypeError,
                        format!("`as` expects a type, found `{}`", other.type_of()),
                    )
                    .into()),
                }
            }
            Self::FieldGet { object, field } => Ok(object.evaluate(env)?.get_attr(field)?),
            Self::Index { object, index } => {
                let object = object.evaluate(env)?;
                Ok(object.get_index(&index.evaluate(env)?)?)
            }
            Self::Assignment { target, value } => {
                let place = Place::resolve(target, env)?;
                let value = value.evaluate(env)?;
                place.store(env, value.clone())?;
                Ok(value)
            }
            Self::Reassignment { target, op, value } => {
                let place = Place::resolve(target, env)?;
                let current = place.load(env)?;
                let value = ops::binary(&current, *op, &value.evaluate(env)?)?;
                place.store(env, value.clone())?;
                Ok(value)
            }
            Self::Update { target, op } => {
                let place = Place::resolve(target, env)?;
                let old = place.load(env)?;
                place.store(env, ops::update(*op, &old)?)?;
                Ok(old)
            }
            Self::Call { func, args } => {
                let callee = func.evaluate(env)?;
                let func = callee.to_callable()?;
                let args = args
                    .iter()
                    .map(|arg| arg.evaluate(env))
                    .collect::<Result<_, _>>()?;
                func.call(env, args)
            }
            Self::Func(decl) => Ok(Value::Func(Func::User(Rc::new(UserFunc::from(decl))))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_syntax::{
        ast::{BinOp, FuncDecl, Literal},
        parse,
    };

    fn int(n: i64) -> Expr {
        Expr::Literal(Literal::Int(n))
    }

    fn ident(name: &str) -> Expr {
        Expr::Ident(name.to_string())
    }

    fn eval(src: &str) -> Result<Value, Error> {
        Interpreter::new().interpret(&parse(src)?)
    }

    #[test]
    fn var_stmt() {
        let env = Environment::new();
        let item = Item::VarStmt {
            name: "x".to_string(),
            init: Some(int(5)),
        };
        assert!(item.evaluate(&env).is_ok());
        assert_eq!(env.get("x").unwrap(), Value::Int(5));

        let item = Item::VarStmt {
            name: "y".to_string(),
            init: None,
        };
        assert!(item.evaluate(&env).is_ok());
        assert_eq!(env.get("y").unwrap_err().kind, ErrorKind::ValueError);
    }

    #[test]
    fn if_stmt_runs_in_a_new_frame() {
        let env = Environment::new();
        let item = Item::IfStmt {
            condition: Expr::Literal(Literal::Boolean(true)),
            if_block: vec![Item::VarStmt {
                name: "x".to_string(),
                init: Some(int(1)),
            }],
            else_item: None,
        };
        assert!(item.evaluate(&env).is_ok());
        assert!(!env.has("x"));
    }

    #[test]
    fn while_stmt() {
        let env = Environment::new();
        env.define("i", Value::Int(0)).unwrap();
        let item = Item::WhileStmt {
            condition: Expr::Binary {
                lhs: Box::new(ident("i")),
                op: BinOp::Less,
                rhs: Box::new(int(3)),
            },
            body: vec![Item::ExprStmt(Expr::Reassignment {
                target: Box::new(ident("i")),
                op: BinOp::Plus,
                value: Box::new(int(1)),
            })],
        };
        assert!(item.evaluate(&env).is_ok());
        assert_eq!(env.get("i").unwrap(), Value::Int(3));
    }

    #[test]
    fn expr() {
        assert_eq!(eval("3 + 2"), Ok(Value::Int(5)));
        assert_eq!(eval("10 / 2"), Ok(Value::Float(5.0)));
        assert_eq!(eval("2 * (-3 + 1)"), Ok(Value::Int(-4)));
        assert_eq!(eval("2 ** 3 ** 2"), Ok(Value::Int(512)));
        assert_eq!(eval("(\"4\" as int) + 1"), Ok(Value::Int(5)));
        assert_eq!(eval("null == null"), Ok(Value::Boolean(true)));
        assert_eq!(eval("[] == []"), Ok(Value::Boolean(false)));
        assert_eq!(eval("var xs = []\nxs == xs"), Ok(Value::Boolean(true)));
    }

    #[test]
    fn cast_needs_a_type() {
        let err = eval("var t = 1\n2 as t").unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
    }

    #[test]
    fn updates_return_the_old_value() {
        assert_eq!(eval("var x = 1\nx++"), Ok(Value::Int(1)));
        assert_eq!(eval("var x = 1\nx++\nx"), Ok(Value::Int(2)));
        assert_eq!(eval("var x = [1]\nx[0] += 5\nx[0]"), Ok(Value::Int(6)));
    }

    #[test]
    fn call_func_chains_to_the_caller() {
        let env = Environment::new();
        let func = UserFunc::from(&FuncDecl {
            name: Some("f".to_string()),
            params: vec!["a".to_string()],
            body: vec![Item::ReturnStmt(Some(Expr::Binary {
                lhs: Box::new(ident("a")),
                op: BinOp::Plus,
                rhs: Box::new(ident("outer")),
            }))]
            .into(),
        });
        env.define("outer", Value::Int(10)).unwrap();
        let result = call_func(&func, &env, vec![Value::Int(1)]).unwrap();
        assert_eq!(result, Value::Int(11));
        // Parameters live in the call frame only
        assert!(!env.has("a"));
    }

    #[test]
    fn arity_is_checked() {
        let err = eval("func f(a) {}\nf(1, 2)").unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
    }

    #[test]
    fn deferred_calls_run_after_return() {
        let src = "var log = []
func f() {
    defer log.append(1)
    defer log.append(2)
    log.append(0)
    return 7
}
f()
log";
        let value = eval(src).unwrap();
        assert_eq!(value.to_string(), "[0, 1, 2]");
    }

    #[test]
    fn stray_signals_are_errors() {
        let err = eval("break").unwrap_err();
        assert_eq!(err.kind, ErrorKind::SyntaxError);
        let err = eval("continue").unwrap_err();
        assert_eq!(err.kind, ErrorKind::SyntaxError);
        let err = eval("fallthrough").unwrap_err();
        assert_eq!(err.kind, ErrorKind::SyntaxError);
        assert_eq!(eval("return 4\n5"), Ok(Value::Int(4)));
        assert_eq!(eval("defer f()\n1"), Ok(Value::Int(1)));
    }

    #[test]
    fn interpreter_keeps_program_frame() {
        let mut interpreter = Interpreter::new();
        interpreter.interpret(&parse("var x = 2").unwrap()).unwrap();
        let value = interpreter.interpret(&parse("x * 21").unwrap()).unwrap();
        assert_eq!(value, Value::Int(42));
        assert!(interpreter.root().is_frozen());
        assert!(interpreter.env().has("x"));
    }
}
