use std::{
    cell::{Cell, RefCell},
    fmt::{Debug, Display},
    rc::Rc,
};

use rustc_hash::FxHashMap;
use tern_syntax::ast::{BinOp, Body, FuncDecl, Literal};

use crate::{
    environment::Environment,
    error::{make, Error, ErrorKind, Signal},
    interpret::call_func,
    ops,
};

/// First-class type descriptors, one per kind of value.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Type {
    Null,
    Bool,
    Int,
    Uint,
    Float,
    Str,
    Bytes,
    List,
    Map,
    Func,
    Generator,
    Iterator,
    Module,
    Type,
}

impl Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Type {
    pub const ALL: [Self; 14] = [
        Self::Null,
        Self::Bool,
        Self::Int,
        Self::Uint,
        Self::Float,
        Self::Str,
        Self::Bytes,
        Self::List,
        Self::Map,
        Self::Func,
        Self::Generator,
        Self::Iterator,
        Self::Module,
        Self::Type,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Uint => "uint",
            Self::Float => "float",
            Self::Str => "str",
            Self::Bytes => "bytes",
            Self::List => "list",
            Self::Map => "map",
            Self::Func => "func",
            Self::Generator => "generator",
            Self::Iterator => "iterator",
            Self::Module => "module",
            Self::Type => "type",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Bool | Self::Int | Self::Uint | Self::Float)
    }

    /// Convert `value` into this type, as done by `value as T`.
    pub fn cast(self, value: &Value) -> Result<Value, Error> {
        match self {
            Self::Bool => value.to_bool().map(Value::Boolean),
            Self::Int => value.to_int().map(Value::Int),
            Self::Uint => value.to_uint().map(Value::Uint),
            Self::Float => value.to_float().map(Value::Float),
            Self::Str => Ok(Value::Str(value.to_string())),
            Self::Bytes => value.to_bytes().map(Value::Bytes),
            _ => Err(make(
                ErrorKind::TypeError,
                format!("cannot cast `{}` to `{self}`", value.type_of()),
            )),
        }
    }
}

#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Boolean(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Rc<RefCell<Vec<Value>>>),
    Map(Rc<RefCell<Map>>),
    Func(Func),
    Generator(Rc<Generator>),
    Iterator(Rc<Cursor>),
    Module(Rc<Module>),
    Type(Type),
}

/// Structural equality of scalars and identity of everything else.
/// Guest `==` lives in [`ops::equals`], which also promotes numbers.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Uint(a), Self::Uint(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b),
            (Self::Map(a), Self::Map(b)) => Rc::ptr_eq(a, b),
            (Self::Func(a), Self::Func(b)) => a.ptr_eq(b),
            (Self::Generator(a), Self::Generator(b)) => Rc::ptr_eq(a, b),
            (Self::Iterator(a), Self::Iterator(b)) => Rc::ptr_eq(a, b),
            (Self::Module(a), Self::Module(b)) => Rc::ptr_eq(a, b),
            (Self::Type(a), Self::Type(b)) => a == b,
            _ => false,
        }
    }
}

impl From<&Literal> for Value {
    fn from(literal: &Literal) -> Self {
        match literal {
            Literal::Int(n) => Self::Int(*n),
            Literal::Uint(n) => Self::Uint(*n),
            Literal::Float(n) => Self::Float(*n),
            Literal::Str(s) => Self::Str(s.clone()),
            Literal::Bytes(b) => Self::Bytes(b.clone()),
            Literal::Boolean(b) => Self::Boolean(*b),
            Literal::Null => Self::Null,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Uint(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n:?}"),
            Self::Str(s) => f.write_str(s),
            Self::Bytes(b) => {
                f.write_str("0x")?;
                b.iter().try_for_each(|byte| write!(f, "{byte:02x}"))
            }
            Self::List(list) => {
                f.write_str("[")?;
                for (i, item) in list.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    f.write_str(&item.repr())?;
                }
                f.write_str("]")
            }
            Self::Map(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.borrow().entries().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key.repr(), value.repr())?;
                }
                f.write_str("}")
            }
            Self::Func(func) => write!(f, "{func}"),
            Self::Generator(g) => write!(f, "<generator {}>", g.name),
            Self::Iterator(_) => f.write_str("<iterator>"),
            Self::Module(m) => write!(f, "<module {}>", m.name),
            Self::Type(t) => write!(f, "<type {t}>"),
        }
    }
}

impl Value {
    pub fn new_list(items: Vec<Value>) -> Self {
        Self::List(Rc::new(RefCell::new(items)))
    }

    pub fn new_map(map: Map) -> Self {
        Self::Map(Rc::new(RefCell::new(map)))
    }

    pub fn type_of(&self) -> Type {
        match self {
            Self::Null => Type::Null,
            Self::Boolean(_) => Type::Bool,
            Self::Int(_) => Type::Int,
            Self::Uint(_) => Type::Uint,
            Self::Float(_) => Type::Float,
            Self::Str(_) => Type::Str,
            Self::Bytes(_) => Type::Bytes,
            Self::List(_) => Type::List,
            Self::Map(_) => Type::Map,
            Self::Func(_) => Type::Func,
            Self::Generator(_) => Type::Generator,
            Self::Iterator(_) => Type::Iterator,
            Self::Module(_) => Type::Module,
            Self::Type(_) => Type::Type,
        }
    }

    /// Rendering used inside containers and by the REPL, where
    /// strings are quoted.
    pub fn repr(&self) -> String {
        match self {
            Self::Str(s) => format!("{s:?}"),
            _ => self.to_string(),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Boolean(b) => *b,
            Self::Int(n) => *n != 0,
            Self::Uint(n) => *n != 0,
            Self::Float(n) => *n != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::Bytes(b) => !b.is_empty(),
            Self::List(list) => !list.borrow().is_empty(),
            Self::Map(map) => !map.borrow().is_empty(),
            _ => true,
        }
    }

    fn unsupported(&self, target: Type) -> Error {
        make(
            ErrorKind::TypeError,
            format!("cannot convert `{}` to `{target}`", self.type_of()),
        )
    }

    fn out_of_range(&self, target: Type) -> Error {
        make(
            ErrorKind::ValueError,
            format!("{} is out of range for `{target}`", self.repr()),
        )
    }

    pub fn to_int(&self) -> Result<i64, Error> {
        match self {
            Self::Boolean(b) => Ok(*b as i64),
            Self::Int(n) => Ok(*n),
            Self::Uint(n) => i64::try_from(*n).map_err(|_| self.out_of_range(Type::Int)),
            Self::Float(n) if n.is_finite() && *n >= i64::MIN as f64 && *n < i64::MAX as f64 => {
                Ok(n.trunc() as i64)
            }
            Self::Float(_) => Err(self.out_of_range(Type::Int)),
            Self::Str(s) => s.trim().parse().map_err(|_| {
                make(
                    ErrorKind::ValueError,
                    format!("invalid literal for `int`: {}", self.repr()),
                )
            }),
            _ => Err(self.unsupported(Type::Int)),
        }
    }

    pub fn to_uint(&self) -> Result<u64, Error> {
        match self {
            Self::Boolean(b) => Ok(*b as u64),
            Self::Int(n) => u64::try_from(*n).map_err(|_| self.out_of_range(Type::Uint)),
            Self::Uint(n) => Ok(*n),
            Self::Float(n) if n.is_finite() && *n > -1.0 && *n < u64::MAX as f64 => {
                Ok(n.trunc() as u64)
            }
            Self::Float(_) => Err(self.out_of_range(Type::Uint)),
            Self::Str(s) => s.trim().parse().map_err(|_| {
                make(
                    ErrorKind::ValueError,
                    format!("invalid literal for `uint`: {}", self.repr()),
                )
            }),
            _ => Err(self.unsupported(Type::Uint)),
        }
    }

    pub fn to_float(&self) -> Result<f64, Error> {
        match self {
            Self::Boolean(b) => Ok(*b as u8 as f64),
            Self::Int(n) => Ok(*n as f64),
            Self::Uint(n) => Ok(*n as f64),
            Self::Float(n) => Ok(*n),
            Self::Str(s) => s.trim().parse().map_err(|_| {
                make(
                    ErrorKind::ValueError,
                    format!("invalid literal for `float`: {}", self.repr()),
                )
            }),
            _ => Err(self.unsupported(Type::Float)),
        }
    }

    pub fn to_bool(&self) -> Result<bool, Error> {
        match self {
            Self::Null => Ok(false),
            Self::Boolean(b) => Ok(*b),
            Self::Int(_) | Self::Uint(_) | Self::Float(_) => Ok(self.is_truthy()),
            Self::Str(s) => match s.as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(make(
                    ErrorKind::ValueError,
                    format!("invalid literal for `bool`: {}", self.repr()),
                )),
            },
            _ => Err(self.unsupported(Type::Bool)),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        match self {
            Self::Str(s) => Ok(s.as_bytes().to_vec()),
            Self::Bytes(b) => Ok(b.clone()),
            Self::List(list) => list
                .borrow()
                .iter()
                .map(|item| {
                    item.to_uint()
                        .ok()
                        .filter(|_| matches!(item, Self::Int(_) | Self::Uint(_)))
                        .and_then(|n| u8::try_from(n).ok())
                        .ok_or_else(|| {
                            make(
                                ErrorKind::ValueError,
                                format!("{} is not a byte", item.repr()),
                            )
                        })
                })
                .collect(),
            _ => Err(self.unsupported(Type::Bytes)),
        }
    }

    pub fn to_callable(&self) -> Result<&Func, Error> {
        match self {
            Self::Func(func) => Ok(func),
            _ => Err(make(
                ErrorKind::TypeError,
                format!("`{}` is not callable", self.type_of()),
            )),
        }
    }

    /// A cursor for `for` loops. Generators and iterators are their
    /// own cursors, so iterating them twice resumes where they stopped.
    pub fn to_iterator(&self) -> Result<Rc<dyn Iterable>, Error> {
        let items = match self {
            Self::Generator(g) => return Ok(g.clone()),
            Self::Iterator(c) => return Ok(c.clone()),
            Self::List(list) => Items::List(list.clone()),
            Self::Map(map) => {
                let keys = map.borrow().keys();
                Items::Keys {
                    map: map.clone(),
                    len: keys.len(),
                    keys,
                }
            }
            Self::Str(s) => Items::Chars(s.chars().collect()),
            Self::Bytes(b) => Items::Bytes(b.clone()),
            _ => {
                return Err(make(
                    ErrorKind::TypeError,
                    format!("`{}` is not iterable", self.type_of()),
                ))
            }
        };
        Ok(Rc::new(Cursor::new(items)))
    }

    pub fn hash_bytes(&self) -> Result<Vec<u8>, Error> {
        Ok(match self {
            Self::Null => vec![],
            Self::Boolean(b) => vec![*b as u8],
            Self::Int(n) => n.to_be_bytes().to_vec(),
            Self::Uint(n) => n.to_be_bytes().to_vec(),
            Self::Float(n) => n.to_bits().to_be_bytes().to_vec(),
            Self::Str(s) => s.as_bytes().to_vec(),
            Self::Bytes(b) => b.clone(),
            Self::List(list) => {
                let mut bytes = vec![];
                for item in list.borrow().iter() {
                    let hash = item.hash_bytes()?;
                    bytes.extend((hash.len() as u64).to_be_bytes());
                    bytes.extend(hash);
                }
                bytes
            }
            Self::Type(t) => t.name().as_bytes().to_vec(),
            Self::Generator(g) => (Rc::as_ptr(g) as usize).to_be_bytes().to_vec(),
            Self::Iterator(c) => (Rc::as_ptr(c) as usize).to_be_bytes().to_vec(),
            Self::Func(_) | Self::Map(_) | Self::Module(_) => {
                return Err(make(
                    ErrorKind::TypeError,
                    format!("unhashable type `{}`", self.type_of()),
                ))
            }
        })
    }

    pub fn len(&self) -> Result<usize, Error> {
        match self {
            Self::Str(s) => Ok(s.chars().count()),
            Self::Bytes(b) => Ok(b.len()),
            Self::List(list) => Ok(list.borrow().len()),
            Self::Map(map) => Ok(map.borrow().len()),
            _ => Err(make(
                ErrorKind::TypeError,
                format!("`{}` has no length", self.type_of()),
            )),
        }
    }

    pub fn get_index(&self, index: &Value) -> Result<Value, Error> {
        match self {
            Self::List(list) => {
                let list = list.borrow();
                Ok(list[position(index, list.len())?].clone())
            }
            Self::Map(map) => map.borrow().get(index)?.ok_or_else(|| missing_key(index)),
            Self::Str(s) => {
                let pos = position(index, s.chars().count())?;
                Ok(Self::Str(s.chars().skip(pos).take(1).collect()))
            }
            Self::Bytes(b) => Ok(Self::Uint(b[position(index, b.len())?] as u64)),
            _ => Err(make(
                ErrorKind::TypeError,
                format!("`{}` is not indexable", self.type_of()),
            )),
        }
    }

    pub fn set_index(&self, index: &Value, value: Value) -> Result<(), Error> {
        match self {
            Self::List(list) => {
                let mut list = list.borrow_mut();
                let pos = position(index, list.len())?;
                list[pos] = value;
                Ok(())
            }
            Self::Map(map) => map.borrow_mut().insert(index.clone(), value).map(|_| ()),
            _ => Err(make(
                ErrorKind::TypeError,
                format!("`{}` does not support item assignment", self.type_of()),
            )),
        }
    }

    pub fn get_attr(&self, name: &str) -> Result<Value, Error> {
        let attr = match self {
            Self::List(list) => list_method(list, name),
            Self::Map(map) => map_method(map, name),
            Self::Str(s) => str_method(s, name),
            Self::Generator(_) | Self::Iterator(_) if name == "next" => {
                let cursor = self.to_iterator()?;
                Some(method("next", Arity::Exact(0), move |_| {
                    Ok(cursor.next_value()?.unwrap_or(Value::Null))
                }))
            }
            Self::Module(module) if module.env.has(name) => Some(module.env.get(name)?),
            _ => None,
        };
        attr.ok_or_else(|| no_attribute(self, name))
    }

    pub fn set_attr(&self, name: &str, _value: Value) -> Result<(), Error> {
        if let Self::Module(module) = self {
            return Err(make(
                ErrorKind::AttributeError,
                format!("module `{}` is read-only", module.name),
            ));
        }
        self.get_attr(name)?;
        Err(make(
            ErrorKind::AttributeError,
            format!("`{name}` is not assignable"),
        ))
    }
}

fn no_attribute(value: &Value, name: &str) -> Error {
    let msg = match value {
        Value::Module(module) => format!(
            "module `{}` has no attribute `{name}`, it has: {}",
            module.name,
            module.env.names().join(", ")
        ),
        _ => format!("`{}` has no attribute `{name}`", value.type_of()),
    };
    make(ErrorKind::AttributeError, msg)
}

fn missing_key(key: &Value) -> Error {
    make(ErrorKind::KeyError, format!("{} not found", key.repr()))
}

/// Bounds-checked conversion of a guest index.
fn position(index: &Value, len: usize) -> Result<usize, Error> {
    let pos = match index {
        Value::Int(n) => usize::try_from(*n).ok(),
        Value::Uint(n) => usize::try_from(*n).ok(),
        _ => {
            return Err(make(
                ErrorKind::IndexError,
                format!("indices must be integers, found `{}`", index.type_of()),
            ))
        }
    };
    pos.filter(|pos| *pos < len).ok_or_else(|| {
        make(
            ErrorKind::IndexError,
            format!("index {index} is out of range for length {len}"),
        )
    })
}

fn method(
    name: &str,
    arity: Arity,
    body: impl Fn(Vec<Value>) -> Result<Value, Error> + 'static,
) -> Value {
    Value::Func(Func::Native(Rc::new(NativeFunc::new(name, arity, body))))
}

fn list_method(list: &Rc<RefCell<Vec<Value>>>, name: &str) -> Option<Value> {
    let list = list.clone();
    let value = match name {
        "append" => method(name, Arity::Exact(1), move |mut args| {
            list.borrow_mut().append(&mut args);
            Ok(Value::Null)
        }),
        "pop" => method(name, Arity::Exact(0), move |_| {
            list.borrow_mut()
                .pop()
                .ok_or_else(|| make(ErrorKind::IndexError, "pop from an empty list"))
        }),
        "insert" => method(name, Arity::Exact(2), move |mut args| {
            let value = args.pop().unwrap_or(Value::Null);
            let mut list = list.borrow_mut();
            // Inserting right after the last element is allowed
            let pos = position(&args[0], list.len() + 1)?;
            list.insert(pos, value);
            Ok(Value::Null)
        }),
        "contains" => method(name, Arity::Exact(1), move |args| {
            let found = list.borrow().iter().any(|item| ops::equals(item, &args[0]));
            Ok(Value::Boolean(found))
        }),
        _ => return None,
    };
    Some(value)
}

fn map_method(map: &Rc<RefCell<Map>>, name: &str) -> Option<Value> {
    let map = map.clone();
    let value = match name {
        "get" => method(name, Arity::Range(1, 2), move |args| {
            match (map.borrow().get(&args[0])?, args.get(1)) {
                (Some(value), _) => Ok(value),
                (None, Some(default)) => Ok(default.clone()),
                (None, None) => Err(missing_key(&args[0])),
            }
        }),
        "set" => method(name, Arity::Exact(2), move |mut args| {
            let value = args.pop().unwrap_or(Value::Null);
            let key = args.pop().unwrap_or(Value::Null);
            map.borrow_mut().insert(key, value).map(Value::Boolean)
        }),
        "has" => method(name, Arity::Exact(1), move |args| {
            map.borrow().contains_key(&args[0]).map(Value::Boolean)
        }),
        "delete" => method(name, Arity::Exact(1), move |args| {
            map.borrow_mut().remove(&args[0]).map(Value::Boolean)
        }),
        "keys" => method(name, Arity::Exact(0), move |_| {
            Ok(Value::new_list(map.borrow().keys()))
        }),
        "values" => method(name, Arity::Exact(0), move |_| {
            Ok(Value::new_list(map.borrow().values()))
        }),
        _ => return None,
    };
    Some(value)
}

fn str_method(s: &str, name: &str) -> Option<Value> {
    let s = s.to_string();
    let value = match name {
        "upper" => method(name, Arity::Exact(0), move |_| Ok(Value::Str(s.to_uppercase()))),
        "lower" => method(name, Arity::Exact(0), move |_| Ok(Value::Str(s.to_lowercase()))),
        "split" => method(name, Arity::Exact(1), move |args| {
            let sep = expect_str(&args[0])?;
            if sep.is_empty() {
                return Err(make(ErrorKind::ValueError, "empty separator"));
            }
            let parts = s.split(sep).map(|part| Value::Str(part.to_string()));
            Ok(Value::new_list(parts.collect()))
        }),
        "contains" => method(name, Arity::Exact(1), move |args| {
            Ok(Value::Boolean(s.contains(expect_str(&args[0])?)))
        }),
        _ => return None,
    };
    Some(value)
}

fn expect_str(value: &Value) -> Result<&str, Error> {
    match value {
        Value::Str(s) => Ok(s),
        _ => Err(make(
            ErrorKind::TypeError,
            format!("expected `str`, found `{}`", value.type_of()),
        )),
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    /// Inclusive on both ends
    Range(usize, usize),
    Variadic,
}

impl Display for Arity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact(1) => f.write_str("1 argument"),
            Self::Exact(n) => write!(f, "{n} arguments"),
            Self::Range(min, max) => write!(f, "{min} to {max} arguments"),
            Self::Variadic => f.write_str("any number of arguments"),
        }
    }
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Self::Exact(n) => count == n,
            Self::Range(min, max) => (min..=max).contains(&count),
            Self::Variadic => true,
        }
    }
}

pub trait Callable {
    fn arity(&self) -> Arity;
    fn call(&self, env: &Environment, args: Vec<Value>) -> Result<Value, Signal>;
}

/// A function defined in guest code. It holds no environment: calls
/// run in a frame chained to the caller.
#[derive(Debug)]
pub struct UserFunc {
    pub name: String,
    pub params: Vec<String>,
    pub body: Body,
}

impl From<&FuncDecl> for UserFunc {
    fn from(decl: &FuncDecl) -> Self {
        Self {
            name: decl.name.clone().unwrap_or_else(|| "<anonymous>".to_string()),
            params: decl.params.clone(),
            body: decl.body.clone(),
        }
    }
}

impl Callable for UserFunc {
    fn arity(&self) -> Arity {
        Arity::Exact(self.params.len())
    }

    fn call(&self, env: &Environment, args: Vec<Value>) -> Result<Value, Signal> {
        call_func(self, env, args)
    }
}

pub struct NativeFunc {
    pub name: String,
    pub arity: Arity,
    pub body: Rc<dyn Fn(Vec<Value>) -> Result<Value, Error>>,
}

impl NativeFunc {
    pub fn new(
        name: impl Into<String>,
        arity: Arity,
        body: impl Fn(Vec<Value>) -> Result<Value, Error> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            arity,
            body: Rc::new(body),
        }
    }
}

impl Debug for NativeFunc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeFunc")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

impl Callable for NativeFunc {
    fn arity(&self) -> Arity {
        self.arity
    }

    fn call(&self, _: &Environment, args: Vec<Value>) -> Result<Value, Signal> {
        (self.body)(args).map_err(Signal::from)
    }
}

#[derive(Clone, Debug)]
pub enum Func {
    User(Rc<UserFunc>),
    Native(Rc<NativeFunc>),
}

impl Display for Func {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(func) => write!(f, "<func {}({})>", func.name, func.params.join(", ")),
            Self::Native(func) => write!(f, "<native func {}>", func.name),
        }
    }
}

impl Func {
    pub fn name(&self) -> &str {
        match self {
            Self::User(func) => &func.name,
            Self::Native(func) => &func.name,
        }
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::User(a), Self::User(b)) => Rc::ptr_eq(a, b),
            (Self::Native(a), Self::Native(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Callable for Func {
    fn arity(&self) -> Arity {
        match self {
            Self::User(func) => func.arity(),
            Self::Native(func) => func.arity(),
        }
    }

    fn call(&self, env: &Environment, args: Vec<Value>) -> Result<Value, Signal> {
        let arity = self.arity();
        if !arity.accepts(args.len()) {
            return Err(make(
                ErrorKind::TypeError,
                format!(
                    "`{}` takes {arity} but {} were given",
                    self.name(),
                    args.len()
                ),
            )
            .into());
        }
        match self {
            Self::User(func) => func.call(env, args),
            Self::Native(func) => func.call(env, args),
        }
    }
}

/// Pull-based iteration shared by generators and cursors.
pub trait Iterable {
    /// `None` once exhausted, and on every call after that.
    fn next_value(&self) -> Result<Option<Value>, Error>;
}

type Producer = Box<dyn FnMut() -> Result<Option<Value>, Error>>;

pub struct Generator {
    pub name: String,
    state: RefCell<Producer>,
}

impl Debug for Generator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generator")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Generator {
    pub fn new(
        name: impl Into<String>,
        producer: impl FnMut() -> Result<Option<Value>, Error> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            state: RefCell::new(Box::new(producer)),
        }
    }

    /// Counts from `start` towards `stop` (exclusive) by `step`.
    pub fn range(start: Value, stop: Value, step: Value) -> Result<Self, Error> {
        for bound in [&start, &stop, &step] {
            if !bound.type_of().is_numeric() {
                return Err(make(
                    ErrorKind::TypeError,
                    format!("range bounds must be numbers, found `{}`", bound.type_of()),
                ));
            }
        }
        if ops::equals(&step, &Value::Int(0)) {
            return Err(make(ErrorKind::ValueError, "range step cannot be zero"));
        }
        let bound = if ops::compare(BinOp::Less, &step, &Value::Int(0))? {
            BinOp::Greater
        } else {
            BinOp::Less
        };
        let mut next = start;
        Ok(Self::new("range", move || {
            if !ops::compare(bound, &next, &stop)? {
                return Ok(None);
            }
            let current = ops::binary(&next, BinOp::Plus, &step)?;
            Ok(Some(std::mem::replace(&mut next, current)))
        }))
    }
}

impl Iterable for Generator {
    fn next_value(&self) -> Result<Option<Value>, Error> {
        let mut producer = self.state.borrow_mut();
        (*producer)()
    }
}

#[derive(Debug)]
enum Items {
    /// Reads the live list, so appends during iteration are visited
    List(Rc<RefCell<Vec<Value>>>),
    Keys {
        map: Rc<RefCell<Map>>,
        keys: Vec<Value>,
        len: usize,
    },
    Chars(Vec<char>),
    Bytes(Vec<u8>),
}

/// A position over a list, map, string or byte string.
#[derive(Debug)]
pub struct Cursor {
    items: Items,
    pos: Cell<usize>,
}

impl Cursor {
    fn new(items: Items) -> Self {
        Self {
            items,
            pos: Cell::new(0),
        }
    }
}

impl Iterable for Cursor {
    fn next_value(&self) -> Result<Option<Value>, Error> {
        let pos = self.pos.get();
        let item = match &self.items {
            Items::List(list) => list.borrow().get(pos).cloned(),
            Items::Keys { map, keys, len } => {
                if map.borrow().len() != *len {
                    return Err(make(
                        ErrorKind::KeyError,
                        "map changed size during iteration",
                    ));
                }
                keys.get(pos).cloned()
            }
            Items::Chars(chars) => chars.get(pos).map(|c| Value::Str(c.to_string())),
            Items::Bytes(bytes) => bytes.get(pos).map(|b| Value::Uint(*b as u64)),
        };
        if item.is_some() {
            self.pos.set(pos + 1);
        }
        Ok(item)
    }
}

/// Hash table keyed by [`Value::hash_bytes`]. Keys sharing a hash are
/// chained in one bucket and told apart with guest equality.
#[derive(Debug, Default)]
pub struct Map {
    buckets: FxHashMap<Vec<u8>, Vec<(Value, Value)>>,
    len: usize,
}

impl Map {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, key: &Value) -> Result<Option<Value>, Error> {
        let hash = key.hash_bytes()?;
        Ok(self.buckets.get(&hash).and_then(|bucket| {
            bucket
                .iter()
                .find(|(k, _)| ops::equals(k, key))
                .map(|(_, v)| v.clone())
        }))
    }

    pub fn contains_key(&self, key: &Value) -> Result<bool, Error> {
        self.get(key).map(|value| value.is_some())
    }

    /// Returns whether the key was already present.
    pub fn insert(&mut self, key: Value, value: Value) -> Result<bool, Error> {
        let bucket = self.buckets.entry(key.hash_bytes()?).or_default();
        if let Some(entry) = bucket.iter_mut().find(|(k, _)| ops::equals(k, &key)) {
            entry.1 = value;
            return Ok(true);
        }
        bucket.push((key, value));
        self.len += 1;
        Ok(false)
    }

    /// Returns whether the key was present.
    pub fn remove(&mut self, key: &Value) -> Result<bool, Error> {
        let hash = key.hash_bytes()?;
        let Some(bucket) = self.buckets.get_mut(&hash) else {
            return Ok(false);
        };
        let Some(pos) = bucket.iter().position(|(k, _)| ops::equals(k, key)) else {
            return Ok(false);
        };
        bucket.remove(pos);
        if bucket.is_empty() {
            self.buckets.remove(&hash);
        }
        self.len -= 1;
        Ok(true)
    }

    pub fn entries(&self) -> impl Iterator<Item = &(Value, Value)> {
        self.buckets.values().flatten()
    }

    pub fn keys(&self) -> Vec<Value> {
        self.entries().map(|(k, _)| k.clone()).collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.entries().map(|(_, v)| v.clone()).collect()
    }
}

/// A read-only view over the frozen frame a module was loaded into.
#[derive(Debug)]
pub struct Module {
    pub name: String,
    pub env: Environment,
}
