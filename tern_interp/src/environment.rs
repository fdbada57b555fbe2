use std::{
    cell::RefCell,
    fmt::Debug,
    rc::{Rc, Weak},
};

use log::debug;
use rustc_hash::FxHashMap;

use crate::{
    error::{make, Error, ErrorKind},
    types::Value,
};

#[derive(Debug)]
struct Slot {
    /// `None` until the first assignment
    value: Option<Value>,
    constant: bool,
}

#[derive(Default)]
pub struct Scope {
    values: FxHashMap<String, Slot>,
    parent: Option<Environment>,
    frozen: bool,
}

/// A shared handle to one frame of the scope chain.
#[derive(Clone, Default)]
pub struct Environment(Rc<RefCell<Scope>>);

/// A non-owning handle, for natives that need to reach back into the
/// scope they are registered in.
#[derive(Clone)]
pub struct WeakEnvironment(Weak<RefCell<Scope>>);

impl WeakEnvironment {
    pub fn upgrade(&self) -> Option<Environment> {
        self.0.upgrade().map(Environment)
    }
}

impl Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scope = self.0.borrow();
        f.debug_struct("Environment")
            .field("names", &scope.values.keys().collect::<Vec<_>>())
            .field("frozen", &scope.frozen)
            .field("parent", &scope.parent)
            .finish()
    }
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a child frame with `self` as its parent.
    pub fn new_frame(&self) -> Self {
        Self(Rc::new(RefCell::new(Scope {
            parent: Some(self.clone()),
            ..Default::default()
        })))
    }

    pub fn downgrade(&self) -> WeakEnvironment {
        WeakEnvironment(Rc::downgrade(&self.0))
    }

    /// Make this frame read-only. There is no way back.
    pub fn freeze(&self) {
        debug!("Freeze environment");
        self.0.borrow_mut().frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.0.borrow().frozen
    }

    /// Whether `name` is declared in this frame, ignoring the parents.
    pub fn has(&self, name: &str) -> bool {
        self.0.borrow().values.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.0.borrow().values.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn declare(&self, name: &str) -> Result<(), Error> {
        self.insert(name, None, false)
    }

    pub fn declare_const(&self, name: &str, value: Value) -> Result<(), Error> {
        self.insert(name, Some(value), true)
    }

    /// Declare `name` and assign it in one step.
    pub fn define(&self, name: &str, value: Value) -> Result<(), Error> {
        self.insert(name, Some(value), false)
    }

    fn insert(&self, name: &str, value: Option<Value>, constant: bool) -> Result<(), Error> {
        debug!("Declare {name}");
        let mut scope = self.0.borrow_mut();
        assert!(!scope.frozen, "cannot declare `{name}` in a frozen scope");
        if scope.values.contains_key(name) {
            return Err(make(
                ErrorKind::DeclarationError,
                format!("`{name}` is already declared in this scope"),
            ));
        }
        scope
            .values
            .insert(name.to_string(), Slot { value, constant });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Value, Error> {
        debug!("Get {name}");
        let scope = self.0.borrow();
        match scope.values.get(name) {
            Some(Slot {
                value: Some(value), ..
            }) => Ok(value.clone()),
            Some(_) => Err(make(
                ErrorKind::ValueError,
                format!("`{name}` is used before being initialised"),
            )),
            None => match &scope.parent {
                Some(parent) => {
                    debug!("Get {name} from parent");
                    parent.get(name)
                }
                None => Err(undeclared(name)),
            },
        }
    }

    pub fn set(&self, name: &str, value: Value) -> Result<(), Error> {
        debug!("Set {name} -> {value}");
        let mut scope = self.0.borrow_mut();
        assert!(!scope.frozen, "cannot assign `{name}` in a frozen scope");
        if let Some(slot) = scope.values.get_mut(name) {
            if slot.constant {
                return Err(make(
                    ErrorKind::TypeError,
                    format!("cannot assign to constant `{name}`"),
                ));
            }
            slot.value = Some(value);
            return Ok(());
        }
        let parent = scope.parent.clone();
        drop(scope);
        match parent {
            Some(parent) if !parent.is_frozen() => {
                debug!("Set {name} in parent");
                parent.set(name, value)
            }
            // Frozen ancestors hold the builtins, which guests cannot rebind
            Some(parent) if parent.resolves(name) => Err(make(
                ErrorKind::DeclarationError,
                format!("cannot assign to builtin `{name}`"),
            )),
            _ => Err(undeclared(name)),
        }
    }

    /// Whether `name` is declared anywhere along the chain.
    fn resolves(&self, name: &str) -> bool {
        let scope = self.0.borrow();
        scope.values.contains_key(name)
            || scope.parent.as_ref().is_some_and(|parent| parent.resolves(name))
    }
}

fn undeclared(name: &str) -> Error {
    make(ErrorKind::NameError, format!("`{name}` is not declared"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declare_then_set_then_get() {
        let env = Environment::new();
        env.declare("x").unwrap();
        env.set("x", Value::Int(5)).unwrap();
        assert_eq!(env.get("x").unwrap(), Value::Int(5));
    }

    #[test]
    fn redeclaring_fails() {
        let env = Environment::new();
        env.declare("x").unwrap();
        let err = env.declare("x").unwrap_err();
        assert_eq!(err.kind, ErrorKind::DeclarationError);
    }

    #[test]
    fn reading_uninitialised_fails() {
        let env = Environment::new();
        env.declare("x").unwrap();
        assert_eq!(env.get("x").unwrap_err().kind, ErrorKind::ValueError);
    }

    #[test]
    fn setting_undeclared_fails() {
        let env = Environment::new();
        let err = env.set("x", Value::Null).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NameError);
        assert_eq!(env.get("x").unwrap_err().kind, ErrorKind::NameError);
    }

    #[test]
    fn constants_are_immutable() {
        let env = Environment::new();
        env.declare_const("pi", Value::Float(2.5)).unwrap();
        let err = env.set("pi", Value::Float(3.0)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
        assert_eq!(env.get("pi").unwrap(), Value::Float(2.5));
    }

    #[test]
    fn lookup_and_assignment_walk_the_chain() {
        let root = Environment::new();
        let frame = root.new_frame();
        let inner = frame.new_frame();
        frame.define("x", Value::Int(1)).unwrap();
        inner.set("x", Value::Int(2)).unwrap();
        assert_eq!(frame.get("x").unwrap(), Value::Int(2));
        assert!(frame.has("x"));
        assert!(!inner.has("x"));

        // Shadowing only touches the inner frame
        inner.define("x", Value::Int(3)).unwrap();
        assert_eq!(inner.get("x").unwrap(), Value::Int(3));
        assert_eq!(frame.get("x").unwrap(), Value::Int(2));
    }

    #[test]
    fn frozen_parents_are_not_assigned() {
        let root = Environment::new();
        root.define("print", Value::Null).unwrap();
        root.freeze();
        let frame = root.new_frame();
        assert_eq!(frame.get("print").unwrap(), Value::Null);
        let err = frame.set("print", Value::Int(1)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DeclarationError);
        let err = frame.set("missing", Value::Int(1)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NameError);
    }

    #[test]
    #[should_panic(expected = "frozen scope")]
    fn declaring_in_frozen_scope_panics() {
        let root = Environment::new();
        root.freeze();
        let _ = root.declare("x");
    }
}
