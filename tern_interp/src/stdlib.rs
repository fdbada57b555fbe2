use std::{
    cell::RefCell,
    fs,
    io::{self, Write},
    path::Path,
    rc::Rc,
};

use log::debug;
use tern_syntax::parse;

use crate::{
    environment::{Environment, WeakEnvironment},
    error::{make, Error, ErrorKind},
    interpret::execute,
    types::{Arity, Func, Generator, Module, NativeFunc, Type, Value},
    Output,
};

pub fn stdout() -> Output {
    Rc::new(RefCell::new(io::stdout()))
}

fn register(env: &Environment, func: NativeFunc) {
    let name = func.name.clone();
    env.define(&name, Value::Func(Func::Native(Rc::new(func))))
        .expect("natives are registered once per scope");
}

/// Populate the root scope with the builtins and the type names.
pub fn init(env: &Environment, out: Output) {
    // `type` is taken by the builtin below
    for ty in Type::ALL.into_iter().filter(|ty| *ty != Type::Type) {
        env.define(ty.name(), Value::Type(ty))
            .expect("type names are unique");
    }
    init_io(env, out.clone());
    init_core(env);
    init_process(env, out);
    init_import(env);
}

fn init_io(env: &Environment, out: Output) {
    // print(args...)
    register(
        env,
        NativeFunc::new("print", Arity::Variadic, move |args| {
            let line = args
                .iter()
                .map(Value::to_string)
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(out.borrow_mut(), "{line}")?;
            Ok(Value::Null)
        }),
    );
}

fn init_core(env: &Environment) {
    // len(value)
    register(
        env,
        NativeFunc::new("len", Arity::Exact(1), |args| {
            Ok(Value::Int(args[0].len()? as i64))
        }),
    );
    // range(stop), range(start, stop), range(start, stop, step)
    register(
        env,
        NativeFunc::new("range", Arity::Range(1, 3), |args| {
            let (start, stop, step) = match args.as_slice() {
                [stop] => (Value::Int(0), stop.clone(), Value::Int(1)),
                [start, stop] => (start.clone(), stop.clone(), Value::Int(1)),
                [start, stop, step] => (start.clone(), stop.clone(), step.clone()),
                _ => unreachable!("arity is checked before the call"),
            };
            let range = Generator::range(start, stop, step)?;
            Ok(Value::Generator(Rc::new(range)))
        }),
    );
    // type(value)
    register(
        env,
        NativeFunc::new("type", Arity::Exact(1), |args| {
            Ok(Value::Type(args[0].type_of()))
        }),
    );
}

fn init_process(env: &Environment, out: Output) {
    // exit(code = 0)
    register(
        env,
        NativeFunc::new("exit", Arity::Range(0, 1), move |args| {
            let code = args.first().map(Value::to_int).transpose()?.unwrap_or(0);
            out.borrow_mut().flush()?;
            std::process::exit(code as i32)
        }),
    );
}

fn init_import(env: &Environment) {
    // The root owns this function, so it only holds on to the root weakly
    let root = env.downgrade();
    // import(name)
    register(
        env,
        NativeFunc::new("import", Arity::Exact(1), move |args| {
            let Value::Str(name) = &args[0] else {
                return Err(make(
                    ErrorKind::TypeError,
                    format!("module names are `str`, found `{}`", args[0].type_of()),
                ));
            };
            let module = match native_module(name) {
                Some(module) => module,
                None => load_module(name, &root)?,
            };
            Ok(Value::Module(Rc::new(module)))
        }),
    );
}

fn native_module(name: &str) -> Option<Module> {
    let env = Environment::new();
    match name {
        "fs" => init_fs(&env),
        _ => return None,
    }
    env.freeze();
    Some(Module {
        name: name.to_string(),
        env,
    })
}

/// Run `name` or `name.tern` in a fresh child of the root and expose
/// its frame, frozen, as a module.
fn load_module(name: &str, root: &WeakEnvironment) -> Result<Module, Error> {
    let path = [name.to_string(), format!("{name}.tern")]
        .into_iter()
        .find(|path| Path::new(path).is_file())
        .ok_or_else(|| make(ErrorKind::ImportError, format!("no module named `{name}`")))?;
    debug!("Import {name} from {path}");
    let source = parse(&fs::read_to_string(&path)?)?;
    let root = root
        .upgrade()
        .ok_or_else(|| make(ErrorKind::ImportError, "the interpreter is gone"))?;
    let env = root.new_frame();
    execute(&source, &env)?;
    env.freeze();
    Ok(Module {
        name: name.to_string(),
        env,
    })
}

fn path_arg(value: &Value) -> Result<&str, Error> {
    match value {
        Value::Str(path) => Ok(path),
        _ => Err(make(
            ErrorKind::TypeError,
            format!("paths are `str`, found `{}`", value.type_of()),
        )),
    }
}

fn init_fs(env: &Environment) {
    // read(path)
    register(
        env,
        NativeFunc::new("read", Arity::Exact(1), |args| {
            Ok(Value::Str(fs::read_to_string(path_arg(&args[0])?)?))
        }),
    );
    // write(path, contents)
    register(
        env,
        NativeFunc::new("write", Arity::Exact(2), |args| {
            let contents = match &args[1] {
                Value::Bytes(b) => b.clone(),
                other => other.to_string().into_bytes(),
            };
            fs::write(path_arg(&args[0])?, contents)?;
            Ok(Value::Null)
        }),
    );
    // exists(path)
    register(
        env,
        NativeFunc::new("exists", Arity::Exact(1), |args| {
            Ok(Value::Boolean(Path::new(path_arg(&args[0])?).exists()))
        }),
    );
    // remove(path)
    register(
        env,
        NativeFunc::new("remove", Arity::Exact(1), |args| {
            fs::remove_file(path_arg(&args[0])?)?;
            Ok(Value::Null)
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Callable;

    fn call(env: &Environment, name: &str, args: Vec<Value>) -> Result<Value, Error> {
        let func = env.get(name)?;
        func.to_callable()?
            .call(env, args)
            .map_err(|signal| signal.into_error())
    }

    fn root(out: Output) -> Environment {
        let env = Environment::new();
        init(&env, out);
        env.freeze();
        env
    }

    #[test]
    fn print_joins_with_spaces() {
        let buf = Rc::new(RefCell::new(Vec::<u8>::new()));
        let env = root(buf.clone());
        let args = vec![Value::Str("a".to_string()), Value::Int(1), Value::Null];
        assert_eq!(call(&env, "print", args), Ok(Value::Null));
        assert_eq!(call(&env, "print", vec![]), Ok(Value::Null));
        assert_eq!(String::from_utf8(buf.borrow().clone()).unwrap(), "a 1 null\n\n");
    }

    #[test]
    fn type_names_are_bound() {
        let env = root(stdout());
        assert_eq!(env.get("int"), Ok(Value::Type(Type::Int)));
        assert_eq!(
            call(&env, "type", vec![Value::Float(1.0)]),
            Ok(Value::Type(Type::Float))
        );
        assert!(matches!(env.get("type"), Ok(Value::Func(_))));
    }

    #[test]
    fn builtin_arity() {
        let env = root(stdout());
        let err = call(&env, "len", vec![]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
        let err = call(&env, "range", vec![Value::Int(1); 4]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
        assert_eq!(call(&env, "len", vec![Value::Str("abc".to_string())]), Ok(Value::Int(3)));
    }

    #[test]
    fn unknown_import() {
        let env = root(stdout());
        let name = Value::Str("no/such/module".to_string());
        let err = call(&env, "import", vec![name]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ImportError);
    }

    #[test]
    fn fs_module() {
        let env = root(stdout());
        let fs = call(&env, "import", vec![Value::Str("fs".to_string())]).unwrap();
        let path = std::env::temp_dir().join(format!("tern-fs-{}.txt", std::process::id()));
        let path = Value::Str(path.to_string_lossy().into_owned());
        let method = |name: &str, args| call_attr(&env, &fs, name, args);

        assert_eq!(method("exists", vec![path.clone()]), Ok(Value::Boolean(false)));
        let contents = Value::Str("hello".to_string());
        assert_eq!(method("write", vec![path.clone(), contents.clone()]), Ok(Value::Null));
        assert_eq!(method("read", vec![path.clone()]), Ok(contents));
        assert_eq!(method("remove", vec![path.clone()]), Ok(Value::Null));
        let err = method("read", vec![path]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::FileNotFoundError);

        let err = fs.set_attr("read", Value::Null).unwrap_err();
        assert_eq!(err.kind, ErrorKind::AttributeError);
        let err = fs.get_attr("open").unwrap_err();
        assert!(err.msg.ends_with("it has: exists, read, remove, write"), "{err}");
    }

    fn call_attr(
        env: &Environment,
        object: &Value,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, Error> {
        object
            .get_attr(name)?
            .to_callable()?
            .call(env, args)
            .map_err(|signal| signal.into_error())
    }
}
