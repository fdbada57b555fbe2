use std::{env, fs, io, process};

use tern_interp::{
    error::Error,
    repl::{self, LineReader},
    run, Interpreter,
};

fn main() {
    pretty_env_logger::init();
    let args: Vec<String> = env::args().skip(1).collect();
    match args.as_slice() {
        [] => run_repl(),
        [path] => run_file(path),
        _ => {
            eprintln!("Usage: tern [file]");
            process::exit(64);
        }
    }
}

fn run_repl() {
    let mut interpreter = Interpreter::new();
    let mut reader = LineReader::new(io::stdin().lock());
    let (mut stdout, mut stderr) = (io::stdout(), io::stderr());
    if let Err(e) = repl::serve(&mut reader, &mut interpreter, &mut stdout, &mut stderr) {
        eprintln!("{e}");
    }
}

fn run_file(path: &str) {
    let result = fs::read_to_string(path)
        .map_err(Error::from)
        .and_then(|source| run(&source, &mut Interpreter::new()));
    if let Err(e) = result {
        eprintln!("{e}");
    }
}
