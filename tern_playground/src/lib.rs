use std::{cell::RefCell, env, rc::Rc};

use tern_interp::{run, types::Value, Interpreter};
use wasm_bindgen::prelude::*;

#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen]
pub fn init() -> String {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    format!(
        "Tern v{} on {} ({}), Copyright (c) {}",
        env!("CARGO_PKG_VERSION"),
        env::consts::OS,
        env::consts::ARCH,
        env!("CARGO_PKG_AUTHORS"),
    )
}

/// An interpreter whose `print` writes into a buffer instead of
/// stdout, which cannot be captured from JS.
#[wasm_bindgen]
pub struct World {
    interpreter: Interpreter,
    output: Rc<RefCell<Vec<u8>>>,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen]
impl World {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        let output = Rc::new(RefCell::new(Vec::new()));
        Self {
            interpreter: Interpreter::with_output(output.clone()),
            output,
        }
    }

    /// Run `src` and return what it printed. A non-null result of the
    /// last statement is echoed the way the REPL does.
    pub fn run(&mut self, src: &str) -> Result<String, String> {
        self.output.borrow_mut().clear();
        let value = run(src, &mut self.interpreter).map_err(|e| e.to_string())?;
        let mut printed = String::from_utf8_lossy(&self.output.borrow()).into_owned();
        if value != Value::Null {
            printed.push_str(&value.repr());
            printed.push('\n');
        }
        Ok(printed.trim_end().to_string())
    }
}
