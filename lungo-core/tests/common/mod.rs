// lungo-core - Common test utilities
// Copyright (c) 2026 Tom Waddington. MIT licensed.

//! Shared helpers for lungo-core integration tests.
//!
//! In a test file, add:
//! ```ignore
//! mod common;
//! use common::*;
//! ```

// not every test file uses every helper
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub use lungo_core::{Fault, Runtime, StdHost, Value};
use lungo_core::{FileId, FileMode, Host};

/// Create a runtime over the standard host with the default load path.
pub fn new_runtime() -> Runtime {
    Runtime::new(Box::new(StdHost::new()), ".").expect("runtime construction")
}

/// Evaluate source in a fresh runtime, rendering the result (or the
/// thrown value as the error).
pub fn eval_str(source: &str) -> Result<String, String> {
    let mut rt = new_runtime();
    eval_in(&mut rt, source)
}

/// Evaluate source in an existing runtime.
pub fn eval_in(rt: &mut Runtime, source: &str) -> Result<String, String> {
    match rt.eval(source) {
        Ok(value) => Ok(rt.render_value(value)),
        Err(fault @ Fault::Throw { .. }) => {
            let thrown = rt.thrown_value(&fault);
            Err(rt.render_value(thrown))
        }
        Err(panic) => Err(panic.to_string()),
    }
}

/// An in-memory [`Host`]: scripted stdin, captured stdout, and a map of
/// preloaded files. Lets tests drive `print`, `readFile`, `load` and the
/// shell without touching the real filesystem.
pub struct MemoryHost {
    files: HashMap<String, Vec<u8>>,
    input: Vec<u8>,
    input_pos: usize,
    output: Rc<RefCell<Vec<u8>>>,
    open: HashMap<u64, (Vec<u8>, usize)>,
    next_id: u64,
}

#[allow(dead_code)]
impl MemoryHost {
    pub fn new() -> Self {
        Self {
            files: HashMap::new(),
            input: Vec::new(),
            input_pos: 0,
            output: Rc::new(RefCell::new(Vec::new())),
            open: HashMap::new(),
            next_id: 2,
        }
    }

    pub fn with_file(mut self, path: &str, contents: &[u8]) -> Self {
        self.files.insert(path.to_string(), contents.to_vec());
        self
    }

    pub fn with_input(mut self, input: &[u8]) -> Self {
        self.input = input.to_vec();
        self
    }

    /// Clone of the capture buffer; read it after the runtime has run.
    pub fn output(&self) -> Rc<RefCell<Vec<u8>>> {
        Rc::clone(&self.output)
    }
}

impl Host for MemoryHost {
    fn open(&mut self, path: &str, _mode: FileMode) -> Option<FileId> {
        let contents = self.files.get(path)?.clone();
        let id = self.next_id;
        self.next_id += 1;
        self.open.insert(id, (contents, 0));
        Some(FileId(id))
    }

    fn read(&mut self, file: FileId) -> Option<u8> {
        if file == self.stdin() {
            let byte = *self.input.get(self.input_pos)?;
            self.input_pos += 1;
            return Some(byte);
        }
        let (contents, pos) = self.open.get_mut(&file.0)?;
        let byte = *contents.get(*pos)?;
        *pos += 1;
        Some(byte)
    }

    fn write(&mut self, file: FileId, bytes: &[u8]) {
        if file == self.stdout() {
            self.output.borrow_mut().extend_from_slice(bytes);
        }
    }

    fn close(&mut self, file: FileId) {
        self.open.remove(&file.0);
    }

    fn stdin(&self) -> FileId {
        FileId(0)
    }

    fn stdout(&self) -> FileId {
        FileId(1)
    }
}

/// Assert that evaluating `input` renders the expected value.
#[macro_export]
macro_rules! assert_eval {
    ($input:expr, $expected:expr) => {
        let result = crate::common::eval_str($input);
        assert!(
            result.is_ok(),
            "Failed to evaluate '{}': {:?}",
            $input,
            result.err()
        );
        assert_eq!(
            result.unwrap(),
            $expected,
            "Evaluation of '{}' did not match expected",
            $input
        );
    };
}

/// Assert that evaluating `input` throws, with the rendered exception
/// containing the given pattern.
#[macro_export]
macro_rules! assert_eval_err {
    ($input:expr, $pattern:expr) => {
        let result = crate::common::eval_str($input);
        assert!(
            result.is_err(),
            "Expected error for '{}' but got {:?}",
            $input,
            result.ok()
        );
        let message = result.unwrap_err();
        assert!(
            message.contains($pattern),
            "Error '{}' for '{}' does not contain '{}'",
            message,
            $input,
            $pattern
        );
    };
}
