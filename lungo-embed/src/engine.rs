// lungo-embed - Engine implementation
// Copyright (c) 2026 Tom Waddington. MIT licensed.

//! The Engine struct - main entry point for embedding Lungo.

use lungo_core::{Fault, LoadPathError, Runtime, StdHost, Value};

/// A plain Rust snapshot of a Lungo value.
///
/// Primitives and strings copy out; reference values that have no owned
/// Rust form (functions, maps) are captured as their rendered text.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineValue {
    Nil,
    Integer(i64),
    Double(f64),
    Boolean(bool),
    String(String),
    Rendered(String),
}

impl std::fmt::Display for EngineValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineValue::Nil => write!(f, "nil"),
            EngineValue::Integer(n) => write!(f, "{}", n),
            EngineValue::Double(d) => write!(f, "{}", d),
            EngineValue::Boolean(b) => write!(f, "{}", b),
            EngineValue::String(s) => write!(f, "{}", s),
            EngineValue::Rendered(s) => write!(f, "{}", s),
        }
    }
}

/// The Lungo scripting engine.
///
/// `Engine` wraps a [`Runtime`] over the default host and exposes a
/// string-in, value-out surface for Rust embedders.
///
/// `Engine` is NOT thread-safe; create one per thread.
///
/// # Example
///
/// ```rust
/// use lungo_embed::{Engine, EngineValue};
///
/// let mut engine = Engine::new().unwrap();
/// let result = engine.eval("(+ 1 2)").unwrap();
/// assert_eq!(result, EngineValue::Integer(3));
/// ```
pub struct Engine {
    runtime: Runtime,
}

impl Engine {
    /// Create an engine with the current directory as its load path.
    pub fn new() -> Result<Self, LoadPathError> {
        Self::with_load_path(".")
    }

    /// Create an engine with an explicit colon-separated load path.
    pub fn with_load_path(load_path: &str) -> Result<Self, LoadPathError> {
        Ok(Engine {
            runtime: Runtime::new(Box::new(StdHost::new()), load_path)?,
        })
    }

    /// Evaluate a string of Lungo source.
    ///
    /// Returns the value of the program's last expression, or the
    /// rendered exception as an error.
    pub fn eval(&mut self, source: &str) -> Result<EngineValue, String> {
        match self.runtime.eval(source) {
            Ok(value) => Ok(self.extract(value)),
            Err(fault @ Fault::Throw { .. }) => {
                let thrown = self.runtime.thrown_value(&fault);
                Err(self.runtime.render_value(thrown))
            }
            Err(panic) => Err(panic.to_string()),
        }
    }

    /// Run `load` on a file name. 0 on success, 1 on an uncaught
    /// exception (already printed through the host).
    pub fn load(&mut self, name: &str) -> Result<i32, String> {
        self.runtime.load(name).map_err(|fault| fault.to_string())
    }

    /// Snapshot a global by name, if defined.
    pub fn global(&mut self, name: &str) -> Option<EngineValue> {
        let key = self.runtime.new_string_value(name);
        // root the key across the lookup
        self.runtime.local_set(0, key).ok()?;
        let value = self.runtime.heap().map_get(self.runtime.globals(), key)?;
        Some(self.extract(value))
    }

    /// Access the underlying runtime.
    pub fn runtime_mut(&mut self) -> &mut Runtime {
        &mut self.runtime
    }

    fn extract(&self, value: Value) -> EngineValue {
        match value {
            Value::Nil => EngineValue::Nil,
            Value::Integer(n) => EngineValue::Integer(n),
            Value::Double(d) => EngineValue::Double(d),
            Value::Boolean(b) => EngineValue::Boolean(b),
            Value::String(s) => EngineValue::String(
                String::from_utf8_lossy(self.runtime.heap().string(s).bytes()).into_owned(),
            ),
            other => EngineValue::Rendered(self.runtime.render_value(other)),
        }
    }
}
