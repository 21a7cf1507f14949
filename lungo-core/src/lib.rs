// lungo-core - Core runtime for the Lungo scripting language
// Copyright (c) 2026 Tom Waddington. MIT licensed.

//! Core of the Lungo scripting runtime.
//!
//! Four tightly coupled subsystems live here: the tagged value model over
//! a garbage-collected heap ([`value`], [`object`], [`heap`]), the
//! register bytecode interpreter driven by call frames over one value
//! stack ([`vm`]), the static verifier whose contract is exactly what the
//! interpreter assumes ([`verify`]), and the single-pass compiler from
//! s-expression source to verified bytecode ([`compiler`]).
//!
//! Embedders construct a [`Runtime`] over a [`Host`] and either `load` a
//! file, run the `shell`, or `eval` source strings directly:
//!
//! ```no_run
//! use lungo_core::{Runtime, StdHost, Value};
//!
//! let mut rt = Runtime::new(Box::new(StdHost::new()), ".").unwrap();
//! let result = rt.eval("(+ 1 2)").unwrap();
//! assert!(matches!(result, Value::Integer(3)));
//! ```

pub mod bytecode;
pub mod compiler;
pub mod disasm;
pub mod error;
pub mod heap;
pub mod host;
pub mod loader;
mod natives;
pub mod object;
pub mod value;
pub mod verify;
pub mod vm;

pub use bytecode::{ByteCode, Op};
pub use error::{Exec, Fault, LoadPathError};
pub use heap::Heap;
pub use host::{FileId, FileMode, Host, StdHost};
pub use object::{
    ByteString, Function, FunctionRef, MapRef, NativeFunction, NativeHandle, NativeRef, ObjRef,
    StringRef, Table,
};
pub use value::{Value, ValueKind};
pub use verify::{VerifyError, verify_function, verify_native};
pub use vm::{CallFrame, Runtime, ValueStack};
