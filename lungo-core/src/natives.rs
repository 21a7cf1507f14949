// lungo-core - Native function bridge
// Copyright (c) 2026 Tom Waddington. MIT licensed.

//! The standard native bootstrap.
//!
//! Natives are ordinary globals: registration walks a static table,
//! builds the name string in local 0 and the native object in local 1,
//! and defines the global. Each handler runs inside its own frame under
//! the same register contract as bytecode: arguments at locals
//! `1..arity`, result in local 0. Arity counts the self slot, so a
//! one-argument builtin like `print` has arity 2.

use crate::compiler;
use crate::error::{Exec, Fault};
use crate::host::FileMode;
use crate::loader;
use crate::object::{NativeHandle, StringRef};
use crate::value::Value;
use crate::vm::Runtime;

struct NativeEntry {
    name: &'static str,
    arity: usize,
    local_count: usize,
    handle: NativeHandle,
}

const NATIVES: &[NativeEntry] = &[
    NativeEntry { name: "print", arity: 2, local_count: 2, handle: native_print },
    NativeEntry { name: "println", arity: 2, local_count: 2, handle: native_println },
    NativeEntry { name: "readFile", arity: 2, local_count: 2, handle: native_read_file },
    NativeEntry { name: "readByteCode", arity: 2, local_count: 3, handle: native_read_byte_code },
    NativeEntry { name: "verifyByteCode", arity: 2, local_count: 2, handle: native_verify_byte_code },
    NativeEntry { name: "compile", arity: 2, local_count: 3, handle: native_compile },
    NativeEntry { name: "eval", arity: 2, local_count: 3, handle: native_eval },
    NativeEntry { name: "load", arity: 2, local_count: 4, handle: native_load },
    NativeEntry { name: "try", arity: 2, local_count: 4, handle: native_try },
    NativeEntry { name: "throw", arity: 2, local_count: 2, handle: native_throw },
    NativeEntry { name: "+", arity: 3, local_count: 3, handle: native_add },
    NativeEntry { name: "-", arity: 3, local_count: 3, handle: native_subtract },
    NativeEntry { name: "*", arity: 3, local_count: 3, handle: native_multiply },
    NativeEntry { name: "/", arity: 3, local_count: 3, handle: native_divide },
    NativeEntry { name: "=", arity: 3, local_count: 3, handle: native_equal },
    NativeEntry { name: "<", arity: 3, local_count: 3, handle: native_less },
    NativeEntry { name: "<=", arity: 3, local_count: 3, handle: native_less_equal },
    NativeEntry { name: ">", arity: 3, local_count: 3, handle: native_greater },
    NativeEntry { name: ">=", arity: 3, local_count: 3, handle: native_greater_equal },
    NativeEntry { name: "endsWith", arity: 3, local_count: 3, handle: native_ends_with },
    NativeEntry { name: "readline", arity: 1, local_count: 1, handle: native_readline },
    NativeEntry { name: "shell", arity: 1, local_count: 4, handle: native_shell },
    NativeEntry { name: "globals", arity: 1, local_count: 1, handle: native_globals },
];

/// Register the standard natives into the globals map. Runs during
/// bootstrap with collection disabled.
pub(crate) fn register(rt: &mut Runtime) -> Exec<()> {
    for entry in NATIVES {
        let name = rt.new_string_value(entry.name);
        rt.local_set(0, name)?;
        let native = rt.new_native(entry.arity, entry.local_count, entry.handle);
        rt.local_set(1, Value::Native(native))?;
        rt.store_global(0, 1)?;
    }
    rt.local_set(0, Value::Nil)?;
    rt.local_set(1, Value::Nil)
}

fn string_argument(rt: &mut Runtime, local: usize) -> Exec<StringRef> {
    match rt.local(local)? {
        Value::String(s) => Ok(s),
        _ => Err(rt.throw_message("Illegal cast to string")),
    }
}

fn string_text(rt: &Runtime, string: StringRef) -> String {
    String::from_utf8_lossy(rt.heap().string(string).bytes()).into_owned()
}

fn write_stdout(rt: &mut Runtime, text: &str) {
    let stdout = rt.host_stdout();
    rt.host_write(stdout, text.as_bytes());
}

// =============================================================================
// Output
// =============================================================================

fn native_print(rt: &mut Runtime) -> Exec<()> {
    let value = rt.local(1)?;
    let text = rt.render_value(value);
    write_stdout(rt, &text);
    rt.local_set(0, Value::Nil)
}

fn native_println(rt: &mut Runtime) -> Exec<()> {
    let value = rt.local(1)?;
    let mut text = rt.render_value(value);
    text.push('\n');
    write_stdout(rt, &text);
    rt.local_set(0, Value::Nil)
}

// =============================================================================
// Files and bytecode
// =============================================================================

fn native_read_file(rt: &mut Runtime) -> Exec<()> {
    let path_ref = string_argument(rt, 1)?;
    let path = string_text(rt, path_ref);
    let Some(file) = rt.host_open(&path, FileMode::Read) else {
        return Err(rt.throw_message("Could not open file"));
    };
    let mut bytes = Vec::new();
    while let Some(byte) = rt.host_read(file) {
        bytes.push(byte);
    }
    rt.host_close(file);
    let value = Value::String(rt.new_string(&bytes));
    rt.local_set(0, value)
}

fn native_read_byte_code(rt: &mut Runtime) -> Exec<()> {
    let source_ref = string_argument(rt, 1)?;
    let bytes = rt.heap().string(source_ref).bytes().to_vec();
    loader::read_bytes(rt, &bytes)?;
    Ok(())
}

fn native_verify_byte_code(rt: &mut Runtime) -> Exec<()> {
    let function = match rt.local(1)? {
        Value::Function(f) => f,
        _ => return Err(rt.throw_message("Illegal cast to function")),
    };
    rt.verify_or_throw(function)?;
    let value = rt.local(1)?;
    rt.local_set(0, value)
}

fn native_compile(rt: &mut Runtime) -> Exec<()> {
    compiler::compile(rt)
}

fn native_eval(rt: &mut Runtime) -> Exec<()> {
    rt.eval_local_source()
}

fn native_load(rt: &mut Runtime) -> Exec<()> {
    let name_ref = string_argument(rt, 1)?;
    let name = string_text(rt, name_ref);

    let load_path = rt.load_path();
    let mut directories = Vec::new();
    for index in 0..rt.heap().map(load_path).len() {
        if let Some((_, Value::String(dir))) = rt.heap().map(load_path).entry(index) {
            directories.push(string_text(rt, dir));
        }
    }

    let mut source: Option<Vec<u8>> = None;
    for directory in directories {
        let path = format!("{}/{}", directory, name);
        if let Some(file) = rt.host_open(&path, FileMode::Read) {
            let mut bytes = Vec::new();
            while let Some(byte) = rt.host_read(file) {
                bytes.push(byte);
            }
            rt.host_close(file);
            source = Some(bytes);
            break;
        }
    }
    let Some(bytes) = source else {
        return Err(rt.throw_message("Could not open file"));
    };

    if name.ends_with(".bc") {
        loader::read_bytes(rt, &bytes)?;
    } else {
        let value = Value::String(rt.new_string(&bytes));
        rt.local_set(1, value)?;
        compiler::compile(rt)?;
    }
    let function = match rt.local(0)? {
        Value::Function(f) => f,
        _ => return Err(Fault::panic("Loader did not produce a function")),
    };
    rt.verify_or_throw(function)?;
    rt.local_set(2, Value::Function(function))?;
    rt.invoke(2, 1)?;
    let result = rt.local(2)?;
    rt.local_set(0, result)
}

// =============================================================================
// Exceptions
// =============================================================================

fn native_try(rt: &mut Runtime) -> Exec<()> {
    let callee = rt.local(1)?;
    rt.local_set(2, callee)?;
    match rt.invoke(2, 1) {
        Ok(()) => {
            // normal return leaves the result in local 2
            let map = rt.new_map();
            rt.local_set(3, Value::Map(map))?;
            let key = rt.new_string_value("result");
            rt.local_set(0, key)?;
            let value = rt.local(2)?;
            rt.map_put(map, key, value);
            rt.local_set(0, Value::Map(map))
        }
        Err(fault @ Fault::Throw { .. }) => {
            // read the thrown slot and re-root it before any allocation
            let thrown = rt.thrown_value(&fault);
            rt.local_set(2, thrown)?;
            let map = rt.new_map();
            rt.local_set(3, Value::Map(map))?;
            let key = rt.new_string_value("error");
            rt.local_set(0, key)?;
            let value = rt.local(2)?;
            rt.map_put(map, key, value);
            rt.local_set(0, Value::Map(map))
        }
        Err(panic) => Err(panic),
    }
}

fn native_throw(rt: &mut Runtime) -> Exec<()> {
    Err(rt.throw_local(1))
}

// =============================================================================
// Arithmetic and comparison
// =============================================================================

fn native_add(rt: &mut Runtime) -> Exec<()> {
    rt.add(0, 1, 2)
}

fn native_subtract(rt: &mut Runtime) -> Exec<()> {
    rt.subtract(0, 1, 2)
}

fn native_multiply(rt: &mut Runtime) -> Exec<()> {
    rt.multiply(0, 1, 2)
}

fn native_divide(rt: &mut Runtime) -> Exec<()> {
    rt.divide(0, 1, 2)
}

fn native_equal(rt: &mut Runtime) -> Exec<()> {
    rt.equal(0, 1, 2)
}

fn native_less(rt: &mut Runtime) -> Exec<()> {
    rt.compare(0, 1, 2, |x, y| x < y, |x, y| x < y)
}

fn native_less_equal(rt: &mut Runtime) -> Exec<()> {
    rt.compare(0, 1, 2, |x, y| x <= y, |x, y| x <= y)
}

fn native_greater(rt: &mut Runtime) -> Exec<()> {
    rt.compare(0, 1, 2, |x, y| x > y, |x, y| x > y)
}

fn native_greater_equal(rt: &mut Runtime) -> Exec<()> {
    rt.compare(0, 1, 2, |x, y| x >= y, |x, y| x >= y)
}

// =============================================================================
// Strings
// =============================================================================

fn native_ends_with(rt: &mut Runtime) -> Exec<()> {
    let string = string_argument(rt, 1)?;
    let suffix = string_argument(rt, 2)?;
    let result = rt
        .heap()
        .string(string)
        .bytes()
        .ends_with(rt.heap().string(suffix).bytes());
    rt.local_set(0, Value::Boolean(result))
}

// =============================================================================
// Shell
// =============================================================================

fn read_host_line(rt: &mut Runtime) -> Option<Vec<u8>> {
    let stdin = rt.host_stdin();
    let mut line = Vec::new();
    loop {
        match rt.host_read(stdin) {
            Some(b'\n') => return Some(line),
            Some(byte) => line.push(byte),
            None if line.is_empty() => return None,
            None => return Some(line),
        }
    }
}

fn native_readline(rt: &mut Runtime) -> Exec<()> {
    match read_host_line(rt) {
        Some(line) => {
            let value = Value::String(rt.new_string(&line));
            rt.local_set(0, value)
        }
        None => rt.local_set(0, Value::Nil),
    }
}

fn native_shell(rt: &mut Runtime) -> Exec<()> {
    loop {
        write_stdout(rt, "> ");
        let Some(line) = read_host_line(rt) else {
            break;
        };
        if line.iter().all(|byte| byte.is_ascii_whitespace()) {
            continue;
        }
        let source = Value::String(rt.new_string(&line));
        rt.local_set(1, source)?;
        match rt.eval_local_source() {
            Ok(()) => {
                let result = rt.local(0)?;
                let mut text = rt.render_value(result);
                text.push('\n');
                write_stdout(rt, &text);
            }
            Err(fault @ Fault::Throw { .. }) => {
                let thrown = rt.thrown_value(&fault);
                rt.local_set(2, thrown)?;
                let mut text = String::from("ERROR Uncaught Exception:\n");
                text.push_str(&rt.render_value(thrown));
                text.push('\n');
                write_stdout(rt, &text);
            }
            Err(panic) => return Err(panic),
        }
    }
    rt.local_set(0, Value::Nil)
}

// =============================================================================
// Introspection
// =============================================================================

fn native_globals(rt: &mut Runtime) -> Exec<()> {
    let globals = rt.globals();
    rt.local_set(0, Value::Map(globals))
}
