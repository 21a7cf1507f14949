// lungo-core - Runtime and bytecode interpreter
// Copyright (c) 2026 Tom Waddington. MIT licensed.

//! The runtime: value stack, call frames, heap, globals, and the
//! fetch-decode-dispatch loop.
//!
//! Every transition between host code and user code goes through
//! [`Runtime::invoke`]: it checks the callee, pushes a frame over the
//! value stack, runs either the interpreter loop or a native handler, and
//! pops the frame on every exit path: normal return, native return, or a
//! fault in flight. The interpreter and the native bridge are the two
//! implementations of the "run the current frame" contract.

pub mod frame;
pub mod stack;

pub use frame::CallFrame;
pub use stack::ValueStack;

use crate::bytecode::Op;
use crate::compiler;
use crate::error::{Exec, Fault, LoadPathError};
use crate::heap::Heap;
use crate::host::{FileId, FileMode, Host};
use crate::object::{ByteString, FunctionRef, MapRef, NativeFunction, NativeHandle, NativeRef, StringRef};
use crate::value::{Value, ValueKind};
use crate::{natives, verify};

/// Register count of the bootstrap frame. Embedding entry points and
/// native registration use these scratch registers the way any native
/// callable uses its own frame.
const BOOT_LOCALS: usize = 8;

/// A Lungo runtime: one heap, one value stack, one thread of execution.
pub struct Runtime {
    host: Box<dyn Host>,
    stack: ValueStack,
    frames: Vec<CallFrame>,
    heap: Heap,
    globals: MapRef,
    load_path: MapRef,
}

impl Runtime {
    /// Construct a runtime over the given host.
    ///
    /// `load_path` is a colon-separated list of directories, each
    /// non-empty and without a trailing separator; it is stored in the
    /// load-path map keyed by integer position. Collection stays disabled
    /// until the globals and load-path maps plus the native table are in
    /// place, so the bootstrap cannot collect its own roots.
    pub fn new(host: Box<dyn Host>, load_path: &str) -> Result<Self, LoadPathError> {
        let mut heap = Heap::new();
        let globals = heap.alloc_map();
        let load_path_map = heap.alloc_map();

        let mut stack = ValueStack::new();
        stack.ensure(BOOT_LOCALS);

        let mut runtime = Runtime {
            host,
            stack,
            frames: vec![CallFrame::new(0, BOOT_LOCALS)],
            heap,
            globals,
            load_path: load_path_map,
        };

        for (position, directory) in load_path.split(':').enumerate() {
            if directory.is_empty() {
                return Err(LoadPathError::EmptySegment);
            }
            if directory.ends_with('/') {
                return Err(LoadPathError::TrailingSeparator(directory.to_string()));
            }
            let value = runtime.new_string_value(directory);
            runtime
                .heap
                .map_put(load_path_map, Value::Integer(position as i64), value);
        }

        natives::register(&mut runtime)
            .expect("native registration cannot fault during bootstrap");
        runtime.heap.enable_gc();
        Ok(runtime)
    }

    // =========================================================================
    // Frames and locals
    // =========================================================================

    fn frame(&self) -> Exec<CallFrame> {
        self.frames
            .last()
            .copied()
            .ok_or_else(|| Fault::panic("No active frame"))
    }

    fn frame_mut(&mut self) -> Exec<&mut CallFrame> {
        self.frames
            .last_mut()
            .ok_or_else(|| Fault::panic("No active frame"))
    }

    /// Read local register `local` of the current frame.
    pub fn local(&self, local: usize) -> Exec<Value> {
        let frame = self.frame()?;
        if local >= frame.stack_size {
            return Err(Fault::panic("Stack underflow"));
        }
        self.stack.get(frame.absolute(local))
    }

    /// Write local register `local` of the current frame.
    pub fn local_set(&mut self, local: usize, value: Value) -> Exec<()> {
        let frame = self.frame()?;
        if local >= frame.stack_size {
            return Err(Fault::panic("Stack underflow"));
        }
        self.stack.set(frame.absolute(local), value)
    }

    // =========================================================================
    // Heap access and allocation
    // =========================================================================

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn globals(&self) -> MapRef {
        self.globals
    }

    pub fn load_path(&self) -> MapRef {
        self.load_path
    }

    /// Allocate a string from raw bytes.
    pub fn new_string(&mut self, bytes: &[u8]) -> StringRef {
        self.maybe_collect();
        self.heap.alloc_string(ByteString::from_bytes(bytes))
    }

    /// Allocate a string value from text.
    pub fn new_string_value(&mut self, text: &str) -> Value {
        Value::String(self.new_string(text.as_bytes()))
    }

    /// Allocate an empty function. The handle must be rooted (in a
    /// register, a constant pool, or a map) before the next allocation.
    pub fn new_function(&mut self) -> FunctionRef {
        self.maybe_collect();
        self.heap.alloc_function()
    }

    /// Allocate an empty map.
    pub fn new_map(&mut self) -> MapRef {
        self.maybe_collect();
        self.heap.alloc_map()
    }

    /// Allocate a native function object.
    pub fn new_native(
        &mut self,
        arity: usize,
        local_count: usize,
        handle: NativeHandle,
    ) -> NativeRef {
        self.maybe_collect();
        self.heap
            .alloc_native(NativeFunction::new(arity, local_count, handle))
    }

    /// Append a byte to a heap string.
    pub fn string_push(&mut self, string: StringRef, byte: u8) {
        self.maybe_collect();
        self.heap.string_push(string, byte);
    }

    /// Reserve capacity on a heap string.
    pub fn string_reserve(&mut self, string: StringRef, additional: usize) {
        self.maybe_collect();
        self.heap.string_reserve(string, additional);
    }

    /// Append an instruction to a function under construction.
    pub fn function_push_byte_code(&mut self, function: FunctionRef, code: crate::ByteCode) {
        self.maybe_collect();
        self.heap.function_push_byte_code(function, code);
    }

    /// Rewrite an already-emitted instruction (jump patching).
    pub fn function_set_byte_code(
        &mut self,
        function: FunctionRef,
        index: usize,
        code: crate::ByteCode,
    ) {
        self.heap.function_mut(function).set_byte_code(index, code);
    }

    /// Append a constant, returning its pool index. The value must be
    /// rooted by the caller if it references the heap.
    pub fn function_add_constant(&mut self, function: FunctionRef, value: Value) -> usize {
        self.maybe_collect();
        self.heap.function_push_constant(function, value);
        self.heap.function(function).constants().len() - 1
    }

    /// Set a function's arity and frame size.
    pub fn function_set_stack(&mut self, function: FunctionRef, arity: usize, local_count: usize) {
        self.heap
            .function_mut(function)
            .set_stack(arity, local_count);
    }

    /// Reserve bytecode and constant capacity.
    pub fn function_reserve(&mut self, function: FunctionRef, byte_code: usize, constants: usize) {
        self.maybe_collect();
        self.heap.function_reserve(function, byte_code, constants);
    }

    /// Insert into a map object. `key` and `value` must be rooted by the
    /// caller: the growth allocation may trigger a collection.
    pub fn map_put(&mut self, map: MapRef, key: Value, value: Value) {
        self.maybe_collect();
        self.heap.map_put(map, key, value);
    }

    // =========================================================================
    // Garbage collection
    // =========================================================================

    fn maybe_collect(&mut self) {
        if self.heap.should_collect() {
            self.collect_garbage();
        }
    }

    /// Run a full collection cycle. Roots are the globals map, the
    /// load-path map, and every live stack slot (which covers all frames'
    /// registers); constant pools and map entries are reached
    /// transitively.
    pub fn collect_garbage(&mut self) {
        let globals = Value::Map(self.globals);
        let load_path = Value::Map(self.load_path);
        let stack = self.stack.live();
        self.heap
            .collect(stack.iter().copied().chain([globals, load_path]));
    }

    // =========================================================================
    // Throwing
    // =========================================================================

    /// Raise a user-level exception carrying the value in the given local
    /// register of the current frame.
    pub fn throw_local(&mut self, local: usize) -> Fault {
        match self.frames.last() {
            Some(frame) if local < frame.stack_size => Fault::Throw {
                index: frame.absolute(local),
            },
            _ => Fault::panic("Stack underflow"),
        }
    }

    /// Place a message string in register 0 of the current frame (the
    /// conventional slot) and raise it.
    pub fn throw_message(&mut self, message: &str) -> Fault {
        let index = match self.frames.last() {
            Some(frame) => frame.stack_base,
            None => 0,
        };
        self.throw_message_at(index, message)
    }

    fn throw_message_at(&mut self, index: usize, message: &str) -> Fault {
        let value = self.new_string_value(message);
        if self.stack.set(index, value).is_err() {
            return Fault::panic("Stack underflow");
        }
        Fault::Throw { index }
    }

    /// Read the value a [`Fault::Throw`] carries. Valid until the next
    /// allocation or invocation reuses the slot.
    pub fn thrown_value(&self, fault: &Fault) -> Value {
        match fault {
            Fault::Throw { index } => self.stack.peek_raw(*index).unwrap_or(Value::Nil),
            Fault::Panic(_) => Value::Nil,
        }
    }

    // =========================================================================
    // Invocation
    // =========================================================================

    /// Invoke the callable at local register `base` of the current frame.
    ///
    /// `argument_count` counts the callee slot, so it is at least 1; the
    /// caller has laid out the arguments at `base + 1 ..`. On return the
    /// call's result sits in the caller's `local[base]`; the callee's
    /// register 0 and the caller's view of it are the same stack slot.
    pub fn invoke(&mut self, base: usize, argument_count: usize) -> Exec<()> {
        let caller = self.frame()?;
        if base >= caller.stack_size {
            return Err(Fault::panic("Stack underflow"));
        }
        let base_abs = caller.absolute(base);
        let callee = self.stack.get(base_abs)?;

        let (arity, local_count, handle) = match callee {
            Value::Function(f) => {
                let function = self.heap.function(f);
                (function.arity(), function.local_count(), None)
            }
            Value::Native(n) => {
                let native = self.heap.native(n);
                (native.arity(), native.local_count(), Some(native.handle()))
            }
            _ => return Err(self.throw_message_at(base_abs, "Illegal cast to function")),
        };
        if argument_count != arity {
            return Err(self.throw_message_at(base_abs, "Invalid arity"));
        }

        self.frames.push(CallFrame::new(base_abs, local_count));
        self.stack.ensure(base_abs + local_count);
        for local in argument_count..local_count {
            self.stack.set(base_abs + local, Value::Nil)?;
        }

        let result = match handle {
            None => self.interpret(),
            Some(handle) => handle(self),
        };

        // The pop and truncation run whether the body returned or faulted.
        self.frames.pop();
        let caller_end = self.frame()?.end();
        self.stack.truncate(caller_end)?;
        result
    }

    // =========================================================================
    // Interpreter loop
    // =========================================================================

    fn interpret(&mut self) -> Exec<()> {
        loop {
            let frame = self.frame()?;
            // Register 0 is re-read every step; it always holds the
            // function this frame is executing.
            let function = match self.stack.get(frame.stack_base)? {
                Value::Function(f) => f,
                _ => return Err(Fault::panic("Executing frame lost its callee")),
            };
            let pc = frame.pc;
            let code = {
                let function = self.heap.function(function);
                if pc >= function.byte_code().len() {
                    return Err(self.throw_message("Function did not return"));
                }
                function.byte_code()[pc]
            };
            let op = match code.op() {
                Some(op) => op,
                None => return Err(Fault::panic("Unknown byte code")),
            };
            match op {
                Op::NoOp => {
                    self.frame_mut()?.pc += 1;
                }
                Op::LoadConstant => {
                    let value = self
                        .heap
                        .function(function)
                        .constants()
                        .get(code.large())
                        .copied()
                        .ok_or_else(|| Fault::panic("Constant index out of bounds"))?;
                    self.frame_mut()?.pc += 1;
                    self.local_set(code.a(), value)?;
                }
                Op::LoadGlobal => {
                    self.frame_mut()?.pc += 1;
                    self.load_global(code.a(), code.b())?;
                }
                Op::StoreGlobal => {
                    self.frame_mut()?.pc += 1;
                    self.store_global(code.a(), code.b())?;
                }
                Op::Invoke => {
                    self.frame_mut()?.pc += 1;
                    self.invoke(code.a(), code.b())?;
                }
                Op::Return => {
                    self.frame_mut()?.pc += 1;
                    let value = self.local(code.a())?;
                    self.local_set(0, value)?;
                    return Ok(());
                }
                Op::Copy => {
                    self.frame_mut()?.pc += 1;
                    let value = self.local(code.b())?;
                    self.local_set(code.a(), value)?;
                }
                Op::Equal => {
                    self.frame_mut()?.pc += 1;
                    self.equal(code.a(), code.b(), code.c())?;
                }
                Op::Add => {
                    self.frame_mut()?.pc += 1;
                    self.add(code.a(), code.b(), code.c())?;
                }
                Op::Subtract => {
                    self.frame_mut()?.pc += 1;
                    self.subtract(code.a(), code.b(), code.c())?;
                }
                Op::Multiply => {
                    self.frame_mut()?.pc += 1;
                    self.multiply(code.a(), code.b(), code.c())?;
                }
                Op::Not => {
                    self.frame_mut()?.pc += 1;
                    self.not(code.a(), code.b())?;
                }
                Op::JumpIfFalse => {
                    let value = self.local(code.a())?;
                    let frame = self.frame_mut()?;
                    if value.is_truthy() {
                        frame.pc += 1;
                    } else {
                        frame.pc = code.large();
                    }
                }
                Op::Jump => {
                    self.frame_mut()?.pc = code.large();
                }
                Op::NewMap => {
                    self.frame_mut()?.pc += 1;
                    let map = self.new_map();
                    self.local_set(code.a(), Value::Map(map))?;
                }
                Op::MapSet => {
                    self.frame_mut()?.pc += 1;
                    self.map_set(code.a(), code.b(), code.c())?;
                }
            }
        }
    }

    // =========================================================================
    // Register operations
    // =========================================================================

    /// `local[dest] <- globals[local[src]]`. The key must be a string;
    /// a missing key leaves nil in `dest` and throws.
    pub fn load_global(&mut self, dest: usize, src: usize) -> Exec<()> {
        let key = self.local(src)?;
        if key.kind() != ValueKind::String {
            return Err(self.throw_message("Illegal cast to string"));
        }
        match self.heap.map_get(self.globals, key) {
            Some(value) => self.local_set(dest, value),
            None => {
                self.local_set(dest, Value::Nil)?;
                Err(self.throw_message("Undefined Global"))
            }
        }
    }

    /// `globals[local[key_reg]] <- local[value_reg]`. The key must be a
    /// string.
    pub fn store_global(&mut self, key_reg: usize, value_reg: usize) -> Exec<()> {
        let key = self.local(key_reg)?;
        if key.kind() != ValueKind::String {
            return Err(self.throw_message("Illegal cast to string"));
        }
        let value = self.local(value_reg)?;
        let globals = self.globals;
        self.map_put(globals, key, value);
        Ok(())
    }

    pub fn add(&mut self, dest: usize, a: usize, b: usize) -> Exec<()> {
        self.arithmetic(dest, a, b, i64::wrapping_add, |x, y| x + y)
    }

    pub fn subtract(&mut self, dest: usize, a: usize, b: usize) -> Exec<()> {
        self.arithmetic(dest, a, b, i64::wrapping_sub, |x, y| x - y)
    }

    pub fn multiply(&mut self, dest: usize, a: usize, b: usize) -> Exec<()> {
        self.arithmetic(dest, a, b, i64::wrapping_mul, |x, y| x * y)
    }

    /// Same-type division. Integer division by zero throws; double
    /// division follows IEEE-754.
    pub fn divide(&mut self, dest: usize, a: usize, b: usize) -> Exec<()> {
        let x = self.local(a)?;
        let y = self.local(b)?;
        let value = match (x, y) {
            (Value::Integer(x), Value::Integer(y)) => {
                if y == 0 {
                    return Err(self.throw_message("Division by zero"));
                }
                Value::Integer(x.wrapping_div(y))
            }
            (Value::Integer(_), _) => return Err(self.throw_message("Expected integer operand")),
            (Value::Double(x), Value::Double(y)) => Value::Double(x / y),
            (Value::Double(_), _) => return Err(self.throw_message("Expected double operand")),
            _ => return Err(self.throw_message("Expected numeric operand")),
        };
        self.local_set(dest, value)
    }

    /// Arithmetic inspects the type of the first operand: Integer demands
    /// an Integer partner, Double a Double. No implicit conversion.
    fn arithmetic(
        &mut self,
        dest: usize,
        a: usize,
        b: usize,
        int_op: fn(i64, i64) -> i64,
        double_op: fn(f64, f64) -> f64,
    ) -> Exec<()> {
        let x = self.local(a)?;
        let y = self.local(b)?;
        let value = match (x, y) {
            (Value::Integer(x), Value::Integer(y)) => Value::Integer(int_op(x, y)),
            (Value::Integer(_), _) => return Err(self.throw_message("Expected integer operand")),
            (Value::Double(x), Value::Double(y)) => Value::Double(double_op(x, y)),
            (Value::Double(_), _) => return Err(self.throw_message("Expected double operand")),
            _ => return Err(self.throw_message("Expected numeric operand")),
        };
        self.local_set(dest, value)
    }

    /// Same-type numeric ordering, used by the comparison natives.
    pub fn compare(
        &mut self,
        dest: usize,
        a: usize,
        b: usize,
        int_op: fn(i64, i64) -> bool,
        double_op: fn(f64, f64) -> bool,
    ) -> Exec<()> {
        let x = self.local(a)?;
        let y = self.local(b)?;
        let value = match (x, y) {
            (Value::Integer(x), Value::Integer(y)) => Value::Boolean(int_op(x, y)),
            (Value::Integer(_), _) => return Err(self.throw_message("Expected integer operand")),
            (Value::Double(x), Value::Double(y)) => Value::Boolean(double_op(x, y)),
            (Value::Double(_), _) => return Err(self.throw_message("Expected double operand")),
            _ => return Err(self.throw_message("Expected numeric operand")),
        };
        self.local_set(dest, value)
    }

    pub fn equal(&mut self, dest: usize, a: usize, b: usize) -> Exec<()> {
        let x = self.local(a)?;
        let y = self.local(b)?;
        let value = Value::Boolean(self.heap.values_equal(x, y));
        self.local_set(dest, value)
    }

    /// Boolean negation; the operand must be a boolean.
    pub fn not(&mut self, dest: usize, src: usize) -> Exec<()> {
        let value = match self.local(src)? {
            Value::Boolean(b) => Value::Boolean(!b),
            _ => return Err(self.throw_message("Illegal cast to boolean")),
        };
        self.local_set(dest, value)
    }

    fn map_set(&mut self, map_reg: usize, key_reg: usize, value_reg: usize) -> Exec<()> {
        let map = match self.local(map_reg)? {
            Value::Map(m) => m,
            _ => return Err(self.throw_message("Illegal cast to map")),
        };
        let key = self.local(key_reg)?;
        let value = self.local(value_reg)?;
        self.map_put(map, key, value);
        Ok(())
    }

    // =========================================================================
    // Verification glue
    // =========================================================================

    /// Verify a function, converting a rejection into a throw.
    pub fn verify_or_throw(&mut self, function: FunctionRef) -> Exec<()> {
        if let Err(error) = verify::verify_function(&self.heap, function) {
            return Err(self.throw_message(&error.to_string()));
        }
        Ok(())
    }

    /// Compile the source string in local 1, verify it, invoke it, and
    /// leave the result in local 0. Needs locals 0..=2 of the current
    /// frame.
    pub(crate) fn eval_local_source(&mut self) -> Exec<()> {
        compiler::compile(self)?;
        let function = match self.local(0)? {
            Value::Function(f) => f,
            _ => return Err(Fault::panic("Compiler did not produce a function")),
        };
        self.verify_or_throw(function)?;
        self.local_set(2, Value::Function(function))?;
        self.invoke(2, 1)?;
        let result = self.local(2)?;
        self.local_set(0, result)
    }

    // =========================================================================
    // Embedding API
    // =========================================================================

    /// Compile, verify and run a source string, returning its value.
    pub fn eval(&mut self, source: &str) -> Exec<Value> {
        let src = self.new_string_value(source);
        self.local_set(1, src)?;
        self.eval_local_source()?;
        self.local(0)
    }

    /// Run `load` on a file name. Returns 0 on success; an uncaught
    /// exception is printed and 1 is returned. Panics propagate.
    pub fn load(&mut self, name: &str) -> Exec<i32> {
        let global = self.new_string_value("load");
        self.local_set(0, global)?;
        self.load_global(0, 0)?;
        let argument = self.new_string_value(name);
        self.local_set(1, argument)?;
        match self.invoke(0, 2) {
            Ok(()) => Ok(0),
            Err(fault @ Fault::Throw { .. }) => {
                self.report_uncaught(&fault)?;
                Ok(1)
            }
            Err(panic) => Err(panic),
        }
    }

    /// Run the interactive shell until end of input.
    pub fn shell(&mut self) -> Exec<i32> {
        let global = self.new_string_value("shell");
        self.local_set(0, global)?;
        self.load_global(0, 0)?;
        match self.invoke(0, 1) {
            Ok(()) => Ok(0),
            Err(fault @ Fault::Throw { .. }) => {
                self.report_uncaught(&fault)?;
                Ok(1)
            }
            Err(panic) => Err(panic),
        }
    }

    fn report_uncaught(&mut self, fault: &Fault) -> Exec<()> {
        let thrown = self.thrown_value(fault);
        // Root the payload before rendering allocates anything.
        self.local_set(2, thrown)?;
        let mut text = String::from("ERROR Uncaught Exception:\n");
        text.push_str(&self.render_value(thrown));
        text.push('\n');
        let stdout = self.host.stdout();
        self.host.write(stdout, text.as_bytes());
        Ok(())
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    /// Render a value the way `print` shows it. Map entries appear in
    /// insertion order; cyclic maps render as `{...}` at the repeated
    /// node.
    pub fn render_value(&self, value: Value) -> String {
        let mut out = String::new();
        let mut visited = Vec::new();
        self.render_into(value, &mut out, &mut visited);
        out
    }

    fn render_into(&self, value: Value, out: &mut String, visited: &mut Vec<MapRef>) {
        match value {
            Value::Nil => out.push_str("nil"),
            Value::Integer(n) => out.push_str(&n.to_string()),
            Value::Double(d) => out.push_str(&d.to_string()),
            Value::Boolean(b) => out.push_str(if b { "true" } else { "false" }),
            Value::String(s) => {
                out.push_str(&String::from_utf8_lossy(self.heap.string(s).bytes()))
            }
            Value::Function(_) => out.push_str("<function>"),
            Value::Native(_) => out.push_str("<native function>"),
            Value::Map(m) => {
                if visited.contains(&m) {
                    out.push_str("{...}");
                    return;
                }
                visited.push(m);
                out.push('{');
                for index in 0..self.heap.map(m).len() {
                    if index > 0 {
                        out.push_str(", ");
                    }
                    if let Some((key, value)) = self.heap.map(m).entry(index) {
                        self.render_into(key, out, visited);
                        out.push_str(": ");
                        self.render_into(value, out, visited);
                    }
                }
                out.push('}');
                visited.pop();
            }
        }
    }

    // =========================================================================
    // Host access
    // =========================================================================

    pub fn host_open(&mut self, path: &str, mode: FileMode) -> Option<FileId> {
        self.host.open(path, mode)
    }

    pub fn host_read(&mut self, file: FileId) -> Option<u8> {
        self.host.read(file)
    }

    pub fn host_write(&mut self, file: FileId, bytes: &[u8]) {
        self.host.write(file, bytes);
    }

    pub fn host_close(&mut self, file: FileId) {
        self.host.close(file);
    }

    pub fn host_stdin(&self) -> FileId {
        self.host.stdin()
    }

    pub fn host_stdout(&self) -> FileId {
        self.host.stdout()
    }
}
