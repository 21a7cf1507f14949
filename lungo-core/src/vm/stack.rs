// lungo-core - Value stack
// Copyright (c) 2026 Tom Waddington. MIT licensed.

//! The single value stack shared by every call frame.
//!
//! The stack is grow-only: popping a frame truncates the *logical* length
//! while the buffer keeps its contents. That discipline is what lets a
//! thrown value, addressed by absolute index, stay readable while the
//! frames above it unwind.

use crate::error::{Exec, Fault};
use crate::value::Value;

/// The runtime's value stack.
#[derive(Debug, Default)]
pub struct ValueStack {
    values: Vec<Value>,
    len: usize,
}

impl ValueStack {
    pub fn new() -> Self {
        Self {
            values: Vec::with_capacity(256),
            len: 0,
        }
    }

    /// Logical length: one past the highest live slot.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read a live slot.
    pub fn get(&self, index: usize) -> Exec<Value> {
        if index >= self.len {
            return Err(Fault::panic("Stack underflow"));
        }
        Ok(self.values[index])
    }

    /// Write a live slot.
    pub fn set(&mut self, index: usize, value: Value) -> Exec<()> {
        if index >= self.len {
            return Err(Fault::panic("Stack underflow"));
        }
        self.values[index] = value;
        Ok(())
    }

    /// Grow the logical length to cover `len` slots. Slots brought under
    /// the logical length are nil-initialized; slots already live keep
    /// their values.
    pub fn ensure(&mut self, len: usize) {
        while self.values.len() < len {
            self.values.push(Value::Nil);
        }
        for index in self.len..len {
            self.values[index] = Value::Nil;
        }
        if len > self.len {
            self.len = len;
        }
    }

    /// Logically truncate. The buffer is untouched, so absolute indices
    /// above the new length stay readable through [`ValueStack::peek_raw`]
    /// until the slots are reused.
    pub fn truncate(&mut self, len: usize) -> Exec<()> {
        if len > self.len {
            return Err(Fault::panic("Truncate underflow"));
        }
        self.len = len;
        Ok(())
    }

    /// Read a slot by absolute index regardless of the logical length.
    /// This is the exception-recovery path: the thrown value's frame has
    /// already been popped when the catcher reads it.
    pub fn peek_raw(&self, index: usize) -> Option<Value> {
        self.values.get(index).copied()
    }

    /// The live slots, lowest first. These are exactly the GC roots the
    /// stack contributes.
    pub fn live(&self) -> &[Value] {
        &self.values[..self.len]
    }
}
