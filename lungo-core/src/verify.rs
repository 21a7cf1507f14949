// lungo-core - Static bytecode verifier
// Copyright (c) 2026 Tom Waddington. MIT licensed.

//! Static verification of functions before execution.
//!
//! The verifier's contract is exactly what the interpreter assumes: every
//! register a verified instruction names is inside the frame, register 0
//! is only written through the frame mechanism, every jump target and
//! constant index is in bounds, and every callable embedded in the
//! constant pool satisfies the same contract. A function that passes
//! verification either returns a value or throws; it never panics the
//! interpreter.
//!
//! Verification is pure: running it twice has the same outcome as once.

use std::fmt;

use crate::bytecode::Op;
use crate::heap::Heap;
use crate::object::{FunctionRef, NativeRef};
use crate::value::Value;

/// The hard ceiling on a frame's register count. Register operands are a
/// single byte, so 256 registers (indices 0..=255) is exactly addressable.
pub const MAX_LOCALS: usize = 256;

/// A verification rejection. Display names the offending index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// Arity outside `1 ..= local_count`.
    BadArity { arity: usize, local_count: usize },
    /// Local count outside `1 ..= 256`.
    BadLocalCount { local_count: usize },
    /// An instruction's opcode byte is not recognized.
    UnknownOpCode { pc: usize, raw: u32 },
    /// A destination register is register 0 or out of range.
    BadDestination {
        pc: usize,
        register: usize,
        local_count: usize,
    },
    /// A source register is out of range.
    BadSource {
        pc: usize,
        register: usize,
        local_count: usize,
    },
    /// A jump target is outside the bytecode.
    BadJumpTarget {
        pc: usize,
        target: usize,
        byte_code_count: usize,
    },
    /// A constant index is outside the pool.
    BadConstantIndex {
        pc: usize,
        index: usize,
        constant_count: usize,
    },
    /// An Invoke without even the callee slot.
    EmptyInvoke { pc: usize },
    /// A native registration with inconsistent arity/local count.
    BadNative { arity: usize, local_count: usize },
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyError::BadArity { arity, local_count } => write!(
                f,
                "Verification failed: arity {} outside 1..={}",
                arity, local_count
            ),
            VerifyError::BadLocalCount { local_count } => write!(
                f,
                "Verification failed: local count {} outside 1..={}",
                local_count, MAX_LOCALS
            ),
            VerifyError::UnknownOpCode { pc, raw } => write!(
                f,
                "Verification failed: unknown opcode {:#010x} at instruction {}",
                raw, pc
            ),
            VerifyError::BadDestination {
                pc,
                register,
                local_count,
            } => write!(
                f,
                "Verification failed: destination register {} at instruction {} (writable range 1..{})",
                register, pc, local_count
            ),
            VerifyError::BadSource {
                pc,
                register,
                local_count,
            } => write!(
                f,
                "Verification failed: source register {} at instruction {} (readable range 0..{})",
                register, pc, local_count
            ),
            VerifyError::BadJumpTarget {
                pc,
                target,
                byte_code_count,
            } => write!(
                f,
                "Verification failed: jump target {} at instruction {} (bytecode count {})",
                target, pc, byte_code_count
            ),
            VerifyError::BadConstantIndex {
                pc,
                index,
                constant_count,
            } => write!(
                f,
                "Verification failed: constant index {} at instruction {} (constant count {})",
                index, pc, constant_count
            ),
            VerifyError::EmptyInvoke { pc } => write!(
                f,
                "Verification failed: Invoke with argument count 0 at instruction {}",
                pc
            ),
            VerifyError::BadNative { arity, local_count } => write!(
                f,
                "Verification failed: native with arity {} and local count {}",
                arity, local_count
            ),
        }
    }
}

impl std::error::Error for VerifyError {}

/// Verify one function, recursing into every callable in its constant
/// pool.
pub fn verify_function(heap: &Heap, function: FunctionRef) -> Result<(), VerifyError> {
    let f = heap.function(function);
    let local_count = f.local_count();
    let arity = f.arity();

    if local_count < 1 || local_count > MAX_LOCALS {
        return Err(VerifyError::BadLocalCount { local_count });
    }
    if arity < 1 || arity > local_count {
        return Err(VerifyError::BadArity { arity, local_count });
    }

    let byte_code_count = f.byte_code().len();
    let constant_count = f.constants().len();

    for (pc, code) in f.byte_code().iter().enumerate() {
        let op = match code.op() {
            Some(op) => op,
            None => {
                return Err(VerifyError::UnknownOpCode {
                    pc,
                    raw: code.raw(),
                });
            }
        };

        let destination = |register: usize| {
            if register == 0 || register >= local_count {
                Err(VerifyError::BadDestination {
                    pc,
                    register,
                    local_count,
                })
            } else {
                Ok(())
            }
        };
        let source = |register: usize| {
            if register >= local_count {
                Err(VerifyError::BadSource {
                    pc,
                    register,
                    local_count,
                })
            } else {
                Ok(())
            }
        };
        let jump_target = |target: usize| {
            if target >= byte_code_count {
                Err(VerifyError::BadJumpTarget {
                    pc,
                    target,
                    byte_code_count,
                })
            } else {
                Ok(())
            }
        };
        let constant_index = |index: usize| {
            if index >= constant_count {
                Err(VerifyError::BadConstantIndex {
                    pc,
                    index,
                    constant_count,
                })
            } else {
                Ok(())
            }
        };

        match op {
            Op::NoOp => {}
            Op::LoadConstant => {
                destination(code.a())?;
                constant_index(code.large())?;
            }
            Op::LoadGlobal => {
                destination(code.a())?;
                source(code.b())?;
            }
            Op::StoreGlobal => {
                source(code.a())?;
                source(code.b())?;
            }
            Op::Invoke => {
                destination(code.a())?;
                if code.b() == 0 {
                    return Err(VerifyError::EmptyInvoke { pc });
                }
            }
            Op::Return => {
                source(code.a())?;
            }
            Op::Copy => {
                destination(code.a())?;
                source(code.b())?;
            }
            Op::Equal | Op::Add | Op::Subtract | Op::Multiply => {
                destination(code.a())?;
                source(code.b())?;
                source(code.c())?;
            }
            Op::Not => {
                destination(code.a())?;
                source(code.b())?;
            }
            Op::JumpIfFalse => {
                source(code.a())?;
                jump_target(code.large())?;
            }
            Op::Jump => {
                jump_target(code.large())?;
            }
            Op::NewMap => {
                destination(code.a())?;
            }
            Op::MapSet => {
                source(code.a())?;
                source(code.b())?;
                source(code.c())?;
            }
        }
    }

    for constant in f.constants() {
        match *constant {
            Value::Function(nested) => verify_function(heap, nested)?,
            Value::Native(native) => verify_native(heap, native)?,
            _ => {}
        }
    }

    Ok(())
}

/// Verify a native callable's registration data.
pub fn verify_native(heap: &Heap, native: NativeRef) -> Result<(), VerifyError> {
    let n = heap.native(native);
    if n.arity() < 1 || n.local_count() < n.arity() {
        return Err(VerifyError::BadNative {
            arity: n.arity(),
            local_count: n.local_count(),
        });
    }
    Ok(())
}
