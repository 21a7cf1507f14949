// lungo-core - Serialized bytecode reader and writer
// Copyright (c) 2026 Tom Waddington. MIT licensed.

//! The serialized bytecode format.
//!
//! All multi-byte numbers are big-endian:
//!
//! ```text
//! function := u16 arity, u16 localCount, u16 byteCodeCount,
//!             u32 * byteCodeCount, u16 constantCount, constant*
//! constant := u8 tag, payload
//!   tag 0 nil      (empty)
//!   tag 1 integer  i64
//!   tag 2 double   f64 (IEEE bits)
//!   tag 3 string   u32 length, length bytes
//!   tag 4 boolean  u8
//!   tag 5 function nested function
//! ```
//!
//! The u16 constant count caps a pool at 65535 entries, which is exactly
//! the reach of a 16-bit constant index: an unaddressable pool cannot be
//! expressed. Truncated input and unknown tags or opcodes raise throws;
//! the reader produces unverified functions, and callers run the verifier
//! before invoking them.

use std::fmt;

use crate::bytecode::ByteCode;
use crate::error::Exec;
use crate::heap::Heap;
use crate::object::FunctionRef;
use crate::value::Value;
use crate::vm::Runtime;

/// Constant pool tags.
const TAG_NIL: u8 = 0;
const TAG_INTEGER: u8 = 1;
const TAG_DOUBLE: u8 = 2;
const TAG_STRING: u8 = 3;
const TAG_BOOLEAN: u8 = 4;
const TAG_FUNCTION: u8 = 5;

/// Read a function from serialized bytes.
///
/// Follows the native register protocol: the result lands in local 0 and
/// local 2 roots nested objects while pools grow, so the current frame
/// needs at least three registers.
pub fn read_bytes(rt: &mut Runtime, bytes: &[u8]) -> Exec<FunctionRef> {
    let dest = rt.new_function();
    rt.local_set(0, Value::Function(dest))?;
    let mut reader = ByteReader { bytes, index: 0 };
    read_function(rt, &mut reader, dest)?;
    Ok(dest)
}

struct ByteReader<'a> {
    bytes: &'a [u8],
    index: usize,
}

impl ByteReader<'_> {
    fn read_u8(&mut self, rt: &mut Runtime) -> Exec<u8> {
        match self.bytes.get(self.index) {
            Some(byte) => {
                self.index += 1;
                Ok(*byte)
            }
            None => Err(rt.throw_message("File truncated")),
        }
    }

    fn read_u16(&mut self, rt: &mut Runtime) -> Exec<u16> {
        let high = self.read_u8(rt)? as u16;
        let low = self.read_u8(rt)? as u16;
        Ok((high << 8) | low)
    }

    fn read_u32(&mut self, rt: &mut Runtime) -> Exec<u32> {
        let high = self.read_u16(rt)? as u32;
        let low = self.read_u16(rt)? as u32;
        Ok((high << 16) | low)
    }

    fn read_u64(&mut self, rt: &mut Runtime) -> Exec<u64> {
        let high = self.read_u32(rt)? as u64;
        let low = self.read_u32(rt)? as u64;
        Ok((high << 32) | low)
    }

    fn read_slice(&mut self, rt: &mut Runtime, length: usize) -> Exec<Vec<u8>> {
        match self.bytes.get(self.index..self.index + length) {
            Some(slice) => {
                self.index += length;
                Ok(slice.to_vec())
            }
            None => Err(rt.throw_message("File truncated")),
        }
    }
}

fn read_function(rt: &mut Runtime, reader: &mut ByteReader<'_>, dest: FunctionRef) -> Exec<()> {
    let arity = reader.read_u16(rt)? as usize;
    let local_count = reader.read_u16(rt)? as usize;
    rt.function_set_stack(dest, arity, local_count);

    let byte_code_count = reader.read_u16(rt)? as usize;
    rt.function_reserve(dest, byte_code_count, 0);
    for _ in 0..byte_code_count {
        let code = ByteCode::from_raw(reader.read_u32(rt)?);
        if code.op().is_none() {
            return Err(rt.throw_message("Invalid byte code"));
        }
        rt.function_push_byte_code(dest, code);
    }

    let constant_count = reader.read_u16(rt)? as usize;
    rt.function_reserve(dest, 0, constant_count);
    for _ in 0..constant_count {
        match reader.read_u8(rt)? {
            TAG_NIL => {
                rt.function_add_constant(dest, Value::Nil);
            }
            TAG_INTEGER => {
                let value = reader.read_u64(rt)? as i64;
                rt.function_add_constant(dest, Value::Integer(value));
            }
            TAG_DOUBLE => {
                let value = f64::from_bits(reader.read_u64(rt)?);
                rt.function_add_constant(dest, Value::Double(value));
            }
            TAG_STRING => {
                let length = reader.read_u32(rt)? as usize;
                let bytes = reader.read_slice(rt, length)?;
                let string = Value::String(rt.new_string(&bytes));
                rt.local_set(2, string)?;
                rt.function_add_constant(dest, string);
            }
            TAG_BOOLEAN => {
                let value = reader.read_u8(rt)? != 0;
                rt.function_add_constant(dest, Value::Boolean(value));
            }
            TAG_FUNCTION => {
                // the nested function roots through the parent pool while
                // its own body is read
                let nested = rt.new_function();
                rt.local_set(2, Value::Function(nested))?;
                rt.function_add_constant(dest, Value::Function(nested));
                read_function(rt, reader, nested)?;
            }
            _ => return Err(rt.throw_message("Invalid constant")),
        }
    }
    Ok(())
}

/// Error serializing a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    /// More instructions than a u16 count can carry.
    TooManyByteCodes(usize),
    /// More constants than a u16 count can carry.
    TooManyConstants(usize),
    /// A string constant longer than a u32 length can carry.
    StringTooLong(usize),
    /// A constant kind with no serialized form (maps, natives).
    UnsupportedConstant(&'static str),
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteError::TooManyByteCodes(count) => {
                write!(f, "function has {} instructions (limit 65535)", count)
            }
            WriteError::TooManyConstants(count) => {
                write!(f, "function has {} constants (limit 65535)", count)
            }
            WriteError::StringTooLong(length) => {
                write!(f, "string constant of {} bytes exceeds u32 length", length)
            }
            WriteError::UnsupportedConstant(kind) => {
                write!(f, "{} constants have no serialized form", kind)
            }
        }
    }
}

impl std::error::Error for WriteError {}

/// Serialize a function to the wire format. Inverse of the reader: a
/// written function reparses to a structurally equal one.
pub fn write_function(
    heap: &Heap,
    function: FunctionRef,
    out: &mut Vec<u8>,
) -> Result<(), WriteError> {
    let f = heap.function(function);

    let byte_code_count = f.byte_code().len();
    if byte_code_count > u16::MAX as usize {
        return Err(WriteError::TooManyByteCodes(byte_code_count));
    }
    let constant_count = f.constants().len();
    if constant_count > u16::MAX as usize {
        return Err(WriteError::TooManyConstants(constant_count));
    }

    out.extend_from_slice(&(f.arity() as u16).to_be_bytes());
    out.extend_from_slice(&(f.local_count() as u16).to_be_bytes());
    out.extend_from_slice(&(byte_code_count as u16).to_be_bytes());
    for code in f.byte_code() {
        out.extend_from_slice(&code.raw().to_be_bytes());
    }
    out.extend_from_slice(&(constant_count as u16).to_be_bytes());
    for constant in f.constants() {
        match *constant {
            Value::Nil => out.push(TAG_NIL),
            Value::Integer(value) => {
                out.push(TAG_INTEGER);
                out.extend_from_slice(&value.to_be_bytes());
            }
            Value::Double(value) => {
                out.push(TAG_DOUBLE);
                out.extend_from_slice(&value.to_bits().to_be_bytes());
            }
            Value::String(string) => {
                let bytes = heap.string(string).bytes();
                if bytes.len() > u32::MAX as usize {
                    return Err(WriteError::StringTooLong(bytes.len()));
                }
                out.push(TAG_STRING);
                out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
                out.extend_from_slice(bytes);
            }
            Value::Boolean(value) => {
                out.push(TAG_BOOLEAN);
                out.push(value as u8);
            }
            Value::Function(nested) => {
                out.push(TAG_FUNCTION);
                write_function(heap, nested, out)?;
            }
            Value::Native(_) => return Err(WriteError::UnsupportedConstant("native function")),
            Value::Map(_) => return Err(WriteError::UnsupportedConstant("map")),
        }
    }
    Ok(())
}
