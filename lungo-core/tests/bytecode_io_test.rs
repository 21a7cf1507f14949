// lungo-core - Serialized bytecode round-trip tests
// Copyright (c) 2026 Tom Waddington. MIT licensed.

mod common;
use common::*;

use lungo_core::loader::{read_bytes, write_function};
use lungo_core::{ByteCode, FunctionRef, Op, verify_function};

/// Structural equality via the canonical serialized form.
fn serialized(rt: &Runtime, function: FunctionRef) -> Vec<u8> {
    let mut out = Vec::new();
    write_function(rt.heap(), function, &mut out).expect("serializable function");
    out
}

#[test]
fn round_trip_preserves_structure() {
    let mut rt = new_runtime();

    // hand-build a function with a nested function and every constant tag
    let nested = rt.new_function();
    rt.local_set(3, Value::Function(nested)).unwrap();
    rt.function_set_stack(nested, 2, 3);
    rt.function_push_byte_code(nested, ByteCode::abc(Op::Add, 2, 1, 1));
    rt.function_push_byte_code(nested, ByteCode::abc(Op::Return, 2, 0, 0));

    let outer = rt.new_function();
    rt.local_set(4, Value::Function(outer)).unwrap();
    rt.function_set_stack(outer, 1, 4);
    rt.function_push_byte_code(outer, ByteCode::al(Op::LoadConstant, 1, 0));
    rt.function_push_byte_code(outer, ByteCode::al(Op::JumpIfFalse, 1, 4));
    rt.function_push_byte_code(outer, ByteCode::al(Op::LoadConstant, 2, 2));
    rt.function_push_byte_code(outer, ByteCode::large_only(Op::Jump, 5));
    rt.function_push_byte_code(outer, ByteCode::al(Op::LoadConstant, 2, 3));
    rt.function_push_byte_code(outer, ByteCode::abc(Op::Return, 2, 0, 0));
    rt.function_add_constant(outer, Value::Boolean(true));
    rt.function_add_constant(outer, Value::Nil);
    let text = rt.new_string_value("payload");
    rt.local_set(5, text).unwrap();
    rt.function_add_constant(outer, text);
    rt.function_add_constant(outer, Value::Double(2.5));
    rt.function_add_constant(outer, Value::Integer(-7));
    rt.function_add_constant(outer, Value::Function(nested));

    assert_eq!(verify_function(rt.heap(), outer), Ok(()));

    let bytes = serialized(&rt, outer);
    let reread = read_bytes(&mut rt, &bytes).expect("readable bytecode");
    rt.local_set(6, Value::Function(reread)).unwrap();

    assert_eq!(verify_function(rt.heap(), reread), Ok(()));
    assert_eq!(serialized(&rt, reread), bytes);

    // the reread function actually runs: true branch loads "payload"
    rt.local_set(2, Value::Function(reread)).unwrap();
    rt.invoke(2, 1).unwrap();
    match rt.local(2).unwrap() {
        Value::String(s) => assert_eq!(rt.heap().string(s).bytes(), b"payload"),
        other => panic!("expected the string branch, got {:?}", other),
    }
}

#[test]
fn compiled_functions_round_trip() {
    let mut rt = new_runtime();
    // compile without running: (compile "...") returns the function
    let value = rt.eval("(compile \"(+ 1 2)\")").unwrap();
    let function = match value {
        Value::Function(f) => f,
        other => panic!("expected a function, got {:?}", other),
    };
    rt.local_set(3, value).unwrap();

    let bytes = serialized(&rt, function);
    let reread = read_bytes(&mut rt, &bytes).expect("readable bytecode");
    rt.local_set(4, Value::Function(reread)).unwrap();
    assert_eq!(serialized(&rt, reread), bytes);

    rt.local_set(2, Value::Function(reread)).unwrap();
    rt.invoke(2, 1).unwrap();
    assert_eq!(rt.local(2).unwrap(), Value::Integer(3));
}

#[test]
fn truncated_input_throws() {
    let mut rt = new_runtime();
    let value = rt.eval("(compile \"(+ 1 2)\")").unwrap();
    let function = match value {
        Value::Function(f) => f,
        other => panic!("expected a function, got {:?}", other),
    };
    rt.local_set(3, value).unwrap();
    let bytes = serialized(&rt, function);

    for cut in [0, 1, 3, bytes.len() / 2, bytes.len() - 1] {
        match read_bytes(&mut rt, &bytes[..cut]) {
            Err(fault @ Fault::Throw { .. }) => {
                let thrown = rt.thrown_value(&fault);
                assert_eq!(rt.render_value(thrown), "File truncated");
            }
            other => panic!("cut at {} should throw, got {:?}", cut, other.err()),
        }
    }
}

#[test]
fn unknown_constant_tag_throws() {
    let mut rt = new_runtime();
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&1u16.to_be_bytes()); // arity
    bytes.extend_from_slice(&1u16.to_be_bytes()); // local count
    bytes.extend_from_slice(&0u16.to_be_bytes()); // no bytecode
    bytes.extend_from_slice(&1u16.to_be_bytes()); // one constant
    bytes.push(9); // bogus tag

    match read_bytes(&mut rt, &bytes) {
        Err(fault @ Fault::Throw { .. }) => {
            let thrown = rt.thrown_value(&fault);
            assert_eq!(rt.render_value(thrown), "Invalid constant");
        }
        other => panic!("expected a throw, got {:?}", other.err()),
    }
}

#[test]
fn unknown_opcode_throws() {
    let mut rt = new_runtime();
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&1u16.to_be_bytes()); // arity
    bytes.extend_from_slice(&1u16.to_be_bytes()); // local count
    bytes.extend_from_slice(&1u16.to_be_bytes()); // one instruction
    bytes.extend_from_slice(&(0x06u32 << 24).to_be_bytes()); // reserved encoding
    bytes.extend_from_slice(&0u16.to_be_bytes()); // no constants

    match read_bytes(&mut rt, &bytes) {
        Err(fault @ Fault::Throw { .. }) => {
            let thrown = rt.thrown_value(&fault);
            assert_eq!(rt.render_value(thrown), "Invalid byte code");
        }
        other => panic!("expected a throw, got {:?}", other.err()),
    }
}

#[test]
fn disassembly_lists_instructions_and_constants() {
    let mut rt = new_runtime();
    let value = rt
        .eval("(compile \"(do (def f (fn (a) a)) (if true 1 2))\")")
        .unwrap();
    let function = match value {
        Value::Function(f) => f,
        other => panic!("expected a function, got {:?}", other),
    };
    rt.local_set(3, value).unwrap();

    let listing = lungo_core::disasm::disassemble(rt.heap(), function);
    assert!(listing.contains("StoreGlobal"));
    assert!(listing.contains("JumpIfFalse"));
    assert!(listing.contains("Return"));
    // the nested function appears inline
    assert!(listing.contains("= function:"));
    assert!(listing.contains("function arity=2"));
    assert!(listing.contains("= \"f\""));
}

#[test]
fn read_byte_code_native_round_trips() {
    // the whole loop through script space: compile, write on the Rust
    // side, hand the bytes back in as a string, read and invoke
    let mut rt = new_runtime();
    let value = rt.eval("(compile \"(* 6 7)\")").unwrap();
    let function = match value {
        Value::Function(f) => f,
        other => panic!("expected a function, got {:?}", other),
    };
    rt.local_set(3, value).unwrap();
    let bytes = serialized(&rt, function);

    let blob = Value::String(rt.new_string(&bytes));
    rt.local_set(1, blob).unwrap();
    let reread = read_bytes(&mut rt, &bytes).expect("readable bytecode");
    rt.verify_or_throw(reread).unwrap();
    rt.local_set(2, Value::Function(reread)).unwrap();
    rt.invoke(2, 1).unwrap();
    assert_eq!(rt.local(2).unwrap(), Value::Integer(42));
}
