// lungo-core - Bytecode disassembler
// Copyright (c) 2026 Tom Waddington. MIT licensed.

//! Human-readable function listings.
//!
//! One instruction per line with the decoded operand shape, followed by
//! the constant pool; nested functions are listed inline, indented. The
//! format is diagnostic output, not a parseable assembly form.

use std::fmt::Write;

use crate::bytecode::Op;
use crate::heap::Heap;
use crate::object::FunctionRef;
use crate::value::Value;

/// Render a function listing, recursing into nested function constants.
pub fn disassemble(heap: &Heap, function: FunctionRef) -> String {
    let mut out = String::new();
    disassemble_into(heap, function, 0, &mut out);
    out
}

fn disassemble_into(heap: &Heap, function: FunctionRef, depth: usize, out: &mut String) {
    let indent = "    ".repeat(depth);
    let f = heap.function(function);
    let _ = writeln!(
        out,
        "{}function arity={} locals={}",
        indent,
        f.arity(),
        f.local_count()
    );

    for (pc, code) in f.byte_code().iter().enumerate() {
        let _ = write!(out, "{}  {:4}  ", indent, pc);
        match code.op() {
            None => {
                let _ = writeln!(out, "??? {:#010x}", code.raw());
            }
            Some(op) => {
                let _ = match op {
                    Op::NoOp => writeln!(out, "NoOp"),
                    Op::LoadConstant => {
                        writeln!(out, "LoadConstant r{} <- c{}", code.a(), code.large())
                    }
                    Op::LoadGlobal => writeln!(out, "LoadGlobal r{} <- [r{}]", code.a(), code.b()),
                    Op::StoreGlobal => {
                        writeln!(out, "StoreGlobal [r{}] <- r{}", code.a(), code.b())
                    }
                    Op::Invoke => writeln!(out, "Invoke base=r{} argc={}", code.a(), code.b()),
                    Op::Return => writeln!(out, "Return r{}", code.a()),
                    Op::Copy => writeln!(out, "Copy r{} <- r{}", code.a(), code.b()),
                    Op::Equal => {
                        writeln!(out, "Equal r{} <- r{} r{}", code.a(), code.b(), code.c())
                    }
                    Op::Add => writeln!(out, "Add r{} <- r{} r{}", code.a(), code.b(), code.c()),
                    Op::Subtract => {
                        writeln!(out, "Subtract r{} <- r{} r{}", code.a(), code.b(), code.c())
                    }
                    Op::Multiply => {
                        writeln!(out, "Multiply r{} <- r{} r{}", code.a(), code.b(), code.c())
                    }
                    Op::Not => writeln!(out, "Not r{} <- r{}", code.a(), code.b()),
                    Op::JumpIfFalse => {
                        writeln!(out, "JumpIfFalse r{} -> {}", code.a(), code.large())
                    }
                    Op::Jump => writeln!(out, "Jump -> {}", code.large()),
                    Op::NewMap => writeln!(out, "NewMap r{}", code.a()),
                    Op::MapSet => {
                        writeln!(out, "MapSet r{}[r{}] <- r{}", code.a(), code.b(), code.c())
                    }
                };
            }
        }
    }

    for (index, constant) in f.constants().iter().enumerate() {
        match *constant {
            Value::Function(nested) => {
                let _ = writeln!(out, "{}  c{:3} = function:", indent, index);
                disassemble_into(heap, nested, depth + 1, out);
            }
            Value::String(s) => {
                let _ = writeln!(
                    out,
                    "{}  c{:3} = \"{}\"",
                    indent,
                    index,
                    String::from_utf8_lossy(heap.string(s).bytes())
                );
            }
            Value::Nil => {
                let _ = writeln!(out, "{}  c{:3} = nil", indent, index);
            }
            Value::Integer(n) => {
                let _ = writeln!(out, "{}  c{:3} = {}", indent, index, n);
            }
            Value::Double(d) => {
                let _ = writeln!(out, "{}  c{:3} = {}", indent, index, d);
            }
            Value::Boolean(b) => {
                let _ = writeln!(out, "{}  c{:3} = {}", indent, index, b);
            }
            Value::Native(_) => {
                let _ = writeln!(out, "{}  c{:3} = <native function>", indent, index);
            }
            Value::Map(_) => {
                let _ = writeln!(out, "{}  c{:3} = <map>", indent, index);
            }
        }
    }
}
