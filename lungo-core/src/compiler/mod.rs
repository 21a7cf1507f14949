// lungo-core - Compiler front end
// Copyright (c) 2026 Tom Waddington. MIT licensed.

//! The compiler: tokenizer plus single-pass code generation.
//!
//! Source text goes straight from tokens to bytecode; there is no AST.
//! [`compile`] follows the native register protocol: source string in
//! local 1, compiled function out in local 0, local 2 as rooting scratch.

pub mod codegen;
pub mod lexer;

pub(crate) use codegen::compile;
