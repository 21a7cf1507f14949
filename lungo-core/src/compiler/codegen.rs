// lungo-core - Single-pass code generation
// Copyright (c) 2026 Tom Waddington. MIT licensed.

//! Code generation: a single pass from tokens to verified-ready bytecode.
//!
//! The emitter keeps a stack of contexts, one per enclosing function.
//! Each context owns its destination function and a static model of the
//! frame: a `locals` vector of named registers (register 0 is the
//! pre-defined pseudo-local `self`) and a `scopes` stack recording the
//! high-water marks each scope presents to its children.
//!
//! The central invariant: compiling an expression leaves exactly one
//! value at the context's next free register. Statement-like forms keep
//! themselves expression-typed by popping their payload and loading nil.
//!
//! Compile errors follow the runtime's abort protocol: the message
//! lands in register 0 of the compile frame and unwinds as a throw.

use crate::bytecode::{ByteCode, Op};
use crate::compiler::lexer::{Lexer, Token, TokenKind};
use crate::error::{Exec, Fault};
use crate::object::FunctionRef;
use crate::value::Value;
use crate::verify::MAX_LOCALS;
use crate::vm::Runtime;

/// Scratch register of the compile frame, used to root freshly created
/// constants across pool growth.
const SCRATCH_LOCAL: usize = 2;

/// Invoke packs its argument count into one byte.
const MAX_ARGUMENTS: usize = 255;

/// Constant indices are 16-bit.
const MAX_CONSTANTS: usize = 65536;

/// Bytecode counts (and so jump targets) are 16-bit.
const MAX_BYTE_CODE: usize = 65535;

/// A named register.
struct LocalSlot {
    name: String,
    register: usize,
    /// Resolvable only once its binding expression has finished.
    defined: bool,
}

/// Static high-water marks one scope presents to its children.
#[derive(Debug, Clone, Copy)]
struct Scope {
    locals_size: usize,
    stack_size: usize,
    /// Length of the context's locals vector when this scope opened.
    locals_len: usize,
}

/// Compilation state for one enclosing function.
struct Context {
    dest: FunctionRef,
    arity: usize,
    max_registers: usize,
    locals: Vec<LocalSlot>,
    scopes: Vec<Scope>,
}

impl Context {
    fn new(dest: FunctionRef) -> Self {
        Self {
            dest,
            arity: 1,
            max_registers: 1,
            locals: vec![LocalSlot {
                name: "self".to_string(),
                register: 0,
                defined: true,
            }],
            scopes: vec![Scope {
                locals_size: 1,
                stack_size: 0,
                locals_len: 1,
            }],
        }
    }
}

/// Compile the source string in local 1 of the current frame into a new
/// function left in local 0. Local 2 is used as a rooting scratch slot.
pub(crate) fn compile(rt: &mut Runtime) -> Exec<()> {
    let source_ref = match rt.local(1)? {
        Value::String(s) => s,
        _ => return Err(rt.throw_message("Illegal cast to string")),
    };
    let source = rt.heap().string(source_ref).bytes().to_vec();

    let dest = rt.new_function();
    rt.local_set(0, Value::Function(dest))?;

    let mut codegen = Codegen {
        rt,
        lexer: Lexer::new(source),
        contexts: vec![Context::new(dest)],
    };
    codegen.run()
}

struct Codegen<'rt> {
    rt: &'rt mut Runtime,
    lexer: Lexer,
    contexts: Vec<Context>,
}

impl Codegen<'_> {
    fn run(&mut self) -> Exec<()> {
        // The top level compiles like a `do`: intermediate values are
        // popped, the last expression's slot is returned.
        let mut produced = false;
        loop {
            let token = self.next()?;
            if token.kind == TokenKind::Eof {
                break;
            }
            self.lexer.put_back(token);
            if produced {
                self.stack_pop();
            }
            self.compile_expression()?;
            produced = true;
        }
        if !produced {
            self.compile_literal(Value::Nil)?;
        }
        let top = self.stack_top();
        self.emit(ByteCode::abc(Op::Return, top, 0, 0))?;
        self.finish_context()
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn compile_expression(&mut self) -> Exec<()> {
        let token = self.next()?;
        match token.kind {
            TokenKind::Integer(n) => self.compile_literal(Value::Integer(n)),
            TokenKind::Double(d) => self.compile_literal(Value::Double(d)),
            TokenKind::True => self.compile_literal(Value::Boolean(true)),
            TokenKind::False => self.compile_literal(Value::Boolean(false)),
            TokenKind::Nil => self.compile_literal(Value::Nil),
            TokenKind::Str(text) => self.compile_string_literal(&text),
            TokenKind::Identifier(name) => self.compile_identifier(&name),
            TokenKind::LeftParen => self.compile_form(),
            TokenKind::RightParen => Err(self.abort("Unexpected ')'")),
            TokenKind::Eof => Err(self.abort("Unexpected end of input")),
            kind => Err(self.abort(&format!("Unexpected keyword '{}'", kind))),
        }
    }

    fn compile_form(&mut self) -> Exec<()> {
        let head = self.next()?;
        match head.kind {
            TokenKind::Def => self.compile_def(),
            TokenKind::Let => self.compile_let(),
            TokenKind::If => self.compile_if(),
            TokenKind::Do => self.compile_do(),
            TokenKind::Fn => self.compile_fn(),
            _ => {
                self.lexer.put_back(head);
                self.compile_invoke()
            }
        }
    }

    fn compile_literal(&mut self, value: Value) -> Exec<()> {
        let slot = self.stack_push()?;
        let index = self.add_constant(value)?;
        self.emit(ByteCode::al(Op::LoadConstant, slot, index))
    }

    fn compile_string_literal(&mut self, text: &str) -> Exec<()> {
        let slot = self.stack_push()?;
        let index = self.add_string_constant(text)?;
        self.emit(ByteCode::al(Op::LoadConstant, slot, index))
    }

    /// Locals resolve innermost-first; anything else loads its name as a
    /// string and replaces the slot through the globals map.
    fn compile_identifier(&mut self, name: &str) -> Exec<()> {
        let slot = self.stack_push()?;
        if let Some(register) = self.resolve_local(name) {
            self.emit(ByteCode::abc(Op::Copy, slot, register, 0))
        } else {
            let index = self.add_string_constant(name)?;
            self.emit(ByteCode::al(Op::LoadConstant, slot, index))?;
            self.emit(ByteCode::abc(Op::LoadGlobal, slot, slot, 0))
        }
    }

    fn resolve_local(&self, name: &str) -> Option<usize> {
        self.context()
            .locals
            .iter()
            .rev()
            .find(|local| local.defined && local.name == name)
            .map(|local| local.register)
    }

    fn compile_invoke(&mut self) -> Exec<()> {
        self.compile_expression()?;
        let callee_slot = self.stack_top();
        let mut argument_count = 1usize;
        loop {
            let token = self.next()?;
            if token.kind == TokenKind::RightParen {
                break;
            }
            self.lexer.put_back(token);
            self.compile_expression()?;
            argument_count += 1;
            if argument_count > MAX_ARGUMENTS {
                return Err(self.abort("Too many arguments"));
            }
        }
        self.emit(ByteCode::abc(Op::Invoke, callee_slot, argument_count, 0))?;
        // collapse to the return slot
        for _ in 1..argument_count {
            self.stack_pop();
        }
        Ok(())
    }

    // =========================================================================
    // Special forms
    // =========================================================================

    fn compile_def(&mut self) -> Exec<()> {
        let name = match self.next()?.kind {
            TokenKind::Identifier(name) => name,
            _ => return Err(self.abort("Expected identifier")),
        };
        self.compile_expression()?;
        let value_slot = self.stack_top();
        let key_slot = self.stack_push()?;
        let index = self.add_string_constant(&name)?;
        self.emit(ByteCode::al(Op::LoadConstant, key_slot, index))?;
        self.emit(ByteCode::abc(Op::StoreGlobal, key_slot, value_slot, 0))?;
        self.expect_right_paren()?;
        self.stack_pop();
        self.stack_pop();
        // def stays expression-typed and evaluates to nil
        self.compile_literal(Value::Nil)
    }

    fn compile_if(&mut self) -> Exec<()> {
        self.compile_expression()?;
        let condition_slot = self.stack_top();
        let jump_if_false_at = self.current_offset();
        self.emit(ByteCode::al(Op::JumpIfFalse, condition_slot, 0))?;
        // both branches write the condition's slot
        self.stack_pop();
        self.compile_expression()?;
        let jump_at = self.current_offset();
        self.emit(ByteCode::large_only(Op::Jump, 0))?;
        self.patch_jump(jump_if_false_at);
        self.stack_pop();
        let token = self.next()?;
        if token.kind == TokenKind::RightParen {
            // one-armed form yields nil on the false path
            self.compile_literal(Value::Nil)?;
        } else {
            self.lexer.put_back(token);
            self.compile_expression()?;
            self.expect_right_paren()?;
        }
        self.patch_jump(jump_at);
        Ok(())
    }

    fn compile_do(&mut self) -> Exec<()> {
        let mut produced = false;
        loop {
            let token = self.next()?;
            if token.kind == TokenKind::RightParen {
                break;
            }
            self.lexer.put_back(token);
            if produced {
                self.stack_pop();
            }
            self.compile_expression()?;
            produced = true;
        }
        if !produced {
            self.compile_literal(Value::Nil)?;
        }
        Ok(())
    }

    fn compile_let(&mut self) -> Exec<()> {
        if self.next()?.kind != TokenKind::LeftParen {
            return Err(self.abort("Expected binding list"));
        }
        self.push_scope();
        loop {
            let token = self.next()?;
            match token.kind {
                TokenKind::RightParen => break,
                TokenKind::Identifier(name) => {
                    self.start_define_local(&name)?;
                    // the binding value lands exactly at the reserved slot
                    self.compile_expression()?;
                    self.finish_define_local();
                }
                _ => return Err(self.abort("Expected identifier")),
            }
        }
        self.compile_expression()?;
        let body_slot = self.stack_top();
        self.expect_right_paren()?;
        self.pop_scope();
        // re-address the result in the parent's register layout
        let slot = self.stack_push()?;
        self.emit(ByteCode::abc(Op::Copy, slot, body_slot, 0))
    }

    fn compile_fn(&mut self) -> Exec<()> {
        // The nested function enters the parent's constant pool before
        // its body compiles, which also keeps it rooted.
        let function = self.rt.new_function();
        self.rt.local_set(SCRATCH_LOCAL, Value::Function(function))?;
        let constant_index = self.add_constant(Value::Function(function))?;
        self.contexts.push(Context::new(function));

        if self.next()?.kind != TokenKind::LeftParen {
            return Err(self.abort("Expected parameter list"));
        }
        loop {
            let token = self.next()?;
            match token.kind {
                TokenKind::RightParen => break,
                TokenKind::Identifier(name) => self.define_parameter(&name)?,
                _ => return Err(self.abort("Expected identifier")),
            }
        }

        let mut produced = false;
        loop {
            let token = self.next()?;
            if token.kind == TokenKind::RightParen {
                break;
            }
            self.lexer.put_back(token);
            if produced {
                self.stack_pop();
            }
            self.compile_expression()?;
            produced = true;
        }
        if !produced {
            self.compile_literal(Value::Nil)?;
        }
        let top = self.stack_top();
        self.emit(ByteCode::abc(Op::Return, top, 0, 0))?;
        self.finish_context()?;
        self.contexts.pop();

        let slot = self.stack_push()?;
        self.emit(ByteCode::al(Op::LoadConstant, slot, constant_index))
    }

    // =========================================================================
    // Context and scope bookkeeping
    // =========================================================================

    fn context(&self) -> &Context {
        self.contexts.last().expect("context stack is never empty")
    }

    fn context_mut(&mut self) -> &mut Context {
        self.contexts
            .last_mut()
            .expect("context stack is never empty")
    }

    fn dest(&self) -> FunctionRef {
        self.context().dest
    }

    fn finish_context(&mut self) -> Exec<()> {
        let context = self.context();
        let dest = context.dest;
        let arity = context.arity;
        let local_count = context.max_registers.max(arity);
        self.rt.function_set_stack(dest, arity, local_count);
        Ok(())
    }

    /// Reserve the next free register for a temporary.
    fn stack_push(&mut self) -> Exec<usize> {
        let register = {
            let scope = self
                .context()
                .scopes
                .last()
                .expect("scope stack is never empty");
            scope.locals_size + scope.stack_size
        };
        if register >= MAX_LOCALS {
            return Err(self.abort("Too many locals"));
        }
        let context = self.context_mut();
        let scope = context.scopes.last_mut().expect("scope stack is never empty");
        scope.stack_size += 1;
        if register + 1 > context.max_registers {
            context.max_registers = register + 1;
        }
        Ok(register)
    }

    fn stack_top(&self) -> usize {
        let scope = self
            .context()
            .scopes
            .last()
            .expect("scope stack is never empty");
        debug_assert!(scope.locals_size + scope.stack_size > 0);
        scope.locals_size + scope.stack_size - 1
    }

    fn stack_pop(&mut self) {
        let scope = self
            .context_mut()
            .scopes
            .last_mut()
            .expect("scope stack is never empty");
        debug_assert!(scope.stack_size > 0, "value stack model underflow");
        scope.stack_size -= 1;
    }

    fn push_scope(&mut self) {
        let context = self.context_mut();
        let outer = *context.scopes.last().expect("scope stack is never empty");
        let locals_len = context.locals.len();
        context.scopes.push(Scope {
            locals_size: outer.locals_size + outer.stack_size,
            stack_size: 0,
            locals_len,
        });
    }

    fn pop_scope(&mut self) {
        let context = self.context_mut();
        let scope = context.scopes.pop().expect("scope stack is never empty");
        context.locals.truncate(scope.locals_len);
    }

    /// Claim the next register for a named binding. The name resolves
    /// only after [`Codegen::finish_define_local`].
    fn start_define_local(&mut self, name: &str) -> Exec<()> {
        if self.context().locals.iter().any(|local| local.name == name) {
            return Err(self.abort("Duplicate variable definition"));
        }
        let register = {
            let scope = self
                .context()
                .scopes
                .last()
                .expect("scope stack is never empty");
            scope.locals_size + scope.stack_size
        };
        self.context_mut().locals.push(LocalSlot {
            name: name.to_string(),
            register,
            defined: false,
        });
        Ok(())
    }

    fn finish_define_local(&mut self) {
        let context = self.context_mut();
        let local = context
            .locals
            .last_mut()
            .expect("a local is being defined");
        local.defined = true;
        let scope = context.scopes.last_mut().expect("scope stack is never empty");
        debug_assert!(scope.stack_size > 0, "binding expression left no value");
        scope.stack_size -= 1;
        scope.locals_size += 1;
    }

    fn define_parameter(&mut self, name: &str) -> Exec<()> {
        if self.context().locals.iter().any(|local| local.name == name) {
            return Err(self.abort("Duplicate variable definition"));
        }
        let register = self.context().locals.len();
        if register >= MAX_LOCALS {
            return Err(self.abort("Too many locals"));
        }
        let context = self.context_mut();
        context.locals.push(LocalSlot {
            name: name.to_string(),
            register,
            defined: true,
        });
        context.arity += 1;
        let scope = context.scopes.last_mut().expect("scope stack is never empty");
        scope.locals_size += 1;
        if register + 1 > context.max_registers {
            context.max_registers = register + 1;
        }
        Ok(())
    }

    // =========================================================================
    // Emission
    // =========================================================================

    fn emit(&mut self, code: ByteCode) -> Exec<()> {
        let dest = self.dest();
        if self.rt.heap().function(dest).byte_code().len() >= MAX_BYTE_CODE {
            return Err(self.abort("Too many instructions"));
        }
        self.rt.function_push_byte_code(dest, code);
        Ok(())
    }

    fn current_offset(&self) -> usize {
        self.rt.heap().function(self.dest()).byte_code().len()
    }

    /// Point the jump at `at` to the current end of the bytecode.
    fn patch_jump(&mut self, at: usize) {
        let dest = self.dest();
        let target = self.current_offset();
        let code = self.rt.heap().function(dest).byte_code()[at];
        self.rt
            .function_set_byte_code(dest, at, code.with_large(target));
    }

    fn add_constant(&mut self, value: Value) -> Exec<usize> {
        let dest = self.dest();
        if self.rt.heap().function(dest).constants().len() >= MAX_CONSTANTS {
            return Err(self.abort("Too many constants"));
        }
        Ok(self.rt.function_add_constant(dest, value))
    }

    /// String constants are rooted in the scratch register before the
    /// pool grows, so an allocation-triggered collection cannot reap
    /// them.
    fn add_string_constant(&mut self, text: &str) -> Exec<usize> {
        let value = self.rt.new_string_value(text);
        self.rt.local_set(SCRATCH_LOCAL, value)?;
        self.add_constant(value)
    }

    // =========================================================================
    // Tokens and errors
    // =========================================================================

    fn next(&mut self) -> Exec<Token> {
        match self.lexer.next_token() {
            Ok(token) => Ok(token),
            Err(error) => Err(self.rt.throw_message(&error.to_string())),
        }
    }

    fn expect_right_paren(&mut self) -> Exec<()> {
        if self.next()?.kind != TokenKind::RightParen {
            return Err(self.abort("Expected ')'"));
        }
        Ok(())
    }

    fn abort(&mut self, message: &str) -> Fault {
        self.rt.throw_message(message)
    }
}
