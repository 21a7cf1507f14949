// lungo-core - End-to-end evaluation tests
// Copyright (c) 2026 Tom Waddington. MIT licensed.

mod common;
use common::*;

use lungo_core::Value;

// =============================================================================
// Literals
// =============================================================================

#[test]
fn test_literals() {
    assert_eval!("42", "42");
    assert_eval!("2.5", "2.5");
    assert_eval!("true", "true");
    assert_eval!("false", "false");
    assert_eval!("nil", "nil");
    assert_eval!("\"hello\"", "hello");
}

#[test]
fn test_empty_program_is_nil() {
    assert_eval!("", "nil");
    assert_eval!("; just a comment", "nil");
}

#[test]
fn test_top_level_sequences() {
    assert_eval!("1 2 3", "3");
}

// =============================================================================
// Arithmetic and comparison natives
// =============================================================================

#[test]
fn test_addition() {
    // compile → verify → invoke
    assert_eval!("(+ 1 2)", "3");
    assert_eval!("(+ 1.5 2.25)", "3.75");
}

#[test]
fn test_subtraction_and_multiplication() {
    assert_eval!("(- 10 4)", "6");
    assert_eval!("(* 6 7)", "42");
}

#[test]
fn test_division() {
    assert_eval!("(/ 7 2)", "3");
    assert_eval!("(/ 1.0 2.0)", "0.5");
}

#[test]
fn test_integer_division_by_zero_throws() {
    assert_eval_err!("(/ 1 0)", "Division by zero");
}

#[test]
fn test_arithmetic_types_do_not_mix() {
    assert_eval_err!("(+ 1 2.0)", "Expected integer operand");
    assert_eval_err!("(+ 1.0 2)", "Expected double operand");
    assert_eval_err!("(+ \"a\" 1)", "Expected numeric operand");
}

#[test]
fn test_comparisons() {
    assert_eval!("(< 1 2)", "true");
    assert_eval!("(<= 2 2)", "true");
    assert_eval!("(> 1 2)", "false");
    assert_eval!("(>= 3 2)", "true");
    assert_eval!("(< 1.5 2.5)", "true");
}

#[test]
fn test_equality() {
    assert_eval!("(= 1 1)", "true");
    assert_eval!("(= 1 2)", "false");
    assert_eval!("(= 1 1.0)", "false");
    assert_eval!("(= \"abc\" \"abc\")", "true");
    assert_eval!("(= \"abc\" \"abd\")", "false");
    assert_eval!("(= nil nil)", "true");
}

// =============================================================================
// Special forms
// =============================================================================

#[test]
fn test_if_branching() {
    assert_eval!("(if true 10 20)", "10");
    assert_eval!("(if false 10 20)", "20");
    assert_eval!("(if nil 10)", "nil");
    // anything but nil and false is truthy
    assert_eval!("(if 0 1 2)", "1");
    assert_eval!("(if \"\" 1 2)", "1");
}

#[test]
fn test_do() {
    assert_eval!("(do 1 2 3)", "3");
    assert_eval!("(do)", "nil");
    assert_eval!("(do 42)", "42");
}

#[test]
fn test_let() {
    assert_eval!("(let (x 42) x)", "42");
    assert_eval!("(let (x 1 y 2) y)", "2");
    assert_eval!("(let (x 1 y 2) (+ x y))", "3");
    // later bindings see earlier ones
    assert_eval!("(let (x 1 y (+ x 1)) y)", "2");
}

#[test]
fn test_let_inside_argument_position() {
    assert_eval!("(+ 1 (let (x 2) x))", "3");
}

#[test]
fn test_duplicate_binding_aborts() {
    assert_eval_err!("(let (x 1 x 2) x)", "Duplicate variable definition");
    assert_eval_err!("(let (x 1) (let (x 2) x))", "Duplicate variable definition");
    assert_eval_err!("((fn (a a) a) 1 2)", "Duplicate variable definition");
}

#[test]
fn test_def_evaluates_to_nil() {
    assert_eval!("(def x 42)", "nil");
}

#[test]
fn test_global_definition() {
    assert_eval!("(do (def x 42) x)", "42");

    let mut rt = new_runtime();
    eval_in(&mut rt, "(def x 42)").unwrap();
    let key = rt.new_string_value("x");
    rt.local_set(0, key).unwrap();
    assert_eq!(
        rt.heap().map_get(rt.globals(), key),
        Some(Value::Integer(42))
    );
}

#[test]
fn test_undefined_global_throws() {
    assert_eval_err!("missing", "Undefined Global");
    assert_eval_err!("(missing 1)", "Undefined Global");
}

// =============================================================================
// Functions
// =============================================================================

#[test]
fn test_fn_call() {
    assert_eval!("((fn () 42))", "42");
    assert_eval!("((fn (x) x) 42)", "42");
    assert_eval!("((fn (x y) x) 1 2)", "1");
    assert_eval!("((fn (x y) y) 1 2)", "2");
}

#[test]
fn test_fn_value_renders_opaquely() {
    assert_eval!("(fn (x) x)", "<function>");
}

#[test]
fn test_named_function_through_globals() {
    assert_eval!("(do (def add (fn (a b) (+ a b))) (add 3 4))", "7");
}

#[test]
fn test_function_recursion_through_globals() {
    assert_eval!(
        "(do (def down (fn (n) (if (= n 0) 0 (down (- n 1))))) (down 10))",
        "0"
    );
}

#[test]
fn test_higher_order_function() {
    assert_eval!("((fn (f x) (f x)) (fn (n) (* n n)) 9)", "81");
}

#[test]
fn test_invalid_arity_throws() {
    assert_eval_err!("((fn (a) a) 1 2)", "Invalid arity");
    assert_eval_err!("((fn (a b) a) 1)", "Invalid arity");
}

#[test]
fn test_invoking_a_non_function_throws() {
    assert_eval_err!("(42 1)", "Illegal cast to function");
}

#[test]
fn test_fn_body_is_a_sequence() {
    assert_eval!("((fn () 1 2 3))", "3");
    assert_eval!("((fn ()))", "nil");
}

// =============================================================================
// Exceptions
// =============================================================================

#[test]
fn test_try_catches_throw() {
    assert_eval!("(try (fn () (throw \"boom\")))", "{error: boom}");
}

#[test]
fn test_try_wraps_normal_result() {
    assert_eval!("(try (fn () 5))", "{result: 5}");
}

#[test]
fn test_try_catches_runtime_errors() {
    assert_eval!("(try (fn () (/ 1 0)))", "{error: Division by zero}");
}

#[test]
fn test_throw_any_value() {
    assert_eval_err!("(throw \"boom\")", "boom");
}

#[test]
fn test_exception_crosses_frames() {
    assert_eval!(
        "(do (def boom (fn () (throw \"deep\"))) (try (fn () (boom))))",
        "{error: deep}"
    );
}

// =============================================================================
// Strings and misc natives
// =============================================================================

#[test]
fn test_ends_with() {
    assert_eval!("(endsWith \"entry.bc\" \".bc\")", "true");
    assert_eval!("(endsWith \"entry.lg\" \".bc\")", "false");
}

#[test]
fn test_globals_returns_the_live_map() {
    assert_eval!("(= (globals) (globals))", "true");
}

#[test]
fn test_eval_native() {
    assert_eval!("(eval \"(+ 1 2)\")", "3");
    // eval shares the globals map
    assert_eval!("(do (eval \"(def x 9)\") x)", "9");
}

#[test]
fn test_compile_and_verify_natives() {
    assert_eval!("(verifyByteCode (compile \"1\"))", "<function>");
}

#[test]
fn test_identifiers_with_operator_characters() {
    // -1 is an identifier, not a literal
    assert_eval_err!("-1", "Undefined Global");
    assert_eval!("(- 0 1)", "-1");
}

// =============================================================================
// Output through the host
// =============================================================================

#[test]
fn test_print_writes_through_the_host() {
    let host = MemoryHost::new();
    let output = host.output();
    let mut rt = Runtime::new(Box::new(host), ".").unwrap();
    eval_in(&mut rt, "(do (print \"a\") (println \"b\") (println 42))").unwrap();
    assert_eq!(String::from_utf8_lossy(&output.borrow()), "ab\n42\n");
}

#[test]
fn test_print_renders_maps_in_insertion_order() {
    let host = MemoryHost::new();
    let output = host.output();
    let mut rt = Runtime::new(Box::new(host), ".").unwrap();
    eval_in(
        &mut rt,
        "(println (try (fn () (throw \"boom\"))))",
    )
    .unwrap();
    assert_eq!(String::from_utf8_lossy(&output.borrow()), "{error: boom}\n");
}

#[test]
fn test_read_file_through_the_host() {
    let host = MemoryHost::new().with_file("data.txt", b"payload");
    let mut rt = Runtime::new(Box::new(host), ".").unwrap();
    assert_eq!(
        eval_in(&mut rt, "(readFile \"data.txt\")").unwrap(),
        "payload"
    );
    assert_eq!(
        eval_in(&mut rt, "(readFile \"missing.txt\")").unwrap_err(),
        "Could not open file"
    );
}

#[test]
fn test_load_searches_the_load_path() {
    let host = MemoryHost::new().with_file("lib/main.lg", b"(def answer 42) answer");
    let mut rt = Runtime::new(Box::new(host), "no-such-dir:lib").unwrap();
    assert_eq!(eval_in(&mut rt, "(load \"main.lg\")").unwrap(), "42");
    assert_eq!(
        eval_in(&mut rt, "(load \"absent.lg\")").unwrap_err(),
        "Could not open file"
    );
}

#[test]
fn test_runtime_load_reports_uncaught_exceptions() {
    let host = MemoryHost::new().with_file("./bad.lg", b"(throw \"kaput\")");
    let output = host.output();
    let mut rt = Runtime::new(Box::new(host), ".").unwrap();
    assert_eq!(rt.load("bad.lg").unwrap(), 1);
    let text = String::from_utf8_lossy(&output.borrow()).into_owned();
    assert!(text.contains("ERROR Uncaught Exception:"));
    assert!(text.contains("kaput"));

    let host = MemoryHost::new().with_file("./good.lg", b"(def x 1)");
    let mut rt = Runtime::new(Box::new(host), ".").unwrap();
    assert_eq!(rt.load("good.lg").unwrap(), 0);
}

#[test]
fn test_shell_evaluates_lines_and_survives_errors() {
    let host = MemoryHost::new().with_input(b"(+ 1 2)\n(throw \"oops\")\n(* 2 3)\n");
    let output = host.output();
    let mut rt = Runtime::new(Box::new(host), ".").unwrap();
    assert_eq!(rt.shell().unwrap(), 0);
    let text = String::from_utf8_lossy(&output.borrow()).into_owned();
    assert!(text.contains("3\n"));
    assert!(text.contains("ERROR Uncaught Exception:"));
    assert!(text.contains("oops"));
    assert!(text.contains("6\n"));
}

// =============================================================================
// Load path validation
// =============================================================================

#[test]
fn test_invalid_load_path_rejected() {
    assert!(Runtime::new(Box::new(StdHost::new()), "").is_err());
    assert!(Runtime::new(Box::new(StdHost::new()), "a::b").is_err());
    assert!(Runtime::new(Box::new(StdHost::new()), "dir/").is_err());
    assert!(Runtime::new(Box::new(StdHost::new()), "a:b:c").is_ok());
}

// =============================================================================
// Compile errors surface as throws
// =============================================================================

#[test]
fn test_compile_errors() {
    assert_eval_err!("(", "Unexpected end of input");
    assert_eval_err!(")", "Unexpected ')'");
    assert_eval_err!("(def 1 2)", "Expected identifier");
    assert_eval_err!("(let x 1)", "Expected binding list");
    assert_eval_err!("\"open", "Unterminated string");
    assert_eval_err!("#", "Unexpected character");
    assert_eval_err!("(if true 1 2 3)", "Expected ')'");
}
