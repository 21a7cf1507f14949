// lungo-core - Garbage collector tests
// Copyright (c) 2026 Tom Waddington. MIT licensed.

mod common;
use common::*;

#[test]
fn collection_preserves_all_roots() {
    let mut rt = new_runtime();
    let before = rt.heap().object_count();

    let kept = rt.new_string(b"kept");
    rt.local_set(3, Value::String(kept)).unwrap();
    for _ in 0..100 {
        rt.new_string(b"transient");
    }

    rt.collect_garbage();
    assert_eq!(rt.heap().object_count(), before + 1);
    assert_eq!(rt.heap().string(kept).bytes(), b"kept");
}

#[test]
fn globals_root_their_values() {
    let mut rt = new_runtime();
    eval_in(&mut rt, "(def keep \"payload\")").unwrap();
    rt.collect_garbage();
    rt.collect_garbage();

    let key = rt.new_string_value("keep");
    rt.local_set(0, key).unwrap();
    match rt.heap().map_get(rt.globals(), key) {
        Some(Value::String(s)) => assert_eq!(rt.heap().string(s).bytes(), b"payload"),
        other => panic!("expected the global to survive, got {:?}", other),
    }
}

#[test]
fn function_constants_are_reachable_transitively() {
    let mut rt = new_runtime();
    let function = rt.new_function();
    rt.local_set(3, Value::Function(function)).unwrap();
    let constant = rt.new_string_value("embedded");
    rt.local_set(4, constant).unwrap();
    rt.function_add_constant(function, constant);
    rt.local_set(4, Value::Nil).unwrap();

    rt.collect_garbage();
    match rt.heap().function(function).constants()[0] {
        Value::String(s) => assert_eq!(rt.heap().string(s).bytes(), b"embedded"),
        other => panic!("expected a string constant, got {:?}", other),
    }
}

#[test]
fn cyclic_maps_collect_once_unreachable() {
    let mut rt = new_runtime();
    let before = rt.heap().object_count();

    let map = rt.new_map();
    rt.local_set(3, Value::Map(map)).unwrap();
    rt.map_put(map, Value::Map(map), Value::Map(map));

    rt.collect_garbage();
    assert_eq!(rt.heap().object_count(), before + 1);

    rt.local_set(3, Value::Nil).unwrap();
    rt.collect_garbage();
    assert_eq!(rt.heap().object_count(), before);
}

#[test]
fn map_iteration_order_is_insertion_order() {
    let mut rt = new_runtime();
    let map = rt.new_map();
    rt.local_set(3, Value::Map(map)).unwrap();

    rt.map_put(map, Value::Integer(1), Value::Integer(10));
    rt.map_put(map, Value::Integer(2), Value::Integer(20));
    rt.map_put(map, Value::Integer(3), Value::Integer(30));
    // replacing an existing key keeps its position
    rt.map_put(map, Value::Integer(2), Value::Integer(99));

    let keys: Vec<Value> = rt
        .heap()
        .map(map)
        .entries()
        .iter()
        .map(|(k, _)| *k)
        .collect();
    assert_eq!(
        keys,
        vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]
    );
    assert_eq!(
        rt.heap().map_get(map, Value::Integer(2)),
        Some(Value::Integer(99))
    );
}

#[test]
fn stress_retains_every_hundredth_string() {
    let mut rt = new_runtime();
    let baseline_objects = rt.heap().object_count();
    let baseline_bytes = rt.heap().bytes_allocated();

    let keeper = rt.new_map();
    rt.local_set(3, Value::Map(keeper)).unwrap();

    for i in 0..10_000i64 {
        let string = rt.new_string(format!("string-{}", i).as_bytes());
        if i % 100 == 0 {
            // root through a register before the entry allocation
            rt.local_set(4, Value::String(string)).unwrap();
            rt.map_put(keeper, Value::Integer(i), Value::String(string));
        }
    }
    rt.local_set(4, Value::Nil).unwrap();

    rt.collect_garbage();

    assert_eq!(rt.heap().object_count(), baseline_objects + 1 + 100);
    // retained footprint stays proportional to the survivors
    assert!(rt.heap().bytes_allocated() < baseline_bytes + 101 * 512);

    for i in (0..10_000i64).step_by(100) {
        match rt.heap().map_get(keeper, Value::Integer(i)) {
            Some(Value::String(s)) => {
                assert_eq!(rt.heap().string(s).bytes(), format!("string-{}", i).as_bytes());
            }
            other => panic!("lost retained string {}: {:?}", i, other),
        }
    }
}

#[test]
fn allocation_triggers_collection_automatically() {
    let mut rt = new_runtime();
    // enough garbage to cross the threshold many times over
    for _ in 0..10_000 {
        rt.new_string(b"churn-churn-churn-churn-churn-churn");
    }
    // automatic cycles already kept the heap near its live size
    let floor = rt.heap().object_count();
    assert!(floor < 5_000, "allocation accounting never triggered a cycle");
}

#[test]
fn evaluation_survives_heavy_allocation() {
    let mut rt = new_runtime();
    // a program that churns strings through the compiler and still runs
    for _ in 0..50 {
        assert_eq!(
            eval_in(&mut rt, "(do (def tmp \"abcdefghijklmnop\") (+ 1 2))").unwrap(),
            "3"
        );
    }
}
