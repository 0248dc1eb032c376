//! Arrays, heap accounting and garbage collection, end to end.

use aql_vm::heap::HeapParams;
use aql_vm::prelude::*;

mod common;
use common::*;

#[test]
fn preallocated_arrays_support_in_place_assignment() {
    // let arr = Array(3, 0); arr[0] = 10; arr[1] = 20; arr[2] = 30;
    // arr[0] + arr[1] + arr[2]
    let rendered = run_display(vec![
        let_stmt("arr", array_ctor(int(3), Some(int(0)))),
        index_assign(ident("arr"), int(0), int(10)),
        index_assign(ident("arr"), int(1), int(20)),
        index_assign(ident("arr"), int(2), int(30)),
        expr_stmt(infix(
            "+",
            infix(
                "+",
                index(ident("arr"), int(0)),
                index(ident("arr"), int(1)),
            ),
            index(ident("arr"), int(2)),
        )),
    ]);

    assert_eq!(rendered, "60");
}

#[test]
fn nested_arrays_support_indexed_assignment() {
    // let a = [[1, 2], [3, 4]]; a[1][1] = 40; a[0][0] + a[1][1]
    let rendered = run_display(vec![
        let_stmt(
            "a",
            array(vec![
                array(vec![int(1), int(2)]),
                array(vec![int(3), int(4)]),
            ]),
        ),
        index_assign(index(ident("a"), int(1)), int(1), int(40)),
        expr_stmt(infix(
            "+",
            index(index(ident("a"), int(0)), int(0)),
            index(index(ident("a"), int(1)), int(1)),
        )),
    ]);

    assert_eq!(rendered, "41");
}

#[test]
fn array_ctor_without_a_default_fills_with_nil() {
    let rendered = run_display(vec![
        let_stmt("a", array_ctor(int(2), None)),
        expr_stmt(index(ident("a"), int(0))),
    ]);

    assert_eq!(rendered, "nil");
}

#[test]
fn arrays_render_recursively() {
    let rendered = run_display(vec![expr_stmt(array(vec![
        int(1),
        array(vec![int(2), int(3)]),
        string("x"),
        null(),
    ]))]);

    assert_eq!(rendered, "[1, [2, 3], x, nil]");
}

#[test]
fn element_overwrite_releases_the_previous_value() {
    // Overwriting a[0] drops the only other reference to the old string.
    let (mut vm, value) = run(vec![
        let_stmt("a", array(vec![string("old")])),
        index_assign(ident("a"), int(0), string("new")),
        expr_stmt(index(ident("a"), int(0))),
    ]);

    assert_eq!(vm.render(value), "new");

    // One live reference per reachable copy: the pool's entries, the
    // global's array, its element and the returned value.
    vm.release(value);
    vm.shutdown();
    assert_eq!(vm.heap().allocated_bytes(), 0);
}

#[test]
fn the_heap_drains_after_a_program_full_of_allocation() {
    let rendered = run_display(vec![
        expr_stmt(func(
            Some("weave"),
            &["n"],
            vec![
                let_stmt("acc", array_ctor(ident("n"), Some(string("-")))),
                for_stmt(
                    Some(let_stmt("i", int(0))),
                    Some(infix("<", ident("i"), ident("n"))),
                    Some(assign("i", infix("+", ident("i"), int(1)))),
                    vec![index_assign(
                        ident("acc"),
                        ident("i"),
                        infix("+", string("s"), ident("i")),
                    )],
                ),
                ret(Some(ident("acc"))),
            ],
        )),
        expr_stmt(index(call(ident("weave"), vec![int(40)]), int(39))),
    ]);

    assert_eq!(rendered, "s39");
}

#[test]
fn unreachable_cycles_are_reclaimed_under_pressure() {
    // Build a two-array cycle per iteration and drop it; only the cycle
    // collector can reclaim these, and the pressure trigger must keep the
    // heap from growing without bound.
    let params = InterpreterParams {
        heap: HeapParams {
            deferred_threshold: 8,
            pressure_limit: 4 * 1024,
            ..HeapParams::default()
        },
        ..InterpreterParams::default()
    };

    let mut vm = Interpreter::new(params);
    let value = vm
        .run(&program(vec![
            for_stmt(
                Some(let_stmt("i", int(0))),
                Some(infix("<", ident("i"), int(64))),
                Some(assign("i", infix("+", ident("i"), int(1)))),
                vec![
                    let_stmt("a", array_ctor(int(8), Some(null()))),
                    let_stmt("b", array(vec![ident("a")])),
                    index_assign(ident("a"), int(0), ident("b")),
                ],
            ),
            // Drop the last iteration's cycle too.
            assign("a", null()),
            assign("b", null()),
            expr_stmt(int(0)),
        ]))
        .unwrap();

    vm.release(value);
    vm.shutdown();
    assert_eq!(vm.heap().allocated_bytes(), 0);
}

#[test]
fn out_of_memory_is_a_runtime_error() {
    let params = InterpreterParams {
        heap: HeapParams {
            max_bytes: 2 * 1024,
            ..HeapParams::default()
        },
        ..InterpreterParams::default()
    };

    let mut vm = Interpreter::new(params);
    let error = vm
        .run(&program(vec![expr_stmt(array_ctor(int(100_000), None))]))
        .unwrap_err();

    match error {
        Error::Runtime(error) => {
            assert_eq!(error.panic_reason(), PanicReason::OutOfMemory)
        }
        Error::Compile(error) => panic!("unexpected compile error: {error}"),
    }
}
