//! Closure creation, up-value mutation, aliasing and isolation.

mod common;
use common::*;

#[test]
fn captured_parameters_travel_into_the_closure() {
    // function createAdder(x) { function add(y) { return x + y; } return add; }
    // let a = createAdder(5); a(3)
    let rendered = run_display(vec![
        expr_stmt(func(
            Some("createAdder"),
            &["x"],
            vec![
                expr_stmt(func(
                    Some("add"),
                    &["y"],
                    vec![ret(Some(infix("+", ident("x"), ident("y"))))],
                )),
                ret(Some(ident("add"))),
            ],
        )),
        let_stmt("a", call(ident("createAdder"), vec![int(5)])),
        expr_stmt(call(ident("a"), vec![int(3)])),
    ]);

    assert_eq!(rendered, "8");
}

fn create_counter() -> aql_vm::ast::Stmt {
    // function createCounter(n) {
    //     let c = n;
    //     function inc() { c = c + 1; return c; }
    //     return inc;
    // }
    expr_stmt(func(
        Some("createCounter"),
        &["n"],
        vec![
            let_stmt("c", ident("n")),
            expr_stmt(func(
                Some("inc"),
                &[],
                vec![
                    assign("c", infix("+", ident("c"), int(1))),
                    ret(Some(ident("c"))),
                ],
            )),
            ret(Some(ident("inc"))),
        ],
    ))
}

#[test]
fn upvalue_mutation_survives_across_calls() {
    let rendered = run_display(vec![
        create_counter(),
        let_stmt("k", call(ident("createCounter"), vec![int(10)])),
        expr_stmt(call(ident("k"), vec![])),
        expr_stmt(call(ident("k"), vec![])),
        expr_stmt(call(ident("k"), vec![])),
    ]);

    assert_eq!(rendered, "13");
}

#[test]
fn counters_from_separate_activations_are_isolated() {
    let bump = |name: &str| expr_stmt(call(ident(name), vec![]));

    let rendered = run_display(vec![
        create_counter(),
        let_stmt("a", call(ident("createCounter"), vec![int(0)])),
        let_stmt("b", call(ident("createCounter"), vec![int(100)])),
        bump("a"),
        bump("a"),
        bump("a"),
        let_stmt("ra", call(ident("a"), vec![])),
        bump("b"),
        bump("b"),
        bump("b"),
        let_stmt("rb", call(ident("b"), vec![])),
        expr_stmt(array(vec![ident("ra"), ident("rb")])),
    ]);

    assert_eq!(rendered, "[4, 104]");
}

#[test]
fn closures_from_one_site_in_one_activation_share_their_cells() {
    // function makePair() {
    //     let c = 0;
    //     let arr = Array(2);
    //     let i = 0;
    //     while (i < 2) {
    //         arr[i] = function () { c = c + 1; return c; };
    //         i = i + 1;
    //     }
    //     return arr;
    // }
    // let pair = makePair(); pair[0](); pair[0](); pair[1]()
    let rendered = run_display(vec![
        expr_stmt(func(
            Some("makePair"),
            &[],
            vec![
                let_stmt("c", int(0)),
                let_stmt("arr", array_ctor(int(2), None)),
                let_stmt("i", int(0)),
                while_stmt(
                    infix("<", ident("i"), int(2)),
                    vec![
                        index_assign(
                            ident("arr"),
                            ident("i"),
                            func(
                                None,
                                &[],
                                vec![
                                    assign("c", infix("+", ident("c"), int(1))),
                                    ret(Some(ident("c"))),
                                ],
                            ),
                        ),
                        assign("i", infix("+", ident("i"), int(1))),
                    ],
                ),
                ret(Some(ident("arr"))),
            ],
        )),
        let_stmt("pair", call(ident("makePair"), vec![])),
        expr_stmt(call(index(ident("pair"), int(0)), vec![])),
        expr_stmt(call(index(ident("pair"), int(0)), vec![])),
        expr_stmt(call(index(ident("pair"), int(1)), vec![])),
    ]);

    // Writes through the first closure are observed by its sibling.
    assert_eq!(rendered, "3");
}

#[test]
fn free_variables_forward_through_intervening_functions() {
    // function outer(x) {
    //     function mid() { function inner() { return x; } return inner; }
    //     return mid;
    // }
    // let m = outer(7); let i = m(); i()
    let rendered = run_display(vec![
        expr_stmt(func(
            Some("outer"),
            &["x"],
            vec![
                expr_stmt(func(
                    Some("mid"),
                    &[],
                    vec![
                        expr_stmt(func(Some("inner"), &[], vec![ret(Some(ident("x")))])),
                        ret(Some(ident("inner"))),
                    ],
                )),
                ret(Some(ident("mid"))),
            ],
        )),
        let_stmt("m", call(ident("outer"), vec![int(7)])),
        let_stmt("i", call(ident("m"), vec![])),
        expr_stmt(call(ident("i"), vec![])),
    ]);

    assert_eq!(rendered, "7");
}

#[test]
fn top_level_recursion_by_name() {
    // function fact(n) { if (n < 2) { return 1; } return n * fact(n - 1); }
    let rendered = run_display(vec![
        expr_stmt(func(
            Some("fact"),
            &["n"],
            vec![
                if_stmt(infix("<", ident("n"), int(2)), vec![ret(Some(int(1)))], None),
                ret(Some(infix(
                    "*",
                    ident("n"),
                    call(ident("fact"), vec![infix("-", ident("n"), int(1))]),
                ))),
            ],
        )),
        expr_stmt(call(ident("fact"), vec![int(6)])),
    ]);

    assert_eq!(rendered, "720");
}

#[test]
fn closures_render_as_opaque_tokens() {
    let rendered = run_display(vec![
        expr_stmt(func(Some("f"), &["x"], vec![ret(Some(ident("x")))])),
        expr_stmt(ident("f")),
    ]);
    assert_eq!(rendered, "<function>");

    let rendered = run_display(vec![
        expr_stmt(func(
            Some("wrap"),
            &["x"],
            vec![ret(Some(func(None, &[], vec![ret(Some(ident("x")))])))],
        )),
        expr_stmt(call(ident("wrap"), vec![int(1)])),
    ]);
    assert_eq!(rendered, "<closure>");
}
