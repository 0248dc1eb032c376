//! Compile-time rejection and runtime panic behavior.

use aql_vm::prelude::*;

mod common;
use common::*;

#[test]
fn break_outside_a_loop_is_a_compile_error() {
    assert_eq!(
        compile_err(vec![ast::Stmt::Break]),
        CompileError::BreakOutsideLoop,
    );
    assert_eq!(
        compile_err(vec![ast::Stmt::Continue]),
        CompileError::ContinueOutsideLoop,
    );
}

#[test]
fn undefined_variables_are_compile_errors() {
    assert_eq!(
        compile_err(vec![expr_stmt(ident("ghost"))]),
        CompileError::UndefinedVariable("ghost".into()),
    );
}

#[test]
fn const_bindings_reject_assignment() {
    assert_eq!(
        compile_err(vec![
            const_stmt("limit", int(3)),
            assign("limit", int(4)),
        ]),
        CompileError::InvalidAssignmentTarget("limit".into()),
    );
}

#[test]
fn unknown_operators_are_compile_errors() {
    assert_eq!(
        compile_err(vec![expr_stmt(infix("**", int(2), int(8)))]),
        CompileError::UnknownOperator("**".into()),
    );
    assert_eq!(
        compile_err(vec![expr_stmt(prefix("~", int(1)))]),
        CompileError::UnknownOperator("~".into()),
    );
}

#[test]
fn no_function_is_registered_when_lowering_fails() {
    let mut vm = Interpreter::default();
    let result = vm.compile(&program(vec![
        let_stmt("x", int(1)),
        expr_stmt(ident("ghost")),
    ]));

    assert!(result.is_err());
    assert!(vm.functions().is_empty());
}

#[test]
fn division_by_zero_aborts_the_program() {
    let (_, error) = run_err(vec![expr_stmt(infix("/", int(1), int(0)))]);
    assert_eq!(error.panic_reason(), PanicReason::DivisionByZero);

    let (_, error) = run_err(vec![expr_stmt(infix("%", int(1), int(0)))]);
    assert_eq!(error.panic_reason(), PanicReason::DivisionByZero);
}

#[test]
fn type_mismatches_abort_the_program() {
    let (_, error) = run_err(vec![expr_stmt(infix("+", null(), int(5)))]);
    assert_eq!(error.panic_reason(), PanicReason::TypeMismatch);

    let (_, error) = run_err(vec![expr_stmt(infix("<", string("a"), int(1)))]);
    assert_eq!(error.panic_reason(), PanicReason::TypeMismatch);
}

#[test]
fn index_out_of_range_aborts_the_program() {
    let (_, error) = run_err(vec![
        let_stmt("a", array(vec![int(1)])),
        expr_stmt(index(ident("a"), int(3))),
    ]);
    assert_eq!(error.panic_reason(), PanicReason::IndexOutOfRange);

    let (_, error) = run_err(vec![
        let_stmt("a", array(vec![int(1)])),
        index_assign(ident("a"), prefix("-", int(1)), int(0)),
    ]);
    assert_eq!(error.panic_reason(), PanicReason::IndexOutOfRange);
}

#[test]
fn calling_a_non_function_aborts_the_program() {
    let (_, error) = run_err(vec![
        let_stmt("x", int(5)),
        expr_stmt(call(ident("x"), vec![int(1)])),
    ]);
    assert_eq!(error.panic_reason(), PanicReason::CallNonFunction);
}

#[test]
fn arity_mismatches_abort_the_program() {
    let (_, error) = run_err(vec![
        expr_stmt(func(Some("f"), &["a"], vec![ret(Some(ident("a")))])),
        expr_stmt(call(ident("f"), vec![])),
    ]);
    assert_eq!(error.panic_reason(), PanicReason::ArityMismatch);
}

#[test]
fn unbounded_recursion_hits_the_call_depth_limit() {
    let (_, error) = run_err(vec![
        expr_stmt(func(Some("spin"), &[], vec![ret(Some(call(ident("spin"), vec![])))])),
        expr_stmt(call(ident("spin"), vec![])),
    ]);
    assert_eq!(error.panic_reason(), PanicReason::CallDepthExceeded);
}

#[test]
fn the_instruction_budget_is_enforced() {
    let params = InterpreterParams {
        instruction_budget: Some(1_000),
        ..InterpreterParams::default()
    };

    let mut vm = Interpreter::new(params);
    let error = vm
        .run(&program(vec![while_stmt(boolean(true), vec![])]))
        .unwrap_err();

    match error {
        Error::Runtime(error) => assert_eq!(
            error.panic_reason(),
            PanicReason::ExecutionBudgetExceeded,
        ),
        Error::Compile(error) => panic!("unexpected compile error: {error}"),
    }
}

#[test]
fn builtin_slots_read_before_installation_are_undefined_names() {
    let source = program(vec![expr_stmt(ident("answer"))]);

    let mut vm = Interpreter::default();
    let mut compiler = vm.compiler();
    compiler.define_builtin("answer");
    let main = compiler.compile(&source).unwrap();

    // The embedder never installed the value.
    let error = vm.execute(main).unwrap_err();
    assert_eq!(error.panic_reason(), PanicReason::UndefinedName);
}

#[test]
fn runtime_errors_unwind_every_frame_and_capture_a_backtrace() {
    let (vm, error) = run_err(vec![
        expr_stmt(func(
            Some("inner"),
            &[],
            vec![ret(Some(infix("/", int(1), int(0))))],
        )),
        expr_stmt(func(
            Some("outer"),
            &[],
            vec![ret(Some(call(ident("inner"), vec![])))],
        )),
        expr_stmt(call(ident("outer"), vec![])),
    ]);

    // The error names the instruction that raised it.
    assert_eq!(error.panic_reason(), PanicReason::DivisionByZero);
    assert!(error.instruction().is_some());

    // Registers were released wholesale.
    assert!(vm.registers().is_empty());
    assert!(vm.call_stack().is_empty());

    // The backtrace kept the symbolized frame stack, innermost last.
    let backtrace = vm.backtrace().expect("backtrace missing");
    let names: Vec<&str> = backtrace
        .call_stack()
        .iter()
        .map(|frame| frame.function())
        .collect();
    assert_eq!(names, vec!["main", "outer", "inner"]);
    assert!(backtrace.to_string().contains("inner"));
}
