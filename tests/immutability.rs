// Immutability-by-default: a bare `name = expr` binds immutably, `var`
// makes a mutable binding, and reassignment walks the scope chain.

use tova_compiler::ast::Stmt;
use tova_compiler::{analyze, lex, parse, Analysis, CompileError};

fn analyze_source(source: &str) -> Result<Analysis, CompileError> {
    let tokens = lex(source, "test.tova")?;
    let program = parse(tokens, "test.tova")?;
    analyze(&program, "test.tova")
}

#[test]
fn reassigning_immutable_binding_fails() {
    let err = analyze_source("count = 0\ncount = 1").unwrap_err();
    let message = err.to_string();
    assert!(
        message.contains("Cannot reassign immutable variable 'count'. Use 'var' for mutable variables."),
        "unexpected message: {}",
        message
    );
}

#[test]
fn var_allows_reassignment() {
    assert!(analyze_source("var count = 0\ncount = 1").is_ok());
}

#[test]
fn compound_assignment_requires_mutable_target() {
    let source = "var c = 0\nc += 3";
    let tokens = lex(source, "test.tova").unwrap();
    let program = parse(tokens, "test.tova").unwrap();
    assert!(matches!(program.body[1], Stmt::Compound(_)));
    analyze(&program, "test.tova").unwrap();

    let err = analyze_source("c = 0\nc += 3").unwrap_err();
    assert!(err.to_string().contains("Cannot reassign immutable variable 'c'"));
}

#[test]
fn compound_assignment_to_undefined_fails() {
    let err = analyze_source("missing += 1").unwrap_err();
    assert!(err.to_string().contains("Cannot assign to undefined variable 'missing'"));
}

#[test]
fn user_binding_shadows_builtin() {
    // `len` is a builtin; binding it is allowed, redefining the binding is
    // not.
    assert!(analyze_source("len = 3").is_ok());
    let err = analyze_source("var len = 3\nvar len = 4").unwrap_err();
    assert!(err.to_string().contains("already defined"));
}

#[test]
fn destructured_names_are_immutable() {
    let err = analyze_source("let {a, b} = point\na = 1").unwrap_err();
    assert!(err.to_string().contains("Cannot reassign immutable variable 'a'"));
}

#[test]
fn reassignment_walks_parent_scopes() {
    let source = r#"
var total = 0
fn bump() {
    total = 5
}
"#;
    assert!(analyze_source(source).is_ok());

    let source = r#"
total = 0
fn bump() {
    total = 5
}
"#;
    let err = analyze_source(source).unwrap_err();
    assert!(err.to_string().contains("Cannot reassign immutable variable 'total'"));
}

#[test]
fn fresh_name_in_function_scope_binds_locally() {
    let source = r#"
fn helper() {
    local = 1
    local
}
"#;
    let analysis = analyze_source(source).unwrap();
    assert!(analysis.warnings.is_empty());
}
