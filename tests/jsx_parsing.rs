// JSX parsing: elements, fragments, attributes and directives, expression
// children, and the block-level control flow (for/if/match) inside JSX.

use tova_compiler::ast::*;
use tova_compiler::{lex, parse, CompileError};

fn parse_source(source: &str) -> Result<Program, CompileError> {
    let tokens = lex(source, "test.tova")?;
    parse(tokens, "test.tova")
}

fn first_expr(program: &Program) -> &Expr {
    match &program.body[0] {
        Stmt::Expr(stmt) => &stmt.expr,
        other => panic!("expected expression statement, got {:?}", other.kind_name()),
    }
}

#[test]
fn element_with_expression_child() {
    let program = parse_source("<p>{count * 2}</p>").unwrap();
    let Expr::Jsx(element) = first_expr(&program) else {
        panic!("expected JSX element");
    };
    assert_eq!(element.name, "p");
    assert_eq!(element.children.len(), 1);
    match &element.children[0] {
        JsxChild::Expr(child) => assert!(matches!(child.expr, Expr::Binary(_))),
        other => panic!("expected expression child, got {:?}", other),
    }
}

#[test]
fn element_attributes_and_directives() {
    let source = r#"<input type="text" bind:value={name} on:keyup.enter={submit} disabled/>"#;
    let program = parse_source(source).unwrap();
    let Expr::Jsx(element) = first_expr(&program) else {
        panic!("expected JSX element");
    };
    assert!(element.self_closing);
    assert_eq!(element.attributes.len(), 4);

    match &element.attributes[0] {
        JsxAttribute::Static { name, value: Some(JsxAttrValue::Str(v)), .. } => {
            assert_eq!(name, "type");
            assert_eq!(v, "text");
        }
        other => panic!("expected static attribute, got {:?}", other),
    }
    match &element.attributes[1] {
        JsxAttribute::Directive { namespace, name, .. } => {
            assert_eq!(namespace, "bind");
            assert_eq!(name, "value");
        }
        other => panic!("expected bind directive, got {:?}", other),
    }
    match &element.attributes[2] {
        JsxAttribute::Directive { namespace, name, modifiers, .. } => {
            assert_eq!(namespace, "on");
            assert_eq!(name, "keyup");
            assert_eq!(modifiers, &["enter".to_string()]);
        }
        other => panic!("expected on directive, got {:?}", other),
    }
    match &element.attributes[3] {
        JsxAttribute::Static { name, value: None, .. } => assert_eq!(name, "disabled"),
        other => panic!("expected boolean shorthand, got {:?}", other),
    }
}

#[test]
fn spread_attribute() {
    let program = parse_source("<Widget {...props}/>").unwrap();
    let Expr::Jsx(element) = first_expr(&program) else {
        panic!("expected JSX element");
    };
    assert!(matches!(element.attributes[0], JsxAttribute::Spread { .. }));
}

#[test]
fn fragment_with_children() {
    let program = parse_source("<><p>one</p><p>two</p></>").unwrap();
    let Expr::JsxFragment(fragment) = first_expr(&program) else {
        panic!("expected fragment");
    };
    assert_eq!(fragment.children.len(), 2);
}

#[test]
fn mismatched_closing_tag_is_an_error() {
    let err = parse_source("<div>text</span>").unwrap_err();
    assert!(err.to_string().contains("mismatched closing tag"));
}

#[test]
fn jsx_for_child() {
    let source = r#"
<ul>
    for item in items {
        <li>{item}</li>
    }
</ul>
"#;
    let program = parse_source(source).unwrap();
    let Expr::Jsx(element) = first_expr(&program) else {
        panic!("expected JSX element");
    };
    let JsxChild::For(jsx_for) = &element.children[0] else {
        panic!("expected JSXFor child, got {:?}", element.children);
    };
    assert_eq!(jsx_for.binding.names, vec!["item".to_string()]);
    assert!(matches!(jsx_for.body[0], JsxChild::Element(_)));
}

#[test]
fn jsx_if_elif_else_child() {
    let source = r#"
<div>
    if ready {
        <p>go</p>
    } elif waiting {
        <p>hold</p>
    } else {
        <p>stop</p>
    }
</div>
"#;
    let program = parse_source(source).unwrap();
    let Expr::Jsx(element) = first_expr(&program) else {
        panic!("expected JSX element");
    };
    let JsxChild::If(jsx_if) = &element.children[0] else {
        panic!("expected JSXIf child, got {:?}", element.children);
    };
    assert_eq!(jsx_if.branches.len(), 2);
    assert!(jsx_if.else_body.is_some());
}

#[test]
fn jsx_match_child() {
    let source = r#"
<div>
    {match status {
        Loading => <Spinner/>,
        Done(result) => <p>{result}</p>,
        _ => <p>unknown</p>
    }}
</div>
"#;
    let program = parse_source(source).unwrap();
    let Expr::Jsx(element) = first_expr(&program) else {
        panic!("expected JSX element");
    };
    let JsxChild::Match(jsx_match) = &element.children[0] else {
        panic!("expected JSXMatch child, got {:?}", element.children);
    };
    assert_eq!(jsx_match.arms.len(), 3);
    assert!(matches!(jsx_match.arms[0].pattern, Pattern::Variant { .. }));
    assert!(matches!(jsx_match.arms[2].pattern, Pattern::Wildcard { .. }));
}

#[test]
fn nested_elements_inside_expressions() {
    let source = "<div>{show(<span>inner</span>)}</div>";
    let program = parse_source(source).unwrap();
    let Expr::Jsx(element) = first_expr(&program) else {
        panic!("expected JSX element");
    };
    let JsxChild::Expr(child) = &element.children[0] else {
        panic!("expected expression child");
    };
    assert!(matches!(child.expr, Expr::Call(_)));
}

#[test]
fn text_and_expression_children_interleave() {
    let program = parse_source("<p>Hello {name}, welcome</p>").unwrap();
    let Expr::Jsx(element) = first_expr(&program) else {
        panic!("expected JSX element");
    };
    assert_eq!(element.children.len(), 3);
    assert!(matches!(element.children[0], JsxChild::Text { .. }));
    assert!(matches!(element.children[1], JsxChild::Expr(_)));
    assert!(matches!(element.children[2], JsxChild::Text { .. }));
}
