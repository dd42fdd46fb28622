// Whole-pipeline tests: a realistic full-stack program through lexer,
// parser and analyzer, plus determinism, strict mode, gradual typing
// warnings and positional scope lookup.

use tova_compiler::ast::{Stmt, TemplatePiece, Expr};
use tova_compiler::{analyze, analyze_with_options, compile_front, lex, parse, Analysis,
    AnalyzerOptions, CompileError};

fn analyze_source(source: &str) -> Result<Analysis, CompileError> {
    let tokens = lex(source, "app.tova")?;
    let program = parse(tokens, "app.tova")?;
    analyze(&program, "app.tova")
}

const FULL_APP: &str = r#"
type Todo {
    id: Int,
    title: String,
    done: Bool
}

shared {
    fn slugify(title: String) -> String {
        title
    }
}

server api {
    db todos

    fn list(req) {
        [t for t in todos.all() if not t.done]
    }

    fn show(req, id) {
        todos.find(id)
    }

    route GET "/todos" => list
    route GET "/todos/:id" => show
    route POST "/todos" body Todo => fn(req) req.body

    group "/admin" {
        route GET "/stats" => fn(req) {
            {total: 10, open: 3}
        }
    }

    schedule "0 3 * * *" fn() {
        print("nightly cleanup")
    }
}

browser {
    state filter = "all"
    state todos = []
    computed heading = "Todos ({filter})"

    component TodoList(items) {
        <ul>
            for item in items {
                <li class:done={item.done}>{item.title}</li>
            }
        </ul>
    }

    component App {
        <div>
            <h1>{heading}</h1>
            if filter == "all" {
                <TodoList items={todos}/>
            } else {
                <p>filtered</p>
            }
        </div>
    }
}
"#;

#[test]
fn full_app_compiles_clean() {
    let output = compile_front(FULL_APP, "app.tova").unwrap();
    assert!(
        output.analysis.warnings.is_empty(),
        "unexpected warnings: {:?}",
        output.analysis.warnings
    );
}

#[test]
fn analyzer_is_deterministic() {
    let first = analyze_source(FULL_APP).unwrap();
    let second = analyze_source(FULL_APP).unwrap();
    assert_eq!(format!("{:?}", first.warnings), format!("{:?}", second.warnings));
    assert_eq!(first.scopes.len(), second.scopes.len());
}

#[test]
fn template_literal_round_trips_through_parser() {
    let tokens = lex(r#"greeting = "Hello, {name}!""#, "app.tova").unwrap();
    let program = parse(tokens, "app.tova").unwrap();
    let Stmt::Assignment(assignment) = &program.body[0] else {
        panic!("expected assignment");
    };
    let Expr::Template(template) = &assignment.value else {
        panic!("expected template literal, got {:?}", assignment.value);
    };
    assert_eq!(template.parts.len(), 3);
    assert!(matches!(&template.parts[0], TemplatePiece::Text(t) if t == "Hello, "));
    assert!(matches!(&template.parts[1], TemplatePiece::Expr(Expr::Ident(i)) if i.name == "name"));
    assert!(matches!(&template.parts[2], TemplatePiece::Text(t) if t == "!"));
}

#[test]
fn type_mismatch_warns_by_default() {
    let analysis = analyze_source(r#"var n: Int = "five""#).unwrap();
    assert!(analysis
        .warnings
        .iter()
        .any(|w| w.code.as_deref() == Some("W_TYPE_MISMATCH")));
}

#[test]
fn float_to_int_narrowing_always_warns() {
    let analysis = analyze_source("var n: Int = 1.5").unwrap();
    assert!(analysis
        .warnings
        .iter()
        .any(|w| w.code.as_deref() == Some("W_NARROWING")));
}

#[test]
fn int_widens_to_float_silently() {
    let analysis = analyze_source("var x: Float = 1").unwrap();
    assert!(analysis.warnings.is_empty());
}

#[test]
fn strict_mode_escalates_unknown_identifiers() {
    let source = "x = missing_name";
    assert!(analyze_source(source).is_ok());

    let tokens = lex(source, "app.tova").unwrap();
    let program = parse(tokens, "app.tova").unwrap();
    let err =
        analyze_with_options(&program, "app.tova", AnalyzerOptions { strict: true }).unwrap_err();
    assert!(err.to_string().contains("unknown identifier 'missing_name'"));
}

#[test]
fn strict_mode_escalates_type_mismatches() {
    let tokens = lex(r#"var n: Int = "five""#, "app.tova").unwrap();
    let program = parse(tokens, "app.tova").unwrap();
    assert!(analyze_with_options(&program, "app.tova", AnalyzerOptions { strict: true }).is_err());
}

#[test]
fn scope_lookup_by_position() {
    let source = "fn outer() {\n    inner = 1\n    inner\n}\n";
    let analysis = analyze_source(source).unwrap();
    let scope = analysis.scopes.find_scope_at_position(analysis.root, 2, 5);
    assert!(analysis.scopes.lookup(scope, "inner").is_some());
    assert!(analysis.scopes.lookup_local(analysis.root, "inner").is_none());
}

#[test]
fn match_with_guards_and_ranges() {
    let source = r#"
grade = match score {
    90..=100 => "A",
    n if n >= 80 => "B",
    _ => "C"
}
"#;
    let analysis = analyze_source(source).unwrap();
    assert!(analysis.warnings.is_empty());
}

#[test]
fn pipe_and_comprehensions_analyze() {
    let source = r#"
nums = [1, 2, 3, 4]
evens = [n for n in nums if n % 2 == 0]
index = {n: n ** 2 for n in nums}
total = nums |> sum()
"#;
    let analysis = analyze_source(source).unwrap();
    assert!(analysis.warnings.is_empty());
}

#[test]
fn chained_comparison_parses_to_one_node() {
    let tokens = lex("ok = 1 < x < 10", "app.tova").unwrap();
    let program = parse(tokens, "app.tova").unwrap();
    let Stmt::Assignment(assignment) = &program.body[0] else {
        panic!("expected assignment");
    };
    let Expr::Chained(chained) = &assignment.value else {
        panic!("expected chained comparison, got {:?}", assignment.value);
    };
    assert_eq!(chained.operands.len(), 3);
    assert_eq!(chained.ops.len(), 2);
}

#[test]
fn parse_error_reports_position() {
    let err = compile_front("fn broken( {", "app.tova").unwrap_err();
    match err {
        CompileError::Parser { line, column, .. } => {
            assert!(line >= 1);
            assert!(column >= 1);
        }
        other => panic!("expected parser error, got {:?}", other),
    }
}

#[test]
fn lexer_error_stops_the_pipeline() {
    let err = compile_front("x = £", "app.tova").unwrap_err();
    assert!(matches!(err, CompileError::Lexer { .. }));
}
