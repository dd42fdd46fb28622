// Inter-server RPC validation: calls across named server blocks must name
// a function that exists on the target server; self-calls warn.

use tova_compiler::{analyze, lex, parse, Analysis, CompileError};

fn analyze_source(source: &str) -> Result<Analysis, CompileError> {
    let tokens = lex(source, "test.tova")?;
    let program = parse(tokens, "test.tova")?;
    analyze(&program, "test.tova")
}

#[test]
fn rpc_to_existing_function_passes() {
    let source = r#"
server api {
    fn ping() {
        1
    }
}

server web {
    route GET "/" => fn(req) api.ping()
}
"#;
    let analysis = analyze_source(source).unwrap();
    assert!(analysis.warnings.is_empty(), "unexpected warnings: {:?}", analysis.warnings);
}

#[test]
fn rpc_to_missing_function_fails() {
    let source = r#"
server api {
    fn ping() {
        1
    }
}

server web {
    route GET "/" => fn(req) api.pong()
}
"#;
    let err = analyze_source(source).unwrap_err();
    assert!(
        err.to_string().contains(r#"No function 'pong' in server block "api""#),
        "unexpected message: {}",
        err
    );
}

#[test]
fn self_rpc_warns() {
    let source = r#"
server api {
    fn ping() {
        1
    }
    fn relay() {
        api.ping()
    }
}
"#;
    let analysis = analyze_source(source).unwrap();
    assert!(analysis
        .warnings
        .iter()
        .any(|w| w.code.as_deref() == Some("W_SELF_RPC")));
}

#[test]
fn calls_on_unknown_targets_pass_through() {
    let source = r#"
server api {
    fn fetch_user(id) {
        http.get(id)
    }
}
"#;
    let analysis = analyze_source(source).unwrap();
    assert!(analysis.warnings.is_empty());
}

#[test]
fn rpc_sees_functions_inside_route_groups() {
    let source = r#"
server api {
    group "/v1" {
        fn ping() {
            1
        }
    }
}

server web {
    route GET "/" => fn(req) api.ping()
}
"#;
    assert!(analyze_source(source).is_ok());
}

#[test]
fn route_handler_query_param_warning() {
    let source = r#"
server api {
    fn list(req, page) {
        page
    }
    route GET "/items" => list
}
"#;
    let analysis = analyze_source(source).unwrap();
    assert!(analysis
        .warnings
        .iter()
        .any(|w| w.code.as_deref() == Some("W_QUERY_PARAM")));
}

#[test]
fn route_path_params_match_handler_params() {
    let source = r#"
server api {
    fn show(req, id) {
        id
    }
    route GET "/items/:id" => show
}
"#;
    let analysis = analyze_source(source).unwrap();
    assert!(analysis.warnings.is_empty(), "unexpected warnings: {:?}", analysis.warnings);
}

#[test]
fn body_annotation_on_get_route_warns() {
    let source = r#"
server api {
    fn create(req) {
        req
    }
    route GET "/items" body Item => create
}
"#;
    let analysis = analyze_source(source).unwrap();
    assert!(analysis
        .warnings
        .iter()
        .any(|w| w.code.as_deref() == Some("W_BODY_TYPE")));
}
