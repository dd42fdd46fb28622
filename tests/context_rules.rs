// Context-dependent declarations: browser-only constructs raise E302
// outside a browser block, server-only constructs raise E303, and the
// legacy `client` keyword still opens a browser context.

use tova_compiler::{analyze, lex, parse, Analysis, CompileError};

fn analyze_source(source: &str) -> Result<Analysis, CompileError> {
    let tokens = lex(source, "test.tova")?;
    let program = parse(tokens, "test.tova")?;
    analyze(&program, "test.tova")
}

fn error_codes(err: &CompileError) -> Vec<String> {
    err.to_diagnostics()
        .iter()
        .filter_map(|d| d.code.clone())
        .collect()
}

#[test]
fn state_inside_browser_block_is_legal() {
    assert!(analyze_source("browser { state x = 0 }").is_ok());
}

#[test]
fn legacy_client_keyword_still_works() {
    assert!(analyze_source("client { state x = 0 }").is_ok());
}

#[test]
fn top_level_state_raises_e302() {
    let err = analyze_source("state x = 0").unwrap_err();
    assert!(error_codes(&err).contains(&"E302".to_string()));
}

#[test]
fn state_inside_server_raises_e302() {
    let err = analyze_source("server api { state x = 0 }").unwrap_err();
    assert!(error_codes(&err).contains(&"E302".to_string()));
}

#[test]
fn browser_only_declarations_each_raise_e302() {
    for source in [
        "computed d = 1",
        "effect { print(1) }",
        "component Thing { state x = 0 }",
        "store Cart { x = 1 }",
    ] {
        let err = analyze_source(source).unwrap_err();
        assert!(
            error_codes(&err).contains(&"E302".to_string()),
            "expected E302 for {:?}",
            source
        );
    }
}

#[test]
fn server_declarations_analyze_inside_server() {
    assert!(analyze_source("browser { state x = 0 }\nserver api { fn f(req) { 1 } }").is_ok());

    let source = r#"
server api {
    db users
    cors { origins: ["https://example.com"] }
    session { ttl: 3600 }
    middleware fn(req, next) {
        next(req)
    }
    ws "/chat" {
        fn on_message(sock, msg) {
            sock.send(msg)
        }
    }
    schedule "0 3 * * *" fn() {
        print("cleanup")
    }
    route GET "/" => fn(req) 1
}
"#;
    assert!(analyze_source(source).is_ok());
}

#[test]
fn env_outside_server_raises_e303() {
    let err = analyze_source(r#"browser { state k = env("KEY") }"#).unwrap_err();
    assert!(error_codes(&err).contains(&"E303".to_string()));
}

#[test]
fn e302_carries_a_hint() {
    let err = analyze_source("state x = 0").unwrap_err();
    let hints: Vec<String> = err
        .to_diagnostics()
        .iter()
        .filter_map(|d| d.hint.clone())
        .collect();
    assert!(hints.iter().any(|h| h.contains("browser { } block")));
}

#[test]
fn analyzer_reports_all_violations_in_one_pass() {
    let source = "state x = 0\nstate y = 1\ncomputed z = 2";
    let err = analyze_source(source).unwrap_err();
    assert_eq!(error_codes(&err).iter().filter(|c| *c == "E302").count(), 3);
}

#[test]
fn functions_keep_their_enclosing_context() {
    // A function nested in a browser block still counts as browser context
    // for the declarations inside it.
    let source = r#"
browser {
    component App {
        state count = 0
        count
    }
}
"#;
    assert!(analyze_source(source).is_ok());
}
