// Auxiliary dialects: deploy field validation, edge queue wiring, and the
// security pre-pass that collects required secrets.

use tova_compiler::ast::Stmt;
use tova_compiler::plugins::deploy;
use tova_compiler::{analyze, lex, parse, Analysis, CompileError};

fn analyze_source(source: &str) -> Result<Analysis, CompileError> {
    let tokens = lex(source, "test.tova")?;
    let program = parse(tokens, "test.tova")?;
    analyze(&program, "test.tova")
}

#[test]
fn minimal_deploy_block_passes() {
    let source = r#"
deploy {
    server "prod-1"
    domain "example.com"
}
"#;
    assert!(analyze_source(source).is_ok());
}

#[test]
fn deploy_missing_required_field_errors() {
    let source = r#"
deploy {
    server "prod-1"
}
"#;
    let err = analyze_source(source).unwrap_err();
    assert!(err.to_string().contains("missing required field 'domain'"));
}

#[test]
fn deploy_unknown_field_lists_valid_fields() {
    let source = r#"
deploy {
    server "prod-1"
    domain "example.com"
    regionn "eu"
}
"#;
    let err = analyze_source(source).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("unknown deploy field 'regionn'"));
    assert!(message.contains("valid fields are"));
    assert!(message.contains("domain"));
}

#[test]
fn deploy_manifest_serializes_literal_fields() {
    let source = r#"
deploy {
    server "prod-1"
    domain "example.com"
    port 22
    services ["web", "worker"]
    env { RUST_LOG: "info" }
}
"#;
    let tokens = lex(source, "test.tova").unwrap();
    let program = parse(tokens, "test.tova").unwrap();
    let Some(Stmt::Deploy(block)) = program.body.first() else {
        panic!("expected a deploy block");
    };
    let manifest = deploy::manifest(block);
    assert_eq!(manifest["server"], "prod-1");
    assert_eq!(manifest["port"], 22);
    assert_eq!(manifest["services"][1], "worker");
    assert_eq!(manifest["env"]["RUST_LOG"], "info");
}

#[test]
fn edge_consumer_with_producer_passes() {
    let source = r#"
edge {
    producer "events"
    consumer "events" fn(msg) {
        msg
    }
}
"#;
    let analysis = analyze_source(source).unwrap();
    assert!(analysis.warnings.is_empty(), "unexpected warnings: {:?}", analysis.warnings);
}

#[test]
fn edge_consumer_without_producer_warns() {
    let source = r#"
edge {
    producer "events"
    consumer "metrics" fn(m) {
        m
    }
}
"#;
    let analysis = analyze_source(source).unwrap();
    assert!(analysis
        .warnings
        .iter()
        .any(|w| w.code.as_deref() == Some("W_UNKNOWN_QUEUE")));
}

#[test]
fn security_pre_pass_collects_env_secrets() {
    let source = r#"
server api {
    fn token() {
        env("API_KEY")
    }
    fn dsn() {
        env("DATABASE_URL")
    }
}

security {
    csp "default-src 'self'"
}
"#;
    let analysis = analyze_source(source).unwrap();
    let secrets: Vec<&str> = analysis.required_secrets.iter().map(|s| s.as_str()).collect();
    assert_eq!(secrets, vec!["API_KEY", "DATABASE_URL"]);
}

#[test]
fn secrets_are_collected_without_a_security_block() {
    let source = r#"
server api {
    fn token() {
        env("ONLY_ONE")
    }
}
"#;
    let analysis = analyze_source(source).unwrap();
    assert!(analysis.required_secrets.contains("ONLY_ONE"));
}

#[test]
fn cli_and_bench_blocks_parse_and_analyze() {
    let source = r#"
cli tova {
    command build(target: String) {
        print(target)
    }
    command serve {
        print("serving")
    }
}

bench lexing {
    var total = 0
    total += 1
}

concurrent {
    jobs = [1, 2, 3]
}
"#;
    assert!(analyze_source(source).is_ok());
}
