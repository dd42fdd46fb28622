// Form dialect: field validators, groups, arrays, steps, and the browser
// context requirement (E310).

use tova_compiler::{analyze, lex, parse, Analysis, CompileError};

fn analyze_source(source: &str) -> Result<Analysis, CompileError> {
    let tokens = lex(source, "test.tova")?;
    let program = parse(tokens, "test.tova")?;
    analyze(&program, "test.tova")
}

fn warning_codes(analysis: &Analysis) -> Vec<&str> {
    analysis.warnings.iter().filter_map(|w| w.code.as_deref()).collect()
}

#[test]
fn well_formed_form_passes() {
    let source = r#"
browser {
    form Signup {
        field email: String { required, email }
        field password: String { required, minLength(8) }
        field age: Int { min(13), max(120) }
    }
}
"#;
    let analysis = analyze_source(source).unwrap();
    assert!(analysis.warnings.is_empty(), "unexpected warnings: {:?}", analysis.warnings);
}

#[test]
fn form_outside_browser_raises_e310() {
    let source = r#"
form Login {
    field user
}
"#;
    let err = analyze_source(source).unwrap_err();
    let codes: Vec<String> = err
        .to_diagnostics()
        .iter()
        .filter_map(|d| d.code.clone())
        .collect();
    assert!(codes.contains(&"E310".to_string()));
}

#[test]
fn unknown_validator_warns() {
    let source = r#"
browser {
    form Signup {
        field email: String { required, frobnicate }
    }
}
"#;
    let analysis = analyze_source(source).unwrap();
    assert!(warning_codes(&analysis).contains(&"W_UNKNOWN_VALIDATOR"));
}

#[test]
fn invalid_pattern_regex_warns() {
    let source = r#"
browser {
    form Signup {
        field code: String { pattern("[unclosed") }
    }
}
"#;
    let analysis = analyze_source(source).unwrap();
    assert!(warning_codes(&analysis).contains(&"W_BAD_PATTERN"));
}

#[test]
fn steps_with_unknown_member_warn() {
    let source = r#"
browser {
    form Wizard {
        field email
        group address {
            field street
        }
        steps {
            step account { email }
            step location { address, nickname }
        }
    }
}
"#;
    let analysis = analyze_source(source).unwrap();
    let codes = warning_codes(&analysis);
    assert_eq!(codes.iter().filter(|c| **c == "W_STEP_UNKNOWN_MEMBER").count(), 1);
}

#[test]
fn duplicate_field_names_error() {
    let source = r#"
browser {
    form Signup {
        field email
        field email
    }
}
"#;
    let err = analyze_source(source).unwrap_err();
    assert!(err.to_string().contains("already defined"));
}

#[test]
fn groups_and_arrays_open_their_own_scopes() {
    // The same field name may appear in two sibling groups.
    let source = r#"
browser {
    form Order {
        group billing {
            field street
        }
        group shipping {
            field street
        }
        array items {
            field qty: Int
        }
    }
}
"#;
    let analysis = analyze_source(source).unwrap();
    assert!(analysis.warnings.is_empty());
}
