// Deploy dialect: `deploy { server "..." domain "..." ... }`. The block is
// validated here and handed to the deploy planner as data; executing the
// plan is outside the front end.

use std::collections::HashSet;

use lazy_static::lazy_static;

use crate::analyzer::Analyzer;
use crate::ast::*;
use crate::diagnostics::Diagnostic;
use crate::errors::CompileError;
use crate::parser::Parser;
use crate::token::TokenKind;

lazy_static! {
    static ref VALID_FIELDS: HashSet<&'static str> = {
        let mut set = HashSet::new();
        set.insert("server");
        set.insert("domain");
        set.insert("user");
        set.insert("port");
        set.insert("path");
        set.insert("branch");
        set.insert("build");
        set.insert("env");
        set.insert("ssl");
        set.insert("services");
        set.insert("healthcheck");
        set
    };
}

const REQUIRED_FIELDS: [&str; 2] = ["server", "domain"];

pub(crate) fn parse(parser: &mut Parser) -> Result<Stmt, CompileError> {
    parser.parse_deploy_block()
}

impl Parser {
    pub(crate) fn parse_deploy_block(&mut self) -> Result<Stmt, CompileError> {
        let loc = self.loc();
        self.advance(); // deploy
        self.skip_newlines();
        self.expect(&TokenKind::LBrace)?;
        let mut fields = Vec::new();
        loop {
            self.skip_newlines();
            if self.check(&TokenKind::RBrace) || self.check(&TokenKind::Eof) {
                break;
            }
            let field_loc = self.loc();
            let (name, _) = self.expect_name()?;
            let value = self.parse_expression()?;
            fields.push(DeployField { name, value, loc: field_loc });
            self.expect_terminator()?;
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(Stmt::Deploy(DeployBlock { fields, loc }))
    }
}

pub(crate) fn visit(analyzer: &mut Analyzer, stmt: &Stmt) {
    if let Stmt::Deploy(block) = stmt {
        analyzer.visit_deploy(block);
    }
}

/// The deploy plan as JSON, consumed by the deploy runner outside the
/// front end. Only literal field values materialize; anything computed
/// stays null for the runner to resolve.
pub fn manifest(block: &DeployBlock) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for field in &block.fields {
        map.insert(field.name.clone(), value_json(&field.value));
    }
    serde_json::Value::Object(map)
}

fn value_json(expr: &Expr) -> serde_json::Value {
    match expr {
        Expr::Str(s) => s.value.clone().into(),
        Expr::Int(i) => i.value.into(),
        Expr::Float(f) => f.value.into(),
        Expr::Bool(b) => b.value.into(),
        Expr::Array(array) => array.elements.iter().map(value_json).collect::<Vec<_>>().into(),
        Expr::Object(object) => {
            let mut map = serde_json::Map::new();
            for entry in &object.entries {
                if let ObjectEntry::Property { key, value, .. } = entry {
                    let name = match key {
                        ObjectKey::Name(name) => name.clone(),
                        ObjectKey::Str(name) => name.clone(),
                    };
                    map.insert(name, value_json(value));
                }
            }
            serde_json::Value::Object(map)
        }
        _ => serde_json::Value::Null,
    }
}

impl Analyzer {
    fn visit_deploy(&mut self, block: &DeployBlock) {
        let mut valid: Vec<&str> = VALID_FIELDS.iter().copied().collect();
        valid.sort_unstable();

        for field in &block.fields {
            if !VALID_FIELDS.contains(field.name.as_str()) {
                self.error(
                    Diagnostic::error(format!(
                        "unknown deploy field '{}'; valid fields are {}",
                        field.name,
                        valid.join(", ")
                    ))
                    .at_loc(&field.loc),
                );
            }
            self.analyze_expr(&field.value);
        }

        for required in REQUIRED_FIELDS {
            if !block.fields.iter().any(|f| f.name == required) {
                self.error(
                    Diagnostic::error(format!("deploy block is missing required field '{}'", required))
                        .at_loc(&block.loc),
                );
            }
        }
    }
}
