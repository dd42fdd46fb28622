// Security dialect: `security { ... }` policy rules, plus a pre-pass that
// collects every `env("NAME")` reference in the program into the set of
// secrets a deployment must provide.

use crate::analyzer::Analyzer;
use crate::ast::{self, *};
use crate::errors::CompileError;
use crate::parser::Parser;
use crate::token::TokenKind;

pub(crate) fn parse(parser: &mut Parser) -> Result<Stmt, CompileError> {
    parser.parse_security_block()
}

impl Parser {
    pub(crate) fn parse_security_block(&mut self) -> Result<Stmt, CompileError> {
        let loc = self.loc();
        self.advance(); // security
        self.skip_newlines();
        self.expect(&TokenKind::LBrace)?;
        let mut rules = Vec::new();
        loop {
            self.skip_newlines();
            if self.check(&TokenKind::RBrace) || self.check(&TokenKind::Eof) {
                break;
            }
            let rule_loc = self.loc();
            let (name, _) = self.expect_ident()?;
            let mut args = Vec::new();
            while !self.check(&TokenKind::Newline)
                && !self.check(&TokenKind::RBrace)
                && !self.check(&TokenKind::Eof)
            {
                args.push(self.parse_expression()?);
                if !self.match_kind(&TokenKind::Comma) {
                    break;
                }
            }
            rules.push(SecurityRule { name, args, loc: rule_loc });
            self.expect_terminator()?;
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(Stmt::Security(SecurityBlock { rules, loc }))
    }
}

pub(crate) fn pre_pass(analyzer: &mut Analyzer, program: &Program) {
    let mut secrets = Vec::new();
    ast::walk_program_exprs(program, &mut |expr| {
        if let Expr::Call(call) = expr {
            if let Expr::Ident(callee) = &call.callee {
                if callee.name == "env" {
                    if let Some(CallArg::Positional(Expr::Str(name))) = call.args.first() {
                        secrets.push(name.value.clone());
                    }
                }
            }
        }
    });
    for secret in secrets {
        analyzer.required_secrets.insert(secret);
    }
}

pub(crate) fn visit(analyzer: &mut Analyzer, stmt: &Stmt) {
    if let Stmt::Security(block) = stmt {
        for rule in &block.rules {
            for arg in &rule.args {
                analyzer.analyze_expr(arg);
            }
        }
    }
}
