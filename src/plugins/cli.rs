// CLI dialect: `cli name? { command build(target: String) { ... } ... }`.

use crate::analyzer::Analyzer;
use crate::ast::*;
use crate::errors::CompileError;
use crate::parser::Parser;
use crate::scope::ScopeContext;
use crate::token::TokenKind;

pub(crate) fn parse(parser: &mut Parser) -> Result<Stmt, CompileError> {
    parser.parse_cli_block()
}

impl Parser {
    pub(crate) fn parse_cli_block(&mut self) -> Result<Stmt, CompileError> {
        let loc = self.loc();
        self.advance(); // cli
        let name = match self.kind() {
            TokenKind::Ident(_) => Some(self.expect_ident()?.0),
            _ => None,
        };
        self.skip_newlines();
        self.expect(&TokenKind::LBrace)?;
        let mut commands = Vec::new();
        loop {
            self.skip_newlines();
            if self.check(&TokenKind::RBrace) || self.check(&TokenKind::Eof) {
                break;
            }
            if !self.cur().is_ident("command") {
                return Err(self.err_expected("'command'"));
            }
            let command_loc = self.loc();
            self.advance();
            let (command_name, _) = self.expect_ident()?;
            let params = if self.check(&TokenKind::LParen) {
                self.parse_params()?
            } else {
                Vec::new()
            };
            let body = self.parse_brace_block()?;
            commands.push(CliCommand { name: command_name, params, body, loc: command_loc });
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(Stmt::Cli(CliBlock { name, commands, loc }))
    }
}

pub(crate) fn visit(analyzer: &mut Analyzer, stmt: &Stmt) {
    if let Stmt::Cli(block) = stmt {
        for command in &block.commands {
            analyzer.push_scope(ScopeContext::Function, &command.loc);
            analyzer.analyze_params(&command.params);
            analyzer.analyze_stmts(&command.body);
            analyzer.pop_scope();
        }
    }
}
