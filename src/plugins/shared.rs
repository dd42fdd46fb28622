// Shared dialect: `shared { ... }` code compiled into both bundles.

use crate::analyzer::Analyzer;
use crate::ast::*;
use crate::errors::CompileError;
use crate::parser::Parser;
use crate::scope::ScopeContext;
use crate::token::TokenKind;

pub(crate) fn parse(parser: &mut Parser) -> Result<Stmt, CompileError> {
    parser.parse_shared_block()
}

impl Parser {
    pub(crate) fn parse_shared_block(&mut self) -> Result<Stmt, CompileError> {
        let loc = self.loc();
        self.expect(&TokenKind::Shared)?;
        self.skip_newlines();
        self.expect(&TokenKind::LBrace)?;
        let body = self.parse_stmts_until_rbrace()?;
        self.expect(&TokenKind::RBrace)?;
        Ok(Stmt::Shared(SharedBlock { body, loc }))
    }
}

pub(crate) fn visit(analyzer: &mut Analyzer, stmt: &Stmt) {
    if let Stmt::Shared(block) = stmt {
        analyzer.push_scope(ScopeContext::Shared, &block.loc);
        analyzer.analyze_stmts(&block.body);
        analyzer.pop_scope();
    }
}
