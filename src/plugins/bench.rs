// Bench dialect: `bench name? { ... }` micro-benchmark bodies.

use crate::analyzer::Analyzer;
use crate::ast::*;
use crate::errors::CompileError;
use crate::parser::Parser;
use crate::scope::ScopeContext;
use crate::token::TokenKind;

pub(crate) fn parse(parser: &mut Parser) -> Result<Stmt, CompileError> {
    let loc = parser.loc();
    parser.advance(); // bench
    let name = match parser.kind() {
        TokenKind::Ident(_) => Some(parser.expect_ident()?.0),
        _ => None,
    };
    parser.skip_newlines();
    parser.expect(&TokenKind::LBrace)?;
    let body = parser.parse_stmts_until_rbrace()?;
    parser.expect(&TokenKind::RBrace)?;
    Ok(Stmt::Bench(BenchBlock { name, body, loc }))
}

pub(crate) fn visit(analyzer: &mut Analyzer, stmt: &Stmt) {
    if let Stmt::Bench(block) = stmt {
        analyzer.push_scope(ScopeContext::Block, &block.loc);
        analyzer.analyze_stmts(&block.body);
        analyzer.pop_scope();
    }
}
