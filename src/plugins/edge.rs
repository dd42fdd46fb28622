// Edge dialect: `edge { producer "queue" ... consumer "queue" handler }`.
// Producers are collected in a pre-pass; consumer references are validated
// against them after the main traversal.

use crate::analyzer::Analyzer;
use crate::ast::*;
use crate::diagnostics::Diagnostic;
use crate::errors::CompileError;
use crate::parser::Parser;
use crate::scope::ScopeContext;
use crate::token::TokenKind;

pub(crate) fn parse(parser: &mut Parser) -> Result<Stmt, CompileError> {
    parser.parse_edge_block()
}

impl Parser {
    pub(crate) fn parse_edge_block(&mut self) -> Result<Stmt, CompileError> {
        let loc = self.loc();
        self.advance(); // edge
        self.skip_newlines();
        self.expect(&TokenKind::LBrace)?;
        let mut body = Vec::new();
        loop {
            self.skip_newlines();
            if self.check(&TokenKind::RBrace) || self.check(&TokenKind::Eof) {
                break;
            }
            if self.contextual("producer") {
                let decl_loc = self.loc();
                self.advance();
                let queue = self.expect_string()?;
                body.push(EdgeDeclaration::Producer { queue, loc: decl_loc });
            } else if self.contextual("consumer") {
                let decl_loc = self.loc();
                self.advance();
                let queue = self.expect_string()?;
                let handler = self.parse_expression()?;
                body.push(EdgeDeclaration::Consumer { queue, handler, loc: decl_loc });
            } else {
                body.push(EdgeDeclaration::Stmt(self.parse_stmt()?));
            }
            self.expect_terminator()?;
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(Stmt::Edge(EdgeBlock { body, loc }))
    }
}

pub(crate) fn pre_pass(analyzer: &mut Analyzer, program: &Program) {
    for stmt in &program.body {
        if let Stmt::Edge(block) = stmt {
            for decl in &block.body {
                if let EdgeDeclaration::Producer { queue, .. } = decl {
                    analyzer.edge_producers.insert(queue.clone());
                }
            }
        }
    }
}

pub(crate) fn visit(analyzer: &mut Analyzer, stmt: &Stmt) {
    if let Stmt::Edge(block) = stmt {
        analyzer.push_scope(ScopeContext::Block, &block.loc);
        for decl in &block.body {
            match decl {
                EdgeDeclaration::Producer { .. } => {}
                EdgeDeclaration::Consumer { queue, handler, loc } => {
                    analyzer.edge_consumers.push((queue.clone(), loc.clone()));
                    analyzer.analyze_expr(handler);
                }
                EdgeDeclaration::Stmt(s) => analyzer.visit_stmt(s),
            }
        }
        analyzer.pop_scope();
    }
}

/// After traversal, every consumer must name a queue some producer feeds.
pub(crate) fn cross_block_validate(analyzer: &mut Analyzer, _program: &Program) {
    let consumers = std::mem::take(&mut analyzer.edge_consumers);
    for (queue, loc) in &consumers {
        if !analyzer.edge_producers.contains(queue) {
            analyzer.warn(
                Diagnostic::warning(format!("no producer declares queue '{}'", queue))
                    .with_code("W_UNKNOWN_QUEUE")
                    .at_loc(loc),
            );
        }
    }
    analyzer.edge_consumers = consumers;
}
