// Browser dialect: `browser { ... }` blocks (the legacy `client` keyword
// is an alias) with reactive state, computed values, effects, components,
// stores and style blocks. `form` has its own plugin.

use crate::analyzer::Analyzer;
use crate::ast::*;
use crate::diagnostics::Diagnostic;
use crate::errors::CompileError;
use crate::parser::Parser;
use crate::scope::{ScopeContext, Symbol, SymbolKind};
use crate::token::TokenKind;
use crate::types::Type;

pub(crate) fn parse(parser: &mut Parser) -> Result<Stmt, CompileError> {
    parser.parse_browser_block()
}

impl Parser {
    pub(crate) fn parse_browser_block(&mut self) -> Result<Stmt, CompileError> {
        let loc = self.loc();
        self.expect(&TokenKind::Browser)?;
        self.skip_newlines();
        self.expect(&TokenKind::LBrace)?;
        let body = self.parse_stmts_until_rbrace()?;
        self.expect(&TokenKind::RBrace)?;
        Ok(Stmt::Browser(BrowserBlock { body, loc }))
    }
}

pub(crate) fn visit(analyzer: &mut Analyzer, stmt: &Stmt) {
    match stmt {
        Stmt::Browser(block) => analyzer.visit_browser_block(block),
        Stmt::State(state) => analyzer.visit_state(state),
        Stmt::ComputedDecl(computed) => analyzer.visit_computed(computed),
        Stmt::Effect(effect) => analyzer.visit_effect(effect),
        Stmt::Component(component) => analyzer.visit_component(component),
        Stmt::Store(store) => analyzer.visit_store(store),
        Stmt::Style(_) => {}
        _ => {}
    }
}

impl Analyzer {
    fn visit_browser_block(&mut self, block: &BrowserBlock) {
        self.push_scope(ScopeContext::Browser, &block.loc);
        self.analyze_stmts(&block.body);
        self.pop_scope();
    }

    fn visit_state(&mut self, state: &StateDeclaration) {
        if !self.require_browser_context("state", &state.loc) {
            return;
        }
        self.analyze_expr(&state.init);
        let declared = state.ty.as_ref().map(|ann| self.type_from_annotation(ann));
        let inferred = self.infer_expr(&state.init);
        if let Some(declared) = &declared {
            self.check_assignable(&inferred, declared, &state.name, &state.loc);
        }
        let ty = declared.clone().unwrap_or(inferred);
        let mut symbol = Symbol::new(state.name.clone(), SymbolKind::State, ty)
            .mutable()
            .at(state.loc.clone());
        if let Some(declared) = declared {
            symbol = symbol.with_declared_type(declared);
        }
        self.define(symbol);
    }

    fn visit_computed(&mut self, computed: &ComputedDeclaration) {
        if !self.require_browser_context("computed", &computed.loc) {
            return;
        }
        self.analyze_expr(&computed.body);
        let ty = self.infer_expr(&computed.body);
        self.define(
            Symbol::new(computed.name.clone(), SymbolKind::Computed, ty)
                .at(computed.loc.clone()),
        );
    }

    fn visit_effect(&mut self, effect: &EffectDeclaration) {
        if !self.require_browser_context("effect", &effect.loc) {
            return;
        }
        self.push_scope(ScopeContext::Block, &effect.loc);
        self.analyze_stmts(&effect.body);
        self.pop_scope();
    }

    fn visit_component(&mut self, component: &ComponentDeclaration) {
        if !self.require_browser_context("component", &component.loc) {
            return;
        }
        if !starts_uppercase(&component.name) {
            self.warn(
                Diagnostic::warning(format!(
                    "component '{}' should be PascalCase",
                    component.name
                ))
                .with_code("W_NAMING")
                .at_loc(&component.loc),
            );
        }
        self.define(
            Symbol::new(component.name.clone(), SymbolKind::Component, Type::Any)
                .at(component.loc.clone()),
        );
        self.push_scope(ScopeContext::Function, &component.loc);
        self.analyze_params(&component.params);
        self.analyze_stmts(&component.body);
        self.pop_scope();
    }

    fn visit_store(&mut self, store: &StoreDeclaration) {
        if !self.require_browser_context("store", &store.loc) {
            return;
        }
        if !starts_uppercase(&store.name) {
            self.warn(
                Diagnostic::warning(format!("store '{}' should be PascalCase", store.name))
                    .with_code("W_NAMING")
                    .at_loc(&store.loc),
            );
        }
        self.define(
            Symbol::new(store.name.clone(), SymbolKind::Store, Type::Any).at(store.loc.clone()),
        );
        self.push_scope(ScopeContext::Block, &store.loc);
        self.analyze_stmts(&store.body);
        self.pop_scope();
    }
}

fn starts_uppercase(name: &str) -> bool {
    name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)
}
