// Server dialect: `server name? { ... }` blocks with routes, route groups,
// middleware, websockets, db and server configuration declarations.

use lazy_static::lazy_static;
use regex::Regex;

use crate::analyzer::Analyzer;
use crate::ast::*;
use crate::diagnostics::Diagnostic;
use crate::errors::CompileError;
use crate::parser::Parser;
use crate::scope::{ScopeContext, Symbol, SymbolKind};
use crate::token::TokenKind;
use crate::types::Type;

lazy_static! {
    static ref PATH_PARAM: Regex = Regex::new(r":(\w+)").expect("path param pattern");
}

pub(crate) fn parse(parser: &mut Parser) -> Result<Stmt, CompileError> {
    parser.parse_server_block()
}

impl Parser {
    pub(crate) fn parse_server_block(&mut self) -> Result<Stmt, CompileError> {
        let loc = self.loc();
        self.expect(&TokenKind::Server)?;
        let name = match self.kind() {
            TokenKind::Ident(_) => Some(self.expect_ident()?.0),
            _ => None,
        };
        self.skip_newlines();
        self.expect(&TokenKind::LBrace)?;
        let body = self.parse_server_body()?;
        self.expect(&TokenKind::RBrace)?;
        Ok(Stmt::Server(ServerBlock { name, body, loc }))
    }

    fn parse_server_body(&mut self) -> Result<Vec<Stmt>, CompileError> {
        let mut body = Vec::new();
        loop {
            self.skip_newlines();
            if self.check(&TokenKind::RBrace) || self.check(&TokenKind::Eof) {
                break;
            }
            body.push(self.parse_server_stmt()?);
            self.expect_terminator()?;
        }
        Ok(body)
    }

    fn parse_server_stmt(&mut self) -> Result<Stmt, CompileError> {
        if self.contextual("route") {
            return self.parse_route_decl();
        }
        if self.contextual("group") {
            return self.parse_route_group();
        }
        if self.contextual("middleware") {
            return self.parse_middleware_decl();
        }
        if self.contextual("ws") {
            return self.parse_ws_decl();
        }
        if self.contextual("db") {
            return self.parse_db_decl();
        }
        if self.contextual("schedule") {
            return self.parse_schedule_decl();
        }
        for kind in [
            ServerConfigKind::Cors,
            ServerConfigKind::Auth,
            ServerConfigKind::Session,
            ServerConfigKind::Upload,
        ] {
            if self.contextual(kind.keyword()) {
                return self.parse_server_config(kind);
            }
        }
        self.parse_stmt()
    }

    /// `route GET "/users/:id" => handler` with an optional request body
    /// annotation: `route POST "/users" body User => handler`.
    fn parse_route_decl(&mut self) -> Result<Stmt, CompileError> {
        let loc = self.loc();
        self.advance(); // route
        let (method, _) = self.expect_ident()?;
        let path = self.expect_string()?;
        let body_type = if self.cur().is_ident("body") {
            self.advance();
            Some(self.parse_type_annotation()?)
        } else {
            None
        };
        self.expect(&TokenKind::FatArrow)?;
        self.skip_newlines();
        let handler = self.parse_expression()?;
        Ok(Stmt::Route(RouteDeclaration { method, path, handler, body_type, loc }))
    }

    fn parse_route_group(&mut self) -> Result<Stmt, CompileError> {
        let loc = self.loc();
        self.advance(); // group
        let prefix = self.expect_string()?;
        self.skip_newlines();
        self.expect(&TokenKind::LBrace)?;
        let body = self.parse_server_body()?;
        self.expect(&TokenKind::RBrace)?;
        Ok(Stmt::RouteGroup(RouteGroup { prefix, body, loc }))
    }

    fn parse_middleware_decl(&mut self) -> Result<Stmt, CompileError> {
        let loc = self.loc();
        self.advance(); // middleware
        let handler = self.parse_expression()?;
        Ok(Stmt::Middleware(MiddlewareDeclaration { handler, loc }))
    }

    fn parse_ws_decl(&mut self) -> Result<Stmt, CompileError> {
        let loc = self.loc();
        self.advance(); // ws
        let path = self.expect_string()?;
        let body = self.parse_brace_block()?;
        Ok(Stmt::WebSocket(WebSocketDeclaration { path, body, loc }))
    }

    fn parse_db_decl(&mut self) -> Result<Stmt, CompileError> {
        let loc = self.loc();
        self.advance(); // db
        let name = match self.kind() {
            TokenKind::Ident(_) => Some(self.expect_ident()?.0),
            _ => None,
        };
        let config = if self.check(&TokenKind::LBrace) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        Ok(Stmt::Db(DbDeclaration { name, config, loc }))
    }

    /// `schedule "0 * * * *" fn() { ... }`
    fn parse_schedule_decl(&mut self) -> Result<Stmt, CompileError> {
        let loc = self.loc();
        self.advance(); // schedule
        let spec_loc = self.loc();
        let spec = self.expect_string()?;
        let handler = self.parse_expression()?;
        Ok(Stmt::ServerConfig(ServerConfigDeclaration {
            kind: ServerConfigKind::Schedule,
            args: vec![Expr::Str(StringLiteral { value: spec, loc: spec_loc }), handler],
            loc,
        }))
    }

    fn parse_server_config(&mut self, kind: ServerConfigKind) -> Result<Stmt, CompileError> {
        let loc = self.loc();
        self.advance(); // the keyword
        let args = if self.check(&TokenKind::LBrace) {
            vec![self.parse_expression()?]
        } else {
            Vec::new()
        };
        Ok(Stmt::ServerConfig(ServerConfigDeclaration { kind, args, loc }))
    }
}

/// Collect `server name -> [function names]` before the main traversal so
/// inter-server RPC calls can be validated anywhere in the file.
pub(crate) fn pre_pass(analyzer: &mut Analyzer, program: &Program) {
    for stmt in &program.body {
        if let Stmt::Server(block) = stmt {
            if let Some(name) = &block.name {
                let mut functions = Vec::new();
                collect_functions(&block.body, &mut functions);
                analyzer.server_functions.insert(name.clone(), functions);
            }
        }
    }
}

fn collect_functions(body: &[Stmt], out: &mut Vec<String>) {
    for stmt in body {
        match stmt {
            Stmt::Function(f) => out.push(f.name.clone()),
            Stmt::RouteGroup(group) => collect_functions(&group.body, out),
            Stmt::Export(export) => {
                if let Stmt::Function(f) = &*export.stmt {
                    out.push(f.name.clone());
                }
            }
            _ => {}
        }
    }
}

pub(crate) fn visit(analyzer: &mut Analyzer, stmt: &Stmt) {
    match stmt {
        Stmt::Server(block) => analyzer.visit_server_block(block),
        Stmt::Route(route) => analyzer.visit_route(route),
        Stmt::RouteGroup(group) => analyzer.visit_route_group(group),
        Stmt::Middleware(m) => analyzer.visit_middleware(m),
        Stmt::WebSocket(ws) => analyzer.visit_websocket(ws),
        Stmt::Db(db) => analyzer.visit_db(db),
        Stmt::ServerConfig(config) => analyzer.visit_server_config(config),
        _ => {}
    }
}

impl Analyzer {
    fn visit_server_block(&mut self, block: &ServerBlock) {
        self.push_scope(ScopeContext::Server, &block.loc);

        // Peer server names resolve inside this block so cross-server RPC
        // (`otherServer.fn(...)`) type-checks as an identifier.
        let peers: Vec<String> = self
            .server_functions
            .keys()
            .filter(|peer| Some(*peer) != block.name.as_ref())
            .cloned()
            .collect();
        for peer in peers {
            self.define_quiet(Symbol::new(peer, SymbolKind::ServerName, Type::Any));
        }

        let previous = self.current_server.take();
        self.current_server = block.name.clone();
        self.collect_route_handler_params(&block.body);
        self.analyze_stmts(&block.body);
        self.current_server = previous;
        self.pop_scope();
    }

    /// Remember parameter names of functions declared in this server block
    /// so route declarations can be checked against their handlers.
    fn collect_route_handler_params(&mut self, body: &[Stmt]) {
        for stmt in body {
            match stmt {
                Stmt::Function(f) => {
                    let params = f.params.iter().map(|p| p.name.clone()).collect();
                    self.route_handler_params.insert(f.name.clone(), params);
                }
                Stmt::RouteGroup(group) => self.collect_route_handler_params(&group.body),
                Stmt::Export(export) => {
                    if let Stmt::Function(f) = &*export.stmt {
                        let params = f.params.iter().map(|p| p.name.clone()).collect();
                        self.route_handler_params.insert(f.name.clone(), params);
                    }
                }
                _ => {}
            }
        }
    }

    fn visit_route(&mut self, route: &RouteDeclaration) {
        if !self.require_server_context("route", &route.loc) {
            return;
        }
        self.analyze_expr(&route.handler);

        let path_params: Vec<String> = PATH_PARAM
            .captures_iter(&route.path)
            .map(|c| c[1].to_string())
            .collect();

        if let Expr::Ident(handler) = &route.handler {
            if let Some(params) = self.route_handler_params.get(&handler.name).cloned() {
                let named: Vec<&String> = params.iter().filter(|p| p.as_str() != "req").collect();
                for path_param in &path_params {
                    if !named.iter().any(|p| *p == path_param) {
                        self.warn(
                            Diagnostic::warning(format!(
                                "route path parameter ':{}' is not a parameter of handler '{}'",
                                path_param, handler.name
                            ))
                            .with_code("W_ROUTE_PARAM")
                            .at_loc(&route.loc),
                        );
                    }
                }
                if route.method.eq_ignore_ascii_case("get") {
                    for param in named {
                        if !path_params.contains(param) {
                            self.warn(
                                Diagnostic::warning(format!(
                                    "parameter '{}' of handler '{}' will be extracted from the query string",
                                    param, handler.name
                                ))
                                .with_code("W_QUERY_PARAM")
                                .at_loc(&route.loc),
                            );
                        }
                    }
                }
            }
        }

        if route.body_type.is_some()
            && !matches!(route.method.to_ascii_uppercase().as_str(), "POST" | "PUT" | "PATCH")
        {
            self.warn(
                Diagnostic::warning(format!(
                    "{} routes have no request body; the body annotation is ignored",
                    route.method
                ))
                .with_code("W_BODY_TYPE")
                .at_loc(&route.loc),
            );
        }
    }

    fn visit_route_group(&mut self, group: &RouteGroup) {
        if !self.require_server_context("group", &group.loc) {
            return;
        }
        self.push_scope(ScopeContext::Block, &group.loc);
        self.analyze_stmts(&group.body);
        self.pop_scope();
    }

    fn visit_middleware(&mut self, middleware: &MiddlewareDeclaration) {
        if !self.require_server_context("middleware", &middleware.loc) {
            return;
        }
        self.analyze_expr(&middleware.handler);
    }

    fn visit_websocket(&mut self, ws: &WebSocketDeclaration) {
        if !self.require_server_context("ws", &ws.loc) {
            return;
        }
        self.push_scope(ScopeContext::Block, &ws.loc);
        self.analyze_stmts(&ws.body);
        self.pop_scope();
    }

    fn visit_db(&mut self, db: &DbDeclaration) {
        if !self.require_server_context("db", &db.loc) {
            return;
        }
        if let Some(name) = &db.name {
            self.define(
                Symbol::new(name.clone(), SymbolKind::Variable, Type::Any).at(db.loc.clone()),
            );
        }
        if let Some(config) = &db.config {
            self.analyze_expr(config);
        }
    }

    fn visit_server_config(&mut self, config: &ServerConfigDeclaration) {
        if !self.require_server_context(config.kind.keyword(), &config.loc) {
            return;
        }
        for arg in &config.args {
            self.analyze_expr(arg);
        }
    }
}
