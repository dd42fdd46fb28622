// Semantic analysis: builds the scope tree, enforces context rules,
// resolves identifiers, and applies the gradual type checks. Errors are
// accumulated and surfaced as one batch at the end of the traversal so a
// single run reports every violation; warnings ride along with the result.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::ast::*;
use crate::diagnostics::{Diagnostic, DiagnosticBag};
use crate::errors::CompileError;
use crate::registry;
use crate::scope::{ScopeArena, ScopeContext, ScopeId, Symbol, SymbolKind};
use crate::types::Type;

#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyzerOptions {
    /// Escalate type mismatches, narrowing, and unresolved identifiers
    /// from warnings to errors.
    pub strict: bool,
}

/// The successful result of analysis.
#[derive(Debug)]
pub struct Analysis {
    pub warnings: Vec<Diagnostic>,
    pub scopes: ScopeArena,
    pub root: ScopeId,
    /// `env("NAME")` references collected by the security pre-pass.
    pub required_secrets: BTreeSet<String>,
}

/// Analyze a parsed program.
pub fn analyze(program: &Program, filename: &str) -> Result<Analysis, CompileError> {
    Analyzer::new(filename).run(program)
}

pub fn analyze_with_options(
    program: &Program,
    filename: &str,
    options: AnalyzerOptions,
) -> Result<Analysis, CompileError> {
    Analyzer::with_options(filename, options).run(program)
}

pub struct Analyzer {
    file: String,
    options: AnalyzerOptions,
    pub(crate) scopes: ScopeArena,
    pub(crate) current: ScopeId,
    root: ScopeId,
    bag: DiagnosticBag,
    type_defs: HashMap<String, Type>,

    // Plugin pre-pass state.
    pub(crate) server_functions: HashMap<String, Vec<String>>,
    pub(crate) current_server: Option<String>,
    pub(crate) route_handler_params: HashMap<String, Vec<String>>,
    pub(crate) required_secrets: BTreeSet<String>,
    pub(crate) edge_producers: HashSet<String>,
    pub(crate) edge_consumers: Vec<(String, Loc)>,
}

impl Analyzer {
    pub fn new(filename: &str) -> Self {
        Self::with_options(filename, AnalyzerOptions::default())
    }

    pub fn with_options(filename: &str, options: AnalyzerOptions) -> Self {
        let mut scopes = ScopeArena::new();
        let root = scopes.new_scope(None, ScopeContext::Module);
        Self {
            file: filename.to_string(),
            options,
            scopes,
            current: root,
            root,
            bag: DiagnosticBag::new(),
            type_defs: HashMap::new(),
            server_functions: HashMap::new(),
            current_server: None,
            route_handler_params: HashMap::new(),
            required_secrets: BTreeSet::new(),
            edge_producers: HashSet::new(),
            edge_consumers: Vec::new(),
        }
    }

    pub fn run(mut self, program: &Program) -> Result<Analysis, CompileError> {
        self.install_builtins();
        self.register_type_declarations(program);

        for plugin in registry::plugins() {
            if let Some(pre_pass) = plugin.pre_pass {
                pre_pass(&mut self, program);
            }
        }

        for stmt in &program.body {
            self.visit_stmt(stmt);
        }

        for plugin in registry::plugins() {
            if let Some(validate) = plugin.cross_block_validate {
                validate(&mut self, program);
            }
        }

        self.scopes.sort_children();

        if self.bag.has_errors() {
            return Err(CompileError::Semantic(self.bag.errors));
        }
        Ok(Analysis {
            warnings: self.bag.warnings,
            scopes: self.scopes,
            root: self.root,
            required_secrets: self.required_secrets,
        })
    }

    // --- diagnostics and scope plumbing ---

    pub(crate) fn error(&mut self, diagnostic: Diagnostic) {
        self.bag.push(diagnostic);
    }

    pub(crate) fn warn(&mut self, diagnostic: Diagnostic) {
        self.bag.push(diagnostic);
    }

    pub(crate) fn context(&self) -> ScopeContext {
        self.scopes.context_of(self.current)
    }

    pub(crate) fn push_scope(&mut self, context: ScopeContext, loc: &Loc) -> ScopeId {
        let id = self.scopes.new_scope(Some(self.current), context);
        self.scopes.set_span(id, loc.clone(), None);
        self.current = id;
        id
    }

    pub(crate) fn pop_scope(&mut self) {
        if let Some(parent) = self.scopes.get(self.current).parent {
            self.current = parent;
        }
    }

    pub(crate) fn define(&mut self, symbol: Symbol) {
        let name = symbol.name.clone();
        let loc = symbol.loc.clone();
        if self.scopes.define(self.current, symbol).is_err() {
            let mut diagnostic =
                Diagnostic::error(format!("name '{}' is already defined in this scope", name));
            diagnostic = match loc {
                Some(loc) => diagnostic.at_loc(&loc),
                None => diagnostic.at(self.file.clone(), 0, 0),
            };
            self.error(diagnostic);
        }
    }

    /// Define without reporting collisions; used for injected names such as
    /// peer servers and variant constructors that may shadow builtins.
    pub(crate) fn define_quiet(&mut self, symbol: Symbol) {
        let _ = self.scopes.define(self.current, symbol);
    }

    pub(crate) fn require_server_context(&mut self, what: &str, loc: &Loc) -> bool {
        if self.context() == ScopeContext::Server {
            return true;
        }
        self.error(
            Diagnostic::error(format!("'{}' requires a server context", what))
                .with_code("E303")
                .with_hint("move this inside a server { } block")
                .at_loc(loc),
        );
        false
    }

    pub(crate) fn require_browser_context(&mut self, what: &str, loc: &Loc) -> bool {
        if self.context() == ScopeContext::Browser {
            return true;
        }
        self.error(
            Diagnostic::error(format!("'{}' requires a browser context", what))
                .with_code("E302")
                .with_hint("move this inside a browser { } block")
                .at_loc(loc),
        );
        false
    }

    // --- builtins ---

    fn install_builtins(&mut self) {
        let type_names = [
            ("Int", Type::Int),
            ("Float", Type::Float),
            ("String", Type::String),
            ("Bool", Type::Bool),
            ("Nil", Type::Nil),
            ("Any", Type::Any),
            ("Result", Type::generic("Result", vec![])),
            ("Option", Type::generic("Option", vec![])),
        ];
        for (name, ty) in type_names {
            self.define_quiet(Symbol::new(name, SymbolKind::Type, ty));
        }

        let functions = [
            "print", "len", "range", "map", "filter", "sum", "sorted", "reversed", "enumerate",
            "zip", "min", "max", "type_of", "fetch", "db", "env",
        ];
        for name in functions {
            self.define_quiet(Symbol::new(name, SymbolKind::Builtin, Type::Any));
        }

        let result = Type::generic("Result", vec![]);
        let option = Type::generic("Option", vec![]);
        self.define_quiet(Symbol::new(
            "Ok",
            SymbolKind::Builtin,
            Type::function(vec![Type::Any], result.clone()),
        ));
        self.define_quiet(Symbol::new(
            "Err",
            SymbolKind::Builtin,
            Type::function(vec![Type::Any], result),
        ));
        self.define_quiet(Symbol::new(
            "Some",
            SymbolKind::Builtin,
            Type::function(vec![Type::Any], option.clone()),
        ));
        self.define_quiet(Symbol::new("None", SymbolKind::Builtin, option));
    }

    /// Pre-register type declarations (including those nested in dialect
    /// blocks) so annotations may reference them before their declaration.
    fn register_type_declarations(&mut self, program: &Program) {
        let mut declarations = Vec::new();
        collect_type_decls(&program.body, &mut declarations);
        for decl in declarations {
            let ty = self.build_declared_type(decl);
            self.type_defs.insert(decl.name.clone(), ty);
        }
    }

    fn build_declared_type(&mut self, decl: &TypeDeclaration) -> Type {
        match &decl.kind {
            TypeDeclKind::Record(fields) => {
                let mut map = HashMap::new();
                for field in fields {
                    map.insert(field.name.clone(), self.type_from_annotation(&field.ty));
                }
                Type::Record { name: decl.name.clone(), fields: map }
            }
            TypeDeclKind::Union(variants) => {
                let mut map = HashMap::new();
                for variant in variants {
                    let mut fields = HashMap::new();
                    for field in &variant.fields {
                        fields.insert(field.name.clone(), self.type_from_annotation(&field.ty));
                    }
                    map.insert(variant.name.clone(), fields);
                }
                Type::Adt {
                    name: decl.name.clone(),
                    type_params: decl.type_params.clone(),
                    variants: map,
                }
            }
        }
    }

    // --- statement traversal ---

    pub(crate) fn analyze_stmts(&mut self, body: &[Stmt]) {
        for stmt in body {
            self.visit_stmt(stmt);
        }
    }

    pub(crate) fn visit_stmt(&mut self, stmt: &Stmt) {
        if let Some(plugin) = registry::visitor_for(stmt.kind_name()) {
            (plugin.visit)(self, stmt);
            return;
        }
        match stmt {
            Stmt::Assignment(assignment) => self.visit_assignment(assignment),
            Stmt::VarDecl(decl) => self.visit_var_decl(decl),
            Stmt::LetDestructure(decl) => self.visit_let_destructure(decl),
            Stmt::Function(decl) => self.visit_function(decl),
            Stmt::TypeDecl(decl) => self.visit_type_decl(decl),
            Stmt::If(stmt) => self.visit_if(stmt),
            Stmt::For(stmt) => self.visit_for(stmt),
            Stmt::While(stmt) => self.visit_while(stmt),
            Stmt::TryCatch(stmt) => self.visit_try(stmt),
            Stmt::Return(stmt) => {
                if let Some(value) = &stmt.value {
                    self.analyze_expr(value);
                }
            }
            Stmt::Break(_) | Stmt::Continue(_) => {}
            Stmt::Block(block) => {
                self.push_scope(ScopeContext::Block, &block.loc);
                self.analyze_stmts(&block.body);
                self.pop_scope();
            }
            Stmt::Compound(compound) => self.visit_compound(compound),
            Stmt::Import(import) => self.visit_import(import),
            Stmt::Export(export) => self.visit_stmt(&export.stmt),
            Stmt::Expr(stmt) => self.analyze_expr(&stmt.expr),
            // Plugin-owned kinds are handled above; reaching here means the
            // registry lost an AST kind, which is a front-end bug.
            other => unreachable!("no visitor for AST kind {}", other.kind_name()),
        }
    }

    fn visit_assignment(&mut self, assignment: &Assignment) {
        self.analyze_expr(&assignment.value);
        match &assignment.target {
            Expr::Ident(ident) => {
                let existing = self
                    .scopes
                    .lookup(self.current, &ident.name)
                    .map(|(_, symbol)| (symbol.kind, symbol.mutable, symbol.declared_type.clone()));
                match existing {
                    Some((kind, _, _)) if kind == SymbolKind::Builtin || kind == SymbolKind::Type => {
                        // A fresh binding that shadows a builtin.
                        let ty = self.infer_expr(&assignment.value);
                        self.define(
                            Symbol::new(ident.name.clone(), SymbolKind::Variable, ty)
                                .at(ident.loc.clone()),
                        );
                    }
                    Some((_, true, declared)) => {
                        if let Some(declared) = declared {
                            let inferred = self.infer_expr(&assignment.value);
                            self.check_assignable(&inferred, &declared, &ident.name, &assignment.loc);
                        }
                    }
                    Some((_, false, _)) => {
                        self.error(
                            Diagnostic::error(format!(
                                "Cannot reassign immutable variable '{}'. Use 'var' for mutable variables.",
                                ident.name
                            ))
                            .at_loc(&assignment.loc),
                        );
                    }
                    None => {
                        // A fresh name is an immutable binding in the
                        // current scope.
                        let ty = self.infer_expr(&assignment.value);
                        self.define(
                            Symbol::new(ident.name.clone(), SymbolKind::Variable, ty)
                                .at(ident.loc.clone()),
                        );
                    }
                }
            }
            Expr::Member(_) | Expr::Index(_) | Expr::OptionalChain(_) => {
                self.analyze_expr(&assignment.target);
            }
            other => {
                self.error(Diagnostic::error("invalid assignment target").at_loc(other.loc()));
            }
        }
    }

    fn visit_var_decl(&mut self, decl: &VarDeclaration) {
        self.analyze_expr(&decl.value);
        let declared = decl.ty.as_ref().map(|ann| self.type_from_annotation(ann));
        let inferred = self.infer_expr(&decl.value);
        if let Some(declared) = &declared {
            self.check_assignable(&inferred, declared, &decl.name, &decl.loc);
        }
        let ty = declared.clone().unwrap_or(inferred);
        let mut symbol = Symbol::new(decl.name.clone(), SymbolKind::Variable, ty)
            .mutable()
            .at(decl.loc.clone());
        if let Some(declared) = declared {
            symbol = symbol.with_declared_type(declared);
        }
        self.define(symbol);
    }

    fn visit_let_destructure(&mut self, decl: &LetDestructure) {
        self.analyze_expr(&decl.value);
        for (name, loc) in decl.pattern.bound_names() {
            self.define(Symbol::new(name, SymbolKind::Variable, Type::Unknown).at(loc));
        }
    }

    fn visit_function(&mut self, decl: &FunctionDeclaration) {
        let params: Vec<Type> = decl
            .params
            .iter()
            .map(|p| {
                p.ty.as_ref()
                    .map(|ann| self.type_from_annotation(ann))
                    .unwrap_or(Type::Unknown)
            })
            .collect();
        let ret = decl
            .return_type
            .as_ref()
            .map(|ann| self.type_from_annotation(ann))
            .unwrap_or(Type::Unknown);
        self.define(
            Symbol::new(decl.name.clone(), SymbolKind::Function, Type::Function {
                params,
                ret: Box::new(ret),
            })
            .at(decl.loc.clone()),
        );

        self.push_scope(ScopeContext::Function, &decl.loc);
        self.analyze_params(&decl.params);
        self.analyze_stmts(&decl.body);
        self.pop_scope();
    }

    /// Defines parameters in the current (function) scope. Default-value
    /// expressions are analyzed inside the function scope as well.
    pub(crate) fn analyze_params(&mut self, params: &[Param]) {
        for param in params {
            if let Some(default) = &param.default {
                self.analyze_expr(default);
            }
            let ty = param
                .ty
                .as_ref()
                .map(|ann| self.type_from_annotation(ann))
                .unwrap_or(Type::Unknown);
            self.define(
                Symbol::new(param.name.clone(), SymbolKind::Parameter, ty).at(param.loc.clone()),
            );
        }
    }

    fn visit_type_decl(&mut self, decl: &TypeDeclaration) {
        let ty = self.build_declared_type(decl);
        self.type_defs.insert(decl.name.clone(), ty.clone());
        self.define(
            Symbol::new(decl.name.clone(), SymbolKind::Type, ty.clone()).at(decl.loc.clone()),
        );

        // Variants of a tagged union are implicit constructors.
        if let TypeDeclKind::Union(variants) = &decl.kind {
            for variant in variants {
                let params: Vec<Type> = variant
                    .fields
                    .iter()
                    .map(|f| self.type_from_annotation(&f.ty))
                    .collect();
                let ctor = if params.is_empty() {
                    ty.clone()
                } else {
                    Type::function(params, ty.clone())
                };
                self.define_quiet(
                    Symbol::new(variant.name.clone(), SymbolKind::Function, ctor)
                        .at(variant.loc.clone()),
                );
            }
        }
    }

    fn visit_if(&mut self, stmt: &IfStmt) {
        for (condition, body) in &stmt.branches {
            self.analyze_expr(condition);
            self.push_scope(ScopeContext::Block, &stmt.loc);
            self.analyze_stmts(body);
            self.pop_scope();
        }
        if let Some(body) = &stmt.else_body {
            self.push_scope(ScopeContext::Block, &stmt.loc);
            self.analyze_stmts(body);
            self.pop_scope();
        }
    }

    fn visit_for(&mut self, stmt: &ForStmt) {
        self.analyze_expr(&stmt.iterable);
        self.push_scope(ScopeContext::Block, &stmt.loc);
        for name in &stmt.binding.names {
            self.define(
                Symbol::new(name.clone(), SymbolKind::Variable, Type::Unknown)
                    .at(stmt.binding.loc.clone()),
            );
        }
        self.analyze_stmts(&stmt.body);
        self.pop_scope();
    }

    fn visit_while(&mut self, stmt: &WhileStmt) {
        self.analyze_expr(&stmt.condition);
        self.push_scope(ScopeContext::Block, &stmt.loc);
        self.analyze_stmts(&stmt.body);
        self.pop_scope();
    }

    fn visit_try(&mut self, stmt: &TryCatchStmt) {
        self.push_scope(ScopeContext::Block, &stmt.loc);
        self.analyze_stmts(&stmt.body);
        self.pop_scope();

        self.push_scope(ScopeContext::Block, &stmt.loc);
        if let Some(name) = &stmt.catch_name {
            self.define(Symbol::new(name.clone(), SymbolKind::Variable, Type::Unknown));
        }
        self.analyze_stmts(&stmt.catch_body);
        self.pop_scope();

        if let Some(finally) = &stmt.finally_body {
            self.push_scope(ScopeContext::Block, &stmt.loc);
            self.analyze_stmts(finally);
            self.pop_scope();
        }
    }

    fn visit_compound(&mut self, compound: &CompoundAssignment) {
        self.analyze_expr(&compound.value);
        match &compound.target {
            Expr::Ident(ident) => {
                let resolved = self
                    .scopes
                    .lookup(self.current, &ident.name)
                    .map(|(_, symbol)| (symbol.mutable, symbol.kind));
                match resolved {
                    None => {
                        self.error(
                            Diagnostic::error(format!(
                                "Cannot assign to undefined variable '{}'",
                                ident.name
                            ))
                            .at_loc(&compound.loc),
                        );
                    }
                    Some((mutable, kind)) => {
                        if !(mutable || kind == SymbolKind::Builtin) {
                            self.error(
                                Diagnostic::error(format!(
                                    "Cannot reassign immutable variable '{}'. Use 'var' for mutable variables.",
                                    ident.name
                                ))
                                .at_loc(&compound.loc),
                            );
                        } else {
                            // A compound assignment also reads the target.
                            self.scopes.mark_used(self.current, &ident.name);
                        }
                    }
                }
            }
            Expr::Member(_) | Expr::Index(_) => self.analyze_expr(&compound.target),
            other => {
                self.error(Diagnostic::error("invalid assignment target").at_loc(other.loc()));
            }
        }
    }

    fn visit_import(&mut self, import: &ImportDeclaration) {
        for name in &import.names {
            let bound = name.alias.clone().unwrap_or_else(|| name.name.clone());
            self.define(
                Symbol::new(bound, SymbolKind::Variable, Type::Unknown).at(name.loc.clone()),
            );
        }
    }

    // --- expressions ---

    pub(crate) fn analyze_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Nil(_)
            | Expr::Bool(_)
            | Expr::Int(_)
            | Expr::Float(_)
            | Expr::Str(_)
            | Expr::Regex(_) => {}
            Expr::Ident(ident) => self.resolve_ident(ident),
            Expr::Template(template) => {
                for part in &template.parts {
                    if let TemplatePiece::Expr(e) = part {
                        self.analyze_expr(e);
                    }
                }
            }
            Expr::Binary(n) => {
                self.analyze_expr(&n.left);
                self.analyze_expr(&n.right);
            }
            Expr::Unary(n) => self.analyze_expr(&n.operand),
            Expr::Logical(n) => {
                self.analyze_expr(&n.left);
                self.analyze_expr(&n.right);
            }
            Expr::Chained(n) => {
                for operand in &n.operands {
                    self.analyze_expr(operand);
                }
            }
            Expr::Membership(n) => {
                self.analyze_expr(&n.item);
                self.analyze_expr(&n.collection);
            }
            Expr::Call(call) => self.analyze_call(call),
            Expr::Member(n) => self.analyze_expr(&n.object),
            Expr::Index(n) => {
                self.analyze_expr(&n.object);
                self.analyze_expr(&n.index);
            }
            Expr::OptionalChain(n) => self.analyze_expr(&n.object),
            Expr::Pipe(n) => {
                self.analyze_expr(&n.value);
                self.analyze_expr(&n.call);
            }
            Expr::Lambda(lambda) => {
                self.push_scope(ScopeContext::Function, &lambda.loc);
                self.analyze_params(&lambda.params);
                match &lambda.body {
                    LambdaBody::Expr(e) => self.analyze_expr(e),
                    LambdaBody::Block(body) => self.analyze_stmts(body),
                }
                self.pop_scope();
            }
            Expr::Match(m) => {
                self.analyze_expr(&m.subject);
                for arm in &m.arms {
                    self.push_scope(ScopeContext::Block, &arm.loc);
                    self.bind_pattern(&arm.pattern);
                    if let Some(guard) = &arm.guard {
                        self.analyze_expr(guard);
                    }
                    match &arm.body {
                        MatchBody::Expr(e) => self.analyze_expr(e),
                        MatchBody::Block(body) => self.analyze_stmts(body),
                    }
                    self.pop_scope();
                }
            }
            Expr::Array(n) => {
                for element in &n.elements {
                    self.analyze_expr(element);
                }
            }
            Expr::Object(n) => {
                for entry in &n.entries {
                    match entry {
                        ObjectEntry::Property { value, .. } => self.analyze_expr(value),
                        ObjectEntry::Shorthand { name, loc } => {
                            let ident = Identifier { name: name.clone(), loc: loc.clone() };
                            self.resolve_ident(&ident);
                        }
                        ObjectEntry::Spread { value, .. } => self.analyze_expr(value),
                    }
                }
            }
            Expr::ListComp(comp) => {
                self.analyze_expr(&comp.iterable);
                self.push_scope(ScopeContext::Block, &comp.loc);
                for name in &comp.binding.names {
                    self.define(
                        Symbol::new(name.clone(), SymbolKind::Variable, Type::Unknown)
                            .at(comp.binding.loc.clone()),
                    );
                }
                if let Some(condition) = &comp.condition {
                    self.analyze_expr(condition);
                }
                self.analyze_expr(&comp.element);
                self.pop_scope();
            }
            Expr::DictComp(comp) => {
                self.analyze_expr(&comp.iterable);
                self.push_scope(ScopeContext::Block, &comp.loc);
                for name in &comp.binding.names {
                    self.define(
                        Symbol::new(name.clone(), SymbolKind::Variable, Type::Unknown)
                            .at(comp.binding.loc.clone()),
                    );
                }
                if let Some(condition) = &comp.condition {
                    self.analyze_expr(condition);
                }
                self.analyze_expr(&comp.key);
                self.analyze_expr(&comp.value);
                self.pop_scope();
            }
            Expr::Range(n) => {
                self.analyze_expr(&n.start);
                self.analyze_expr(&n.end);
            }
            Expr::Slice(n) => {
                self.analyze_expr(&n.object);
                for part in [&n.start, &n.stop, &n.step].into_iter().flatten() {
                    self.analyze_expr(part);
                }
            }
            Expr::Spread(n) => self.analyze_expr(&n.value),
            Expr::Propagate(n) => self.analyze_expr(&n.value),
            Expr::IfExpr(n) => {
                for (condition, body) in &n.branches {
                    self.analyze_expr(condition);
                    self.push_scope(ScopeContext::Block, &n.loc);
                    self.analyze_stmts(body);
                    self.pop_scope();
                }
                if let Some(body) = &n.else_body {
                    self.push_scope(ScopeContext::Block, &n.loc);
                    self.analyze_stmts(body);
                    self.pop_scope();
                }
            }
            Expr::Jsx(element) => self.analyze_jsx_element(element),
            Expr::JsxFragment(fragment) => {
                for child in &fragment.children {
                    self.analyze_jsx_child(child);
                }
            }
        }
    }

    /// Unresolved identifiers are not an error by default (ambient names
    /// emitted by codegen stay out of the symbol table); strict mode
    /// escalates them.
    fn resolve_ident(&mut self, ident: &Identifier) {
        if self.scopes.lookup(self.current, &ident.name).is_some() {
            self.scopes.mark_used(self.current, &ident.name);
        } else if self.options.strict {
            self.error(
                Diagnostic::error(format!("unknown identifier '{}'", ident.name))
                    .with_code("E401")
                    .at_loc(&ident.loc),
            );
        }
    }

    fn analyze_call(&mut self, call: &CallExpression) {
        self.check_rpc(call);

        if let Expr::Ident(callee) = &call.callee {
            if callee.name == "env" && self.context() != ScopeContext::Server {
                self.error(
                    Diagnostic::error("'env' requires a server context")
                        .with_code("E303")
                        .with_hint("move this inside a server { } block")
                        .at_loc(&call.loc),
                );
            }
        }

        self.analyze_expr(&call.callee);
        for arg in &call.args {
            match arg {
                CallArg::Positional(e) | CallArg::Spread(e) => self.analyze_expr(e),
                CallArg::Named { value, .. } => self.analyze_expr(value),
            }
        }
    }

    /// Inter-server RPC: inside server S, `T.fn(...)` must name a function
    /// that exists on server T; `S.fn(...)` is a self-call warning. Calls
    /// on unknown targets pass through untouched.
    fn check_rpc(&mut self, call: &CallExpression) {
        let Some(current) = self.current_server.clone() else {
            return;
        };
        let Expr::Member(member) = &call.callee else {
            return;
        };
        let Expr::Ident(target) = &member.object else {
            return;
        };

        if target.name == current {
            self.warn(
                Diagnostic::warning(format!(
                    "server '{}' calling itself via RPC; call '{}' directly",
                    current, member.property
                ))
                .with_code("W_SELF_RPC")
                .at_loc(&call.loc),
            );
            return;
        }

        let missing = self
            .server_functions
            .get(&target.name)
            .map(|functions| !functions.contains(&member.property));
        if missing == Some(true) {
            self.error(
                Diagnostic::error(format!(
                    "No function '{}' in server block \"{}\"",
                    member.property, target.name
                ))
                .at_loc(&call.loc),
            );
        }
    }

    fn analyze_jsx_element(&mut self, element: &JsxElement) {
        // Capitalized tags refer to components; resolving marks them used.
        if element.name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false) {
            self.scopes.mark_used(self.current, &element.name);
        }
        for attribute in &element.attributes {
            match attribute {
                JsxAttribute::Static { value, .. } | JsxAttribute::Directive { value, .. } => {
                    if let Some(JsxAttrValue::Expr(e)) = value {
                        self.analyze_expr(e);
                    }
                }
                JsxAttribute::Spread { value, .. } => self.analyze_expr(value),
            }
        }
        for child in &element.children {
            self.analyze_jsx_child(child);
        }
    }

    fn analyze_jsx_child(&mut self, child: &JsxChild) {
        match child {
            JsxChild::Element(element) => self.analyze_jsx_element(element),
            JsxChild::Fragment(fragment) => {
                for c in &fragment.children {
                    self.analyze_jsx_child(c);
                }
            }
            JsxChild::Expr(e) => self.analyze_expr(&e.expr),
            JsxChild::Text { .. } => {}
            JsxChild::For(jsx_for) => {
                self.analyze_expr(&jsx_for.iterable);
                self.push_scope(ScopeContext::Block, &jsx_for.loc);
                for name in &jsx_for.binding.names {
                    self.define(
                        Symbol::new(name.clone(), SymbolKind::Variable, Type::Unknown)
                            .at(jsx_for.binding.loc.clone()),
                    );
                }
                for c in &jsx_for.body {
                    self.analyze_jsx_child(c);
                }
                self.pop_scope();
            }
            JsxChild::If(jsx_if) => {
                for (condition, body) in &jsx_if.branches {
                    self.analyze_expr(condition);
                    for c in body {
                        self.analyze_jsx_child(c);
                    }
                }
                if let Some(body) = &jsx_if.else_body {
                    for c in body {
                        self.analyze_jsx_child(c);
                    }
                }
            }
            JsxChild::Match(jsx_match) => {
                self.analyze_expr(&jsx_match.subject);
                for arm in &jsx_match.arms {
                    self.push_scope(ScopeContext::Block, &arm.loc);
                    self.bind_pattern(&arm.pattern);
                    if let Some(guard) = &arm.guard {
                        self.analyze_expr(guard);
                    }
                    for c in &arm.body {
                        self.analyze_jsx_child(c);
                    }
                    self.pop_scope();
                }
            }
        }
    }

    pub(crate) fn bind_pattern(&mut self, pattern: &Pattern) {
        for (name, loc) in pattern.bound_names() {
            self.define(Symbol::new(name, SymbolKind::Variable, Type::Unknown).at(loc));
        }
    }

    // --- types ---

    pub(crate) fn type_from_annotation(&mut self, annotation: &TypeAnnotation) -> Type {
        match annotation {
            TypeAnnotation::Named { name, args, .. } => {
                let args: Vec<Type> = args.iter().map(|a| self.type_from_annotation(a)).collect();
                match name.as_str() {
                    "Int" => Type::Int,
                    "Float" => Type::Float,
                    "String" => Type::String,
                    "Bool" => Type::Bool,
                    "Nil" => Type::Nil,
                    "Any" => Type::Any,
                    "Unknown" => Type::Unknown,
                    _ => {
                        if args.is_empty() {
                            if let Some(ty) = self.type_defs.get(name) {
                                return ty.clone();
                            }
                            // A single uppercase letter reads as a type
                            // variable in annotations.
                            if name.len() == 1
                                && name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
                            {
                                return Type::TypeVar(name.clone());
                            }
                        }
                        Type::Generic { base: name.clone(), args }
                    }
                }
            }
            TypeAnnotation::Array { element, .. } => {
                Type::array(self.type_from_annotation(element))
            }
            TypeAnnotation::Tuple { elements, .. } => {
                Type::Tuple(elements.iter().map(|e| self.type_from_annotation(e)).collect())
            }
            TypeAnnotation::Function { params, ret, .. } => Type::Function {
                params: params.iter().map(|p| self.type_from_annotation(p)).collect(),
                ret: Box::new(self.type_from_annotation(ret)),
            },
            TypeAnnotation::Nullable { inner, .. } => {
                Type::generic("Option", vec![self.type_from_annotation(inner)])
            }
        }
    }

    pub(crate) fn check_assignable(&mut self, from: &Type, to: &Type, name: &str, loc: &Loc) {
        if from.narrows_to(to) {
            let diagnostic = Diagnostic::warning(format!(
                "assigning Float to Int narrows '{}'",
                name
            ))
            .with_code("W_NARROWING")
            .at_loc(loc);
            if self.options.strict {
                self.error(Diagnostic {
                    severity: crate::diagnostics::Severity::Error,
                    ..diagnostic
                });
            } else {
                self.warn(diagnostic);
            }
            return;
        }
        if !from.assignable_to(to) {
            let diagnostic = Diagnostic::warning(format!(
                "type mismatch: cannot assign {} to '{}' of type {}",
                from, name, to
            ))
            .with_code("W_TYPE_MISMATCH")
            .at_loc(loc);
            if self.options.strict {
                self.error(Diagnostic {
                    severity: crate::diagnostics::Severity::Error,
                    ..diagnostic
                });
            } else {
                self.warn(diagnostic);
            }
        }
    }

    /// Lightweight type inference for literals and resolved names; anything
    /// the gradual checker cannot see through stays `Unknown`.
    pub(crate) fn infer_expr(&mut self, expr: &Expr) -> Type {
        match expr {
            Expr::Nil(_) => Type::Nil,
            Expr::Bool(_) => Type::Bool,
            Expr::Int(_) => Type::Int,
            Expr::Float(_) => Type::Float,
            Expr::Str(_) | Expr::Template(_) => Type::String,
            Expr::Regex(_) => Type::generic("Regex", vec![]),
            Expr::Ident(ident) => self
                .scopes
                .lookup(self.current, &ident.name)
                .map(|(_, symbol)| symbol.ty.clone())
                .unwrap_or(Type::Unknown),
            Expr::Binary(n) => {
                let left = self.infer_expr(&n.left);
                let right = self.infer_expr(&n.right);
                match n.op {
                    BinaryOp::Add if left == Type::String || right == Type::String => Type::String,
                    BinaryOp::Div => Type::Float,
                    _ => {
                        if left == Type::Float || right == Type::Float {
                            Type::Float
                        } else if left == Type::Int && right == Type::Int {
                            Type::Int
                        } else {
                            Type::Unknown
                        }
                    }
                }
            }
            Expr::Unary(n) => match n.op {
                UnaryOp::Not => Type::Bool,
                UnaryOp::Neg => self.infer_expr(&n.operand),
            },
            Expr::Logical(_) => Type::Unknown,
            Expr::Chained(_) | Expr::Membership(_) => Type::Bool,
            Expr::Call(call) => match &call.callee {
                Expr::Ident(callee) => match callee.name.as_str() {
                    "Ok" | "Err" => Type::generic("Result", vec![]),
                    "Some" => Type::generic("Option", vec![]),
                    _ => self
                        .scopes
                        .lookup(self.current, &callee.name)
                        .and_then(|(_, symbol)| match &symbol.ty {
                            Type::Function { ret, .. } => Some((**ret).clone()),
                            _ => None,
                        })
                        .unwrap_or(Type::Unknown),
                },
                _ => Type::Unknown,
            },
            Expr::Array(array) => {
                let mut element = None;
                for e in &array.elements {
                    let ty = self.infer_expr(e);
                    match &element {
                        None => element = Some(ty),
                        Some(existing) if *existing == ty => {}
                        Some(_) => return Type::array(Type::Any),
                    }
                }
                Type::array(element.unwrap_or(Type::Unknown))
            }
            Expr::Range(_) => Type::array(Type::Int),
            Expr::Lambda(lambda) => {
                let params = vec![Type::Unknown; lambda.params.len()];
                Type::function(params, Type::Unknown)
            }
            Expr::Pipe(_) => Type::Unknown,
            Expr::Jsx(_) | Expr::JsxFragment(_) => Type::generic("VNode", vec![]),
            _ => Type::Unknown,
        }
    }
}

fn collect_type_decls<'a>(body: &'a [Stmt], out: &mut Vec<&'a TypeDeclaration>) {
    for stmt in body {
        match stmt {
            Stmt::TypeDecl(decl) => out.push(decl),
            Stmt::Server(block) => collect_type_decls(&block.body, out),
            Stmt::Browser(block) => collect_type_decls(&block.body, out),
            Stmt::Shared(block) => collect_type_decls(&block.body, out),
            Stmt::Export(export) => collect_type_decls(std::slice::from_ref(&*export.stmt), out),
            _ => {}
        }
    }
}
