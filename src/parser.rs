use std::sync::Arc;

use crate::ast::*;
use crate::errors::CompileError;
use crate::registry;
use crate::token::{Token, TokenKind};

/// Recursive-descent parser over the lexer's token stream. Top-level block
/// dispatch is table-driven from the plugin registry; the dialect grammars
/// themselves live in `plugins/` as `impl Parser` extensions and reuse the
/// shared primitives defined here.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    file: Arc<str>,
}

/// Parse a token stream into a program.
pub fn parse(tokens: Vec<Token>, filename: &str) -> Result<Program, CompileError> {
    Parser::new(tokens, filename).parse_program()
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>, filename: &str) -> Self {
        if !matches!(tokens.last().map(|t| &t.kind), Some(TokenKind::Eof)) {
            let (line, column) = tokens
                .last()
                .map(|t| (t.line, t.column))
                .unwrap_or((1, 1));
            tokens.push(Token::new(TokenKind::Eof, line, column));
        }
        Self { tokens, pos: 0, file: Arc::from(filename) }
    }

    pub fn parse_program(mut self) -> Result<Program, CompileError> {
        let loc = self.loc();
        let mut body = Vec::new();
        loop {
            self.skip_newlines();
            if self.check(&TokenKind::Eof) {
                break;
            }
            if let Some(plugin) = registry::detect(&self) {
                body.push((plugin.parse)(&mut self)?);
                continue;
            }
            body.push(self.parse_stmt()?);
            self.expect_terminator()?;
        }
        Ok(Program { body, loc })
    }

    // --- token plumbing ---

    pub(crate) fn cur(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    pub(crate) fn kind(&self) -> &TokenKind {
        &self.cur().kind
    }

    pub(crate) fn peek_kind(&self, offset: usize) -> &TokenKind {
        let index = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[index].kind
    }

    /// Kind of the next token at `offset` counting only non-newline tokens.
    pub(crate) fn peek_significant(&self, offset: usize) -> &TokenKind {
        let mut remaining = offset;
        let mut index = self.pos;
        loop {
            index += 1;
            if index >= self.tokens.len() {
                return &self.tokens[self.tokens.len() - 1].kind;
            }
            if self.tokens[index].kind == TokenKind::Newline {
                continue;
            }
            remaining -= 1;
            if remaining == 0 {
                return &self.tokens[index].kind;
            }
        }
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.cur().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        self.kind() == kind
    }

    pub(crate) fn match_kind(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, kind: &TokenKind) -> Result<Token, CompileError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.err_expected(&kind.describe()))
        }
    }

    pub(crate) fn expect_ident(&mut self) -> Result<(String, Loc), CompileError> {
        let loc = self.loc();
        match self.kind().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok((name, loc))
            }
            _ => Err(self.err_expected("an identifier")),
        }
    }

    /// A member/attribute name: a plain identifier, or a keyword used where
    /// the grammar wants a name (`x.type`, `<label for=...>`).
    pub(crate) fn expect_name(&mut self) -> Result<(String, Loc), CompileError> {
        let loc = self.loc();
        let name = match self.kind() {
            TokenKind::Ident(name) => name.clone(),
            kind => match kind.keyword_name() {
                Some(word) => word.to_string(),
                None => return Err(self.err_expected("a name")),
            },
        };
        self.advance();
        Ok((name, loc))
    }

    pub(crate) fn loc(&self) -> Loc {
        let token = self.cur();
        Loc::new(self.file.clone(), token.line, token.column)
    }

    pub(crate) fn skip_newlines(&mut self) {
        while self.check(&TokenKind::Newline) {
            self.advance();
        }
    }

    pub(crate) fn err_expected(&self, what: &str) -> CompileError {
        let token = self.cur();
        CompileError::Parser {
            message: format!("expected {}, found {}", what, token.kind.describe()),
            file: self.file.to_string(),
            line: token.line,
            column: token.column,
        }
    }

    pub(crate) fn err_at(&self, message: impl Into<String>, loc: &Loc) -> CompileError {
        CompileError::Parser {
            message: message.into(),
            file: self.file.to_string(),
            line: loc.line,
            column: loc.column,
        }
    }

    /// Statement terminator: newline, semicolon, or a closing brace /
    /// end-of-file ahead.
    pub(crate) fn expect_terminator(&mut self) -> Result<(), CompileError> {
        if self.match_kind(&TokenKind::Newline) || self.match_kind(&TokenKind::Semicolon) {
            return Ok(());
        }
        if self.check(&TokenKind::RBrace) || self.check(&TokenKind::Eof) {
            return Ok(());
        }
        Err(self.err_expected("end of statement"))
    }

    /// Does a `{` (optionally preceded by one name) follow the current
    /// token? Used by identifier-strategy plugin detection.
    pub(crate) fn block_follows(&self, allow_name: bool) -> bool {
        match self.peek_significant(1) {
            TokenKind::LBrace => true,
            TokenKind::Ident(_) if allow_name => {
                matches!(self.peek_significant(2), TokenKind::LBrace)
            }
            _ => false,
        }
    }

    /// True when the identifier at the cursor is used as a contextual
    /// keyword rather than a plain expression (not followed by an operator
    /// that would make it one).
    pub(crate) fn contextual(&self, word: &str) -> bool {
        if !self.cur().is_ident(word) {
            return false;
        }
        !matches!(
            self.peek_kind(1),
            TokenKind::Assign
                | TokenKind::PlusAssign
                | TokenKind::MinusAssign
                | TokenKind::StarAssign
                | TokenKind::SlashAssign
                | TokenKind::PercentAssign
                | TokenKind::Dot
                | TokenKind::QuestionDot
                | TokenKind::LParen
                | TokenKind::LBracket
                | TokenKind::Newline
                | TokenKind::Eof
        )
    }

    // --- statements ---

    pub(crate) fn parse_stmt(&mut self) -> Result<Stmt, CompileError> {
        let docstring = self.collect_docstrings();

        match self.kind().clone() {
            TokenKind::Import => self.parse_import(),
            TokenKind::Export => self.parse_export(),
            TokenKind::Type => self.parse_type_decl(),
            TokenKind::Var => self.parse_var_decl(),
            TokenKind::Let => self.parse_let(),
            TokenKind::Fn => self.parse_function_decl(docstring),
            TokenKind::Return => self.parse_return(),
            TokenKind::Break => {
                let loc = self.loc();
                self.advance();
                Ok(Stmt::Break(loc))
            }
            TokenKind::Continue => {
                let loc = self.loc();
                self.advance();
                Ok(Stmt::Continue(loc))
            }
            TokenKind::If => self.parse_if_stmt(),
            TokenKind::For => self.parse_for_stmt(),
            TokenKind::While => self.parse_while_stmt(),
            TokenKind::Try => self.parse_try_stmt(),
            TokenKind::State => self.parse_state_decl(),
            TokenKind::Computed => self.parse_computed_decl(),
            TokenKind::Effect => self.parse_effect_decl(),
            TokenKind::Component => self.parse_component_decl(docstring),
            TokenKind::Store => self.parse_store_decl(),
            TokenKind::Form => self.parse_form_declaration(),
            TokenKind::StyleBlock(css) => {
                let loc = self.loc();
                self.advance();
                Ok(Stmt::Style(StyleDeclaration { css, loc }))
            }
            TokenKind::LBrace => {
                if self.object_literal_ahead() {
                    self.parse_expr_or_assignment()
                } else {
                    self.parse_block_stmt()
                }
            }
            _ => self.parse_expr_or_assignment(),
        }
    }

    fn collect_docstrings(&mut self) -> Option<String> {
        let mut lines: Vec<String> = Vec::new();
        while let TokenKind::Docstring(text) = self.kind().clone() {
            self.advance();
            self.skip_newlines();
            lines.push(text);
        }
        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }

    fn parse_import(&mut self) -> Result<Stmt, CompileError> {
        let loc = self.loc();
        self.expect(&TokenKind::Import)?;
        self.expect(&TokenKind::LBrace)?;
        let mut names = Vec::new();
        loop {
            self.skip_newlines();
            if self.check(&TokenKind::RBrace) {
                break;
            }
            let (name, name_loc) = self.expect_ident()?;
            let alias = if self.match_kind(&TokenKind::As) {
                Some(self.expect_ident()?.0)
            } else {
                None
            };
            names.push(ImportName { name, alias, loc: name_loc });
            if !self.match_kind(&TokenKind::Comma) {
                self.skip_newlines();
                break;
            }
        }
        self.expect(&TokenKind::RBrace)?;
        self.expect(&TokenKind::From)?;
        let source = self.expect_string()?;
        Ok(Stmt::Import(ImportDeclaration { names, source, loc }))
    }

    fn parse_export(&mut self) -> Result<Stmt, CompileError> {
        let loc = self.loc();
        self.expect(&TokenKind::Export)?;
        let stmt = self.parse_stmt()?;
        Ok(Stmt::Export(ExportDeclaration { stmt: Box::new(stmt), loc }))
    }

    pub(crate) fn expect_string(&mut self) -> Result<String, CompileError> {
        match self.kind().clone() {
            TokenKind::Str(value) => {
                self.advance();
                Ok(value)
            }
            _ => Err(self.err_expected("a string literal")),
        }
    }

    /// `type Name { field: T, ... }` (record) or
    /// `type Name { Variant, Variant(field: T), ... }` (tagged union).
    fn parse_type_decl(&mut self) -> Result<Stmt, CompileError> {
        let loc = self.loc();
        self.expect(&TokenKind::Type)?;
        let (name, _) = self.expect_ident()?;
        let mut type_params = Vec::new();
        if self.match_kind(&TokenKind::Less) {
            loop {
                type_params.push(self.expect_ident()?.0);
                if !self.match_kind(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::Greater)?;
        }
        self.expect(&TokenKind::LBrace)?;
        self.skip_newlines();

        // A colon after the first name means record fields; otherwise the
        // entries are union variants.
        let is_record = matches!(self.peek_kind(1), TokenKind::Colon);
        let kind = if is_record {
            let mut fields = Vec::new();
            loop {
                self.skip_newlines();
                if self.check(&TokenKind::RBrace) {
                    break;
                }
                let (field_name, field_loc) = self.expect_ident()?;
                self.expect(&TokenKind::Colon)?;
                let ty = self.parse_type_annotation()?;
                fields.push(RecordField { name: field_name, ty, loc: field_loc });
                if !self.match_kind(&TokenKind::Comma) {
                    self.skip_newlines();
                    if self.check(&TokenKind::RBrace) {
                        break;
                    }
                }
            }
            TypeDeclKind::Record(fields)
        } else {
            let mut variants = Vec::new();
            loop {
                self.skip_newlines();
                if self.check(&TokenKind::RBrace) {
                    break;
                }
                let (variant_name, variant_loc) = self.expect_ident()?;
                let mut fields = Vec::new();
                if self.match_kind(&TokenKind::LParen) {
                    loop {
                        if self.check(&TokenKind::RParen) {
                            break;
                        }
                        let (field_name, field_loc) = self.expect_ident()?;
                        self.expect(&TokenKind::Colon)?;
                        let ty = self.parse_type_annotation()?;
                        fields.push(RecordField { name: field_name, ty, loc: field_loc });
                        if !self.match_kind(&TokenKind::Comma) {
                            break;
                        }
                    }
                    self.expect(&TokenKind::RParen)?;
                }
                variants.push(VariantDef { name: variant_name, fields, loc: variant_loc });
                if !self.match_kind(&TokenKind::Comma) {
                    self.skip_newlines();
                    if self.check(&TokenKind::RBrace) {
                        break;
                    }
                }
            }
            TypeDeclKind::Union(variants)
        };

        self.expect(&TokenKind::RBrace)?;
        Ok(Stmt::TypeDecl(TypeDeclaration { name, type_params, kind, loc }))
    }

    fn parse_var_decl(&mut self) -> Result<Stmt, CompileError> {
        let loc = self.loc();
        self.expect(&TokenKind::Var)?;
        let (name, _) = self.expect_ident()?;
        let ty = if self.match_kind(&TokenKind::Colon) {
            Some(self.parse_type_annotation()?)
        } else {
            None
        };
        self.expect(&TokenKind::Assign)?;
        self.skip_newlines();
        let value = self.parse_expression()?;
        Ok(Stmt::VarDecl(VarDeclaration { name, ty, value, loc }))
    }

    /// `let {a, b} = obj`, `let [x, y] = arr`, or plain `let x = expr`.
    fn parse_let(&mut self) -> Result<Stmt, CompileError> {
        let loc = self.loc();
        self.expect(&TokenKind::Let)?;
        match self.kind().clone() {
            TokenKind::LBrace => {
                let pattern_loc = self.loc();
                self.advance();
                let mut fields = Vec::new();
                loop {
                    self.skip_newlines();
                    if self.check(&TokenKind::RBrace) {
                        break;
                    }
                    let (key, key_loc) = self.expect_ident()?;
                    let alias = if self.match_kind(&TokenKind::Colon) {
                        Some(self.expect_ident()?.0)
                    } else {
                        None
                    };
                    fields.push(ObjectDestructureField { key, alias, loc: key_loc });
                    if !self.match_kind(&TokenKind::Comma) {
                        break;
                    }
                }
                self.skip_newlines();
                self.expect(&TokenKind::RBrace)?;
                self.expect(&TokenKind::Assign)?;
                let value = self.parse_expression()?;
                Ok(Stmt::LetDestructure(LetDestructure {
                    pattern: DestructurePattern::Object { fields, loc: pattern_loc },
                    value,
                    loc,
                }))
            }
            TokenKind::LBracket => {
                let pattern_loc = self.loc();
                self.advance();
                let mut elements = Vec::new();
                loop {
                    if self.check(&TokenKind::RBracket) {
                        break;
                    }
                    if self.check(&TokenKind::Comma) {
                        elements.push(None);
                    } else {
                        let (name, _) = self.expect_ident()?;
                        elements.push(if name == "_" { None } else { Some(name) });
                    }
                    if !self.match_kind(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokenKind::RBracket)?;
                self.expect(&TokenKind::Assign)?;
                let value = self.parse_expression()?;
                Ok(Stmt::LetDestructure(LetDestructure {
                    pattern: DestructurePattern::Array { elements, loc: pattern_loc },
                    value,
                    loc,
                }))
            }
            TokenKind::Ident(_) => {
                let target_loc = self.loc();
                let (name, _) = self.expect_ident()?;
                self.expect(&TokenKind::Assign)?;
                let value = self.parse_expression()?;
                Ok(Stmt::Assignment(Assignment {
                    target: Expr::Ident(Identifier { name, loc: target_loc }),
                    value,
                    loc,
                }))
            }
            _ => Err(self.err_expected("a destructuring pattern")),
        }
    }

    pub(crate) fn parse_function_decl(
        &mut self,
        docstring: Option<String>,
    ) -> Result<Stmt, CompileError> {
        let loc = self.loc();
        self.expect(&TokenKind::Fn)?;
        let (name, _) = self.expect_ident()?;
        let params = self.parse_params()?;
        let return_type = if self.match_kind(&TokenKind::Arrow) {
            Some(self.parse_type_annotation()?)
        } else {
            None
        };
        let body = self.parse_brace_block()?;
        Ok(Stmt::Function(FunctionDeclaration {
            name,
            params,
            return_type,
            body,
            docstring,
            loc,
        }))
    }

    pub(crate) fn parse_params(&mut self) -> Result<Vec<Param>, CompileError> {
        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        loop {
            self.skip_newlines();
            if self.check(&TokenKind::RParen) {
                break;
            }
            let loc = self.loc();
            let (name, _) = self.expect_ident()?;
            let ty = if self.match_kind(&TokenKind::Colon) {
                Some(self.parse_type_annotation()?)
            } else {
                None
            };
            let default = if self.match_kind(&TokenKind::Assign) {
                Some(self.parse_expression()?)
            } else {
                None
            };
            params.push(Param { name, ty, default, loc });
            if !self.match_kind(&TokenKind::Comma) {
                self.skip_newlines();
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(params)
    }

    fn parse_return(&mut self) -> Result<Stmt, CompileError> {
        let loc = self.loc();
        self.expect(&TokenKind::Return)?;
        let value = if self.check(&TokenKind::Newline)
            || self.check(&TokenKind::RBrace)
            || self.check(&TokenKind::Semicolon)
            || self.check(&TokenKind::Eof)
        {
            None
        } else {
            Some(self.parse_expression()?)
        };
        Ok(Stmt::Return(ReturnStmt { value, loc }))
    }

    fn parse_if_stmt(&mut self) -> Result<Stmt, CompileError> {
        let loc = self.loc();
        let (branches, else_body) = self.parse_if_chain()?;
        Ok(Stmt::If(IfStmt { branches, else_body, loc }))
    }

    /// Shared by if-statements and if-expressions: `if c { } elif c { }
    /// else { }` with `else if` folded into the branch list.
    pub(crate) fn parse_if_chain(
        &mut self,
    ) -> Result<(Vec<(Expr, Vec<Stmt>)>, Option<Vec<Stmt>>), CompileError> {
        self.expect(&TokenKind::If)?;
        let mut branches = Vec::new();
        let condition = self.parse_expression()?;
        let body = self.parse_brace_block()?;
        branches.push((condition, body));

        let mut else_body = None;
        loop {
            // Peek past newlines so `}` and `elif` on separate lines chain.
            let save = self.pos;
            self.skip_newlines();
            if self.match_kind(&TokenKind::Elif) {
                let condition = self.parse_expression()?;
                let body = self.parse_brace_block()?;
                branches.push((condition, body));
                continue;
            }
            if self.match_kind(&TokenKind::Else) {
                if self.check(&TokenKind::If) {
                    self.advance();
                    let condition = self.parse_expression()?;
                    let body = self.parse_brace_block()?;
                    branches.push((condition, body));
                    continue;
                }
                else_body = Some(self.parse_brace_block()?);
                break;
            }
            self.pos = save;
            break;
        }
        Ok((branches, else_body))
    }

    fn parse_for_stmt(&mut self) -> Result<Stmt, CompileError> {
        let loc = self.loc();
        self.expect(&TokenKind::For)?;
        let binding = self.parse_for_binding()?;
        self.expect(&TokenKind::In)?;
        let iterable = self.parse_expression()?;
        let body = self.parse_brace_block()?;
        Ok(Stmt::For(ForStmt { binding, iterable, body, loc }))
    }

    pub(crate) fn parse_for_binding(&mut self) -> Result<ForBinding, CompileError> {
        let loc = self.loc();
        let mut names = vec![self.expect_ident()?.0];
        while self.match_kind(&TokenKind::Comma) {
            names.push(self.expect_ident()?.0);
        }
        Ok(ForBinding { names, loc })
    }

    fn parse_while_stmt(&mut self) -> Result<Stmt, CompileError> {
        let loc = self.loc();
        self.expect(&TokenKind::While)?;
        let condition = self.parse_expression()?;
        let body = self.parse_brace_block()?;
        Ok(Stmt::While(WhileStmt { condition, body, loc }))
    }

    fn parse_try_stmt(&mut self) -> Result<Stmt, CompileError> {
        let loc = self.loc();
        self.expect(&TokenKind::Try)?;
        let body = self.parse_brace_block()?;
        self.skip_newlines();
        self.expect(&TokenKind::Catch)?;
        let catch_name = match self.kind() {
            TokenKind::Ident(_) => Some(self.expect_ident()?.0),
            _ => None,
        };
        let catch_body = self.parse_brace_block()?;
        let save = self.pos;
        self.skip_newlines();
        let finally_body = if self.match_kind(&TokenKind::Finally) {
            Some(self.parse_brace_block()?)
        } else {
            self.pos = save;
            None
        };
        Ok(Stmt::TryCatch(TryCatchStmt { body, catch_name, catch_body, finally_body, loc }))
    }

    fn parse_state_decl(&mut self) -> Result<Stmt, CompileError> {
        let loc = self.loc();
        self.expect(&TokenKind::State)?;
        let (name, _) = self.expect_ident()?;
        let ty = if self.match_kind(&TokenKind::Colon) {
            Some(self.parse_type_annotation()?)
        } else {
            None
        };
        self.expect(&TokenKind::Assign)?;
        let init = self.parse_expression()?;
        Ok(Stmt::State(StateDeclaration { name, ty, init, loc }))
    }

    fn parse_computed_decl(&mut self) -> Result<Stmt, CompileError> {
        let loc = self.loc();
        self.expect(&TokenKind::Computed)?;
        let (name, _) = self.expect_ident()?;
        self.expect(&TokenKind::Assign)?;
        let body = self.parse_expression()?;
        Ok(Stmt::ComputedDecl(ComputedDeclaration { name, body, loc }))
    }

    fn parse_effect_decl(&mut self) -> Result<Stmt, CompileError> {
        let loc = self.loc();
        self.expect(&TokenKind::Effect)?;
        let body = self.parse_brace_block()?;
        Ok(Stmt::Effect(EffectDeclaration { body, loc }))
    }

    fn parse_component_decl(&mut self, docstring: Option<String>) -> Result<Stmt, CompileError> {
        let loc = self.loc();
        self.expect(&TokenKind::Component)?;
        let (name, _) = self.expect_ident()?;
        let params = if self.check(&TokenKind::LParen) {
            self.parse_params()?
        } else {
            Vec::new()
        };
        let body = self.parse_brace_block()?;
        Ok(Stmt::Component(ComponentDeclaration { name, params, body, docstring, loc }))
    }

    fn parse_store_decl(&mut self) -> Result<Stmt, CompileError> {
        let loc = self.loc();
        self.expect(&TokenKind::Store)?;
        let (name, _) = self.expect_ident()?;
        let body = self.parse_brace_block()?;
        Ok(Stmt::Store(StoreDeclaration { name, body, loc }))
    }

    /// Distinguish `{k: v, ...}` in statement position from a block
    /// statement: a key followed by `:` (or `,`, or a spread) reads as an
    /// object literal.
    fn object_literal_ahead(&self) -> bool {
        let mut i = self.pos + 1;
        while i < self.tokens.len() && self.tokens[i].kind == TokenKind::Newline {
            i += 1;
        }
        match &self.tokens.get(i).map(|t| &t.kind) {
            Some(TokenKind::RBrace) | Some(TokenKind::Ellipsis) => true,
            Some(TokenKind::Ident(_)) | Some(TokenKind::Str(_)) => {
                let mut j = i + 1;
                while j < self.tokens.len() && self.tokens[j].kind == TokenKind::Newline {
                    j += 1;
                }
                matches!(
                    self.tokens.get(j).map(|t| &t.kind),
                    Some(TokenKind::Colon) | Some(TokenKind::Comma)
                )
            }
            _ => false,
        }
    }

    fn parse_block_stmt(&mut self) -> Result<Stmt, CompileError> {
        let loc = self.loc();
        let body = self.parse_brace_block()?;
        Ok(Stmt::Block(BlockStmt { body, loc }))
    }

    /// `{ stmt* }` with newline-separated statements.
    pub(crate) fn parse_brace_block(&mut self) -> Result<Vec<Stmt>, CompileError> {
        self.skip_newlines();
        self.expect(&TokenKind::LBrace)?;
        let body = self.parse_stmts_until_rbrace()?;
        self.expect(&TokenKind::RBrace)?;
        Ok(body)
    }

    pub(crate) fn parse_stmts_until_rbrace(&mut self) -> Result<Vec<Stmt>, CompileError> {
        let mut body = Vec::new();
        loop {
            self.skip_newlines();
            if self.check(&TokenKind::RBrace) || self.check(&TokenKind::Eof) {
                break;
            }
            body.push(self.parse_stmt()?);
            self.expect_terminator()?;
        }
        Ok(body)
    }

    fn parse_expr_or_assignment(&mut self) -> Result<Stmt, CompileError> {
        let loc = self.loc();
        let expr = self.parse_expression()?;
        match self.kind() {
            TokenKind::Assign => {
                self.advance();
                self.skip_newlines();
                let value = self.parse_expression()?;
                Ok(Stmt::Assignment(Assignment { target: expr, value, loc }))
            }
            TokenKind::PlusAssign
            | TokenKind::MinusAssign
            | TokenKind::StarAssign
            | TokenKind::SlashAssign
            | TokenKind::PercentAssign => {
                let op = match self.kind() {
                    TokenKind::PlusAssign => BinaryOp::Add,
                    TokenKind::MinusAssign => BinaryOp::Sub,
                    TokenKind::StarAssign => BinaryOp::Mul,
                    TokenKind::SlashAssign => BinaryOp::Div,
                    _ => BinaryOp::Mod,
                };
                self.advance();
                self.skip_newlines();
                let value = self.parse_expression()?;
                Ok(Stmt::Compound(CompoundAssignment { target: expr, op, value, loc }))
            }
            _ => Ok(Stmt::Expr(ExprStmt { expr, loc })),
        }
    }

    // --- expressions ---

    pub(crate) fn parse_expression(&mut self) -> Result<Expr, CompileError> {
        self.parse_pipe()
    }

    fn parse_pipe(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_or()?;
        while self.check(&TokenKind::PipeGreater) {
            let loc = self.loc();
            self.advance();
            self.skip_newlines();
            let call = self.parse_or()?;
            left = Expr::Pipe(Box::new(PipeExpression { value: left, call, loc }));
        }
        Ok(left)
    }

    fn parse_or(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_and()?;
        loop {
            let op = match self.kind() {
                TokenKind::Or => LogicalOp::Or,
                TokenKind::QuestionQuestion => LogicalOp::NullishCoalesce,
                _ => break,
            };
            let loc = self.loc();
            self.advance();
            self.skip_newlines();
            let right = self.parse_and()?;
            left = Expr::Logical(Box::new(LogicalExpression { op, left, right, loc }));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_not()?;
        while self.check(&TokenKind::And) {
            let loc = self.loc();
            self.advance();
            self.skip_newlines();
            let right = self.parse_not()?;
            left = Expr::Logical(Box::new(LogicalExpression {
                op: LogicalOp::And,
                left,
                right,
                loc,
            }));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, CompileError> {
        if self.check(&TokenKind::Not) {
            let loc = self.loc();
            self.advance();
            let operand = self.parse_not()?;
            return Ok(Expr::Unary(Box::new(UnaryExpression { op: UnaryOp::Not, operand, loc })));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, CompileError> {
        let loc = self.loc();
        let first = self.parse_membership()?;
        let mut operands = vec![first];
        let mut ops = Vec::new();
        loop {
            let op = match self.kind() {
                TokenKind::Eq => ComparisonOp::Eq,
                TokenKind::NotEq => ComparisonOp::NotEq,
                TokenKind::Less => ComparisonOp::Less,
                TokenKind::LessEq => ComparisonOp::LessEq,
                TokenKind::Greater => ComparisonOp::Greater,
                TokenKind::GreaterEq => ComparisonOp::GreaterEq,
                _ => break,
            };
            self.advance();
            self.skip_newlines();
            ops.push(op);
            operands.push(self.parse_membership()?);
        }
        if ops.is_empty() {
            return Ok(operands.pop().expect("one operand"));
        }
        Ok(Expr::Chained(Box::new(ChainedComparison { operands, ops, loc })))
    }

    fn parse_membership(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_range()?;
        loop {
            if self.check(&TokenKind::In) {
                let loc = self.loc();
                self.advance();
                self.skip_newlines();
                let collection = self.parse_range()?;
                left = Expr::Membership(Box::new(MembershipExpression {
                    item: left,
                    collection,
                    negated: false,
                    loc,
                }));
            } else if self.check(&TokenKind::Not) && self.peek_kind(1) == &TokenKind::In {
                let loc = self.loc();
                self.advance();
                self.advance();
                self.skip_newlines();
                let collection = self.parse_range()?;
                left = Expr::Membership(Box::new(MembershipExpression {
                    item: left,
                    collection,
                    negated: true,
                    loc,
                }));
            } else {
                break;
            }
        }
        Ok(left)
    }

    fn parse_range(&mut self) -> Result<Expr, CompileError> {
        let left = self.parse_additive()?;
        let inclusive = match self.kind() {
            TokenKind::DotDot => false,
            TokenKind::DotDotEq => true,
            _ => return Ok(left),
        };
        let loc = self.loc();
        self.advance();
        let end = self.parse_additive()?;
        Ok(Expr::Range(Box::new(RangeExpression { start: left, end, inclusive, loc })))
    }

    fn parse_additive(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            let loc = self.loc();
            self.advance();
            self.skip_newlines();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary(Box::new(BinaryExpression { op, left, right, loc }));
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, CompileError> {
        let mut left = self.parse_power()?;
        loop {
            let op = match self.kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            let loc = self.loc();
            self.advance();
            self.skip_newlines();
            let right = self.parse_power()?;
            left = Expr::Binary(Box::new(BinaryExpression { op, left, right, loc }));
        }
        Ok(left)
    }

    fn parse_power(&mut self) -> Result<Expr, CompileError> {
        let left = self.parse_unary()?;
        if self.check(&TokenKind::StarStar) {
            let loc = self.loc();
            self.advance();
            self.skip_newlines();
            // Right-associative.
            let right = self.parse_power()?;
            return Ok(Expr::Binary(Box::new(BinaryExpression {
                op: BinaryOp::Pow,
                left,
                right,
                loc,
            })));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, CompileError> {
        if self.check(&TokenKind::Minus) {
            let loc = self.loc();
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary(Box::new(UnaryExpression { op: UnaryOp::Neg, operand, loc })));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.kind() {
                TokenKind::LParen => {
                    let loc = self.loc();
                    let args = self.parse_call_args()?;
                    expr = Expr::Call(Box::new(CallExpression { callee: expr, args, loc }));
                }
                TokenKind::Dot => {
                    let loc = self.loc();
                    self.advance();
                    let (property, _) = self.expect_name()?;
                    expr = Expr::Member(Box::new(MemberExpression { object: expr, property, loc }));
                }
                TokenKind::QuestionDot => {
                    let loc = self.loc();
                    self.advance();
                    let (property, _) = self.expect_name()?;
                    expr = Expr::OptionalChain(Box::new(OptionalChainExpression {
                        object: expr,
                        property,
                        loc,
                    }));
                }
                TokenKind::LBracket => {
                    expr = self.parse_index_or_slice(expr)?;
                }
                TokenKind::Question => {
                    let loc = self.loc();
                    self.advance();
                    expr = Expr::Propagate(Box::new(PropagateExpression { value: expr, loc }));
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_call_args(&mut self) -> Result<Vec<CallArg>, CompileError> {
        self.expect(&TokenKind::LParen)?;
        let mut args = Vec::new();
        loop {
            self.skip_newlines();
            if self.check(&TokenKind::RParen) {
                break;
            }
            if self.check(&TokenKind::Ellipsis) {
                self.advance();
                args.push(CallArg::Spread(self.parse_expression()?));
            } else if matches!(self.kind(), TokenKind::Ident(_))
                && self.peek_kind(1) == &TokenKind::Colon
            {
                let loc = self.loc();
                let (name, _) = self.expect_ident()?;
                self.expect(&TokenKind::Colon)?;
                let value = self.parse_expression()?;
                args.push(CallArg::Named { name, value, loc });
            } else {
                args.push(CallArg::Positional(self.parse_expression()?));
            }
            if !self.match_kind(&TokenKind::Comma) {
                self.skip_newlines();
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(args)
    }

    fn parse_index_or_slice(&mut self, object: Expr) -> Result<Expr, CompileError> {
        let loc = self.loc();
        self.expect(&TokenKind::LBracket)?;

        let start = if self.check(&TokenKind::Colon) {
            None
        } else {
            Some(self.parse_expression()?)
        };

        if !self.check(&TokenKind::Colon) {
            self.expect(&TokenKind::RBracket)?;
            let index = start.ok_or_else(|| self.err_expected("an index expression"))?;
            return Ok(Expr::Index(Box::new(IndexExpression { object, index, loc })));
        }

        self.advance(); // ':'
        let stop = if self.check(&TokenKind::Colon) || self.check(&TokenKind::RBracket) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        let step = if self.match_kind(&TokenKind::Colon) {
            if self.check(&TokenKind::RBracket) {
                None
            } else {
                Some(self.parse_expression()?)
            }
        } else {
            None
        };
        self.expect(&TokenKind::RBracket)?;
        Ok(Expr::Slice(Box::new(SliceExpression { object, start, stop, step, loc })))
    }

    fn parse_primary(&mut self) -> Result<Expr, CompileError> {
        let loc = self.loc();
        match self.kind().clone() {
            TokenKind::Int(value) => {
                self.advance();
                Ok(Expr::Int(IntLiteral { value, loc }))
            }
            TokenKind::Float(value) => {
                self.advance();
                Ok(Expr::Float(FloatLiteral { value, loc }))
            }
            TokenKind::Str(value) => {
                self.advance();
                Ok(Expr::Str(StringLiteral { value, loc }))
            }
            TokenKind::Bool(value) => {
                self.advance();
                Ok(Expr::Bool(BoolLiteral { value, loc }))
            }
            TokenKind::Nil => {
                self.advance();
                Ok(Expr::Nil(loc))
            }
            TokenKind::Regex { pattern, flags } => {
                self.advance();
                Ok(Expr::Regex(RegexLiteral { pattern, flags, loc }))
            }
            TokenKind::Template(parts) => {
                self.advance();
                self.parse_template(parts, loc)
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(Expr::Ident(Identifier { name, loc }))
            }
            TokenKind::Fn => self.parse_fn_lambda(),
            TokenKind::LParen => self.parse_paren_expr(),
            TokenKind::LBracket => self.parse_array_or_comprehension(),
            TokenKind::LBrace => self.parse_object_or_comprehension(),
            TokenKind::If => self.parse_if_expression(),
            TokenKind::Match => self.parse_match_expression(),
            TokenKind::Less => self.parse_jsx(),
            _ => Err(self.err_expected("an expression")),
        }
    }

    /// Re-parse the token stream of each interpolated part into a real
    /// expression tree.
    fn parse_template(
        &mut self,
        parts: Vec<crate::token::TemplatePart>,
        loc: Loc,
    ) -> Result<Expr, CompileError> {
        let mut pieces = Vec::new();
        for part in parts {
            match part {
                crate::token::TemplatePart::Text(text) => pieces.push(TemplatePiece::Text(text)),
                crate::token::TemplatePart::Expr { tokens, source } => {
                    let mut sub = Parser::new(tokens, &self.file);
                    sub.skip_newlines();
                    let expr = sub.parse_expression()?;
                    sub.skip_newlines();
                    if !sub.check(&TokenKind::Eof) {
                        return Err(sub.err_expected(&format!(
                            "a single expression in interpolation '{{{}}}'",
                            source
                        )));
                    }
                    pieces.push(TemplatePiece::Expr(expr));
                }
            }
        }
        Ok(Expr::Template(TemplateLiteral { parts: pieces, loc }))
    }

    /// `fn(params) expr` or `fn(params) { stmts }` as a value.
    fn parse_fn_lambda(&mut self) -> Result<Expr, CompileError> {
        let loc = self.loc();
        self.expect(&TokenKind::Fn)?;
        let params = self.parse_params()?;
        let body = if self.check(&TokenKind::LBrace) {
            LambdaBody::Block(self.parse_brace_block()?)
        } else {
            LambdaBody::Expr(self.parse_expression()?)
        };
        Ok(Expr::Lambda(Box::new(LambdaExpression { params, body, loc })))
    }

    /// `(x) => body`, `(x, y) => body`, or a grouped expression.
    fn parse_paren_expr(&mut self) -> Result<Expr, CompileError> {
        if self.lambda_ahead() {
            let loc = self.loc();
            let params = self.parse_params()?;
            self.expect(&TokenKind::FatArrow)?;
            self.skip_newlines();
            let body = if self.check(&TokenKind::LBrace) {
                LambdaBody::Block(self.parse_brace_block()?)
            } else {
                LambdaBody::Expr(self.parse_expression()?)
            };
            return Ok(Expr::Lambda(Box::new(LambdaExpression { params, body, loc })));
        }
        self.expect(&TokenKind::LParen)?;
        self.skip_newlines();
        let expr = self.parse_expression()?;
        self.skip_newlines();
        self.expect(&TokenKind::RParen)?;
        Ok(expr)
    }

    /// Scan ahead from a `(` for the matching `)` followed by `=>`.
    fn lambda_ahead(&self) -> bool {
        let mut depth = 0usize;
        let mut index = self.pos;
        while index < self.tokens.len() {
            match &self.tokens[index].kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        let mut after = index + 1;
                        while after < self.tokens.len()
                            && self.tokens[after].kind == TokenKind::Newline
                        {
                            after += 1;
                        }
                        return after < self.tokens.len()
                            && self.tokens[after].kind == TokenKind::FatArrow;
                    }
                }
                TokenKind::Eof => return false,
                _ => {}
            }
            index += 1;
        }
        false
    }

    /// `[a, b]`, `[...xs, y]`, or `[expr for x in xs if cond]`.
    fn parse_array_or_comprehension(&mut self) -> Result<Expr, CompileError> {
        let loc = self.loc();
        self.expect(&TokenKind::LBracket)?;
        self.skip_newlines();
        if self.match_kind(&TokenKind::RBracket) {
            return Ok(Expr::Array(ArrayLiteral { elements: Vec::new(), loc }));
        }

        let first = if self.check(&TokenKind::Ellipsis) {
            let spread_loc = self.loc();
            self.advance();
            Expr::Spread(Box::new(SpreadExpression { value: self.parse_expression()?, loc: spread_loc }))
        } else {
            self.parse_expression()?
        };

        if self.check(&TokenKind::For) {
            self.advance();
            let binding = self.parse_for_binding()?;
            self.expect(&TokenKind::In)?;
            let iterable = self.parse_expression()?;
            let condition = if self.match_kind(&TokenKind::If) {
                Some(self.parse_expression()?)
            } else {
                None
            };
            self.skip_newlines();
            self.expect(&TokenKind::RBracket)?;
            return Ok(Expr::ListComp(Box::new(ListComprehension {
                element: first,
                binding,
                iterable,
                condition,
                loc,
            })));
        }

        let mut elements = vec![first];
        while self.match_kind(&TokenKind::Comma) {
            self.skip_newlines();
            if self.check(&TokenKind::RBracket) {
                break;
            }
            if self.check(&TokenKind::Ellipsis) {
                let spread_loc = self.loc();
                self.advance();
                elements.push(Expr::Spread(Box::new(SpreadExpression {
                    value: self.parse_expression()?,
                    loc: spread_loc,
                })));
            } else {
                elements.push(self.parse_expression()?);
            }
        }
        self.skip_newlines();
        self.expect(&TokenKind::RBracket)?;
        Ok(Expr::Array(ArrayLiteral { elements, loc }))
    }

    /// `{a: 1, b, ...rest}` or `{k: v for x in xs if cond}`.
    fn parse_object_or_comprehension(&mut self) -> Result<Expr, CompileError> {
        let loc = self.loc();
        self.expect(&TokenKind::LBrace)?;
        self.skip_newlines();
        if self.match_kind(&TokenKind::RBrace) {
            return Ok(Expr::Object(ObjectLiteral { entries: Vec::new(), loc }));
        }

        let mut entries = Vec::new();

        if self.check(&TokenKind::Ellipsis) {
            let spread_loc = self.loc();
            self.advance();
            entries.push(ObjectEntry::Spread { value: self.parse_expression()?, loc: spread_loc });
        } else {
            let entry_loc = self.loc();
            let key_expr = self.parse_expression()?;
            if self.match_kind(&TokenKind::Colon) {
                let value = self.parse_expression()?;
                if self.check(&TokenKind::For) {
                    // Dict comprehension: the key is an arbitrary expression.
                    self.advance();
                    let binding = self.parse_for_binding()?;
                    self.expect(&TokenKind::In)?;
                    let iterable = self.parse_expression()?;
                    let condition = if self.match_kind(&TokenKind::If) {
                        Some(self.parse_expression()?)
                    } else {
                        None
                    };
                    self.skip_newlines();
                    self.expect(&TokenKind::RBrace)?;
                    return Ok(Expr::DictComp(Box::new(DictComprehension {
                        key: key_expr,
                        value,
                        binding,
                        iterable,
                        condition,
                        loc,
                    })));
                }
                let key = self.object_key(key_expr)?;
                entries.push(ObjectEntry::Property { key, value, loc: entry_loc });
            } else {
                match key_expr {
                    Expr::Ident(ident) => entries.push(ObjectEntry::Shorthand {
                        name: ident.name,
                        loc: entry_loc,
                    }),
                    _ => return Err(self.err_expected("':' after object key")),
                }
            }
        }

        while self.match_kind(&TokenKind::Comma) {
            self.skip_newlines();
            if self.check(&TokenKind::RBrace) {
                break;
            }
            let entry_loc = self.loc();
            if self.check(&TokenKind::Ellipsis) {
                self.advance();
                entries.push(ObjectEntry::Spread { value: self.parse_expression()?, loc: entry_loc });
                continue;
            }
            let key_expr = self.parse_expression()?;
            if self.match_kind(&TokenKind::Colon) {
                let key = self.object_key(key_expr)?;
                let value = self.parse_expression()?;
                entries.push(ObjectEntry::Property { key, value, loc: entry_loc });
            } else {
                match key_expr {
                    Expr::Ident(ident) => entries.push(ObjectEntry::Shorthand {
                        name: ident.name,
                        loc: entry_loc,
                    }),
                    _ => return Err(self.err_expected("':' after object key")),
                }
            }
        }
        self.skip_newlines();
        self.expect(&TokenKind::RBrace)?;
        Ok(Expr::Object(ObjectLiteral { entries, loc }))
    }

    fn object_key(&self, expr: Expr) -> Result<ObjectKey, CompileError> {
        match expr {
            Expr::Ident(ident) => Ok(ObjectKey::Name(ident.name)),
            Expr::Str(s) => Ok(ObjectKey::Str(s.value)),
            other => Err(self.err_at("invalid object key", other.loc())),
        }
    }

    fn parse_if_expression(&mut self) -> Result<Expr, CompileError> {
        let loc = self.loc();
        let (branches, else_body) = self.parse_if_chain()?;
        Ok(Expr::IfExpr(Box::new(IfExpression { branches, else_body, loc })))
    }

    fn parse_match_expression(&mut self) -> Result<Expr, CompileError> {
        let loc = self.loc();
        self.expect(&TokenKind::Match)?;
        let subject = self.parse_expression()?;
        self.expect(&TokenKind::LBrace)?;

        let mut arms = Vec::new();
        loop {
            self.skip_newlines();
            if self.check(&TokenKind::RBrace) {
                break;
            }
            arms.push(self.parse_match_arm()?);
            if !self.match_kind(&TokenKind::Comma) {
                // Arms may also be newline-separated.
                if !self.check(&TokenKind::Newline) && !self.check(&TokenKind::RBrace) {
                    return Err(self.err_expected("',' or a new line between match arms"));
                }
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(Expr::Match(Box::new(MatchExpression { subject, arms, loc })))
    }

    pub(crate) fn parse_match_arm(&mut self) -> Result<MatchArm, CompileError> {
        let loc = self.loc();
        let pattern = self.parse_pattern()?;
        let guard = if self.match_kind(&TokenKind::If) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.expect(&TokenKind::FatArrow)?;
        self.skip_newlines();
        let body = if self.check(&TokenKind::LBrace) {
            MatchBody::Block(self.parse_brace_block()?)
        } else {
            MatchBody::Expr(self.parse_expression()?)
        };
        Ok(MatchArm { pattern, guard, body, loc })
    }

    pub(crate) fn parse_pattern(&mut self) -> Result<Pattern, CompileError> {
        let loc = self.loc();
        match self.kind().clone() {
            TokenKind::Ident(name) if name == "_" => {
                self.advance();
                Ok(Pattern::Wildcard { loc })
            }
            TokenKind::Ident(name) => {
                self.advance();
                let is_variant = name.chars().next().map(|c| c.is_uppercase()).unwrap_or(false);
                if is_variant {
                    let mut fields = Vec::new();
                    if self.match_kind(&TokenKind::LParen) {
                        loop {
                            if self.check(&TokenKind::RParen) {
                                break;
                            }
                            fields.push(self.parse_pattern()?);
                            if !self.match_kind(&TokenKind::Comma) {
                                break;
                            }
                        }
                        self.expect(&TokenKind::RParen)?;
                    }
                    Ok(Pattern::Variant { name, fields, loc })
                } else {
                    Ok(Pattern::Binding { name, loc })
                }
            }
            TokenKind::LParen => {
                self.advance();
                let mut elements = Vec::new();
                loop {
                    if self.check(&TokenKind::RParen) {
                        break;
                    }
                    elements.push(self.parse_pattern()?);
                    if !self.match_kind(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokenKind::RParen)?;
                Ok(Pattern::Tuple { elements, loc })
            }
            TokenKind::LBrace => {
                self.advance();
                let mut fields = Vec::new();
                loop {
                    self.skip_newlines();
                    if self.check(&TokenKind::RBrace) {
                        break;
                    }
                    let (name, _) = self.expect_ident()?;
                    let sub = if self.match_kind(&TokenKind::Colon) {
                        Some(self.parse_pattern()?)
                    } else {
                        None
                    };
                    fields.push((name, sub));
                    if !self.match_kind(&TokenKind::Comma) {
                        break;
                    }
                }
                self.skip_newlines();
                self.expect(&TokenKind::RBrace)?;
                Ok(Pattern::Record { fields, loc })
            }
            _ => {
                let value = self.parse_pattern_literal()?;
                let inclusive = match self.kind() {
                    TokenKind::DotDot => Some(false),
                    TokenKind::DotDotEq => Some(true),
                    _ => None,
                };
                if let Some(inclusive) = inclusive {
                    self.advance();
                    let end = self.parse_pattern_literal()?;
                    return Ok(Pattern::Range { start: value, end, inclusive, loc });
                }
                Ok(Pattern::Literal { value, loc })
            }
        }
    }

    fn parse_pattern_literal(&mut self) -> Result<Expr, CompileError> {
        let loc = self.loc();
        match self.kind().clone() {
            TokenKind::Int(value) => {
                self.advance();
                Ok(Expr::Int(IntLiteral { value, loc }))
            }
            TokenKind::Float(value) => {
                self.advance();
                Ok(Expr::Float(FloatLiteral { value, loc }))
            }
            TokenKind::Str(value) => {
                self.advance();
                Ok(Expr::Str(StringLiteral { value, loc }))
            }
            TokenKind::Bool(value) => {
                self.advance();
                Ok(Expr::Bool(BoolLiteral { value, loc }))
            }
            TokenKind::Nil => {
                self.advance();
                Ok(Expr::Nil(loc))
            }
            TokenKind::Minus => {
                self.advance();
                let operand = self.parse_pattern_literal()?;
                Ok(Expr::Unary(Box::new(UnaryExpression { op: UnaryOp::Neg, operand, loc })))
            }
            _ => Err(self.err_expected("a literal pattern")),
        }
    }

    // --- JSX ---

    fn parse_jsx(&mut self) -> Result<Expr, CompileError> {
        let loc = self.loc();
        self.expect(&TokenKind::Less)?;
        if self.match_kind(&TokenKind::Greater) {
            let children = self.parse_jsx_children_tag(None)?;
            return Ok(Expr::JsxFragment(Box::new(JsxFragment { children, loc })));
        }
        let element = self.parse_jsx_element_after_lt(loc)?;
        Ok(Expr::Jsx(Box::new(element)))
    }

    /// Parses an element whose `<` has already been consumed.
    fn parse_jsx_element_after_lt(&mut self, loc: Loc) -> Result<JsxElement, CompileError> {
        let (name, _) = self.expect_ident()?;
        let mut attributes = Vec::new();
        let mut self_closing = false;

        loop {
            self.skip_newlines();
            match self.kind() {
                TokenKind::Greater => {
                    self.advance();
                    break;
                }
                TokenKind::Slash => {
                    self.advance();
                    self.expect(&TokenKind::Greater)?;
                    self_closing = true;
                    break;
                }
                TokenKind::LBrace => {
                    let attr_loc = self.loc();
                    self.advance();
                    self.expect(&TokenKind::Ellipsis)?;
                    let value = self.parse_expression()?;
                    self.expect(&TokenKind::RBrace)?;
                    attributes.push(JsxAttribute::Spread { value, loc: attr_loc });
                }
                _ => attributes.push(self.parse_jsx_attribute()?),
            }
        }

        let children = if self_closing {
            Vec::new()
        } else {
            self.parse_jsx_children_tag(Some(&name))?
        };

        Ok(JsxElement { name, attributes, children, self_closing, loc })
    }

    fn parse_jsx_attribute(&mut self) -> Result<JsxAttribute, CompileError> {
        let loc = self.loc();
        let (name, _) = self.expect_name()?;

        // `on:click.prevent`, `bind:value`, `class:active`, `use:action`...
        if self.match_kind(&TokenKind::Colon) {
            let (directive_name, _) = self.expect_name()?;
            let mut modifiers = Vec::new();
            while self.match_kind(&TokenKind::Dot) {
                modifiers.push(self.expect_name()?.0);
            }
            let value = self.parse_jsx_attr_value()?;
            return Ok(JsxAttribute::Directive {
                namespace: name,
                name: directive_name,
                modifiers,
                value,
                loc,
            });
        }

        let value = self.parse_jsx_attr_value()?;
        Ok(JsxAttribute::Static { name, value, loc })
    }

    fn parse_jsx_attr_value(&mut self) -> Result<Option<JsxAttrValue>, CompileError> {
        if !self.match_kind(&TokenKind::Assign) {
            return Ok(None);
        }
        match self.kind().clone() {
            TokenKind::Str(value) => {
                self.advance();
                Ok(Some(JsxAttrValue::Str(value)))
            }
            TokenKind::LBrace => {
                self.advance();
                self.skip_newlines();
                let expr = self.parse_expression()?;
                self.skip_newlines();
                self.expect(&TokenKind::RBrace)?;
                Ok(Some(JsxAttrValue::Expr(expr)))
            }
            _ => Err(self.err_expected("a string or {expression} attribute value")),
        }
    }

    /// Children of an element, consuming the matching closing tag
    /// (`</name>`, or `</>` when `name` is None for fragments).
    fn parse_jsx_children_tag(
        &mut self,
        name: Option<&str>,
    ) -> Result<Vec<JsxChild>, CompileError> {
        let mut children = Vec::new();
        loop {
            if self.check(&TokenKind::Less) && self.peek_kind(1) == &TokenKind::Slash {
                self.advance();
                self.advance();
                match name {
                    Some(expected) => {
                        let (closing, closing_loc) = self.expect_ident()?;
                        if closing != expected {
                            return Err(self.err_at(
                                format!(
                                    "mismatched closing tag: expected </{}>, found </{}>",
                                    expected, closing
                                ),
                                &closing_loc,
                            ));
                        }
                    }
                    None => {}
                }
                self.expect(&TokenKind::Greater)?;
                break;
            }
            if self.check(&TokenKind::Eof) {
                return Err(self.err_expected("a closing JSX tag"));
            }
            if let Some(child) = self.parse_jsx_child()? {
                children.push(child);
            }
        }
        Ok(children)
    }

    /// Children inside a control-flow body; stops before the `}` without
    /// consuming it.
    fn parse_jsx_children_block(&mut self) -> Result<Vec<JsxChild>, CompileError> {
        let mut children = Vec::new();
        loop {
            self.skip_newlines();
            if self.check(&TokenKind::RBrace) {
                break;
            }
            if self.check(&TokenKind::Eof) {
                return Err(self.err_expected("'}' closing JSX control flow"));
            }
            if let Some(child) = self.parse_jsx_child()? {
                children.push(child);
            }
        }
        Ok(children)
    }

    fn parse_jsx_child(&mut self) -> Result<Option<JsxChild>, CompileError> {
        let loc = self.loc();
        match self.kind().clone() {
            TokenKind::Newline => {
                self.advance();
                Ok(None)
            }
            TokenKind::JsxText(value) => {
                self.advance();
                Ok(Some(JsxChild::Text { value, loc }))
            }
            TokenKind::Str(value) => {
                self.advance();
                Ok(Some(JsxChild::Text { value, loc }))
            }
            TokenKind::Template(parts) => {
                self.advance();
                let expr = self.parse_template(parts, loc.clone())?;
                Ok(Some(JsxChild::Expr(JsxExpression { expr, loc })))
            }
            TokenKind::LBrace => {
                self.advance();
                self.skip_newlines();
                if self.check(&TokenKind::Match) {
                    let m = self.parse_jsx_match(loc)?;
                    return Ok(Some(JsxChild::Match(m)));
                }
                let expr = self.parse_expression()?;
                self.skip_newlines();
                self.expect(&TokenKind::RBrace)?;
                Ok(Some(JsxChild::Expr(JsxExpression { expr, loc })))
            }
            TokenKind::Less => {
                self.advance();
                if self.match_kind(&TokenKind::Greater) {
                    let children = self.parse_jsx_children_tag(None)?;
                    return Ok(Some(JsxChild::Fragment(JsxFragment { children, loc })));
                }
                let element = self.parse_jsx_element_after_lt(loc)?;
                Ok(Some(JsxChild::Element(element)))
            }
            TokenKind::If => Ok(Some(JsxChild::If(self.parse_jsx_if()?))),
            TokenKind::For => Ok(Some(JsxChild::For(self.parse_jsx_for()?))),
            _ => Err(self.err_expected("a JSX child")),
        }
    }

    fn parse_jsx_if(&mut self) -> Result<JsxIf, CompileError> {
        let loc = self.loc();
        self.expect(&TokenKind::If)?;
        let mut branches = Vec::new();
        let condition = self.parse_expression()?;
        self.expect(&TokenKind::LBrace)?;
        let body = self.parse_jsx_children_block()?;
        self.expect(&TokenKind::RBrace)?;
        branches.push((condition, body));

        let mut else_body = None;
        loop {
            let save = self.pos;
            self.skip_newlines();
            if self.match_kind(&TokenKind::Elif) {
                let condition = self.parse_expression()?;
                self.expect(&TokenKind::LBrace)?;
                let body = self.parse_jsx_children_block()?;
                self.expect(&TokenKind::RBrace)?;
                branches.push((condition, body));
                continue;
            }
            if self.match_kind(&TokenKind::Else) {
                if self.match_kind(&TokenKind::If) {
                    let condition = self.parse_expression()?;
                    self.expect(&TokenKind::LBrace)?;
                    let body = self.parse_jsx_children_block()?;
                    self.expect(&TokenKind::RBrace)?;
                    branches.push((condition, body));
                    continue;
                }
                self.expect(&TokenKind::LBrace)?;
                else_body = Some(self.parse_jsx_children_block()?);
                self.expect(&TokenKind::RBrace)?;
                break;
            }
            self.pos = save;
            break;
        }
        Ok(JsxIf { branches, else_body, loc })
    }

    fn parse_jsx_for(&mut self) -> Result<JsxFor, CompileError> {
        let loc = self.loc();
        self.expect(&TokenKind::For)?;
        let binding = self.parse_for_binding()?;
        self.expect(&TokenKind::In)?;
        let iterable = self.parse_expression()?;
        self.expect(&TokenKind::LBrace)?;
        let body = self.parse_jsx_children_block()?;
        self.expect(&TokenKind::RBrace)?;
        Ok(JsxFor { binding, iterable, body, loc })
    }

    /// `{match subject { pattern => <jsx/>, ... }}` as a JSX child. The
    /// opening `{` has been consumed; both closing braces are handled here.
    fn parse_jsx_match(&mut self, loc: Loc) -> Result<JsxMatch, CompileError> {
        self.expect(&TokenKind::Match)?;
        let subject = self.parse_expression()?;
        self.expect(&TokenKind::LBrace)?;

        let mut arms = Vec::new();
        loop {
            self.skip_newlines();
            if self.check(&TokenKind::RBrace) {
                break;
            }
            let arm_loc = self.loc();
            let pattern = self.parse_pattern()?;
            let guard = if self.match_kind(&TokenKind::If) {
                Some(self.parse_expression()?)
            } else {
                None
            };
            self.expect(&TokenKind::FatArrow)?;
            self.skip_newlines();
            let body = vec![self
                .parse_jsx_child()?
                .ok_or_else(|| self.err_expected("a JSX child in match arm"))?];
            arms.push(JsxMatchArm { pattern, guard, body, loc: arm_loc });
            self.match_kind(&TokenKind::Comma);
        }
        self.expect(&TokenKind::RBrace)?;
        self.skip_newlines();
        self.expect(&TokenKind::RBrace)?;
        Ok(JsxMatch { subject, arms, loc })
    }

    // --- type annotations ---

    pub(crate) fn parse_type_annotation(&mut self) -> Result<TypeAnnotation, CompileError> {
        let loc = self.loc();
        let mut ty = match self.kind().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                let mut args = Vec::new();
                if self.match_kind(&TokenKind::Less) {
                    loop {
                        args.push(self.parse_type_annotation()?);
                        if !self.match_kind(&TokenKind::Comma) {
                            break;
                        }
                    }
                    self.expect(&TokenKind::Greater)?;
                }
                TypeAnnotation::Named { name, args, loc: loc.clone() }
            }
            TokenKind::LBracket => {
                self.advance();
                let element = self.parse_type_annotation()?;
                self.expect(&TokenKind::RBracket)?;
                TypeAnnotation::Array { element: Box::new(element), loc: loc.clone() }
            }
            TokenKind::LParen => {
                self.advance();
                let mut elements = Vec::new();
                loop {
                    if self.check(&TokenKind::RParen) {
                        break;
                    }
                    elements.push(self.parse_type_annotation()?);
                    if !self.match_kind(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokenKind::RParen)?;
                if self.match_kind(&TokenKind::Arrow) {
                    let ret = self.parse_type_annotation()?;
                    TypeAnnotation::Function {
                        params: elements,
                        ret: Box::new(ret),
                        loc: loc.clone(),
                    }
                } else {
                    TypeAnnotation::Tuple { elements, loc: loc.clone() }
                }
            }
            _ => return Err(self.err_expected("a type")),
        };

        while self.match_kind(&TokenKind::Question) {
            ty = TypeAnnotation::Nullable { inner: Box::new(ty), loc: loc.clone() };
        }
        Ok(ty)
    }
}
