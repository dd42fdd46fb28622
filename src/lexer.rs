use std::sync::Arc;

use crate::errors::CompileError;
use crate::token::{Token, TokenKind, TemplatePart, KEYWORDS};

pub const DEFAULT_MAX_INTERPOLATION_DEPTH: usize = 64;

/// JSX scanning state. A `Tag` frame is an open element awaiting children;
/// a `CfBlock` frame is the `{ ... }` body of control flow embedded in JSX
/// children. Each `Tag` frame records the expression-brace depth at which
/// it was opened so nested elements inside `{...}` expressions resolve
/// their own children correctly.
#[derive(Debug, Clone, Copy, PartialEq)]
enum JsxFrame {
    Tag { expr_baseline: usize },
    CfBlock { brace_depth: usize },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TagMode {
    Open,
    Close,
}

/// Nesting counters while scanning a control-flow header (the condition of
/// an `if`, the iterable of a `for`) inside JSX children.
#[derive(Debug, Default, Clone, Copy)]
struct CfHeader {
    active: bool,
    paren: usize,
    brace: usize,
}

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    file: Arc<str>,
    depth: usize,
    max_depth: usize,
    tokens: Vec<Token>,

    jsx_stack: Vec<JsxFrame>,
    tag_mode: Option<TagMode>,
    tag_expr_baseline: usize,
    self_closing: bool,
    expr_depth: usize,
    cf: CfHeader,
}

/// Tokenize a whole source file.
pub fn lex(source: &str, filename: &str) -> Result<Vec<Token>, CompileError> {
    Lexer::new(source, filename).tokenize()
}

impl Lexer {
    pub fn new(source: &str, filename: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            file: Arc::from(filename),
            depth: 0,
            max_depth: DEFAULT_MAX_INTERPOLATION_DEPTH,
            tokens: Vec::new(),
            jsx_stack: Vec::new(),
            tag_mode: None,
            tag_expr_baseline: 0,
            self_closing: false,
            expr_depth: 0,
            cf: CfHeader::default(),
        }
    }

    pub fn with_max_interpolation_depth(mut self, cap: usize) -> Self {
        self.max_depth = cap;
        self
    }

    /// Nested lexer for a `{...}` interpolation span, seeded with the span's
    /// real position so every sub-token points back into the original file.
    fn nested(&self, source: &str, line: usize, column: usize) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line,
            column,
            file: self.file.clone(),
            depth: self.depth + 1,
            max_depth: self.max_depth,
            tokens: Vec::new(),
            jsx_stack: Vec::new(),
            tag_mode: None,
            tag_expr_baseline: 0,
            self_closing: false,
            expr_depth: 0,
            cf: CfHeader::default(),
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, CompileError> {
        self.skip_shebang();
        loop {
            if self.in_children_mode() && !self.at_eof() {
                self.scan_jsx_children()?;
                continue;
            }
            self.skip_spaces();
            if self.at_eof() {
                break;
            }
            if self.ch() == '\n' {
                if self.tag_mode.is_some() {
                    self.advance();
                    continue;
                }
                let (line, column) = (self.line, self.column);
                while matches!(self.ch(), '\n' | ' ' | '\t' | '\r') && !self.at_eof() {
                    self.advance();
                }
                self.push(TokenKind::Newline, line, column);
                continue;
            }
            self.scan_token()?;
        }
        if !self.jsx_stack.is_empty() || self.tag_mode.is_some() {
            return Err(self.err("unterminated JSX element"));
        }
        self.push(TokenKind::Eof, self.line, self.column);
        Ok(self.tokens)
    }

    // --- character plumbing ---

    fn ch(&self) -> char {
        self.chars.get(self.pos).copied().unwrap_or('\0')
    }

    fn peek(&self) -> char {
        self.chars.get(self.pos + 1).copied().unwrap_or('\0')
    }

    fn peek_at(&self, offset: usize) -> char {
        self.chars.get(self.pos + offset).copied().unwrap_or('\0')
    }

    fn at_eof(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn advance(&mut self) -> char {
        let c = self.ch();
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    fn push(&mut self, kind: TokenKind, line: usize, column: usize) {
        self.tokens.push(Token::new(kind, line, column));
    }

    fn err(&self, message: impl Into<String>) -> CompileError {
        self.err_at(message, self.line, self.column)
    }

    fn err_at(&self, message: impl Into<String>, line: usize, column: usize) -> CompileError {
        CompileError::Lexer {
            message: message.into(),
            file: self.file.to_string(),
            line,
            column,
        }
    }

    fn skip_spaces(&mut self) {
        while matches!(self.ch(), ' ' | '\t' | '\r') {
            self.advance();
        }
    }

    fn skip_shebang(&mut self) {
        if self.ch() == '#' && self.peek() == '!' {
            while self.ch() != '\n' && !self.at_eof() {
                self.advance();
            }
            if self.ch() == '\n' {
                self.advance();
            }
        }
    }

    /// The previous non-newline token ends an expression, so `<` is a
    /// comparison and `/` is division.
    fn prev_token_produces_value(&self) -> bool {
        self.tokens
            .iter()
            .rev()
            .find(|t| t.kind != TokenKind::Newline)
            .map(|t| t.produces_value())
            .unwrap_or(false)
    }

    fn jsx_tag_ahead(&self) -> bool {
        if self.prev_token_produces_value() {
            return false;
        }
        let next = self.peek();
        next.is_ascii_alphabetic() || next == '_' || next == '/' || next == '>'
    }

    fn in_children_mode(&self) -> bool {
        if self.tag_mode.is_some() || self.cf.active {
            return false;
        }
        match self.jsx_stack.last() {
            Some(JsxFrame::Tag { expr_baseline }) => self.expr_depth == *expr_baseline,
            _ => false,
        }
    }

    fn current_expr_baseline(&self) -> usize {
        if self.tag_mode.is_some() {
            return self.tag_expr_baseline;
        }
        match self.jsx_stack.last() {
            Some(JsxFrame::Tag { expr_baseline }) => *expr_baseline,
            _ => 0,
        }
    }

    // --- JSX children scanning ---

    /// One step of the children sub-loop: raw text, a `{` expression, a `<`
    /// tag, a string child, or a bare `if`/`for`/`elif`/`else` starting a
    /// control-flow header.
    fn scan_jsx_children(&mut self) -> Result<(), CompileError> {
        // Whitespace directly before a structural character is not text.
        let mut j = self.pos;
        while j < self.chars.len() && self.chars[j].is_whitespace() {
            j += 1;
        }
        let next = self.chars.get(j).copied().unwrap_or('\0');
        let cf_kind = self.cf_keyword_at(j);
        let structural =
            matches!(next, '<' | '{' | '}' | '"' | '\'' | '\0') || cf_kind.is_some();

        if structural {
            while self.pos < j {
                self.advance();
            }
            let (line, column) = (self.line, self.column);
            match self.ch() {
                '\0' => {}
                '<' => {
                    self.advance();
                    self.tag_mode = Some(if self.ch() == '/' { TagMode::Close } else { TagMode::Open });
                    self.tag_expr_baseline = self.expr_depth;
                    self.self_closing = false;
                    self.push(TokenKind::Less, line, column);
                }
                '{' => {
                    self.advance();
                    self.expr_depth += 1;
                    self.push(TokenKind::LBrace, line, column);
                }
                '}' => {
                    // Stray close brace; emit it and let the parser complain.
                    self.advance();
                    self.push(TokenKind::RBrace, line, column);
                }
                '"' | '\'' => {
                    self.scan_string()?;
                }
                _ => {
                    let (kind, len) = cf_kind.expect("structural children start");
                    for _ in 0..len {
                        self.advance();
                    }
                    self.cf = CfHeader { active: true, paren: 0, brace: 0 };
                    self.push(kind, line, column);
                }
            }
            return Ok(());
        }

        self.read_jsx_text();
        Ok(())
    }

    fn cf_keyword_at(&self, at: usize) -> Option<(TokenKind, usize)> {
        for (word, kind) in [
            ("elif", TokenKind::Elif),
            ("else", TokenKind::Else),
            ("if", TokenKind::If),
            ("for", TokenKind::For),
        ] {
            if self.word_at(at, word) {
                return Some((kind, word.len()));
            }
        }
        None
    }

    fn word_at(&self, at: usize, word: &str) -> bool {
        let mut i = at;
        for expected in word.chars() {
            if self.chars.get(i).copied() != Some(expected) {
                return false;
            }
            i += 1;
        }
        let after = self.chars.get(i).copied().unwrap_or('\0');
        !(after.is_alphanumeric() || after == '_')
    }

    fn read_jsx_text(&mut self) {
        // Leading whitespace was not structural, so it belongs to a text
        // child; consume it, then read up to the next structural character
        // or end of line.
        while self.ch().is_whitespace() && !self.at_eof() {
            self.advance();
        }
        let (line, column) = (self.line, self.column);
        let mut text = String::new();
        while !matches!(self.ch(), '<' | '{' | '}' | '\n' | '\0') {
            text.push(self.advance());
        }
        let trimmed = text.trim_end().to_string();
        if !trimmed.is_empty() {
            self.push(TokenKind::JsxText(trimmed), line, column);
        }
    }

    // --- main token dispatch ---

    fn scan_token(&mut self) -> Result<(), CompileError> {
        let (line, column) = (self.line, self.column);
        let c = self.ch();

        match c {
            '(' => {
                self.advance();
                if self.cf.active {
                    self.cf.paren += 1;
                }
                self.push(TokenKind::LParen, line, column);
            }
            ')' => {
                self.advance();
                if self.cf.active && self.cf.paren > 0 {
                    self.cf.paren -= 1;
                }
                self.push(TokenKind::RParen, line, column);
            }
            '[' => {
                self.advance();
                self.push(TokenKind::LBracket, line, column);
            }
            ']' => {
                self.advance();
                self.push(TokenKind::RBracket, line, column);
            }
            '{' => {
                self.advance();
                if self.cf.active {
                    if self.cf.paren == 0 && self.cf.brace == 0 {
                        // The header is done; this brace opens the body.
                        self.cf.active = false;
                        self.jsx_stack.push(JsxFrame::CfBlock { brace_depth: 0 });
                    } else {
                        self.cf.brace += 1;
                    }
                } else if self.tag_mode.is_some() {
                    // Attribute expression; takes priority over any
                    // enclosing control-flow body.
                    self.expr_depth += 1;
                } else if let Some(JsxFrame::CfBlock { brace_depth }) = self.jsx_stack.last_mut() {
                    *brace_depth += 1;
                } else if !self.jsx_stack.is_empty() {
                    self.expr_depth += 1;
                }
                self.push(TokenKind::LBrace, line, column);
            }
            '}' => {
                self.advance();
                if self.cf.active && self.cf.brace > 0 {
                    self.cf.brace -= 1;
                } else if self.tag_mode.is_some() && self.expr_depth > self.tag_expr_baseline {
                    self.expr_depth -= 1;
                } else if let Some(JsxFrame::CfBlock { brace_depth }) = self.jsx_stack.last_mut() {
                    if *brace_depth == 0 {
                        self.jsx_stack.pop();
                    } else {
                        *brace_depth -= 1;
                    }
                } else if !self.jsx_stack.is_empty()
                    && self.expr_depth > self.current_expr_baseline()
                {
                    self.expr_depth -= 1;
                }
                self.push(TokenKind::RBrace, line, column);
            }
            ',' => {
                self.advance();
                self.push(TokenKind::Comma, line, column);
            }
            ';' => {
                self.advance();
                self.push(TokenKind::Semicolon, line, column);
            }
            ':' => {
                self.advance();
                self.push(TokenKind::Colon, line, column);
            }
            '+' => {
                self.advance();
                if self.ch() == '=' {
                    self.advance();
                    self.push(TokenKind::PlusAssign, line, column);
                } else {
                    self.push(TokenKind::Plus, line, column);
                }
            }
            '-' => {
                self.advance();
                if self.ch() == '=' {
                    self.advance();
                    self.push(TokenKind::MinusAssign, line, column);
                } else if self.ch() == '>' {
                    self.advance();
                    self.push(TokenKind::Arrow, line, column);
                } else {
                    self.push(TokenKind::Minus, line, column);
                }
            }
            '*' => {
                self.advance();
                if self.ch() == '*' {
                    self.advance();
                    self.push(TokenKind::StarStar, line, column);
                } else if self.ch() == '=' {
                    self.advance();
                    self.push(TokenKind::StarAssign, line, column);
                } else {
                    self.push(TokenKind::Star, line, column);
                }
            }
            '%' => {
                self.advance();
                if self.ch() == '=' {
                    self.advance();
                    self.push(TokenKind::PercentAssign, line, column);
                } else {
                    self.push(TokenKind::Percent, line, column);
                }
            }
            '=' => {
                self.advance();
                if self.ch() == '=' {
                    self.advance();
                    self.push(TokenKind::Eq, line, column);
                } else if self.ch() == '>' {
                    self.advance();
                    self.push(TokenKind::FatArrow, line, column);
                } else {
                    self.push(TokenKind::Assign, line, column);
                }
            }
            '!' => {
                self.advance();
                if self.ch() == '=' {
                    self.advance();
                    self.push(TokenKind::NotEq, line, column);
                } else {
                    return Err(self.err_at("unexpected character '!'; use 'not'", line, column));
                }
            }
            '<' => {
                if self.tag_mode.is_none() && self.jsx_tag_ahead() {
                    self.advance();
                    self.tag_mode = Some(if self.ch() == '/' { TagMode::Close } else { TagMode::Open });
                    self.tag_expr_baseline = self.expr_depth;
                    self.self_closing = false;
                    self.push(TokenKind::Less, line, column);
                } else {
                    self.advance();
                    if self.ch() == '=' {
                        self.advance();
                        self.push(TokenKind::LessEq, line, column);
                    } else {
                        self.push(TokenKind::Less, line, column);
                    }
                }
            }
            '>' => {
                self.advance();
                if self.tag_mode.is_some() && self.expr_depth == self.tag_expr_baseline {
                    let mode = self.tag_mode.take().expect("tag mode");
                    match mode {
                        TagMode::Open => {
                            if !self.self_closing {
                                self.jsx_stack.push(JsxFrame::Tag { expr_baseline: self.expr_depth });
                            }
                        }
                        TagMode::Close => {
                            self.jsx_stack.pop();
                        }
                    }
                    self.self_closing = false;
                    self.push(TokenKind::Greater, line, column);
                } else if self.ch() == '=' {
                    self.advance();
                    self.push(TokenKind::GreaterEq, line, column);
                } else {
                    self.push(TokenKind::Greater, line, column);
                }
            }
            '/' => {
                if self.tag_mode.is_some() {
                    self.advance();
                    if self.ch() == '>' {
                        self.self_closing = true;
                    }
                    self.push(TokenKind::Slash, line, column);
                } else if self.peek() == '/' {
                    if self.peek_at(2) == '/' {
                        self.scan_docstring();
                    } else {
                        while self.ch() != '\n' && !self.at_eof() {
                            self.advance();
                        }
                    }
                } else if self.peek() == '*' {
                    self.skip_block_comment()?;
                } else if self.prev_token_produces_value() {
                    self.advance();
                    if self.ch() == '=' {
                        self.advance();
                        self.push(TokenKind::SlashAssign, line, column);
                    } else {
                        self.push(TokenKind::Slash, line, column);
                    }
                } else {
                    self.scan_regex()?;
                }
            }
            '?' => {
                self.advance();
                if self.ch() == '?' {
                    self.advance();
                    self.push(TokenKind::QuestionQuestion, line, column);
                } else if self.ch() == '.' {
                    self.advance();
                    self.push(TokenKind::QuestionDot, line, column);
                } else {
                    self.push(TokenKind::Question, line, column);
                }
            }
            '.' => {
                self.advance();
                if self.ch() == '.' {
                    self.advance();
                    if self.ch() == '.' {
                        self.advance();
                        self.push(TokenKind::Ellipsis, line, column);
                    } else if self.ch() == '=' {
                        self.advance();
                        self.push(TokenKind::DotDotEq, line, column);
                    } else {
                        self.push(TokenKind::DotDot, line, column);
                    }
                } else {
                    self.push(TokenKind::Dot, line, column);
                }
            }
            '|' => {
                self.advance();
                if self.ch() == '>' {
                    self.advance();
                    self.push(TokenKind::PipeGreater, line, column);
                } else {
                    return Err(self.err_at("unexpected character '|'; use 'or'", line, column));
                }
            }
            '&' => {
                return Err(self.err_at("unexpected character '&'; use 'and'", line, column));
            }
            '"' | '\'' => {
                self.scan_string()?;
            }
            _ => {
                if c.is_ascii_digit() {
                    self.scan_number()?;
                } else if c.is_ascii_alphabetic() || c == '_' {
                    self.scan_word()?;
                } else {
                    return Err(self.err_at(format!("unexpected character '{}'", c), line, column));
                }
            }
        }

        Ok(())
    }

    // --- comments and docstrings ---

    fn scan_docstring(&mut self) {
        let (line, column) = (self.line, self.column);
        self.advance();
        self.advance();
        self.advance();
        if self.ch() == ' ' {
            self.advance();
        }
        let mut text = String::new();
        while self.ch() != '\n' && !self.at_eof() {
            text.push(self.advance());
        }
        self.push(TokenKind::Docstring(text), line, column);
    }

    fn skip_block_comment(&mut self) -> Result<(), CompileError> {
        let (line, column) = (self.line, self.column);
        self.advance(); // '/'
        self.advance(); // '*'
        let mut depth = 1usize;
        while depth > 0 {
            if self.at_eof() {
                return Err(self.err_at("unterminated block comment", line, column));
            }
            if self.ch() == '/' && self.peek() == '*' {
                self.advance();
                self.advance();
                depth += 1;
            } else if self.ch() == '*' && self.peek() == '/' {
                self.advance();
                self.advance();
                depth -= 1;
            } else {
                self.advance();
            }
        }
        Ok(())
    }

    // --- identifiers, keywords, style blocks ---

    fn scan_word(&mut self) -> Result<(), CompileError> {
        let (line, column) = (self.line, self.column);

        // r"..." raw strings and f"..." explicit interpolation sigil.
        if self.ch() == 'r' && self.peek() == '"' {
            self.advance();
            return self.scan_raw_string(line, column);
        }
        if self.ch() == 'f' && self.peek() == '"' {
            self.advance();
            return self.scan_string_at(line, column);
        }

        let mut word = String::new();
        while self.ch().is_alphanumeric() || self.ch() == '_' {
            word.push(self.advance());
        }

        // `style` immediately followed by `{` (across whitespace) opens a
        // raw CSS capture.
        if word == "style" {
            let mut j = self.pos;
            while j < self.chars.len() && self.chars[j].is_whitespace() {
                j += 1;
            }
            if self.chars.get(j).copied() == Some('{') {
                while self.pos <= j {
                    self.advance();
                }
                return self.scan_style_block(line, column);
            }
        }

        let kind = KEYWORDS
            .get(word.as_str())
            .cloned()
            .unwrap_or(TokenKind::Ident(word));
        // A control-flow keyword met in normal mode never re-arms the JSX
        // header tracker; that only happens in the children sub-loop.
        self.push(kind, line, column);
        Ok(())
    }

    fn scan_style_block(&mut self, line: usize, column: usize) -> Result<(), CompileError> {
        let mut depth = 1usize;
        let mut css = String::new();
        loop {
            match self.ch() {
                '\0' => return Err(self.err_at("unterminated style block", line, column)),
                '{' => {
                    depth += 1;
                    css.push(self.advance());
                }
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        break;
                    }
                    css.push(self.advance());
                }
                '"' | '\'' => {
                    let quote = self.ch();
                    css.push(self.advance());
                    while self.ch() != quote && !self.at_eof() {
                        css.push(self.advance());
                    }
                    if self.at_eof() {
                        return Err(self.err_at("unterminated string in style block", line, column));
                    }
                    css.push(self.advance());
                }
                _ => css.push(self.advance()),
            }
        }
        self.push(TokenKind::StyleBlock(css), line, column);
        Ok(())
    }

    // --- numbers ---

    fn scan_number(&mut self) -> Result<(), CompileError> {
        let (line, column) = (self.line, self.column);
        let mut digits = String::new();

        if self.ch() == '0' && matches!(self.peek(), 'x' | 'X' | 'o' | 'O' | 'b' | 'B') {
            let radix_char = self.peek().to_ascii_lowercase();
            let radix = match radix_char {
                'x' => 16,
                'o' => 8,
                _ => 2,
            };
            self.advance();
            self.advance();
            while self.ch().is_ascii_alphanumeric() || self.ch() == '_' {
                digits.push(self.advance());
            }
            let cleaned: String = digits.chars().filter(|c| *c != '_').collect();
            if cleaned.is_empty() {
                return Err(self.err_at("number literal is missing digits", line, column));
            }
            let value = i64::from_str_radix(&cleaned, radix).map_err(|_| {
                self.err_at(format!("invalid base-{} number literal", radix), line, column)
            })?;
            self.push(TokenKind::Int(value), line, column);
            return Ok(());
        }

        let mut is_float = false;
        while self.ch().is_ascii_digit() || self.ch() == '_' {
            digits.push(self.advance());
        }

        // A dot only joins the number when a digit follows, so `15.minutes`
        // stays member access.
        if self.ch() == '.' && self.peek().is_ascii_digit() {
            is_float = true;
            digits.push(self.advance());
            while self.ch().is_ascii_digit() || self.ch() == '_' {
                digits.push(self.advance());
            }
        }

        // Exponent, backtracking when `e` is not actually an exponent.
        if matches!(self.ch(), 'e' | 'E') {
            let save_pos = self.pos;
            let save_column = self.column;
            let mut exponent = String::new();
            exponent.push(self.advance());
            if matches!(self.ch(), '+' | '-') {
                exponent.push(self.advance());
            }
            if self.ch().is_ascii_digit() {
                while self.ch().is_ascii_digit() || self.ch() == '_' {
                    exponent.push(self.advance());
                }
                digits.push_str(&exponent);
                is_float = true;
            } else {
                self.pos = save_pos;
                self.column = save_column;
            }
        }

        let cleaned: String = digits.chars().filter(|c| *c != '_').collect();
        if is_float {
            let value: f64 = cleaned
                .parse()
                .map_err(|_| self.err_at("invalid number literal", line, column))?;
            self.push(TokenKind::Float(value), line, column);
        } else {
            let value: i64 = cleaned
                .parse()
                .map_err(|_| self.err_at("number literal out of range", line, column))?;
            self.push(TokenKind::Int(value), line, column);
        }
        Ok(())
    }

    // --- regex literals ---

    fn scan_regex(&mut self) -> Result<(), CompileError> {
        let (line, column) = (self.line, self.column);
        self.advance(); // '/'
        let mut pattern = String::new();
        let mut in_class = false;
        loop {
            match self.ch() {
                '\0' | '\n' => return Err(self.err_at("unterminated regex literal", line, column)),
                '\\' => {
                    pattern.push(self.advance());
                    if self.at_eof() {
                        return Err(self.err_at("unterminated regex literal", line, column));
                    }
                    pattern.push(self.advance());
                }
                '[' => {
                    in_class = true;
                    pattern.push(self.advance());
                }
                ']' => {
                    in_class = false;
                    pattern.push(self.advance());
                }
                '/' if !in_class => {
                    self.advance();
                    break;
                }
                _ => pattern.push(self.advance()),
            }
        }
        let mut flags = String::new();
        while self.ch().is_ascii_alphabetic() {
            flags.push(self.advance());
        }
        self.push(TokenKind::Regex { pattern, flags }, line, column);
        Ok(())
    }

    // --- strings ---

    fn scan_string(&mut self) -> Result<(), CompileError> {
        let (line, column) = (self.line, self.column);
        self.scan_string_at(line, column)
    }

    fn scan_string_at(&mut self, line: usize, column: usize) -> Result<(), CompileError> {
        let quote = self.ch();
        if quote == '"' && self.peek() == '"' && self.peek_at(2) == '"' {
            return self.scan_heredoc(line, column);
        }
        self.advance(); // opening quote

        let interpolate = quote == '"';
        let mut parts: Vec<TemplatePart> = Vec::new();
        let mut text = String::new();

        loop {
            match self.ch() {
                '\0' => return Err(self.err_at("unterminated string literal", line, column)),
                c if c == quote => {
                    self.advance();
                    break;
                }
                '\\' => {
                    self.advance();
                    text.push(self.unescape(quote)?);
                }
                '{' if interpolate => {
                    if !text.is_empty() {
                        parts.push(TemplatePart::Text(std::mem::take(&mut text)));
                    }
                    let (source, expr_line, expr_column) = self.capture_interpolation()?;
                    let tokens = self.lex_interpolation(&source, expr_line, expr_column)?;
                    parts.push(TemplatePart::Expr { tokens, source });
                }
                _ => text.push(self.advance()),
            }
        }

        self.finish_string(parts, text, line, column);
        Ok(())
    }

    fn scan_raw_string(&mut self, line: usize, column: usize) -> Result<(), CompileError> {
        self.advance(); // opening quote
        let mut text = String::new();
        loop {
            match self.ch() {
                '\0' => return Err(self.err_at("unterminated raw string literal", line, column)),
                '"' => {
                    self.advance();
                    break;
                }
                _ => text.push(self.advance()),
            }
        }
        self.push(TokenKind::Str(text), line, column);
        Ok(())
    }

    fn scan_heredoc(&mut self, line: usize, column: usize) -> Result<(), CompileError> {
        self.advance();
        self.advance();
        self.advance();

        let mut parts: Vec<TemplatePart> = Vec::new();
        let mut text = String::new();

        loop {
            match self.ch() {
                '\0' => {
                    return Err(self.err_at("unterminated triple-quoted string", line, column))
                }
                '"' if self.peek() == '"' && self.peek_at(2) == '"' => {
                    self.advance();
                    self.advance();
                    self.advance();
                    break;
                }
                '\\' => {
                    self.advance();
                    text.push(self.unescape('"')?);
                }
                '{' => {
                    if !text.is_empty() {
                        parts.push(TemplatePart::Text(std::mem::take(&mut text)));
                    }
                    let (source, expr_line, expr_column) = self.capture_interpolation()?;
                    let tokens = self.lex_interpolation(&source, expr_line, expr_column)?;
                    parts.push(TemplatePart::Expr { tokens, source });
                }
                _ => text.push(self.advance()),
            }
        }

        if !text.is_empty() {
            parts.push(TemplatePart::Text(text));
        }
        let parts = dedent_heredoc(parts);

        // Re-join pure text so an interpolation-free heredoc stays a plain
        // string token.
        if parts.iter().all(|p| matches!(p, TemplatePart::Text(_))) {
            let joined: String = parts
                .into_iter()
                .map(|p| match p {
                    TemplatePart::Text(t) => t,
                    TemplatePart::Expr { .. } => unreachable!(),
                })
                .collect();
            self.push(TokenKind::Str(joined), line, column);
        } else {
            self.push(TokenKind::Template(parts), line, column);
        }
        Ok(())
    }

    fn finish_string(
        &mut self,
        mut parts: Vec<TemplatePart>,
        text: String,
        line: usize,
        column: usize,
    ) {
        if parts.is_empty() {
            self.push(TokenKind::Str(text), line, column);
            return;
        }
        if !text.is_empty() {
            parts.push(TemplatePart::Text(text));
        }
        self.push(TokenKind::Template(parts), line, column);
    }

    fn unescape(&mut self, quote: char) -> Result<char, CompileError> {
        let (line, column) = (self.line, self.column);
        let c = self.advance();
        let resolved = match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            '\\' => '\\',
            '{' => '{',
            '}' => '}',
            '"' => '"',
            '\'' => '\'',
            c if c == quote => c,
            other => {
                return Err(self.err_at(
                    format!("unknown escape sequence '\\{}'", other),
                    line,
                    column,
                ))
            }
        };
        Ok(resolved)
    }

    /// Capture one `{...}` interpolation span by bracket balancing,
    /// respecting nested quoted strings and escapes. Returns the span
    /// source and the position of its first character.
    fn capture_interpolation(&mut self) -> Result<(String, usize, usize), CompileError> {
        let (open_line, open_column) = (self.line, self.column);
        self.advance(); // '{'
        let (expr_line, expr_column) = (self.line, self.column);
        let mut depth = 1usize;
        let mut source = String::new();
        loop {
            match self.ch() {
                '\0' => {
                    return Err(self.err_at(
                        "unterminated interpolation in string literal",
                        open_line,
                        open_column,
                    ))
                }
                '{' => {
                    depth += 1;
                    source.push(self.advance());
                }
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        break;
                    }
                    source.push(self.advance());
                }
                '"' | '\'' => {
                    let quote = self.advance();
                    source.push(quote);
                    loop {
                        match self.ch() {
                            '\0' => {
                                return Err(self.err_at(
                                    "unterminated string inside interpolation",
                                    open_line,
                                    open_column,
                                ))
                            }
                            '\\' => {
                                source.push(self.advance());
                                if !self.at_eof() {
                                    source.push(self.advance());
                                }
                            }
                            c if c == quote => {
                                source.push(self.advance());
                                break;
                            }
                            _ => source.push(self.advance()),
                        }
                    }
                }
                _ => source.push(self.advance()),
            }
        }
        Ok((source, expr_line, expr_column))
    }

    fn lex_interpolation(
        &self,
        source: &str,
        line: usize,
        column: usize,
    ) -> Result<Vec<Token>, CompileError> {
        if self.depth + 1 > self.max_depth {
            return Err(self.err_at(
                format!("string interpolation nested deeper than {} levels", self.max_depth),
                line,
                column,
            ));
        }
        let mut tokens = self.nested(source, line, column).tokenize()?;
        while matches!(
            tokens.last().map(|t| &t.kind),
            Some(TokenKind::Eof) | Some(TokenKind::Newline)
        ) {
            tokens.pop();
        }
        Ok(tokens)
    }
}

/// Heredoc post-processing: strip the newline right after the opening
/// quotes, then remove the common indent of non-empty lines (and of the
/// closing delimiter's line) from every text part.
fn dedent_heredoc(mut parts: Vec<TemplatePart>) -> Vec<TemplatePart> {
    if let Some(TemplatePart::Text(first)) = parts.first_mut() {
        if first.starts_with("\r\n") {
            first.drain(..2);
        } else if first.starts_with('\n') {
            first.remove(0);
        }
    }

    // The whitespace trailing the final newline is the closing delimiter's
    // indentation; it participates in the minimum and is then dropped.
    let mut closing_indent: Option<usize> = None;
    if let Some(TemplatePart::Text(last)) = parts.last_mut() {
        if let Some(idx) = last.rfind('\n') {
            let tail = &last[idx + 1..];
            if tail.chars().all(|c| c == ' ' || c == '\t') {
                closing_indent = Some(tail.chars().count());
                last.truncate(idx);
            }
        }
    }

    let mut min_indent: Option<usize> = closing_indent;
    let mut at_line_start = true;
    for (index, part) in parts.iter().enumerate() {
        match part {
            TemplatePart::Text(text) => {
                let chars: Vec<char> = text.chars().collect();
                let mut i = 0;
                while i < chars.len() {
                    if at_line_start {
                        let mut indent = 0;
                        while i < chars.len() && (chars[i] == ' ' || chars[i] == '\t') {
                            indent += 1;
                            i += 1;
                        }
                        let nonempty = if i < chars.len() {
                            chars[i] != '\n'
                        } else {
                            // The line continues into an interpolation part.
                            index + 1 < parts.len()
                        };
                        if nonempty {
                            min_indent =
                                Some(min_indent.map_or(indent, |m: usize| m.min(indent)));
                        }
                        at_line_start = false;
                        continue;
                    }
                    if chars[i] == '\n' {
                        at_line_start = true;
                    }
                    i += 1;
                }
            }
            TemplatePart::Expr { .. } => {
                at_line_start = false;
            }
        }
    }

    let strip = min_indent.unwrap_or(0);
    if strip == 0 {
        return parts;
    }

    let mut at_line_start = true;
    for part in parts.iter_mut() {
        match part {
            TemplatePart::Text(text) => {
                let mut result = String::with_capacity(text.len());
                let mut stripped = 0usize;
                for c in text.chars() {
                    if at_line_start && stripped < strip && (c == ' ' || c == '\t') {
                        stripped += 1;
                        continue;
                    }
                    if at_line_start && (c != ' ' && c != '\t') {
                        at_line_start = false;
                    }
                    if stripped >= strip {
                        at_line_start = false;
                    }
                    result.push(c);
                    if c == '\n' {
                        at_line_start = true;
                        stripped = 0;
                    }
                }
                *text = result;
            }
            TemplatePart::Expr { .. } => {
                at_line_start = false;
            }
        }
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source, "test.tova")
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn first(source: &str) -> TokenKind {
        kinds(source).into_iter().next().unwrap()
    }

    #[test]
    fn interpolated_string_splits_into_parts() {
        let kind = first(r#""Hello, {name}!""#);
        match kind {
            TokenKind::Template(parts) => {
                assert_eq!(parts.len(), 3);
                assert_eq!(parts[0], TemplatePart::Text("Hello, ".to_string()));
                match &parts[1] {
                    TemplatePart::Expr { tokens, source } => {
                        assert_eq!(source, "name");
                        assert_eq!(tokens.len(), 1);
                        assert!(tokens[0].is_ident("name"));
                    }
                    other => panic!("expected expression part, got {:?}", other),
                }
                assert_eq!(parts[2], TemplatePart::Text("!".to_string()));
            }
            other => panic!("expected template token, got {:?}", other),
        }
    }

    #[test]
    fn plain_string_stays_plain() {
        assert_eq!(first(r#""hello""#), TokenKind::Str("hello".to_string()));
    }

    #[test]
    fn interpolation_positions_point_into_source() {
        let tokens = lex(r#"greet = "hi {user.name}""#, "test.tova").unwrap();
        let template = tokens
            .iter()
            .find_map(|t| match &t.kind {
                TokenKind::Template(parts) => Some(parts.clone()),
                _ => None,
            })
            .unwrap();
        match &template[1] {
            TemplatePart::Expr { tokens, .. } => {
                // `user` begins at column 14 of the original line.
                assert_eq!(tokens[0].line, 1);
                assert_eq!(tokens[0].column, 14);
            }
            other => panic!("expected expression part, got {:?}", other),
        }
    }

    #[test]
    fn nested_interpolation_within_cap() {
        let kind = first(r#""a{ "b{ c }d" }e""#);
        match kind {
            TokenKind::Template(parts) => {
                assert_eq!(parts.len(), 3);
            }
            other => panic!("expected template token, got {:?}", other),
        }
    }

    #[test]
    fn interpolation_depth_cap_is_enforced() {
        let source = r#""a{ "b{ c }" }""#;
        let result = Lexer::new(source, "test.tova")
            .with_max_interpolation_depth(1)
            .tokenize();
        assert!(result.is_err());
    }

    #[test]
    fn heredoc_dedents_common_indent() {
        let source = "\"\"\"\n  hello\n  world\n  \"\"\"";
        assert_eq!(first(source), TokenKind::Str("hello\nworld".to_string()));
    }

    #[test]
    fn heredoc_preserves_relative_indent() {
        let source = "\"\"\"\n  a\n    b\n  \"\"\"";
        assert_eq!(first(source), TokenKind::Str("a\n  b".to_string()));
    }

    #[test]
    fn jsx_expression_child_token_stream() {
        let observed = kinds("<p>{count * 2}</p>");
        let expected = vec![
            TokenKind::Less,
            TokenKind::Ident("p".to_string()),
            TokenKind::Greater,
            TokenKind::LBrace,
            TokenKind::Ident("count".to_string()),
            TokenKind::Star,
            TokenKind::Int(2),
            TokenKind::RBrace,
            TokenKind::Less,
            TokenKind::Slash,
            TokenKind::Ident("p".to_string()),
            TokenKind::Greater,
            TokenKind::Eof,
        ];
        assert_eq!(observed, expected);
    }

    #[test]
    fn jsx_text_children() {
        let observed = kinds("<p>Hello world</p>");
        assert!(observed.contains(&TokenKind::JsxText("Hello world".to_string())));
    }

    #[test]
    fn less_than_stays_comparison_after_value() {
        let observed = kinds("a < b");
        assert_eq!(
            observed,
            vec![
                TokenKind::Ident("a".to_string()),
                TokenKind::Less,
                TokenKind::Ident("b".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn jsx_control_flow_children() {
        let observed = kinds("<div>if ready { <p>go</p> }</div>");
        assert!(observed.contains(&TokenKind::If));
        assert!(observed.contains(&TokenKind::JsxText("go".to_string())));
        // Well-formed source leaves the JSX stack empty, so lexing succeeded
        // all the way to Eof.
        assert_eq!(observed.last(), Some(&TokenKind::Eof));
    }

    #[test]
    fn jsx_unterminated_element_errors() {
        assert!(lex("<div>oops", "test.tova").is_err());
    }

    #[test]
    fn self_closing_tag_does_not_expect_children() {
        let observed = kinds("<br/>");
        assert_eq!(
            observed,
            vec![
                TokenKind::Less,
                TokenKind::Ident("br".to_string()),
                TokenKind::Slash,
                TokenKind::Greater,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn regex_vs_division() {
        let observed = kinds("a / b");
        assert!(observed.contains(&TokenKind::Slash));

        let observed = kinds(r"x = /ab+c/gi");
        assert!(observed.contains(&TokenKind::Regex {
            pattern: "ab+c".to_string(),
            flags: "gi".to_string(),
        }));
    }

    #[test]
    fn regex_character_class_suspends_terminator() {
        let observed = kinds(r"x = /[/]+/");
        assert!(observed.contains(&TokenKind::Regex {
            pattern: "[/]+".to_string(),
            flags: String::new(),
        }));
    }

    #[test]
    fn number_bases_and_separators() {
        assert_eq!(first("1_000_000"), TokenKind::Int(1_000_000));
        assert_eq!(first("0xff"), TokenKind::Int(255));
        assert_eq!(first("0o644"), TokenKind::Int(420));
        assert_eq!(first("0b1010"), TokenKind::Int(10));
        assert_eq!(first("2.5"), TokenKind::Float(2.5));
        assert_eq!(first("1e3"), TokenKind::Float(1000.0));
    }

    #[test]
    fn dot_after_number_is_member_access() {
        let observed = kinds("15.minutes");
        assert_eq!(
            observed,
            vec![
                TokenKind::Int(15),
                TokenKind::Dot,
                TokenKind::Ident("minutes".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn exponent_backtracks_without_digits() {
        let observed = kinds("3e");
        assert_eq!(
            observed,
            vec![TokenKind::Int(3), TokenKind::Ident("e".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn raw_string_skips_escapes() {
        assert_eq!(first(r#"r"a\nb""#), TokenKind::Str("a\\nb".to_string()));
    }

    #[test]
    fn style_block_captures_raw_css() {
        let observed = kinds("style {\n  .button { color: red; }\n}");
        match &observed[0] {
            TokenKind::StyleBlock(css) => {
                assert!(css.contains(".button"));
                assert!(css.contains("color: red;"));
            }
            other => panic!("expected style block, got {:?}", other),
        }
    }

    #[test]
    fn docstring_token() {
        let observed = kinds("/// Adds two numbers.\nfn add() {}");
        assert_eq!(observed[0], TokenKind::Docstring("Adds two numbers.".to_string()));
    }

    #[test]
    fn shebang_is_discarded() {
        let observed = kinds("#!/usr/bin/env tova\nx = 1");
        assert_eq!(observed[0], TokenKind::Ident("x".to_string()));
    }

    #[test]
    fn nested_block_comments() {
        let observed = kinds("/* a /* b */ c */ x");
        assert_eq!(observed[0], TokenKind::Ident("x".to_string()));
    }

    #[test]
    fn client_is_alias_for_browser() {
        assert_eq!(first("client"), TokenKind::Browser);
        assert_eq!(first("browser"), TokenKind::Browser);
    }

    #[test]
    fn newline_tokens_collapse() {
        let observed = kinds("a\n\n\nb");
        assert_eq!(
            observed,
            vec![
                TokenKind::Ident("a".to_string()),
                TokenKind::Newline,
                TokenKind::Ident("b".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unknown_escape_is_fatal() {
        assert!(lex(r#""bad \q escape""#, "test.tova").is_err());
    }

    #[test]
    fn token_positions_are_one_based() {
        let tokens = lex("x = 1\ny = 2", "test.tova").unwrap();
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        let y = tokens.iter().find(|t| t.is_ident("y")).unwrap();
        assert_eq!((y.line, y.column), (2, 1));
    }
}
