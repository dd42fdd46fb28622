use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(kind: TokenKind, line: usize, column: usize) -> Self {
        Self { kind, line, column }
    }

    /// True when this token can end an expression. Used by the lexer to
    /// decide whether a following `<` is a comparison and a following `/`
    /// is division (as opposed to a JSX tag or a regex literal).
    pub fn produces_value(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Ident(_)
                | TokenKind::Int(_)
                | TokenKind::Float(_)
                | TokenKind::Str(_)
                | TokenKind::Template(_)
                | TokenKind::Regex { .. }
                | TokenKind::Bool(_)
                | TokenKind::Nil
                | TokenKind::RParen
                | TokenKind::RBracket
                | TokenKind::RBrace
        )
    }

    pub fn is_ident(&self, name: &str) -> bool {
        matches!(&self.kind, TokenKind::Ident(s) if s == name)
    }

    pub fn ident_value(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Ident(s) => Some(s),
            _ => None,
        }
    }
}

/// One segment of an interpolated string literal. The lexer re-lexes each
/// `{...}` span with a nested lexer, so expression parts carry a ready
/// token stream alongside the original source text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TemplatePart {
    Text(String),
    Expr { tokens: Vec<Token>, source: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TokenKind {
    // Literals
    Int(i64),
    Float(f64),
    Str(String),
    Template(Vec<TemplatePart>),
    Regex { pattern: String, flags: String },
    Bool(bool),
    Nil,
    Ident(String),
    Docstring(String),
    JsxText(String),
    StyleBlock(String),

    // Keywords
    Var,
    Let,
    Fn,
    Type,
    If,
    Elif,
    Else,
    For,
    While,
    In,
    Match,
    Try,
    Catch,
    Finally,
    Return,
    Break,
    Continue,
    Import,
    Export,
    From,
    As,
    And,
    Or,
    Not,
    Server,
    Browser,
    Shared,
    State,
    Computed,
    Effect,
    Component,
    Store,
    Form,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    StarStar,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    PipeGreater,      // |>
    Arrow,            // ->
    FatArrow,         // =>
    Question,
    QuestionDot,
    QuestionQuestion,
    Dot,
    DotDot,
    DotDotEq,
    Ellipsis,         // ...

    // Delimiters
    Colon,
    Comma,
    Semicolon,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,

    // Meta
    Newline,
    Eof,
}

impl TokenKind {
    /// The source spelling of a keyword token, if this is one. Lets the
    /// parser accept keywords where the grammar wants a plain name (member
    /// access like `x.type`, JSX attributes like `for`).
    pub fn keyword_name(&self) -> Option<&'static str> {
        matches!(
            self,
            TokenKind::Var
                | TokenKind::Let
                | TokenKind::Fn
                | TokenKind::Type
                | TokenKind::If
                | TokenKind::Elif
                | TokenKind::Else
                | TokenKind::For
                | TokenKind::While
                | TokenKind::In
                | TokenKind::Match
                | TokenKind::Try
                | TokenKind::Catch
                | TokenKind::Finally
                | TokenKind::Return
                | TokenKind::Break
                | TokenKind::Continue
                | TokenKind::Import
                | TokenKind::Export
                | TokenKind::From
                | TokenKind::As
                | TokenKind::And
                | TokenKind::Or
                | TokenKind::Not
                | TokenKind::Server
                | TokenKind::Browser
                | TokenKind::Shared
                | TokenKind::State
                | TokenKind::Computed
                | TokenKind::Effect
                | TokenKind::Component
                | TokenKind::Store
                | TokenKind::Form
        )
        .then(|| self.lexeme())
    }

    /// Short human-readable name for error messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Int(n) => format!("number {}", n),
            TokenKind::Float(n) => format!("number {}", n),
            TokenKind::Str(_) => "string".to_string(),
            TokenKind::Template(_) => "string".to_string(),
            TokenKind::Regex { .. } => "regex".to_string(),
            TokenKind::Bool(b) => format!("{}", b),
            TokenKind::Nil => "nil".to_string(),
            TokenKind::Ident(name) => format!("'{}'", name),
            TokenKind::Docstring(_) => "doc comment".to_string(),
            TokenKind::JsxText(_) => "JSX text".to_string(),
            TokenKind::StyleBlock(_) => "style block".to_string(),
            TokenKind::Newline => "end of line".to_string(),
            TokenKind::Eof => "end of file".to_string(),
            other => format!("'{}'", other.lexeme()),
        }
    }

    fn lexeme(&self) -> &'static str {
        match self {
            TokenKind::Var => "var",
            TokenKind::Let => "let",
            TokenKind::Fn => "fn",
            TokenKind::Type => "type",
            TokenKind::If => "if",
            TokenKind::Elif => "elif",
            TokenKind::Else => "else",
            TokenKind::For => "for",
            TokenKind::While => "while",
            TokenKind::In => "in",
            TokenKind::Match => "match",
            TokenKind::Try => "try",
            TokenKind::Catch => "catch",
            TokenKind::Finally => "finally",
            TokenKind::Return => "return",
            TokenKind::Break => "break",
            TokenKind::Continue => "continue",
            TokenKind::Import => "import",
            TokenKind::Export => "export",
            TokenKind::From => "from",
            TokenKind::As => "as",
            TokenKind::And => "and",
            TokenKind::Or => "or",
            TokenKind::Not => "not",
            TokenKind::Server => "server",
            TokenKind::Browser => "browser",
            TokenKind::Shared => "shared",
            TokenKind::State => "state",
            TokenKind::Computed => "computed",
            TokenKind::Effect => "effect",
            TokenKind::Component => "component",
            TokenKind::Store => "store",
            TokenKind::Form => "form",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::StarStar => "**",
            TokenKind::Assign => "=",
            TokenKind::PlusAssign => "+=",
            TokenKind::MinusAssign => "-=",
            TokenKind::StarAssign => "*=",
            TokenKind::SlashAssign => "/=",
            TokenKind::PercentAssign => "%=",
            TokenKind::Eq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Less => "<",
            TokenKind::LessEq => "<=",
            TokenKind::Greater => ">",
            TokenKind::GreaterEq => ">=",
            TokenKind::PipeGreater => "|>",
            TokenKind::Arrow => "->",
            TokenKind::FatArrow => "=>",
            TokenKind::Question => "?",
            TokenKind::QuestionDot => "?.",
            TokenKind::QuestionQuestion => "??",
            TokenKind::Dot => ".",
            TokenKind::DotDot => "..",
            TokenKind::DotDotEq => "..=",
            TokenKind::Ellipsis => "...",
            TokenKind::Colon => ":",
            TokenKind::Comma => ",",
            TokenKind::Semicolon => ";",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            _ => "?",
        }
    }
}

lazy_static::lazy_static! {
    pub static ref KEYWORDS: std::collections::HashMap<&'static str, TokenKind> = {
        let mut map = std::collections::HashMap::new();
        map.insert("var", TokenKind::Var);
        map.insert("let", TokenKind::Let);
        map.insert("fn", TokenKind::Fn);
        map.insert("type", TokenKind::Type);
        map.insert("if", TokenKind::If);
        map.insert("elif", TokenKind::Elif);
        map.insert("else", TokenKind::Else);
        map.insert("for", TokenKind::For);
        map.insert("while", TokenKind::While);
        map.insert("in", TokenKind::In);
        map.insert("match", TokenKind::Match);
        map.insert("try", TokenKind::Try);
        map.insert("catch", TokenKind::Catch);
        map.insert("finally", TokenKind::Finally);
        map.insert("return", TokenKind::Return);
        map.insert("break", TokenKind::Break);
        map.insert("continue", TokenKind::Continue);
        map.insert("import", TokenKind::Import);
        map.insert("export", TokenKind::Export);
        map.insert("from", TokenKind::From);
        map.insert("as", TokenKind::As);
        map.insert("and", TokenKind::And);
        map.insert("or", TokenKind::Or);
        map.insert("not", TokenKind::Not);
        map.insert("server", TokenKind::Server);
        map.insert("browser", TokenKind::Browser);
        // Legacy block keyword, kept as an alias for `browser`.
        map.insert("client", TokenKind::Browser);
        map.insert("shared", TokenKind::Shared);
        map.insert("state", TokenKind::State);
        map.insert("computed", TokenKind::Computed);
        map.insert("effect", TokenKind::Effect);
        map.insert("component", TokenKind::Component);
        map.insert("store", TokenKind::Store);
        map.insert("form", TokenKind::Form);
        map.insert("true", TokenKind::Bool(true));
        map.insert("false", TokenKind::Bool(false));
        map.insert("nil", TokenKind::Nil);
        map
    };
}
