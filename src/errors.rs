use std::fmt;

use crate::diagnostics::Diagnostic;

/// The three failure classes of the front end. Lexical and syntactic errors
/// stop the pipeline at the raising stage; semantic errors are batched by
/// the analyzer and surfaced together.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    Lexer { message: String, file: String, line: usize, column: usize },
    Parser { message: String, file: String, line: usize, column: usize },
    Semantic(Vec<Diagnostic>),
}

impl CompileError {
    pub fn to_diagnostics(&self) -> Vec<Diagnostic> {
        match self {
            CompileError::Lexer { message, file, line, column } => {
                vec![Diagnostic::error(message.clone()).at(file.clone(), *line, *column)]
            }
            CompileError::Parser { message, file, line, column } => {
                vec![Diagnostic::error(message.clone()).at(file.clone(), *line, *column)]
            }
            CompileError::Semantic(diagnostics) => diagnostics.clone(),
        }
    }

    /// Render every diagnostic in the error, with source snippets when the
    /// original text is available.
    pub fn display(&self, source: Option<&str>) -> String {
        self.to_diagnostics()
            .iter()
            .map(|d| d.display(source))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Lexer { message, file, line, column } => {
                write!(f, "{}:{}:{}: {}", file, line, column, message)
            }
            CompileError::Parser { message, file, line, column } => {
                write!(f, "{}:{}:{}: {}", file, line, column, message)
            }
            CompileError::Semantic(diagnostics) => {
                let lines: Vec<String> = diagnostics.iter().map(|d| d.oneline()).collect();
                write!(f, "{}", lines.join("\n"))
            }
        }
    }
}

impl std::error::Error for CompileError {}
