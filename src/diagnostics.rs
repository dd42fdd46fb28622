// Diagnostics for the Tova front end. Errors and warnings are plain values
// with a stable code, a 1-based source position, and an optional fix-it
// hint; only the pipeline facade decides whether a batch becomes an Err.

use colored::Colorize;
use serde::Serialize;

use crate::ast::Loc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }

    fn paint(&self, text: &str) -> String {
        match self {
            Severity::Error => text.red().bold().to_string(),
            Severity::Warning => text.yellow().bold().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: Option<String>,
    pub message: String,
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub hint: Option<String>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            code: None,
            message: message.into(),
            file: String::new(),
            line: 0,
            column: 0,
            hint: None,
            notes: Vec::new(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            ..Diagnostic::error(message)
        }
    }

    pub fn at(mut self, file: impl Into<String>, line: usize, column: usize) -> Self {
        self.file = file.into();
        self.line = line;
        self.column = column;
        self
    }

    pub fn at_loc(self, loc: &Loc) -> Self {
        let file = loc.file.to_string();
        self.at(file, loc.line, loc.column)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Machine-readable form for editors and the playground.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("diagnostic is serializable")
    }

    /// One-line rendering used by `Display` impls and test assertions.
    pub fn oneline(&self) -> String {
        match &self.code {
            Some(code) => format!(
                "{}:{}:{}: [{}] {}",
                self.file, self.line, self.column, code, self.message
            ),
            None => format!("{}:{}:{}: {}", self.file, self.line, self.column, self.message),
        }
    }

    /// Render the diagnostic with colors, an optional source snippet with a
    /// caret under the offending column, and the hint/note trailers.
    pub fn display(&self, source: Option<&str>) -> String {
        let mut out = String::new();

        let label = match &self.code {
            Some(code) => format!("{}[{}]", self.severity.label(), code),
            None => self.severity.label().to_string(),
        };
        out.push_str(&format!(
            "{}{} {}\n",
            self.severity.paint(&label),
            self.severity.paint(":"),
            self.message.bold()
        ));

        if self.line > 0 {
            out.push_str(&format!(
                "  {} {}:{}:{}\n",
                "-->".dimmed(),
                self.file,
                self.line,
                self.column
            ));
            if let Some(source) = source {
                out.push_str(&self.snippet(source));
            }
        }

        if let Some(hint) = &self.hint {
            out.push_str(&format!("  {} {}\n", "help:".green().bold(), hint));
        }
        for note in &self.notes {
            out.push_str(&format!("  {} {}\n", "note:".cyan(), note));
        }

        out
    }

    fn snippet(&self, source: &str) -> String {
        let lines: Vec<&str> = source.lines().collect();
        if self.line == 0 || self.line > lines.len() {
            return String::new();
        }

        let mut out = String::new();
        let text = lines[self.line - 1];
        let gutter_width = self.line.to_string().len();

        out.push_str(&format!(
            "   {} {} {}\n",
            format!("{:>width$}", self.line, width = gutter_width).cyan(),
            "|".dimmed(),
            text
        ));

        let padding = " ".repeat(self.column.saturating_sub(1));
        out.push_str(&format!(
            "   {} {} {}{}\n",
            " ".repeat(gutter_width),
            "|".dimmed(),
            padding,
            self.severity.paint("^")
        ));

        out
    }
}

/// Accumulator used by the analyzer: errors batch up and surface together
/// at the end of the traversal, warnings ride along with the result.
#[derive(Debug, Default)]
pub struct DiagnosticBag {
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

impl DiagnosticBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => self.errors.push(diagnostic),
            Severity::Warning => self.warnings.push(diagnostic),
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oneline_includes_code_and_position() {
        let diag = Diagnostic::error("state requires a browser context")
            .with_code("E302")
            .at("app.tova", 3, 5);
        assert_eq!(diag.oneline(), "app.tova:3:5: [E302] state requires a browser context");
    }

    #[test]
    fn display_renders_snippet_caret() {
        colored::control::set_override(false);
        let diag = Diagnostic::error("unexpected character")
            .at("app.tova", 2, 3);
        let shown = diag.display(Some("a = 1\nb £ 2\n"));
        assert!(shown.contains("b £ 2"));
        assert!(shown.contains("^"));
        colored::control::unset_override();
    }

    #[test]
    fn bag_routes_by_severity() {
        let mut bag = DiagnosticBag::new();
        bag.push(Diagnostic::warning("w"));
        bag.push(Diagnostic::error("e"));
        assert_eq!(bag.warnings.len(), 1);
        assert_eq!(bag.errors.len(), 1);
        assert!(bag.has_errors());
    }
}
