//! The Tova compiler front end: a context-sensitive lexer, a
//! recursive-descent parser, a scope-building semantic analyzer, and the
//! plugin registry that wires dialect block grammars (server, browser,
//! shared, form, security, deploy, cli, edge, concurrent, bench) into the
//! core pipeline.
//!
//! Data flow: source text -> [`lexer::lex`] -> tokens -> [`parser::parse`]
//! -> [`ast::Program`] -> [`analyzer::analyze`] -> annotated scopes plus
//! diagnostics. Each stage is a pure function of the previous stage's
//! output; independent compilations may run on separate threads.

pub mod analyzer;
pub mod ast;
pub mod diagnostics;
pub mod errors;
pub mod lexer;
pub mod parser;
pub mod plugins;
pub mod registry;
pub mod scope;
pub mod token;
pub mod types;

pub use analyzer::{analyze, analyze_with_options, Analysis, Analyzer, AnalyzerOptions};
pub use errors::CompileError;
pub use lexer::lex;
pub use parser::parse;

/// Everything the front end produces for downstream consumers (codegen,
/// tooling): the parsed program and the analysis result.
#[derive(Debug)]
pub struct FrontEndOutput {
    pub program: ast::Program,
    pub analysis: Analysis,
}

/// Run the whole front end on one source file.
pub fn compile_front(source: &str, filename: &str) -> Result<FrontEndOutput, CompileError> {
    let tokens = lexer::lex(source, filename)?;
    let program = parser::parse(tokens, filename)?;
    let analysis = analyzer::analyze(&program, filename)?;
    Ok(FrontEndOutput { program, analysis })
}
