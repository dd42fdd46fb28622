// Plugin registry: a static list of dialect descriptors consulted by the
// parser (first-token dispatch) and the analyzer (AST-kind visitor table,
// pre-passes, cross-block validation). Registering a plugin a program
// never uses costs one table entry; there is no runtime installation step.

use crate::analyzer::Analyzer;
use crate::ast::{Program, Stmt};
use crate::errors::CompileError;
use crate::parser::Parser;
use crate::plugins;
use crate::token::TokenKind;

pub enum Detection {
    /// The block starts with a reserved keyword token.
    Keyword(TokenKind),
    /// The block starts with a contextual identifier; `lookahead` confirms
    /// the reading when the identifier could also begin an expression.
    Identifier {
        value: &'static str,
        lookahead: Option<fn(&Parser) -> bool>,
    },
}

pub struct PluginSpec {
    pub name: &'static str,
    /// AST kinds this plugin's visitor owns (see `Stmt::kind_name`).
    pub ast_kinds: &'static [&'static str],
    pub detection: Detection,
    pub parse: fn(&mut Parser) -> Result<Stmt, CompileError>,
    pub visit: fn(&mut Analyzer, &Stmt),
    pub pre_pass: Option<fn(&mut Analyzer, &Program)>,
    pub cross_block_validate: Option<fn(&mut Analyzer, &Program)>,
}

fn plain_block(parser: &Parser) -> bool {
    parser.block_follows(false)
}

fn named_block(parser: &Parser) -> bool {
    parser.block_follows(true)
}

static PLUGINS: &[PluginSpec] = &[
    PluginSpec {
        name: "server",
        ast_kinds: &[
            "ServerBlock",
            "RouteDeclaration",
            "RouteGroup",
            "MiddlewareDeclaration",
            "WebSocketDeclaration",
            "DbDeclaration",
            "ServerConfigDeclaration",
        ],
        detection: Detection::Keyword(TokenKind::Server),
        parse: plugins::server::parse,
        visit: plugins::server::visit,
        pre_pass: Some(plugins::server::pre_pass),
        cross_block_validate: None,
    },
    PluginSpec {
        name: "browser",
        ast_kinds: &[
            "BrowserBlock",
            "StateDeclaration",
            "ComputedDeclaration",
            "EffectDeclaration",
            "ComponentDeclaration",
            "StoreDeclaration",
            "StyleDeclaration",
        ],
        detection: Detection::Keyword(TokenKind::Browser),
        parse: plugins::browser::parse,
        visit: plugins::browser::visit,
        pre_pass: None,
        cross_block_validate: None,
    },
    PluginSpec {
        name: "shared",
        ast_kinds: &["SharedBlock"],
        detection: Detection::Keyword(TokenKind::Shared),
        parse: plugins::shared::parse,
        visit: plugins::shared::visit,
        pre_pass: None,
        cross_block_validate: None,
    },
    PluginSpec {
        name: "form",
        ast_kinds: &["FormDeclaration"],
        detection: Detection::Keyword(TokenKind::Form),
        parse: plugins::form::parse,
        visit: plugins::form::visit,
        pre_pass: None,
        cross_block_validate: None,
    },
    PluginSpec {
        name: "security",
        ast_kinds: &["SecurityBlock"],
        detection: Detection::Identifier { value: "security", lookahead: Some(plain_block) },
        parse: plugins::security::parse,
        visit: plugins::security::visit,
        pre_pass: Some(plugins::security::pre_pass),
        cross_block_validate: None,
    },
    PluginSpec {
        name: "deploy",
        ast_kinds: &["DeployBlock"],
        detection: Detection::Identifier { value: "deploy", lookahead: Some(plain_block) },
        parse: plugins::deploy::parse,
        visit: plugins::deploy::visit,
        pre_pass: None,
        cross_block_validate: None,
    },
    PluginSpec {
        name: "cli",
        ast_kinds: &["CliBlock"],
        detection: Detection::Identifier { value: "cli", lookahead: Some(named_block) },
        parse: plugins::cli::parse,
        visit: plugins::cli::visit,
        pre_pass: None,
        cross_block_validate: None,
    },
    PluginSpec {
        name: "edge",
        ast_kinds: &["EdgeBlock"],
        detection: Detection::Identifier { value: "edge", lookahead: Some(plain_block) },
        parse: plugins::edge::parse,
        visit: plugins::edge::visit,
        pre_pass: Some(plugins::edge::pre_pass),
        cross_block_validate: Some(plugins::edge::cross_block_validate),
    },
    PluginSpec {
        name: "concurrent",
        ast_kinds: &["ConcurrentBlock"],
        detection: Detection::Identifier { value: "concurrent", lookahead: Some(plain_block) },
        parse: plugins::concurrent::parse,
        visit: plugins::concurrent::visit,
        pre_pass: None,
        cross_block_validate: None,
    },
    PluginSpec {
        name: "bench",
        ast_kinds: &["BenchBlock"],
        detection: Detection::Identifier { value: "bench", lookahead: Some(named_block) },
        parse: plugins::bench::parse,
        visit: plugins::bench::visit,
        pre_pass: None,
        cross_block_validate: None,
    },
];

pub fn plugins() -> &'static [PluginSpec] {
    PLUGINS
}

/// Match the parser's current token against the plugin dispatch table.
pub fn detect(parser: &Parser) -> Option<&'static PluginSpec> {
    for plugin in PLUGINS {
        match &plugin.detection {
            Detection::Keyword(kind) => {
                if parser.kind() == kind {
                    return Some(plugin);
                }
            }
            Detection::Identifier { value, lookahead } => {
                if parser.cur().is_ident(value) && lookahead.map_or(true, |check| check(parser)) {
                    return Some(plugin);
                }
            }
        }
    }
    None
}

/// Find the plugin owning an AST kind, for the analyzer's visitor table.
pub fn visitor_for(kind_name: &str) -> Option<&'static PluginSpec> {
    PLUGINS
        .iter()
        .find(|plugin| plugin.ast_kinds.contains(&kind_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_plugin_name_is_unique() {
        let mut names: Vec<&str> = plugins().iter().map(|p| p.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), plugins().len());
    }

    #[test]
    fn ast_kinds_do_not_overlap() {
        let mut kinds: Vec<&str> = plugins().iter().flat_map(|p| p.ast_kinds).copied().collect();
        let total = kinds.len();
        kinds.sort_unstable();
        kinds.dedup();
        assert_eq!(kinds.len(), total);
    }

    #[test]
    fn visitor_lookup_finds_owner() {
        assert_eq!(visitor_for("FormDeclaration").map(|p| p.name), Some("form"));
        assert_eq!(visitor_for("RouteDeclaration").map(|p| p.name), Some("server"));
        assert!(visitor_for("Assignment").is_none());
    }
}
