// Form dialect: declarative `form Name { ... }` blocks with fields,
// groups, arrays and multi-step wizards. Forms are a browser-side feature;
// outside a browser context they raise E310.

use std::collections::HashSet;

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
    static ref VALID_VALIDATORS: HashSet<&'static str> = {
        let mut set = HashSet::new();
        set.insert("required");
        set.insert("minLength");
        set.insert("maxLength");
        set.insert("min");
        set.insert("max");
        set.insert("pattern");
        set.insert("email");
        set.insert("matches");
        set.insert("oneOf");
        set.insert("validate");
        set
    };
}

pub(crate) fn parse(parser: &mut Parser) -> Result<Stmt, CompileError> {
    parser.parse_form_declaration()
}

impl Parser {
    pub(crate) fn parse_form_declaration(&mut self) -> Result<Stmt, CompileError> {
        let loc = self.loc();
        self.expect(&TokenKind::Form)?;
        let (name, _) = self.expect_ident()?;
        self.skip_newlines();
        self.expect(&TokenKind::LBrace)?;
        let members = self.parse_form_members()?;
        self.expect(&TokenKind::RBrace)?;
        Ok(Stmt::Form(FormDeclaration { name, members, loc }))
    }

    fn parse_form_members(&mut self) -> Result<Vec<FormMember>, CompileError> {
        let mut members = Vec::new();
        loop {
            self.skip_newlines();
            if self.check(&TokenKind::RBrace) || self.check(&TokenKind::Eof) {
                break;
            }
            if self.cur().is_ident("field") {
                members.push(FormMember::Field(self.parse_form_field()?));
            } else if self.cur().is_ident("group") {
                members.push(FormMember::Group(self.parse_form_group()?));
            } else if self.cur().is_ident("array") {
                members.push(FormMember::Array(self.parse_form_array()?));
            } else if self.cur().is_ident("steps") {
                members.push(FormMember::Steps(self.parse_form_steps()?));
            } else {
                return Err(self.err_expected("'field', 'group', 'array' or 'steps'"));
            }
            self.expect_terminator()?;
        }
        Ok(members)
    }

    /// `field name: Type { required, minLength(3), ... }`; the type and the
    /// validator list are both optional.
    fn parse_form_field(&mut self) -> Result<FormFieldDeclaration, CompileError> {
        let loc = self.loc();
        self.advance(); // field
        let (name, _) = self.expect_ident()?;
        let ty = if self.match_kind(&TokenKind::Colon) {
            Some(self.parse_type_annotation()?)
        } else {
            None
        };
        let mut validators = Vec::new();
        if self.check(&TokenKind::LBrace) {
            self.advance();
            loop {
                self.skip_newlines();
                if self.check(&TokenKind::RBrace) {
                    break;
                }
                let validator_loc = self.loc();
                let (validator_name, _) = self.expect_ident()?;
                let mut args = Vec::new();
                if self.match_kind(&TokenKind::LParen) {
                    loop {
                        if self.check(&TokenKind::RParen) {
                            break;
                        }
                        args.push(self.parse_expression()?);
                        if !self.match_kind(&TokenKind::Comma) {
                            break;
                        }
                    }
                    self.expect(&TokenKind::RParen)?;
                }
                validators.push(ValidatorCall { name: validator_name, args, loc: validator_loc });
                if !self.match_kind(&TokenKind::Comma) {
                    self.skip_newlines();
                    if self.check(&TokenKind::RBrace) {
                        break;
                    }
                }
            }
            self.expect(&TokenKind::RBrace)?;
        }
        Ok(FormFieldDeclaration { name, ty, validators, loc })
    }

    fn parse_form_group(&mut self) -> Result<FormGroup, CompileError> {
        let loc = self.loc();
        self.advance(); // group
        let (name, _) = self.expect_ident()?;
        self.skip_newlines();
        self.expect(&TokenKind::LBrace)?;
        let members = self.parse_form_members()?;
        self.expect(&TokenKind::RBrace)?;
        Ok(FormGroup { name, members, loc })
    }

    fn parse_form_array(&mut self) -> Result<FormArray, CompileError> {
        let loc = self.loc();
        self.advance(); // array
        let (name, _) = self.expect_ident()?;
        self.skip_newlines();
        self.expect(&TokenKind::LBrace)?;
        let members = self.parse_form_members()?;
        self.expect(&TokenKind::RBrace)?;
        Ok(FormArray { name, members, loc })
    }

    /// `steps { step account { email, password } step profile { name } }`
    fn parse_form_steps(&mut self) -> Result<StepsDeclaration, CompileError> {
        let loc = self.loc();
        self.advance(); // steps
        self.skip_newlines();
        self.expect(&TokenKind::LBrace)?;
        let mut steps = Vec::new();
        loop {
            self.skip_newlines();
            if self.check(&TokenKind::RBrace) {
                break;
            }
            if !self.cur().is_ident("step") {
                return Err(self.err_expected("'step'"));
            }
            let step_loc = self.loc();
            self.advance();
            let (name, _) = self.expect_ident()?;
            self.skip_newlines();
            self.expect(&TokenKind::LBrace)?;
            let mut members = Vec::new();
            loop {
                self.skip_newlines();
                if self.check(&TokenKind::RBrace) {
                    break;
                }
                let member_loc = self.loc();
                let (member, _) = self.expect_ident()?;
                members.push(StepMemberRef { name: member, loc: member_loc });
                if !self.match_kind(&TokenKind::Comma) {
                    self.skip_newlines();
                    if self.check(&TokenKind::RBrace) {
                        break;
                    }
                }
            }
            self.expect(&TokenKind::RBrace)?;
            steps.push(FormStep { name, members, loc: step_loc });
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(StepsDeclaration { steps, loc })
    }
}

pub(crate) fn visit(analyzer: &mut Analyzer, stmt: &Stmt) {
    if let Stmt::Form(form) = stmt {
        analyzer.visit_form(form);
    }
}

impl Analyzer {
    fn visit_form(&mut self, form: &FormDeclaration) {
        if self.context() != ScopeContext::Browser {
            self.error(
                Diagnostic::error(format!(
                    "'form {}' requires a browser context",
                    form.name
                ))
                .with_code("E310")
                .with_hint("move this inside a browser { } block")
                .at_loc(&form.loc),
            );
            return;
        }

        self.define(
            Symbol::new(form.name.clone(), SymbolKind::Form, Type::Any).at(form.loc.clone()),
        );

        self.push_scope(ScopeContext::Form, &form.loc);
        let mut member_names = HashSet::new();
        for member in &form.members {
            self.visit_form_member(member, &mut member_names);
        }
        for member in &form.members {
            if let FormMember::Steps(steps) = member {
                self.check_steps(steps, &member_names);
            }
        }
        self.pop_scope();
    }

    fn visit_form_member(&mut self, member: &FormMember, names: &mut HashSet<String>) {
        match member {
            FormMember::Field(field) => {
                names.insert(field.name.clone());
                self.visit_form_field(field);
            }
            FormMember::Group(group) => {
                names.insert(group.name.clone());
                self.define(
                    Symbol::new(group.name.clone(), SymbolKind::FormGroup, Type::Any)
                        .at(group.loc.clone()),
                );
                self.push_scope(ScopeContext::Form, &group.loc);
                let mut inner = HashSet::new();
                for m in &group.members {
                    self.visit_form_member(m, &mut inner);
                }
                self.pop_scope();
            }
            FormMember::Array(array) => {
                names.insert(array.name.clone());
                self.define(
                    Symbol::new(array.name.clone(), SymbolKind::FormArray, Type::Any)
                        .at(array.loc.clone()),
                );
                self.push_scope(ScopeContext::Form, &array.loc);
                let mut inner = HashSet::new();
                for m in &array.members {
                    self.visit_form_member(m, &mut inner);
                }
                self.pop_scope();
            }
            FormMember::Steps(_) => {}
        }
    }

    fn visit_form_field(&mut self, field: &FormFieldDeclaration) {
        let ty = field
            .ty
            .as_ref()
            .map(|ann| self.type_from_annotation(ann))
            .unwrap_or(Type::Unknown);
        self.define(
            Symbol::new(field.name.clone(), SymbolKind::FormField, ty).at(field.loc.clone()),
        );

        for validator in &field.validators {
            if !VALID_VALIDATORS.contains(validator.name.as_str()) {
                self.warn(
                    Diagnostic::warning(format!(
                        "unknown validator '{}' on field '{}'",
                        validator.name, field.name
                    ))
                    .with_code("W_UNKNOWN_VALIDATOR")
                    .at_loc(&validator.loc),
                );
            }
            if validator.name == "pattern" {
                if let Some(Expr::Str(pattern)) = validator.args.first() {
                    if Regex::new(&pattern.value).is_err() {
                        self.warn(
                            Diagnostic::warning(format!(
                                "pattern '{}' is not a valid regular expression",
                                pattern.value
                            ))
                            .with_code("W_BAD_PATTERN")
                            .at_loc(&validator.loc),
                        );
                    }
                }
            }
            for arg in &validator.args {
                self.analyze_expr(arg);
            }
        }
    }

    fn check_steps(&mut self, steps: &StepsDeclaration, members: &HashSet<String>) {
        for step in &steps.steps {
            for member in &step.members {
                if !members.contains(&member.name) {
                    self.warn(
                        Diagnostic::warning(format!(
                            "step '{}' references unknown member '{}'",
                            step.name, member.name
                        ))
                        .with_code("W_STEP_UNKNOWN_MEMBER")
                        .at_loc(&member.loc),
                    );
                }
            }
        }
    }
}
