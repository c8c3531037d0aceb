//! Collaborator oracles
//!
//! The compiler treats content validation and final-output checking as pure
//! functions behind two traits. `PatternValidator` and `OxcSyntaxChecker` are
//! the default implementations; callers may inject their own.

use lazy_static::lazy_static;
use oxc_allocator::Allocator;
use oxc_ast::ast::{Argument, CallExpression, Expression, NewExpression};
use oxc_ast_visit::{walk, Visit};
use oxc_parser::Parser;
use oxc_span::SourceType;
use regex::Regex;
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════════
// CONTENT VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViolationKind {
    ScriptInjection,
    DangerousUrl,
    InlineHandler,
    DynamicCode,
    PrototypePollution,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub kind: ViolationKind,
    pub message: String,
}

pub trait ContentValidator: Send + Sync {
    /// Every pattern violation found in `text`; empty when clean.
    fn validate(&self, text: &str) -> Vec<Violation>;

    /// Escape `text` for embedding inside a JS template literal.
    fn escape_for_template(&self, text: &str) -> String;
}

lazy_static! {
    static ref CONTENT_PATTERNS: Vec<(Regex, ViolationKind, &'static str)> = vec![
        (
            Regex::new(r"(?i)<\s*/?\s*script\b").unwrap(),
            ViolationKind::ScriptInjection,
            "script tags are not allowed in component content",
        ),
        (
            Regex::new(r"(?i)\b(javascript|vbscript)\s*:").unwrap(),
            ViolationKind::DangerousUrl,
            "script URLs are not allowed",
        ),
        (
            Regex::new(r"(?i)data\s*:\s*text/html").unwrap(),
            ViolationKind::DangerousUrl,
            "HTML data URLs are not allowed",
        ),
        (
            Regex::new(r"(?i)<[^>]*\son[a-z]+\s*=").unwrap(),
            ViolationKind::InlineHandler,
            "inline event handler attributes are not allowed; use <event>",
        ),
        (
            Regex::new(r"\beval\s*\(").unwrap(),
            ViolationKind::DynamicCode,
            "eval() is not allowed",
        ),
        (
            Regex::new(r"\bnew\s+Function\b|\bFunction\s*\(").unwrap(),
            ViolationKind::DynamicCode,
            "the Function constructor is not allowed",
        ),
        (
            Regex::new(r"\bdocument\s*\.\s*write(ln)?\b").unwrap(),
            ViolationKind::DynamicCode,
            "document.write is not allowed",
        ),
        (
            Regex::new(r"\bimport\s*\(").unwrap(),
            ViolationKind::DynamicCode,
            "dynamic import() is not allowed",
        ),
        (
            Regex::new(r"__proto__|\bconstructor\s*\.\s*prototype\b").unwrap(),
            ViolationKind::PrototypePollution,
            "prototype access is not allowed",
        ),
    ];
}

/// Regex pattern list over raw text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternValidator;

impl ContentValidator for PatternValidator {
    fn validate(&self, text: &str) -> Vec<Violation> {
        CONTENT_PATTERNS
            .iter()
            .filter(|(re, _, _)| re.is_match(text))
            .map(|(_, kind, message)| Violation {
                kind: *kind,
                message: message.to_string(),
            })
            .collect()
    }

    fn escape_for_template(&self, text: &str) -> String {
        text.replace('\\', "\\\\")
            .replace('`', "\\`")
            .replace("${", "\\${")
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT SYNTAX CHECK
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntaxReport {
    pub passed: bool,
    pub syntax_errors: Vec<String>,
    pub violations: Vec<String>,
}

pub trait SyntaxChecker: Send + Sync {
    /// Does `code` parse, and does it reference any forbidden call?
    fn check(&self, code: &str) -> SyntaxReport;
}

const FORBIDDEN_CALLEES: &[&str] = &[
    "eval",
    "window.eval",
    "globalThis.eval",
    "Function",
    "window.Function",
    "globalThis.Function",
    "document.write",
    "document.writeln",
];

const STRING_TIMER_CALLEES: &[&str] = &[
    "setTimeout",
    "setInterval",
    "window.setTimeout",
    "window.setInterval",
];

/// Parses generated JavaScript with oxc and walks it for banned calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct OxcSyntaxChecker;

impl SyntaxChecker for OxcSyntaxChecker {
    fn check(&self, code: &str) -> SyntaxReport {
        let allocator = Allocator::default();
        let source_type = SourceType::default().with_module(true);
        let ret = Parser::new(&allocator, code, source_type).parse();

        let syntax_errors: Vec<String> = ret.errors.iter().map(|e| e.to_string()).collect();
        if ret.panicked || !syntax_errors.is_empty() {
            return SyntaxReport {
                passed: false,
                syntax_errors,
                violations: vec![],
            };
        }

        let mut collector = ForbiddenCallCollector::default();
        collector.visit_program(&ret.program);

        SyntaxReport {
            passed: collector.violations.is_empty(),
            syntax_errors,
            violations: collector.violations,
        }
    }
}

#[derive(Default)]
struct ForbiddenCallCollector {
    violations: Vec<String>,
}

impl ForbiddenCallCollector {
    fn check_callee(&mut self, callee: &Expression, first_arg: Option<&Argument>) {
        let Some(name) = callee_path(callee) else {
            return;
        };
        if FORBIDDEN_CALLEES.contains(&name.as_str()) {
            self.violations.push(format!("forbidden call to {}()", name));
        } else if STRING_TIMER_CALLEES.contains(&name.as_str()) {
            let string_arg = matches!(
                first_arg,
                Some(Argument::StringLiteral(_)) | Some(Argument::TemplateLiteral(_))
            );
            if string_arg {
                self.violations
                    .push(format!("{}() with a string body is forbidden", name));
            }
        }
    }
}

impl<'a> Visit<'a> for ForbiddenCallCollector {
    fn visit_call_expression(&mut self, expr: &CallExpression<'a>) {
        self.check_callee(&expr.callee, expr.arguments.first());
        walk::walk_call_expression(self, expr);
    }

    fn visit_new_expression(&mut self, expr: &NewExpression<'a>) {
        self.check_callee(&expr.callee, expr.arguments.first());
        walk::walk_new_expression(self, expr);
    }
}

/// Dotted name of a callee made only of identifiers and static members.
fn callee_path(expr: &Expression) -> Option<String> {
    match expr {
        Expression::Identifier(ident) => Some(ident.name.to_string()),
        Expression::ThisExpression(_) => Some("this".to_string()),
        Expression::StaticMemberExpression(member) => {
            callee_path(&member.object).map(|obj| format!("{}.{}", obj, member.property.name))
        }
        Expression::ParenthesizedExpression(paren) => callee_path(&paren.expression),
        _ => None,
    }
}
