//! Conditional handlers: `<if>`/`<elseif>`/`<else>` chains and `<switch>`.
//!
//! Both produce a typed IR node plus a statement skeleton written by the same
//! chain builders the class emitter calls, so the two views cannot drift.

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;

use super::{expr_attr, required_attr, BodyMode, Compiler, HandlerOutcome, HandlerResult};
use crate::codegen::{write_condition_chain, write_switch_chain, JsWriter};
use crate::ir::{Body, CaseValue, ConditionDirective, DirectiveNode, SwitchCase, SwitchDirective};
use crate::parse::{SourceElement, SourceNode};
use crate::validate::{CompilerError, ERR_STRUCTURE, WARN_DUPLICATE_CASE};

lazy_static! {
    static ref NUMBER_RE: Regex = Regex::new(r"^-?\d+(\.\d+)?$").unwrap();
}

/// Subject variable name used in switch skeletons.
pub const SWITCH_SKELETON_SUBJECT: &str = "__subject";

/// Compile the `<if>` at `siblings[start]` together with the `<elseif>` and
/// `<else>` siblings that follow it. Returns the outcome and how many sibling
/// slots were consumed.
pub fn handle_if_chain(
    c: &mut Compiler,
    siblings: &[SourceNode],
    start: usize,
) -> (HandlerOutcome, usize) {
    let mut branches: Vec<&SourceElement> = Vec::new();
    let mut else_branch: Option<&SourceElement> = None;
    let mut last = start;

    if let Some(head) = siblings[start].as_element() {
        branches.push(head);
    }

    for (offset, node) in siblings[start + 1..].iter().enumerate() {
        if node.is_blank() {
            continue;
        }
        match node.as_element() {
            Some(el) if el.is("elseif") => {
                branches.push(el);
                last = start + 1 + offset;
            }
            Some(el) if el.is("else") => {
                else_branch = Some(el);
                last = start + 1 + offset;
                break;
            }
            _ => break,
        }
    }

    (build_chain(c, &branches, else_branch), last - start + 1)
}

/// A lone `<if>` with no chained siblings.
pub fn handle_if(c: &mut Compiler, el: &SourceElement) -> HandlerOutcome {
    build_chain(c, &[el], None)
}

fn build_chain(
    c: &mut Compiler,
    branches: &[&SourceElement],
    else_branch: Option<&SourceElement>,
) -> HandlerOutcome {
    let mut result = HandlerResult::default();

    let mut compiled = Vec::with_capacity(branches.len());
    for branch in branches {
        let condition = expr_attr(c, branch, "condition").map_err(|e| e.with_context(&branch.tag))?;
        let body = c.compile_children(&branch.children, BodyMode::Markup);
        compiled.push((condition, result.absorb(body)));
    }
    let mut else_body = else_branch.map(|el| {
        let body = c.compile_children(&el.children, BodyMode::Markup);
        result.absorb(body)
    });

    // Fold right so each `elseif` nests inside the previous branch's else slot.
    let mut chain: Option<ConditionDirective> = None;
    for (condition, when_true) in compiled.into_iter().rev() {
        let when_false = match chain.take() {
            Some(next) => Some(Body::wrapping(DirectiveNode::Condition(next))),
            None => else_body.take(),
        };
        chain = Some(ConditionDirective {
            condition,
            when_true,
            when_false,
        });
    }

    let Some(head) = chain else {
        return Err(CompilerError::validation(ERR_STRUCTURE, "empty conditional chain"));
    };

    let mut w = JsWriter::new();
    write_condition_chain(&mut w, &head, &mut |_, _| {});
    result.statement_text = Some(w.finish());
    result.directives.push(DirectiveNode::Condition(head));
    Ok(result)
}

pub fn handle_switch(c: &mut Compiler, el: &SourceElement) -> HandlerOutcome {
    let expr = expr_attr(c, el, "value")?;
    let mut result = HandlerResult::default();
    let mut cases: Vec<SwitchCase> = Vec::new();
    let mut default: Option<Body> = None;
    let mut seen = HashSet::new();

    for child in &el.children {
        if child.is_blank() {
            continue;
        }
        let Some(branch) = child.as_element() else {
            return Err(CompilerError::validation(
                ERR_STRUCTURE,
                "<switch> may only contain <case> and <default> elements",
            ));
        };

        if branch.is("case") {
            let raw = required_attr(branch, "value").map_err(|e| e.with_context("case"))?;
            let value = parse_case_value(raw);
            if !seen.insert(value.to_js()) {
                result.diagnostics.warn(
                    CompilerError::validation(
                        WARN_DUPLICATE_CASE,
                        &format!("duplicate case value {}; only the first can match", raw),
                    )
                    .with_context("case"),
                );
            }
            let body = c.compile_children(&branch.children, BodyMode::Markup);
            cases.push(SwitchCase {
                value,
                body: result.absorb(body),
            });
        } else if branch.is("default") {
            if default.is_some() {
                return Err(CompilerError::validation(
                    ERR_STRUCTURE,
                    "<switch> may contain at most one <default>",
                ));
            }
            let body = c.compile_children(&branch.children, BodyMode::Markup);
            default = Some(result.absorb(body));
        } else {
            return Err(CompilerError::validation(
                ERR_STRUCTURE,
                &format!("<{}> is not allowed inside <switch>", branch.tag),
            ));
        }
    }

    let directive = SwitchDirective {
        expr,
        cases,
        default,
    };
    let mut w = JsWriter::new();
    write_switch_chain(&mut w, SWITCH_SKELETON_SUBJECT, &directive, &mut |_, _| {});
    result.statement_text = Some(w.finish());
    result.directives.push(DirectiveNode::Switch(directive));
    Ok(result)
}

/// Numbers and booleans stay typed; anything else is a string literal.
pub fn parse_case_value(raw: &str) -> CaseValue {
    let trimmed = raw.trim();
    match trimmed {
        "true" => CaseValue::Bool(true),
        "false" => CaseValue::Bool(false),
        _ if NUMBER_RE.is_match(trimmed) => CaseValue::Number(canonical_number(trimmed)),
        _ => CaseValue::Str(raw.to_string()),
    }
}

/// Strip leading zeros from the integer part; `007` is a legacy octal
/// literal and a syntax error in module code.
fn canonical_number(text: &str) -> String {
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text),
    };
    let (int, frac) = match digits.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (digits, None),
    };
    let int = match int.trim_start_matches('0') {
        "" => "0",
        stripped => stripped,
    };
    match frac {
        Some(frac) => format!("{}{}.{}", sign, int, frac),
        None => format!("{}{}", sign, int),
    }
}

impl CaseValue {
    /// JS literal text for the `===` comparison.
    pub fn to_js(&self) -> String {
        match self {
            CaseValue::Number(n) => n.clone(),
            CaseValue::Bool(b) => b.to_string(),
            CaseValue::Str(s) => crate::codegen::js_string(s),
        }
    }
}
