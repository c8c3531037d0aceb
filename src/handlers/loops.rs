//! Loop handlers: `<repeat>` in array or range mode, and guarded `<while>`.

use super::{expr_attr, identifier_attr, BodyMode, Compiler, HandlerOutcome, HandlerResult};
use crate::ir::{DirectiveNode, LoopDirective, LoopMode, WhileDirective};
use crate::parse::SourceElement;
use crate::validate::{
    CompilerError, ERR_INVALID_LITERAL, ERR_OUT_OF_RANGE, WARN_CLAMPED, WARN_PERFORMANCE,
};

/// Hard ceiling on a range loop's count.
pub const MAX_RANGE_COUNT: i64 = 10_000;
/// Range counts above this compile with a performance warning.
pub const RANGE_WARN_THRESHOLD: i64 = 1_000;
pub const DEFAULT_MAX_ITERATIONS: u32 = 1_000;
pub const MAX_WHILE_ITERATIONS: u32 = 10_000;

pub fn handle_repeat(c: &mut Compiler, el: &SourceElement) -> HandlerOutcome {
    let mut result = HandlerResult::default();

    let mode = match el.attr_nonempty("count") {
        Some(raw) => {
            let count: i64 = raw.parse().map_err(|_| {
                CompilerError::validation(
                    ERR_INVALID_LITERAL,
                    &format!("repeat count '{}' must be an integer literal", raw),
                )
            })?;
            if !(0..=MAX_RANGE_COUNT).contains(&count) {
                return Err(CompilerError::validation(
                    ERR_OUT_OF_RANGE,
                    &format!("repeat count {} is outside 0..={}", count, MAX_RANGE_COUNT),
                ));
            }
            if count > RANGE_WARN_THRESHOLD {
                result.diagnostics.warn(
                    CompilerError::validation(
                        WARN_PERFORMANCE,
                        &format!("repeat count {} renders a large amount of DOM", count),
                    )
                    .with_context(&el.tag),
                );
            }
            LoopMode::Range {
                count: count as u32,
                index: identifier_attr(el, "index", Some("i"))?,
            }
        }
        None => LoopMode::Array {
            source: expr_attr(c, el, "items")?,
            item: identifier_attr(el, "as", Some("item"))?,
            index: match el.attr_nonempty("index") {
                Some(_) => Some(identifier_attr(el, "index", None)?),
                None => None,
            },
        },
    };

    let compiled = c.compile_children(&el.children, BodyMode::Markup);
    let body = result.absorb(compiled);
    result
        .directives
        .push(DirectiveNode::Loop(LoopDirective { mode, body }));
    Ok(result)
}

pub fn handle_while(c: &mut Compiler, el: &SourceElement) -> HandlerOutcome {
    let mut result = HandlerResult::default();
    let condition = expr_attr(c, el, "condition")?;

    let max_iterations = match el.attr_nonempty("maxiterations") {
        None => DEFAULT_MAX_ITERATIONS,
        Some(raw) => {
            let parsed: u64 = raw.parse().map_err(|_| {
                CompilerError::validation(
                    ERR_INVALID_LITERAL,
                    &format!("maxIterations '{}' must be a positive integer", raw),
                )
            })?;
            if parsed == 0 {
                return Err(CompilerError::validation(
                    ERR_OUT_OF_RANGE,
                    "maxIterations must be at least 1",
                ));
            }
            if parsed > MAX_WHILE_ITERATIONS as u64 {
                result.diagnostics.warn(
                    CompilerError::validation(
                        WARN_CLAMPED,
                        &format!(
                            "maxIterations {} clamped to {}",
                            parsed, MAX_WHILE_ITERATIONS
                        ),
                    )
                    .with_context(&el.tag),
                );
                MAX_WHILE_ITERATIONS
            } else {
                parsed as u32
            }
        }
    };

    let compiled = c.compile_children(&el.children, BodyMode::Markup);
    let body = result.absorb(compiled);
    result.directives.push(DirectiveNode::While(WhileDirective {
        condition,
        max_iterations,
        body,
    }));
    Ok(result)
}
