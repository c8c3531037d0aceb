//! State handlers: `<var>`, `<set>`, `<push>`, `<splice>`.

use super::{expr_attr, split_top_level, state_path_attr, Compiler, HandlerOutcome, HandlerResult};
use crate::ir::{DirectiveNode, SetOperator, StateDirective, StateMode};
use crate::parse::SourceElement;
use crate::validate::{
    CompilerError, ERR_IMMUTABLE_STATE, ERR_INVALID_OPERATOR, ERR_MISSING_ATTRIBUTE,
    WARN_IGNORED_VALUE,
};

pub fn handle_var(c: &mut Compiler, el: &SourceElement) -> HandlerOutcome {
    let path = state_path_attr(el, "name")?;
    let value = match el.attr_nonempty("value") {
        Some(v) => {
            c.check_expr(v)?;
            v.to_string()
        }
        None => "undefined".to_string(),
    };

    if !el.flag("mutable", true) {
        c.mark_immutable(&path[0]);
    }

    let mut directive = StateDirective::new(StateMode::Init, path);
    directive.value = Some(value);
    Ok(HandlerResult::directive(DirectiveNode::State(directive)))
}

pub fn handle_set(c: &mut Compiler, el: &SourceElement) -> HandlerOutcome {
    let path = mutable_path(c, el)?;
    let op = match el.attr_nonempty("op") {
        Some(raw) => SetOperator::parse(raw).ok_or_else(|| {
            CompilerError::validation(
                ERR_INVALID_OPERATOR,
                &format!("unknown set operator '{}'", raw),
            )
            .with_hint("supported operators: =, +=, -=, *=, /=, ++, --")
        })?,
        None => SetOperator::Assign,
    };

    let mut directive = StateDirective::new(StateMode::Set, path);
    directive.op = Some(op);

    let mut warning = None;
    if op.is_unary() {
        if el.attr_nonempty("value").is_some() {
            warning = Some(CompilerError::validation(
                WARN_IGNORED_VALUE,
                &format!("'value' is ignored by the '{}' operator", op.as_str()),
            ));
        }
    } else {
        let value = el.attr_nonempty("value").ok_or_else(|| {
            CompilerError::validation(
                ERR_MISSING_ATTRIBUTE,
                &format!("operator '{}' requires a 'value' attribute", op.as_str()),
            )
        })?;
        c.check_expr(value)?;
        directive.value = Some(value.to_string());
    }

    let result = HandlerResult::directive(DirectiveNode::State(directive));
    Ok(match warning {
        Some(w) => result.with_warning(w),
        None => result,
    })
}

pub fn handle_push(c: &mut Compiler, el: &SourceElement) -> HandlerOutcome {
    let path = mutable_path(c, el)?;
    let value = expr_attr(c, el, "value")?;

    let mut directive = StateDirective::new(StateMode::Push, path);
    directive.values = Some(vec![value]);
    Ok(HandlerResult::directive(DirectiveNode::State(directive)))
}

pub fn handle_splice(c: &mut Compiler, el: &SourceElement) -> HandlerOutcome {
    let path = mutable_path(c, el)?;
    let index = expr_attr(c, el, "index")?;
    let delete_count = match el.attr_nonempty("deletecount") {
        Some(v) => {
            c.check_expr(v)?;
            v.to_string()
        }
        None => "1".to_string(),
    };
    let values = match el.attr_nonempty("values") {
        Some(raw) => {
            let values = split_top_level(raw, ',');
            for v in &values {
                c.check_expr(v)?;
            }
            values
        }
        None => vec![],
    };

    let mut directive = StateDirective::new(StateMode::Splice, path);
    directive.index = Some(index);
    directive.delete_count = Some(delete_count);
    directive.values = Some(values);
    Ok(HandlerResult::directive(DirectiveNode::State(directive)))
}

/// Target path of a mutation; rejects roots declared `mutable="false"`.
fn mutable_path(c: &Compiler, el: &SourceElement) -> Result<Vec<String>, CompilerError> {
    let path = state_path_attr(el, "name")?;
    if c.is_immutable(&path[0]) {
        return Err(CompilerError::validation(
            ERR_IMMUTABLE_STATE,
            &format!("'{}' was declared immutable", path[0]),
        )
        .with_hint("remove mutable=\"false\" from its <var>"));
    }
    Ok(path)
}
