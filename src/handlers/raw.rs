//! Raw statement handlers: `<comment>`, `<print>`, `<call>`, `<function>`,
//! `<array>`, `<object>`.

use serde_json::Value;

use super::{
    expr_attr, identifier_attr, required_attr, BodyMode, Compiler, HandlerOutcome, HandlerResult,
};
use crate::ir::{DirectiveNode, RawKind, RawStatement};
use crate::parse::SourceElement;
use crate::validate::{
    is_valid_callee, parse_identifier_list, CompilerError, ERR_DISALLOWED_CALL,
    ERR_INVALID_IDENTIFIER, ERR_INVALID_LITERAL, ERR_MISSING_ATTRIBUTE, ERR_STRUCTURE,
};

/// Callees a `<call>` may never name.
const DISALLOWED_CALLEES: &[&str] = &[
    "eval",
    "Function",
    "setTimeout",
    "setInterval",
    "document.write",
    "document.writeln",
    "window.eval",
    "window.setTimeout",
    "window.setInterval",
    "globalThis.eval",
];

fn raw(kind: RawKind, code: String) -> HandlerOutcome {
    Ok(HandlerResult::directive(DirectiveNode::RawStatement(
        RawStatement { kind, code },
    )))
}

pub fn handle_comment(_c: &mut Compiler, el: &SourceElement) -> HandlerOutcome {
    let text = match el.attr_nonempty("text") {
        Some(t) => t.to_string(),
        None => el.text_content().trim().to_string(),
    };
    raw(RawKind::Comment, format!("/* {} */", text.replace("*/", "* /")))
}

pub fn handle_print(c: &mut Compiler, el: &SourceElement) -> HandlerOutcome {
    let value = expr_attr(c, el, "value")?;
    raw(RawKind::Print, format!("console.log({});", value))
}

pub fn handle_call(c: &mut Compiler, el: &SourceElement) -> HandlerOutcome {
    let callee = required_attr(el, "function")?.trim();
    if !is_valid_callee(callee) {
        return Err(CompilerError::validation(
            ERR_INVALID_IDENTIFIER,
            &format!("'{}' is not a callable name", callee),
        ));
    }
    if DISALLOWED_CALLEES.contains(&callee) {
        return Err(CompilerError::security(
            ERR_DISALLOWED_CALL,
            &format!("calling {}() is not allowed", callee),
        ));
    }
    let args = match el.attr_nonempty("args") {
        Some(_) => expr_attr(c, el, "args")?,
        None => String::new(),
    };
    raw(RawKind::Call, format!("{}({});", callee, args))
}

/// Local helper declared as an arrow function so `this` stays the component.
pub fn handle_function(c: &mut Compiler, el: &SourceElement) -> HandlerOutcome {
    let name = identifier_attr(el, "name", None)?;
    let params = match el.attr_nonempty("params") {
        Some(list) => parse_identifier_list(list).map_err(|bad| {
            CompilerError::validation(
                ERR_INVALID_IDENTIFIER,
                &format!("'{}' is not a valid parameter name", bad),
            )
        })?,
        None => vec![],
    };

    let compiled = c.compile_children(&el.children, BodyMode::Script);
    let mut result = HandlerResult::default();
    let statements = compiled.statements.clone();
    let nested = result.absorb(compiled);
    if !nested.directives.is_empty() {
        return Err(CompilerError::validation(
            ERR_STRUCTURE,
            "<function> bodies hold statements only",
        ));
    }
    if statements.is_empty() {
        return Err(CompilerError::validation(
            ERR_MISSING_ATTRIBUTE,
            "<function> requires a statement body",
        ));
    }

    let mut code = format!("const {} = ({}) => {{\n", name, params.join(", "));
    for statement in &statements {
        code.push_str(statement);
        code.push('\n');
    }
    code.push_str("};");

    result
        .directives
        .push(DirectiveNode::RawStatement(RawStatement {
            kind: RawKind::Function,
            code,
        }));
    Ok(result)
}

pub fn handle_array(c: &mut Compiler, el: &SourceElement) -> HandlerOutcome {
    let name = identifier_attr(el, "name", None)?;
    let value = json_attr(c, el, "items")?;
    if !value.is_array() {
        return Err(CompilerError::validation(
            ERR_INVALID_LITERAL,
            "<array> items must be a JSON array",
        ));
    }
    raw(RawKind::Array, format!("const {} = {};", name, value))
}

pub fn handle_object(c: &mut Compiler, el: &SourceElement) -> HandlerOutcome {
    let name = identifier_attr(el, "name", None)?;
    let value = json_attr(c, el, "value")?;
    if !value.is_object() {
        return Err(CompilerError::validation(
            ERR_INVALID_LITERAL,
            "<object> value must be a JSON object",
        ));
    }
    raw(RawKind::Object, format!("const {} = {};", name, value))
}

/// Parse a JSON literal attribute; re-serializing it yields safe JS source.
fn json_attr(c: &Compiler, el: &SourceElement, name: &str) -> Result<Value, CompilerError> {
    let raw = required_attr(el, name)?;
    c.check_content(raw)?;
    serde_json::from_str(raw).map_err(|e| {
        CompilerError::validation(
            ERR_INVALID_LITERAL,
            &format!("'{}' is not valid JSON: {}", name, e),
        )
    })
}
