//! DOM handlers: `<bind>`, `<append>`, `<class>`, `<style>`, `<setattr>`,
//! `<setprop>`, `<toggle>`, `<show>`, `<keyedlist>`.

use lazy_static::lazy_static;
use regex::Regex;

use super::markup::is_valid_attribute_name;
use super::{
    expr_attr, identifier_attr, required_attr, selector_attr, BodyMode, Compiler, HandlerOutcome,
    HandlerResult,
};
use crate::ir::{
    AppendDirective, AttributeDirective, AttributeTarget, BindDirective, ClassAction,
    ClassDirective, DirectiveNode, KeyedListDirective, StyleDirective, StyleMode, TemplateNode,
    VisibilityDirective, VisibilityMode,
};
use crate::parse::SourceElement;
use crate::validate::{
    is_valid_css_property, is_valid_identifier, CompilerError, ERR_DISALLOWED_CALL,
    ERR_INVALID_IDENTIFIER, ERR_INVALID_OPERATOR, ERR_STRUCTURE,
};

lazy_static! {
    static ref CLASS_NAME_RE: Regex = Regex::new(r"^-?[_a-zA-Z][_a-zA-Z0-9-]*$").unwrap();
}

/// Properties that parse their value as markup.
const HTML_SINK_PROPERTIES: &[&str] = &["innerHTML", "outerHTML", "srcdoc"];

pub fn handle_bind(c: &mut Compiler, el: &SourceElement) -> HandlerOutcome {
    let selector = selector_attr(el)?;
    let property = identifier_attr(el, "property", Some("textContent"))?;
    reject_html_sink(&property)?;
    let expr = expr_attr(c, el, "value")?;
    Ok(HandlerResult::directive(DirectiveNode::Bind(BindDirective {
        selector,
        property,
        expr,
    })))
}

pub fn handle_append(c: &mut Compiler, el: &SourceElement) -> HandlerOutcome {
    let selector = selector_attr(el)?;
    let mut result = HandlerResult::default();
    let compiled = c.compile_children(&el.children, BodyMode::Markup);
    let body = result.absorb(compiled);
    result
        .directives
        .push(DirectiveNode::Append(AppendDirective {
            selector,
            body,
            anchor: false,
        }));
    Ok(result)
}

pub fn handle_class(c: &mut Compiler, el: &SourceElement) -> HandlerOutcome {
    let selector = selector_attr(el)?;
    let names: Vec<String> = required_attr(el, "name")?
        .split_whitespace()
        .map(|s| s.to_string())
        .collect();
    if let Some(bad) = names.iter().find(|n| !CLASS_NAME_RE.is_match(n)) {
        return Err(CompilerError::validation(
            ERR_INVALID_IDENTIFIER,
            &format!("'{}' is not a valid class name", bad),
        ));
    }

    let condition = match el.attr_nonempty("when") {
        Some(_) => Some(expr_attr(c, el, "when")?),
        None => None,
    };
    let action = match el.attr_nonempty("action").map(|a| a.to_ascii_lowercase()) {
        None if condition.is_some() => ClassAction::Toggle,
        None => ClassAction::Add,
        Some(a) if a == "add" => ClassAction::Add,
        Some(a) if a == "remove" => ClassAction::Remove,
        Some(a) if a == "toggle" => ClassAction::Toggle,
        Some(a) => {
            return Err(CompilerError::validation(
                ERR_INVALID_OPERATOR,
                &format!("class action '{}' must be add, remove or toggle", a),
            ))
        }
    };

    Ok(HandlerResult::directive(DirectiveNode::Class(ClassDirective {
        selector,
        names,
        action,
        condition,
    })))
}

pub fn handle_style(c: &mut Compiler, el: &SourceElement) -> HandlerOutcome {
    let selector = selector_attr(el)?;
    let property = required_attr(el, "property")?.to_string();
    if !is_valid_css_property(&property) {
        return Err(CompilerError::validation(
            ERR_INVALID_IDENTIFIER,
            &format!("'{}' is not a valid style property", property),
        ));
    }
    let value_expr = expr_attr(c, el, "value")?;
    let mode = if property.contains('-') {
        StyleMode::CssProperty
    } else {
        StyleMode::JsProperty
    };

    Ok(HandlerResult::directive(DirectiveNode::Style(StyleDirective {
        selector,
        property,
        value_expr,
        mode,
    })))
}

pub fn handle_set_attr(c: &mut Compiler, el: &SourceElement) -> HandlerOutcome {
    let selector = selector_attr(el)?;
    let name = required_attr(el, "name")?.to_string();
    if !is_valid_attribute_name(&name) {
        return Err(CompilerError::validation(
            ERR_INVALID_IDENTIFIER,
            &format!("'{}' is not a valid attribute name", name),
        ));
    }
    if name.to_ascii_lowercase().starts_with("on") {
        return Err(CompilerError::security(
            ERR_DISALLOWED_CALL,
            &format!("setting handler attribute '{}' is not allowed", name),
        )
        .with_hint("use <event> to attach listeners"));
    }
    let value_expr = expr_attr(c, el, "value")?;

    Ok(HandlerResult::directive(DirectiveNode::Attribute(
        AttributeDirective {
            selector,
            target: AttributeTarget::Attribute,
            name,
            path: None,
            value_expr,
        },
    )))
}

/// `name="dataset.userId"` sets a nested property: `name` is the first
/// segment, `path` the rest.
pub fn handle_set_prop(c: &mut Compiler, el: &SourceElement) -> HandlerOutcome {
    let selector = selector_attr(el)?;
    let raw = required_attr(el, "name")?;
    let segments: Vec<String> = raw.split('.').map(|s| s.trim().to_string()).collect();
    if let Some(bad) = segments.iter().find(|s| !is_valid_identifier(s)) {
        return Err(CompilerError::validation(
            ERR_INVALID_IDENTIFIER,
            &format!("'{}' in '{}' is not a valid property name", bad, raw),
        ));
    }
    for segment in &segments {
        reject_html_sink(segment)?;
    }
    let value_expr = expr_attr(c, el, "value")?;

    let mut segments = segments.into_iter();
    let name = segments.next().unwrap_or_default();
    let rest: Vec<String> = segments.collect();

    Ok(HandlerResult::directive(DirectiveNode::Attribute(
        AttributeDirective {
            selector,
            target: AttributeTarget::Property,
            name,
            path: if rest.is_empty() { None } else { Some(rest) },
            value_expr,
        },
    )))
}

pub fn handle_toggle(c: &mut Compiler, el: &SourceElement) -> HandlerOutcome {
    visibility(c, el, VisibilityMode::Toggle)
}

pub fn handle_show(c: &mut Compiler, el: &SourceElement) -> HandlerOutcome {
    visibility(c, el, VisibilityMode::Show)
}

fn visibility(c: &mut Compiler, el: &SourceElement, mode: VisibilityMode) -> HandlerOutcome {
    let selector = selector_attr(el)?;
    let condition = expr_attr(c, el, "when")?;
    Ok(HandlerResult::directive(DirectiveNode::Visibility(
        VisibilityDirective {
            selector,
            condition,
            mode,
        },
    )))
}

pub fn handle_keyed_list(c: &mut Compiler, el: &SourceElement) -> HandlerOutcome {
    let selector = selector_attr(el)?;
    let items = expr_attr(c, el, "items")?;
    let item = identifier_attr(el, "as", Some("item"))?;
    let key_expr = expr_attr(c, el, "key")?;

    let mut result = HandlerResult::default();
    let compiled = c.compile_children(&el.children, BodyMode::Markup);
    let body = result.absorb(compiled);

    let element_roots = body
        .template
        .iter()
        .filter(|n| matches!(n, TemplateNode::Element(_)))
        .count();
    let stray_text = body
        .template
        .iter()
        .any(|n| matches!(n, TemplateNode::Text(_)));
    if element_roots != 1 || stray_text {
        return Err(CompilerError::validation(
            ERR_STRUCTURE,
            "<keyedlist> needs exactly one root element per item",
        )
        .with_hint("wrap the item markup in a single element such as <li>"));
    }

    result
        .directives
        .push(DirectiveNode::KeyedList(KeyedListDirective {
            selector,
            items,
            item,
            key_expr,
            body,
        }));
    Ok(result)
}

fn reject_html_sink(property: &str) -> Result<(), CompilerError> {
    if HTML_SINK_PROPERTIES.contains(&property) {
        return Err(CompilerError::security(
            ERR_DISALLOWED_CALL,
            &format!("writing '{}' from an expression is not allowed", property),
        )
        .with_hint("bind textContent, or build the markup with directives"));
    }
    Ok(())
}
