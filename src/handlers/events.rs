//! Event and reactivity handlers: `<event>`, `<model>`, `<fetch>`, `<effect>`.

use lazy_static::lazy_static;
use regex::Regex;

use super::{
    identifier_attr, required_attr, selector_attr, split_top_level, state_path_attr, BodyMode,
    Compiler, HandlerOutcome, HandlerResult,
};
use crate::ir::{
    BindDirective, DirectiveNode, EffectDirective, EffectKind, EventDirective, ResponseKind,
    SetOperator, StateDirective, StateMode,
};
use crate::parse::SourceElement;
use crate::validate::{
    CompilerError, ERR_IMMUTABLE_STATE, ERR_INVALID_IDENTIFIER, ERR_INVALID_LITERAL,
    ERR_MISSING_ATTRIBUTE, ERR_STRUCTURE, WARN_PERFORMANCE,
};

lazy_static! {
    static ref EVENT_NAME_RE: Regex = Regex::new(r"^[a-zA-Z][a-zA-Z0-9:_-]*$").unwrap();
    static ref URL_RE: Regex = Regex::new(r"^[^\s<>`]+$").unwrap();
}

const HTTP_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD"];

pub fn handle_event(c: &mut Compiler, el: &SourceElement) -> HandlerOutcome {
    let selector = selector_attr(el)?;
    let event_type = event_name_attr(el, "type", None)?;
    let prevent_default = el.flag("prevent", false);

    let mut result = HandlerResult::default();
    let compiled = c.compile_children(&el.children, BodyMode::Script);
    let statements = compiled.statements.clone();
    let nested = result.absorb(compiled);

    result.directives.push(DirectiveNode::Event(EventDirective {
        selector,
        event_type,
        body: statements,
        nested_directives: nested.directives,
        prevent_default,
        rerender: true,
    }));
    Ok(result)
}

/// Two-way binding: a `Bind` for state-to-element plus an input `Event` that
/// writes the element's property back into state.
pub fn handle_model(c: &mut Compiler, el: &SourceElement) -> HandlerOutcome {
    let selector = selector_attr(el)?;
    let path = state_path_attr(el, "name")?;
    let property = identifier_attr(el, "property", Some("value"))?;
    let default_event = if property == "checked" { "change" } else { "input" };
    let event_type = event_name_attr(el, "event", Some(default_event))?;

    if c.is_immutable(&path[0]) {
        return Err(CompilerError::validation(
            ERR_IMMUTABLE_STATE,
            &format!("'{}' was declared immutable and cannot be bound", path[0]),
        ));
    }

    let bind = BindDirective {
        selector: selector.clone(),
        property: property.clone(),
        expr: optional_chain(&path),
    };

    let mut write_back = StateDirective::new(StateMode::Set, path);
    write_back.op = Some(SetOperator::Assign);
    write_back.value = Some(format!("event.target.{}", property));

    let event = EventDirective {
        selector,
        event_type,
        body: vec![],
        nested_directives: vec![DirectiveNode::State(write_back)],
        prevent_default: false,
        rerender: false,
    };

    Ok(HandlerResult {
        directives: vec![DirectiveNode::Bind(bind), DirectiveNode::Event(event)],
        ..HandlerResult::default()
    })
}

pub fn handle_fetch(c: &mut Compiler, el: &SourceElement) -> HandlerOutcome {
    let url = required_attr(el, "url")?;
    c.check_content(url)?;
    if !URL_RE.is_match(url) {
        return Err(CompilerError::validation(
            ERR_INVALID_LITERAL,
            &format!("'{}' is not a usable URL", url),
        ));
    }

    let into = state_path_attr(el, "into")?;
    if c.is_immutable(&into[0]) {
        return Err(CompilerError::validation(
            ERR_IMMUTABLE_STATE,
            &format!("'{}' was declared immutable", into[0]),
        ));
    }

    let method = el.attr_nonempty("method").unwrap_or("GET").to_ascii_uppercase();
    if !HTTP_METHODS.contains(&method.as_str()) {
        return Err(CompilerError::validation(
            ERR_INVALID_LITERAL,
            &format!("unsupported HTTP method '{}'", method),
        ));
    }

    let response = match el.attr_nonempty("as").map(|s| s.to_ascii_lowercase()) {
        None => ResponseKind::Json,
        Some(kind) if kind == "json" => ResponseKind::Json,
        Some(kind) if kind == "text" => ResponseKind::Text,
        Some(kind) => {
            return Err(CompilerError::validation(
                ERR_INVALID_LITERAL,
                &format!("fetch response type '{}' must be json or text", kind),
            ))
        }
    };

    // Without deps a fetch has nothing to re-run on, so it defaults to once.
    let deps = deps_attr(c, el)?;
    let once = el.flag("once", deps.is_empty());
    let mut result = HandlerResult::default();
    if deps.is_empty() && !once {
        result.diagnostics.warn(
            CompilerError::validation(
                WARN_PERFORMANCE,
                "fetch without deps and once=\"false\" refetches on every update",
            )
            .with_context(&el.tag),
        );
    }
    let effect = EffectDirective {
        id: c.next_id("fetch"),
        deps,
        kind: EffectKind::Fetch {
            url: url.to_string(),
            method,
            into,
            response,
        },
        immediate: el.flag("immediate", true),
        once,
    };
    result.directives.push(DirectiveNode::Effect(effect));
    Ok(result)
}

pub fn handle_effect(c: &mut Compiler, el: &SourceElement) -> HandlerOutcome {
    if el.element_children().next().is_some() {
        return Err(CompilerError::validation(
            ERR_STRUCTURE,
            "<effect> takes a plain statement body, not nested elements",
        ));
    }
    let body = el.text_content().trim().to_string();
    if body.is_empty() {
        return Err(CompilerError::validation(
            ERR_MISSING_ATTRIBUTE,
            "<effect> requires a statement body",
        ));
    }
    c.check_statements(&body)?;

    let deps = deps_attr(c, el)?;
    let effect = EffectDirective {
        id: c.next_id("effect"),
        deps,
        kind: EffectKind::Code { body },
        immediate: el.flag("immediate", true),
        once: el.flag("once", false),
    };
    Ok(HandlerResult::directive(DirectiveNode::Effect(effect)))
}

/// `deps="this.a; this.b"`: semicolon separated, so commas inside calls survive.
fn deps_attr(c: &Compiler, el: &SourceElement) -> Result<Vec<String>, CompilerError> {
    let Some(raw) = el.attr_nonempty("deps") else {
        return Ok(vec![]);
    };
    let deps = split_top_level(raw, ';');
    for dep in &deps {
        c.check_expr(dep)?;
    }
    Ok(deps)
}

fn event_name_attr(
    el: &SourceElement,
    name: &str,
    default: Option<&str>,
) -> Result<String, CompilerError> {
    let value = match (el.attr_nonempty(name), default) {
        (Some(v), _) => v,
        (None, Some(d)) => d,
        (None, None) => required_attr(el, name)?,
    };
    if !EVENT_NAME_RE.is_match(value) {
        return Err(CompilerError::validation(
            ERR_INVALID_IDENTIFIER,
            &format!("'{}' is not a valid event name", value),
        ));
    }
    Ok(value.to_string())
}

/// `["user", "name"]` reads as `this.user?.name`.
pub fn optional_chain(path: &[String]) -> String {
    let mut expr = format!("this.{}", path[0]);
    for segment in &path[1..] {
        expr.push_str("?.");
        expr.push_str(segment);
    }
    expr
}
