//! Plain HTML elements
//!
//! Recognized HTML tags become template elements. Directives nested inside a
//! plain element cannot live in the template tree. Each run of them is
//! replaced by an inert `<template>` anchor carrying a generated slot
//! attribute, and hoisted into an `Append` that swaps the anchor for the
//! rendered body, so output order follows source order.

use std::collections::{BTreeMap, HashSet};

use lazy_static::lazy_static;
use regex::Regex;

use super::{unknown_tag, BodyMode, Compiler, DirectiveTag, HandlerOutcome, HandlerResult};
use crate::ir::{AppendDirective, DirectiveNode, TemplateNode};
use crate::parse::{SourceElement, SourceNode};
use crate::validate::{CompilerError, ERR_DISALLOWED_TAG, ERR_INVALID_IDENTIFIER};

lazy_static! {
    pub static ref HTML_TAGS: HashSet<&'static str> = [
        "a", "abbr", "address", "area", "article", "aside", "audio", "b", "bdi", "bdo",
        "blockquote", "br", "button", "canvas", "caption", "cite", "code", "col", "colgroup",
        "data", "datalist", "dd", "del", "details", "dfn", "dialog", "div", "dl", "dt", "em",
        "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6",
        "header", "hgroup", "hr", "i", "img", "input", "ins", "kbd", "label", "legend", "li",
        "main", "map", "mark", "menu", "meter", "nav", "ol", "optgroup", "option", "output", "p",
        "picture", "pre", "progress", "q", "rp", "rt", "ruby", "s", "samp", "section", "select",
        "slot", "small", "source", "span", "strong", "sub", "summary", "sup", "table", "tbody",
        "td", "template", "textarea", "tfoot", "th", "thead", "time", "tr", "track", "u", "ul",
        "video", "wbr",
    ]
    .into_iter()
    .collect();

    pub static ref DISALLOWED_TAGS: HashSet<&'static str> = [
        "script", "iframe", "embed", "frame", "frameset", "base", "link", "meta", "noscript",
    ]
    .into_iter()
    .collect();

    static ref ATTRIBUTE_NAME_RE: Regex = Regex::new(r"^[a-zA-Z_:][-a-zA-Z0-9_:.]*$").unwrap();
}

/// Attribute that links an anchor to its hoisted directives.
pub const SLOT_ATTRIBUTE: &str = "data-htms-slot";

/// Placeholder tag left where hoisted directives render.
pub const ANCHOR_TAG: &str = "template";

pub fn is_valid_attribute_name(name: &str) -> bool {
    ATTRIBUTE_NAME_RE.is_match(name)
}

pub fn handle_element(c: &mut Compiler, el: &SourceElement) -> HandlerOutcome {
    let tag = el.tag.to_ascii_lowercase();
    if DISALLOWED_TAGS.contains(tag.as_str()) {
        return Err(CompilerError::security(
            ERR_DISALLOWED_TAG,
            &format!("<{}> is not allowed in component markup", tag),
        ));
    }
    if !HTML_TAGS.contains(tag.as_str()) && !tag.contains('-') {
        return Err(unknown_tag(el));
    }

    let mut attrs = BTreeMap::new();
    for (name, value) in &el.attrs {
        if !is_valid_attribute_name(name) {
            return Err(CompilerError::validation(
                ERR_INVALID_IDENTIFIER,
                &format!("invalid attribute name '{}'", name),
            ));
        }
        if name.to_ascii_lowercase().starts_with("on") {
            return Err(CompilerError::security(
                ERR_DISALLOWED_TAG,
                &format!("inline handler attribute '{}' is not allowed", name),
            )
            .with_hint("attach listeners with <event target=\"..\" type=\"..\">"));
        }
        c.check_markup_text(value)?;
        attrs.insert(name.clone(), value.clone());
    }

    let mut result = HandlerResult::default();
    let mut children = Vec::new();
    for run in child_runs(&el.children) {
        let compiled = c.compile_children(run.nodes, BodyMode::Markup);
        let aborted = compiled.aborted;
        let body = result.absorb(compiled);

        if run.directives && !body.is_empty() {
            let slot = c.next_id("slot");
            let selector = format!("[{}=\"{}\"]", SLOT_ATTRIBUTE, slot);
            let mut anchor_attrs = BTreeMap::new();
            anchor_attrs.insert(SLOT_ATTRIBUTE.to_string(), slot);
            children.push(TemplateNode::element(ANCHOR_TAG, anchor_attrs, vec![]));
            result.directives.push(DirectiveNode::Append(AppendDirective {
                selector,
                body,
                anchor: true,
            }));
        } else {
            children.extend(body.template);
            result.directives.extend(body.directives);
        }

        if aborted {
            break;
        }
    }

    result
        .template
        .push(TemplateNode::element(&tag, attrs, children));
    Ok(result)
}

/// A run of sibling nodes that are either all markup or all directives.
/// Blank text joins whichever run it sits in, so `if`/`else` chains split by
/// whitespace stay together.
struct ChildRun<'a> {
    nodes: &'a [SourceNode],
    directives: bool,
}

fn child_runs(children: &[SourceNode]) -> Vec<ChildRun<'_>> {
    let mut runs = Vec::new();
    let mut start = 0;
    let mut current: Option<bool> = None;

    for (i, child) in children.iter().enumerate() {
        let kind = match child {
            SourceNode::Text(_) if child.is_blank() => continue,
            SourceNode::Text(_) => false,
            SourceNode::Element(el) => DirectiveTag::from_tag_name(&el.tag).is_some(),
        };
        match current {
            Some(k) if k != kind => {
                runs.push(ChildRun {
                    nodes: &children[start..i],
                    directives: k,
                });
                start = i;
                current = Some(kind);
            }
            Some(_) => {}
            None => current = Some(kind),
        }
    }
    if start < children.len() {
        runs.push(ChildRun {
            nodes: &children[start..],
            directives: current.unwrap_or(false),
        });
    }
    runs
}
