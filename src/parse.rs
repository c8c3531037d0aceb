//! Parse Module for the HTMS compiler
//!
//! Turns directive markup into an owned source tree. html5ever does the HTML5
//! tokenizing; a pre-pass expands `<tag/>` into `<tag></tag>` since HTML5 ignores
//! the self-closing slash on non-void elements.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use lazy_static::lazy_static;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use std::collections::HashSet;

use crate::options::CompileError;

// ═══════════════════════════════════════════════════════════════════════════════
// SOURCE TREE
// ═══════════════════════════════════════════════════════════════════════════════

/// Owned markup node. Unlike the rcdom handles this is `Send`, so components can
/// be compiled on the rayon pool.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceNode {
    Element(SourceElement),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceElement {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<SourceNode>,
}

impl SourceElement {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attrs: vec![],
            children: vec![],
        }
    }

    /// Attribute lookup. html5ever lower-cases attribute names, so the lookup
    /// does too (`maxIterations` reads `maxiterations`).
    pub fn attr(&self, name: &str) -> Option<&str> {
        let wanted = name.to_ascii_lowercase();
        self.attrs
            .iter()
            .find(|(k, _)| *k == wanted)
            .map(|(_, v)| v.as_str())
    }

    /// Attribute value, trimmed, with empty treated as absent.
    pub fn attr_nonempty(&self, name: &str) -> Option<&str> {
        self.attr(name).map(str::trim).filter(|v| !v.is_empty())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    /// Boolean attribute: present-without-value and `"true"` are true.
    pub fn flag(&self, name: &str, default: bool) -> bool {
        match self.attr(name) {
            None => default,
            Some(v) => !matches!(v.trim().to_ascii_lowercase().as_str(), "false" | "0" | "no"),
        }
    }

    pub fn element_children(&self) -> impl Iterator<Item = &SourceElement> {
        self.children.iter().filter_map(|c| match c {
            SourceNode::Element(el) => Some(el),
            SourceNode::Text(_) => None,
        })
    }

    /// Concatenated direct text children.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            if let SourceNode::Text(t) = child {
                out.push_str(t);
            }
        }
        out
    }

    pub fn is(&self, tag: &str) -> bool {
        self.tag.eq_ignore_ascii_case(tag)
    }
}

impl SourceNode {
    pub fn as_element(&self) -> Option<&SourceElement> {
        match self {
            SourceNode::Element(el) => Some(el),
            SourceNode::Text(_) => None,
        }
    }

    /// Whitespace-only text between tags.
    pub fn is_blank(&self) -> bool {
        matches!(self, SourceNode::Text(t) if t.trim().is_empty())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SELF-CLOSING EXPANSION
// ═══════════════════════════════════════════════════════════════════════════════

lazy_static! {
    static ref VOID_ELEMENTS: HashSet<&'static str> = [
        "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
        "source", "track", "wbr",
    ]
    .into_iter()
    .collect();
}

pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.contains(tag.to_ascii_lowercase().as_str())
}

/// Rewrite `<tag a="1"/>` as `<tag a="1"></tag>` for every non-void tag.
/// Quote-aware, so `condition="a > b"` does not end the tag early.
pub fn expand_self_closing_tags(html: &str) -> String {
    let bytes = html.as_bytes();
    let mut out = String::with_capacity(html.len() + 64);
    let mut last = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i..].starts_with(b"<!--") {
            match html[i + 4..].find("-->") {
                Some(end) => {
                    i += 4 + end + 3;
                    continue;
                }
                None => break,
            }
        }

        if bytes[i] != b'<' || i + 1 >= bytes.len() || !bytes[i + 1].is_ascii_alphabetic() {
            i += 1;
            continue;
        }

        let name_start = i + 1;
        let mut name_end = name_start;
        while name_end < bytes.len()
            && (bytes[name_end].is_ascii_alphanumeric() || bytes[name_end] == b'-')
        {
            name_end += 1;
        }

        let mut quote: Option<u8> = None;
        let mut k = name_end;
        while k < bytes.len() {
            let c = bytes[k];
            match quote {
                Some(q) if c == q => quote = None,
                Some(_) => {}
                None if c == b'"' || c == b'\'' => quote = Some(c),
                None if c == b'>' => break,
                None => {}
            }
            k += 1;
        }
        if k >= bytes.len() {
            break;
        }

        let name = &html[name_start..name_end];
        let self_closing = k > name_end && bytes[k - 1] == b'/';
        if self_closing && !is_void_element(name) {
            out.push_str(&html[last..k - 1]);
            out.push_str("></");
            out.push_str(name);
            out.push('>');
            last = k + 1;
        }
        i = k + 1;
    }

    out.push_str(&html[last..]);
    out
}

// ═══════════════════════════════════════════════════════════════════════════════
// MAIN PARSING FUNCTIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Parse markup into owned nodes, flattening the implicit html/head/body wrappers.
pub fn parse_source(html: &str) -> Result<Vec<SourceNode>, CompileError> {
    let expanded = expand_self_closing_tags(html);
    let dom = parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut expanded.as_bytes())?;

    let mut nodes = Vec::new();
    collect_body_content(&dom.document, &mut nodes);
    Ok(nodes)
}

fn collect_body_content(handle: &Handle, nodes: &mut Vec<SourceNode>) {
    match &handle.data {
        NodeData::Document => {
            for child in handle.children.borrow().iter() {
                collect_body_content(child, nodes);
            }
        }
        NodeData::Element { name, .. } => {
            let tag = name.local.to_string();
            if tag == "html" || tag == "head" || tag == "body" {
                for child in handle.children.borrow().iter() {
                    collect_body_content(child, nodes);
                }
            } else if let Some(node) = convert_node(handle) {
                nodes.push(node);
            }
        }
        NodeData::Text { .. } => {
            if let Some(node) = convert_node(handle) {
                nodes.push(node);
            }
        }
        _ => {}
    }
}

fn convert_node(handle: &Handle) -> Option<SourceNode> {
    match &handle.data {
        NodeData::Element { name, attrs, .. } => {
            let attrs = attrs
                .borrow()
                .iter()
                .map(|a| (a.name.local.to_string(), a.value.to_string()))
                .collect();
            let children = handle
                .children
                .borrow()
                .iter()
                .filter_map(convert_node)
                .collect();
            Some(SourceNode::Element(SourceElement {
                tag: name.local.to_string(),
                attrs,
                children,
            }))
        }
        NodeData::Text { contents } => Some(SourceNode::Text(contents.borrow().to_string())),
        _ => None,
    }
}

/// Every `<component>` element in document order, including nested ones.
pub fn find_components(nodes: &[SourceNode]) -> Vec<SourceElement> {
    let mut found = Vec::new();
    for node in nodes {
        collect_components(node, &mut found);
    }
    found
}

fn collect_components(node: &SourceNode, found: &mut Vec<SourceElement>) {
    if let SourceNode::Element(el) = node {
        if el.is("component") {
            found.push(el.clone());
            return;
        }
        for child in &el.children {
            collect_components(child, found);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
