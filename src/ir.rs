//! Component IR
//!
//! The typed intermediate representation produced by the directive compiler and
//! consumed by the class emitter. Template nodes are static DOM structure;
//! directive nodes are control flow, reactivity and state mutation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ═══════════════════════════════════════════════════════════════════════════════
// TEMPLATE NODES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TemplateNode {
    Element(ElementNode),
    Text(TextNode),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementNode {
    pub tag: String,
    pub attrs: BTreeMap<String, String>,
    pub children: Vec<TemplateNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextNode {
    pub content: String,
}

impl TemplateNode {
    pub fn element(tag: &str, attrs: BTreeMap<String, String>, children: Vec<TemplateNode>) -> Self {
        TemplateNode::Element(ElementNode {
            tag: tag.to_string(),
            attrs,
            children,
        })
    }

    pub fn text(content: &str) -> Self {
        TemplateNode::Text(TextNode {
            content: content.to_string(),
        })
    }

    /// True when this subtree contains a `{{ expr }}` interpolation anywhere.
    pub fn is_interpolated(&self) -> bool {
        match self {
            TemplateNode::Text(t) => has_interpolation(&t.content),
            TemplateNode::Element(el) => {
                el.attrs.values().any(|v| has_interpolation(v))
                    || el.children.iter().any(|c| c.is_interpolated())
            }
        }
    }
}

pub fn has_interpolation(text: &str) -> bool {
    match text.find("{{") {
        Some(start) => text[start + 2..].contains("}}"),
        None => false,
    }
}

/// A piece of interpolated text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Literal(&'a str),
    Expr(&'a str),
}

/// Split `Hello {{ this.name }}!` into literal and expression segments. An
/// unterminated `{{` is kept as literal text.
pub fn split_interpolation(text: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("{{") {
        let Some(len) = rest[start + 2..].find("}}") else {
            break;
        };
        if start > 0 {
            segments.push(Segment::Literal(&rest[..start]));
        }
        let expr = rest[start + 2..start + 2 + len].trim();
        if !expr.is_empty() {
            segments.push(Segment::Expr(expr));
        }
        rest = &rest[start + 2 + len + 2..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Literal(rest));
    }
    segments
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIRECTIVE NODES
// ═══════════════════════════════════════════════════════════════════════════════

/// Nested body of a control-flow directive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Body {
    pub template: Vec<TemplateNode>,
    pub directives: Vec<DirectiveNode>,
}

impl Body {
    pub fn new(template: Vec<TemplateNode>, directives: Vec<DirectiveNode>) -> Self {
        Self {
            template,
            directives,
        }
    }

    /// Body holding a single nested directive, used for `else if` links.
    pub fn wrapping(directive: DirectiveNode) -> Self {
        Self {
            template: vec![],
            directives: vec![directive],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.template.is_empty() && self.directives.is_empty()
    }

    /// The nested `Condition` when this body is exactly an `else if` link.
    pub fn as_else_if(&self) -> Option<&ConditionDirective> {
        match (self.template.is_empty(), self.directives.as_slice()) {
            (true, [DirectiveNode::Condition(c)]) => Some(c),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DirectiveNode {
    Loop(LoopDirective),
    Condition(ConditionDirective),
    Switch(SwitchDirective),
    While(WhileDirective),
    Event(EventDirective),
    Visibility(VisibilityDirective),
    Attribute(AttributeDirective),
    Append(AppendDirective),
    Bind(BindDirective),
    Class(ClassDirective),
    Style(StyleDirective),
    State(StateDirective),
    Effect(EffectDirective),
    KeyedList(KeyedListDirective),
    RawStatement(RawStatement),
}

impl DirectiveNode {
    pub fn kind_name(&self) -> &'static str {
        match self {
            DirectiveNode::Loop(_) => "loop",
            DirectiveNode::Condition(_) => "condition",
            DirectiveNode::Switch(_) => "switch",
            DirectiveNode::While(_) => "while",
            DirectiveNode::Event(_) => "event",
            DirectiveNode::Visibility(_) => "visibility",
            DirectiveNode::Attribute(_) => "attribute",
            DirectiveNode::Append(_) => "append",
            DirectiveNode::Bind(_) => "bind",
            DirectiveNode::Class(_) => "class",
            DirectiveNode::Style(_) => "style",
            DirectiveNode::State(_) => "state",
            DirectiveNode::Effect(_) => "effect",
            DirectiveNode::KeyedList(_) => "keyed-list",
            DirectiveNode::RawStatement(_) => "raw",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum LoopMode {
    Array {
        source: String,
        item: String,
        index: Option<String>,
    },
    Range {
        count: u32,
        index: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopDirective {
    pub mode: LoopMode,
    pub body: Body,
}

/// `else if` chains nest right: `when_false` wraps the next `Condition`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionDirective {
    pub condition: String,
    pub when_true: Body,
    pub when_false: Option<Body>,
}

impl ConditionDirective {
    /// Number of branches in the chain, counting a trailing `else`.
    pub fn branch_count(&self) -> usize {
        match &self.when_false {
            None => 1,
            Some(body) => match body.as_else_if() {
                Some(next) => 1 + next.branch_count(),
                None => 2,
            },
        }
    }
}

/// Typed literal of a `<case value="..">`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum CaseValue {
    Number(String),
    Bool(bool),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchCase {
    pub value: CaseValue,
    pub body: Body,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchDirective {
    pub expr: String,
    pub cases: Vec<SwitchCase>,
    pub default: Option<Body>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhileDirective {
    pub condition: String,
    pub max_iterations: u32,
    pub body: Body,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDirective {
    pub selector: String,
    pub event_type: String,
    pub body: Vec<String>,
    pub nested_directives: Vec<DirectiveNode>,
    #[serde(default)]
    pub prevent_default: bool,
    /// Re-render the component after the handler when it mutated state.
    #[serde(default = "default_true")]
    pub rerender: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VisibilityMode {
    Toggle,
    Show,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityDirective {
    pub selector: String,
    pub condition: String,
    pub mode: VisibilityMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributeTarget {
    Attribute,
    Property,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDirective {
    pub selector: String,
    pub target: AttributeTarget,
    pub name: String,
    pub path: Option<Vec<String>>,
    pub value_expr: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendDirective {
    pub selector: String,
    pub body: Body,
    /// The target is a placeholder to be replaced by the body rather than
    /// a container to append into.
    #[serde(default)]
    pub anchor: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindDirective {
    pub selector: String,
    pub property: String,
    pub expr: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClassAction {
    Add,
    Remove,
    Toggle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDirective {
    pub selector: String,
    pub names: Vec<String>,
    pub action: ClassAction,
    pub condition: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StyleMode {
    CssProperty,
    JsProperty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleDirective {
    pub selector: String,
    pub property: String,
    pub value_expr: String,
    pub mode: StyleMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StateMode {
    Init,
    Set,
    Push,
    Splice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetOperator {
    #[serde(rename = "=")]
    Assign,
    #[serde(rename = "+=")]
    Add,
    #[serde(rename = "-=")]
    Sub,
    #[serde(rename = "*=")]
    Mul,
    #[serde(rename = "/=")]
    Div,
    #[serde(rename = "++")]
    Increment,
    #[serde(rename = "--")]
    Decrement,
}

impl SetOperator {
    pub fn parse(op: &str) -> Option<Self> {
        match op.trim() {
            "=" => Some(SetOperator::Assign),
            "+=" => Some(SetOperator::Add),
            "-=" => Some(SetOperator::Sub),
            "*=" => Some(SetOperator::Mul),
            "/=" => Some(SetOperator::Div),
            "++" => Some(SetOperator::Increment),
            "--" => Some(SetOperator::Decrement),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SetOperator::Assign => "=",
            SetOperator::Add => "+=",
            SetOperator::Sub => "-=",
            SetOperator::Mul => "*=",
            SetOperator::Div => "/=",
            SetOperator::Increment => "++",
            SetOperator::Decrement => "--",
        }
    }

    pub fn is_unary(&self) -> bool {
        matches!(self, SetOperator::Increment | SetOperator::Decrement)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateDirective {
    pub mode: StateMode,
    pub path: Vec<String>,
    pub op: Option<SetOperator>,
    pub value: Option<String>,
    pub index: Option<String>,
    pub delete_count: Option<String>,
    pub values: Option<Vec<String>>,
}

impl StateDirective {
    pub fn new(mode: StateMode, path: Vec<String>) -> Self {
        Self {
            mode,
            path,
            op: None,
            value: None,
            index: None,
            delete_count: None,
            values: None,
        }
    }

    pub fn is_mutation(&self) -> bool {
        self.mode != StateMode::Init
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseKind {
    Json,
    Text,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EffectKind {
    /// Raw statement body run as the effect.
    Code { body: String },
    /// Network fetch whose `AbortController` is the effect cleanup.
    Fetch {
        url: String,
        method: String,
        into: Vec<String>,
        response: ResponseKind,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectDirective {
    pub id: String,
    pub deps: Vec<String>,
    pub kind: EffectKind,
    pub immediate: bool,
    pub once: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyedListDirective {
    pub selector: String,
    pub items: String,
    pub item: String,
    pub key_expr: String,
    pub body: Body,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RawKind {
    Comment,
    Print,
    Call,
    Function,
    Array,
    Object,
}

impl RawKind {
    /// Declarations stay outside the per-directive fault boundary so later
    /// directives can see them.
    pub fn is_declaration(&self) -> bool {
        matches!(
            self,
            RawKind::Comment | RawKind::Function | RawKind::Array | RawKind::Object
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStatement {
    pub kind: RawKind,
    pub code: String,
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPONENT IR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentIR {
    pub template_nodes: Vec<TemplateNode>,
    pub directives: Vec<DirectiveNode>,
}

impl ComponentIR {
    /// Purely static: no directives and no interpolated text anywhere.
    pub fn is_static(&self) -> bool {
        self.directives.is_empty() && !self.template_nodes.iter().any(|n| n.is_interpolated())
    }
}
