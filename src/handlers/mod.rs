//! Directive handlers
//!
//! Every directive tag maps to exactly one `DirectiveTag` variant and one
//! handler function. Handlers return `Result<HandlerResult, CompilerError>`;
//! the dispatcher turns an `Err` (or a panic) into a diagnostic so no failure
//! ever crosses the handler boundary.

pub mod control;
pub mod dom;
pub mod events;
pub mod loops;
pub mod markup;
pub mod raw;
pub mod state;

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, error, warn};

use crate::ir::{split_interpolation, Body, DirectiveNode, Segment, TemplateNode};
use crate::options::CompileOptions;
use crate::parse::{SourceElement, SourceNode};
use crate::security::ContentValidator;
use crate::validate::{
    is_valid_identifier, is_valid_selector, parse_state_path, scan_expression, CompilerError,
    DiagnosticKind, Diagnostics, ERR_CONTENT_REJECTED, ERR_HANDLER_PANIC, ERR_INVALID_IDENTIFIER,
    ERR_INVALID_SELECTOR, ERR_MALFORMED_EXPRESSION, ERR_MISSING_ATTRIBUTE, ERR_STRUCTURE,
    ERR_UNKNOWN_TAG, WARN_SKIPPED,
};

// ═══════════════════════════════════════════════════════════════════════════════
// DIRECTIVE TAGS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveTag {
    Component,
    Var,
    Set,
    Push,
    Splice,
    If,
    ElseIf,
    Else,
    Repeat,
    Switch,
    Case,
    Default,
    While,
    Event,
    Model,
    Bind,
    Fetch,
    Effect,
    Append,
    Class,
    Style,
    SetAttr,
    SetProp,
    Toggle,
    Show,
    KeyedList,
    Comment,
    Print,
    Call,
    Function,
    Array,
    Object,
}

impl DirectiveTag {
    pub fn from_tag_name(tag: &str) -> Option<Self> {
        let tag = match tag.to_ascii_lowercase().as_str() {
            "component" => DirectiveTag::Component,
            "var" => DirectiveTag::Var,
            "set" => DirectiveTag::Set,
            "push" => DirectiveTag::Push,
            "splice" => DirectiveTag::Splice,
            "if" => DirectiveTag::If,
            "elseif" => DirectiveTag::ElseIf,
            "else" => DirectiveTag::Else,
            "repeat" => DirectiveTag::Repeat,
            "switch" => DirectiveTag::Switch,
            "case" => DirectiveTag::Case,
            "default" => DirectiveTag::Default,
            "while" => DirectiveTag::While,
            "event" => DirectiveTag::Event,
            "model" => DirectiveTag::Model,
            "bind" => DirectiveTag::Bind,
            "fetch" => DirectiveTag::Fetch,
            "effect" => DirectiveTag::Effect,
            "append" => DirectiveTag::Append,
            "class" => DirectiveTag::Class,
            "style" => DirectiveTag::Style,
            "setattr" => DirectiveTag::SetAttr,
            "setprop" => DirectiveTag::SetProp,
            "toggle" => DirectiveTag::Toggle,
            "show" => DirectiveTag::Show,
            "keyedlist" => DirectiveTag::KeyedList,
            "comment" => DirectiveTag::Comment,
            "print" => DirectiveTag::Print,
            "call" => DirectiveTag::Call,
            "function" => DirectiveTag::Function,
            "array" => DirectiveTag::Array,
            "object" => DirectiveTag::Object,
            _ => return None,
        };
        Some(tag)
    }

    pub fn name(&self) -> &'static str {
        match self {
            DirectiveTag::Component => "component",
            DirectiveTag::Var => "var",
            DirectiveTag::Set => "set",
            DirectiveTag::Push => "push",
            DirectiveTag::Splice => "splice",
            DirectiveTag::If => "if",
            DirectiveTag::ElseIf => "elseif",
            DirectiveTag::Else => "else",
            DirectiveTag::Repeat => "repeat",
            DirectiveTag::Switch => "switch",
            DirectiveTag::Case => "case",
            DirectiveTag::Default => "default",
            DirectiveTag::While => "while",
            DirectiveTag::Event => "event",
            DirectiveTag::Model => "model",
            DirectiveTag::Bind => "bind",
            DirectiveTag::Fetch => "fetch",
            DirectiveTag::Effect => "effect",
            DirectiveTag::Append => "append",
            DirectiveTag::Class => "class",
            DirectiveTag::Style => "style",
            DirectiveTag::SetAttr => "setattr",
            DirectiveTag::SetProp => "setprop",
            DirectiveTag::Toggle => "toggle",
            DirectiveTag::Show => "show",
            DirectiveTag::KeyedList => "keyedlist",
            DirectiveTag::Comment => "comment",
            DirectiveTag::Print => "print",
            DirectiveTag::Call => "call",
            DirectiveTag::Function => "function",
            DirectiveTag::Array => "array",
            DirectiveTag::Object => "object",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HANDLER RESULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// What one handler produced. `statement_text` carries the control-flow
/// skeleton for chain directives, rendered by the same builder the class
/// emitter uses, so the two can be compared.
#[derive(Debug, Clone, Default)]
pub struct HandlerResult {
    pub directives: Vec<DirectiveNode>,
    pub template: Vec<TemplateNode>,
    /// Raw statement text, produced by script-mode bodies.
    pub statements: Vec<String>,
    pub statement_text: Option<String>,
    pub diagnostics: Diagnostics,
    /// The handler rejected its own node. Nested failures that were already
    /// skipped leave this false.
    pub failed: bool,
}

pub type HandlerOutcome = Result<HandlerResult, CompilerError>;

impl HandlerResult {
    pub fn directive(node: DirectiveNode) -> Self {
        Self {
            directives: vec![node],
            ..Self::default()
        }
    }

    pub fn template(node: TemplateNode) -> Self {
        Self {
            template: vec![node],
            ..Self::default()
        }
    }

    pub fn failed(err: CompilerError) -> Self {
        let mut result = Self {
            failed: true,
            ..Self::default()
        };
        result.diagnostics.error(err);
        result
    }

    pub fn with_warning(mut self, warning: CompilerError) -> Self {
        self.diagnostics.warn(warning);
        self
    }

    pub fn with_statement(mut self, text: String) -> Self {
        self.statement_text = Some(text);
        self
    }

    /// Pull nested diagnostics in and hand back the nested body.
    pub fn absorb(&mut self, compiled: CompiledBody) -> Body {
        self.diagnostics.extend(compiled.diagnostics);
        Body::new(compiled.template, compiled.directives)
    }
}

/// Output of compiling a run of sibling nodes.
#[derive(Debug, Clone, Default)]
pub struct CompiledBody {
    pub template: Vec<TemplateNode>,
    pub directives: Vec<DirectiveNode>,
    /// Raw text statements, collected in script bodies only.
    pub statements: Vec<String>,
    pub diagnostics: Diagnostics,
    /// Strict mode stopped at the first error.
    pub aborted: bool,
}

/// How text children of a body are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    /// Text is template content, plain tags become template elements.
    Markup,
    /// Text is raw statement code; plain tags are rejected.
    Script,
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILER
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-component compile state threaded through every handler.
pub struct Compiler<'a> {
    pub options: &'a CompileOptions,
    pub validator: &'a dyn ContentValidator,
    immutable_roots: HashSet<String>,
    id_counter: usize,
}

impl<'a> Compiler<'a> {
    pub fn new(options: &'a CompileOptions, validator: &'a dyn ContentValidator) -> Self {
        Self {
            options,
            validator,
            immutable_roots: HashSet::new(),
            id_counter: 0,
        }
    }

    pub fn strict(&self) -> bool {
        self.options.strict
    }

    /// Stable per-component id; the same markup always yields the same ids.
    pub fn next_id(&mut self, prefix: &str) -> String {
        let id = format!("{}_{}", prefix, self.id_counter);
        self.id_counter += 1;
        id
    }

    pub fn mark_immutable(&mut self, root: &str) {
        self.immutable_roots.insert(root.to_string());
    }

    pub fn is_immutable(&self, root: &str) -> bool {
        self.immutable_roots.contains(root)
    }

    /// Compile a run of siblings. `if` chains consume their `elseif`/`else`
    /// siblings here, so those never reach the dispatcher on their own.
    pub fn compile_children(&mut self, children: &[SourceNode], mode: BodyMode) -> CompiledBody {
        let mut body = CompiledBody::default();
        let mut i = 0;

        while i < children.len() {
            let (result, consumed) = match &children[i] {
                SourceNode::Text(text) if text.trim().is_empty() => (HandlerResult::default(), 1),
                SourceNode::Text(text) => (self.compile_text(text, mode), 1),
                SourceNode::Element(el) => match DirectiveTag::from_tag_name(&el.tag) {
                    Some(DirectiveTag::If) => {
                        let mut consumed = 1;
                        let result = self.guarded(el, |c| {
                            let (outcome, n) = control::handle_if_chain(c, children, i);
                            consumed = n;
                            outcome
                        });
                        (result, consumed)
                    }
                    Some(tag) => (self.dispatch(tag, el), 1),
                    None if mode == BodyMode::Script => (
                        HandlerResult::failed(
                            CompilerError::validation(
                                ERR_STRUCTURE,
                                &format!("<{}> is not allowed inside a script body", el.tag),
                            )
                            .with_context(&el.tag),
                        ),
                        1,
                    ),
                    None => (self.guarded(el, |c| markup::handle_element(c, el)), 1),
                },
            };

            self.merge(&mut body, result);
            if self.strict() && body.diagnostics.has_errors() {
                body.aborted = true;
                break;
            }
            i += consumed;
        }

        body
    }

    /// Route one directive element to its handler.
    pub fn dispatch(&mut self, tag: DirectiveTag, el: &SourceElement) -> HandlerResult {
        debug!(tag = tag.name(), "dispatching directive");
        self.guarded(el, |c| c.run_handler(tag, el))
    }

    fn run_handler(&mut self, tag: DirectiveTag, el: &SourceElement) -> HandlerOutcome {
        match tag {
            DirectiveTag::Var => state::handle_var(self, el),
            DirectiveTag::Set => state::handle_set(self, el),
            DirectiveTag::Push => state::handle_push(self, el),
            DirectiveTag::Splice => state::handle_splice(self, el),
            DirectiveTag::If => control::handle_if(self, el),
            DirectiveTag::Switch => control::handle_switch(self, el),
            DirectiveTag::Repeat => loops::handle_repeat(self, el),
            DirectiveTag::While => loops::handle_while(self, el),
            DirectiveTag::Event => events::handle_event(self, el),
            DirectiveTag::Model => events::handle_model(self, el),
            DirectiveTag::Fetch => events::handle_fetch(self, el),
            DirectiveTag::Effect => events::handle_effect(self, el),
            DirectiveTag::Bind => dom::handle_bind(self, el),
            DirectiveTag::Append => dom::handle_append(self, el),
            DirectiveTag::Class => dom::handle_class(self, el),
            DirectiveTag::Style => dom::handle_style(self, el),
            DirectiveTag::SetAttr => dom::handle_set_attr(self, el),
            DirectiveTag::SetProp => dom::handle_set_prop(self, el),
            DirectiveTag::Toggle => dom::handle_toggle(self, el),
            DirectiveTag::Show => dom::handle_show(self, el),
            DirectiveTag::KeyedList => dom::handle_keyed_list(self, el),
            DirectiveTag::Comment => raw::handle_comment(self, el),
            DirectiveTag::Print => raw::handle_print(self, el),
            DirectiveTag::Call => raw::handle_call(self, el),
            DirectiveTag::Function => raw::handle_function(self, el),
            DirectiveTag::Array => raw::handle_array(self, el),
            DirectiveTag::Object => raw::handle_object(self, el),
            DirectiveTag::ElseIf | DirectiveTag::Else => Err(CompilerError::validation(
                ERR_STRUCTURE,
                &format!("<{}> must directly follow an <if> or <elseif>", tag.name()),
            )),
            DirectiveTag::Case | DirectiveTag::Default => Err(CompilerError::validation(
                ERR_STRUCTURE,
                &format!("<{}> is only allowed inside <switch>", tag.name()),
            )),
            DirectiveTag::Component => Err(CompilerError::validation(
                ERR_STRUCTURE,
                "components cannot be nested inside another component",
            )),
        }
    }

    /// Run a handler behind the fault boundary: errors and panics both come
    /// back as a failed `HandlerResult` tagged with the element.
    fn guarded<F>(&mut self, el: &SourceElement, handler: F) -> HandlerResult
    where
        F: FnOnce(&mut Self) -> HandlerOutcome,
    {
        match panic::catch_unwind(AssertUnwindSafe(|| handler(self))) {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => HandlerResult::failed(err.with_context(&el.tag)),
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(tag = %el.tag, %reason, "directive handler panicked");
                HandlerResult::failed(
                    CompilerError::new(
                        ERR_HANDLER_PANIC,
                        DiagnosticKind::Runtime,
                        &format!("handler for <{}> failed: {}", el.tag, reason),
                    )
                    .with_context(&el.tag),
                )
            }
        }
    }

    /// Fold one handler result into the running body. A failed node is
    /// dropped; in lenient mode its security errors become warnings.
    fn merge(&self, body: &mut CompiledBody, mut result: HandlerResult) {
        if result.failed {
            if !self.strict() {
                let (security, rest): (Vec<_>, Vec<_>) = result
                    .diagnostics
                    .errors
                    .into_iter()
                    .partition(|e| e.kind == DiagnosticKind::Security);
                result.diagnostics.errors = rest;
                for err in security {
                    warn!(code = %err.code, "skipping rejected content: {}", err.message);
                    let mut downgraded = err;
                    downgraded.code = WARN_SKIPPED.to_string();
                    result.diagnostics.warn(downgraded);
                }
            }
            body.diagnostics.extend(result.diagnostics);
            return;
        }

        body.template.extend(result.template);
        body.directives.extend(result.directives);
        body.statements.extend(result.statements);
        body.diagnostics.extend(result.diagnostics);
    }

    fn compile_text(&mut self, text: &str, mode: BodyMode) -> HandlerResult {
        let checked = match mode {
            BodyMode::Markup => self.check_markup_text(text),
            BodyMode::Script => self.check_content(text),
        };
        match checked {
            Err(err) => HandlerResult::failed(err),
            Ok(()) => match mode {
                BodyMode::Markup => HandlerResult::template(TemplateNode::text(text)),
                BodyMode::Script => match self.check_statements(text) {
                    Ok(()) => HandlerResult {
                        statements: vec![text.trim().to_string()],
                        ..HandlerResult::default()
                    },
                    Err(err) => HandlerResult::failed(err),
                },
            },
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ATTRIBUTE HELPERS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Run the content oracle over arbitrary text.
    pub fn check_content(&self, text: &str) -> Result<(), CompilerError> {
        let violations = self.validator.validate(text);
        if violations.is_empty() {
            return Ok(());
        }
        let messages: Vec<String> = violations.into_iter().map(|v| v.message).collect();
        Err(CompilerError::security(ERR_CONTENT_REJECTED, &messages.join("; ")))
    }

    /// Template text or attribute value: clean content, and every `{{ }}`
    /// interpolation a well-formed expression.
    pub fn check_markup_text(&self, text: &str) -> Result<(), CompilerError> {
        self.check_content(text)?;
        for segment in split_interpolation(text) {
            if let Segment::Expr(expr) = segment {
                self.check_expr(expr)?;
            }
        }
        Ok(())
    }

    /// An expression: clean content, balanced brackets, and no statements.
    pub fn check_expr(&self, expr: &str) -> Result<(), CompilerError> {
        self.check_content(expr)?;
        let shape = scan_expression(expr);
        if !shape.balanced {
            return Err(CompilerError::validation(
                ERR_MALFORMED_EXPRESSION,
                &format!("unbalanced brackets or quotes in expression '{}'", expr),
            ));
        }
        if shape.top_level_semicolon {
            return Err(CompilerError::validation(
                ERR_MALFORMED_EXPRESSION,
                &format!("expression '{}' contains a statement separator", expr),
            )
            .with_hint("move statements into an <event> or <effect> body"));
        }
        Ok(())
    }

    /// A statement block: clean content and balanced brackets.
    pub fn check_statements(&self, code: &str) -> Result<(), CompilerError> {
        self.check_content(code)?;
        if !scan_expression(code).balanced {
            return Err(CompilerError::validation(
                ERR_MALFORMED_EXPRESSION,
                "unbalanced brackets or quotes in statement body",
            ));
        }
        Ok(())
    }
}

pub fn required_attr<'e>(el: &'e SourceElement, name: &str) -> Result<&'e str, CompilerError> {
    el.attr_nonempty(name).ok_or_else(|| {
        CompilerError::validation(
            ERR_MISSING_ATTRIBUTE,
            &format!("<{}> requires a '{}' attribute", el.tag, name),
        )
    })
}

/// Required expression attribute, checked by the content oracle.
pub fn expr_attr(c: &Compiler, el: &SourceElement, name: &str) -> Result<String, CompilerError> {
    let value = required_attr(el, name)?;
    c.check_expr(value)?;
    Ok(value.to_string())
}

pub fn selector_attr(el: &SourceElement) -> Result<String, CompilerError> {
    let selector = required_attr(el, "target")?;
    if !is_valid_selector(selector) {
        return Err(CompilerError::validation(
            ERR_INVALID_SELECTOR,
            &format!("invalid selector '{}'", selector),
        )
        .with_hint("selectors may use tag, #id, .class, [attr=\"v\"] and :pseudo parts"));
    }
    Ok(selector.to_string())
}

pub fn identifier_attr(
    el: &SourceElement,
    name: &str,
    default: Option<&str>,
) -> Result<String, CompilerError> {
    let value = match (el.attr_nonempty(name), default) {
        (Some(v), _) => v,
        (None, Some(d)) => d,
        (None, None) => return required_attr(el, name).map(|s| s.to_string()),
    };
    if !is_valid_identifier(value) {
        return Err(CompilerError::validation(
            ERR_INVALID_IDENTIFIER,
            &format!("'{}' is not a valid identifier for '{}'", value, name),
        ));
    }
    Ok(value.to_string())
}

pub fn state_path_attr(el: &SourceElement, name: &str) -> Result<Vec<String>, CompilerError> {
    let raw = required_attr(el, name)?;
    parse_state_path(raw).ok_or_else(|| {
        CompilerError::validation(
            ERR_INVALID_IDENTIFIER,
            &format!("'{}' is not a valid state path", raw),
        )
        .with_hint("use dotted identifiers such as user.name")
    })
}

/// Split `text` on `sep` where it appears outside brackets and strings.
pub fn split_top_level(text: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in text.chars() {
        if let Some(q) = quote {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' | '`' => {
                quote = Some(c);
                current.push(c);
            }
            '(' | '[' | '{' => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' | '}' => {
                depth -= 1;
                current.push(c);
            }
            c if c == sep && depth == 0 => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    parts.push(current);

    parts
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

pub fn unknown_tag(el: &SourceElement) -> CompilerError {
    CompilerError::validation(ERR_UNKNOWN_TAG, &format!("unknown tag <{}>", el.tag))
        .with_hint("directive and HTML tag names are matched case-insensitively")
}

#[cfg(test)]
#[path = "../handler_tests.rs"]
mod handler_tests;
