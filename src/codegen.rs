//! Codegen module for the HTMS compiler
//!
//! Emits the source text of one custom element class from a `ComponentIR`.
//! Every directive runs behind its own `try/catch`, and every control-flow
//! body is built into a `DocumentFragment` before it touches the live tree.

use crate::component::ComponentMetadata;
use crate::ir::{
    split_interpolation, AttributeTarget, Body, ClassAction, ComponentIR, ConditionDirective,
    DirectiveNode, EffectDirective, EffectKind, ElementNode, LoopMode, ResponseKind,
    Segment, SetOperator, StateDirective, StateMode, StyleMode, SwitchDirective, TemplateNode,
    VisibilityMode,
};
use crate::options::ShadowMode;
use crate::parse::is_void_element;
use crate::security::ContentValidator;
use crate::visitor::{census, contains_state_mutation};

// ═══════════════════════════════════════════════════════════════════════════════
// WRITER
// ═══════════════════════════════════════════════════════════════════════════════

/// Indented line writer for generated JavaScript.
#[derive(Debug, Default)]
pub struct JsWriter {
    buf: String,
    indent: usize,
}

impl JsWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `text`, one output line per input line, at the current indent.
    pub fn line(&mut self, text: &str) {
        for line in text.lines() {
            if line.trim().is_empty() {
                self.buf.push('\n');
                continue;
            }
            for _ in 0..self.indent {
                self.buf.push_str("  ");
            }
            self.buf.push_str(line);
            self.buf.push('\n');
        }
    }

    pub fn blank(&mut self) {
        self.buf.push('\n');
    }

    /// `head {` and indent.
    pub fn open(&mut self, head: &str) {
        if head.is_empty() {
            self.line("{");
        } else {
            self.line(&format!("{} {{", head));
        }
        self.indent += 1;
    }

    /// Write `text` verbatim as an opening line and indent.
    pub fn open_raw(&mut self, text: &str) {
        self.line(text);
        self.indent += 1;
    }

    /// `} head {` at the outer level, staying indented.
    pub fn reopen(&mut self, head: &str) {
        self.indent = self.indent.saturating_sub(1);
        self.line(&format!("}} {} {{", head));
        self.indent += 1;
    }

    pub fn close(&mut self) {
        self.close_with("");
    }

    /// `}` followed by `tail`, e.g. `);`.
    pub fn close_with(&mut self, tail: &str) {
        self.indent = self.indent.saturating_sub(1);
        self.line(&format!("}}{}", tail));
    }

    pub fn finish(self) -> String {
        self.buf
    }
}

/// Fresh-name counter for one emitted class.
#[derive(Debug, Default)]
pub struct EmitContext {
    counter: usize,
}

impl EmitContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&mut self, prefix: &str) -> String {
        let name = format!("{}_{}", prefix, self.counter);
        self.counter += 1;
        name
    }
}

/// Where a body's output goes and where its selectors look first.
#[derive(Debug, Clone, Copy)]
struct Scope<'s> {
    parent: &'s str,
    query: &'s str,
}

const ROOT_SCOPE: Scope<'static> = Scope {
    parent: "root",
    query: "root",
};

// ═══════════════════════════════════════════════════════════════════════════════
// LITERALS
// ═══════════════════════════════════════════════════════════════════════════════

/// Double-quoted JS string literal. JSON string escaping is valid JS.
pub fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

pub fn js_string_array(values: &[String]) -> String {
    let items: Vec<String> = values.iter().map(|v| js_string(v)).collect();
    format!("[{}]", items.join(", "))
}

/// Escape text for a template literal that must stay on one line.
fn template_chars(text: &str, validator: &dyn ContentValidator) -> String {
    validator
        .escape_for_template(text)
        .replace('\r', "\\r")
        .replace('\n', "\\n")
}

/// Template literal for text that may hold `{{ expr }}` interpolations.
fn text_literal(text: &str, validator: &dyn ContentValidator) -> String {
    let segments = split_interpolation(text);
    if !segments.iter().any(|s| matches!(s, Segment::Expr(_))) {
        return js_string(text);
    }
    let mut out = String::from("`");
    for segment in segments {
        match segment {
            Segment::Literal(lit) => out.push_str(&template_chars(lit, validator)),
            Segment::Expr(expr) => {
                out.push_str("${(");
                out.push_str(expr);
                out.push_str(") ?? ''}");
            }
        }
    }
    out.push('`');
    out
}

fn html_escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn html_escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}

/// Serialize static template nodes back to HTML.
pub fn serialize_template(nodes: &[TemplateNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        serialize_node(node, &mut out);
    }
    out
}

fn serialize_node(node: &TemplateNode, out: &mut String) {
    match node {
        TemplateNode::Text(t) => out.push_str(&html_escape_text(&t.content)),
        TemplateNode::Element(el) => {
            out.push('<');
            out.push_str(&el.tag);
            for (name, value) in &el.attrs {
                out.push_str(&format!(" {}=\"{}\"", name, html_escape_attr(value)));
            }
            out.push('>');
            if is_void_element(&el.tag) {
                return;
            }
            for child in &el.children {
                serialize_node(child, out);
            }
            out.push_str(&format!("</{}>", el.tag));
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CHAIN BUILDERS
// ═══════════════════════════════════════════════════════════════════════════════

/// `if / else if / else` for a right-nested condition chain. Handlers call this
/// with an empty body writer to produce their skeleton; the emitter calls it
/// with the real one.
pub fn write_condition_chain(
    w: &mut JsWriter,
    cond: &ConditionDirective,
    body: &mut dyn FnMut(&mut JsWriter, &Body),
) {
    w.open(&format!("if ({})", cond.condition));
    body(w, &cond.when_true);

    let mut current = cond;
    while let Some(when_false) = &current.when_false {
        match when_false.as_else_if() {
            Some(next) => {
                w.reopen(&format!("else if ({})", next.condition));
                body(w, &next.when_true);
                current = next;
            }
            None => {
                w.reopen("else");
                body(w, when_false);
                break;
            }
        }
    }
    w.close();
}

/// Strict-equality chain over a precomputed `subject` variable.
pub fn write_switch_chain(
    w: &mut JsWriter,
    subject: &str,
    sw: &SwitchDirective,
    body: &mut dyn FnMut(&mut JsWriter, &Body),
) {
    if sw.cases.is_empty() {
        if let Some(default) = &sw.default {
            w.open("");
            body(w, default);
            w.close();
        }
        return;
    }

    for (i, case) in sw.cases.iter().enumerate() {
        let test = format!("if ({} === {})", subject, case.value.to_js());
        if i == 0 {
            w.open(&test);
        } else {
            w.reopen(&format!("else {}", test));
        }
        body(w, &case.body);
    }
    if let Some(default) = &sw.default {
        w.reopen("else");
        body(w, default);
    }
    w.close();
}

// ═══════════════════════════════════════════════════════════════════════════════
// CLASS EMISSION
// ═══════════════════════════════════════════════════════════════════════════════

pub fn emit_class(
    meta: &ComponentMetadata,
    ir: &ComponentIR,
    validator: &dyn ContentValidator,
) -> String {
    let usage = census(ir);
    let mut ctx = EmitContext::new();
    let mut w = JsWriter::new();
    let class = &meta.class_name;

    w.open(&format!("class {} extends HTMLElement", class));

    if !meta.observed_attributes.is_empty() {
        w.open("static get observedAttributes()");
        w.line(&format!(
            "return {};",
            js_string_array(&meta.observed_attributes)
        ));
        w.close();
        w.blank();
    }

    w.open("constructor()");
    w.line("super();");
    match meta.shadow {
        ShadowMode::Open => w.line("this._root = this.attachShadow({ mode: 'open' });"),
        ShadowMode::Closed => w.line("this._root = this.attachShadow({ mode: 'closed' });"),
        ShadowMode::None => w.line("this._root = this;"),
    }
    for prop in meta.seeded_props() {
        let attr = js_string(&prop.to_ascii_lowercase());
        w.open(&format!("if (this.hasAttribute({}))", attr));
        w.line(&format!("this.{} = this.getAttribute({});", prop, attr));
        w.close();
    }
    w.close();
    w.blank();

    w.open("connectedCallback()");
    w.line("this.render();");
    w.close();
    w.blank();

    if usage.needs_runtime {
        w.open("disconnectedCallback()");
        w.line("if (window.__htms) window.__htms.disposeEffectsFor(this);");
        w.close();
        w.blank();
    }

    if !meta.observed_attributes.is_empty() {
        w.open("attributeChangedCallback(name, oldValue, newValue)");
        w.line("if (oldValue === newValue) return;");
        w.line("this[name] = newValue;");
        w.line("if (this.isConnected) this.render();");
        w.close();
        w.blank();
    }

    w.open("render()");
    w.line("const root = this._root;");
    w.line("while (root.firstChild) root.removeChild(root.firstChild);");
    if ir.is_static() {
        emit_static_render(&mut w, class, ir, validator);
    } else {
        // State initializers and declarations run before the template is
        // built so interpolations can read them.
        let (prelude, rest): (Vec<&DirectiveNode>, Vec<&DirectiveNode>) =
            ir.directives.iter().partition(|d| is_prelude(d));
        for directive in prelude {
            emit_directive(&mut w, &mut ctx, directive, ROOT_SCOPE, validator);
        }
        let frag = ctx.fresh("frag");
        w.line(&format!("const {} = document.createDocumentFragment();", frag));
        for node in &ir.template_nodes {
            emit_template_node(&mut w, &mut ctx, node, &frag, validator);
        }
        w.line(&format!("root.appendChild({});", frag));
        for directive in rest {
            emit_directive(&mut w, &mut ctx, directive, ROOT_SCOPE, validator);
        }
    }
    w.close();

    if usage.needs_state_helpers {
        w.blank();
        emit_state_helpers(&mut w);
    }

    w.close();
    w.finish()
}

fn is_prelude(directive: &DirectiveNode) -> bool {
    match directive {
        DirectiveNode::State(state) => state.mode == StateMode::Init,
        DirectiveNode::RawStatement(raw) => raw.kind.is_declaration(),
        _ => false,
    }
}

/// Cached `<template>` clone for components with no dynamic parts.
fn emit_static_render(
    w: &mut JsWriter,
    class: &str,
    ir: &ComponentIR,
    validator: &dyn ContentValidator,
) {
    let html = template_chars(&serialize_template(&ir.template_nodes), validator);
    w.open(&format!("if (!{}._template)", class));
    w.line("const template = document.createElement('template');");
    w.line(&format!("template.innerHTML = `{}`;", html));
    w.line(&format!("{}._template = template;", class));
    w.close();
    w.line(&format!(
        "root.appendChild({}._template.content.cloneNode(true));",
        class
    ));
}

fn emit_template_node(
    w: &mut JsWriter,
    ctx: &mut EmitContext,
    node: &TemplateNode,
    parent: &str,
    validator: &dyn ContentValidator,
) {
    match node {
        TemplateNode::Text(t) => w.line(&format!(
            "{}.appendChild(document.createTextNode({}));",
            parent,
            text_literal(&t.content, validator)
        )),
        TemplateNode::Element(el) => emit_element(w, ctx, el, parent, validator),
    }
}

fn emit_element(
    w: &mut JsWriter,
    ctx: &mut EmitContext,
    el: &ElementNode,
    parent: &str,
    validator: &dyn ContentValidator,
) {
    let var = ctx.fresh("el");
    w.line(&format!(
        "const {} = document.createElement({});",
        var,
        js_string(&el.tag)
    ));
    for (name, value) in &el.attrs {
        w.line(&format!(
            "{}.setAttribute({}, {});",
            var,
            js_string(name),
            text_literal(value, validator)
        ));
    }
    for child in &el.children {
        emit_template_node(w, ctx, child, &var, validator);
    }
    w.line(&format!("{}.appendChild({});", parent, var));
}

/// Template nodes into `frag`, then the body's directives scoped to it.
fn emit_body(
    w: &mut JsWriter,
    ctx: &mut EmitContext,
    body: &Body,
    frag: &str,
    validator: &dyn ContentValidator,
) {
    for node in &body.template {
        emit_template_node(w, ctx, node, frag, validator);
    }
    let scope = Scope {
        parent: frag,
        query: frag,
    };
    for directive in &body.directives {
        emit_directive(w, ctx, directive, scope, validator);
    }
}

/// Element lookup: the local fragment first, then the component root.
fn select(scope: Scope, selector: &str) -> String {
    let sel = js_string(selector);
    if scope.query == "root" {
        format!("root.querySelector({})", sel)
    } else {
        format!(
            "({}.querySelector({}) || root.querySelector({}))",
            scope.query, sel, sel
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIRECTIVE EMISSION
// ═══════════════════════════════════════════════════════════════════════════════

fn emit_directive(
    w: &mut JsWriter,
    ctx: &mut EmitContext,
    directive: &DirectiveNode,
    scope: Scope,
    validator: &dyn ContentValidator,
) {
    if let DirectiveNode::RawStatement(raw) = directive {
        if raw.kind.is_declaration() {
            w.line(&raw.code);
            return;
        }
    }

    w.open("try");
    match directive {
        DirectiveNode::Loop(l) => {
            let frag = ctx.fresh("frag");
            let iter = ctx.fresh("iter");
            w.line(&format!("const {} = document.createDocumentFragment();", frag));
            match &l.mode {
                LoopMode::Array {
                    source,
                    item,
                    index: None,
                } => {
                    w.open(&format!("for (const {} of (({}) || []))", item, source));
                }
                LoopMode::Array {
                    source,
                    item,
                    index: Some(index),
                } => {
                    let list = ctx.fresh("list");
                    w.line(&format!("const {} = Array.from(({}) || []);", list, source));
                    w.open(&format!(
                        "for (let {idx} = 0; {idx} < {list}.length; {idx}++)",
                        idx = index,
                        list = list
                    ));
                    w.line(&format!("const {} = {}[{}];", item, list, index));
                }
                LoopMode::Range { count, index } => {
                    w.open(&format!(
                        "for (let {idx} = 0; {idx} < {count}; {idx}++)",
                        idx = index,
                        count = count
                    ));
                }
            }
            w.line(&format!("const {} = document.createDocumentFragment();", iter));
            emit_body(w, ctx, &l.body, &iter, validator);
            w.line(&format!("{}.appendChild({});", frag, iter));
            w.close();
            w.line(&format!("{}.appendChild({});", scope.parent, frag));
        }
        DirectiveNode::Condition(cond) => {
            let frag = ctx.fresh("frag");
            w.line(&format!("const {} = document.createDocumentFragment();", frag));
            write_condition_chain(w, cond, &mut |w, body| {
                emit_body(w, ctx, body, &frag, validator)
            });
            w.line(&format!("{}.appendChild({});", scope.parent, frag));
        }
        DirectiveNode::Switch(sw) => {
            let frag = ctx.fresh("frag");
            let subject = ctx.fresh("sw");
            w.line(&format!("const {} = document.createDocumentFragment();", frag));
            w.line(&format!("const {} = ({});", subject, sw.expr));
            write_switch_chain(w, &subject, sw, &mut |w, body| {
                emit_body(w, ctx, body, &frag, validator)
            });
            w.line(&format!("{}.appendChild({});", scope.parent, frag));
        }
        DirectiveNode::While(wh) => {
            let frag = ctx.fresh("frag");
            let guard = ctx.fresh("guard");
            let iter = ctx.fresh("iter");
            w.line(&format!("const {} = document.createDocumentFragment();", frag));
            w.line(&format!("let {} = 0;", guard));
            w.open(&format!("while ({})", wh.condition));
            w.open(&format!("if ({} >= {})", guard, wh.max_iterations));
            w.line(&format!(
                "console.warn('[htms] while loop stopped after {} iterations');",
                wh.max_iterations
            ));
            w.line("break;");
            w.close();
            w.line(&format!("{}++;", guard));
            w.line(&format!("const {} = document.createDocumentFragment();", iter));
            emit_body(w, ctx, &wh.body, &iter, validator);
            w.line(&format!("{}.appendChild({});", frag, iter));
            w.close();
            w.line(&format!("{}.appendChild({});", scope.parent, frag));
        }
        DirectiveNode::Event(ev) => {
            let el = ctx.fresh("el");
            w.line(&format!("const {} = {};", el, select(scope, &ev.selector)));
            w.open(&format!("if ({})", el));
            w.open(&format!(
                "{}.addEventListener({}, (event) =>",
                el,
                js_string(&ev.event_type)
            ));
            if ev.prevent_default {
                w.line("event.preventDefault();");
            }
            for statement in &ev.body {
                w.line(statement);
            }
            for nested in &ev.nested_directives {
                emit_directive(w, ctx, nested, ROOT_SCOPE, validator);
            }
            if ev.rerender && contains_state_mutation(&ev.nested_directives) {
                w.line("this.render();");
            }
            w.line("if (window.__htms) window.__htms.notify();");
            w.close_with(");");
            w.close();
        }
        DirectiveNode::Visibility(v) => {
            let el = ctx.fresh("el");
            w.line(&format!("const {} = {};", el, select(scope, &v.selector)));
            match v.mode {
                VisibilityMode::Toggle => {
                    w.line(&format!("if ({}) {}.hidden = !({});", el, el, v.condition))
                }
                VisibilityMode::Show => w.line(&format!(
                    "if ({}) {}.style.display = ({}) ? '' : 'none';",
                    el, el, v.condition
                )),
            }
        }
        DirectiveNode::Attribute(a) => {
            let el = ctx.fresh("el");
            w.line(&format!("const {} = {};", el, select(scope, &a.selector)));
            match a.target {
                AttributeTarget::Attribute => w.line(&format!(
                    "if ({}) {}.setAttribute({}, String({}));",
                    el,
                    el,
                    js_string(&a.name),
                    a.value_expr
                )),
                AttributeTarget::Property => {
                    let mut target = format!("{}.{}", el, a.name);
                    for segment in a.path.iter().flatten() {
                        target.push('.');
                        target.push_str(segment);
                    }
                    w.line(&format!("if ({}) {} = ({});", el, target, a.value_expr));
                }
            }
        }
        DirectiveNode::Append(a) => {
            let el = ctx.fresh("el");
            let frag = ctx.fresh("frag");
            w.line(&format!("const {} = {};", el, select(scope, &a.selector)));
            w.open(&format!("if ({})", el));
            w.line(&format!("const {} = document.createDocumentFragment();", frag));
            emit_body(w, ctx, &a.body, &frag, validator);
            if a.anchor {
                w.line(&format!("{}.replaceWith({});", el, frag));
            } else {
                w.line(&format!("{}.appendChild({});", el, frag));
            }
            w.close();
        }
        DirectiveNode::Bind(b) => {
            let el = ctx.fresh("el");
            w.line(&format!("const {} = {};", el, select(scope, &b.selector)));
            w.line(&format!(
                "if ({} && window.__htms) window.__htms.bind({}, {}, () => ({}));",
                el,
                el,
                js_string(&b.property),
                b.expr
            ));
        }
        DirectiveNode::Class(c) => {
            let el = ctx.fresh("el");
            w.line(&format!("const {} = {};", el, select(scope, &c.selector)));
            let names: Vec<String> = c.names.iter().map(|n| js_string(n)).collect();
            let list = names.join(", ");
            w.open(&format!("if ({})", el));
            match (c.action, &c.condition) {
                (ClassAction::Toggle, Some(cond)) => {
                    for name in &names {
                        w.line(&format!("{}.classList.toggle({}, !!({}));", el, name, cond));
                    }
                }
                (ClassAction::Toggle, None) => {
                    for name in &names {
                        w.line(&format!("{}.classList.toggle({});", el, name));
                    }
                }
                (action, cond) => {
                    let method = if action == ClassAction::Add { "add" } else { "remove" };
                    let call = format!("{}.classList.{}({});", el, method, list);
                    match cond {
                        Some(cond) => w.line(&format!("if ({}) {}", cond, call)),
                        None => w.line(&call),
                    }
                }
            }
            w.close();
        }
        DirectiveNode::Style(s) => {
            let el = ctx.fresh("el");
            w.line(&format!("const {} = {};", el, select(scope, &s.selector)));
            match s.mode {
                StyleMode::CssProperty => w.line(&format!(
                    "if ({}) {}.style.setProperty({}, String({}));",
                    el,
                    el,
                    js_string(&s.property),
                    s.value_expr
                )),
                StyleMode::JsProperty => w.line(&format!(
                    "if ({}) {}.style.{} = ({});",
                    el, el, s.property, s.value_expr
                )),
            }
        }
        DirectiveNode::State(state) => w.line(&state_call(state)),
        DirectiveNode::Effect(effect) => emit_effect(w, effect),
        DirectiveNode::KeyedList(k) => {
            let el = ctx.fresh("el");
            let frag = ctx.fresh("frag");
            w.line(&format!("const {} = {};", el, select(scope, &k.selector)));
            w.open(&format!("if ({} && window.__htms)", el));
            w.open(&format!(
                "window.__htms.keyedList({}, (({}) || []), ({}) =>",
                el, k.items, k.item
            ));
            w.line(&format!("const {} = document.createDocumentFragment();", frag));
            emit_body(w, ctx, &k.body, &frag, validator);
            w.line(&format!("return {}.firstElementChild;", frag));
            w.close_with(&format!(", ({}) => ({}));", k.item, k.key_expr));
            w.close();
        }
        DirectiveNode::RawStatement(raw) => w.line(&raw.code),
    }
    w.reopen("catch (err)");
    w.line(&format!(
        "console.error('[htms] {} directive failed', err);",
        directive.kind_name()
    ));
    w.close();
}

fn path_literal(path: &[String]) -> String {
    let segments: Vec<String> = path.iter().map(|s| format!("'{}'", s)).collect();
    format!("[{}]", segments.join(", "))
}

/// Helper call for one state directive.
pub fn state_call(state: &StateDirective) -> String {
    let path = path_literal(&state.path);
    match state.mode {
        StateMode::Init => format!(
            "this.initState({}, () => ({}));",
            path,
            state.value.as_deref().unwrap_or("undefined")
        ),
        StateMode::Set => {
            let op = state.op.unwrap_or(SetOperator::Assign);
            if op.is_unary() {
                format!("this.setState({}, '{}');", path, op.as_str())
            } else {
                format!(
                    "this.setState({}, '{}', ({}));",
                    path,
                    op.as_str(),
                    state.value.as_deref().unwrap_or("undefined")
                )
            }
        }
        StateMode::Push => format!(
            "this.pushState({}, [{}]);",
            path,
            wrapped_list(state.values.as_deref().unwrap_or_default())
        ),
        StateMode::Splice => format!(
            "this.spliceState({}, ({}), ({}), [{}]);",
            path,
            state.index.as_deref().unwrap_or("0"),
            state.delete_count.as_deref().unwrap_or("1"),
            wrapped_list(state.values.as_deref().unwrap_or_default())
        ),
    }
}

fn wrapped_list(values: &[String]) -> String {
    values
        .iter()
        .map(|v| format!("({})", v))
        .collect::<Vec<_>>()
        .join(", ")
}

fn emit_effect(w: &mut JsWriter, effect: &EffectDirective) {
    w.open("if (window.__htms)");
    w.open_raw("window.__htms.registerEffect({");
    w.line("owner: this,");
    w.line(&format!("id: {},", js_string(&effect.id)));
    let deps: Vec<String> = effect
        .deps
        .iter()
        .map(|d| format!("() => ({})", d))
        .collect();
    w.line(&format!("deps: [{}],", deps.join(", ")));
    w.open("run: () =>");
    match &effect.kind {
        EffectKind::Code { body } => w.line(body),
        EffectKind::Fetch {
            url,
            method,
            into,
            response,
        } => {
            let reader = match response {
                ResponseKind::Json => "json",
                ResponseKind::Text => "text",
            };
            w.line("const controller = new AbortController();");
            w.line(&format!(
                "fetch({}, {{ method: {}, signal: controller.signal }})",
                js_string(url),
                js_string(method)
            ));
            w.open("  .then((response) =>");
            w.line("if (!response.ok) throw new Error('HTTP ' + response.status);");
            w.line(&format!("return response.{}();", reader));
            w.close_with(")");
            w.open("  .then((data) =>");
            w.line(&format!("this.setState({}, '=', data);", path_literal(into)));
            w.line("this.render();");
            w.close_with(")");
            w.open("  .catch((err) =>");
            w.line("if (err && err.name === 'AbortError') return;");
            w.line("console.error('[htms] fetch failed', err);");
            w.close_with(");");
            w.line("return () => controller.abort();");
        }
    }
    w.close_with(",");
    w.line(&format!("immediate: {},", effect.immediate));
    w.line(&format!("once: {},", effect.once));
    w.close_with(");");
    w.close();
}

const STATE_HELPERS: &str = r#"resolvePath(path) {
  let target = this;
  for (let i = 0; i < path.length - 1; i++) {
    const key = path[i];
    if (target[key] === null || typeof target[key] !== 'object') {
      target[key] = {};
    }
    target = target[key];
  }
  return { target, key: path[path.length - 1] };
}

initState(path, factory) {
  const { target, key } = this.resolvePath(path);
  if (!Object.prototype.hasOwnProperty.call(target, key)) {
    target[key] = factory();
  }
  return target[key];
}

setState(path, op, value) {
  const { target, key } = this.resolvePath(path);
  switch (op) {
    case '=': target[key] = value; break;
    case '+=': target[key] += value; break;
    case '-=': target[key] -= value; break;
    case '*=': target[key] *= value; break;
    case '/=': target[key] /= value; break;
    case '++': target[key] = Number(target[key] || 0) + 1; break;
    case '--': target[key] = Number(target[key] || 0) - 1; break;
    default: throw new Error('[htms] unknown state operator ' + op);
  }
  return target[key];
}

arrayAt(path) {
  const { target, key } = this.resolvePath(path);
  if (!Array.isArray(target[key])) {
    target[key] = target[key] == null ? [] : [target[key]];
  }
  return target[key];
}

pushState(path, values) {
  const list = this.arrayAt(path);
  list.push(...values);
  return list;
}

spliceState(path, index, deleteCount, values) {
  return this.arrayAt(path).splice(index, deleteCount, ...values);
}"#;

fn emit_state_helpers(w: &mut JsWriter) {
    w.line(STATE_HELPERS);
}

#[cfg(test)]
#[path = "codegen_tests.rs"]
mod codegen_tests;
