use super::*;
use crate::component::compile_component;
use crate::ir::{StateDirective, StateMode};
use crate::options::CompileOptions;
use crate::parse::{find_components, parse_source};
use crate::security::{OxcSyntaxChecker, PatternValidator, SyntaxChecker};
use std::collections::BTreeMap;

fn emit(src: &str) -> String {
    let nodes = parse_source(src).unwrap();
    let components = find_components(&nodes);
    let unit = compile_component(&components[0], &CompileOptions::default(), &PatternValidator);
    assert!(
        unit.diagnostics.errors.is_empty(),
        "{:?}",
        unit.diagnostics.errors
    );
    emit_class(unit.metadata.as_ref().unwrap(), &unit.ir, &PatternValidator)
}

fn assert_parses(code: &str) {
    let report = OxcSyntaxChecker.check(code);
    assert!(report.passed, "{:?}\n{}", report, code);
}

fn position(code: &str, needle: &str) -> usize {
    code.find(needle)
        .unwrap_or_else(|| panic!("missing `{}` in\n{}", needle, code))
}

// ═══════════════════════════════════════════════════════════════════════════════
// WRITER AND LITERALS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_writer_indents_blocks() {
    let mut w = JsWriter::new();
    w.open("if (a)");
    w.line("x();");
    w.reopen("else");
    w.line("y();\nz();");
    w.close();
    assert_eq!(
        w.finish(),
        "if (a) {\n  x();\n} else {\n  y();\n  z();\n}\n"
    );
}

#[test]
fn test_js_string_escapes() {
    assert_eq!(js_string("a\"b\n"), "\"a\\\"b\\n\"");
    assert_eq!(
        js_string_array(&["x".to_string(), "y".to_string()]),
        "[\"x\", \"y\"]"
    );
}

#[test]
fn test_text_literal_interpolation() {
    assert_eq!(text_literal("plain", &PatternValidator), "\"plain\"");
    assert_eq!(
        text_literal("Count: {{ this.count }}", &PatternValidator),
        "`Count: ${(this.count) ?? ''}`"
    );
    assert_eq!(
        text_literal("a`b\n{{ x }}", &PatternValidator),
        "`a\\`b\\n${(x) ?? ''}`"
    );
}

#[test]
fn test_serialize_template_escapes() {
    let mut attrs = BTreeMap::new();
    attrs.insert("title".to_string(), "say \"hi\"".to_string());
    let nodes = vec![
        TemplateNode::element("p", attrs, vec![TemplateNode::text("1 < 2 & 3")]),
        TemplateNode::element("br", BTreeMap::new(), vec![]),
    ];
    assert_eq!(
        serialize_template(&nodes),
        "<p title=\"say &quot;hi&quot;\">1 &lt; 2 &amp; 3</p><br>"
    );
}

#[test]
fn test_state_calls() {
    let mut init = StateDirective::new(StateMode::Init, vec!["count".to_string()]);
    init.value = Some("0".to_string());
    assert_eq!(state_call(&init), "this.initState(['count'], () => (0));");

    let mut inc = StateDirective::new(StateMode::Set, vec!["count".to_string()]);
    inc.op = Some(SetOperator::Increment);
    assert_eq!(state_call(&inc), "this.setState(['count'], '++');");

    let mut add = StateDirective::new(
        StateMode::Set,
        vec!["stats".to_string(), "total".to_string()],
    );
    add.op = Some(SetOperator::Add);
    add.value = Some("5".to_string());
    assert_eq!(
        state_call(&add),
        "this.setState(['stats', 'total'], '+=', (5));"
    );

    let mut push = StateDirective::new(StateMode::Push, vec!["items".to_string()]);
    push.values = Some(vec!["x".to_string()]);
    assert_eq!(state_call(&push), "this.pushState(['items'], [(x)]);");

    let mut splice = StateDirective::new(StateMode::Splice, vec!["items".to_string()]);
    splice.index = Some("0".to_string());
    splice.delete_count = Some("1".to_string());
    splice.values = Some(vec![]);
    assert_eq!(
        state_call(&splice),
        "this.spliceState(['items'], (0), (1), []);"
    );
}

// ═══════════════════════════════════════════════════════════════════════════════
// CLASS SHAPE
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_static_component_uses_cached_template() {
    let code = emit(r#"<component name="x-hello"><p class="greeting">Hello</p></component>"#);
    assert!(code.contains("class XHello extends HTMLElement {"));
    assert!(code.contains("if (!XHello._template) {"));
    assert!(code.contains("template.innerHTML = `<p class=\"greeting\">Hello</p>`;"));
    assert!(code.contains("root.appendChild(XHello._template.content.cloneNode(true));"));
    assert!(!code.contains("createDocumentFragment"));
    assert!(!code.contains("resolvePath"));
    assert!(!code.contains("disconnectedCallback"));
    assert_parses(&code);
}

#[test]
fn test_props_observed_and_shadow() {
    let code = emit(
        r#"<component name="user-card" props="userId" observed="mode" shadow="none"><p>{{ this.mode }}</p></component>"#,
    );
    assert!(code.contains("this._root = this;"));
    assert!(code.contains("static get observedAttributes() {"));
    assert!(code.contains("return [\"mode\"];"));
    assert!(code.contains("if (this.hasAttribute(\"userid\")) {"));
    assert!(code.contains("this.userId = this.getAttribute(\"userid\");"));
    assert!(code.contains("attributeChangedCallback(name, oldValue, newValue) {"));
    assert_parses(&code);
}

const COUNTER: &str = r##"
<component name="counter-box">
  <p>Count: {{ this.count }}</p>
  <button id="inc">+</button>
  <event target="#inc" type="click">
    <set name="count" op="++"></set>
  </event>
  <var name="count" value="0"></var>
</component>
"##;

#[test]
fn test_state_initializers_run_before_template() {
    let code = emit(COUNTER);
    let init = position(&code, "this.initState(['count'], () => (0));");
    let frag = position(&code, "document.createDocumentFragment()");
    let listener = position(&code, "addEventListener(\"click\", (event) => {");
    assert!(init < frag);
    assert!(frag < listener);
    assert!(code.contains("createTextNode(`Count: ${(this.count) ?? ''}`)"));
}

#[test]
fn test_event_handler_rerenders_after_mutation() {
    let code = emit(COUNTER);
    // connectedCallback also calls render, so look after the mutation.
    let after_set = &code[position(&code, "this.setState(['count'], '++');")..];
    let rerender = position(after_set, "this.render();");
    let notify = position(after_set, "if (window.__htms) window.__htms.notify();");
    assert!(rerender < notify);
    assert!(code.contains("resolvePath(path) {"));
    assert_parses(&code);
}

#[test]
fn test_directives_are_isolated_but_declarations_are_not() {
    let code = emit(COUNTER);
    // initState, the event, and the set inside it.
    assert_eq!(code.matches("try {").count(), 3);
    assert!(code.contains("console.error('[htms] event directive failed', err);"));

    let code = emit(
        r#"<component name="x-colors"><array name="colors" items='["red"]'></array><p>{{ colors[0] }}</p></component>"#,
    );
    assert_eq!(code.matches("try {").count(), 0);
    let decl = position(&code, "const colors = [\"red\"];");
    assert!(decl < position(&code, "document.createDocumentFragment()"));
    assert_parses(&code);
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIRECTIVES
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_condition_chain_matches_skeleton_shape() {
    let code = emit(concat!(
        r#"<component name="x-sign">"#,
        r#"<if condition="this.n > 0"><p>pos</p></if>"#,
        r#"<elseif condition="this.n < 0"><p>neg</p></elseif>"#,
        r#"<else><p>zero</p></else>"#,
        r#"</component>"#,
    ));
    let head = position(&code, "if (this.n > 0) {");
    let middle = position(&code, "} else if (this.n < 0) {");
    let tail = position(&code, "} else {");
    assert!(head < middle && middle < tail);
    assert_parses(&code);
}

#[test]
fn test_switch_compares_strictly() {
    let code = emit(concat!(
        r#"<component name="x-mode"><switch value="this.mode">"#,
        r#"<case value="1"><p>one</p></case>"#,
        r#"<case value="edit"><p>edit</p></case>"#,
        r#"<case value="007"><p>agent</p></case>"#,
        r#"<case value="1e3"><p>exp</p></case>"#,
        r#"<default><p>other</p></default>"#,
        r#"</switch></component>"#,
    ));
    assert!(code.contains("= (this.mode);"));
    assert!(code.contains(" === 1) {"));
    assert!(code.contains(" === 7) {"));
    assert!(!code.contains("007"));
    assert!(code.contains(" === \"1e3\") {"));
    assert!(code.contains(" === \"edit\") {"));
    assert_parses(&code);
}

#[test]
fn test_loops_and_scoped_selectors() {
    let code = emit(concat!(
        r#"<component name="x-loops">"#,
        r#"<repeat count="3"><span class="dot"></span><class target=".dot" name="on"></class></repeat>"#,
        r#"<repeat items="this.rows" as="row" index="r"><p>{{ r }}: {{ row }}</p></repeat>"#,
        r#"<while condition="this.more()" maxIterations="5"><p>more</p></while>"#,
        r#"</component>"#,
    ));
    assert!(code.contains("for (let i = 0; i < 3; i++) {"));
    assert!(code.contains(".querySelector(\".dot\") || root.querySelector(\".dot\"))"));
    assert!(code.contains("= Array.from((this.rows) || []);"));
    assert!(code.contains("for (let r = 0; r < "));
    assert!(code.contains(" >= 5) {"));
    assert!(code.contains("console.warn('[htms] while loop stopped after 5 iterations');"));
    assert_parses(&code);
}

#[test]
fn test_hoisted_directives_target_slot() {
    let code = emit(
        r#"<component name="x-slot"><div><bind target=".x" value="this.v"></bind></div></component>"#,
    );
    assert!(code.contains(r#"document.createElement("template");"#));
    assert!(code.contains(r#"setAttribute("data-htms-slot", "slot_0");"#));
    assert!(code.contains(r#"root.querySelector("[data-htms-slot=\"slot_0\"]")"#));
    assert!(code.contains(".replaceWith(frag_"));
    assert!(code.contains("window.__htms.bind("));
    assert!(code.contains("disconnectedCallback() {"));
    assert_parses(&code);
}

#[test]
fn test_effect_registration() {
    let code = emit(
        r#"<component name="x-fx"><effect deps="this.a; this.b" immediate="false">console.log(this.a)</effect></component>"#,
    );
    assert!(code.contains("window.__htms.registerEffect({"));
    assert!(code.contains("owner: this,"));
    assert!(code.contains("id: \"effect_0\","));
    assert!(code.contains("deps: [() => (this.a), () => (this.b)],"));
    assert!(code.contains("run: () => {"));
    assert!(code.contains("immediate: false,"));
    assert!(code.contains("once: false,"));
    assert_parses(&code);
}

#[test]
fn test_fetch_aborts_and_writes_state() {
    let code = emit(
        r#"<component name="x-data"><fetch url="/api/items" into="items" once></fetch></component>"#,
    );
    assert!(code.contains("const controller = new AbortController();"));
    assert!(code.contains(
        "fetch(\"/api/items\", { method: \"GET\", signal: controller.signal })"
    ));
    assert!(code.contains("if (!response.ok) throw new Error('HTTP ' + response.status);"));
    assert!(code.contains("return response.json();"));
    assert!(code.contains("this.setState(['items'], '=', data);"));
    assert!(code.contains("if (err && err.name === 'AbortError') return;"));
    assert!(code.contains("return () => controller.abort();"));
    assert!(code.contains("once: true,"));
    assert!(!code.contains("notify()"));
    assert!(code.contains("spliceState(path, index, deleteCount, values) {"));
    assert_parses(&code);
}

#[test]
fn test_keyed_list_emission() {
    let code = emit(concat!(
        r#"<component name="x-list"><ul id="list"></ul>"#,
        r##"<keyedlist target="#list" items="this.todos" as="todo" key="todo.id">"##,
        "<li>{{ todo.text }}</li></keyedlist></component>",
    ));
    assert!(code.contains("window.__htms.keyedList("));
    assert!(code.contains("|| []), (todo) => {"));
    assert!(code.contains(".firstElementChild;"));
    assert!(code.contains("}, (todo) => (todo.id));"));
    assert_parses(&code);
}

#[test]
fn test_keyed_list_item_named_index() {
    let code = emit(concat!(
        r#"<component name="x-index"><ul id="list"></ul>"#,
        r##"<keyedlist target="#list" items="this.rows" as="index" key="index.id">"##,
        "<li>{{ index.label }}</li></keyedlist></component>",
    ));
    assert!(code.contains("|| []), (index) => {"));
    assert!(!code.contains("(index, index)"));
    assert_parses(&code);
}

const KITCHEN_SINK: &str = r##"
<component name="todo-app" props="heading" observed="filter">
  <var name="todos" value="[]"></var>
  <var name="draft" value="''"></var>
  <array name="labels" items='["low", "high"]'></array>
  <function name="label" params="n">return labels[n] || 'none';</function>
  <h1>{{ this.heading }}</h1>
  <input id="draft">
  <model target="#draft" name="draft"></model>
  <button id="add">Add</button>
  <event target="#add" type="click" prevent>
    <push name="todos" value="{ id: Date.now(), text: this.draft }"></push>
    <set name="draft" value="''"></set>
  </event>
  <ul id="list"></ul>
  <keyedlist target="#list" items="this.todos" as="todo" key="todo.id"><li>{{ todo.text }}</li></keyedlist>
  <if condition="this.todos.length === 0"><p>Nothing yet</p></if>
  <elseif condition="this.todos.length > 10"><p>Busy</p></elseif>
  <else><p>{{ this.todos.length }} items</p></else>
  <switch value="this.filter"><case value="done"><p>Done</p></case><default><p>All</p></default></switch>
  <repeat count="3" index="n"><span>{{ label(n % 2) }}</span></repeat>
  <while condition="this.todos.length > 100" maxIterations="5"><set name="todos" value="this.todos.slice(1)"></set></while>
  <effect deps="this.todos.length">console.log(this.todos.length)</effect>
  <fetch url="/api/todos" into="todos" once></fetch>
  <class target="#list" name="empty" when="this.todos.length === 0"></class>
  <style target="#list" property="border-color" value="this.todos.length ? 'green' : 'grey'"></style>
  <setattr target="#list" name="aria-busy" value="false"></setattr>
  <setprop target="#draft" name="dataset.count" value="this.todos.length"></setprop>
  <toggle target="#add" when="this.draft.length === 0"></toggle>
  <show target="#list" when="this.todos.length > 0"></show>
  <bind target="h1" value="this.heading"></bind>
  <splice name="todos" index="0" deleteCount="0"></splice>
  <print value="this.todos.length"></print>
  <call function="console.info" args="'ready'"></call>
  <comment text="end of component"></comment>
</component>
"##;

#[test]
fn test_every_directive_emits_parseable_code() {
    let code = emit(KITCHEN_SINK);
    assert_parses(&code);
    assert!(code.contains("event.preventDefault();"));
    assert!(code.contains("this.pushState(['todos'], [({ id: Date.now(), text: this.draft })]);"));
    assert!(code.contains(".style.setProperty(\"border-color\", String("));
    assert!(code.contains(".dataset.count = (this.todos.length);"));
    assert!(code.contains(".hidden = !(this.draft.length === 0);"));
    assert!(code.contains(".style.display = (this.todos.length > 0) ? '' : 'none';"));
    assert!(code.contains("/* end of component */"));
    assert!(code.contains("console.info('ready');"));
}
