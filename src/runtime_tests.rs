//! Runtime behaviour, executed in a JS engine against a minimal DOM.
//!
//! The DOM below only covers what the runtime and emitted classes touch:
//! element trees, fragments, shadow roots, simple selectors, attributes,
//! class lists and click listeners.

use boa_engine::{Context, JsValue, Source};

use super::RUNTIME_SOURCE;
use crate::finalize::compile_document;
use crate::options::{CompileOptions, ModuleFormat};

const DOM: &str = r#"
(function () {
  'use strict';
  const errors = [];
  globalThis.__errors = errors;
  globalThis.console = {
    log() {},
    warn() {},
    error(...args) {
      errors.push(args.map(String).join(' '));
    },
  };

  function matches(el, selector) {
    const attr = /^\[([^=\]]+)="([^"]*)"\]$/.exec(selector);
    if (attr) return el.getAttribute(attr[1]) === attr[2];
    if (selector[0] === '#') return el.getAttribute('id') === selector.slice(1);
    if (selector[0] === '.') return el.classList.contains(selector.slice(1));
    return el.tagName === selector.toUpperCase();
  }

  class Node {
    constructor(nodeType) {
      this.nodeType = nodeType;
      this.parentNode = null;
      this.childNodes = [];
      this.listeners = {};
    }
    get firstChild() {
      return this.childNodes[0] || null;
    }
    get children() {
      return this.childNodes.filter((n) => n.nodeType === 1);
    }
    get firstElementChild() {
      return this.children[0] || null;
    }
    get isConnected() {
      let node = this;
      while (node) {
        if (node === document.documentElement) return true;
        node = node.parentNode || node.host || null;
      }
      return false;
    }
    get textContent() {
      return this.childNodes.map((n) => n.textContent).join('');
    }
    set textContent(value) {
      for (const child of this.childNodes) child.parentNode = null;
      this.childNodes = [];
      const text = value === null || value === undefined ? '' : String(value);
      if (text !== '') this.appendChild(new Text(text));
    }
    insertBefore(node, ref) {
      if (node.nodeType === 11) {
        for (const child of node.childNodes.slice()) this.insertBefore(child, ref);
        return node;
      }
      if (node.parentNode) node.parentNode.removeChild(node);
      const at = ref ? this.childNodes.indexOf(ref) : -1;
      if (at === -1) this.childNodes.push(node);
      else this.childNodes.splice(at, 0, node);
      node.parentNode = this;
      return node;
    }
    appendChild(node) {
      return this.insertBefore(node, null);
    }
    removeChild(node) {
      const at = this.childNodes.indexOf(node);
      if (at !== -1) this.childNodes.splice(at, 1);
      node.parentNode = null;
      return node;
    }
    replaceWith(node) {
      const parent = this.parentNode;
      if (!parent) return;
      parent.insertBefore(node, this);
      parent.removeChild(this);
    }
    querySelector(selector) {
      for (const child of this.children) {
        if (matches(child, selector)) return child;
        const found = child.querySelector(selector);
        if (found) return found;
      }
      return null;
    }
    addEventListener(type, fn) {
      (this.listeners[type] = this.listeners[type] || []).push(fn);
    }
    dispatchEvent(event) {
      for (const fn of (this.listeners[event.type] || []).slice()) fn(event);
      return true;
    }
  }

  class Text extends Node {
    constructor(data) {
      super(3);
      this.data = data;
    }
    get textContent() {
      return this.data;
    }
    set textContent(value) {
      this.data = String(value);
    }
  }

  class ClassList {
    constructor() {
      this.names = new Set();
    }
    reset(value) {
      this.names = new Set(value.split(/\s+/).filter(Boolean));
    }
    add(...names) {
      for (const n of names) this.names.add(n);
    }
    remove(...names) {
      for (const n of names) this.names.delete(n);
    }
    toggle(name, force) {
      const on = force === undefined ? !this.names.has(name) : !!force;
      if (on) this.names.add(name);
      else this.names.delete(name);
      return on;
    }
    contains(name) {
      return this.names.has(name);
    }
    toString() {
      return Array.from(this.names).join(' ');
    }
  }

  class Element extends Node {
    constructor(tag) {
      super(1);
      this.tagName = String(tag).toUpperCase();
      this.attributes = new Map();
      this.classList = new ClassList();
      this.style = {
        setProperty(name, value) {
          this[name] = value;
        },
      };
      this.hidden = false;
    }
    setAttribute(name, value) {
      if (name === 'class') this.classList.reset(String(value));
      else this.attributes.set(name, String(value));
    }
    getAttribute(name) {
      if (name === 'class') return this.classList.toString();
      return this.attributes.has(name) ? this.attributes.get(name) : null;
    }
    hasAttribute(name) {
      return this.attributes.has(name);
    }
    click() {
      this.dispatchEvent({ type: 'click', target: this, preventDefault() {} });
    }
  }

  class DocumentFragment extends Node {
    constructor() {
      super(11);
    }
  }

  class ShadowRoot extends DocumentFragment {
    constructor(host, mode) {
      super();
      this.host = host;
      this.mode = mode;
    }
  }

  class HTMLElement extends Element {
    constructor() {
      super('htms-host');
    }
    attachShadow(init) {
      const root = new ShadowRoot(this, init.mode);
      if (init.mode === 'open') this.shadowRoot = root;
      return root;
    }
  }

  const documentElement = new Element('html');
  const body = new Element('body');
  documentElement.appendChild(body);
  const document = {
    documentElement,
    body,
    createElement: (tag) => new Element(tag),
    createTextNode: (text) => new Text(String(text)),
    createDocumentFragment: () => new DocumentFragment(),
    querySelector: (selector) => documentElement.querySelector(selector),
  };

  const registry = new Map();
  const customElements = {
    define(tag, ctor) {
      if (registry.has(tag)) throw new Error('already defined: ' + tag);
      registry.set(tag, ctor);
    },
    get(tag) {
      return registry.get(tag);
    },
  };

  Object.assign(globalThis, {
    window: globalThis,
    document,
    customElements,
    HTMLElement,
  });
})();
"#;

struct Page {
    context: Context,
}

impl Page {
    fn blank() -> Self {
        let mut page = Page {
            context: Context::default(),
        };
        page.run(DOM);
        page
    }

    fn with_runtime() -> Self {
        let mut page = Self::blank();
        page.run(RUNTIME_SOURCE);
        page
    }

    /// Compile `src` as an IIFE bundle and load it.
    fn load(src: &str) -> Self {
        let options = CompileOptions {
            module_format: ModuleFormat::Iife,
            ..CompileOptions::default()
        };
        let out = compile_document(src, &options).unwrap();
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        let mut page = Self::blank();
        page.run(&out.code);
        page
    }

    /// Construct `class`, attach it to the body and render it as `box`.
    fn mount(&mut self, class: &str) {
        self.run(&format!(
            "var box = new window.{}(); document.body.appendChild(box); box.connectedCallback();",
            class
        ));
        self.settle();
    }

    fn run(&mut self, code: &str) -> JsValue {
        self.context
            .eval(Source::from_bytes(code))
            .unwrap_or_else(|e| panic!("{:?}\n{}", e, code))
    }

    /// Drain queued microtasks, which is where flushes run.
    fn settle(&mut self) {
        let _ = self.context.run_jobs();
    }

    fn number(&mut self, code: &str) -> f64 {
        self.run(code)
            .as_number()
            .unwrap_or_else(|| panic!("`{}` is not a number", code))
    }

    fn truthy(&mut self, code: &str) -> bool {
        self.run(code).to_boolean()
    }

    fn string(&mut self, code: &str) -> String {
        let value = self.run(code);
        value
            .to_string(&mut self.context)
            .map(|s| s.to_std_string_escaped())
            .unwrap_or_else(|e| panic!("{:?}", e))
    }

    fn assert_no_errors(&mut self) {
        let errors = self.string("__errors.join('\\n')");
        assert!(errors.is_empty(), "{}", errors);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCHEDULER AND EFFECTS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_notify_coalesces_into_one_flush() {
    let mut page = Page::with_runtime();
    page.run("var runs = 0; __htms.registerEffect({ id: 'tick', deps: [], run: () => { runs++; } });");
    page.settle();
    assert_eq!(page.number("runs"), 1.0);

    page.run("__htms.notify(); __htms.notify(); __htms.notify();");
    assert_eq!(page.number("runs"), 1.0);
    page.settle();
    assert_eq!(page.number("runs"), 2.0);
    page.assert_no_errors();
}

#[test]
fn test_same_owner_and_id_updates_in_place() {
    let mut page = Page::with_runtime();
    page.run(concat!(
        "var owner = document.createElement('div'); document.body.appendChild(owner);",
        "var first = 0; var second = 0;",
        "__htms.registerEffect({ owner, id: 'fx', deps: [], run: () => { first++; } });",
        "__htms.registerEffect({ owner, id: 'fx', deps: [], run: () => { second++; } });",
    ));
    page.settle();
    assert_eq!(page.number("__htms.effects.length"), 1.0);
    assert_eq!(page.number("first"), 0.0);
    assert_eq!(page.number("second"), 1.0);
}

#[test]
fn test_effect_reruns_only_on_changed_deps() {
    let mut page = Page::with_runtime();
    page.run(concat!(
        "var state = { a: 1 }; var runs = 0;",
        "__htms.registerEffect({ id: 'watch', deps: [() => state.a], run: () => { runs++; } });",
    ));
    page.settle();
    page.run("__htms.notify();");
    page.settle();
    assert_eq!(page.number("runs"), 1.0);

    page.run("state.a = 2; __htms.notify();");
    page.settle();
    assert_eq!(page.number("runs"), 2.0);
}

#[test]
fn test_once_effect_stays_retired_across_registrations() {
    let mut page = Page::with_runtime();
    page.run(concat!(
        "var owner = document.createElement('div'); document.body.appendChild(owner);",
        "var runs = 0; var cleanups = 0;",
        "var spec = { owner, id: 'boot', deps: [], once: true,",
        "  run: () => { runs++; return () => { cleanups++; }; } };",
        "__htms.registerEffect(spec);",
    ));
    page.settle();
    assert_eq!(page.number("runs"), 1.0);
    assert_eq!(page.number("__htms.effects.length"), 0.0);
    assert_eq!(page.number("cleanups"), 0.0);

    page.run("__htms.registerEffect(spec); __htms.notify();");
    page.settle();
    assert_eq!(page.number("runs"), 1.0);
    assert_eq!(page.number("__htms.effects.length"), 0.0);

    page.run("__htms.disposeEffectsFor(owner);");
    assert_eq!(page.number("cleanups"), 1.0);
    page.run("__htms.registerEffect(spec);");
    page.settle();
    assert_eq!(page.number("runs"), 2.0);
}

#[test]
fn test_dispose_effects_for_owner() {
    let mut page = Page::with_runtime();
    page.run(concat!(
        "var a = document.createElement('div'); var b = document.createElement('div');",
        "document.body.appendChild(a); document.body.appendChild(b);",
        "var cleaned = [];",
        "__htms.registerEffect({ owner: a, id: 'x', deps: [], run: () => () => cleaned.push('a') });",
        "__htms.registerEffect({ owner: b, id: 'x', deps: [], run: () => () => cleaned.push('b') });",
    ));
    page.settle();
    page.run("__htms.disposeEffectsFor(a);");
    assert_eq!(page.string("cleaned.join(',')"), "a");
    assert_eq!(page.number("__htms.effects.length"), 1.0);
}

// ═══════════════════════════════════════════════════════════════════════════════
// BIND AND KEYED LISTS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_bind_writes_to_detached_element() {
    let mut page = Page::with_runtime();
    page.run(concat!(
        "var label = document.createElement('p'); var source = 'hello';",
        "__htms.bind(label, 'textContent', () => source);",
    ));
    assert_eq!(page.string("label.textContent"), "hello");
    assert_eq!(page.number("__htms.watchers.length"), 1.0);

    page.run("document.body.appendChild(label); source = 'world'; __htms.notify();");
    page.settle();
    assert_eq!(page.string("label.textContent"), "world");
    assert_eq!(page.number("__htms.watchers.length"), 1.0);

    page.run("document.body.removeChild(label); __htms.notify();");
    page.settle();
    assert_eq!(page.number("__htms.watchers.length"), 0.0);
}

#[test]
fn test_keyed_list_preserves_node_identity() {
    let mut page = Page::with_runtime();
    page.run(concat!(
        "var list = document.createElement('ul');",
        "var render = (item) => { const li = document.createElement('li'); li.textContent = 'item ' + item.id; return li; };",
        "var key = (item) => item.id;",
        "__htms.keyedList(list, [{ id: 1 }, { id: 2 }], render, key);",
        "var one = list.children[0]; var two = list.children[1];",
    ));
    assert_eq!(page.number("list.children.length"), 2.0);
    assert_eq!(page.string("one.getAttribute('data-key')"), "1");

    page.run("__htms.keyedList(list, [{ id: 2 }, { id: 1 }], render, key);");
    assert!(page.truthy("list.children[0] === two && list.children[1] === one"));

    page.run("__htms.keyedList(list, [{ id: 2 }], render, key);");
    assert!(page.truthy("list.children.length === 1 && list.children[0] === two"));
    assert!(page.truthy("one.parentNode === null"));
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILED COMPONENTS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_counter_click_increments_with_one_render() {
    let mut page = Page::load(concat!(
        r#"<component name="counter-box"><var name="count" value="0" mutable="true"/>"#,
        r#"<p>Count: {{ this.count }}</p><button id="inc"/>"#,
        r##"<event target="#inc" type="click"><set name="count" op="++"/></event></component>"##,
    ));
    page.mount("CounterBox");
    page.run(concat!(
        "var renders = 0; var baseRender = box.render;",
        "box.render = function () { renders++; return baseRender.call(this); };",
    ));
    assert_eq!(page.number("box.count"), 0.0);
    assert_eq!(page.string("box._root.querySelector('p').textContent"), "Count: 0");

    page.run("box._root.querySelector('#inc').click();");
    page.settle();
    assert_eq!(page.number("box.count"), 1.0);
    assert_eq!(page.number("renders"), 1.0);
    assert_eq!(page.string("box._root.querySelector('p').textContent"), "Count: 1");
    page.assert_no_errors();
}

#[test]
fn test_bind_inside_condition_body() {
    let mut page = Page::load(concat!(
        r#"<component name="x-greet"><var name="who" value="'Ada'"/>"#,
        r#"<if condition="true"><p class="who"></p>"#,
        r#"<bind target=".who" property="textContent" value="this.who"/></if></component>"#,
    ));
    page.mount("XGreet");
    assert_eq!(page.string("box._root.querySelector('.who').textContent"), "Ada");

    page.run("box.who = 'Grace'; __htms.notify();");
    page.settle();
    assert_eq!(page.string("box._root.querySelector('.who').textContent"), "Grace");
    page.assert_no_errors();
}

#[test]
fn test_hoisted_directive_renders_in_place() {
    let mut page = Page::load(concat!(
        r#"<component name="x-order"><div id="box"><p>head</p>"#,
        r#"<if condition="true"><b>A</b></if><span>tail</span></div></component>"#,
    ));
    page.mount("XOrder");
    assert_eq!(page.string("box._root.querySelector('#box').textContent"), "headAtail");
    assert!(page.truthy("box._root.querySelector('template') === null"));
    page.assert_no_errors();
}

#[test]
fn test_fetch_without_deps_runs_once() {
    let mut page = Page::load(concat!(
        r#"<component name="x-feed"><var name="hits" value="0"/><button id="more"/>"#,
        r##"<event target="#more" type="click"><set name="hits" op="++"/></event>"##,
        r#"<fetch url="/api/feed" into="feed"/></component>"#,
    ));
    page.run(concat!(
        "var fetchCalls = 0;",
        "globalThis.fetch = () => { fetchCalls++; return Promise.resolve({",
        "  ok: true, status: 200, json: () => Promise.resolve({ n: 7 }) }); };",
        "globalThis.AbortController = class { constructor() { this.signal = {}; } abort() { this.aborted = true; } };",
    ));
    page.mount("XFeed");
    assert_eq!(page.number("fetchCalls"), 1.0);
    assert_eq!(page.number("box.feed.n"), 7.0);
    assert_eq!(page.number("__htms.effects.length"), 0.0);

    page.run("for (let i = 0; i < 3; i++) box._root.querySelector('#more').click();");
    page.settle();
    assert_eq!(page.number("box.hits"), 3.0);
    assert_eq!(page.number("fetchCalls"), 1.0);
    page.assert_no_errors();
}
