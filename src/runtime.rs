//! Embedded reactive runtime
//!
//! The text below is prepended to any module whose components bind, register
//! effects or render keyed lists. It installs a frozen `window.__htms` once per
//! page and is a no-op outside a browser or when already installed.
//!
//! Scheduling model: `notify()` coalesces into a single microtask flush. A flush
//! re-evaluates watchers first, then effects whose dependency values changed
//! under `Object.is`. Effects are keyed by `(owner, id)` so a re-render that
//! registers the same effect updates it in place instead of duplicating it.
//! A finished `once` effect stays retired for its owner until
//! `disposeEffectsFor` runs, so re-registering it from `render()` is a no-op.
//!
//! `bind` and `keyedList` accept elements that are not attached yet, since
//! control-flow bodies are built in detached fragments. A watcher whose element
//! is detached when a flush runs is disposed.

use crate::ir::ComponentIR;
use crate::visitor::census;

/// Names on the installed `window.__htms` object.
pub const RUNTIME_API: &[&str] = &[
    "bind",
    "notify",
    "registerEffect",
    "keyedList",
    "disposeEffectsFor",
    "flush",
    "watchers",
    "effects",
];

pub const RUNTIME_SOURCE: &str = r#"(function () {
  'use strict';
  if (typeof window === 'undefined' || window.__htms) return;

  const watchers = [];
  const effects = [];
  const retired = new Map();
  let flushScheduled = false;

  const schedule = typeof queueMicrotask === 'function'
    ? queueMicrotask
    : (fn) => Promise.resolve().then(fn);

  function resolveTarget(target) {
    if (typeof target === 'string') return document.querySelector(target);
    return target || null;
  }

  function isLive(el) {
    return !!el && el.isConnected !== false;
  }

  function writeProperty(el, prop, value) {
    el[prop] = value === null || value === undefined ? '' : value;
  }

  function bind(target, prop, compute) {
    const el = resolveTarget(target);
    if (!el) return () => {};
    const watcher = { target, prop, compute, disposed: false };
    try {
      writeProperty(el, prop, compute());
    } catch (err) {
      console.error('[htms] bind failed', err);
    }
    watchers.push(watcher);
    return () => disposeWatcher(watcher);
  }

  function disposeWatcher(watcher) {
    watcher.disposed = true;
    const i = watchers.indexOf(watcher);
    if (i !== -1) watchers.splice(i, 1);
  }

  function notify() {
    if (flushScheduled) return;
    flushScheduled = true;
    schedule(flush);
  }

  function ownerDetached(effect) {
    return effect.owner && effect.owner.isConnected === false;
  }

  function readDeps(effect) {
    return effect.deps.map((dep) => {
      try {
        return dep();
      } catch (err) {
        console.error('[htms] effect dependency failed', err);
        return undefined;
      }
    });
  }

  function depsChanged(effect, values) {
    if (!effect.lastValues) return true;
    if (effect.lastValues.length !== values.length) return true;
    return values.some((v, i) => !Object.is(v, effect.lastValues[i]));
  }

  function removeEffect(effect) {
    const i = effects.indexOf(effect);
    if (i !== -1) effects.splice(i, 1);
  }

  function runCleanup(cleanup) {
    if (typeof cleanup !== 'function') return;
    try {
      cleanup();
    } catch (err) {
      console.error('[htms] effect cleanup failed', err);
    }
  }

  function disposeEffect(effect) {
    if (effect.disposed) return;
    effect.disposed = true;
    runCleanup(effect.cleanup);
    effect.cleanup = null;
    removeEffect(effect);
  }

  function isRetired(owner, id) {
    const ids = retired.get(owner);
    return !!ids && ids.has(id);
  }

  // A finished once effect leaves the effect set; its cleanup waits for
  // owner teardown.
  function retire(effect) {
    if (effect.disposed) return;
    effect.disposed = true;
    removeEffect(effect);
    let ids = retired.get(effect.owner);
    if (!ids) {
      ids = new Map();
      retired.set(effect.owner, ids);
    }
    ids.set(effect.id, effect.cleanup);
    effect.cleanup = null;
  }

  function adoptRetiredCleanup(effect, cleanup) {
    const ids = retired.get(effect.owner);
    if (ids && ids.has(effect.id)) {
      ids.set(effect.id, cleanup);
    } else {
      runCleanup(cleanup);
    }
  }

  function settleCleanup(effect, value) {
    if (typeof value === 'function') {
      effect.cleanup = value;
    } else if (typeof effect.cleanupFactory === 'function') {
      effect.cleanup = effect.cleanupFactory;
    } else {
      effect.cleanup = null;
    }
  }

  function execute(effect) {
    runCleanup(effect.cleanup);
    effect.cleanup = null;

    let result;
    try {
      result = effect.run();
    } catch (err) {
      console.error('[htms] effect failed', err);
      effect.initialized = true;
      if (effect.once) retire(effect);
      return;
    }
    effect.initialized = true;

    if (result && typeof result.then === 'function') {
      const once = effect.once;
      if (once) retire(effect);
      result.then(
        (value) => {
          if (typeof value !== 'function') return;
          if (once) {
            adoptRetiredCleanup(effect, value);
          } else if (effect.disposed) {
            runCleanup(value);
          } else {
            effect.cleanup = value;
          }
        },
        (err) => console.error('[htms] async effect failed', err)
      );
      return;
    }

    settleCleanup(effect, result);
    if (effect.once) retire(effect);
  }

  function flush() {
    flushScheduled = false;

    for (const watcher of watchers.slice()) {
      if (watcher.disposed) continue;
      const el = resolveTarget(watcher.target);
      if (!isLive(el)) {
        disposeWatcher(watcher);
        continue;
      }
      try {
        writeProperty(el, watcher.prop, watcher.compute());
      } catch (err) {
        console.error('[htms] bind update failed', err);
      }
    }

    for (const effect of effects.slice()) {
      if (effect.disposed) continue;
      if (ownerDetached(effect)) {
        disposeEffect(effect);
        continue;
      }
      const values = readDeps(effect);
      if (effect.skipInitial && !effect.initialized) {
        effect.lastValues = values;
        effect.initialized = true;
        effect.dirty = false;
        continue;
      }
      const runnable = effect.dirty || effect.deps.length === 0 || depsChanged(effect, values);
      effect.lastValues = values;
      effect.dirty = false;
      if (runnable) execute(effect);
    }
  }

  function registerEffect(options) {
    const owner = options.owner || null;
    const id = options.id;
    const deps = Array.isArray(options.deps) ? options.deps : [];
    if (options.once && isRetired(owner, id)) return () => {};
    const existing = effects.find((e) => e.owner === owner && e.id === id);

    if (existing) {
      existing.deps = deps;
      existing.run = options.run;
      existing.cleanupFactory = options.cleanup || null;
      existing.once = !!options.once;
      existing.disposed = false;
      return () => disposeEffect(existing);
    }

    const effect = {
      owner,
      id,
      deps,
      run: options.run,
      cleanupFactory: options.cleanup || null,
      cleanup: null,
      once: !!options.once,
      dirty: options.immediate !== false,
      skipInitial: options.immediate === false,
      initialized: false,
      disposed: false,
      lastValues: null,
    };
    effects.push(effect);
    notify();
    return () => disposeEffect(effect);
  }

  function disposeEffectsFor(owner) {
    for (const effect of effects.slice()) {
      if (effect.owner === owner) disposeEffect(effect);
    }
    const ids = retired.get(owner);
    if (ids) {
      retired.delete(owner);
      for (const cleanup of ids.values()) runCleanup(cleanup);
    }
  }

  function keyedList(target, items, render, keyOf) {
    const container = resolveTarget(target);
    if (!container) return;

    const existing = new Map();
    for (const child of Array.from(container.children)) {
      const key = child.getAttribute('data-key');
      if (key !== null) existing.set(key, child);
    }

    const touched = new Set();
    const ordered = [];
    Array.from(items || []).forEach((item, index) => {
      const key = String(keyOf(item, index));
      let node = existing.get(key);
      if (!node) node = render(item, index);
      if (!node) return;
      node.setAttribute('data-key', key);
      touched.add(key);
      ordered.push(node);
    });

    for (const node of ordered) container.appendChild(node);
    for (const [key, node] of existing) {
      if (!touched.has(key) && node.parentNode === container) container.removeChild(node);
    }
  }

  Object.defineProperty(window, '__htms', {
    value: Object.freeze({
      bind,
      notify,
      registerEffect,
      keyedList,
      disposeEffectsFor,
      flush,
      watchers,
      effects,
    }),
    configurable: false,
    writable: false,
  });
})();
"#;

/// Does any component in `irs` reference `window.__htms`?
pub fn needs_runtime<'a>(irs: impl IntoIterator<Item = &'a ComponentIR>) -> bool {
    irs.into_iter().any(|ir| census(ir).needs_runtime)
}


#[cfg(test)]
#[path = "runtime_tests.rs"]
mod runtime_tests;
