//! # HTMS Compiler
//!
//! Compiles HTML-based directive markup into custom element classes.
//!
//! ## Pipeline
//!
//! 1. **Parse**: html5ever reads the document; every `<component>` becomes an
//!    owned `SourceElement` tree.
//! 2. **Compile**: each directive tag is dispatched to exactly one handler,
//!    producing a typed `ComponentIR`. Handler failures come back as
//!    diagnostics, never as panics across the boundary.
//! 3. **Emit**: the IR becomes a class with a fragment-batched `render()`,
//!    per-directive `try/catch`, and state helpers when state is used.
//! 4. **Finalize**: the `window.__htms` runtime is prepended when any component
//!    binds, registers effects or renders keyed lists; the module is wrapped in
//!    ESM, CJS or IIFE form and checked by the output syntax oracle.
//!
//! ## Strictness
//!
//! Strict mode (the default) drops a component entirely on its first error.
//! Lenient mode skips only the failing node, records security rejections as
//! warnings, and still emits the rest.

#[cfg(feature = "napi")]
use napi_derive::napi;

pub mod cache;
pub mod codegen;
pub mod component;
pub mod finalize;
pub mod handlers;
pub mod ir;
pub mod options;
pub mod parse;
pub mod runtime;
pub mod security;
pub mod validate;
pub mod visitor;


pub use cache::CompileCache;
pub use component::{compile_component, CompiledComponent, ComponentMetadata};
pub use finalize::{compile_document, compile_document_with, CompileOutput, ComponentOutput};
pub use ir::*;
pub use options::{CompileError, CompileOptions, ModuleFormat, ShadowMode};
pub use runtime::RUNTIME_SOURCE;
pub use security::{
    ContentValidator, OxcSyntaxChecker, PatternValidator, SyntaxChecker, SyntaxReport,
};
pub use validate::{CompilerError, DiagnosticKind, Diagnostics};

/// Node bridge: compile `source` with JSON options and return the output as
/// a plain object.
#[cfg(feature = "napi")]
#[napi]
pub fn compile_native(
    source: String,
    options_json: Option<String>,
) -> napi::Result<serde_json::Value> {
    let options = match options_json {
        Some(json) => CompileOptions::from_json(&json)
            .map_err(|e| napi::Error::from_reason(e.to_string()))?,
        None => CompileOptions::default(),
    };
    let output =
        compile_document(&source, &options).map_err(|e| napi::Error::from_reason(e.to_string()))?;
    serde_json::to_value(output).map_err(|e| napi::Error::from_reason(e.to_string()))
}

/// The runtime text, for hosts that ship it separately.
#[cfg(feature = "napi")]
#[napi]
pub fn runtime_source() -> String {
    RUNTIME_SOURCE.to_string()
}
