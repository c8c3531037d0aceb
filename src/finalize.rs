//! Finalize Module for the HTMS compiler
//!
//! Drives a whole document: parse, compile every component (in parallel when
//! enabled), emit classes, prepend the runtime when needed, wrap in the chosen
//! module format and run the output syntax oracle over the result.

use std::collections::HashSet;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::codegen::{emit_class, js_string};
use crate::component::{compile_component, CompiledComponent};
use crate::ir::ComponentIR;
use crate::options::{CompileError, CompileOptions, ModuleFormat};
use crate::parse::{find_components, parse_source, SourceElement};
use crate::runtime::{needs_runtime, RUNTIME_SOURCE};
use crate::security::{ContentValidator, OxcSyntaxChecker, PatternValidator, SyntaxChecker};
use crate::validate::{
    CompilerError, DiagnosticKind, ERR_INVALID_COMPONENT, ERR_OUTPUT_FORBIDDEN, ERR_OUTPUT_SYNTAX,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentOutput {
    pub tag_name: String,
    pub class_name: String,
    pub ir: ComponentIR,
    /// The class declaration alone, without registration or exports.
    pub class_source: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileOutput {
    /// Complete module text. Empty when strict mode rejected the output.
    pub code: String,
    pub components: Vec<ComponentOutput>,
    pub errors: Vec<CompilerError>,
    pub warnings: Vec<CompilerError>,
    pub uses_runtime: bool,
}

impl CompileOutput {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

pub fn compile_document(
    source: &str,
    options: &CompileOptions,
) -> Result<CompileOutput, CompileError> {
    compile_document_with(source, options, &PatternValidator, &OxcSyntaxChecker)
}

/// Compile with injected oracles.
#[instrument(skip_all, fields(file = %options.file_path, strict = options.strict))]
pub fn compile_document_with(
    source: &str,
    options: &CompileOptions,
    validator: &dyn ContentValidator,
    checker: &dyn SyntaxChecker,
) -> Result<CompileOutput, CompileError> {
    let nodes = parse_source(source)?;
    let elements = find_components(&nodes);
    if elements.is_empty() {
        return Err(CompileError::NoComponents {
            file: options.file_path.clone(),
        });
    }
    info!(components = elements.len(), "compiling document");

    let compile_one = |el: &SourceElement| -> CompiledComponent {
        compile_component(el, options, validator)
    };
    let compiled: Vec<CompiledComponent> = if options.parallel && elements.len() > 1 {
        elements.par_iter().map(compile_one).collect()
    } else {
        elements.iter().map(compile_one).collect()
    };

    let mut output = CompileOutput::default();
    let mut seen_tags = HashSet::new();

    for unit in compiled {
        output.errors.extend(unit.diagnostics.errors.iter().cloned());
        output.warnings.extend(unit.diagnostics.warnings.iter().cloned());

        if !unit.is_emittable(options) {
            continue;
        }
        let Some(meta) = unit.metadata else {
            continue;
        };
        if !seen_tags.insert(meta.tag_name.clone()) {
            warn!(tag = %meta.tag_name, "duplicate component name");
            output.errors.push(
                CompilerError::validation(
                    ERR_INVALID_COMPONENT,
                    &format!("component <{}> is defined more than once", meta.tag_name),
                )
                .with_context("component")
                .in_file(&options.file_path),
            );
            continue;
        }

        let class_source = emit_class(&meta, &unit.ir, validator);
        output.components.push(ComponentOutput {
            tag_name: meta.tag_name,
            class_name: meta.class_name,
            ir: unit.ir,
            class_source,
        });
    }

    output.uses_runtime = needs_runtime(output.components.iter().map(|c| &c.ir));
    output.code = assemble_module(&output.components, output.uses_runtime, options.module_format);

    if options.check_output && !output.code.is_empty() {
        let report = checker.check(&output.code);
        if !report.passed {
            for message in &report.syntax_errors {
                output.errors.push(
                    CompilerError::new(ERR_OUTPUT_SYNTAX, DiagnosticKind::Syntax, message)
                        .in_file(&options.file_path),
                );
            }
            for message in &report.violations {
                output.errors.push(
                    CompilerError::new(ERR_OUTPUT_FORBIDDEN, DiagnosticKind::Syntax, message)
                        .in_file(&options.file_path),
                );
            }
            warn!(
                syntax_errors = report.syntax_errors.len(),
                violations = report.violations.len(),
                "output check failed"
            );
            if options.strict {
                output.code.clear();
            }
        }
    }

    debug!(bytes = output.code.len(), "document compiled");
    Ok(output)
}

/// Runtime, classes, registrations and exports for the chosen format.
pub fn assemble_module(
    components: &[ComponentOutput],
    uses_runtime: bool,
    format: ModuleFormat,
) -> String {
    let mut body = String::new();
    if uses_runtime {
        body.push_str(RUNTIME_SOURCE);
        body.push('\n');
    }
    for component in components {
        body.push_str(&component.class_source);
        body.push_str(&format!(
            "if (!customElements.get({tag})) customElements.define({tag}, {class});\n\n",
            tag = js_string(&component.tag_name),
            class = component.class_name
        ));
    }

    let names: Vec<&str> = components.iter().map(|c| c.class_name.as_str()).collect();
    match format {
        ModuleFormat::Esm => {
            if !names.is_empty() {
                body.push_str(&format!("export {{ {} }};\n", names.join(", ")));
                body.push_str(&format!("export default {};\n", names[0]));
            }
            body
        }
        ModuleFormat::Cjs => {
            body.push_str(&format!("module.exports = {{ {} }};\n", names.join(", ")));
            body
        }
        ModuleFormat::Iife => {
            let mut out = String::from("(function () {\n'use strict';\n");
            out.push_str(&body);
            for name in &names {
                out.push_str(&format!("window.{name} = {name};\n", name = name));
            }
            out.push_str("})();\n");
            out
        }
    }
}
