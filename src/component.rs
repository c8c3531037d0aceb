//! Component compilation
//!
//! Reads `<component>` metadata, runs the directive handlers over its children
//! and applies the strict/lenient policy to the result.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::handlers::{BodyMode, Compiler};
use crate::ir::ComponentIR;
use crate::options::{CompileOptions, ShadowMode};
use crate::parse::SourceElement;
use crate::security::ContentValidator;
use crate::validate::{
    class_name_for_tag, is_valid_custom_element_name, parse_identifier_list, CompilerError,
    Diagnostics, ERR_INVALID_COMPONENT, ERR_INVALID_IDENTIFIER, ERR_MISSING_ATTRIBUTE,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentMetadata {
    pub tag_name: String,
    pub class_name: String,
    pub shadow: ShadowMode,
    /// Seeded from same-named attributes in the constructor.
    pub props: Vec<String>,
    /// Re-render on change; also seeded like props.
    pub observed_attributes: Vec<String>,
}

impl ComponentMetadata {
    /// Props followed by observed attributes not already listed as props.
    pub fn seeded_props(&self) -> Vec<&str> {
        let mut seeded: Vec<&str> = self.props.iter().map(|s| s.as_str()).collect();
        for attr in &self.observed_attributes {
            if !seeded.contains(&attr.as_str()) {
                seeded.push(attr);
            }
        }
        seeded
    }
}

/// One compiled component before emission.
#[derive(Debug, Clone, Default)]
pub struct CompiledComponent {
    /// Absent when the metadata itself was unusable.
    pub metadata: Option<ComponentMetadata>,
    pub ir: ComponentIR,
    pub diagnostics: Diagnostics,
}

impl CompiledComponent {
    /// Strict mode emits nothing for a component with any error.
    pub fn is_emittable(&self, options: &CompileOptions) -> bool {
        self.metadata.is_some() && !(options.strict && self.diagnostics.has_errors())
    }
}

pub fn read_metadata(
    el: &SourceElement,
    options: &CompileOptions,
) -> Result<ComponentMetadata, CompilerError> {
    let tag_name = el
        .attr_nonempty("name")
        .ok_or_else(|| {
            CompilerError::validation(ERR_MISSING_ATTRIBUTE, "<component> requires a 'name'")
                .with_hint("custom element names need a hyphen, e.g. name=\"counter-box\"")
        })?
        .to_string();
    if !is_valid_custom_element_name(&tag_name) {
        return Err(CompilerError::validation(
            ERR_INVALID_COMPONENT,
            &format!("'{}' is not a valid custom element name", tag_name),
        )
        .with_hint("use lowercase letters with at least one hyphen"));
    }

    let shadow = match el.attr_nonempty("shadow") {
        None => options.default_shadow,
        Some(raw) => ShadowMode::parse(raw).ok_or_else(|| {
            CompilerError::validation(
                ERR_INVALID_COMPONENT,
                &format!("shadow mode '{}' must be open, closed or none", raw),
            )
        })?,
    };

    let props = identifier_list(el, "props")?;
    let observed_attributes: Vec<String> = identifier_list(el, "observed")?
        .into_iter()
        .map(|a| a.to_ascii_lowercase())
        .collect();

    Ok(ComponentMetadata {
        class_name: class_name_for_tag(&tag_name),
        tag_name,
        shadow,
        props,
        observed_attributes,
    })
}

fn identifier_list(el: &SourceElement, name: &str) -> Result<Vec<String>, CompilerError> {
    match el.attr_nonempty(name) {
        None => Ok(vec![]),
        Some(list) => parse_identifier_list(list).map_err(|bad| {
            CompilerError::validation(
                ERR_INVALID_IDENTIFIER,
                &format!("'{}' in '{}' is not a valid identifier", bad, name),
            )
        }),
    }
}

#[instrument(skip_all, fields(component = el.attr("name").unwrap_or("<unnamed>")))]
pub fn compile_component(
    el: &SourceElement,
    options: &CompileOptions,
    validator: &dyn ContentValidator,
) -> CompiledComponent {
    let mut result = CompiledComponent::default();

    let metadata = match read_metadata(el, options) {
        Ok(m) => m,
        Err(err) => {
            warn!(error = %err, "component metadata rejected");
            result
                .diagnostics
                .error(err.with_context("component").in_file(&options.file_path));
            return result;
        }
    };

    let mut compiler = Compiler::new(options, validator);
    let body = compiler.compile_children(&el.children, BodyMode::Markup);

    if body.aborted {
        warn!(
            errors = body.diagnostics.errors.len(),
            "strict mode aborted component"
        );
    }
    debug!(
        template_nodes = body.template.len(),
        directives = body.directives.len(),
        "component compiled"
    );

    result.ir = ComponentIR {
        template_nodes: body.template,
        directives: body.directives,
    };
    result.diagnostics = stamp_file(body.diagnostics, &options.file_path);
    result.metadata = Some(metadata);
    result
}

fn stamp_file(mut diagnostics: Diagnostics, file: &str) -> Diagnostics {
    for diag in diagnostics
        .errors
        .iter_mut()
        .chain(diagnostics.warnings.iter_mut())
    {
        if diag.file.is_empty() {
            diag.file = file.to_string();
        }
    }
    diagnostics
}

#[cfg(test)]
#[path = "component_tests.rs"]
mod component_tests;
