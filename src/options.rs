use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal pipeline failures. Per-node problems are reported as diagnostics instead.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("invalid compile options: {0}")]
    InvalidOptions(#[from] serde_json::Error),

    #[error("failed to read markup: {0}")]
    Markup(#[from] std::io::Error),

    #[error("no <component> element found in {file}")]
    NoComponents { file: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleFormat {
    #[default]
    Esm,
    Cjs,
    Iife,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShadowMode {
    #[default]
    Open,
    Closed,
    None,
}

impl ShadowMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "open" => Some(ShadowMode::Open),
            "closed" => Some(ShadowMode::Closed),
            "none" | "false" => Some(ShadowMode::None),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompileOptions {
    /// Any error aborts the enclosing component instead of skipping the node.
    pub strict: bool,
    pub module_format: ModuleFormat,
    pub default_shadow: ShadowMode,
    /// Only used to label diagnostics.
    pub file_path: String,
    /// Run the output syntax oracle over the final module text.
    pub check_output: bool,
    /// Compile sibling components on the rayon pool.
    pub parallel: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            strict: true,
            module_format: ModuleFormat::Esm,
            default_shadow: ShadowMode::Open,
            file_path: "<inline>".to_string(),
            check_output: true,
            parallel: true,
        }
    }
}

impl CompileOptions {
    pub fn from_json(json: &str) -> Result<Self, CompileError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn lenient() -> Self {
        Self {
            strict: false,
            ..Self::default()
        }
    }
}
