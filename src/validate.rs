use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTIC CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const ERR_MISSING_ATTRIBUTE: &str = "HTMS-VAL-001";
pub const ERR_INVALID_IDENTIFIER: &str = "HTMS-VAL-002";
pub const ERR_INVALID_SELECTOR: &str = "HTMS-VAL-003";
pub const ERR_UNKNOWN_TAG: &str = "HTMS-VAL-004";
pub const ERR_STRUCTURE: &str = "HTMS-VAL-005";
pub const ERR_OUT_OF_RANGE: &str = "HTMS-VAL-006";
pub const ERR_INVALID_OPERATOR: &str = "HTMS-VAL-007";
pub const ERR_INVALID_COMPONENT: &str = "HTMS-VAL-008";
pub const ERR_IMMUTABLE_STATE: &str = "HTMS-VAL-009";
pub const ERR_INVALID_LITERAL: &str = "HTMS-VAL-010";
pub const ERR_MALFORMED_EXPRESSION: &str = "HTMS-VAL-011";
pub const ERR_CONTENT_REJECTED: &str = "HTMS-SEC-001";
pub const ERR_DISALLOWED_TAG: &str = "HTMS-SEC-002";
pub const ERR_DISALLOWED_CALL: &str = "HTMS-SEC-003";
pub const ERR_OUTPUT_SYNTAX: &str = "HTMS-SYN-001";
pub const ERR_OUTPUT_FORBIDDEN: &str = "HTMS-SYN-002";
pub const ERR_HANDLER_PANIC: &str = "HTMS-RT-001";

pub const WARN_PERFORMANCE: &str = "HTMS-W-001";
pub const WARN_IGNORED_VALUE: &str = "HTMS-W-002";
pub const WARN_CLAMPED: &str = "HTMS-W-003";
pub const WARN_DUPLICATE_CASE: &str = "HTMS-W-004";
pub const WARN_SKIPPED: &str = "HTMS-W-005";

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILER ERROR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagnosticKind {
    Validation,
    Security,
    Syntax,
    Runtime,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::Validation => "validation",
            DiagnosticKind::Security => "security",
            DiagnosticKind::Syntax => "syntax",
            DiagnosticKind::Runtime => "runtime",
        }
    }
}

/// A single error or warning. The same shape is used for both lists; which
/// list it lands in decides its severity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerError {
    pub code: String,
    pub kind: DiagnosticKind,
    pub message: String,
    #[serde(default)]
    pub file: String,
    pub context: Option<String>,
    #[serde(default)]
    pub hints: Vec<String>,
}

impl CompilerError {
    pub fn new(code: &str, kind: DiagnosticKind, message: &str) -> Self {
        CompilerError {
            code: code.to_string(),
            kind,
            message: message.to_string(),
            file: String::new(),
            context: None,
            hints: vec![],
        }
    }

    pub fn validation(code: &str, message: &str) -> Self {
        Self::new(code, DiagnosticKind::Validation, message)
    }

    pub fn security(code: &str, message: &str) -> Self {
        Self::new(code, DiagnosticKind::Security, message)
    }

    pub fn with_context(mut self, tag: &str) -> Self {
        self.context = Some(format!("<{}>", tag));
        self
    }

    pub fn with_hint(mut self, hint: &str) -> Self {
        self.hints.push(hint.to_string());
        self
    }

    pub fn in_file(mut self, file: &str) -> Self {
        self.file = file.to_string();
        self
    }
}

impl std::fmt::Display for CompilerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {} error: {}", self.code, self.kind.as_str(), self.message)?;
        if let Some(ctx) = &self.context {
            write!(f, " (in {})", ctx)?;
        }
        Ok(())
    }
}

/// Errors and warnings accumulated by one compile unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub errors: Vec<CompilerError>,
    pub warnings: Vec<CompilerError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, err: CompilerError) {
        self.errors.push(err);
    }

    pub fn warn(&mut self, warning: CompilerError) {
        self.warnings.push(warning);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// IDENTIFIER / SELECTOR GUARDS
// ═══════════════════════════════════════════════════════════════════════════════

lazy_static! {
    static ref IDENTIFIER_RE: Regex = Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").unwrap();
    static ref SELECTOR_RE: Regex = Regex::new(r#"^[a-zA-Z0-9\-_#.\[\]=":() ]+$"#).unwrap();
    static ref CUSTOM_ELEMENT_RE: Regex =
        Regex::new(r"^[a-z][a-z0-9._]*(-[a-z0-9._]*)+$").unwrap();
    static ref CSS_PROPERTY_RE: Regex = Regex::new(r"^-{0,2}[a-zA-Z][a-zA-Z0-9-]*$").unwrap();
}

const RESERVED_WORDS: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete",
    "do", "else", "export", "extends", "finally", "for", "function", "if", "import", "in",
    "instanceof", "new", "return", "super", "switch", "throw", "try", "typeof", "var", "void",
    "while", "with", "yield", "let", "static", "enum", "await", "null", "true", "false",
    "this",
];

/// Hyphenated names the HTML standard reserves for SVG and MathML.
const RESERVED_ELEMENT_NAMES: &[&str] = &[
    "annotation-xml",
    "color-profile",
    "font-face",
    "font-face-src",
    "font-face-uri",
    "font-face-format",
    "font-face-name",
    "missing-glyph",
];

/// JS identifier grammar, excluding reserved words.
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER_RE.is_match(name) && !RESERVED_WORDS.contains(&name)
}

/// Selectors are interpolated into `querySelector` calls; keep them to a
/// conservative character class and forbid quote-breaking.
pub fn is_valid_selector(selector: &str) -> bool {
    let trimmed = selector.trim();
    !trimmed.is_empty() && SELECTOR_RE.is_match(trimmed) && !trimmed.contains('\'')
}

pub fn is_valid_custom_element_name(name: &str) -> bool {
    CUSTOM_ELEMENT_RE.is_match(name) && !RESERVED_ELEMENT_NAMES.contains(&name)
}

pub fn is_valid_css_property(name: &str) -> bool {
    CSS_PROPERTY_RE.is_match(name)
}

/// Parse a dotted state path (`a.b.c`). A leading `this.` is accepted and
/// dropped since state always lives on the component.
pub fn parse_state_path(path: &str) -> Option<Vec<String>> {
    let trimmed = path.trim();
    let trimmed = trimmed.strip_prefix("this.").unwrap_or(trimmed);
    if trimmed.is_empty() {
        return None;
    }
    let segments: Vec<String> = trimmed.split('.').map(|s| s.to_string()).collect();
    if segments.iter().all(|s| is_valid_identifier(s)) {
        Some(segments)
    } else {
        None
    }
}

/// Dotted callee such as `this.refresh` or `console.log`.
pub fn is_valid_callee(name: &str) -> bool {
    let segments: Vec<&str> = name.trim().split('.').collect();
    if segments == ["this"] {
        return false;
    }
    segments
        .iter()
        .enumerate()
        .all(|(i, s)| (i == 0 && *s == "this") || is_valid_identifier(s))
}

/// Bracket/quote balance of an opaque expression or statement block, and
/// whether it holds a `;` outside any bracket or string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExprShape {
    pub balanced: bool,
    pub top_level_semicolon: bool,
}

pub fn scan_expression(text: &str) -> ExprShape {
    let mut stack: Vec<char> = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut top_level_semicolon = false;

    for c in text.chars() {
        if let Some(q) = quote {
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
            '"' | '\'' | '`' => quote = Some(c),
            '(' | '[' | '{' => stack.push(c),
            ')' | ']' | '}' => {
                let open = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                if stack.pop() != Some(open) {
                    return ExprShape {
                        balanced: false,
                        top_level_semicolon,
                    };
                }
            }
            ';' if stack.is_empty() => top_level_semicolon = true,
            _ => {}
        }
    }

    ExprShape {
        balanced: stack.is_empty() && quote.is_none(),
        top_level_semicolon,
    }
}

/// Split a comma-separated identifier list, rejecting any invalid entry.
pub fn parse_identifier_list(list: &str) -> Result<Vec<String>, String> {
    let mut names = Vec::new();
    for raw in list.split(',') {
        let name = raw.trim();
        if name.is_empty() {
            continue;
        }
        if !is_valid_identifier(name) {
            return Err(name.to_string());
        }
        names.push(name.to_string());
    }
    Ok(names)
}

/// Derive `CounterBox` from `counter-box`.
pub fn class_name_for_tag(tag: &str) -> String {
    let mut out = String::new();
    for part in tag.split(|c: char| c == '-' || c == '.' || c == '_') {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    if out.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(true) {
        out.insert_str(0, "Htms");
    }
    out
}
