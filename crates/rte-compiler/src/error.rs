//! Typed compile error model.
//!
//! Every fatal failure of a single document compile maps to exactly one
//! `CompileErrorKind` variant:
//!
//! ```text
//! loader   → MalformedDocument
//! builder  → SchemaMismatch | MissingRequiredSection
//!          → DependencyCycle | MaxDepthExceeded
//! decoder  → InstructionDecode   (only under DecodeFailurePolicy::FailDocument)
//! ```
//!
//! An effective date that cannot be interpreted is never an error; it is
//! reported as a warning diagnostic on the compiled `ProgramVersion`.
//!
//! ## Rules
//!
//! - `thiserror` for enum derivation, no manual `Display` impls.
//! - Errors are `Serialize` so callers can log them as structured records.

use serde::{Deserialize, Serialize};

use crate::diagnostics::{Diagnostic, DiagnosticCode, SourceSpan};

// ---------------------------------------------------------------------------
// CompileError
// ---------------------------------------------------------------------------

/// A failed compile of one document, carrying the document identity so a
/// batch caller can log and skip it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{document}: {kind}")]
pub struct CompileError {
    /// Originating file name.
    pub document: String,
    pub kind: CompileErrorKind,
}

impl CompileError {
    pub fn new(document: impl Into<String>, kind: CompileErrorKind) -> Self {
        Self {
            document: document.into(),
            kind,
        }
    }
}

// ---------------------------------------------------------------------------
// CompileErrorKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "error_kind", rename_all = "snake_case")]
pub enum CompileErrorKind {
    /// The byte stream is not well-formed XML.
    #[error("Malformed document at byte {position}: {reason}")]
    MalformedDocument { reason: String, position: u64 },

    /// The tree does not have the expected export shape, or a present field
    /// holds a value of the wrong type.
    #[error("Schema mismatch at {path}: {reason}")]
    SchemaMismatch { path: String, reason: String },

    /// A required structural node is entirely absent.
    #[error("Missing required section: {section}")]
    MissingRequiredSection { section: String },

    #[error("{0}")]
    InstructionDecode(InstructionDecodeError),

    /// Calculated variables reference each other in a loop.
    #[error("Dependency cycle: {}", cycle.join(" → "))]
    DependencyCycle { cycle: Vec<String> },

    /// Dependency nesting went deeper than the configured bound.
    #[error("Dependency depth limit {limit} exceeded at {variable}")]
    MaxDepthExceeded { variable: String, limit: usize },
}

impl CompileErrorKind {
    pub fn schema_mismatch(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// InstructionDecodeError
// ---------------------------------------------------------------------------

/// One instruction's DSL text did not match the grammar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("Step {step}: {message} at byte {position} in {raw_text:?}")]
pub struct InstructionDecodeError {
    pub step: u32,
    pub raw_text: String,
    /// Byte offset into `raw_text` where decoding stopped.
    pub position: usize,
    pub message: String,
    pub code: DiagnosticCode,
}

impl InstructionDecodeError {
    /// Diagnostic form, attached to an instruction that was skipped.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let end = self
            .raw_text
            .get(self.position..)
            .and_then(|rest| rest.chars().next())
            .map(|c| self.position + c.len_utf8())
            .unwrap_or(self.position);
        Diagnostic::error(
            self.code,
            format!("step {}: {}", self.step, self.message),
        )
        .with_span(SourceSpan::from_byte_offset(
            &self.raw_text,
            self.position,
            end,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_error() -> InstructionDecodeError {
        InstructionDecodeError {
            step: 3,
            raw_text: "Set X = (1 + 2".to_string(),
            position: 14,
            message: "expected ')'".to_string(),
            code: DiagnosticCode::UnexpectedToken,
        }
    }

    #[test]
    fn test_all_variants_constructible() {
        let kinds = vec![
            CompileErrorKind::MalformedDocument {
                reason: "unexpected end of document".into(),
                position: 42,
            },
            CompileErrorKind::schema_mismatch("/", "root element is <html>"),
            CompileErrorKind::MissingRequiredSection {
                section: "seq".into(),
            },
            CompileErrorKind::InstructionDecode(decode_error()),
            CompileErrorKind::DependencyCycle {
                cycle: vec!["PC_1".into(), "PC_2".into(), "PC_1".into()],
            },
            CompileErrorKind::MaxDepthExceeded {
                variable: "PC_40".into(),
                limit: 32,
            },
        ];
        assert_eq!(kinds.len(), 6);
        for kind in kinds {
            assert!(!kind.to_string().is_empty());
        }
    }

    #[test]
    fn test_cycle_display_joins_path() {
        let err = CompileError::new(
            "rating_118.xml",
            CompileErrorKind::DependencyCycle {
                cycle: vec!["PC_1".into(), "PC_2".into(), "PC_1".into()],
            },
        );
        assert_eq!(
            err.to_string(),
            "rating_118.xml: Dependency cycle: PC_1 → PC_2 → PC_1"
        );
    }

    #[test]
    fn test_serde_roundtrip_tagged() {
        let err = CompileError::new(
            "a.xml",
            CompileErrorKind::MissingRequiredSection {
                section: "seq".into(),
            },
        );
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"]["error_kind"], "missing_required_section");
        let back: CompileError = serde_json::from_value(json).unwrap();
        assert_eq!(back, err);
    }

    #[test]
    fn test_decode_error_diagnostic_span_at_end_of_text() {
        let diag = decode_error().to_diagnostic();
        let span = diag.span.unwrap();
        assert_eq!((span.start_line, span.start_col), (1, 15));
        assert_eq!(diag.code, DiagnosticCode::UnexpectedToken);
        assert!(diag.message.starts_with("step 3:"));
    }
}
