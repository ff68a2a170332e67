//! RTE program version compiler
//!
//! Compiles a rating-engine XML export into a typed [`ProgramVersion`] whose
//! instructions are decoded into ASTs:
//!
//! ```text
//! bytes → loader (XmlNode tree) → model builder ─┬→ ProgramVersion → serializer (JSON)
//!                                                 └→ decoder, per instruction (Ast)
//! ```
//!
//! Everything here is pure and synchronous. Reading archives, choosing
//! storage keys and writing manifests belong to the caller.

pub mod compiler;
pub mod config;
pub mod decoder;
pub mod diagnostics;
pub mod error;
pub mod loader;
pub mod model;
pub mod serializer;

pub use compiler::{BatchReport, RteCompiler};
pub use config::{CompileOptions, DecodeFailurePolicy};
pub use decoder::{decode_instruction, Ast};
pub use diagnostics::{Diagnostic, DiagnosticCode, Severity};
pub use error::{CompileError, CompileErrorKind, InstructionDecodeError};
pub use model::ProgramVersion;
pub use serializer::{ManifestRecord, ManifestSummary};
