//! Typed program-version model
//!
//! Built once per document by [`crate::model::builder`] and never mutated
//! afterwards. Calculated variables live in one name-keyed table on the
//! program version; algorithms and variables refer to them by name.

use std::collections::BTreeMap;

use serde::Serialize;

use super::dates::EffectiveDate;
use crate::decoder::{Ast, InstructionType};
use crate::diagnostics::Diagnostic;

// ─── ProgramVersion ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProgramVersion {
    /// Originating file name.
    pub document: String,
    pub primary_key: String,
    pub global_primary_key: String,
    pub program_id: String,
    pub program_name: String,
    /// Dotted numeric version, e.g. `1.0000`.
    pub version: String,
    pub version_name: String,
    pub line_of_business_id: String,
    pub carrier_id: String,
    pub schema_id: String,
    pub effective_date: EffectiveDate,
    pub effective_date_exact: String,
    pub persisted: bool,
    pub date_mask: String,
    pub culture: String,
    pub decimal_symbol: String,
    pub group_symbol: String,
    pub data_dictionary: DataDictionary,
    pub sequences: Vec<AlgorithmSequence>,
    /// Every calculated / dependency variable reachable from an algorithm.
    pub dependency_variables: BTreeMap<String, DependencyVariable>,
    /// Document-level notes (never errors).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl ProgramVersion {
    /// Algorithms in document order.
    pub fn algorithms(&self) -> impl Iterator<Item = &Algorithm> {
        self.sequences.iter().flat_map(|s| s.algorithms.iter())
    }

    /// Algorithms ordered by sequence number. Algorithms sharing a number keep
    /// their document order.
    pub fn algorithms_in_execution_order(&self) -> Vec<&Algorithm> {
        let mut sequences: Vec<&AlgorithmSequence> = self.sequences.iter().collect();
        sequences.sort_by_key(|s| s.sequence_number);
        sequences
            .into_iter()
            .flat_map(|s| s.algorithms.iter())
            .collect()
    }

    /// Every instruction of every algorithm, then of every dependency variable.
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.algorithms()
            .flat_map(|a| a.steps.iter())
            .chain(self.dependency_variables.values().flat_map(|v| v.steps.iter()))
    }

    /// Instructions that were kept without an AST.
    pub fn decode_failures(&self) -> Vec<&Instruction> {
        self.instructions().filter(|i| !i.is_decoded()).collect()
    }
}

// ─── Data dictionary ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DataDictionary {
    pub categories: Vec<Category>,
    pub inputs: Vec<InputVariable>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Category {
    pub line: String,
    pub index: String,
    pub parent: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InputVariable {
    pub line: String,
    pub index: String,
    pub data_type: String,
    pub description: String,
    pub qual_type: String,
    pub category_id: String,
    pub system_var: String,
}

// ─── Algorithms ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AlgorithmSequence {
    /// Lower numbers run first.
    pub sequence_number: i64,
    pub universal: String,
    pub algorithms: Vec<Algorithm>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Algorithm {
    pub prog_key: String,
    pub revision_key: String,
    pub index: i64,
    pub description: String,
    pub alg_type: String,
    pub qual_type: String,
    pub category_id: String,
    pub date_last_modified: String,
    pub version: String,
    pub program_id: String,
    pub assign_filter: String,
    pub advanced_type: String,
    /// Names of the dependency variables this algorithm reads, first
    /// declaration order, no repeats.
    pub dependency_vars: Vec<String>,
    pub steps: Vec<Instruction>,
}

// ─── Dependency variables ───────────────────────────────────────────────────

/// What a dependency element stands for, from its `t` attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    Calculated,
    Table,
    Result,
    Input,
    #[default]
    Other,
}

impl DependencyKind {
    pub fn from_ib_type(ib_type: &str) -> Self {
        match ib_type.trim() {
            "10" | "3" => DependencyKind::Calculated,
            "6" | "9" => DependencyKind::Table,
            "8" | "16" => DependencyKind::Result,
            "4" => DependencyKind::Input,
            _ => DependencyKind::Other,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DependencyVariable {
    pub name: String,
    pub kind: DependencyKind,
    pub ib_type: String,
    pub prog_key: String,
    pub revision_key: String,
    pub index: i64,
    pub calc_index: Option<i64>,
    pub version: String,
    pub description: String,
    pub alg_type: String,
    pub category_id: String,
    pub program_id: String,
    pub data_type: String,
    pub date_last_modified: String,
    pub universal: String,
    pub system_var: String,
    pub processed: String,
    pub level: String,
    pub dependency_vars: Vec<String>,
    pub steps: Vec<Instruction>,
}

// ─── Instructions ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Instruction {
    pub step_number: u32,
    /// Numeric `t` attribute; `-1` when absent.
    pub type_code: i32,
    pub instruction_type: InstructionType,
    pub raw_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jump_on_true: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jump_on_false: Option<String>,
    #[serde(flatten)]
    pub decoded: Decoded,
    /// Non-fatal notes, e.g. an unknown type code.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<Diagnostic>,
}

/// Result of decoding the instruction text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decoded {
    Ast(Ast),
    /// Decoding failed and the instruction was kept under the skip policy.
    Diagnostic(Diagnostic),
}

impl Instruction {
    pub fn ast(&self) -> Option<&Ast> {
        match &self.decoded {
            Decoded::Ast(ast) => Some(ast),
            Decoded::Diagnostic(_) => None,
        }
    }

    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match &self.decoded {
            Decoded::Diagnostic(diag) => Some(diag),
            Decoded::Ast(_) => None,
        }
    }

    pub fn is_decoded(&self) -> bool {
        matches!(self.decoded, Decoded::Ast(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_kind_from_ib_type() {
        assert_eq!(DependencyKind::from_ib_type("10"), DependencyKind::Calculated);
        assert_eq!(DependencyKind::from_ib_type("3"), DependencyKind::Calculated);
        assert_eq!(DependencyKind::from_ib_type("9"), DependencyKind::Table);
        assert_eq!(DependencyKind::from_ib_type("16"), DependencyKind::Result);
        assert_eq!(DependencyKind::from_ib_type("4"), DependencyKind::Input);
        assert_eq!(DependencyKind::from_ib_type(""), DependencyKind::Other);
    }

    fn algorithm(prog_key: &str) -> Algorithm {
        Algorithm {
            prog_key: prog_key.to_string(),
            ..Algorithm::default()
        }
    }

    #[test]
    fn test_execution_order_is_stable_within_sequence_number() {
        let pv = ProgramVersion {
            sequences: vec![
                AlgorithmSequence {
                    sequence_number: 20,
                    algorithms: vec![algorithm("C")],
                    ..AlgorithmSequence::default()
                },
                AlgorithmSequence {
                    sequence_number: 10,
                    algorithms: vec![algorithm("A"), algorithm("B")],
                    ..AlgorithmSequence::default()
                },
            ],
            ..ProgramVersion::default()
        };

        let document: Vec<_> = pv.algorithms().map(|a| a.prog_key.as_str()).collect();
        assert_eq!(document, vec!["C", "A", "B"]);

        let executed: Vec<_> = pv
            .algorithms_in_execution_order()
            .into_iter()
            .map(|a| a.prog_key.as_str())
            .collect();
        assert_eq!(executed, vec!["A", "B", "C"]);
    }
}
