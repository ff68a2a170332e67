//! Variable descriptions from a compiled program version
//!
//! Inputs and system variables (`GI_`, `LX_`, `IX_`) are described by the
//! data dictionary; lookups, results and calculated variables by their
//! dependency elements; `LS_<n>` by the step that produced it.

use super::types::{DependencyKind, Instruction, ProgramVersion};
use crate::decoder::ast::base_name;
use crate::decoder::{describe_instruction, VariableLookup, VariablePrefix};

impl ProgramVersion {
    /// Human-readable description of a variable as written in instruction
    /// text (`~PC_12.3` is looked up as `PC_12`). `None` when nothing in the
    /// document describes it.
    pub fn describe_variable(&self, name: &str) -> Option<String> {
        let base = base_name(name);
        let prefix = VariablePrefix::of(base)?;
        let id = base.get(3..)?;

        match prefix {
            VariablePrefix::GI | VariablePrefix::LX | VariablePrefix::IX => self.describe_input(id),
            VariablePrefix::LS => Some(format!("Results of Step {}", id)),
            VariablePrefix::PL | VariablePrefix::GL | VariablePrefix::PQ | VariablePrefix::GQ => {
                self.describe_dependency(base, DependencyKind::Table, id)
            }
            VariablePrefix::PR | VariablePrefix::GR => {
                self.describe_dependency(base, DependencyKind::Result, id)
            }
            VariablePrefix::PC | VariablePrefix::GC | VariablePrefix::PP | VariablePrefix::GP => {
                self.describe_dependency(base, DependencyKind::Calculated, id)
            }
            VariablePrefix::IG => None,
        }
    }

    /// English rendering of one instruction, led by its step-type label.
    pub fn describe_step(&self, instruction: &Instruction) -> String {
        match instruction.ast() {
            Some(ast) => describe_instruction(instruction.instruction_type, ast, self),
            None => format!(
                "**{}**: could not decode {:?}",
                instruction.instruction_type.label(),
                instruction.raw_text
            ),
        }
    }

    fn describe_input(&self, id: &str) -> Option<String> {
        let line = self.line_of_business_id.as_str();
        self.data_dictionary
            .inputs
            .iter()
            .filter(|iv| line.is_empty() || iv.line.is_empty() || iv.line == line)
            .find(|iv| iv.index.trim() == id)
            .and_then(|iv| non_empty(&iv.description))
    }

    /// By name first, then by kind and index for names the builder did not
    /// produce (`PP_`, `PQ_`, ...).
    fn describe_dependency(&self, base: &str, kind: DependencyKind, id: &str) -> Option<String> {
        if let Some(variable) = self.dependency_variables.get(base) {
            return non_empty(&variable.description);
        }
        let id: i64 = id.parse().ok()?;
        self.dependency_variables
            .values()
            .filter(|v| v.kind == kind)
            .find(|v| match kind {
                DependencyKind::Calculated => v.calc_index.unwrap_or(v.index) == id,
                _ => v.index == id,
            })
            .and_then(|v| non_empty(&v.description))
    }
}

impl VariableLookup for ProgramVersion {
    fn describe_variable(&self, name: &str) -> Option<String> {
        ProgramVersion::describe_variable(self, name)
    }
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
