//! Compile options
//!
//! Loaded from YAML by the embedding application; every field has a default
//! so an empty document (or no file at all) is a valid configuration.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// What to do when one instruction's DSL text cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeFailurePolicy {
    /// Abort the whole document with `InstructionDecode`.
    FailDocument,
    /// Keep the instruction without an AST and attach the diagnostic to it.
    #[default]
    SkipInstruction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    pub decode_failure_policy: DecodeFailurePolicy,
    /// Deepest chain of calculated variables expanded before giving up.
    pub max_dependency_depth: usize,
    /// Deepest parenthesis / operator nesting accepted by the decoder.
    pub max_expression_depth: usize,
    /// Report calculated-variable reads that an algorithm does not declare.
    pub flag_undeclared_variables: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            decode_failure_policy: DecodeFailurePolicy::default(),
            max_dependency_depth: 32,
            max_expression_depth: 64,
            flag_undeclared_variables: false,
        }
    }
}

impl CompileOptions {
    pub fn strict() -> Self {
        Self {
            decode_failure_policy: DecodeFailurePolicy::FailDocument,
            ..Self::default()
        }
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).context("Failed to parse compile options")
    }

    /// Load options from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let options = Self::from_yaml_str(&content)
            .with_context(|| format!("Failed to load {}", path.display()))?;

        info!(
            "Loaded compile options from {} (policy {:?}, max depth {})",
            path.display(),
            options.decode_failure_policy,
            options.max_dependency_depth
        );
        Ok(options)
    }
}
