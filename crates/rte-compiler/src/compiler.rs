//! Compile entry points
//!
//! `RteCompiler` owns nothing but its options, so one instance can be shared
//! across threads and every compile is independent of every other.

use tracing::{info, warn};

use crate::config::CompileOptions;
use crate::error::{CompileError, CompileErrorKind};
use crate::loader::load_tree;
use crate::model::{build_program_version, ProgramVersion};

#[derive(Debug, Clone, Default)]
pub struct RteCompiler {
    options: CompileOptions,
}

/// Outcome of a batch: every document lands in exactly one of the lists, in
/// input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub compiled: Vec<ProgramVersion>,
    pub failed: Vec<CompileError>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.compiled.len() + self.failed.len()
    }
}

impl RteCompiler {
    pub fn new(options: CompileOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Compile one export. `document` names the source in errors and logs.
    pub fn compile(&self, document: &str, bytes: &[u8]) -> Result<ProgramVersion, CompileError> {
        info!("Compiling {} ({} bytes)", document, bytes.len());

        let root = load_tree(bytes).map_err(|err| {
            CompileError::new(
                document,
                CompileErrorKind::MalformedDocument {
                    reason: err.reason,
                    position: err.position,
                },
            )
        })?;
        let program = build_program_version(document, &root, &self.options)?;

        info!(
            "Compiled {}: program {} v{}, {} algorithms, {} dependency variables, {} instructions ({} undecoded)",
            document,
            program.program_id,
            program.version,
            program.algorithms().count(),
            program.dependency_variables.len(),
            program.instructions().count(),
            program.decode_failures().len()
        );
        Ok(program)
    }

    /// Compile every document; a failure is logged and recorded, never
    /// stops the batch.
    pub fn compile_batch<I, N, B>(&self, documents: I) -> BatchReport
    where
        I: IntoIterator<Item = (N, B)>,
        N: AsRef<str>,
        B: AsRef<[u8]>,
    {
        let mut report = BatchReport::default();
        for (name, bytes) in documents {
            match self.compile(name.as_ref(), bytes.as_ref()) {
                Ok(program) => report.compiled.push(program),
                Err(err) => {
                    warn!("Skipping {}: {}", err.document, err.kind);
                    report.failed.push(err);
                }
            }
        }
        info!(
            "Batch complete: {} compiled, {} failed",
            report.compiled.len(),
            report.failed.len()
        );
        report
    }
}
