//! Model builder
//!
//! Maps the generic element tree of an `<export>` document onto the typed
//! model. Every attribute read is an explicit lookup with a default; only the
//! root shape, an absent algorithm section, an attribute that must be numeric
//! but is not, and dependency-graph problems abort the build.
//!
//! Dependency variables (`<d>` elements) are collected into a name-keyed
//! table first, then expanded on demand while algorithms are built. The
//! names currently being expanded form the recursion stack, which doubles as
//! the cycle detector.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use tracing::{debug, warn};

use super::dates::EffectiveDate;
use super::types::*;
use crate::config::{CompileOptions, DecodeFailurePolicy};
use crate::decoder::ast::base_name;
use crate::decoder::{decode_instruction, InstructionType, VariablePrefix};
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::error::{CompileError, CompileErrorKind};
use crate::loader::XmlNode;

pub const ROOT_ELEMENT: &str = "export";

type BuildResult<T> = Result<T, CompileErrorKind>;

/// Build the program version of one loaded document.
pub fn build_program_version(
    document: &str,
    root: &XmlNode,
    options: &CompileOptions,
) -> Result<ProgramVersion, CompileError> {
    ModelBuilder::new(options)
        .build(document, root)
        .map_err(|kind| CompileError::new(document, kind))
}

struct ModelBuilder<'a> {
    options: &'a CompileOptions,
    /// Dependency elements by variable name, with their tree path.
    definitions: HashMap<String, (&'a XmlNode, String)>,
    resolved: BTreeMap<String, DependencyVariable>,
    /// Names being expanded, outermost first.
    in_progress: Vec<String>,
}

impl<'a> ModelBuilder<'a> {
    fn new(options: &'a CompileOptions) -> Self {
        Self {
            options,
            definitions: HashMap::new(),
            resolved: BTreeMap::new(),
            in_progress: Vec::new(),
        }
    }

    fn build(mut self, document: &str, root: &'a XmlNode) -> BuildResult<ProgramVersion> {
        if root.name != ROOT_ELEMENT {
            return Err(CompileErrorKind::schema_mismatch(
                "/",
                format!("expected <{}> root element, found <{}>", ROOT_ELEMENT, root.name),
            ));
        }
        if !root.has_child("seq") {
            return Err(CompileErrorKind::MissingRequiredSection {
                section: format!("{}/seq", ROOT_ELEMENT),
            });
        }

        let mut program = header(root);
        program.document = document.to_string();

        if program.effective_date.is_unrecognized() {
            warn!(
                "{}: unrecognized effective date format {:?}",
                document, program.effective_date.raw
            );
            program.diagnostics.push(
                Diagnostic::warning(
                    DiagnosticCode::UnrecognizedDateFormat,
                    format!(
                        "effective date {:?} is not in a recognized format",
                        program.effective_date.raw
                    ),
                )
                .at(format!("{}/@ed", ROOT_ELEMENT)),
            );
        }

        program.data_dictionary = data_dictionary(root);
        self.collect_definitions(root)?;
        program.sequences = self.build_sequences(root)?;
        program.dependency_variables = self.resolved;

        Ok(program)
    }

    // ========================================================================
    // Dependency variables
    // ========================================================================

    /// Index every `<d>` element under the algorithms. A definition (one with
    /// steps or nested dependencies) replaces a bare reference; otherwise the
    /// first element seen for a name wins.
    fn collect_definitions(&mut self, root: &'a XmlNode) -> BuildResult<()> {
        let mut pending: Vec<(&'a XmlNode, String)> = Vec::new();
        for (si, seq) in root.children_named("seq").enumerate() {
            for (ai, item) in seq.children_named("item").enumerate() {
                for (di, dep) in item.children_named("d").enumerate() {
                    pending.push((dep, format!("seq[{si}]/item[{ai}]/d[{di}]")));
                }
            }
        }
        // Pre-order walk in document order.
        pending.reverse();

        while let Some((node, path)) = pending.pop() {
            let children: Vec<_> = node
                .children_named("d")
                .enumerate()
                .map(|(di, child)| (child, format!("{path}/d[{di}]")))
                .collect();
            pending.extend(children.into_iter().rev());

            let name = variable_name(node, &path)?;
            let replace = match self.definitions.get(&name) {
                None => true,
                Some((existing, _)) => !is_definition(existing) && is_definition(node),
            };
            if replace {
                self.definitions.insert(name, (node, path));
            }
        }
        Ok(())
    }

    /// Build `name` and everything it depends on, once.
    fn resolve(&mut self, name: &str) -> BuildResult<()> {
        if self.resolved.contains_key(name) {
            return Ok(());
        }
        if let Some(start) = self.in_progress.iter().position(|n| n == name) {
            let mut cycle = self.in_progress[start..].to_vec();
            cycle.push(name.to_string());
            return Err(CompileErrorKind::DependencyCycle { cycle });
        }
        if self.in_progress.len() >= self.options.max_dependency_depth {
            return Err(CompileErrorKind::MaxDepthExceeded {
                variable: name.to_string(),
                limit: self.options.max_dependency_depth,
            });
        }

        let (node, path) = match self.definitions.get(name) {
            Some((node, path)) => (*node, path.clone()),
            None => {
                return Err(CompileErrorKind::schema_mismatch(
                    name,
                    "dependency variable has no element",
                ))
            }
        };

        self.in_progress.push(name.to_string());
        let built = self.build_variable(name, node, &path);
        self.in_progress.pop();
        let variable = built?;

        debug!(
            "Resolved {} ({:?}, {} steps, {} dependencies)",
            name,
            variable.kind,
            variable.steps.len(),
            variable.dependency_vars.len()
        );
        self.resolved.insert(name.to_string(), variable);
        Ok(())
    }

    fn build_variable(
        &mut self,
        name: &str,
        node: &'a XmlNode,
        path: &str,
    ) -> BuildResult<DependencyVariable> {
        let dependency_vars = self.resolve_dependencies(node, path)?;
        let mut steps = self.build_steps(node, path)?;
        if self.options.flag_undeclared_variables {
            flag_undeclared(&mut steps, &dependency_vars, Some(name), path);
        }

        let ib_type = text(node, "t");
        Ok(DependencyVariable {
            name: name.to_string(),
            kind: DependencyKind::from_ib_type(&ib_type),
            ib_type,
            prog_key: text(node, "pk"),
            revision_key: text(node, "rk"),
            index: int_attr(node, "i", path)?.unwrap_or(0),
            calc_index: int_attr(node, "cid", path)?,
            version: text(node, "v"),
            description: text(node, "d"),
            alg_type: text(node, "alg"),
            category_id: text(node, "cat"),
            program_id: text(node, "p"),
            data_type: text(node, "dt"),
            date_last_modified: text(node, "dlm"),
            universal: text(node, "u"),
            system_var: text(node, "sys"),
            processed: text(node, "processed"),
            level: text(node, "level"),
            dependency_vars,
            steps,
        })
    }

    /// Resolve the `<d>` children of an algorithm or variable, returning
    /// their names in declaration order without repeats.
    fn resolve_dependencies(
        &mut self,
        node: &'a XmlNode,
        path: &str,
    ) -> BuildResult<Vec<String>> {
        let mut names: Vec<String> = Vec::new();
        for (di, dep) in node.children_named("d").enumerate() {
            let name = variable_name(dep, &format!("{path}/d[{di}]"))?;
            self.resolve(&name)?;
            if !names.contains(&name) {
                names.push(name);
            }
        }
        Ok(names)
    }

    // ========================================================================
    // Algorithms
    // ========================================================================

    /// `<seq>` elements in document order; repeated sequence numbers merge
    /// into the sequence that first used the number.
    fn build_sequences(&mut self, root: &'a XmlNode) -> BuildResult<Vec<AlgorithmSequence>> {
        let mut sequences: Vec<AlgorithmSequence> = Vec::new();

        for (si, seq) in root.children_named("seq").enumerate() {
            let path = format!("seq[{si}]");
            let sequence_number: i64 = int_attr(seq, "n", &path)?.unwrap_or(0);

            let mut algorithms = Vec::new();
            for (ai, item) in seq.children_named("item").enumerate() {
                algorithms.push(self.build_algorithm(item, &format!("{path}/item[{ai}]"))?);
            }

            match sequences
                .iter_mut()
                .find(|s| s.sequence_number == sequence_number)
            {
                Some(existing) => existing.algorithms.extend(algorithms),
                None => sequences.push(AlgorithmSequence {
                    sequence_number,
                    universal: text(seq, "u"),
                    algorithms,
                }),
            }
        }
        Ok(sequences)
    }

    fn build_algorithm(&mut self, item: &'a XmlNode, path: &str) -> BuildResult<Algorithm> {
        let dependency_vars = self.resolve_dependencies(item, path)?;
        let mut steps = self.build_steps(item, path)?;
        if self.options.flag_undeclared_variables {
            flag_undeclared(&mut steps, &dependency_vars, None, path);
        }

        Ok(Algorithm {
            prog_key: text(item, "pk"),
            revision_key: text(item, "rk"),
            index: int_attr(item, "i", path)?.unwrap_or(0),
            description: text(item, "d"),
            alg_type: text(item, "alg"),
            qual_type: text(item, "qt"),
            category_id: text(item, "cat"),
            date_last_modified: text(item, "dlm"),
            version: text(item, "v"),
            program_id: text(item, "p"),
            assign_filter: text(item, "assign_fltr"),
            advanced_type: text(item, "adv_type"),
            dependency_vars,
            steps,
        })
    }

    // ========================================================================
    // Instructions
    // ========================================================================

    /// `<i>` children in document order.
    fn build_steps(&self, node: &XmlNode, path: &str) -> BuildResult<Vec<Instruction>> {
        node.children_named("i")
            .enumerate()
            .map(|(k, ins)| self.build_instruction(ins, k, &format!("{path}/i[{k}]")))
            .collect()
    }

    fn build_instruction(
        &self,
        ins: &XmlNode,
        position: usize,
        path: &str,
    ) -> BuildResult<Instruction> {
        let default_step = u32::try_from(position + 1).unwrap_or(u32::MAX);
        let step_number = int_attr(ins, "n", path)?.unwrap_or(default_step);
        let type_code: i32 = int_attr(ins, "t", path)?.unwrap_or(-1);
        let instruction_type = InstructionType::from_code(type_code);
        let raw_text = text(ins, "ins");

        let decoded = match decode_instruction(
            step_number,
            instruction_type,
            &raw_text,
            self.options.max_expression_depth,
        ) {
            Ok(ast) => Decoded::Ast(ast),
            Err(err) => match self.options.decode_failure_policy {
                DecodeFailurePolicy::FailDocument => {
                    return Err(CompileErrorKind::InstructionDecode(err))
                }
                DecodeFailurePolicy::SkipInstruction => {
                    warn!("{}: skipping undecodable instruction: {}", path, err);
                    Decoded::Diagnostic(err.to_diagnostic().at(path))
                }
            },
        };

        let mut notes = Vec::new();
        if !instruction_type.is_known() {
            notes.push(
                Diagnostic::warning(
                    DiagnosticCode::UnknownInstructionType,
                    format!("instruction type code {} is not recognized", type_code),
                )
                .at(path),
            );
        }

        Ok(Instruction {
            step_number,
            type_code,
            instruction_type,
            raw_text,
            target: optional_text(ins, "ins_tar"),
            jump_on_true: optional_text(ins, "seq_t"),
            jump_on_false: optional_text(ins, "seq_f"),
            decoded,
            notes,
        })
    }
}

// ============================================================================
// Header and data dictionary
// ============================================================================

fn header(root: &XmlNode) -> ProgramVersion {
    ProgramVersion {
        primary_key: text(root, "pk"),
        global_primary_key: text(root, "gpk"),
        program_id: text(root, "prog"),
        program_name: text(root, "progName"),
        version: text(root, "ver"),
        version_name: text(root, "verName"),
        line_of_business_id: text(root, "line"),
        carrier_id: text(root, "sub"),
        schema_id: text(root, "schema"),
        effective_date: EffectiveDate::parse(&text(root, "ed")),
        effective_date_exact: text(root, "ed_exact"),
        persisted: flag(root, "persisted"),
        date_mask: text(root, "date_mask"),
        culture: text(root, "culture"),
        decimal_symbol: text(root, "decimal_symbol"),
        group_symbol: text(root, "group_symbol"),
        ..ProgramVersion::default()
    }
}

fn data_dictionary(root: &XmlNode) -> DataDictionary {
    let Some(schema) = root.child("schema") else {
        return DataDictionary::default();
    };

    let categories = schema
        .child("categories")
        .map(|c| {
            c.children_named("c")
                .map(|node| Category {
                    line: text(node, "l"),
                    index: text(node, "i"),
                    parent: text(node, "p"),
                    description: text(node, "d"),
                })
                .collect()
        })
        .unwrap_or_default();

    let inputs = schema
        .child("inputs")
        .map(|i| {
            i.children_named("iv")
                .map(|node| InputVariable {
                    line: text(node, "l"),
                    index: text(node, "i"),
                    data_type: text(node, "dt"),
                    description: text(node, "d"),
                    qual_type: text(node, "qt"),
                    category_id: text(node, "c"),
                    system_var: text(node, "sys"),
                })
                .collect()
        })
        .unwrap_or_default();

    DataDictionary { categories, inputs }
}

// ============================================================================
// Naming
// ============================================================================

fn is_definition(node: &XmlNode) -> bool {
    node.has_child("i") || node.has_child("d")
}

/// Variable name of a `<d>` element: the explicit `name` attribute, or the
/// scope prefix for its kind followed by its index.
fn variable_name(node: &XmlNode, path: &str) -> BuildResult<String> {
    if let Some(name) = optional_text(node, "name") {
        return Ok(name);
    }

    let program_scoped = !matches!(node.attr("p").map(str::trim), None | Some("") | Some("0"));
    let scoped = |program: &str, global: &str| {
        if program_scoped {
            program.to_string()
        } else {
            global.to_string()
        }
    };
    let index: i64 = int_attr(node, "i", path)?.unwrap_or(0);

    let name = match DependencyKind::from_ib_type(node.attr("t").unwrap_or("")) {
        DependencyKind::Calculated => {
            let calc_index: i64 = int_attr(node, "cid", path)?.unwrap_or(index);
            format!("{}_{}", scoped("PC", "GC"), calc_index)
        }
        DependencyKind::Table => format!("{}_{}", scoped("PL", "GL"), index),
        DependencyKind::Result => format!("{}_{}", scoped("PR", "GR"), index),
        DependencyKind::Input => format!("GI_{}", index),
        DependencyKind::Other => format!("DV_{}", index),
    };
    Ok(name)
}

/// Attach an info note to every step that reads a calculated variable the
/// owner does not declare.
fn flag_undeclared(
    steps: &mut [Instruction],
    declared: &[String],
    owner: Option<&str>,
    path: &str,
) {
    for (k, step) in steps.iter_mut().enumerate() {
        let Some(ast) = step.ast() else { continue };
        let undeclared: Vec<String> = ast
            .referenced_variables()
            .into_iter()
            .filter(|name| VariablePrefix::of(name).is_some_and(VariablePrefix::is_calculated))
            .map(base_name)
            .filter(|name| Some(*name) != owner && !declared.iter().any(|d| d == name))
            .map(str::to_string)
            .collect();

        for name in undeclared {
            step.notes.push(
                Diagnostic::info(
                    DiagnosticCode::UndeclaredVariable,
                    format!("{} is read but not declared as a dependency", name),
                )
                .at(format!("{path}/i[{k}]")),
            );
        }
    }
}

// ============================================================================
// Attribute access
// ============================================================================

fn text(node: &XmlNode, attr: &str) -> String {
    node.attr(attr).unwrap_or_default().to_string()
}

fn optional_text(node: &XmlNode, attr: &str) -> Option<String> {
    node.attr(attr)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn flag(node: &XmlNode, attr: &str) -> bool {
    node.attr(attr).is_some_and(|v| {
        matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes" | "y"
        )
    })
}

/// Numeric attribute; absent or blank is `None`, anything unparsable is a
/// schema mismatch at `path/@attr`.
fn int_attr<T: FromStr>(node: &XmlNode, attr: &str, path: &str) -> BuildResult<Option<T>> {
    match node.attr(attr).map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw.parse::<T>().map(Some).map_err(|_| {
            CompileErrorKind::schema_mismatch(
                format!("{path}/@{attr}"),
                format!("expected an integer, found {:?}", raw),
            )
        }),
    }
}
