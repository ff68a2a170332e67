//! End-to-end compilation of export fixtures.
//!
//! Run with: cargo test -p rte-compiler --test compile_exports

use std::path::PathBuf;

use pretty_assertions::assert_eq;
use rte_compiler::decoder::InstructionType;
use rte_compiler::model::DependencyKind;
use rte_compiler::serializer::to_json_value;
use rte_compiler::{
    Ast, CompileErrorKind, CompileOptions, DecodeFailurePolicy, DiagnosticCode, ManifestSummary,
    ProgramVersion, RteCompiler,
};

// =============================================================================
// HARNESS
// =============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("rte_compiler=debug")
        .with_test_writer()
        .try_init();
}

fn fixture(name: &str) -> Vec<u8> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    std::fs::read(&path).unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e))
}

fn compile(name: &str) -> ProgramVersion {
    init_tracing();
    RteCompiler::default()
        .compile(name, &fixture(name))
        .unwrap_or_else(|e| panic!("{} should compile: {}", name, e))
}

// =============================================================================
// PERSONAL AUTO
// =============================================================================

#[test]
fn personal_auto_header_and_dictionary() {
    let pv = compile("personal_auto.xml");

    assert_eq!(pv.program_id, "118");
    assert_eq!(pv.program_name, "Personal Auto");
    assert_eq!(pv.version, "4.0002");
    assert_eq!(pv.carrier_id, "1042");
    assert_eq!(pv.line_of_business_id, "3");
    assert_eq!(pv.effective_date_exact, "03/31/2025 1:26:32 PM");
    assert_eq!(pv.effective_date.partition_path().as_deref(), Some("2025/03/31"));
    assert!(pv.diagnostics.is_empty());

    assert_eq!(pv.data_dictionary.categories.len(), 3);
    assert_eq!(pv.data_dictionary.inputs.len(), 3);
    assert_eq!(pv.data_dictionary.inputs[1].description, "Territory");
}

#[test]
fn personal_auto_algorithms_in_execution_order() {
    let pv = compile("personal_auto.xml");

    assert_eq!(pv.algorithms().count(), 10);
    let numbers: Vec<i64> = pv.sequences.iter().map(|s| s.sequence_number).collect();
    assert_eq!(numbers, vec![10, 20, 30]);

    let order: Vec<&str> = pv
        .algorithms_in_execution_order()
        .into_iter()
        .map(|a| a.prog_key.as_str())
        .collect();
    assert_eq!(
        order,
        vec!["A01", "A02", "A06", "A03", "A04", "A05", "A07", "A08", "A09", "A10"]
    );

    let subtotal = pv.algorithms().find(|a| a.prog_key == "A07").unwrap();
    let steps: Vec<u32> = subtotal.steps.iter().map(|s| s.step_number).collect();
    assert_eq!(steps, vec![1, 2]);
}

#[test]
fn personal_auto_dependency_graph() {
    let pv = compile("personal_auto.xml");

    assert_eq!(
        pv.dependency_variables.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["PC_1", "PC_2", "PL_4"]
    );

    let base = &pv.dependency_variables["PC_1"];
    assert_eq!(base.kind, DependencyKind::Calculated);
    assert_eq!(base.dependency_vars, vec!["PL_4"]);
    assert_eq!(base.steps.len(), 1);

    let table = &pv.dependency_variables["PL_4"];
    assert_eq!(table.kind, DependencyKind::Table);
    assert!(table.steps.is_empty());

    // PC_2 reuses PC_1 through a bare reference.
    let surcharge = &pv.dependency_variables["PC_2"];
    assert_eq!(surcharge.dependency_vars, vec!["PC_1"]);
    assert_eq!(
        surcharge.steps[0].ast().map(Ast::to_dsl_string).as_deref(),
        Some("Set PC_2 = PC_1 / 10")
    );
}

#[test]
fn personal_auto_keeps_undecodable_instruction() {
    let pv = compile("personal_auto.xml");

    let failures = pv.decode_failures();
    assert_eq!(failures.len(), 1);
    let failed = failures[0];
    assert_eq!(failed.raw_text, r#"Set PR_9 = Round(PR_8, "R#2""#);
    let diagnostic = failed.diagnostic().unwrap();
    assert!(diagnostic.is_error());
    assert_eq!(diagnostic.code, DiagnosticCode::UnexpectedToken);
    assert_eq!(diagnostic.path, "seq[3]/item[2]/i[0]");

    // Everything else decoded.
    assert_eq!(pv.instructions().filter(|i| i.is_decoded()).count(), 13);

    let decline = pv.algorithms().find(|a| a.prog_key == "A10").unwrap();
    assert_eq!(decline.steps[1].instruction_type, InstructionType::SetUnderwritingToFail);
    assert_eq!(decline.steps[1].ast(), Some(&Ast::Empty));
}

#[test]
fn personal_auto_fails_whole_document_when_strict() {
    init_tracing();
    let err = RteCompiler::new(CompileOptions::strict())
        .compile("personal_auto.xml", &fixture("personal_auto.xml"))
        .unwrap_err();

    assert_eq!(err.document, "personal_auto.xml");
    match err.kind {
        CompileErrorKind::InstructionDecode(decode) => {
            assert_eq!(decode.step, 1);
            assert_eq!(decode.raw_text, r#"Set PR_9 = Round(PR_8, "R#2""#);
            assert_eq!(decode.position, decode.raw_text.len());
        }
        other => panic!("Expected InstructionDecode, got {other:?}"),
    }
}

#[test]
fn personal_auto_json_and_manifest() {
    let pv = compile("personal_auto.xml");
    let json = to_json_value(&pv).unwrap();

    let rating = &json["sequences"][0]["algorithms"][1]["steps"][0];
    assert_eq!(rating["instruction_type"], "numeric_if");
    assert_eq!(rating["ast"]["type"], "Conditional");
    assert_eq!(rating["ast"]["condition"]["right"]["value"], "25");
    assert_eq!(json["dependency_variables"]["PL_4"]["kind"], "table");

    assert_eq!(
        pv.manifest_summary(),
        ManifestSummary {
            primary_key: "D1F0A7".into(),
            program_id: "118".into(),
            version: "4.0002".into(),
            line: "3".into(),
            carrier: "1042".into(),
            effective_date: "2025-03-31T13:26:32".into(),
        }
    );
}

#[test]
fn personal_auto_steps_render_as_english() {
    let pv = compile("personal_auto.xml");

    let age = pv.algorithms().find(|a| a.prog_key == "A02").unwrap();
    assert_eq!(
        pv.describe_step(&age.steps[0]),
        "**Numeric If**: If Driver Age [GI_1] is less than 25 then Set PR_2 to 1.4, \
         otherwise Set PR_2 to 1"
    );

    let base = &pv.dependency_variables["PC_1"];
    assert_eq!(
        pv.describe_step(&base.steps[0]),
        "**Arithmetic**: Set Base rate [PC_1] to Territory table [PL_4] multiplied by 1.05"
    );

    let rounding = pv.algorithms().find(|a| a.prog_key == "A09").unwrap();
    assert!(pv
        .describe_step(&rounding.steps[0])
        .starts_with("**Arithmetic**: could not decode"));
}

// =============================================================================
// STRUCTURAL FAILURES
// =============================================================================

#[test]
fn cross_sequence_cycle_is_reported_in_order() {
    init_tracing();
    let err = RteCompiler::default()
        .compile("cyclic_dependencies.xml", &fixture("cyclic_dependencies.xml"))
        .unwrap_err();

    assert_eq!(
        err.kind,
        CompileErrorKind::DependencyCycle {
            cycle: vec!["PC_1".into(), "PC_2".into(), "PC_1".into()]
        }
    );
    assert!(err.to_string().contains("PC_1 → PC_2 → PC_1"));
}

#[test]
fn minimal_header_defaults_and_flags_date() {
    let pv = compile("minimal_header.xml");

    assert_eq!(pv.program_id, "205");
    assert_eq!(pv.program_name, "");
    assert_eq!(pv.carrier_id, "");
    assert_eq!(pv.effective_date.raw, "Q3 2025");
    assert_eq!(pv.effective_date.partition_path(), None);
    assert_eq!(pv.diagnostics.len(), 1);
    assert_eq!(pv.diagnostics[0].code, DiagnosticCode::UnrecognizedDateFormat);

    let steps = &pv.algorithms().next().unwrap().steps;
    assert_eq!(steps[0].ast(), Some(&Ast::Empty));
    assert!(steps[1].is_decoded());
    assert_eq!(pv.manifest_summary().effective_date, "Q3 2025");
}

// =============================================================================
// BATCH
// =============================================================================

#[test]
fn batch_keeps_going_past_bad_documents() {
    init_tracing();
    let documents = vec![
        ("personal_auto.xml".to_string(), fixture("personal_auto.xml")),
        ("truncated.xml".to_string(), b"<export><seq n=\"1\">".to_vec()),
        ("cyclic_dependencies.xml".to_string(), fixture("cyclic_dependencies.xml")),
        ("no_sequences.xml".to_string(), b"<export prog=\"1\"/>".to_vec()),
        ("minimal_header.xml".to_string(), fixture("minimal_header.xml")),
    ];

    let report = RteCompiler::default().compile_batch(documents);

    assert_eq!(report.total(), 5);
    let compiled: Vec<&str> = report.compiled.iter().map(|p| p.document.as_str()).collect();
    assert_eq!(compiled, vec!["personal_auto.xml", "minimal_header.xml"]);

    let failed: Vec<(&str, &str)> = report
        .failed
        .iter()
        .map(|e| {
            let kind = match e.kind {
                CompileErrorKind::MalformedDocument { .. } => "malformed",
                CompileErrorKind::DependencyCycle { .. } => "cycle",
                CompileErrorKind::MissingRequiredSection { .. } => "missing",
                _ => "other",
            };
            (e.document.as_str(), kind)
        })
        .collect();
    assert_eq!(
        failed,
        vec![
            ("truncated.xml", "malformed"),
            ("cyclic_dependencies.xml", "cycle"),
            ("no_sequences.xml", "missing"),
        ]
    );
}

#[test]
fn options_from_yaml_drive_the_policy() {
    init_tracing();
    let options = CompileOptions::from_yaml_str("decode_failure_policy: fail_document\n").unwrap();
    assert_eq!(options.decode_failure_policy, DecodeFailurePolicy::FailDocument);
    assert_eq!(options.max_dependency_depth, 32);

    let report = RteCompiler::new(options).compile_batch([
        ("personal_auto.xml", fixture("personal_auto.xml")),
        ("minimal_header.xml", fixture("minimal_header.xml")),
    ]);
    assert_eq!(report.compiled.len(), 1);
    assert!(matches!(
        report.failed[0].kind,
        CompileErrorKind::InstructionDecode(_)
    ));
}
