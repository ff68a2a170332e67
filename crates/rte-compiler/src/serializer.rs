//! JSON hand-off
//!
//! The compiled model serializes to plain maps, sequences and scalars; AST
//! nodes carry a `"type"` discriminant. Output is one-directional: nothing
//! in this crate reads it back.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::ProgramVersion;

pub fn to_json_value(program: &ProgramVersion) -> serde_json::Result<Value> {
    serde_json::to_value(program)
}

pub fn to_json_string(program: &ProgramVersion, pretty: bool) -> serde_json::Result<String> {
    if pretty {
        serde_json::to_string_pretty(program)
    } else {
        serde_json::to_string(program)
    }
}

// ─── Manifest ───────────────────────────────────────────────────────────────

/// Summary fields of one program version, verbatim from the model. The
/// storage collaborator adds the object key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestSummary {
    pub primary_key: String,
    pub program_id: String,
    pub version: String,
    pub line: String,
    pub carrier: String,
    pub effective_date: String,
}

impl ManifestSummary {
    pub fn into_record(self, s3_key: impl Into<String>) -> ManifestRecord {
        ManifestRecord {
            s3_key: s3_key.into(),
            summary: self,
        }
    }
}

/// One line of a partition's newline-delimited manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRecord {
    pub s3_key: String,
    #[serde(flatten)]
    pub summary: ManifestSummary,
}

impl ManifestRecord {
    pub fn to_ndjson_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

impl ProgramVersion {
    pub fn manifest_summary(&self) -> ManifestSummary {
        ManifestSummary {
            primary_key: self.primary_key.clone(),
            program_id: self.program_id.clone(),
            version: self.version.clone(),
            line: self.line_of_business_id.clone(),
            carrier: self.carrier_id.clone(),
            effective_date: self.effective_date.raw.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::RteCompiler;
    use crate::config::CompileOptions;
    use pretty_assertions::assert_eq;

    const DOC: &str = r#"<export sub="7" line="3" prog="118" ver="2.0000" pk="PK9" ed="03/31/2025 1:11:55 PM_NB">
        <seq n="1"><item pk="A">
          <d t="10" cid="1" p="118"><i n="1" t="0" ins="Set PC_1 = 2"/></d>
          <i n="1" t="1" ins="If PC_1 &gt; 1 Then Set GR_1 = Foo(PC_1, &quot;x&quot;) Else Set GR_1 = 0"/>
          <i n="2" t="0" ins="Set GR_2 = (1 +"/>
        </item></seq>
      </export>"#;

    fn program() -> ProgramVersion {
        RteCompiler::new(CompileOptions::default())
            .compile("rating.xml", DOC.as_bytes())
            .unwrap()
    }

    #[test]
    fn test_ast_nodes_carry_type_discriminant() {
        let json = to_json_value(&program()).unwrap();
        let step = &json["sequences"][0]["algorithms"][0]["steps"][0];

        assert_eq!(step["instruction_type"], "numeric_if");
        let ast = &step["ast"];
        assert_eq!(ast["type"], "Conditional");
        assert_eq!(ast["condition"]["type"], "Compare");
        assert_eq!(ast["condition"]["op"], ">");
        assert_eq!(ast["then_branch"][0]["type"], "Assignment");
        assert_eq!(ast["then_branch"][0]["value"]["type"], "FunctionCall");
        assert_eq!(ast["then_branch"][0]["value"]["args"][1]["type"], "StringLiteral");
        assert_eq!(ast["else_branch"][0]["value"]["type"], "NumberLiteral");
    }

    #[test]
    fn test_failed_step_serializes_diagnostic_instead_of_ast() {
        let json = to_json_value(&program()).unwrap();
        let step = &json["sequences"][0]["algorithms"][0]["steps"][1];
        assert!(step.get("ast").is_none());
        assert_eq!(step["diagnostic"]["severity"], "Error");
        assert_eq!(step["raw_text"], "Set GR_2 = (1 +");
    }

    #[test]
    fn test_dependency_variables_keyed_by_name() {
        let json = to_json_value(&program()).unwrap();
        assert_eq!(json["dependency_variables"]["PC_1"]["kind"], "calculated");
        assert_eq!(
            json["dependency_variables"]["PC_1"]["steps"][0]["ast"]["type"],
            "Assignment"
        );
    }

    #[test]
    fn test_serialization_is_deterministic() {
        assert_eq!(
            to_json_string(&program(), false).unwrap(),
            to_json_string(&program(), false).unwrap()
        );
    }

    #[test]
    fn test_manifest_summary_is_verbatim() {
        let summary = program().manifest_summary();
        assert_eq!(
            summary,
            ManifestSummary {
                primary_key: "PK9".into(),
                program_id: "118".into(),
                version: "2.0000".into(),
                line: "3".into(),
                carrier: "7".into(),
                effective_date: "03/31/2025 1:11:55 PM_NB".into(),
            }
        );
    }

    #[test]
    fn test_manifest_record_line() {
        let line = program()
            .manifest_summary()
            .into_record("programs/2025/03/31/rating.json")
            .to_ndjson_line()
            .unwrap();

        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);
        let value: Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["s3_key"], "programs/2025/03/31/rating.json");
        assert_eq!(value["carrier"], "7");
        assert_eq!(value.as_object().unwrap().len(), 7);
    }

    #[test]
    fn test_partition_path_from_us_date() {
        assert_eq!(
            program().effective_date.partition_path().as_deref(),
            Some("2025/03/31")
        );
    }
}
