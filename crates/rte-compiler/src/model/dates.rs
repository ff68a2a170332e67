//! Effective-date interpretation
//!
//! Exports stamp their effective date in whatever format the authoring
//! workstation produced. Recognized forms are parsed; anything else keeps its
//! raw text and the caller decides the fallback.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];

/// An effective date as found in the export, plus its interpretation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EffectiveDate {
    /// Attribute text, verbatim.
    pub raw: String,
    /// `None` when the attribute is absent or in no recognized format.
    pub parsed: Option<NaiveDateTime>,
}

impl EffectiveDate {
    pub fn parse(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            parsed: parse_timestamp(raw),
        }
    }

    pub fn is_missing(&self) -> bool {
        self.raw.trim().is_empty()
    }

    /// Present but in a format none of the known layouts match.
    pub fn is_unrecognized(&self) -> bool {
        !self.is_missing() && self.parsed.is_none()
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.parsed.map(|ts| ts.date())
    }

    /// `YYYY/MM/DD` storage partition for this date.
    pub fn partition_path(&self) -> Option<String> {
        self.parsed.map(|ts| ts.format("%Y/%m/%d").to_string())
    }
}

/// Parse an ISO or US timestamp. A trailing `_Suffix` (export tag) is
/// ignored; a date without a time is midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let text = trimmed.split('_').next().unwrap_or(trimmed).trim();

    DATE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
