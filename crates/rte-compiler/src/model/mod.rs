//! Typed program-version model and the builder that produces it.

pub mod builder;
pub mod dates;
pub mod lookup;
pub mod types;

pub use builder::build_program_version;
pub use dates::{parse_timestamp, EffectiveDate};
pub use types::*;
