//! Instruction decoder
//!
//! Turns one instruction's DSL text into an [`Ast`]. Decoding is pure: no
//! state survives between calls, so instructions can be decoded in any
//! order or on any thread.

pub mod ast;
pub mod describe;
pub mod instruction_type;
pub mod parser;
pub mod tokenizer;

pub use ast::{ArithOp, Ast, CompareOp, VariablePrefix, VariableRef};
pub use describe::{describe, describe_instruction, NoDescriptions, VariableLookup};
pub use instruction_type::InstructionType;
pub use parser::{parse_instruction, ParseError};

use crate::error::InstructionDecodeError;

/// Decode the text of instruction `step`.
///
/// Blank text is accepted, as [`Ast::Empty`], only for types that carry no
/// text.
pub fn decode_instruction(
    step: u32,
    instruction_type: InstructionType,
    raw_text: &str,
    max_depth: usize,
) -> Result<Ast, InstructionDecodeError> {
    if raw_text.trim().is_empty() && instruction_type.allows_empty_text() {
        return Ok(Ast::Empty);
    }
    parse_instruction(raw_text, max_depth).map_err(|err| InstructionDecodeError {
        step,
        raw_text: raw_text.to_string(),
        position: err.position,
        message: err.message,
        code: err.code,
    })
}
