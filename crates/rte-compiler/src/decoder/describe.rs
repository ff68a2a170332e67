//! English rendering of decoded instructions
//!
//! Turns an AST into a sentence for reviewers, with variable names replaced
//! by their descriptions wherever a [`VariableLookup`] knows them. The output
//! is for display only; nothing parses it.

use super::ast::{ArithOp, Ast, CompareOp};
use super::instruction_type::InstructionType;

/// Source of human-readable variable descriptions.
pub trait VariableLookup {
    /// Description of `name` (as written in instruction text), if known.
    fn describe_variable(&self, name: &str) -> Option<String>;
}

/// Lookup that knows nothing; every variable renders as its name.
pub struct NoDescriptions;

impl VariableLookup for NoDescriptions {
    fn describe_variable(&self, _name: &str) -> Option<String> {
        None
    }
}

impl<F> VariableLookup for F
where
    F: Fn(&str) -> Option<String>,
{
    fn describe_variable(&self, name: &str) -> Option<String> {
        self(name)
    }
}

/// `**<step label>**: <sentence>`
pub fn describe_instruction(
    instruction_type: InstructionType,
    ast: &Ast,
    lookup: &dyn VariableLookup,
) -> String {
    format!("**{}**: {}", instruction_type.label(), describe(ast, lookup))
}

/// Sentence for one AST.
pub fn describe(ast: &Ast, lookup: &dyn VariableLookup) -> String {
    match ast {
        Ast::Assignment { target, value } => format!(
            "Set {} to {}",
            variable(&target.name, lookup),
            describe(value, lookup)
        ),
        Ast::Arithmetic { op, left, right } => format!(
            "{} {} {}",
            operand(left, lookup),
            arith_phrase(*op),
            operand(right, lookup)
        ),
        Ast::Compare { op, left, right } => format!(
            "{} {} {}",
            operand(left, lookup),
            compare_phrase(*op),
            operand(right, lookup)
        ),
        Ast::FunctionCall { name, args } => {
            let args: Vec<String> = args.iter().map(|a| describe(a, lookup)).collect();
            format!("{}({})", name, args.join(", "))
        }
        Ast::Conditional {
            condition,
            then_branch,
            else_branch,
        } => {
            let mut out = format!(
                "If {} then {}",
                describe(condition, lookup),
                statements(then_branch, lookup)
            );
            if !else_branch.is_empty() {
                out.push_str(", otherwise ");
                out.push_str(&statements(else_branch, lookup));
            }
            out
        }
        Ast::Negate { operand: inner } => format!("negative {}", operand(inner, lookup)),
        Ast::VariableRef(v) => variable(&v.name, lookup),
        Ast::NumberLiteral { value } => value.to_string(),
        Ast::StringLiteral { value } => format!("\"{}\"", value),
        Ast::Empty => "No operation".to_string(),
    }
}

fn variable(name: &str, lookup: &dyn VariableLookup) -> String {
    match lookup.describe_variable(name) {
        Some(description) => format!("{} [{}]", description, name),
        None => name.to_string(),
    }
}

/// Binary sub-expressions are bracketed so the sentence keeps the grouping.
fn operand(ast: &Ast, lookup: &dyn VariableLookup) -> String {
    match ast {
        Ast::Arithmetic { .. } | Ast::Compare { .. } => format!("({})", describe(ast, lookup)),
        _ => describe(ast, lookup),
    }
}

fn statements(body: &[Ast], lookup: &dyn VariableLookup) -> String {
    body.iter()
        .map(|s| describe(s, lookup))
        .collect::<Vec<_>>()
        .join(" and ")
}

fn arith_phrase(op: ArithOp) -> &'static str {
    match op {
        ArithOp::Add => "plus",
        ArithOp::Sub => "minus",
        ArithOp::Mul => "multiplied by",
        ArithOp::Div => "divided by",
    }
}

fn compare_phrase(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Eq => "equals",
        CompareOp::Ne => "is not equal to",
        CompareOp::Gt => "is greater than",
        CompareOp::Ge => "is greater than or equal to",
        CompareOp::Lt => "is less than",
        CompareOp::Le => "is less than or equal to",
    }
}
