//! Instruction AST
//!
//! Each decoded instruction owns one `Ast` root and every node owns its
//! children. Serialized with a `"type"` discriminant per node.

use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;

// ============================================================================
// Nodes
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Ast {
    /// `Set <target> = <value>`
    Assignment {
        target: VariableRef,
        value: Box<Ast>,
    },
    Arithmetic {
        op: ArithOp,
        left: Box<Ast>,
        right: Box<Ast>,
    },
    Compare {
        op: CompareOp,
        left: Box<Ast>,
        right: Box<Ast>,
    },
    FunctionCall {
        name: String,
        args: Vec<Ast>,
    },
    /// `If <condition> Then <stmt>... [Else <stmt>...]`
    Conditional {
        condition: Box<Ast>,
        then_branch: Vec<Ast>,
        else_branch: Vec<Ast>,
    },
    /// Unary minus over a non-literal operand.
    Negate {
        operand: Box<Ast>,
    },
    VariableRef(VariableRef),
    NumberLiteral {
        value: Decimal,
    },
    StringLiteral {
        value: String,
    },
    /// Blank instruction text on a type that carries no text.
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct VariableRef {
    pub name: String,
}

impl VariableRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn prefix(&self) -> Option<VariablePrefix> {
        VariablePrefix::of(&self.name)
    }
}

/// Name without its `~` marker and dotted sub-index: `~PC_12.3` → `PC_12`.
pub fn base_name(name: &str) -> &str {
    let name = name.trim_start_matches('~');
    name.split('.').next().unwrap_or(name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArithOp {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
}

impl ArithOp {
    pub fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            ArithOp::Add | ArithOp::Sub => PREC_ADDITIVE,
            ArithOp::Mul | ArithOp::Div => PREC_MULTIPLICATIVE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CompareOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
        }
    }
}

// ============================================================================
// Variable prefixes
// ============================================================================

/// Two-letter scope prefix of a rating variable name (`PC_12`, `~GI_3`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VariablePrefix {
    /// Result of an earlier step
    LS,
    /// Program lookup (table)
    PL,
    /// Global lookup (table)
    GL,
    /// Global input
    GI,
    /// Global result
    GR,
    /// Program result
    PR,
    /// Program calculated
    PC,
    /// Global calculated
    GC,
    /// Program policy
    PP,
    /// Global policy
    GP,
    /// Instruction group
    IG,
    /// System variable
    LX,
    /// System variable alias
    IX,
    /// Local data source
    PQ,
    /// Global data source
    GQ,
}

impl VariablePrefix {
    pub fn of(name: &str) -> Option<Self> {
        let name = name.trim_start_matches('~');
        let (head, rest) = name.split_at_checked(2)?;
        if !rest.starts_with('_') {
            return None;
        }
        let prefix = match head {
            "LS" => VariablePrefix::LS,
            "PL" => VariablePrefix::PL,
            "GL" => VariablePrefix::GL,
            "GI" => VariablePrefix::GI,
            "GR" => VariablePrefix::GR,
            "PR" => VariablePrefix::PR,
            "PC" => VariablePrefix::PC,
            "GC" => VariablePrefix::GC,
            "PP" => VariablePrefix::PP,
            "GP" => VariablePrefix::GP,
            "IG" => VariablePrefix::IG,
            "LX" => VariablePrefix::LX,
            "IX" => VariablePrefix::IX,
            "PQ" => VariablePrefix::PQ,
            "GQ" => VariablePrefix::GQ,
            _ => return None,
        };
        Some(prefix)
    }

    /// Calculated variables are defined by their own instruction set.
    pub fn is_calculated(self) -> bool {
        matches!(
            self,
            VariablePrefix::PC | VariablePrefix::GC | VariablePrefix::PP | VariablePrefix::GP
        )
    }
}

// ============================================================================
// Constructors and queries
// ============================================================================

impl Ast {
    pub fn var(name: impl Into<String>) -> Self {
        Ast::VariableRef(VariableRef::new(name))
    }

    pub fn number(value: impl Into<Decimal>) -> Self {
        Ast::NumberLiteral {
            value: value.into(),
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Ast::StringLiteral {
            value: value.into(),
        }
    }

    pub fn assign(target: impl Into<String>, value: Ast) -> Self {
        Ast::Assignment {
            target: VariableRef::new(target),
            value: Box::new(value),
        }
    }

    pub fn arith(op: ArithOp, left: Ast, right: Ast) -> Self {
        Ast::Arithmetic {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn compare(op: CompareOp, left: Ast, right: Ast) -> Self {
        Ast::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn call(name: impl Into<String>, args: Vec<Ast>) -> Self {
        Ast::FunctionCall {
            name: name.into(),
            args,
        }
    }

    /// Node discriminant, as serialized.
    pub fn kind(&self) -> &'static str {
        match self {
            Ast::Assignment { .. } => "Assignment",
            Ast::Arithmetic { .. } => "Arithmetic",
            Ast::Compare { .. } => "Compare",
            Ast::FunctionCall { .. } => "FunctionCall",
            Ast::Conditional { .. } => "Conditional",
            Ast::Negate { .. } => "Negate",
            Ast::VariableRef(_) => "VariableRef",
            Ast::NumberLiteral { .. } => "NumberLiteral",
            Ast::StringLiteral { .. } => "StringLiteral",
            Ast::Empty => "Empty",
        }
    }

    /// Levels in the tree; a leaf is 1.
    pub fn depth(&self) -> usize {
        let below = match self {
            Ast::Assignment { value, .. } => value.depth(),
            Ast::Arithmetic { left, right, .. } | Ast::Compare { left, right, .. } => {
                left.depth().max(right.depth())
            }
            Ast::FunctionCall { args, .. } => args.iter().map(Ast::depth).max().unwrap_or(0),
            Ast::Conditional {
                condition,
                then_branch,
                else_branch,
            } => then_branch
                .iter()
                .chain(else_branch)
                .map(Ast::depth)
                .fold(condition.depth(), usize::max),
            Ast::Negate { operand } => operand.depth(),
            Ast::VariableRef(_)
            | Ast::NumberLiteral { .. }
            | Ast::StringLiteral { .. }
            | Ast::Empty => 0,
        };
        below + 1
    }

    /// Variable names read or written by this tree, first occurrence order.
    pub fn referenced_variables(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_variables(&mut names);
        names
    }

    fn collect_variables<'a>(&'a self, names: &mut Vec<&'a str>) {
        fn push<'a>(name: &'a str, names: &mut Vec<&'a str>) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        match self {
            Ast::Assignment { target, value } => {
                push(&target.name, names);
                value.collect_variables(names);
            }
            Ast::Arithmetic { left, right, .. } | Ast::Compare { left, right, .. } => {
                left.collect_variables(names);
                right.collect_variables(names);
            }
            Ast::FunctionCall { args, .. } => {
                args.iter().for_each(|a| a.collect_variables(names));
            }
            Ast::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                condition.collect_variables(names);
                then_branch
                    .iter()
                    .chain(else_branch)
                    .for_each(|s| s.collect_variables(names));
            }
            Ast::Negate { operand } => operand.collect_variables(names),
            Ast::VariableRef(v) => push(&v.name, names),
            Ast::NumberLiteral { .. } | Ast::StringLiteral { .. } | Ast::Empty => {}
        }
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Canonical DSL text with the minimum parentheses needed to keep the
    /// tree shape. A conditional nested in a `Then` branch of a conditional
    /// that has an `Else` renders ambiguously; the text is for display.
    pub fn to_dsl_string(&self) -> String {
        match self {
            Ast::Assignment { target, value } => {
                format!("Set {} = {}", target.name, value.to_dsl_string())
            }
            Ast::Arithmetic { op, left, right } => format!(
                "{} {} {}",
                left.operand(op.precedence()),
                op.symbol(),
                right.operand(op.precedence() + 1)
            ),
            Ast::Compare { op, left, right } => format!(
                "{} {} {}",
                left.operand(PREC_ADDITIVE),
                op.symbol(),
                right.operand(PREC_ADDITIVE)
            ),
            Ast::FunctionCall { name, args } => {
                let args: Vec<String> = args.iter().map(Ast::to_dsl_string).collect();
                format!("{}({})", name, args.join(", "))
            }
            Ast::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                let mut out = format!(
                    "If {} Then {}",
                    condition.to_dsl_string(),
                    block(then_branch)
                );
                if !else_branch.is_empty() {
                    out.push_str(" Else ");
                    out.push_str(&block(else_branch));
                }
                out
            }
            Ast::Negate { operand } => format!("-{}", operand.operand(PREC_UNARY)),
            Ast::VariableRef(v) => v.name.clone(),
            Ast::NumberLiteral { value } => value.to_string(),
            Ast::StringLiteral { value } => quote(value),
            Ast::Empty => String::new(),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Ast::Assignment { .. } | Ast::Conditional { .. } => PREC_STATEMENT,
            Ast::Compare { .. } => PREC_COMPARE,
            Ast::Arithmetic { op, .. } => op.precedence(),
            Ast::Negate { .. } => PREC_UNARY,
            Ast::NumberLiteral { value } if value.is_sign_negative() => PREC_UNARY,
            _ => PREC_ATOM,
        }
    }

    fn operand(&self, min_precedence: u8) -> String {
        if self.precedence() < min_precedence {
            format!("({})", self.to_dsl_string())
        } else {
            self.to_dsl_string()
        }
    }
}

const PREC_STATEMENT: u8 = 0;
const PREC_COMPARE: u8 = 1;
const PREC_ADDITIVE: u8 = 2;
const PREC_MULTIPLICATIVE: u8 = 3;
const PREC_UNARY: u8 = 4;
const PREC_ATOM: u8 = 5;

fn block(statements: &[Ast]) -> String {
    statements
        .iter()
        .map(Ast::to_dsl_string)
        .collect::<Vec<_>>()
        .join(" ")
}

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

impl fmt::Display for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_dsl_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_serialized_discriminants() {
        let ast = Ast::assign("X", Ast::arith(ArithOp::Add, Ast::var("A"), Ast::number(1)));
        let json = serde_json::to_value(&ast).unwrap();

        assert_eq!(json["type"], "Assignment");
        assert_eq!(json["target"]["name"], "X");
        assert_eq!(json["value"]["type"], "Arithmetic");
        assert_eq!(json["value"]["op"], "+");
        assert_eq!(json["value"]["left"]["type"], "VariableRef");
        assert_eq!(json["value"]["left"]["name"], "A");
        assert_eq!(json["value"]["right"]["type"], "NumberLiteral");
        assert_eq!(json["value"]["right"]["value"], "1");
    }

    #[test]
    fn test_depth() {
        assert_eq!(Ast::var("A").depth(), 1);
        let negated = Ast::Negate {
            operand: Box::new(Ast::var("B")),
        };
        let ast = Ast::assign(
            "X",
            Ast::arith(
                ArithOp::Add,
                Ast::number(1),
                Ast::call("Max", vec![Ast::var("A"), negated]),
            ),
        );
        assert_eq!(ast.depth(), 5);
    }

    #[test]
    fn test_base_name_strips_marker_and_sub_index() {
        assert_eq!(base_name("~PC_12.3"), "PC_12");
        assert_eq!(base_name("GI_4"), "GI_4");
    }

    #[test]
    fn test_empty_serializes_as_tag_only() {
        let json = serde_json::to_value(Ast::Empty).unwrap();
        assert_eq!(json, serde_json::json!({"type": "Empty"}));
    }

    #[test]
    fn test_render_keeps_needed_parens_only() {
        let grouped = Ast::arith(
            ArithOp::Mul,
            Ast::arith(ArithOp::Add, Ast::number(2), Ast::number(3)),
            Ast::number(4),
        );
        assert_eq!(grouped.to_dsl_string(), "(2 + 3) * 4");

        let flat = Ast::arith(
            ArithOp::Add,
            Ast::number(2),
            Ast::arith(ArithOp::Mul, Ast::number(3), Ast::number(4)),
        );
        assert_eq!(flat.to_dsl_string(), "2 + 3 * 4");

        let right_nested = Ast::arith(
            ArithOp::Sub,
            Ast::var("A"),
            Ast::arith(ArithOp::Sub, Ast::var("B"), Ast::var("C")),
        );
        assert_eq!(right_nested.to_dsl_string(), "A - (B - C)");
    }

    #[test]
    fn test_render_conditional_and_call() {
        let ast = Ast::Conditional {
            condition: Box::new(Ast::compare(CompareOp::Ge, Ast::var("A"), Ast::number(5))),
            then_branch: vec![Ast::assign(
                "B",
                Ast::call("Round", vec![Ast::var("C"), Ast::string("R#2")]),
            )],
            else_branch: vec![],
        };
        assert_eq!(
            ast.to_string(),
            r#"If A >= 5 Then Set B = Round(C, "R#2")"#
        );
    }

    #[test]
    fn test_referenced_variables_in_order_without_repeats() {
        let ast = Ast::assign(
            "PC_1",
            Ast::arith(
                ArithOp::Add,
                Ast::var("GI_4"),
                Ast::call("Max", vec![Ast::var("PC_2"), Ast::var("GI_4")]),
            ),
        );
        assert_eq!(ast.referenced_variables(), vec!["PC_1", "GI_4", "PC_2"]);
    }

    #[test]
    fn test_variable_prefix() {
        assert_eq!(VariablePrefix::of("PC_12"), Some(VariablePrefix::PC));
        assert_eq!(VariablePrefix::of("~GI_3.1"), Some(VariablePrefix::GI));
        assert_eq!(VariablePrefix::of("Premium"), None);
        assert_eq!(VariablePrefix::of("ZZ_1"), None);
        assert_eq!(VariablePrefix::of("P"), None);
        assert!(VariablePrefix::PC.is_calculated());
        assert!(!VariablePrefix::GI.is_calculated());
    }
}
