//! Recursive-descent parser for instruction text
//!
//! ```text
//! instruction := statement EOF
//! statement   := "Set" IDENT "=" expression
//!              | "If" expression "Then" block ("Else" block)?
//!              | expression
//! block       := statement+                 (ends at "Else" or EOF)
//! expression  := additive (cmp_op additive)?  -- non-associative
//! additive    := term (("+" | "-") term)*
//! term        := unary (("*" | "/") unary)*
//! unary       := "-" unary | atom
//! atom        := NUMBER | STRING | IDENT | IDENT "(" args? ")" | "(" expression ")"
//! args        := expression ("," args)?
//! ```
//!
//! A dangling `Else` binds to the nearest `If`.

use super::ast::{ArithOp, Ast, CompareOp, VariableRef};
use super::tokenizer::{tokenize, Token, TokenError, TokenKind};
use crate::diagnostics::DiagnosticCode;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} at {position}")]
pub struct ParseError {
    pub message: String,
    /// Byte offset of the offending token.
    pub position: usize,
    pub code: DiagnosticCode,
}

impl From<TokenError> for ParseError {
    fn from(err: TokenError) -> Self {
        Self {
            message: err.message,
            position: err.position,
            code: err.code,
        }
    }
}

/// Parse one instruction into its AST.
///
/// `max_depth` bounds nesting of parentheses, unary minus, call arguments and
/// conditional bodies, and the height of every `+ - * /` chain.
pub fn parse_instruction(source: &str, max_depth: usize) -> Result<Ast, ParseError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        max_depth,
    };
    parser.parse_instruction()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    max_depth: usize,
}

impl Parser {
    // ========================================================================
    // Token cursor
    // ========================================================================

    fn peek(&self) -> &Token {
        // The token list always ends with Eof and the cursor never passes it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, ParseError> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.peek();
        ParseError {
            message: format!("expected {}, found {}", expected, token.kind),
            position: token.span.start,
            code: DiagnosticCode::UnexpectedToken,
        }
    }

    fn too_deep(&self, position: usize) -> ParseError {
        ParseError {
            message: format!("nesting deeper than {}", self.max_depth),
            position,
            code: DiagnosticCode::NestingTooDeep,
        }
    }

    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= self.max_depth {
            return Err(self.too_deep(self.peek().span.start));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn parse_instruction(&mut self) -> Result<Ast, ParseError> {
        if self.check(&TokenKind::Eof) {
            return Err(ParseError {
                message: "empty instruction".to_string(),
                position: 0,
                code: DiagnosticCode::EmptyInstruction,
            });
        }
        let statement = self.parse_statement()?;
        if !self.check(&TokenKind::Eof) {
            return Err(self.unexpected("end of instruction"));
        }
        Ok(statement)
    }

    fn parse_statement(&mut self) -> Result<Ast, ParseError> {
        match self.peek().kind {
            TokenKind::Set => self.parse_assignment(),
            TokenKind::If => self.nested(Self::parse_conditional),
            TokenKind::Then | TokenKind::Else => Err(self.unexpected("statement")),
            _ => self.parse_expression(),
        }
    }

    fn parse_assignment(&mut self) -> Result<Ast, ParseError> {
        self.advance(); // Set
        let target = match self.peek().kind.clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                VariableRef::new(name)
            }
            _ => return Err(self.unexpected("assignment target")),
        };
        self.expect(TokenKind::Eq, "'=' after assignment target")?;
        let value = self.parse_expression()?;
        Ok(Ast::Assignment {
            target,
            value: Box::new(value),
        })
    }

    fn parse_conditional(&mut self) -> Result<Ast, ParseError> {
        self.advance(); // If
        let condition = self.parse_expression()?;
        self.expect(TokenKind::Then, "'Then'")?;
        let then_branch = self.parse_block()?;

        let else_branch = if self.check(&TokenKind::Else) {
            self.advance();
            self.parse_block()?
        } else {
            Vec::new()
        };

        Ok(Ast::Conditional {
            condition: Box::new(condition),
            then_branch,
            else_branch,
        })
    }

    fn parse_block(&mut self) -> Result<Vec<Ast>, ParseError> {
        let mut statements = Vec::new();
        while !matches!(self.peek().kind, TokenKind::Else | TokenKind::Eof) {
            statements.push(self.parse_statement()?);
        }
        if statements.is_empty() {
            return Err(self.unexpected("statement"));
        }
        Ok(statements)
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn parse_expression(&mut self) -> Result<Ast, ParseError> {
        let left = self.parse_additive()?;
        let Some(op) = compare_op(&self.peek().kind) else {
            return Ok(left);
        };
        self.advance();
        let right = self.parse_additive()?;

        if compare_op(&self.peek().kind).is_some() {
            let token = self.peek();
            return Err(ParseError {
                message: format!("chained comparison '{}' needs parentheses", token.kind),
                position: token.span.start,
                code: DiagnosticCode::ChainedComparison,
            });
        }
        Ok(Ast::compare(op, left, right))
    }

    fn parse_additive(&mut self) -> Result<Ast, ParseError> {
        self.parse_chain(Self::parse_term, additive_op)
    }

    fn parse_term(&mut self) -> Result<Ast, ParseError> {
        self.parse_chain(Self::parse_unary, multiplicative_op)
    }

    /// Left-associative operator chain. Every link deepens the tree by one,
    /// so a chain is held to `max_depth` like explicit nesting is.
    fn parse_chain(
        &mut self,
        operand: fn(&mut Self) -> Result<Ast, ParseError>,
        op_of: fn(&TokenKind) -> Option<ArithOp>,
    ) -> Result<Ast, ParseError> {
        let mut left = operand(self)?;
        let mut height = left.depth();
        while let Some(op) = op_of(&self.peek().kind) {
            let position = self.advance().span.start;
            let right = operand(self)?;
            height = 1 + height.max(right.depth());
            if height > self.max_depth {
                return Err(self.too_deep(position));
            }
            left = Ast::arith(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Ast, ParseError> {
        if !self.check(&TokenKind::Minus) {
            return self.parse_atom();
        }
        self.advance();
        let operand = self.nested(Self::parse_unary)?;
        Ok(match operand {
            Ast::NumberLiteral { value } => Ast::NumberLiteral { value: -value },
            operand => Ast::Negate {
                operand: Box::new(operand),
            },
        })
    }

    fn parse_atom(&mut self) -> Result<Ast, ParseError> {
        match self.peek().kind.clone() {
            TokenKind::Number(value) => {
                self.advance();
                Ok(Ast::NumberLiteral { value })
            }
            TokenKind::String(value) => {
                self.advance();
                Ok(Ast::StringLiteral { value })
            }
            TokenKind::Identifier(name) => {
                self.advance();
                if self.check(&TokenKind::LParen) {
                    self.advance();
                    let args = self.nested(Self::parse_arguments)?;
                    Ok(Ast::FunctionCall { name, args })
                } else {
                    Ok(Ast::var(name))
                }
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.nested(Self::parse_expression)?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    /// Arguments after the opening parenthesis, through the closing one.
    fn parse_arguments(&mut self) -> Result<Vec<Ast>, ParseError> {
        let mut args = Vec::new();
        if self.check(&TokenKind::RParen) {
            self.advance();
            return Ok(args);
        }
        // args := expression ("," args)?
        loop {
            args.push(self.parse_expression()?);
            if self.check(&TokenKind::Comma) {
                self.advance();
                continue;
            }
            self.expect(TokenKind::RParen, "',' or ')' in argument list")?;
            return Ok(args);
        }
    }
}

fn additive_op(kind: &TokenKind) -> Option<ArithOp> {
    match kind {
        TokenKind::Plus => Some(ArithOp::Add),
        TokenKind::Minus => Some(ArithOp::Sub),
        _ => None,
    }
}

fn multiplicative_op(kind: &TokenKind) -> Option<ArithOp> {
    match kind {
        TokenKind::Star => Some(ArithOp::Mul),
        TokenKind::Slash => Some(ArithOp::Div),
        _ => None,
    }
}

fn compare_op(kind: &TokenKind) -> Option<CompareOp> {
    match kind {
        TokenKind::Eq => Some(CompareOp::Eq),
        TokenKind::NotEq => Some(CompareOp::Ne),
        TokenKind::Gt => Some(CompareOp::Gt),
        TokenKind::Ge => Some(CompareOp::Ge),
        TokenKind::Lt => Some(CompareOp::Lt),
        TokenKind::Le => Some(CompareOp::Le),
        _ => None,
    }
}
