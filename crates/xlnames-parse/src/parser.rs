use crate::reference::Reference;
use crate::tokenizer::{Associativity, Token, TokenSubType, TokenType, Tokenizer, TokenizerError};
use xlnames_common::{ErrorKind, Value};

use std::error::Error;
use std::fmt::{self, Display};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserError {
    pub message: String,
    pub position: Option<usize>,
}

impl Display for ParserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(pos) = self.position {
            write!(f, "ParserError at position {}: {}", pos, self.message)
        } else {
            write!(f, "ParserError: {}", self.message)
        }
    }
}

impl Error for ParserError {}

impl From<TokenizerError> for ParserError {
    fn from(err: TokenizerError) -> Self {
        ParserError {
            message: err.message,
            position: Some(err.pos),
        }
    }
}

/// The payload of an AST node.
#[derive(Debug, Clone, PartialEq)]
pub enum ASTNodeType {
    Literal(Value),
    Reference {
        original: String,
        reference: Reference,
    },
    UnaryOp {
        op: String,
        expr: Box<ASTNode>,
    },
    BinaryOp {
        op: String,
        left: Box<ASTNode>,
        right: Box<ASTNode>,
    },
    Function {
        name: String,
        args: Vec<ASTNode>,
    },
    Array(Vec<Vec<ASTNode>>),
}

/// An expression tree node. `span` is the byte range of the token that
/// produced the node, when there was one.
#[derive(Debug, Clone, PartialEq)]
pub struct ASTNode {
    pub node_type: ASTNodeType,
    pub span: Option<(usize, usize)>,
}

impl ASTNode {
    pub fn new(node_type: ASTNodeType, token: Option<&Token>) -> Self {
        ASTNode {
            node_type,
            span: token.map(|t| (t.start, t.end)),
        }
    }

    pub fn literal(value: Value) -> Self {
        ASTNode::new(ASTNodeType::Literal(value), None)
    }

    pub fn is_reference(&self) -> bool {
        match &self.node_type {
            ASTNodeType::Reference { .. } => true,
            ASTNodeType::BinaryOp { op, left, right } if op == "," || op == ":" => {
                left.is_reference() && right.is_reference()
            }
            _ => false,
        }
    }

    /// Every reference in the tree, left to right.
    pub fn references(&self) -> Vec<&Reference> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a Reference>) {
        match &self.node_type {
            ASTNodeType::Reference { reference, .. } => out.push(reference),
            ASTNodeType::UnaryOp { expr, .. } => expr.collect_references(out),
            ASTNodeType::BinaryOp { left, right, .. } => {
                left.collect_references(out);
                right.collect_references(out);
            }
            ASTNodeType::Function { args, .. } => {
                for a in args {
                    a.collect_references(out);
                }
            }
            ASTNodeType::Array(rows) => {
                for a in rows.iter().flatten() {
                    a.collect_references(out);
                }
            }
            ASTNodeType::Literal(_) => {}
        }
    }
}

fn render_literal(v: &Value) -> String {
    match v {
        Value::Text(s) => format!("\"{}\"", s.replace('"', "\"\"")),
        other => other.to_string(),
    }
}

impl Display for ASTNode {
    /// Canonical formula text without the leading `=`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node_type {
            ASTNodeType::Literal(v) => f.write_str(&render_literal(v)),
            ASTNodeType::Reference { reference, .. } => write!(f, "{reference}"),
            ASTNodeType::UnaryOp { op, expr } if op == "%" => write!(f, "{expr}%"),
            ASTNodeType::UnaryOp { op, expr } => write!(f, "{op}{expr}"),
            ASTNodeType::BinaryOp { op, left, right } => write!(f, "({left}{op}{right})"),
            ASTNodeType::Function { name, args } => {
                write!(f, "{}(", name.to_ascii_uppercase())?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{a}")?;
                }
                f.write_str(")")
            }
            ASTNodeType::Array(rows) => {
                f.write_str("{")?;
                for (r, row) in rows.iter().enumerate() {
                    if r > 0 {
                        f.write_str(";")?;
                    }
                    for (c, a) in row.iter().enumerate() {
                        if c > 0 {
                            f.write_str(",")?;
                        }
                        write!(f, "{a}")?;
                    }
                }
                f.write_str("}")
            }
        }
    }
}

/// Precedence-climbing parser over the tokenizer's output.
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens: tokens
                .into_iter()
                .filter(|t| t.token_type != TokenType::Whitespace)
                .collect(),
            position: 0,
        }
    }

    pub fn parse(&mut self) -> Result<ASTNode, ParserError> {
        if self.tokens.is_empty() {
            return Err(ParserError {
                message: "No tokens to parse".to_string(),
                position: None,
            });
        }

        let ast = self.parse_expression()?;
        if let Some(tok) = self.tokens.get(self.position) {
            return Err(ParserError {
                message: format!("Unexpected token {}", tok.value),
                position: Some(tok.start),
            });
        }
        Ok(ast)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn peek_is(&self, ty: TokenType, sub: TokenSubType) -> bool {
        self.peek()
            .map(|t| t.token_type == ty && t.subtype == sub)
            .unwrap_or(false)
    }

    fn error_here(&self, message: impl Into<String>) -> ParserError {
        ParserError {
            message: message.into(),
            position: self.peek().map(|t| t.start),
        }
    }

    fn parse_expression(&mut self) -> Result<ASTNode, ParserError> {
        self.parse_binary_op(0)
    }

    fn parse_binary_op(&mut self, min_precedence: u8) -> Result<ASTNode, ParserError> {
        let mut left = self.parse_unary_op()?;

        while let Some(token) = self.peek() {
            if token.token_type != TokenType::OpInfix {
                break;
            }
            let (precedence, associativity) =
                token.get_precedence().unwrap_or((0, Associativity::Left));
            if precedence < min_precedence {
                break;
            }

            let op_token = token.clone();
            self.position += 1;
            let next_min = match associativity {
                Associativity::Left => precedence + 1,
                Associativity::Right => precedence,
            };
            let right = self.parse_binary_op(next_min)?;
            left = ASTNode::new(
                ASTNodeType::BinaryOp {
                    op: op_token.value.clone(),
                    left: Box::new(left),
                    right: Box::new(right),
                },
                Some(&op_token),
            );
        }

        Ok(left)
    }

    fn parse_unary_op(&mut self) -> Result<ASTNode, ParserError> {
        if let Some(token) = self.peek().filter(|t| t.token_type == TokenType::OpPrefix) {
            let op_token = token.clone();
            self.position += 1;
            let expr = self.parse_unary_op()?;
            return Ok(ASTNode::new(
                ASTNodeType::UnaryOp {
                    op: op_token.value.clone(),
                    expr: Box::new(expr),
                },
                Some(&op_token),
            ));
        }
        self.parse_postfix_op()
    }

    fn parse_postfix_op(&mut self) -> Result<ASTNode, ParserError> {
        let mut expr = self.parse_primary()?;
        while let Some(token) = self.peek().filter(|t| t.token_type == TokenType::OpPostfix) {
            let op_token = token.clone();
            self.position += 1;
            expr = ASTNode::new(
                ASTNodeType::UnaryOp {
                    op: op_token.value.clone(),
                    expr: Box::new(expr),
                },
                Some(&op_token),
            );
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<ASTNode, ParserError> {
        let Some(token) = self.peek().cloned() else {
            return Err(self.error_here("Unexpected end of formula"));
        };
        self.position += 1;

        match (token.token_type, token.subtype) {
            (TokenType::Operand, _) => self.parse_operand(token),
            (TokenType::Func, TokenSubType::Open) => self.parse_function(token),
            (TokenType::Paren, TokenSubType::Open) => {
                let expr = self.parse_expression()?;
                if !self.peek_is(TokenType::Paren, TokenSubType::Close) {
                    return Err(self.error_here("Expected closing parenthesis"));
                }
                self.position += 1;
                Ok(expr)
            }
            (TokenType::Array, TokenSubType::Open) => self.parse_array(),
            _ => Err(ParserError {
                message: format!("Unexpected token {}", token.value),
                position: Some(token.start),
            }),
        }
    }

    fn parse_operand(&mut self, token: Token) -> Result<ASTNode, ParserError> {
        let node_type = match token.subtype {
            TokenSubType::Number => {
                let n = token.value.parse::<f64>().map_err(|_| ParserError {
                    message: format!("Invalid number: {}", token.value),
                    position: Some(token.start),
                })?;
                ASTNodeType::Literal(Value::Number(n))
            }
            TokenSubType::Text => {
                let inner = token
                    .value
                    .strip_prefix('"')
                    .and_then(|s| s.strip_suffix('"'))
                    .unwrap_or(&token.value);
                ASTNodeType::Literal(Value::Text(inner.replace("\"\"", "\"")))
            }
            TokenSubType::Logical => {
                ASTNodeType::Literal(Value::Boolean(token.value.eq_ignore_ascii_case("TRUE")))
            }
            TokenSubType::Error => {
                let kind = ErrorKind::parse(&token.value).ok_or_else(|| ParserError {
                    message: format!("Unknown error literal {}", token.value),
                    position: Some(token.start),
                })?;
                ASTNodeType::Literal(Value::Error(kind))
            }
            TokenSubType::Range => {
                let reference = Reference::parse(&token.value).map_err(|e| ParserError {
                    message: e.to_string(),
                    position: Some(token.start),
                })?;
                ASTNodeType::Reference {
                    original: token.value.clone(),
                    reference,
                }
            }
            other => {
                return Err(ParserError {
                    message: format!("Unexpected operand subtype {other}"),
                    position: Some(token.start),
                });
            }
        };
        Ok(ASTNode::new(node_type, Some(&token)))
    }

    fn parse_function(&mut self, func_token: Token) -> Result<ASTNode, ParserError> {
        let name = func_token.value[..func_token.value.len() - 1].to_string();
        let args = self.parse_function_arguments()?;
        Ok(ASTNode::new(
            ASTNodeType::Function { name, args },
            Some(&func_token),
        ))
    }

    /// Arguments up to the closing parenthesis. An omitted argument
    /// (`IF(A1,,2)`) is a `Blank` literal.
    fn parse_function_arguments(&mut self) -> Result<Vec<ASTNode>, ParserError> {
        let mut args = Vec::new();
        if self.peek_is(TokenType::Func, TokenSubType::Close) {
            self.position += 1;
            return Ok(args);
        }

        loop {
            if self.peek_is(TokenType::Sep, TokenSubType::Arg)
                || self.peek_is(TokenType::Func, TokenSubType::Close)
            {
                args.push(ASTNode::literal(Value::Blank));
            } else {
                args.push(self.parse_expression()?);
            }

            if self.peek_is(TokenType::Sep, TokenSubType::Arg) {
                self.position += 1;
            } else if self.peek_is(TokenType::Func, TokenSubType::Close) {
                self.position += 1;
                return Ok(args);
            } else {
                return Err(self.error_here("Expected ',' or ')' in function arguments"));
            }
        }
    }

    fn parse_array(&mut self) -> Result<ASTNode, ParserError> {
        let mut rows = Vec::new();
        let mut row = Vec::new();
        if self.peek_is(TokenType::Array, TokenSubType::Close) {
            self.position += 1;
            return Ok(ASTNode::new(ASTNodeType::Array(rows), None));
        }

        loop {
            row.push(self.parse_expression()?);
            match self.peek() {
                Some(t) if t.token_type == TokenType::Sep && t.subtype == TokenSubType::Arg => {
                    self.position += 1;
                }
                Some(t) if t.token_type == TokenType::Sep && t.subtype == TokenSubType::Row => {
                    self.position += 1;
                    rows.push(std::mem::take(&mut row));
                }
                Some(t) if t.token_type == TokenType::Array && t.subtype == TokenSubType::Close => {
                    self.position += 1;
                    rows.push(row);
                    break;
                }
                _ => return Err(self.error_here("Expected ',', ';' or '}' in array")),
            }
        }

        let width = rows.first().map(Vec::len).unwrap_or(0);
        if rows.iter().any(|r| r.len() != width) {
            return Err(self.error_here("Array rows have different lengths"));
        }
        Ok(ASTNode::new(ASTNodeType::Array(rows), None))
    }
}

/// Tokenize and parse a formula. The leading `=` is optional.
pub fn parse(formula: &str) -> Result<ASTNode, ParserError> {
    let tokenizer = Tokenizer::new(formula)?;
    Parser::new(tokenizer.items).parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canon(formula: &str) -> String {
        parse(formula).unwrap().to_string()
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(canon("=1+2*3"), "(1+(2*3))");
        assert_eq!(canon("=2^3^2"), "((2^3)^2)");
        assert_eq!(canon("=-2^2"), "(-2^2)");
        assert_eq!(canon("=1&2=\"12\""), "((1&2)=\"12\")");
        assert_eq!(canon("=50%*2"), "(50%*2)");
    }

    #[test]
    fn functions_and_omitted_arguments() {
        let ast = parse("=IF(A1,,2)").unwrap();
        match ast.node_type {
            ASTNodeType::Function { name, args } => {
                assert_eq!(name, "IF");
                assert_eq!(args.len(), 3);
                assert_eq!(args[1].node_type, ASTNodeType::Literal(Value::Blank));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(canon("=now()"), "NOW()");
    }

    #[test]
    fn union_of_qualified_ranges() {
        let ast = parse("Sheet1!$A$1:$A$3,'Other Sheet'!B2").unwrap();
        assert!(ast.is_reference());
        let refs = ast.references();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[1].sheet(), Some("Other Sheet"));
    }

    #[test]
    fn arrays_are_rectangular() {
        assert_eq!(canon("={1,2;3,4}"), "{1,2;3,4}");
        assert!(parse("={1,2;3}").is_err());
    }

    #[test]
    fn literals() {
        assert_eq!(
            parse("=\"say \"\"hi\"\"\"").unwrap().node_type,
            ASTNodeType::Literal(Value::text("say \"hi\""))
        );
        assert_eq!(
            parse("=#DIV/0!").unwrap().node_type,
            ASTNodeType::Literal(Value::Error(ErrorKind::Div))
        );
        assert_eq!(
            parse("=true").unwrap().node_type,
            ASTNodeType::Literal(Value::Boolean(true))
        );
    }

    #[test]
    fn errors_carry_positions() {
        let err = parse("=1+").unwrap_err();
        assert!(err.message.contains("end of formula"));
        assert!(parse("=SUM(1 2)").is_err());
        assert!(parse("").is_err());
    }
}
