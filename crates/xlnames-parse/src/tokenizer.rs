use std::convert::TryFrom;
use std::error::Error;
use std::fmt::{self, Display};

use smallvec::SmallVec;
use xlnames_common::ERROR_LITERALS;

const TOKEN_ENDERS: &str = ",;}) +-*/^&=><%\t\r\n";

const fn build_token_enders() -> [bool; 256] {
    let mut tbl = [false; 256];
    let bytes = TOKEN_ENDERS.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        tbl[bytes[i] as usize] = true;
        i += 1;
    }
    tbl
}
static TOKEN_ENDERS_TABLE: [bool; 256] = build_token_enders();

#[inline(always)]
fn is_token_ender(c: u8) -> bool {
    TOKEN_ENDERS_TABLE[c as usize]
}

#[inline(always)]
fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n')
}

/// Operator associativity.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Associativity {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizerError {
    pub message: String,
    pub pos: usize,
}

impl fmt::Display for TokenizerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenizerError at {}: {}", self.pos, self.message)
    }
}

impl Error for TokenizerError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    Operand,
    Func,
    Array,
    Paren,
    Sep,
    OpPrefix,
    OpInfix,
    OpPostfix,
    Whitespace,
}

impl Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenSubType {
    None,
    Text,
    Number,
    Logical,
    Error,
    /// Anything that is neither a literal nor punctuation: cell, range,
    /// row/column band, table or defined-name reference.
    Range,
    Open,
    Close,
    Arg,
    Row,
}

impl Display for TokenSubType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A token together with its byte span in the source formula.
///
/// `start..end` always indexes the string handed to [`Tokenizer::new`],
/// including a leading `=` when one was present.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    pub value: String,
    pub token_type: TokenType,
    pub subtype: TokenSubType,
    pub start: usize,
    pub end: usize,
}

impl Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{} subtype: {:?} value: {}>",
            self.token_type, self.subtype, self.value
        )
    }
}

fn classify_operand(text: &str) -> TokenSubType {
    let first = text.as_bytes().first().copied().unwrap_or(b' ');
    if first == b'"' {
        TokenSubType::Text
    } else if first == b'#' || text.to_ascii_uppercase().ends_with("#REF!") {
        // `Sheet1!#REF!` is a broken reference, a bare `#N/A` is a literal.
        if first == b'#' && !text.eq_ignore_ascii_case("#REF!") {
            TokenSubType::Error
        } else {
            TokenSubType::Range
        }
    } else if text.eq_ignore_ascii_case("TRUE") || text.eq_ignore_ascii_case("FALSE") {
        TokenSubType::Logical
    } else if (first.is_ascii_digit() || first == b'.') && text.parse::<f64>().is_ok() {
        TokenSubType::Number
    } else {
        TokenSubType::Range
    }
}

impl Token {
    fn from_slice(
        source: &str,
        token_type: TokenType,
        subtype: TokenSubType,
        start: usize,
        end: usize,
    ) -> Self {
        Token {
            value: source[start..end].to_string(),
            token_type,
            subtype,
            start,
            end,
        }
    }

    fn operand(source: &str, start: usize, end: usize) -> Self {
        let subtype = classify_operand(&source[start..end]);
        Token::from_slice(source, TokenType::Operand, subtype, start, end)
    }

    pub fn is_operator(&self) -> bool {
        matches!(
            self.token_type,
            TokenType::OpPrefix | TokenType::OpInfix | TokenType::OpPostfix
        )
    }

    /// True for operands that name a cell, range, table or defined name,
    /// including the broken `#REF!` reference.
    pub fn is_reference(&self) -> bool {
        self.token_type == TokenType::Operand && self.subtype == TokenSubType::Range
    }

    pub fn get_precedence(&self) -> Option<(u8, Associativity)> {
        let op = if self.token_type == TokenType::OpPrefix {
            "u"
        } else {
            self.value.as_str()
        };

        match op {
            ":" | " " | "," => Some((8, Associativity::Left)),
            "u" => Some((7, Associativity::Right)),
            "%" => Some((6, Associativity::Left)),
            "^" => Some((5, Associativity::Left)),
            "*" | "/" => Some((4, Associativity::Left)),
            "+" | "-" => Some((3, Associativity::Left)),
            "&" => Some((2, Associativity::Left)),
            "=" | "<" | ">" | "<=" | ">=" | "<>" => Some((1, Associativity::Left)),
            _ => None,
        }
    }
}

/// Byte-level tokenizer for worksheet formulas and defined-name bodies.
///
/// A leading `=` is optional: cell formulas carry one, defined-name
/// `RefersTo` text does not.
pub struct Tokenizer {
    formula: String,
    pub items: Vec<Token>,
    opener_stack: SmallVec<[TokenType; 8]>,
    offset: usize,
    token_start: usize,
    token_end: usize,
}

impl Tokenizer {
    pub fn new(formula: &str) -> Result<Self, TokenizerError> {
        let mut tokenizer = Tokenizer {
            formula: formula.to_string(),
            items: Vec::with_capacity(formula.len() / 2),
            opener_stack: SmallVec::new(),
            offset: 0,
            token_start: 0,
            token_end: 0,
        };
        tokenizer.run()?;
        Ok(tokenizer)
    }

    pub fn formula(&self) -> &str {
        &self.formula
    }

    /// Tokens without whitespace.
    pub fn significant(&self) -> impl Iterator<Item = &Token> {
        self.items
            .iter()
            .filter(|t| t.token_type != TokenType::Whitespace)
    }

    #[inline]
    fn byte_at(&self, i: usize) -> u8 {
        self.formula.as_bytes()[i]
    }

    #[inline]
    fn has_token(&self) -> bool {
        self.token_end > self.token_start
    }

    #[inline]
    fn start_token(&mut self) {
        self.token_start = self.offset;
        self.token_end = self.offset;
    }

    fn run(&mut self) -> Result<(), TokenizerError> {
        if self.formula.as_bytes().first() == Some(&b'=') {
            self.offset = 1;
        }
        self.start_token();

        while self.offset < self.formula.len() {
            if self.consume_exponent_sign() {
                continue;
            }

            let curr = self.byte_at(self.offset);
            if is_token_ender(curr) && self.has_token() {
                self.save_token();
                self.start_token();
            }

            match curr {
                b'"' | b'\'' => self.parse_quoted()?,
                b'[' => self.parse_brackets()?,
                b'#' => self.parse_error()?,
                c if is_whitespace(c) => self.parse_whitespace(),
                b'+' | b'-' | b'*' | b'/' | b'^' | b'&' | b'=' | b'>' | b'<' | b'%' => {
                    self.parse_operator()
                }
                b'{' | b'(' => self.parse_opener(),
                b')' | b'}' => self.parse_closer()?,
                b';' | b',' => self.parse_separator(),
                _ => {
                    if !self.has_token() {
                        self.start_token();
                    }
                    self.offset += 1;
                    self.token_end = self.offset;
                }
            }
        }

        if self.has_token() {
            self.save_token();
        }

        if !self.opener_stack.is_empty() {
            return Err(TokenizerError {
                message: "Unmatched opening parenthesis or brace".to_string(),
                pos: self.offset,
            });
        }
        Ok(())
    }

    /// `1.5E` followed by `+`/`-` continues a number rather than starting
    /// an operator.
    fn consume_exponent_sign(&mut self) -> bool {
        let curr = self.byte_at(self.offset);
        if (curr == b'+' || curr == b'-') && self.has_token() && self.is_exponent_base() {
            self.offset += 1;
            self.token_end = self.offset;
            return true;
        }
        false
    }

    fn is_exponent_base(&self) -> bool {
        let slice = &self.formula.as_bytes()[self.token_start..self.token_end];
        if slice.len() < 2 || !slice[0].is_ascii_digit() {
            return false;
        }
        let (body, last) = slice.split_at(slice.len() - 1);
        if !matches!(last[0], b'E' | b'e') {
            return false;
        }
        let mut dot_seen = false;
        for &b in &body[1..] {
            match b {
                b'0'..=b'9' => {}
                b'.' if !dot_seen => dot_seen = true,
                _ => return false,
            }
        }
        true
    }

    fn save_token(&mut self) {
        if self.has_token() {
            self.items
                .push(Token::operand(&self.formula, self.token_start, self.token_end));
        }
    }

    /// Double quotes delimit a text literal. Single quotes delimit a sheet
    /// name and stay part of the surrounding reference token.
    fn parse_quoted(&mut self) -> Result<(), TokenizerError> {
        let delim = self.byte_at(self.offset);

        if delim == b'"' && self.has_token() {
            self.save_token();
            self.start_token();
        }
        if delim == b'\'' && self.has_token() {
            let last = self.byte_at(self.token_end - 1);
            if last != b':' && last != b'$' {
                self.save_token();
                self.start_token();
            }
        }

        let quote_start = self.offset;
        if !self.has_token() {
            self.token_start = quote_start;
        }
        self.offset += 1;

        while self.offset < self.formula.len() {
            if self.byte_at(self.offset) == delim {
                self.offset += 1;
                if self.offset < self.formula.len() && self.byte_at(self.offset) == delim {
                    self.offset += 1;
                    continue;
                }
                if delim == b'"' {
                    self.items.push(Token::operand(&self.formula, quote_start, self.offset));
                    self.start_token();
                } else {
                    self.token_end = self.offset;
                }
                return Ok(());
            }
            self.offset += 1;
        }

        Err(TokenizerError {
            message: "Reached end of formula inside a quoted string".to_string(),
            pos: self.offset,
        })
    }

    /// Structured-reference brackets, possibly nested: `T[[#Data],[Col]]`.
    fn parse_brackets(&mut self) -> Result<(), TokenizerError> {
        if !self.has_token() {
            self.start_token();
        }

        let mut depth = 1;
        self.offset += 1;
        while self.offset < self.formula.len() {
            match self.byte_at(self.offset) {
                b'[' => depth += 1,
                b']' => {
                    depth -= 1;
                    if depth == 0 {
                        self.offset += 1;
                        self.token_end = self.offset;
                        return Ok(());
                    }
                }
                _ => {}
            }
            self.offset += 1;
        }

        Err(TokenizerError {
            message: "Encountered unmatched '['".to_string(),
            pos: self.offset,
        })
    }

    /// Error literals. A pending `Sheet!` prefix is kept so that
    /// `Sheet1!#REF!` stays one reference token.
    fn parse_error(&mut self) -> Result<(), TokenizerError> {
        if self.has_token() && self.byte_at(self.token_end - 1) != b'!' {
            self.save_token();
            self.start_token();
        }
        let error_start = if self.has_token() {
            self.token_start
        } else {
            self.offset
        };

        let rest = &self.formula.as_bytes()[self.offset..];
        for lit in ERROR_LITERALS {
            let bytes = lit.as_bytes();
            if rest.len() >= bytes.len() && rest[..bytes.len()].eq_ignore_ascii_case(bytes) {
                let end = self.offset + bytes.len();
                self.items.push(Token::operand(&self.formula, error_start, end));
                self.offset = end;
                self.start_token();
                return Ok(());
            }
        }

        Err(TokenizerError {
            message: format!("Invalid error literal at position {}", self.offset),
            pos: self.offset,
        })
    }

    fn parse_whitespace(&mut self) {
        self.save_token();
        let ws_start = self.offset;
        while self.offset < self.formula.len() && is_whitespace(self.byte_at(self.offset)) {
            self.offset += 1;
        }
        self.items.push(Token::from_slice(
            &self.formula,
            TokenType::Whitespace,
            TokenSubType::None,
            ws_start,
            self.offset,
        ));
        self.start_token();
    }

    fn parse_operator(&mut self) {
        self.save_token();

        if self.offset + 1 < self.formula.len() {
            let pair = &self.formula.as_bytes()[self.offset..self.offset + 2];
            if pair == b">=" || pair == b"<=" || pair == b"<>" {
                self.items.push(Token::from_slice(
                    &self.formula,
                    TokenType::OpInfix,
                    TokenSubType::None,
                    self.offset,
                    self.offset + 2,
                ));
                self.offset += 2;
                self.start_token();
                return;
            }
        }

        let token_type = match self.byte_at(self.offset) {
            b'%' => TokenType::OpPostfix,
            b'+' | b'-' => {
                let prev = self
                    .items
                    .iter()
                    .rev()
                    .find(|t| t.token_type != TokenType::Whitespace);
                match prev {
                    Some(p)
                        if p.subtype == TokenSubType::Close
                            || p.token_type == TokenType::OpPostfix
                            || p.token_type == TokenType::Operand =>
                    {
                        TokenType::OpInfix
                    }
                    _ => TokenType::OpPrefix,
                }
            }
            _ => TokenType::OpInfix,
        };

        self.items.push(Token::from_slice(
            &self.formula,
            token_type,
            TokenSubType::None,
            self.offset,
            self.offset + 1,
        ));
        self.offset += 1;
        self.start_token();
    }

    fn parse_opener(&mut self) {
        let curr = self.byte_at(self.offset);
        let token = if curr == b'{' {
            self.save_token();
            Token::from_slice(
                &self.formula,
                TokenType::Array,
                TokenSubType::Open,
                self.offset,
                self.offset + 1,
            )
        } else if self.has_token() {
            Token::from_slice(
                &self.formula,
                TokenType::Func,
                TokenSubType::Open,
                self.token_start,
                self.offset + 1,
            )
        } else {
            Token::from_slice(
                &self.formula,
                TokenType::Paren,
                TokenSubType::Open,
                self.offset,
                self.offset + 1,
            )
        };

        self.opener_stack.push(token.token_type);
        self.items.push(token);
        self.offset += 1;
        self.start_token();
    }

    fn parse_closer(&mut self) -> Result<(), TokenizerError> {
        self.save_token();
        let curr = self.byte_at(self.offset);

        let Some(open) = self.opener_stack.pop() else {
            return Err(TokenizerError {
                message: format!("No matching opener for closer at position {}", self.offset),
                pos: self.offset,
            });
        };
        let brace_mismatch = (curr == b'}') != (open == TokenType::Array);
        if brace_mismatch {
            return Err(TokenizerError {
                message: "Mismatched ( and { pair".to_string(),
                pos: self.offset,
            });
        }

        self.items.push(Token::from_slice(
            &self.formula,
            open,
            TokenSubType::Close,
            self.offset,
            self.offset + 1,
        ));
        self.offset += 1;
        self.start_token();
        Ok(())
    }

    /// `,` separates arguments inside a call or array and is the union
    /// operator elsewhere. `;` separates array rows.
    fn parse_separator(&mut self) {
        self.save_token();
        let curr = self.byte_at(self.offset);

        let (token_type, subtype) = if curr == b';' {
            (TokenType::Sep, TokenSubType::Row)
        } else {
            match self.opener_stack.last() {
                Some(TokenType::Func | TokenType::Array) => (TokenType::Sep, TokenSubType::Arg),
                _ => (TokenType::OpInfix, TokenSubType::None),
            }
        };

        self.items.push(Token::from_slice(
            &self.formula,
            token_type,
            subtype,
            self.offset,
            self.offset + 1,
        ));
        self.offset += 1;
        self.start_token();
    }

    /// Reassemble the source text from the token spans.
    pub fn render(&self) -> String {
        let body: String = self.items.iter().map(|t| t.value.as_str()).collect();
        if self.formula.starts_with('=') {
            format!("={body}")
        } else {
            body
        }
    }
}

impl TryFrom<&str> for Tokenizer {
    type Error = TokenizerError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Tokenizer::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(formula: &str) -> Vec<(TokenType, TokenSubType, String)> {
        Tokenizer::new(formula)
            .unwrap()
            .items
            .into_iter()
            .map(|t| (t.token_type, t.subtype, t.value))
            .collect()
    }

    #[test]
    fn spans_index_the_original_text() {
        let f = "=SUM(Sheet1!A1:B2, 3)";
        let tok = Tokenizer::new(f).unwrap();
        for t in &tok.items {
            assert_eq!(&f[t.start..t.end], t.value);
        }
        assert_eq!(tok.render(), f);
    }

    #[test]
    fn leading_equals_is_optional() {
        let with = kinds("=Sheet1!$A$1");
        let without = kinds("Sheet1!$A$1");
        assert_eq!(with, without);
        assert_eq!(with[0].1, TokenSubType::Range);
    }

    #[test]
    fn quoted_sheet_names_stay_in_one_token() {
        let toks = kinds("'My ''Data'''!$A$1:$B$3");
        assert_eq!(toks.len(), 1);
        assert_eq!(toks[0].2, "'My ''Data'''!$A$1:$B$3");
    }

    #[test]
    fn string_literals_hide_reference_lookalikes() {
        let toks = kinds("=\"Sheet1!A1\"&A2");
        assert_eq!(toks[0].1, TokenSubType::Text);
        assert_eq!(toks[1].0, TokenType::OpInfix);
        assert_eq!(toks[2].1, TokenSubType::Range);
    }

    #[test]
    fn qualified_ref_error_is_a_reference_token() {
        let toks = kinds("Sheet1!#REF!,#REF!,#N/A");
        assert_eq!(toks[0].1, TokenSubType::Range);
        assert_eq!(toks[0].2, "Sheet1!#REF!");
        assert_eq!(toks[2].1, TokenSubType::Range);
        assert_eq!(toks[4].1, TokenSubType::Error);
    }

    #[test]
    fn comma_is_union_outside_calls() {
        let toks = kinds("Sheet1!A1,Sheet1!B2");
        assert_eq!(toks[1].0, TokenType::OpInfix);
        let toks = kinds("=SUM(A1,B2)");
        assert_eq!(toks[2].0, TokenType::Sep);
    }

    #[test]
    fn scientific_notation_keeps_sign() {
        let toks = kinds("=1.5E-3+2");
        assert_eq!(toks[0].2, "1.5E-3");
        assert_eq!(toks[0].1, TokenSubType::Number);
        assert_eq!(toks[1].0, TokenType::OpInfix);
    }

    #[test]
    fn structured_references_keep_brackets() {
        let toks = kinds("=SUM(Sales[[#Data],[Amount]])");
        assert_eq!(toks[1].2, "Sales[[#Data],[Amount]]");
    }

    #[test]
    fn unbalanced_input_is_rejected() {
        assert!(Tokenizer::new("=SUM(A1").is_err());
        assert!(Tokenizer::new("=A1)").is_err());
        assert!(Tokenizer::new("=(1}").is_err());
        assert!(Tokenizer::new("=\"open").is_err());
        assert!(Tokenizer::new("=#BAD").is_err());
    }
}
