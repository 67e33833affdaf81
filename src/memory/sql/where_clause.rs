//! `WHERE` clause tokenizer and parser.
//!
//! `AND` and `OR` fold left to right with equal precedence, so
//! `a OR b AND c` reads as `(a OR b) AND c`. Statements rendered by the
//! relational compiler parenthesize every operand, which makes the fold
//! unambiguous for them.

use crate::error::{DbResult, SyntaxError};
use crate::memory::eval;
use crate::statement::{CompareOp, Operand, Predicate};
use crate::value::Value;

use super::values::{parse_value, unquote};
use super::Placeholders;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Word(String),
    /// Quoted text, already unescaped.
    Quoted(String),
    LParen,
    RParen,
    Comma,
    Op(String),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Self::Word(w) => w.clone(),
            Self::Quoted(q) => format!("'{q}'"),
            Self::LParen => "(".to_string(),
            Self::RParen => ")".to_string(),
            Self::Comma => ",".to_string(),
            Self::Op(op) => op.clone(),
        }
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Self::Word(w) if w.eq_ignore_ascii_case(keyword))
    }
}

const OPERATOR_CHARS: &[char] = &['=', '<', '>', '!'];

pub(crate) fn tokenize(input: &str) -> DbResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        match ch {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '\'' | '"' | '`' => {
                let start = i;
                i += 1;
                let mut closed = false;
                while i < chars.len() {
                    if chars[i] == '\\' {
                        i += 2;
                        continue;
                    }
                    if chars[i] == ch {
                        if chars.get(i + 1) == Some(&ch) {
                            i += 2;
                            continue;
                        }
                        closed = true;
                        i += 1;
                        break;
                    }
                    i += 1;
                }
                if !closed {
                    return Err(SyntaxError::UnterminatedString {
                        input: input.to_string(),
                    }
                    .into());
                }
                let raw: String = chars[start..i].iter().collect();
                tokens.push(Token::Quoted(unquote(&raw).unwrap_or_default()));
            }
            c if OPERATOR_CHARS.contains(&c) => {
                let start = i;
                while i < chars.len() && OPERATOR_CHARS.contains(&chars[i]) {
                    i += 1;
                }
                tokens.push(Token::Op(chars[start..i].iter().collect()));
            }
            _ => {
                let start = i;
                while i < chars.len()
                    && !chars[i].is_whitespace()
                    && !matches!(chars[i], '(' | ')' | ',' | '\'' | '"' | '`')
                    && !OPERATOR_CHARS.contains(&chars[i])
                {
                    i += 1;
                }
                tokens.push(Token::Word(chars[start..i].iter().collect()));
            }
        }
    }
    Ok(tokens)
}

/// Parses `input` into a predicate. `?` placeholders are numbered by
/// `placeholders`, continuing from any consumed earlier in the statement.
pub(crate) fn parse(input: &str, placeholders: &mut Placeholders) -> DbResult<Predicate> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        input,
        tokens,
        pos: 0,
        placeholders,
    };
    let predicate = parser.expression()?;
    match parser.peek() {
        None => Ok(predicate),
        Some(Token::RParen) => Err(SyntaxError::UnbalancedParentheses {
            input: input.to_string(),
        }
        .into()),
        Some(token) => Err(parser.unexpected(token.clone())),
    }
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    placeholders: &'a mut Placeholders,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn next(&mut self, expected: &'static str) -> DbResult<Token> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(SyntaxError::UnexpectedEnd { expected })?;
        self.pos += 1;
        Ok(token)
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek().is_some_and(|t| t.is_keyword(keyword)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &'static str) -> DbResult<()> {
        let token = self.next(keyword)?;
        if token.is_keyword(keyword) {
            Ok(())
        } else {
            Err(self.unexpected(token))
        }
    }

    fn unexpected(&self, token: Token) -> crate::error::DbError {
        SyntaxError::UnexpectedToken {
            token: token.describe(),
            position: self.pos,
        }
        .into()
    }

    fn expression(&mut self) -> DbResult<Predicate> {
        let mut acc = self.term()?;
        loop {
            let conjunction = if self.eat_keyword("AND") {
                true
            } else if self.eat_keyword("OR") {
                false
            } else {
                return Ok(acc);
            };
            let rhs = self.term()?;
            acc = match (acc, conjunction) {
                (Predicate::And(mut parts), true) => {
                    parts.push(rhs);
                    Predicate::And(parts)
                }
                (Predicate::Or(mut parts), false) => {
                    parts.push(rhs);
                    Predicate::Or(parts)
                }
                (lhs, true) => Predicate::And(vec![lhs, rhs]),
                (lhs, false) => Predicate::Or(vec![lhs, rhs]),
            };
        }
    }

    fn term(&mut self) -> DbResult<Predicate> {
        if self.peek().is_some_and(|t| t.is_keyword("NOT")) {
            self.pos += 1;
            return Ok(Predicate::Not(Box::new(self.term()?)));
        }
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let inner = self.expression()?;
            return match self.next(")") {
                Ok(Token::RParen) => Ok(inner),
                _ => Err(SyntaxError::UnbalancedParentheses {
                    input: self.input.to_string(),
                }
                .into()),
            };
        }
        self.comparison()
    }

    fn comparison(&mut self) -> DbResult<Predicate> {
        let (column, left_literal) = match self.next("column")? {
            Token::Word(word) => {
                let literal = match parse_value(&word) {
                    Some(v @ (Value::Int(_) | Value::Float(_))) => Some(v),
                    _ => None,
                };
                (word, literal)
            }
            Token::Quoted(name) => (name, None),
            other => return Err(self.unexpected(other)),
        };

        let negated = self.eat_keyword("NOT");
        let token = self.next("operator")?;
        let predicate = match token {
            Token::Op(symbol) if !negated => {
                let op = CompareOp::from_symbol(&symbol)
                    .ok_or(SyntaxError::UnknownOperator { operator: symbol })?;
                let value = self.operand()?;
                if let (Some(left), Operand::Literal(right)) = (&left_literal, &value) {
                    return Ok(Predicate::Literal(eval::compare(op, left, right, false)?));
                }
                Predicate::compare(column, op, value)
            }
            Token::Word(word) if word.eq_ignore_ascii_case("IS") && !negated => {
                let negated = self.eat_keyword("NOT");
                self.expect_keyword("NULL")?;
                Predicate::IsNull { column, negated }
            }
            Token::Word(word) if word.eq_ignore_ascii_case("LIKE") => {
                let op = if negated { CompareOp::NotLike } else { CompareOp::Like };
                Predicate::compare(column, op, self.operand()?)
            }
            Token::Word(word) if word.eq_ignore_ascii_case("IN") => {
                let op = if negated { CompareOp::NotIn } else { CompareOp::In };
                Predicate::compare(column, op, self.list()?)
            }
            Token::Word(word) if word.eq_ignore_ascii_case("BETWEEN") => {
                let low = self.operand()?;
                self.expect_keyword("AND")?;
                let high = self.operand()?;
                Predicate::Between {
                    column,
                    low,
                    high,
                    negated,
                }
            }
            Token::Word(word) => return Err(SyntaxError::UnknownOperator { operator: word }.into()),
            other => return Err(self.unexpected(other)),
        };
        Ok(predicate)
    }

    fn operand(&mut self) -> DbResult<Operand> {
        match self.next("value")? {
            Token::Word(word) => Ok(match parse_value(&word) {
                None => Operand::Param(self.placeholders.next()),
                Some(value) => Operand::Literal(value),
            }),
            Token::Quoted(text) => Ok(Operand::Literal(Value::Text(text))),
            other => Err(self.unexpected(other)),
        }
    }

    fn list(&mut self) -> DbResult<Operand> {
        match self.next("(")? {
            Token::LParen => {}
            other => return Err(self.unexpected(other)),
        }
        let mut items = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
            return Ok(Operand::List(items));
        }
        loop {
            items.push(self.operand()?);
            match self.next(")")? {
                Token::Comma => {}
                Token::RParen => return Ok(Operand::List(items)),
                other => return Err(self.unexpected(other)),
            }
        }
    }
}
