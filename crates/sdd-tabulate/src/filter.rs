//! Row filter expressions for table specifications.
//!
//! Grammar:
//!
//! ```text
//! expr    := and ( ("|" | "||" | "or") and )*
//! and     := unary ( ("&" | "&&" | "and") unary )*
//! unary   := ("!" | "not") unary | primary
//! primary := "(" expr ")" | column op number | column "in" "[" number ("," number)* "]"
//! op      := "==" | "!=" | "<" | "<=" | ">" | ">="
//! ```
//!
//! Column names are matched case-insensitively (record columns are lowercased
//! on read). Expressions compile to polars lazy expressions.

use std::fmt;

use anyhow::{Context, Result};
use polars::prelude::*;

use sdd_ingest::RecordSet;
use sdd_model::SddError;

/// Placeholder replaced by the question name in multi-question tables.
pub const QUESTION_PLACEHOLDER: &str = "{question}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOp {
    fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
        }
    }
}

/// Parsed filter.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    Compare {
        column: String,
        op: CompareOp,
        value: f64,
    },
    In {
        column: String,
        values: Vec<f64>,
    },
    Not(Box<FilterExpr>),
    And(Box<FilterExpr>, Box<FilterExpr>),
    Or(Box<FilterExpr>, Box<FilterExpr>),
}

impl FilterExpr {
    /// Parses `text`, reporting failures against `table`.
    pub fn parse(table: &str, text: &str) -> std::result::Result<Self, SddError> {
        let fail = |message: String| SddError::FilterParse {
            table: table.to_string(),
            filter: text.to_string(),
            message,
        };
        let tokens = tokenize(text).map_err(fail)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.expr().map_err(fail)?;
        if let Some(token) = parser.peek() {
            return Err(fail(format!("unexpected `{token}` after expression")));
        }
        Ok(expr)
    }

    /// Columns referenced by the expression, in order of appearance.
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Compare { column, .. } | Self::In { column, .. } => {
                if !out.contains(&column.as_str()) {
                    out.push(column);
                }
            }
            Self::Not(inner) => inner.collect_columns(out),
            Self::And(left, right) | Self::Or(left, right) => {
                left.collect_columns(out);
                right.collect_columns(out);
            }
        }
    }

    pub fn to_expr(&self) -> Expr {
        match self {
            Self::Compare { column, op, value } => {
                let column = col(column.as_str());
                let value = lit(*value);
                match op {
                    CompareOp::Eq => column.eq(value),
                    CompareOp::NotEq => column.neq(value),
                    CompareOp::Lt => column.lt(value),
                    CompareOp::LtEq => column.lt_eq(value),
                    CompareOp::Gt => column.gt(value),
                    CompareOp::GtEq => column.gt_eq(value),
                }
            }
            Self::In { column, values } => values
                .iter()
                .map(|value| col(column.as_str()).eq(lit(*value)))
                .reduce(|any, next| any.or(next))
                .unwrap_or_else(|| lit(false)),
            Self::Not(inner) => inner.to_expr().not(),
            Self::And(left, right) => left.to_expr().and(right.to_expr()),
            Self::Or(left, right) => left.to_expr().or(right.to_expr()),
        }
    }
}

impl fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compare { column, op, value } => write!(f, "{column} {} {value}", op.symbol()),
            Self::In { column, values } => {
                let values: Vec<String> = values.iter().map(f64::to_string).collect();
                write!(f, "{column} in [{}]", values.join(", "))
            }
            Self::Not(inner) => write!(f, "!({inner})"),
            Self::And(left, right) => write!(f, "({left} & {right})"),
            Self::Or(left, right) => write!(f, "({left} | {right})"),
        }
    }
}

/// Substitutes the question placeholder.
pub fn render_filter(filter: &str, question: &str) -> String {
    filter.replace(QUESTION_PLACEHOLDER, question)
}

/// Parses `filter`, checks its columns exist and returns the matching rows.
pub fn apply_filter(record_set: &RecordSet, table: &str, filter: &str) -> Result<RecordSet> {
    let expr = FilterExpr::parse(table, filter)?;
    for column in expr.columns() {
        if !record_set.has_column(column) {
            return Err(SddError::UnknownColumn {
                table: table.to_string(),
                column: column.to_string(),
            }
            .into());
        }
    }
    let data = record_set
        .data
        .clone()
        .lazy()
        .filter(expr.to_expr())
        .collect()
        .with_context(|| format!("apply filter `{filter}` for table `{table}`"))?;
    Ok(record_set.with_data(data))
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Op(CompareOp),
    And,
    Or,
    Not,
    In,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(name) => write!(f, "{name}"),
            Self::Number(value) => write!(f, "{value}"),
            Self::Op(op) => write!(f, "{}", op.symbol()),
            Self::And => write!(f, "&"),
            Self::Or => write!(f, "|"),
            Self::Not => write!(f, "!"),
            Self::In => write!(f, "in"),
            Self::LParen => write!(f, "("),
            Self::RParen => write!(f, ")"),
            Self::LBracket => write!(f, "["),
            Self::RBracket => write!(f, "]"),
            Self::Comma => write!(f, ","),
        }
    }
}

fn tokenize(text: &str) -> std::result::Result<Vec<Token>, String> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '(' => tokens.push(Token::LParen),
            ')' => tokens.push(Token::RParen),
            '[' => tokens.push(Token::LBracket),
            ']' => tokens.push(Token::RBracket),
            ',' => tokens.push(Token::Comma),
            '&' => {
                if next == Some('&') {
                    i += 1;
                }
                tokens.push(Token::And);
            }
            '|' => {
                if next == Some('|') {
                    i += 1;
                }
                tokens.push(Token::Or);
            }
            '=' if next == Some('=') => {
                i += 1;
                tokens.push(Token::Op(CompareOp::Eq));
            }
            '!' if next == Some('=') => {
                i += 1;
                tokens.push(Token::Op(CompareOp::NotEq));
            }
            '!' => tokens.push(Token::Not),
            '<' | '>' => {
                let or_equal = next == Some('=');
                if or_equal {
                    i += 1;
                }
                tokens.push(Token::Op(match (c, or_equal) {
                    ('<', false) => CompareOp::Lt,
                    ('<', true) => CompareOp::LtEq,
                    ('>', false) => CompareOp::Gt,
                    _ => CompareOp::GtEq,
                }));
            }
            c if c.is_ascii_digit() || c == '-' || c == '.' => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number `{literal}`"))?;
                tokens.push(Token::Number(value));
                continue;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect::<String>().to_lowercase();
                tokens.push(match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "in" => Token::In,
                    _ => Token::Ident(word),
                });
                continue;
            }
            other => return Err(format!("unexpected character `{other}`")),
        }
        i += 1;
    }
    if tokens.is_empty() {
        return Err("empty filter".to_string());
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> std::result::Result<(), String> {
        match self.next() {
            Some(found) if &found == token => Ok(()),
            Some(found) => Err(format!("expected `{token}`, found `{found}`")),
            None => Err(format!("expected `{token}`, found end of filter")),
        }
    }

    fn expr(&mut self) -> std::result::Result<FilterExpr, String> {
        let mut left = self.and()?;
        while self.eat(&Token::Or) {
            let right = self.and()?;
            left = FilterExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> std::result::Result<FilterExpr, String> {
        let mut left = self.unary()?;
        while self.eat(&Token::And) {
            let right = self.unary()?;
            left = FilterExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> std::result::Result<FilterExpr, String> {
        if self.eat(&Token::Not) {
            return Ok(FilterExpr::Not(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> std::result::Result<FilterExpr, String> {
        match self.next() {
            Some(Token::LParen) => {
                let inner = self.expr()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(column)) => match self.next() {
                Some(Token::Op(op)) => {
                    let value = self.number()?;
                    Ok(FilterExpr::Compare { column, op, value })
                }
                Some(Token::In) => {
                    self.expect(&Token::LBracket)?;
                    let mut values = vec![self.number()?];
                    while self.eat(&Token::Comma) {
                        values.push(self.number()?);
                    }
                    self.expect(&Token::RBracket)?;
                    Ok(FilterExpr::In { column, values })
                }
                Some(other) => Err(format!("expected comparison after `{column}`, found `{other}`")),
                None => Err(format!("expected comparison after `{column}`")),
            },
            Some(other) => Err(format!("unexpected `{other}`")),
            None => Err("unexpected end of filter".to_string()),
        }
    }

    fn number(&mut self) -> std::result::Result<f64, String> {
        match self.next() {
            Some(Token::Number(value)) => Ok(value),
            Some(other) => Err(format!("expected a number, found `{other}`")),
            None => Err("expected a number, found end of filter".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> FilterExpr {
        FilterExpr::parse("t", text).expect("parse")
    }

    #[test]
    fn precedence_and_binds_tighter() {
        let expr = parse("sex == 1 | age1315 >= 14 & dcgstg3 != -9");
        assert_eq!(
            expr.to_string(),
            "(sex == 1 | (age1315 >= 14 & dcgstg3 != -9))"
        );
        assert_eq!(expr.columns(), vec!["sex", "age1315", "dcgstg3"]);
    }

    #[test]
    fn keywords_membership_and_negation() {
        let expr = parse("not (Sex in [1, 2]) or dalevr == 1");
        assert_eq!(expr.to_string(), "(!(sex in [1, 2]) | dalevr == 1)");
    }

    #[test]
    fn parse_errors_are_configuration_errors() {
        for text in ["", "sex ==", "sex = 1", "(sex == 1", "sex == 1 extra", "sex in [1,", "1 == sex"] {
            let error = FilterExpr::parse("t", text).unwrap_err();
            assert!(matches!(error, SddError::FilterParse { .. }), "{text}");
            assert!(!error.is_structural());
        }
    }

    #[test]
    fn placeholder_is_substituted() {
        assert_eq!(render_filter("{question} != 0 & sex == 1", "dlsalc"), "dlsalc != 0 & sex == 1");
    }

    #[test]
    fn applies_to_record_set() {
        let data = DataFrame::new(vec![
            Series::new("sex".into(), vec![1.0, 2.0, 1.0, 2.0]).into(),
            Series::new("age".into(), vec![11.0, 12.0, 15.0, 13.0]).into(),
        ])
        .unwrap();
        let set = RecordSet::from_frame(data);
        let filtered = apply_filter(&set, "t", "sex == 2 | age > 14").unwrap();
        assert_eq!(filtered.height(), 3);
        let error = apply_filter(&set, "t", "region == 1").unwrap_err();
        assert!(matches!(
            error.downcast_ref::<SddError>(),
            Some(SddError::UnknownColumn { column, .. }) if column == "region"
        ));
    }
}
