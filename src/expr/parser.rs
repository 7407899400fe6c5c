//! Expression syntax parser using nom
//!
//! Precedence, loosest first:
//!
//! | Level | Operators |
//! |-------|-----------|
//! | or | `\|\|`, `\|` |
//! | and | `&&`, `&` |
//! | not | `!` |
//! | comparison | `= == != < <= > >=`, `=~ !~`, `has`, `in SET[i]` |
//! | additive | `+ -` |
//! | multiplicative | `* /` |
//! | unary | `-` |
//!
//! Field syntax: `DP`, `AF[0]`, `ANN[*].GENE`, `EFF[?].IMPACT`, `LOF[0].PERC`,
//! `GEN[0].GT`, `GEN[*].AD[1]`, `GEN.GT`. Index tokens `*`/`ANY`, `?`/`ALL`,
//! `MIN`, `MAX`, or any expression.

use std::sync::Arc;

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1, multispace0, one_of},
    combinator::{cut, map, not, opt, peek, recognize, value},
    error::{Error, ErrorKind},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded, terminated},
    IResult, Parser,
};
use regex::Regex;

use crate::error::{Diagnostic, ErrorCode, SiftError, SourceSpan};
use crate::value::Value;
use crate::vcf::{EffectFormat, LofKind};

use super::ast::{BinaryOp, Expression, FieldAccessor, Function, IndexExpr, NamedSet, UnaryOp};
use super::iterator::AggregateMode;

type PResult<'a, O> = IResult<&'a str, O>;

// Error kinds reserved for conditions reported with their own message
const REGEX_ERROR: ErrorKind = ErrorKind::Verify;
const INDEX_ERROR: ErrorKind = ErrorKind::MapRes;
const FUNCTION_ERROR: ErrorKind = ErrorKind::Fail;
const ARITY_ERROR: ErrorKind = ErrorKind::Count;
const SET_INDEX_ERROR: ErrorKind = ErrorKind::Permutation;

/// Parse an expression with no sets and automatic effect layout detection
pub fn parse_expression(input: &str) -> Result<Expression, SiftError> {
    ExpressionParser::new().parse(input)
}

/// Expression parser configured with the sets for `in SET[i]`
#[derive(Debug, Clone, Default)]
pub struct ExpressionParser {
    sets: Arc<Vec<NamedSet>>,
    format: Option<EffectFormat>,
}

fn ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Field and function names; `++` is allowed inside names such as `GERP++_RS`
fn identifier(i: &str) -> PResult<'_, &str> {
    recognize(pair(
        take_while1(ident_char),
        many0(pair(tag("++"), take_while(ident_char))),
    ))
    .parse(i)
}

fn keyword<'a>(word: &'static str) -> impl Parser<&'a str, Output = &'a str, Error = Error<&'a str>> {
    terminated(tag(word), not(take_while1(ident_char)))
}

fn ws<'a, O, F>(inner: F) -> impl Parser<&'a str, Output = O, Error = Error<&'a str>>
where
    F: Parser<&'a str, Output = O, Error = Error<&'a str>>,
{
    delimited(multispace0, inner, multispace0)
}

fn number(i: &str) -> PResult<'_, Value> {
    let (rest, text) = terminated(
        recognize((
            digit1,
            opt((char('.'), digit1)),
            opt((one_of("eE"), opt(one_of("+-")), digit1)),
        )),
        not(take_while1(ident_char)),
    )
    .parse(i)?;

    let value = if text.contains(['.', 'e', 'E']) {
        text.parse::<f64>()
            .map(Value::Real)
            .map_err(|_| nom::Err::Error(Error::new(i, ErrorKind::Float)))?
    } else {
        // Integers too large for i64 become reals
        text.parse::<i64>()
            .map(Value::Integer)
            .or_else(|_| text.parse::<f64>().map(Value::Real))
            .map_err(|_| nom::Err::Error(Error::new(i, ErrorKind::Digit)))?
    };
    Ok((rest, value))
}

/// Single or double quoted text; `\` escapes the quote and itself, other
/// escapes are kept for regular expressions
fn string_literal(i: &str) -> PResult<'_, String> {
    let (rest, quote) = one_of("'\"").parse(i)?;
    let mut out = String::new();
    let mut chars = rest.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some(&(_, next)) if next == quote || next == '\\' => {
                    out.push(next);
                    chars.next();
                }
                _ => out.push(c),
            }
        } else if c == quote {
            return Ok((&rest[idx + c.len_utf8()..], out));
        } else {
            out.push(c);
        }
    }

    // Unterminated
    Err(nom::Err::Failure(Error::new(&rest[rest.len()..], ErrorKind::Char)))
}

impl ExpressionParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets addressed by `in SET[i]`, in index order
    pub fn with_sets(mut self, sets: Vec<NamedSet>) -> Self {
        self.sets = Arc::new(sets);
        self
    }

    /// Pin the effect list layout for `ANN[...]`/`EFF[...]` accessors
    pub fn with_format(mut self, format: Option<EffectFormat>) -> Self {
        self.format = format;
        self
    }

    /// Parse a complete expression
    pub fn parse(&self, input: &str) -> Result<Expression, SiftError> {
        if input.trim().is_empty() {
            return Err(SiftError::parse_with_diagnostic(
                0,
                "empty expression",
                Diagnostic::new()
                    .with_code(ErrorCode::UnexpectedEnd)
                    .with_source(input),
            ));
        }

        match self.or_expr(input) {
            Ok((rest, expr)) => {
                let rest = rest.trim_start();
                if rest.is_empty() {
                    Ok(expr)
                } else {
                    let pos = input.len() - rest.len();
                    Err(SiftError::parse_with_diagnostic(
                        pos,
                        format!("Unexpected trailing characters: '{}'", rest),
                        Diagnostic::new()
                            .with_code(ErrorCode::UnexpectedChar)
                            .with_span(SourceSpan::new(pos, input.len()))
                            .with_source(input),
                    ))
                }
            }
            Err(err) => Err(to_sift_error(input, err)),
        }
    }

    fn or_expr<'a>(&self, i: &'a str) -> PResult<'a, Expression> {
        let (i, first) = self.and_expr(i)?;
        let (i, rest) = many0(preceded(
            ws(alt((tag("||"), tag("|")))),
            cut(|x| self.and_expr(x)),
        ))
        .parse(i)?;
        Ok((
            i,
            rest.into_iter()
                .fold(first, |l, r| Expression::binary(BinaryOp::Or, l, r)),
        ))
    }

    fn and_expr<'a>(&self, i: &'a str) -> PResult<'a, Expression> {
        let (i, first) = self.not_expr(i)?;
        let (i, rest) = many0(preceded(
            ws(alt((tag("&&"), tag("&")))),
            cut(|x| self.not_expr(x)),
        ))
        .parse(i)?;
        Ok((
            i,
            rest.into_iter()
                .fold(first, |l, r| Expression::binary(BinaryOp::And, l, r)),
        ))
    }

    fn not_expr<'a>(&self, i: &'a str) -> PResult<'a, Expression> {
        let (i, _) = multispace0(i)?;
        if let Ok((rest, _)) = char::<_, Error<&str>>('!').parse(i) {
            let (rest, operand) = cut(|x| self.not_expr(x)).parse(rest)?;
            return Ok((rest, Expression::unary(UnaryOp::Not, operand)));
        }
        self.comparison(i)
    }

    fn comparison<'a>(&self, i: &'a str) -> PResult<'a, Expression> {
        let (i, left) = self.additive(i)?;
        let (i, _) = multispace0(i)?;

        if let Ok((rest, op)) = alt((tag::<_, _, Error<&str>>("=~"), tag("!~"))).parse(i) {
            let (rest, _) = multispace0(rest)?;
            let (after, pattern) = cut(string_literal).parse(rest)?;
            let regex = Regex::new(&pattern)
                .map_err(|_| nom::Err::Failure(Error::new(rest, REGEX_ERROR)))?;
            return Ok((
                after,
                Expression::Match {
                    operand: Box::new(left),
                    regex,
                    negate: op == "!~",
                },
            ));
        }

        if let Ok((rest, _)) = keyword("in").parse(i) {
            let (start, _) = cut(pair(ws(tag("SET")), char('['))).parse(rest)?;
            let (rest, set_index) = cut(|x| self.or_expr(x)).parse(start)?;
            // Sets are chosen once per evaluation
            if set_index.has_iterable() {
                return Err(nom::Err::Failure(Error::new(start, SET_INDEX_ERROR)));
            }
            let (rest, _) = cut(ws(char(']'))).parse(rest)?;
            return Ok((
                rest,
                Expression::In {
                    operand: Box::new(left),
                    set_index: Box::new(set_index),
                    sets: Arc::clone(&self.sets),
                },
            ));
        }

        if let Ok((rest, _)) = keyword("has").parse(i) {
            let (rest, right) = cut(|x| self.additive(x)).parse(rest)?;
            return Ok((rest, Expression::binary(BinaryOp::Has, left, right)));
        }

        let relop = alt((
            value(BinaryOp::Eq, tag("==")),
            value(BinaryOp::Ne, tag("!=")),
            value(BinaryOp::Le, tag("<=")),
            value(BinaryOp::Ge, tag(">=")),
            value(BinaryOp::Eq, tag("=")),
            value(BinaryOp::Lt, tag("<")),
            value(BinaryOp::Gt, tag(">")),
        ));
        match pair(relop, cut(|x| self.additive(x))).parse(i) {
            Ok((rest, (op, right))) => Ok((rest, Expression::binary(op, left, right))),
            Err(nom::Err::Error(_)) => Ok((i, left)),
            Err(e) => Err(e),
        }
    }

    fn additive<'a>(&self, i: &'a str) -> PResult<'a, Expression> {
        let (i, first) = self.term(i)?;
        let (i, rest) = many0(pair(
            ws(alt((
                value(BinaryOp::Add, char('+')),
                value(BinaryOp::Sub, char('-')),
            ))),
            cut(|x| self.term(x)),
        ))
        .parse(i)?;
        Ok((
            i,
            rest.into_iter()
                .fold(first, |l, (op, r)| Expression::binary(op, l, r)),
        ))
    }

    fn term<'a>(&self, i: &'a str) -> PResult<'a, Expression> {
        let (i, first) = self.unary(i)?;
        let (i, rest) = many0(pair(
            ws(alt((
                value(BinaryOp::Mul, char('*')),
                value(BinaryOp::Div, char('/')),
            ))),
            cut(|x| self.unary(x)),
        ))
        .parse(i)?;
        Ok((
            i,
            rest.into_iter()
                .fold(first, |l, (op, r)| Expression::binary(op, l, r)),
        ))
    }

    fn unary<'a>(&self, i: &'a str) -> PResult<'a, Expression> {
        let (i, _) = multispace0(i)?;
        if let Ok((rest, _)) = char::<_, Error<&str>>('-').parse(i) {
            let (rest, operand) = cut(|x| self.unary(x)).parse(rest)?;
            let expr = match operand {
                Expression::Literal(v @ (Value::Integer(_) | Value::Real(_))) => {
                    Expression::Literal(v.neg())
                }
                other => Expression::unary(UnaryOp::Neg, other),
            };
            return Ok((rest, expr));
        }
        self.primary(i)
    }

    fn primary<'a>(&self, i: &'a str) -> PResult<'a, Expression> {
        let (i, _) = multispace0(i)?;
        alt((
            delimited(char('('), |x| self.or_expr(x), cut(ws(char(')')))),
            map(string_literal, |s| Expression::Literal(Value::String(s))),
            map(number, Expression::Literal),
            |x| self.field_or_call(x),
        ))
        .parse(i)
    }

    fn field_or_call<'a>(&self, start: &'a str) -> PResult<'a, Expression> {
        let (i, name) = identifier(start)?;

        if let Ok((rest, _)) = char::<_, Error<&str>>('(').parse(i) {
            return self.call(name, start, rest);
        }

        let bracket = peek(char::<_, Error<&str>>('[')).parse(i).is_ok();
        let accessor = match (name, bracket) {
            ("true", false) => return Ok((i, Expression::literal(true))),
            ("false", false) => return Ok((i, Expression::literal(false))),
            ("ANN" | "EFF", true) => {
                let (i, index) = self.index(i)?;
                let (i, sub) = opt(preceded(char('.'), identifier)).parse(i)?;
                let accessor = FieldAccessor::Effect {
                    name: sub.map(str::to_string),
                    index,
                    format: self.format,
                };
                return Ok((i, Expression::field(accessor)));
            }
            ("LOF" | "NMD", true) => {
                let kind = if name == "LOF" { LofKind::Lof } else { LofKind::Nmd };
                let (i, index) = self.index(i)?;
                let (i, sub) = opt(preceded(char('.'), identifier)).parse(i)?;
                let accessor = FieldAccessor::Lof {
                    kind,
                    name: sub.map(str::to_string),
                    index,
                };
                return Ok((i, Expression::field(accessor)));
            }
            ("GEN", _) => {
                let (i, sample) = if bracket {
                    map(|x| self.index(x), Some).parse(i)?
                } else {
                    (i, None)
                };
                let (i, tag_name) = opt(preceded(char('.'), identifier)).parse(i)?;
                let (i, sub) = match tag_name {
                    Some(_) => opt(|x| self.index(x)).parse(i)?,
                    None => (i, None),
                };
                let name = tag_name.unwrap_or("GT").to_string();
                let accessor = match sample {
                    Some(sample) => FieldAccessor::Genotype { sample, name, sub },
                    None => FieldAccessor::Sample { name, sub },
                };
                return Ok((i, Expression::field(accessor)));
            }
            (_, true) => {
                let (i, index) = self.index(i)?;
                return Ok((
                    i,
                    Expression::field(FieldAccessor::InfoSub {
                        name: name.to_string(),
                        index,
                    }),
                ));
            }
            (_, false) => FieldAccessor::Info {
                name: name.to_string(),
            },
        };
        Ok((i, Expression::field(accessor)))
    }

    fn call<'a>(&self, name: &str, start: &'a str, i: &'a str) -> PResult<'a, Expression> {
        let Some(function) = Function::from_name(name) else {
            return Err(nom::Err::Failure(Error::new(start, FUNCTION_ERROR)));
        };
        let (i, args) = separated_list0(ws(char(',')), |x| self.or_expr(x)).parse(i)?;
        let (i, _) = cut(ws(char(')'))).parse(i)?;
        if args.len() != function.arity() {
            return Err(nom::Err::Failure(Error::new(start, ARITY_ERROR)));
        }
        Ok((i, Expression::Call { function, args }))
    }

    /// `[ index ]`
    fn index<'a>(&self, i: &'a str) -> PResult<'a, IndexExpr> {
        let (i, _) = char('[').parse(i)?;
        let aggregate = alt((
            value(AggregateMode::Any, alt((tag("*"), keyword("ANY")))),
            value(AggregateMode::All, alt((tag("?"), keyword("ALL")))),
            value(AggregateMode::Min, keyword("MIN")),
            value(AggregateMode::Max, keyword("MAX")),
        ));
        let (i, index) = cut(alt((
            map(terminated(ws(aggregate), peek(char(']'))), IndexExpr::Aggregate),
            map(|x| self.or_expr(x), |e| IndexExpr::Expr(Box::new(e))),
        )))
        .parse(i)
        .map_err(|e| e.map(|inner| Error::new(inner.input, INDEX_ERROR)))?;
        let (i, _) = cut(ws(char(']'))).parse(i)?;
        Ok((i, index))
    }
}

fn to_sift_error(input: &str, err: nom::Err<Error<&str>>) -> SiftError {
    let (remaining, kind) = match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => (e.input, e.code),
        nom::Err::Incomplete(_) => ("", ErrorKind::Eof),
    };
    let pos = input.len() - remaining.len();
    let token: String = remaining
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .chars()
        .take(20)
        .collect();

    let (code, msg, hint) = match kind {
        REGEX_ERROR => (
            ErrorCode::InvalidRegex,
            "invalid regular expression".to_string(),
            Some("check the pattern syntax of the regex crate"),
        ),
        FUNCTION_ERROR => (
            ErrorCode::UnexpectedChar,
            format!("unknown function '{}'", token.split('(').next().unwrap_or_default()),
            Some("known functions: exists, na, isHom, isHet, isVariant, isRef, countHom, countHet, countVariant, countRef"),
        ),
        ARITY_ERROR => (
            ErrorCode::UnexpectedChar,
            format!("wrong number of arguments for '{}'", token.split('(').next().unwrap_or_default()),
            None,
        ),
        SET_INDEX_ERROR => (
            ErrorCode::InvalidIndex,
            "set index must be a concrete value".to_string(),
            Some("ANY and ALL indices cannot select a set"),
        ),
        INDEX_ERROR => (
            ErrorCode::InvalidIndex,
            "invalid index".to_string(),
            Some("use a number, an expression, '*', '?', ANY, ALL, MIN or MAX"),
        ),
        _ if remaining.trim().is_empty() => (
            ErrorCode::UnexpectedEnd,
            "unexpected end of expression".to_string(),
            None,
        ),
        _ => (
            ErrorCode::UnexpectedChar,
            format!("unexpected input '{}'", token),
            None,
        ),
    };

    let mut diagnostic = Diagnostic::new()
        .with_code(code)
        .with_span(SourceSpan::point(pos))
        .with_source(input);
    if let Some(hint) = hint {
        diagnostic = diagnostic.with_hint(hint);
    }
    SiftError::parse_with_diagnostic(pos, msg, diagnostic)
}
