//! REQUIRED_USE constraint checking
//!
//! Four constraint shapes are supported:
//!
//! - Exactly-one-of: `^^ ( foo bar )`
//! - At-most-one-of: `?? ( foo bar )`
//! - Any-of: `|| ( foo bar )`
//! - Use-conditional: `foo? ( ^^ ( bar baz ) )`, nesting to any depth
//!
//! Bare flags, negations and negative conditionals are outside these shapes
//! and are rejected when parsing.

use crate::use_flags::EffectiveUseSet;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// A REQUIRED_USE constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    /// Exactly one of the flags must be enabled (^^)
    ExactlyOne(Vec<String>),
    /// At most one of the flags may be enabled (??)
    AtMostOne(Vec<String>),
    /// At least one of the flags must be enabled (||)
    AnyOf(Vec<String>),
    /// If `flag` is enabled, `nested` must hold
    Conditional { flag: String, nested: Box<Constraint> },
}

impl Constraint {
    pub fn conditional(flag: impl Into<String>, nested: Constraint) -> Self {
        Constraint::Conditional {
            flag: flag.into(),
            nested: Box::new(nested),
        }
    }

    /// The violation message, or `None` when satisfied
    pub fn violation(&self, enabled: &EffectiveUseSet) -> Option<String> {
        match self {
            Constraint::ExactlyOne(flags) => {
                let count = count_enabled(flags, enabled);
                (count != 1).then(|| {
                    format!(
                        "exactly one of [{}] must be enabled, found {}",
                        flags.join(", "),
                        count
                    )
                })
            }
            Constraint::AtMostOne(flags) => {
                let on: Vec<&str> = flags
                    .iter()
                    .filter(|f| enabled.is_enabled(f))
                    .map(|f| f.as_str())
                    .collect();
                (on.len() > 1).then(|| {
                    format!(
                        "at most one of [{}] may be enabled, found [{}]",
                        flags.join(", "),
                        on.join(", ")
                    )
                })
            }
            Constraint::AnyOf(flags) => (count_enabled(flags, enabled) == 0)
                .then(|| format!("at least one of [{}] must be enabled", flags.join(", "))),
            Constraint::Conditional { flag, nested } => {
                if !enabled.is_enabled(flag) {
                    return None;
                }
                nested
                    .violation(enabled)
                    .map(|err| format!("{flag} requires: {err}"))
            }
        }
    }

    /// Every flag this constraint mentions
    pub fn flags(&self) -> Vec<&str> {
        match self {
            Constraint::ExactlyOne(flags)
            | Constraint::AtMostOne(flags)
            | Constraint::AnyOf(flags) => flags.iter().map(|f| f.as_str()).collect(),
            Constraint::Conditional { flag, nested } => {
                let mut flags = vec![flag.as_str()];
                flags.extend(nested.flags());
                flags
            }
        }
    }
}

fn count_enabled(flags: &[String], enabled: &EffectiveUseSet) -> usize {
    flags.iter().filter(|f| enabled.is_enabled(f)).count()
}

/// Result of checking a constraint list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintResult {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Validates effective USE sets against REQUIRED_USE
pub struct ConstraintChecker;

impl ConstraintChecker {
    /// Evaluate every constraint; all violations are collected
    pub fn check(constraints: &[Constraint], enabled: &EffectiveUseSet) -> ConstraintResult {
        let errors: Vec<String> = constraints
            .iter()
            .filter_map(|c| c.violation(enabled))
            .collect();
        ConstraintResult {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// REQUIRED_USE as written in a package definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequiredUseSpec {
    /// Surface syntax, e.g. `"^^ ( ssl gnutls )"`
    Text(String),
    /// Already-typed constraints
    Constraints(Vec<Constraint>),
}

impl Default for RequiredUseSpec {
    fn default() -> Self {
        RequiredUseSpec::Constraints(Vec::new())
    }
}

impl RequiredUseSpec {
    pub fn to_constraints(&self) -> Result<Vec<Constraint>> {
        match self {
            RequiredUseSpec::Text(text) => parse_required_use(text),
            RequiredUseSpec::Constraints(constraints) => Ok(constraints.clone()),
        }
    }
}

/// Parse the REQUIRED_USE surface syntax
///
/// `flag? ( a b )` with several children yields one conditional per child.
pub fn parse_required_use(input: &str) -> Result<Vec<Constraint>> {
    let invalid = |message: String| Error::InvalidRequiredUse {
        input: input.to_string(),
        message,
    };

    let tokens = tokenize(input).map_err(invalid)?;
    let mut constraints = Vec::new();
    let mut pos = 0;
    while pos < tokens.len() {
        let (parsed, next) = parse_constraint(&tokens, pos).map_err(invalid)?;
        constraints.extend(parsed);
        pos = next;
    }
    Ok(constraints)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Flag(String),
    Negated(String),
    Conditional(String),
    NegatedConditional(String),
    OpenParen,
    CloseParen,
    AnyOf,
    ExactlyOne,
    AtMostOne,
}

fn is_flag_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '+' | '@')
}

fn tokenize(input: &str) -> std::result::Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::OpenParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::CloseParen);
            }
            '|' | '^' | '?' => {
                chars.next();
                if chars.peek() != Some(&c) {
                    return Err(format!("expected '{c}{c}' but found single '{c}'"));
                }
                chars.next();
                tokens.push(match c {
                    '|' => Token::AnyOf,
                    '^' => Token::ExactlyOne,
                    _ => Token::AtMostOne,
                });
            }
            _ => {
                let negated = c == '!';
                if negated {
                    chars.next();
                }
                let mut flag = String::new();
                while let Some(&c) = chars.peek() {
                    if !is_flag_char(c) {
                        break;
                    }
                    flag.push(c);
                    chars.next();
                }
                if flag.is_empty() {
                    return match chars.peek() {
                        Some(c) => Err(format!("unexpected character '{c}'")),
                        None => Err("expected flag name after '!'".to_string()),
                    };
                }
                let conditional = chars.peek() == Some(&'?');
                if conditional {
                    chars.next();
                }
                tokens.push(match (negated, conditional) {
                    (false, false) => Token::Flag(flag),
                    (true, false) => Token::Negated(flag),
                    (false, true) => Token::Conditional(flag),
                    (true, true) => Token::NegatedConditional(flag),
                });
            }
        }
    }

    Ok(tokens)
}

/// Parse one constraint at `pos`, returning the constraints it expands to
fn parse_constraint(
    tokens: &[Token],
    pos: usize,
) -> std::result::Result<(Vec<Constraint>, usize), String> {
    let Some(token) = tokens.get(pos) else {
        return Err("unexpected end of input".to_string());
    };

    match token {
        Token::AnyOf | Token::ExactlyOne | Token::AtMostOne => {
            let (flags, next) = parse_flag_group(tokens, pos + 1)?;
            let constraint = match token {
                Token::AnyOf => Constraint::AnyOf(flags),
                Token::ExactlyOne => Constraint::ExactlyOne(flags),
                _ => Constraint::AtMostOne(flags),
            };
            Ok((vec![constraint], next))
        }
        Token::Conditional(flag) => {
            expect_open(tokens, pos + 1, &format!("{flag}?"))?;
            let mut children = Vec::new();
            let mut cursor = pos + 2;
            loop {
                match tokens.get(cursor) {
                    Some(Token::CloseParen) => {
                        cursor += 1;
                        break;
                    }
                    Some(_) => {
                        let (parsed, next) = parse_constraint(tokens, cursor)?;
                        children.extend(parsed);
                        cursor = next;
                    }
                    None => return Err("unclosed parenthesis".to_string()),
                }
            }
            if children.is_empty() {
                return Err(format!("empty group after '{flag}?'"));
            }
            let expanded = children
                .into_iter()
                .map(|child| Constraint::conditional(flag.clone(), child))
                .collect();
            Ok((expanded, cursor))
        }
        Token::Flag(flag) => Err(format!(
            "bare flag '{flag}' is not supported; use '|| ( {flag} )'"
        )),
        Token::Negated(flag) => Err(format!("negated flag '!{flag}' is not supported")),
        Token::NegatedConditional(flag) => {
            Err(format!("negative conditional '!{flag}?' is not supported"))
        }
        Token::OpenParen => Err("unexpected '(' without an operator".to_string()),
        Token::CloseParen => Err("unexpected ')'".to_string()),
    }
}

fn expect_open(tokens: &[Token], pos: usize, after: &str) -> std::result::Result<(), String> {
    match tokens.get(pos) {
        Some(Token::OpenParen) => Ok(()),
        _ => Err(format!("expected '(' after '{after}'")),
    }
}

/// Parse `( flag flag ... )` starting at the opening paren
fn parse_flag_group(
    tokens: &[Token],
    pos: usize,
) -> std::result::Result<(Vec<String>, usize), String> {
    expect_open(tokens, pos, "group operator")?;
    let mut flags = Vec::new();
    let mut cursor = pos + 1;
    loop {
        match tokens.get(cursor) {
            Some(Token::CloseParen) => break,
            Some(Token::Flag(flag)) => flags.push(flag.clone()),
            Some(other) => {
                return Err(format!(
                    "only plain flags are allowed inside a group, found {other:?}"
                ))
            }
            None => return Err("unclosed parenthesis".to_string()),
        }
        cursor += 1;
    }
    if flags.is_empty() {
        return Err("empty group".to_string());
    }
    Ok((flags, cursor + 1))
}
