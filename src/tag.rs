// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [Tag expressions][1] selecting tests and scoping hooks.
//!
//! Grammar, loosest binding first:
//! ```text
//! or   := and ("or" and)*
//! and  := not ("and" not)*
//! not  := "not" not | "(" or ")" | LITERAL
//! ```
//! Inside a literal `\(`, `\)`, `\\` and `\ ` escape the respective character.
//!
//! [1]: https://cucumber.io/docs/cucumber/api#tag-expressions

use std::{fmt, iter::Peekable, str::FromStr, vec};

use derive_more::{Display, Error};
use sealed::sealed;

/// Parsed tag expression.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TagExpression {
    /// Both sides must hold.
    And(Box<TagExpression>, Box<TagExpression>),

    /// Either side must hold.
    Or(Box<TagExpression>, Box<TagExpression>),

    /// Inner expression must not hold.
    Not(Box<TagExpression>),

    /// Tag itself, including its leading `@`.
    Literal(String),
}

impl TagExpression {
    /// Expression matching tests tagged `@only` or `@focus`.
    #[must_use]
    pub fn only_or_focus() -> Self {
        Self::Or(
            Box::new(Self::Literal("@only".into())),
            Box::new(Self::Literal("@focus".into())),
        )
    }
}

/// Error of parsing a [`TagExpression`].
#[derive(Clone, Debug, Display, Error)]
#[display(
    "Tag expression \"{expression}\" could not be parsed because of syntax \
     error: {reason}"
)]
pub struct ParseError {
    /// Input being parsed.
    #[error(not(source))]
    pub expression: String,

    /// What went wrong.
    pub reason: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
enum Token {
    Literal(String),
    And,
    Or,
    Not,
    Open,
    Close,
}

impl FromStr for TagExpression {
    type Err = ParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let fail = |reason: String| ParseError {
            expression: input.to_owned(),
            reason,
        };

        let mut tokens = tokenize(input).map_err(fail)?.into_iter().peekable();
        if tokens.peek().is_none() {
            return Err(fail("expression is empty.".into()));
        }

        let expr = parse_or(&mut tokens).map_err(fail)?;
        match tokens.next() {
            None => Ok(expr),
            Some(Token::Close) => Err(fail("Unmatched ).".into())),
            Some(t) => Err(fail(format!("Expected operator, found {t:?}."))),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    fn flush(literal: &mut String, out: &mut Vec<Token>) {
        if literal.is_empty() {
            return;
        }
        out.push(match literal.as_str() {
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            _ => Token::Literal(literal.clone()),
        });
        literal.clear();
    }

    let mut out = Vec::new();
    let mut literal = String::new();
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(e)
                    if matches!(e, '(' | ')' | '\\') || e.is_whitespace() =>
                {
                    literal.push(e);
                }
                Some(e) => {
                    return Err(format!("Illegal escape before \"{e}\"."));
                }
                None => return Err("Unfinished escape at the end.".into()),
            },
            '(' | ')' => {
                flush(&mut literal, &mut out);
                out.push(if c == '(' { Token::Open } else { Token::Close });
            }
            c if c.is_whitespace() => flush(&mut literal, &mut out),
            c => literal.push(c),
        }
    }
    flush(&mut literal, &mut out);

    Ok(out)
}

type Tokens = Peekable<vec::IntoIter<Token>>;

fn parse_or(tokens: &mut Tokens) -> Result<TagExpression, String> {
    let mut left = parse_and(tokens)?;
    while tokens.next_if_eq(&Token::Or).is_some() {
        let right = parse_and(tokens)?;
        left = TagExpression::Or(Box::new(left), Box::new(right));
    }
    Ok(left)
}

fn parse_and(tokens: &mut Tokens) -> Result<TagExpression, String> {
    let mut left = parse_not(tokens)?;
    while tokens.next_if_eq(&Token::And).is_some() {
        let right = parse_not(tokens)?;
        left = TagExpression::And(Box::new(left), Box::new(right));
    }
    Ok(left)
}

fn parse_not(tokens: &mut Tokens) -> Result<TagExpression, String> {
    match tokens.next() {
        Some(Token::Not) => {
            Ok(TagExpression::Not(Box::new(parse_not(tokens)?)))
        }
        Some(Token::Open) => {
            let inner = parse_or(tokens)?;
            match tokens.next() {
                Some(Token::Close) => Ok(inner),
                _ => Err("Unmatched (.".into()),
            }
        }
        Some(Token::Literal(l)) => Ok(TagExpression::Literal(l)),
        Some(t) => Err(format!("Expected operand, found {t:?}.")),
        None => Err("Expected operand, found end of expression.".into()),
    }
}

impl fmt::Display for TagExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And(l, r) => write!(f, "( {l} and {r} )"),
            Self::Or(l, r) => write!(f, "( {l} or {r} )"),
            Self::Not(e) => write!(f, "not ( {e} )"),
            Self::Literal(tag) => {
                for c in tag.chars() {
                    if matches!(c, '(' | ')' | '\\') || c.is_whitespace() {
                        write!(f, "\\")?;
                    }
                    write!(f, "{c}")?;
                }
                Ok(())
            }
        }
    }
}

/// Extension of a [`TagExpression`] allowing to evaluate it.
#[sealed]
pub trait Ext {
    /// Evaluates this [`TagExpression`] for the given `tags`.
    #[must_use]
    fn eval<I, S>(&self, tags: I) -> bool
    where
        S: AsRef<str>,
        I: IntoIterator<Item = S> + Clone;
}

#[sealed]
impl Ext for TagExpression {
    fn eval<I, S>(&self, tags: I) -> bool
    where
        S: AsRef<str>,
        I: IntoIterator<Item = S> + Clone,
    {
        match self {
            Self::And(l, r) => l.eval(tags.clone()) & r.eval(tags),
            Self::Or(l, r) => l.eval(tags.clone()) | r.eval(tags),
            Self::Not(t) => !t.eval(tags),
            Self::Literal(t) => tags.into_iter().any(|tag| tag.as_ref() == t),
        }
    }
}

/// Absent expression matches every set of tags.
#[sealed]
impl Ext for Option<TagExpression> {
    fn eval<I, S>(&self, tags: I) -> bool
    where
        S: AsRef<str>,
        I: IntoIterator<Item = S> + Clone,
    {
        self.as_ref().map_or(true, |e| e.eval(tags))
    }
}

#[cfg(test)]
mod tests {
    use super::{Ext as _, TagExpression};

    fn parse(s: &str) -> TagExpression {
        s.parse().unwrap_or_else(|e| panic!("{e}"))
    }

    #[test]
    fn precedence_is_not_and_or() {
        let expr = parse("@a or not @b and @c");

        assert_eq!(expr.to_string(), "( @a or ( not ( @b ) and @c ) )");
        assert!(expr.eval(["@a"]));
        assert!(expr.eval(["@c"]));
        assert!(!expr.eval(["@b", "@c"]));
        assert!(!expr.eval::<_, &str>([]));
    }

    #[test]
    fn parentheses_group() {
        let expr = parse("(@a or @b) and @c");

        assert!(expr.eval(["@b", "@c"]));
        assert!(!expr.eval(["@b"]));
    }

    #[test]
    fn escapes_are_literal() {
        let expr = parse(r"@with\ space or @paren\(x\)");

        assert_eq!(expr, TagExpression::Or(
            Box::new(TagExpression::Literal("@with space".into())),
            Box::new(TagExpression::Literal("@paren(x)".into())),
        ));
        assert_eq!(expr.to_string(), r"( @with\ space or @paren\(x\) )");
    }

    #[test]
    fn rejects_malformed() {
        for input in ["", "@a and", "(@a", "@a)", "@a @b", r"@a\x", "or @a"] {
            assert!(
                input.parse::<TagExpression>().is_err(),
                "`{input}` should not parse",
            );
        }
    }

    #[test]
    fn absent_expression_matches_everything() {
        let none: Option<TagExpression> = None;

        assert!(none.eval::<_, &str>([]));
        assert!(Some(parse("@x")).eval(["@x"]));
        assert!(!Some(parse("@x")).eval(["@y"]));
    }

    #[test]
    fn only_or_focus() {
        let expr = TagExpression::only_or_focus();

        assert_eq!(expr.to_string(), "( @only or @focus )");
        assert!(expr.eval(["@focus"]));
        assert!(!expr.eval(["@skip"]));
    }
}
