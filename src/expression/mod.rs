// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Matchers of step text.
//!
//! [`Expression::Cucumber`] is expanded from a [Cucumber Expression][1]
//! into an anchored [`Regex`], with every [`ParameterType`] of the
//! [`ParameterRegistry`] providing its pattern.
//! [`Expression::Regular`] uses the provided [`Regex`] as is.
//!
//! [1]: https://github.com/cucumber/cucumber-expressions

pub mod generator;

use std::{any::Any, fmt, rc::Rc};

use cucumber_expressions::{
    expand::{Error as ExpandError, ParameterError, ParametersProvider},
    SingleExpression, Spanned,
};
use derive_more::{Display, Error};
use regex::Regex;

use crate::parameter::{ParameterRegistry, ParameterType};

#[doc(inline)]
pub use self::generator::{generate_expressions, GeneratedExpression};

/// Error of compiling an [`Expression`].
#[derive(Clone, Debug, Display, Error)]
pub enum Error {
    /// [Cucumber Expression][1] syntax is invalid.
    ///
    /// [1]: https://github.com/cucumber/cucumber-expressions
    #[display("Invalid Cucumber Expression `{expression}`: {reason}")]
    Syntax {
        /// Source of the expression.
        #[error(not(source))]
        expression: String,

        /// Parser's explanation.
        reason: String,
    },

    /// Expression references an unknown [`ParameterType`].
    #[display(
        "Undefined parameter type `{{{name}}}` in expression `{expression}`"
    )]
    UndefinedParameterType {
        /// Name of the missing [`ParameterType`].
        #[error(not(source))]
        name: String,

        /// Source of the expression.
        expression: String,
    },

    /// Compiled pattern is not a valid regular expression.
    #[display("Invalid regular expression `{expression}`: {source}")]
    Regex {
        /// Source of the expression.
        #[error(not(source))]
        expression: String,

        /// Underlying [`regex`] error.
        source: regex::Error,
    },
}

/// Single value captured from step text.
#[derive(Clone, Debug)]
pub struct Match {
    /// Captured text, absent for a group that didn't participate.
    pub text: Option<String>,

    /// [`ParameterType`] converting the captured text, if any.
    ///
    /// Captures of an [`Expression::Regular`] have none and stay
    /// [`String`]s.
    pub parameter_type: Option<ParameterType>,
}

impl Match {
    /// Converts this [`Match`] into its typed value.
    ///
    /// # Errors
    ///
    /// If the [`ParameterType`]'s transformer fails.
    pub fn value(&self) -> anyhow::Result<Option<Rc<dyn Any>>> {
        let Some(text) = &self.text else {
            return Ok(None);
        };
        Ok(Some(match &self.parameter_type {
            Some(ty) => ty.transform(text)?,
            None => Rc::new(text.clone()),
        }))
    }
}

/// [Cucumber Expression][1] compiled against a [`ParameterRegistry`].
///
/// [1]: https://github.com/cucumber/cucumber-expressions
#[derive(Clone, Debug)]
pub struct CucumberExpression {
    source: String,
    regex: Regex,
    parameters: Vec<(Vec<usize>, ParameterType)>,
}

impl CucumberExpression {
    /// Compiles the `source` expression.
    ///
    /// # Errors
    ///
    /// If `source` is syntactically invalid or references an unknown
    /// [`ParameterType`].
    pub fn new(
        source: impl Into<String>,
        parameters: &ParameterRegistry,
    ) -> Result<Self, Error> {
        let source = source.into();
        let types = parameter_types(&source, parameters)?;

        let regex = cucumber_expressions::Expression::regex_with_parameters(
            source.as_str(),
            Provider(parameters),
        )
        .map_err(|e| match e {
            ExpandError::Regex(e) => Error::Regex {
                expression: source.clone(),
                source: e,
            },
            ExpandError::Expansion(ParameterError::NotFound(name)) => {
                Error::UndefinedParameterType {
                    name: (*name.fragment()).to_owned(),
                    expression: source.clone(),
                }
            }
            e @ (ExpandError::Parsing(_) | ExpandError::Expansion(_)) => {
                Error::Syntax {
                    expression: source.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        let groups = parameter_groups(&regex, types.len());
        Ok(Self {
            parameters: groups.into_iter().zip(types).collect(),
            source,
            regex,
        })
    }

    /// Source text of this expression.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Matches the given `text`.
    ///
    /// A [`ParameterType`] whose pattern has its own capture groups yields
    /// the first of them that participated in the match.
    #[must_use]
    pub fn match_text(&self, text: &str) -> Option<Vec<Match>> {
        let caps = self.regex.captures(text)?;
        Some(
            self.parameters
                .iter()
                .map(|(groups, ty)| Match {
                    text: groups
                        .iter()
                        .find_map(|&i| caps.get(i))
                        .map(|m| m.as_str().to_owned()),
                    parameter_type: Some(ty.clone()),
                })
                .collect(),
        )
    }
}

/// [`Provider`] of [`ParameterType`] patterns out of a [`ParameterRegistry`],
/// built-ins included.
#[derive(Clone, Copy)]
struct Provider<'r>(&'r ParameterRegistry);

impl<'r, 's> ParametersProvider<Spanned<'s>> for Provider<'r> {
    type Item = char;
    type Value = &'r str;

    fn get(&self, input: &Spanned<'s>) -> Option<Self::Value> {
        self.0.lookup(input.fragment()).map(ParameterType::regexp)
    }
}

/// [`ParameterType`]s referenced by the `source` expression, in placeholder
/// order.
fn parameter_types(
    source: &str,
    parameters: &ParameterRegistry,
) -> Result<Vec<ParameterType>, Error> {
    let ast = cucumber_expressions::Expression::parse(source).map_err(|e| {
        Error::Syntax { expression: source.to_owned(), reason: e.to_string() }
    })?;
    let types = ast
        .0
        .iter()
        .filter_map(|item| match item {
            SingleExpression::Parameter(p) => Some(*p.fragment()),
            _ => None,
        })
        .map(|name| {
            parameters.lookup(name).cloned().ok_or_else(|| {
                Error::UndefinedParameterType {
                    name: name.to_owned(),
                    expression: source.to_owned(),
                }
            })
        })
        .collect();
    types
}

/// Capture group indices of every parameter of the `regex`, in placeholder
/// order.
///
/// A parameter is either a single unnamed group, or the `__{id}_{n}` groups
/// its pattern's own groups were renamed into.
fn parameter_groups(regex: &Regex, count: usize) -> Vec<Vec<usize>> {
    let mut groups = vec![Vec::new(); count];
    let mut next = 0;
    for (i, name) in regex.capture_names().enumerate().skip(1) {
        let owner = match name.and_then(|n| n.strip_prefix("__")) {
            Some(n) => n
                .split_once('_')
                .and_then(|(id, _)| id.parse::<usize>().ok())
                .unwrap_or(next),
            None => next,
        };
        if let Some(g) = groups.get_mut(owner) {
            g.push(i);
        }
        next = owner + 1;
    }
    groups
}

/// Plain [`Regex`] matcher.
#[derive(Clone, Debug)]
pub struct RegularExpression(Regex);

impl RegularExpression {
    /// Wraps the provided [`Regex`].
    #[must_use]
    pub const fn new(regex: Regex) -> Self {
        Self(regex)
    }

    /// Underlying [`Regex`].
    #[must_use]
    pub const fn regex(&self) -> &Regex {
        &self.0
    }

    /// Matches the given `text`, returning every capture group in order.
    #[must_use]
    pub fn match_text(&self, text: &str) -> Option<Vec<Match>> {
        let caps = self.0.captures(text)?;
        Some(
            caps.iter()
                .skip(1)
                .map(|m| Match {
                    text: m.map(|m| m.as_str().to_owned()),
                    parameter_type: None,
                })
                .collect(),
        )
    }
}

/// Matcher of step text.
#[derive(Clone, Debug)]
pub enum Expression {
    /// [Cucumber Expression][1].
    ///
    /// [1]: https://github.com/cucumber/cucumber-expressions
    Cucumber(CucumberExpression),

    /// Regular expression.
    Regular(RegularExpression),
}

impl Expression {
    /// Matches the given `text`, returning captures in placeholder order, or
    /// [`None`] if the `text` doesn't match.
    #[must_use]
    pub fn match_text(&self, text: &str) -> Option<Vec<Match>> {
        match self {
            Self::Cucumber(e) => e.match_text(text),
            Self::Regular(e) => e.match_text(text),
        }
    }

    /// Indicates whether the given `text` matches.
    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        match self {
            Self::Cucumber(e) => e.regex.is_match(text),
            Self::Regular(e) => e.0.is_match(text),
        }
    }

    /// Source of this expression without any decoration.
    #[must_use]
    pub fn source(&self) -> &str {
        match self {
            Self::Cucumber(e) => e.source(),
            Self::Regular(e) => e.0.as_str(),
        }
    }
}

impl fmt::Display for Expression {
    /// Canonical form: the source of a [Cucumber Expression][1], or `/regex/`.
    ///
    /// [1]: https://github.com/cucumber/cucumber-expressions
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cucumber(e) => write!(f, "{}", e.source),
            Self::Regular(e) => write!(f, "/{}/", e.0.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use regex::Regex;

    use crate::parameter::{ParameterRegistry, ParameterType};

    use super::{CucumberExpression, Error, Expression, RegularExpression};

    fn cucumber(s: &str) -> Expression {
        Expression::Cucumber(
            CucumberExpression::new(s, &ParameterRegistry::new())
                .unwrap_or_else(|e| panic!("{e}")),
        )
    }

    fn texts(expr: &Expression, text: &str) -> Option<Vec<Option<String>>> {
        expr.match_text(text)
            .map(|ms| ms.into_iter().map(|m| m.text).collect())
    }

    #[test]
    fn parameters_capture_in_order() {
        let expr = cucumber("a {word} has {int} {string}");
        let matches = expr.match_text(r#"a cat has 3 "lives""#).unwrap();

        assert_eq!(matches.len(), 3);
        assert_eq!(matches[0].text.as_deref(), Some("cat"));
        let n = matches[1].value().unwrap().unwrap();
        assert_eq!(n.downcast_ref::<i64>(), Some(&3));
        let s = matches[2].value().unwrap().unwrap();
        assert_eq!(
            s.downcast_ref::<String>().map(String::as_str),
            Some("lives"),
        );
    }

    #[test]
    fn is_anchored() {
        let expr = cucumber("a is {int}");

        assert!(expr.match_text("a is 1").is_some());
        assert!(expr.match_text("this a is 1").is_none());
        assert!(expr.match_text("a is 1 or 2").is_none());
    }

    #[test]
    fn optional_and_alternation() {
        let expr = cucumber("I have {int} cucumber(s) in my belly/stomach");

        assert!(expr.is_match("I have 1 cucumber in my belly"));
        assert!(expr.is_match("I have 42 cucumbers in my stomach"));
        assert!(!expr.is_match("I have 42 cucumbers in my head"));
    }

    #[test]
    fn escapes_and_regex_metacharacters() {
        let expr = cucumber(r"costs \(about\) $5.00");

        assert!(expr.is_match("costs (about) $5.00"));
        assert!(!expr.is_match("costs about $5.00"));
        assert!(!expr.is_match("costs (about) $5x00"));
    }

    #[test]
    fn undefined_parameter_type() {
        let err =
            CucumberExpression::new("a {color}", &ParameterRegistry::new())
                .unwrap_err();

        assert!(matches!(
            err,
            Error::UndefinedParameterType { ref name, .. } if name == "color",
        ));
    }

    #[test]
    fn custom_pattern_groups_map_to_their_parameter() {
        let mut parameters = ParameterRegistry::new();
        parameters
            .define(ParameterType::new("vehicle", "(car|bike)s?", |s| {
                Ok(s.to_owned())
            }))
            .unwrap();
        let expr = Expression::Cucumber(
            CucumberExpression::new(
                "I ride {int} {vehicle} and {string} {}",
                &parameters,
            )
            .unwrap(),
        );

        assert_eq!(
            texts(&expr, r#"I ride 2 cars and "far" away"#),
            Some(vec![
                Some("2".into()),
                Some("car".into()),
                Some(r#""far""#.into()),
                Some("away".into()),
            ]),
        );
    }

    #[test]
    fn regular_captures_groups() {
        let expr = Expression::Regular(RegularExpression::new(
            Regex::new(r"^(\d+) plus (\d+)(?: is (\d+))?$").unwrap(),
        ));

        assert_eq!(
            texts(&expr, "1 plus 2"),
            Some(vec![Some("1".into()), Some("2".into()), None]),
        );
        assert_eq!(texts(&expr, "one plus two"), None);
    }

    #[test]
    fn canonical_form() {
        assert_eq!(cucumber("a is {int}").to_string(), "a is {int}");
        assert_eq!(
            Expression::Regular(RegularExpression::new(
                Regex::new("^a$").unwrap()
            ))
            .to_string(),
            "/^a$/",
        );
    }
}
