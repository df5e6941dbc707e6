// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Errors of resolving and running step definitions.

use std::fmt;

use derive_more::{Display, Error, From};

use super::location::Location;

/// No step definition matches a step's text.
#[derive(Clone, Debug, Display, Error, Eq, PartialEq)]
#[display("Step implementation missing for: {text}")]
pub struct MissingDefinitionError {
    /// Text of the step.
    #[error(not(source))]
    pub text: String,
}

/// More than one step definition matches a step's text.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub struct AmbiguousMatchError {
    /// Text of the step.
    #[error(not(source))]
    pub text: String,

    /// Canonical form and location of every matching definition, in
    /// registration order.
    pub possible_matches: Vec<(String, Option<Location>)>,
}

impl fmt::Display for AmbiguousMatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Multiple matching step definitions for: {}", self.text)?;
        for (expr, loc) in &self.possible_matches {
            write!(f, "\n {expr}")?;
            if let Some(loc) = loc {
                write!(f, " - {loc}")?;
            }
        }
        Ok(())
    }
}

/// Error of resolving a step's text to exactly one definition.
#[derive(Clone, Debug, Display, Error, Eq, From, PartialEq)]
pub enum ResolveError {
    /// Zero definitions match.
    #[display("{_0}")]
    Missing(MissingDefinitionError),

    /// Two or more definitions match.
    #[display("{_0}")]
    Ambiguous(AmbiguousMatchError),
}

/// Error of running a step definition, before its body had a chance to run.
#[derive(Clone, Debug, Display, Error, From)]
pub enum RunError {
    /// Step couldn't be resolved.
    #[display("{_0}")]
    Resolve(ResolveError),

    /// Captured text couldn't be converted by its parameter type.
    #[display(
        "Failed to transform `{text}` with parameter type `{{{parameter}}}`: \
         {reason}"
    )]
    #[from(ignore)]
    Transform {
        /// Name of the parameter type.
        #[error(not(source))]
        parameter: String,

        /// Captured text.
        #[error(not(source))]
        text: String,

        /// Transformer's explanation.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::{AmbiguousMatchError, Location};

    #[test]
    fn ambiguous_lists_every_candidate() {
        let err = AmbiguousMatchError {
            text: "a is 1".into(),
            possible_matches: vec![
                ("a is {int}".into(), Some(Location::new("steps.rs", 3, 5))),
                ("/^a is (.*)$/".into(), None),
            ],
        };

        assert_eq!(
            err.to_string(),
            "Multiple matching step definitions for: a is 1\n \
             a is {int} - steps.rs:3:5\n \
             /^a is (.*)$/",
        );
    }
}
