// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Consolidated error type of this crate.
//!
//! Failures happening while a test runs are not represented here: they are
//! [`compose::Failure`]s handed over to the host runner.
//!
//! [`compose::Failure`]: crate::compose::Failure

use std::io;

use derive_more::{Display, Error, From};

use crate::{expression, parameter, tag};

/// Top-level error of registering definitions, composing tests and running
/// diagnostics.
#[derive(Debug, Display, Error, From)]
pub enum Error {
    /// Feature file text couldn't be parsed.
    #[display("Failed to parse feature file `{uri}`: {reason}")]
    #[from(ignore)]
    Parse {
        /// URI of the feature file.
        #[error(not(source))]
        uri: String,

        /// [`gherkin`] parser's explanation.
        reason: String,
    },

    /// I/O error while reading feature files or writing messages.
    #[display("I/O operation failed: {_0}")]
    Io(io::Error),

    /// Step description couldn't be compiled into an [`Expression`].
    ///
    /// [`Expression`]: crate::Expression
    #[display("{_0}")]
    Expression(expression::Error),

    /// Invalid custom parameter type.
    #[display("{_0}")]
    Parameter(parameter::Error),

    /// Tag expression couldn't be parsed.
    #[display("{_0}")]
    TagExpression(tag::ParseError),

    /// Step or hook was registered with an argument it cannot be built from.
    #[display("Unexpected argument for {kind}: {reason}")]
    #[from(ignore)]
    MalformedArgument {
        /// What was being registered (`step definition`, `Before hook`...).
        #[error(not(source))]
        kind: &'static str,

        /// Why the argument was rejected.
        reason: String,
    },

    /// Search patterns couldn't be turned into a file walker.
    #[display("Failed to resolve search patterns: {_0}")]
    Glob(globwalk::GlobError),

    /// Messages couldn't be serialized.
    #[display("Failed to serialize messages: {_0}")]
    Json(serde_json::Error),
}

impl Error {
    /// Creates an [`Error::MalformedArgument`].
    #[must_use]
    pub fn malformed(kind: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedArgument { kind, reason: reason.into() }
    }
}

/// Result type alias using [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;
