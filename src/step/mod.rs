// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Step definitions: how a step's text is described, what its implementation
//! looks like, and what it receives when invoked.
//!
//! - [`context`]: captures, trailing argument and attachments of one call;
//! - [`location`]: optional source positions of definitions;
//! - [`DataTable`]: the structured trailing argument.

pub mod context;
mod error;
pub mod location;
mod table;

use std::{fmt, rc::Rc};

use futures::future::LocalBoxFuture;
use regex::Regex;

use crate::{expression::Expression, pickle::PickleStepArgument};

#[doc(inline)]
pub use self::{
    context::Context,
    error::{
        AmbiguousMatchError, MissingDefinitionError, ResolveError, RunError,
    },
    location::{CallerLocator, Location, Locator},
    table::DataTable,
};

/// Step implementation bound to a world `W`.
pub type StepFn<W> = Rc<
    dyn for<'a> Fn(
        &'a mut W,
        Context,
    ) -> LocalBoxFuture<'a, anyhow::Result<Outcome>>,
>;

/// How a step definition describes the text it matches, before compilation.
#[derive(Clone, Debug)]
pub enum Description {
    /// [Cucumber Expression][1] source.
    ///
    /// [1]: https://github.com/cucumber/cucumber-expressions
    Expression(String),

    /// Regular expression.
    Regex(Regex),
}

impl Description {
    /// Indicates whether this [`Description`] describes nothing at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Expression(s) => s.is_empty(),
            Self::Regex(re) => re.as_str().is_empty(),
        }
    }
}

impl From<&str> for Description {
    fn from(s: &str) -> Self {
        Self::Expression(s.to_owned())
    }
}

impl From<String> for Description {
    fn from(s: String) -> Self {
        Self::Expression(s)
    }
}

impl From<Regex> for Description {
    fn from(re: Regex) -> Self {
        Self::Regex(re)
    }
}

/// Successful result of a step implementation.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Outcome {
    /// Step passed.
    #[default]
    Passed,

    /// Step is not implemented yet: remaining steps are skipped.
    Pending,
}

impl From<()> for Outcome {
    fn from((): ()) -> Self {
        Self::Passed
    }
}

/// Exactly `"pending"` is [`Outcome::Pending`], any other text passes.
impl From<&str> for Outcome {
    fn from(s: &str) -> Self {
        if s == "pending" { Self::Pending } else { Self::Passed }
    }
}

/// Compiled step definition.
pub struct StepDefinition<W> {
    /// Unique id, referenced by `stepDefinition` and `testCase` messages.
    pub id: String,

    /// Matcher of step text.
    pub expression: Expression,

    /// Implementation.
    pub implementation: StepFn<W>,

    /// Where this definition was registered, if known.
    pub location: Option<Location>,
}

impl<W> fmt::Debug for StepDefinition<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDefinition")
            .field("id", &self.id)
            .field("expression", &self.expression.to_string())
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

/// Trailing argument of a step.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StepArgument {
    /// [Data table][1].
    ///
    /// [1]: https://cucumber.io/docs/gherkin/reference#data-tables
    DataTable(DataTable),

    /// [Doc string][1].
    ///
    /// [1]: https://cucumber.io/docs/gherkin/reference#doc-strings
    DocString(String),
}

impl StepArgument {
    /// Extracts the trailing argument of a pickle step.
    ///
    /// An empty doc string is no argument.
    #[must_use]
    pub fn from_pickle(arg: &PickleStepArgument) -> Option<Self> {
        if let Some(table) = &arg.data_table {
            return Some(Self::DataTable(table.into()));
        }
        arg.doc_string
            .as_ref()
            .filter(|d| !d.content.is_empty())
            .map(|d| Self::DocString(d.content.clone()))
    }

    /// Name of this argument's kind, as used in suggestions.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::DataTable(_) => "dataTable",
            Self::DocString(_) => "docString",
        }
    }
}
