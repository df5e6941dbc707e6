// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Compiles [Gherkin] feature files into runnable test trees and emits the
//! [Cucumber messages][1] protocol while those tests run.
//!
//! The pieces, leaves first:
//! - [`tag`]: tag expressions used for selecting tests and scoping hooks;
//! - [`expression`]: [Cucumber Expressions][2] and regular expressions
//!   matching step text;
//! - [`Registry`]: step definitions, parameter types and hooks;
//! - [`compose`]: the composition engine building a [`Spec`] out of a parsed
//!   document and its pickles;
//! - [`diagnostics`]: an offline cross-reference of definitions against
//!   their usage.
//!
//! [Gherkin]: https://cucumber.io/docs/gherkin/reference
//! [1]: https://github.com/cucumber/messages
//! [2]: https://github.com/cucumber/cucumber-expressions

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod ast;
pub mod cli;
pub mod compose;
pub mod diagnostics;
pub mod error;
pub mod expression;
pub mod hook;
pub mod id;
pub mod message;
pub mod parameter;
pub mod parser;
pub mod pickle;
pub mod registry;
pub mod runner;
pub mod specs;
pub mod step;
pub mod step_definitions;
pub mod tag;
pub mod world;

#[doc(inline)]
pub use self::{
    compose::{create_tests, Spec},
    error::{Error, Result},
    expression::Expression,
    id::IdGenerator,
    message::{Envelope, MessageSink},
    parameter::{ParameterRegistry, ParameterType},
    registry::{Registry, RegistryBuilder},
    runner::Summary,
    step::{Context, DataTable, Outcome, StepArgument},
    step_definitions::{StepDefinitionHints, StepDefinitions, StepLibrary},
    tag::TagExpression,
    world::World,
};

pub use futures::future::LocalBoxFuture;
pub use gherkin;
