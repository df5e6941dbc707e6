// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`World`] trait definition.

use std::{fmt::Display, future::Future};

/// Represents a shared user-defined state every [step definition][0] and
/// [hook][1] of a single test attempt is bound to.
///
/// A fresh [`World`] is created by the host runner for every attempt of a
/// test, retries included, so nothing leaks between attempts. If your
/// workflow needs state shared across tests (ex. a database connection
/// pool), keep it outside and reach it through a `static`.
///
/// [0]: crate::step::StepDefinition
/// [1]: crate::hook::Hook
pub trait World: Sized + 'static {
    /// Error of creating a new [`World`] instance.
    type Error: Display;

    /// Creates a new [`World`] instance.
    fn new() -> impl Future<Output = Result<Self, Self::Error>>;
}
