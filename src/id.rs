// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Identifiers of AST nodes, pickles, definitions and messages.

use std::cell::Cell;

/// Source of unique identifiers.
///
/// A single generator is shared between the parser, the [`Registry`] and the
/// composition engine of one run, so ids never clash inside a message stream.
///
/// [`Registry`]: crate::Registry
#[derive(Debug)]
pub enum IdGenerator {
    /// Random [UUID v4][1] identifiers.
    ///
    /// [1]: https://datatracker.ietf.org/doc/html/rfc4122#section-4.4
    Uuid,

    /// Sequential numbers starting at `0`, for deterministic output.
    Incrementing(Cell<u64>),
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::Uuid
    }
}

impl IdGenerator {
    /// Creates a new [`IdGenerator::Incrementing`] starting at `0`.
    #[must_use]
    pub const fn incrementing() -> Self {
        Self::Incrementing(Cell::new(0))
    }

    /// Produces the next identifier.
    #[must_use]
    pub fn next_id(&self) -> String {
        match self {
            Self::Uuid => uuid::Uuid::new_v4().to_string(),
            Self::Incrementing(next) => {
                let id = next.get();
                next.set(id + 1);
                id.to_string()
            }
        }
    }
}
