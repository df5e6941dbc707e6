// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! `Before` and `After` hooks.

use std::{fmt, rc::Rc};

use derive_more::{Deref, Display};
use futures::future::LocalBoxFuture;

use crate::{
    step::{context::Scope, Location},
    tag::{Ext as _, TagExpression},
};

/// Hook implementation bound to a world `W`.
pub type HookFn<W> = Rc<
    dyn for<'a> Fn(
        &'a mut W,
        Context,
    ) -> LocalBoxFuture<'a, anyhow::Result<()>>,
>;

/// When a [`Hook`] runs.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum Keyword {
    /// Before the pickle's steps.
    #[display("Before")]
    Before,

    /// After the pickle's steps.
    #[display("After")]
    After,
}

/// Context of a hook invocation.
#[derive(Clone, Debug, Deref)]
pub struct Context {
    #[deref]
    scope: Scope,
    keyword: Keyword,
}

impl Context {
    /// Creates a new hook [`Context`].
    #[must_use]
    pub const fn new(scope: Scope, keyword: Keyword) -> Self {
        Self { scope, keyword }
    }

    /// [`Keyword`] of the running hook.
    #[must_use]
    pub const fn keyword(&self) -> Keyword {
        self.keyword
    }
}

/// Registered hook.
pub struct Hook<W> {
    /// Unique id, referenced by `hook` and `testCase` messages.
    pub id: String,

    /// When this hook runs.
    pub keyword: Keyword,

    /// Filter of the tags this hook applies to, [`None`] applying to all.
    pub tags: Option<TagExpression>,

    /// Tag expression as registered.
    pub tag_source: Option<String>,

    /// Implementation.
    pub implementation: HookFn<W>,

    /// Where this hook was registered, if known.
    pub location: Option<Location>,
}

impl<W> Hook<W> {
    /// Indicates whether this hook applies to a pickle with the given `tags`.
    pub fn applies_to<'t, I>(&self, tags: I) -> bool
    where
        I: IntoIterator<Item = &'t str> + Clone,
    {
        self.tags.eval(tags)
    }
}

impl<W> fmt::Debug for Hook<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("id", &self.id)
            .field("keyword", &self.keyword)
            .field("tags", &self.tag_source)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}
