// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Execution context handed to step and hook bodies.

use std::{any::Any, fmt, rc::Rc};

use base64::Engine as _;
use derive_more::Deref;

use crate::{
    message::ContentEncoding,
    pickle::{Pickle, PickleStep},
};

use super::{DataTable, StepArgument};

/// Callback appending an attachment: `(body, encoding, media type)`.
pub type AttachFn = Rc<dyn Fn(String, ContentEncoding, String)>;

/// Currently running test, shared by step and hook contexts.
#[derive(Clone, Default)]
pub struct Scope {
    pickle: Option<Rc<Pickle>>,
    step: Option<PickleStep>,
    attach: Option<AttachFn>,
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("pickle", &self.pickle.as_ref().map(|p| &p.name))
            .field("step", &self.step.as_ref().map(|s| &s.text))
            .field("attach", &self.attach.is_some())
            .finish()
    }
}

impl Scope {
    /// Sets the running [`Pickle`].
    #[must_use]
    pub fn with_pickle(mut self, pickle: Rc<Pickle>) -> Self {
        self.pickle = Some(pickle);
        self
    }

    /// Sets the running [`PickleStep`].
    #[must_use]
    pub fn with_step(mut self, step: PickleStep) -> Self {
        self.step = Some(step);
        self
    }

    /// Sets the callback receiving attachments.
    #[must_use]
    pub fn with_attach(mut self, attach: AttachFn) -> Self {
        self.attach = Some(attach);
        self
    }

    /// Running [`Pickle`], if any.
    #[must_use]
    pub fn pickle(&self) -> Option<&Pickle> {
        self.pickle.as_deref()
    }

    /// Running [`PickleStep`], absent inside hooks.
    #[must_use]
    pub const fn step(&self) -> Option<&PickleStep> {
        self.step.as_ref()
    }

    /// Attaches `text` to the running test step.
    pub fn attach(
        &self,
        text: impl Into<String>,
        media_type: impl Into<String>,
    ) {
        self.emit(text.into(), ContentEncoding::Identity, media_type.into());
    }

    /// Attaches binary `data` to the running test step, base64-encoded.
    pub fn attach_bytes(
        &self,
        data: impl AsRef<[u8]>,
        media_type: impl Into<String>,
    ) {
        let body = base64::engine::general_purpose::STANDARD.encode(data);
        self.emit(body, ContentEncoding::Base64, media_type.into());
    }

    fn emit(
        &self,
        body: String,
        encoding: ContentEncoding,
        media_type: String,
    ) {
        if let Some(attach) = &self.attach {
            attach(body, encoding, media_type);
        } else {
            tracing::warn!(
                %media_type,
                "attachment dropped: no test step is running",
            );
        }
    }
}

/// Value captured from step text, transformed by its parameter type.
#[derive(Clone)]
pub struct Capture {
    /// Captured text, absent for a group that didn't participate.
    pub text: Option<String>,

    /// Transformed value.
    pub value: Option<Rc<dyn Any>>,
}

impl fmt::Debug for Capture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capture")
            .field("text", &self.text)
            .finish_non_exhaustive()
    }
}

/// Context of a single step invocation.
///
/// Dereferences to its [`Scope`], so attachments and the running
/// [`Pickle`] are reachable from here.
#[derive(Clone, Debug, Deref)]
pub struct Context {
    #[deref]
    scope: Scope,
    captures: Vec<Capture>,
    argument: Option<StepArgument>,
}

impl Context {
    /// Creates a new [`Context`].
    #[must_use]
    pub const fn new(
        scope: Scope,
        captures: Vec<Capture>,
        argument: Option<StepArgument>,
    ) -> Self {
        Self { scope, captures, argument }
    }

    /// Typed value of the `i`-th capture.
    ///
    /// [`None`] if there is no such capture, it didn't participate, or it
    /// isn't a `T`.
    ///
    /// ```rust
    /// # use cucumber_preprocessor::step::context::{Capture, Context, Scope};
    /// # use std::rc::Rc;
    /// let ctx = Context::new(
    ///     Scope::default(),
    ///     vec![Capture {
    ///         text: Some("42".into()),
    ///         value: Some(Rc::new(42_i32)),
    ///     }],
    ///     None,
    /// );
    ///
    /// assert_eq!(ctx.get::<i32>(0), Some(&42));
    /// assert_eq!(ctx.get::<String>(0), None);
    /// assert_eq!(ctx.text(0), Some("42"));
    /// ```
    #[must_use]
    pub fn get<T: 'static>(&self, i: usize) -> Option<&T> {
        self.captures.get(i)?.value.as_deref()?.downcast_ref()
    }

    /// Raw text of the `i`-th capture.
    #[must_use]
    pub fn text(&self, i: usize) -> Option<&str> {
        self.captures.get(i)?.text.as_deref()
    }

    /// All captures in placeholder order.
    #[must_use]
    pub fn captures(&self) -> &[Capture] {
        &self.captures
    }

    /// Trailing argument of the step.
    #[must_use]
    pub const fn argument(&self) -> Option<&StepArgument> {
        self.argument.as_ref()
    }

    /// Trailing [`DataTable`], if the step has one.
    #[must_use]
    pub const fn data_table(&self) -> Option<&DataTable> {
        match &self.argument {
            Some(StepArgument::DataTable(t)) => Some(t),
            _ => None,
        }
    }

    /// Trailing doc string, if the step has one.
    #[must_use]
    pub fn doc_string(&self) -> Option<&str> {
        match &self.argument {
            Some(StepArgument::DocString(s)) => Some(s),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use crate::message::ContentEncoding;

    use super::Scope;

    #[test]
    fn attachments_reach_the_callback() {
        let seen = Rc::new(RefCell::new(vec![]));
        let sink = Rc::clone(&seen);
        let scope = Scope::default().with_attach(Rc::new(
            move |body: String, enc: ContentEncoding, ty: String| {
                sink.borrow_mut().push((body, enc, ty));
            },
        ));

        scope.attach("hello", "text/plain");
        scope.attach_bytes([0xde, 0xad], "image/png");

        assert_eq!(
            *seen.borrow(),
            [
                (
                    String::from("hello"),
                    ContentEncoding::Identity,
                    String::from("text/plain"),
                ),
                (
                    String::from("3q0="),
                    ContentEncoding::Base64,
                    String::from("image/png"),
                ),
            ],
        );
    }

    #[test]
    fn attaching_without_callback_is_noop() {
        Scope::default().attach("ignored", "text/plain");
    }
}
