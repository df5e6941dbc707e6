// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Running a single test: the per-attempt [`ExecutionState`], the step loop
//! and the finalizer completing the message protocol.

use std::{
    any::Any,
    cell::{Cell, RefCell},
    collections::VecDeque,
    fmt,
    panic::AssertUnwindSafe,
    rc::Rc,
    time::Instant,
};

use derive_more::{Display, Error};
use futures::FutureExt as _;
use lazy_regex::regex;

use crate::{
    hook::{self, HookFn, Keyword},
    message::{
        Attachment, Duration, Envelope, Status,
        TestCaseFinished, TestCaseStarted, TestStepFinished, TestStepResult,
        TestStepStarted, Timestamp,
    },
    pickle::{Pickle, PickleStep},
    registry::Registry,
    step::{context::Scope, Outcome, ResolveError, RunError, StepArgument},
    step_definitions::StepDefinitionHints,
};

use super::missing::{self, MISSING_SIGNATURE};

/// Failure of one attempt of a test.
#[derive(Clone, Debug, Display, Error)]
pub enum Failure {
    /// No definition matched a step; carries the guided explanation.
    #[display("{_0}")]
    Missing(#[error(not(source))] String),

    /// Several definitions matched a step.
    #[display("{_0}")]
    Ambiguous(#[error(not(source))] String),

    /// Captured text couldn't be transformed.
    #[display("{_0}")]
    Transform(#[error(not(source))] String),

    /// Step implementation returned an error.
    #[display("{_0}")]
    Step(#[error(not(source))] String),

    /// Step implementation panicked.
    #[display("Step panicked: {_0}")]
    Panic(#[error(not(source))] String),

    /// Hook implementation failed.
    #[display(
        "{message}\n\nBecause this error occurred during a `{keyword}` hook \
         we are skipping the remaining steps."
    )]
    Hook {
        /// Which kind of hook failed.
        #[error(not(source))]
        keyword: Keyword,

        /// Hook's error or panic message.
        message: String,
    },
}

/// Successful end of one attempt of a test.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Verdict {
    /// Every step passed.
    Passed,

    /// Some step was pending: the rest was skipped.
    Skipped,
}

/// Indicates whether the failure `message` is a hook failure.
///
/// Such failures already completed their steps' messages.
#[must_use]
pub fn is_hook_failure(message: &str) -> bool {
    regex!(r"Because this error occurred during a `(Before|After)` hook")
        .is_match(message)
}

/// One slot of a test's execution.
pub(crate) enum Slot<W> {
    Hook {
        test_step_id: String,
        hook_id: String,
        keyword: Keyword,
        implementation: HookFn<W>,
    },
    Pickle {
        test_step_id: String,
        step: PickleStep,
    },
}

impl<W> Slot<W> {
    fn test_step_id(&self) -> &str {
        match self {
            Self::Hook { test_step_id, .. }
            | Self::Pickle { test_step_id, .. } => test_step_id,
        }
    }
}

/// Mutable cursor of the running attempt.
#[derive(Debug, Default)]
struct ExecutionState {
    test_case_started_id: String,
    remaining: VecDeque<usize>,
    finished: bool,
}

/// Collaborators shared by every test of a spec.
pub(crate) struct Shared<W> {
    pub(crate) registry: Rc<Registry<W>>,
    pub(crate) messages: Rc<RefCell<Vec<Envelope>>>,
    pub(crate) hook_failure: Cell<bool>,
    pub(crate) hints: StepDefinitionHints,
    pub(crate) interactive: bool,
}

/// Executable test produced by [`create_tests()`].
///
/// Every attempt is [`Executable::body()`] followed by exactly one
/// [`Executable::finish()`].
///
/// [`create_tests()`]: super::create_tests
pub struct Executable<W> {
    shared: Rc<Shared<W>>,
    pickle: Rc<Pickle>,
    test_case_id: String,
    slots: Vec<Slot<W>>,
    state: RefCell<ExecutionState>,
    attempt: Cell<u32>,
}

impl<W> fmt::Debug for Executable<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executable")
            .field("pickle", &self.pickle.name)
            .field("test_case_id", &self.test_case_id)
            .field("slots", &self.slots.len())
            .field("state", &self.state)
            .field("attempt", &self.attempt.get())
            .finish_non_exhaustive()
    }
}

impl<W> Executable<W> {
    pub(crate) fn new(
        shared: Rc<Shared<W>>,
        pickle: Rc<Pickle>,
        test_case_id: String,
        slots: Vec<Slot<W>>,
    ) -> Self {
        Self {
            shared,
            pickle,
            test_case_id,
            slots,
            state: RefCell::default(),
            attempt: Cell::new(0),
        }
    }

    /// Pickle this test runs.
    #[must_use]
    pub fn pickle(&self) -> &Pickle {
        &self.pickle
    }

    /// Number of attempts started so far.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempt.get()
    }

    /// Fresh `testCaseStarted` id and the full list of steps remaining.
    fn reset(&self) {
        let mut st = self.state.borrow_mut();
        st.test_case_started_id = self.shared.registry.ids().next_id();
        st.remaining = (0..self.slots.len()).collect();
        st.finished = false;
    }

    fn emit(&self, envelope: Envelope) {
        self.shared.messages.borrow_mut().push(envelope);
    }

    fn started_id(&self) -> String {
        self.state.borrow().test_case_started_id.clone()
    }

    fn step_started(&self, test_step_id: &str, at: Timestamp) {
        self.emit(Envelope::TestStepStarted(TestStepStarted {
            test_step_id: test_step_id.to_owned(),
            test_case_started_id: self.started_id(),
            timestamp: at,
        }));
    }

    fn step_finished(
        &self,
        test_step_id: &str,
        status: Status,
        duration: Duration,
        message: Option<String>,
    ) {
        self.emit(Envelope::TestStepFinished(TestStepFinished {
            test_step_id: test_step_id.to_owned(),
            test_case_started_id: self.started_id(),
            test_step_result: TestStepResult { status, duration, message },
            timestamp: Timestamp::now(),
        }));
    }

    /// Emits a skipped pair for every remaining step and empties the queue.
    fn skip_remaining(&self) {
        let remaining = std::mem::take(&mut self.state.borrow_mut().remaining);
        for i in remaining {
            let id = self.slots[i].test_step_id();
            self.step_started(id, Timestamp::now());
            self.step_finished(id, Status::Skipped, Duration::ZERO, None);
        }
    }

    fn pop(&self) {
        _ = self.state.borrow_mut().remaining.pop_front();
    }

    fn scope(&self, test_step_id: &str) -> Scope {
        let messages = Rc::clone(&self.shared.messages);
        let started_id = self.started_id();
        let test_step_id = test_step_id.to_owned();
        let attach = move |body: String, content_encoding, media_type: String| {
            messages.borrow_mut().push(Envelope::Attachment(Attachment {
                test_case_started_id: started_id.clone(),
                test_step_id: test_step_id.clone(),
                body,
                media_type,
                content_encoding,
            }));
        };
        Scope::default()
            .with_pickle(Rc::clone(&self.pickle))
            .with_attach(Rc::new(attach))
    }

    /// Runs one attempt of this test against the `world`.
    ///
    /// # Errors
    ///
    /// If some step or hook fails. The steps left unfinished are completed
    /// by [`Executable::finish()`].
    pub async fn body(&self, world: &mut W) -> Result<Verdict, Failure> {
        self.reset();
        self.shared.registry.acquire();

        let attempt = self.attempt.replace(self.attempt.get() + 1);
        self.emit(Envelope::TestCaseStarted(TestCaseStarted {
            id: self.started_id(),
            test_case_id: self.test_case_id.clone(),
            attempt,
            timestamp: Timestamp::now(),
        }));

        for slot in self.slots.iter() {
            let id = slot.test_step_id();
            let start = Instant::now();
            self.step_started(id, Timestamp::now());

            match slot {
                Slot::Hook { keyword, implementation, .. } => {
                    let ctx = hook::Context::new(self.scope(id), *keyword);
                    let res = AssertUnwindSafe(implementation(world, ctx))
                        .catch_unwind()
                        .await;
                    let message = match res {
                        Ok(Ok(())) => None,
                        Ok(Err(e)) => Some(format!("{e:#}")),
                        Err(panic) => Some(panic_message(&*panic)),
                    };
                    if let Some(message) = message {
                        tracing::debug!(%keyword, %message, "hook failed");
                        self.step_finished(
                            id,
                            Status::Failed,
                            start.elapsed().into(),
                            Some(message.clone()),
                        );
                        self.pop();
                        self.skip_remaining();
                        return Err(Failure::Hook {
                            keyword: *keyword,
                            message,
                        });
                    }
                    self.step_finished(
                        id,
                        Status::Passed,
                        start.elapsed().into(),
                        None,
                    );
                    self.pop();
                }
                Slot::Pickle { step, .. } => {
                    let argument = step
                        .argument
                        .as_ref()
                        .and_then(StepArgument::from_pickle);
                    let scope = self.scope(id).with_step(step.clone());
                    let fut = self
                        .shared
                        .registry
                        .run_step_definition(world, &step.text, argument, scope)
                        .map_err(|e| self.run_failure(&step.text, e))?;
                    let res = AssertUnwindSafe(fut).catch_unwind().await;
                    let outcome = match res {
                        Ok(Ok(outcome)) => outcome,
                        Ok(Err(e)) => {
                            return Err(Failure::Step(format!("{e:#}")));
                        }
                        Err(panic) => {
                            return Err(Failure::Panic(panic_message(&*panic)));
                        }
                    };

                    tracing::trace!(
                        step = %step.text,
                        ?outcome,
                        duration = %humantime::format_duration(start.elapsed()),
                        "step finished",
                    );

                    match outcome {
                        Outcome::Pending => {
                            self.step_finished(
                                id,
                                Status::Pending,
                                start.elapsed().into(),
                                None,
                            );
                            self.pop();
                            self.skip_remaining();
                            return Ok(Verdict::Skipped);
                        }
                        Outcome::Passed => {
                            self.step_finished(
                                id,
                                Status::Passed,
                                start.elapsed().into(),
                                None,
                            );
                            self.pop();
                        }
                    }
                }
            }
        }

        Ok(Verdict::Passed)
    }

    fn run_failure(&self, text: &str, err: RunError) -> Failure {
        match err {
            RunError::Resolve(ResolveError::Missing(_)) => {
                Failure::Missing(missing::message(
                    text,
                    &self.shared.hints,
                    self.shared.interactive,
                ))
            }
            RunError::Resolve(e @ ResolveError::Ambiguous(_)) => {
                Failure::Ambiguous(e.to_string())
            }
            e @ RunError::Transform { .. } => Failure::Transform(e.to_string()),
        }
    }

    /// Completes the current attempt, given the `error` message it failed
    /// with, if any.
    ///
    /// Subsequent calls for the same attempt are no-ops.
    pub fn finish(&self, error: Option<&str>) {
        if self.state.borrow().finished {
            return;
        }
        self.shared.registry.release();

        let hook_failure = error.is_some_and(is_hook_failure);
        if hook_failure {
            self.shared.hook_failure.set(true);
        }

        let first = self.state.borrow_mut().remaining.pop_front();
        if let (Some(i), false) = (first, hook_failure) {
            let id = self.slots[i].test_step_id();
            let message = error.unwrap_or("Step did not finish");
            let status = if message.contains(MISSING_SIGNATURE) {
                Status::Undefined
            } else {
                Status::Failed
            };
            let message =
                (status != Status::Undefined).then(|| message.to_owned());
            self.step_finished(id, status, Duration::ZERO, message);
            self.skip_remaining();
        }

        self.emit(Envelope::TestCaseFinished(TestCaseFinished {
            test_case_started_id: self.started_id(),
            timestamp: Timestamp::now(),
            will_be_retried: false,
        }));

        let mut st = self.state.borrow_mut();
        st.remaining.clear();
        st.finished = true;
    }
}

/// Payload of a caught panic as text.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(&s) = payload.downcast_ref::<&str>() {
        s.to_owned()
    } else {
        "(Could not resolve panic payload)".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::{is_hook_failure, Failure, Keyword};

    #[test]
    fn hook_failures_are_recognized_by_text() {
        let err = Failure::Hook {
            keyword: Keyword::Before,
            message: "boom".into(),
        };

        assert!(is_hook_failure(&err.to_string()));
        assert!(!is_hook_failure("boom"));
    }
}
