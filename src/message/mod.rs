// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [Cucumber messages][1] protocol: discriminated [`Envelope`]s emitted in
//! execution order, and the [`MessageSink`]s consuming them.
//!
//! [1]: https://github.com/cucumber/messages

mod sink;

use std::time::{self, SystemTime};

use serde::Serialize;

use crate::{ast, pickle::Pickle};

#[doc(inline)]
pub use self::sink::{Collector, MessageSink, Ndjson, NdjsonFile, Report};

/// Media type of feature file [`Source`]s.
pub const GHERKIN_MEDIA_TYPE: &str = "text/x.cucumber.gherkin+plain";

/// Single message of the protocol, serialized as `{"<kind>": {...}}`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Envelope {
    Source(Source),
    GherkinDocument(ast::GherkinDocument),
    Pickle(Pickle),
    StepDefinition(StepDefinition),
    Hook(Hook),
    TestRunStarted(TestRunStarted),
    TestCase(TestCase),
    TestCaseStarted(TestCaseStarted),
    TestStepStarted(TestStepStarted),
    TestStepFinished(TestStepFinished),
    TestCaseFinished(TestCaseFinished),
    TestRunFinished(TestRunFinished),
    Attachment(Attachment),
}

/// Point in time since [`UNIX_EPOCH`].
///
/// [`UNIX_EPOCH`]: time::UNIX_EPOCH
#[derive(
    Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct Timestamp {
    pub seconds: u64,
    pub nanos: u32,
}

impl Timestamp {
    /// Current [`Timestamp`].
    #[must_use]
    pub fn now() -> Self {
        Self::from(SystemTime::now())
    }
}

impl From<SystemTime> for Timestamp {
    fn from(at: SystemTime) -> Self {
        let since = at.duration_since(time::UNIX_EPOCH).unwrap_or_default();
        Self { seconds: since.as_secs(), nanos: since.subsec_nanos() }
    }
}

/// Elapsed time of a step.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct Duration {
    pub seconds: u64,
    pub nanos: u32,
}

impl Duration {
    /// Zero [`Duration`] of synthesized results.
    pub const ZERO: Self = Self { seconds: 0, nanos: 0 };
}

impl From<time::Duration> for Duration {
    fn from(d: time::Duration) -> Self {
        Self { seconds: d.as_secs(), nanos: d.subsec_nanos() }
    }
}

/// Result status of a test step.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Unknown,
    Passed,
    Skipped,
    Pending,
    Undefined,
    Ambiguous,
    Failed,
}

/// Feature file text.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub uri: String,
    pub data: String,
    pub media_type: &'static str,
}

/// Where a definition lives.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceReference {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<ast::Location>,
}

impl From<Option<&crate::step::Location>> for SourceReference {
    fn from(loc: Option<&crate::step::Location>) -> Self {
        loc.map_or_else(Self::default, |l| Self {
            uri: Some(l.path.clone()),
            location: Some(ast::Location::new(
                l.line as usize,
                l.column as usize,
            )),
        })
    }
}

/// Registered step definition.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDefinition {
    pub id: String,
    pub pattern: StepDefinitionPattern,
    pub source_reference: SourceReference,
}

#[derive(Clone, Debug, Serialize)]
pub struct StepDefinitionPattern {
    pub source: String,
    #[serde(rename = "type")]
    pub ty: PatternType,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatternType {
    CucumberExpression,
    RegularExpression,
}

/// Registered `Before` or `After` hook.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Hook {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_expression: Option<String>,
    pub source_reference: SourceReference,
}

#[derive(Clone, Debug, Serialize)]
pub struct TestRunStarted {
    pub timestamp: Timestamp,
}

/// Static shape of a test's execution, emitted at collection time.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub id: String,
    pub pickle_id: String,
    pub test_steps: Vec<TestStep>,
}

/// Single slot of a [`TestCase`]: a hook, or a pickle step with the ids of
/// every definition it matched at collection time.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestStep {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hook_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pickle_step_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_definition_ids: Option<Vec<String>>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseStarted {
    pub id: String,
    pub test_case_id: String,
    pub attempt: u32,
    pub timestamp: Timestamp,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestStepStarted {
    pub test_step_id: String,
    pub test_case_started_id: String,
    pub timestamp: Timestamp,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestStepFinished {
    pub test_step_id: String,
    pub test_case_started_id: String,
    pub test_step_result: TestStepResult,
    pub timestamp: Timestamp,
}

#[derive(Clone, Debug, Serialize)]
pub struct TestStepResult {
    pub status: Status,
    pub duration: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseFinished {
    pub test_case_started_id: String,
    pub timestamp: Timestamp,
    pub will_be_retried: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct TestRunFinished {
    pub timestamp: Timestamp,
}

/// Encoding of an [`Attachment::body`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentEncoding {
    Identity,
    Base64,
}

/// Data attached by a step or hook.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub test_case_started_id: String,
    pub test_step_id: String,
    pub body: String,
    pub media_type: String,
    pub content_encoding: ContentEncoding,
}

impl Envelope {
    /// Name of this [`Envelope`]'s kind, as it appears on the wire.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Source(_) => "source",
            Self::GherkinDocument(_) => "gherkinDocument",
            Self::Pickle(_) => "pickle",
            Self::StepDefinition(_) => "stepDefinition",
            Self::Hook(_) => "hook",
            Self::TestRunStarted(_) => "testRunStarted",
            Self::TestCase(_) => "testCase",
            Self::TestCaseStarted(_) => "testCaseStarted",
            Self::TestStepStarted(_) => "testStepStarted",
            Self::TestStepFinished(_) => "testStepFinished",
            Self::TestCaseFinished(_) => "testCaseFinished",
            Self::TestRunFinished(_) => "testRunFinished",
            Self::Attachment(_) => "attachment",
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time;

    use serde_json::json;

    use super::{
        Duration, Envelope, Status, TestStepFinished, TestStepResult,
        Timestamp,
    };

    #[test]
    fn serializes_externally_tagged_camel_case() {
        let env = Envelope::TestStepFinished(TestStepFinished {
            test_step_id: "1".into(),
            test_case_started_id: "2".into(),
            test_step_result: TestStepResult {
                status: Status::Passed,
                duration: Duration::ZERO,
                message: None,
            },
            timestamp: Timestamp { seconds: 3, nanos: 4 },
        });

        assert_eq!(env.kind(), "testStepFinished");
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            json!({
                "testStepFinished": {
                    "testStepId": "1",
                    "testCaseStartedId": "2",
                    "testStepResult": {
                        "status": "PASSED",
                        "duration": { "seconds": 0, "nanos": 0 },
                    },
                    "timestamp": { "seconds": 3, "nanos": 4 },
                },
            }),
        );
    }

    #[test]
    fn timestamps_split_seconds_and_nanos() {
        let at = time::UNIX_EPOCH + time::Duration::from_millis(1_500);

        assert_eq!(
            Timestamp::from(at),
            Timestamp { seconds: 1, nanos: 500_000_000 },
        );
    }
}
