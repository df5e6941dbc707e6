use std::{
    convert::Infallible,
    rc::Rc,
    sync::atomic::{AtomicUsize, Ordering},
};

use cucumber_preprocessor::{
    compose::{self, Options},
    message::{Envelope, NdjsonFile, Status},
    parser,
    runner::Basic,
    Context, Outcome, RegistryBuilder, Spec, World,
};
use futures::FutureExt as _;

#[derive(Debug, Default)]
struct Calc {
    a: i64,
    b: i64,
}

impl World for Calc {
    type Error = Infallible;

    async fn new() -> Result<Self, Infallible> {
        Ok(Self::default())
    }
}

const SUM: &str = "\
Feature: Sum
  Scenario: adding
    Given a is 1
    And b is 2
    Then sum is 3
";

fn arithmetic(r: &mut RegistryBuilder<Calc>) {
    r.define_step("a is {int}", |w, ctx: Context| {
        async move {
            w.a = *ctx.get::<i64>(0).unwrap();
            Ok(Outcome::Passed)
        }
        .boxed_local()
    })
    .unwrap()
    .define_step("b is {int}", |w, ctx: Context| {
        async move {
            w.b = *ctx.get::<i64>(0).unwrap();
            Ok(Outcome::Passed)
        }
        .boxed_local()
    })
    .unwrap();
}

fn sum_is(r: &mut RegistryBuilder<Calc>) {
    r.define_step("sum is {int}", |w, ctx: Context| {
        async move {
            let expected = *ctx.get::<i64>(0).unwrap();
            anyhow::ensure!(
                w.a + w.b == expected,
                "{} + {} != {expected}",
                w.a,
                w.b,
            );
            Ok(Outcome::Passed)
        }
        .boxed_local()
    })
    .unwrap();
}

fn init_tracing() {
    _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

fn compose(
    feature: &str,
    register: impl FnOnce(&mut RegistryBuilder<Calc>),
    options: Options,
) -> Spec<Calc> {
    init_tracing();
    let ids = Rc::new(cucumber_preprocessor::IdGenerator::incrementing());
    let mut builder = RegistryBuilder::new(Rc::clone(&ids));
    register(&mut builder);
    let registry = Rc::new(builder.finalize().unwrap());
    let parsed = parser::parse("features/a.feature", feature, &ids).unwrap();

    compose::create_tests(
        registry,
        &parsed.source,
        &parsed.document,
        &parsed.pickles,
        options,
    )
}

fn both(r: &mut RegistryBuilder<Calc>) {
    arithmetic(r);
    sum_is(r);
}

/// Kinds of the envelopes following the first `testCaseStarted`.
fn run_kinds(messages: &[Envelope]) -> Vec<&'static str> {
    messages
        .iter()
        .skip_while(|e| !matches!(e, Envelope::TestCaseStarted(_)))
        .map(Envelope::kind)
        .collect()
}

fn statuses(messages: &[Envelope]) -> Vec<Status> {
    messages
        .iter()
        .filter_map(|e| match e {
            Envelope::TestStepFinished(f) => Some(f.test_step_result.status),
            _ => None,
        })
        .collect()
}

fn count(messages: &[Envelope], kind: &str) -> usize {
    messages.iter().filter(|e| e.kind() == kind).count()
}

#[tokio::test]
async fn passing_scenario_emits_ordered_messages() {
    let spec = compose(SUM, both, Options::default());

    let summary = Basic::new().run(&spec).await;
    let messages = spec.messages();

    assert_eq!(summary.passed, 1);
    assert_eq!(
        messages.iter().take(3).map(Envelope::kind).collect::<Vec<_>>(),
        ["source", "gherkinDocument", "pickle"],
    );
    assert_eq!(
        run_kinds(&messages),
        [
            "testCaseStarted",
            "testStepStarted",
            "testStepFinished",
            "testStepStarted",
            "testStepFinished",
            "testStepStarted",
            "testStepFinished",
            "testCaseFinished",
        ],
    );
    assert_eq!(statuses(&messages), [Status::Passed; 3]);
    assert!(messages.iter().any(|e| matches!(
        e,
        Envelope::TestCaseFinished(f) if !f.will_be_retried,
    )));
}

#[tokio::test]
async fn pending_step_skips_the_rest() {
    let feature = format!("{SUM}    And nothing else\n");
    let spec = compose(
        &feature,
        |r| {
            arithmetic(r);
            r.define_step("sum is {int}", |_, _| {
                async { Ok("pending".into()) }.boxed_local()
            })
            .unwrap()
            .define_step("nothing else", |_, _| {
                async { Ok(Outcome::Passed) }.boxed_local()
            })
            .unwrap();
        },
        Options::default(),
    );

    let summary = Basic::new().run(&spec).await;

    assert_eq!(summary.pending, 1);
    assert_eq!(summary.passed, 0);
    assert_eq!(
        statuses(&spec.messages()),
        [Status::Passed, Status::Passed, Status::Pending, Status::Skipped],
    );
    assert_eq!(run_kinds(&spec.messages()).last(), Some(&"testCaseFinished"));
}

const BREAKING: &str = "\
Feature: Breaking
  Scenario: breaks
    Given a is 1
    When it breaks
    Then sum is 3
";

#[tokio::test]
async fn failing_step_skips_later_steps_and_hooks() {
    let spec = compose(
        BREAKING,
        |r| {
            both(r);
            r.define_step("it breaks", |_, _| {
                async { Err::<Outcome, _>(anyhow::anyhow!("kaboom")) }
                    .boxed_local()
            })
            .unwrap()
            .define_after(None, |_, _| async { Ok(()) }.boxed_local())
            .unwrap();
        },
        Options::default(),
    );

    let summary = Basic::new().run(&spec).await;
    let messages = spec.messages();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.failures[0].1, "kaboom");
    assert_eq!(
        statuses(&messages),
        [Status::Passed, Status::Failed, Status::Skipped, Status::Skipped],
    );

    let failed = messages.iter().find_map(|e| match e {
        Envelope::TestStepFinished(f)
            if f.test_step_result.status == Status::Failed =>
        {
            f.test_step_result.message.clone()
        }
        _ => None,
    });
    assert_eq!(failed.as_deref(), Some("kaboom"));

    // Every finished step was started right before.
    let kinds = run_kinds(&messages);
    assert_eq!(count(&messages, "testStepStarted"), 4);
    assert_eq!(count(&messages, "testStepFinished"), 4);
    for pair in kinds[1..kinds.len() - 1].chunks(2) {
        assert_eq!(pair, ["testStepStarted", "testStepFinished"]);
    }
    let mut started = None;
    for e in &messages {
        match e {
            Envelope::TestStepStarted(s) => started = Some(&s.test_step_id),
            Envelope::TestStepFinished(f) => {
                assert_eq!(started.take(), Some(&f.test_step_id));
            }
            _ => {}
        }
    }
    assert_eq!(kinds.last(), Some(&"testCaseFinished"));
}

const TAGGED: &str = "\
Feature: Tagged
  @run
  Scenario: selected
    Given a is 1

  Scenario: filtered
    Given a is 2

  @run @skip
  Scenario: skipped
    Given a is 3
";

#[tokio::test]
async fn filtered_tests_still_emit_their_test_case() {
    let options = Options {
        tags: Some("@run".parse().unwrap()),
        ..Options::default()
    };
    let spec = compose(TAGGED, arithmetic, options);

    let tests = spec.tests();
    assert_eq!(tests.len(), 3);
    assert_eq!(
        tests.iter().map(|t| t.executable.is_some()).collect::<Vec<_>>(),
        [true, false, false],
    );

    let summary = Basic::new().run(&spec).await;
    assert_eq!((summary.passed, summary.skipped), (1, 2));

    let messages = spec.messages();
    assert_eq!(count(&messages, "testCase"), 3);
    assert_eq!(count(&messages, "testCaseStarted"), 1);
}

#[tokio::test]
async fn omitted_tests_are_left_out_of_the_tree() {
    let options = Options {
        tags: Some("@run".parse().unwrap()),
        omit_filtered: true,
        ..Options::default()
    };
    let spec = compose(TAGGED, arithmetic, options);

    assert_eq!(
        spec.tests().iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
        ["selected"],
    );
    assert_eq!(count(&spec.messages(), "testCase"), 3);
}

#[test]
fn focus_overrides_external_tags() {
    let feature = "\
Feature: Focused
  Scenario: plain
    Given a is 1

  @focus
  Scenario: focused
    Given a is 2
";
    let options = Options {
        tags: Some("@other".parse().unwrap()),
        ..Options::default()
    };
    let spec = compose(feature, arithmetic, options);

    let runnable = spec
        .tests()
        .into_iter()
        .filter(|t| t.executable.is_some())
        .map(|t| t.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(runnable, ["focused"]);
}

#[test]
fn examples_expand_into_named_tests() {
    let feature = "\
Feature: Outline
  Scenario Outline: sums
    Given a is <a>

    Examples:
      | a |
      | 1 |
      | 2 |
      | 3 |
";
    let spec = compose(feature, arithmetic, Options::default());

    assert_eq!(
        spec.tests().iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
        ["sums (example #1)", "sums (example #2)", "sums (example #3)"],
    );
}

#[test]
fn rules_without_matching_pickles_are_omitted() {
    let feature = "\
Feature: Rules
  Rule: first
    @run
    Scenario: one
      Given a is 1

  Rule: second
    Scenario: two
      Given a is 2
";
    let options = Options {
        tags: Some("@run".parse().unwrap()),
        omit_filtered: true,
        ..Options::default()
    };
    let spec = compose(feature, arithmetic, options);

    let compose::Node::Suite { children, .. } = &spec.tree()[0] else {
        panic!("expected a feature suite");
    };
    assert_eq!(children.len(), 1);
    assert!(matches!(
        &children[0],
        compose::Node::Suite { name, .. } if name == "first",
    ));
}

static FLAKY_CALLS: AtomicUsize = AtomicUsize::new(0);

#[tokio::test]
async fn retries_start_a_fresh_attempt() {
    let spec = compose(
        SUM,
        |r| {
            arithmetic(r);
            r.define_step("sum is {int}", |_, _| {
                async {
                    let calls = FLAKY_CALLS.fetch_add(1, Ordering::SeqCst);
                    anyhow::ensure!(calls > 0, "flaky");
                    Ok(Outcome::Passed)
                }
                .boxed_local()
            })
            .unwrap();
        },
        Options::default(),
    );

    let summary = Basic::new().retries(1).run(&spec).await;
    let messages = spec.messages();

    assert_eq!((summary.passed, summary.failed), (1, 0));
    let started = messages
        .iter()
        .filter_map(|e| match e {
            Envelope::TestCaseStarted(s) => Some((s.id.clone(), s.attempt)),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(started.len(), 2);
    assert_eq!((started[0].1, started[1].1), (0, 1));

    // Finishing an attempt draws no id of its own.
    let first = started[0].0.parse::<u64>().unwrap();
    let second = started[1].0.parse::<u64>().unwrap();
    assert_eq!(second, first + 1);

    assert_eq!(
        statuses(&messages),
        [
            Status::Passed,
            Status::Passed,
            Status::Failed,
            Status::Passed,
            Status::Passed,
            Status::Passed,
        ],
    );
}

#[tokio::test]
async fn missing_definition_is_undefined_and_explained() {
    let spec = compose(SUM, arithmetic, Options::default());

    let summary = Basic::new().run(&spec).await;

    assert_eq!(summary.failed, 1);
    let (name, error) = &summary.failures[0];
    assert_eq!(name, "adding");
    assert!(
        error.starts_with("Step implementation missing for \"sum is 3\"."),
        "{error}",
    );
    assert!(error.contains("matched **no files**"), "{error}");

    let undefined = spec.messages().into_iter().find_map(|e| match e {
        Envelope::TestStepFinished(f)
            if f.test_step_result.status == Status::Undefined =>
        {
            Some(f.test_step_result)
        }
        _ => None,
    });
    assert!(undefined.is_some_and(|r| r.message.is_none()));
}

#[tokio::test]
async fn ambiguous_definitions_fail_the_step() {
    let spec = compose(
        SUM,
        |r| {
            both(r);
            let re = regex::Regex::new(r"^sum is (\d+)$").unwrap();
            r.define_step(re, |_, _| {
                async { Ok(Outcome::Passed) }.boxed_local()
            })
            .unwrap();
        },
        Options::default(),
    );

    let summary = Basic::new().run(&spec).await;
    let messages = spec.messages();

    assert_eq!(summary.failed, 1);
    let error = &summary.failures[0].1;
    assert!(
        error.starts_with("Multiple matching step definitions for: sum is 3"),
        "{error}",
    );
    assert_eq!(
        statuses(&messages),
        [Status::Passed, Status::Passed, Status::Failed],
    );
    let message = messages.iter().find_map(|e| match e {
        Envelope::TestStepFinished(f)
            if f.test_step_result.status == Status::Failed =>
        {
            f.test_step_result.message.clone()
        }
        _ => None,
    });
    assert_eq!(message.as_ref(), Some(error));
}

#[tokio::test]
async fn hook_failure_skips_the_rest_and_the_report() {
    let spec = compose(
        SUM,
        |r| {
            both(r);
            r.define_before(None, |_, _| {
                async { Err::<(), _>(anyhow::anyhow!("no database")) }
                    .boxed_local()
            })
            .unwrap();
        },
        Options { messages_enabled: true, ..Options::default() },
    );

    let summary = Basic::new().run(&spec).await;

    assert_eq!(summary.failed, 1);
    assert!(spec.hook_failure());
    assert_eq!(
        statuses(&spec.messages()),
        [Status::Failed, Status::Skipped, Status::Skipped, Status::Skipped],
    );

    let dir = tempfile::tempdir().unwrap();
    let mut sink = NdjsonFile::new(dir.path().join("messages.ndjson"));
    spec.finish(&mut sink).unwrap();
    assert!(!sink.path().exists());
}

#[tokio::test]
async fn attachments_and_ndjson_report() {
    let spec = compose(
        SUM,
        |r| {
            arithmetic(r);
            r.define_step("sum is {int}", |_, ctx| {
                async move {
                    ctx.attach("hello", "text/plain");
                    Ok(Outcome::Passed)
                }
                .boxed_local()
            })
            .unwrap();
        },
        Options { messages_enabled: true, ..Options::default() },
    );

    _ = Basic::new().run(&spec).await;
    assert!(spec.messages().iter().any(|e| matches!(
        e,
        Envelope::Attachment(a)
            if a.body == "hello" && a.media_type == "text/plain",
    )));

    let dir = tempfile::tempdir().unwrap();
    let mut sink = NdjsonFile::new(dir.path().join("out/messages.ndjson"));
    spec.finish(&mut sink).unwrap();

    let written = std::fs::read_to_string(sink.path()).unwrap();
    let lines = written
        .lines()
        .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap())
        .collect::<Vec<_>>();
    assert!(lines[0].get("source").is_some());
    assert!(lines.last().unwrap().get("testRunFinished").is_some());
    assert!(lines
        .iter()
        .any(|l| l["attachment"]["contentEncoding"] == "IDENTITY"));
}
