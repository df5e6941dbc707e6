// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Composition of runnable tests out of a parsed feature file.
//!
//! [`create_tests()`] walks the [`GherkinDocument`] depth-first, producing a
//! [`Spec`]: a tree of suites and tests for a host runner, and the message
//! stream those tests append to while they run.
//!
//! Messages known at collection time are emitted right away, in this order:
//! `source`, `gherkinDocument`, every `pickle`, every `stepDefinition` and
//! `hook`, `testRunStarted`, then one `testCase` per collected test.

mod execution;
mod missing;

use std::{
    cell::{Cell, RefCell},
    io,
    rc::Rc,
};

use lazy_regex::regex_captures;

use crate::{
    ast::{FeatureChild, GherkinDocument, Rule, RuleChild, Scenario},
    hook::Hook,
    message::{
        Envelope, MessageSink, Report, Source, TestCase, TestRunFinished,
        TestRunStarted, TestStep, Timestamp, GHERKIN_MEDIA_TYPE,
    },
    pickle::Pickle,
    registry::Registry,
    step_definitions::StepDefinitionHints,
    tag::{Ext as _, TagExpression},
};

use self::execution::{Shared, Slot};

#[doc(inline)]
pub use self::{
    execution::{is_hook_failure, Executable, Failure, Verdict},
    missing::MISSING_SIGNATURE,
};

/// Options of [`create_tests()`].
#[derive(Clone, Debug, Default)]
pub struct Options {
    /// Leave tests filtered out by tags entirely out of the tree, instead of
    /// listing them as skipped.
    pub omit_filtered: bool,

    /// Flush the message stream at the end of the run.
    pub messages_enabled: bool,

    /// Externally supplied tag filter.
    pub tags: Option<TagExpression>,

    /// Where step definitions were searched for, used to explain missing
    /// ones.
    pub hints: StepDefinitionHints,

    /// Whether the host runner is interactive.
    pub interactive: bool,
}

/// Node of a [`Spec`]'s test tree.
pub enum Node<W> {
    /// Named group of nodes: a feature or a rule.
    Suite {
        /// Name of the suite.
        name: String,

        /// Children in source order.
        children: Vec<Node<W>>,
    },

    /// Single test.
    Test(Test<W>),
}

// Manual impl to avoid `W: Debug` bound.
impl<W> std::fmt::Debug for Node<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Suite { name, children } => f
                .debug_struct("Suite")
                .field("name", name)
                .field("children", children)
                .finish(),
            Self::Test(test) => f.debug_tuple("Test").field(test).finish(),
        }
    }
}

/// Test of a [`Spec`].
pub struct Test<W> {
    /// Name of the test.
    pub name: String,

    /// Runner options requested through tags.
    pub options: TestOptions,

    /// Body of the test, [`None`] if execution is skipped.
    pub executable: Option<Executable<W>>,
}

impl<W> std::fmt::Debug for Test<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Test")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("executable", &self.executable)
            .finish()
    }
}

/// Runner options requested through `@name(value)` tags.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TestOptions {
    /// Retries of a failing test, from `@retries(n)`.
    pub retries: Option<u32>,
}

impl TestOptions {
    /// Collects options out of tag names.
    ///
    /// Unknown and malformed options are ignored.
    #[must_use]
    pub fn from_tags<'t>(tags: impl IntoIterator<Item = &'t str>) -> Self {
        let mut options = Self::default();
        for tag in tags {
            let Some((_, name, value)) =
                regex_captures!(r"^@([a-zA-Z]+)\((.*)\)$", tag)
            else {
                continue;
            };
            match name {
                "retries" => options.retries = value.trim().parse().ok(),
                _ => tracing::debug!(tag, "ignoring unknown test option"),
            }
        }
        options
    }
}

/// Runnable tests of one feature file, together with their message stream.
pub struct Spec<W> {
    uri: String,
    tree: Vec<Node<W>>,
    shared: Rc<Shared<W>>,
    messages_enabled: bool,
}

impl<W> std::fmt::Debug for Spec<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Spec")
            .field("uri", &self.uri)
            .field("tree", &self.tree)
            .field("messages", &self.shared.messages.borrow().len())
            .finish_non_exhaustive()
    }
}

impl<W> Spec<W> {
    /// URI of the feature file.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Top-level nodes: at most one feature suite.
    #[must_use]
    pub fn tree(&self) -> &[Node<W>] {
        &self.tree
    }

    /// Every test, depth-first.
    #[must_use]
    pub fn tests(&self) -> Vec<&Test<W>> {
        fn walk<'n, W>(nodes: &'n [Node<W>], out: &mut Vec<&'n Test<W>>) {
            for node in nodes {
                match node {
                    Node::Suite { children, .. } => walk(children, out),
                    Node::Test(t) => out.push(t),
                }
            }
        }
        let mut out = vec![];
        walk(&self.tree, &mut out);
        out
    }

    /// Snapshot of the message stream so far.
    #[must_use]
    pub fn messages(&self) -> Vec<Envelope> {
        self.shared.messages.borrow().clone()
    }

    /// Indicates whether some test failed inside a hook.
    #[must_use]
    pub fn hook_failure(&self) -> bool {
        self.shared.hook_failure.get()
    }

    /// Ends the run: emits `testRunFinished` and flushes the stream into the
    /// `sink`, if messages are enabled.
    ///
    /// # Errors
    ///
    /// If the `sink` fails.
    pub fn finish(self, mut sink: impl MessageSink) -> io::Result<()> {
        let mut messages = self.shared.messages.borrow_mut();
        messages.push(Envelope::TestRunFinished(TestRunFinished {
            timestamp: Timestamp::now(),
        }));
        if !self.messages_enabled {
            return Ok(());
        }
        tracing::debug!(
            spec = %self.uri,
            messages = messages.len(),
            "flushing messages",
        );
        let report = Report {
            uri: &self.uri,
            envelopes: &messages,
            hook_failure: self.shared.hook_failure.get(),
        };
        sink.flush(report)
    }
}

/// Composes the runnable tests of a parsed feature file.
///
/// The `registry` is shared by all the tests and activated by each of them
/// for the duration of an attempt.
pub fn create_tests<W>(
    registry: Rc<Registry<W>>,
    source: &str,
    document: &GherkinDocument,
    pickles: &[Pickle],
    options: Options,
) -> Spec<W> {
    let Options {
        omit_filtered,
        messages_enabled,
        tags,
        hints,
        interactive,
    } = options;

    let mut messages = vec![
        Envelope::Source(Source {
            uri: document.uri.clone(),
            data: source.to_owned(),
            media_type: GHERKIN_MEDIA_TYPE,
        }),
        Envelope::GherkinDocument(document.clone()),
    ];
    messages.extend(pickles.iter().cloned().map(Envelope::Pickle));
    messages.extend(registry.envelopes());
    messages.push(Envelope::TestRunStarted(TestRunStarted {
        timestamp: Timestamp::now(),
    }));

    let focused = document
        .tags()
        .iter()
        .any(|t| t.name == "@only" || t.name == "@focus");
    let filter =
        if focused { Some(TagExpression::only_or_focus()) } else { tags };
    tracing::debug!(
        uri = %document.uri,
        filter = %filter
            .as_ref()
            .map_or_else(|| "<none>".to_owned(), ToString::to_string),
        "composing tests",
    );

    let composer = Composer {
        shared: Rc::new(Shared {
            registry,
            messages: Rc::new(RefCell::new(messages)),
            hook_failure: Cell::new(false),
            hints,
            interactive,
        }),
        pickles,
        filter,
        omit_filtered,
    };

    let tree = document
        .feature
        .as_ref()
        .map(|feature| Node::Suite {
            name: non_empty(&feature.name, "<unnamed feature>"),
            children: feature
                .children
                .iter()
                .flat_map(|child| match child {
                    FeatureChild::Scenario(s) => composer.scenario(s),
                    FeatureChild::Rule(r) => {
                        composer.rule(r).into_iter().collect()
                    }
                    FeatureChild::Background(_) => vec![],
                })
                .collect(),
        })
        .into_iter()
        .collect();

    Spec {
        uri: document.uri.clone(),
        tree,
        shared: composer.shared,
        messages_enabled,
    }
}

fn non_empty(name: &str, fallback: &str) -> String {
    if name.is_empty() { fallback } else { name }.to_owned()
}

struct Composer<'p, W> {
    shared: Rc<Shared<W>>,
    pickles: &'p [Pickle],
    filter: Option<TagExpression>,
    omit_filtered: bool,
}

impl<W> Composer<'_, W> {
    fn pickle_by_ast_id(&self, id: &str) -> Option<&Pickle> {
        self.pickles.iter().find(|p| p.ast_node_ids.iter().any(|n| n == id))
    }

    /// Pickles of the `scenario` in example row order, or its only pickle.
    fn scenario_pickles(&self, scenario: &Scenario) -> Vec<&Pickle> {
        if scenario.examples.is_empty() {
            return self.pickle_by_ast_id(&scenario.id).into_iter().collect();
        }
        scenario
            .examples
            .iter()
            .flat_map(|e| &e.table_body)
            .filter_map(|row| self.pickle_by_ast_id(&row.id))
            .collect()
    }

    fn rule(&self, rule: &Rule) -> Option<Node<W>> {
        let scenarios = rule.children.iter().filter_map(RuleChild::scenario);
        if self.omit_filtered {
            let any = scenarios
                .clone()
                .flat_map(|s| self.scenario_pickles(s))
                .any(|p| self.filter.eval(p.tag_names()));
            if !any {
                tracing::debug!(
                    rule = %rule.name,
                    "omitting rule without matching pickles",
                );
                return None;
            }
        }
        Some(Node::Suite {
            name: non_empty(&rule.name, "<unnamed rule>"),
            children: scenarios.flat_map(|s| self.scenario(s)).collect(),
        })
    }

    fn scenario(&self, scenario: &Scenario) -> Vec<Node<W>> {
        let pickles = self.scenario_pickles(scenario);
        if scenario.examples.is_empty() {
            let name = non_empty(&scenario.name, "<unnamed scenario>");
            return pickles
                .into_iter()
                .filter_map(|p| self.test(name.clone(), p))
                .collect();
        }
        pickles
            .into_iter()
            .enumerate()
            .filter_map(|(i, p)| {
                let name = non_empty(&p.name, "<unnamed scenario>");
                self.test(format!("{name} (example #{})", i + 1), p)
            })
            .collect()
    }

    fn test(&self, name: String, pickle: &Pickle) -> Option<Node<W>> {
        let registry = &self.shared.registry;
        let ids = registry.ids();
        let tags = pickle.tag_names();

        let before = registry.resolve_before_hooks(tags.clone());
        let after = registry.resolve_after_hooks(tags.clone());

        let hook_slot = |h: &&Hook<W>| Slot::Hook {
            test_step_id: ids.next_id(),
            hook_id: h.id.clone(),
            keyword: h.keyword,
            implementation: Rc::clone(&h.implementation),
        };
        let slots = before
            .iter()
            .map(hook_slot)
            .chain(pickle.steps.iter().map(|step| Slot::Pickle {
                test_step_id: ids.next_id(),
                step: step.clone(),
            }))
            .chain(after.iter().map(hook_slot))
            .collect::<Vec<_>>();

        let test_steps = slots
            .iter()
            .map(|slot| match slot {
                Slot::Hook { test_step_id, hook_id, .. } => TestStep {
                    id: test_step_id.clone(),
                    hook_id: Some(hook_id.clone()),
                    pickle_step_id: None,
                    step_definition_ids: None,
                },
                Slot::Pickle { test_step_id, step } => TestStep {
                    id: test_step_id.clone(),
                    hook_id: None,
                    pickle_step_id: Some(step.id.clone()),
                    step_definition_ids: Some(
                        registry
                            .matching_step_definitions(&step.text)
                            .into_iter()
                            .map(|d| d.id.clone())
                            .collect(),
                    ),
                },
            })
            .collect();

        let test_case_id = ids.next_id();
        self.shared.messages.borrow_mut().push(Envelope::TestCase(TestCase {
            id: test_case_id.clone(),
            pickle_id: pickle.id.clone(),
            test_steps,
        }));

        let options = TestOptions::from_tags(tags.clone());
        let selected = self.filter.eval(tags.clone())
            && !tags.clone().any(|t| t == "@skip");
        if !selected {
            tracing::debug!(test = %name, "execution skipped by tags");
            return (!self.omit_filtered).then(|| {
                Node::Test(Test { name, options, executable: None })
            });
        }

        tracing::debug!(test = %name, steps = slots.len(), "test registered");
        Some(Node::Test(Test {
            name,
            options,
            executable: Some(Executable::new(
                Rc::clone(&self.shared),
                Rc::new(pickle.clone()),
                test_case_id,
                slots,
            )),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::TestOptions;

    #[test]
    fn retries_option_from_tags() {
        assert_eq!(
            TestOptions::from_tags(["@smoke", "@retries(3)", "@env(x)"]),
            TestOptions { retries: Some(3) },
        );
        assert_eq!(
            TestOptions::from_tags(["@retries(many)"]),
            TestOptions::default(),
        );
    }
}
