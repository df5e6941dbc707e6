// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Host runner of a composed [`Spec`].
//!
//! Runs tests sequentially, one [`World`] per attempt, and retries failing
//! tests. Timeouts are not supported.

use std::{rc::Rc, time::Instant};

use crate::{
    cli::Opts,
    compose::{create_tests, Spec, Test, Verdict},
    id::IdGenerator,
    message::Collector,
    parser, specs,
    step::{CallerLocator, Locator},
    step_definitions::StepLibrary,
    Result, World,
};

/// CLI options of a [`Basic`] runner.
#[derive(Clone, Copy, Debug, Default, clap::Args)]
#[group(skip)]
pub struct Cli {
    /// Number of times a failing test is retried.
    ///
    /// A `@retries(n)` tag on a scenario takes precedence.
    #[arg(long, value_name = "int", env = "RETRIES", global = true)]
    pub retries: Option<u32>,
}

/// Outcome of running a [`Spec`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Summary {
    /// Tests whose last attempt passed.
    pub passed: usize,

    /// Tests whose every attempt failed.
    pub failed: usize,

    /// Tests not executed because of tags.
    pub skipped: usize,

    /// Tests stopped by a pending step.
    pub pending: usize,

    /// Names of the failed tests along with their last failure.
    pub failures: Vec<(String, String)>,
}

impl Summary {
    /// Indicates whether no test failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Adds the counts of `other` to this [`Summary`].
    pub fn merge(&mut self, other: Self) {
        self.passed += other.passed;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.pending += other.pending;
        self.failures.extend(other.failures);
    }
}

/// Default sequential runner.
#[derive(Clone, Copy, Debug, Default)]
pub struct Basic {
    retries: u32,
}

impl Basic {
    /// Creates a new [`Basic`] runner without retries.
    #[must_use]
    pub const fn new() -> Self {
        Self { retries: 0 }
    }

    /// Retries every failing test up to `retries` times.
    #[must_use]
    pub const fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Applies the options of the given [`Cli`].
    #[must_use]
    pub fn with_cli(self, cli: Cli) -> Self {
        match cli.retries {
            Some(n) => self.retries(n),
            None => self,
        }
    }

    /// Runs every test of the `spec`, depth-first.
    pub async fn run<W: World>(&self, spec: &Spec<W>) -> Summary {
        let mut summary = Summary::default();
        for test in spec.tests() {
            self.run_test(test, &mut summary).await;
        }
        tracing::debug!(
            spec = spec.uri(),
            passed = summary.passed,
            failed = summary.failed,
            skipped = summary.skipped,
            pending = summary.pending,
            "spec finished",
        );
        summary
    }

    async fn run_test<W: World>(&self, test: &Test<W>, summary: &mut Summary) {
        let Some(exec) = &test.executable else {
            tracing::debug!(test = %test.name, "skipped");
            summary.skipped += 1;
            return;
        };

        let retries = test.options.retries.unwrap_or(self.retries);
        let mut attempt = 0;
        loop {
            let start = Instant::now();
            let error = match W::new().await {
                Ok(mut world) => match exec.body(&mut world).await {
                    Ok(verdict) => {
                        exec.finish(None);
                        tracing::debug!(
                            test = %test.name,
                            ?verdict,
                            took = %humantime::format_duration(start.elapsed()),
                            "test finished",
                        );
                        match verdict {
                            Verdict::Passed => summary.passed += 1,
                            Verdict::Skipped => summary.pending += 1,
                        }
                        return;
                    }
                    Err(failure) => {
                        let message = failure.to_string();
                        exec.finish(Some(&message));
                        message
                    }
                },
                // Nothing was started, so there is nothing to finish.
                Err(e) => format!("World initialization failed: {e}"),
            };

            if attempt < retries {
                attempt += 1;
                tracing::debug!(
                    test = %test.name,
                    attempt,
                    retries,
                    error = %error,
                    "retrying failed test",
                );
                continue;
            }

            tracing::debug!(test = %test.name, error = %error, "test failed");
            summary.failed += 1;
            summary.failures.push((test.name.clone(), error));
            return;
        }
    }
}

/// Runs every feature file configured by the `opts` with the definitions of
/// the `library`.
///
/// Message streams are written into the [`Opts::messages_sink()`], one spec
/// after another.
///
/// # Errors
///
/// If some feature file can't be discovered, parsed or composed, or its
/// messages can't be written.
pub async fn execute<W: World>(
    opts: &Opts,
    library: &StepLibrary<W>,
) -> Result<Summary> {
    let root = opts.project_root.as_path();
    let mut paths = specs::discover(root, &opts.spec_pattern)?;
    if let (true, Some(tags)) = (opts.filter_specs, &opts.tags) {
        paths = specs::filter_specs(paths, tags)?;
    }

    let mut sink = opts.messages_sink();
    if let Some(sink) = &sink {
        sink.prepare()?;
    }

    let definitions = opts.step_definitions();
    let locator: Rc<dyn Locator> = Rc::new(CallerLocator::new(root));
    let runner = Basic::new().with_cli(opts.runner);
    let mut summary = Summary::default();

    let features = paths
        .iter()
        .filter(|p| p.extension().is_some_and(|e| e == "feature"));
    for path in features {
        let ids = Rc::new(IdGenerator::Uuid);
        let relative = specs::relative(root, path);
        let parsed = parser::parse_path(path, relative, &ids)?;
        let hints = definitions.resolve(path)?;
        let registry = library.build(
            &hints.step_definition_paths,
            Rc::clone(&ids),
            Some(Rc::clone(&locator)),
        )?;

        let spec = create_tests(
            Rc::new(registry),
            &parsed.source,
            &parsed.document,
            &parsed.pickles,
            opts.compose_options(hints),
        );
        summary.merge(runner.run(&spec).await);
        match &mut sink {
            Some(sink) => spec.finish(sink)?,
            None => spec.finish(Collector::default())?,
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::{Basic, Cli, Summary};

    #[test]
    fn cli_overrides_retries() {
        let runner = Basic::new().retries(1);

        assert_eq!(runner.with_cli(Cli::default()).retries, 1);
        assert_eq!(runner.with_cli(Cli { retries: Some(3) }).retries, 3);
    }

    #[test]
    fn summary_merges() {
        let mut a = Summary { passed: 1, ..Summary::default() };
        a.merge(Summary {
            failed: 1,
            failures: vec![("t".into(), "boom".into())],
            ..Summary::default()
        });

        assert_eq!(a.passed, 1);
        assert_eq!(a.failed, 1);
        assert!(!a.is_success());
    }
}
