// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Configuration of a run, from the command line or the environment.
//!
//! Every option falls back to an environment variable, so the same binary
//! may be configured either way.

use std::{path::PathBuf, str::FromStr};

use smart_default::SmartDefault;

use crate::{
    compose,
    message::NdjsonFile,
    runner,
    specs::DEFAULT_SPEC_PATTERN,
    step_definitions::{StepDefinitionHints, StepDefinitions, DEFAULT_TEMPLATES},
    tag::TagExpression,
};

pub use clap::{Args, Parser};

/// File the message stream is written into by default.
pub const DEFAULT_MESSAGES_OUTPUT: &str = "cucumber-messages.ndjson";

/// Root CLI (command line interface) of a run.
#[derive(Clone, Debug, SmartDefault, clap::Parser)]
#[command(
    name = "cucumber-preprocessor",
    about = "Compile feature files into tests and report their execution"
)]
pub struct Opts {
    /// Tag expression to filter scenarios by.
    ///
    /// Ignored by feature files tagging something with `@only` or `@focus`.
    #[arg(long, short, value_name = "tagexpr", env = "TAGS", global = true)]
    pub tags: Option<TagExpression>,

    /// Leave scenarios filtered out by tags out of the test tree entirely.
    #[arg(long, env = "OMIT_FILTERED", global = true)]
    pub omit_filtered: bool,

    /// Skip feature files without any scenario matching `--tags`.
    #[arg(long, env = "FILTER_SPECS", global = true)]
    pub filter_specs: bool,

    /// Search pattern templates of step definition files.
    ///
    /// `[filepath]` stands for the feature file path relative to the project
    /// root and without its extension, `[filepart]` for each of its
    /// ancestors.
    #[arg(
        long,
        value_name = "glob",
        env = "STEP_DEFINITIONS",
        value_delimiter = ',',
        default_values_t = DEFAULT_TEMPLATES.map(String::from),
        global = true
    )]
    #[default(DEFAULT_TEMPLATES.map(String::from).to_vec())]
    pub step_definitions: Vec<String>,

    /// Glob patterns of feature files.
    #[arg(
        long,
        value_name = "glob",
        env = "SPEC_PATTERN",
        value_delimiter = ',',
        default_value = DEFAULT_SPEC_PATTERN,
        global = true
    )]
    #[default(vec![DEFAULT_SPEC_PATTERN.to_owned()])]
    pub spec_pattern: Vec<String>,

    /// Directory every pattern is relative to.
    #[arg(
        long,
        value_name = "dir",
        env = "PROJECT_ROOT",
        default_value = ".",
        global = true
    )]
    #[default(PathBuf::from("."))]
    pub project_root: PathBuf,

    /// Write the message stream of every feature file.
    #[arg(long, env = "MESSAGES_ENABLED", global = true)]
    pub messages: bool,

    /// File the message stream is appended to, relative to the project root.
    #[arg(
        long,
        value_name = "file",
        env = "MESSAGES_OUTPUT",
        default_value = DEFAULT_MESSAGES_OUTPUT,
        global = true
    )]
    #[default(PathBuf::from(DEFAULT_MESSAGES_OUTPUT))]
    pub messages_output: PathBuf,

    /// Tests are run interactively, so failure messages are rendered as
    /// markdown.
    #[arg(long, env = "INTERACTIVE", global = true)]
    pub interactive: bool,

    /// Coloring policy for a console output.
    #[arg(
        long,
        value_name = "auto|always|never",
        default_value = "auto",
        global = true
    )]
    #[default(Coloring::Auto)]
    pub color: Coloring,

    /// Runner CLI options.
    #[command(flatten)]
    pub runner: runner::Cli,
}

impl Opts {
    /// Shortcut for [`clap::Parser::parse()`], which doesn't require the trait
    /// being imported.
    #[must_use]
    pub fn parsed() -> Self {
        <Self as clap::Parser>::parse()
    }

    /// Search templates of step definitions anchored at the project root.
    #[must_use]
    pub fn step_definitions(&self) -> StepDefinitions {
        StepDefinitions::new(self.step_definitions.clone(), &self.project_root)
    }

    /// Sink of the message stream, if messages are enabled.
    #[must_use]
    pub fn messages_sink(&self) -> Option<NdjsonFile> {
        self.messages.then(|| {
            NdjsonFile::new(self.project_root.join(&self.messages_output))
        })
    }

    /// Composition options of a feature file whose step definitions were
    /// searched as the `hints` tell.
    #[must_use]
    pub fn compose_options(
        &self,
        hints: StepDefinitionHints,
    ) -> compose::Options {
        compose::Options {
            omit_filtered: self.omit_filtered,
            messages_enabled: self.messages,
            tags: self.tags.clone(),
            hints,
            interactive: self.interactive,
        }
    }

    /// Applies the [`Coloring`] policy to the [`console`] output.
    pub fn apply_coloring(&self) {
        match self.color {
            Coloring::Auto => {}
            Coloring::Always => console::set_colors_enabled(true),
            Coloring::Never => console::set_colors_enabled(false),
        }
    }
}

/// Possible policies of a [`console`] output coloring.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Coloring {
    /// Letting [`console::colors_enabled()`] to decide, whether output should
    /// be colored.
    Auto,

    /// Forcing of a colored output.
    Always,

    /// Forcing of a non-colored output.
    Never,
}

impl FromStr for Coloring {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "always" => Ok(Self::Always),
            "never" => Ok(Self::Never),
            _ => Err("possible options: auto, always, never"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap::Parser as _;

    use super::{Coloring, Opts};

    #[test]
    fn defaults() {
        let opts = Opts::try_parse_from(["test"]).unwrap();

        assert_eq!(opts.tags, None);
        assert_eq!(opts.spec_pattern, ["cypress/e2e/**/*.feature"]);
        assert_eq!(opts.step_definitions.len(), 3);
        assert_eq!(
            opts.messages_output,
            PathBuf::from("cucumber-messages.ndjson"),
        );
        assert_eq!(opts.color, Coloring::Auto);
        assert!(opts.messages_sink().is_none());

        let default = Opts::default();
        assert_eq!(default.spec_pattern, opts.spec_pattern);
        assert_eq!(default.step_definitions, opts.step_definitions);
    }

    #[test]
    fn parses_options() {
        let opts = Opts::try_parse_from([
            "test",
            "--tags",
            "@a and not @b",
            "--omit-filtered",
            "--step-definitions",
            "steps/[filepath].rs,steps/common.rs",
            "--messages",
            "--retries",
            "2",
        ])
        .unwrap();

        assert_eq!(
            opts.tags.as_ref().map(ToString::to_string).as_deref(),
            Some("( @a and not ( @b ) )"),
        );
        assert!(opts.omit_filtered);
        assert_eq!(
            opts.step_definitions,
            ["steps/[filepath].rs", "steps/common.rs"],
        );
        assert_eq!(opts.runner.retries, Some(2));
        assert!(opts.messages_sink().is_some());
    }

    #[test]
    fn rejects_invalid_tags() {
        assert!(Opts::try_parse_from(["test", "--tags", "@a and"]).is_err());
    }
}
