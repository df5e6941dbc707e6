// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Offline cross-reference of step definitions against the steps using them.
//!
//! Every feature file is checked against a throwaway [`Registry`] built out
//! of the step definition files its search templates resolve to. Each pickle
//! step is then classified by the number of definitions matching it.

mod print;

use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
    process::ExitCode,
    rc::Rc,
};

use linked_hash_map::LinkedHashMap;

use crate::{
    ast::{FeatureChild, GherkinDocument, RuleChild, Step},
    cli::Opts,
    expression::{generate_expressions, Expression, GeneratedExpression},
    id::IdGenerator,
    parser,
    registry::Registry,
    specs,
    step::{CallerLocator, Locator, Location, StepDefinition},
    step_definitions::{StepDefinitionHints, StepDefinitions, StepLibrary},
    Result,
};

#[doc(inline)]
pub use self::print::{
    print_ambiguous_steps, print_definitions_usage, print_unmatched_steps,
    report,
};

/// Usage of a step in a feature file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DiagnosticStep {
    /// Feature file, relative to the project root.
    pub source: String,

    /// 1-based line of the step.
    pub line: usize,

    /// Step text.
    pub text: String,
}

/// Identity of a step definition across the registries of several files:
/// its canonical expression and its location.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct DefinitionKey {
    /// Canonical form of the expression, quoted unless it's a regular
    /// expression.
    pub expression: String,

    /// Where the definition was registered, if known.
    pub location: Option<Location>,
}

impl<W> From<&StepDefinition<W>> for DefinitionKey {
    fn from(def: &StepDefinition<W>) -> Self {
        Self {
            expression: match &def.expression {
                Expression::Cucumber(e) => format!("{:?}", e.source()),
                Expression::Regular(_) => def.expression.to_string(),
            },
            location: def.location.clone(),
        }
    }
}

/// Kind of the trailing argument of a step.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ArgumentKind {
    /// `DataTable` argument.
    DataTable,

    /// `DocString` argument.
    DocString,
}

impl ArgumentKind {
    /// Name of the argument in generated snippets.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::DataTable => "dataTable",
            Self::DocString => "docString",
        }
    }
}

/// Step matched by no definition.
#[derive(Clone, Debug)]
pub struct UnmatchedStep {
    /// Usage of the step.
    pub step: DiagnosticStep,

    /// Trailing argument of the step, if any.
    pub argument: Option<ArgumentKind>,

    /// Where definitions were searched for.
    pub hints: StepDefinitionHints,

    /// Expressions which would match the step, generalized against the
    /// registered parameter types.
    pub suggestions: Vec<GeneratedExpression>,
}

/// Step matched by several definitions.
#[derive(Clone, Debug)]
pub struct AmbiguousStep {
    /// Usage of the step.
    pub step: DiagnosticStep,

    /// Every matching definition, in registration order.
    pub definitions: Vec<DefinitionKey>,
}

/// Outcome of [`diagnose()`].
#[derive(Clone, Debug, Default)]
pub struct DiagnosticResult {
    /// Steps attributed to every known definition, in registration order.
    pub definitions_usage: LinkedHashMap<DefinitionKey, Vec<DiagnosticStep>>,

    /// Steps without a definition.
    pub unmatched_steps: Vec<UnmatchedStep>,

    /// Steps with several definitions.
    pub ambiguous_steps: Vec<AmbiguousStep>,
}

impl DiagnosticResult {
    /// Definitions no step was attributed to.
    pub fn unused_definitions(&self) -> impl Iterator<Item = &DefinitionKey> {
        self.definitions_usage
            .iter()
            .filter(|(_, steps)| steps.is_empty())
            .map(|(def, _)| def)
    }

    /// Indicates whether some step is unmatched or ambiguous.
    #[must_use]
    pub fn has_problems(&self) -> bool {
        !self.unmatched_steps.is_empty() || !self.ambiguous_steps.is_empty()
    }

    /// Exit code of the diagnostics process.
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        if self.has_problems() {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        }
    }
}

/// Diagnoses every `.feature` file of `specs` against the definitions its
/// search templates resolve to.
///
/// Other files are ignored.
///
/// # Errors
///
/// If some feature file can't be parsed or its definitions can't be
/// registered.
pub fn diagnose<W>(
    specs: &[PathBuf],
    definitions: &StepDefinitions,
    library: &StepLibrary<W>,
    locator: Option<Rc<dyn Locator>>,
) -> Result<DiagnosticResult> {
    let mut result = DiagnosticResult::default();
    let root = definitions.project_root();

    for spec in specs {
        if !spec.extension().is_some_and(|ext| ext == "feature") {
            continue;
        }

        let hints = definitions.resolve(spec)?;
        let registry: Registry<W> = library.build(
            &hints.step_definition_paths,
            Rc::new(IdGenerator::incrementing()),
            locator.clone(),
        )?;

        registry.acquire();
        let outcome = diagnose_spec(&mut result, root, spec, &registry, &hints);
        registry.release();
        outcome?;
    }

    tracing::debug!(
        definitions = result.definitions_usage.len(),
        unmatched = result.unmatched_steps.len(),
        ambiguous = result.ambiguous_steps.len(),
        "diagnostics finished",
    );
    Ok(result)
}

fn diagnose_spec<W>(
    result: &mut DiagnosticResult,
    root: &Path,
    spec: &Path,
    registry: &Registry<W>,
    hints: &StepDefinitionHints,
) -> Result<()> {
    let source = specs::relative(root, spec);
    let parsed = parser::parse_path(spec, source.clone(), &IdGenerator::Uuid)?;
    let lines = step_lines(&parsed.document);

    for def in registry.step_definitions() {
        if !result.definitions_usage.contains_key(&DefinitionKey::from(def)) {
            drop(result.definitions_usage.insert(def.into(), vec![]));
        }
    }

    for step in parsed.pickles.iter().flat_map(|p| &p.steps) {
        let usage = DiagnosticStep {
            source: source.clone(),
            line: step
                .ast_node_ids
                .first()
                .and_then(|id| lines.get(id.as_str()))
                .copied()
                .unwrap_or_default(),
            text: step.text.clone(),
        };

        let matching = registry.matching_step_definitions(&step.text);
        match matching.as_slice() {
            [] => {
                let argument = step.argument.as_ref().and_then(|arg| {
                    if arg.data_table.is_some() {
                        Some(ArgumentKind::DataTable)
                    } else {
                        arg.doc_string
                            .is_some()
                            .then_some(ArgumentKind::DocString)
                    }
                });
                result.unmatched_steps.push(UnmatchedStep {
                    suggestions: generate_expressions(
                        &step.text,
                        registry.parameters(),
                    ),
                    step: usage,
                    argument,
                    hints: hints.clone(),
                });
            }
            [def] => {
                result
                    .definitions_usage
                    .entry(DefinitionKey::from(*def))
                    .or_insert_with(Vec::new)
                    .push(usage);
            }
            defs => result.ambiguous_steps.push(AmbiguousStep {
                step: usage,
                definitions: defs.iter().map(|&d| d.into()).collect(),
            }),
        }
    }
    Ok(())
}

/// Lines of every step of the `document`, by step id.
fn step_lines(document: &GherkinDocument) -> HashMap<&str, usize> {
    fn add<'d>(lines: &mut HashMap<&'d str, usize>, steps: &'d [Step]) {
        lines.extend(steps.iter().map(|s| (s.id.as_str(), s.location.line)));
    }

    let mut lines = HashMap::new();
    for child in document.feature.iter().flat_map(|f| &f.children) {
        match child {
            FeatureChild::Background(bg) => add(&mut lines, &bg.steps),
            FeatureChild::Scenario(s) => add(&mut lines, &s.steps),
            FeatureChild::Rule(rule) => {
                for child in &rule.children {
                    match child {
                        RuleChild::Background(bg) => add(&mut lines, &bg.steps),
                        RuleChild::Scenario(s) => add(&mut lines, &s.steps),
                    }
                }
            }
        }
    }
    lines
}

/// Runs the diagnostics configured by the `opts`, printing the report to the
/// standard output.
///
/// # Errors
///
/// If the specs can't be discovered or diagnosed, or the report can't be
/// printed.
pub fn execute<W>(opts: &Opts, library: &StepLibrary<W>) -> Result<ExitCode> {
    let root = opts.project_root.as_path();
    let specs = specs::discover(root, &opts.spec_pattern)?;
    let definitions = StepDefinitions::new(opts.step_definitions.clone(), root);
    let locator: Rc<dyn Locator> = Rc::new(CallerLocator::new(root));

    let result = diagnose(&specs, &definitions, library, Some(locator))?;
    report(&mut io::stdout().lock(), &result)?;
    Ok(result.exit_code())
}
