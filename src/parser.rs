// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Adapter over the [`gherkin`] crate producing a [`GherkinDocument`] and its
//! [`Pickle`]s.

use std::{collections::HashMap, path::Path};

use lazy_regex::regex;

use crate::{
    ast::{
        Background, DataTable, DocString, Examples, Feature, FeatureChild,
        GherkinDocument, KeywordType, Location, Rule, RuleChild, Scenario,
        Step, TableCell, TableRow, Tag,
    },
    pickle::{
        Pickle, PickleDocString, PickleStep, PickleStepArgument,
        PickleStepType, PickleTable, PickleTableCell, PickleTableRow,
        PickleTag,
    },
    Error, IdGenerator, Result,
};

/// Language of parsed documents.
const LANGUAGE: &str = "en";

/// Output of parsing a single feature file.
#[derive(Clone, Debug)]
pub struct Parsed {
    /// Feature file text.
    pub source: String,

    /// Scenario tree.
    pub document: GherkinDocument,

    /// Pickles compiled out of the [`Parsed::document`], in source order.
    pub pickles: Vec<Pickle>,
}

/// Parses the feature file `source` located at `uri`.
///
/// # Errors
///
/// If the [`gherkin`] parser rejects the `source`.
pub fn parse(
    uri: impl Into<String>,
    source: impl Into<String>,
    ids: &IdGenerator,
) -> Result<Parsed> {
    let uri = uri.into();
    let source = source.into();

    let feature = if source.trim().is_empty() {
        None
    } else {
        let feature =
            gherkin::Feature::parse(&source, gherkin::GherkinEnv::default())
                .map_err(|e| Error::Parse {
                    uri: uri.clone(),
                    reason: e.to_string(),
                })?;
        Some(Builder { ids }.feature(&feature))
    };

    let document = GherkinDocument { uri, feature, comments: vec![] };
    let pickles = compile(&document, ids);

    Ok(Parsed { source, document, pickles })
}

/// Reads and parses the feature file at `path`, naming it `uri`.
///
/// # Errors
///
/// If the file cannot be read or parsed.
pub fn parse_path(
    path: impl AsRef<Path>,
    uri: impl Into<String>,
    ids: &IdGenerator,
) -> Result<Parsed> {
    let source = std::fs::read_to_string(path)?;
    parse(uri, source, ids)
}

/// Converts [`gherkin`] nodes, assigning ids from the [`IdGenerator`].
struct Builder<'i> {
    ids: &'i IdGenerator,
}

impl Builder<'_> {
    fn id(&self) -> String {
        self.ids.next_id()
    }

    fn location(pos: gherkin::LineCol) -> Location {
        Location::new(pos.line, pos.col)
    }

    fn tags(&self, tags: &[String], pos: gherkin::LineCol) -> Vec<Tag> {
        tags.iter()
            .map(|t| Tag {
                location: Location {
                    line: pos.line.saturating_sub(1).max(1),
                    column: None,
                },
                name: format!("@{}", t.trim_start_matches('@')),
                id: self.id(),
            })
            .collect()
    }

    fn feature(&self, f: &gherkin::Feature) -> Feature {
        let mut children = Vec::new();
        if let Some(bg) = &f.background {
            let line = bg.position.line;
            let background = FeatureChild::Background(self.background(bg));
            children.push((line, background));
        }
        for s in &f.scenarios {
            children.push((
                s.position.line,
                FeatureChild::Scenario(self.scenario(s)),
            ));
        }
        for r in &f.rules {
            children.push((r.position.line, FeatureChild::Rule(self.rule(r))));
        }
        children.sort_by_key(|(line, _)| *line);

        Feature {
            location: Self::location(f.position),
            tags: self.tags(&f.tags, f.position),
            language: LANGUAGE.into(),
            keyword: f.keyword.clone(),
            name: f.name.clone(),
            description: f.description.clone().unwrap_or_default(),
            children: children.into_iter().map(|(_, c)| c).collect(),
        }
    }

    fn rule(&self, r: &gherkin::Rule) -> Rule {
        let mut children = Vec::new();
        if let Some(bg) = &r.background {
            let line = bg.position.line;
            children.push((line, RuleChild::Background(self.background(bg))));
        }
        for s in &r.scenarios {
            let line = s.position.line;
            children.push((line, RuleChild::Scenario(self.scenario(s))));
        }
        children.sort_by_key(|(line, _)| *line);

        Rule {
            id: self.id(),
            location: Self::location(r.position),
            tags: self.tags(&r.tags, r.position),
            keyword: r.keyword.clone(),
            name: r.name.clone(),
            description: r.description.clone().unwrap_or_default(),
            children: children.into_iter().map(|(_, c)| c).collect(),
        }
    }

    fn background(&self, bg: &gherkin::Background) -> Background {
        Background {
            id: self.id(),
            location: Self::location(bg.position),
            keyword: bg.keyword.clone(),
            name: String::new(),
            description: String::new(),
            steps: bg.steps.iter().map(|s| self.step(s)).collect(),
        }
    }

    fn scenario(&self, s: &gherkin::Scenario) -> Scenario {
        Scenario {
            id: self.id(),
            location: Self::location(s.position),
            tags: self.tags(&s.tags, s.position),
            keyword: s.keyword.clone(),
            name: s.name.clone(),
            description: s.description.clone().unwrap_or_default(),
            steps: s.steps.iter().map(|st| self.step(st)).collect(),
            examples: s.examples.iter().map(|e| self.examples(e)).collect(),
        }
    }

    fn examples(&self, e: &gherkin::Examples) -> Examples {
        let mut rows = e
            .table
            .as_ref()
            .map(|t| self.rows(t))
            .unwrap_or_default()
            .into_iter();

        Examples {
            id: self.id(),
            location: Self::location(e.position),
            tags: self.tags(&e.tags, e.position),
            keyword: e.keyword.clone(),
            name: String::new(),
            description: String::new(),
            table_header: rows.next(),
            table_body: rows.collect(),
        }
    }

    fn rows(&self, table: &gherkin::Table) -> Vec<TableRow> {
        table
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let location = Location::new(
                    table.position.line + i,
                    table.position.col,
                );
                TableRow {
                    id: self.id(),
                    location,
                    cells: row
                        .iter()
                        .map(|value| TableCell {
                            location,
                            value: value.clone(),
                        })
                        .collect(),
                }
            })
            .collect()
    }

    fn step(&self, s: &gherkin::Step) -> Step {
        let doc_string = s.docstring.as_ref().map(|content| DocString {
            location: Location::new(s.position.line + 1, s.position.col),
            content: content.clone(),
            delimiter: "\"\"\"".into(),
        });
        let data_table = s.table.as_ref().map(|t| DataTable {
            location: Self::location(t.position),
            rows: self.rows(t),
        });

        Step {
            id: self.id(),
            location: Self::location(s.position),
            keyword: s.keyword.clone(),
            keyword_type: match s.ty {
                gherkin::StepType::Given => KeywordType::Context,
                gherkin::StepType::When => KeywordType::Action,
                gherkin::StepType::Then => KeywordType::Outcome,
            },
            text: s.value.clone(),
            doc_string,
            data_table,
        }
    }
}

/// Compiles the [`Pickle`]s of a [`GherkinDocument`].
///
/// Background steps of the feature (and of the enclosing rule) come first.
/// A scenario yields one [`Pickle`] per example row with `<placeholder>`s
/// interpolated, or a single one when it has no examples.
#[must_use]
pub fn compile(document: &GherkinDocument, ids: &IdGenerator) -> Vec<Pickle> {
    let Some(feature) = &document.feature else {
        return vec![];
    };
    let compiler = Compiler { uri: &document.uri, ids };

    let mut pickles = Vec::new();
    let mut background = Vec::<&Step>::new();
    for child in &feature.children {
        match child {
            FeatureChild::Background(bg) => background.extend(&bg.steps),
            FeatureChild::Scenario(s) => {
                compiler.scenario(
                    s,
                    &background,
                    &[feature.tags.as_slice()],
                    &mut pickles,
                );
            }
            FeatureChild::Rule(r) => {
                let mut rule_background = background.clone();
                for child in &r.children {
                    match child {
                        RuleChild::Background(bg) => {
                            rule_background.extend(&bg.steps);
                        }
                        RuleChild::Scenario(s) => compiler.scenario(
                            s,
                            &rule_background,
                            &[feature.tags.as_slice(), r.tags.as_slice()],
                            &mut pickles,
                        ),
                    }
                }
            }
        }
    }
    pickles
}

struct Compiler<'a> {
    uri: &'a str,
    ids: &'a IdGenerator,
}

impl Compiler<'_> {
    fn scenario(
        &self,
        scenario: &Scenario,
        background: &[&Step],
        inherited_tags: &[&[Tag]],
        out: &mut Vec<Pickle>,
    ) {
        let tags = || {
            inherited_tags
                .iter()
                .flat_map(|t| t.iter())
                .chain(&scenario.tags)
        };

        if scenario.examples.is_empty() {
            let steps = background
                .iter()
                .copied()
                .chain(&scenario.steps)
                .map(|s| self.step(s, &HashMap::new(), None))
                .collect();
            out.push(Pickle {
                id: self.ids.next_id(),
                uri: self.uri.to_owned(),
                name: scenario.name.clone(),
                language: LANGUAGE.into(),
                steps,
                tags: tags().map(pickle_tag).collect(),
                ast_node_ids: vec![scenario.id.clone()],
            });
            return;
        }

        for examples in &scenario.examples {
            let Some(header) = &examples.table_header else {
                continue;
            };
            for row in &examples.table_body {
                let values = header
                    .cells
                    .iter()
                    .map(|c| c.value.as_str())
                    .zip(row.cells.iter().map(|c| c.value.as_str()))
                    .collect::<HashMap<_, _>>();

                let steps = background
                    .iter()
                    .map(|s| self.step(s, &HashMap::new(), None))
                    .chain(
                        scenario
                            .steps
                            .iter()
                            .map(|s| self.step(s, &values, Some(&row.id))),
                    )
                    .collect();

                out.push(Pickle {
                    id: self.ids.next_id(),
                    uri: self.uri.to_owned(),
                    name: interpolate(&scenario.name, &values),
                    language: LANGUAGE.into(),
                    steps,
                    tags: tags()
                        .chain(&examples.tags)
                        .map(pickle_tag)
                        .collect(),
                    ast_node_ids: vec![scenario.id.clone(), row.id.clone()],
                });
            }
        }
    }

    fn step(
        &self,
        step: &Step,
        values: &HashMap<&str, &str>,
        row_id: Option<&String>,
    ) -> PickleStep {
        let doc_string = step.doc_string.as_ref().map(|d| PickleDocString {
            content: interpolate(&d.content, values),
        });
        let data_table = step.data_table.as_ref().map(|t| PickleTable {
            rows: t
                .rows
                .iter()
                .map(|r| PickleTableRow {
                    cells: r
                        .cells
                        .iter()
                        .map(|c| PickleTableCell {
                            value: interpolate(&c.value, values),
                        })
                        .collect(),
                })
                .collect(),
        });
        let argument = (doc_string.is_some() || data_table.is_some())
            .then_some(PickleStepArgument { doc_string, data_table });

        PickleStep {
            id: self.ids.next_id(),
            text: interpolate(&step.text, values),
            argument,
            ast_node_ids: std::iter::once(step.id.clone())
                .chain(row_id.cloned())
                .collect(),
            ty: match step.keyword_type {
                KeywordType::Context => PickleStepType::Context,
                KeywordType::Action => PickleStepType::Action,
                KeywordType::Outcome => PickleStepType::Outcome,
            },
        }
    }
}

fn pickle_tag(tag: &Tag) -> PickleTag {
    PickleTag { name: tag.name.clone(), ast_node_id: tag.id.clone() }
}

/// Replaces `<name>` placeholders with example `values`, leaving unknown
/// ones as is.
fn interpolate(text: &str, values: &HashMap<&str, &str>) -> String {
    regex!(r"<([^>\s]+)>")
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            values
                .get(name)
                .map_or_else(|| caps[0].to_owned(), |v| (*v).to_owned())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use crate::{ast::FeatureChild, IdGenerator};

    use super::parse;

    const OUTLINE: &str = "\
@feature
Feature: Sums
  Background:
    Given a calculator

  @outline
  Scenario Outline: add <a>
    Given a is <a>
    Then sum is <sum>

    @first
    Examples:
      | a | sum |
      | 1 | 3   |
      | 2 | 4   |

  Rule: Big numbers
    Scenario: huge
      Given a is 1000
";

    #[test]
    fn compiles_one_pickle_per_example_row() {
        let ids = IdGenerator::incrementing();
        let parsed = parse("features/sums.feature", OUTLINE, &ids).unwrap();

        let names = parsed.pickles.iter().map(|p| p.name.as_str());
        assert_eq!(names.collect::<Vec<_>>(), ["add 1", "add 2", "huge"]);

        let first = &parsed.pickles[0];
        let texts = first.steps.iter().map(|s| s.text.as_str());
        assert_eq!(
            texts.collect::<Vec<_>>(),
            ["a calculator", "a is 1", "sum is 3"],
        );
        assert_eq!(
            first.tag_names().collect::<Vec<_>>(),
            ["@feature", "@outline", "@first"],
        );
        assert_eq!(first.ast_node_ids.len(), 2);
        assert_eq!(first.steps[1].ast_node_ids.len(), 2);
        assert_eq!(first.steps[0].ast_node_ids.len(), 1);
    }

    #[test]
    fn keeps_children_in_source_order() {
        let parsed = parse("a.feature", OUTLINE, &IdGenerator::incrementing())
            .unwrap();
        let feature = parsed.document.feature.unwrap();

        assert!(matches!(
            feature.children.as_slice(),
            [
                FeatureChild::Background(_),
                FeatureChild::Scenario(_),
                FeatureChild::Rule(_),
            ]
        ));
        let rule_pickle = &parsed.pickles[2];
        assert_eq!(rule_pickle.steps.len(), 2);
        assert_eq!(rule_pickle.tag_names().collect::<Vec<_>>(), ["@feature"]);
    }

    #[test]
    fn empty_source_has_no_feature() {
        let parsed = parse("empty.feature", "\n", &IdGenerator::Uuid).unwrap();

        assert!(parsed.document.feature.is_none());
        assert!(parsed.pickles.is_empty());
    }

    #[test]
    fn step_arguments_are_kept() {
        let src = "\
Feature: Args
  Scenario: table
    Given the users:
      | name  |
      | Alice |
    And the text:
      \"\"\"
      hello
      \"\"\"
";
        let parsed = parse("args.feature", src, &IdGenerator::incrementing())
            .unwrap();
        let steps = &parsed.pickles[0].steps;

        let table =
            steps[0].argument.as_ref().and_then(|a| a.data_table.as_ref());
        assert_eq!(table.unwrap().raw(), [["name"], ["Alice"]]);
        let doc =
            steps[1].argument.as_ref().and_then(|a| a.doc_string.as_ref());
        assert_eq!(doc.unwrap().content.trim(), "hello");
    }
}
