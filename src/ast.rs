// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Scenario tree in the shape of the [Cucumber messages][1]
//! `GherkinDocument`.
//!
//! Every node carries the id its pickles refer to via `astNodeIds`.
//!
//! [1]: https://github.com/cucumber/messages

use serde::Serialize;

/// Position in a feature file.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct Location {
    /// 1-based line.
    pub line: usize,

    /// 1-based column, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
}

impl Location {
    /// Creates a new [`Location`].
    #[must_use]
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column: Some(column) }
    }
}

/// Parsed feature file.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GherkinDocument {
    /// URI of the feature file, relative to the project root.
    pub uri: String,

    /// Feature of the file, absent for an empty file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature: Option<Feature>,

    /// Comment lines of the file.
    pub comments: Vec<Comment>,
}

impl GherkinDocument {
    /// Collects every tag of this document, regardless of its level.
    #[must_use]
    pub fn tags(&self) -> Vec<&Tag> {
        let mut out = Vec::new();
        let Some(feature) = &self.feature else {
            return out;
        };
        out.extend(&feature.tags);
        for child in &feature.children {
            match child {
                FeatureChild::Rule(r) => {
                    out.extend(&r.tags);
                    for s in r.children.iter().filter_map(RuleChild::scenario) {
                        out.extend(s.tags());
                    }
                }
                FeatureChild::Scenario(s) => out.extend(s.tags()),
                FeatureChild::Background(_) => {}
            }
        }
        out
    }
}

/// Comment line of a feature file.
#[derive(Clone, Debug, Serialize)]
pub struct Comment {
    pub location: Location,
    pub text: String,
}

/// [Feature][1] keyword block.
///
/// [1]: https://cucumber.io/docs/gherkin/reference#feature
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    /// Location of the keyword.
    pub location: Location,

    /// Tags of this feature.
    pub tags: Vec<Tag>,

    /// Language of the feature file.
    pub language: String,

    /// Keyword as written.
    pub keyword: String,

    /// Name of this feature.
    pub name: String,

    /// Free-form description.
    pub description: String,

    /// Backgrounds, rules and scenarios in source order.
    pub children: Vec<FeatureChild>,
}

/// Child node of a [`Feature`].
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FeatureChild {
    /// [`Rule`] block.
    Rule(Rule),

    /// [`Background`] block.
    Background(Background),

    /// [`Scenario`] block.
    Scenario(Scenario),
}

/// [Rule][1] keyword block.
///
/// [1]: https://cucumber.io/docs/gherkin/reference#rule
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Id of this node.
    pub id: String,

    /// Location of the keyword.
    pub location: Location,

    /// Tags of this rule.
    pub tags: Vec<Tag>,

    /// Keyword as written.
    pub keyword: String,

    /// Name of this rule.
    pub name: String,

    /// Free-form description.
    pub description: String,

    /// Backgrounds and scenarios in source order.
    pub children: Vec<RuleChild>,
}

/// Child node of a [`Rule`].
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RuleChild {
    /// [`Background`] block.
    Background(Background),

    /// [`Scenario`] block.
    Scenario(Scenario),
}

impl RuleChild {
    /// Returns the [`Scenario`] of this child, if it's one.
    #[must_use]
    pub const fn scenario(&self) -> Option<&Scenario> {
        match self {
            Self::Scenario(s) => Some(s),
            Self::Background(_) => None,
        }
    }
}

/// [Background][1] keyword block.
///
/// [1]: https://cucumber.io/docs/gherkin/reference#background
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Background {
    pub id: String,
    pub location: Location,
    pub keyword: String,
    pub name: String,
    pub description: String,
    pub steps: Vec<Step>,
}

/// [Scenario][1] or [Scenario Outline][2] block.
///
/// [1]: https://cucumber.io/docs/gherkin/reference#example
/// [2]: https://cucumber.io/docs/gherkin/reference#scenario-outline
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub id: String,
    pub location: Location,
    pub tags: Vec<Tag>,
    pub keyword: String,
    pub name: String,
    pub description: String,
    pub steps: Vec<Step>,
    pub examples: Vec<Examples>,
}

impl Scenario {
    /// Iterates over tags of this scenario and of its examples.
    pub fn tags(&self) -> impl Iterator<Item = &Tag> {
        self.tags.iter().chain(self.examples.iter().flat_map(|e| &e.tags))
    }
}

/// [Examples][1] block of a [`Scenario`].
///
/// [1]: https://cucumber.io/docs/gherkin/reference#examples
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Examples {
    pub id: String,
    pub location: Location,
    pub tags: Vec<Tag>,
    pub keyword: String,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_header: Option<TableRow>,
    pub table_body: Vec<TableRow>,
}

/// Row of an [`Examples`] or [`DataTable`] table.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRow {
    pub id: String,
    pub location: Location,
    pub cells: Vec<TableCell>,
}

/// Cell of a [`TableRow`].
#[derive(Clone, Debug, Serialize)]
pub struct TableCell {
    pub location: Location,
    pub value: String,
}

/// [Step][1] of a [`Scenario`] or [`Background`].
///
/// [1]: https://cucumber.io/docs/gherkin/reference#steps
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: String,
    pub location: Location,
    pub keyword: String,
    pub keyword_type: KeywordType,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_string: Option<DocString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_table: Option<DataTable>,
}

/// Kind of a [`Step`] keyword.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum KeywordType {
    /// `Given`.
    Context,

    /// `When`.
    Action,

    /// `Then`.
    Outcome,
}

/// [Doc string][1] argument of a [`Step`].
///
/// [1]: https://cucumber.io/docs/gherkin/reference#doc-strings
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocString {
    pub location: Location,
    pub content: String,
    pub delimiter: String,
}

/// [Data table][1] argument of a [`Step`].
///
/// [1]: https://cucumber.io/docs/gherkin/reference#data-tables
#[derive(Clone, Debug, Serialize)]
pub struct DataTable {
    pub location: Location,
    pub rows: Vec<TableRow>,
}

/// [Tag][1] of a [`Feature`], [`Rule`], [`Scenario`] or [`Examples`].
///
/// [1]: https://cucumber.io/docs/cucumber/api#tags
#[derive(Clone, Debug, Serialize)]
pub struct Tag {
    pub location: Location,

    /// Name including the leading `@`.
    pub name: String,

    pub id: String,
}
