// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`Pickle`]s: fully instantiated scenarios, one per example row.

use serde::Serialize;

/// Executable scenario compiled out of a [`GherkinDocument`].
///
/// [`GherkinDocument`]: crate::ast::GherkinDocument
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pickle {
    /// Unique id of this [`Pickle`].
    pub id: String,

    /// URI of the feature file this [`Pickle`] originates from.
    pub uri: String,

    /// Name with example placeholders interpolated.
    pub name: String,

    /// Language of the feature file.
    pub language: String,

    /// Background steps first, then scenario steps.
    pub steps: Vec<PickleStep>,

    /// Tags inherited from the feature, rule, scenario and examples.
    pub tags: Vec<PickleTag>,

    /// Ids of the scenario and, for outlines, the example row.
    pub ast_node_ids: Vec<String>,
}

impl Pickle {
    /// Iterates over the names of this [`Pickle`]'s tags.
    pub fn tag_names(&self) -> impl Iterator<Item = &str> + Clone {
        self.tags.iter().map(|t| t.name.as_str())
    }
}

/// Step of a [`Pickle`].
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PickleStep {
    pub id: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub argument: Option<PickleStepArgument>,
    pub ast_node_ids: Vec<String>,
    #[serde(rename = "type")]
    pub ty: PickleStepType,
}

/// Kind of a [`PickleStep`], with `And`/`But` resolved to the preceding
/// keyword.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum PickleStepType {
    Context,
    Action,
    Outcome,
}

/// Trailing argument of a [`PickleStep`].
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PickleStepArgument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_string: Option<PickleDocString>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_table: Option<PickleTable>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PickleDocString {
    pub content: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct PickleTable {
    pub rows: Vec<PickleTableRow>,
}

impl PickleTable {
    /// Cell values, row by row.
    #[must_use]
    pub fn raw(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|r| r.cells.iter().map(|c| c.value.clone()).collect())
            .collect()
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct PickleTableRow {
    pub cells: Vec<PickleTableCell>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PickleTableCell {
    pub value: String,
}

/// Tag of a [`Pickle`].
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PickleTag {
    /// Name including the leading `@`.
    pub name: String,

    /// Id of the [`Tag`] node this one is inherited from.
    ///
    /// [`Tag`]: crate::ast::Tag
    pub ast_node_id: String,
}
