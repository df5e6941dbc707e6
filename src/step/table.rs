// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`DataTable`] step argument.

use std::{collections::HashMap, fmt};

use crate::pickle::PickleTable;

/// [Data table][1] passed as the trailing argument of a step.
///
/// ```rust
/// # use cucumber_preprocessor::DataTable;
/// let table = DataTable::from(vec![
///     vec!["name", "age"],
///     vec!["Alice", "30"],
/// ]);
///
/// assert_eq!(table.hashes()[0]["name"], "Alice");
/// assert_eq!(table.rows(), [["Alice", "30"]]);
/// ```
///
/// [1]: https://cucumber.io/docs/gherkin/reference#data-tables
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DataTable {
    cells: Vec<Vec<String>>,
}

impl DataTable {
    /// Creates a new [`DataTable`] out of its rows.
    #[must_use]
    pub const fn new(cells: Vec<Vec<String>>) -> Self {
        Self { cells }
    }

    /// All rows, the header included.
    #[must_use]
    pub fn raw(&self) -> &[Vec<String>] {
        &self.cells
    }

    /// Rows without the header.
    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        self.cells.get(1..).unwrap_or_default()
    }

    /// Rows without the header, keyed by the header cells.
    #[must_use]
    pub fn hashes(&self) -> Vec<HashMap<String, String>> {
        let Some((header, rows)) = self.cells.split_first() else {
            return vec![];
        };
        rows.iter()
            .map(|row| {
                header.iter().cloned().zip(row.iter().cloned()).collect()
            })
            .collect()
    }

    /// Two-column table as a map of the first column to the second.
    ///
    /// [`None`] if some row doesn't have exactly two cells.
    #[must_use]
    pub fn rows_hash(&self) -> Option<HashMap<String, String>> {
        self.cells
            .iter()
            .map(|row| match row.as_slice() {
                [k, v] => Some((k.clone(), v.clone())),
                _ => None,
            })
            .collect()
    }

    /// Swaps rows and columns.
    #[must_use]
    pub fn transpose(&self) -> Self {
        let width = self.cells.first().map_or(0, Vec::len);
        Self::new(
            (0..width)
                .map(|i| {
                    self.cells
                        .iter()
                        .filter_map(|row| row.get(i).cloned())
                        .collect()
                })
                .collect(),
        )
    }

    /// Indicates whether this table has no rows at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl From<Vec<Vec<&str>>> for DataTable {
    fn from(rows: Vec<Vec<&str>>) -> Self {
        Self::new(
            rows.into_iter()
                .map(|row| row.into_iter().map(str::to_owned).collect())
                .collect(),
        )
    }
}

impl From<&PickleTable> for DataTable {
    fn from(table: &PickleTable) -> Self {
        Self::new(table.raw())
    }
}

impl fmt::Display for DataTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.cells {
            writeln!(f, "| {} |", row.join(" | "))?;
        }
        Ok(())
    }
}
