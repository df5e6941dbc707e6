// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Discovery of feature files.

use std::path::{Path, PathBuf};

use crate::{
    id::IdGenerator,
    parser,
    tag::{Ext as _, TagExpression},
    Result,
};

/// Spec pattern used when none is configured.
pub const DEFAULT_SPEC_PATTERN: &str = "cypress/e2e/**/*.feature";

/// Finds the files under `root` matching any of the glob `patterns`.
///
/// Paths are returned sorted, joined with `root`.
///
/// # Errors
///
/// If some pattern is not a valid glob.
pub fn discover<S: AsRef<str>>(
    root: &Path,
    patterns: &[S],
) -> Result<Vec<PathBuf>> {
    let mut paths = globwalk::GlobWalkerBuilder::from_patterns(root, patterns)
        .file_type(globwalk::FileType::FILE)
        .build()?
        .filter_map(|entry| match entry {
            Ok(e) => Some(e.into_path()),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable spec");
                None
            }
        })
        .collect::<Vec<_>>();
    paths.sort();

    tracing::debug!(
        root = %root.display(),
        specs = paths.len(),
        "discovered specs",
    );
    Ok(paths)
}

/// Keeps only the feature files having at least one pickle matching the
/// `tags`.
///
/// Files without a `.feature` extension are kept as is.
///
/// # Errors
///
/// If some feature file cannot be read or parsed.
pub fn filter_specs(
    paths: Vec<PathBuf>,
    tags: &TagExpression,
) -> Result<Vec<PathBuf>> {
    let ids = IdGenerator::incrementing();
    let mut kept = Vec::with_capacity(paths.len());
    for path in paths {
        if path.extension().is_some_and(|ext| ext == "feature") {
            let uri = path.to_string_lossy().into_owned();
            let parsed = parser::parse_path(&path, uri, &ids)?;
            if !parsed.pickles.iter().any(|p| tags.eval(p.tag_names())) {
                tracing::debug!(
                    spec = %path.display(),
                    %tags,
                    "filtered out spec",
                );
                continue;
            }
        }
        kept.push(path);
    }
    Ok(kept)
}

/// `path` relative to the `root`, with forward slashes.
pub(crate) fn relative(root: &Path, path: &Path) -> String {
    let root = root.canonicalize().unwrap_or_else(|_| root.to_owned());
    let path = path.canonicalize().unwrap_or_else(|_| path.to_owned());
    path.strip_prefix(&root)
        .unwrap_or(&path)
        .to_string_lossy()
        .replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{discover, filter_specs};

    #[test]
    fn discovers_and_filters_by_tags() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("cypress/e2e");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("a.feature"),
            "Feature: a\n  @smoke\n  Scenario: s\n    Given a step\n",
        )
        .unwrap();
        fs::write(
            dir.join("b.feature"),
            "Feature: b\n  Scenario: s\n    Given a step\n",
        )
        .unwrap();
        fs::write(dir.join("notes.md"), "").unwrap();

        let specs =
            discover(root.path(), &["cypress/e2e/**/*.feature"]).unwrap();
        assert_eq!(specs, [dir.join("a.feature"), dir.join("b.feature")]);

        let kept = filter_specs(specs, &"@smoke".parse().unwrap()).unwrap();
        assert_eq!(kept, [dir.join("a.feature")]);
    }
}
