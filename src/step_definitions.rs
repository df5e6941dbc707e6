// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Locating the step definitions of a feature file.
//!
//! Search templates may contain two placeholders, both derived from the
//! feature's path relative to the project root:
//! - `[filepath]`: that path without its extension;
//! - `[filepart]`: every ancestor prefix of it, one pattern per prefix.
//!
//! Matched files are then looked up in a [`StepLibrary`], which maps each of
//! them to a function registering its definitions.

use std::{
    fmt,
    path::{Path, PathBuf},
    rc::Rc,
};

use itertools::Itertools as _;
use linked_hash_map::LinkedHashMap;

use crate::{
    error::Result,
    id::IdGenerator,
    registry::{Registry, RegistryBuilder},
    step::Locator,
};

/// Templates searched when none are configured.
pub const DEFAULT_TEMPLATES: [&str; 3] = [
    "cypress/e2e/[filepath]/**/*.rs",
    "cypress/e2e/[filepath].rs",
    "cypress/support/step_definitions/**/*.rs",
];

/// What was searched for the step definitions of one feature file, and what
/// was found.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct StepDefinitionHints {
    /// Configured templates.
    pub step_definitions: Vec<String>,

    /// Patterns the templates resolved to.
    pub step_definition_patterns: Vec<String>,

    /// Files matching the patterns, relative to the project root.
    pub step_definition_paths: Vec<String>,
}

/// Search templates anchored at a project root.
#[derive(Clone, Debug)]
pub struct StepDefinitions {
    templates: Vec<String>,
    project_root: PathBuf,
}

impl StepDefinitions {
    /// Creates new [`StepDefinitions`] searching `templates` under
    /// `project_root`.
    #[must_use]
    pub fn new<I, S>(templates: I, project_root: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            templates: templates.into_iter().map(Into::into).collect(),
            project_root: project_root.into(),
        }
    }

    /// Project root the templates are relative to.
    #[must_use]
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Patterns searched for the feature file at `feature`.
    ///
    /// `feature` may be absolute or relative to the project root.
    #[must_use]
    pub fn patterns(&self, feature: &Path) -> Vec<String> {
        let relative =
            feature.strip_prefix(&self.project_root).unwrap_or(feature);
        let filepath = escape_glob(
            &relative.with_extension("").to_string_lossy().replace('\\', "/"),
        );
        let parts = filepath.split('/').collect::<Vec<_>>();
        let fileparts = (1..=parts.len())
            .map(|n| parts[..n].join("/"))
            .collect::<Vec<_>>();

        self.templates
            .iter()
            .flat_map(|t| {
                let t = t.replace("[filepath]", &filepath);
                if t.contains("[filepart]") {
                    fileparts
                        .iter()
                        .map(|p| t.replace("[filepart]", p))
                        .collect()
                } else {
                    vec![t]
                }
            })
            .unique()
            .collect()
    }

    /// Resolves the patterns of the feature file at `feature` to existing
    /// files.
    ///
    /// # Errors
    ///
    /// If some pattern is not a valid glob.
    pub fn resolve(&self, feature: &Path) -> Result<StepDefinitionHints> {
        let patterns = self.patterns(feature);
        let root = self
            .project_root
            .canonicalize()
            .unwrap_or_else(|_| self.project_root.clone());
        let mut paths =
            globwalk::GlobWalkerBuilder::from_patterns(&root, &patterns)
                .file_type(globwalk::FileType::FILE)
                .build()?
                .filter_map(Result::ok)
                .filter_map(|entry| {
                    entry
                        .path()
                        .strip_prefix(&root)
                        .ok()
                        .map(|p| p.to_string_lossy().replace('\\', "/"))
                })
                .collect::<Vec<_>>();
        paths.sort();

        tracing::debug!(
            feature = %feature.display(),
            ?patterns,
            ?paths,
            "resolved step definitions",
        );

        Ok(StepDefinitionHints {
            step_definitions: self.templates.clone(),
            step_definition_patterns: patterns,
            step_definition_paths: paths,
        })
    }
}

impl Default for StepDefinitions {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATES, ".")
    }
}

fn escape_glob(s: &str) -> String {
    s.chars().fold(String::with_capacity(s.len()), |mut out, c| {
        if "*?[]{}!".contains(c) {
            out.push('\\');
        }
        out.push(c);
        out
    })
}

/// Function registering the definitions of one source file.
pub type Registrar<W> = Rc<dyn Fn(&mut RegistryBuilder<W>) -> Result<()>>;

/// Registrars of step definition files, keyed by their path relative to the
/// project root.
pub struct StepLibrary<W> {
    files: LinkedHashMap<String, Registrar<W>>,
}

impl<W> Default for StepLibrary<W> {
    fn default() -> Self {
        Self { files: LinkedHashMap::new() }
    }
}

impl<W> fmt::Debug for StepLibrary<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.files.keys()).finish()
    }
}

impl<W> StepLibrary<W> {
    /// Creates a new empty [`StepLibrary`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the `registrar` of the file at `path`.
    #[must_use]
    pub fn file<F>(mut self, path: impl Into<String>, registrar: F) -> Self
    where
        F: Fn(&mut RegistryBuilder<W>) -> Result<()> + 'static,
    {
        drop(self.files.insert(path.into(), Rc::new(registrar)));
        self
    }

    /// Paths of every known file, in insertion order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Builds a [`Registry`] out of the registrars of `paths`, in order.
    ///
    /// Paths without a registrar are skipped with a warning.
    ///
    /// # Errors
    ///
    /// If some registrar or the final compilation fails.
    pub fn build<S: AsRef<str>>(
        &self,
        paths: &[S],
        ids: Rc<IdGenerator>,
        locator: Option<Rc<dyn Locator>>,
    ) -> Result<Registry<W>> {
        let mut builder = RegistryBuilder::new(ids);
        if let Some(locator) = locator {
            builder = builder.with_locator(
                move |c: &'static std::panic::Location<'static>| {
                    locator.locate(c)
                },
            );
        }
        for path in paths {
            let path = path.as_ref();
            if let Some(registrar) = self.files.get(path) {
                registrar(&mut builder)?;
            } else {
                tracing::warn!(path, "no registrar for step definition file");
            }
        }
        builder.finalize()
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path, rc::Rc};

    use futures::FutureExt as _;

    use crate::{id::IdGenerator, step::Outcome};

    use super::{StepDefinitions, StepLibrary};

    #[test]
    fn filepath_and_filepart_placeholders() {
        let defs = StepDefinitions::new(
            ["e2e/[filepath].rs", "e2e/[filepart]/steps.rs", "common/*.rs"],
            "/project",
        );

        assert_eq!(
            defs.patterns(Path::new("/project/features/auth/login.feature")),
            [
                "e2e/features/auth/login.rs",
                "e2e/features/steps.rs",
                "e2e/features/auth/steps.rs",
                "e2e/features/auth/login/steps.rs",
                "common/*.rs",
            ],
        );
    }

    #[test]
    fn resolves_patterns_to_relative_files() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("e2e/shop")).unwrap();
        fs::write(root.path().join("e2e/shop/cart.rs"), "").unwrap();
        fs::write(root.path().join("e2e/shop/other.txt"), "").unwrap();
        let defs =
            StepDefinitions::new(["e2e/[filepath]/**/*.rs"], root.path());

        let hints = defs.resolve(&root.path().join("shop.feature")).unwrap();

        assert_eq!(hints.step_definition_patterns, ["e2e/shop/**/*.rs"]);
        assert_eq!(hints.step_definition_paths, ["e2e/shop/cart.rs"]);
    }

    #[test]
    fn library_runs_registrars_of_matched_files() {
        struct World;

        let library = StepLibrary::<World>::new()
            .file("a.rs", |r| {
                r.define_step("a", |_, _| {
                    async { Ok(Outcome::Passed) }.boxed_local()
                })?;
                Ok(())
            })
            .file("b.rs", |r| {
                r.define_step("b", |_, _| {
                    async { Ok(Outcome::Passed) }.boxed_local()
                })?;
                Ok(())
            });

        let ids = Rc::new(IdGenerator::incrementing());
        let registry =
            library.build(&["b.rs", "missing.rs"], ids, None).unwrap();

        assert_eq!(registry.step_definitions().len(), 1);
        assert!(registry.resolve_step_definition("b").is_ok());
    }
}
