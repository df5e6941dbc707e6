// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Source positions of step definitions and hooks.
//!
//! Positions are optional everywhere: matching and execution never depend on
//! them, they only enrich messages and diagnostics.

use std::{
    panic,
    path::{Path, PathBuf},
};

use derive_more::Display;

/// Location of a step definition or hook in its source file.
#[derive(Clone, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[display("{path}:{line}:{column}")]
pub struct Location {
    /// Path of the source file, relative to the project root when possible.
    pub path: String,

    /// 1-based line.
    pub line: u32,

    /// 1-based column.
    pub column: u32,
}

impl Location {
    /// Creates a new [`Location`].
    #[must_use]
    pub fn new(path: impl Into<String>, line: u32, column: u32) -> Self {
        Self { path: path.into(), line, column }
    }
}

/// Capability resolving where a definition was registered.
///
/// [`RegistryBuilder`] captures the caller of every `define_*()` call with
/// `#[track_caller]` and asks its [`Locator`], if any, to turn it into a
/// [`Location`].
///
/// [`RegistryBuilder`]: crate::RegistryBuilder
pub trait Locator {
    /// Resolves the `caller` into a [`Location`], if possible.
    fn locate(&self, caller: &'static panic::Location<'static>)
        -> Option<Location>;
}

impl<F> Locator for F
where
    F: Fn(&'static panic::Location<'static>) -> Option<Location>,
{
    fn locate(
        &self,
        caller: &'static panic::Location<'static>,
    ) -> Option<Location> {
        self(caller)
    }
}

/// [`Locator`] using the caller's file as reported by the compiler,
/// relativized to a project root.
#[derive(Clone, Debug, Default)]
pub struct CallerLocator {
    project_root: Option<PathBuf>,
}

impl CallerLocator {
    /// Creates a [`CallerLocator`] stripping the `project_root` prefix off
    /// absolute paths.
    #[must_use]
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self { project_root: Some(project_root.into()) }
    }
}

impl Locator for CallerLocator {
    fn locate(
        &self,
        caller: &'static panic::Location<'static>,
    ) -> Option<Location> {
        let file = Path::new(caller.file());
        let path = self
            .project_root
            .as_deref()
            .and_then(|root| file.strip_prefix(root).ok())
            .unwrap_or(file);

        Some(Location::new(
            path.to_string_lossy().replace('\\', "/"),
            caller.line(),
            caller.column(),
        ))
    }
}
