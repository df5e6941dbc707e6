// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Consumers of a flushed message stream.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use super::Envelope;

/// Message stream of one spec file, flushed once at the end of its run.
#[derive(Clone, Copy, Debug)]
pub struct Report<'a> {
    /// URI of the spec file.
    pub uri: &'a str,

    /// Every [`Envelope`] in emission order.
    pub envelopes: &'a [Envelope],

    /// Whether some test of the spec failed inside a hook.
    pub hook_failure: bool,
}

/// External reporting collaborator receiving [`Report`]s.
pub trait MessageSink {
    /// Consumes one flushed [`Report`].
    ///
    /// # Errors
    ///
    /// If the report cannot be persisted.
    fn flush(&mut self, report: Report<'_>) -> io::Result<()>;
}

impl<S: MessageSink + ?Sized> MessageSink for &mut S {
    fn flush(&mut self, report: Report<'_>) -> io::Result<()> {
        (**self).flush(report)
    }
}

/// In-memory [`MessageSink`] keeping every flushed [`Envelope`].
#[derive(Clone, Debug, Default)]
pub struct Collector {
    /// Flushed [`Envelope`]s, spec after spec.
    pub envelopes: Vec<Envelope>,

    /// Number of [`MessageSink::flush()`] calls received.
    pub flushes: usize,
}

impl MessageSink for Collector {
    fn flush(&mut self, report: Report<'_>) -> io::Result<()> {
        self.envelopes.extend_from_slice(report.envelopes);
        self.flushes += 1;
        Ok(())
    }
}

/// [`MessageSink`] writing one JSON object per line.
#[derive(Debug)]
pub struct Ndjson<W> {
    out: W,
}

impl<W: io::Write> Ndjson<W> {
    /// Creates a new [`Ndjson`] sink writing into `out`.
    #[must_use]
    pub const fn new(out: W) -> Self {
        Self { out }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: io::Write> MessageSink for Ndjson<W> {
    fn flush(&mut self, report: Report<'_>) -> io::Result<()> {
        write_lines(&mut self.out, report.envelopes)?;
        self.out.flush()
    }
}

/// [`MessageSink`] appending every spec's stream to a single NDJSON file.
///
/// Specs with a hook failure are skipped entirely, as such failures cannot be
/// represented in the resulting report.
#[derive(Clone, Debug)]
pub struct NdjsonFile {
    path: PathBuf,
}

impl NdjsonFile {
    /// Creates a new [`NdjsonFile`] sink appending to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the output file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes output left over by a previous run.
    ///
    /// # Errors
    ///
    /// If the file exists but cannot be removed.
    pub fn prepare(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

impl MessageSink for NdjsonFile {
    fn flush(&mut self, report: Report<'_>) -> io::Result<()> {
        if report.hook_failure {
            tracing::warn!(
                spec = report.uri,
                "Hook failures can't be represented in JSON reports, thus \
                 none is created for {}.",
                report.uri,
            );
            return Ok(());
        }

        let parent = self.path.parent();
        if let Some(dir) = parent.filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut out = io::BufWriter::new(file);
        write_lines(&mut out, report.envelopes)?;
        io::Write::flush(&mut out)
    }
}

fn write_lines(
    out: &mut impl io::Write,
    envelopes: &[Envelope],
) -> io::Result<()> {
    for env in envelopes {
        serde_json::to_writer(&mut *out, env)?;
        out.write_all(b"\n")?;
    }
    Ok(())
}
