//! The input/output shape of one package's `%files` processing pass.

use crate::diagnostic::DiagnosticVec;
use crate::files::FileRecord;
use crate::header::ArchivePaths;
use crate::header::Header;
use std::path::PathBuf;

/// Input to a single package's assembly pass: the manifest lines already
/// written out (in source order) plus zero or more externally named
/// manifest files to be read and appended as if their contents had been
/// written inline (`%files -f path`).
#[derive(Debug, Clone, Default)]
pub struct PackageManifest {
    pub lines: Vec<String>,
    pub external_files: Vec<PathBuf>,
}

impl PackageManifest {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }
}

/// Output of a successful (or partially successful — see `diagnostics`)
/// assembly pass: the sorted, merged file records, the populated header, the
/// archive-path array sharing one backing buffer, and the diagnostics
/// collected along the way.
#[derive(Debug)]
pub struct AssembledManifest {
    pub records: Vec<FileRecord>,
    pub header: Header,
    pub archive_paths: ArchivePaths,
    pub diagnostics: DiagnosticVec,
    /// Mirrors the "work unit failed" flag: errors were recorded, but the
    /// caller may still want the partial header for display purposes.
    pub failed: bool,
}
