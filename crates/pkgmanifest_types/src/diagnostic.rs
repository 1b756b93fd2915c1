//! Diagnostics raised while assembling a package's manifest.
//!
//! Per §7 of the design, most error kinds are recoverable at the granularity of
//! one manifest line: the line is abandoned but the pass continues so a user
//! sees every problem in one run. A `Diagnostic` captures enough context to
//! both log the problem immediately and report it at the end of the pass.

use smallvec::SmallVec;
use std::fmt::Display;
use std::path::PathBuf;

/// Type for a vector of diagnostics, optimised for the common case of zero or
/// one entry per manifest line.
pub type DiagnosticVec = SmallVec<[Diagnostic; 1]>;

/// How severely a diagnostic should be treated. Several kinds have a severity
/// that is actually a configuration knob (duplicate-unless-excluded, noarch
/// with arch-colored binaries, unpackaged files); the knob decides whether the
/// kind is constructed as `Warning` or `Error` in the first place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Warning,
    Error,
}

/// One diagnostic raised during assembly.
#[derive(Debug)]
pub struct Diagnostic {
    /// Manifest line or disk path this diagnostic concerns, if any.
    pub context: Option<PathBuf>,
    pub severity: Severity,
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    #[must_use]
    pub fn new(severity: Severity, kind: DiagnosticKind) -> Self {
        Self {
            context: None,
            severity,
            kind,
        }
    }

    #[must_use]
    pub fn with_context(mut self, context: impl Into<PathBuf>) -> Self {
        self.context = Some(context.into());
        self
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Taxonomy of things that can go wrong while assembling one package's
/// manifest, per §7.
#[derive(Debug)]
#[non_exhaustive]
pub enum DiagnosticKind {
    /// Missing parenthesis, bad mode, bad token, bad locale, non-absolute path
    /// without permission, more than one file-name token on a non-special-doc line.
    Syntax(String),
    /// stat/readlink failure on a non-ghost entry, symlink escaping the build
    /// root, glob yielding nothing.
    Filesystem(String),
    /// Unparsable capability text, or capability support missing at build time.
    Capability(String),
    /// A regular file exceeds the archive's size limit.
    Size(String),
    /// Noarch package containing arch-colored binaries; duplicate file not
    /// masked by `%exclude`.
    Consistency(String),
    /// The unpackaged-files checker reported content.
    External(String),
}

impl Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Syntax(msg) => write!(f, "syntax error: {msg}"),
            Self::Filesystem(msg) => write!(f, "filesystem error: {msg}"),
            Self::Capability(msg) => write!(f, "capability error: {msg}"),
            Self::Size(msg) => write!(f, "size error: {msg}"),
            Self::Consistency(msg) => write!(f, "{msg}"),
            Self::External(msg) => write!(f, "{msg}"),
        }
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.context {
            Some(path) => write!(f, "{}: {}", path.display(), self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}
