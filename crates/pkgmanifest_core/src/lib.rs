//! `pkgmanifest_core` — assemble a package's `%files` manifest into a sorted,
//! deduplicated header/payload file list.
//!
//! This crate implements the manifest-assembly stage of a binary-package
//! build pipeline: parsing the `%files` mini-language, walking the build
//! root, reconciling explicit attributes with on-disk facts, merging
//! duplicate entries, and emitting header tag columns. It does not implement
//! the spec-file parser, the header binary format, the archive format, or
//! signing — those are external collaborators referenced only by the types
//! this crate produces.

pub mod caps;
pub mod config;
pub mod driver;
pub mod emit;
pub mod manifest;
pub mod merge;
pub mod source;
pub mod store;
pub mod unpackaged;
pub mod walker;

/// Re-export for downstream crates to get the matching version.
pub use pkgmanifest_types;
pub use pkgmanifest_utils;

/// Surface a diagnostic through `tracing` at its matching level, as it's
/// recorded, in addition to (not instead of) collecting it for the caller.
pub(crate) fn log_diagnostic(diagnostic: &pkgmanifest_types::diagnostic::Diagnostic) {
    if diagnostic.is_error() {
        tracing::error!("{diagnostic}");
    } else {
        tracing::warn!("{diagnostic}");
    }
}
