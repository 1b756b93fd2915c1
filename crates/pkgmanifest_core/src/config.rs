//! Configuration for the manifest assembler, §6 "Configuration knobs consumed".

use compact_str::CompactString;
use pkgmanifest_utils::checksum::DigestAlgorithm;

/// How strictly the assembler reacts to a handful of conditions that are
/// warnings by default but can be promoted to hard package failures.
#[derive(Debug, derive_builder::Builder)]
#[non_exhaustive]
pub struct AssemblerConfiguration {
    /// Digest algorithm for binary-package file contents.
    #[builder(default = "DigestAlgorithm::Md5")]
    pub binary_digest_algorithm: DigestAlgorithm,
    /// Digest algorithm for the source package's file contents.
    #[builder(default = "DigestAlgorithm::Md5")]
    pub source_digest_algorithm: DigestAlgorithm,
    /// Colon-separated search path consulted when resolving `%docdir` entries.
    #[builder(default = "vec![\"/usr/share/doc\".into()]")]
    pub doc_dirs: Vec<CompactString>,
    /// Template for the synthesized special-doc subdirectory name, expanded
    /// against the package's name/version (default `{name}-{version}`).
    #[builder(default = "CompactString::new(\"{name}-{version}\")")]
    pub special_doc_dir_format: CompactString,
    /// Omit the `./` prefix on binary-package payload paths.
    #[builder(default = "false")]
    pub no_payload_prefix: bool,
    /// Override for the source package's `%defattr`-style default, e.g.
    /// `"-,root,root"`. `None` means "use the per-file defaults as collected".
    #[builder(default = "None")]
    pub source_defattr_override: Option<CompactString>,
    /// Promote a missing special-doc source file to a hard package failure.
    #[builder(default = "false")]
    pub missing_doc_files_terminate_build: bool,
    /// Promote unpackaged-files-checker output to a hard build failure.
    #[builder(default = "false")]
    pub unpackaged_files_terminate_build: bool,
    /// Promote arch-colored binaries inside a noarch package to a hard failure.
    #[builder(default = "false")]
    pub binaries_in_noarch_packages_terminate_build: bool,
    /// Legacy toggle: disable filelist compression (dir-token emission) in the
    /// archive-path array. Carried for compatibility; this assembler always
    /// emits the full per-file path, so the toggle is accepted but currently
    /// inert on the array itself — see `DESIGN.md`.
    #[builder(default = "false")]
    pub no_dir_tokens: bool,
}

impl AssemblerConfiguration {
    #[must_use]
    pub fn builder() -> AssemblerConfigurationBuilder {
        AssemblerConfigurationBuilder::default()
    }
}

impl Default for AssemblerConfiguration {
    fn default() -> Self {
        Self::builder()
            .build()
            .expect("all fields have defaults")
    }
}
