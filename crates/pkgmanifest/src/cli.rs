use std::fmt::Display;
use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub(crate) struct Cli {
    /// Build root the manifest's paths are relative to
    #[arg(long)]
    pub(crate) build_root: PathBuf,
    /// File containing the %files manifest lines; reads stdin if omitted
    #[arg(long)]
    pub(crate) manifest: Option<PathBuf>,
    /// Directory external `%files -f name` references are resolved against;
    /// defaults to the manifest file's own directory, or the build root when
    /// reading from stdin
    #[arg(long)]
    pub(crate) manifest_base_dir: Option<PathBuf>,
    /// Additional manifest files (`%files -f name`) to read and append, as if
    /// their lines had been written directly in --manifest. May be repeated.
    #[arg(long = "extra-manifest")]
    pub(crate) extra_manifest_files: Vec<PathBuf>,

    /// Package name
    #[arg(long)]
    pub(crate) name: String,
    /// Package version
    #[arg(long)]
    pub(crate) version: String,
    /// Package release
    #[arg(long)]
    pub(crate) release: String,
    /// Package architecture, e.g. x86_64 or noarch
    #[arg(long)]
    pub(crate) arch: String,
    /// This build excludes its sources (affects the derived SOURCERPM suffix)
    #[arg(long)]
    pub(crate) excludes_source: bool,

    /// Digest algorithm for binary-package file contents
    #[arg(long, default_value_t = DigestAlgorithmArg::Md5)]
    pub(crate) digest_algorithm: DigestAlgorithmArg,
    /// Omit the "./" prefix on binary-package payload paths
    #[arg(long)]
    pub(crate) no_payload_prefix: bool,

    /// Promote a missing special-doc source file to a hard build failure
    #[arg(long)]
    pub(crate) missing_doc_files_terminate_build: bool,
    /// Promote arch-colored binaries inside a noarch package to a hard build failure
    #[arg(long)]
    pub(crate) binaries_in_noarch_packages_terminate_build: bool,
    /// Promote unpackaged-files-checker output to a hard build failure
    #[arg(long)]
    pub(crate) unpackaged_files_terminate_build: bool,
    /// Shell command piped every packaged disk path, one per line; whatever it
    /// prints on stdout is reported as unpackaged
    #[arg(long)]
    pub(crate) unpackaged_checker: Option<String>,

    /// Print the assembled header and diagnostics as JSON instead of a summary
    #[cfg(feature = "json")]
    #[arg(long)]
    pub(crate) json: bool,
}

/// Digest algorithm selectable on the command line
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, clap::ValueEnum)]
pub(crate) enum DigestAlgorithmArg {
    Md5,
    Sha256,
}

impl Display for DigestAlgorithmArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Md5 => write!(f, "md5"),
            Self::Sha256 => write!(f, "sha256"),
        }
    }
}
