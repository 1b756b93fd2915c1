//! SourceAssembler (§4.8): the source-package variant. No tree walk, no
//! globbing — just `stat` each input and emit the same way as a binary
//! package's `HeaderEmitter`.

use crate::config::AssemblerConfiguration;
use crate::emit;
use crate::emit::PayloadKind;
use crate::merge;
use crate::store::RecordStore;
use compact_str::CompactString;
use pkgmanifest_types::attrs::AttributeFlags;
use pkgmanifest_types::attrs::SpecdSet;
use pkgmanifest_types::diagnostic::Diagnostic;
use pkgmanifest_types::diagnostic::DiagnosticKind;
use pkgmanifest_types::diagnostic::DiagnosticVec;
use pkgmanifest_types::diagnostic::Severity;
use pkgmanifest_types::files::basename;
use pkgmanifest_types::files::FileRecord;
use pkgmanifest_types::files::Gid;
use pkgmanifest_types::files::StatInfo;
use pkgmanifest_types::files::Uid;
use pkgmanifest_types::header::ArchivePaths;
use pkgmanifest_types::header::Header;
use pkgmanifest_types::intern::GroupRef;
use pkgmanifest_types::intern::Interner;
use pkgmanifest_types::intern::OwnerRef;
use pkgmanifest_utils::checksum::DigestAlgorithm;
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use std::path::PathBuf;

/// One input to the source package: a spec file, a declared source, or a
/// subpackage icon. `no_source` mirrors the `!`-prefix convention (the file
/// is excluded from the built source rpm's payload but still listed).
#[derive(Debug, Clone)]
pub struct SourceInput {
    pub path: PathBuf,
    pub no_source: bool,
    pub is_spec_file: bool,
}

impl SourceInput {
    #[must_use]
    pub fn spec_file(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), no_source: false, is_spec_file: true }
    }

    #[must_use]
    pub fn source(path: impl Into<PathBuf>, no_source: bool) -> Self {
        Self { path: path.into(), no_source, is_spec_file: false }
    }

    /// Icons (`pkg->icon` in the original) use the same `!`-prefix convention
    /// as regular sources.
    #[must_use]
    pub fn icon(path: impl Into<PathBuf>, no_source: bool) -> Self {
        Self { path: path.into(), no_source, is_spec_file: false }
    }
}

fn parse_override(spec: &str) -> Option<(Option<u32>, Option<CompactString>, Option<CompactString>)> {
    let parts: Vec<&str> = spec.split(',').collect();
    if parts.len() != 3 {
        return None;
    }
    let mode = u32::from_str_radix(parts[0].trim(), 8).ok();
    let user = (parts[1].trim() != "-" && !parts[1].trim().is_empty())
        .then(|| CompactString::from(parts[1].trim()));
    let group = (parts[2].trim() != "-" && !parts[2].trim().is_empty())
        .then(|| CompactString::from(parts[2].trim()));
    Some((mode, user, group))
}

/// Assemble the source package's file list and emit its header.
pub fn assemble_source(
    inputs: &[SourceInput],
    interner: &Interner,
    config: &AssemblerConfiguration,
    algorithm: DigestAlgorithm,
    diagnostics: &mut DiagnosticVec,
) -> (Header, ArchivePaths, bool) {
    tracing::debug!("assembling source package from {} inputs", inputs.len());

    let overrides = config
        .source_defattr_override
        .as_deref()
        .and_then(parse_override);

    let mut store = RecordStore::new();

    for input in inputs {
        let meta = match std::fs::symlink_metadata(&input.path) {
            Ok(meta) => meta,
            Err(err) => {
                let diagnostic = Diagnostic::new(
                    Severity::Error,
                    DiagnosticKind::Filesystem(format!("stat failed: {err}")),
                )
                .with_context(input.path.clone());
                crate::log_diagnostic(&diagnostic);
                diagnostics.push(diagnostic);
                continue;
            }
        };

        let archive_path = basename(&input.path);
        let (mode, user, group) = overrides.clone().unwrap_or((None, None, None));
        let mode = mode.unwrap_or(meta.mode() & pkgmanifest_utils::MODE_MASK) | (meta.mode() & !pkgmanifest_utils::MODE_MASK);

        let owner_name = user.unwrap_or_else(|| CompactString::from("root"));
        let group_name = group.unwrap_or_else(|| CompactString::from("root"));

        let mut flags = AttributeFlags::empty();
        if input.is_spec_file {
            flags.insert(AttributeFlags::SPECFILE);
        }
        // A no-source input is still listed in the source header (the `!`
        // prefix only excludes it from what gets rebuilt from); it must not
        // carry EXCLUDE, which would make drop_excluded() delete it outright.

        let stat = StatInfo {
            mode: pkgmanifest_types::files::Mode::new(mode),
            nlink: meta.nlink(),
            uid: Uid::new(meta.uid()),
            gid: Gid::new(meta.gid()),
            rdev: meta.rdev(),
            size: meta.size(),
            mtime: meta.mtime(),
            dev: meta.dev(),
            ino: meta.ino(),
        };

        store.push(FileRecord {
            disk_path: input.path.clone(),
            archive_path,
            stat,
            owner: OwnerRef::get_or_intern(interner, owner_name.as_str()),
            group: GroupRef::get_or_intern(interner, group_name.as_str()),
            flags,
            verify_flags: pkgmanifest_types::attrs::VerifyFlags::ALL,
            specd: SpecdSet::default(),
            lang: CompactString::default(),
            caps: CompactString::default(),
            digest: None,
            symlink_target: None,
        });
    }

    let sorted = store.into_sorted();
    let merged = merge::merge_duplicates(sorted, diagnostics);
    let final_records = merge::drop_excluded(merged);
    emit::emit(final_records, interner, config, PayloadKind::Source, algorithm, diagnostics)
}
