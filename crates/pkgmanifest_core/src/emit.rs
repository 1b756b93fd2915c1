//! HeaderEmitter (§4.6): walk the merged, sorted records and populate the
//! per-file header columns plus the aggregate tags and archive-path array.

use crate::config::AssemblerConfiguration;
use crate::store;
use pkgmanifest_types::attrs::AttributeFlags;
use pkgmanifest_types::diagnostic::Diagnostic;
use pkgmanifest_types::diagnostic::DiagnosticKind;
use pkgmanifest_types::diagnostic::DiagnosticVec;
use pkgmanifest_types::diagnostic::Severity;
use pkgmanifest_types::files::FileRecord;
use pkgmanifest_types::header::ArchivePaths;
use pkgmanifest_types::header::FileSize;
use pkgmanifest_types::header::Header;
use pkgmanifest_types::header::TotalSize;
use pkgmanifest_types::intern::Interner;
use pkgmanifest_utils::checksum::digest_readable;
use pkgmanifest_utils::checksum::DigestAlgorithm;

/// Whether the emitted archive-path array gets `./` prefixes (binary
/// packages) or bare basenames (the source package, §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Binary,
    Source,
}

/// Emit one package's header and archive-path array from its merged,
/// excluded-stripped, sorted records.
pub fn emit(
    records: Vec<FileRecord>,
    interner: &Interner,
    config: &AssemblerConfiguration,
    payload: PayloadKind,
    algorithm: DigestAlgorithm,
    diagnostics: &mut DiagnosticVec,
) -> (Header, ArchivePaths, bool) {
    tracing::debug!("emitting header for {} records", records.len());

    let mut header = Header::new();
    let mut total_size: u64 = 0;
    let mut any_caps = false;
    let mut failed = false;

    // Decide hardlink-set first-occurrence before consuming the vector, since
    // §3 only counts a hardlinked file's size once per set.
    let first_occurrence: Vec<bool> = (0..records.len())
        .map(|i| !store::seen_earlier_hardlink(&records, i))
        .collect();

    for (index, mut record) in records.into_iter().enumerate() {
        if record.stat.mode.is_regular() && !record.flags.contains(AttributeFlags::GHOST) {
            match std::fs::File::open(&record.disk_path) {
                Ok(mut file) => match digest_readable(algorithm, &mut file) {
                    Ok(digest) => record.digest = Some(digest),
                    Err(err) => {
                        let diagnostic = Diagnostic::new(
                            Severity::Error,
                            DiagnosticKind::Filesystem(format!("digest failed: {err}")),
                        )
                        .with_context(record.disk_path.clone());
                        crate::log_diagnostic(&diagnostic);
                        diagnostics.push(diagnostic);
                        failed = true;
                    }
                },
                Err(err) => {
                    let diagnostic = Diagnostic::new(
                        Severity::Error,
                        DiagnosticKind::Filesystem(format!("open for digest failed: {err}")),
                    )
                    .with_context(record.disk_path.clone());
                    crate::log_diagnostic(&diagnostic);
                    diagnostics.push(diagnostic);
                    failed = true;
                }
            }
        }

        header.file_names.push(record.archive_path_with_prefix(match payload {
            PayloadKind::Binary if !config.no_payload_prefix => Some("."),
            _ => None,
        }));
        header.file_usernames.push(record.owner_str(interner).into());
        header.file_groupnames.push(record.group_str(interner).into());

        let size = record.stat.size;
        header.file_sizes.push(if size > crate::walker::LARGE_FILE_LIMIT {
            FileSize::Wide(size)
        } else {
            FileSize::Narrow(size as u32)
        });
        header.file_mtimes.push(record.stat.mtime);
        header.file_modes.push(record.stat.mode.0);
        header.file_rdevs.push(record.stat.rdev as u32);
        header.file_inodes.push((index + 1) as u32);
        header.file_devices.push(u32::from(record.stat.dev != 0));
        header.file_langs.push(record.lang.clone());
        header.file_caps.push(record.caps.clone());
        if !record.caps.is_empty() {
            any_caps = true;
        }

        let digest_text = if record.stat.mode.is_regular() {
            record.digest.as_ref().map_or_else(String::new, |d| d.to_hex())
        } else {
            String::new()
        };
        header.file_digests.push(digest_text.into());

        let linkto = record
            .symlink_target
            .as_ref()
            .map(|target| target.to_string_lossy().into_owned())
            .unwrap_or_default();
        header.file_linktos.push(linkto.into());

        let mut verify_flags = record.verify_flags;
        if record.flags.contains(AttributeFlags::GHOST) {
            verify_flags = verify_flags.ghost_scrubbed();
        }
        header.file_verify_flags.push(verify_flags.bits());

        let mut flags = record.flags.exported();
        if record.stat.mode.is_dir() {
            flags.remove(AttributeFlags::CONFIG | AttributeFlags::DOC);
        }
        header.file_flags.push(flags.bits());

        if first_occurrence[index] {
            total_size = total_size.saturating_add(size);
        }
    }

    header.total_size = Some(if total_size > u32::MAX as u64 {
        TotalSize::Wide(total_size)
    } else {
        TotalSize::Narrow(total_size as u32)
    });

    if algorithm != DigestAlgorithm::Md5 {
        header.digest_algo = Some(algorithm.to_string().into());
        header.require_feature("FileDigests", "4.6.0-1");
    }
    if any_caps {
        header.require_feature("FileCaps", "4.14.0-1");
    }
    if matches!(payload, PayloadKind::Binary) && !config.no_payload_prefix {
        header.require_feature("PayloadFilesHavePrefix", "4.0-1");
    }

    let paths = ArchivePaths::build(header.file_names.iter().map(|s| s.as_str()));
    (header, paths, failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use crate::config::AssemblerConfiguration;
    use crate::manifest::resolver::resolve;
    use crate::walker::walk_token;
    use pkgmanifest_types::attrs::AttrSet;
    use tempfile::TempDir;

    #[test]
    fn simple_file_emits_size_and_narrow_names() {
        let dir = TempDir::new().unwrap();
        let build_root = dir.path();
        std::fs::create_dir_all(build_root.join("usr/bin")).unwrap();
        std::fs::write(build_root.join("usr/bin/foo"), b"0123456789").unwrap();

        let interner = Interner::new();
        let mut diagnostics = DiagnosticVec::new();
        let resolved = resolve(&AttrSet::new(), AttrSet::new());
        let records = walk_token("/usr/bin/foo", build_root, &resolved, &interner, &mut diagnostics);

        let config = AssemblerConfiguration::default();
        let (header, paths, failed) = emit(
            records,
            &interner,
            &config,
            PayloadKind::Binary,
            DigestAlgorithm::Md5,
            &mut diagnostics,
        );
        assert!(!failed);
        assert_eq!(header.total_size, Some(TotalSize::Narrow(10)));
        assert_eq!(paths.get(0), Some("./usr/bin/foo"));
    }

    #[test]
    fn directories_have_doc_and_config_flags_scrubbed() {
        let dir = TempDir::new().unwrap();
        let build_root = dir.path();
        std::fs::create_dir_all(build_root.join("etc/x")).unwrap();

        let interner = Interner::new();
        let mut diagnostics = DiagnosticVec::new();
        let mut current = AttrSet::new();
        current.flags.insert(AttributeFlags::DOC);
        let resolved = resolve(&AttrSet::new(), current);
        let records = walk_token("/etc/x", build_root, &resolved, &interner, &mut diagnostics);

        let config = AssemblerConfiguration::default();
        let (header, _paths, _failed) = emit(
            records,
            &interner,
            &config,
            PayloadKind::Binary,
            DigestAlgorithm::Md5,
            &mut diagnostics,
        );
        let flags = pkgmanifest_types::attrs::AttributeFlags::from_bits_truncate(header.file_flags[0]);
        assert!(!flags.contains(AttributeFlags::DOC));
    }
}
