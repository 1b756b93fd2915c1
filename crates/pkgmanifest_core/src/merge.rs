//! Duplicate Merge Policy (§4.7), kept separate from `HeaderEmitter` per the
//! design notes: first produce one merged, sorted vector; emission is a
//! second, independently-testable pass over that vector.

use pkgmanifest_types::attrs::Specd;
use pkgmanifest_types::diagnostic::Diagnostic;
use pkgmanifest_types::diagnostic::DiagnosticKind;
use pkgmanifest_types::diagnostic::DiagnosticVec;
use pkgmanifest_types::diagnostic::Severity;
use pkgmanifest_types::files::FileRecord;
use pkgmanifest_types::attrs::AttributeFlags;

/// Collapse consecutive same-archive-path records (the input must already be
/// sorted, e.g. via [`crate::store::RecordStore::into_sorted`]) into one
/// record each, keeping the more-explicit field values and warning about the
/// collision unless one side is `%exclude`.
#[must_use]
pub fn merge_duplicates(sorted: Vec<FileRecord>, diagnostics: &mut DiagnosticVec) -> Vec<FileRecord> {
    let mut out: Vec<FileRecord> = Vec::with_capacity(sorted.len());
    for record in sorted {
        match out.last_mut() {
            Some(prev) if prev.archive_path == record.archive_path => {
                merge_into(prev, record, diagnostics);
            }
            _ => out.push(record),
        }
    }
    out
}

fn merge_into(winner: &mut FileRecord, loser: FileRecord, diagnostics: &mut DiagnosticVec) {
    let either_excluded =
        winner.flags.contains(AttributeFlags::EXCLUDE) || loser.flags.contains(AttributeFlags::EXCLUDE);
    if !either_excluded {
        let diagnostic = Diagnostic::new(
            Severity::Warning,
            DiagnosticKind::Consistency(format!("duplicate file entry: {}", winner.archive_path)),
        );
        crate::log_diagnostic(&diagnostic);
        diagnostics.push(diagnostic);
    }

    winner.flags |= loser.flags;

    // mode: file vs dir tracked by the same specd slot (no separate dir-mode
    // bit on FileRecord; a record is one or the other by its own stat).
    if loser.specd.file_mode >= winner.specd.file_mode {
        winner.stat.mode = loser.stat.mode;
        winner.specd.file_mode = loser.specd.file_mode;
    }
    if loser.specd.user >= winner.specd.user {
        winner.owner = loser.owner;
        winner.specd.user = loser.specd.user;
    }
    if loser.specd.group >= winner.specd.group {
        winner.group = loser.group;
        winner.specd.group = loser.specd.group;
    }
    if loser.specd.verify >= winner.specd.verify {
        winner.verify_flags = loser.verify_flags;
        winner.specd.verify = loser.specd.verify;
    }

    // The later record otherwise takes over identity-bearing fields not
    // tracked by a Specd slot (stat facts, digest, symlink target): the later
    // line in the manifest is closer to the author's actual intent.
    winner.disk_path = loser.disk_path;
    winner.stat.nlink = loser.stat.nlink;
    winner.stat.size = loser.stat.size;
    winner.stat.mtime = loser.stat.mtime;
    winner.stat.dev = loser.stat.dev;
    winner.stat.ino = loser.stat.ino;
    winner.stat.rdev = loser.stat.rdev;
    winner.digest = loser.digest;
    winner.symlink_target = loser.symlink_target;
    if !loser.lang.is_empty() {
        winner.lang = loser.lang;
    }
    if !loser.caps.is_empty() {
        winner.caps = loser.caps;
    }
}

/// Drop every record carrying `EXCLUDE` — run after merge, per §3's "contain
/// no entry whose flags include EXCLUDE".
#[must_use]
pub fn drop_excluded(records: Vec<FileRecord>) -> Vec<FileRecord> {
    records
        .into_iter()
        .filter(|record| !record.flags.contains(AttributeFlags::EXCLUDE))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use compact_str::CompactString;
    use pkgmanifest_types::attrs::SpecdSet;
    use pkgmanifest_types::files::Mode;
    use pkgmanifest_types::files::StatInfo;
    use pkgmanifest_types::intern::GroupRef;
    use pkgmanifest_types::intern::Interner;
    use pkgmanifest_types::intern::OwnerRef;
    use std::path::PathBuf;

    fn record(archive_path: &str, flags: AttributeFlags, specd: SpecdSet) -> FileRecord {
        let interner = Interner::new();
        FileRecord {
            disk_path: PathBuf::from(archive_path),
            archive_path: CompactString::from(archive_path),
            stat: StatInfo { mode: Mode::new(libc::S_IFREG as u32 | 0o644), ..Default::default() },
            owner: OwnerRef::get_or_intern(&interner, "root"),
            group: GroupRef::get_or_intern(&interner, "root"),
            flags,
            verify_flags: Default::default(),
            specd,
            lang: CompactString::default(),
            caps: CompactString::default(),
            digest: None,
            symlink_target: None,
        }
    }

    #[test]
    fn exclude_masks_the_duplicate_warning() {
        let mut diagnostics = DiagnosticVec::new();
        let records = vec![
            record("/etc/x/b", AttributeFlags::empty(), SpecdSet::default()),
            record("/etc/x/b", AttributeFlags::EXCLUDE, SpecdSet::default()),
        ];
        let merged = merge_duplicates(records, &mut diagnostics);
        assert!(diagnostics.is_empty());
        assert_eq!(merged.len(), 1);
        let final_records = drop_excluded(merged);
        assert!(final_records.is_empty());
    }

    #[test]
    fn duplicate_without_exclude_warns() {
        let mut diagnostics = DiagnosticVec::new();
        let records = vec![
            record("/etc/x/a", AttributeFlags::empty(), SpecdSet::default()),
            record("/etc/x/a", AttributeFlags::empty(), SpecdSet::default()),
        ];
        let merged = merge_duplicates(records, &mut diagnostics);
        assert_eq!(merged.len(), 1);
        assert_eq!(diagnostics.len(), 1);
        assert!(!diagnostics[0].is_error());
    }

    #[test]
    fn more_explicit_specd_wins() {
        let mut diagnostics = DiagnosticVec::new();
        let mut first_specd = SpecdSet::default();
        first_specd.verify = Specd::FromDefault;
        let mut second_specd = SpecdSet::default();
        second_specd.verify = Specd::FromCurrent;

        let mut first = record("/a", AttributeFlags::empty(), first_specd);
        first.verify_flags = pkgmanifest_types::attrs::VerifyFlags::DIGEST;
        let mut second = record("/a", AttributeFlags::empty(), second_specd);
        second.verify_flags = pkgmanifest_types::attrs::VerifyFlags::SIZE;

        let merged = merge_duplicates(vec![first, second], &mut diagnostics);
        assert_eq!(merged[0].verify_flags, pkgmanifest_types::attrs::VerifyFlags::SIZE);
    }
}
