//! RecordStore (§4.5): collect raw `FileRecord`s, sort by archive path, and
//! scan for hardlink sets.

use pkgmanifest_types::files::FileRecord;
use pkgmanifest_types::header::Header;

/// Growable collection of records for one package, doubling in chunks of
/// 128 as the original tool's `FileList` does, sorted by archive path once
/// collection finishes.
#[derive(Debug, Default)]
pub struct RecordStore {
    records: Vec<FileRecord>,
}

const GROW_GRANULARITY: usize = 128;

impl RecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self { records: Vec::with_capacity(GROW_GRANULARITY) }
    }

    pub fn push(&mut self, record: FileRecord) {
        if self.records.len() == self.records.capacity() {
            self.records.reserve(GROW_GRANULARITY);
        }
        self.records.push(record);
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = FileRecord>) {
        for record in records {
            self.push(record);
        }
    }

    /// Sort by archive path (byte order) and return the sorted records.
    #[must_use]
    pub fn into_sorted(mut self) -> Vec<FileRecord> {
        self.records.sort_by(|a, b| a.archive_path.as_bytes().cmp(b.archive_path.as_bytes()));
        self.records
    }
}

/// `checkHardLinks`: true if any regular-file record shares `(dev,ino)` with
/// another, i.e. the payload may contain partial hardlink sets.
#[must_use]
pub fn has_hardlink_sets(records: &[FileRecord]) -> bool {
    let mut seen = std::collections::HashSet::new();
    for record in records {
        if let Some(key) = record.hardlink_key() {
            if !seen.insert(key) {
                return true;
            }
        }
    }
    false
}

/// If `has_hardlink_sets` found any, register the feature requirement on the
/// header (§4.6's `PartialHardlinkSets`).
pub fn register_hardlink_feature(records: &[FileRecord], header: &mut Header) {
    if has_hardlink_sets(records) {
        header.require_feature("PartialHardlinkSets", "4.0.4-1");
    }
}

/// `seenHardLink(i)`: does any record before index `i` share a hardlink set
/// with `records[i]`? Used so a hardlinked file's size is only counted once
/// towards the package total (§3's "add size once per hardlink set").
#[must_use]
pub fn seen_earlier_hardlink(records: &[FileRecord], i: usize) -> bool {
    let Some(key) = records[i].hardlink_key() else { return false };
    records[..i].iter().any(|other| other.hardlink_key() == Some(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use compact_str::CompactString;
    use pkgmanifest_types::files::Mode;
    use pkgmanifest_types::files::StatInfo;
    use pkgmanifest_types::intern::GroupRef;
    use pkgmanifest_types::intern::Interner;
    use pkgmanifest_types::intern::OwnerRef;
    use std::path::PathBuf;

    fn record(archive_path: &str, dev: u64, ino: u64, nlink: u64) -> FileRecord {
        let interner = Interner::new();
        FileRecord {
            disk_path: PathBuf::from(archive_path),
            archive_path: CompactString::from(archive_path),
            stat: StatInfo {
                mode: Mode::new(libc::S_IFREG as u32 | 0o644),
                nlink,
                dev,
                ino,
                ..Default::default()
            },
            owner: OwnerRef::get_or_intern(&interner, "root"),
            group: GroupRef::get_or_intern(&interner, "root"),
            flags: Default::default(),
            verify_flags: Default::default(),
            specd: Default::default(),
            lang: CompactString::default(),
            caps: CompactString::default(),
            digest: None,
            symlink_target: None,
        }
    }

    #[test]
    fn sorts_by_archive_path() {
        let mut store = RecordStore::new();
        store.push(record("/b", 1, 1, 1));
        store.push(record("/a", 1, 2, 1));
        let sorted = store.into_sorted();
        assert_eq!(sorted[0].archive_path, "/a");
        assert_eq!(sorted[1].archive_path, "/b");
    }

    #[test]
    fn detects_hardlink_sets() {
        let records = vec![record("/a", 5, 100, 2), record("/b", 5, 100, 2)];
        assert!(has_hardlink_sets(&records));
        assert!(!seen_earlier_hardlink(&records, 0));
        assert!(seen_earlier_hardlink(&records, 1));
    }

    #[test]
    fn distinct_inodes_are_not_hardlinks() {
        let records = vec![record("/a", 5, 100, 1), record("/b", 5, 101, 1)];
        assert!(!has_hardlink_sets(&records));
    }
}
