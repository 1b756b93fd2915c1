//! A minimal stand-in for the package header's ordered tagged-value store.
//!
//! The real header container (its binary layout, tag numbering, signing, ...)
//! is an external collaborator we only ever *emit into* — see §1's "out of
//! scope" list. `Header` models exactly that emission contract (§6): one
//! index-aligned column per tag, plus a handful of aggregate scalars and
//! feature requirements, with no concern for how a downstream packager
//! eventually serialises it.

use compact_str::CompactString;

/// A synthetic dependency the emitter adds so older consumers know whether
/// they can install the resulting package (e.g. `PartialHardlinkSets`,
/// `FileDigests`, `FileCaps`, `PayloadFilesHavePrefix`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeatureRequirement {
    pub name: CompactString,
    pub version: CompactString,
}

impl FeatureRequirement {
    #[must_use]
    pub fn new(name: impl Into<CompactString>, version: impl Into<CompactString>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Per-file size column: either the 32-bit or 64-bit tag, never both, chosen
/// per-record based on whether any record in the package needs the wide form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSize {
    Narrow(u32),
    Wide(u64),
}

impl FileSize {
    #[must_use]
    pub fn value(self) -> u64 {
        match self {
            Self::Narrow(v) => u64::from(v),
            Self::Wide(v) => v,
        }
    }
}

/// The aggregate `SIZE`/`LONGSIZE` total, picked the same way as [`FileSize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalSize {
    Narrow(u32),
    Wide(u64),
}

impl TotalSize {
    #[must_use]
    pub fn value(self) -> u64 {
        match self {
            Self::Narrow(v) => u64::from(v),
            Self::Wide(v) => v,
        }
    }
}

/// Index-aligned per-file tag columns plus the aggregate tags, populated by
/// `HeaderEmitter`/`SourceAssembler` in sorted archive-path order.
#[derive(Debug, Clone, Default)]
pub struct Header {
    /// `OLDFILENAMES`/`ORIGFILENAMES`
    pub file_names: Vec<CompactString>,
    /// `FILEUSERNAME`
    pub file_usernames: Vec<CompactString>,
    /// `FILEGROUPNAME`
    pub file_groupnames: Vec<CompactString>,
    /// `FILESIZES`/`FILELONGSIZES`
    pub file_sizes: Vec<FileSize>,
    /// `FILEMTIMES`
    pub file_mtimes: Vec<i64>,
    /// `FILEMODES`
    pub file_modes: Vec<u32>,
    /// `FILERDEVS`
    pub file_rdevs: Vec<u32>,
    /// `FILEINODES`, 1-based, never zero
    pub file_inodes: Vec<u32>,
    /// `FILEDEVICES`, flattened to `{0,1}`
    pub file_devices: Vec<u32>,
    /// `FILELANGS`
    pub file_langs: Vec<CompactString>,
    /// `FILECAPS`
    pub file_caps: Vec<CompactString>,
    /// `FILEDIGESTS`, empty string for non-regular files or unread files
    pub file_digests: Vec<CompactString>,
    /// `FILELINKTOS`, empty string for non-symlinks
    pub file_linktos: Vec<CompactString>,
    /// `FILEVERIFYFLAGS`
    pub file_verify_flags: Vec<u32>,
    /// `FILEFLAGS`, with parse-only bits already stripped
    pub file_flags: Vec<u32>,

    /// Aggregate `SIZE`/`LONGSIZE`
    pub total_size: Option<TotalSize>,
    /// `FILEDIGESTALGO`, present only when a non-default algorithm was used
    pub digest_algo: Option<CompactString>,
    /// `SOURCERPM`
    pub source_package: Option<CompactString>,

    pub features: Vec<FeatureRequirement>,
}

impl Header {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of emitted file entries; all per-file columns share this length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.file_names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.file_names.is_empty()
    }

    pub fn require_feature(&mut self, name: impl Into<CompactString>, version: impl Into<CompactString>) {
        let req = FeatureRequirement::new(name, version);
        if !self.features.contains(&req) {
            self.features.push(req);
        }
    }
}

/// The shared-backing-buffer archive-path array handed to the downstream
/// packager alongside the header (§4.6 "Archive-path array").
#[derive(Debug, Clone, Default)]
pub struct ArchivePaths {
    buffer: String,
    /// Byte ranges into `buffer`, one per path, in emission order.
    spans: Vec<(usize, usize)>,
}

impl ArchivePaths {
    #[must_use]
    pub fn build<'a>(paths: impl Iterator<Item = &'a str>) -> Self {
        let mut buffer = String::new();
        let mut spans = Vec::new();
        for path in paths {
            let start = buffer.len();
            buffer.push_str(path);
            spans.push((start, buffer.len()));
        }
        Self { buffer, spans }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.spans
            .get(index)
            .map(|&(start, end)| &self.buffer[start..end])
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.spans.iter().map(|&(start, end)| &self.buffer[start..end])
    }
}
