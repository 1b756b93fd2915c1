//! The attribute bundle attached to a manifest line, and the bitsets it is built from.

use compact_str::CompactString;

bitflags::bitflags! {
    /// Bits carried by a `FileRecord` (and, before resolution, by an `AttrSet`).
    ///
    /// The last four (`DOCDIR, DIR, EXCLUDE, SPECIALDOC`) are parse-time only and
    /// must be stripped before `FILEFLAGS` is written (see `HeaderEmitter`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct AttributeFlags: u32 {
        const CONFIG     = 1 << 0;
        const MISSINGOK  = 1 << 1;
        const NOREPLACE  = 1 << 2;
        const DOC        = 1 << 3;
        const README     = 1 << 4;
        const LICENSE    = 1 << 5;
        const PUBKEY     = 1 << 6;
        const GHOST      = 1 << 7;
        /// Also set for the spec file of a source-package manifest.
        const SPECFILE   = 1 << 8;

        // Parse-time only bits, below the export mask.
        const DIR        = 1 << 16;
        const DOCDIR     = 1 << 17;
        const EXCLUDE    = 1 << 18;
        const SPECIALDOC = 1 << 19;
    }
}

impl AttributeFlags {
    /// Bits that are legal to persist into an emitted `FILEFLAGS` column.
    pub const EXPORT_MASK: Self = Self::from_bits_truncate(0x0000_ffff);

    /// Strip the parse-only bits before writing `FILEFLAGS`.
    #[must_use]
    pub fn exported(self) -> Self {
        self & Self::EXPORT_MASK
    }
}

bitflags::bitflags! {
    /// What `%verify`/`%defverify` (or a directory/ghost scrub) checks about a file
    /// at install-verification time.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct VerifyFlags: u32 {
        const DIGEST = 1 << 0;
        const SIZE   = 1 << 1;
        const LINKTO = 1 << 2;
        const USER   = 1 << 3;
        const GROUP  = 1 << 4;
        const MTIME  = 1 << 5;
        const MODE   = 1 << 6;
        const RDEV   = 1 << 7;
        const CAPS   = 1 << 8;
    }
}

impl VerifyFlags {
    pub const ALL: Self = Self::all();

    /// Drop the checks that cannot be meaningfully verified against a file that
    /// is intentionally absent from the payload (`%ghost`).
    #[must_use]
    pub fn ghost_scrubbed(self) -> Self {
        self & !(Self::DIGEST | Self::SIZE | Self::LINKTO | Self::MTIME)
    }
}

/// Precedence level of a single resolved attribute field, used by the duplicate
/// merge policy (§4.7): explicit-current beats explicit-default beats unset, and
/// ties keep the later record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Specd {
    #[default]
    Unset,
    FromDefault,
    FromCurrent,
}

impl Specd {
    /// Whichever of `self`/`other` is more explicit; `other` wins ties.
    #[must_use]
    pub fn merge_keep_later(self, other: Self) -> Self {
        if other >= self { other } else { self }
    }
}

/// Per-attribute explicitness, one [`Specd`] slot per mergeable field, mirroring
/// the fields of [`AttrSet`] that participate in duplicate-merge precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpecdSet {
    pub file_mode: Specd,
    pub dir_mode: Specd,
    pub user: Specd,
    pub group: Specd,
    pub verify: Specd,
}

/// A device-node directive's payload: `%dev(type major minor)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceSpec {
    pub is_block: bool,
    pub major: u32,
    pub minor: u32,
}

/// Highest device major/minor component accepted (exclusive upper bound), per
/// the manifest language's `[0,256)` constraint.
pub const DEVICE_COMPONENT_LIMIT: u32 = 256;

impl DeviceSpec {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.major < DEVICE_COMPONENT_LIMIT && self.minor < DEVICE_COMPONENT_LIMIT
    }
}

/// Sorted, deduplicated set of locale tags (`%lang`).
///
/// A single-character tag is only legal if it is `"C"`; all tags are 1..31 bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LangSet(Vec<CompactString>);

impl LangSet {
    pub const MAX_LEN: usize = 31;

    #[must_use]
    pub fn is_valid_tag(tag: &str) -> bool {
        if tag.is_empty() || tag.len() > Self::MAX_LEN {
            return false;
        }
        if tag.len() == 1 {
            return tag == "C";
        }
        true
    }

    /// Insert a tag, keeping the set sorted and unique. Returns `false` if the
    /// tag was already present (the caller turns that into a warning, not an error).
    pub fn insert(&mut self, tag: CompactString) -> bool {
        match self.0.binary_search(&tag) {
            Ok(_) => false,
            Err(idx) => {
                self.0.insert(idx, tag);
                true
            }
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(CompactString::as_str)
    }

    /// The tags joined with `|`, the form stored on a `FileRecord`.
    #[must_use]
    pub fn joined(&self) -> CompactString {
        CompactString::from(self.0.join("|"))
    }
}

/// The attribute bundle attached to a manifest line (the "current" `AttrSet`)
/// or carried as a package section's defaults (the "default" `AttrSet`).
///
/// A default `AttrSet` lives for the duration of one package's manifest; a
/// current `AttrSet` lives for one line and is resolved into a value (not a
/// shared reference) before being attached to a `FileRecord` — later lines
/// must not retroactively change already-resolved records.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttrSet {
    pub file_mode: Option<u32>,
    /// Only meaningful on a default `AttrSet` (`%defattr`'s fourth argument)
    pub dir_mode: Option<u32>,
    pub user: Option<CompactString>,
    pub group: Option<CompactString>,
    pub verify_flags: VerifyFlags,
    pub caps: Option<CompactString>,
    pub lang: LangSet,
    pub device: Option<DeviceSpec>,
    pub flags: AttributeFlags,
    pub specd: SpecdSet,
}

impl AttrSet {
    #[must_use]
    pub fn new() -> Self {
        Self {
            verify_flags: VerifyFlags::empty(),
            ..Default::default()
        }
    }
}
