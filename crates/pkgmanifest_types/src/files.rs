//! Types describing a single assembled file entry

use crate::attrs::AttributeFlags;
use crate::attrs::SpecdSet;
use crate::attrs::VerifyFlags;
use crate::intern::GroupRef;
use crate::intern::Interner;
use crate::intern::OwnerRef;
use compact_str::CompactString;
use std::path::Path;
use std::path::PathBuf;

/// Unix file mode (permissions plus type bits)
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct Mode(pub u32);

impl Mode {
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// True if the S_IFDIR type bit is set
    #[must_use]
    pub const fn is_dir(self) -> bool {
        (self.0 & libc::S_IFMT as u32) == libc::S_IFDIR as u32
    }

    /// True if the S_IFREG type bit is set
    #[must_use]
    pub const fn is_regular(self) -> bool {
        (self.0 & libc::S_IFMT as u32) == libc::S_IFREG as u32
    }

    /// True if the S_IFLNK type bit is set
    #[must_use]
    pub const fn is_symlink(self) -> bool {
        (self.0 & libc::S_IFMT as u32) == libc::S_IFLNK as u32
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:o}", self.0)
    }
}

/// A POSIX UID
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct Uid(pub u32);

impl Uid {
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for Uid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A POSIX GID
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct Gid(pub u32);

impl Gid {
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for Gid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Digest of a regular file's contents
///
/// Which algorithm is used is a configuration knob; MD5 is the historical
/// default, SHA-256 is offered as the modern alternative.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[non_exhaustive]
pub enum Checksum {
    #[cfg_attr(
        feature = "serde",
        serde(serialize_with = "crate::utils::buffer_to_hex")
    )]
    Md5([u8; 16]),
    #[cfg_attr(
        feature = "serde",
        serde(serialize_with = "crate::utils::buffer_to_hex")
    )]
    Sha256([u8; 32]),
}

impl Checksum {
    /// Hex-encoded digest, with no algorithm prefix (what header emission wants)
    #[must_use]
    pub fn to_hex(&self) -> String {
        match self {
            Self::Md5(value) => faster_hex::hex_string(value),
            Self::Sha256(value) => faster_hex::hex_string(value),
        }
    }
}

impl std::fmt::Display for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Md5(value) => write!(f, "md5:{}", faster_hex::hex_string(value)),
            Self::Sha256(value) => write!(f, "sha256:{}", faster_hex::hex_string(value)),
        }
    }
}

/// Either half of a device-node number pair, as read from (or synthesised for) a `stat`
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatInfo {
    pub mode: Mode,
    pub nlink: u64,
    pub uid: Uid,
    pub gid: Gid,
    pub rdev: u64,
    pub size: u64,
    pub mtime: i64,
    pub dev: u64,
    pub ino: u64,
}

impl Default for Mode {
    fn default() -> Self {
        Self(0)
    }
}

impl Default for Uid {
    fn default() -> Self {
        Self(0)
    }
}

impl Default for Gid {
    fn default() -> Self {
        Self(0)
    }
}

/// One archive entry: everything the header emitter needs to produce a full
/// set of index-aligned per-file tag columns for a single file.
///
/// `FileRecord`s are created during the tree walk, mutated at most once
/// during duplicate merge, and then frozen for emission.
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// Absolute, build-root-prefixed path on the building host
    pub disk_path: PathBuf,
    /// Build-root-stripped path as it will appear in the archive
    pub archive_path: CompactString,
    pub stat: StatInfo,
    pub owner: OwnerRef,
    pub group: GroupRef,
    pub flags: AttributeFlags,
    pub verify_flags: VerifyFlags,
    /// Precedence each field was resolved at, needed by the duplicate merge policy
    /// (§4.7) if this record turns out to share a path with a later one.
    pub specd: SpecdSet,
    /// Locale tags joined with `|`, empty if none
    pub lang: CompactString,
    /// Canonicalised capability text, empty if none
    pub caps: CompactString,
    /// Populated once the digest has been computed for a regular file
    pub digest: Option<Checksum>,
    /// Populated for symlinks (readlink result)
    pub symlink_target: Option<PathBuf>,
}

impl FileRecord {
    /// Path as it should be written into the `OLDFILENAMES`/`ORIGFILENAMES` column,
    /// for a binary package (optionally `./`-prefixed) or a source package (bare).
    #[must_use]
    pub fn archive_path_with_prefix(&self, prefix: Option<&str>) -> CompactString {
        match prefix {
            Some(prefix) => {
                let mut out = CompactString::with_capacity(prefix.len() + self.archive_path.len());
                out.push_str(prefix);
                out.push_str(&self.archive_path);
                out
            }
            None => self.archive_path.clone(),
        }
    }

    #[must_use]
    pub fn owner_str<'i>(&self, interner: &'i Interner) -> &'i str {
        self.owner.to_str(interner)
    }

    #[must_use]
    pub fn group_str<'i>(&self, interner: &'i Interner) -> &'i str {
        self.group.to_str(interner)
    }

    /// Hardlink-set identity: `(dev, ino)` for a regular file with more than one link
    #[must_use]
    pub fn hardlink_key(&self) -> Option<(u64, u64)> {
        (self.stat.mode.is_regular() && self.stat.nlink > 1)
            .then_some((self.stat.dev, self.stat.ino))
    }
}

/// Basename of a path, used by [`crate::manifest`]'s source-file variant.
#[must_use]
pub fn basename(path: &Path) -> CompactString {
    path.file_name()
        .map(|name| CompactString::from(name.to_string_lossy()))
        .unwrap_or_default()
}
