//! AttrResolver (§4.3): merge a package's default `AttrSet` with the current
//! line's `AttrSet` into one owned, resolved value. Current always wins over
//! default for any field it set explicitly; otherwise the default applies.

use pkgmanifest_types::attrs::AttrSet;
use pkgmanifest_types::attrs::SpecdSet;
use pkgmanifest_types::attrs::Specd;

/// The outcome of resolving one manifest line: everything needed to build a
/// `FileRecord` once the on-disk `stat` is known, for every token on the line.
#[derive(Debug, Clone)]
pub struct ResolvedAttrs {
    pub file_mode: Option<u32>,
    pub dir_mode: Option<u32>,
    pub user: Option<compact_str::CompactString>,
    pub group: Option<compact_str::CompactString>,
    pub verify_flags: pkgmanifest_types::attrs::VerifyFlags,
    pub caps: Option<compact_str::CompactString>,
    pub lang: compact_str::CompactString,
    pub device: Option<pkgmanifest_types::attrs::DeviceSpec>,
    pub flags: pkgmanifest_types::attrs::AttributeFlags,
    pub specd: SpecdSet,
}

/// Resolve `current` (this line's directives) against `defaults` (the
/// package's running `%defattr`/`%defverify` state). `current` is consumed;
/// `defaults` is untouched — defaults persist across lines, current does not.
#[must_use]
pub fn resolve(defaults: &AttrSet, current: AttrSet) -> ResolvedAttrs {
    let file_mode = current.file_mode.or(defaults.file_mode);
    let dir_mode = current.dir_mode.or(defaults.dir_mode);
    let user = current.user.or_else(|| defaults.user.clone());
    let group = current.group.or_else(|| defaults.group.clone());
    let verify_flags = if current.specd.verify == Specd::Unset {
        defaults.verify_flags
    } else {
        current.verify_flags
    };
    let specd = SpecdSet {
        file_mode: defaults.specd.file_mode.merge_keep_later(current.specd.file_mode),
        dir_mode: defaults.specd.dir_mode.merge_keep_later(current.specd.dir_mode),
        user: defaults.specd.user.merge_keep_later(current.specd.user),
        group: defaults.specd.group.merge_keep_later(current.specd.group),
        verify: defaults.specd.verify.merge_keep_later(current.specd.verify),
    };
    ResolvedAttrs {
        file_mode,
        dir_mode,
        user,
        group,
        verify_flags,
        caps: current.caps,
        lang: current.lang.joined(),
        device: current.device,
        flags: current.flags,
        specd,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use compact_str::CompactString;

    #[test]
    fn current_mode_overrides_default() {
        let mut defaults = AttrSet::new();
        defaults.file_mode = Some(0o644);
        defaults.specd.file_mode = Specd::FromDefault;

        let mut current = AttrSet::new();
        current.file_mode = Some(0o755);
        current.specd.file_mode = Specd::FromCurrent;

        let resolved = resolve(&defaults, current);
        assert_eq!(resolved.file_mode, Some(0o755));
        assert_eq!(resolved.specd.file_mode, Specd::FromCurrent);
    }

    #[test]
    fn default_applies_when_current_unset() {
        let mut defaults = AttrSet::new();
        defaults.user = Some(CompactString::from("root"));
        defaults.specd.user = Specd::FromDefault;

        let current = AttrSet::new();
        let resolved = resolve(&defaults, current);
        assert_eq!(resolved.user.as_deref(), Some("root"));
        assert_eq!(resolved.specd.user, Specd::FromDefault);
    }

    #[test]
    fn unset_verify_falls_back_to_default_mask() {
        let mut defaults = AttrSet::new();
        defaults.verify_flags = pkgmanifest_types::attrs::VerifyFlags::ALL;
        defaults.specd.verify = Specd::FromDefault;

        let current = AttrSet::new();
        let resolved = resolve(&defaults, current);
        assert_eq!(resolved.verify_flags, pkgmanifest_types::attrs::VerifyFlags::ALL);
    }
}
