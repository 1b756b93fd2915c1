//! TreeWalker (§4.4): expand glob tokens, recurse into directories, `stat`
//! each entry, and turn the result plus a line's resolved attributes into
//! `FileRecord`s.

use crate::manifest::resolver::ResolvedAttrs;
use compact_str::CompactString;
use pkgmanifest_types::attrs::AttributeFlags;
use pkgmanifest_types::diagnostic::Diagnostic;
use pkgmanifest_types::diagnostic::DiagnosticKind;
use pkgmanifest_types::diagnostic::DiagnosticVec;
use pkgmanifest_types::diagnostic::Severity;
use pkgmanifest_types::files::basename;
use pkgmanifest_types::files::FileRecord;
use pkgmanifest_types::files::Gid;
use pkgmanifest_types::files::Mode;
use pkgmanifest_types::files::StatInfo;
use pkgmanifest_types::files::Uid;
use pkgmanifest_types::intern::GroupRef;
use pkgmanifest_types::intern::Interner;
use pkgmanifest_types::intern::OwnerRef;
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use std::path::PathBuf;

/// Files at or above this size need the 64-bit size tags (§4.4, §4.6).
pub const LARGE_FILE_LIMIT: u64 = u32::MAX as u64;

fn push_diagnostic(diagnostics: &mut DiagnosticVec, diagnostic: Diagnostic) {
    crate::log_diagnostic(&diagnostic);
    diagnostics.push(diagnostic);
}

fn push_diag(diagnostics: &mut DiagnosticVec, severity: Severity, kind: DiagnosticKind, context: &Path) {
    push_diagnostic(diagnostics, Diagnostic::new(severity, kind).with_context(context.to_path_buf()));
}

fn severity_for_missing(resolved: &ResolvedAttrs) -> Severity {
    if resolved.flags.contains(AttributeFlags::EXCLUDE) {
        Severity::Warning
    } else {
        Severity::Error
    }
}

fn archive_path_for(disk_path: &Path, build_root: &Path) -> CompactString {
    match disk_path.strip_prefix(build_root) {
        Ok(rest) => {
            let mut s = CompactString::from("/");
            s.push_str(&rest.to_string_lossy());
            s
        }
        Err(_) => CompactString::from(disk_path.to_string_lossy()),
    }
}

fn lookup_user_name(uid: u32) -> Option<CompactString> {
    nix::unistd::User::from_uid(nix::unistd::Uid::from_raw(uid))
        .ok()
        .flatten()
        .map(|user| CompactString::from(user.name))
}

fn lookup_group_name(gid: u32) -> Option<CompactString> {
    nix::unistd::Group::from_gid(nix::unistd::Gid::from_raw(gid))
        .ok()
        .flatten()
        .map(|group| CompactString::from(group.name))
}

fn synth_stat(mode: u32) -> StatInfo {
    StatInfo {
        mode: Mode::new(mode),
        nlink: 1,
        uid: Uid::new(0),
        gid: Gid::new(0),
        rdev: 0,
        size: 0,
        mtime: 0,
        dev: 0,
        ino: 0,
    }
}

fn build_record(
    disk_path: PathBuf,
    archive_path: CompactString,
    stat: StatInfo,
    resolved: &ResolvedAttrs,
    interner: &Interner,
    symlink_target: Option<PathBuf>,
) -> FileRecord {
    let owner_name = resolved
        .user
        .clone()
        .or_else(|| lookup_user_name(stat.uid.0))
        .unwrap_or_else(|| CompactString::from("root"));
    let group_name = resolved
        .group
        .clone()
        .or_else(|| lookup_group_name(stat.gid.0))
        .unwrap_or_else(|| CompactString::from("root"));

    FileRecord {
        disk_path,
        archive_path,
        stat,
        owner: OwnerRef::get_or_intern(interner, owner_name.as_str()),
        group: GroupRef::get_or_intern(interner, group_name.as_str()),
        flags: resolved.flags,
        verify_flags: resolved.verify_flags,
        specd: resolved.specd,
        lang: resolved.lang.clone(),
        caps: resolved.caps.clone().unwrap_or_default(),
        digest: None,
        symlink_target,
    }
}

/// Walk one file-name token (already attribute-resolved) and produce every
/// `FileRecord` it expands to.
pub fn walk_token(
    token: &str,
    build_root: &Path,
    resolved: &ResolvedAttrs,
    interner: &Interner,
    diagnostics: &mut DiagnosticVec,
) -> Vec<FileRecord> {
    let mut out = Vec::new();

    let allowed_relative =
        resolved.flags.contains(AttributeFlags::PUBKEY) || resolved.flags.contains(AttributeFlags::DOC);
    if !token.starts_with('/') && !allowed_relative {
        push_diagnostic(
            diagnostics,
            Diagnostic::new(
                Severity::Error,
                DiagnosticKind::Syntax(format!("File must begin with \"/\": {token}")),
            ),
        );
        return out;
    }

    if let Some(device) = resolved.device {
        if !device.is_valid() {
            push_diagnostic(
                diagnostics,
                Diagnostic::new(
                    Severity::Error,
                    DiagnosticKind::Syntax(format!("invalid %dev major/minor for {token}")),
                ),
            );
            return out;
        }
        let disk_path = build_root.join(token.trim_start_matches('/'));
        let archive_path = archive_path_for(&disk_path, build_root);
        let mode_bits = resolved.file_mode.unwrap_or(0o600)
            | if device.is_block { libc::S_IFBLK } else { libc::S_IFCHR } as u32;
        let mut stat = synth_stat(mode_bits);
        stat.rdev = (u64::from(device.major) << 8) | u64::from(device.minor);
        out.push(build_record(disk_path, archive_path, stat, resolved, interner, None));
        return out;
    }

    if resolved.flags.contains(AttributeFlags::GHOST) {
        let disk_path = build_root.join(token.trim_start_matches('/'));
        if !disk_path.exists() {
            match resolved.file_mode {
                Some(mode) => {
                    let archive_path = archive_path_for(&disk_path, build_root);
                    let stat = synth_stat(mode | libc::S_IFREG as u32);
                    out.push(build_record(disk_path, archive_path, stat, resolved, interner, None));
                }
                None => push_diagnostic(
                    diagnostics,
                    Diagnostic::new(
                        Severity::Error,
                        DiagnosticKind::Syntax(format!("%ghost without explicit mode: {token}")),
                    ),
                ),
            }
            return out;
        }
        // The ghost file exists after all; fall through and stat it for real.
    }

    let has_glob_chars = token.contains(['*', '?', '[']);
    let disk_paths: Vec<PathBuf> = if has_glob_chars {
        let pattern = format!("{}{}", build_root.display(), token);
        let mut matches = Vec::new();
        match glob::glob(&pattern) {
            Ok(paths) => {
                for entry in paths {
                    match entry {
                        Ok(p) => matches.push(p),
                        Err(err) => push_diagnostic(
                            diagnostics,
                            Diagnostic::new(Severity::Error, DiagnosticKind::Filesystem(err.to_string())),
                        ),
                    }
                }
            }
            Err(err) => {
                push_diagnostic(
                    diagnostics,
                    Diagnostic::new(
                        Severity::Error,
                        DiagnosticKind::Syntax(format!("bad glob pattern {token}: {err}")),
                    ),
                );
                return out;
            }
        }
        if matches.is_empty() {
            push_diag(
                diagnostics,
                severity_for_missing(resolved),
                DiagnosticKind::Filesystem(format!("no matches for glob: {token}")),
                Path::new(token),
            );
            return out;
        }
        matches
    } else {
        vec![build_root.join(token.trim_start_matches('/'))]
    };

    for disk_path in disk_paths {
        walk_one(&disk_path, build_root, resolved, interner, diagnostics, &mut out);
    }
    out
}

fn walk_one(
    disk_path: &Path,
    build_root: &Path,
    resolved: &ResolvedAttrs,
    interner: &Interner,
    diagnostics: &mut DiagnosticVec,
    out: &mut Vec<FileRecord>,
) {
    let meta = match std::fs::symlink_metadata(disk_path) {
        Ok(meta) => meta,
        Err(err) => {
            push_diag(
                diagnostics,
                severity_for_missing(resolved),
                DiagnosticKind::Filesystem(format!("stat failed: {err}")),
                disk_path,
            );
            return;
        }
    };

    let explicit_dir = resolved.flags.contains(AttributeFlags::DIR);
    if meta.is_dir() && !explicit_dir {
        let walker = ignore::WalkBuilder::new(disk_path)
            .hidden(false)
            .parents(false)
            .ignore(false)
            .git_global(false)
            .git_ignore(false)
            .git_exclude(false)
            .follow_links(false)
            .same_file_system(false)
            .build();
        for entry in walker {
            match entry {
                Ok(entry) if entry.depth() == 0 => continue,
                Ok(entry) => push_record(entry.path(), build_root, resolved, interner, diagnostics, out),
                Err(err) => push_diagnostic(
                    diagnostics,
                    Diagnostic::new(Severity::Error, DiagnosticKind::Filesystem(err.to_string())),
                ),
            }
        }
    }
    push_record(disk_path, build_root, resolved, interner, diagnostics, out);
}

fn push_record(
    disk_path: &Path,
    build_root: &Path,
    resolved: &ResolvedAttrs,
    interner: &Interner,
    diagnostics: &mut DiagnosticVec,
    out: &mut Vec<FileRecord>,
) {
    let meta = match std::fs::symlink_metadata(disk_path) {
        Ok(meta) => meta,
        Err(err) => {
            push_diag(
                diagnostics,
                severity_for_missing(resolved),
                DiagnosticKind::Filesystem(format!("stat failed: {err}")),
                disk_path,
            );
            return;
        }
    };

    let archive_path = archive_path_for(disk_path, build_root);

    let symlink_target = if meta.file_type().is_symlink() {
        match std::fs::read_link(disk_path) {
            Ok(target) => {
                if target.starts_with(build_root) {
                    push_diag(
                        diagnostics,
                        Severity::Error,
                        DiagnosticKind::Filesystem("Symlink points to BuildRoot".to_owned()),
                        disk_path,
                    );
                }
                Some(target)
            }
            Err(err) => {
                push_diag(
                    diagnostics,
                    Severity::Error,
                    DiagnosticKind::Filesystem(format!("readlink failed: {err}")),
                    disk_path,
                );
                None
            }
        }
    } else {
        None
    };

    if meta.size() > LARGE_FILE_LIMIT {
        push_diagnostic(
            diagnostics,
            Diagnostic::new(
                Severity::Warning,
                DiagnosticKind::Size(format!("{} exceeds 32-bit size limit, using wide tags", disk_path.display())),
            ),
        );
    }

    // %attr/%defattr only override the permission bits; the type bits
    // (S_IFDIR/S_IFREG/...) always come from the real stat.
    let mode_override = if meta.is_dir() { resolved.dir_mode } else { resolved.file_mode };
    let mode = match mode_override {
        Some(perm) => (meta.mode() & !pkgmanifest_utils::MODE_MASK) | perm,
        None => meta.mode(),
    };

    let stat = StatInfo {
        mode: Mode::new(mode),
        nlink: meta.nlink(),
        uid: Uid::new(meta.uid()),
        gid: Gid::new(meta.gid()),
        rdev: meta.rdev(),
        size: meta.size(),
        mtime: meta.mtime(),
        dev: meta.dev(),
        ino: meta.ino(),
    };

    out.push(build_record(
        disk_path.to_path_buf(),
        archive_path,
        stat,
        resolved,
        interner,
        symlink_target,
    ));
}

/// `basename`-keyed archive path, used by `SourceAssembler` which never walks
/// directories.
#[must_use]
pub fn basename_archive_path(disk_path: &Path) -> CompactString {
    basename(disk_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use crate::manifest::resolver::resolve;
    use pkgmanifest_types::attrs::AttrSet;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn resolved_default() -> ResolvedAttrs {
        resolve(&AttrSet::new(), AttrSet::new())
    }

    #[test]
    fn simple_regular_file() {
        let dir = TempDir::new().unwrap();
        let build_root = dir.path();
        std::fs::create_dir_all(build_root.join("usr/bin")).unwrap();
        let mut f = std::fs::File::create(build_root.join("usr/bin/foo")).unwrap();
        f.write_all(b"0123456789").unwrap();
        drop(f);

        let interner = Interner::new();
        let mut diagnostics = DiagnosticVec::new();
        let resolved = resolved_default();
        let records = walk_token("/usr/bin/foo", build_root, &resolved, &interner, &mut diagnostics);

        assert!(diagnostics.is_empty());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].archive_path, "/usr/bin/foo");
        assert_eq!(records[0].stat.size, 10);
    }

    #[test]
    fn directory_recurses_into_children() {
        let dir = TempDir::new().unwrap();
        let build_root = dir.path();
        std::fs::create_dir_all(build_root.join("etc/x")).unwrap();
        std::fs::write(build_root.join("etc/x/a"), b"a").unwrap();
        std::fs::write(build_root.join("etc/x/b"), b"b").unwrap();

        let interner = Interner::new();
        let mut diagnostics = DiagnosticVec::new();
        let resolved = resolved_default();
        let records = walk_token("/etc/x", build_root, &resolved, &interner, &mut diagnostics);

        let mut paths: Vec<_> = records.iter().map(|r| r.archive_path.to_string()).collect();
        paths.sort();
        assert_eq!(paths, vec!["/etc/x", "/etc/x/a", "/etc/x/b"]);
    }

    #[test]
    fn ghost_without_mode_is_fatal() {
        let dir = TempDir::new().unwrap();
        let build_root = dir.path();
        let mut current = AttrSet::new();
        current.flags.insert(AttributeFlags::GHOST);
        let resolved = resolve(&AttrSet::new(), current);

        let interner = Interner::new();
        let mut diagnostics = DiagnosticVec::new();
        let records = walk_token("/var/run/foo.pid", build_root, &resolved, &interner, &mut diagnostics);
        assert!(records.is_empty());
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn ghost_with_mode_synthesizes_stat() {
        let dir = TempDir::new().unwrap();
        let build_root = dir.path();
        let mut current = AttrSet::new();
        current.flags.insert(AttributeFlags::GHOST);
        current.file_mode = Some(0o600);
        let resolved = resolve(&AttrSet::new(), current);

        let interner = Interner::new();
        let mut diagnostics = DiagnosticVec::new();
        let records = walk_token("/var/run/foo.pid", build_root, &resolved, &interner, &mut diagnostics);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].stat.size, 0);
        assert!(records[0].stat.mode.is_regular());
    }

    #[test]
    fn symlink_escaping_build_root_is_fatal() {
        let dir = TempDir::new().unwrap();
        let build_root = dir.path();
        std::fs::create_dir_all(build_root.join("etc")).unwrap();
        std::os::unix::fs::symlink(build_root.join("etc/passwd"), build_root.join("x")).unwrap();

        let interner = Interner::new();
        let mut diagnostics = DiagnosticVec::new();
        let resolved = resolved_default();
        walk_token("/x", build_root, &resolved, &interner, &mut diagnostics);
        assert!(diagnostics.iter().any(|d| d.is_error()));
    }

    #[test]
    fn missing_file_without_exclude_is_error() {
        let dir = TempDir::new().unwrap();
        let build_root = dir.path();
        let interner = Interner::new();
        let mut diagnostics = DiagnosticVec::new();
        let resolved = resolved_default();
        let records = walk_token("/nope", build_root, &resolved, &interner, &mut diagnostics);
        assert!(records.is_empty());
        assert!(diagnostics.iter().any(|d| d.is_error()));
    }

    #[test]
    fn defattr_dirmode_and_filemode_override_real_stat() {
        let dir = TempDir::new().unwrap();
        let build_root = dir.path();
        std::fs::create_dir_all(build_root.join("etc/x")).unwrap();
        std::fs::set_permissions(build_root.join("etc/x"), std::fs::Permissions::from_mode(0o700)).unwrap();
        std::fs::write(build_root.join("etc/x/a"), b"a").unwrap();
        std::fs::set_permissions(build_root.join("etc/x/a"), std::fs::Permissions::from_mode(0o600)).unwrap();

        let mut defaults = AttrSet::new();
        defaults.file_mode = Some(0o644);
        defaults.dir_mode = Some(0o755);

        let interner = Interner::new();
        let mut diagnostics = DiagnosticVec::new();

        let mut dir_current = AttrSet::new();
        dir_current.flags.insert(AttributeFlags::DIR);
        let dir_resolved = resolve(&defaults, dir_current);
        let dir_records = walk_token("/etc/x", build_root, &dir_resolved, &interner, &mut diagnostics);
        assert_eq!(dir_records.len(), 1);
        assert_eq!(dir_records[0].stat.mode.0 & 0o7777, 0o755);
        assert!(dir_records[0].stat.mode.is_dir());

        let file_resolved = resolve(&defaults, AttrSet::new());
        let file_records = walk_token("/etc/x/a", build_root, &file_resolved, &interner, &mut diagnostics);
        assert_eq!(file_records.len(), 1);
        assert_eq!(file_records[0].stat.mode.0 & 0o7777, 0o644);
    }

    #[test]
    fn missing_file_with_exclude_is_warning() {
        let dir = TempDir::new().unwrap();
        let build_root = dir.path();
        let mut current = AttrSet::new();
        current.flags.insert(AttributeFlags::EXCLUDE);
        let resolved = resolve(&AttrSet::new(), current);

        let interner = Interner::new();
        let mut diagnostics = DiagnosticVec::new();
        let records = walk_token("/nope", build_root, &resolved, &interner, &mut diagnostics);
        assert!(records.is_empty());
        assert!(diagnostics.iter().all(|d| !d.is_error()));
    }
}
