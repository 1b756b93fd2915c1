//! Driver (§2, §10): iterate a package's manifest lines, invoke every other
//! component in order, and collect the result. This is also where the
//! supplemented §10 features that don't belong to any single component live:
//! external manifest files, special-doc materialization, the `SOURCERPM`
//! aggregate tag, and the noarch/arch-color consistency check.

use crate::caps::CapabilityCanonicalizer;
use crate::config::AssemblerConfiguration;
use crate::emit;
use crate::emit::PayloadKind;
use crate::manifest::process_line;
use crate::manifest::ResolvedAttrs;
use crate::merge;
use crate::store;
use crate::store::RecordStore;
use crate::walker::walk_token;
use compact_str::CompactString;
use eyre::WrapErr;
use pkgmanifest_types::attrs::AttrSet;
use pkgmanifest_types::attrs::AttributeFlags;
use pkgmanifest_types::diagnostic::Diagnostic;
use pkgmanifest_types::diagnostic::DiagnosticKind;
use pkgmanifest_types::diagnostic::DiagnosticVec;
use pkgmanifest_types::diagnostic::Severity;
use pkgmanifest_types::files::FileRecord;
use pkgmanifest_types::files::Gid;
use pkgmanifest_types::files::Mode;
use pkgmanifest_types::files::StatInfo;
use pkgmanifest_types::files::Uid;
use pkgmanifest_types::intern::GroupRef;
use pkgmanifest_types::intern::Interner;
use pkgmanifest_types::intern::OwnerRef;
use pkgmanifest_types::manifest::AssembledManifest;
use pkgmanifest_types::manifest::PackageManifest;
use std::path::Path;
use std::path::PathBuf;

/// The handful of facts about the package being built that the manifest
/// mini-language itself never states: used to name the synthesized
/// special-doc directory, derive `SOURCERPM`, and run the noarch/arch-color
/// check.
#[derive(Debug, Clone)]
pub struct PackageIdentity {
    pub name: CompactString,
    pub version: CompactString,
    pub release: CompactString,
    /// `"noarch"` triggers the arch-color consistency check.
    pub arch: CompactString,
    /// Whether this build excludes source files, selecting the `nosrc` vs.
    /// `src` suffix on the derived `SOURCERPM` name.
    pub excludes_source: bool,
}

impl PackageIdentity {
    /// The `SOURCERPM` aggregate tag value: `{name}-{version}-{release}.{nosrc,src}.rpm`.
    #[must_use]
    pub fn source_rpm_name(&self) -> CompactString {
        let suffix = if self.excludes_source { "nosrc" } else { "src" };
        CompactString::from(format!(
            "{}-{}-{}.{suffix}.rpm",
            self.name, self.version, self.release
        ))
    }
}

/// The "copy these names into that directory" contract for the special-doc
/// flow (§9 design notes): a non-absolute `%doc` token is collected during
/// `LineClassifier` and, once the package's normal lines are processed,
/// handed off here. The assembler only requires `dest_dir` to exist,
/// populated with one entry per name, once this returns `Ok`.
pub trait DocCopier {
    fn copy_into(&self, names: &[PathBuf], dest_dir: &Path) -> eyre::Result<()>;
}

/// Reference [`DocCopier`]: resolves each name against a source directory
/// (conventionally the build's working directory) and plain-copies it into
/// the destination. A production driver may prefer shelling out to the
/// build tool's actual doc-copy script instead.
#[derive(Debug, Clone, Copy)]
pub struct ExternalScriptDocCopier<'a> {
    pub source_dir: &'a Path,
}

impl DocCopier for ExternalScriptDocCopier<'_> {
    fn copy_into(&self, names: &[PathBuf], dest_dir: &Path) -> eyre::Result<()> {
        std::fs::create_dir_all(dest_dir)
            .wrap_err_with(|| format!("failed to create special doc dir {}", dest_dir.display()))?;
        for name in names {
            let src = self.source_dir.join(name);
            let file_name = name
                .file_name()
                .ok_or_else(|| eyre::eyre!("special doc name has no file component: {}", name.display()))?;
            let dest = dest_dir.join(file_name);
            std::fs::copy(&src, &dest)
                .wrap_err_with(|| format!("failed to copy special doc {}", src.display()))?;
        }
        Ok(())
    }
}

/// Classifies whether a file carries architecture-specific machine code, for
/// the noarch/arch-color consistency check (§10).
pub trait ArchColorClassifier {
    fn is_arch_colored(&self, record: &FileRecord) -> bool;
}

/// Reference [`ArchColorClassifier`]: a regular file is arch-colored if it
/// opens and its first four bytes are the ELF magic number. Ghosts and
/// non-regular files are never arch-colored.
#[derive(Debug, Default, Clone, Copy)]
pub struct ElfArchColorClassifier;

impl ArchColorClassifier for ElfArchColorClassifier {
    fn is_arch_colored(&self, record: &FileRecord) -> bool {
        if !record.stat.mode.is_regular() || record.flags.contains(AttributeFlags::GHOST) {
            return false;
        }
        use std::io::Read;
        let Ok(mut file) = std::fs::File::open(&record.disk_path) else {
            return false;
        };
        let mut magic = [0u8; 4];
        file.read_exact(&mut magic).is_ok() && magic == *b"\x7fELF"
    }
}

fn synth_dir_stat(mode: u32) -> StatInfo {
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

fn build_dir_record(
    disk_path: PathBuf,
    archive_path: CompactString,
    stat: StatInfo,
    attrs: &ResolvedAttrs,
    interner: &Interner,
) -> FileRecord {
    let owner = attrs.user.clone().unwrap_or_else(|| CompactString::from("root"));
    let group = attrs.group.clone().unwrap_or_else(|| CompactString::from("root"));
    FileRecord {
        disk_path,
        archive_path,
        stat,
        owner: OwnerRef::get_or_intern(interner, owner.as_str()),
        group: GroupRef::get_or_intern(interner, group.as_str()),
        flags: attrs.flags | AttributeFlags::DOC,
        verify_flags: attrs.verify_flags,
        specd: attrs.specd,
        lang: attrs.lang.clone(),
        caps: attrs.caps.clone().unwrap_or_default(),
        digest: None,
        symlink_target: None,
    }
}

/// Read every line of every externally named manifest file (`%files -f`) and
/// append it to `lines`, as if it had been written directly in the section.
/// A read failure is fatal for the whole package.
fn append_external_manifests(
    manifest: &PackageManifest,
    manifest_base_dir: &Path,
    lines: &mut Vec<String>,
    diagnostics: &mut DiagnosticVec,
) -> bool {
    let mut failed = false;
    for path in &manifest.external_files {
        let resolved = if path.is_absolute() {
            path.clone()
        } else {
            manifest_base_dir.join(path)
        };
        match std::fs::read_to_string(&resolved) {
            Ok(contents) => lines.extend(contents.lines().map(str::to_owned)),
            Err(err) => {
                let diagnostic = Diagnostic::new(
                    Severity::Error,
                    DiagnosticKind::Filesystem(format!("failed to read external manifest: {err}")),
                )
                .with_context(resolved);
                crate::log_diagnostic(&diagnostic);
                diagnostics.push(diagnostic);
                failed = true;
            }
        }
    }
    failed
}

/// Materialize the collected special-doc tokens (§9, §10) into one directory
/// entry carrying the first special-doc line's attributes, or report a
/// diagnostic (severity per `missing_doc_files_terminate_build`) if the copy
/// fails.
fn materialize_special_docs(
    special_docs: &[(String, ResolvedAttrs)],
    build_root: &Path,
    identity: &PackageIdentity,
    config: &AssemblerConfiguration,
    doc_copier: &dyn DocCopier,
    interner: &Interner,
    diagnostics: &mut DiagnosticVec,
) -> (Option<FileRecord>, bool) {
    if special_docs.is_empty() {
        return (None, false);
    }

    let dir_name = config
        .special_doc_dir_format
        .replace("{name}", identity.name.as_str())
        .replace("{version}", identity.version.as_str());
    let doc_prefix = config
        .doc_dirs
        .first()
        .map_or("/usr/share/doc", CompactString::as_str);
    let archive_dir = format!("{}/{dir_name}", doc_prefix.trim_end_matches('/'));
    let disk_dir = build_root.join(archive_dir.trim_start_matches('/'));

    let names: Vec<PathBuf> = special_docs.iter().map(|(name, _)| PathBuf::from(name)).collect();
    match doc_copier.copy_into(&names, &disk_dir) {
        Ok(()) => {
            let (_, first_attrs) = &special_docs[0];
            let mode = first_attrs.dir_mode.unwrap_or(0o755) | libc::S_IFDIR as u32;
            let archive_path = CompactString::from(format!("/{}", archive_dir.trim_start_matches('/')));
            let record = build_dir_record(disk_dir, archive_path, synth_dir_stat(mode), first_attrs, interner);
            (Some(record), false)
        }
        Err(err) => {
            let severity = if config.missing_doc_files_terminate_build {
                Severity::Error
            } else {
                Severity::Warning
            };
            let failed = severity == Severity::Error;
            let diagnostic = Diagnostic::new(
                severity,
                DiagnosticKind::Filesystem(format!("special doc copy failed: {err}")),
            );
            crate::log_diagnostic(&diagnostic);
            diagnostics.push(diagnostic);
            (None, failed)
        }
    }
}

/// After assembly, check whether a `noarch`-identified package ended up with
/// any arch-colored (e.g. ELF) file, per the consistency check in §10.
fn check_noarch_consistency(
    records: &[FileRecord],
    identity: &PackageIdentity,
    config: &AssemblerConfiguration,
    classifier: &dyn ArchColorClassifier,
    diagnostics: &mut DiagnosticVec,
) -> bool {
    if identity.arch != "noarch" {
        return false;
    }
    let offenders: Vec<&str> = records
        .iter()
        .filter(|record| classifier.is_arch_colored(record))
        .map(|record| record.archive_path.as_str())
        .collect();
    if offenders.is_empty() {
        return false;
    }
    let severity = if config.binaries_in_noarch_packages_terminate_build {
        Severity::Error
    } else {
        Severity::Warning
    };
    let failed = severity == Severity::Error;
    let diagnostic = Diagnostic::new(
        severity,
        DiagnosticKind::Consistency(format!(
            "noarch package contains arch-colored files: {}",
            offenders.join(", ")
        )),
    );
    crate::log_diagnostic(&diagnostic);
    diagnostics.push(diagnostic);
    failed
}

/// Assemble one binary package's manifest end to end: gather lines (inline
/// plus external manifest files), run the mini-language and tree walk over
/// each, materialize special docs, sort/merge/emit, then run the
/// noarch/arch-color check and stamp `SOURCERPM`.
#[allow(clippy::too_many_arguments)]
pub fn assemble_binary_package(
    manifest: &PackageManifest,
    build_root: &Path,
    manifest_base_dir: &Path,
    identity: &PackageIdentity,
    config: &AssemblerConfiguration,
    canonicalizer: &dyn CapabilityCanonicalizer,
    doc_copier: &dyn DocCopier,
    arch_classifier: &dyn ArchColorClassifier,
    interner: &Interner,
) -> AssembledManifest {
    tracing::info!(
        "processing files: {}-{}-{}",
        identity.name,
        identity.version,
        identity.release
    );

    let mut diagnostics = DiagnosticVec::new();
    let mut failed = false;

    let mut lines = manifest.lines.clone();
    failed |= append_external_manifests(manifest, manifest_base_dir, &mut lines, &mut diagnostics);

    let mut defaults = AttrSet::new();
    let mut store = RecordStore::new();
    let mut special_docs: Vec<(String, ResolvedAttrs)> = Vec::new();

    tracing::debug!("walking build root for {} manifest lines", lines.len());
    for line in &lines {
        let Some(resolution) = process_line(line, &mut defaults, canonicalizer, &mut diagnostics) else {
            continue;
        };
        if resolution.attrs.flags.contains(AttributeFlags::SPECIALDOC) {
            for token in &resolution.tokens {
                special_docs.push((token.clone(), resolution.attrs.clone()));
            }
            continue;
        }
        for token in &resolution.tokens {
            let records = walk_token(token, build_root, &resolution.attrs, interner, &mut diagnostics);
            store.extend(records);
        }
    }

    let (doc_record, doc_failed) = materialize_special_docs(
        &special_docs,
        build_root,
        identity,
        config,
        doc_copier,
        interner,
        &mut diagnostics,
    );
    failed |= doc_failed;
    if let Some(record) = doc_record {
        store.push(record);
    }

    tracing::debug!("sorting and merging duplicate records");
    let sorted = store.into_sorted();
    let merged = merge::merge_duplicates(sorted, &mut diagnostics);
    let final_records = merge::drop_excluded(merged);

    failed |= check_noarch_consistency(&final_records, identity, config, arch_classifier, &mut diagnostics);

    let algorithm = config.binary_digest_algorithm;
    let (mut header, archive_paths, emit_failed) = emit::emit(
        final_records.clone(),
        interner,
        config,
        PayloadKind::Binary,
        algorithm,
        &mut diagnostics,
    );
    failed |= emit_failed;

    store::register_hardlink_feature(&final_records, &mut header);
    header.source_package = Some(identity.source_rpm_name());

    failed |= diagnostics.iter().any(Diagnostic::is_error);

    tracing::info!(
        "assembled {} for {} files ({} diagnostics)",
        identity.source_rpm_name(),
        final_records.len(),
        diagnostics.len()
    );

    AssembledManifest {
        records: final_records,
        header,
        archive_paths,
        diagnostics,
        failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use crate::caps::SyntacticCapabilityCanonicalizer;
    use indoc::indoc;
    use tempfile::TempDir;

    fn identity() -> PackageIdentity {
        PackageIdentity {
            name: CompactString::from("foo"),
            version: CompactString::from("1.0"),
            release: CompactString::from("1"),
            arch: CompactString::from("x86_64"),
            excludes_source: false,
        }
    }

    #[test]
    fn simple_file_scenario() {
        let dir = TempDir::new().unwrap();
        let build_root = dir.path();
        std::fs::create_dir_all(build_root.join("usr/bin")).unwrap();
        std::fs::write(build_root.join("usr/bin/foo"), b"0123456789").unwrap();

        let mut manifest = PackageManifest::new();
        manifest.push_line("/usr/bin/foo");

        let interner = Interner::new();
        let canon = SyntacticCapabilityCanonicalizer;
        let doc_copier = ExternalScriptDocCopier { source_dir: build_root };
        let arch = ElfArchColorClassifier;
        let config = AssemblerConfiguration::default();

        let assembled = assemble_binary_package(
            &manifest,
            build_root,
            build_root,
            &identity(),
            &config,
            &canon,
            &doc_copier,
            &arch,
            &interner,
        );

        assert!(!assembled.failed);
        assert_eq!(assembled.header.len(), 1);
        assert_eq!(assembled.archive_paths.get(0), Some("./usr/bin/foo"));
        assert_eq!(
            assembled.header.source_package.as_deref(),
            Some("foo-1.0-1.src.rpm")
        );
    }

    #[test]
    fn defaults_and_exclude_scenario() {
        let dir = TempDir::new().unwrap();
        let build_root = dir.path();
        std::fs::create_dir_all(build_root.join("etc/x")).unwrap();
        std::fs::write(build_root.join("etc/x/a"), b"a").unwrap();
        std::fs::write(build_root.join("etc/x/b"), b"b").unwrap();

        let mut manifest = PackageManifest::new();
        for line in indoc! {"
            %defattr(0644,root,root,0755)
            %dir /etc/x
            /etc/x/a
            /etc/x/b
            %exclude /etc/x/b
        "}
        .lines()
        {
            manifest.push_line(line);
        }

        let interner = Interner::new();
        let canon = SyntacticCapabilityCanonicalizer;
        let doc_copier = ExternalScriptDocCopier { source_dir: build_root };
        let arch = ElfArchColorClassifier;
        let config = AssemblerConfiguration::default();

        let assembled = assemble_binary_package(
            &manifest,
            build_root,
            build_root,
            &identity(),
            &config,
            &canon,
            &doc_copier,
            &arch,
            &interner,
        );

        assert!(!assembled.failed);
        let paths: Vec<_> = assembled.records.iter().map(|r| r.archive_path.to_string()).collect();
        assert_eq!(paths, vec!["/etc/x".to_owned(), "/etc/x/a".to_owned()]);
        assert_eq!(assembled.records[0].stat.mode.0 & 0o7777, 0o755);
        assert_eq!(assembled.records[1].stat.mode.0 & 0o7777, 0o644);
        assert!(assembled.diagnostics.is_empty());
    }

    #[test]
    fn missing_external_manifest_fails_the_package() {
        let dir = TempDir::new().unwrap();
        let build_root = dir.path();
        let mut manifest = PackageManifest::new();
        manifest.external_files.push(PathBuf::from("does-not-exist.files"));

        let interner = Interner::new();
        let canon = SyntacticCapabilityCanonicalizer;
        let doc_copier = ExternalScriptDocCopier { source_dir: build_root };
        let arch = ElfArchColorClassifier;
        let config = AssemblerConfiguration::default();

        let assembled = assemble_binary_package(
            &manifest,
            build_root,
            build_root,
            &identity(),
            &config,
            &canon,
            &doc_copier,
            &arch,
            &interner,
        );

        assert!(assembled.failed);
    }

    #[test]
    fn noarch_package_with_elf_warns_by_default() {
        let dir = TempDir::new().unwrap();
        let build_root = dir.path();
        std::fs::create_dir_all(build_root.join("usr/bin")).unwrap();
        let mut elf_bytes = vec![0x7f, b'E', b'L', b'F'];
        elf_bytes.extend_from_slice(&[0u8; 12]);
        std::fs::write(build_root.join("usr/bin/foo"), elf_bytes).unwrap();

        let mut manifest = PackageManifest::new();
        manifest.push_line("/usr/bin/foo");

        let mut noarch_identity = identity();
        noarch_identity.arch = CompactString::from("noarch");

        let interner = Interner::new();
        let canon = SyntacticCapabilityCanonicalizer;
        let doc_copier = ExternalScriptDocCopier { source_dir: build_root };
        let arch = ElfArchColorClassifier;
        let config = AssemblerConfiguration::default();

        let assembled = assemble_binary_package(
            &manifest,
            build_root,
            build_root,
            &noarch_identity,
            &config,
            &canon,
            &doc_copier,
            &arch,
            &interner,
        );

        assert!(!assembled.failed);
        assert!(assembled.diagnostics.iter().any(|d| !d.is_error()));
    }

    #[test]
    fn non_absolute_doc_token_materializes_special_doc_dir() {
        let dir = TempDir::new().unwrap();
        let build_root = dir.path();
        std::fs::write(build_root.join("README"), b"read me").unwrap();

        let mut manifest = PackageManifest::new();
        manifest.push_line("%doc README");

        let interner = Interner::new();
        let canon = SyntacticCapabilityCanonicalizer;
        let doc_copier = ExternalScriptDocCopier { source_dir: build_root };
        let arch = ElfArchColorClassifier;
        let config = AssemblerConfiguration::default();

        let assembled = assemble_binary_package(
            &manifest,
            build_root,
            build_root,
            &identity(),
            &config,
            &canon,
            &doc_copier,
            &arch,
            &interner,
        );

        assert!(!assembled.failed);
        assert_eq!(assembled.records.len(), 1);
        assert_eq!(assembled.records[0].archive_path, "/usr/share/doc/foo-1.0");
        assert!(assembled.records[0].stat.mode.is_dir());
        assert!(build_root.join("usr/share/doc/foo-1.0/README").exists());
    }
}
