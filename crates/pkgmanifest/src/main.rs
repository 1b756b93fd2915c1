//! CLI front-end for the package-manifest assembler

mod cli;

use clap::Parser;
use cli::Cli;
use cli::DigestAlgorithmArg;
use eyre::WrapErr;
use pkgmanifest_core::caps::SyntacticCapabilityCanonicalizer;
use pkgmanifest_core::config::AssemblerConfiguration;
use pkgmanifest_core::driver;
use pkgmanifest_core::driver::ElfArchColorClassifier;
use pkgmanifest_core::driver::ExternalScriptDocCopier;
use pkgmanifest_core::driver::PackageIdentity;
use pkgmanifest_core::unpackaged::check_unpackaged_files;
use pkgmanifest_types::intern::Interner;
use pkgmanifest_types::manifest::PackageManifest;
use pkgmanifest_utils::checksum::DigestAlgorithm;
use proc_exit::Code;
use proc_exit::Exit;
use std::io::Read;
use std::path::Path;
use tracing::error;

fn main() -> eyre::Result<Exit> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let cli = Cli::parse();

    let mut manifest = read_manifest(&cli)?;
    manifest.external_files.extend(cli.extra_manifest_files.iter().cloned());
    let manifest_base_dir = cli
        .manifest_base_dir
        .clone()
        .or_else(|| cli.manifest.as_ref().and_then(|p| p.parent().map(Path::to_path_buf)))
        .unwrap_or_else(|| cli.build_root.clone());

    let identity = PackageIdentity {
        name: cli.name.as_str().into(),
        version: cli.version.as_str().into(),
        release: cli.release.as_str().into(),
        arch: cli.arch.as_str().into(),
        excludes_source: cli.excludes_source,
    };

    let config = AssemblerConfiguration::builder()
        .binary_digest_algorithm(cli.digest_algorithm.into())
        .no_payload_prefix(cli.no_payload_prefix)
        .missing_doc_files_terminate_build(cli.missing_doc_files_terminate_build)
        .binaries_in_noarch_packages_terminate_build(cli.binaries_in_noarch_packages_terminate_build)
        .unpackaged_files_terminate_build(cli.unpackaged_files_terminate_build)
        .build()
        .wrap_err("invalid assembler configuration")?;

    let interner = Interner::new();
    let canonicalizer = SyntacticCapabilityCanonicalizer;
    let doc_copier = ExternalScriptDocCopier { source_dir: &cli.build_root };
    let arch_classifier = ElfArchColorClassifier;

    let mut assembled = driver::assemble_binary_package(
        &manifest,
        &cli.build_root,
        &manifest_base_dir,
        &identity,
        &config,
        &canonicalizer,
        &doc_copier,
        &arch_classifier,
        &interner,
    );

    if let Some(checker_command) = &cli.unpackaged_checker {
        let paths = assembled.records.iter().map(|record| record.disk_path.as_path());
        match check_unpackaged_files(checker_command, paths, config.unpackaged_files_terminate_build) {
            Ok(Some(diagnostic)) => {
                assembled.failed |= diagnostic.is_error();
                assembled.diagnostics.push(diagnostic);
            }
            Ok(None) => {}
            Err(err) => {
                error!("unpackaged-files checker failed to run: {err:#}");
                assembled.failed = true;
            }
        }
    }

    #[cfg(feature = "json")]
    if cli.json {
        print_json(&assembled)?;
        return Ok(exit_for(assembled.failed));
    }

    println!(
        "{} files, {} bytes total, {} diagnostics",
        assembled.header.len(),
        assembled.header.total_size.map_or(0, pkgmanifest_types::header::TotalSize::value),
        assembled.diagnostics.len(),
    );

    Ok(exit_for(assembled.failed))
}

fn read_manifest(cli: &Cli) -> eyre::Result<PackageManifest> {
    let mut manifest = PackageManifest::new();
    let contents = match &cli.manifest {
        Some(path) => std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read manifest file {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .wrap_err("failed to read manifest from stdin")?;
            buf
        }
    };
    for line in contents.lines() {
        manifest.push_line(line);
    }
    Ok(manifest)
}

fn exit_for(failed: bool) -> Exit {
    if failed {
        Exit::new(Code::FAILURE)
    } else {
        Exit::new(Code::SUCCESS)
    }
}

#[cfg(feature = "json")]
fn print_json(assembled: &pkgmanifest_types::manifest::AssembledManifest) -> eyre::Result<()> {
    let diagnostics: Vec<_> = assembled
        .diagnostics
        .iter()
        .map(|d| serde_json::json!({ "severity": format!("{:?}", d.severity), "message": d.to_string() }))
        .collect();
    let summary = serde_json::json!({
        "file_count": assembled.header.len(),
        "total_size": assembled.header.total_size.map(pkgmanifest_types::header::TotalSize::value),
        "source_package": assembled.header.source_package,
        "failed": assembled.failed,
        "diagnostics": diagnostics,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

impl From<DigestAlgorithmArg> for DigestAlgorithm {
    fn from(value: DigestAlgorithmArg) -> Self {
        match value {
            DigestAlgorithmArg::Md5 => Self::Md5,
            DigestAlgorithmArg::Sha256 => Self::Sha256,
        }
    }
}
