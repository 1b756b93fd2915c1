//! UnpackagedChecker (§4.9): feed the cross-package union of disk paths to
//! an external checker command and classify whatever it reports on stdout.

use pkgmanifest_types::diagnostic::Diagnostic;
use pkgmanifest_types::diagnostic::DiagnosticKind;
use pkgmanifest_types::diagnostic::Severity;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use std::process::Stdio;

/// Run `checker_command` with every `path` piped to its stdin, one per line.
/// A non-empty, non-whitespace-only stdout lists files present under the
/// build root but not claimed by any package's `%files`.
///
/// Returns `Ok(None)` if nothing was unpackaged, `Ok(Some(diagnostic))`
/// (severity chosen by `terminate_build`) if the checker found something, and
/// `Err` only if the checker itself could not be run at all.
pub fn check_unpackaged_files<'a>(
    checker_command: &str,
    paths: impl Iterator<Item = &'a Path>,
    terminate_build: bool,
) -> eyre::Result<Option<Diagnostic>> {
    use eyre::WrapErr;

    let mut child = Command::new("/bin/sh")
        .arg("-c")
        .arg(checker_command)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .wrap_err_with(|| format!("failed to spawn unpackaged-files checker: {checker_command}"))?;

    {
        let stdin = child.stdin.as_mut().expect("piped stdin");
        for path in paths {
            writeln!(stdin, "{}", path.display())
                .wrap_err("failed writing to unpackaged-files checker stdin")?;
        }
    }

    let output = child
        .wait_with_output()
        .wrap_err("failed waiting on unpackaged-files checker")?;
    let stdout = String::from_utf8_lossy(&output.stdout);

    if stdout.trim().is_empty() {
        return Ok(None);
    }

    let severity = if terminate_build { Severity::Error } else { Severity::Warning };
    let diagnostic = Diagnostic::new(
        severity,
        DiagnosticKind::External(format!("unpackaged files found:\n{}", stdout.trim_end())),
    );
    crate::log_diagnostic(&diagnostic);
    Ok(Some(diagnostic))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn empty_checker_output_is_not_an_issue() {
        let paths: Vec<PathBuf> = vec![PathBuf::from("/a")];
        let result =
            check_unpackaged_files("cat >/dev/null", paths.iter().map(PathBuf::as_path), false).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn nonempty_checker_output_is_warning_by_default() {
        let paths: Vec<PathBuf> = vec![PathBuf::from("/a")];
        let result =
            check_unpackaged_files("cat", paths.iter().map(PathBuf::as_path), false).unwrap();
        let diag = result.unwrap();
        assert!(!diag.is_error());
    }

    #[test]
    fn nonempty_checker_output_is_fatal_when_configured() {
        let paths: Vec<PathBuf> = vec![PathBuf::from("/a")];
        let result = check_unpackaged_files("cat", paths.iter().map(PathBuf::as_path), true).unwrap();
        let diag = result.unwrap();
        assert!(diag.is_error());
    }
}
