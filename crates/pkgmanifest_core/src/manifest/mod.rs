//! The `%files` mini-language: `AttrParsers` → `LineClassifier` → `AttrResolver`,
//! run once per line in that fixed order (§4.1–§4.3).

pub mod attrs;
pub mod classify;
pub mod resolver;

use crate::caps::CapabilityCanonicalizer;
use pkgmanifest_types::attrs::AttrSet;
use pkgmanifest_types::diagnostic::DiagnosticVec;

pub use classify::ClassifiedLine;
pub use resolver::ResolvedAttrs;

/// One manifest line, fully parsed: the resolved attribute bundle plus every
/// file-name token it named (a line may name more than one path).
#[derive(Debug, Clone)]
pub struct LineResolution {
    pub attrs: ResolvedAttrs,
    pub tokens: Vec<String>,
}

/// Parse one `%files` manifest line.
///
/// Runs the directive parsers in the historical fixed order — `%verify` →
/// `%attr`/`%defattr` → `%dev` → `%config` → `%lang` → `%caps` — blanks every
/// consumed span out of the line, then classifies what's left into simple
/// flags and file-name tokens, and finally resolves the line's `AttrSet`
/// against the package's running defaults.
///
/// Returns `None` only for a blank/comment line (nothing to record); a line
/// with a directive error still resolves, with the problem captured in
/// `diagnostics` rather than aborting the whole manifest (§7).
pub fn process_line(
    line: &str,
    defaults: &mut AttrSet,
    canonicalizer: &dyn CapabilityCanonicalizer,
    diagnostics: &mut DiagnosticVec,
) -> Option<LineResolution> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }

    let mut current = AttrSet::new();
    let mut consumed = Vec::new();

    if let Some(span) = attrs::parse_defverify(line, defaults, diagnostics) {
        consumed.push(span);
    }
    if let Some(span) = attrs::parse_defattr(line, defaults, diagnostics) {
        consumed.push(span);
    }
    if let Some(span) = attrs::parse_verify(line, &mut current, diagnostics) {
        consumed.push(span);
    }
    if let Some(span) = attrs::parse_attr(line, &mut current, diagnostics) {
        consumed.push(span);
    }
    if let Some(span) = attrs::parse_dev(line, &mut current, diagnostics) {
        consumed.push(span);
    }
    if let Some(span) = attrs::parse_config(line, &mut current, diagnostics) {
        consumed.push(span);
    }
    consumed.extend(attrs::parse_lang_all(line, &mut current, diagnostics));
    if let Some(span) = attrs::parse_caps(line, &mut current, canonicalizer, diagnostics) {
        consumed.push(span);
    }

    let residue = classify::blank_spans(line, &mut consumed);
    let classified = classify::classify(&residue);
    current.flags.insert(classified.flags);

    if classified.tokens.is_empty() {
        return None;
    }

    // §4.2: a non-absolute name is only legal under %pubkey or %doc; under
    // %doc it additionally becomes a "special doc" (collected separately and
    // copied into the synthesized doc dir, §9/§10), which is the only case
    // that may legitimately name more than one file per line.
    let allowed_relative = current.flags.contains(pkgmanifest_types::attrs::AttributeFlags::PUBKEY)
        || current.flags.contains(pkgmanifest_types::attrs::AttributeFlags::DOC);
    for token in &classified.tokens {
        if !token.starts_with('/') {
            if !allowed_relative {
                let diagnostic = pkgmanifest_types::diagnostic::Diagnostic::new(
                    pkgmanifest_types::diagnostic::Severity::Error,
                    pkgmanifest_types::diagnostic::DiagnosticKind::Syntax(format!(
                        "file name must be absolute unless %pubkey or %doc: {token}"
                    )),
                );
                crate::log_diagnostic(&diagnostic);
                diagnostics.push(diagnostic);
                return None;
            }
            if current.flags.contains(pkgmanifest_types::attrs::AttributeFlags::DOC) {
                current.flags.insert(pkgmanifest_types::attrs::AttributeFlags::SPECIALDOC);
            }
        }
    }

    if classified.tokens.len() > 1 && !current.flags.contains(pkgmanifest_types::attrs::AttributeFlags::SPECIALDOC) {
        let diagnostic = pkgmanifest_types::diagnostic::Diagnostic::new(
            pkgmanifest_types::diagnostic::Severity::Error,
            pkgmanifest_types::diagnostic::DiagnosticKind::Syntax(
                "more than one file-name token on a non-special-doc line".to_owned(),
            ),
        );
        crate::log_diagnostic(&diagnostic);
        diagnostics.push(diagnostic);
        return None;
    }

    let resolved = resolver::resolve(defaults, current);
    Some(LineResolution {
        attrs: resolved,
        tokens: classified.tokens,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use crate::caps::SyntacticCapabilityCanonicalizer;

    #[test]
    fn plain_path_with_no_directives() {
        let mut defaults = AttrSet::new();
        let mut diags = DiagnosticVec::new();
        let canon = SyntacticCapabilityCanonicalizer;
        let resolution = process_line("/usr/bin/tool", &mut defaults, &canon, &mut diags).unwrap();
        assert_eq!(resolution.tokens, vec!["/usr/bin/tool".to_owned()]);
        assert!(diags.is_empty());
    }

    #[test]
    fn defattr_then_per_line_attr_override() {
        let mut defaults = AttrSet::new();
        let mut diags = DiagnosticVec::new();
        let canon = SyntacticCapabilityCanonicalizer;

        process_line("%defattr(-,root,root,-)", &mut defaults, &canon, &mut diags);
        assert!(diags.is_empty());

        let resolution =
            process_line("%attr(0755,-,-) /usr/bin/tool", &mut defaults, &canon, &mut diags).unwrap();
        assert_eq!(resolution.attrs.file_mode, Some(0o755));
        assert_eq!(resolution.attrs.user.as_deref(), Some("root"));
    }

    #[test]
    fn dir_and_doc_flags_survive_blanking() {
        let mut defaults = AttrSet::new();
        let mut diags = DiagnosticVec::new();
        let canon = SyntacticCapabilityCanonicalizer;
        let resolution =
            process_line("%dir %doc /usr/share/doc/pkg", &mut defaults, &canon, &mut diags).unwrap();
        assert!(resolution.attrs.flags.contains(pkgmanifest_types::attrs::AttributeFlags::DIR));
        assert!(resolution.attrs.flags.contains(pkgmanifest_types::attrs::AttributeFlags::DOC));
        assert_eq!(resolution.tokens, vec!["/usr/share/doc/pkg".to_owned()]);
    }

    #[test]
    fn blank_line_yields_nothing() {
        let mut defaults = AttrSet::new();
        let mut diags = DiagnosticVec::new();
        let canon = SyntacticCapabilityCanonicalizer;
        assert!(process_line("   ", &mut defaults, &canon, &mut diags).is_none());
        assert!(process_line("# comment", &mut defaults, &canon, &mut diags).is_none());
    }

    #[test]
    fn multiple_tokens_on_one_line_is_fatal_unless_specialdoc() {
        let mut defaults = AttrSet::new();
        let mut diags = DiagnosticVec::new();
        let canon = SyntacticCapabilityCanonicalizer;
        let resolution = process_line("%attr(0644,-,-) /bin/a /bin/b", &mut defaults, &canon, &mut diags);
        assert!(resolution.is_none());
        assert!(diags.iter().any(pkgmanifest_types::diagnostic::Diagnostic::is_error));
    }

    #[test]
    fn non_absolute_doc_tokens_are_kept_and_marked_specialdoc() {
        let mut defaults = AttrSet::new();
        let mut diags = DiagnosticVec::new();
        let canon = SyntacticCapabilityCanonicalizer;
        let resolution = process_line("%doc README CHANGES", &mut defaults, &canon, &mut diags).unwrap();
        assert_eq!(resolution.tokens, vec!["README".to_owned(), "CHANGES".to_owned()]);
        assert!(resolution.attrs.flags.contains(pkgmanifest_types::attrs::AttributeFlags::SPECIALDOC));
        assert!(diags.is_empty());
    }

    #[test]
    fn non_absolute_name_without_doc_or_pubkey_is_fatal() {
        let mut defaults = AttrSet::new();
        let mut diags = DiagnosticVec::new();
        let canon = SyntacticCapabilityCanonicalizer;
        let resolution = process_line("relative/path", &mut defaults, &canon, &mut diags);
        assert!(resolution.is_none());
        assert!(diags.iter().any(pkgmanifest_types::diagnostic::Diagnostic::is_error));
    }

    #[test]
    fn absolute_single_doc_token_is_not_specialdoc() {
        let mut defaults = AttrSet::new();
        let mut diags = DiagnosticVec::new();
        let canon = SyntacticCapabilityCanonicalizer;
        let resolution = process_line("%doc /usr/share/doc/pkg/README", &mut defaults, &canon, &mut diags).unwrap();
        assert!(!resolution.attrs.flags.contains(pkgmanifest_types::attrs::AttributeFlags::SPECIALDOC));
    }
}
