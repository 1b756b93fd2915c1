//! AttrParsers (§4.1): `%attr/%defattr/%verify/%defverify/%config/%lang/%caps/%dev`.
//!
//! Each directive is located by substring search, its parenthesized argument
//! parsed, and the span it occupied recorded so the caller can blank it out
//! of the line before handing the residue to the file-name tokenizer. Unlike
//! the historical in-place "erase to spaces" approach, parsers never mutate
//! the line they're scanning — they only report spans, eliminating the
//! aliasing hazard of several parsers walking the same mutable buffer.

use crate::caps::CapabilityCanonicalizer;
use compact_str::CompactString;
use pkgmanifest_types::attrs::AttrSet;
use pkgmanifest_types::attrs::DeviceSpec;
use pkgmanifest_types::attrs::Specd;
use pkgmanifest_types::attrs::VerifyFlags;
use pkgmanifest_types::attrs::DEVICE_COMPONENT_LIMIT;
use pkgmanifest_types::diagnostic::Diagnostic;
use pkgmanifest_types::diagnostic::DiagnosticKind;
use pkgmanifest_types::diagnostic::DiagnosticVec;
use pkgmanifest_types::diagnostic::Severity;
use pkgmanifest_utils::MODE_MASK;
use std::ops::Range;

/// A byte range in the original line that has been fully consumed by a
/// directive and must not be seen by the file-name tokenizer.
pub type ConsumedSpan = Range<usize>;

fn push_diagnostic(diagnostics: &mut DiagnosticVec, diagnostic: Diagnostic) {
    crate::log_diagnostic(&diagnostic);
    diagnostics.push(diagnostic);
}

fn push_syntax(diagnostics: &mut DiagnosticVec, msg: impl Into<String>) {
    push_diagnostic(diagnostics, Diagnostic::new(Severity::Error, DiagnosticKind::Syntax(msg.into())));
}

/// Find `%name(` ... matching `)` in `line`, starting the search at `from`.
/// Returns the span of the whole directive (including `%name(` and the
/// closing paren) and the trimmed argument text.
fn find_paren_directive<'a>(line: &'a str, name: &str, from: usize) -> Option<(Range<usize>, &'a str)> {
    let open_tag = format!("{name}(");
    let start = line[from..].find(open_tag.as_str())? + from;
    let args_start = start + open_tag.len();
    let rel_close = line[args_start..].find(')')?;
    let args_end = args_start + rel_close;
    Some((start..args_end + 1, &line[args_start..args_end]))
}

/// Find a bare `%name` directive not immediately followed by `(`, i.e. the
/// simple attributes and bare `%config`.
fn find_bare_directive(line: &str, name: &str) -> Option<Range<usize>> {
    let mut search_from = 0;
    while let Some(rel) = line[search_from..].find(name) {
        let start = search_from + rel;
        let end = start + name.len();
        let next_is_word = line.as_bytes()
            .get(end)
            .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'(' || *b == b'_');
        let prev_is_word = start > 0
            && line.as_bytes()[start - 1].is_ascii_alphanumeric();
        if !next_is_word && !prev_is_word {
            return Some(start..end);
        }
        search_from = end;
    }
    None
}

fn parse_mode(token: &str) -> Result<Option<u32>, String> {
    let token = token.trim();
    if token.is_empty() || token == "-" {
        return Ok(None);
    }
    let value = u32::from_str_radix(token, 8).map_err(|_| format!("bad mode: {token}"))?;
    if value > MODE_MASK {
        return Err(format!("mode out of range (> 07777): {token}"));
    }
    Ok(Some(value))
}

fn parse_name_field(token: &str) -> Option<CompactString> {
    let token = token.trim();
    if token.is_empty() || token == "-" {
        None
    } else {
        Some(CompactString::from(token))
    }
}

/// `%attr(mode, user, group)` — sets the current entry's overrides.
pub fn parse_attr(
    line: &str,
    current: &mut AttrSet,
    diagnostics: &mut DiagnosticVec,
) -> Option<ConsumedSpan> {
    let (span, args) = find_paren_directive(line, "%attr", 0)?;
    let parts: Vec<&str> = args.split(',').collect();
    if parts.len() != 3 {
        push_syntax(diagnostics, format!("%attr takes 3 arguments, got {}", parts.len()));
        return Some(span);
    }
    match parse_mode(parts[0]) {
        Ok(mode) => {
            if let Some(mode) = mode {
                current.file_mode = Some(mode);
                current.specd.file_mode = Specd::FromCurrent;
            }
        }
        Err(msg) => push_syntax(diagnostics, msg),
    }
    if let Some(user) = parse_name_field(parts[1]) {
        current.user = Some(user);
        current.specd.user = Specd::FromCurrent;
    }
    if let Some(group) = parse_name_field(parts[2]) {
        current.group = Some(group);
        current.specd.group = Specd::FromCurrent;
    }
    Some(span)
}

/// `%defattr(mode, user, group, dirmode)` — sets the package's defaults.
pub fn parse_defattr(
    line: &str,
    defaults: &mut AttrSet,
    diagnostics: &mut DiagnosticVec,
) -> Option<ConsumedSpan> {
    let (span, args) = find_paren_directive(line, "%defattr", 0)?;
    let trailing = line[span.end..].trim_start();
    if !trailing.is_empty() && !trailing.starts_with('%') {
        push_syntax(diagnostics, "trailing garbage after %defattr(...)");
    }
    let parts: Vec<&str> = args.split(',').collect();
    if parts.len() != 3 && parts.len() != 4 {
        push_syntax(
            diagnostics,
            format!("%defattr takes 3 or 4 arguments, got {}", parts.len()),
        );
        return Some(span);
    }
    match parse_mode(parts[0]) {
        Ok(mode) => {
            if let Some(mode) = mode {
                defaults.file_mode = Some(mode);
                defaults.specd.file_mode = Specd::FromDefault;
            }
        }
        Err(msg) => push_syntax(diagnostics, msg),
    }
    if let Some(user) = parse_name_field(parts[1]) {
        defaults.user = Some(user);
        defaults.specd.user = Specd::FromDefault;
    }
    if let Some(group) = parse_name_field(parts[2]) {
        defaults.group = Some(group);
        defaults.specd.group = Specd::FromDefault;
    }
    if let Some(dirmode_str) = parts.get(3) {
        match parse_mode(dirmode_str) {
            Ok(mode) => {
                if let Some(mode) = mode {
                    defaults.dir_mode = Some(mode);
                    defaults.specd.dir_mode = Specd::FromDefault;
                }
            }
            Err(msg) => push_syntax(diagnostics, msg),
        }
    }
    Some(span)
}

fn verify_token_to_flag(token: &str) -> Option<VerifyFlags> {
    match token {
        "md5" | "filedigest" => Some(VerifyFlags::DIGEST),
        "size" => Some(VerifyFlags::SIZE),
        "link" => Some(VerifyFlags::LINKTO),
        "user" => Some(VerifyFlags::USER),
        "group" => Some(VerifyFlags::GROUP),
        "mtime" => Some(VerifyFlags::MTIME),
        "mode" => Some(VerifyFlags::MODE),
        "rdev" => Some(VerifyFlags::RDEV),
        "caps" => Some(VerifyFlags::CAPS),
        _ => None,
    }
}

fn parse_verify_tokens(args: &str, diagnostics: &mut DiagnosticVec) -> VerifyFlags {
    let mut mask = VerifyFlags::empty();
    let mut negate = false;
    for token in args.split(|c: char| c == ',' || c.is_whitespace()) {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        if token == "not" {
            negate = true;
            continue;
        }
        match verify_token_to_flag(token) {
            Some(flag) => mask |= flag,
            None => push_syntax(diagnostics, format!("unknown %verify token: {token}")),
        }
    }
    if negate { VerifyFlags::ALL.difference(mask) } else { mask }
}

/// `%verify(tok...)` — sets the current entry's verify mask.
pub fn parse_verify(
    line: &str,
    current: &mut AttrSet,
    diagnostics: &mut DiagnosticVec,
) -> Option<ConsumedSpan> {
    let (span, args) = find_paren_directive(line, "%verify", 0)?;
    current.verify_flags = parse_verify_tokens(args, diagnostics);
    current.specd.verify = Specd::FromCurrent;
    Some(span)
}

/// `%defverify(tok...)` — sets the default verify mask.
pub fn parse_defverify(
    line: &str,
    defaults: &mut AttrSet,
    diagnostics: &mut DiagnosticVec,
) -> Option<ConsumedSpan> {
    let (span, args) = find_paren_directive(line, "%defverify", 0)?;
    defaults.verify_flags = parse_verify_tokens(args, diagnostics);
    defaults.specd.verify = Specd::FromDefault;
    Some(span)
}

/// `%config[(missingok|noreplace)]`.
pub fn parse_config(
    line: &str,
    current: &mut AttrSet,
    diagnostics: &mut DiagnosticVec,
) -> Option<ConsumedSpan> {
    if let Some((span, args)) = find_paren_directive(line, "%config", 0) {
        if args.trim().is_empty() {
            push_syntax(diagnostics, "%config() must not be empty");
        }
        current.flags.insert(pkgmanifest_types::attrs::AttributeFlags::CONFIG);
        for token in args.split(|c: char| c == ',' || c.is_whitespace()) {
            match token.trim() {
                "" => {}
                "missingok" => current
                    .flags
                    .insert(pkgmanifest_types::attrs::AttributeFlags::MISSINGOK),
                "noreplace" => current
                    .flags
                    .insert(pkgmanifest_types::attrs::AttributeFlags::NOREPLACE),
                other => push_syntax(diagnostics, format!("unknown %config option: {other}")),
            }
        }
        return Some(span);
    }
    let span = find_bare_directive(line, "%config")?;
    current.flags.insert(pkgmanifest_types::attrs::AttributeFlags::CONFIG);
    Some(span)
}

/// `%lang(locales)`, repeatable within one line. Returns every consumed span.
pub fn parse_lang_all(
    line: &str,
    current: &mut AttrSet,
    diagnostics: &mut DiagnosticVec,
) -> Vec<ConsumedSpan> {
    let mut spans = Vec::new();
    let mut from = 0;
    while let Some((span, args)) = find_paren_directive(line, "%lang", from) {
        from = span.end;
        for token in args.split(|c: char| c == ',' || c.is_whitespace()) {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            if !pkgmanifest_types::attrs::LangSet::is_valid_tag(token) {
                push_syntax(diagnostics, format!("bad locale tag: {token}"));
                continue;
            }
            if !current.lang.insert(CompactString::from(token)) {
                push_diagnostic(
                    diagnostics,
                    Diagnostic::new(
                        Severity::Warning,
                        DiagnosticKind::Syntax(format!("duplicate locale tag: {token}")),
                    ),
                );
            }
        }
        spans.push(span);
    }
    spans
}

/// `%caps(text)` — round-tripped through the capability canonicalizer.
pub fn parse_caps(
    line: &str,
    current: &mut AttrSet,
    canonicalizer: &dyn CapabilityCanonicalizer,
    diagnostics: &mut DiagnosticVec,
) -> Option<ConsumedSpan> {
    let (span, args) = find_paren_directive(line, "%caps", 0)?;
    match canonicalizer.canonicalize(args) {
        Ok(canonical) => current.caps = Some(CompactString::from(canonical)),
        Err(err) => push_diagnostic(
            diagnostics,
            Diagnostic::new(Severity::Error, DiagnosticKind::Capability(format!("{err}"))),
        ),
    }
    Some(span)
}

/// `%dev(type major minor)`.
pub fn parse_dev(
    line: &str,
    current: &mut AttrSet,
    diagnostics: &mut DiagnosticVec,
) -> Option<ConsumedSpan> {
    let (span, args) = find_paren_directive(line, "%dev", 0)?;
    let parts: Vec<&str> = args.split_whitespace().collect();
    if parts.len() != 3 {
        push_syntax(diagnostics, "%dev takes type, major, minor");
        return Some(span);
    }
    let is_block = match parts[0] {
        "b" => true,
        "c" => false,
        other => {
            push_syntax(diagnostics, format!("%dev type must be b or c, got {other}"));
            return Some(span);
        }
    };
    let major: u32 = match parts[1].parse() {
        Ok(v) => v,
        Err(_) => {
            push_syntax(diagnostics, format!("bad %dev major: {}", parts[1]));
            return Some(span);
        }
    };
    let minor: u32 = match parts[2].parse() {
        Ok(v) => v,
        Err(_) => {
            push_syntax(diagnostics, format!("bad %dev minor: {}", parts[2]));
            return Some(span);
        }
    };
    let device = DeviceSpec { is_block, major, minor };
    if major >= DEVICE_COMPONENT_LIMIT || minor >= DEVICE_COMPONENT_LIMIT {
        push_syntax(diagnostics, format!("%dev major/minor must be < {DEVICE_COMPONENT_LIMIT}"));
        return Some(span);
    }
    current.device = Some(device);
    Some(span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn attr_sets_mode_user_group() {
        let mut current = AttrSet::new();
        let mut diags = DiagnosticVec::new();
        let span = parse_attr("%attr(0644, root, root) /etc/foo", &mut current, &mut diags);
        assert!(span.is_some());
        assert!(diags.is_empty());
        assert_eq!(current.file_mode, Some(0o644));
        assert_eq!(current.user.as_deref(), Some("root"));
        assert_eq!(current.specd.file_mode, Specd::FromCurrent);
    }

    #[test]
    fn attr_dash_means_unset() {
        let mut current = AttrSet::new();
        let mut diags = DiagnosticVec::new();
        parse_attr("%attr(-, -, -) /etc/foo", &mut current, &mut diags);
        assert_eq!(current.file_mode, None);
        assert_eq!(current.specd.file_mode, Specd::Unset);
    }

    #[test]
    fn mode_over_07777_is_rejected() {
        let mut current = AttrSet::new();
        let mut diags = DiagnosticVec::new();
        parse_attr("%attr(010000, root, root) /etc/foo", &mut current, &mut diags);
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn verify_not_inverts_mask() {
        let mut current = AttrSet::new();
        let mut diags = DiagnosticVec::new();
        parse_verify("%verify(not md5 size) /etc/foo", &mut current, &mut diags);
        assert!(!current.verify_flags.contains(VerifyFlags::DIGEST));
        assert!(!current.verify_flags.contains(VerifyFlags::SIZE));
        assert!(current.verify_flags.contains(VerifyFlags::MODE));
    }

    #[test]
    fn lang_rejects_multichar_c_but_accepts_c() {
        let mut current = AttrSet::new();
        let mut diags = DiagnosticVec::new();
        parse_lang_all("%lang(C,en_US)", &mut current, &mut diags);
        assert!(diags.is_empty());
        assert_eq!(current.lang.joined(), "C|en_US");
    }

    #[test]
    fn lang_single_char_non_c_is_rejected() {
        let mut current = AttrSet::new();
        let mut diags = DiagnosticVec::new();
        parse_lang_all("%lang(x)", &mut current, &mut diags);
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn dev_rejects_out_of_range() {
        let mut current = AttrSet::new();
        let mut diags = DiagnosticVec::new();
        parse_dev("%dev(b 256 0)", &mut current, &mut diags);
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn dev_accepts_max_component() {
        let mut current = AttrSet::new();
        let mut diags = DiagnosticVec::new();
        parse_dev("%dev(c 255 255)", &mut current, &mut diags);
        assert!(diags.is_empty());
        assert_eq!(current.device, Some(DeviceSpec { is_block: false, major: 255, minor: 255 }));
    }
}
