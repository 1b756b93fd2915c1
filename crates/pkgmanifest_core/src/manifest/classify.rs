//! LineClassifier: turns a line with its directive spans blanked out into
//! file-name tokens (and recognises the handful of bare "simple" virtual
//! attributes that aren't parenthesized directives).

use pkgmanifest_types::attrs::AttributeFlags;

/// One file-name token recovered from a manifest line's residue, plus the
/// simple per-line flags collected while scanning for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedLine {
    pub flags: AttributeFlags,
    pub tokens: Vec<String>,
}

/// Build the residue of `line` with every span in `consumed` (already sorted
/// or not — this sorts them) replaced by nothing, i.e. omitted rather than
/// blanked to spaces. Overlapping spans are tolerated by merging.
#[must_use]
pub fn blank_spans(line: &str, consumed: &mut [std::ops::Range<usize>]) -> String {
    consumed.sort_by_key(|r| r.start);
    let mut out = String::with_capacity(line.len());
    let mut cursor = 0usize;
    for span in consumed.iter() {
        let start = span.start.max(cursor);
        if start > cursor {
            out.push_str(&line[cursor..start]);
        }
        cursor = cursor.max(span.end);
    }
    if cursor < line.len() {
        out.push_str(&line[cursor..]);
    }
    out
}

const SIMPLE_ATTRS: &[(&str, AttributeFlags)] = &[
    ("%dir", AttributeFlags::DIR),
    ("%doc", AttributeFlags::DOC),
    ("%docdir", AttributeFlags::DOCDIR),
    ("%readme", AttributeFlags::README),
    ("%license", AttributeFlags::LICENSE),
    ("%pubkey", AttributeFlags::PUBKEY),
    ("%ghost", AttributeFlags::GHOST),
    ("%exclude", AttributeFlags::EXCLUDE),
];

/// Tokenize the blanked residue of a manifest line: recognise bare simple
/// attributes as flags and return anything else (quoted or bare) as a
/// file-name token.
#[must_use]
pub fn classify(residue: &str) -> ClassifiedLine {
    let mut result = ClassifiedLine::default();
    let bytes = residue.as_bytes();
    let mut pos = 0usize;
    while pos < bytes.len() {
        if bytes[pos].is_ascii_whitespace() {
            pos += 1;
            continue;
        }
        if bytes[pos] == b'"' {
            let quote_start = pos + 1;
            let end = residue[quote_start..]
                .find('"')
                .map_or(residue.len(), |rel| quote_start + rel);
            result.tokens.push(residue[quote_start..end].to_owned());
            pos = (end + 1).min(residue.len());
            continue;
        }
        let end = residue[pos..]
            .find(char::is_whitespace)
            .map_or(residue.len(), |rel| pos + rel);
        let word = &residue[pos..end];
        if let Some((_, flag)) = SIMPLE_ATTRS.iter().find(|(name, _)| *name == word) {
            result.flags.insert(*flag);
        } else {
            result.tokens.push(word.to_owned());
        }
        pos = end;
    }
    result
}
