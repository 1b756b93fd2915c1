//! The capability-text library is an external collaborator (§1): this crate
//! never implements POSIX capability-set grammar. `%caps(text)` is round-
//! tripped through whatever implementation of this trait the driver supplies.

/// Parses capability text and prints it back out in canonical form.
///
/// A real implementation wraps a capability-text library (e.g. bindings to
/// `libcap`'s `cap_from_text`/`cap_to_text`). `canonicalize` must be
/// idempotent: feeding its own output back in must return the same string
/// (§8 "Re-parsing the canonicalized capability text ... yields the same
/// value").
pub trait CapabilityCanonicalizer {
    /// Returns an error if `text` does not parse as a capability set.
    fn canonicalize(&self, text: &str) -> eyre::Result<String>;
}

/// A capability canonicalizer that accepts syntactically plausible capability
/// lists (`cap_name[,cap_name...][=flags]`) and normalises separators and
/// case without attempting real POSIX capability semantics.
///
/// This is the reference implementation used when no platform capability
/// library is wired in; it exists so `%caps` round-trips in tests and in
/// environments without `libcap`. A production driver should prefer a real
/// binding.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyntacticCapabilityCanonicalizer;

impl CapabilityCanonicalizer for SyntacticCapabilityCanonicalizer {
    fn canonicalize(&self, text: &str) -> eyre::Result<String> {
        let text = text.trim();
        if text.is_empty() {
            eyre::bail!("empty capability text");
        }
        let mut names: Vec<&str> = text.split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .collect();
        for name in &names {
            if !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '=' || c == '+' || c == '-')
            {
                eyre::bail!("invalid capability token: {name}");
            }
        }
        names.sort_unstable();
        names.dedup();
        Ok(names.join(","))
    }
}
