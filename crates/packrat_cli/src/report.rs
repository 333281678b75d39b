//! Per-unit report line formatting for `save` and `restore`.

use packrat_common::Fingerprint;

/// Printed in place of a digest for indeterminate, stale, or absent units.
pub const PLACEHOLDER: &str = "-";

/// Marks an entry written by this invocation.
pub const MARK_INSERTED: char = '*';

/// Marks an entry that was already present (or an uneventful unit).
pub const MARK_PRESENT: char = ' ';

/// Formats one report line: a 32-column digest field, a presence marker,
/// and the unit's canonical identity.
pub fn unit_line(fingerprint: Option<&Fingerprint>, marker: char, key: &str) -> String {
    match fingerprint {
        Some(fp) => format!("{fp:<32} {marker}{key}"),
        None => format!("{PLACEHOLDER:<32} {MARK_PRESENT}{key}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_line_layout() {
        let fp = Fingerprint::from_bytes(b"x");
        let line = unit_line(Some(&fp), MARK_INSERTED, "example.com/a");
        assert!(line.starts_with(&fp.to_string()));
        assert!(line.ends_with("*example.com/a"));
        assert_eq!(line.chars().position(|c| c == '*'), Some(33));
    }

    #[test]
    fn placeholder_line_layout() {
        let line = unit_line(None, MARK_INSERTED, "example.com/a");
        assert!(line.starts_with("-"));
        assert!(line.ends_with(" example.com/a"));
        assert!(!line.contains('*'), "placeholders never carry a marker");
    }
}
