//! Checklist parsing for ChecklistDoc artifacts.
//!
//! Pending items are lines starting with `- [ ]`; completed items start with
//! `- [x]` or `- [X]`. The first line may carry `Fully implemented: YES|NO`.

const PENDING_MARKER: &str = "- [ ]";
const MARKER_PREFIX: &str = "Fully implemented:";

/// Pending/completed tallies of a checklist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChecklistCounts {
    pub pending: usize,
    pub completed: usize,
}

impl ChecklistCounts {
    /// Count both kinds of items in one pass
    pub fn of(doc: &str) -> Self {
        let mut counts = Self::default();
        for line in doc.lines() {
            if is_pending(line) {
                counts.pending += 1;
            } else if is_completed(line) {
                counts.completed += 1;
            }
        }
        counts
    }

    /// Total checklist items
    pub fn total(&self) -> usize {
        self.pending + self.completed
    }
}

fn is_pending(line: &str) -> bool {
    line.starts_with(PENDING_MARKER)
}

fn is_completed(line: &str) -> bool {
    line.starts_with("- [x]") || line.starts_with("- [X]")
}

/// Number of unchecked items (`- [ ]`)
pub fn count_pending(doc: &str) -> usize {
    doc.lines().filter(|line| is_pending(line)).count()
}

/// Number of checked items (`- [x]` or `- [X]`)
pub fn count_completed(doc: &str) -> usize {
    doc.lines().filter(|line| is_completed(line)).count()
}

/// Only the pending lines, for diagnostics
pub fn pending_lines(doc: &str) -> Vec<&str> {
    doc.lines().filter(|line| is_pending(line)).collect()
}

/// Read the `Fully implemented:` marker from the first line, if any
pub fn implementation_marker(doc: &str) -> Option<bool> {
    let first = doc.lines().next()?.trim();
    let value = first.strip_prefix(MARKER_PREFIX)?.trim();
    match value.to_uppercase().as_str() {
        "YES" => Some(true),
        "NO" => Some(false),
        _ => None,
    }
}

/// Return `doc` with its first line set to `Fully implemented: YES|NO`.
///
/// An existing marker line is replaced; otherwise the marker is prepended.
pub fn set_implementation_marker(doc: &str, implemented: bool) -> String {
    let marker = format!("{} {}", MARKER_PREFIX, if implemented { "YES" } else { "NO" });
    let first_is_marker = doc
        .lines()
        .next()
        .is_some_and(|line| line.trim().starts_with(MARKER_PREFIX));

    if first_is_marker {
        match doc.split_once('\n') {
            Some((_, rest)) => format!("{}\n{}", marker, rest),
            None => marker,
        }
    } else if doc.is_empty() {
        marker
    } else {
        format!("{}\n\n{}", marker, doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "- [ ] a\n- [x] b\n- [ ] c";

    #[test]
    fn test_count_pending() {
        assert_eq!(count_pending(SAMPLE), 2);
    }

    #[test]
    fn test_count_completed() {
        assert_eq!(count_completed(SAMPLE), 1);
    }

    #[test]
    fn test_completed_marker_is_case_insensitive() {
        assert_eq!(count_completed("- [X] upper\n- [x] lower"), 2);
    }

    #[test]
    fn test_pending_marker_requires_line_start() {
        let doc = "text - [ ] inline\n  - [ ] indented\n- [ ] real";
        assert_eq!(count_pending(doc), 1);
    }

    #[test]
    fn test_counts_of() {
        let counts = ChecklistCounts::of(SAMPLE);
        assert_eq!(counts, ChecklistCounts { pending: 2, completed: 1 });
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn test_counts_of_empty() {
        assert_eq!(ChecklistCounts::of(""), ChecklistCounts::default());
    }

    #[test]
    fn test_pending_lines() {
        assert_eq!(pending_lines(SAMPLE), vec!["- [ ] a", "- [ ] c"]);
    }

    #[test]
    fn test_implementation_marker() {
        assert_eq!(implementation_marker("Fully implemented: YES\n- [x] a"), Some(true));
        assert_eq!(implementation_marker("Fully implemented: no\n"), Some(false));
        assert_eq!(implementation_marker("# TODO\nFully implemented: YES"), None);
        assert_eq!(implementation_marker(""), None);
    }

    #[test]
    fn test_set_marker_replaces_existing() {
        let doc = "Fully implemented: YES\n\n- [ ] a";
        assert_eq!(set_implementation_marker(doc, false), "Fully implemented: NO\n\n- [ ] a");
    }

    #[test]
    fn test_set_marker_prepends_when_missing() {
        let doc = "- [ ] a";
        assert_eq!(set_implementation_marker(doc, false), "Fully implemented: NO\n\n- [ ] a");
    }

    #[test]
    fn test_set_marker_single_line() {
        assert_eq!(set_implementation_marker("Fully implemented: NO", true), "Fully implemented: YES");
        assert_eq!(set_implementation_marker("", true), "Fully implemented: YES");
    }
}
