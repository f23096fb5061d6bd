//! Marker-delimited text extraction.
//!
//! The login page and home page carry tokens embedded in script text rather
//! than structured markup, so the flow scans for literal start/end markers.
//! Absence is a typed `None`, never an empty string - "marker not found" and
//! "found an empty value" are different outcomes and callers care which one
//! happened.

/// Extract the substring between `start` and `end`, searching for `end` only
/// after the first occurrence of `start`.
///
/// Returns `None` if either marker is missing.
pub fn extract_between<'a>(text: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let from = text.find(start)? + start.len();
    let len = text[from..].find(end)?;
    Some(&text[from..from + len])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_value_between_markers() {
        let html = r#"document.cookie="gt=999888777; Max-Age=10800";"#;
        assert_eq!(extract_between(html, "gt=", ";"), Some("999888777"));
    }

    #[test]
    fn missing_start_marker_is_none() {
        assert_eq!(extract_between("no token here", "gt=", ";"), None);
    }

    #[test]
    fn missing_end_marker_is_none() {
        assert_eq!(extract_between("gt=123 and nothing else", "gt=", ";"), None);
    }

    #[test]
    fn empty_value_is_found_not_absent() {
        // Adjacent markers yield Some(""), distinct from a missing marker.
        assert_eq!(extract_between("gt=;", "gt=", ";"), Some(""));
    }

    #[test]
    fn end_marker_before_start_is_ignored() {
        assert_eq!(extract_between("; gt=42;", "gt=", ";"), Some("42"));
    }
}
