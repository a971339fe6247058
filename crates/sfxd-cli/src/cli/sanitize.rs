//! Path component sanitization for manifest-derived folder and file names.

/// Sanitizes one path component for the output tree.
///
/// The archive's descriptions carry quotes, slashes, colons and the like;
/// anything outside letters, digits and `_-&,(). ` (space) becomes `_`.
/// Leading dots get an underscore prefix so no hidden files appear, and
/// surrounding whitespace is trimmed.
pub fn sanitize_component(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let keep = c.is_alphanumeric()
            || matches!(c, '_' | '-' | '&' | ',' | '(' | ')' | '.' | ' ');
        out.push(if keep { c } else { '_' });
    }
    let trimmed = out.trim();
    if trimmed.starts_with('.') {
        format!("_{}", trimmed)
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_separators_and_quotes() {
        assert_eq!(
            sanitize_component("Two-tone horn: \"aoogah\"/close"),
            "Two-tone horn_ _aoogah__close"
        );
    }

    #[test]
    fn keeps_archive_punctuation() {
        assert_eq!(
            sanitize_component("Cars & Vans (Exterior), take 2"),
            "Cars & Vans (Exterior), take 2"
        );
    }

    #[test]
    fn no_hidden_files() {
        assert_eq!(sanitize_component(".38 revolver"), "_.38 revolver");
    }

    #[test]
    fn trims_surrounding_whitespace() {
        assert_eq!(sanitize_component("  bells  "), "bells");
    }

    #[test]
    fn keeps_non_ascii_letters() {
        assert_eq!(sanitize_component("Café ambience"), "Café ambience");
    }
}
