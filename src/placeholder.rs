//! Placeholder token extraction.
//!
//! A placeholder is a field name enclosed in a single pair of braces,
//! e.g. `{first_name}`. There is no nesting and no escaping: a `{` that is
//! not closed before the next `{` is treated as plain text.

use std::sync::OnceLock;

use regex::Regex;

/// Opening delimiter of a placeholder token.
pub const OPEN: char = '{';
/// Closing delimiter of a placeholder token.
pub const CLOSE: char = '}';

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([^{}]+)\}").expect("placeholder pattern is valid"))
}

/// Return the names found between braces in `text`, in order of position.
///
/// Duplicates are preserved.
///
/// # Example
///
/// ```
/// use mailmerge::extract_placeholders;
///
/// let names = extract_placeholders("This is a {simple} nice {example}.");
/// assert_eq!(names, vec!["simple", "example"]);
/// ```
pub fn extract_placeholders(text: &str) -> Vec<String> {
    placeholder_regex()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// The literal token searched for on a page, e.g. `{name}`.
pub fn token(name: &str) -> String {
    format!("{OPEN}{name}{CLOSE}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_in_order() {
        assert_eq!(
            extract_placeholders("Name: {name}, Pay: {brut_day}"),
            vec!["name", "brut_day"]
        );
    }

    #[test]
    fn test_duplicates_preserved() {
        assert_eq!(extract_placeholders("{a}{a}"), vec!["a", "a"]);
    }

    #[test]
    fn test_no_braces() {
        assert!(extract_placeholders("plain text, no tokens").is_empty());
        assert!(extract_placeholders("").is_empty());
    }

    #[test]
    fn test_unterminated_brace_ignored() {
        assert!(extract_placeholders("Dear {name").is_empty());
        assert_eq!(extract_placeholders("Dear {name, {city}"), vec!["city"]);
        assert_eq!(extract_placeholders("{a} and {b"), vec!["a"]);
    }

    #[test]
    fn test_empty_braces_ignored() {
        assert!(extract_placeholders("{}").is_empty());
    }

    #[test]
    fn test_names_with_spaces_and_punctuation() {
        assert_eq!(
            extract_placeholders("{first_name name} lives at {street, number}"),
            vec!["first_name name", "street, number"]
        );
    }

    #[test]
    fn test_token() {
        assert_eq!(token("name"), "{name}");
    }
}
