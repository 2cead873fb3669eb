//! SQL utility functions

/// Escape LIKE metacharacters (`%`, `_`, `\`) in a rule value
///
/// Patterns built from the result must be matched with `ESCAPE '\'`.
///
/// # Example
///
/// ```
/// use memberbase_server::utils::sql::escape_like_pattern;
///
/// let value = "50% off_peak";
/// let pattern = format!("{}%", escape_like_pattern(value));
/// assert_eq!(pattern, "50\\% off\\_peak%");
/// ```
pub fn escape_like_pattern(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_values_pass_through() {
        assert_eq!(escape_like_pattern("alice@example.com"), "alice@example.com");
        assert_eq!(escape_like_pattern(""), "");
    }

    #[test]
    fn test_metacharacters_are_escaped() {
        assert_eq!(escape_like_pattern("first_last@example.com"), "first\\_last@example.com");
        assert_eq!(escape_like_pattern("100%_\\x"), "100\\%\\_\\\\x");
    }
}
