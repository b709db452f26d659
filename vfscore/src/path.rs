//! Tokenizes a path string into an ordered sequence of non-empty segments.

/// Splits `path` on `/`, collapsing repeated separators and dropping empty
/// segments. The empty slice denotes the root. No new strings are allocated;
/// the returned segments borrow from `path`.
pub fn split(path: &str) -> alloc::vec::Vec<&str> {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_splits_to_empty() {
        assert!(split("/").is_empty());
        assert!(split("").is_empty());
    }

    #[test]
    fn collapses_repeated_separators() {
        assert_eq!(split("/a//b///c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn no_leading_separator_still_splits() {
        assert_eq!(split("a/b"), vec!["a", "b"]);
    }

    #[test]
    fn trailing_separator_dropped() {
        assert_eq!(split("/a/b/"), vec!["a", "b"]);
    }
}
