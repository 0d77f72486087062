use std::collections::HashSet;

/// Deduplicate a list of identity strings, keeping first-seen order.
///
/// Used for commit-author and similar lists where the catalog API repeats
/// entries across pages or commits.
pub fn dedup_preserve_order(values: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

/// Tag inclusion filter: pass if any configured tag appears in the
/// summary's tag set. An absent filter passes everything.
pub fn tags_match(filter: Option<&[String]>, tags: &[String]) -> bool {
    match filter {
        None => true,
        Some(wanted) => wanted.iter().any(|t| tags.iter().any(|s| s == t)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_preserve_order() {
        let input = vec![
            "alice".to_string(),
            "bob".to_string(),
            "alice".to_string(),
            "carol".to_string(),
            "bob".to_string(),
        ];
        assert_eq!(dedup_preserve_order(input), vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn test_tags_match_absent_filter_passes_all() {
        assert!(tags_match(None, &[]));
        assert!(tags_match(None, &["anything".to_string()]));
    }

    #[test]
    fn test_tags_match_intersection() {
        let filter = vec!["nlp".to_string()];
        let cases = [
            (vec!["nlp".to_string(), "pytorch".to_string()], true),
            (vec!["cv".to_string()], false),
            (vec![], false),
        ];
        for (tags, expected) in cases {
            assert_eq!(tags_match(Some(&filter), &tags), expected);
        }
    }
}
