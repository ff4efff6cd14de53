use itertools::Itertools;

use super::model::SearchResult;

/// Count text shown before the first result arrives.
pub const INITIAL_COUNT_TEXT: &str = "Input Repository Name";
/// Count text shown when a search produced no result.
pub const ABSENT_COUNT_TEXT: &str = "TotalCount: nil";

/// One `name(stars)` line per repository, each newline terminated.  Empty
/// when there is no result.
pub fn repository_text(result: Option<&SearchResult>) -> String {
    result
        .map(|result| {
            result
                .repositories
                .iter()
                .map(|repo| format!("{}({})\n", repo.name, repo.star_count))
                .join("")
        })
        .unwrap_or_default()
}

pub fn count_text(result: Option<&SearchResult>) -> String {
    match result {
        Some(result) => format!("TotalCount: {}", result.total_count),
        None => ABSENT_COUNT_TEXT.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::Repository;

    fn result(repos: &[(&str, u64)], total_count: u64) -> SearchResult {
        SearchResult {
            repositories: repos
                .iter()
                .map(|(name, star_count)| Repository {
                    name: name.to_string(),
                    star_count: *star_count,
                })
                .collect(),
            total_count,
        }
    }

    #[test]
    fn renders_each_repository_on_its_own_line() {
        let result = result(&[("rust-lang/rust", 90000), ("rxswift/rx", 12)], 5000);
        assert_eq!(
            repository_text(Some(&result)),
            "rust-lang/rust(90000)\nrxswift/rx(12)\n"
        );
        assert_eq!(count_text(Some(&result)), "TotalCount: 5000");
    }

    #[test]
    fn empty_page_still_reports_total() {
        let result = result(&[], 7);
        assert_eq!(repository_text(Some(&result)), "");
        assert_eq!(count_text(Some(&result)), "TotalCount: 7");
    }

    #[test]
    fn absent_result() {
        assert_eq!(repository_text(None), "");
        assert_eq!(count_text(None), ABSENT_COUNT_TEXT);
    }
}
