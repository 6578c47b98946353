use serde::Serialize;

use crate::IndexedFileInfo;

/// How a candidate matched the query. Tiers are compared case-insensitively.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchType {
    ExactName,
    PrefixName,
    ContainsName,
    PathMatch,
}

impl MatchType {
    pub fn weight(self) -> u32 {
        match self {
            MatchType::ExactName => 100,
            MatchType::PrefixName => 80,
            MatchType::ContainsName => 60,
            MatchType::PathMatch => 40,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MatchType::ExactName => "exact",
            MatchType::PrefixName => "prefix",
            MatchType::ContainsName => "contains",
            MatchType::PathMatch => "path",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FileSearchResult {
    pub item: IndexedFileInfo,
    pub weight: u32,
    pub match_type: MatchType,
}

impl FileSearchResult {
    fn new(item: IndexedFileInfo, match_type: MatchType) -> Self {
        Self {
            item,
            weight: match_type.weight(),
            match_type,
        }
    }
}

/// Classify one candidate against an already lower-cased query.
fn classify(item: &IndexedFileInfo, query: &str) -> Option<MatchType> {
    let name = item.name.to_lowercase();
    if name == query || item.stem().to_lowercase() == query {
        Some(MatchType::ExactName)
    } else if name.starts_with(query) {
        Some(MatchType::PrefixName)
    } else if name.contains(query) {
        Some(MatchType::ContainsName)
    } else if item.relative_path.to_lowercase().contains(query) {
        Some(MatchType::PathMatch)
    } else {
        None
    }
}

/// Rank `candidates` against `query`, best first. Ties keep candidate order.
///
/// A blank query returns the candidates as given (callers pass recent files
/// in recency order), all tagged [`MatchType::PathMatch`].
pub fn search(
    query: &str,
    candidates: &[IndexedFileInfo],
    max_results: usize,
) -> Vec<FileSearchResult> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return candidates
            .iter()
            .take(max_results)
            .map(|c| FileSearchResult::new(c.clone(), MatchType::PathMatch))
            .collect();
    }

    let mut results: Vec<FileSearchResult> = candidates
        .iter()
        .filter_map(|c| classify(c, &query).map(|m| FileSearchResult::new(c.clone(), m)))
        .collect();
    // sort_by is stable
    results.sort_by(|a, b| b.weight.cmp(&a.weight));
    results.truncate(max_results);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn file(rel: &str) -> IndexedFileInfo {
        IndexedFileInfo::from_path(Path::new("/p"), &Path::new("/p").join(rel), false)
    }

    fn names(results: &[FileSearchResult]) -> Vec<&str> {
        results.iter().map(|r| r.item.name.as_str()).collect()
    }

    #[test]
    fn tiers_rank_exact_prefix_contains() {
        let candidates = vec![file("Test.kt"), file("testing.kt"), file("mytest.kt")];
        let results = search("test", &candidates, 10);
        assert_eq!(names(&results), vec!["Test.kt", "testing.kt", "mytest.kt"]);
        let weights: Vec<u32> = results.iter().map(|r| r.weight).collect();
        assert_eq!(weights, vec![100, 80, 60]);
        assert_eq!(results[0].match_type, MatchType::ExactName);
        assert_eq!(results[1].match_type, MatchType::PrefixName);
        assert_eq!(results[2].match_type, MatchType::ContainsName);
    }

    #[test]
    fn exact_full_name() {
        let results = search("README.md", &[file("docs/readme.md")], 10);
        assert_eq!(results[0].match_type, MatchType::ExactName);
    }

    #[test]
    fn path_match_is_lowest_tier() {
        let candidates = vec![file("src/protocol/mod.rs"), file("protocol.rs")];
        let results = search("protocol", &candidates, 10);
        assert_eq!(names(&results), vec!["protocol.rs", "mod.rs"]);
        assert_eq!(results[1].match_type, MatchType::PathMatch);
        assert_eq!(results[1].weight, 40);
    }

    #[test]
    fn non_matching_candidates_are_dropped() {
        let results = search("zzz", &[file("a.rs"), file("b.rs")], 10);
        assert!(results.is_empty());
    }

    #[test]
    fn ties_keep_input_order() {
        let candidates = vec![file("b/util.rs"), file("a/util.rs"), file("c/util.rs")];
        let results = search("util", &candidates, 10);
        let paths: Vec<&str> = results
            .iter()
            .map(|r| r.item.relative_path.as_str())
            .collect();
        assert_eq!(paths, vec!["b/util.rs", "a/util.rs", "c/util.rs"]);
    }

    #[test]
    fn truncates_after_ranking() {
        let candidates = vec![file("xmain.rs"), file("main.rs"), file("main_test.rs")];
        let results = search("main", &candidates, 2);
        assert_eq!(names(&results), vec!["main.rs", "main_test.rs"]);
    }

    #[test]
    fn blank_query_keeps_recency_order() {
        let candidates = vec![file("z.rs"), file("a.rs"), file("m.rs")];
        let results = search("  ", &candidates, 2);
        assert_eq!(names(&results), vec!["z.rs", "a.rs"]);
        assert!(results.iter().all(|r| r.match_type == MatchType::PathMatch));
    }

    #[test]
    fn query_is_trimmed_and_case_folded() {
        let results = search(" MAIN ", &[file("Main.java")], 5);
        assert_eq!(results[0].match_type, MatchType::ExactName);
    }

    #[test]
    fn zero_max_results() {
        assert!(search("a", &[file("a.rs")], 0).is_empty());
    }
}
