//! Title filtering.
//!
//! Matching is plain substring containment on the lowercased title, so a
//! keyword like `cat` also matches `category`. An empty include list
//! matches every title and an empty exclude list vetoes nothing.

use crate::SubredditFilter;

/// Returns true when `title` passes the subreddit's keyword filters.
pub fn matches(filter: &SubredditFilter, title: &str) -> bool {
    let title = title.to_lowercase();

    let included = filter.include.is_empty()
        || filter.include.iter().any(|term| title.contains(term.as_str()));

    included && !filter.exclude.iter().any(|term| title.contains(term.as_str()))
}

impl SubredditFilter {
    pub fn matches(&self, title: &str) -> bool {
        matches(self, title)
    }
}
