use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const REDDIT_WEB_BASE: &str = "https://www.reddit.com";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedditPost {
    pub id: String,
    pub title: String,
    pub content: Option<String>,
    pub subreddit: String,
    pub url: String,
    pub permalink: String,
    pub created_utc: i64,
}

impl RedditPost {
    /// Absolute link to the post's comment page.
    pub fn link(&self) -> String {
        if self.permalink.starts_with("http") {
            self.permalink.clone()
        } else {
            format!("{}{}", REDDIT_WEB_BASE, self.permalink)
        }
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.created_utc, 0)
    }
}

/// Keyword filters for one monitored subreddit.
///
/// The name and every keyword are lowercase; both keyword lists are free of
/// blanks and duplicates. Built once by config validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubredditFilter {
    pub name: String,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl SubredditFilter {
    pub fn new(name: impl Into<String>, include: Vec<String>, exclude: Vec<String>) -> Self {
        Self {
            name: name.into().to_lowercase(),
            include: normalize_terms(include),
            exclude: normalize_terms(exclude),
        }
    }
}

/// Lowercase and trim every term, dropping blanks and repeats while keeping
/// the first occurrence order.
pub fn normalize_terms(terms: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(terms.len());
    for term in terms {
        let term = term.trim().to_lowercase();
        if !term.is_empty() && !normalized.contains(&term) {
            normalized.push(term);
        }
    }
    normalized
}
