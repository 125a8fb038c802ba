//! Keyword matching.
//!
//! [`matches`] is the pure per-keyword decision; [`KeywordMatcher`] orders a user's keywords
//! (priority descending, then newest first) and applies the [`MatchPolicy`].

use std::fmt;
use std::str::FromStr;

use regex::RegexBuilder;
use relay_core::{Keyword, MatchMode, MatchResult};
use tracing::{debug, warn};

/// Compiled regex size cap; larger patterns are treated as invalid.
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Which matching keywords trigger a forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchPolicy {
    /// Only the first keyword in evaluation order.
    #[default]
    FirstMatch,
    /// Every matching keyword, each handled independently.
    AllMatches,
}

impl FromStr for MatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "first" | "first_match" => Ok(MatchPolicy::FirstMatch),
            "all" | "all_matches" => Ok(MatchPolicy::AllMatches),
            other => Err(format!("unknown match policy: {} (expected first or all)", other)),
        }
    }
}

impl fmt::Display for MatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchPolicy::FirstMatch => f.write_str("first"),
            MatchPolicy::AllMatches => f.write_str("all"),
        }
    }
}

/// Returns the matched text if `keyword` matches `text`.
///
/// The matched text is the keyword text for exact/contains and the matched span for regex.
/// An invalid pattern or an empty keyword is a no-match with a warning.
pub fn find_match(text: &str, keyword: &Keyword) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    if keyword.text.is_empty() {
        warn!(keyword_id = %keyword.id, "Keyword has empty text, skipping");
        return None;
    }

    match keyword.match_mode {
        MatchMode::Exact | MatchMode::Contains => {
            let (haystack, needle) = if keyword.case_sensitive {
                (text.to_string(), keyword.text.clone())
            } else {
                (text.to_lowercase(), keyword.text.to_lowercase())
            };
            let hit = match keyword.match_mode {
                MatchMode::Exact => haystack == needle,
                _ => haystack.contains(&needle),
            };
            hit.then(|| keyword.text.clone())
        }
        MatchMode::Regex => {
            let pattern = match RegexBuilder::new(&keyword.text)
                .case_insensitive(!keyword.case_sensitive)
                .size_limit(REGEX_SIZE_LIMIT)
                .build()
            {
                Ok(pattern) => pattern,
                Err(e) => {
                    warn!(
                        keyword_id = %keyword.id,
                        user_id = %keyword.user_id,
                        error = %e,
                        "Invalid keyword regex, treating as no match"
                    );
                    return None;
                }
            };
            pattern.find(text).map(|m| m.as_str().to_string())
        }
    }
}

/// Whether `keyword` matches `text`. Deterministic for a given pair.
pub fn matches(text: &str, keyword: &Keyword) -> bool {
    find_match(text, keyword).is_some()
}

/// Active keywords in evaluation order: priority descending, then most recently created.
pub fn evaluation_order(keywords: &[Keyword]) -> Vec<&Keyword> {
    let mut ordered: Vec<&Keyword> = keywords.iter().filter(|k| k.is_active).collect();
    ordered.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
    ordered
}

/// Selects the keywords that fire for a message under a policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordMatcher {
    policy: MatchPolicy,
}

impl KeywordMatcher {
    pub fn new(policy: MatchPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    /// Absent text yields no results. Under [`MatchPolicy::FirstMatch`] at most one result is returned.
    pub fn select(
        &self,
        text: Option<&str>,
        keywords: &[Keyword],
        user_id: &str,
        channel_id: &str,
    ) -> Vec<MatchResult> {
        let Some(text) = text else {
            return Vec::new();
        };

        let mut results = Vec::new();
        for keyword in evaluation_order(keywords) {
            if let Some(matched_text) = find_match(text, keyword) {
                debug!(
                    user_id = %user_id,
                    keyword_id = %keyword.id,
                    priority = keyword.priority,
                    "Keyword matched"
                );
                results.push(MatchResult {
                    keyword_id: keyword.id.clone(),
                    matched_text,
                    channel_id: channel_id.to_string(),
                    user_id: user_id.to_string(),
                });
                if self.policy == MatchPolicy::FirstMatch {
                    break;
                }
            }
        }
        results
    }
}
