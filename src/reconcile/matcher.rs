//! Container name matching
//!
//! Declared services reference containers by name, but real container names
//! carry compose prefixes and replica suffixes (`shop-api-1` for `api`). The
//! matcher tries an ordered list of pure predicates; the first rule with any
//! hit wins, and within a rule the first container (runtime order, sorted by
//! name) wins.

use std::fmt;

use tracing::debug;

use crate::live::LiveContainer;

/// Rule that produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    Exact,
    Substring,
    Keyword,
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchRule::Exact => write!(f, "exact"),
            MatchRule::Substring => write!(f, "substring"),
            MatchRule::Keyword => write!(f, "keyword"),
        }
    }
}

/// `(service_ref, container_name) -> matched`
pub type MatchPredicate = fn(&str, &str) -> bool;

/// Matching rules in priority order
pub const MATCH_RULES: [(MatchRule, MatchPredicate); 3] = [
    (MatchRule::Exact, exact_match),
    (MatchRule::Substring, substring_match),
    (MatchRule::Keyword, keyword_match),
];

/// Minimum length of a shared non-suffix token for a keyword match
const MIN_SHARED_TOKEN_LEN: usize = 4;

pub fn exact_match(service_ref: &str, name: &str) -> bool {
    service_ref.to_lowercase() == name.to_lowercase()
}

pub fn substring_match(service_ref: &str, name: &str) -> bool {
    let service_ref = service_ref.to_lowercase();
    let name = name.to_lowercase();

    if service_ref.is_empty() || name.is_empty() {
        return false;
    }

    name.contains(&service_ref) || service_ref.contains(&name)
}

/// Same service-type suffix plus one more shared meaningful token
///
/// `app-worker` and `app-api` share only a prefix and do not match;
/// `datatalk_worker` and `datatalk-worker-1` do.
pub fn keyword_match(service_ref: &str, name: &str) -> bool {
    let ref_tokens = tokens(service_ref);
    let name_tokens = tokens(name);

    let (Some((ref_last, ref_rest)), Some((name_last, name_rest))) =
        (ref_tokens.split_last(), name_tokens.split_last())
    else {
        return false;
    };

    if ref_last != name_last {
        return false;
    }

    ref_rest
        .iter()
        .any(|token| token.len() >= MIN_SHARED_TOKEN_LEN && name_rest.contains(token))
}

/// Lowercase `-`/`_` separated tokens, without a trailing replica index
fn tokens(name: &str) -> Vec<String> {
    let mut tokens: Vec<String> = name
        .to_lowercase()
        .split(['-', '_'])
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect();

    while tokens.len() > 1
        && tokens
            .last()
            .is_some_and(|token| token.chars().all(|c| c.is_ascii_digit()))
    {
        tokens.pop();
    }

    tokens
}

/// A container matched to a declared service
#[derive(Debug, Clone, Copy)]
pub struct MatchOutcome<'a> {
    pub container: &'a LiveContainer,
    pub rule: MatchRule,

    /// Containers the winning rule accepted; more than one means the match
    /// was ambiguous and the first one was taken
    pub candidates: usize,
}

/// Find the container a service reference refers to
pub fn match_container<'a>(
    service_ref: &str,
    containers: &'a [LiveContainer],
) -> Option<MatchOutcome<'a>> {
    if service_ref.trim().is_empty() {
        return None;
    }

    for (rule, predicate) in MATCH_RULES {
        let mut hits = containers
            .iter()
            .filter(|container| !container.name.is_empty() && predicate(service_ref, &container.name));

        if let Some(container) = hits.next() {
            let candidates = 1 + hits.count();
            if candidates > 1 {
                debug!(
                    "'{service_ref}' matches {candidates} containers by {rule} rule, using {}",
                    container.name
                );
            }
            return Some(MatchOutcome {
                container,
                rule,
                candidates,
            });
        }
    }

    None
}
