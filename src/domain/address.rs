//! 주소 기반 검색 결과 구분 (동/가 토큰 매칭)
//!
//! Same-named places are told apart by the sub-district token of the task's
//! address: look at the first [`CANDIDATE_LIMIT`] entries in listed order and
//! take the first whose address fragment contains the token. No scoring.

/// Sub-district suffixes recognised as locale tokens
pub const LOCALE_SUFFIXES: &[&str] = &["동", "가"];

/// Number of search result entries inspected during disambiguation
pub const CANDIDATE_LIMIT: usize = 5;

/// Index selected when disambiguation finds nothing
pub const FALLBACK_INDEX: usize = 0;

/// Extract the first whitespace-separated token ending in a locale suffix
pub fn extract_token(address: &str) -> Option<&str> {
    address
        .split_whitespace()
        .find(|part| LOCALE_SUFFIXES.iter().any(|suffix| part.ends_with(suffix)))
}

/// Choose which search result entry to open
///
/// `fragments` holds the displayed address fragment of each entry in listed
/// order (`None` when an entry has no address element). Entries past
/// [`CANDIDATE_LIMIT`] are never considered.
pub fn select_candidate(token: Option<&str>, fragments: &[Option<String>]) -> usize {
    select_candidate_within(token, fragments, CANDIDATE_LIMIT)
}

/// [`select_candidate`] with a configurable number of inspected entries
pub fn select_candidate_within(token: Option<&str>, fragments: &[Option<String>], limit: usize) -> usize {
    let Some(token) = token else {
        return FALLBACK_INDEX;
    };

    fragments
        .iter()
        .take(limit)
        .position(|fragment| fragment.as_deref().is_some_and(|text| text.contains(token)))
        .unwrap_or(FALLBACK_INDEX)
}
