//! Dotted-path glob matching shared by scope checks and event subscriptions.
//!
//! `required` is the path being asked for (a scope requirement, or an event
//! path); each candidate is something held (a granted scope, or a
//! subscription pattern). The walk runs over the candidate's segments:
//!
//! - where `required` still has a segment, the two match when equal or when
//!   either side is `*`;
//! - past the end of `required`, the candidate only survives when the last
//!   segment of `required` is `*` (deep absorption), or when the candidate's
//!   own remaining segment is a trailing `*`.
//!
//! A candidate shorter than `required` matches on its prefix, so a grant of
//! `admin.users` covers `admin.users.view`.

/// Return every candidate that satisfies `required`, in input order.
pub fn glob_match<'a, S: AsRef<str>>(required: &str, candidates: &'a [S]) -> Vec<&'a str> {
    candidates
        .iter()
        .map(|candidate| candidate.as_ref())
        .filter(|candidate| candidate_matches(required, candidate))
        .collect()
}

/// Shorthand for `!glob_match(required, candidates).is_empty()`.
pub fn glob_matches<S: AsRef<str>>(required: &str, candidates: &[S]) -> bool {
    candidates
        .iter()
        .any(|candidate| candidate_matches(required, candidate.as_ref()))
}

fn candidate_matches(required: &str, candidate: &str) -> bool {
    let required: Vec<&str> = required.split('.').collect();
    let deep = required.last() == Some(&"*");
    let segments: Vec<&str> = candidate.split('.').collect();

    segments.iter().enumerate().all(|(i, segment)| match required.get(i) {
        Some(wanted) => wanted == segment || *wanted == "*" || *segment == "*",
        None => deep || (*segment == "*" && i + 1 == segments.len()),
    })
}
