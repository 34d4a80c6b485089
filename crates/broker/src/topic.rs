//! Topic-exchange binding key matching.
//!
//! Keys are `.`-separated words. In a binding pattern `*` matches exactly one
//! word and `#` matches zero or more words.

/// Returns true if `routing_key` is selected by the binding `pattern`.
pub fn matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    words_match(&pattern, &key)
}

fn words_match(pattern: &[&str], key: &[&str]) -> bool {
    match (pattern, key) {
        ([], []) => true,
        (["#", rest @ ..], _) => {
            words_match(rest, key) || (!key.is_empty() && words_match(pattern, &key[1..]))
        }
        (["*", p_rest @ ..], [_, k_rest @ ..]) => words_match(p_rest, k_rest),
        ([p, p_rest @ ..], [k, k_rest @ ..]) if p == k => words_match(p_rest, k_rest),
        _ => false,
    }
}
