//! Fuzzy country-name matching
//!
//! Used by the shell when a typed name is not an exact stored country.

use strsim::jaro_winkler;

/// Minimum Jaro-Winkler similarity for a typo to count as a match
const SIMILARITY_THRESHOLD: f64 = 0.85;

/// Finds the known country name closest to `query`
///
/// Tries, in order: a case-insensitive exact match, a unique case-insensitive
/// prefix match, a unique case-insensitive substring match, and finally the
/// most similar name by Jaro-Winkler similarity if it clears the threshold.
pub fn fuzzy_match<'a>(query: &str, candidates: &'a [String]) -> Option<&'a str> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return None;
    }

    let lowered: Vec<(String, &'a str)> = candidates
        .iter()
        .map(|name| (name.to_lowercase(), name.as_str()))
        .collect();

    if let Some((_, name)) = lowered.iter().find(|(lower, _)| *lower == query) {
        return Some(name);
    }

    if let Some(name) = unique(lowered.iter().filter(|(lower, _)| lower.starts_with(&query))) {
        return Some(name);
    }

    if let Some(name) = unique(lowered.iter().filter(|(lower, _)| lower.contains(&query))) {
        return Some(name);
    }

    lowered
        .iter()
        .map(|(lower, name)| (jaro_winkler(&query, lower), *name))
        .filter(|(score, _)| *score >= SIMILARITY_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, name)| name)
}

/// The only name yielded by `matches`, if there is exactly one
fn unique<'a, 'b, I>(mut matches: I) -> Option<&'a str>
where
    'a: 'b,
    I: Iterator<Item = &'b (String, &'a str)>,
{
    let (_, first) = matches.next()?;
    match matches.next() {
        None => Some(*first),
        Some(_) => None,
    }
}
