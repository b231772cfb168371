//! Approximate string scoring for catalog lookups.
//!
//! `partial_ratio` returns a normalized 0-100 score: the best Levenshtein
//! similarity between the shorter string and any equally long window of
//! the longer one. Scores at or above the configured threshold count as a
//! match; everything below is dropped, not demoted.

/// Best-window partial match score between two strings, 0-100.
/// Case-insensitive. Empty input scores 0.
pub fn partial_ratio(query: &str, candidate: &str) -> u8 {
    let query: Vec<char> = query.to_lowercase().chars().collect();
    let candidate: Vec<char> = candidate.to_lowercase().chars().collect();
    if query.is_empty() || candidate.is_empty() {
        return 0;
    }

    let (short, long) =
        if query.len() <= candidate.len() { (&query, &candidate) } else { (&candidate, &query) };

    let mut best = 0u8;
    for start in 0..=(long.len() - short.len()) {
        let window = &long[start..start + short.len()];
        let distance = levenshtein(short, window).min(short.len());
        let score = ((short.len() - distance) * 100 / short.len()) as u8;
        if score > best {
            best = score;
        }
        if best == 100 {
            break;
        }
    }
    best
}

fn levenshtein(a: &[char], b: &[char]) -> usize {
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];

    for (i, a_char) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, b_char) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(a_char != b_char);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}
