/// Minimum similarity for a fuzzy registry hit
pub const FUZZY_THRESHOLD: u8 = 70;

/// Levenshtein distance over Unicode scalar values.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    if a_chars.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }

    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a_chars.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_chars.len()]
}

/// Symmetric similarity in 0..=100: edit distance normalised by the longer string.
pub fn similarity_ratio(a: &str, b: &str) -> u8 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 100;
    }
    let distance = levenshtein_distance(a, b);
    let ratio = 100.0 * (1.0 - distance as f64 / longest as f64);
    ratio.round() as u8
}

/// Closest candidate at or above [`FUZZY_THRESHOLD`].
///
/// Ties on the ratio go to the shorter key, then the lexicographically smaller one.
pub fn best_match<'a, I>(query: &str, candidates: I) -> Option<(&'a str, u8)>
where
    I: IntoIterator<Item = &'a str>,
{
    candidates
        .into_iter()
        .map(|candidate| (candidate, similarity_ratio(query, candidate)))
        .min_by(|a, b| {
            b.1.cmp(&a.1)
                .then_with(|| a.0.chars().count().cmp(&b.0.chars().count()))
                .then_with(|| a.0.cmp(b.0))
        })
        .filter(|(_, ratio)| *ratio >= FUZZY_THRESHOLD)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("команды", "команды", 0)]
    #[case("команды", "комнады", 2)]
    #[case("kitten", "sitting", 3)]
    #[case("", "abc", 3)]
    #[case("abc", "", 3)]
    fn distance(#[case] a: &str, #[case] b: &str, #[case] expected: usize) {
        assert_eq!(levenshtein_distance(a, b), expected);
        assert_eq!(levenshtein_distance(b, a), expected);
    }

    #[test]
    fn ratio_is_normalised_by_longer_string() {
        assert_eq!(similarity_ratio("!foo", "!foo"), 100);
        assert_eq!(similarity_ratio("!fo", "!foo"), 75);
        assert_eq!(similarity_ratio("!foo", "!fo"), 75);
        assert_eq!(similarity_ratio("!bar", "!foo"), 25);
        assert_eq!(similarity_ratio("", ""), 100);
    }

    #[test]
    fn best_match_respects_threshold() {
        let keys = ["!команды", "!напомни"];
        assert_eq!(best_match("!командыы", keys), Some(("!команды", 89)));
        assert_eq!(best_match("!погода", keys), None);
    }

    #[test]
    fn higher_ratio_wins_over_order() {
        // "!abcd" is 80, "!abx" is 75
        assert_eq!(best_match("!abc", ["!abx", "!abcd"]).map(|m| m.0), Some("!abcd"));
    }

    #[test]
    fn ties_go_to_the_lexicographically_smaller_key() {
        assert_eq!(best_match("!abc", ["!abz", "!abx"]), Some(("!abx", 75)));
        assert_eq!(best_match("!abc", ["!abx", "!abz"]), Some(("!abx", 75)));
    }
}
