mod api;

use tasty_regex::Regex;

/// Returns the bounds of every match, in the order they were reported.
fn spans(re: &Regex, haystack: &[u8]) -> anyhow::Result<Vec<(usize, usize)>> {
    Ok(re.run(haystack)?.iter().map(|m| (m.start(), m.end())).collect())
}
