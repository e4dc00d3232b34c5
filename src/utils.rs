use std::collections::BTreeSet;

/// Splits a comma separated list into trimmed, non-empty tokens.
pub fn split_csv(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|token| !token.is_empty())
}

/// True when any token of `csv` is contained in `candidates`.
pub fn csv_intersects<S: AsRef<str>>(csv: &str, candidates: &[S]) -> bool {
    split_csv(csv).any(|token| candidates.iter().any(|c| c.as_ref().trim() == token))
}

/// True when the two comma separated lists share at least one token.
pub fn csv_overlaps(left: &str, right: &str) -> bool {
    let right: BTreeSet<&str> = split_csv(right).collect();
    split_csv(left).any(|token| right.contains(token))
}
