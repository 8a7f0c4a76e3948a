use std::collections::HashSet;
use std::ops::RangeInclusive;

use crate::markers::is_pinned;

/// Private-use range placeholders are drawn from.
const POOL: RangeInclusive<u32> = 0xE000..=0xF8FF;
/// Used for every drawn position once the pool has nothing left to offer.
const FALLBACK: char = '\u{10FFFD}';

/// Builds a placeholder with exactly as many characters as `observed`.
///
/// Whitespace, control characters and direction marks are copied at their original positions;
/// every other position gets a private-use character that occurs in neither `observed` nor
/// `desired`. Drawn characters are distinct until the pool wraps around.
pub fn make_token(observed: &str, desired: &str) -> String {
    let forbidden: HashSet<char> = observed.chars().chain(desired.chars()).collect();
    let pool: Vec<char> = POOL
        .filter_map(char::from_u32)
        .filter(|c| !forbidden.contains(c))
        .collect();

    let mut out = String::with_capacity(observed.len());
    let mut next = 0usize;
    for ch in observed.chars() {
        if is_pinned(ch) {
            out.push(ch);
            continue;
        }
        let drawn = if pool.is_empty() {
            FALLBACK
        } else {
            pool[next % pool.len()]
        };
        next += 1;
        out.push(drawn);
    }
    out
}
