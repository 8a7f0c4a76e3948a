use once_cell::sync::Lazy;
use regex::Regex;

/// Separates blocks inside one aggregated unit. Distinct from a line break.
pub const BLOCK_SEPARATOR: char = '\u{2029}';
pub const LINE_BREAK: char = '\n';
pub const TAB: char = '\t';

/// Record terminators of the fixed-layout family: paragraph mark, cell mark, page/section break.
pub const TERMINATORS: [char; 3] = ['\r', '\u{7}', '\u{c}'];

static ANY_BREAK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new("\r\n|[\n\r\u{0B}\u{85}\u{2028}\u{2029}]").expect("break regex"));

pub fn is_terminator(ch: char) -> bool {
    TERMINATORS.contains(&ch)
}

pub fn is_direction_mark(ch: char) -> bool {
    matches!(
        ch,
        '\u{061C}' | '\u{200E}' | '\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2066}'..='\u{2069}'
    )
}

/// Characters a placeholder must copy through at their original position.
pub fn is_pinned(ch: char) -> bool {
    ch.is_whitespace() || ch.is_control() || is_direction_mark(ch)
}

pub fn split_blocks(text: &str) -> Vec<&str> {
    text.split(BLOCK_SEPARATOR).collect()
}

/// Splits on every recognized line or paragraph break code point.
pub fn split_any_break(text: &str) -> Vec<&str> {
    ANY_BREAK_RE.split(text).collect()
}

/// Block separators become line breaks; used where block structure is not load-bearing.
pub fn flatten_blocks(text: &str) -> String {
    text.replace(BLOCK_SEPARATOR, "\n")
}

/// Returns `(body, trailing_terminators)`.
pub fn split_trailing_terminators(text: &str) -> (&str, &str) {
    let body = text.trim_end_matches(is_terminator);
    (body, &text[body.len()..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_every_break_kind() {
        assert_eq!(
            split_any_break("a\r\nb\u{2028}c\u{2029}d\re"),
            vec!["a", "b", "c", "d", "e"]
        );
        assert_eq!(split_any_break(""), vec![""]);
    }

    #[test]
    fn trailing_terminators() {
        assert_eq!(split_trailing_terminators("Hi\r"), ("Hi", "\r"));
        assert_eq!(split_trailing_terminators("cell\u{7}\r"), ("cell", "\u{7}\r"));
        assert_eq!(split_trailing_terminators("plain"), ("plain", ""));
    }

    #[test]
    fn pinned_characters() {
        assert!(is_pinned(' '));
        assert!(is_pinned('\t'));
        assert!(is_pinned('\u{200F}'));
        assert!(!is_pinned('a'));
    }
}
