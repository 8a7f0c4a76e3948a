use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::markers::is_terminator;
use crate::style::StyleKey;

/// Character storage of one story in the fixed-length family.
///
/// Offsets are in characters. Every edit goes through `replace_first`, which keeps the run table
/// consistent; offsets before the edited region never move.
pub trait OffsetText {
    fn char_len(&self) -> usize;

    fn slice(&self, range: Range<usize>) -> String;

    /// Replaces the first occurrence of `old` lying entirely inside `within`.
    /// Returns `false` when there is none.
    fn replace_first(&mut self, within: Range<usize>, old: &str, new: &str) -> bool;

    /// Character ranges of the runs, in order, covering the story.
    fn run_ranges(&self) -> Vec<Range<usize>>;

    fn run_style(&self, index: usize) -> Option<StyleKey>;

    /// Paragraph ranges: each ends just after a record terminator; the last may have none.
    fn paragraph_ranges(&self) -> Vec<Range<usize>> {
        let text = self.slice(0..self.char_len());
        let mut out = Vec::new();
        let mut start = 0usize;
        for (i, ch) in text.chars().enumerate() {
            if is_terminator(ch) {
                out.push(start..i + 1);
                start = i + 1;
            }
        }
        if start < self.char_len() {
            out.push(start..self.char_len());
        }
        out
    }
}

/// In-memory story: a character vector plus the end offset of every run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CharStory {
    chars: Vec<char>,
    run_ends: Vec<usize>,
    styles: Vec<StyleKey>,
}

impl CharStory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_run(mut self, text: &str, style: StyleKey) -> Self {
        self.push_run(text, style);
        self
    }

    pub fn push_run(&mut self, text: &str, style: StyleKey) {
        self.chars.extend(text.chars());
        self.run_ends.push(self.chars.len());
        self.styles.push(style);
    }

    pub fn text(&self) -> String {
        self.chars.iter().collect()
    }

    pub fn run_texts(&self) -> Vec<String> {
        self.run_ranges()
            .into_iter()
            .map(|r| self.chars[r].iter().collect())
            .collect()
    }
}

impl OffsetText for CharStory {
    fn char_len(&self) -> usize {
        self.chars.len()
    }

    fn slice(&self, range: Range<usize>) -> String {
        let end = range.end.min(self.chars.len());
        let start = range.start.min(end);
        self.chars[start..end].iter().collect()
    }

    fn replace_first(&mut self, within: Range<usize>, old: &str, new: &str) -> bool {
        let old: Vec<char> = old.chars().collect();
        let new: Vec<char> = new.chars().collect();
        let end = within.end.min(self.chars.len());
        if old.is_empty() || within.start >= end || end - within.start < old.len() {
            return false;
        }
        let Some(pos) = (within.start..=end - old.len())
            .find(|&p| self.chars[p..p + old.len()] == old[..])
        else {
            return false;
        };

        let old_end = pos + old.len();
        self.chars.splice(pos..old_end, new.iter().copied());
        for run_end in self.run_ends.iter_mut() {
            if *run_end >= old_end {
                *run_end = *run_end - old.len() + new.len();
            } else if *run_end > pos {
                *run_end = (*run_end).min(pos + new.len());
            }
        }
        true
    }

    fn run_ranges(&self) -> Vec<Range<usize>> {
        let mut start = 0usize;
        self.run_ends
            .iter()
            .map(|&end| {
                let r = start..end.max(start);
                start = end.max(start);
                r
            })
            .collect()
    }

    fn run_style(&self, index: usize) -> Option<StyleKey> {
        self.styles.get(index).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn story(runs: &[&str]) -> CharStory {
        runs.iter()
            .fold(CharStory::new(), |s, r| s.with_run(r, StyleKey::default()))
    }

    #[test]
    fn replace_shifts_following_runs_only() {
        let mut s = story(&["ab", "cd\r", "ef"]);
        assert!(s.replace_first(2..5, "cd", "wxyz"));
        assert_eq!(s.run_texts(), vec!["ab", "wxyz\r", "ef"]);
        assert!(s.replace_first(2..7, "wxyz", "q"));
        assert_eq!(s.run_texts(), vec!["ab", "q\r", "ef"]);
        assert!(!s.replace_first(0..2, "q", "z"));
    }

    #[test]
    fn paragraphs_follow_terminators() {
        let s = story(&["one\r", "cell\u{7}", "tail"]);
        assert_eq!(s.paragraph_ranges(), vec![0..4, 4..9, 9..13]);
        let s = story(&["x\r"]);
        assert_eq!(s.paragraph_ranges(), vec![0..2]);
    }
}
