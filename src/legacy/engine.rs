//! Extraction and token-swap restoration for stories with fixed character offsets.

use std::ops::Range;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::ir::{Address, ContainerKind, RestoreReport, TextUnit};
use crate::markers::split_trailing_terminators;
use crate::token::make_token;

use super::story::OffsetText;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthMode {
    /// Write translations of any length.
    Grow,
    /// Cut over-long translations at the growth limit.
    #[default]
    Truncate,
    /// Keep the original text of an over-long unit.
    Reject,
}

/// How a translation may change the length of a fixed-offset run.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LengthPolicy {
    pub length_policy: LengthMode,
    pub max_growth_ratio: f64,
    pub min_growth_slack: usize,
    pub pad_shorter: bool,
}

impl Default for LengthPolicy {
    fn default() -> Self {
        Self {
            length_policy: LengthMode::Truncate,
            max_growth_ratio: 3.0,
            min_growth_slack: 16,
            pad_shorter: true,
        }
    }
}

impl LengthPolicy {
    /// Longest translation accepted for an original of `len` characters.
    pub fn limit(&self, len: usize) -> usize {
        let scaled = (len as f64 * self.max_growth_ratio.max(1.0)).floor() as usize;
        scaled.max(len + self.min_growth_slack)
    }

    /// The text to store for `original`, or `None` when the translation is rejected.
    pub fn fit(&self, original: &str, translated: &str) -> Option<String> {
        let len = original.chars().count();
        let got = translated.chars().count();
        let mut out = if got > self.limit(len) {
            match self.length_policy {
                LengthMode::Grow => translated.to_string(),
                LengthMode::Truncate => translated.chars().take(self.limit(len)).collect(),
                LengthMode::Reject => return None,
            }
        } else {
            translated.to_string()
        };
        if self.pad_shorter && got < len {
            out.extend(std::iter::repeat(' ').take(len - got));
        }
        Some(out)
    }
}

/// One addressable run: `(paragraph, run within paragraph, story run index, range)`.
struct RunSlot {
    paragraph: usize,
    run: usize,
    index: usize,
    range: Range<usize>,
}

fn run_slots<S: OffsetText>(story: &S) -> Vec<RunSlot> {
    let paragraphs = story.paragraph_ranges();
    let mut slots = Vec::new();
    let mut paragraph = 0usize;
    let mut in_paragraph = 0usize;
    for (index, range) in story.run_ranges().into_iter().enumerate() {
        if range.is_empty() {
            continue;
        }
        while paragraphs
            .get(paragraph)
            .is_some_and(|p| range.start >= p.end)
        {
            paragraph += 1;
            in_paragraph = 0;
        }
        slots.push(RunSlot {
            paragraph,
            run: in_paragraph,
            index,
            range,
        });
        in_paragraph += 1;
    }
    slots
}

fn paragraph_is_cell<S: OffsetText>(story: &S, paragraph: usize) -> bool {
    story
        .paragraph_ranges()
        .get(paragraph)
        .map(|p| story.slice(p.clone()).ends_with('\u{7}'))
        .unwrap_or(false)
}

/// One unit per run with non-empty text; trailing record terminators stay out of the unit.
pub fn extract_stories<S: OffsetText>(stories: &[S]) -> Vec<TextUnit> {
    let mut units = Vec::new();
    for (story_index, story) in stories.iter().enumerate() {
        for slot in run_slots(story) {
            let live = story.slice(slot.range.clone());
            let (body, _) = split_trailing_terminators(&live);
            if body.is_empty() {
                continue;
            }
            units.push(TextUnit {
                address: Address::Legacy {
                    story: story_index,
                    paragraph: slot.paragraph,
                    run: slot.run,
                },
                text: body.to_string(),
                kind: if paragraph_is_cell(story, slot.paragraph) {
                    ContainerKind::GridCell
                } else {
                    ContainerKind::Fragment
                },
                style: story.run_style(slot.index),
            });
        }
    }
    units
}

fn resolve<S: OffsetText>(story: &S, paragraph: usize, run: usize) -> Option<Range<usize>> {
    run_slots(story)
        .into_iter()
        .find(|s| s.paragraph == paragraph && s.run == run)
        .map(|s| s.range)
}

/// Writes translations back in reverse document order, so every unit still ahead in the pass
/// resolves against offsets no edit has touched.
pub fn restore_stories<S: OffsetText>(
    stories: &mut [S],
    pairs: &[(&TextUnit, &str)],
    policy: &LengthPolicy,
) -> RestoreReport {
    let mut ordered: Vec<(&TextUnit, &str, (usize, usize, usize))> = Vec::new();
    let mut report = RestoreReport::default();
    for (unit, text) in pairs {
        match unit.address {
            Address::Legacy {
                story,
                paragraph,
                run,
            } => ordered.push((*unit, *text, (story, paragraph, run))),
            _ => {
                log::warn!("skip {:?}: not a fixed-length address", unit.address);
                report.skipped += 1;
            }
        }
    }
    ordered.sort_by(|a, b| b.2.cmp(&a.2));

    for (unit, text, (story, paragraph, run)) in ordered {
        let result = stories
            .get_mut(story)
            .context("story out of range")
            .and_then(|s| substitute(s, paragraph, run, &unit.text, text, policy));
        match result {
            Ok(()) => report.applied += 1,
            Err(err) => {
                log::warn!("skip {:?}: {err:#}", unit.address);
                report.skipped += 1;
            }
        }
    }
    report
}

fn substitute<S: OffsetText>(
    story: &mut S,
    paragraph: usize,
    run: usize,
    extracted: &str,
    translated: &str,
    policy: &LengthPolicy,
) -> anyhow::Result<()> {
    let range = resolve(story, paragraph, run).context("run no longer present")?;
    let live = story.slice(range.clone());
    let (body, _) = split_trailing_terminators(&live);
    if body != extracted {
        bail!("run text changed since extraction");
    }
    let Some(desired) = policy.fit(body, translated) else {
        bail!(
            "translation of {} chars exceeds the limit of {}",
            translated.chars().count(),
            policy.limit(body.chars().count())
        );
    };
    if desired == body {
        return Ok(());
    }
    log::debug!("{paragraph}/{run}: {body:?} -> {desired:?}");

    // Same-length placeholder first: nothing after the run moves until the final write.
    let token = make_token(body, &desired);
    if !story.replace_first(range.clone(), body, &token) {
        bail!("run text not found in place");
    }
    if !story.replace_first(range, &token, &desired) {
        bail!("placeholder not found in place");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::legacy::story::CharStory;
    use crate::style::StyleKey;

    fn plain(runs: &[&str]) -> CharStory {
        runs.iter()
            .fold(CharStory::new(), |s, r| s.with_run(r, StyleKey::default()))
    }

    fn grow() -> LengthPolicy {
        LengthPolicy {
            length_policy: LengthMode::Grow,
            pad_shorter: false,
            ..LengthPolicy::default()
        }
    }

    fn run(
        stories: &mut [CharStory],
        f: impl Fn(&str) -> String,
        policy: &LengthPolicy,
    ) -> RestoreReport {
        let units = extract_stories(stories);
        let texts: Vec<String> = units.iter().map(|u| f(&u.text)).collect();
        let pairs: Vec<(&TextUnit, &str)> =
            units.iter().zip(texts.iter()).map(|(u, t)| (u, t.as_str())).collect();
        restore_stories(stories, &pairs, policy)
    }

    #[test]
    fn extraction_excludes_terminators_and_numbers_runs_per_paragraph() {
        let bold = StyleKey {
            bold: true,
            ..StyleKey::default()
        };
        let stories = vec![CharStory::new()
            .with_run("Hey ", StyleKey::default())
            .with_run("Hi\r", bold.clone())
            .with_run("\r", StyleKey::default())
            .with_run("x\u{7}", StyleKey::default())];
        let units = extract_stories(&stories);
        let got: Vec<(&str, Address)> =
            units.iter().map(|u| (u.text.as_str(), u.address.clone())).collect();
        assert_eq!(
            got,
            vec![
                ("Hey ", Address::Legacy { story: 0, paragraph: 0, run: 0 }),
                ("Hi", Address::Legacy { story: 0, paragraph: 0, run: 1 }),
                ("x", Address::Legacy { story: 0, paragraph: 2, run: 0 }),
            ]
        );
        assert_eq!(units[1].style, Some(bold));
        assert_eq!(units[2].kind, ContainerKind::GridCell);
    }

    #[test]
    fn terminator_survives_and_earlier_run_still_resolves() {
        let mut stories = vec![plain(&["Hey ", "Hi\r", "next\r"])];
        let report = run(
            &mut stories,
            |s| match s {
                "Hey " => "Salut ".to_string(),
                "Hi" => "Hello".to_string(),
                other => other.to_string(),
            },
            &grow(),
        );
        assert_eq!(report, RestoreReport { applied: 3, skipped: 0 });
        assert_eq!(stories[0].text(), "Salut Hello\rnext\r");
        assert_eq!(stories[0].run_texts(), vec!["Salut ", "Hello\r", "next\r"]);
    }

    #[test]
    fn stale_run_is_skipped() {
        let mut stories = vec![plain(&["alpha\r"])];
        let units = extract_stories(&stories);
        assert!(stories[0].replace_first(0..5, "alpha", "omega"));
        let report = restore_stories(&mut stories, &[(&units[0], "beta")], &grow());
        assert_eq!(report.skipped, 1);
        assert_eq!(stories[0].text(), "omega\r");
    }

    #[test]
    fn placeholders_never_match_document_text() {
        let mut stories = vec![plain(&["\u{E000}ab\r", "\u{E001}\u{E002}\r"])];
        run(&mut stories, |s| format!("{s}!"), &grow());
        assert_eq!(stories[0].text(), "\u{E000}ab!\r\u{E001}\u{E002}!\r");
    }

    #[test]
    fn length_policies() {
        let truncate = LengthPolicy {
            max_growth_ratio: 2.0,
            min_growth_slack: 1,
            pad_shorter: false,
            ..LengthPolicy::default()
        };
        assert_eq!(truncate.limit(4), 8);
        assert_eq!(truncate.fit("abcd", "123456789").as_deref(), Some("12345678"));
        assert_eq!(truncate.fit("abcd", "12").as_deref(), Some("12"));

        let reject = LengthPolicy {
            length_policy: LengthMode::Reject,
            ..truncate
        };
        assert_eq!(reject.fit("abcd", "123456789"), None);

        let padded = LengthPolicy::default();
        assert_eq!(padded.fit("abcd", "xy").as_deref(), Some("xy  "));
        assert_eq!(grow().fit("ab", &"z".repeat(100)).map(|s| s.len()), Some(100));
    }

    #[test]
    fn rejected_translation_keeps_original() {
        let reject = LengthPolicy {
            length_policy: LengthMode::Reject,
            max_growth_ratio: 1.0,
            min_growth_slack: 0,
            pad_shorter: false,
        };
        let mut stories = vec![plain(&["ok\r", "fine\r"])];
        let report = run(
            &mut stories,
            |s| if s == "ok" { "much longer".into() } else { "good".into() },
            &reject,
        );
        assert_eq!(report, RestoreReport { applied: 1, skipped: 1 });
        assert_eq!(stories[0].text(), "ok\rgood\r");
    }
}
