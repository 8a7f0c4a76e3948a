use serde::{Deserialize, Serialize};

use crate::ir::Segment;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VertAlign {
    Superscript,
    Subscript,
}

/// Formatting fingerprint deciding whether two adjacent fragments may share a segment.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StyleKey {
    pub font: Option<String>,
    /// Size in half-points.
    pub size: Option<u32>,
    pub bold: bool,
    pub italic: bool,
    pub strike: bool,
    pub underline: Option<String>,
    /// Uppercase RGB hex, or `AUTO` when the policy keeps `auto` distinct from unset.
    pub color: Option<String>,
    pub vert_align: Option<VertAlign>,
    pub hyperlink: bool,
    pub field: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StylePolicy {
    pub auto_color_is_unset: bool,
}

impl Default for StylePolicy {
    fn default() -> Self {
        Self {
            auto_color_is_unset: true,
        }
    }
}

pub fn normalize_color(raw: Option<&str>, policy: &StylePolicy) -> Option<String> {
    let v = raw?.trim().trim_start_matches('#');
    if v.is_empty() {
        return None;
    }
    if v.eq_ignore_ascii_case("auto") {
        return if policy.auto_color_is_unset {
            None
        } else {
            Some("AUTO".to_string())
        };
    }
    Some(v.to_ascii_uppercase())
}

/// Parses a half-point size, rounding fractional values half-up.
pub fn normalize_half_points(raw: Option<&str>) -> Option<u32> {
    let v: f64 = raw?.trim().parse().ok()?;
    if !v.is_finite() || v <= 0.0 {
        return None;
    }
    Some((v + 0.5).floor() as u32)
}

pub fn normalize_underline(raw: Option<&str>) -> Option<String> {
    let v = raw?.trim();
    if v.is_empty() || v.eq_ignore_ascii_case("none") {
        return None;
    }
    Some(v.to_string())
}

/// Structural state that forces a segment break when it changes, whatever the style says.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Boundary {
    /// Ordinal of the enclosing hyperlink within the block.
    pub hyperlink: Option<usize>,
    /// Ordinal of the outermost enclosing field within the block.
    pub field: Option<usize>,
    /// The fragment carries anchors and must keep its own position.
    pub anchored: bool,
}

#[derive(Clone, Debug, Default)]
pub struct FragmentInfo {
    pub style: StyleKey,
    pub text: String,
    pub boundary: Boundary,
}

fn crosses_hard_boundary(prev: &Boundary, cur: &Boundary) -> bool {
    prev.anchored || cur.anchored || prev.hyperlink != cur.hyperlink || prev.field != cur.field
}

/// Splits the fragments of one block into maximal style-consistent segments.
pub fn segment_block(block: usize, fragments: &[FragmentInfo]) -> Vec<Segment> {
    let mut out: Vec<Segment> = Vec::new();
    let Some(first) = fragments.first() else {
        return out;
    };
    let mut current = Segment {
        block,
        first: 0,
        end: 1,
        style: first.style.clone(),
        text: first.text.clone(),
    };
    for (i, pair) in fragments.windows(2).enumerate() {
        let (prev, frag) = (&pair[0], &pair[1]);
        if crosses_hard_boundary(&prev.boundary, &frag.boundary) || frag.style != current.style {
            let next = Segment {
                block,
                first: i + 1,
                end: i + 2,
                style: frag.style.clone(),
                text: frag.text.clone(),
            };
            out.push(std::mem::replace(&mut current, next));
        } else {
            current.end = i + 2;
            current.text.push_str(&frag.text);
        }
    }
    out.push(current);
    out
}
