use serde::{Deserialize, Serialize};

use crate::style::StyleKey;

/// One hop of a container path inside a part.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// A note or comment story (`w:footnote`, `w:endnote`, `w:comment`) by ordinal in its part.
    Story(usize),
    /// A grid cell; `table` counts grids per enclosing container in document order.
    Cell { table: usize, row: usize, cell: usize },
}

/// Positional address of a text unit.
///
/// Addresses are counters re-derived by a depth-first walk. They are only valid against a tree
/// that is structurally equivalent to the one they were computed from.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "at", rename_all = "snake_case")]
pub enum Address {
    Segment {
        part: String,
        container: Vec<Step>,
        block: usize,
        first: usize,
        count: usize,
    },
    Control {
        part: String,
        controls: Vec<usize>,
    },
    Floating {
        part: String,
        controls: Vec<usize>,
        frames: Vec<usize>,
        ordinal: usize,
    },
    Leaf {
        part: String,
        ordinal: usize,
    },
    Legacy {
        story: usize,
        paragraph: usize,
        run: usize,
    },
}

impl Address {
    pub fn part(&self) -> Option<&str> {
        match self {
            Address::Segment { part, .. }
            | Address::Control { part, .. }
            | Address::Floating { part, .. }
            | Address::Leaf { part, .. } => Some(part.as_str()),
            Address::Legacy { .. } => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    Fragment,
    GridCell,
    FloatingText,
    ContentControl,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextUnit {
    pub address: Address,
    pub text: String,
    pub kind: ContainerKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<StyleKey>,
}

/// A maximal run of adjacent fragments of one block sharing a style key.
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    pub block: usize,
    pub first: usize,
    pub end: usize,
    pub style: StyleKey,
    pub text: String,
}

impl Segment {
    pub fn len(&self) -> usize {
        self.end - self.first
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.first
    }
}

/// Outcome of writing replacements back into a document.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreReport {
    pub applied: usize,
    pub skipped: usize,
}

impl RestoreReport {
    pub fn merge(&mut self, other: RestoreReport) {
        self.applied += other.applied;
        self.skipped += other.skipped;
    }
}
