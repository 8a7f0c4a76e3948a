//! The fixed-layout binary family. Its byte codec is pluggable; the crate owns the story model
//! and the offset-preserving substitution engine.

pub mod engine;
pub mod story;

use serde::{Deserialize, Serialize};

use crate::ir::{RestoreReport, TextUnit};

pub use engine::{extract_stories, restore_stories, LengthMode, LengthPolicy};
pub use story::{CharStory, OffsetText};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegacyKind {
    Document,
    Workbook,
    Presentation,
}

/// A decoded legacy file: its stories plus whatever the codec needs to write it back.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyDocument {
    pub stories: Vec<CharStory>,
    /// Opaque to the engine; owned by the codec that produced the document.
    #[serde(default)]
    pub carry: Vec<u8>,
}

impl LegacyDocument {
    pub fn extract(&self) -> Vec<TextUnit> {
        extract_stories(&self.stories)
    }

    pub fn restore(
        &mut self,
        units: &[TextUnit],
        texts: &[String],
        policy: &LengthPolicy,
    ) -> anyhow::Result<RestoreReport> {
        if units.len() != texts.len() {
            anyhow::bail!(
                "replacement count mismatch: {} unit(s), {} text(s)",
                units.len(),
                texts.len()
            );
        }
        let pairs: Vec<(&TextUnit, &str)> = units
            .iter()
            .zip(texts.iter())
            .map(|(u, t)| (u, t.as_str()))
            .collect();
        Ok(restore_stories(&mut self.stories, &pairs, policy))
    }
}

/// Byte codec for the fixed-layout family.
pub trait LegacyCodec {
    fn decode(&self, kind: LegacyKind, bytes: &[u8]) -> anyhow::Result<LegacyDocument>;

    fn encode(&self, kind: LegacyKind, doc: &LegacyDocument) -> anyhow::Result<Vec<u8>>;
}
