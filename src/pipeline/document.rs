use anyhow::Context;

use crate::config::AppConfig;
use crate::error::RetextError;
use crate::ir::{RestoreReport, TextUnit};
use crate::legacy::{LegacyCodec, LegacyDocument, LegacyKind};
use crate::ooxml::OoxmlDocument;

use super::dispatch::{effective_kind, Family, FileKind};

/// A decoded input of either family.
pub enum LoadedDocument {
    Xml(OoxmlDocument),
    Legacy {
        kind: LegacyKind,
        doc: LegacyDocument,
    },
}

impl LoadedDocument {
    /// Decodes `bytes`, trusting the byte signature over the extension and falling back once to
    /// the other family when the first codec refuses the input.
    pub fn decode(
        file_name: &str,
        bytes: &[u8],
        codec: Option<&dyn LegacyCodec>,
    ) -> anyhow::Result<(Self, FileKind)> {
        let declared = FileKind::from_file_name(file_name)?;
        let first = effective_kind(declared, bytes);
        match Self::decode_as(first, file_name, bytes, codec) {
            Ok(doc) => Ok((doc, first)),
            Err(first_err) => {
                if matches!(
                    first_err.downcast_ref::<RetextError>(),
                    Some(RetextError::CodecUnavailable { .. })
                ) && first.family == declared.family
                {
                    return Err(first_err);
                }
                let second = first.alternate();
                log::warn!("{file_name}: {first_err:#}; retrying as {:?}", second.family);
                let doc = Self::decode_as(second, file_name, bytes, codec)
                    .with_context(|| format!("decode {file_name} (after: {first_err:#})"))?;
                Ok((doc, second))
            }
        }
    }

    fn decode_as(
        kind: FileKind,
        file_name: &str,
        bytes: &[u8],
        codec: Option<&dyn LegacyCodec>,
    ) -> anyhow::Result<Self> {
        match kind.family {
            Family::Xml => Ok(LoadedDocument::Xml(
                OoxmlDocument::from_bytes(kind.ooxml_kind(), bytes)
                    .with_context(|| format!("decode package: {file_name}"))?,
            )),
            Family::Legacy => {
                let legacy_kind = kind.legacy_kind();
                let codec = codec.ok_or_else(|| RetextError::CodecUnavailable {
                    kind: format!("{legacy_kind:?}").to_lowercase(),
                    file: file_name.to_string(),
                })?;
                let doc = codec
                    .decode(legacy_kind, bytes)
                    .with_context(|| format!("decode legacy file: {file_name}"))?;
                Ok(LoadedDocument::Legacy {
                    kind: legacy_kind,
                    doc,
                })
            }
        }
    }

    pub fn extract(&self, cfg: &AppConfig) -> Vec<TextUnit> {
        match self {
            LoadedDocument::Xml(doc) => doc.extract(&cfg.style_policy()),
            LoadedDocument::Legacy { doc, .. } => doc.extract(),
        }
    }

    pub fn restore(
        &mut self,
        units: &[TextUnit],
        texts: &[String],
        cfg: &AppConfig,
    ) -> anyhow::Result<RestoreReport> {
        match self {
            LoadedDocument::Xml(doc) => doc.restore(units, texts, &cfg.style_policy()),
            LoadedDocument::Legacy { doc, .. } => doc.restore(units, texts, &cfg.restore),
        }
    }

    pub fn encode(&self, codec: Option<&dyn LegacyCodec>) -> anyhow::Result<Vec<u8>> {
        match self {
            LoadedDocument::Xml(doc) => doc.to_bytes(),
            LoadedDocument::Legacy { kind, doc } => {
                let codec = codec.ok_or_else(|| RetextError::CodecUnavailable {
                    kind: format!("{kind:?}").to_lowercase(),
                    file: String::new(),
                })?;
                codec.encode(*kind, doc)
            }
        }
    }
}
