use std::path::Path;

use crate::error::RetextError;
use crate::legacy::LegacyKind;
use crate::ooxml::OoxmlKind;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const CFB_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Family {
    Xml,
    Legacy,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Content {
    WordProcessing,
    Spreadsheet,
    Presentation,
}

/// One of the six recognized inputs: a content type in one of the two families.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileKind {
    pub content: Content,
    pub family: Family,
}

impl FileKind {
    pub fn from_file_name(file_name: &str) -> anyhow::Result<Self> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        let (content, family) = match ext.as_str() {
            "docx" | "docm" | "dotx" => (Content::WordProcessing, Family::Xml),
            "doc" | "dot" => (Content::WordProcessing, Family::Legacy),
            "xlsx" | "xlsm" => (Content::Spreadsheet, Family::Xml),
            "xls" => (Content::Spreadsheet, Family::Legacy),
            "pptx" | "pptm" => (Content::Presentation, Family::Xml),
            "ppt" | "pps" => (Content::Presentation, Family::Legacy),
            _ => {
                return Err(RetextError::UnsupportedFormat {
                    file: file_name.to_string(),
                }
                .into())
            }
        };
        Ok(Self { content, family })
    }

    /// The same content type in the other family.
    pub fn alternate(self) -> Self {
        Self {
            content: self.content,
            family: match self.family {
                Family::Xml => Family::Legacy,
                Family::Legacy => Family::Xml,
            },
        }
    }

    pub fn ooxml_kind(self) -> OoxmlKind {
        match self.content {
            Content::WordProcessing => OoxmlKind::Word,
            Content::Spreadsheet => OoxmlKind::Spreadsheet,
            Content::Presentation => OoxmlKind::Presentation,
        }
    }

    pub fn legacy_kind(self) -> LegacyKind {
        match self.content {
            Content::WordProcessing => LegacyKind::Document,
            Content::Spreadsheet => LegacyKind::Workbook,
            Content::Presentation => LegacyKind::Presentation,
        }
    }
}

/// Family named by the byte signature, if any.
pub fn sniff_family(bytes: &[u8]) -> Option<Family> {
    if bytes.starts_with(ZIP_MAGIC) {
        Some(Family::Xml)
    } else if bytes.starts_with(CFB_MAGIC) {
        Some(Family::Legacy)
    } else {
        None
    }
}

/// The declared kind, switched to the other family when the signature contradicts it.
pub fn effective_kind(declared: FileKind, bytes: &[u8]) -> FileKind {
    match sniff_family(bytes) {
        Some(family) if family != declared.family => {
            log::warn!(
                "{:?} input carries a {family:?} signature; using the {family:?} codec",
                declared.family
            );
            declared.alternate()
        }
        _ => declared,
    }
}
