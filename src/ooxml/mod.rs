//! The XML-container family: ZIP package, lossless XML trees, and the word-processing
//! segmentation engine plus the whole-field loops for spreadsheets and presentations.

pub mod address;
pub mod extract;
pub mod package;
pub mod restore;
pub mod simple;
pub mod wordml;
pub mod xml;

use std::collections::HashMap;

use anyhow::Context;

use crate::ir::{RestoreReport, TextUnit};
use crate::style::StylePolicy;

use self::package::OfficePackage;
use self::simple::Flavor;
use self::xml::{parse_xml_tree, write_xml_tree, XmlTree};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OoxmlKind {
    Word,
    Spreadsheet,
    Presentation,
}

impl OoxmlKind {
    pub fn handles(self, part: &str) -> bool {
        match self {
            OoxmlKind::Word => is_word_story_part(part),
            OoxmlKind::Spreadsheet => Flavor::Spreadsheet.handles(part),
            OoxmlKind::Presentation => Flavor::Presentation.handles(part),
        }
    }
}

/// Parts of a word-processing package that carry stories.
pub fn is_word_story_part(part: &str) -> bool {
    let part = part.to_ascii_lowercase();
    let numbered = |prefix: &str| {
        part.strip_prefix(prefix)
            .and_then(|rest| rest.strip_suffix(".xml"))
            .is_some_and(|n| n.chars().all(|c| c.is_ascii_digit()))
    };
    matches!(
        part.as_str(),
        "word/document.xml" | "word/footnotes.xml" | "word/endnotes.xml" | "word/comments.xml"
    ) || numbered("word/header")
        || numbered("word/footer")
}

/// A decoded XML-family document: the package plus the parsed trees of its text parts.
pub struct OoxmlDocument {
    pub kind: OoxmlKind,
    package: OfficePackage,
    parts: Vec<XmlTree>,
}

impl OoxmlDocument {
    pub fn from_bytes(kind: OoxmlKind, bytes: &[u8]) -> anyhow::Result<Self> {
        let package = OfficePackage::from_bytes(bytes)?;
        let mut parts = Vec::new();
        for entry in package.xml_entries() {
            if !kind.handles(&entry.name) {
                continue;
            }
            let tree = parse_xml_tree(&entry.name, &entry.data)
                .with_context(|| format!("parse part: {}", entry.name))?;
            parts.push(tree);
        }
        if kind == OoxmlKind::Word && !parts.iter().any(|p| p.name == "word/document.xml") {
            anyhow::bail!("package has no word/document.xml");
        }
        Ok(Self {
            kind,
            package,
            parts,
        })
    }

    pub fn part_names(&self) -> Vec<&str> {
        self.parts.iter().map(|p| p.name.as_str()).collect()
    }

    /// Text units of every part, parts in package order.
    pub fn extract(&self, policy: &StylePolicy) -> Vec<TextUnit> {
        let mut units = Vec::new();
        for tree in &self.parts {
            let part_units = match self.kind {
                OoxmlKind::Word => extract::extract_part(tree, policy),
                OoxmlKind::Spreadsheet => simple::extract_leaves(tree, Flavor::Spreadsheet),
                OoxmlKind::Presentation => simple::extract_leaves(tree, Flavor::Presentation),
            };
            log::debug!("{}: {} unit(s)", tree.name, part_units.len());
            units.extend(part_units);
        }
        units
    }

    /// Writes `texts[i]` back to the location of `units[i]`.
    pub fn restore(
        &mut self,
        units: &[TextUnit],
        texts: &[String],
        policy: &StylePolicy,
    ) -> anyhow::Result<RestoreReport> {
        if units.len() != texts.len() {
            anyhow::bail!(
                "replacement count mismatch: {} unit(s), {} text(s)",
                units.len(),
                texts.len()
            );
        }
        let mut by_part: HashMap<&str, Vec<(&TextUnit, &str)>> = HashMap::new();
        let mut report = RestoreReport::default();
        for (unit, text) in units.iter().zip(texts.iter()) {
            match unit.address.part() {
                Some(part) => by_part
                    .entry(part)
                    .or_default()
                    .push((unit, text.as_str())),
                None => {
                    log::warn!("skip {:?}: not an XML-family address", unit.address);
                    report.skipped += 1;
                }
            }
        }
        for tree in &mut self.parts {
            let Some(pairs) = by_part.remove(tree.name.as_str()) else {
                continue;
            };
            let part_report = match self.kind {
                OoxmlKind::Word => restore::restore_part(tree, &pairs, policy),
                OoxmlKind::Spreadsheet => {
                    simple::restore_leaves(tree, Flavor::Spreadsheet, &pairs)
                }
                OoxmlKind::Presentation => {
                    simple::restore_leaves(tree, Flavor::Presentation, &pairs)
                }
            };
            report.merge(part_report);
        }
        for (part, pairs) in by_part {
            log::warn!("skip {} unit(s): part {part} not in document", pairs.len());
            report.skipped += pairs.len();
        }
        Ok(report)
    }

    /// Serializes every part first; bytes are only produced when all of them succeeded.
    pub fn to_bytes(&self) -> anyhow::Result<Vec<u8>> {
        let mut replacements: HashMap<String, Vec<u8>> = HashMap::new();
        for tree in &self.parts {
            let bytes =
                write_xml_tree(tree).with_context(|| format!("write part: {}", tree.name))?;
            replacements.insert(tree.name.clone(), bytes);
        }
        self.package.to_bytes_with_replacements(&replacements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::package::build_package;

    const DOCUMENT: &str = concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        r#"<w:document xmlns:w="urn:w"><w:body>"#,
        r#"<w:p><w:r><w:t xml:space="preserve">Hello </w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>World</w:t></w:r></w:p>"#,
        r#"</w:body></w:document>"#
    );
    const HEADER: &str =
        r#"<w:hdr xmlns:w="urn:w"><w:p><w:r><w:t>Page head</w:t></w:r></w:p></w:hdr>"#;

    #[test]
    fn word_part_selection() {
        assert!(is_word_story_part("word/document.xml"));
        assert!(is_word_story_part("word/header2.xml"));
        assert!(is_word_story_part("word/footnotes.xml"));
        assert!(!is_word_story_part("word/styles.xml"));
        assert!(!is_word_story_part("word/_rels/header2.xml.rels"));
    }

    #[test]
    fn package_round_trip_translates_all_story_parts() {
        let bytes = build_package(&[
            ("[Content_Types].xml", b"<Types/>"),
            ("word/document.xml", DOCUMENT.as_bytes()),
            ("word/header1.xml", HEADER.as_bytes()),
            ("word/styles.xml", b"<w:styles xmlns:w=\"urn:w\"/>"),
        ])
        .expect("zip");
        let mut doc = OoxmlDocument::from_bytes(OoxmlKind::Word, &bytes).expect("decode");
        assert_eq!(doc.part_names(), vec!["word/document.xml", "word/header1.xml"]);

        let policy = StylePolicy::default();
        let units = doc.extract(&policy);
        let texts: Vec<String> = units.iter().map(|u| u.text.to_uppercase()).collect();
        let report = doc.restore(&units, &texts, &policy).expect("restore");
        assert_eq!(report, RestoreReport { applied: 3, skipped: 0 });

        let out = doc.to_bytes().expect("encode");
        let again = OoxmlDocument::from_bytes(OoxmlKind::Word, &out).expect("redecode");
        let got: Vec<String> = again.extract(&policy).into_iter().map(|u| u.text).collect();
        assert_eq!(got, vec!["HELLO ", "WORLD", "PAGE HEAD"]);

        let pkg = OfficePackage::from_bytes(&out).expect("zip");
        assert_eq!(
            pkg.entry("word/styles.xml").map(|e| e.data.as_slice()),
            Some(&b"<w:styles xmlns:w=\"urn:w\"/>"[..])
        );
    }

    #[test]
    fn missing_main_part_is_an_error() {
        let bytes = build_package(&[("word/header1.xml", HEADER.as_bytes())]).expect("zip");
        assert!(OoxmlDocument::from_bytes(OoxmlKind::Word, &bytes).is_err());
    }
}
