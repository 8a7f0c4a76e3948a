use std::path::Path;

use anyhow::Context;

use crate::config::AppConfig;
use crate::ir::{RestoreReport, TextUnit};
use crate::legacy::LegacyCodec;
use crate::progress::ConsoleProgress;

use super::document::LoadedDocument;
use super::dump::UnitsJson;
use super::translate::{BatchTranslator, Translator};

/// Decode, extract, translate, restore, encode.
pub struct Orchestrator {
    cfg: AppConfig,
    progress: ConsoleProgress,
    codec: Option<Box<dyn LegacyCodec>>,
}

impl Orchestrator {
    pub fn new(cfg: AppConfig, progress: ConsoleProgress) -> Self {
        Self {
            cfg,
            progress,
            codec: None,
        }
    }

    pub fn with_legacy_codec(mut self, codec: Box<dyn LegacyCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    fn load(&self, file_name: &str, bytes: &[u8]) -> anyhow::Result<LoadedDocument> {
        let (doc, kind) = LoadedDocument::decode(file_name, bytes, self.codec.as_deref())?;
        self.progress
            .info(format!("Decoded {file_name} as {:?} ({:?})", kind.content, kind.family));
        Ok(doc)
    }

    fn finish(
        &self,
        doc: &mut LoadedDocument,
        units: &[TextUnit],
        texts: &[String],
    ) -> anyhow::Result<(Vec<u8>, RestoreReport)> {
        let report = doc.restore(units, texts, &self.cfg)?;
        self.progress.info(format!(
            "Restored {} unit(s), skipped {}",
            report.applied, report.skipped
        ));
        let bytes = doc.encode(self.codec.as_deref())?;
        Ok((bytes, report))
    }

    /// Translates a document held in memory; `file_name` only supplies the declared kind.
    pub fn translate_bytes(
        &self,
        file_name: &str,
        bytes: &[u8],
        translator: &mut dyn Translator,
    ) -> anyhow::Result<(Vec<u8>, RestoreReport)> {
        let mut doc = self.load(file_name, bytes)?;
        let units = doc.extract(&self.cfg);
        self.progress.info(format!("Extracted {} unit(s)", units.len()));

        let sources: Vec<String> = units.iter().map(|u| u.text.clone()).collect();
        let texts = BatchTranslator::new(
            translator,
            self.cfg.translate.batch_size,
            self.cfg.translate.max_attempts,
        )
        .translate_all(&sources, &self.progress)
        .with_context(|| format!("translate {file_name}"))?;
        self.finish(&mut doc, &units, &texts)
    }

    pub fn translate_file(
        &self,
        input: &Path,
        output: &Path,
        translator: &mut dyn Translator,
    ) -> anyhow::Result<RestoreReport> {
        let bytes =
            std::fs::read(input).with_context(|| format!("read input: {}", input.display()))?;
        let (out, report) = self.translate_bytes(&file_name(input), &bytes, translator)?;
        write_output(output, &out)?;
        self.progress.info(format!("Wrote {}", output.display()));
        Ok(report)
    }

    pub fn extract_json(&self, input: &Path) -> anyhow::Result<UnitsJson> {
        let bytes =
            std::fs::read(input).with_context(|| format!("read input: {}", input.display()))?;
        let name = file_name(input);
        let doc = self.load(&name, &bytes)?;
        UnitsJson::from_units(&name, &doc.extract(&self.cfg))
    }

    pub fn apply_json(
        &self,
        input: &Path,
        dump: &UnitsJson,
        output: &Path,
    ) -> anyhow::Result<RestoreReport> {
        let bytes =
            std::fs::read(input).with_context(|| format!("read input: {}", input.display()))?;
        let mut doc = self.load(&file_name(input), &bytes)?;
        let units = doc.extract(&self.cfg);
        let texts = dump.replacements_for(&units)?;
        let (out, report) = self.finish(&mut doc, &units, &texts)?;
        write_output(output, &out)?;
        Ok(report)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn write_output(output: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create output dir: {}", dir.display()))?;
    }
    std::fs::write(output, bytes).with_context(|| format!("write output: {}", output.display()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::error::RetextError;
    use crate::legacy::{CharStory, LegacyDocument, LegacyKind};
    use crate::ooxml::package::build_package;
    use crate::ooxml::{OoxmlDocument, OoxmlKind};
    use crate::pipeline::translate::{GlossaryTranslator, IdentityTranslator};
    use crate::style::{StyleKey, StylePolicy};

    const CFB: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

    /// Signature followed by the JSON of the stories.
    struct JsonStories;

    impl LegacyCodec for JsonStories {
        fn decode(&self, _kind: LegacyKind, bytes: &[u8]) -> anyhow::Result<LegacyDocument> {
            let body = bytes.strip_prefix(CFB).context("not a compound file")?;
            Ok(serde_json::from_slice(body)?)
        }

        fn encode(&self, _kind: LegacyKind, doc: &LegacyDocument) -> anyhow::Result<Vec<u8>> {
            let mut out = CFB.to_vec();
            out.extend(serde_json::to_vec(doc)?);
            Ok(out)
        }
    }

    fn docx() -> Vec<u8> {
        let document = concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<w:document xmlns:w="urn:w"><w:body>"#,
            r#"<w:p><w:r><w:t xml:space="preserve">Hello </w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>World</w:t></w:r></w:p>"#,
            r#"</w:body></w:document>"#
        );
        build_package(&[("word/document.xml", document.as_bytes())]).expect("zip")
    }

    fn glossary() -> GlossaryTranslator {
        let mut terms = HashMap::new();
        terms.insert("Hello".to_string(), "Bonjour".to_string());
        terms.insert("World".to_string(), "Monde".to_string());
        terms.insert("Hi".to_string(), "Salut".to_string());
        GlossaryTranslator::new(terms)
    }

    fn texts_of(bytes: &[u8]) -> Vec<String> {
        OoxmlDocument::from_bytes(OoxmlKind::Word, bytes)
            .expect("decode")
            .extract(&StylePolicy::default())
            .into_iter()
            .map(|u| u.text)
            .collect()
    }

    fn orchestrator() -> Orchestrator {
        Orchestrator::new(AppConfig::default(), ConsoleProgress::new(false))
    }

    #[test]
    fn translates_docx_bytes() {
        let (out, report) = orchestrator()
            .translate_bytes("letter.docx", &docx(), &mut glossary())
            .expect("translate");
        assert_eq!(report, RestoreReport { applied: 2, skipped: 0 });
        assert_eq!(texts_of(&out), vec!["Bonjour ", "Monde"]);
    }

    #[test]
    fn misnamed_package_is_redispatched() {
        let (out, _) = orchestrator()
            .translate_bytes("letter.doc", &docx(), &mut IdentityTranslator)
            .expect("translate");
        assert_eq!(texts_of(&out), vec!["Hello ", "World"]);
    }

    #[test]
    fn legacy_input_needs_a_codec() {
        let doc = LegacyDocument {
            stories: vec![CharStory::new().with_run("Hi\r", StyleKey::default())],
            carry: Vec::new(),
        };
        let bytes = JsonStories.encode(LegacyKind::Document, &doc).expect("encode");

        let err = orchestrator()
            .translate_bytes("memo.doc", &bytes, &mut IdentityTranslator)
            .expect_err("no codec");
        assert!(matches!(
            err.downcast_ref::<RetextError>(),
            Some(RetextError::CodecUnavailable { .. })
        ));

        let orch = orchestrator().with_legacy_codec(Box::new(JsonStories));
        let (out, report) = orch
            .translate_bytes("memo.doc", &bytes, &mut glossary())
            .expect("translate");
        assert_eq!(report.applied, 1);
        let back = JsonStories.decode(LegacyKind::Document, &out).expect("decode");
        assert_eq!(back.stories[0].text(), "Salut\r");
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let err = orchestrator()
            .translate_bytes("notes.txt", b"plain", &mut IdentityTranslator)
            .expect_err("reject");
        assert!(err.to_string().contains("notes.txt"));
    }

    #[test]
    fn file_round_trip_through_json_dump() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("in.docx");
        std::fs::write(&input, docx()).expect("write input");

        let orch = orchestrator();
        let mut dump = orch.extract_json(&input).expect("extract");
        assert_eq!(dump.units.len(), 2);
        dump.units[1].translation = Some("Welt".to_string());
        let json = serde_json::to_string(&dump).expect("json");
        let dump: UnitsJson = serde_json::from_str(&json).expect("parse");

        let output = dir.path().join("out").join("in.docx");
        let report = orch.apply_json(&input, &dump, &output).expect("apply");
        assert_eq!(report.skipped, 0);
        let out = std::fs::read(&output).expect("read output");
        assert_eq!(texts_of(&out), vec!["Hello ", "Welt"]);

        let other = dir.path().join("other.docx");
        orch.translate_file(&input, &other, &mut glossary()).expect("translate");
        let err = orch.apply_json(&other, &dump, &output).expect_err("stale dump");
        assert!(matches!(
            err.downcast_ref::<RetextError>(),
            Some(RetextError::DigestMismatch)
        ));
    }
}
