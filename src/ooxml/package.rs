use std::collections::HashMap;
use std::io::{Cursor, Read, Write};

use anyhow::Context;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// An Office Open XML package held in memory, entries in archive order.
#[derive(Clone)]
pub struct OfficePackage {
    pub entries: Vec<PackageEntry>,
}

#[derive(Clone)]
pub struct PackageEntry {
    pub name: String,
    pub data: Vec<u8>,
    pub compression: CompressionMethod,
    pub last_modified: zip::DateTime,
    pub unix_mode: Option<u32>,
    pub is_dir: bool,
}

impl OfficePackage {
    pub fn from_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        let mut zip = ZipArchive::new(Cursor::new(bytes)).context("read zip")?;
        let mut entries = Vec::with_capacity(zip.len());
        for i in 0..zip.len() {
            let mut file = zip.by_index(i).context("zip entry")?;
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)
                .with_context(|| format!("read zip entry: {}", file.name()))?;
            entries.push(PackageEntry {
                name: file.name().to_string(),
                data,
                compression: file.compression(),
                last_modified: file.last_modified().unwrap_or_default(),
                unix_mode: file.unix_mode(),
                is_dir: file.is_dir(),
            });
        }
        Ok(Self { entries })
    }

    /// Serializes the package, substituting the data of entries named in `replacements`.
    pub fn to_bytes_with_replacements(
        &self,
        replacements: &HashMap<String, Vec<u8>>,
    ) -> anyhow::Result<Vec<u8>> {
        let mut zout = ZipWriter::new(Cursor::new(Vec::new()));
        for ent in &self.entries {
            let data = replacements.get(&ent.name).unwrap_or(&ent.data);
            let mut opts = SimpleFileOptions::default()
                .compression_method(ent.compression)
                .last_modified_time(ent.last_modified);
            if let Some(mode) = ent.unix_mode {
                opts = opts.unix_permissions(mode);
            }
            if ent.is_dir || ent.name.ends_with('/') {
                zout.add_directory(ent.name.as_str(), opts)
                    .with_context(|| format!("add zip dir: {}", ent.name))?;
            } else {
                zout.start_file(ent.name.as_str(), opts)
                    .with_context(|| format!("start zip file: {}", ent.name))?;
                zout.write_all(data)
                    .with_context(|| format!("write zip file: {}", ent.name))?;
            }
        }
        let cursor = zout.finish().context("finish zip")?;
        Ok(cursor.into_inner())
    }

    pub fn entry(&self, name: &str) -> Option<&PackageEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn xml_entries(&self) -> Vec<&PackageEntry> {
        self.entries
            .iter()
            .filter(|e| e.name.to_lowercase().ends_with(".xml"))
            .collect()
    }
}

/// Builds a deflated package from `(name, data)` pairs; used to assemble fixtures and new files.
pub fn build_package(files: &[(&str, &[u8])]) -> anyhow::Result<Vec<u8>> {
    let mut zout = ZipWriter::new(Cursor::new(Vec::new()));
    let opts = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, data) in files {
        zout.start_file(*name, opts)
            .with_context(|| format!("start zip file: {name}"))?;
        zout.write_all(data)
            .with_context(|| format!("write zip file: {name}"))?;
    }
    let cursor = zout.finish().context("finish zip")?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_named_entries_and_keeps_order() {
        let bytes = build_package(&[("a.xml", b"<a/>"), ("b/c.bin", b"\x00\x01")]).expect("zip");
        let pkg = OfficePackage::from_bytes(&bytes).expect("read");
        assert_eq!(pkg.xml_entries().len(), 1);

        let mut repl = HashMap::new();
        repl.insert("a.xml".to_string(), b"<z/>".to_vec());
        let out = pkg.to_bytes_with_replacements(&repl).expect("write");
        let again = OfficePackage::from_bytes(&out).expect("reread");
        let names: Vec<&str> = again.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.xml", "b/c.bin"]);
        assert_eq!(again.entry("a.xml").map(|e| e.data.as_slice()), Some(&b"<z/>"[..]));
        assert_eq!(again.entry("b/c.bin").map(|e| e.data.as_slice()), Some(&b"\x00\x01"[..]));
    }
}
