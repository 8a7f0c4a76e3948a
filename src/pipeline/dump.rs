use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::RetextError;
use crate::ir::{Address, ContainerKind, TextUnit};
use crate::style::StyleKey;

pub const DUMP_VERSION: u32 = 1;

/// Extracted units of one document, written for offline translation and read back to restore.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitsJson {
    pub version: u32,
    pub file: String,
    pub digest: String,
    pub units: Vec<UnitEntry>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitEntry {
    pub address: Address,
    pub kind: ContainerKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<StyleKey>,
    pub text: String,
    #[serde(default)]
    pub translation: Option<String>,
}

/// Lowercase hex SHA-256 over the ordered `(address, text)` list.
pub fn units_digest(units: &[TextUnit]) -> anyhow::Result<String> {
    let mut hasher = Sha256::new();
    for unit in units {
        hasher.update(serde_json::to_vec(&unit.address)?);
        hasher.update([0u8]);
        hasher.update(unit.text.as_bytes());
        hasher.update([0xFFu8]);
    }
    Ok(hex::encode(hasher.finalize()))
}

impl UnitsJson {
    pub fn from_units(file: &str, units: &[TextUnit]) -> anyhow::Result<Self> {
        Ok(Self {
            version: DUMP_VERSION,
            file: file.to_string(),
            digest: units_digest(units)?,
            units: units
                .iter()
                .map(|u| UnitEntry {
                    address: u.address.clone(),
                    kind: u.kind,
                    style: u.style.clone(),
                    text: u.text.clone(),
                    translation: None,
                })
                .collect(),
        })
    }

    /// Replacement texts for `units`, which must be a fresh extraction of the same document.
    /// Entries without a translation keep their text.
    pub fn replacements_for(&self, units: &[TextUnit]) -> anyhow::Result<Vec<String>> {
        if self.version != DUMP_VERSION {
            anyhow::bail!("unsupported dump version {}", self.version);
        }
        if units_digest(units)? != self.digest || units.len() != self.units.len() {
            return Err(RetextError::DigestMismatch.into());
        }
        Ok(self
            .units
            .iter()
            .map(|e| e.translation.clone().unwrap_or_else(|| e.text.clone()))
            .collect())
    }
}
