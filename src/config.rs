use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::legacy::LengthPolicy;
use crate::style::StylePolicy;

pub const CONFIG_FILE_NAME: &str = "retext.toml";

#[derive(Clone, Debug, Deserialize, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub style: StyleSection,
    #[serde(default)]
    pub restore: LengthPolicy,
    #[serde(default)]
    pub translate: TranslateSection,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct StyleSection {
    /// Treat the `auto` colour as no colour when comparing fragment styles.
    pub auto_color_is_unset: bool,
}

impl Default for StyleSection {
    fn default() -> Self {
        Self {
            auto_color_is_unset: true,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct TranslateSection {
    /// Attempts per batch before a count mismatch is fatal.
    pub max_attempts: usize,
    pub batch_size: usize,
    /// TOML table of source -> target strings. Relative paths resolve against the config file.
    pub glossary: Option<PathBuf>,
}

impl Default for TranslateSection {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            batch_size: 64,
            glossary: None,
        }
    }
}

impl AppConfig {
    pub fn style_policy(&self) -> StylePolicy {
        StylePolicy {
            auto_color_is_unset: self.style.auto_color_is_unset,
        }
    }
}

pub fn find_file_upwards(start_dir: &Path, filename: &str, max_levels: usize) -> Option<PathBuf> {
    let mut dir = start_dir;
    for _ in 0..=max_levels {
        let candidate = dir.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
    None
}

pub fn find_default_config(workdir: &Path) -> Option<PathBuf> {
    if let Some(p) = find_file_upwards(workdir, CONFIG_FILE_NAME, 8) {
        return Some(p);
    }
    let cwd = std::env::current_dir().ok()?;
    find_file_upwards(&cwd, CONFIG_FILE_NAME, 8)
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let mut cfg: AppConfig = toml::from_str(&text).context("parse config toml")?;
    if let Some(glossary) = cfg.translate.glossary.as_mut() {
        if glossary.is_relative() {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            *glossary = base.join(&*glossary);
        }
    }
    Ok(cfg)
}

/// Loads `explicit`, else the nearest `retext.toml` above `workdir`, else the defaults.
pub fn resolve_config(
    explicit: Option<&Path>,
    workdir: &Path,
) -> anyhow::Result<(AppConfig, Option<PathBuf>)> {
    if let Some(path) = explicit {
        return Ok((load_config(path)?, Some(path.to_path_buf())));
    }
    match find_default_config(workdir) {
        Some(path) => Ok((load_config(&path)?, Some(path))),
        None => Ok((AppConfig::default(), None)),
    }
}

pub fn load_glossary(path: &Path) -> anyhow::Result<HashMap<String, String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read glossary: {}", path.display()))?;
    let table: HashMap<String, String> =
        toml::from_str(&text).with_context(|| format!("parse glossary: {}", path.display()))?;
    Ok(table)
}

const DEFAULT_CONFIG_TOML: &str = r#"# retext configuration

[style]
# Fragments coloured "auto" compare equal to uncoloured ones.
auto_color_is_unset = true

[restore]
# Fixed-length family: what to do when a translation outgrows its run.
#   grow     - write it whole
#   truncate - cut it at max(len * max_growth_ratio, len + min_growth_slack) characters
#   reject   - keep the original text
length_policy = "truncate"
max_growth_ratio = 3.0
min_growth_slack = 16
# Right-pad shorter translations with spaces to the original length.
pad_shorter = true

[translate]
max_attempts = 3
batch_size = 64
# glossary = "glossary.toml"
"#;

/// Writes a commented default config into `dir`. An existing file is kept unless `force`.
pub fn init_default_config(dir: &Path, force: bool) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create config dir: {}", dir.display()))?;
    let cfg_path = dir.join(CONFIG_FILE_NAME);
    if cfg_path.exists() && !force {
        return Ok(cfg_path);
    }
    std::fs::write(&cfg_path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("write config: {}", cfg_path.display()))?;
    Ok(cfg_path)
}
