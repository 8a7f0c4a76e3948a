use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{CommandFactory, Parser};

use retext::config::{init_default_config, load_glossary, resolve_config};
use retext::pipeline::{GlossaryTranslator, IdentityTranslator, Orchestrator, Translator, UnitsJson};
use retext::progress::ConsoleProgress;

#[derive(Parser, Debug)]
#[command(name = "retext")]
#[command(about = "In-place document translation that keeps formatting and structure", long_about = None)]
struct Args {
    /// Write a commented default retext.toml into DIR, then exit
    #[arg(long, value_name = "DIR")]
    init_config: Option<PathBuf>,

    /// Overwrite an existing config when used with --init-config
    #[arg(long)]
    force: bool,

    /// Input document (.docx .xlsx .pptx .doc .xls .ppt)
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Output document (default: <input_stem>.translated.<ext>)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Config file path (default: search for retext.toml upwards)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Glossary TOML (source = "target"); overrides [translate].glossary
    #[arg(long, value_name = "TOML")]
    glossary: Option<PathBuf>,

    /// Dump the extracted units as JSON, no translation
    #[arg(long, value_name = "JSON", conflicts_with = "apply_json")]
    extract_json: Option<PathBuf>,

    /// Restore from a dump whose entries carry a `translation`
    #[arg(long, value_name = "JSON")]
    apply_json: Option<PathBuf>,

    /// Suppress progress lines
    #[arg(short, long)]
    quiet: bool,
}

fn default_output_for(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output")
        .to_string();
    match input.extension().and_then(|e| e.to_str()) {
        Some(ext) => input.with_file_name(format!("{stem}.translated.{ext}")),
        None => input.with_file_name(format!("{stem}.translated")),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    let progress = ConsoleProgress::new(!args.quiet);

    if let Some(dir) = args.init_config.as_ref() {
        let cfg_path = init_default_config(dir, args.force).context("init default config")?;
        eprintln!("Wrote config: {}", cfg_path.display());
        return Ok(());
    }

    let Some(input) = args.input.clone() else {
        let mut cmd = Args::command();
        cmd.print_help().context("print help")?;
        return Ok(());
    };
    let workdir = input
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let (cfg, cfg_path) = resolve_config(args.config.as_deref(), &workdir).context("load config")?;
    if let Some(p) = cfg_path.as_ref() {
        progress.info(format!("Config: {}", p.display()));
    }
    let glossary_path = args.glossary.clone().or_else(|| cfg.translate.glossary.clone());
    let orchestrator = Orchestrator::new(cfg, progress);

    if let Some(json_path) = args.extract_json.as_ref() {
        let dump = orchestrator.extract_json(&input)?;
        let text = serde_json::to_string_pretty(&dump).context("serialize units")?;
        std::fs::write(json_path, text)
            .with_context(|| format!("write units: {}", json_path.display()))?;
        eprintln!("Wrote {} unit(s): {}", dump.units.len(), json_path.display());
        return Ok(());
    }

    let output = args.output.clone().unwrap_or_else(|| default_output_for(&input));

    let report = if let Some(json_path) = args.apply_json.as_ref() {
        let text = std::fs::read_to_string(json_path)
            .with_context(|| format!("read units: {}", json_path.display()))?;
        let dump: UnitsJson = serde_json::from_str(&text)
            .with_context(|| format!("parse units: {}", json_path.display()))?;
        orchestrator.apply_json(&input, &dump, &output)?
    } else {
        let mut translator: Box<dyn Translator> = match glossary_path {
            Some(p) => Box::new(GlossaryTranslator::new(load_glossary(&p)?)),
            None => Box::new(IdentityTranslator),
        };
        orchestrator.translate_file(&input, &output, translator.as_mut())?
    };
    if report.skipped > 0 {
        eprintln!("{} unit(s) could not be written back (see warnings)", report.skipped);
    }
    Ok(())
}
