use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use dwarf_hydra::{
    BinaryData, Cli, Commands, Config, DwarfContext, HydraFormatter, JsonFormatter, LayoutSet,
    ReportFormat, Selector, TableFormatter, struct_layouts,
};
use std::path::{Path, PathBuf};

/// Settings for the generate command after merging config file and flags.
struct GenerateConfig {
    patterns: Vec<String>,
    output: Option<PathBuf>,
    preamble: bool,
}

fn run_cli(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Generate { binary, whitelist, output, config, no_preamble } => {
            let file = Config::load(config.as_deref())?;
            let settings = GenerateConfig {
                patterns: file.patterns(&whitelist),
                output: output.or(file.output),
                preamble: !no_preamble && file.preamble.unwrap_or(true),
            };
            run_generate(&binary, &settings)?;
        }
        Commands::Padding { binary, whitelist, format, pretty, no_color, config } => {
            let file = Config::load(config.as_deref())?;
            if no_color {
                colored::control::set_override(false);
            }
            run_padding(&binary, &file.patterns(&whitelist), format, pretty, no_color)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level).format_timestamp(None);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    run_cli(cli)
}

/// Loads the binary and merges the selected structs of every unit.
fn collect(binary_path: &Path, patterns: &[String]) -> Result<LayoutSet> {
    let selector = Selector::new(patterns).context("Invalid whitelist pattern")?;
    if selector.is_empty() {
        log::warn!("No whitelist patterns given; no structs will be selected");
    }

    let binary = BinaryData::load(binary_path)
        .with_context(|| format!("Failed to load binary: {}", binary_path.display()))?;
    let loaded = binary.load_dwarf().context("Failed to load DWARF debug info")?;

    DwarfContext::new(&loaded).collect(&selector).context("Failed to resolve struct layouts")
}

fn run_generate(binary_path: &Path, config: &GenerateConfig) -> Result<()> {
    let set = collect(binary_path, &config.patterns)?;
    if set.structs().next().is_none() {
        eprintln!("{}", "No structs matched the whitelist".yellow());
    }

    let text = HydraFormatter::new(config.preamble)
        .format(&set)
        .context("Failed to generate hydras definitions")?;

    match &config.output {
        Some(path) => std::fs::write(path, &text)
            .with_context(|| format!("Failed to write output: {}", path.display()))?,
        None => print!("{}", text),
    }
    Ok(())
}

fn run_padding(
    binary_path: &Path,
    patterns: &[String],
    format: ReportFormat,
    pretty: bool,
    no_color: bool,
) -> Result<()> {
    let set = collect(binary_path, patterns)?;
    let layouts = struct_layouts(&set);

    if layouts.is_empty() {
        eprintln!("{}", "No structs matched the whitelist".yellow());
        return Ok(());
    }

    let output = match format {
        ReportFormat::Table => TableFormatter::new(no_color).format(&layouts),
        ReportFormat::Json => JsonFormatter::new(pretty).format(&layouts),
    };
    println!("{}", output);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find_fixture_path(name: &str) -> Option<PathBuf> {
        let base = Path::new("tests/fixtures/bin");
        let dsym_path = base.join(format!("{}.dSYM/Contents/Resources/DWARF/{}", name, name));
        if dsym_path.exists() {
            return Some(dsym_path);
        }
        let direct_path = base.join(name);
        direct_path.exists().then_some(direct_path)
    }

    #[test]
    fn generate_writes_output_file() {
        let Some(path) = find_fixture_path("layouts") else {
            return;
        };
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("schema.py");
        let config = GenerateConfig {
            patterns: vec!["Padded".to_string()],
            output: Some(out.clone()),
            preamble: true,
        };

        run_generate(&path, &config).expect("generate");
        let text = std::fs::read_to_string(&out).unwrap();
        assert!(text.starts_with("from hydras import *\n"));
        assert!(text.contains("class Padded(Struct):"));
    }

    #[test]
    fn failed_run_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("schema.py");
        let config = GenerateConfig {
            patterns: vec!["Anything".to_string()],
            output: Some(out.clone()),
            preamble: true,
        };

        assert!(run_generate(&dir.path().join("missing.elf"), &config).is_err());
        assert!(!out.exists());
    }

    #[test]
    fn padding_report_runs_in_both_formats() {
        let Some(path) = find_fixture_path("layouts") else {
            return;
        };
        let patterns = vec!["Padded".to_string()];
        run_padding(&path, &patterns, ReportFormat::Table, false, true).expect("table");
        run_padding(&path, &patterns, ReportFormat::Json, true, true).expect("json");
    }
}
