/// tea-recover CLI
///
/// Usage:
///   tea-recover                       # ./chal を解析し 1.txt / 2.txt を出力
///   tea-recover ./chal --report r.json
///   tea-recover ./chal --config tea.json -v --dump-disasm

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tea_recover::report::RecoveryReport;
use tea_recover::solver::write_solutions;
use tea_recover::{recover, PipelineOptions, RecoverConfig};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "tea-recover")]
#[command(about = "Recover the TEA key and inputs from a stripped x86-64 challenge binary", long_about = None)]
struct Cli {
    /// Target binary
    #[arg(default_value = "./chal")]
    binary: PathBuf,

    /// JSON config file (heuristic thresholds, mask parameters, output names)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory for the solution files
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// Code section to scan (overrides config)
    #[arg(short, long)]
    section: Option<String>,

    /// Write a JSON report of everything recovered
    #[arg(short, long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Log the full disassembly of the code section
    #[arg(long)]
    dump_disasm: bool,

    /// -v: debug, -vv: trace
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match (cli.quiet, cli.verbose) {
        (true, _) => Level::WARN,
        (false, 0) => Level::INFO,
        (false, 1) => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => RecoverConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => RecoverConfig::default(),
    };
    if let Some(section) = cli.section {
        config.section = section;
    }

    info!("🔍 Analyzing {}", cli.binary.display());

    let options = PipelineOptions {
        dump_disassembly: cli.dump_disasm,
    };
    let recovery = recover(&cli.binary, &config, options)
        .with_context(|| format!("Recovery failed for {}", cli.binary.display()))?;

    // ここに来た時点で両方の解は検証済み
    write_solutions(&cli.out_dir, &config.outputs, &recovery.solutions)
        .context("Failed to write solutions")?;

    if let Some(path) = &cli.report {
        RecoveryReport::new(&cli.binary, &recovery, &config.outputs).write(path)?;
        info!("Report written to {}", path.display());
    }

    info!("✅ Done");
    Ok(())
}
