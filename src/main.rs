use anyhow::{Context, Result};
use std::env;
use std::path::Path;
use tracing_subscriber::EnvFilter;

use eco_risk_network::{InputManifest, RiskPipeline, VERSION};

fn main() -> Result<()> {
    // Logs go to stderr so stdout carries only the JSON report.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("run") => match args.get(2) {
            Some(manifest) => run(Path::new(manifest)),
            None => {
                print_usage();
                std::process::exit(2);
            }
        },
        Some("--version") | Some("-V") => {
            println!("eco-risk {}", VERSION);
            Ok(())
        }
        _ => {
            print_usage();
            std::process::exit(2);
        }
    }
}

fn print_usage() {
    eprintln!("Usage: eco-risk run <manifest.json>");
    eprintln!("       eco-risk --version");
    eprintln!();
    eprintln!("   Set RUST_LOG (e.g. RUST_LOG=debug) to change log verbosity.");
}

fn run(manifest_path: &Path) -> Result<()> {
    eprintln!("🌍 Compound Risk Network - batch run");
    eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Load inputs
    eprintln!("\n📂 Loading manifest {:?}...", manifest_path);
    let manifest = InputManifest::from_file(manifest_path)?;
    let (exposure, reference) = manifest.load()?;
    eprintln!(
        "✓ Loaded {} banks over {} activities",
        exposure.len(),
        exposure.activities().len()
    );

    // 2. Run pipeline
    eprintln!("\n🔧 Running pipeline...");
    let pipeline = RiskPipeline::new(manifest.config.clone()).context("Invalid engine configuration")?;
    let report = pipeline.run(&exposure, &reference).context("Risk pipeline failed")?;

    // 3. Summary
    eprintln!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    eprintln!("{}", report.summary());
    if report.analysis.propagation.hit_round_cap {
        eprintln!("⚠️  Cascade hit max_rounds = {} before a fixed point", report.config.max_rounds);
    }

    // 4. Report
    let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
    println!("{}", json);

    Ok(())
}
