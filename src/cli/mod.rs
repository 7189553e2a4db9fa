//! track-atlas CLI Module
//!
//! `build` runs the whole pipeline; `inspect` reports what the normalizer
//! would keep from an input table without writing anything.

use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::pipeline::{Pipeline, PipelineReport};
use crate::preprocessing::FeatureNormalizer;
use crate::utils::DataLoader;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "track-atlas")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build a 3D similarity map from a table of track audio features")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Normalize, cluster, embed and write the enriched table (default)
    Build(BuildArgs),

    /// Show which feature columns the normalizer keeps
    Inspect {
        /// Input table path
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// JSON config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Input table path [default: data/tracks.csv]
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Output table path [default: artifacts/embeddings_3d.csv]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// JSON config file; flags override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of clusters
    #[arg(long)]
    pub clusters: Option<usize>,

    /// Seed for clustering and embedding
    #[arg(long)]
    pub seed: Option<u64>,

    /// Write the run report as JSON to this path
    #[arg(long)]
    pub report: Option<PathBuf>,
}

impl BuildArgs {
    /// Config file (or defaults) with the command-line overrides applied
    pub fn resolve_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = load_config(self.config.as_deref())?;
        if let Some(input) = &self.input {
            config = config.with_input(input);
        }
        if let Some(output) = &self.output {
            config = config.with_output(output);
        }
        if let Some(clusters) = self.clusters {
            config = config.with_n_clusters(clusters);
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        config.validate()?;
        Ok(config)
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    Ok(match path {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    })
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_build(args: &BuildArgs) -> anyhow::Result<PipelineReport> {
    section("Build");

    let config = args.resolve_config()?;
    println!("  {:<16} {}", muted("Input"), config.input_path.display());
    println!("  {:<16} {}", muted("Clusters"), config.clustering.n_clusters.to_string().cyan());
    println!();

    step_run("Normalizing, clustering and embedding");
    let start = Instant::now();
    let report = Pipeline::new(config).run()?;
    step_done(&format!("{:?}", start.elapsed()));

    if let Some(path) = &args.report {
        report.save_json(path)?;
        step_ok(&format!("Report written to {}", path.display()));
    }

    println!();
    println!("  {:<16} {}", muted("Rows"), report.rows.to_string().white().bold());
    println!("  {:<16} {}", muted("Features"), report.features.len().to_string().white());
    println!("  {:<16} {}", muted("Dropped rows"), report.dropped_rows.to_string().white());
    println!("  {:<16} {}", muted("Inertia"), format!("{:.3}", report.inertia).white());
    println!();
    println!("{}", report.summary_line());

    Ok(report)
}

pub fn cmd_inspect(input: Option<&Path>, config: Option<&Path>) -> anyhow::Result<()> {
    section("Inspect");

    let mut config = load_config(config)?;
    if let Some(input) = input {
        config = config.with_input(input);
    }

    step_run("Loading data");
    let raw = DataLoader::new().load_auto(&config.input_path)?;
    step_done(&format!("{} rows × {} cols", raw.height(), raw.width()));

    let (found, missing): (Vec<String>, Vec<String>) = config
        .features
        .iter()
        .cloned()
        .partition(|name| raw.column(name).is_ok());

    step_run("Normalizing features");
    let matrix = FeatureNormalizer::new(config.features.clone()).normalize(&raw)?;
    step_done(&format!("{} × {}", matrix.n_rows(), matrix.n_features()));

    println!();
    println!("  {:<20} {}", muted("File"), config.input_path.display());
    println!("  {:<20} {}", muted("Found"), list_or_none(&found));
    println!("  {:<20} {}", muted("Not in input"), list_or_none(&missing).yellow());
    println!("  {:<20} {}", muted("All missing"), list_or_none(&matrix.dropped_features).yellow());
    println!("  {:<20} {}", muted("Zero variance"), list_or_none(&matrix.degenerate_features).yellow());
    println!("  {:<20} {}", muted("Retained"), list_or_none(&matrix.features).white());
    println!("  {:<20} {}", muted("Rows kept"), matrix.n_rows().to_string().white().bold());
    println!("  {:<20} {}", muted("Rows dropped"), matrix.dropped_rows);
    println!();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_build_flags() {
        let cli = Cli::try_parse_from([
            "track-atlas", "build", "--input", "in.csv", "--clusters", "8", "--seed", "7",
        ])
        .unwrap();
        let Some(Commands::Build(args)) = cli.command else {
            panic!("expected build");
        };
        let config = args.resolve_config().unwrap();
        assert_eq!(config.input_path, PathBuf::from("in.csv"));
        assert_eq!(config.output_path, PathBuf::from("artifacts/embeddings_3d.csv"));
        assert_eq!(config.clustering.n_clusters, 8);
        assert_eq!(config.embedding.random_state, 7);
    }

    #[test]
    fn test_no_subcommand() {
        let cli = Cli::try_parse_from(["track-atlas"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_build_writes_table_and_report() {
        let dir = tempfile::TempDir::new().unwrap();
        let input = dir.path().join("tracks.csv");
        let mut text = String::from("track_name,energy,tempo\n");
        for i in 0..12 {
            text.push_str(&format!("Song {i},{},{}\n", (i % 5) as f64 / 5.0, 90 + i * 3));
        }
        std::fs::write(&input, text).unwrap();

        let args = BuildArgs {
            input: Some(input),
            output: Some(dir.path().join("out").join("embeddings_3d.csv")),
            clusters: Some(3),
            report: Some(dir.path().join("report.json")),
            ..Default::default()
        };
        let report = cmd_build(&args).unwrap();

        assert_eq!(report.rows, 12);
        assert!(dir.path().join("out").join("embeddings_3d.csv").exists());
        assert!(dir.path().join("report.json").exists());
    }

    #[test]
    fn test_zero_clusters_rejected() {
        let args = BuildArgs {
            clusters: Some(0),
            ..Default::default()
        };
        assert!(args.resolve_config().is_err());
    }
}
