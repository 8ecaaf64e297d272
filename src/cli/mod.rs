//! DAFU command line
//!
//! Non-interactive commands for profiling data, training an artifact,
//! scoring a file with it and inspecting a saved artifact.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::ensemble::EnsembleParams;
use crate::export::{
    export_training_results, resolve_artifact_path, write_predictions_csv, PipelineArtifact,
};
use crate::inference::{InferenceConfig, StreamInferenceEngine};
use crate::pipeline::{PipelineConfig, TrainingPipeline};
use crate::policy::{BatchSummary, DetectionPolicy, PredictionResult};
use crate::profiling::{analyze, SchemaProfiler};
use crate::utils::DataLoader;

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }
fn alert(s: &str) -> ColoredString  { s.truecolor(240, 110, 100) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn warning(msg: &str) {
    println!("  {} {}", alert("!"), msg);
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn join(columns: impl IntoIterator<Item = impl AsRef<str>>) -> String {
    let names: Vec<String> = columns.into_iter().map(|c| c.as_ref().to_string()).collect();
    if names.is_empty() {
        "-".to_string()
    } else {
        names.join(", ")
    }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "dafu")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Anomaly detection for fraud scoring")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Profile a dataset and report its suitability for training
    Profile {
        /// Input data file (CSV, JSON, or Parquet)
        #[arg(short, long)]
        data: PathBuf,

        /// Label column, excluded from features
        #[arg(short, long)]
        label: Option<String>,

        /// Unique ratio above which categorical columns are dropped
        #[arg(long, default_value = "0.5")]
        high_cardinality_ratio: f64,

        /// Variance below which numerical columns are dropped
        #[arg(long, default_value = "0.01")]
        low_variance_threshold: f64,
    },

    /// Train an anomaly ensemble and save the pipeline artifact
    Train {
        /// Input data file (CSV, JSON, or Parquet)
        #[arg(short, long)]
        data: PathBuf,

        /// JSON pipeline configuration; flags below override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Label column used for evaluation
        #[arg(short, long)]
        label: Option<String>,

        /// Contamination levels, comma separated
        #[arg(long, value_delimiter = ',')]
        contamination: Vec<f64>,

        /// Use the risk-threshold policy with this threshold
        #[arg(long)]
        risk_threshold: Option<f64>,

        /// Fit only on rows labelled normal
        #[arg(long)]
        use_labels: bool,

        /// Trees per forest
        #[arg(long)]
        estimators: Option<usize>,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Train despite too few rows or numerical features
        #[arg(long)]
        allow_insufficient_data: bool,

        /// Artifact path; `.dafu` is appended when no extension is given
        #[arg(short, long, default_value = "fraud_model")]
        output: PathBuf,

        /// Directory for prediction, metric and configuration exports
        #[arg(long)]
        results_dir: Option<PathBuf>,
    },

    /// Score a data file with a trained artifact
    Predict {
        /// Artifact file
        #[arg(short, long)]
        model: PathBuf,

        /// Input data file
        #[arg(short, long)]
        data: PathBuf,

        /// Ensemble member to use
        #[arg(long)]
        contamination: Option<f64>,

        /// Rows per scoring chunk
        #[arg(long, default_value = "10000")]
        chunk_size: usize,

        /// Output predictions CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show what a saved artifact contains
    Inspect {
        /// Artifact file
        #[arg(short, long)]
        model: PathBuf,
    },
}

/// Dispatch a parsed command
pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Profile { data, label, high_cardinality_ratio, low_variance_threshold } => {
            cmd_profile(&data, label.as_deref(), high_cardinality_ratio, low_variance_threshold)
        }
        Commands::Train {
            data,
            config,
            label,
            contamination,
            risk_threshold,
            use_labels,
            estimators,
            seed,
            allow_insufficient_data,
            output,
            results_dir,
        } => {
            let mut cfg = match config {
                Some(path) => PipelineConfig::from_json_file(path)?,
                None => PipelineConfig::new(),
            };
            if let Some(label) = label {
                cfg = cfg.with_label_column(label);
            }
            if !contamination.is_empty() {
                cfg = cfg.with_contamination_levels(contamination);
            }
            if let Some(threshold) = risk_threshold {
                cfg = cfg.with_detection_policy(DetectionPolicy::risk_threshold(threshold)?);
            }
            if use_labels {
                cfg = cfg.with_labels_for_training(true);
            }
            if let Some(n) = estimators {
                let ensemble = EnsembleParams { n_estimators: n, ..cfg.ensemble.clone() };
                cfg = cfg.with_ensemble(ensemble);
            }
            if let Some(seed) = seed {
                cfg = cfg.with_random_seed(seed);
            }
            if allow_insufficient_data {
                cfg = cfg.with_allow_insufficient_data(true);
            }
            cmd_train(&data, cfg, &output, results_dir.as_deref())
        }
        Commands::Predict { model, data, contamination, chunk_size, output } => {
            cmd_predict(&model, &data, contamination, chunk_size, output.as_deref())
        }
        Commands::Inspect { model } => cmd_inspect(&model),
    }
}

fn load_data(path: &Path) -> anyhow::Result<DataFrame> {
    step_run("Loading data");
    let start = Instant::now();
    let df = DataLoader::new().load_auto(path)?;
    step_done(&format!("{} rows × {} cols in {:?}", df.height(), df.width(), start.elapsed()));
    Ok(df)
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_profile(
    data_path: &Path,
    label: Option<&str>,
    high_cardinality_ratio: f64,
    low_variance_threshold: f64,
) -> anyhow::Result<()> {
    section("Profile");
    let df = load_data(data_path)?;

    let profile = SchemaProfiler::new()
        .with_high_cardinality_ratio(high_cardinality_ratio)
        .with_low_variance_threshold(low_variance_threshold)
        .profile(&df, label)?;
    let analysis = analyze(&df, &profile)?;

    println!();
    println!("  {:<22} {}", muted("Rows"), analysis.n_rows);
    println!("  {:<22} {}", muted("Columns"), analysis.n_columns);
    println!("  {:<22} {}", muted("Numerical"), join(&profile.numerical_columns));
    println!("  {:<22} {}", muted("Categorical"), join(&profile.categorical_columns));
    println!("  {:<22} {}", muted("Primary keys"), join(&profile.primary_keys));
    println!("  {:<22} {}", muted("High cardinality"), join(&profile.high_cardinality_columns));
    println!("  {:<22} {}", muted("Low variance"), join(&profile.low_variance_columns));
    println!("  {:<22} {}", muted("Retained"), join(profile.retained_columns()));

    if !analysis.missing_values.is_empty() {
        section("Missing values");
        for m in &analysis.missing_values {
            println!("  {:<22} {:>8} {:>7.2}%", m.column, m.count, m.percentage);
        }
    }

    if let Some(dist) = &analysis.label_distribution {
        section(&format!("Label '{}'", dist.column));
        for c in &dist.counts {
            println!("  {:<22} {:>8} {:>7.2}%", c.value, c.count, c.percentage);
        }
        if !dist.is_binary {
            warning("label is not binary; evaluation metrics will be limited");
        }
    }

    section("Suitability");
    if analysis.suitability.is_suitable() {
        println!("  {} {}", ok("✓"), "dataset is suitable for anomaly detection");
    }
    for issue in &analysis.suitability.issues {
        warning(&issue.to_string());
    }
    println!();
    Ok(())
}

pub fn cmd_train(
    data_path: &Path,
    config: PipelineConfig,
    output: &Path,
    results_dir: Option<&Path>,
) -> anyhow::Result<()> {
    section("Train");
    let df = load_data(data_path)?;

    step_run(&format!(
        "Training {} level(s) with {}",
        config.effective_contamination_levels().len(),
        config.detection_policy.to_string().cyan()
    ));
    let start = Instant::now();
    let report = TrainingPipeline::new(config).run(&df)?;
    step_done(&format!("{:?}", start.elapsed()));

    for w in &report.warnings {
        warning(w);
    }

    println!();
    println!(
        "  {:<14} {:>10} {:>10} {:>10} {:>10}",
        muted("Contamination"),
        muted("Flagged"),
        muted("Rate"),
        muted("F1"),
        muted("ROC-AUC")
    );
    println!("  {}", dim(&"─".repeat(58)));
    for member in &report.member_predictions {
        let eval = report.evaluation_for(member.contamination);
        let f1 = eval.map(|e| format!("{:.4}", e.report.f1)).unwrap_or_else(|| "-".into());
        let auc = eval
            .and_then(|e| e.report.roc_auc)
            .map(|a| format!("{:.4}", a))
            .unwrap_or_else(|| "-".into());
        println!(
            "  {:<14} {:>10} {:>9.2}% {:>10} {:>10}",
            member.contamination,
            member.summary.anomalies,
            member.summary.anomaly_rate * 100.0,
            f1,
            auc
        );
    }
    if let Some(best) = report.best_contamination {
        println!();
        println!("  {} {} {}", ok("best"), muted("contamination"), best.to_string().white().bold());
    }

    let artifact_path = resolve_artifact_path(output);
    step_run(&format!("Saving artifact → {}", artifact_path.display()));
    report.artifact.save(&artifact_path)?;
    step_done(&report.artifact.artifact_id.to_string());

    if let Some(dir) = results_dir {
        step_run(&format!("Exporting results → {}", dir.display()));
        let files = export_training_results(dir, &df, &report)?;
        step_done(&format!("{} prediction file(s)", files.predictions.len()));
    }

    println!();
    Ok(())
}

pub fn cmd_predict(
    model_path: &Path,
    data_path: &Path,
    contamination: Option<f64>,
    chunk_size: usize,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Predict");

    step_run("Loading artifact");
    let config = InferenceConfig::new().with_streaming(chunk_size);
    let engine = StreamInferenceEngine::load(config, model_path)?;
    step_done(&model_path.display().to_string());

    let df = load_data(data_path)?;

    step_run("Scoring");
    let start = Instant::now();
    let mut results: Vec<PredictionResult> = Vec::with_capacity(df.height());
    let mut warnings = Vec::new();
    let mut contamination_used = None;
    for chunk in engine.predict_streaming(&df, contamination)? {
        let chunk = chunk?;
        contamination_used = Some(chunk.contamination_used);
        warnings.extend(chunk.warnings);
        results.extend(chunk.results);
    }
    step_done(&format!("{:?}", start.elapsed()));

    for w in &warnings {
        warning(w);
    }

    let summary = BatchSummary::from_results(&results);
    println!();
    println!("  {:<16} {}", muted("Rows"), summary.total);
    println!("  {:<16} {}", muted("Anomalies"), summary.anomalies.to_string().white().bold());
    println!("  {:<16} {:.2}%", muted("Rate"), summary.anomaly_rate * 100.0);
    if let Some(c) = contamination_used {
        println!("  {:<16} {}", muted("Contamination"), c);
    }

    if let Some(path) = output {
        step_run(&format!("Saving → {}", path.display()));
        write_predictions_csv(&df, &results, path)?;
        step_done(&format!("{} rows", results.len()));
    }

    println!();
    Ok(())
}

pub fn cmd_inspect(model_path: &Path) -> anyhow::Result<()> {
    let artifact = PipelineArtifact::load(model_path)?;
    let levels: Vec<String> = artifact
        .ensemble
        .contamination_levels()
        .iter()
        .map(|c| c.to_string())
        .collect();

    println!();
    line_box_top();
    line_box(&format!("{}", "DAFU pipeline artifact".white().bold()));
    line_box_sep();
    line_box(&kv("Id        ", &artifact.artifact_id.to_string()));
    line_box(&kv("Created   ", &artifact.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()));
    line_box(&kv("Format    ", &format!("v{}", artifact.format_version)));
    line_box(&kv("Policy    ", &artifact.policy.to_string()));
    line_box(&kv("Levels    ", &levels.join(", ")));
    line_box(&kv("Trees     ", &artifact.hyperparameters.ensemble.n_estimators.to_string()));
    line_box(&kv("Rows      ", &artifact.training.n_rows.to_string()));
    line_box(&kv("Features  ", &artifact.training.n_features.to_string()));
    line_box_bottom();

    section("Columns");
    println!("  {:<18} {}", muted("Required"), join(artifact.preprocessing.required_columns()));
    println!("  {:<18} {}", muted("Dropped"), join(artifact.schema.dropped_columns()));
    if let Some(label) = &artifact.preprocessing.label_column {
        println!("  {:<18} {}", muted("Label"), label);
    }

    if !artifact.training.evaluations.is_empty() {
        section("Training evaluation");
        for e in &artifact.training.evaluations {
            println!(
                "  {:<18} {} {:.4}  {} {:.4}",
                e.contamination,
                muted("F1"),
                e.report.f1,
                muted("accuracy"),
                e.report.accuracy
            );
        }
    }
    println!();
    Ok(())
}
