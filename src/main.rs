//! ext-recommend - diagnostic CLI for the extension recommender
//!
//! # Input
//! Signals as flags (`--opened-file-type py --workspace-config-type dockerfile`)
//! and/or a `SessionInputs` JSON object on stdin with `--stdin`.
//!
//! # Output (via stdout)
//! JSON report: `{ generated, threshold, results: [{ extensionId, confidence }] }`
//!
//! Not meant to be depended on by production systems.

use chrono::Utc;
use clap::Parser;
use colored::Colorize;
use extension_recommender::{
    RecommenderConfig, RecommenderError, SessionInputs, SessionOperations, SessionResult,
};
use serde::Serialize;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error};

#[derive(Debug, Parser)]
#[command(
    name = "ext-recommend",
    version,
    about = "Recommend extensions for a workspace (loading model.onnx requires a build with `--features onnx`)"
)]
struct Cli {
    /// Read a SessionInputs JSON object from stdin; flags are merged into it
    #[arg(long)]
    stdin: bool,

    /// Extension already installed (repeatable)
    #[arg(long = "previously-installed", value_name = "ID")]
    previously_installed: Vec<String>,

    /// File type opened in the editor, with or without the dot (repeatable)
    #[arg(long = "opened-file-type", value_name = "EXT")]
    opened_file_types: Vec<String>,

    /// Extension activated in the session (repeatable)
    #[arg(long = "activated-extension", value_name = "ID")]
    activated_extensions: Vec<String>,

    /// Workspace dependency or project file (repeatable)
    #[arg(long = "workspace-dependency", value_name = "NAME")]
    workspace_dependencies: Vec<String>,

    /// File type present in the workspace (repeatable)
    #[arg(long = "workspace-file-type", value_name = "EXT")]
    workspace_file_types: Vec<String>,

    /// Config file type present in the workspace (repeatable)
    #[arg(long = "workspace-config-type", value_name = "NAME")]
    workspace_config_types: Vec<String>,

    /// Minimum confidence (default 0.6)
    #[arg(short, long)]
    threshold: Option<f32>,

    /// Directory holding model.onnx and feature_encoding.json
    #[arg(long, value_name = "DIR")]
    model_dir: Option<PathBuf>,

    /// JSON config file (modelDir, entityCategory, inputName, outputName, ...)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Pretty-print the JSON report
    #[arg(long)]
    pretty: bool,
}

/// JSON report written to stdout
#[derive(Debug, Serialize)]
struct Report {
    /// When the report was produced (RFC 3339)
    generated: String,

    /// Threshold the results were filtered with
    threshold: f32,

    results: Vec<SessionResult>,
}

fn main() -> ExitCode {
    // Initialize tracing if RUST_LOG is set
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    eprintln!(
        "{}",
        "Note: this CLI is only for diagnosing recommender results. It should not be depended on in any production system."
            .yellow()
    );

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Error: {}", e);
            eprintln!("{} {}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), RecommenderError> {
    let mut inputs = if cli.stdin {
        let mut input_json = String::new();
        io::stdin().read_to_string(&mut input_json)?;
        debug!("Received input: {}", input_json);
        serde_json::from_str(&input_json).map_err(RecommenderError::InputParse)?
    } else {
        SessionInputs::default()
    };
    merge(&mut inputs.previously_installed, cli.previously_installed);
    merge(&mut inputs.opened_file_types, cli.opened_file_types);
    merge(&mut inputs.activated_extensions, cli.activated_extensions);
    merge(&mut inputs.workspace_dependencies, cli.workspace_dependencies);
    merge(&mut inputs.workspace_file_types, cli.workspace_file_types);
    merge(&mut inputs.workspace_config_types, cli.workspace_config_types);

    let mut config = match &cli.config {
        Some(path) => RecommenderConfig::from_file(path)?,
        None => RecommenderConfig::default(),
    };
    if cli.model_dir.is_some() {
        config.model_dir = cli.model_dir;
    }
    let threshold = cli.threshold.unwrap_or(config.confidence_pass);

    let session = SessionOperations::new(config);
    let results = session.run(&inputs, threshold)?;

    for result in &results {
        let confidence = format!("{:.3}", result.confidence);
        let confidence = if result.confidence >= 0.9 {
            confidence.green()
        } else if result.confidence >= 0.75 {
            confidence.yellow()
        } else {
            confidence.normal()
        };
        eprintln!("  {} {}", result.extension_id.bold(), confidence);
    }
    if results.is_empty() {
        eprintln!("  {}", "no extension passed the threshold".dimmed());
    }

    let report = Report {
        generated: Utc::now().to_rfc3339(),
        threshold,
        results,
    };
    let json = if cli.pretty {
        serde_json::to_string_pretty(&report)
    } else {
        serde_json::to_string(&report)
    }
    .map_err(RecommenderError::OutputSerialize)?;
    println!("{}", json);

    Ok(())
}

/// Append flag values to a (possibly absent) input field.
fn merge(field: &mut Option<Vec<String>>, extra: Vec<String>) {
    if extra.is_empty() {
        return;
    }
    field.get_or_insert_with(Vec::new).extend(extra);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_merge_flags_into_absent_field() {
        let mut field = None;
        merge(&mut field, vec!["py".to_string()]);
        assert_eq!(field, Some(vec!["py".to_string()]));
    }

    #[test]
    fn test_merge_keeps_stdin_values() {
        let mut field = Some(vec![".ts".to_string()]);
        merge(&mut field, vec!["py".to_string()]);
        merge(&mut field, vec![]);
        assert_eq!(field, Some(vec![".ts".to_string(), "py".to_string()]));
    }

    #[test]
    fn test_empty_flags_leave_field_absent() {
        let mut field: Option<Vec<String>> = None;
        merge(&mut field, vec![]);
        assert!(field.is_none());
    }

    #[test]
    fn test_cli_parses_repeated_flags() {
        let cli = Cli::parse_from([
            "ext-recommend",
            "--opened-file-type",
            "py",
            "--opened-file-type",
            ".rs",
            "--threshold",
            "0.5",
        ]);
        assert_eq!(cli.opened_file_types, ["py", ".rs"]);
        assert_eq!(cli.threshold, Some(0.5));
        assert!(!cli.stdin);
    }

    #[test]
    fn test_about_names_onnx_feature() {
        let about = Cli::command().get_about().map(|a| a.to_string()).unwrap_or_default();
        assert!(about.contains("--features onnx"));
    }
}
