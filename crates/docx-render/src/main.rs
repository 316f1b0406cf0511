/*
 * main.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! docx-render - fill a .docx template from a JSON data file

use anyhow::{Context, Result};
use clap::Parser;
use docx_template::{DiagnosticKind, RenderOptions, Renderer, TemplateContext};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "docx-render")]
#[command(version)]
#[command(about = "Render a .docx template against JSON data", long_about = None)]
struct Cli {
    /// Template document (.docx)
    template: PathBuf,

    /// JSON data file (scalars, tables, collections, images, special_chars, rich_text)
    #[arg(short, long)]
    data: PathBuf,

    /// Write the rendered document to FILE
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// TOML file with render options
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Fail when any placeholder cannot be resolved
    #[arg(long)]
    strict: bool,

    /// Print diagnostics as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "docx_render=debug,docx_template=debug"
    } else {
        "docx_render=info,docx_template=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let mut options = match &cli.config {
        Some(path) => load_options(path)?,
        None => RenderOptions::default(),
    };
    if cli.strict {
        options.strict = true;
    }
    debug!(?options, "render options");

    let data = TemplateContext::from_json_file(&cli.data)
        .with_context(|| format!("Failed to load data from {}", cli.data.display()))?;
    let template = std::fs::read(&cli.template)
        .with_context(|| format!("Failed to read template {}", cli.template.display()))?;

    let output = Renderer::new(options)
        .render(&template, &data)
        .with_context(|| format!("Failed to render {}", cli.template.display()))?;

    if cli.json {
        eprintln!("{}", serde_json::to_string_pretty(&output.diagnostics)?);
    } else {
        for diagnostic in &output.diagnostics {
            eprintln!("{}", diagnostic.to_text());
        }
    }

    std::fs::write(&cli.output, &output.bytes)
        .with_context(|| format!("Failed to write {}", cli.output.display()))?;

    let warnings = output
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::Warning)
        .count();
    info!(output = %cli.output.display(), warnings, "wrote document");
    Ok(())
}

/// Read render options from a TOML file.
fn load_options(path: &Path) -> Result<RenderOptions> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use docx_template::PixelSize;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_load_options() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("render.toml");
        std::fs::write(
            &path,
            "strict = true\nimage-size = { width = 600, height = 400 }\n",
        )
        .unwrap();

        let options = load_options(&path).unwrap();
        assert!(options.strict);
        assert_eq!(options.image_size, PixelSize::new(600, 400));
        assert_eq!(options.header_image_size, PixelSize::new(104, 83));
    }

    #[test]
    fn test_load_options_rejects_unknown_types() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("render.toml");
        std::fs::write(&path, "strict = \"yes\"\n").unwrap();
        assert!(load_options(&path).is_err());
    }

    #[test]
    fn test_cli_arguments() {
        let cli = Cli::try_parse_from([
            "docx-render",
            "letter.docx",
            "--data",
            "data.json",
            "-o",
            "out.docx",
            "--strict",
        ])
        .unwrap();
        assert_eq!(cli.template, PathBuf::from("letter.docx"));
        assert_eq!(cli.output, PathBuf::from("out.docx"));
        assert!(cli.strict);
        assert!(cli.config.is_none());
    }
}
