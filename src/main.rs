use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use std::io::Write;
use std::path::PathBuf;

use hatebu_import::config::{Config, Overrides, Settings, TOKEN_ENV_VAR};
use hatebu_import::pipeline;

#[derive(Parser, Debug)]
#[command(
    name = "hatebu-import",
    version,
    about = "Import a Hatena Bookmark Atom export into Omnivore"
)]
struct Args {
    /// required: File path for the input Atom feed file
    #[arg(short = 'i', long = "input", value_name = "FILE")]
    input: Option<PathBuf>,

    /// Set the state of every bookmark to ARCHIVED
    #[arg(short = 'a', long = "archive")]
    archive: bool,

    /// required: Omnivore API token (or OMNIVORE_API_TOKEN)
    #[arg(short = 'k', long = "token", value_name = "TOKEN")]
    token: Option<String>,

    /// Omnivore GraphQL API URL [default: https://api-prod.omnivore.app/api/graphql]
    #[arg(short = 'u', long = "api-url", value_name = "URL")]
    api_url: Option<String>,

    /// Write the CSV to FILE ('-' for stdout) instead of uploading it
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    output: Option<PathBuf>,

    /// Config file [default: ~/.config/hatebu-import/config.toml]
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            input: self.input.clone(),
            archive: self.archive,
            token: self.token.clone(),
            api_url: self.api_url.clone(),
            output: self.output.clone(),
        }
    }
}

/// Resolves the run settings.
///
/// When the input path or token is missing, writes the problem and the usage
/// text to `out` and returns `Ok(None)`; the process then exits with status 0.
fn resolve_settings(
    overrides: Overrides,
    env_token: Option<String>,
    config: &Config,
    out: &mut impl Write,
) -> Result<Option<Settings>> {
    match Settings::resolve(overrides, env_token, config) {
        Ok(settings) => Ok(Some(settings)),
        Err(e) if e.is_usage() => {
            writeln!(out, "{}", e).context("Failed to print usage")?;
            write!(out, "{}", Args::command().render_help()).context("Failed to print usage")?;
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Logs go to stderr so `--output -` leaves stdout as pure CSV
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match args.config.clone().or_else(Config::default_path) {
        Some(path) => Config::load(&path)
            .with_context(|| format!("Failed to load config file: {}", path.display()))?,
        None => Config::default(),
    };

    let env_token = std::env::var(TOKEN_ENV_VAR).ok();
    let settings = match resolve_settings(
        args.overrides(),
        env_token,
        &config,
        &mut std::io::stdout().lock(),
    )? {
        Some(settings) => settings,
        None => return Ok(()),
    };

    let summary = pipeline::run(settings).await?;
    match summary.uploaded_bytes {
        Some(bytes) => eprintln!(
            "Uploaded {} bookmarks ({} bytes) for import",
            summary.records, bytes
        ),
        None => tracing::debug!(records = summary.records, "CSV written"),
    }

    Ok(())
}
