use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use adshot::config::ResolvedConfig;
use adshot::job::{CaptureJob, CaptureRequest, Month, ReportKind};
use adshot::login::Credentials;
use adshot::orchestrator::Orchestrator;
use adshot::publish::{DriveClient, GoogleAuth, Publisher, ServiceAccountKey, SheetsClient};
use adshot::session::SessionStore;

#[derive(Parser)]
#[command(name = "adshot")]
#[command(about = "Meta Ads report capture and evidence publisher")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "adshot.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one capture job to completion
    Run {
        /// JSON file describing the job (alternative to the flags below)
        #[arg(long, conflicts_with_all = ["account_id", "business_id", "ad_set_id", "ad_id", "month", "label"])]
        job: Option<PathBuf>,

        #[arg(long, required_unless_present = "job")]
        account_id: Option<String>,

        #[arg(long, required_unless_present = "job")]
        business_id: Option<String>,

        #[arg(long, required_unless_present = "job")]
        ad_set_id: Option<String>,

        /// Ad id to filter on; repeat for several
        #[arg(long = "ad-id", required_unless_present = "job")]
        ad_id: Vec<String>,

        #[arg(long, default_value = "lifetime")]
        report_kind: ReportKind,

        /// Uppercase Spanish month name selecting the evidence folder
        #[arg(long, required_unless_present = "job")]
        month: Option<Month>,

        /// Label for the ledger row; also the output file name
        #[arg(long, required_unless_present = "job")]
        label: Option<String>,

        /// One-time code for the automatic login path
        #[arg(long)]
        second_factor: Option<String>,

        /// Delete the persisted session after the run
        #[arg(long)]
        invalidate_session: bool,
    },

    /// Show the resolved configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(
                "info,chromiumoxide=warn,chromiumoxide::conn=off,chromiumoxide::handler=off",
            )
        }))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true),
        )
        .init();

    let cli = Cli::parse();
    let config = ResolvedConfig::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load config: {}", cli.config.display()))?;

    match cli.command {
        Command::Config => {
            println!("Config file: {}", cli.config.display());
            println!("Cookies file: {}", config.cookies_file.display());
            println!("Screenshots dir: {}", config.screenshots_dir.display());
            println!("Sheet: {} / {}", config.google.sheet_id, config.google.sheet_name);
            match &config.google.service_account_key_file {
                Some(path) => println!("Service account key: {}", path.display()),
                None => println!("Service account key: (not configured)"),
            }
        }
        Command::Run {
            job,
            account_id,
            business_id,
            ad_set_id,
            ad_id,
            report_kind,
            month,
            label,
            second_factor,
            invalidate_session,
        } => {
            let job = match job {
                Some(path) => {
                    let content = std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read job file: {}", path.display()))?;
                    serde_json::from_str::<CaptureJob>(&content)
                        .with_context(|| format!("Failed to parse job file: {}", path.display()))?
                }
                None => CaptureJob {
                    request: CaptureRequest {
                        account_id: account_id.context("--account-id is required")?,
                        business_id: business_id.context("--business-id is required")?,
                        ad_set_id: ad_set_id.context("--ad-set-id is required")?,
                        ad_ids: ad_id,
                        report_kind,
                        month: month.context("--month is required")?,
                        label: label.context("--label is required")?,
                    },
                    second_factor,
                    invalidate_session,
                },
            };

            let orchestrator = build_orchestrator(&config)?;
            match orchestrator.run(job).await {
                Ok(outcome) => {
                    println!("Capture published: {}", outcome.image_url);
                    println!(
                        "Image: {} ({}x{})",
                        outcome.artifact.file_path.display(),
                        outcome.artifact.width_px,
                        outcome.artifact.height_px
                    );
                }
                Err(err) => {
                    anyhow::bail!("Capture run failed: {}", err.message());
                }
            }
        }
    }

    Ok(())
}

fn build_orchestrator(config: &ResolvedConfig) -> Result<Orchestrator> {
    let key_path = config
        .google
        .service_account_key_file
        .as_ref()
        .context("google.service_account_key_file is not configured")?;
    let key = ServiceAccountKey::load(key_path)?;
    let auth = Arc::new(GoogleAuth::from_key(key));

    let publisher = Publisher::new(
        DriveClient::new(auth.clone()),
        SheetsClient::new(auth),
        config.google.sheet_id.clone(),
        config.google.sheet_name.clone(),
    );

    // Login only happens when no valid session is persisted; missing
    // credentials fail the run at the login step, not here.
    let credentials = match Credentials::from_env() {
        Ok(credentials) => Some(credentials),
        Err(err) => {
            tracing::debug!(error = %err, "No login credentials in the environment");
            None
        }
    };

    Ok(Orchestrator::new(
        config.browser.clone(),
        config.screenshots_dir.clone(),
        SessionStore::new(&config.cookies_file),
        credentials,
        publisher,
    ))
}
