//! `iris-analyze`: run one analysis cycle from the terminal.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::analysis::{AnalysisClient, ResultView};
use crate::choreography::{ElementBox, HeadlessPage, ViewportChoreographer};
use crate::config::{ChoreographyConfig, ClientConfig, ConfigError, RESULT_REGION_IDS};
use crate::intake::{ImageFile, ImageIntake, IntakeError};
use crate::notify::{Notification, Notifier, TracingNotifier};
use crate::session::{AnalysisSession, Completion, SessionState};

/// Headless page geometry: a 900px viewport over the upload form, with the
/// result region laid out below it.
const PAGE_VIEWPORT_HEIGHT: f64 = 900.0;
const PAGE_DOCUMENT_HEIGHT: f64 = 1400.0;
const RESULT_REGION_TOP: f64 = 1100.0;
const RESULT_LINE_HEIGHT: f64 = 24.0;

#[derive(Parser, Debug)]
#[command(name = "iris-analyze", version, about = "Submit a medical exam image for automatic classification")]
pub struct Cli {
    /// Image to analyze (JPG, PNG, WEBP, ...)
    pub image: PathBuf,

    /// Analysis service base URL; repeat to set the fallback order
    #[arg(long = "endpoint", value_name = "URL")]
    pub endpoints: Vec<String>,

    /// Print the session snapshot as JSON instead of the result card
    #[arg(long)]
    pub json: bool,

    /// Also print the raw service response
    #[arg(long)]
    pub raw: bool,

    /// Connect directly, ignoring proxy environment variables
    #[arg(long)]
    pub no_proxy: bool,
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Intake(#[from] IntakeError),

    #[error("JSON output error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Selected image was not forwarded for analysis")]
    NotForwarded,
}

impl Cli {
    fn client_config(&self) -> Result<ClientConfig, ConfigError> {
        let config = if self.endpoints.is_empty() {
            ClientConfig::from_env()?
        } else {
            ClientConfig::new(&self.endpoints)?
        };
        Ok(if self.no_proxy {
            config.without_system_proxy()
        } else {
            config
        })
    }
}

/// Run one cycle. `Ok(true)` when the analysis succeeded.
pub async fn execute(cli: &Cli) -> Result<bool, CliError> {
    let client = AnalysisClient::new(&cli.client_config()?)?;
    tracing::debug!(endpoints = ?client.endpoints(), "Analysis client ready");

    let page = Arc::new(HeadlessPage::new(PAGE_VIEWPORT_HEIGHT, PAGE_DOCUMENT_HEIGHT));
    let choreographer = ViewportChoreographer::new(page.clone(), ChoreographyConfig::default());
    let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);
    let session = AnalysisSession::with_choreographer(client, notifier.clone(), choreographer);

    let (upload_tx, mut upload_rx) = mpsc::unbounded_channel();
    let intake = ImageIntake::new(notifier, move |file| {
        let _ = upload_tx.send(file);
    });

    let preview = intake.submit(ImageFile::from_path(&cli.image)?)?;
    let file = upload_rx.recv().await.ok_or(CliError::NotForwarded)?;
    let completion = session.submit(file).await;
    if preview.await.is_err() {
        tracing::debug!("Preview task did not complete");
    }

    if let Completion::Succeeded(result) = &completion {
        let view = ResultView::build(result, session.raw_response().as_ref());
        let lines = view.render_text(false).lines().count() as f64;
        page.insert_element(
            RESULT_REGION_IDS[0],
            ElementBox::new(RESULT_REGION_TOP, lines * RESULT_LINE_HEIGHT),
        );
        if let Some(target) = session.wait_for_choreography().await {
            tracing::debug!(?target, "Result region in view");
        }
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&session.snapshot())?);
    } else {
        match session.state() {
            SessionState::Succeeded { result, raw } => {
                print!("{}", ResultView::build(&result, Some(&raw)).render_text(cli.raw));
            }
            SessionState::Failed { failure } => {
                let notice = Notification::AnalysisFailed {
                    failure: failure.kind,
                };
                eprintln!("{}", notice.message());
                eprintln!("({})", failure.message);
            }
            SessionState::Idle | SessionState::Analyzing => {}
        }
    }

    Ok(matches!(completion, Completion::Succeeded(_)))
}
