//! The capture run state machine.
//!
//! Sequences session restore, conditional login, navigation, capture,
//! and publish, and owns the cleanup obligations that hold on every exit
//! path: the browser is closed exactly once, the output directory is
//! removed only on success (failed runs keep their evidence on disk), and
//! the persisted session is deleted only when the job asks for it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;

use crate::browser::BrowserSession;
use crate::capture;
use crate::clock::{Clock, SystemClock};
use crate::config::BrowserSettings;
use crate::error::RunError;
use crate::job::{CaptureArtifact, CaptureJob};
use crate::login::{require_login, Credentials, LoginFlow, LoginStrategy};
use crate::navigator;
use crate::publish::Publisher;
use crate::session::SessionStore;

/// What a successful run hands back to the caller.
#[derive(Debug)]
pub struct RunOutcome {
    pub image_url: String,
    pub artifact: CaptureArtifact,
}

/// Runs one capture job to completion.
pub struct Orchestrator {
    browser_settings: BrowserSettings,
    screenshots_dir: PathBuf,
    session_store: SessionStore,
    credentials: Option<Credentials>,
    publisher: Publisher,
    clock: Arc<dyn Clock>,
}

impl Orchestrator {
    /// `credentials` may be absent; a run that never needs to log in (a
    /// valid persisted session, no redirect) works without them, and one
    /// that does fails at the login step.
    pub fn new(
        browser_settings: BrowserSettings,
        screenshots_dir: PathBuf,
        session_store: SessionStore,
        credentials: Option<Credentials>,
        publisher: Publisher,
    ) -> Self {
        Self {
            browser_settings,
            screenshots_dir,
            session_store,
            credentials,
            publisher,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Run the job to completion. Cleanup runs on every exit path before
    /// the result is handed back.
    pub async fn run(&self, job: CaptureJob) -> Result<RunOutcome, RunError> {
        // A failed launch still owes the filesystem cleanup; only the
        // browser-close obligation drops out.
        let result = match BrowserSession::launch(&self.browser_settings).await {
            Ok(browser) => {
                let result = self.run_steps(&browser, &job).await;
                browser.close();
                result
            }
            Err(err) => Err(err.into()),
        };

        if let Err(err) = &result {
            tracing::error!(error = %err, "Capture run failed");
        }

        finalize_run(
            result.is_ok(),
            &self.screenshots_dir,
            &self.session_store,
            job.invalidate_session,
        );

        result
    }

    async fn run_steps(
        &self,
        browser: &BrowserSession,
        job: &CaptureJob,
    ) -> Result<RunOutcome, RunError> {
        let page = browser.page();
        let strategy = LoginStrategy::from_second_factor(job.second_factor.clone());
        let login = self
            .credentials
            .clone()
            .map(|credentials| LoginFlow::new(credentials, strategy));

        match self.session_store.load() {
            Some(cookies) => {
                let params = cookies.iter().map(|c| c.to_param()).collect();
                page.set_cookies(params)
                    .await
                    .context("Failed to restore session cookies")?;
                tracing::info!(count = cookies.len(), "Restored persisted session");
            }
            None => {
                tracing::info!("No persisted session; entering login flow");
                require_login(login.as_ref())?
                    .run(page, &self.session_store)
                    .await?;
            }
        }

        let query = navigator::build_query(&job.request, self.clock.today());
        let url = navigator::report_url(&job.request, &query);
        navigator::navigate(page, &url, login.as_ref(), &self.session_store).await?;

        capture::wait_for_ready(page).await?;
        let artifact = capture::capture(page, &self.screenshots_dir, &job.request.label).await?;

        let image_url = self.publisher.publish(&artifact, &job.request).await?;

        Ok(RunOutcome { image_url, artifact })
    }
}

/// Filesystem cleanup obligations, applied after the browser is closed.
///
/// The output directory is removed if and only if the run succeeded; a
/// failed run keeps its captures on disk for diagnosis. The session file
/// is removed if and only if invalidation was requested, independent of
/// the run outcome. Cleanup failures are logged, never allowed to mask
/// the run result.
pub fn finalize_run(
    success: bool,
    output_dir: &Path,
    session_store: &SessionStore,
    invalidate_session: bool,
) {
    if success {
        if output_dir.exists() {
            match std::fs::remove_dir_all(output_dir) {
                Ok(()) => tracing::info!(dir = %output_dir.display(), "Output directory removed"),
                Err(err) => {
                    tracing::warn!(error = %err, "Failed to remove output directory")
                }
            }
        }
    } else if output_dir.exists() {
        tracing::info!(
            dir = %output_dir.display(),
            "Run failed; output directory kept for inspection"
        );
    }

    if invalidate_session {
        if let Err(err) = session_store.clear() {
            tracing::warn!(error = %err, "Failed to delete session file");
        }
    }
}
