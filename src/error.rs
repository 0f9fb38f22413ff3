use std::time::Duration;

/// Failure taxonomy for a capture run.
///
/// `SessionUnavailable` is the only recoverable variant: the navigator
/// surfaces it when a report load bounces to the login page, and the caller
/// resolves it by logging in and retrying exactly once. Everything else is
/// fatal and propagates to the caller after cleanup.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The current browser session is not authenticated.
    #[error("no authenticated session; login required")]
    SessionUnavailable,

    /// Login (or the post-login retry) did not produce an authenticated session.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The second-factor input never appeared on the login page.
    #[error("second-factor input did not appear within {timeout:?}")]
    SecondFactorUnavailable { timeout: Duration },

    /// The report region never became visible.
    #[error("report region did not appear within {timeout:?}")]
    RegionNotFound { timeout: Duration },

    /// The report region was found but could not be captured.
    #[error("capture failed: {0}")]
    CaptureFailed(String),

    /// Drive upload or ledger append failed.
    #[error("publish failed: {0}")]
    PublishFailed(anyhow::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RunError {
    /// Human-readable message for the inbound job interface.
    pub fn message(&self) -> String {
        self.to_string()
    }
}
