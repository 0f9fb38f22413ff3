//! Credential login flow.
//!
//! Drives the platform login form and ends by persisting the resulting
//! session cookies. Two paths: automatic (caller supplied a one-time
//! code) and manual (a human completes any challenge out-of-band while
//! we hold the page open).

use std::time::Duration;

use anyhow::Context;
use chromiumoxide::Page;
use secrecy::{ExposeSecret, SecretString};

use crate::browser::wait_for_selector;
use crate::error::RunError;
use crate::session::{SessionStore, StoredCookie};

pub const LOGIN_URL: &str = "https://www.facebook.com/login";

const EMAIL_SELECTOR: &str = "#email";
const PASSWORD_SELECTOR: &str = "#pass";
const SUBMIT_SELECTOR: &str = r#"button[type="submit"]"#;
const SECOND_FACTOR_SELECTOR: &str = r#"input[type="text"]"#;
const SECOND_FACTOR_CONFIRM_SELECTOR: &str = r#"div[role="button"]"#;

/// How long the automatic path waits for the second-factor input to appear.
const SECOND_FACTOR_WAIT: Duration = Duration::from_secs(5);
/// Pause between typing the code and confirming it.
const SECOND_FACTOR_TYPE_SETTLE: Duration = Duration::from_secs(1);
/// How long cookies take to land after a confirmed login.
const COOKIE_SETTLE: Duration = Duration::from_secs(10);
/// Human-interaction window for the manual path.
const MANUAL_LOGIN_WINDOW: Duration = Duration::from_secs(30);

/// Primary login credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: SecretString,
}

impl Credentials {
    /// Read credentials from `ADSHOT_EMAIL` / `ADSHOT_PASSWORD`.
    pub fn from_env() -> anyhow::Result<Self> {
        let email = std::env::var("ADSHOT_EMAIL").context("ADSHOT_EMAIL is not set")?;
        let password = std::env::var("ADSHOT_PASSWORD").context("ADSHOT_PASSWORD is not set")?;
        Ok(Self {
            email,
            password: password.into(),
        })
    }
}

/// How the post-credential step of login is completed.
#[derive(Debug, Clone)]
pub enum LoginStrategy {
    /// Submit the supplied one-time code programmatically.
    Automatic { code: String },
    /// Suspend for a fixed window so a human can finish any challenge.
    Manual,
}

impl LoginStrategy {
    /// Resolve the strategy from the job's optional second factor.
    pub fn from_second_factor(second_factor: Option<String>) -> Self {
        match second_factor {
            Some(code) => LoginStrategy::Automatic { code },
            None => LoginStrategy::Manual,
        }
    }
}

/// Resolve the login flow for a step that has to authenticate.
///
/// Credentials are optional for a run as a whole; they become mandatory
/// only at the moment a login is actually needed.
pub fn require_login(login: Option<&LoginFlow>) -> Result<&LoginFlow, RunError> {
    login.ok_or_else(|| {
        RunError::AuthenticationFailed(
            "login is required but no credentials are configured \
             (set ADSHOT_EMAIL and ADSHOT_PASSWORD)"
                .to_string(),
        )
    })
}

/// Runs the login form and persists the resulting session.
#[derive(Debug)]
pub struct LoginFlow {
    credentials: Credentials,
    strategy: LoginStrategy,
}

impl LoginFlow {
    pub fn new(credentials: Credentials, strategy: LoginStrategy) -> Self {
        Self {
            credentials,
            strategy,
        }
    }

    /// Drive the login form to an authenticated state and save the session.
    pub async fn run(&self, page: &Page, store: &SessionStore) -> Result<(), RunError> {
        tracing::info!("Navigating to login page");
        self.submit_credentials(page)
            .await
            .map_err(|e| RunError::AuthenticationFailed(e.to_string()))?;

        match &self.strategy {
            LoginStrategy::Automatic { code } => self.submit_second_factor(page, code).await?,
            LoginStrategy::Manual => {
                tracing::info!(
                    window_secs = MANUAL_LOGIN_WINDOW.as_secs(),
                    "Waiting for manual login completion"
                );
                tokio::time::sleep(MANUAL_LOGIN_WINDOW).await;
            }
        }

        let cookies = page
            .get_cookies()
            .await
            .context("Failed to read cookies after login")?;
        let stored: Vec<StoredCookie> = cookies.iter().map(StoredCookie::from).collect();
        store.save(&stored)?;

        Ok(())
    }

    async fn submit_credentials(&self, page: &Page) -> anyhow::Result<()> {
        page.goto(LOGIN_URL).await.context("Login page failed to load")?;
        page.wait_for_navigation()
            .await
            .context("Login page never settled")?;

        let email_field = page
            .find_element(EMAIL_SELECTOR)
            .await
            .context("Email field not found on login page")?;
        email_field.click().await?;
        email_field.type_str(&self.credentials.email).await?;

        let password_field = page
            .find_element(PASSWORD_SELECTOR)
            .await
            .context("Password field not found on login page")?;
        password_field.click().await?;
        password_field
            .type_str(self.credentials.password.expose_secret())
            .await?;

        page.find_element(SUBMIT_SELECTOR)
            .await
            .context("Submit button not found on login page")?
            .click()
            .await?;

        Ok(())
    }

    async fn submit_second_factor(&self, page: &Page, code: &str) -> Result<(), RunError> {
        tracing::info!("Waiting for second-factor prompt");
        let input = wait_for_selector(page, SECOND_FACTOR_SELECTOR, SECOND_FACTOR_WAIT)
            .await
            .ok_or(RunError::SecondFactorUnavailable {
                timeout: SECOND_FACTOR_WAIT,
            })?;

        input
            .click()
            .await
            .map_err(|e| RunError::AuthenticationFailed(e.to_string()))?;
        input
            .type_str(code)
            .await
            .map_err(|e| RunError::AuthenticationFailed(e.to_string()))?;
        tokio::time::sleep(SECOND_FACTOR_TYPE_SETTLE).await;

        page.find_element(SECOND_FACTOR_CONFIRM_SELECTOR)
            .await
            .context("Second-factor confirm button not found")?
            .click()
            .await
            .map_err(|e| RunError::AuthenticationFailed(e.to_string()))?;

        tracing::info!(
            settle_secs = COOKIE_SETTLE.as_secs(),
            "Second factor submitted; waiting for cookies to land"
        );
        tokio::time::sleep(COOKIE_SETTLE).await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_resolves_from_second_factor() {
        assert!(matches!(
            LoginStrategy::from_second_factor(Some("123123".to_string())),
            LoginStrategy::Automatic { ref code } if code == "123123"
        ));
        assert!(matches!(
            LoginStrategy::from_second_factor(None),
            LoginStrategy::Manual
        ));
    }

    #[test]
    fn missing_credentials_surface_as_authentication_failure() {
        let err = require_login(None).unwrap_err();
        assert!(matches!(err, RunError::AuthenticationFailed(_)));
        assert!(err.to_string().contains("ADSHOT_EMAIL"));

        let flow = LoginFlow::new(
            Credentials {
                email: "user@example.com".to_string(),
                password: "hunter2".to_string().into(),
            },
            LoginStrategy::Manual,
        );
        assert!(require_login(Some(&flow)).is_ok());
    }
}
