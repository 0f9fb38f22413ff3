//! Report URL construction and navigation.
//!
//! The ads manager encodes the whole report view in the URL: account,
//! filter set, column list, and date window. Building the URL up front
//! means navigation is a single load plus, at most, one login retry.

use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use chromiumoxide::Page;
use chrono::{Datelike, NaiveDate};

use crate::browser::wait_for_selector;
use crate::error::RunError;
use crate::job::CaptureRequest;
use crate::login::{require_login, LoginFlow};
use crate::session::SessionStore;

const ADS_MANAGER_URL: &str = "https://adsmanager.facebook.com/adsmanager/manage/ads";

/// ASCII 0x1E, the separator between the three logical filter fields
/// (operator, match mode, value list) in the platform's query grammar.
const FILTER_FIELD_SEPARATOR: char = '\u{1e}';

const REPORT_COLUMNS: [&str; 4] = ["name", "campaign_name", "campaign_group_name", "spend"];

const MODAL_SELECTOR: &str = ".layerCancel";
const MODAL_WAIT: Duration = Duration::from_secs(5);

/// Fully parameterized report query, derived once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportQuery {
    pub filter_set: String,
    pub columns: String,
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
    pub date_preset: &'static str,
}

/// Build the report query for `request` as of `today`.
///
/// The date window is always the full previous calendar month. The report
/// kind only selects the auxiliary preset token; the explicit window is
/// included either way.
pub fn build_query(request: &CaptureRequest, today: NaiveDate) -> ReportQuery {
    let month_start = today
        .with_day(1)
        .expect("the first of a month always exists");
    let date_end = month_start
        .pred_opt()
        .expect("a day precedes every month start");
    let date_start = date_end
        .with_day(1)
        .expect("the first of a month always exists");

    ReportQuery {
        filter_set: build_filter_set(&request.ad_ids),
        columns: build_columns(),
        date_start,
        date_end,
        date_preset: request.report_kind.date_preset(),
    }
}

/// Construct the `filter_set` parameter: operator, match mode, and the
/// quoted ad-id list, 0x1E-separated, ids percent-encoded.
fn build_filter_set(ad_ids: &[String]) -> String {
    let sep = FILTER_FIELD_SEPARATOR;
    let ids = ad_ids
        .iter()
        .map(|id| format!("\"{}\"", urlencoding::encode(id)))
        .collect::<Vec<_>>()
        .join("%2C");
    format!("SEARCH_BY_ADGROUP_IDS-STRING_SET{sep}ANY{sep}[{ids}]")
}

fn build_columns() -> String {
    REPORT_COLUMNS
        .iter()
        .map(|column| urlencoding::encode(column).into_owned())
        .collect::<Vec<_>>()
        .join("%2C")
}

/// Assemble the full report URL.
pub fn report_url(request: &CaptureRequest, query: &ReportQuery) -> String {
    let date = format!(
        "{}_{}%2C{}",
        query.date_start, query.date_end, query.date_preset
    );
    format!(
        "{ADS_MANAGER_URL}?act={}&business_id={}&columns={}&filter_set={}&date={}&breakdown_regrouping=true&nav_source=no_referrer",
        request.account_id, request.business_id, query.columns, query.filter_set, date
    )
}

/// Load the report URL, authenticating at most once.
///
/// A load that lands on the login page is a `SessionUnavailable`; we log
/// in, persist the new session, and retry exactly once. A second redirect
/// is fatal. After a successful load, a transient overlay dialog is
/// dismissed if present.
pub async fn navigate(
    page: &Page,
    url: &str,
    login: Option<&LoginFlow>,
    store: &SessionStore,
) -> Result<(), RunError> {
    navigate_with(
        || load_report(page, url),
        || async move { require_login(login)?.run(page, store).await },
    )
    .await?;

    tracing::info!("Report page loaded");
    dismiss_modal(page).await;
    Ok(())
}

/// The load/authenticate decision, with the loader and the login flow
/// injected: at most one authentication round, at most one retried load.
async fn navigate_with<L, A, LF, AF>(mut load: L, authenticate: A) -> Result<(), RunError>
where
    L: FnMut() -> LF,
    LF: Future<Output = Result<(), RunError>>,
    A: FnOnce() -> AF,
    AF: Future<Output = Result<(), RunError>>,
{
    match load().await {
        Ok(()) => Ok(()),
        Err(RunError::SessionUnavailable) => {
            tracing::warn!("Login page detected; entering login flow");
            authenticate().await?;
            tracing::info!("Session saved; retrying navigation");
            load().await.map_err(|err| match err {
                RunError::SessionUnavailable => RunError::AuthenticationFailed(
                    "still redirected to login after one login attempt".to_string(),
                ),
                other => other,
            })
        }
        Err(err) => Err(err),
    }
}

async fn load_report(page: &Page, url: &str) -> Result<(), RunError> {
    tracing::info!(url, "Navigating to report");
    page.goto(url).await.context("Report page failed to load")?;
    page.wait_for_navigation()
        .await
        .context("Report page never settled")?;

    let current = page
        .url()
        .await
        .context("Failed to read page URL")?
        .unwrap_or_default();
    if current.contains("login") {
        return Err(RunError::SessionUnavailable);
    }
    Ok(())
}

/// Close the transient overlay dialog if it shows up. Absence is normal.
async fn dismiss_modal(page: &Page) {
    match wait_for_selector(page, MODAL_SELECTOR, MODAL_WAIT).await {
        Some(cancel) => {
            if let Err(err) = cancel.click().await {
                tracing::warn!(error = %err, "Failed to dismiss overlay dialog");
            } else {
                tracing::info!("Dismissed overlay dialog");
            }
        }
        None => tracing::debug!("No overlay dialog present"),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::job::{Month, ReportKind};

    fn request(kind: ReportKind, ad_ids: &[&str]) -> CaptureRequest {
        CaptureRequest {
            account_id: "915602685684463".to_string(),
            business_id: "411498659732220".to_string(),
            ad_set_id: "120217253965030109".to_string(),
            ad_ids: ad_ids.iter().map(|s| s.to_string()).collect(),
            report_kind: kind,
            month: Month::Marzo,
            label: "BR_FPM-FB_MARZO_1".to_string(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn window_is_full_previous_month() {
        let query = build_query(&request(ReportKind::Monthly, &["1"]), date(2026, 4, 10));
        assert_eq!(query.date_start, date(2026, 3, 1));
        assert_eq!(query.date_end, date(2026, 3, 31));
    }

    #[test]
    fn window_crosses_year_boundary_in_january() {
        let query = build_query(&request(ReportKind::Monthly, &["1"]), date(2026, 1, 15));
        assert_eq!(query.date_start, date(2025, 12, 1));
        assert_eq!(query.date_end, date(2025, 12, 31));
    }

    #[test]
    fn window_handles_leap_february() {
        let query = build_query(&request(ReportKind::Monthly, &["1"]), date(2024, 3, 5));
        assert_eq!(query.date_start, date(2024, 2, 1));
        assert_eq!(query.date_end, date(2024, 2, 29));
    }

    #[test]
    fn build_query_is_deterministic() {
        let req = request(ReportKind::Lifetime, &["a", "b"]);
        let today = date(2026, 8, 29);
        assert_eq!(build_query(&req, today), build_query(&req, today));
    }

    #[test]
    fn preset_follows_report_kind() {
        let today = date(2026, 6, 2);
        assert_eq!(
            build_query(&request(ReportKind::Lifetime, &["1"]), today).date_preset,
            "maximum"
        );
        assert_eq!(
            build_query(&request(ReportKind::Monthly, &["1"]), today).date_preset,
            "last_month"
        );
    }

    #[test]
    fn filter_set_round_trips_through_percent_decoding() {
        let ids = ["120217501294810109", "120217501355210109", "id with space"];
        let filter = build_filter_set(&ids.map(String::from));

        let fields: Vec<&str> = filter.split(FILTER_FIELD_SEPARATOR).collect();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0], "SEARCH_BY_ADGROUP_IDS-STRING_SET");
        assert_eq!(fields[1], "ANY");

        let list = fields[2]
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .unwrap();
        let decoded: Vec<String> = list
            .split("%2C")
            .map(|quoted| {
                let inner = quoted
                    .strip_prefix('"')
                    .and_then(|s| s.strip_suffix('"'))
                    .unwrap();
                urlencoding::decode(inner).unwrap().into_owned()
            })
            .collect();
        assert_eq!(decoded, ids);
    }

    #[tokio::test]
    async fn clean_load_never_logs_in() {
        let logins = Cell::new(0);
        navigate_with(
            || async { Ok(()) },
            || {
                logins.set(logins.get() + 1);
                async { Ok(()) }
            },
        )
        .await
        .unwrap();
        assert_eq!(logins.get(), 0);
    }

    #[tokio::test]
    async fn login_redirect_triggers_one_login_and_one_retry() {
        let loads = Cell::new(0);
        let logins = Cell::new(0);
        navigate_with(
            || {
                loads.set(loads.get() + 1);
                let redirected = loads.get() == 1;
                async move {
                    if redirected {
                        Err(RunError::SessionUnavailable)
                    } else {
                        Ok(())
                    }
                }
            },
            || {
                logins.set(logins.get() + 1);
                async { Ok(()) }
            },
        )
        .await
        .unwrap();
        assert_eq!(loads.get(), 2);
        assert_eq!(logins.get(), 1);
    }

    #[tokio::test]
    async fn second_login_redirect_is_fatal() {
        let loads = Cell::new(0);
        let logins = Cell::new(0);
        let err = navigate_with(
            || {
                loads.set(loads.get() + 1);
                async { Err(RunError::SessionUnavailable) }
            },
            || {
                logins.set(logins.get() + 1);
                async { Ok(()) }
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RunError::AuthenticationFailed(_)));
        assert_eq!(loads.get(), 2);
        assert_eq!(logins.get(), 1);
    }

    #[tokio::test]
    async fn login_failure_propagates_without_a_retried_load() {
        let loads = Cell::new(0);
        let err = navigate_with(
            || {
                loads.set(loads.get() + 1);
                async { Err(RunError::SessionUnavailable) }
            },
            || async { Err(RunError::AuthenticationFailed("bad code".to_string())) },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RunError::AuthenticationFailed(msg) if msg == "bad code"));
        assert_eq!(loads.get(), 1);
    }

    #[test]
    fn url_carries_all_required_parameters() {
        let req = request(ReportKind::Lifetime, &["120217501294810109"]);
        let query = build_query(&req, date(2026, 4, 10));
        let url = report_url(&req, &query);

        assert!(url.starts_with(ADS_MANAGER_URL));
        assert!(url.contains("act=915602685684463"));
        assert!(url.contains("business_id=411498659732220"));
        assert!(url.contains("columns=name%2Ccampaign_name%2Ccampaign_group_name%2Cspend"));
        assert!(url.contains("date=2026-03-01_2026-03-31%2Cmaximum"));
        assert!(url.contains("breakdown_regrouping=true"));
        assert!(url.contains("nav_source=no_referrer"));
    }
}
