//! The cleanup contract: output directory removed iff the run succeeded,
//! session file removed iff invalidation was requested, independent of
//! the run outcome.

use std::sync::Arc;

use adshot::config::BrowserSettings;
use adshot::job::{CaptureJob, CaptureRequest, Month, ReportKind};
use adshot::orchestrator::{finalize_run, Orchestrator};
use adshot::publish::{DriveClient, GoogleAuth, Publisher, SheetsClient};
use adshot::session::{SessionStore, StoredCookie};
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    output_dir: std::path::PathBuf,
    store: SessionStore,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let output_dir = dir.path().join("screenshots");
    std::fs::create_dir_all(&output_dir).unwrap();
    std::fs::write(output_dir.join("BR_FPM-FB_MARZO_1"), b"png").unwrap();

    let store = SessionStore::new(dir.path().join("cookies.json"));
    store
        .save(&[StoredCookie {
            name: "c_user".to_string(),
            value: "123".to_string(),
            domain: Some(".facebook.com".to_string()),
            path: Some("/".to_string()),
            expires: None,
            http_only: false,
            secure: true,
        }])
        .unwrap();

    Fixture {
        _dir: dir,
        output_dir,
        store,
    }
}

#[test]
fn success_removes_output_dir_and_keeps_session() {
    let f = fixture();
    finalize_run(true, &f.output_dir, &f.store, false);
    assert!(!f.output_dir.exists());
    assert!(f.store.load().is_some());
}

#[test]
fn failure_keeps_output_dir_for_inspection() {
    let f = fixture();
    finalize_run(false, &f.output_dir, &f.store, false);
    assert!(f.output_dir.exists());
    assert!(f.store.load().is_some());
}

#[test]
fn invalidation_removes_session_on_success() {
    let f = fixture();
    finalize_run(true, &f.output_dir, &f.store, true);
    assert!(!f.output_dir.exists());
    assert!(f.store.load().is_none());
}

#[test]
fn invalidation_removes_session_on_failure_too() {
    let f = fixture();
    finalize_run(false, &f.output_dir, &f.store, true);
    assert!(f.output_dir.exists());
    assert!(f.store.load().is_none());
}

#[test]
fn cleanup_tolerates_missing_output_dir() {
    let f = fixture();
    std::fs::remove_dir_all(&f.output_dir).unwrap();
    finalize_run(true, &f.output_dir, &f.store, true);
    assert!(f.store.load().is_none());
}

#[tokio::test]
async fn browser_launch_failure_still_honors_invalidation() {
    let f = fixture();

    let auth = Arc::new(GoogleAuth::with_static_token("test-token"));
    let publisher = Publisher::new(
        DriveClient::new(auth.clone()),
        SheetsClient::new(auth),
        "sheet-1",
        "Evidencias",
    );
    let orchestrator = Orchestrator::new(
        BrowserSettings {
            headless: true,
            chrome_executable: Some("/nonexistent/chrome-binary".into()),
        },
        f.output_dir.clone(),
        SessionStore::new(f.store.path()),
        None,
        publisher,
    );

    let job = CaptureJob {
        request: CaptureRequest {
            account_id: "915602685684463".to_string(),
            business_id: "411498659732220".to_string(),
            ad_set_id: "120217253965030109".to_string(),
            ad_ids: vec!["120217501294810109".to_string()],
            report_kind: ReportKind::Lifetime,
            month: Month::Marzo,
            label: "BR_FPM-FB_MARZO_1".to_string(),
        },
        second_factor: None,
        invalidate_session: true,
    };

    assert!(orchestrator.run(job).await.is_err());
    assert!(f.output_dir.exists());
    assert!(f.store.load().is_none());
}
