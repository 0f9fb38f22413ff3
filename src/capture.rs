//! Capture engine: waits for the report region to render, then extracts
//! its pixels as a cropped PNG.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Context;
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams, Viewport,
};
use chromiumoxide::Page;
use serde::Deserialize;

use crate::error::RunError;
use crate::job::CaptureArtifact;

/// Selector for the rendered report table.
const REGION_SELECTOR: &str = r#"div[role="table"]._3h1i._1mie"#;

/// Upper bound on waiting for the region to appear.
const REGION_TIMEOUT: Duration = Duration::from_secs(30);

const REGION_POLL: Duration = Duration::from_millis(250);

/// Report grids populate after initial paint; give the async content a
/// fixed window to finish before reading pixels.
const SETTLE_DELAY: Duration = Duration::from_secs(5);

/// Caps on the clip size, so a degenerate layout can't produce an
/// absurd capture.
const MAX_CLIP_WIDTH: f64 = 1920.0;
const MAX_CLIP_HEIGHT: f64 = 1080.0;

#[derive(Debug, Deserialize)]
struct Rect {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

/// Wait for the report region to be present and visible, then let it
/// settle.
///
/// Readiness requires a non-degenerate bounding box, not just DOM
/// presence; a hidden table would otherwise produce a blank capture.
/// Timing out is fatal; transient rendering issues are mitigated only by
/// the settle delay, never by retrying.
pub async fn wait_for_ready(page: &Page) -> Result<(), RunError> {
    tracing::info!("Waiting for the report table to render");
    let deadline = Instant::now() + REGION_TIMEOUT;
    while region_bounds(page).await.is_err() {
        if Instant::now() >= deadline {
            return Err(RunError::RegionNotFound {
                timeout: REGION_TIMEOUT,
            });
        }
        tokio::time::sleep(REGION_POLL).await;
    }

    tracing::info!(
        settle_secs = SETTLE_DELAY.as_secs(),
        "Report table visible; waiting for content to stabilize"
    );
    tokio::time::sleep(SETTLE_DELAY).await;
    Ok(())
}

/// Capture the report region into `output_dir/file_name`.
pub async fn capture(
    page: &Page,
    output_dir: &Path,
    file_name: &str,
) -> Result<CaptureArtifact, RunError> {
    let element = page
        .find_element(REGION_SELECTOR)
        .await
        .map_err(|_| RunError::CaptureFailed("report table disappeared before capture".into()))?;

    element
        .scroll_into_view()
        .await
        .map_err(|e| RunError::CaptureFailed(format!("could not scroll region into view: {e}")))?;

    let rect = region_bounds(page).await?;

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output dir: {}", output_dir.display()))?;
    let file_path = output_dir.join(file_name);

    let clip = Viewport {
        x: rect.x.max(0.0),
        y: rect.y.max(0.0),
        width: rect.width.min(MAX_CLIP_WIDTH),
        height: rect.height.min(MAX_CLIP_HEIGHT),
        scale: 1.0,
    };

    let params = CaptureScreenshotParams::builder()
        .format(CaptureScreenshotFormat::Png)
        .clip(clip)
        .build();
    let bytes = page
        .screenshot(params)
        .await
        .map_err(|e| RunError::CaptureFailed(format!("screenshot failed: {e}")))?;

    std::fs::write(&file_path, &bytes)
        .with_context(|| format!("Failed to write capture: {}", file_path.display()))?;

    let decoded = image::load_from_memory(&bytes)
        .map_err(|e| RunError::CaptureFailed(format!("captured image is not a valid PNG: {e}")))?;

    tracing::info!(
        path = %file_path.display(),
        width = decoded.width(),
        height = decoded.height(),
        "Capture saved"
    );

    Ok(CaptureArtifact {
        file_path,
        width_px: decoded.width(),
        height_px: decoded.height(),
    })
}

/// Read the region's on-screen bounding box.
async fn region_bounds(page: &Page) -> Result<Rect, RunError> {
    let js = format!(
        r#"(() => {{
            const el = document.querySelector('{REGION_SELECTOR}');
            if (!el) return null;
            const r = el.getBoundingClientRect();
            return {{ x: r.x, y: r.y, width: r.width, height: r.height }};
        }})()"#
    );

    let rect: Option<Rect> = page
        .evaluate(js)
        .await
        .map_err(|e| RunError::CaptureFailed(format!("could not evaluate region bounds: {e}")))?
        .into_value()
        .map_err(|e| RunError::CaptureFailed(format!("unreadable region bounds: {e}")))?;

    visible_bounds(rect)
}

/// Accept only a rendered, on-screen box.
fn visible_bounds(rect: Option<Rect>) -> Result<Rect, RunError> {
    let rect =
        rect.ok_or_else(|| RunError::CaptureFailed("region has no bounding box".to_string()))?;
    if rect.width <= 0.0 || rect.height <= 0.0 {
        return Err(RunError::CaptureFailed(format!(
            "degenerate region bounds: {}x{}",
            rect.width, rect.height
        )));
    }
    Ok(rect)
}
