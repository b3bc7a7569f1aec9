//! Headless JS rendering
//!
//! Some shop pages render their grid client-side; the static fetch returns an
//! empty shell. This module drives a headless Chromium through the same
//! contract as the plain fetcher: wait for network idle, scroll to trigger
//! lazy loading, hand back the final DOM. The browser is per-call and closed
//! on every exit path.

use crate::error::{PipelineError, PipelineResult};
use crate::models::DataSource;
use crate::scrapers::fetcher::FetchOutcome;
use playwright::api::{DocumentLoadState, Viewport};
use playwright::Playwright;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info};

const NAVIGATION_TIMEOUT_MS: f64 = 30_000.0;

/// Incremental scroll that walks the page so lazy-loaded blocks mount.
const SCROLL_SCRIPT: &str = r#"
async () => {
    await new Promise((resolve) => {
        let totalHeight = 0;
        const distance = 100;
        const timer = setInterval(() => {
            const scrollHeight = document.body.scrollHeight;
            window.scrollBy(0, distance);
            totalHeight += distance;
            if (totalHeight >= scrollHeight || totalHeight > 10000) {
                clearInterval(timer);
                resolve();
            }
        }, 100);
    });
}
"#;

/// Render a page in headless Chromium and return the post-JS DOM.
pub async fn render_page(url: &str, user_agent: &str) -> PipelineResult<FetchOutcome> {
    let started = Instant::now();

    let playwright = Playwright::initialize()
        .await
        .map_err(|e| PipelineError::fetch(format!("playwright init failed: {}", e)))?;
    playwright
        .prepare()
        .map_err(|e| PipelineError::fetch(format!("browser install missing: {}", e)))?;

    let chromium = playwright.chromium();
    let browser = chromium
        .launcher()
        .headless(true)
        .args(&[
            "--no-sandbox".to_string(),
            "--disable-setuid-sandbox".to_string(),
            "--disable-blink-features=AutomationControlled".to_string(),
        ])
        .launch()
        .await
        .map_err(|e| PipelineError::fetch(format!("browser launch failed: {}", e)))?;

    // Everything after launch runs inside one block so the browser is closed
    // whichever way it exits.
    let render_result = drive_page(&browser, url, user_agent).await;

    if let Err(e) = browser.close().await {
        debug!("browser close failed: {}", e);
    }

    let body = render_result?;
    let elapsed_ms = started.elapsed().as_millis() as u64;
    info!("JS render finished in {}ms for {}", elapsed_ms, url);

    Ok(FetchOutcome {
        status: 200,
        body,
        headers: Default::default(),
        cookies: Vec::new(),
        elapsed_ms,
        source: DataSource::JsRender,
    })
}

async fn drive_page(
    browser: &playwright::api::Browser,
    url: &str,
    user_agent: &str,
) -> PipelineResult<String> {
    let context = browser
        .context_builder()
        .user_agent(user_agent)
        .viewport(Some(Viewport {
            width: 1920,
            height: 1080,
        }))
        .build()
        .await
        .map_err(|e| PipelineError::fetch(format!("browser context failed: {}", e)))?;

    let page = context
        .new_page()
        .await
        .map_err(|e| PipelineError::fetch(format!("page open failed: {}", e)))?;

    page.goto_builder(url)
        .wait_until(DocumentLoadState::NetworkIdle)
        .timeout(NAVIGATION_TIMEOUT_MS)
        .goto()
        .await
        .map_err(|e| PipelineError::fetch(format!("navigation failed: {}", e)))?;

    sleep(Duration::from_secs(2)).await;

    if let Err(e) = page.eval::<serde_json::Value>(SCROLL_SCRIPT).await {
        debug!("lazy-load scroll failed: {}", e);
    }
    sleep(Duration::from_secs(1)).await;

    let html = page
        .content()
        .await
        .map_err(|e| PipelineError::fetch(format!("content read failed: {}", e)))?;

    if let Err(e) = context.close().await {
        debug!("context close failed: {}", e);
    }

    Ok(html)
}
