//! Adaptive HTTP Fetcher
//!
//! One fetch per call, with the user agent and proxy chosen from the learning
//! substrate. The choice is cached for a warm interval; a failed attempt
//! invalidates the cache so the retry runs with a fresh identity. Every
//! attempt (success or failure) is recorded back to the store.

use crate::error::{PipelineError, PipelineResult};
use crate::models::DataSource;
use crate::store::PerformanceStore;
use anyhow::Result;
use parking_lot::Mutex;
use rand::Rng;
use reqwest::header::SET_COOKIE;
use reqwest::StatusCode;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, warn};

pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const TOTAL_BUDGET: Duration = Duration::from_secs(45);
const MAX_RETRIES: u32 = 2;
const RETRY_DELAY_BASE_MS: u64 = 1_000;
const CHOICE_WARM_INTERVAL: Duration = Duration::from_secs(600);

/// Result of one successful fetch.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub status: u16,
    pub body: String,
    pub headers: HashMap<String, String>,
    pub cookies: Vec<String>,
    pub elapsed_ms: u64,
    pub source: DataSource,
}

#[derive(Clone)]
struct IdentityChoice {
    user_agent: String,
    proxy: Option<String>,
    chosen_at: Instant,
}

pub struct AdaptiveFetcher {
    store: Arc<PerformanceStore>,
    proxies: Vec<String>,
    choice: Mutex<Option<IdentityChoice>>,
    max_retries: u32,
}

impl AdaptiveFetcher {
    pub fn new(store: Arc<PerformanceStore>, proxies: Vec<String>) -> Self {
        Self {
            store,
            proxies,
            choice: Mutex::new(None),
            max_retries: MAX_RETRIES,
        }
    }

    /// Pick the UA/proxy pair, preferring the store's ranking, falling back
    /// to a random default. The choice stays warm for 10 minutes.
    fn current_choice(&self) -> IdentityChoice {
        let mut guard = self.choice.lock();
        if let Some(choice) = guard.as_ref() {
            if choice.chosen_at.elapsed() < CHOICE_WARM_INTERVAL {
                return choice.clone();
            }
        }

        let user_agent = match self.store.best_user_agent() {
            Ok(Some(ua)) => ua,
            Ok(None) => random_user_agent(),
            Err(e) => {
                debug!("UA lookup failed, using random default: {}", e);
                random_user_agent()
            }
        };

        let proxy = if self.proxies.is_empty() {
            None
        } else {
            match self.store.best_proxy() {
                Ok(Some(p)) => Some(p),
                _ => {
                    let idx = rand::thread_rng().gen_range(0..self.proxies.len());
                    Some(self.proxies[idx].clone())
                }
            }
        };

        let choice = IdentityChoice {
            user_agent,
            proxy,
            chosen_at: Instant::now(),
        };
        *guard = Some(choice.clone());
        choice
    }

    /// Drop the cached identity so the next attempt asks the store again.
    fn invalidate_choice(&self) {
        *self.choice.lock() = None;
    }

    fn build_client(&self, choice: &IdentityChoice) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(choice.user_agent.clone())
            .cookie_store(true);
        if let Some(proxy) = &choice.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }
        Ok(builder.build()?)
    }

    /// Fetch a page body, retrying blockable statuses and network failures
    /// with a fresh identity each time.
    pub async fn fetch(&self, url: &str) -> PipelineResult<FetchOutcome> {
        let budget_start = Instant::now();

        for attempt in 0..=self.max_retries {
            if attempt == 0 {
                // Human-looking jitter before the first request.
                let delay = rand::thread_rng().gen_range(500..=1500);
                sleep(Duration::from_millis(delay)).await;
            } else {
                sleep(backoff_delay(attempt)).await;
            }

            if budget_start.elapsed() > TOTAL_BUDGET {
                return Err(PipelineError::fetch(format!(
                    "fetch budget exhausted after {} attempts for {}",
                    attempt, url
                )));
            }

            let choice = self.current_choice();
            let client = self
                .build_client(&choice)
                .map_err(|e| PipelineError::fetch(format!("client build failed: {}", e)))?;

            let attempt_start = Instant::now();
            let headers_result = client
                .get(url)
                .header(
                    "Accept",
                    "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
                )
                .header("Accept-Language", "ja,en-US;q=0.9,en;q=0.8")
                .send()
                .await;

            match headers_result {
                Ok(response) => {
                    let status = response.status();
                    let elapsed_ms = attempt_start.elapsed().as_millis() as u64;

                    if status.is_success() {
                        let headers: HashMap<String, String> = response
                            .headers()
                            .iter()
                            .filter_map(|(name, value)| {
                                value
                                    .to_str()
                                    .ok()
                                    .map(|v| (name.as_str().to_string(), v.to_string()))
                            })
                            .collect();
                        let cookies: Vec<String> = response
                            .headers()
                            .get_all(SET_COOKIE)
                            .iter()
                            .filter_map(|v| v.to_str().ok().map(str::to_string))
                            .collect();
                        let body = response.text().await.map_err(|e| {
                            PipelineError::fetch(format!("body read failed: {}", e))
                        })?;
                        self.record_attempt(url, true, elapsed_ms, Some(status.as_u16()), None, &choice, attempt);
                        return Ok(FetchOutcome {
                            status: status.as_u16(),
                            body,
                            headers,
                            cookies,
                            elapsed_ms,
                            source: DataSource::HtmlFetch,
                        });
                    }

                    self.record_attempt(
                        url,
                        false,
                        elapsed_ms,
                        Some(status.as_u16()),
                        Some(&format!("HTTP {}", status)),
                        &choice,
                        attempt,
                    );

                    if is_retryable_status(status) && attempt < self.max_retries {
                        warn!("Blocked with {} on attempt {}, rotating identity", status, attempt + 1);
                        self.invalidate_choice();
                        continue;
                    }

                    return Err(PipelineError::fetch(format!("HTTP {} for {}", status, url)));
                }
                Err(e) => {
                    let elapsed_ms = attempt_start.elapsed().as_millis() as u64;
                    self.record_attempt(
                        url,
                        false,
                        elapsed_ms,
                        None,
                        Some(&e.to_string()),
                        &choice,
                        attempt,
                    );

                    if attempt < self.max_retries {
                        warn!("Request failed on attempt {}: {}, retrying", attempt + 1, e);
                        self.invalidate_choice();
                        continue;
                    }

                    let reason = if e.is_timeout() {
                        format!("request timed out for {}", url)
                    } else {
                        format!("network failure for {}: {}", url, e)
                    };
                    return Err(PipelineError::fetch(reason));
                }
            }
        }

        Err(PipelineError::fetch(format!("retries exhausted for {}", url)))
    }

    /// Learning writes are best-effort; a storage hiccup never fails a fetch.
    fn record_attempt(
        &self,
        url: &str,
        success: bool,
        elapsed_ms: u64,
        status: Option<u16>,
        error: Option<&str>,
        choice: &IdentityChoice,
        attempt: u32,
    ) {
        if let Err(e) = self.store.record_fetch(
            url,
            success,
            Some(elapsed_ms),
            status,
            error,
            Some(&choice.user_agent),
            choice.proxy.as_deref(),
            attempt,
        ) {
            debug!("fetch outcome not recorded: {}", e);
        }
    }
}

fn random_user_agent() -> String {
    let idx = rand::thread_rng().gen_range(0..USER_AGENTS.len());
    USER_AGENTS[idx].to_string()
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(RETRY_DELAY_BASE_MS * 2u64.pow(attempt))
}

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS | StatusCode::FORBIDDEN | StatusCode::SERVICE_UNAVAILABLE
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(backoff_delay(1), Duration::from_millis(2_000));
        assert_eq!(backoff_delay(2), Duration::from_millis(4_000));
    }

    #[test]
    fn retry_table_matches_blockable_statuses() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::FORBIDDEN));
        assert!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
        assert!(!is_retryable_status(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn choice_cache_is_reused_within_warm_interval() {
        let store = Arc::new(PerformanceStore::in_memory().unwrap());
        let fetcher = AdaptiveFetcher::new(store, vec![]);
        let first = fetcher.current_choice();
        let second = fetcher.current_choice();
        assert_eq!(first.user_agent, second.user_agent);

        fetcher.invalidate_choice();
        assert!(fetcher.choice.lock().is_none());
        let third = fetcher.current_choice();
        assert!(!third.user_agent.is_empty());
    }
}
