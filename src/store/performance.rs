//! Learning substrate persistence
//!
//! One SQLite schema holds everything the extractor learns: per-selector,
//! per-user-agent and per-proxy success counters, crawled product records,
//! extraction chunks and user error reports, plus the pipeline monitoring
//! tables written by the monitor.
//!
//! Key properties:
//! - WAL mode for concurrent reads during writes
//! - A single connection behind a parking_lot mutex; every read-modify-write
//!   happens under the lock, so counters are never observed half-updated
//! - Learning-path failures are the caller's to swallow; this module only
//!   reports them

use crate::models::{Chunk, ProductRecord};
use anyhow::{Context, Result};
use chrono::Utc;
use parking_lot::{Mutex, MutexGuard};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Smoothing factor for the response-time / quality moving averages.
const EMA_ALPHA: f64 = 0.2;

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA temp_store = MEMORY;

CREATE TABLE IF NOT EXISTS selector_stats (
    selector_type TEXT NOT NULL,
    selector TEXT NOT NULL,
    success_count INTEGER NOT NULL DEFAULT 0,
    failure_count INTEGER NOT NULL DEFAULT 0,
    quality_ema REAL NOT NULL DEFAULT 0.0,
    last_used_at TEXT,
    PRIMARY KEY (selector_type, selector)
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS agent_stats (
    user_agent TEXT PRIMARY KEY,
    success_count INTEGER NOT NULL DEFAULT 0,
    failure_count INTEGER NOT NULL DEFAULT 0,
    avg_response_ms REAL NOT NULL DEFAULT 0.0,
    last_used_at TEXT,
    is_active INTEGER NOT NULL DEFAULT 1
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS proxy_stats (
    proxy_url TEXT PRIMARY KEY,
    success_count INTEGER NOT NULL DEFAULT 0,
    failure_count INTEGER NOT NULL DEFAULT 0,
    avg_response_ms REAL NOT NULL DEFAULT 0.0,
    last_used_at TEXT,
    is_active INTEGER NOT NULL DEFAULT 1
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS fetch_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    success INTEGER NOT NULL,
    response_ms INTEGER,
    status_code INTEGER,
    error TEXT,
    user_agent TEXT,
    proxy_used TEXT,
    retry_count INTEGER NOT NULL DEFAULT 0,
    fetched_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_fetch_log_url ON fetch_log(url);
CREATE INDEX IF NOT EXISTS idx_fetch_log_success ON fetch_log(success);

CREATE TABLE IF NOT EXISTS product_records (
    code TEXT PRIMARY KEY,
    url TEXT NOT NULL,
    name TEXT,
    category TEXT,
    brand TEXT,
    payload_json TEXT NOT NULL,
    crawled_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    field TEXT NOT NULL,
    issue_type TEXT NOT NULL,
    extraction_method TEXT NOT NULL,
    selector_pattern TEXT,
    chunk_json TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_field ON chunks(field);

CREATE TABLE IF NOT EXISTS error_reports (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id TEXT NOT NULL,
    url TEXT NOT NULL,
    field TEXT NOT NULL,
    issue_type TEXT NOT NULL,
    severity TEXT NOT NULL,
    description TEXT,
    crawler_value TEXT,
    report_value TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    created_at TEXT NOT NULL,
    resolved_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_error_reports_field ON error_reports(field);
CREATE INDEX IF NOT EXISTS idx_error_reports_status ON error_reports(status);

CREATE TABLE IF NOT EXISTS pipeline_monitoring (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id TEXT NOT NULL,
    url TEXT NOT NULL,
    url_kind TEXT NOT NULL,
    stage TEXT NOT NULL,
    status TEXT NOT NULL,
    duration_ms INTEGER,
    error TEXT,
    metadata TEXT,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_monitoring_stage ON pipeline_monitoring(stage, recorded_at DESC);

CREATE TABLE IF NOT EXISTS pipeline_success_rates (
    period_type TEXT NOT NULL,
    period_start TEXT NOT NULL,
    stage TEXT NOT NULL,
    total_count INTEGER NOT NULL DEFAULT 0,
    success_count INTEGER NOT NULL DEFAULT 0,
    failure_count INTEGER NOT NULL DEFAULT 0,
    success_rate REAL NOT NULL DEFAULT 0.0,
    avg_duration_ms REAL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (period_type, period_start, stage)
) WITHOUT ROWID;
"#;

/// Ranking row for a learned selector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorStat {
    pub selector: String,
    pub successes: u32,
    pub failures: u32,
    pub quality_ema: f64,
}

impl SelectorStat {
    /// Laplace-smoothed success rate used for bandit ranking.
    pub fn success_rate(&self) -> f64 {
        self.successes as f64 / (self.successes + self.failures + 1) as f64
    }
}

/// Aggregates exposed by the crawler-statistics endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerStatistics {
    pub total_fetches: u64,
    pub successful_fetches: u64,
    pub failed_fetches: u64,
    pub success_rate: f64,
    pub avg_response_ms: f64,
    pub tracked_selectors: u64,
    pub stored_products: u64,
    pub pending_error_reports: u64,
}

pub struct PerformanceStore {
    conn: Mutex<Connection>,
}

impl PerformanceStore {
    pub fn new(db_path: &str) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX; // We handle our own locking

        let conn = Connection::open_with_flags(db_path, flags)
            .with_context(|| format!("Failed to open database at {}", db_path))?;

        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to initialize database schema")?;

        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap_or_default();
        if journal_mode.to_lowercase() != "wal" {
            warn!("WAL mode not active, journal_mode = {}", journal_mode);
        }

        info!("Performance store initialized at: {}", db_path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store for tests. WAL is unavailable in memory; everything
    /// else behaves identically.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to initialize database schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Shared connection for sibling modules (pipeline monitor) that keep
    /// their tables in the same schema.
    pub(crate) fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    // -----------------------------------------------------------------------
    // Fetch outcomes (user agents + proxies)
    // -----------------------------------------------------------------------

    /// Record one fetch attempt and fold the outcome into the UA / proxy
    /// counters in a single transaction.
    #[allow(clippy::too_many_arguments)]
    pub fn record_fetch(
        &self,
        url: &str,
        success: bool,
        response_ms: Option<u64>,
        status_code: Option<u16>,
        error: Option<&str>,
        user_agent: Option<&str>,
        proxy_used: Option<&str>,
        retry_count: u32,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO fetch_log (url, success, response_ms, status_code, error, user_agent, proxy_used, retry_count, fetched_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                url,
                success as i64,
                response_ms.map(|v| v as i64),
                status_code.map(|v| v as i64),
                error,
                user_agent,
                proxy_used,
                retry_count as i64,
                now,
            ],
        )?;

        if let Some(ua) = user_agent {
            Self::bump_agent_row(&tx, "agent_stats", "user_agent", ua, success, response_ms, &now)?;
        }
        if let Some(proxy) = proxy_used {
            Self::bump_agent_row(&tx, "proxy_stats", "proxy_url", proxy, success, response_ms, &now)?;
        }

        tx.commit()?;
        Ok(())
    }

    fn bump_agent_row(
        tx: &rusqlite::Transaction<'_>,
        table: &str,
        key_col: &str,
        key: &str,
        success: bool,
        response_ms: Option<u64>,
        now: &str,
    ) -> rusqlite::Result<()> {
        tx.execute(
            &format!(
                "INSERT OR IGNORE INTO {table} ({key_col}, success_count, failure_count, avg_response_ms, last_used_at) \
                 VALUES (?1, 0, 0, 0.0, ?2)"
            ),
            params![key, now],
        )?;

        let current: f64 = tx.query_row(
            &format!("SELECT avg_response_ms FROM {table} WHERE {key_col} = ?1"),
            params![key],
            |row| row.get(0),
        )?;
        let new_avg = match response_ms {
            Some(ms) if current > 0.0 => current * (1.0 - EMA_ALPHA) + ms as f64 * EMA_ALPHA,
            Some(ms) => ms as f64,
            None => current,
        };

        let (succ_inc, fail_inc) = if success { (1, 0) } else { (0, 1) };
        tx.execute(
            &format!(
                "UPDATE {table} SET success_count = success_count + ?1, \
                 failure_count = failure_count + ?2, avg_response_ms = ?3, last_used_at = ?4 \
                 WHERE {key_col} = ?5"
            ),
            params![succ_inc, fail_inc, new_avg, now, key],
        )?;
        Ok(())
    }

    /// Best active user agent by smoothed success rate, ties broken by lower
    /// latency. None when nothing has been recorded yet.
    pub fn best_user_agent(&self) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let ua = conn
            .query_row(
                "SELECT user_agent FROM agent_stats WHERE is_active = 1 \
                 ORDER BY CAST(success_count AS REAL) / (success_count + failure_count + 1) DESC, \
                          avg_response_ms ASC \
                 LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(ua)
    }

    pub fn best_proxy(&self) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let proxy = conn
            .query_row(
                "SELECT proxy_url FROM proxy_stats WHERE is_active = 1 \
                 ORDER BY CAST(success_count AS REAL) / (success_count + failure_count + 1) DESC, \
                          avg_response_ms ASC \
                 LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(proxy)
    }

    /// Deactivate a proxy that keeps failing; it drops out of `best_proxy`.
    pub fn deactivate_proxy(&self, proxy: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE proxy_stats SET is_active = 0 WHERE proxy_url = ?1",
            params![proxy],
        )?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Selector learning
    // -----------------------------------------------------------------------

    pub fn record_selector(
        &self,
        selector_type: &str,
        selector: &str,
        success: bool,
        quality: f64,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT OR IGNORE INTO selector_stats (selector_type, selector, success_count, failure_count, quality_ema, last_used_at) \
             VALUES (?1, ?2, 0, 0, 0.0, ?3)",
            params![selector_type, selector, now],
        )?;

        let current: f64 = tx.query_row(
            "SELECT quality_ema FROM selector_stats WHERE selector_type = ?1 AND selector = ?2",
            params![selector_type, selector],
            |row| row.get(0),
        )?;
        let new_quality = if current > 0.0 {
            current * (1.0 - EMA_ALPHA) + quality * EMA_ALPHA
        } else {
            quality
        };

        let (succ_inc, fail_inc) = if success { (1, 0) } else { (0, 1) };
        tx.execute(
            "UPDATE selector_stats SET success_count = success_count + ?1, \
             failure_count = failure_count + ?2, quality_ema = ?3, last_used_at = ?4 \
             WHERE selector_type = ?5 AND selector = ?6",
            params![succ_inc, fail_inc, new_quality, now, selector_type, selector],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Learned selectors for a field, best first.
    pub fn best_selectors(&self, selector_type: &str, limit: usize) -> Result<Vec<SelectorStat>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT selector, success_count, failure_count, quality_ema FROM selector_stats \
             WHERE selector_type = ?1 \
             ORDER BY CAST(success_count AS REAL) / (success_count + failure_count + 1) DESC, \
                      quality_ema DESC \
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![selector_type, limit as i64], |row| {
                Ok(SelectorStat {
                    selector: row.get(0)?,
                    successes: row.get::<_, i64>(1)? as u32,
                    failures: row.get::<_, i64>(2)? as u32,
                    quality_ema: row.get(3)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    // -----------------------------------------------------------------------
    // Product records
    // -----------------------------------------------------------------------

    /// Upsert a crawled product keyed by its code.
    pub fn save_product(&self, record: &ProductRecord) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let payload = serde_json::to_string(record).context("Failed to serialize record")?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO product_records (code, url, name, category, brand, payload_json, crawled_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7) \
             ON CONFLICT(code) DO UPDATE SET \
                 url = excluded.url, name = excluded.name, category = excluded.category, \
                 brand = excluded.brand, payload_json = excluded.payload_json, updated_at = excluded.updated_at",
            params![
                record.code,
                record.url,
                record.name,
                record.category,
                record.brand,
                payload,
                now,
            ],
        )?;
        Ok(())
    }

    pub fn get_product(&self, code: &str) -> Result<Option<ProductRecord>> {
        let conn = self.conn.lock();
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload_json FROM product_records WHERE code = ?1",
                params![code],
                |row| row.get(0),
            )
            .optional()?;
        match payload {
            Some(json) => Ok(Some(
                serde_json::from_str(&json).context("Failed to deserialize stored record")?,
            )),
            None => Ok(None),
        }
    }

    // -----------------------------------------------------------------------
    // Chunks + error reports (feedback loop)
    // -----------------------------------------------------------------------

    pub fn add_chunk(&self, chunk: &Chunk) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        let payload = serde_json::to_string(chunk).context("Failed to serialize chunk")?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO chunks (field, issue_type, extraction_method, selector_pattern, chunk_json, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                chunk.field,
                chunk.issue_type,
                chunk.extraction_method,
                chunk.selector_pattern,
                payload,
                now,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Chunks are learning artifacts; they are returned regardless of whether
    /// the report that produced them was resolved.
    pub fn chunks_for_field(&self, field: &str) -> Result<Vec<Chunk>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT chunk_json FROM chunks WHERE field = ?1 ORDER BY id DESC",
        )?;
        let rows = stmt
            .query_map(params![field], |row| row.get::<_, String>(0))?
            .filter_map(|r| r.ok())
            .filter_map(|json| serde_json::from_str(&json).ok())
            .collect();
        Ok(rows)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn save_error_report(
        &self,
        job_id: &str,
        url: &str,
        field: &str,
        issue_type: &str,
        severity: &str,
        description: Option<&str>,
        crawler_value: Option<&str>,
        report_value: Option<&str>,
    ) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO error_reports (job_id, url, field, issue_type, severity, description, crawler_value, report_value, status, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'pending', ?9)",
            params![
                job_id,
                url,
                field,
                issue_type,
                severity,
                description,
                crawler_value,
                report_value,
                now,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Flip a report to resolved. Returns false when the id is unknown.
    pub fn resolve_error_report(&self, report_id: i64) -> Result<bool> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE error_reports SET status = 'resolved', resolved_at = ?1 WHERE id = ?2 AND status = 'pending'",
            params![now, report_id],
        )?;
        Ok(updated > 0)
    }

    /// Fields with the most open error reports, most reported first.
    pub fn priority_fields(&self, limit: usize) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT field, COUNT(*) AS report_count FROM error_reports \
             WHERE status = 'pending' \
             GROUP BY field \
             ORDER BY report_count DESC, field \
             LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| row.get::<_, String>(0))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    // -----------------------------------------------------------------------
    // Aggregate statistics
    // -----------------------------------------------------------------------

    pub fn statistics(&self) -> Result<CrawlerStatistics> {
        let conn = self.conn.lock();
        let (total, successes, avg_ms): (i64, i64, f64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(success), 0), COALESCE(AVG(response_ms), 0.0) FROM fetch_log",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        let tracked_selectors: i64 =
            conn.query_row("SELECT COUNT(*) FROM selector_stats", [], |row| row.get(0))?;
        let stored_products: i64 =
            conn.query_row("SELECT COUNT(*) FROM product_records", [], |row| row.get(0))?;
        let pending_reports: i64 = conn.query_row(
            "SELECT COUNT(*) FROM error_reports WHERE status = 'pending'",
            [],
            |row| row.get(0),
        )?;

        let failures = total - successes;
        let success_rate = if total > 0 {
            successes as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        Ok(CrawlerStatistics {
            total_fetches: total as u64,
            successful_fetches: successes as u64,
            failed_fetches: failures as u64,
            success_rate,
            avg_response_ms: avg_ms,
            tracked_selectors: tracked_selectors as u64,
            stored_products: stored_products as u64,
            pending_error_reports: pending_reports as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChunkContext, DataSource};
    use std::collections::HashMap;

    fn store() -> PerformanceStore {
        PerformanceStore::in_memory().expect("in-memory store")
    }

    fn sample_record(code: &str) -> ProductRecord {
        ProductRecord {
            url: format!(
                "https://www.qoo10.jp/gmkt.inc/Goods/Goods.aspx?goodscode={}",
                code
            ),
            code: code.to_string(),
            name: "테스트 상품".to_string(),
            category: Some("뷰티".to_string()),
            brand: None,
            price: Default::default(),
            images: Default::default(),
            description: String::new(),
            search_keywords: vec![],
            reviews: Default::default(),
            seller: Default::default(),
            shipping: Default::default(),
            points: Default::default(),
            coupon: Default::default(),
            is_promoted: false,
            source: DataSource::HtmlFetch,
            page_structure: None,
        }
    }

    #[test]
    fn repeated_success_dominates_ranking() {
        let s = store();
        for _ in 0..8 {
            s.record_selector("product_name", "h1.product-name", true, 1.0)
                .unwrap();
        }
        s.record_selector("product_name", ".goods_title", true, 1.0)
            .unwrap();
        s.record_selector("product_name", ".goods_title", false, 0.0)
            .unwrap();

        let ranked = s.best_selectors("product_name", 2).unwrap();
        assert_eq!(ranked[0].selector, "h1.product-name");
        assert!(ranked[0].success_rate() >= ranked[1].success_rate());
    }

    #[test]
    fn fetch_outcomes_update_agent_counters() {
        let s = store();
        s.record_fetch(
            "https://www.qoo10.jp/g/123",
            true,
            Some(420),
            Some(200),
            None,
            Some("ua-fast"),
            None,
            0,
        )
        .unwrap();
        s.record_fetch(
            "https://www.qoo10.jp/g/123",
            false,
            Some(900),
            Some(429),
            Some("too many requests"),
            Some("ua-slow"),
            None,
            1,
        )
        .unwrap();

        assert_eq!(s.best_user_agent().unwrap().as_deref(), Some("ua-fast"));

        let stats = s.statistics().unwrap();
        assert_eq!(stats.total_fetches, 2);
        assert_eq!(stats.successful_fetches, 1);
        assert!((stats.success_rate - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn deactivated_proxy_drops_out() {
        let s = store();
        s.record_fetch("u", true, Some(100), Some(200), None, None, Some("http://p1"), 0)
            .unwrap();
        assert_eq!(s.best_proxy().unwrap().as_deref(), Some("http://p1"));
        s.deactivate_proxy("http://p1").unwrap();
        assert_eq!(s.best_proxy().unwrap(), None);
    }

    #[test]
    fn product_upsert_keeps_one_row_per_code() {
        let s = store();
        s.save_product(&sample_record("1234")).unwrap();
        let mut updated = sample_record("1234");
        updated.name = "갱신된 상품".to_string();
        s.save_product(&updated).unwrap();

        let stored = s.get_product("1234").unwrap().unwrap();
        assert_eq!(stored.name, "갱신된 상품");
        assert_eq!(s.statistics().unwrap().stored_products, 1);
    }

    #[test]
    fn chunks_survive_report_resolution() {
        let s = store();
        let report_id = s
            .save_error_report(
                "job-1",
                "https://www.qoo10.jp/g/1",
                "price_sale",
                "mismatch",
                "high",
                None,
                Some("4980"),
                Some("5980"),
            )
            .unwrap();

        let chunk = Chunk {
            field: "price_sale".to_string(),
            issue_type: "mismatch".to_string(),
            extraction_method: "dom_analysis".to_string(),
            selector_pattern: Some(".goods_price".to_string()),
            related_classes: vec!["goods_price".to_string()],
            class_frequency: HashMap::new(),
            element_present: true,
            context: ChunkContext {
                url: "https://www.qoo10.jp/g/1".to_string(),
                code: Some("1".to_string()),
            },
        };
        s.add_chunk(&chunk).unwrap();

        assert_eq!(s.priority_fields(10).unwrap(), vec!["price_sale"]);
        assert!(s.resolve_error_report(report_id).unwrap());
        // Resolving removes the field from the priority list but keeps the chunk.
        assert!(s.priority_fields(10).unwrap().is_empty());
        assert_eq!(s.chunks_for_field("price_sale").unwrap().len(), 1);
    }

    #[test]
    fn priority_fields_order_by_open_reports() {
        let s = store();
        for _ in 0..3 {
            s.save_error_report("j", "u", "review_count", "mismatch", "medium", None, None, None)
                .unwrap();
        }
        s.save_error_report("j", "u", "description", "missing", "low", None, None, None)
            .unwrap();

        let fields = s.priority_fields(10).unwrap();
        assert_eq!(fields, vec!["review_count", "description"]);
    }
}
