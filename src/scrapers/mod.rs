//! Adaptive extraction engine
//!
//! Composition over inheritance: the fetcher knows how to get bytes, the
//! parsers know how to turn bytes into records, and `Scraper` is the thin
//! struct that wires both to the learning store.

pub mod browser;
pub mod fetcher;
pub mod lexicon;
pub mod product;
pub mod shop;
pub mod structure;
pub mod urls;

use crate::error::PipelineResult;
use crate::models::{ProductRecord, ShopRecord};
use crate::store::PerformanceStore;
use fetcher::AdaptiveFetcher;
use product::ProductParser;
use shop::ShopParser;
use std::sync::Arc;
use tracing::{info, warn};

pub struct Scraper {
    fetcher: AdaptiveFetcher,
    product_parser: ProductParser,
    shop_parser: ShopParser,
    store: Arc<PerformanceStore>,
}

impl Scraper {
    pub fn new(store: Arc<PerformanceStore>, proxies: Vec<String>) -> Self {
        Self {
            fetcher: AdaptiveFetcher::new(store.clone(), proxies),
            product_parser: ProductParser::new(store.clone()),
            shop_parser: ShopParser::new(),
            store,
        }
    }

    /// Fetch and normalize a product page.
    pub async fn crawl_product(&self, url: &str) -> PipelineResult<ProductRecord> {
        let normalized = urls::normalize_product_url(url);
        let outcome = self.fetcher.fetch(&normalized).await?;
        let record = self
            .product_parser
            .parse(&outcome.body, &normalized, outcome.source)?;

        info!(
            "Crawled product {} ({} detail images, {}ms)",
            record.code,
            record.images.detail.len(),
            outcome.elapsed_ms
        );

        // Persisting the record is a side effect; a storage failure must not
        // fail the job.
        if !record.code.is_empty() {
            if let Err(e) = self.store.save_product(&record) {
                warn!("product record not persisted: {}", e);
            }
        }

        Ok(record)
    }

    /// Fetch and normalize a shop page. Falls back to a JS render when the
    /// static page carries no product grid.
    pub async fn crawl_shop(&self, url: &str) -> PipelineResult<ShopRecord> {
        let outcome = self.fetcher.fetch(url).await?;
        let record = self.shop_parser.parse(&outcome.body, url, outcome.source)?;

        if !record.products.is_empty() || record.product_count > 0 {
            return Ok(record);
        }

        info!("Static shop page looks empty, rendering with JS: {}", url);
        match browser::render_page(url, fetcher::USER_AGENTS[0]).await {
            Ok(rendered) => self.shop_parser.parse(&rendered.body, url, rendered.source),
            Err(e) => {
                // The render is an enhancement; the static parse is still a
                // valid (if sparse) record.
                warn!("JS render failed, keeping static parse: {}", e);
                Ok(record)
            }
        }
    }
}
