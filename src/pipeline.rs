use crate::config::CrawlConfig;
use crate::constants::DEFAULT_LOOKBACK_DAYS;
use crate::pacer::Pacer;
use crate::types::{CrawlResult, SiteAdapter};
use chrono::Local;
use metrics::{counter, histogram};
use tracing::{debug, error, info, instrument};

/// Phases of one crawl run. `Done` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlState {
    Listing,
    Enriching,
    Done,
}

#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Keep only the first N catalog entries
    pub max_products: Option<usize>,
    pub lookback_days: u32,
    pub pacer: Pacer,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            max_products: None,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            pacer: Pacer::new(
                std::time::Duration::from_secs(1),
                std::time::Duration::from_secs(3),
            ),
        }
    }
}

impl CrawlOptions {
    pub fn from_config(config: &CrawlConfig, max_products: Option<usize>) -> Self {
        Self {
            max_products,
            lookback_days: config.lookback_days,
            pacer: Pacer::from_config(config),
        }
    }
}

/// Drives one adapter through listing, enrichment and aggregation.
pub struct Pipeline {
    options: CrawlOptions,
    state: CrawlState,
}

impl Pipeline {
    pub fn new(options: CrawlOptions) -> Self {
        Self {
            options,
            state: CrawlState::Listing,
        }
    }

    pub fn state(&self) -> CrawlState {
        self.state
    }

    fn transition(&mut self, next: CrawlState) {
        debug!("Crawl state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Run the adapter end to end. Never fails: a catalog that cannot be read
    /// produces an empty result, per-product failures only thin out that product.
    #[instrument(skip(self, adapter), fields(adapter = %adapter.name()))]
    pub async fn run(&mut self, adapter: &dyn SiteAdapter) -> CrawlResult {
        let crawled_at = Local::now();
        let adapter_name = adapter.name().to_string();
        let mut result =
            CrawlResult::empty(adapter.company_name(), adapter.company_url(), crawled_at);

        counter!("fin_crawl_runs_total", "adapter" => adapter_name.clone()).increment(1);
        let t_run = std::time::Instant::now();

        info!("🚀 Starting crawl for {}", adapter.company_name());
        self.state = CrawlState::Listing;

        let mut products = match adapter.list_catalog().await {
            Ok(products) => products,
            Err(e) => {
                error!("Catalog listing failed, aborting run: {}", e);
                counter!("fin_crawl_aborted_total", "adapter" => adapter_name).increment(1);
                self.transition(CrawlState::Done);
                return result;
            }
        };
        if let Some(max) = self.options.max_products {
            products.truncate(max);
        }

        self.transition(CrawlState::Enriching);
        let total = products.len();

        for (i, mut product) in products.into_iter().enumerate() {
            info!(
                "Processing product {}/{}: {}",
                i + 1,
                total,
                product.product_name.as_deref().unwrap_or_default()
            );

            if let Some(details_url) = product.details_url.clone() {
                let details = adapter.fetch_details(&details_url).await;
                if details.is_empty() {
                    debug!("No details obtained for {}", product.product_code);
                }
                product.merge_details(details);
            }

            if !product.product_code.is_empty() {
                let returns = adapter
                    .fetch_returns(&product.product_code, self.options.lookback_days)
                    .await;
                result.daily_returns.extend(returns);
            }

            result.products.push(product);

            if i + 1 < total {
                self.options.pacer.pause().await;
            }
        }

        self.transition(CrawlState::Done);

        counter!("fin_products_crawled_total", "adapter" => adapter_name.clone())
            .increment(result.products.len() as u64);
        counter!("fin_returns_crawled_total", "adapter" => adapter_name.clone())
            .increment(result.daily_returns.len() as u64);
        histogram!("fin_crawl_duration_seconds", "adapter" => adapter_name)
            .record(t_run.elapsed().as_secs_f64());

        info!(
            "✅ Finished crawl for {}: {} products, {} return rows",
            result.company_name,
            result.products.len(),
            result.daily_returns.len()
        );
        result
    }
}
