use crate::error::Result;
use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// A financial product as scraped from a partner catalog.
///
/// Records coming out of an adapter are partial: only `product_code` is
/// guaranteed. `id` is populated once the record has been read back from the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: Option<i64>,
    pub product_code: String,
    pub product_name: Option<String>,
    pub company_name: Option<String>,
    pub company_url: Option<String>,
    pub product_type: Option<String>,
    pub risk_level: Option<String>,
    pub investment_horizon: Option<String>,
    pub min_investment: Option<f64>,
    pub expected_return: Option<f64>,
    pub actual_return: Option<f64>,
    pub status: Option<String>,
    pub establishment_date: Option<NaiveDate>,
    pub maturity_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub details_url: Option<String>,
    pub last_update: Option<NaiveDate>,
}

impl ProductRecord {
    pub fn new(product_code: impl Into<String>) -> Self {
        Self {
            product_code: product_code.into(),
            ..Default::default()
        }
    }

    /// Overlay the fields a details page can supply. Absent fields never
    /// clear a value that is already present.
    pub fn merge_details(&mut self, details: ProductDetails) {
        if let Some(v) = details.min_investment {
            self.min_investment = Some(v);
        }
        if let Some(v) = details.status {
            self.status = Some(v);
        }
        if let Some(v) = details.establishment_date {
            self.establishment_date = Some(v);
        }
        if let Some(v) = details.maturity_date {
            self.maturity_date = Some(v);
        }
        if let Some(v) = details.description {
            self.description = Some(v);
        }
        if let Some(v) = details.actual_return {
            self.actual_return = Some(v);
        }
    }
}

/// Field delta extracted from a product details page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductDetails {
    pub min_investment: Option<f64>,
    pub status: Option<String>,
    pub establishment_date: Option<NaiveDate>,
    pub maturity_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub actual_return: Option<f64>,
}

impl ProductDetails {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// One day of return history for a product, keyed by `(product_code, date)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnRecord {
    pub product_code: String,
    pub date: NaiveDate,
    pub unit_net_value: Option<f64>,
    pub cumulative_net_value: Option<f64>,
    /// Percent
    pub daily_return_rate: Option<f64>,
    /// Percent
    pub seven_day_annualized: Option<f64>,
}

/// Everything gathered by one crawl run for one partner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlResult {
    pub company_name: String,
    pub company_url: String,
    pub crawled_at: DateTime<Local>,
    pub products: Vec<ProductRecord>,
    pub daily_returns: Vec<ReturnRecord>,
}

impl CrawlResult {
    pub fn empty(company_name: &str, company_url: &str, crawled_at: DateTime<Local>) -> Self {
        Self {
            company_name: company_name.to_string(),
            company_url: company_url.to_string(),
            crawled_at,
            products: Vec::new(),
            daily_returns: Vec::new(),
        }
    }

    pub fn crawl_date(&self) -> NaiveDate {
        self.crawled_at.date_naive()
    }
}

/// Counts reported after a crawl result has been persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub company_name: String,
    pub products_count: usize,
    pub products_new: usize,
    pub products_updated: usize,
    pub returns_count: usize,
    pub returns_new: usize,
}

/// A financial partner listed on the WeBank partner page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partner {
    pub name: String,
    pub url: String,
}

/// Capability set every partner site adapter implements
#[async_trait::async_trait]
pub trait SiteAdapter: Send + Sync {
    /// Identifier used on the command line
    fn name(&self) -> &'static str;

    fn company_name(&self) -> &str;

    fn company_url(&self) -> &str;

    /// Walk the paginated catalog. Only products with both a code and a name
    /// are returned. Errors only when the catalog cannot be read at all.
    async fn list_catalog(&self) -> Result<Vec<ProductRecord>>;

    /// Extract the details delta for one product; empty on any failure.
    async fn fetch_details(&self, details_url: &str) -> ProductDetails;

    /// Return history over the trailing `lookback_days` ending today; empty on failure.
    async fn fetch_returns(&self, product_code: &str, lookback_days: u32) -> Vec<ReturnRecord>;
}
