use crate::constants::{
    ICBC_ADAPTER, ICBC_BASE_URL, ICBC_COMPANY_NAME, ICBC_PRODUCT_LIST_URL,
    ICBC_PRODUCT_RETURN_API,
};
use crate::error::{Result, ScraperError};
use crate::fetch::PageFetcher;
use crate::normalize::{clean_text, parse_date};
use crate::pacer::Pacer;
use crate::types::{ProductDetails, ProductRecord, ReturnRecord, SiteAdapter};
use chrono::{Duration, Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

// Product codes are ASCII; the label in front of them is not
static CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Za-z0-9][A-Za-z0-9_-]*)").unwrap());
static PERCENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+\.\d+)%").unwrap());
static AMOUNT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)").unwrap());

static ITEM_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".product-list .product-item").unwrap());
static NEXT_PAGE_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".pagination .next:not(.disabled)").unwrap());
static DETAIL_LINK_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("a.detail-link").unwrap());
static NAME_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse(".product-name").unwrap());
static CODE_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse(".product-code").unwrap());
static TYPE_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse(".product-type").unwrap());
static RISK_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse(".risk-level").unwrap());
static EXPECTED_RETURN_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".expected-return").unwrap());
static PERIOD_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse(".investment-period").unwrap());

static MIN_INVESTMENT_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".min-investment").unwrap());
static STATUS_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse(".product-status").unwrap());
static ESTABLISHED_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".establishment-date").unwrap());
static MATURITY_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse(".maturity-date").unwrap());
static DESCRIPTION_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".product-description").unwrap());
static ACTUAL_RETURN_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".actual-return").unwrap());

static RETURN_TABLE_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse(".return-table").unwrap());
static ROW_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").unwrap());
static CELL_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("td").unwrap());

/// Hard stop for catalogs whose "next" link never disappears
const MAX_CATALOG_PAGES: u32 = 500;

/// One catalog page after extraction
#[derive(Debug, Default)]
pub struct CatalogPage {
    pub products: Vec<ProductRecord>,
    /// Product cards found, including those dropped for a missing code or name
    pub items_found: usize,
    pub has_next: bool,
}

/// Adapter for the ICBC 融e行 wealth-management catalog.
pub struct IcbcAdapter {
    fetcher: Arc<dyn PageFetcher>,
    pacer: Pacer,
}

impl IcbcAdapter {
    pub fn new(fetcher: Arc<dyn PageFetcher>, pacer: Pacer) -> Self {
        Self { fetcher, pacer }
    }

    pub fn catalog_page_url(page: u32) -> String {
        format!("{ICBC_PRODUCT_LIST_URL}?page={page}")
    }

    pub fn returns_url(product_code: &str, start: NaiveDate, end: NaiveDate) -> String {
        format!(
            "{}?productCode={}&startDate={}&endDate={}",
            ICBC_PRODUCT_RETURN_API,
            product_code,
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        )
    }
}

#[async_trait::async_trait]
impl SiteAdapter for IcbcAdapter {
    fn name(&self) -> &'static str {
        ICBC_ADAPTER
    }

    fn company_name(&self) -> &str {
        ICBC_COMPANY_NAME
    }

    fn company_url(&self) -> &str {
        ICBC_BASE_URL
    }

    #[instrument(skip(self), fields(adapter = ICBC_ADAPTER))]
    async fn list_catalog(&self) -> Result<Vec<ProductRecord>> {
        info!("Fetching product catalog from {}", ICBC_COMPANY_NAME);

        let mut products = Vec::new();
        let mut page = 1;

        loop {
            let url = Self::catalog_page_url(page);
            let html = match self.fetcher.fetch(&url).await {
                Ok(html) => html,
                Err(e) if page == 1 => {
                    return Err(ScraperError::Catalog(format!(
                        "first catalog page {url} unavailable: {e}"
                    )));
                }
                Err(e) => {
                    warn!("Catalog page {} failed, stopping pagination: {}", page, e);
                    break;
                }
            };

            let parsed = parse_catalog_page(&html, ICBC_COMPANY_NAME, ICBC_BASE_URL);
            if parsed.items_found == 0 {
                if page == 1 {
                    return Err(ScraperError::Catalog(format!(
                        "first catalog page {url} has no product items"
                    )));
                }
                warn!("No products found on catalog page {}", page);
                break;
            }
            debug!(
                "Catalog page {}: {} items, {} kept",
                page,
                parsed.items_found,
                parsed.products.len()
            );
            products.extend(parsed.products);

            if !parsed.has_next || page >= MAX_CATALOG_PAGES {
                break;
            }
            page += 1;
            self.pacer.pause().await;
        }

        info!("Found {} products in catalog", products.len());
        Ok(products)
    }

    #[instrument(skip(self), fields(adapter = ICBC_ADAPTER))]
    async fn fetch_details(&self, details_url: &str) -> ProductDetails {
        match self.fetcher.fetch(details_url).await {
            Ok(html) => parse_details_page(&html),
            Err(e) => {
                warn!("Details page {} unavailable: {}", details_url, e);
                ProductDetails::default()
            }
        }
    }

    #[instrument(skip(self), fields(adapter = ICBC_ADAPTER))]
    async fn fetch_returns(&self, product_code: &str, lookback_days: u32) -> Vec<ReturnRecord> {
        let today = Local::now().date_naive();
        let start = today - Duration::days(i64::from(lookback_days));
        let url = Self::returns_url(product_code, start, today);

        let body = match self.fetcher.fetch(&url).await {
            Ok(body) => body,
            Err(e) => {
                warn!("Return history for {} unavailable: {}", product_code, e);
                return Vec::new();
            }
        };

        let returns = parse_returns(&body, product_code);
        info!("Got {} return rows for {}", returns.len(), product_code);
        returns
    }
}

fn first_text(element: ElementRef, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(|e| clean_text(&e.text().collect::<String>()))
}

fn capture_f64(re: &Regex, text: &str) -> Option<f64> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn resolve_link(base_url: &str, href: &str) -> Option<String> {
    if href.starts_with("http") {
        return Some(href.to_string());
    }
    url::Url::parse(base_url)
        .and_then(|base| base.join(href))
        .map(|u| u.to_string())
        .ok()
}

/// Extract the product cards of one catalog page.
pub fn parse_catalog_page(html: &str, company_name: &str, base_url: &str) -> CatalogPage {
    let document = Html::parse_document(html);
    let mut page = CatalogPage::default();

    for item in document.select(&ITEM_SEL) {
        page.items_found += 1;

        let name = first_text(item, &NAME_SEL).filter(|s| !s.is_empty());
        let code = first_text(item, &CODE_SEL)
            .and_then(|t| CODE_RE.captures(&t).map(|c| c[1].to_string()));

        let (Some(code), Some(name)) = (code, name) else {
            debug!("Dropping catalog item without code or name");
            continue;
        };

        let mut product = ProductRecord::new(code);
        product.product_name = Some(name);
        product.product_type = first_text(item, &TYPE_SEL);
        product.risk_level = first_text(item, &RISK_SEL);
        product.expected_return =
            first_text(item, &EXPECTED_RETURN_SEL).and_then(|t| capture_f64(&PERCENT_RE, &t));
        product.investment_horizon = first_text(item, &PERIOD_SEL);
        product.details_url = item
            .select(&DETAIL_LINK_SEL)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| resolve_link(base_url, href));
        product.company_name = Some(company_name.to_string());
        product.company_url = Some(base_url.to_string());

        page.products.push(product);
    }

    page.has_next = document.select(&NEXT_PAGE_SEL).next().is_some();
    page
}

/// Extract the fields a product details page contributes.
pub fn parse_details_page(html: &str) -> ProductDetails {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let min_investment = first_text(root, &MIN_INVESTMENT_SEL)
        .and_then(|t| capture_f64(&AMOUNT_RE, &t.replace(',', "")));
    let status = first_text(root, &STATUS_SEL).filter(|s| !s.is_empty());
    let establishment_date = first_text(root, &ESTABLISHED_SEL).and_then(|t| {
        let date = parse_date(&t);
        if date.is_none() {
            warn!("Unparseable establishment date '{}'", t);
        }
        date
    });
    let maturity_date = first_text(root, &MATURITY_SEL).and_then(|t| {
        let date = parse_date(&t);
        if date.is_none() {
            warn!("Unparseable maturity date '{}'", t);
        }
        date
    });
    let description = first_text(root, &DESCRIPTION_SEL).filter(|s| !s.is_empty());
    let actual_return =
        first_text(root, &ACTUAL_RETURN_SEL).and_then(|t| capture_f64(&PERCENT_RE, &t));

    ProductDetails {
        min_investment,
        status,
        establishment_date,
        maturity_date,
        description,
        actual_return,
    }
}

/// Parse a return-history response: JSON first, HTML table when the body is not JSON.
pub fn parse_returns(body: &str, product_code: &str) -> Vec<ReturnRecord> {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => parse_returns_json(&value, product_code),
        Err(e) => {
            debug!(
                "Return payload for {} is not JSON ({}), trying table layout",
                product_code, e
            );
            parse_returns_table(body, product_code)
        }
    }
}

/// Numeric value that may arrive as a JSON number or a (percent-suffixed) string
fn json_number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

/// Parse `"1.0234"` or `"2.35%"`
pub fn parse_number(text: &str) -> Option<f64> {
    text.trim()
        .trim_end_matches('%')
        .trim()
        .replace(',', "")
        .parse()
        .ok()
}

fn parse_returns_json(value: &Value, product_code: &str) -> Vec<ReturnRecord> {
    let Some(rows) = value.get("data").and_then(Value::as_array) else {
        info!("Return data for {} is empty", product_code);
        return Vec::new();
    };

    rows.iter()
        .filter_map(|item| {
            let raw_date = item.get("date").and_then(Value::as_str).unwrap_or_default();
            let Some(date) = parse_date(raw_date) else {
                warn!("Dropping return row for {} with date '{}'", product_code, raw_date);
                return None;
            };
            Some(ReturnRecord {
                product_code: product_code.to_string(),
                date,
                unit_net_value: json_number(item.get("unitNetValue")),
                cumulative_net_value: json_number(item.get("cumulativeNetValue")),
                daily_return_rate: json_number(item.get("dailyReturn")),
                seven_day_annualized: json_number(item.get("sevenDayAnnualized")),
            })
        })
        .collect()
}

fn parse_returns_table(html: &str, product_code: &str) -> Vec<ReturnRecord> {
    let document = Html::parse_document(html);

    let Some(table) = document.select(&RETURN_TABLE_SEL).next() else {
        warn!("No return table found for {}", product_code);
        return Vec::new();
    };

    let mut returns = Vec::new();
    // First row is the header
    for row in table.select(&ROW_SEL).skip(1) {
        let cells: Vec<String> = row
            .select(&CELL_SEL)
            .map(|c| c.text().collect::<String>().trim().to_string())
            .collect();
        if cells.len() < 5 {
            continue;
        }

        let Some(date) = parse_date(&cells[0]) else {
            warn!("Dropping return row for {} with date '{}'", product_code, cells[0]);
            continue;
        };
        let (Some(unit), Some(cumulative), Some(daily), Some(seven_day)) = (
            parse_number(&cells[1]),
            parse_number(&cells[2]),
            parse_number(&cells[3]),
            parse_number(&cells[4]),
        ) else {
            debug!("Skipping return row for {} with non-numeric cells", product_code);
            continue;
        };

        returns.push(ReturnRecord {
            product_code: product_code.to_string(),
            date,
            unit_net_value: Some(unit),
            cumulative_net_value: Some(cumulative),
            daily_return_rate: Some(daily),
            seven_day_annualized: Some(seven_day),
        });
    }
    returns
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG_HTML: &str = r#"
        <div class="product-list">
          <div class="product-item">
            <span class="product-name"> 工银理财 稳利 </span>
            <span class="product-code">产品代码:GS001</span>
            <span class="product-type">固定收益类</span>
            <span class="risk-level">PR2</span>
            <span class="expected-return">业绩基准 3.45%</span>
            <span class="investment-period">365天</span>
            <a class="detail-link" href="/detail/GS001.jsp">详情</a>
          </div>
          <div class="product-item">
            <span class="product-name">缺少代码</span>
          </div>
        </div>
        <div class="pagination"><a class="next disabled">下一页</a></div>
    "#;

    #[test]
    fn test_parse_catalog_page() {
        let page = parse_catalog_page(CATALOG_HTML, ICBC_COMPANY_NAME, ICBC_BASE_URL);
        assert_eq!(page.items_found, 2);
        assert_eq!(page.products.len(), 1);
        assert!(!page.has_next);

        let product = &page.products[0];
        assert_eq!(product.product_code, "GS001");
        assert_eq!(product.product_name.as_deref(), Some("工银理财 稳利"));
        assert_eq!(product.risk_level.as_deref(), Some("PR2"));
        assert_eq!(product.expected_return, Some(3.45));
        assert_eq!(product.investment_horizon.as_deref(), Some("365天"));
        assert_eq!(
            product.details_url.as_deref(),
            Some("https://elife.icbc.com.cn/detail/GS001.jsp")
        );
        assert_eq!(product.company_name.as_deref(), Some(ICBC_COMPANY_NAME));
    }

    #[test]
    fn test_catalog_next_link_detected() {
        let html = r#"
            <div class="product-list"><div class="product-item">
              <span class="product-name">A</span><span class="product-code">A1</span>
            </div></div>
            <div class="pagination"><a class="next" href="?page=2">下一页</a></div>
        "#;
        let page = parse_catalog_page(html, ICBC_COMPANY_NAME, ICBC_BASE_URL);
        assert!(page.has_next);
        assert_eq!(page.products[0].details_url, None);
    }

    #[test]
    fn test_parse_details_page() {
        let html = r#"
            <div class="min-investment">起购金额：1,000.00元</div>
            <div class="product-status"> 在售 </div>
            <div class="establishment-date">2023年5月1日</div>
            <div class="maturity-date">待定</div>
            <div class="product-description">稳健型&nbsp;产品</div>
            <div class="actual-return">实际年化 2.87%</div>
        "#;
        let details = parse_details_page(html);
        assert_eq!(details.min_investment, Some(1000.0));
        assert_eq!(details.status.as_deref(), Some("在售"));
        assert_eq!(details.establishment_date, NaiveDate::from_ymd_opt(2023, 5, 1));
        assert_eq!(details.maturity_date, None);
        assert_eq!(details.description.as_deref(), Some("稳健型 产品"));
        assert_eq!(details.actual_return, Some(2.87));
    }

    #[test]
    fn test_parse_returns_json() {
        let body = r#"{"data":[
            {"date":"2024-03-01","unitNetValue":"1.0123","cumulativeNetValue":1.2,"dailyReturn":"0.01%","sevenDayAnnualized":2.5},
            {"date":"bogus","unitNetValue":1.0},
            {"date":"2024年3月2日","unitNetValue":1.0124}
        ]}"#;
        let returns = parse_returns(body, "GS001");
        assert_eq!(returns.len(), 2);
        assert_eq!(returns[0].date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(returns[0].unit_net_value, Some(1.0123));
        assert_eq!(returns[0].daily_return_rate, Some(0.01));
        assert_eq!(returns[1].cumulative_net_value, None);
    }

    #[test]
    fn test_parse_returns_falls_back_to_table() {
        let body = r#"
            <table class="return-table">
              <tr><th>日期</th><th>单位净值</th><th>累计净值</th><th>日收益</th><th>七日年化</th></tr>
              <tr><td>2024-03-01</td><td>1.01</td><td>1.21</td><td>0.02%</td><td>2.40%</td></tr>
              <tr><td>2024-03-02</td><td>n/a</td><td>1.22</td><td>0.02%</td><td>2.41%</td></tr>
              <tr><td>无效</td><td>1.02</td><td>1.22</td><td>0.02%</td><td>2.41%</td></tr>
              <tr><td>2024-03-03</td><td>1.03</td></tr>
            </table>
        "#;
        let returns = parse_returns(body, "GS001");
        assert_eq!(returns.len(), 1);
        assert_eq!(returns[0].daily_return_rate, Some(0.02));
        assert_eq!(returns[0].seven_day_annualized, Some(2.40));
    }

    #[test]
    fn test_parse_returns_empty_json() {
        assert!(parse_returns(r#"{"data":[]}"#, "X").is_empty());
        assert!(parse_returns(r#"{"code":"404"}"#, "X").is_empty());
        assert!(parse_returns("<html><body>nothing</body></html>", "X").is_empty());
    }

    #[test]
    fn test_returns_url_window() {
        let end = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        let start = end - Duration::days(30);
        assert_eq!(
            IcbcAdapter::returns_url("GS001", start, end),
            format!("{ICBC_PRODUCT_RETURN_API}?productCode=GS001&startDate=2024-03-01&endDate=2024-03-31")
        );
    }
}
