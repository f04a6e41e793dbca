#![allow(dead_code)]

use fin_scraper::apis::icbc::IcbcAdapter;
use fin_scraper::constants::ICBC_PRODUCT_RETURN_API;
use fin_scraper::error::{Result, ScraperError};
use fin_scraper::fetch::PageFetcher;
use fin_scraper::types::ProductRecord;
use std::sync::Mutex;

/// Serves canned bodies by URL prefix and records every request in order.
#[derive(Default)]
pub struct StubFetcher {
    pages: Vec<(String, String)>,
    requests: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url_prefix: impl Into<String>, body: impl Into<String>) -> Self {
        self.pages.push((url_prefix.into(), body.into()));
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Index of the first request starting with `prefix`
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.requests().iter().position(|u| u.starts_with(prefix))
    }
}

#[async_trait::async_trait]
impl PageFetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.requests.lock().unwrap().push(url.to_string());
        self.pages
            .iter()
            .find(|(prefix, _)| url.starts_with(prefix.as_str()))
            .map(|(_, body)| body.clone())
            .ok_or_else(|| {
                ScraperError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    format!("no stub page for {url}"),
                ))
            })
    }
}

pub fn codes(products: &[ProductRecord]) -> Vec<&str> {
    products.iter().map(|p| p.product_code.as_str()).collect()
}

pub fn catalog_url(page: u32) -> String {
    IcbcAdapter::catalog_page_url(page)
}

pub fn returns_prefix(code: &str) -> String {
    format!("{ICBC_PRODUCT_RETURN_API}?productCode={code}&")
}

pub struct Item<'a> {
    pub code: Option<&'a str>,
    pub name: &'a str,
    pub detail_href: Option<&'a str>,
}

impl<'a> Item<'a> {
    pub fn new(code: &'a str, name: &'a str) -> Self {
        Self {
            code: Some(code),
            name,
            detail_href: None,
        }
    }

    pub fn without_code(name: &'a str) -> Self {
        Self {
            code: None,
            name,
            detail_href: None,
        }
    }

    pub fn with_detail(mut self, href: &'a str) -> Self {
        self.detail_href = Some(href);
        self
    }
}

pub fn catalog_html(items: &[Item], has_next: bool) -> String {
    let mut html = String::from(r#"<html><body><div class="product-list">"#);
    for item in items {
        html.push_str(r#"<div class="product-item">"#);
        html.push_str(&format!(r#"<span class="product-name">{}</span>"#, item.name));
        if let Some(code) = item.code {
            html.push_str(&format!(r#"<span class="product-code">{code}</span>"#));
        }
        html.push_str(r#"<span class="risk-level">PR2</span>"#);
        html.push_str(r#"<span class="expected-return">3.10%</span>"#);
        if let Some(href) = item.detail_href {
            html.push_str(&format!(r#"<a class="detail-link" href="{href}">详情</a>"#));
        }
        html.push_str("</div>");
    }
    html.push_str("</div>");
    let next_class = if has_next { "next" } else { "next disabled" };
    html.push_str(&format!(
        r#"<div class="pagination"><a class="{next_class}">下一页</a></div></body></html>"#
    ));
    html
}

pub const DETAILS_HTML: &str = r#"
    <html><body>
      <div class="min-investment">10000元起购</div>
      <div class="product-status">On Sale</div>
      <div class="establishment-date">2023年5月1日</div>
      <div class="product-description">每日开放申赎</div>
      <div class="actual-return">2.95%</div>
    </body></html>
"#;

pub const THREE_RETURNS_JSON: &str = r#"{"data":[
    {"date":"2024-03-01","unitNetValue":1.0010,"cumulativeNetValue":1.1010,"dailyReturn":0.010,"sevenDayAnnualized":2.51},
    {"date":"2024-03-02","unitNetValue":1.0020,"cumulativeNetValue":1.1020,"dailyReturn":0.011,"sevenDayAnnualized":2.52},
    {"date":"2024-03-03","unitNetValue":1.0030,"cumulativeNetValue":1.1030,"dailyReturn":0.012,"sevenDayAnnualized":2.53}
]}"#;

pub const TWO_RETURNS_TABLE: &str = r#"
    <html><body><table class="return-table">
      <tr><th>日期</th><th>单位净值</th><th>累计净值</th><th>日收益率</th><th>七日年化</th></tr>
      <tr><td>2024年3月1日</td><td>1.2000</td><td>1.3000</td><td>0.02%</td><td>2.60%</td></tr>
      <tr><td>2024年3月2日</td><td>1.2010</td><td>1.3010</td><td>0.03%</td><td>2.70%</td></tr>
    </table></body></html>
"#;
