use crate::constants::WEBANK_PARTNER_URL;
use crate::fetch::PageFetcher;
use crate::normalize::{clean_text, normalize_url};
use crate::types::Partner;
use scraper::{Html, Selector};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Scraper for the WeBank financial-partner directory (single page).
pub struct WeBankPartnerScraper {
    fetcher: Arc<dyn PageFetcher>,
}

impl WeBankPartnerScraper {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }

    /// Fetch and parse the partner list; any failure yields an empty list.
    #[instrument(skip(self))]
    pub async fn get_partners(&self) -> Vec<Partner> {
        info!("Fetching WeBank partner list");
        let html = match self.fetcher.fetch(WEBANK_PARTNER_URL).await {
            Ok(html) => html,
            Err(e) => {
                warn!("WeBank partner page unavailable: {}", e);
                return Vec::new();
            }
        };

        let partners = parse_partner_page(&html);
        info!("Found {} partners", partners.len());
        partners
    }
}

pub fn parse_partner_page(html: &str) -> Vec<Partner> {
    let document = Html::parse_document(html);
    let section_selector = Selector::parse("div.tablewrap").unwrap();
    let item_selector = Selector::parse("dl.tablelist").unwrap();
    let name_selector = Selector::parse("dt").unwrap();
    let link_selector = Selector::parse("a[href]").unwrap();

    let Some(section) = document.select(&section_selector).next() else {
        warn!("Partner section not found - the page structure may have changed");
        return Vec::new();
    };

    section
        .select(&item_selector)
        .filter_map(|item| {
            let name = item
                .select(&name_selector)
                .next()
                .map(|dt| clean_text(&dt.text().collect::<String>()))
                .filter(|n| !n.is_empty())?;
            let url = item
                .select(&link_selector)
                .next()
                .and_then(|a| a.value().attr("href"))
                .and_then(normalize_url)?;
            Some(Partner { name, url })
        })
        .collect()
}
