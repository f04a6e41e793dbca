pub mod icbc;
pub mod webank;

use crate::constants;
use crate::fetch::PageFetcher;
use crate::pacer::Pacer;
use crate::types::SiteAdapter;
use std::sync::Arc;

pub fn create_adapter(
    adapter_name: &str,
    fetcher: Arc<dyn PageFetcher>,
    pacer: Pacer,
) -> Option<Box<dyn SiteAdapter>> {
    match adapter_name {
        constants::ICBC_ADAPTER => Some(Box::new(icbc::IcbcAdapter::new(fetcher, pacer))),
        _ => None,
    }
}

pub fn all_adapters(fetcher: Arc<dyn PageFetcher>, pacer: Pacer) -> Vec<Box<dyn SiteAdapter>> {
    constants::get_supported_adapters()
        .into_iter()
        .filter_map(|name| create_adapter(name, fetcher.clone(), pacer))
        .collect()
}

/// Look an adapter up by its CLI name or by the partner's company name.
pub fn find_adapter(
    name: &str,
    fetcher: Arc<dyn PageFetcher>,
    pacer: Pacer,
) -> Option<Box<dyn SiteAdapter>> {
    let name = name.trim();
    all_adapters(fetcher, pacer)
        .into_iter()
        .find(|a| a.name().eq_ignore_ascii_case(name) || a.company_name() == name)
}
