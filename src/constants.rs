/// Adapter name constants to ensure consistency across the codebase

// User-friendly adapter names (used in CLI)
pub const ICBC_ADAPTER: &str = "icbc";

// Partner sites
pub const ICBC_COMPANY_NAME: &str = "工商银行融e行";
pub const ICBC_BASE_URL: &str = "https://elife.icbc.com.cn";
pub const ICBC_PRODUCT_LIST_URL: &str =
    "https://elife.icbc.com.cn/ICBC/newperbank/perbank3/wealth/financing/financing_index.jsp";
pub const ICBC_PRODUCT_RETURN_API: &str =
    "https://elife.icbc.com.cn/ICBC/newperbank/perbank3/wealth/financing/queryLingqianyieldList.do";

pub const WEBANK_PARTNER_URL: &str = "https://www.webank.com/inquiryCenter/financepartner";

/// Default trailing window for return history
pub const DEFAULT_LOOKBACK_DAYS: u32 = 30;

/// Get all supported user-friendly adapter names
pub fn get_supported_adapters() -> Vec<&'static str> {
    vec![ICBC_ADAPTER]
}
