//! Process-wide Prometheus recorder for the crawl counters and histograms.
//!
//! The CLI is short-lived, so there is no scrape endpoint; the rendered
//! exposition text can be written to a file after a run instead.

use crate::error::Result;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fs;
use std::path::Path;
use std::sync::{Once, OnceLock};
use tracing::{info, warn};

static INIT: Once = Once::new();
static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global recorder. Idempotent.
pub fn init_metrics() {
    INIT.call_once(|| match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = HANDLE.set(handle);
            info!("Prometheus recorder installed");
        }
        Err(e) => warn!("Failed to install Prometheus recorder: {}", e),
    });
}

/// Current metrics in Prometheus text format, if the recorder is installed.
pub fn render() -> Option<String> {
    HANDLE.get().map(|handle| handle.render())
}

/// Write the current snapshot to `path`, creating parent directories.
pub fn write_snapshot(path: &Path) -> Result<()> {
    let Some(text) = render() else {
        warn!("Metrics recorder not installed, no snapshot written");
        return Ok(());
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, text)?;
    info!("Wrote metrics snapshot to {}", path.display());
    Ok(())
}
