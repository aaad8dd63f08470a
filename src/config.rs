use std::net::SocketAddr;
use std::path::PathBuf;

use crate::events::LogFailurePolicy;

/// Default location of the stock workbook
pub const STOCK_FILE: &str = "processed_file.xlsx";
/// Default location of the analytics log
pub const LOG_FILE: &str = "logs/submissions_log.jsonl";
/// Default listen address of the web server
pub const DEFAULT_ADDR: &str = "127.0.0.1:3000";
/// Default geo-IP endpoint, queried without authentication
pub const GEOIP_URL: &str = "http://ip-api.com/json";
/// Default request body limit for uploads (16 MiB)
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;
/// Default number of processed results kept for download
pub const DOWNLOAD_SLOTS: usize = 32;

/// Runtime settings of the application
#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub stock_file: PathBuf,
    pub log_file: PathBuf,
    /// `None` disables the geo-IP lookup
    pub geoip_url: Option<String>,
    pub log_failures: LogFailurePolicy,
    pub max_upload_bytes: usize,
    pub download_slots: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            stock_file: PathBuf::from(STOCK_FILE),
            log_file: PathBuf::from(LOG_FILE),
            geoip_url: Some(GEOIP_URL.to_string()),
            log_failures: LogFailurePolicy::Propagate,
            max_upload_bytes: MAX_UPLOAD_BYTES,
            download_slots: DOWNLOAD_SLOTS,
        }
    }
}
