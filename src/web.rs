#![cfg(not(tarpaulin_include))]

use clap::Parser;
use env_logger::Env;
use std::net::SocketAddr;
use std::path::PathBuf;
use xlstock::app;
use xlstock::config::{self, Config};
use xlstock::events::LogFailurePolicy;

/// Upload two-column workbooks and accumulate them into a stock workbook
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "XLSTOCK_ADDR", default_value = config::DEFAULT_ADDR)]
    addr: SocketAddr,

    /// Workbook holding the accumulated stock
    #[arg(long, env = "XLSTOCK_STOCK_FILE", default_value = config::STOCK_FILE)]
    stock_file: PathBuf,

    /// JSON-lines file receiving one entry per interaction
    #[arg(long, env = "XLSTOCK_LOG_FILE", default_value = config::LOG_FILE)]
    log_file: PathBuf,

    /// Geo-IP endpoint queried for every log entry
    #[arg(long, env = "XLSTOCK_GEOIP_URL", default_value = config::GEOIP_URL)]
    geoip_url: String,

    /// Skip the geo-IP lookup and log an empty `ip_info`
    #[arg(long, env = "XLSTOCK_NO_GEOIP")]
    no_geoip: bool,

    /// Let an action succeed even when its log entry cannot be written
    #[arg(long, env = "XLSTOCK_LENIENT_LOGGING")]
    lenient_logging: bool,

    /// Largest accepted request body in bytes
    #[arg(long, env = "XLSTOCK_MAX_UPLOAD_BYTES", default_value_t = config::MAX_UPLOAD_BYTES)]
    max_upload_bytes: usize,

    /// Number of processed results kept available for download
    #[arg(long, env = "XLSTOCK_DOWNLOAD_SLOTS", default_value_t = config::DOWNLOAD_SLOTS)]
    download_slots: usize,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Config {
            addr: args.addr,
            stock_file: args.stock_file,
            log_file: args.log_file,
            geoip_url: (!args.no_geoip).then_some(args.geoip_url),
            log_failures: if args.lenient_logging {
                LogFailurePolicy::Ignore
            } else {
                LogFailurePolicy::Propagate
            },
            max_upload_bytes: args.max_upload_bytes,
            download_slots: args.download_slots,
        }
    }
}

/// Main entry point for the web application
///
/// Parses the command line (or `XLSTOCK_*` environment variables), sets up
/// logging from `RUST_LOG` (default `info`) and runs the web server.
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Config::from(Args::parse());
    app::run(config).await
}
