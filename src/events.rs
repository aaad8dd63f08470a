use chrono::Utc;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::{self, OpenOptions};
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{GeoIpError, LogError};

/// Kind of interaction recorded in the analytics log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    FileUploaded,
    StockDownloaded,
}

/// Display metrics reported by the user's browser
///
/// Any of the fields may be missing when the browser did not run the page
/// script or sent something unparseable.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClientMetrics {
    pub screen_width: Option<u32>,
    pub screen_height: Option<u32>,
    pub user_agent: Option<String>,
}

/// Source of the approximate location of the caller
///
/// Implementations return the raw JSON object of the lookup service. The
/// logger maps any error to an empty object.
pub trait GeoIpLookup: Send + Sync + 'static {
    fn lookup(&self) -> impl Future<Output = Result<Map<String, Value>, GeoIpError>> + Send;
}

/// What to do when a log entry cannot be written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFailurePolicy {
    /// Return the error to the caller, failing the user's action.
    #[default]
    Propagate,
    /// Emit a warning and carry on.
    Ignore,
}

/// One line of the analytics log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp_utc: String,
    pub event: EventKind,
    pub screen_width: Option<u32>,
    pub screen_height: Option<u32>,
    pub user_agent: Option<String>,
    pub ip_info: Map<String, Value>,
    pub extra_info: Map<String, Value>,
}

impl LogEntry {
    /// Assemble an entry stamped with the current UTC time.
    pub fn new(
        event: EventKind,
        client: ClientMetrics,
        ip_info: Map<String, Value>,
        extra_info: Map<String, Value>,
    ) -> Self {
        LogEntry {
            timestamp_utc: Utc::now()
                .naive_utc()
                .format("%Y-%m-%dT%H:%M:%S%.6f")
                .to_string(),
            event,
            screen_width: client.screen_width,
            screen_height: client.screen_height,
            user_agent: client.user_agent,
            ip_info,
            extra_info,
        }
    }
}

/// Appends analytics entries to a JSON-lines file
pub struct EventLogger<G> {
    path: PathBuf,
    geoip: G,
    policy: LogFailurePolicy,
}

impl<G: GeoIpLookup> EventLogger<G> {
    pub fn new(path: impl Into<PathBuf>, geoip: G, policy: LogFailurePolicy) -> Self {
        EventLogger {
            path: path.into(),
            geoip,
            policy,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record one interaction
    ///
    /// Looks up the caller's location, assembles a [`LogEntry`] and appends it.
    /// A failed lookup is recorded as an empty `ip_info` object. A failed write
    /// is handled according to the logger's [`LogFailurePolicy`].
    ///
    /// # Arguments
    /// * `event` - What happened
    /// * `client` - Browser metrics, or `None` when unavailable
    /// * `extra_info` - Event specific details such as row counts
    pub async fn log_event(
        &self,
        event: EventKind,
        client: Option<ClientMetrics>,
        extra_info: Map<String, Value>,
    ) -> Result<(), LogError> {
        let ip_info = match self.geoip.lookup().await {
            Ok(info) => info,
            Err(e) => {
                debug!("geo-IP lookup failed, logging without it: {}", e);
                Map::new()
            }
        };

        let entry = LogEntry::new(event, client.unwrap_or_default(), ip_info, extra_info);

        match self.append(&entry) {
            Ok(()) => Ok(()),
            Err(e) if self.policy == LogFailurePolicy::Ignore => {
                warn!("dropping {:?} log entry: {}", event, e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Append a single entry as one JSON line, creating the log directory if needed.
    pub fn append(&self, entry: &LogEntry) -> Result<(), LogError> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }

        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;

        Ok(())
    }
}

/// Read every entry back from a JSON-lines log file.
pub fn read_log(path: impl AsRef<Path>) -> Result<Vec<LogEntry>, LogError> {
    let content = fs::read_to_string(path)?;
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(LogError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    struct Unreachable;

    impl GeoIpLookup for Unreachable {
        async fn lookup(&self) -> Result<Map<String, Value>, GeoIpError> {
            Err(GeoIpError::NotAnObject)
        }
    }

    #[test]
    fn test_entry_serializes_expected_fields() {
        let entry = LogEntry::new(
            EventKind::StockDownloaded,
            ClientMetrics::default(),
            Map::new(),
            Map::new(),
        );
        let value = serde_json::to_value(&entry).unwrap();

        assert_eq!(value["event"], json!("stock_downloaded"));
        assert_eq!(value["screen_width"], Value::Null);
        assert_eq!(value["user_agent"], Value::Null);
        assert_eq!(value["ip_info"], json!({}));
        assert!(
            NaiveDateTime::parse_from_str(&entry.timestamp_utc, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        );
    }

    #[test]
    fn test_read_log_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let logger = EventLogger::new(
            dir.path().join("logs").join("events.jsonl"),
            Unreachable,
            LogFailurePolicy::Propagate,
        );
        let entry = LogEntry::new(
            EventKind::FileUploaded,
            ClientMetrics::default(),
            Map::new(),
            Map::new(),
        );
        logger.append(&entry).unwrap();
        logger.append(&entry).unwrap();

        assert_eq!(read_log(logger.path()).unwrap(), vec![entry.clone(), entry]);
    }
}
