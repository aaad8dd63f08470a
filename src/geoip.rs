#![cfg(feature = "web")]

use reqwest::Client;
use serde_json::{Map, Value};

use crate::error::GeoIpError;
use crate::events::GeoIpLookup;

/// Geo-IP lookup over plain HTTP GET
///
/// The service sees the server's public address. No timeout or retry is
/// configured; a slow endpoint delays the request that triggered the log
/// entry. Without an endpoint every lookup fails immediately.
#[derive(Debug, Clone)]
pub struct HttpGeoIp {
    client: Client,
    endpoint: Option<String>,
}

impl HttpGeoIp {
    pub fn new(endpoint: impl Into<String>) -> Self {
        HttpGeoIp {
            client: Client::new(),
            endpoint: Some(endpoint.into()),
        }
    }

    pub fn disabled() -> Self {
        HttpGeoIp {
            client: Client::new(),
            endpoint: None,
        }
    }
}

impl GeoIpLookup for HttpGeoIp {
    async fn lookup(&self) -> Result<Map<String, Value>, GeoIpError> {
        let endpoint = self.endpoint.as_deref().ok_or(GeoIpError::Disabled)?;

        let value: Value = self.client.get(endpoint).send().await?.json().await?;
        match value {
            Value::Object(info) => Ok(info),
            _ => Err(GeoIpError::NotAnObject),
        }
    }
}
