/*!
# Stock Spreadsheet Service

A small web application that accumulates uploaded two-column spreadsheets into a
persisted "stock" workbook, built in Rust.

## Overview

Users upload an Excel workbook whose first sheet has exactly the columns `n1` and
`n2`. Every `n1` is halved and every `n2` divided by three; the result is shown,
offered for download and appended to the stock. The stock can later be shown and
downloaded as a whole. Each interaction writes one analytics entry to a JSON-lines
log, carrying browser display metrics and a best-effort geo-IP lookup.

## Architecture

### Data Layer
- **Loader** - Reads the first worksheet of an XLSX workbook into a raw table (calamine)
- **Transformer** - Validates the column set and scales both columns
- **Downloader** - Writes datasets back to XLSX (rust_xlsxwriter)
- **Stock** - Read-append-rewrite of the persisted workbook under a writer lock

### Analytics Layer
- **Events** - Log entry assembly and append-only JSON-lines store
- **Geo-IP** - HTTP lookup whose failures degrade to an empty object

### Web Layer
- **App** - axum routes for both modes, handlebars pages and download responses

## Routes

- `/` - Mode chooser with the upload and report forms
- `/upload` - Upload and Report (multipart)
- `/stock` - Report Stock
- `/download/{id}` - Processed result of an earlier upload
- `/stock/download` - The full stock workbook
*/

pub mod config;
pub mod dataset;
pub mod downloader;
pub mod error;
pub mod events;
pub mod loader;
pub mod stock;
pub mod transform;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod geoip;

pub use config::Config;
pub use dataset::{Dataset, Row, Table};
pub use error::{GeoIpError, LoadError, LogError, StockError, ValidationError};
pub use events::{ClientMetrics, EventKind, EventLogger, GeoIpLookup, LogEntry, LogFailurePolicy};
pub use stock::StockStore;
pub use transform::transform;
