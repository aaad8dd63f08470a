use axum::{
    Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use handlebars::Handlebars;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use uuid::Uuid;

use crate::config::Config;
use crate::dataset::Row;
use crate::downloader::{Attachment, XLSX_MIME};
use crate::error::{LoadError, LogError, StockError, ValidationError};
use crate::events::{ClientMetrics, EventKind, EventLogger, GeoIpLookup};
use crate::geoip::HttpGeoIp;
use crate::loader::{ensure_xlsx, from_xlsx_bytes};
use crate::stock::StockStore;
use crate::transform::transform;

/// Warning shown by the stock report before anything was uploaded
pub const NO_STOCK_MESSAGE: &str =
    "No stock file found. Please upload a file first using the other option.";

pub struct AppState<G> {
    pub stock: StockStore,
    pub logger: EventLogger<G>,
    pub downloads: DownloadCache,
    max_upload_bytes: usize,
    templates: Handlebars<'static>,
}

impl<G: GeoIpLookup> AppState<G> {
    pub fn new(config: &Config, geoip: G) -> Result<Self, handlebars::TemplateError> {
        let mut templates = Handlebars::new();
        templates.register_template_string("index", include_str!("./templates/index.hbs"))?;
        templates.register_template_string("upload", include_str!("./templates/upload.hbs"))?;
        templates.register_template_string("stock", include_str!("./templates/stock.hbs"))?;

        Ok(AppState {
            stock: StockStore::new(&config.stock_file),
            logger: EventLogger::new(&config.log_file, geoip, config.log_failures),
            downloads: DownloadCache::new(config.download_slots),
            max_upload_bytes: config.max_upload_bytes,
            templates,
        })
    }

    fn render(&self, status: StatusCode, template: &str, data: &impl Serialize) -> Response {
        match self.templates.render(template, data) {
            Ok(html) => (status, Html(html)).into_response(),
            Err(e) => {
                error!("failed to render {}: {}", template, e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

/// Recently processed uploads, kept so their result can be downloaded
///
/// Holds at most `capacity` attachments; inserting beyond that evicts the
/// oldest one.
pub struct DownloadCache {
    capacity: usize,
    entries: Mutex<VecDeque<(Uuid, Attachment)>>,
}

impl DownloadCache {
    pub fn new(capacity: usize) -> Self {
        DownloadCache {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub fn insert(&self, attachment: Attachment) -> Uuid {
        let id = Uuid::new_v4();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back((id, attachment));
        id
    }

    pub fn get(&self, id: &Uuid) -> Option<Attachment> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .iter()
            .find(|(entry_id, _)| entry_id == id)
            .map(|(_, attachment)| attachment.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IntoResponse for Attachment {
    fn into_response(self) -> Response {
        (
            [
                (header::CONTENT_TYPE, XLSX_MIME.to_string()),
                (header::CONTENT_DISPOSITION, self.content_disposition()),
            ],
            self.bytes,
        )
            .into_response()
    }
}

/// Browser metrics as posted by the page script
///
/// Every field arrives as text and may be blank when the script did not run.
#[derive(Debug, Default, Deserialize)]
pub struct ClientForm {
    #[serde(default)]
    pub screen_width: Option<String>,
    #[serde(default)]
    pub screen_height: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl ClientForm {
    fn set(&mut self, name: &str, value: String) {
        match name {
            "screen_width" => self.screen_width = Some(value),
            "screen_height" => self.screen_height = Some(value),
            "user_agent" => self.user_agent = Some(value),
            _ => {}
        }
    }

    /// The reported metrics, or `None` when the browser sent nothing usable.
    pub fn metrics(&self) -> Option<ClientMetrics> {
        let metrics = ClientMetrics {
            screen_width: parse_dimension(self.screen_width.as_deref()),
            screen_height: parse_dimension(self.screen_height.as_deref()),
            user_agent: self
                .user_agent
                .as_deref()
                .map(str::trim)
                .filter(|ua| !ua.is_empty())
                .map(str::to_string),
        };

        if metrics == ClientMetrics::default() {
            None
        } else {
            Some(metrics)
        }
    }
}

fn parse_dimension(value: Option<&str>) -> Option<u32> {
    value.and_then(|v| v.trim().parse().ok())
}

#[derive(Debug, Error)]
enum ShellError {
    #[error("{0}")]
    Upload(#[from] MultipartError),
    #[error("{0}")]
    Load(#[from] LoadError),
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    Stock(#[from] StockError),
    #[error("{0}")]
    Log(#[from] LogError),
    #[error("{0}")]
    Encode(#[from] rust_xlsxwriter::XlsxError),
}

impl ShellError {
    fn status(&self) -> StatusCode {
        match self {
            ShellError::Upload(e) => e.status(),
            ShellError::Load(_) => StatusCode::BAD_REQUEST,
            ShellError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ShellError::Stock(_) | ShellError::Log(_) | ShellError::Encode(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn page(&self) -> Value {
        json!({ "error": format!("Error: {}", self) })
    }
}

#[derive(Default)]
struct UploadForm {
    file: Option<(String, Bytes)>,
    client: ClientForm,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ShellError> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();

            if name == "file" {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await?;
                // Browsers send an empty part when no file was chosen
                if file_name.is_empty() && data.is_empty() {
                    continue;
                }
                if form.file.is_some() {
                    return Err(LoadError::MultipleFiles.into());
                }
                form.file = Some((file_name, data));
            } else {
                let value = field.text().await?;
                form.client.set(&name, value);
            }
        }

        Ok(form)
    }
}

#[derive(Serialize)]
struct UploadReport {
    rows: Vec<Row>,
    uploaded_rows: usize,
    stock_rows: usize,
    download_url: String,
}

#[derive(Serialize)]
struct StockReport {
    rows: Vec<Row>,
    total_rows: usize,
    download_url: &'static str,
}

/// Build the application router around shared state.
pub fn router<G: GeoIpLookup>(state: Arc<AppState<G>>) -> Router {
    let max_upload_bytes = state.max_upload_bytes;

    Router::new()
        .route("/", get(serve_index::<G>))
        .route("/upload", post(upload_and_report::<G>))
        .route("/stock", get(report_stock::<G>))
        .route("/stock/download", get(download_stock::<G>))
        .route("/download/:id", get(download_processed::<G>))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .with_state(state)
}

/// Start the web server and serve until it fails.
pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let geoip = match &config.geoip_url {
        Some(url) => HttpGeoIp::new(url.clone()),
        None => HttpGeoIp::disabled(),
    };
    let state = Arc::new(AppState::new(&config, geoip)?);

    info!(
        "stock at {}, event log at {}",
        state.stock.path().display(),
        state.logger.path().display()
    );

    let app = router(state);
    let listener = TcpListener::bind(config.addr).await?;
    info!("Listening on http://{}", config.addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_index<G: GeoIpLookup>(State(state): State<Arc<AppState<G>>>) -> Response {
    state.render(StatusCode::OK, "index", &json!({}))
}

async fn upload_and_report<G: GeoIpLookup>(
    State(state): State<Arc<AppState<G>>>,
    multipart: Multipart,
) -> Response {
    match process_upload(&state, multipart).await {
        Ok(report) => state.render(StatusCode::OK, "upload", &report),
        Err(e) => {
            warn!("upload rejected: {}", e);
            state.render(e.status(), "upload", &e.page())
        }
    }
}

async fn process_upload<G: GeoIpLookup>(
    state: &AppState<G>,
    multipart: Multipart,
) -> Result<UploadReport, ShellError> {
    let form = UploadForm::read(multipart).await?;
    let (file_name, data) = form.file.ok_or(LoadError::MissingFile)?;
    ensure_xlsx(&file_name)?;

    let table = from_xlsx_bytes(&data)?;
    let processed = transform(&table)?;
    let attachment = Attachment::processed(&processed)?;

    let stock = state.stock.append(&processed)?;
    info!(
        "accepted {} ({} rows), stock now {} rows",
        file_name,
        processed.len(),
        stock.len()
    );

    let mut extra_info = Map::new();
    extra_info.insert("uploaded_rows".to_string(), json!(processed.len()));
    state
        .logger
        .log_event(EventKind::FileUploaded, form.client.metrics(), extra_info)
        .await?;

    let id = state.downloads.insert(attachment);

    Ok(UploadReport {
        uploaded_rows: processed.len(),
        stock_rows: stock.len(),
        rows: processed.rows,
        download_url: format!("/download/{}", id),
    })
}

async fn report_stock<G: GeoIpLookup>(
    State(state): State<Arc<AppState<G>>>,
    Query(client): Query<ClientForm>,
) -> Response {
    match process_report(&state, &client).await {
        Ok(Some(report)) => state.render(StatusCode::OK, "stock", &report),
        Ok(None) => state.render(StatusCode::OK, "stock", &json!({ "warning": NO_STOCK_MESSAGE })),
        Err(e) => {
            error!("stock report failed: {}", e);
            state.render(e.status(), "stock", &e.page())
        }
    }
}

async fn process_report<G: GeoIpLookup>(
    state: &AppState<G>,
    client: &ClientForm,
) -> Result<Option<StockReport>, ShellError> {
    let Some(stock) = state.stock.read()? else {
        return Ok(None);
    };
    info!("reporting stock of {} rows", stock.len());

    let mut extra_info = Map::new();
    extra_info.insert("rows".to_string(), json!(stock.len()));
    state
        .logger
        .log_event(EventKind::StockDownloaded, client.metrics(), extra_info)
        .await?;

    Ok(Some(StockReport {
        total_rows: stock.len(),
        rows: stock.rows,
        download_url: "/stock/download",
    }))
}

async fn download_processed<G: GeoIpLookup>(
    State(state): State<Arc<AppState<G>>>,
    Path(id): Path<Uuid>,
) -> Response {
    match state.downloads.get(&id) {
        Some(attachment) => attachment.into_response(),
        None => (
            StatusCode::NOT_FOUND,
            "This download has expired. Please upload the file again.",
        )
            .into_response(),
    }
}

async fn download_stock<G: GeoIpLookup>(State(state): State<Arc<AppState<G>>>) -> Response {
    let result = state
        .stock
        .read()
        .map_err(ShellError::from)
        .and_then(|stock| match stock {
            Some(stock) => Ok(Some(Attachment::stock(&stock)?)),
            None => Ok(None),
        });

    match result {
        Ok(Some(attachment)) => attachment.into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, NO_STOCK_MESSAGE).into_response(),
        Err(e) => {
            error!("stock download failed: {}", e);
            (e.status(), format!("Error: {}", e)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn attachment(tag: u8) -> Attachment {
        Attachment {
            file_name: crate::downloader::PROCESSED_FILE_NAME,
            bytes: vec![tag],
        }
    }

    #[test]
    fn test_download_cache_evicts_oldest() {
        let cache = DownloadCache::new(2);
        let first = cache.insert(attachment(1));
        let second = cache.insert(attachment(2));
        let third = cache.insert(attachment(3));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&first), None);
        assert_eq!(cache.get(&second), Some(attachment(2)));
        assert_eq!(cache.get(&third), Some(attachment(3)));
    }

    #[test]
    fn test_client_form_metrics() {
        let blank = ClientForm {
            screen_width: Some(String::new()),
            screen_height: None,
            user_agent: Some("  ".to_string()),
        };
        assert_eq!(blank.metrics(), None);

        let form = ClientForm {
            screen_width: Some("1280".to_string()),
            screen_height: Some("not a number".to_string()),
            user_agent: Some("Mozilla/5.0".to_string()),
        };
        assert_eq!(
            form.metrics(),
            Some(ClientMetrics {
                screen_width: Some(1280),
                screen_height: None,
                user_agent: Some("Mozilla/5.0".to_string()),
            })
        );
    }
}
