use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{Query, State},
    http::{
        HeaderValue, StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::{
    extractor::{ExtractError, Extractor},
    format::{VideoFormat, content_disposition},
    relay::Relay,
};

pub fn router(extractor: Arc<dyn Extractor>) -> Router {
    Router::new()
        .route("/formats", get(formats_handler))
        .route("/download", get(download_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(extractor)
}

#[derive(Deserialize)]
struct FormatsQuery {
    url: Option<String>,
}

#[derive(Deserialize)]
struct DownloadQuery {
    url: Option<String>,
    itag: Option<String>,
}

async fn formats_handler(
    State(extractor): State<Arc<dyn Extractor>>,
    Query(query): Query<FormatsQuery>,
) -> Result<Json<Vec<VideoFormat>>, AppError> {
    let url = non_empty(query.url).ok_or(AppError::InvalidRequest("Error: No URL provided"))?;

    let info = extractor
        .fetch_info(&url)
        .await
        .map_err(|e| AppError::upstream("Error: Unable to fetch video formats", e))?;

    Ok(Json(info.formats.iter().map(VideoFormat::from).collect()))
}

async fn download_handler(
    State(extractor): State<Arc<dyn Extractor>>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, AppError> {
    let (Some(url), Some(itag)) = (non_empty(query.url), non_empty(query.itag)) else {
        return Err(AppError::InvalidRequest(
            "Error: Missing URL or format (itag) parameter",
        ));
    };

    let info = extractor
        .fetch_info(&url)
        .await
        .map_err(|e| AppError::upstream("Error: Unable to download video", e))?;

    let format = parse_itag(&itag)
        .and_then(|itag| info.find_format(itag))
        .ok_or(AppError::InvalidRequest(
            "Error: Invalid format (itag) selected",
        ))?;

    let disposition = content_disposition(&info.title, format.container.as_deref());
    let content_type = Some(format.mime_type.as_str())
        .filter(|mime| !mime.is_empty())
        .and_then(|mime| HeaderValue::from_str(mime).ok())
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));

    let stream = extractor
        .open_stream(&url, format)
        .await
        .map_err(|e| AppError::upstream("Error: Unable to download video", e))?;

    info!("streaming format {} of {url}", format.itag);
    let relay = Relay::new(stream, format!("{} (itag {})", info.title, format.itag));

    Ok((
        [(CONTENT_DISPOSITION, disposition), (CONTENT_TYPE, content_type)],
        Body::from_stream(relay),
    )
        .into_response())
}

/// Reads the leading run of digits, so `"18abc"` and `"18.0"` select itag 18.
fn parse_itag(value: &str) -> Option<u32> {
    let value = value.trim_start();
    let digits = value
        .find(|c: char| !c.is_ascii_digit())
        .map_or(value, |end| &value[..end]);
    digits.parse().ok()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

#[derive(Debug)]
enum AppError {
    InvalidRequest(&'static str),
    Upstream {
        message: &'static str,
        source: ExtractError,
    },
}

impl AppError {
    fn upstream(message: &'static str, source: ExtractError) -> Self {
        AppError::Upstream { message, source }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::InvalidRequest(message) => {
                warn!("rejected request: {message}");
                (StatusCode::BAD_REQUEST, message).into_response()
            }
            AppError::Upstream { message, source } => {
                error!(kind = source.kind(), "{message}: {source}");
                (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
            }
        }
    }
}
