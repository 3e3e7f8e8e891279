use thiserror::Error;

/// Failure talking to the Last.fm web service.
///
/// Last.fm reports problems both through HTTP status codes and through
/// `{"error": 6, "message": "..."}` bodies served with a 200, so both shapes end up here.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Last.fm API error ({code}): {message}")]
    Api { code: i64, message: String },
    #[error("JSON parse error: {0}")]
    Decode(#[from] serde_json::Error),
}
