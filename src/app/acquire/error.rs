use thiserror::Error;

use crate::http::HttpError;

#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("invalid YouTube playlist URL: {0}")]
    InvalidUrl(String),
    #[error("no YouTube API key configured; run `ytrackie set-key <KEY>` or set YOUTUBE_API_KEY")]
    MissingCredential,
    #[error("playlist {0} not found")]
    NotFound(String),
    #[error("API key rejected: {0}")]
    Unauthorized(String),
    #[error("fetch failed: {0}")]
    TransientFetchFailure(String),
    #[error("playlist needs more than {max_pages} pages; raise YTRACKIE_MAX_PAGES to fetch it")]
    PageLimitExceeded { max_pages: usize },
    #[error("fetch cancelled")]
    Cancelled,
    #[error("no playlist detected on page {0}")]
    NoPlaylistDetected(String),
    #[error("page shows {scraped} of {reported} videos; scroll the playlist to the end and save it again")]
    PartialScrape { scraped: usize, reported: u32 },
}

impl AcquisitionError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientFetchFailure(_))
    }

    pub(crate) fn from_http(playlist_id: &str, err: HttpError) -> Self {
        match &err {
            HttpError::Status { status: 404, .. } => Self::NotFound(playlist_id.to_string()),
            HttpError::Status {
                status: 401 | 403, ..
            } => Self::Unauthorized(err.to_string()),
            HttpError::Status {
                status: 400, body, ..
            } if body.contains("keyInvalid") || body.contains("API key not valid") => {
                Self::Unauthorized(err.to_string())
            }
            _ => Self::TransientFetchFailure(err.to_string()),
        }
    }
}
