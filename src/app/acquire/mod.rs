mod api;
mod error;
mod scrape;
mod url;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::Settings;
use crate::model::PlaylistSnapshot;

pub(crate) use api::fetch_playlist;
pub use error::AcquisitionError;
pub(crate) use scrape::{PageRequest, RenderedPage, handle_page_message};
pub use url::parse_playlist_url;

/// Shared flag checked between pagination requests.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn check(&self) -> Result<(), AcquisitionError> {
        if self.is_cancelled() {
            Err(AcquisitionError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcquisitionSource {
    Api,
    PageScrape,
}

impl AcquisitionSource {
    pub fn label(self) -> &'static str {
        match self {
            Self::Api => "YouTube Data API",
            Self::PageScrape => "playlist page",
        }
    }
}

/// A snapshot ready for preview. `complete` is false when the source saw
/// fewer videos than the playlist reports.
#[derive(Debug, Clone)]
pub struct Acquired {
    pub snapshot: PlaylistSnapshot,
    pub source: AcquisitionSource,
    pub complete: bool,
}

pub(crate) fn acquire_from_api(
    playlist_url: &str,
    api_key: Option<&str>,
    settings: &Settings,
    cancel: &CancelToken,
) -> Result<Acquired, AcquisitionError> {
    let playlist_id = parse_playlist_url(playlist_url)?;
    let api_key = api_key.ok_or(AcquisitionError::MissingCredential)?;
    let snapshot = fetch_playlist(&playlist_id, api_key, settings, cancel)?;
    let complete = snapshot.videos.len() >= snapshot.video_count as usize;
    Ok(Acquired {
        snapshot,
        source: AcquisitionSource::Api,
        complete,
    })
}

pub(crate) fn acquire_from_page(
    page: &RenderedPage,
    strict: bool,
) -> Result<Acquired, AcquisitionError> {
    let scraped = page
        .playlist_info()
        .ok_or_else(|| AcquisitionError::NoPlaylistDetected(page.url().to_string()))?;
    let complete = !scraped.is_partial();
    if !complete {
        warn!(
            playlist_id = %scraped.snapshot.playlist_id,
            scraped = scraped.snapshot.videos.len(),
            reported = scraped.snapshot.video_count,
            "page shows only part of the playlist"
        );
    }
    let scraped = if strict {
        scraped.require_complete()?
    } else {
        scraped
    };
    Ok(Acquired {
        snapshot: scraped.snapshot,
        source: AcquisitionSource::PageScrape,
        complete,
    })
}
