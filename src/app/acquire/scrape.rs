use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::model::{PlaylistSnapshot, Video};

use super::AcquisitionError;
use super::url::{list_param, query_param, watch_link};

const UNTITLED_PLAYLIST: &str = "Untitled Playlist";

struct PageSelectors {
    heading: Selector,
    items: Selector,
    item_titles: [Selector; 3],
    item_thumbnail_anchor: Selector,
    item_link: Selector,
    item_image: Selector,
    item_duration: Selector,
    video_count: Selector,
}

fn selector(raw: &str) -> Selector {
    Selector::parse(raw).expect("valid selector")
}

static SELECTORS: LazyLock<PageSelectors> = LazyLock::new(|| PageSelectors {
    heading: selector("h1"),
    items: selector("ytd-playlist-video-renderer, ytd-grid-video-renderer"),
    item_titles: [
        selector("#video-title"),
        selector("#title-link"),
        selector("a#thumbnail"),
    ],
    item_thumbnail_anchor: selector("a#thumbnail"),
    item_link: selector("a#thumbnail, a.ytd-thumbnail"),
    item_image: selector("img"),
    item_duration: selector("#text, .ytd-thumbnail-overlay-time-status-renderer"),
    video_count: selector("#video-count, #video-count span, yt-formatted-string#video-count"),
});

static COUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+[\d,]*)").expect("valid regex"));

/// Request accepted by a rendered playlist page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub(crate) enum PageRequest {
    GetPlaylistInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ScrapedPlaylist {
    #[serde(flatten)]
    pub(crate) snapshot: PlaylistSnapshot,
    #[serde(alias = "url")]
    pub(crate) source_url: String,
}

impl ScrapedPlaylist {
    /// Only rendered items are visible to the scraper, so long playlists
    /// come back short unless the page was scrolled to the end.
    pub(crate) fn is_partial(&self) -> bool {
        self.snapshot.videos.len() < self.snapshot.video_count as usize
    }

    pub(crate) fn require_complete(self) -> Result<Self, AcquisitionError> {
        if self.is_partial() {
            return Err(AcquisitionError::PartialScrape {
                scraped: self.snapshot.videos.len(),
                reported: self.snapshot.video_count,
            });
        }
        Ok(self)
    }
}

/// Markup of a playlist page as rendered by the browser, with its address.
pub(crate) struct RenderedPage {
    url: String,
    document: Html,
}

impl RenderedPage {
    pub(crate) fn new(url: &str, html: &str) -> Self {
        Self {
            url: url.trim().to_string(),
            document: Html::parse_document(html),
        }
    }

    pub(crate) fn url(&self) -> &str {
        &self.url
    }

    pub(crate) fn handle(&self, request: PageRequest) -> Option<ScrapedPlaylist> {
        match request {
            PageRequest::GetPlaylistInfo => self.playlist_info(),
        }
    }

    /// `None` when the page address carries no `list` parameter.
    pub(crate) fn playlist_info(&self) -> Option<ScrapedPlaylist> {
        let page_url = Url::parse(&self.url).ok()?;
        let playlist_id = list_param(&page_url)?;
        let selectors = &*SELECTORS;

        let title = self
            .document
            .select(&selectors.heading)
            .next()
            .map(element_text)
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| UNTITLED_PLAYLIST.to_string());

        let videos: Vec<Video> = self
            .document
            .select(&selectors.items)
            .enumerate()
            .map(|(index, item)| scrape_item(item, index, &page_url, &playlist_id))
            .collect();

        let video_count = self
            .document
            .select(&selectors.video_count)
            .next()
            .and_then(|el| parse_count(&el.text().collect::<String>()))
            .unwrap_or(videos.len() as u32);

        Some(ScrapedPlaylist {
            snapshot: PlaylistSnapshot {
                playlist_id,
                title,
                video_count,
                videos,
            },
            source_url: self.url.clone(),
        })
    }
}

/// Answers a raw JSON message; anything but `getPlaylistInfo` is rejected.
pub(crate) fn handle_page_message(
    page: &RenderedPage,
    raw_request: &str,
) -> Result<String, serde_json::Error> {
    let request: PageRequest = serde_json::from_str(raw_request)?;
    serde_json::to_string_pretty(&page.handle(request))
}

fn scrape_item(item: ElementRef<'_>, index: usize, page_url: &Url, playlist_id: &str) -> Video {
    let selectors = &*SELECTORS;

    // Candidates are tried by priority rather than document order: the
    // thumbnail anchor precedes the title and holds the duration overlay.
    let title = selectors
        .item_titles
        .iter()
        .find_map(|candidate| {
            item.select(candidate)
                .next()
                .map(element_text)
                .filter(|text| !text.is_empty())
        })
        .or_else(|| {
            item.select(&selectors.item_thumbnail_anchor)
                .next()
                .and_then(|anchor| anchor.value().attr("title"))
                .map(|title| title.trim().to_string())
                .filter(|title| !title.is_empty())
        })
        .unwrap_or_else(|| format!("Video {}", index + 1));

    let href = item
        .select(&selectors.item_link)
        .next()
        .and_then(|anchor| anchor.value().attr("href"))
        .and_then(|href| page_url.join(href.trim()).ok());
    let video_id = href.as_ref().and_then(|link| query_param(link, "v"));
    let link = match (&href, &video_id) {
        (Some(link), _) => link.to_string(),
        (None, Some(id)) => watch_link(id, playlist_id),
        (None, None) => format!("https://www.youtube.com/playlist?list={playlist_id}"),
    };

    let thumbnail = item
        .select(&selectors.item_image)
        .find_map(|img| img.value().attr("src").map(str::trim).filter(|src| !src.is_empty()))
        .unwrap_or_default()
        .to_string();

    let duration = item
        .select(&selectors.item_duration)
        .next()
        .map(element_text)
        .filter(|text| !text.is_empty());

    Video {
        id: video_id.unwrap_or_else(|| format!("video-{index}")),
        title,
        thumbnail,
        link,
        position: index as u32,
        duration,
    }
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_count(text: &str) -> Option<u32> {
    let digits = COUNT_RE.captures(text)?.get(1)?.as_str().replace(',', "");
    digits.parse::<u32>().ok()
}
