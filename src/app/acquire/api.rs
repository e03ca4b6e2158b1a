use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::http::get_text_with_retries;
use crate::model::{PlaylistSnapshot, Video};

use super::url::watch_link;
use super::{AcquisitionError, CancelToken};

pub(crate) const PAGE_SIZE: &str = "50";

/// Fetches playlist metadata, then walks `playlistItems` pages in order until
/// the API stops returning a continuation token.
pub(crate) fn fetch_playlist(
    playlist_id: &str,
    api_key: &str,
    settings: &Settings,
    cancel: &CancelToken,
) -> Result<PlaylistSnapshot, AcquisitionError> {
    if api_key.trim().is_empty() {
        return Err(AcquisitionError::MissingCredential);
    }
    cancel.check()?;

    let metadata_url = format!("{}/playlists", settings.api_base_url);
    let raw = get_text_with_retries(
        &metadata_url,
        &[
            ("part", "snippet,contentDetails"),
            ("id", playlist_id),
            ("key", api_key),
        ],
        &settings.retry,
    )
    .map_err(|err| AcquisitionError::from_http(playlist_id, err))?;
    let (title, reported_count) = parse_playlist_metadata(&raw, playlist_id)?;
    info!(playlist_id, title = %title, ?reported_count, "fetched playlist metadata");

    let items_url = format!("{}/playlistItems", settings.api_base_url);
    let mut videos = Vec::new();
    let mut page_token: Option<String> = None;
    let mut pages = 0_usize;

    loop {
        cancel.check()?;
        if pages >= settings.max_pages {
            return Err(AcquisitionError::PageLimitExceeded {
                max_pages: settings.max_pages,
            });
        }

        let mut query = vec![
            ("part", "snippet"),
            ("playlistId", playlist_id),
            ("maxResults", PAGE_SIZE),
        ];
        if let Some(token) = page_token.as_deref() {
            query.push(("pageToken", token));
        }
        query.push(("key", api_key));

        let raw = get_text_with_retries(&items_url, &query, &settings.retry)
            .map_err(|err| AcquisitionError::from_http(playlist_id, err))?;
        let page = parse_items_page(&raw, playlist_id, videos.len())?;
        pages += 1;
        debug!(
            playlist_id,
            page = pages,
            items = page.videos.len(),
            "fetched playlist items page"
        );
        videos.extend(page.videos);

        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    // Private and deleted entries are listed in itemCount but never returned,
    // so the count of fetched videos is the only one a viewer can complete.
    let video_count = saturating_u32(videos.len());
    if let Some(reported) = reported_count
        && reported != video_count
    {
        warn!(
            playlist_id,
            reported,
            fetched = video_count,
            "playlist reports a different item count than it returned"
        );
    }
    info!(
        playlist_id,
        pages,
        videos = videos.len(),
        video_count,
        "fetched playlist items"
    );
    Ok(PlaylistSnapshot {
        playlist_id: playlist_id.to_string(),
        title,
        video_count,
        videos,
    })
}

fn parse_json(raw: &str) -> Result<Value, AcquisitionError> {
    serde_json::from_str(raw).map_err(|err| {
        AcquisitionError::TransientFetchFailure(format!("malformed API response: {err}"))
    })
}

pub(crate) fn parse_playlist_metadata(
    raw: &str,
    playlist_id: &str,
) -> Result<(String, Option<u32>), AcquisitionError> {
    let parsed = parse_json(raw)?;
    let Some(item) = parsed
        .get("items")
        .and_then(Value::as_array)
        .and_then(|items| items.first())
    else {
        return Err(AcquisitionError::NotFound(playlist_id.to_string()));
    };

    let title = item
        .pointer("/snippet/title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .unwrap_or("Untitled Playlist")
        .to_string();
    let reported_count = item
        .pointer("/contentDetails/itemCount")
        .and_then(Value::as_u64)
        .and_then(|count| u32::try_from(count).ok());
    Ok((title, reported_count))
}

#[derive(Debug)]
pub(crate) struct ItemsPage {
    pub(crate) videos: Vec<Video>,
    pub(crate) next_page_token: Option<String>,
}

pub(crate) fn parse_items_page(
    raw: &str,
    playlist_id: &str,
    offset: usize,
) -> Result<ItemsPage, AcquisitionError> {
    let parsed = parse_json(raw)?;
    let items = parsed
        .get("items")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut videos = Vec::with_capacity(items.len());
    for item in items {
        let Some(snippet) = item.get("snippet") else {
            continue;
        };
        let Some(video_id) = snippet
            .pointer("/resourceId/videoId")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
        else {
            debug!(playlist_id, "skipping playlist item without a video id");
            continue;
        };
        let position = snippet
            .get("position")
            .and_then(Value::as_u64)
            .and_then(|position| u32::try_from(position).ok())
            .unwrap_or_else(|| saturating_u32(offset + videos.len()));

        videos.push(Video {
            id: video_id.to_string(),
            title: snippet
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            thumbnail: pick_thumbnail(snippet),
            link: watch_link(video_id, playlist_id),
            position,
            duration: None,
        });
    }

    let next_page_token = parsed
        .get("nextPageToken")
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
        .map(str::to_string);
    Ok(ItemsPage {
        videos,
        next_page_token,
    })
}

fn saturating_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

fn pick_thumbnail(snippet: &Value) -> String {
    ["/thumbnails/medium/url", "/thumbnails/default/url"]
        .iter()
        .find_map(|pointer| snippet.pointer(pointer).and_then(Value::as_str))
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::RetryPolicy;
    use crate::model::Course;
    use chrono::Utc;
    use crate::http::test_support::{Behavior, TestServer, unreachable_url};
    use serde_json::json;
    use std::time::Duration;

    fn settings(base_url: &str, max_pages: usize) -> Settings {
        Settings {
            api_base_url: base_url.to_string(),
            max_pages,
            retry: RetryPolicy {
                connect_timeout: Duration::from_millis(250),
                read_timeout: Duration::from_millis(500),
                attempts: 1,
                retry_delay: Duration::from_millis(1),
            },
        }
    }

    fn metadata_body(title: &str, item_count: Option<u32>) -> String {
        let mut item = json!({ "id": "PL123", "snippet": { "title": title } });
        if let Some(count) = item_count {
            item["contentDetails"] = json!({ "itemCount": count });
        }
        json!({ "items": [item] }).to_string()
    }

    fn page_body(start: usize, len: usize, next: Option<&str>) -> String {
        let items: Vec<Value> = (start..start + len)
            .map(|idx| {
                json!({
                    "snippet": {
                        "title": format!("Lesson {idx}"),
                        "position": idx,
                        "resourceId": { "kind": "youtube#video", "videoId": format!("vid{idx}") },
                        "thumbnails": {
                            "default": { "url": format!("https://i.ytimg.com/vi/vid{idx}/default.jpg") },
                            "medium": { "url": format!("https://i.ytimg.com/vi/vid{idx}/mqdefault.jpg") }
                        }
                    }
                })
            })
            .collect();
        let mut body = json!({ "items": items });
        if let Some(token) = next {
            body["nextPageToken"] = json!(token);
        }
        body.to_string()
    }

    #[test]
    fn paginates_until_token_is_absent() {
        let server = TestServer::spawn(vec![
            Behavior::Respond(200, metadata_body("Rust in Depth", None)),
            Behavior::Respond(200, page_body(0, 50, Some("PAGE2"))),
            Behavior::Respond(200, page_body(50, 50, Some("PAGE3"))),
            Behavior::Respond(200, page_body(100, 7, None)),
        ]);

        let snapshot = fetch_playlist(
            "PL123",
            "key",
            &settings(&server.base_url, 10),
            &CancelToken::new(),
        )
        .expect("fetch should succeed");

        assert_eq!(snapshot.title, "Rust in Depth");
        assert_eq!(snapshot.videos.len(), 107);
        assert_eq!(snapshot.video_count, 107);
        for (idx, video) in snapshot.videos.iter().enumerate() {
            assert_eq!(video.id, format!("vid{idx}"));
            assert_eq!(video.position, idx as u32);
        }
        assert_eq!(
            snapshot.videos[0].link,
            "https://www.youtube.com/watch?v=vid0&list=PL123"
        );

        let lines = server.request_lines();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("GET /playlists?"));
        assert!(!lines[1].contains("pageToken"));
        assert!(lines[2].contains("pageToken=PAGE2"));
        assert!(lines[3].contains("pageToken=PAGE3"));
        assert!(lines[1].contains("maxResults=50"));
    }

    #[test]
    fn counts_fetched_videos_over_reported_item_count() {
        let server = TestServer::spawn(vec![
            Behavior::Respond(200, metadata_body("Partly Private", Some(12))),
            Behavior::Respond(200, page_body(0, 10, None)),
        ]);

        let snapshot = fetch_playlist(
            "PL123",
            "key",
            &settings(&server.base_url, 10),
            &CancelToken::new(),
        )
        .expect("fetch should succeed");

        assert_eq!(snapshot.videos.len(), 10);
        assert_eq!(snapshot.video_count, 10);

        let mut course = Course::from_snapshot(snapshot, Utc::now());
        let ids: Vec<String> = course.videos.iter().map(|video| video.id.clone()).collect();
        for id in &ids {
            course.toggle_completed(id);
        }
        assert_eq!(course.progress_percent(), 100);
    }

    #[test]
    fn empty_metadata_is_not_found() {
        let server = TestServer::spawn(vec![Behavior::Respond(200, r#"{"items": []}"#.to_string())]);

        let err = fetch_playlist(
            "PLnope",
            "key",
            &settings(&server.base_url, 10),
            &CancelToken::new(),
        )
        .expect_err("missing playlist should fail");

        assert!(matches!(err, AcquisitionError::NotFound(id) if id == "PLnope"));
        assert_eq!(server.request_count(), 1);
    }

    #[test]
    fn forbidden_is_unauthorized() {
        let server = TestServer::spawn(vec![Behavior::Respond(
            403,
            r#"{"error": {"code": 403, "message": "quota"}}"#.to_string(),
        )]);

        let err = fetch_playlist(
            "PL123",
            "key",
            &settings(&server.base_url, 10),
            &CancelToken::new(),
        )
        .expect_err("forbidden should fail");

        assert!(matches!(err, AcquisitionError::Unauthorized(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn malformed_page_is_transient() {
        let server = TestServer::spawn(vec![
            Behavior::Respond(200, metadata_body("Broken", None)),
            Behavior::Respond(200, "<html>not json</html>".to_string()),
        ]);

        let err = fetch_playlist(
            "PL123",
            "key",
            &settings(&server.base_url, 10),
            &CancelToken::new(),
        )
        .expect_err("malformed page should fail");

        assert!(err.is_retryable(), "unexpected error: {err:?}");
    }

    #[test]
    fn stops_at_page_limit() {
        let server = TestServer::spawn(vec![
            Behavior::Respond(200, metadata_body("Endless", None)),
            Behavior::Respond(200, page_body(0, 50, Some("PAGE2"))),
            Behavior::Respond(200, page_body(50, 50, Some("PAGE3"))),
        ]);

        let err = fetch_playlist(
            "PL123",
            "key",
            &settings(&server.base_url, 2),
            &CancelToken::new(),
        )
        .expect_err("third page should exceed the limit");

        assert!(matches!(
            err,
            AcquisitionError::PageLimitExceeded { max_pages: 2 }
        ));
        assert_eq!(server.request_count(), 3);
    }

    #[test]
    fn cancelled_token_stops_before_any_request() {
        let server = TestServer::spawn(Vec::new());
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = fetch_playlist("PL123", "key", &settings(&server.base_url, 10), &cancel)
            .expect_err("cancelled fetch should fail");

        assert!(matches!(err, AcquisitionError::Cancelled));
        assert_eq!(server.request_count(), 0);
    }

    #[test]
    fn blank_key_is_missing_credential() {
        let err = fetch_playlist(
            "PL123",
            "  ",
            &settings("http://127.0.0.1:9", 10),
            &CancelToken::new(),
        )
        .expect_err("blank key should fail");
        assert!(matches!(err, AcquisitionError::MissingCredential));
    }

    #[test]
    fn unreachable_api_reports_failure_without_the_key() {
        let err = fetch_playlist(
            "PL123",
            "SECRETKEY123",
            &settings(&unreachable_url(), 10),
            &CancelToken::new(),
        )
        .expect_err("nothing listens on the port");

        assert!(err.is_retryable(), "unexpected error: {err:?}");
        assert!(!err.to_string().contains("SECRETKEY123"), "leaked key: {err}");
        assert!(!format!("{err:?}").contains("SECRETKEY123"));
    }

    #[test]
    fn out_of_range_position_falls_back_to_item_order() {
        let raw = json!({
            "items": [
                { "snippet": { "title": "Huge", "position": 5_000_000_000_u64,
                    "resourceId": { "videoId": "big" } } },
                { "snippet": { "title": "Max", "position": u32::MAX,
                    "resourceId": { "videoId": "max" } } }
            ]
        })
        .to_string();

        let page = parse_items_page(&raw, "PL123", 40).expect("page should parse");

        assert_eq!(page.videos[0].position, 40);
        assert_eq!(page.videos[1].position, u32::MAX);
        assert_eq!(page.videos[1].number(), u32::MAX);
    }

    #[test]
    fn thumbnail_falls_back_to_default_then_empty() {
        let raw = json!({
            "items": [
                {
                    "snippet": {
                        "title": "Only default",
                        "resourceId": { "videoId": "a" },
                        "thumbnails": { "default": { "url": "https://i.ytimg.com/vi/a/default.jpg" } }
                    }
                },
                { "snippet": { "title": "No thumbs", "resourceId": { "videoId": "b" } } },
                { "snippet": { "title": "Deleted video", "resourceId": {} } }
            ]
        })
        .to_string();

        let page = parse_items_page(&raw, "PL1", 50).expect("page should parse");

        assert_eq!(page.videos.len(), 2);
        assert_eq!(page.videos[0].thumbnail, "https://i.ytimg.com/vi/a/default.jpg");
        assert_eq!(page.videos[1].thumbnail, "");
        assert_eq!(page.videos[0].position, 50);
        assert_eq!(page.videos[1].position, 51);
        assert!(page.next_page_token.is_none());
    }
}
