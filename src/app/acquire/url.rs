use url::Url;

use super::AcquisitionError;

const PLATFORM_DOMAINS: [&str; 2] = ["youtube.com", "youtu.be"];

fn is_platform_host(host: &str) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    PLATFORM_DOMAINS
        .iter()
        .any(|domain| host == *domain || host.ends_with(&format!(".{domain}")))
}

/// Extracts the `list` parameter of a YouTube URL. Other hosts yield `None`.
pub fn playlist_id_from_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    if !is_platform_host(url.host_str()?) {
        return None;
    }
    list_param(&url)
}

pub fn parse_playlist_url(raw: &str) -> Result<String, AcquisitionError> {
    playlist_id_from_url(raw).ok_or_else(|| AcquisitionError::InvalidUrl(raw.trim().to_string()))
}

pub(super) fn list_param(url: &Url) -> Option<String> {
    query_param(url, "list")
}

pub(super) fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn watch_link(video_id: &str, playlist_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}&list={playlist_id}")
}
