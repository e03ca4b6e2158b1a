use std::env;
use std::time::Duration;

use crate::db::{Database, StoreError};
use crate::http::RetryPolicy;

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";
pub const DEFAULT_MAX_PAGES: usize = 200;

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_base_url: String,
    pub max_pages: usize,
    pub(crate) retry: RetryPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE.to_string(),
            max_pages: DEFAULT_MAX_PAGES,
            retry: RetryPolicy::default(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Ok(base) = env::var("YTRACKIE_API_BASE") {
            let base = base.trim().trim_end_matches('/');
            if !base.is_empty() {
                settings.api_base_url = base.to_string();
            }
        }
        if let Some(max_pages) = env_number("YTRACKIE_MAX_PAGES").filter(|value| *value > 0) {
            settings.max_pages = max_pages as usize;
        }
        if let Some(attempts) = env_number("YTRACKIE_HTTP_ATTEMPTS").filter(|value| *value > 0) {
            settings.retry.attempts = attempts as usize;
        }
        if let Some(secs) = env_number("YTRACKIE_HTTP_TIMEOUT_SECS").filter(|value| *value > 0) {
            settings.retry.read_timeout = Duration::from_secs(secs);
        }
        settings
    }
}

fn env_number(name: &str) -> Option<u64> {
    env::var(name).ok()?.trim().parse::<u64>().ok()
}

/// `YOUTUBE_API_KEY` wins over the stored credential.
pub fn resolve_api_key(db: &Database) -> Result<Option<String>, StoreError> {
    if let Ok(key) = env::var("YOUTUBE_API_KEY")
        && !key.trim().is_empty()
    {
        return Ok(Some(key.trim().to_string()));
    }
    db.api_key()
}
