use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const MILLIS_PER_DAY: i64 = 86_400_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub thumbnail: String,
    pub link: String,
    #[serde(alias = "index")]
    pub position: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

/// Output of either acquisition path, before the user confirms it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistSnapshot {
    pub playlist_id: String,
    pub title: String,
    pub video_count: u32,
    pub videos: Vec<Video>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub playlist_id: String,
    pub title: String,
    pub video_count: u32,
    #[serde(default)]
    pub videos: Vec<Video>,
    #[serde(default)]
    pub completed_videos: Vec<String>,
    pub date_added: DateTime<Utc>,
    #[serde(default)]
    pub target_date: Option<NaiveDate>,
}

impl Video {
    /// 1-based number shown next to the video.
    pub fn number(&self) -> u32 {
        self.position.saturating_add(1)
    }
}

impl Course {
    pub fn from_snapshot(snapshot: PlaylistSnapshot, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            playlist_id: snapshot.playlist_id,
            title: snapshot.title,
            video_count: snapshot.video_count,
            videos: snapshot.videos,
            completed_videos: Vec::new(),
            date_added: now,
            target_date: None,
        }
    }

    pub fn has_video(&self, video_id: &str) -> bool {
        self.videos.iter().any(|video| video.id == video_id)
    }

    pub fn is_completed(&self, video_id: &str) -> bool {
        self.completed_videos.iter().any(|id| id == video_id)
    }

    /// Flips membership of `video_id` in `completed_videos` and returns the
    /// new completion state.
    pub fn toggle_completed(&mut self, video_id: &str) -> bool {
        if let Some(idx) = self.completed_videos.iter().position(|id| id == video_id) {
            self.completed_videos.remove(idx);
            false
        } else {
            self.completed_videos.push(video_id.to_string());
            true
        }
    }

    /// Distinct completed ids that still refer to a video of this course.
    pub fn completed_count(&self) -> usize {
        self.completed_videos
            .iter()
            .filter(|id| self.has_video(id))
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn total_videos(&self) -> usize {
        (self.video_count as usize).max(self.videos.len())
    }

    pub fn progress_percent(&self) -> u8 {
        progress_percent(self.completed_count(), self.total_videos())
    }

    pub fn days_remaining(&self, now: DateTime<Utc>) -> Option<i64> {
        self.target_date.map(|target| days_remaining(target, now))
    }
}

pub fn progress_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total);
    ((completed as f64 / total as f64) * 100.0).round() as u8
}

/// Whole days until `target` (taken as UTC midnight), rounded up. Negative
/// once the target day is over.
pub fn days_remaining(target: NaiveDate, now: DateTime<Utc>) -> i64 {
    let target_start = target.and_time(NaiveTime::MIN).and_utc();
    let diff_ms = (target_start - now).num_milliseconds();
    -((-diff_ms).div_euclid(MILLIS_PER_DAY))
}
