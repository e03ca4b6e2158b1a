use chrono::{DateTime, Local, Utc};

use crate::model::{Course, Video};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Deadline {
    Overdue(i64),
    Soon(i64),
    OnTrack(i64),
}

impl Deadline {
    pub(crate) fn from_days(days: i64) -> Self {
        if days < 0 {
            Self::Overdue(-days)
        } else if days <= 3 {
            Self::Soon(days)
        } else {
            Self::OnTrack(days)
        }
    }

    pub(crate) fn label(self) -> String {
        match self {
            Self::Overdue(days) => format!("{days} {} overdue", plural_days(days)),
            Self::Soon(days) | Self::OnTrack(days) => {
                format!("{days} {} left", plural_days(days))
            }
        }
    }
}

fn plural_days(days: i64) -> &'static str {
    if days == 1 { "day" } else { "days" }
}

pub(crate) fn course_deadline(course: &Course, now: DateTime<Utc>) -> Option<Deadline> {
    course.days_remaining(now).map(Deadline::from_days)
}

pub(crate) fn format_target_status(course: &Course, now: DateTime<Utc>) -> String {
    match (course.target_date, course_deadline(course, now)) {
        (Some(date), Some(deadline)) => format!("{} ({})", date.format("%Y-%m-%d"), deadline.label()),
        _ => "-".to_string(),
    }
}

pub(crate) fn format_video_tally(course: &Course) -> String {
    format!("{}/{} videos", course.completed_count(), course.total_videos())
}

pub(crate) fn build_progress_gauge(course: &Course) -> (f64, String) {
    let percent = course.progress_percent();
    (
        f64::from(percent) / 100.0,
        format!("{percent}%  {}", format_video_tally(course)),
    )
}

pub(crate) fn format_date_added(date_added: &DateTime<Utc>) -> String {
    date_added
        .with_timezone(&Local)
        .format("%b %-d, %Y")
        .to_string()
}

pub(crate) fn completion_marker(course: &Course, video: &Video) -> &'static str {
    if course.is_completed(&video.id) {
        "[x]"
    } else {
        "[ ]"
    }
}

/// Resolves a course by id, or by its 1-based position in the list.
pub(crate) fn resolve_course_ref<'a>(courses: &'a [Course], reference: &str) -> Option<&'a Course> {
    let reference = reference.trim();
    if let Some(course) = courses.iter().find(|course| course.id == reference) {
        return Some(course);
    }
    let ordinal = reference.parse::<usize>().ok()?;
    courses.get(ordinal.checked_sub(1)?)
}

/// Resolves a video by id, or by its 1-based position in the course.
pub(crate) fn resolve_video_ref<'a>(course: &'a Course, reference: &str) -> Option<&'a Video> {
    let reference = reference.trim();
    if let Some(video) = course.videos.iter().find(|video| video.id == reference) {
        return Some(video);
    }
    let ordinal = reference.parse::<usize>().ok()?;
    course.videos.get(ordinal.checked_sub(1)?)
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    let mut out = s.to_string();
    if out.chars().count() > max {
        out = out.chars().take(max.saturating_sub(3)).collect::<String>() + "...";
    }
    out
}
