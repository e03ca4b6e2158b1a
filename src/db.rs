use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};
use thiserror::Error;
use tracing::{debug, info};

use crate::model::Course;

pub const API_KEY_KEY: &str = "youtubeApiKey";
pub const COURSES_KEY: &str = "courses";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("course {0} not found")]
    CourseNotFound(String),
    #[error("video {video_id} is not part of course {course_id}")]
    UnknownVideo { course_id: String, video_id: String },
    #[error("invalid target date '{0}', expected YYYY-MM-DD")]
    InvalidTargetDate(String),
    #[error("storage error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("stored courses are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn parse_target_date(raw: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| StoreError::InvalidTargetDate(raw.trim().to_string()))
}

/// Key-value persistence holding the API credential and the full course
/// collection. Every course mutation rewrites the whole collection inside an
/// immediate transaction, so concurrent writers are serialized.
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        // Writers from other processes hold the lock only for one rewrite.
        conn.busy_timeout(BUSY_TIMEOUT)
            .context("failed to configure database busy timeout")?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let db = Self {
            conn: Connection::open_in_memory()?,
        };
        db.migrate()?;
        Ok(db)
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    pub fn api_key(&self) -> Result<Option<String>, StoreError> {
        Ok(read_value(&self.conn, API_KEY_KEY)?.filter(|key| !key.trim().is_empty()))
    }

    pub fn set_api_key(&self, api_key: &str) -> Result<(), StoreError> {
        write_value(&self.conn, API_KEY_KEY, api_key.trim())?;
        info!("stored API key");
        Ok(())
    }

    pub fn clear_api_key(&self) -> Result<bool, StoreError> {
        let removed = self
            .conn
            .execute("DELETE FROM kv_store WHERE key = ?1", params![API_KEY_KEY])?;
        Ok(removed > 0)
    }

    pub fn list_courses(&self) -> Result<Vec<Course>, StoreError> {
        read_courses(&self.conn)
    }

    pub fn get_course(&self, course_id: &str) -> Result<Option<Course>, StoreError> {
        Ok(self
            .list_courses()?
            .into_iter()
            .find(|course| course.id == course_id))
    }

    pub fn add_course(&self, course: Course) -> Result<(), StoreError> {
        let course_id = course.id.clone();
        self.update_courses(|courses| {
            courses.push(course);
            Ok(())
        })?;
        info!(course_id = %course_id, "added course");
        Ok(())
    }

    pub fn remove_course(&self, course_id: &str) -> Result<bool, StoreError> {
        let removed = self.update_courses(|courses| {
            let before = courses.len();
            courses.retain(|course| course.id != course_id);
            Ok(courses.len() != before)
        })?;
        if removed {
            info!(course_id, "removed course");
        }
        Ok(removed)
    }

    pub fn set_target_date(
        &self,
        course_id: &str,
        target_date: Option<NaiveDate>,
    ) -> Result<(), StoreError> {
        self.update_courses(|courses| {
            let course = find_course_mut(courses, course_id)?;
            course.target_date = target_date;
            Ok(())
        })?;
        debug!(course_id, ?target_date, "updated target date");
        Ok(())
    }

    /// Returns whether the video is completed after the toggle.
    pub fn toggle_video(&self, course_id: &str, video_id: &str) -> Result<bool, StoreError> {
        let completed = self.update_courses(|courses| {
            let course = find_course_mut(courses, course_id)?;
            if !course.has_video(video_id) {
                return Err(StoreError::UnknownVideo {
                    course_id: course_id.to_string(),
                    video_id: video_id.to_string(),
                });
            }
            Ok(course.toggle_completed(video_id))
        })?;
        debug!(course_id, video_id, completed, "toggled video");
        Ok(completed)
    }

    fn update_courses<T>(
        &self,
        apply: impl FnOnce(&mut Vec<Course>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let mut courses = read_courses(&tx)?;
        let out = apply(&mut courses)?;
        write_value(&tx, COURSES_KEY, &serde_json::to_string(&courses)?)?;
        tx.commit()?;
        Ok(out)
    }
}

fn find_course_mut<'a>(
    courses: &'a mut [Course],
    course_id: &str,
) -> Result<&'a mut Course, StoreError> {
    courses
        .iter_mut()
        .find(|course| course.id == course_id)
        .ok_or_else(|| StoreError::CourseNotFound(course_id.to_string()))
}

fn read_courses(conn: &Connection) -> Result<Vec<Course>, StoreError> {
    match read_value(conn, COURSES_KEY)? {
        Some(raw) => Ok(serde_json::from_str(&raw)?),
        None => Ok(Vec::new()),
    }
}

fn read_value(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT value FROM kv_store WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

fn write_value(conn: &Connection, key: &str, value: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        r#"
        INSERT INTO kv_store (key, value)
        VALUES (?1, ?2)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
        params![key, value],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PlaylistSnapshot, Video};
    use chrono::Utc;

    fn snapshot(playlist_id: &str, video_ids: &[&str]) -> PlaylistSnapshot {
        PlaylistSnapshot {
            playlist_id: playlist_id.to_string(),
            title: format!("Playlist {playlist_id}"),
            video_count: video_ids.len() as u32,
            videos: video_ids
                .iter()
                .enumerate()
                .map(|(idx, id)| Video {
                    id: id.to_string(),
                    title: format!("Video {id}"),
                    thumbnail: String::new(),
                    link: format!("https://www.youtube.com/watch?v={id}&list={playlist_id}"),
                    position: idx as u32,
                    duration: None,
                })
                .collect(),
        }
    }

    fn add(db: &Database, playlist_id: &str, video_ids: &[&str]) -> Course {
        let course = Course::from_snapshot(snapshot(playlist_id, video_ids), Utc::now());
        db.add_course(course.clone()).expect("add course");
        course
    }

    struct TempDbPath(std::path::PathBuf);

    impl TempDbPath {
        fn new(label: &str) -> Self {
            Self(std::env::temp_dir().join(format!(
                "ytrackie-{label}-{}.db",
                uuid::Uuid::new_v4()
            )))
        }

        fn open(&self) -> Database {
            let db = Database::open(&self.0).expect("open file db");
            db.migrate().expect("migrate");
            db
        }
    }

    impl Drop for TempDbPath {
        fn drop(&mut self) {
            for suffix in ["", "-journal", "-wal", "-shm"] {
                let _ = std::fs::remove_file(format!("{}{suffix}", self.0.display()));
            }
        }
    }

    #[test]
    fn interleaved_writers_on_one_file_keep_each_others_changes() {
        let path = TempDbPath::new("interleaved");
        let first = path.open();
        let second = path.open();

        let a = add(&first, "PLA", &["a1", "a2"]);
        let b = add(&second, "PLB", &["b1"]);
        assert!(first.toggle_video(&a.id, "a2").expect("toggle a2"));
        let c = add(&first, "PLC", &["c1"]);
        assert!(second.toggle_video(&b.id, "b1").expect("toggle b1"));
        second
            .set_target_date(&a.id, NaiveDate::from_ymd_opt(2026, 9, 1))
            .expect("set target");

        let courses = first.list_courses().expect("list");
        let ids: Vec<&str> = courses.iter().map(|course| course.id.as_str()).collect();
        assert_eq!(ids, vec![a.id.as_str(), b.id.as_str(), c.id.as_str()]);
        assert_eq!(courses[0].completed_videos, vec!["a2".to_string()]);
        assert_eq!(courses[0].target_date, NaiveDate::from_ymd_opt(2026, 9, 1));
        assert_eq!(courses[1].completed_videos, vec!["b1".to_string()]);
    }

    #[test]
    fn concurrent_writers_on_one_file_lose_no_updates() {
        let path = TempDbPath::new("concurrent");
        let setup = path.open();
        let a = add(&setup, "PLA", &["a0", "a1", "a2", "a3", "a4"]);
        let b = add(&setup, "PLB", &["b0", "b1", "b2", "b3", "b4"]);

        std::thread::scope(|scope| {
            for course in [&a, &b] {
                let path = &path;
                scope.spawn(move || {
                    let db = path.open();
                    for video in &course.videos {
                        db.toggle_video(&course.id, &video.id).expect("toggle");
                        add(&db, &format!("{}-extra", course.playlist_id), &["x"]);
                    }
                });
            }
        });

        let courses = setup.list_courses().expect("list");
        assert_eq!(courses.len(), 12);
        for original in [&a, &b] {
            let stored = courses
                .iter()
                .find(|course| course.id == original.id)
                .expect("course kept");
            assert_eq!(stored.completed_count(), 5);
        }
    }

    #[test]
    fn empty_store_lists_nothing() {
        let db = Database::open_in_memory().expect("open db");
        assert!(db.list_courses().expect("list").is_empty());
        assert_eq!(db.api_key().expect("api key"), None);
    }

    #[test]
    fn add_appends_in_order_and_allows_duplicate_playlists() {
        let db = Database::open_in_memory().expect("open db");
        let first = add(&db, "PL1", &["a"]);
        let second = add(&db, "PL1", &["a"]);

        let courses = db.list_courses().expect("list");
        assert_eq!(courses.len(), 2);
        assert_eq!(courses[0].id, first.id);
        assert_eq!(courses[1].id, second.id);
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn remove_leaves_other_courses_untouched() {
        let db = Database::open_in_memory().expect("open db");
        let keep_a = add(&db, "PLA", &["a1", "a2"]);
        let gone = add(&db, "PLB", &["b1"]);
        let keep_c = add(&db, "PLC", &["c1", "c2"]);
        db.toggle_video(&keep_a.id, "a2").expect("toggle a2");
        db.toggle_video(&keep_c.id, "c1").expect("toggle c1");
        let before = db.list_courses().expect("list");

        assert!(db.remove_course(&gone.id).expect("remove"));
        assert!(!db.remove_course(&gone.id).expect("remove again"));

        let after = db.list_courses().expect("list");
        assert_eq!(after.len(), 2);
        assert_eq!(after[0], before[0]);
        assert_eq!(after[1], before[2]);
        assert_eq!(after[0].completed_videos, vec!["a2".to_string()]);
    }

    #[test]
    fn toggle_video_flips_membership_and_persists() {
        let db = Database::open_in_memory().expect("open db");
        let course = add(&db, "PL1", &["a", "b"]);

        assert!(db.toggle_video(&course.id, "b").expect("toggle on"));
        let stored = db.get_course(&course.id).expect("get").expect("exists");
        assert_eq!(stored.completed_videos, vec!["b".to_string()]);
        assert_eq!(stored.progress_percent(), 50);

        assert!(!db.toggle_video(&course.id, "b").expect("toggle off"));
        let stored = db.get_course(&course.id).expect("get").expect("exists");
        assert!(stored.completed_videos.is_empty());
    }

    #[test]
    fn toggle_video_rejects_unknown_ids() {
        let db = Database::open_in_memory().expect("open db");
        let course = add(&db, "PL1", &["a"]);

        let err = db
            .toggle_video(&course.id, "not-in-course")
            .expect_err("unknown video should be rejected");
        assert!(matches!(err, StoreError::UnknownVideo { .. }));

        let err = db
            .toggle_video("missing", "a")
            .expect_err("unknown course should be rejected");
        assert!(matches!(err, StoreError::CourseNotFound(_)));

        let stored = db.get_course(&course.id).expect("get").expect("exists");
        assert!(stored.completed_videos.is_empty());
    }

    #[test]
    fn target_date_can_be_set_and_cleared() {
        let db = Database::open_in_memory().expect("open db");
        let course = add(&db, "PL1", &["a"]);
        let date = parse_target_date("2026-12-24").expect("valid date");

        db.set_target_date(&course.id, Some(date)).expect("set");
        let stored = db.get_course(&course.id).expect("get").expect("exists");
        assert_eq!(stored.target_date, Some(date));

        db.set_target_date(&course.id, None).expect("clear");
        let stored = db.get_course(&course.id).expect("get").expect("exists");
        assert_eq!(stored.target_date, None);
    }

    #[test]
    fn parse_target_date_rejects_garbage() {
        assert!(matches!(
            parse_target_date("next friday"),
            Err(StoreError::InvalidTargetDate(_))
        ));
        assert!(parse_target_date(" 2026-02-28 ").is_ok());
    }

    #[test]
    fn api_key_is_trimmed_and_clearable() {
        let db = Database::open_in_memory().expect("open db");
        db.set_api_key("  AIza-test  ").expect("set key");
        assert_eq!(db.api_key().expect("read"), Some("AIza-test".to_string()));
        assert!(db.clear_api_key().expect("clear"));
        assert_eq!(db.api_key().expect("read"), None);
    }
}
