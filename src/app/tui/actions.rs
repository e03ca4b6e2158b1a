use std::collections::VecDeque;
use std::sync::mpsc;

use anyhow::Result;
use chrono::Utc;
use tracing::{error, info};

use crate::config::{Settings, resolve_api_key};
use crate::db::Database;
use crate::model::Course;

use super::super::acquire::{Acquired, CancelToken, acquire_from_api};
use super::super::view::{Effect, NoticeKind, ViewContext, ViewEvent, ViewState, update};

pub(super) struct FetchOutcome {
    generation: u64,
    result: Result<Acquired, String>,
}

struct ActiveFetch {
    generation: u64,
    cancel: CancelToken,
}

/// Owns the view state and executes the effects `update` asks for.
pub(super) struct Runtime<'a> {
    db: &'a Database,
    settings: &'a Settings,
    pub(super) state: ViewState,
    pub(super) courses: Vec<Course>,
    pub(super) api_key: Option<String>,
    fetch_tx: mpsc::Sender<FetchOutcome>,
    fetch_rx: mpsc::Receiver<FetchOutcome>,
    active_fetch: Option<ActiveFetch>,
    next_generation: u64,
}

impl<'a> Runtime<'a> {
    pub(super) fn new(db: &'a Database, settings: &'a Settings) -> Result<Self> {
        let (fetch_tx, fetch_rx) = mpsc::channel();
        let mut runtime = Self {
            db,
            settings,
            state: ViewState::default(),
            courses: Vec::new(),
            api_key: None,
            fetch_tx,
            fetch_rx,
            active_fetch: None,
            next_generation: 0,
        };
        runtime.refresh()?;
        Ok(runtime)
    }

    fn refresh(&mut self) -> Result<()> {
        self.courses = self.db.list_courses()?;
        self.api_key = resolve_api_key(self.db)?;
        Ok(())
    }

    pub(super) fn dispatch(&mut self, event: ViewEvent) -> Result<()> {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            let ctx = ViewContext {
                courses: &self.courses,
                has_api_key: self.api_key.is_some(),
                now: Utc::now(),
            };
            let (next, effects) = update(std::mem::take(&mut self.state), event, &ctx);
            self.state = next;
            for effect in effects {
                queue.extend(self.apply(effect)?);
            }
        }
        Ok(())
    }

    /// Feeds finished fetches back in; results of superseded or cancelled
    /// fetches are dropped.
    pub(super) fn drain_fetch_results(&mut self) -> Result<()> {
        while let Ok(outcome) = self.fetch_rx.try_recv() {
            let current = self
                .active_fetch
                .as_ref()
                .is_some_and(|active| active.generation == outcome.generation);
            if !current {
                continue;
            }
            self.active_fetch = None;
            self.dispatch(ViewEvent::FetchFinished(outcome.result))?;
        }
        Ok(())
    }

    fn apply(&mut self, effect: Effect) -> Result<Vec<ViewEvent>> {
        let events = match effect {
            Effect::StartFetch { url } => {
                self.start_fetch(url);
                Vec::new()
            }
            Effect::CancelFetch => {
                if let Some(active) = self.active_fetch.take() {
                    active.cancel.cancel();
                    info!(generation = active.generation, "cancelled playlist fetch");
                }
                Vec::new()
            }
            Effect::AddCourse(snapshot) => {
                let course = Course::from_snapshot(snapshot, Utc::now());
                let course_id = course.id.clone();
                match self.db.add_course(course) {
                    Ok(()) => {
                        self.refresh()?;
                        vec![ViewEvent::CourseAdded { course_id }]
                    }
                    Err(err) => store_failure("Add failed", &err),
                }
            }
            Effect::RemoveCourse { course_id } => match self.db.remove_course(&course_id) {
                Ok(true) => {
                    self.refresh()?;
                    vec![ViewEvent::Notify(
                        NoticeKind::Success,
                        "Course deleted.".to_string(),
                    )]
                }
                Ok(false) => {
                    self.refresh()?;
                    vec![ViewEvent::Notify(
                        NoticeKind::Error,
                        "Delete failed: course no longer exists.".to_string(),
                    )]
                }
                Err(err) => store_failure("Delete failed", &err),
            },
            Effect::ToggleVideo {
                course_id,
                video_id,
            } => match self.db.toggle_video(&course_id, &video_id) {
                Ok(_) => {
                    self.refresh()?;
                    Vec::new()
                }
                Err(err) => store_failure("Update failed", &err),
            },
            Effect::SetTargetDate { course_id, date } => {
                match self.db.set_target_date(&course_id, date) {
                    Ok(()) => {
                        self.refresh()?;
                        let text = match date {
                            Some(date) => format!("Target date set to {}.", date.format("%Y-%m-%d")),
                            None => "Target date cleared.".to_string(),
                        };
                        vec![ViewEvent::Notify(NoticeKind::Success, text)]
                    }
                    Err(err) => store_failure("Target date not saved", &err),
                }
            }
            Effect::SaveApiKey(key) => match self.db.set_api_key(&key) {
                Ok(()) => {
                    self.refresh()?;
                    vec![ViewEvent::Notify(
                        NoticeKind::Success,
                        "API key saved!".to_string(),
                    )]
                }
                Err(err) => store_failure("API key not saved", &err),
            },
        };
        Ok(events)
    }

    fn start_fetch(&mut self, url: String) {
        if let Some(previous) = self.active_fetch.take() {
            previous.cancel.cancel();
        }
        self.next_generation += 1;
        let generation = self.next_generation;
        let cancel = CancelToken::new();
        self.active_fetch = Some(ActiveFetch {
            generation,
            cancel: cancel.clone(),
        });

        let api_key = self.api_key.clone();
        let settings = self.settings.clone();
        let tx = self.fetch_tx.clone();
        info!(generation, url = %url, "starting playlist fetch");
        std::thread::spawn(move || {
            let result = acquire_from_api(&url, api_key.as_deref(), &settings, &cancel)
                .map_err(|err| {
                    error!(error = %err, retryable = err.is_retryable(), "playlist fetch failed");
                    err.to_string()
                });
            let _ = tx.send(FetchOutcome { generation, result });
        });
    }
}

fn store_failure(action: &str, err: &dyn std::error::Error) -> Vec<ViewEvent> {
    error!(error = %err, "{action}");
    vec![ViewEvent::Notify(
        NoticeKind::Error,
        format!("{action}: {err}"),
    )]
}
