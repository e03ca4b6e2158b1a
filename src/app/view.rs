//! View state of the progress UI, advanced only through [`update`].
//!
//! Store mutations and network work are not performed here: `update` returns
//! them as [`Effect`]s for the runtime to execute, and results come back as
//! further events.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db::parse_target_date;
use crate::model::{Course, PlaylistSnapshot};

use super::acquire::{Acquired, AcquisitionSource, parse_playlist_url};

const SUCCESS_NOTICE_MS: i64 = 2_000;
const ERROR_NOTICE_MS: i64 = 3_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) enum Screen {
    CourseList,
    AddCourse(AddCourseForm),
    CourseDetail { course_id: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct AddCourseForm {
    pub(crate) url: String,
    pub(crate) stage: AddStage,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) enum AddStage {
    #[default]
    EditingUrl,
    Fetching,
    Preview {
        snapshot: PlaylistSnapshot,
        source: AcquisitionSource,
        complete: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) enum Prompt {
    TargetDate { course_id: String, input: String },
    ApiKey { input: String },
    ConfirmDelete { course_id: String, title: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum NoticeKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Notice {
    pub(crate) kind: NoticeKind,
    pub(crate) text: String,
    pub(crate) expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ViewState {
    pub(crate) screen: Screen,
    pub(crate) prompt: Option<Prompt>,
    pub(crate) notice: Option<Notice>,
    pub(crate) selected_course: usize,
    pub(crate) selected_video: usize,
    pub(crate) quit: bool,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            screen: Screen::CourseList,
            prompt: None,
            notice: None,
            selected_course: 0,
            selected_video: 0,
            quit: false,
        }
    }
}

/// Keys the UI reacts to, independent of the terminal backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Input {
    Up,
    Down,
    Enter,
    Esc,
    Backspace,
    Char(char),
}

#[derive(Debug, Clone)]
pub(crate) enum ViewEvent {
    Tick,
    Input(Input),
    FetchFinished(Result<Acquired, String>),
    CourseAdded { course_id: String },
    Notify(NoticeKind, String),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Effect {
    StartFetch { url: String },
    CancelFetch,
    AddCourse(PlaylistSnapshot),
    RemoveCourse { course_id: String },
    ToggleVideo { course_id: String, video_id: String },
    SetTargetDate { course_id: String, date: Option<NaiveDate> },
    SaveApiKey(String),
}

/// What `update` needs to know about the store, read fresh by the caller.
pub(crate) struct ViewContext<'a> {
    pub(crate) courses: &'a [Course],
    pub(crate) has_api_key: bool,
    pub(crate) now: DateTime<Utc>,
}

impl ViewState {
    pub(crate) fn selected_course<'a>(&self, courses: &'a [Course]) -> Option<&'a Course> {
        match &self.screen {
            Screen::CourseDetail { course_id } => {
                courses.iter().find(|course| &course.id == course_id)
            }
            _ => courses.get(self.selected_course),
        }
    }

    fn notify(&mut self, kind: NoticeKind, text: impl Into<String>, now: DateTime<Utc>) {
        let ttl = match kind {
            NoticeKind::Success => SUCCESS_NOTICE_MS,
            NoticeKind::Error => ERROR_NOTICE_MS,
        };
        self.notice = Some(Notice {
            kind,
            text: text.into(),
            expires_at: now + Duration::milliseconds(ttl),
        });
    }

    fn back_to_list(&mut self) {
        self.screen = Screen::CourseList;
        self.selected_video = 0;
    }
}

pub(crate) fn update(
    mut state: ViewState,
    event: ViewEvent,
    ctx: &ViewContext<'_>,
) -> (ViewState, Vec<Effect>) {
    let mut effects = Vec::new();

    match event {
        ViewEvent::Tick => {
            if state
                .notice
                .as_ref()
                .is_some_and(|notice| notice.expires_at <= ctx.now)
            {
                state.notice = None;
            }
        }
        ViewEvent::Notify(kind, text) => state.notify(kind, text, ctx.now),
        ViewEvent::CourseAdded { course_id } => {
            if let Some(idx) = ctx.courses.iter().position(|course| course.id == course_id) {
                state.selected_course = idx;
                let text = format!("Added course: {}", ctx.courses[idx].title);
                state.notify(NoticeKind::Success, text, ctx.now);
            }
        }
        ViewEvent::FetchFinished(result) => {
            if let Screen::AddCourse(form) = &mut state.screen
                && form.stage == AddStage::Fetching
            {
                match result {
                    Ok(acquired) => {
                        form.stage = AddStage::Preview {
                            snapshot: acquired.snapshot,
                            source: acquired.source,
                            complete: acquired.complete,
                        };
                    }
                    Err(message) => {
                        form.stage = AddStage::EditingUrl;
                        state.notify(NoticeKind::Error, message, ctx.now);
                    }
                }
            }
        }
        ViewEvent::Input(input) => {
            if state.prompt.is_some() {
                handle_prompt_input(&mut state, input, ctx, &mut effects);
            } else {
                handle_screen_input(&mut state, input, ctx, &mut effects);
            }
        }
    }

    clamp_selection(&mut state, ctx);
    (state, effects)
}

fn handle_prompt_input(
    state: &mut ViewState,
    input: Input,
    ctx: &ViewContext<'_>,
    effects: &mut Vec<Effect>,
) {
    let Some(prompt) = state.prompt.take() else {
        return;
    };

    match (prompt, input) {
        (_, Input::Esc) => {}
        (Prompt::ConfirmDelete { course_id, .. }, Input::Enter | Input::Char('y')) => {
            if matches!(&state.screen, Screen::CourseDetail { course_id: open } if *open == course_id)
            {
                state.back_to_list();
            }
            effects.push(Effect::RemoveCourse { course_id });
        }
        (Prompt::ConfirmDelete { .. }, Input::Char('n')) => {}
        (prompt @ Prompt::ConfirmDelete { .. }, _) => state.prompt = Some(prompt),
        (Prompt::TargetDate { course_id, input }, Input::Enter) => {
            if input.trim().is_empty() {
                effects.push(Effect::SetTargetDate {
                    course_id,
                    date: None,
                });
            } else {
                match parse_target_date(&input) {
                    Ok(date) => effects.push(Effect::SetTargetDate {
                        course_id,
                        date: Some(date),
                    }),
                    Err(err) => {
                        state.notify(NoticeKind::Error, err.to_string(), ctx.now);
                        state.prompt = Some(Prompt::TargetDate { course_id, input });
                    }
                }
            }
        }
        (Prompt::ApiKey { input }, Input::Enter) => {
            let key = input.trim().to_string();
            if key.is_empty() {
                state.prompt = Some(Prompt::ApiKey { input });
            } else {
                effects.push(Effect::SaveApiKey(key));
            }
        }
        (mut prompt, input) => {
            if let Some(text) = prompt_text_mut(&mut prompt) {
                edit_text(text, input);
            }
            state.prompt = Some(prompt);
        }
    }
}

fn prompt_text_mut(prompt: &mut Prompt) -> Option<&mut String> {
    match prompt {
        Prompt::TargetDate { input, .. } | Prompt::ApiKey { input } => Some(input),
        Prompt::ConfirmDelete { .. } => None,
    }
}

fn edit_text(text: &mut String, input: Input) {
    match input {
        Input::Char(ch) => text.push(ch),
        Input::Backspace => {
            text.pop();
        }
        _ => {}
    }
}

fn handle_screen_input(
    state: &mut ViewState,
    input: Input,
    ctx: &ViewContext<'_>,
    effects: &mut Vec<Effect>,
) {
    match &mut state.screen {
        Screen::CourseList => match input {
            Input::Char('q') | Input::Esc => state.quit = true,
            Input::Up => state.selected_course = state.selected_course.saturating_sub(1),
            Input::Down => state.selected_course += 1,
            Input::Enter => {
                if let Some(course) = ctx.courses.get(state.selected_course) {
                    state.screen = Screen::CourseDetail {
                        course_id: course.id.clone(),
                    };
                    state.selected_video = 0;
                }
            }
            Input::Char('a') => {
                state.screen = Screen::AddCourse(AddCourseForm::default());
                if !ctx.has_api_key {
                    state.prompt = Some(Prompt::ApiKey {
                        input: String::new(),
                    });
                }
            }
            Input::Char('k') => {
                state.prompt = Some(Prompt::ApiKey {
                    input: String::new(),
                })
            }
            Input::Char('d') => open_delete_prompt(state, ctx),
            Input::Char('t') => open_target_prompt(state, ctx),
            _ => {}
        },
        Screen::CourseDetail { course_id } => match input {
            Input::Char('q') => state.quit = true,
            Input::Esc | Input::Backspace | Input::Char('b') => state.back_to_list(),
            Input::Up => state.selected_video = state.selected_video.saturating_sub(1),
            Input::Down => state.selected_video += 1,
            Input::Enter | Input::Char(' ') => {
                let course = ctx.courses.iter().find(|course| &course.id == course_id);
                if let Some(video) = course.and_then(|course| course.videos.get(state.selected_video))
                {
                    effects.push(Effect::ToggleVideo {
                        course_id: course_id.clone(),
                        video_id: video.id.clone(),
                    });
                }
            }
            Input::Char('d') => open_delete_prompt(state, ctx),
            Input::Char('t') => open_target_prompt(state, ctx),
            _ => {}
        },
        Screen::AddCourse(form) => match (&form.stage, input) {
            (AddStage::EditingUrl, Input::Esc) => state.back_to_list(),
            (AddStage::EditingUrl, Input::Enter) => {
                let url = form.url.trim().to_string();
                if url.is_empty() {
                    return;
                }
                if let Err(err) = parse_playlist_url(&url) {
                    state.notify(NoticeKind::Error, err.to_string(), ctx.now);
                } else if !ctx.has_api_key {
                    state.notify(
                        NoticeKind::Error,
                        "Please add your YouTube API key first",
                        ctx.now,
                    );
                    state.prompt = Some(Prompt::ApiKey {
                        input: String::new(),
                    });
                } else {
                    form.stage = AddStage::Fetching;
                    effects.push(Effect::StartFetch { url });
                }
            }
            (AddStage::EditingUrl, input) => edit_text(&mut form.url, input),
            (AddStage::Fetching, Input::Esc) => {
                form.stage = AddStage::EditingUrl;
                effects.push(Effect::CancelFetch);
            }
            (AddStage::Fetching, _) => {}
            (AddStage::Preview { snapshot, .. }, Input::Enter | Input::Char('y')) => {
                effects.push(Effect::AddCourse(snapshot.clone()));
                state.back_to_list();
            }
            (AddStage::Preview { .. }, Input::Esc | Input::Char('n')) => {
                form.stage = AddStage::EditingUrl;
            }
            (AddStage::Preview { .. }, _) => {}
        },
    }
}

fn open_delete_prompt(state: &mut ViewState, ctx: &ViewContext<'_>) {
    if let Some(course) = state.selected_course(ctx.courses) {
        state.prompt = Some(Prompt::ConfirmDelete {
            course_id: course.id.clone(),
            title: course.title.clone(),
        });
    }
}

fn open_target_prompt(state: &mut ViewState, ctx: &ViewContext<'_>) {
    if let Some(course) = state.selected_course(ctx.courses) {
        state.prompt = Some(Prompt::TargetDate {
            course_id: course.id.clone(),
            input: course
                .target_date
                .map(|date| date.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
        });
    }
}

fn clamp_selection(state: &mut ViewState, ctx: &ViewContext<'_>) {
    state.selected_course = state
        .selected_course
        .min(ctx.courses.len().saturating_sub(1));
    if let Screen::CourseDetail { course_id } = &state.screen {
        let videos = ctx
            .courses
            .iter()
            .find(|course| &course.id == course_id)
            .map_or(0, |course| course.videos.len());
        state.selected_video = state.selected_video.min(videos.saturating_sub(1));
    }
}
