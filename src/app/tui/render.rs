use chrono::{DateTime, Utc};
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, BorderType, Borders, Cell, Clear, Gauge, Padding, Paragraph, Row, Table, TableState,
    Wrap,
};

use crate::model::Course;

use super::super::course::{
    Deadline, build_progress_gauge, completion_marker, course_deadline, format_date_added,
    format_target_status, format_video_tally, truncate,
};
use super::super::view::{AddCourseForm, AddStage, NoticeKind, Prompt, Screen, ViewState};

const ACCENT: Color = Color::Rgb(110, 170, 255);
const MUTED: Color = Color::Rgb(185, 195, 210);
const PREVIEW_VIDEOS: usize = 4;

pub(super) struct RenderContext<'a> {
    pub(super) state: &'a ViewState,
    pub(super) courses: &'a [Course],
    pub(super) has_api_key: bool,
    pub(super) now: DateTime<Utc>,
}

pub(super) fn draw_tui(frame: &mut Frame, view: &RenderContext<'_>) {
    let bg = Block::default().style(Style::default().bg(Color::Black));
    frame.render_widget(bg, frame.area());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let screen_label = match &view.state.screen {
        Screen::CourseList => "MY COURSES",
        Screen::AddCourse(_) => "ADD COURSE",
        Screen::CourseDetail { .. } => "COURSE",
    };
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            "YTRACKIE",
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        ),
        Span::styled("   ", Style::default()),
        Span::styled(
            format!("{} courses", view.courses.len()),
            Style::default().fg(MUTED),
        ),
        Span::styled("   ", Style::default()),
        Span::styled(screen_label, Style::default().fg(Color::Yellow)),
    ]))
    .alignment(Alignment::Center)
    .block(panel_block("Dashboard"));
    frame.render_widget(header, chunks[0]);

    match &view.state.screen {
        Screen::CourseList => draw_course_list(frame, view, chunks[1]),
        Screen::CourseDetail { course_id } => {
            match view.courses.iter().find(|course| &course.id == course_id) {
                Some(course) => draw_course_detail(frame, view, course, chunks[1]),
                None => frame.render_widget(
                    Paragraph::new("Course no longer exists. Press Esc to return.")
                        .block(panel_block("Course")),
                    chunks[1],
                ),
            }
        }
        Screen::AddCourse(form) => draw_add_course(frame, form, chunks[1]),
    }

    let controls = Paragraph::new(Line::from(Span::styled(
        controls_text(view.state),
        Style::default().fg(MUTED),
    )))
    .alignment(Alignment::Center)
    .block(panel_block("Controls"));
    frame.render_widget(controls, chunks[2]);

    let (status_text, status_style) = match &view.state.notice {
        Some(notice) => (notice.text.clone(), notice_style(notice.kind)),
        None => ("Ready.".to_string(), Style::default().fg(Color::Rgb(205, 165, 255))),
    };
    let status_widget = Paragraph::new(status_text)
        .style(status_style)
        .block(panel_block("Status"));
    frame.render_widget(status_widget, chunks[3]);

    if let Some(prompt) = &view.state.prompt {
        draw_prompt(frame, prompt);
    }
}

fn draw_course_list(frame: &mut Frame, view: &RenderContext<'_>, area: Rect) {
    let body_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(64), Constraint::Percentage(36)])
        .split(area);
    let details_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(8), Constraint::Length(3)])
        .split(body_chunks[1]);

    let rows: Vec<Row> = view
        .courses
        .iter()
        .map(|course| {
            let deadline = course_deadline(course, view.now);
            let target = match deadline {
                Some(deadline) => Cell::from(deadline.label()).style(deadline_style(deadline)),
                None => Cell::from("-"),
            };
            Row::new(vec![
                Cell::from(course.title.clone()),
                Cell::from(format!("{}%", course.progress_percent())),
                Cell::from(format!("{}/{}", course.completed_count(), course.total_videos())),
                target,
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Percentage(50),
            Constraint::Length(9),
            Constraint::Length(11),
            Constraint::Length(18),
        ],
    )
    .header(
        Row::new(vec!["Title", "Progress", "Videos", "Target"])
            .style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)),
    )
    .block(panel_block("Courses"))
    .row_highlight_style(highlight_style())
    .highlight_symbol("▸ ");
    let mut table_state = TableState::default();
    table_state.select((!view.courses.is_empty()).then_some(view.state.selected_course));
    frame.render_stateful_widget(table, body_chunks[0], &mut table_state);

    let selected = view.courses.get(view.state.selected_course);
    let selection_text = match selected {
        Some(course) => format!(
            "Title\n{}\n\nVideos\n{}\n\nTarget\n{}\n\nAdded\n{}",
            truncate(&course.title, 40),
            format_video_tally(course),
            format_target_status(course, view.now),
            format_date_added(&course.date_added),
        ),
        None if !view.has_api_key => "Welcome! To get started:\n\n\
            1. Get a free YouTube Data API key from Google Cloud\n\
            2. Press k and paste your API key\n\
            3. Press a to add your first playlist course"
            .to_string(),
        None => "No courses yet!\n\nPress a to add your first course.".to_string(),
    };
    let selection = Paragraph::new(selection_text)
        .style(Style::default().fg(Color::Rgb(230, 230, 230)))
        .wrap(Wrap { trim: false })
        .block(panel_block("Selected"));
    frame.render_widget(selection, details_chunks[0]);

    if let Some(course) = selected {
        frame.render_widget(progress_gauge(course), details_chunks[1]);
    }
}

fn draw_course_detail(frame: &mut Frame, view: &RenderContext<'_>, course: &Course, area: Rect) {
    let body_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(64), Constraint::Percentage(36)])
        .split(area);
    let details_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(8), Constraint::Length(3)])
        .split(body_chunks[1]);

    let rows: Vec<Row> = course
        .videos
        .iter()
        .map(|video| {
            let marker = completion_marker(course, video);
            let style = if course.is_completed(&video.id) {
                Style::default().fg(Color::Rgb(130, 200, 140))
            } else {
                Style::default()
            };
            Row::new(vec![
                Cell::from(marker),
                Cell::from(video.number().to_string()),
                Cell::from(video.title.clone()),
                Cell::from(video.duration.clone().unwrap_or_default()),
            ])
            .style(style)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(4),
            Constraint::Length(5),
            Constraint::Min(20),
            Constraint::Length(9),
        ],
    )
    .header(
        Row::new(vec!["", "#", "Video", "Length"])
            .style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)),
    )
    .block(panel_block("Videos"))
    .row_highlight_style(highlight_style())
    .highlight_symbol("▸ ");
    let mut table_state = TableState::default();
    table_state.select((!course.videos.is_empty()).then_some(view.state.selected_video));
    frame.render_stateful_widget(table, body_chunks[0], &mut table_state);

    let mut details = format!(
        "Title\n{}\n\nVideos\n{}\n\nTarget\n{}\n\nAdded\n{}",
        truncate(&course.title, 40),
        format_video_tally(course),
        format_target_status(course, view.now),
        format_date_added(&course.date_added),
    );
    if course.videos.len() < course.video_count as usize {
        details.push_str(&format!(
            "\n\nOnly {} of {} videos were captured.",
            course.videos.len(),
            course.video_count
        ));
    }
    if let Some(video) = course.videos.get(view.state.selected_video) {
        details.push_str(&format!("\n\nLink\n{}", video.link));
    }
    let selection = Paragraph::new(details)
        .style(Style::default().fg(Color::Rgb(230, 230, 230)))
        .wrap(Wrap { trim: false })
        .block(panel_block("Course"));
    frame.render_widget(selection, details_chunks[0]);
    frame.render_widget(progress_gauge(course), details_chunks[1]);
}

fn draw_add_course(frame: &mut Frame, form: &AddCourseForm, area: Rect) {
    let text = match &form.stage {
        AddStage::EditingUrl => format!(
            "Paste a YouTube playlist link below\n\n> {}_",
            form.url
        ),
        AddStage::Fetching => format!("Fetching playlist...\n\n{}", truncate(&form.url, 70)),
        AddStage::Preview {
            snapshot,
            source,
            complete,
        } => {
            let mut text = format!(
                "{}\n{} videos (from {})\n",
                snapshot.title,
                snapshot.video_count,
                source.label()
            );
            if !complete {
                text.push_str(&format!(
                    "Only {} videos were captured; progress counts against {}.\n",
                    snapshot.videos.len(),
                    snapshot.video_count
                ));
            }
            if !snapshot.videos.is_empty() {
                text.push_str("\nPreview:\n");
                for video in snapshot.videos.iter().take(PREVIEW_VIDEOS) {
                    text.push_str(&format!("  {}\n", truncate(&video.title, 60)));
                }
                if snapshot.videos.len() > PREVIEW_VIDEOS {
                    text.push_str(&format!("  +{}\n", snapshot.videos.len() - PREVIEW_VIDEOS));
                }
            }
            text
        }
    };
    let paragraph = Paragraph::new(text)
        .style(Style::default().fg(Color::Rgb(230, 230, 230)))
        .wrap(Wrap { trim: false })
        .block(panel_block("Add Course"));
    frame.render_widget(paragraph, area);
}

fn draw_prompt(frame: &mut Frame, prompt: &Prompt) {
    let (title, text) = match prompt {
        Prompt::ConfirmDelete { title, .. } => (
            "Confirm Delete",
            format!(
                "Delete course?\n\n{}\n\nThis cannot be undone.\n\n[y / Enter] Delete   [n / Esc] Cancel",
                truncate(title, 56)
            ),
        ),
        Prompt::TargetDate { input, .. } => (
            "Target Date",
            format!(
                "Enter target date (YYYY-MM-DD)\n\n> {input}_\n\nEmpty clears it.   [Enter] Save   [Esc] Cancel"
            ),
        ),
        Prompt::ApiKey { input } => (
            "YouTube API Key",
            format!(
                "Get a free API key from Google Cloud Console\n\n> {}_\n\n[Enter] Save   [Esc] Cancel",
                mask_key(input)
            ),
        ),
    };
    let popup_area = popup_rect_for_text(frame.area(), &text);
    render_popup_shadow(frame, popup_area);
    frame.render_widget(Clear, popup_area);
    let popup = Paragraph::new(text)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(modal_block(title));
    frame.render_widget(popup, popup_area);
}

fn controls_text(state: &ViewState) -> &'static str {
    if state.prompt.is_some() {
        return "type to edit  Enter confirm  Esc cancel";
    }
    match &state.screen {
        Screen::CourseList => {
            "↑/↓ move  Enter open  a add  t target  d delete  k API key  q quit"
        }
        Screen::CourseDetail { .. } => {
            "↑/↓ move  Space/Enter toggle watched  t target  d delete  Esc back  q quit"
        }
        Screen::AddCourse(form) => match form.stage {
            AddStage::EditingUrl => "type URL  Enter fetch  Esc back",
            AddStage::Fetching => "Esc cancel",
            AddStage::Preview { .. } => "y/Enter add course  n/Esc back",
        },
    }
}

fn mask_key(input: &str) -> String {
    let count = input.chars().count();
    if count <= 4 {
        return input.to_string();
    }
    let tail: String = input.chars().skip(count - 4).collect();
    format!("{}{tail}", "*".repeat(count - 4))
}

fn progress_gauge(course: &Course) -> Gauge<'static> {
    let (ratio, label) = build_progress_gauge(course);
    Gauge::default()
        .block(panel_block("Progress"))
        .gauge_style(
            Style::default()
                .fg(Color::Rgb(130, 190, 255))
                .bg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .label(label)
        .ratio(ratio)
}

fn deadline_style(deadline: Deadline) -> Style {
    match deadline {
        Deadline::Overdue(_) => Style::default()
            .fg(Color::Rgb(255, 145, 120))
            .add_modifier(Modifier::BOLD),
        Deadline::Soon(_) => Style::default().fg(Color::Yellow),
        Deadline::OnTrack(_) => Style::default().fg(MUTED),
    }
}

fn notice_style(kind: NoticeKind) -> Style {
    match kind {
        NoticeKind::Error => Style::default()
            .fg(Color::Rgb(255, 145, 120))
            .add_modifier(Modifier::BOLD),
        NoticeKind::Success => Style::default().fg(Color::Rgb(130, 200, 140)),
    }
}

fn highlight_style() -> Style {
    Style::default()
        .bg(ACCENT)
        .fg(Color::Black)
        .add_modifier(Modifier::BOLD)
}

fn panel_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Rgb(125, 135, 150)))
        .title(title)
}

fn modal_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(
            Style::default()
                .fg(Color::Rgb(160, 190, 235))
                .add_modifier(Modifier::BOLD),
        )
        .title(title)
        .padding(Padding::new(2, 2, 1, 1))
}

fn centered_fixed_rect(width: u16, height: u16, area: Rect) -> Rect {
    let clamped_width = width.min(area.width.max(1));
    let clamped_height = height.min(area.height.max(1));
    let x = area.x + area.width.saturating_sub(clamped_width) / 2;
    let y = area.y + area.height.saturating_sub(clamped_height) / 2;
    Rect::new(x, y, clamped_width, clamped_height)
}

fn render_popup_shadow(frame: &mut Frame, popup_area: Rect) {
    let area = frame.area();
    let shadow = Rect::new(
        (popup_area.x + 1).min(area.x + area.width.saturating_sub(1)),
        (popup_area.y + 1).min(area.y + area.height.saturating_sub(1)),
        popup_area.width.saturating_sub(1),
        popup_area.height.saturating_sub(1),
    );
    if shadow.width == 0 || shadow.height == 0 {
        return;
    }
    let shadow_block = Block::default().style(Style::default().bg(Color::Rgb(14, 16, 24)));
    frame.render_widget(shadow_block, shadow);
}

fn popup_rect_for_text(area: Rect, text: &str) -> Rect {
    let max_line_width = text
        .lines()
        .map(|line| line.chars().count() as u16)
        .max()
        .unwrap_or(0);
    let line_count = text.lines().count() as u16;

    let available_width = area.width.saturating_sub(2).max(1);
    let min_width = 48.min(available_width);
    let max_width = 80.min(available_width);
    let width = max_line_width.saturating_add(12).clamp(min_width, max_width);

    let available_height = area.height.saturating_sub(2).max(1);
    let min_height = 10.min(available_height);
    let max_height = 18.min(available_height);
    let height = line_count.saturating_add(6).clamp(min_height, max_height);

    centered_fixed_rect(width, height, area)
}
