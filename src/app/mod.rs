mod acquire;
mod course;
mod tui;
mod view;


use std::fs;
use std::io::{self, BufRead, Write};

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use tracing::{error, info};

use crate::cli::{Cli, Command, PageArgs};
use crate::config::{Settings, resolve_api_key};
use crate::db::{Database, parse_target_date};
use crate::model::Course;
use crate::paths::database_file_path;

use self::acquire::{
    Acquired, CancelToken, PageRequest, RenderedPage, acquire_from_api, acquire_from_page,
    handle_page_message,
};
use self::course::{
    completion_marker, format_date_added, format_target_status, format_video_tally,
    resolve_course_ref, resolve_video_ref, truncate,
};

const PREVIEW_VIDEOS: usize = 4;

pub fn run(cli: Cli) -> Result<()> {
    let settings = Settings::from_env();

    if let Some(Command::Scrape { page }) = &cli.command {
        return run_scrape(page);
    }

    let db = open_db()?;
    match cli.command {
        Some(Command::List) => run_list(&db)?,
        Some(Command::Show { course }) => run_show(&db, &course)?,
        Some(Command::Add { url, yes }) => run_add(&db, &settings, &url, yes)?,
        Some(Command::Import { page, yes, strict }) => run_import(&db, &page, yes, strict)?,
        Some(Command::Toggle { course, video }) => run_toggle(&db, &course, &video)?,
        Some(Command::Target {
            course,
            date,
            clear,
        }) => run_target(&db, &course, date.as_deref(), clear)?,
        Some(Command::Remove { course }) => run_remove(&db, &course)?,
        Some(Command::SetKey { key, clear }) => run_set_key(&db, key.as_deref(), clear)?,
        Some(Command::Scrape { .. }) => {}
        Some(Command::Tui) | None => tui::run_tui(&db, &settings)?,
    }

    Ok(())
}

fn run_list(db: &Database) -> Result<()> {
    let courses = db.list_courses()?;
    if courses.is_empty() {
        println!("No courses yet. Run `ytrackie add <playlist-url>` first.");
        return Ok(());
    }

    let now = Utc::now();
    println!(
        "{:<4} {:<10} {:<40} {:<9} {:<14} {:<28} {:<14}",
        "#", "ID", "TITLE", "PROGRESS", "VIDEOS", "TARGET", "ADDED"
    );
    for (idx, course) in courses.iter().enumerate() {
        println!(
            "{:<4} {:<10} {:<40} {:<9} {:<14} {:<28} {:<14}",
            idx + 1,
            truncate(&course.id, 10),
            truncate(&course.title, 40),
            format!("{}%", course.progress_percent()),
            format_video_tally(course),
            format_target_status(course, now),
            format_date_added(&course.date_added),
        );
    }
    Ok(())
}

fn run_show(db: &Database, reference: &str) -> Result<()> {
    let courses = db.list_courses()?;
    let course = find_course(&courses, reference)?;

    println!("{}", course.title);
    println!("  Playlist: {}", course.playlist_id);
    println!(
        "  Progress: {}% ({})",
        course.progress_percent(),
        format_video_tally(course)
    );
    println!("  Target:   {}", format_target_status(course, Utc::now()));
    println!("  Added:    {}", format_date_added(&course.date_added));
    if course.videos.len() < course.video_count as usize {
        println!(
            "  Note: only {} of {} videos were captured when the course was added.",
            course.videos.len(),
            course.video_count
        );
    }
    println!();
    for video in &course.videos {
        let duration = video
            .duration
            .as_deref()
            .map(|duration| format!(" [{duration}]"))
            .unwrap_or_default();
        println!(
            "{} {:>4}. {}{}",
            completion_marker(course, video),
            video.number(),
            video.title,
            duration
        );
    }
    Ok(())
}

fn run_add(db: &Database, settings: &Settings, url: &str, yes: bool) -> Result<()> {
    let api_key = resolve_api_key(db)?;
    println!("Fetching playlist...");
    let acquired = acquire_from_api(url, api_key.as_deref(), settings, &CancelToken::new())
        .inspect_err(|err| {
            error!(error = %err, retryable = err.is_retryable(), url, "playlist fetch failed")
        })?;
    confirm_and_add(db, acquired, yes)
}

fn run_import(db: &Database, page: &PageArgs, yes: bool, strict: bool) -> Result<()> {
    let rendered = load_page(page)?;
    let acquired = acquire_from_page(&rendered, strict)
        .inspect_err(|err| error!(error = %err, page_url = %page.page_url, "page import failed"))?;
    confirm_and_add(db, acquired, yes)
}

fn run_scrape(page: &PageArgs) -> Result<()> {
    let rendered = load_page(page)?;
    let request = serde_json::to_string(&PageRequest::GetPlaylistInfo)?;
    let reply = handle_page_message(&rendered, &request)?;
    println!("{reply}");
    Ok(())
}

fn run_toggle(db: &Database, course_ref: &str, video_ref: &str) -> Result<()> {
    let courses = db.list_courses()?;
    let course = find_course(&courses, course_ref)?;
    let video = resolve_video_ref(course, video_ref)
        .ok_or_else(|| anyhow!("no video '{video_ref}' in '{}'", course.title))?;

    let completed = db.toggle_video(&course.id, &video.id)?;
    let updated = db
        .get_course(&course.id)?
        .context("course disappeared while updating")?;
    println!(
        "{} {}: {} ({}%)",
        if completed {
            "Watched"
        } else {
            "Unwatched"
        },
        video.number(),
        video.title,
        updated.progress_percent()
    );
    Ok(())
}

fn run_target(db: &Database, course_ref: &str, date: Option<&str>, clear: bool) -> Result<()> {
    let courses = db.list_courses()?;
    let course = find_course(&courses, course_ref)?;

    let target = match (date, clear) {
        (_, true) | (None, false) => None,
        (Some(raw), false) => Some(parse_target_date(raw)?),
    };
    db.set_target_date(&course.id, target)?;
    match target {
        Some(date) => println!(
            "Target for {} set to {}",
            course.title,
            date.format("%Y-%m-%d")
        ),
        None => println!("Target for {} cleared", course.title),
    }
    Ok(())
}

fn run_remove(db: &Database, course_ref: &str) -> Result<()> {
    let courses = db.list_courses()?;
    let course = find_course(&courses, course_ref)?;
    if db.remove_course(&course.id)? {
        println!("Deleted course: {}", course.title);
    } else {
        println!("Course no longer exists.");
    }
    Ok(())
}

fn run_set_key(db: &Database, key: Option<&str>, clear: bool) -> Result<()> {
    let key = match (key, clear) {
        (_, true) | (None, false) => {
            if db.clear_api_key()? {
                println!("Stored API key removed.");
            } else {
                println!("No API key was stored.");
            }
            return Ok(());
        }
        (Some(key), false) => key,
    };
    if key.trim().is_empty() {
        return Err(anyhow!("API key must not be empty"));
    }
    db.set_api_key(key)?;
    println!("API key saved!");
    Ok(())
}

fn confirm_and_add(db: &Database, acquired: Acquired, yes: bool) -> Result<()> {
    print!("{}", format_preview(&acquired));
    if !yes && !confirm("Add this course? [y/N] ")? {
        println!("Not added.");
        return Ok(());
    }

    let course = Course::from_snapshot(acquired.snapshot, Utc::now());
    let title = course.title.clone();
    let course_id = course.id.clone();
    db.add_course(course)?;
    info!(course_id = %course_id, source = acquired.source.label(), "course created");
    println!("Added course: {title}");
    Ok(())
}

pub(crate) fn format_preview(acquired: &Acquired) -> String {
    let snapshot = &acquired.snapshot;
    let mut out = format!(
        "\n{}\n{} videos (from {})\n",
        snapshot.title,
        snapshot.video_count,
        acquired.source.label()
    );
    if !acquired.complete {
        out.push_str(&format!(
            "Only {} videos were captured; progress counts against {}.\n",
            snapshot.videos.len(),
            snapshot.video_count
        ));
    }
    if !snapshot.videos.is_empty() {
        out.push_str("Preview:\n");
        for video in snapshot.videos.iter().take(PREVIEW_VIDEOS) {
            out.push_str(&format!("  {}\n", truncate(&video.title, 70)));
        }
        if snapshot.videos.len() > PREVIEW_VIDEOS {
            out.push_str(&format!(
                "  +{} more\n",
                snapshot.videos.len() - PREVIEW_VIDEOS
            ));
        }
    }
    out.push('\n');
    out
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question}");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("failed to read confirmation")?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn load_page(page: &PageArgs) -> Result<RenderedPage> {
    let html = fs::read_to_string(&page.html)
        .with_context(|| format!("failed to read page markup from {}", page.html.display()))?;
    Ok(RenderedPage::new(&page.page_url, &html))
}

fn find_course<'a>(courses: &'a [Course], reference: &str) -> Result<&'a Course> {
    resolve_course_ref(courses, reference).ok_or_else(|| {
        anyhow!("no course '{reference}'; use an id or a number from `ytrackie list`")
    })
}

fn open_db() -> Result<Database> {
    let db_path = database_file_path()?;
    let db = Database::open(&db_path)?;
    db.migrate()?;
    Ok(db)
}
