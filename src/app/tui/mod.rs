mod actions;
mod render;
mod session;

use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use crate::config::Settings;
use crate::db::Database;

use super::view::{Input, ViewEvent};

use self::actions::Runtime;
use self::render::{RenderContext, draw_tui};
use self::session::TuiSession;

pub(crate) fn run_tui(db: &Database, settings: &Settings) -> Result<()> {
    let mut runtime = Runtime::new(db, settings)?;
    let mut session = TuiSession::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))
        .context("failed to initialize terminal backend")?;
    terminal.clear()?;

    loop {
        runtime.drain_fetch_results()?;
        runtime.dispatch(ViewEvent::Tick)?;
        if runtime.state.quit {
            break;
        }

        terminal.draw(|frame| {
            draw_tui(
                frame,
                &RenderContext {
                    state: &runtime.state,
                    courses: &runtime.courses,
                    has_api_key: runtime.api_key.is_some(),
                    now: Utc::now(),
                },
            )
        })?;

        if !event::poll(Duration::from_millis(200))? {
            continue;
        }

        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            break;
        }
        if let Some(input) = map_key(key) {
            runtime.dispatch(ViewEvent::Input(input))?;
        }
    }

    session.leave()?;
    Ok(())
}

fn map_key(key: KeyEvent) -> Option<Input> {
    match key.code {
        KeyCode::Up => Some(Input::Up),
        KeyCode::Down => Some(Input::Down),
        KeyCode::Enter => Some(Input::Enter),
        KeyCode::Esc => Some(Input::Esc),
        KeyCode::Backspace => Some(Input::Backspace),
        KeyCode::Char(ch) => Some(Input::Char(ch)),
        _ => None,
    }
}
