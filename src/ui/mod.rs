//! Frame layout and render dispatch.

pub mod servers;
pub mod sessions;
pub mod summary;

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Style},
    text::Span,
    widgets::Paragraph,
    Frame,
};

use crate::app::App;

/// Render the whole dashboard: summary line, flash line, server table,
/// session table. The layout is recomputed every frame, so a terminal
/// resize just takes effect on the next draw.
pub fn draw(frame: &mut Frame, app: &mut App) {
    let server_rows = app.servers.len() as u16 + 1; // header + one row per server
    let chunks = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Length(server_rows),
        Constraint::Min(0),
    ])
    .split(frame.area());

    summary::render(frame, app, chunks[0]);
    render_flash(frame, app, chunks[1]);
    servers::render(frame, app, chunks[2]);
    sessions::render(frame, app, chunks[3]);
}

fn render_flash(frame: &mut Frame, app: &App, area: Rect) {
    if area.height == 0 {
        return;
    }
    if let Some(flash) = &app.flash {
        let line = Paragraph::new(Span::styled(
            flash.text.as_str(),
            Style::default().fg(Color::Yellow),
        ));
        frame.render_widget(line, area);
    }
}
