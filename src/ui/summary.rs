//! Ensemble summary line.

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::app::App;

/// One line of ensemble-wide aggregates: highest node count, highest zxid,
/// total session count. Recomputed from the per-server slots every frame.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    if area.height == 0 {
        return;
    }

    let line = Paragraph::new(Line::from(vec![
        Span::styled("Ensemble", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" -- nodecount:"),
        Span::styled(
            app.summary.node_count().to_string(),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw(" zxid:"),
        Span::styled(
            format!("{:#x}", app.summary.zxid()),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw(" sessions:"),
        Span::styled(
            app.summary.session_count().to_string(),
            Style::default().fg(Color::Cyan),
        ),
    ]));

    frame.render_widget(line, area);
}
