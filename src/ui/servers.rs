//! Server table: one fixed row per configured server.

use ratatui::{
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    widgets::{Cell, Row, Table},
    Frame,
};

use crate::app::App;
use crate::stat::ServerRecord;

/// Render the per-server table. Rows are keyed by server id, so a server
/// always occupies the same line whether it is up or down. Unavailable
/// servers show only identity and mode; the counters stay blank rather
/// than showing stale values.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let header = server_header(app.show_versions)
        .style(Style::default().add_modifier(Modifier::REVERSED))
        .height(1);

    let rows: Vec<Row> = app
        .servers
        .iter()
        .map(|record| server_row(record, app.show_versions))
        .collect();

    let mut widths = vec![
        Constraint::Length(2),  // ID
        Constraint::Length(15), // SERVER
        Constraint::Length(5),  // PORT
        Constraint::Length(1),  // M
        Constraint::Length(8),  // OUTST
        Constraint::Length(8),  // RECVD
        Constraint::Length(8),  // SENT
        Constraint::Length(5),  // CONNS
        Constraint::Length(6),  // MINLAT
        Constraint::Length(6),  // AVGLAT
        Constraint::Length(6),  // MAXLAT
    ];
    if app.show_versions {
        widths.push(Constraint::Length(7));
    }

    let table = Table::new(rows, widths).header(header);
    frame.render_widget(table, area);
}

fn server_header(show_versions: bool) -> Row<'static> {
    let mut cells = vec![
        "ID", "SERVER", "PORT", "M", "OUTST", "RECVD", "SENT", "CONNS", "MINLAT", "AVGLAT",
        "MAXLAT",
    ];
    if show_versions {
        cells.push("VERSION");
    }
    Row::new(cells)
}

fn server_row(record: &ServerRecord, show_versions: bool) -> Row<'_> {
    // Single-letter mode tag: L(eader), F(ollower), S(tandalone), U(navailable).
    let mode_tag = record
        .mode
        .chars()
        .next()
        .map(|c| c.to_ascii_uppercase().to_string())
        .unwrap_or_default();

    let host = match record.host.char_indices().nth(15) {
        Some((i, _)) => &record.host[..i],
        None => record.host.as_str(),
    };

    if !record.available {
        let row = Row::new(vec![
            Cell::from(record.server_id.to_string()),
            Cell::from(host.to_string()),
            Cell::from(record.port.to_string()),
            Cell::from(mode_tag),
        ]);
        return row.style(Style::default().fg(Color::Red));
    }

    let mut cells = vec![
        Cell::from(record.server_id.to_string()),
        Cell::from(host.to_string()),
        Cell::from(record.port.to_string()),
        Cell::from(mode_tag),
        Cell::from(record.outstanding.to_string()),
        Cell::from(record.received.to_string()),
        Cell::from(record.sent.to_string()),
        Cell::from(record.sessions.len().to_string()),
        Cell::from(record.min_latency.to_string()),
        Cell::from(record.avg_latency.to_string()),
        Cell::from(record.max_latency.to_string()),
    ];
    if show_versions {
        cells.push(Cell::from(record.version.as_str()));
    }
    Row::new(cells)
}
