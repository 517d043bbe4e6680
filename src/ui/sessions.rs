//! Session table: every server's client sessions merged into one view.

use std::net::IpAddr;

use ratatui::{
    layout::{Constraint, Rect},
    style::{Modifier, Style},
    widgets::{Row, Table},
    Frame,
};

use crate::app::App;

/// Render the merged session table, busiest sessions first. Only as many
/// rows as fit the area are built; the rest are silently dropped.
pub fn render(frame: &mut Frame, app: &mut App, area: Rect) {
    if area.height < 2 {
        return;
    }
    let capacity = area.height as usize - 1; // minus header

    let merged = app.sessions.merged();
    let mut rows: Vec<Row> = Vec::with_capacity(capacity.min(merged.len()));
    let mut resolved: Vec<(String, String)> = Vec::new();

    for session in merged.into_iter().take(capacity) {
        let host = if app.resolve_names {
            match resolve_host(&app.name_cache, &mut resolved, &session.host) {
                Some(name) => name,
                // One failed lookup ends the pass; rows already built
                // stay on screen untouched.
                None => break,
            }
        } else {
            session.host.clone()
        };

        rows.push(Row::new(vec![
            truncate(&host, 15),
            session.port.to_string(),
            session.server_id.to_string(),
            session.interest_ops.clone(),
            session.queued.to_string(),
            session.recved.to_string(),
            session.sent.to_string(),
        ]));
    }

    // The merged list borrows the session state, so fold fresh lookups into
    // the cache only after the rows are built.
    for (addr, name) in resolved {
        app.name_cache.insert(addr, name);
    }

    let header = Row::new(vec!["CLIENT", "PORT", "S", "I", "QUEUED", "RECVD", "SENT"])
        .style(Style::default().add_modifier(Modifier::REVERSED))
        .height(1);
    let widths = [
        Constraint::Length(15), // CLIENT
        Constraint::Length(5),  // PORT
        Constraint::Length(2),  // S
        Constraint::Length(2),  // I
        Constraint::Length(8),  // QUEUED
        Constraint::Length(8),  // RECVD
        Constraint::Length(8),  // SENT
    ];

    let table = Table::new(rows, widths).header(header);
    frame.render_widget(table, area);
}

/// Reverse-resolve an address literal, consulting the cache first. Returns
/// `None` on lookup failure. Hosts that are not IP literals are already
/// names and pass through unchanged.
fn resolve_host(
    cache: &std::collections::HashMap<String, String>,
    resolved: &mut Vec<(String, String)>,
    host: &str,
) -> Option<String> {
    if let Some(name) = cache.get(host) {
        return Some(name.clone());
    }
    if let Some((_, name)) = resolved.iter().find(|(addr, _)| addr == host) {
        return Some(name.clone());
    }
    let Ok(ip) = host.parse::<IpAddr>() else {
        return Some(host.to_string());
    };
    match dns_lookup::lookup_addr(&ip) {
        Ok(name) => {
            resolved.push((host.to_string(), name.clone()));
            Some(name)
        }
        Err(e) => {
            tracing::debug!(host, error = %e, "reverse lookup failed");
            None
        }
    }
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((i, _)) => text[..i].to_string(),
        None => text.to_string(),
    }
}
