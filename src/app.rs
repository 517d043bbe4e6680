//! Application state for the dashboard.
//!
//! All state here is owned by the render loop; the pollers only ever touch
//! the result channel. Each incoming [`ServerRecord`] replaces the previous
//! state for that server wholesale across all three panels.

use std::collections::HashMap;

use crossterm::event::KeyCode;

use crate::config::Endpoint;
use crate::stat::{SessionRecord, ServerRecord};

/// How long a flash message stays up, in render ticks (~250 ms each).
pub const FLASH_TICKS: u32 = 20;

/// Help text flashed on `h`.
pub const HELP_TEXT: &str = "Help: q:quit r:reset stats spc:refresh";

/// Action the render loop must carry out after a keypress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    None,
    /// Stop the render loop; the process exits.
    Quit,
    /// Fire a best-effort stats reset at every server, then wake pollers.
    ResetStats,
    /// Wake every poller for an immediate refresh.
    Refresh,
}

/// Per-server slots backing the ensemble summary line.
///
/// Each update overwrites one slot; the ensemble values are recomputed from
/// all slots on every read, so they always reflect the latest known record
/// of every server.
#[derive(Debug)]
pub struct SummaryState {
    session_counts: Vec<usize>,
    node_counts: Vec<u64>,
    zxids: Vec<u64>,
}

impl SummaryState {
    pub fn new(server_count: usize) -> Self {
        Self {
            session_counts: vec![0; server_count],
            node_counts: vec![0; server_count],
            zxids: vec![0; server_count],
        }
    }

    pub fn update(&mut self, record: &ServerRecord) {
        let id = record.server_id;
        if record.available {
            self.session_counts[id] = record.sessions.len();
            self.node_counts[id] = record.node_count;
            self.zxids[id] = record.zxid;
        } else {
            self.session_counts[id] = 0;
            self.node_counts[id] = 0;
            self.zxids[id] = 0;
        }
    }

    /// Highest node count across the ensemble.
    pub fn node_count(&self) -> u64 {
        self.node_counts.iter().copied().max().unwrap_or(0)
    }

    /// Highest zxid across the ensemble.
    pub fn zxid(&self) -> u64 {
        self.zxids.iter().copied().max().unwrap_or(0)
    }

    /// Total live sessions across the ensemble.
    pub fn session_count(&self) -> usize {
        self.session_counts.iter().sum()
    }
}

/// Latest session list per server, merged on demand for the session table.
#[derive(Debug)]
pub struct SessionTableState {
    by_server: Vec<Vec<SessionRecord>>,
}

impl SessionTableState {
    pub fn new(server_count: usize) -> Self {
        Self {
            by_server: vec![Vec::new(); server_count],
        }
    }

    pub fn update(&mut self, record: &ServerRecord) {
        self.by_server[record.server_id] = record.sessions.clone();
    }

    /// All servers' sessions flattened and sorted by queued requests,
    /// busiest first. The sort is stable, so ties keep flattened order.
    pub fn merged(&self) -> Vec<&SessionRecord> {
        let mut items: Vec<&SessionRecord> = self.by_server.iter().flatten().collect();
        items.sort_by(|a, b| b.queued.cmp(&a.queued));
        items
    }
}

/// A transient status line shown above the server table.
#[derive(Debug)]
pub struct Flash {
    pub text: String,
    pub ticks_left: u32,
}

/// All dashboard state, owned by the render loop.
pub struct App {
    pub endpoints: Vec<Endpoint>,
    pub summary: SummaryState,
    /// Latest record per server, indexed by server id (server table rows).
    pub servers: Vec<ServerRecord>,
    pub sessions: SessionTableState,
    pub flash: Option<Flash>,
    pub should_quit: bool,

    /// Show the VERSION column in the server table.
    pub show_versions: bool,
    /// Reverse-resolve session client addresses for display.
    pub resolve_names: bool,
    /// Cache of reverse lookups, keyed by the address literal.
    pub name_cache: HashMap<String, String>,
}

impl App {
    pub fn new(endpoints: Vec<Endpoint>, show_versions: bool, resolve_names: bool) -> Self {
        let server_count = endpoints.len();
        let servers = endpoints
            .iter()
            .enumerate()
            .map(|(id, ep)| ServerRecord::unavailable(id, &ep.host, ep.port))
            .collect();
        Self {
            endpoints,
            summary: SummaryState::new(server_count),
            servers,
            sessions: SessionTableState::new(server_count),
            flash: None,
            should_quit: false,
            show_versions,
            resolve_names,
            name_cache: HashMap::new(),
        }
    }

    /// Apply one poll result to every panel. Panel state for this server is
    /// replaced atomically; other servers are untouched.
    pub fn apply(&mut self, record: ServerRecord) {
        let id = record.server_id;
        debug_assert!(id < self.servers.len());
        if id >= self.servers.len() {
            return;
        }
        self.summary.update(&record);
        self.sessions.update(&record);
        self.servers[id] = record;
    }

    /// Dispatch one keypress. Side effects that need the network are
    /// returned as a [`Command`] for the render loop to run.
    pub fn on_key(&mut self, key: KeyCode) -> Command {
        match key {
            KeyCode::Char('q') | KeyCode::Char('Q') => {
                self.should_quit = true;
                Command::Quit
            }
            KeyCode::Char('h') | KeyCode::Char('H') => {
                self.show_flash(HELP_TEXT.to_string());
                Command::None
            }
            KeyCode::Char('r') | KeyCode::Char('R') => Command::ResetStats,
            KeyCode::Char(' ') => Command::Refresh,
            _ => Command::None,
        }
    }

    pub fn show_flash(&mut self, text: String) {
        self.flash = Some(Flash {
            text,
            ticks_left: FLASH_TICKS,
        });
    }

    /// Count down the flash line; called once per render tick.
    pub fn tick_flash(&mut self) {
        if let Some(flash) = &mut self.flash {
            flash.ticks_left = flash.ticks_left.saturating_sub(1);
            if flash.ticks_left == 0 {
                self.flash = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints(n: usize) -> Vec<Endpoint> {
        (0..n)
            .map(|i| Endpoint {
                host: format!("zk{i}"),
                port: 2181,
            })
            .collect()
    }

    fn record(server_id: usize, node_count: u64, sessions: usize) -> ServerRecord {
        let mut r = ServerRecord::unavailable(server_id, &format!("zk{server_id}"), 2181);
        r.available = true;
        r.mode = "follower".into();
        r.node_count = node_count;
        r.zxid = 0x10 + server_id as u64;
        r.sessions = (0..sessions)
            .map(|i| SessionRecord {
                host: format!("10.0.{server_id}.{i}"),
                port: 40000 + i as u16,
                server_id,
                interest_ops: "1".into(),
                queued: i as u64,
                recved: 0,
                sent: 0,
                extra: HashMap::new(),
            })
            .collect();
        r
    }

    #[test]
    fn summary_tracks_ensemble_max_and_sum() {
        let mut app = App::new(endpoints(3), false, false);
        app.apply(record(0, 5, 2));
        app.apply(record(1, 5, 0));
        app.apply(record(2, 7, 3));

        assert_eq!(app.summary.node_count(), 7);
        assert_eq!(app.summary.session_count(), 5);
        assert_eq!(app.summary.zxid(), 0x12);
    }

    #[test]
    fn unavailable_server_contributes_zero() {
        let mut app = App::new(endpoints(2), false, false);
        app.apply(record(0, 9, 4));
        app.apply(record(1, 7, 1));
        // Server 0 goes dark; its old values must stop counting.
        app.apply(ServerRecord::unavailable(0, "zk0", 2181));

        assert_eq!(app.summary.node_count(), 7);
        assert_eq!(app.summary.session_count(), 1);
        assert!(!app.servers[0].available);
        assert!(app.sessions.merged().iter().all(|s| s.server_id == 1));
    }

    #[test]
    fn updates_replace_state_wholesale() {
        let mut app = App::new(endpoints(1), false, false);
        app.apply(record(0, 5, 3));
        app.apply(record(0, 6, 1));

        assert_eq!(app.summary.session_count(), 1);
        assert_eq!(app.summary.node_count(), 6);
        assert_eq!(app.servers[0].sessions.len(), 1);
    }

    #[test]
    fn merged_sessions_sorted_by_queued_descending_stable() {
        let mut app = App::new(endpoints(2), false, false);

        let mut a = record(0, 1, 0);
        a.sessions = vec![
            session(0, "10.0.0.1", 5),
            session(0, "10.0.0.2", 2),
        ];
        let mut b = record(1, 1, 0);
        b.sessions = vec![
            session(1, "10.0.1.1", 5),
            session(1, "10.0.1.2", 9),
        ];
        app.apply(a);
        app.apply(b);

        let merged = app.sessions.merged();
        let queued: Vec<u64> = merged.iter().map(|s| s.queued).collect();
        assert_eq!(queued, [9, 5, 5, 2]);
        // Stable: the tie at 5 keeps flattened order, server 0 first.
        assert_eq!(merged[1].server_id, 0);
        assert_eq!(merged[2].server_id, 1);
    }

    fn session(server_id: usize, host: &str, queued: u64) -> SessionRecord {
        SessionRecord {
            host: host.into(),
            port: 40000,
            server_id,
            interest_ops: "1".into(),
            queued,
            recved: 0,
            sent: 0,
            extra: HashMap::new(),
        }
    }

    #[test]
    fn key_dispatch_matches_command_table() {
        let mut app = App::new(endpoints(1), false, false);
        assert_eq!(app.on_key(KeyCode::Char(' ')), Command::Refresh);
        assert_eq!(app.on_key(KeyCode::Char('r')), Command::ResetStats);
        assert_eq!(app.on_key(KeyCode::Char('x')), Command::None);

        assert_eq!(app.on_key(KeyCode::Char('h')), Command::None);
        assert_eq!(app.flash.as_ref().map(|f| f.text.as_str()), Some(HELP_TEXT));

        assert_eq!(app.on_key(KeyCode::Char('q')), Command::Quit);
        assert!(app.should_quit);
    }

    #[test]
    fn flash_expires_after_its_ticks() {
        let mut app = App::new(endpoints(1), false, false);
        app.show_flash("Server stats reset".into());
        for _ in 0..FLASH_TICKS {
            assert!(app.flash.is_some());
            app.tick_flash();
        }
        assert!(app.flash.is_none());
    }
}
