//! Parsing of the `stat` four-letter-word response into structured records.
//!
//! The response is line oriented: a version banner, one discarded line, zero
//! or more session lines terminated by a blank line, then `name: value`
//! attribute lines until the server closes the connection. Any deviation from
//! that shape collapses the whole record to "unavailable"; a record is never
//! partially populated.

use std::collections::HashMap;

/// Mode string used for servers that could not be polled or parsed.
pub const MODE_UNAVAILABLE: &str = "Unavailable";

/// Version string used for servers that could not be polled or parsed.
pub const VERSION_UNKNOWN: &str = "Unknown";

/// A client session as reported by one server in its `stat` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    /// Client host, IPv4 or IPv6 literal (or hostname).
    pub host: String,
    /// Client port.
    pub port: u16,
    /// Id of the server that reported this session.
    pub server_id: usize,
    /// Interest-ops bitmask, kept as the decimal string from the wire.
    pub interest_ops: String,
    /// Requests queued on the server for this session.
    pub queued: u64,
    /// Requests received from this session.
    pub recved: u64,
    /// Responses sent to this session.
    pub sent: u64,
    /// Every `k=v` pair from the connection-detail suffix, including the
    /// promoted counters above. Unknown keys stay retrievable by name.
    pub extra: HashMap<String, String>,
}

/// One poll result for a single server.
///
/// Replaced wholesale on every poll; when `available` is false every status
/// field holds its default and `sessions` is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerRecord {
    pub server_id: usize,
    pub host: String,
    pub port: u16,
    pub available: bool,
    pub version: String,
    pub mode: String,
    pub outstanding: u64,
    pub received: u64,
    pub sent: u64,
    pub node_count: u64,
    /// Monotonic transaction id, hex encoded on the wire.
    pub zxid: u64,
    pub min_latency: u64,
    pub avg_latency: u64,
    pub max_latency: u64,
    pub sessions: Vec<SessionRecord>,
    /// Attribute lines not mapped to a named field.
    pub extra: HashMap<String, String>,
}

/// Internal parse failure. Never escapes this module: every variant collapses
/// to the unavailable record at the [`ServerRecord::from_stat`] boundary.
#[derive(Debug, thiserror::Error)]
enum ParseError {
    #[error("missing version banner")]
    MissingBanner,
    #[error("malformed version banner: {0}")]
    BadBanner(String),
    #[error("malformed session line: {0}")]
    BadSession(String),
    #[error("session list not terminated by blank line")]
    UnterminatedSessions,
    #[error("malformed attribute line: {0}")]
    BadAttribute(String),
    #[error("malformed numeric value for {0}: {1}")]
    BadNumber(&'static str, String),
}

impl ServerRecord {
    /// The canonical record for a server that could not be reached or whose
    /// response failed the grammar.
    pub fn unavailable(server_id: usize, host: &str, port: u16) -> Self {
        Self {
            server_id,
            host: host.to_string(),
            port,
            available: false,
            version: VERSION_UNKNOWN.to_string(),
            mode: MODE_UNAVAILABLE.to_string(),
            outstanding: 0,
            received: 0,
            sent: 0,
            node_count: 0,
            zxid: 0,
            min_latency: 0,
            avg_latency: 0,
            max_latency: 0,
            sessions: Vec::new(),
            extra: HashMap::new(),
        }
    }

    /// Parse a `stat` response. Any grammar failure yields the unavailable
    /// record; callers never see a partial parse.
    pub fn from_stat(text: &str, server_id: usize, host: &str, port: u16) -> Self {
        match parse_stat(text, server_id, host, port) {
            Ok(record) => record,
            Err(e) => {
                tracing::debug!(host, port, error = %e, "stat response rejected");
                Self::unavailable(server_id, host, port)
            }
        }
    }
}

fn parse_stat(
    text: &str,
    server_id: usize,
    host: &str,
    port: u16,
) -> Result<ServerRecord, ParseError> {
    let mut lines = text.lines();

    let banner = lines.next().ok_or(ParseError::MissingBanner)?;
    let version = parse_version(banner)?;

    // Second line is a banner continuation ("Clients:"), discarded.
    lines.next().ok_or(ParseError::UnterminatedSessions)?;

    let mut record = ServerRecord {
        server_id,
        host: host.to_string(),
        port,
        available: true,
        version,
        mode: String::new(),
        outstanding: 0,
        received: 0,
        sent: 0,
        node_count: 0,
        zxid: 0,
        min_latency: 0,
        avg_latency: 0,
        max_latency: 0,
        sessions: Vec::new(),
        extra: HashMap::new(),
    };

    // Session lines until the separating blank line.
    let mut terminated = false;
    for line in lines.by_ref() {
        let line = line.trim();
        if line.is_empty() {
            terminated = true;
            break;
        }
        record.sessions.push(parse_session(line, server_id)?);
    }
    if !terminated {
        return Err(ParseError::UnterminatedSessions);
    }

    // Attribute lines until end of input.
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| ParseError::BadAttribute(line.to_string()))?;
        let name = name
            .trim()
            .to_lowercase()
            .replace([' ', '/'], "_");
        let value = value.trim();

        match name.as_str() {
            "mode" => record.mode = value.to_string(),
            "outstanding" => record.outstanding = parse_u64("outstanding", value)?,
            "received" => record.received = parse_u64("received", value)?,
            "sent" => record.sent = parse_u64("sent", value)?,
            // Older servers report "Znode count", newer ones "Node count".
            "node_count" | "znode_count" => {
                record.node_count = parse_u64("node count", value)?;
            }
            "zxid" => record.zxid = parse_hex_u64("zxid", value)?,
            "latency_min_avg_max" => {
                let mut parts = value.split('/');
                let (min, avg, max) = match (parts.next(), parts.next(), parts.next(), parts.next())
                {
                    (Some(min), Some(avg), Some(max), None) => (min, avg, max),
                    _ => return Err(ParseError::BadNumber("latency", value.to_string())),
                };
                record.min_latency = parse_u64("min latency", min)?;
                record.avg_latency = parse_u64("avg latency", avg)?;
                record.max_latency = parse_u64("max latency", max)?;
            }
            _ => {
                record.extra.insert(name, value.to_string());
            }
        }
    }

    Ok(record)
}

/// Extract the `major.minor.patch` triple from the version banner. Accepts
/// both the bare `1.2.3-suffix` form and the usual
/// `Zookeeper version: 3.4.6-1569965, built on ...` form.
fn parse_version(banner: &str) -> Result<String, ParseError> {
    let tail = match banner.rsplit_once(": ") {
        Some((_, tail)) => tail,
        None => banner,
    };
    let version = tail
        .split_once('-')
        .map(|(v, _)| v)
        .ok_or_else(|| ParseError::BadBanner(banner.to_string()))?;

    let mut parts = 0;
    for part in version.split('.') {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseError::BadBanner(banner.to_string()));
        }
        parts += 1;
    }
    if parts != 3 {
        return Err(ParseError::BadBanner(banner.to_string()));
    }
    Ok(version.to_string())
}

/// Parse one session line: `/<host>:<port>[<interest_ops>](<k=v,...>)`.
/// The host may be an IPv4 or IPv6 literal, so the port is whatever follows
/// the last colon before the bracket.
fn parse_session(line: &str, server_id: usize) -> Result<SessionRecord, ParseError> {
    let bad = || ParseError::BadSession(line.to_string());

    let rest = line.strip_prefix('/').ok_or_else(bad)?;
    let (addr, rest) = rest.split_once('[').ok_or_else(bad)?;
    let (interest_ops, rest) = rest.split_once(']').ok_or_else(bad)?;
    let detail = rest
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .ok_or_else(bad)?;

    let (host, port) = addr.rsplit_once(':').ok_or_else(bad)?;
    let port: u16 = port.parse().map_err(|_| bad())?;
    if host.is_empty() || interest_ops.is_empty() {
        return Err(bad());
    }

    let mut extra = HashMap::new();
    for pair in detail.split(',') {
        let (k, v) = pair.split_once('=').ok_or_else(bad)?;
        extra.insert(k.to_string(), v.to_string());
    }

    let counter = |key: &'static str| -> Result<u64, ParseError> {
        match extra.get(key) {
            Some(v) => parse_u64(key, v),
            None => Ok(0),
        }
    };

    Ok(SessionRecord {
        host: host.to_string(),
        port,
        server_id,
        interest_ops: interest_ops.to_string(),
        queued: counter("queued")?,
        recved: counter("recved")?,
        sent: counter("sent")?,
        extra,
    })
}

fn parse_u64(field: &'static str, value: &str) -> Result<u64, ParseError> {
    value
        .trim()
        .parse()
        .map_err(|_| ParseError::BadNumber(field, value.to_string()))
}

/// Parse a hex value with or without a `0x` prefix.
fn parse_hex_u64(field: &'static str, value: &str) -> Result<u64, ParseError> {
    let digits = value.trim().trim_start_matches("0x");
    u64::from_str_radix(digits, 16).map_err(|_| ParseError::BadNumber(field, value.to_string()))
}
