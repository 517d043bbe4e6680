//! One-shot four-letter-word commands over TCP.
//!
//! The admin protocol is one connection per request: write a short ASCII
//! command terminated by a newline, then read until the server closes the
//! connection. There is no framing and no response for mutating commands.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Status query command.
pub const STAT_COMMAND: &str = "stat";

/// Stats-reset command. Best effort; its response is ignored.
pub const RESET_COMMAND: &str = "srst";

/// Connection-level failure. Callers collapse this to "server unavailable";
/// the variants exist for logging, not for display.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("no response within {0:?}")]
    Timeout(Duration),
    #[error("response contains non-ascii bytes")]
    NotAscii,
}

/// Connection knobs shared by every request.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Bound on the whole connect-write-read cycle. `None` waits forever.
    pub timeout: Option<Duration>,
    /// Shut down the write side right after sending the command. Avoids
    /// piling up TIME_WAIT sockets, but must be disabled for ZooKeeper 3.3.0
    /// which drops the connection on a half-close.
    pub half_close: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            half_close: true,
        }
    }
}

/// Send one command and read the full response.
///
/// The connection is dropped on every exit path. All connect, I/O, and
/// timeout failures surface as [`FetchError`].
pub async fn send_command(
    host: &str,
    port: u16,
    cmd: &str,
    opts: &ClientOptions,
) -> Result<String, FetchError> {
    match opts.timeout {
        Some(limit) => tokio::time::timeout(limit, exchange(host, port, cmd, opts.half_close))
            .await
            .map_err(|_| FetchError::Timeout(limit))?,
        None => exchange(host, port, cmd, opts.half_close).await,
    }
}

async fn exchange(
    host: &str,
    port: u16,
    cmd: &str,
    half_close: bool,
) -> Result<String, FetchError> {
    let mut stream = TcpStream::connect((host, port)).await?;

    stream.write_all(cmd.as_bytes()).await?;
    stream.write_all(b"\n").await?;
    if half_close {
        stream.shutdown().await?;
    }

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await?;

    if !raw.is_ascii() {
        return Err(FetchError::NotAscii);
    }
    // Safe per the ascii check, but avoid unwrap-style conversions.
    String::from_utf8(raw).map_err(|_| FetchError::NotAscii)
}
