//! Background pollers, one per server.
//!
//! Each poller is a spawned task that owns its server: fetch, parse, publish
//! the record, then wait out the poll interval unless a wake broadcast cuts
//! the wait short. The unbounded result channel guarantees publishing never
//! blocks a poller; the render loop is the only consumer.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use crate::client::{self, ClientOptions, RESET_COMMAND, STAT_COMMAND};
use crate::config::Endpoint;
use crate::stat::ServerRecord;

/// Time between polls when no wake arrives.
pub const POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Spawn one poll loop per endpoint. Workers are fire-and-forget: they hold
/// no resources beyond the per-fetch connection and die with the process.
pub fn spawn_pollers(
    endpoints: &[Endpoint],
    opts: &ClientOptions,
    records: &mpsc::UnboundedSender<ServerRecord>,
    wake: &broadcast::Sender<()>,
) {
    for (server_id, endpoint) in endpoints.iter().enumerate() {
        tokio::spawn(poll_loop(
            server_id,
            endpoint.clone(),
            opts.clone(),
            records.clone(),
            wake.subscribe(),
        ));
    }
}

async fn poll_loop(
    server_id: usize,
    endpoint: Endpoint,
    opts: ClientOptions,
    records: mpsc::UnboundedSender<ServerRecord>,
    mut wake: broadcast::Receiver<()>,
) {
    loop {
        let record = poll_once(server_id, &endpoint, &opts).await;
        if records.send(record).is_err() {
            // Render loop is gone; nothing left to poll for.
            return;
        }

        tokio::select! {
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
            result = wake.recv() => {
                match result {
                    // A lagged receiver missed wakes, which still means
                    // someone wants fresh data: poll now.
                    Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => {
                        // No more wakes will ever arrive; keep the timer
                        // cadence instead of spinning.
                        tokio::time::sleep(POLL_INTERVAL).await;
                    }
                }
            }
        }
    }
}

/// One fetch-and-parse cycle. Connection and parse failures both collapse to
/// the unavailable record; nothing here is fatal.
pub async fn poll_once(server_id: usize, endpoint: &Endpoint, opts: &ClientOptions) -> ServerRecord {
    match client::send_command(&endpoint.host, endpoint.port, STAT_COMMAND, opts).await {
        Ok(text) => ServerRecord::from_stat(&text, server_id, &endpoint.host, endpoint.port),
        Err(e) => {
            debug!(server = %endpoint, error = %e, "stat fetch failed");
            ServerRecord::unavailable(server_id, &endpoint.host, endpoint.port)
        }
    }
}

/// Fire a best-effort stats reset at every server. Individual failures are
/// swallowed; the attempted count is returned for the confirmation line.
pub async fn reset_all(endpoints: &[Endpoint], opts: &ClientOptions) -> usize {
    let mut attempted = 0;
    for endpoint in endpoints {
        if let Err(e) = client::send_command(&endpoint.host, endpoint.port, RESET_COMMAND, opts).await
        {
            debug!(server = %endpoint, error = %e, "stats reset failed");
        }
        attempted += 1;
    }
    attempted
}

/// Run a stats reset in the background so the render loop never waits on a
/// slow or dead server; a wake follows completion so the next records show
/// the cleared counters.
pub fn spawn_reset(endpoints: Vec<Endpoint>, opts: ClientOptions, wake: broadcast::Sender<()>) {
    tokio::spawn(async move {
        reset_all(&endpoints, &opts).await;
        let _ = wake.send(());
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const STAT_RESPONSE: &str = "Zookeeper version: 3.4.6-1569965, built on 02/20/2014\n\
Clients:\n\n\
Latency min/avg/max: 0/0/1\n\
Zxid: 0x10\n\
Mode: standalone\n\
Node count: 4\n";

    /// Serve the canned stat response on every accepted connection.
    async fn stat_server(listener: TcpListener) {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 64];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(STAT_RESPONSE.as_bytes()).await;
            });
        }
    }

    #[tokio::test]
    async fn poll_once_yields_parsed_record() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(stat_server(listener));

        let endpoint = Endpoint { host: "127.0.0.1".into(), port };
        let record = poll_once(3, &endpoint, &ClientOptions::default()).await;
        assert!(record.available);
        assert_eq!(record.server_id, 3);
        assert_eq!(record.mode, "standalone");
        assert_eq!(record.node_count, 4);
    }

    #[tokio::test]
    async fn poll_once_collapses_connect_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let endpoint = Endpoint { host: "127.0.0.1".into(), port };
        let record = poll_once(0, &endpoint, &ClientOptions::default()).await;
        assert!(!record.available);
        assert_eq!(record.mode, crate::stat::MODE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn wake_broadcast_triggers_early_repoll() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(stat_server(listener));

        let endpoints = vec![Endpoint { host: "127.0.0.1".into(), port }];
        let (records_tx, mut records_rx) = mpsc::unbounded_channel();
        let (wake_tx, _) = broadcast::channel(16);
        spawn_pollers(&endpoints, &ClientOptions::default(), &records_tx, &wake_tx);

        // First record arrives from the initial poll.
        let first = tokio::time::timeout(Duration::from_secs(2), records_rx.recv())
            .await
            .expect("initial poll")
            .expect("channel open");
        assert!(first.available);

        // A wake must produce a fresh record well inside the 3 s interval.
        wake_tx.send(()).unwrap();
        let second = tokio::time::timeout(Duration::from_secs(1), records_rx.recv())
            .await
            .expect("woken poll")
            .expect("channel open");
        assert_eq!(second.server_id, 0);
        assert!(second.available);
    }

    #[tokio::test]
    async fn timer_repolls_without_wake() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(stat_server(listener));

        let endpoints = vec![Endpoint { host: "127.0.0.1".into(), port }];
        let (records_tx, mut records_rx) = mpsc::unbounded_channel();
        let (wake_tx, _) = broadcast::channel(16);
        spawn_pollers(&endpoints, &ClientOptions::default(), &records_tx, &wake_tx);

        let first = tokio::time::timeout(Duration::from_secs(2), records_rx.recv())
            .await
            .expect("initial poll")
            .expect("channel open");
        assert!(first.available);

        // With no wake sent, the timer alone must produce the next record
        // within the poll interval plus slack.
        let second = tokio::time::timeout(POLL_INTERVAL + Duration::from_secs(1), records_rx.recv())
            .await
            .expect("timer poll")
            .expect("channel open");
        assert_eq!(second.server_id, 0);
        assert!(second.available);
    }

    #[tokio::test]
    async fn reset_all_counts_every_server_despite_failures() {
        // One live server and one dead port.
        let live = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let live_port = live.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = live.accept().await.unwrap();
            let mut buf = [0u8; 64];
            let _ = socket.read(&mut buf).await;
        });
        let dead = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead_port = dead.local_addr().unwrap().port();
        drop(dead);

        let endpoints = vec![
            Endpoint { host: "127.0.0.1".into(), port: live_port },
            Endpoint { host: "127.0.0.1".into(), port: dead_port },
        ];
        let attempted = reset_all(&endpoints, &ClientOptions::default()).await;
        assert_eq!(attempted, 2);
    }

    #[tokio::test]
    async fn spawn_reset_wakes_when_done_without_blocking_caller() {
        // A server that accepts but never answers, held open by a short
        // per-fetch timeout.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let Ok((socket, _)) = listener.accept().await else {
                return;
            };
            tokio::time::sleep(Duration::from_secs(10)).await;
            drop(socket);
        });

        let endpoints = vec![Endpoint { host: "127.0.0.1".into(), port }];
        let opts = ClientOptions {
            timeout: Some(Duration::from_millis(100)),
            ..ClientOptions::default()
        };
        let (wake_tx, mut wake_rx) = broadcast::channel(16);

        spawn_reset(endpoints, opts, wake_tx);

        // The caller gets control back immediately; the wake lands once the
        // background reset has run its course.
        let woken = tokio::time::timeout(Duration::from_secs(2), wake_rx.recv()).await;
        assert!(matches!(woken, Ok(Ok(()))));
    }
}
