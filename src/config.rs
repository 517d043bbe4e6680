//! Assembly of the ordered server list.
//!
//! The order of the resulting endpoints is load-bearing: the position of a
//! server in the list is its id everywhere else in the program.

use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

/// Default ZooKeeper client port, used when an entry omits one.
pub const DEFAULT_CLIENT_PORT: u16 = 2181;

/// One monitored server address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Parse a comma separated `host[:port]` list. Missing ports default to
/// [`DEFAULT_CLIENT_PORT`].
pub fn parse_server_list(list: &str) -> Result<Vec<Endpoint>> {
    let mut endpoints = Vec::new();
    for entry in list.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let endpoint = match entry.rsplit_once(':') {
            Some((host, port)) => Endpoint {
                host: host.to_string(),
                port: port
                    .parse()
                    .with_context(|| format!("invalid port in server entry `{entry}`"))?,
            },
            None => Endpoint {
                host: entry.to_string(),
                port: DEFAULT_CLIENT_PORT,
            },
        };
        endpoints.push(endpoint);
    }
    if endpoints.is_empty() {
        bail!("server list is empty");
    }
    Ok(endpoints)
}

/// Build the endpoint list from a ZooKeeper configuration file.
///
/// The file is `key=value` lines; `server.N=host:peerPort[:electionPort]`
/// entries name the ensemble members and the separate `clientPort` key gives
/// the port to query. Entries are ordered by `N` so server ids are stable
/// across runs regardless of file order.
pub fn endpoints_from_config(path: &Path) -> Result<Vec<Endpoint>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("unable to open `{}`", path.display()))?;

    let mut client_port = None;
    let mut members: Vec<(u64, String)> = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let compact = line.replace(' ', "");
        let (key, value) = compact
            .split_once('=')
            .with_context(|| format!("malformed config line `{line}`"))?;

        if key == "clientPort" {
            client_port = Some(
                value
                    .parse::<u16>()
                    .with_context(|| format!("invalid clientPort `{value}`"))?,
            );
        } else if let Some(n) = key.strip_prefix("server.") {
            let n: u64 = n
                .parse()
                .with_context(|| format!("invalid server id in `{line}`"))?;
            // Only the host matters; the ports in the entry are for the
            // quorum protocol, not the client port.
            let host = value.split(':').next().unwrap_or(value).to_string();
            members.push((n, host));
        }
    }

    let client_port = client_port.context("config file has no clientPort entry")?;
    if members.is_empty() {
        bail!("config file has no server.N entries");
    }

    members.sort_by_key(|(n, _)| *n);
    Ok(members
        .into_iter()
        .map(|(_, host)| Endpoint {
            host,
            port: client_port,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    fn write_temp(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("zktop-test-{name}-{}", std::process::id()));
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn parses_server_list_with_default_port() {
        let endpoints = parse_server_list("zk1, zk2:2182,10.0.0.3").unwrap();
        assert_eq!(endpoints.len(), 3);
        assert_eq!(endpoints[0], Endpoint { host: "zk1".into(), port: 2181 });
        assert_eq!(endpoints[1], Endpoint { host: "zk2".into(), port: 2182 });
        assert_eq!(endpoints[2], Endpoint { host: "10.0.0.3".into(), port: 2181 });
    }

    #[test]
    fn rejects_empty_and_malformed_lists() {
        assert!(parse_server_list("").is_err());
        assert!(parse_server_list("zk1:not-a-port").is_err());
    }

    #[test]
    fn reads_ensemble_from_config_file() {
        let path = write_temp(
            "cfg",
            "# comment\n\
             tickTime=2000\n\
             clientPort = 2181\n\
             server.3=zk3:2888:3888\n\
             server.1=zk1:2888:3888\n\
             server.2=zk2:2888:3888\n",
        );
        let endpoints = endpoints_from_config(&path).unwrap();
        fs::remove_file(&path).unwrap();

        // Sorted by server number, all on the client port.
        let hosts: Vec<&str> = endpoints.iter().map(|e| e.host.as_str()).collect();
        assert_eq!(hosts, ["zk1", "zk2", "zk3"]);
        assert!(endpoints.iter().all(|e| e.port == 2181));
    }

    #[test]
    fn config_without_client_port_is_an_error() {
        let path = write_temp("noport", "server.1=zk1:2888:3888\n");
        let result = endpoints_from_config(&path);
        fs::remove_file(&path).unwrap();
        assert!(result.is_err());
    }
}
