use std::env;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

use log::warn;

use crate::effort::{DEFAULT_MAX_MINUTES, DEFAULT_MAX_PER_PERIOD, EffortLimits};
use crate::network::DEFAULT_PEER_TIMEOUT;
use crate::wallet::Verbosity;

/// Node settings read from the environment (and `.env` via dotenvy).
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Public URL of this node, never registered as a peer.
    pub node_address: String,
    pub bootstrap_peers: Vec<String>,
    pub peer_timeout: Duration,
    pub limits: EffortLimits,
    pub signature_verbosity: Verbosity,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let host = get("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = parse_or(&get, "PORT", 8080u16);
        let node_address = get("NODE_ADDRESS").unwrap_or_else(|| {
            if is_unspecified_host(&host) {
                warn!(
                    "CONFIG - NODE_ADDRESS unset and HOST={host} is a wildcard address; \
                     peers cannot recognise this node, set NODE_ADDRESS explicitly"
                );
            }
            format!("http://{host}:{port}")
        });
        let bootstrap_peers = get("PEERS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        let peer_timeout = Duration::from_millis(parse_or(
            &get,
            "PEER_TIMEOUT_MS",
            DEFAULT_PEER_TIMEOUT.as_millis() as u64,
        ));
        let limits = EffortLimits {
            max_minutes: parse_or(&get, "MAX_EFFORT_MINUTES", DEFAULT_MAX_MINUTES),
            max_per_period: parse_or(&get, "MAX_EFFORTS_PER_PERIOD", DEFAULT_MAX_PER_PERIOD),
        };
        let signature_verbosity = if parse_or(&get, "SIGNATURE_DIAGNOSTICS", true) {
            Verbosity::Debug
        } else {
            Verbosity::Quiet
        };

        Self {
            host,
            port,
            node_address,
            bootstrap_peers,
            peer_timeout,
            limits,
            signature_verbosity,
        }
    }
}

/// `0.0.0.0` or `::` binds every interface but is never advertised by peers.
fn is_unspecified_host(host: &str) -> bool {
    host.trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<IpAddr>()
        .is_ok_and(|ip| ip.is_unspecified())
}

fn parse_or<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match get(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("CONFIG - invalid {key}={raw:?}, using default");
            default
        }),
    }
}
