use std::collections::BTreeSet;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use futures::future::join_all;
use log::{debug, info, warn};
use serde::Serialize;

use super::{PeerOutcome, PeerStatus, PeerTransport, with_timeout};

/// Canonical form of a peer address: trimmed, with a scheme, without a
/// trailing slash. Returns `None` for blank input.
pub fn normalize_address(address: &str) -> Option<String> {
    let trimmed = address.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.contains("://") {
        Some(trimmed.to_string())
    } else {
        Some(format!("http://{trimmed}"))
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoveryReport {
    /// Addresses learned in this round.
    pub added: Vec<String>,
    /// One entry per peer that was asked.
    pub outcomes: Vec<PeerOutcome>,
}

/// Set of known peer endpoints, never containing this node itself.
#[derive(Debug)]
pub struct PeerRegistry {
    peers: RwLock<BTreeSet<String>>,
    self_address: Option<String>,
}

impl PeerRegistry {
    pub fn new(self_address: Option<&str>) -> Self {
        Self {
            peers: RwLock::new(BTreeSet::new()),
            self_address: self_address.and_then(normalize_address),
        }
    }

    /// Insert `address` if it is new. Re-adding a known peer is a no-op.
    pub fn add_peer(&self, address: &str) -> bool {
        let Some(address) = normalize_address(address) else {
            return false;
        };
        if self.self_address.as_deref() == Some(address.as_str()) {
            debug!("PEERS - ignoring own address {address}");
            return false;
        }
        let added = self
            .peers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(address.clone());
        if added {
            info!("PEERS - registered {address}");
        }
        added
    }

    pub fn list_peers(&self) -> Vec<String> {
        self.peers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Ask every currently known peer for its peer list and merge what we
    /// learn. Peers learned here are not queried until the next round.
    pub async fn discover_peers(
        &self,
        transport: &dyn PeerTransport,
        timeout: Duration,
    ) -> DiscoveryReport {
        let known = self.list_peers();
        let calls = known.iter().map(|peer| async move {
            let result = with_timeout(timeout, transport.fetch_peers(peer)).await;
            (peer.clone(), result)
        });

        let mut report = DiscoveryReport::default();
        for (peer, result) in join_all(calls).await {
            match result {
                Ok(listed) => {
                    report.outcomes.push(PeerOutcome {
                        peer: peer.clone(),
                        status: PeerStatus::PeersListed {
                            count: listed.len(),
                        },
                    });
                    for address in listed {
                        if self.add_peer(&address) {
                            if let Some(address) = normalize_address(&address) {
                                report.added.push(address);
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!("PEERS - discovery via {peer} failed: {e}");
                    report.outcomes.push(PeerOutcome {
                        peer,
                        status: e.into(),
                    });
                }
            }
        }
        debug!(
            "PEERS - discovery asked {} peers, learned {}",
            known.len(),
            report.added.len()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::sync::tests::MockTransport;

    #[test]
    fn addresses_are_normalized() {
        assert_eq!(
            normalize_address(" 10.0.0.1:8080/ "),
            Some("http://10.0.0.1:8080".into())
        );
        assert_eq!(
            normalize_address("https://node.example"),
            Some("https://node.example".into())
        );
        assert_eq!(normalize_address("   "), None);
    }

    #[test]
    fn add_peer_is_idempotent_and_skips_self() {
        let registry = PeerRegistry::new(Some("127.0.0.1:8080"));
        assert!(registry.add_peer("127.0.0.1:8081"));
        assert!(!registry.add_peer("http://127.0.0.1:8081/"));
        assert!(!registry.add_peer("http://127.0.0.1:8080"));
        assert!(!registry.add_peer(""));
        assert_eq!(registry.list_peers(), vec!["http://127.0.0.1:8081".to_string()]);
    }

    #[tokio::test]
    async fn discovery_is_one_round_and_idempotent() {
        let registry = PeerRegistry::new(Some("http://self"));
        registry.add_peer("http://a");
        registry.add_peer("http://down");

        let mut transport = MockTransport::default();
        transport.peer_lists.insert(
            "http://a".into(),
            vec!["http://b".into(), "http://self".into(), "http://a".into()],
        );
        transport
            .peer_lists
            .insert("http://b".into(), vec!["http://c".into()]);

        let report = registry
            .discover_peers(&transport, Duration::from_millis(200))
            .await;
        assert_eq!(report.added, vec!["http://b".to_string()]);
        assert_eq!(report.outcomes.len(), 2);
        assert!(report.outcomes.iter().any(|o| o.peer == "http://down"
            && matches!(o.status, PeerStatus::Unreachable { .. })));
        // b's peers are not crawled in the same round
        assert!(!registry.list_peers().contains(&"http://c".to_string()));

        let mut offline = MockTransport::default();
        offline
            .peer_lists
            .insert("http://a".into(), vec!["http://b".into()]);
        let before = registry.list_peers();
        registry
            .discover_peers(&offline, Duration::from_millis(200))
            .await;
        registry
            .discover_peers(&offline, Duration::from_millis(200))
            .await;
        assert_eq!(registry.list_peers(), before);
    }
}
