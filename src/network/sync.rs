use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use log::{debug, info, warn};
use serde::Serialize;

use super::{DiscoveryReport, PeerOutcome, PeerRegistry, PeerStatus, PeerTransport, with_timeout};
use crate::blockchain::{Block, is_valid_chain};
use crate::ledger::Ledger;

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub replaced: bool,
    /// Local chain length after the sync.
    pub length: usize,
    pub outcomes: Vec<PeerOutcome>,
}

/// Block broadcast and longest-valid-chain sync against the peer registry.
/// Every peer is contacted concurrently under its own timeout.
pub struct Synchronizer {
    ledger: Arc<Ledger>,
    peers: Arc<PeerRegistry>,
    transport: Arc<dyn PeerTransport>,
    timeout: Duration,
    last_broadcast: Mutex<Vec<PeerOutcome>>,
}

impl Synchronizer {
    pub fn new(
        ledger: Arc<Ledger>,
        peers: Arc<PeerRegistry>,
        transport: Arc<dyn PeerTransport>,
        timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            peers,
            transport,
            timeout,
            last_broadcast: Mutex::new(Vec::new()),
        }
    }

    /// Send `block` to every known peer. Failures are recorded, never
    /// propagated: the local append already happened.
    pub async fn broadcast(&self, block: &Block) -> Vec<PeerOutcome> {
        let peers = self.peers.list_peers();
        let calls = peers.iter().map(|peer| async move {
            let result = with_timeout(self.timeout, self.transport.send_block(peer, block)).await;
            let status = match result {
                Ok(()) => PeerStatus::Accepted,
                Err(e) => {
                    warn!("BROADCAST - block #{} to {peer}: {e}", block.index);
                    e.into()
                }
            };
            PeerOutcome {
                peer: peer.clone(),
                status,
            }
        });
        let outcomes = join_all(calls).await;

        let accepted = outcomes
            .iter()
            .filter(|o| o.status == PeerStatus::Accepted)
            .count();
        info!(
            "BROADCAST - block #{} accepted by {accepted}/{} peers",
            block.index,
            outcomes.len()
        );
        *self
            .last_broadcast
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = outcomes.clone();
        outcomes
    }

    /// Outcomes of the most recent broadcast.
    pub fn last_broadcast(&self) -> Vec<PeerOutcome> {
        self.last_broadcast
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn discover_peers(&self) -> DiscoveryReport {
        self.peers
            .discover_peers(self.transport.as_ref(), self.timeout)
            .await
    }

    /// Fetch every peer's chain and adopt the longest valid one if it is
    /// strictly longer than ours. Ties keep the local chain.
    pub async fn sync_chain(&self) -> SyncReport {
        let peers = self.peers.list_peers();
        let calls = peers.iter().map(|peer| async move {
            let result = with_timeout(self.timeout, self.transport.fetch_chain(peer)).await;
            (peer.clone(), result)
        });

        let mut outcomes = Vec::with_capacity(peers.len());
        let mut best: Option<Vec<Block>> = None;
        for (peer, result) in join_all(calls).await {
            match result {
                Ok(chain) => {
                    let valid = is_valid_chain(&chain);
                    debug!(
                        "SYNC - {peer} offered {} blocks (valid={valid})",
                        chain.len()
                    );
                    outcomes.push(PeerOutcome {
                        peer,
                        status: PeerStatus::ChainFetched {
                            length: chain.len(),
                            valid,
                        },
                    });
                    let longer = best.as_ref().is_none_or(|b| chain.len() > b.len());
                    if valid && longer {
                        best = Some(chain);
                    }
                }
                Err(e) => {
                    warn!("SYNC - fetching chain from {peer} failed: {e}");
                    outcomes.push(PeerOutcome {
                        peer,
                        status: e.into(),
                    });
                }
            }
        }

        let replaced = best.is_some_and(|chain| self.ledger.replace_chain(chain));
        let length = self.ledger.height();
        if replaced {
            info!("SYNC - adopted peer chain, local length now {length}");
        } else {
            debug!("SYNC - local chain kept ({length} blocks)");
        }
        SyncReport {
            replaced,
            length,
            outcomes,
        }
    }
}
