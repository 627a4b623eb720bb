pub mod peers;
pub mod sync;
pub mod transport;

use std::future::Future;
use std::time::Duration;

use serde::Serialize;

use crate::error::PeerError;

pub use peers::{DiscoveryReport, PeerRegistry};
pub use sync::{SyncReport, Synchronizer};
pub use transport::{HttpTransport, PeerTransport};

/// Default per-peer deadline for broadcast, fetch and discovery calls.
pub const DEFAULT_PEER_TIMEOUT: Duration = Duration::from_secs(3);

/// What happened when we talked to one peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PeerStatus {
    Accepted,
    Rejected { reason: String },
    Unreachable { reason: String },
    /// The peer answered, but not with a usable record.
    Malformed { reason: String },
    TimedOut,
    ChainFetched { length: usize, valid: bool },
    PeersListed { count: usize },
}

impl From<PeerError> for PeerStatus {
    fn from(err: PeerError) -> Self {
        match err {
            PeerError::Timeout => PeerStatus::TimedOut,
            PeerError::Rejected { .. } => PeerStatus::Rejected {
                reason: err.to_string(),
            },
            PeerError::Unreachable(_) => PeerStatus::Unreachable {
                reason: err.to_string(),
            },
            PeerError::BadResponse(_) => PeerStatus::Malformed {
                reason: err.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerOutcome {
    pub peer: String,
    #[serde(flatten)]
    pub status: PeerStatus,
}

/// Bound a single peer call; an expired call is dropped and reported as
/// `PeerError::Timeout`.
pub(crate) async fn with_timeout<T, F>(timeout: Duration, call: F) -> Result<T, PeerError>
where
    F: Future<Output = Result<T, PeerError>>,
{
    tokio::time::timeout(timeout, call)
        .await
        .unwrap_or(Err(PeerError::Timeout))
}
