use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::blockchain::{Block, EffortData, ProofBundle};
use crate::config::Config;
use crate::effort::StandardEffortPolicy;
use crate::ledger::{EffortSubmission, Ledger};
use crate::network::{
    DiscoveryReport, PeerOutcome, PeerRegistry, PeerTransport, SyncReport, Synchronizer,
};
use crate::wallet::{InMemoryWallets, Role};

/// Shared application state: the ledger plus its collaborators.
pub struct AppState {
    pub ledger: Arc<Ledger>,
    pub peers: Arc<PeerRegistry>,
    pub sync: Arc<Synchronizer>,
    pub wallets: Arc<InMemoryWallets>,
}

impl AppState {
    pub fn new(config: &Config, transport: Arc<dyn PeerTransport>) -> Self {
        let wallets = Arc::new(InMemoryWallets::new());
        let policy = Arc::new(StandardEffortPolicy::new(wallets.clone(), config.limits));
        let ledger = Arc::new(Ledger::new(
            wallets.clone(),
            policy,
            config.signature_verbosity,
        ));

        let peers = Arc::new(PeerRegistry::new(Some(&config.node_address)));
        for peer in &config.bootstrap_peers {
            peers.add_peer(peer);
        }
        let sync = Arc::new(Synchronizer::new(
            ledger.clone(),
            peers.clone(),
            transport,
            config.peer_timeout,
        ));

        Self {
            ledger,
            peers,
            sync,
            wallets,
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/* ---------- Effort API Models ---------- */

/// Submission body; field names follow the clients' wire format.
#[derive(Deserialize)]
pub struct SubmitEffortRequest {
    pub effort_data: EffortData,
    pub user_signature: String,
    pub user_public_key: String,
    pub validator_id: String,
    pub validator_signature: String,
}

impl From<SubmitEffortRequest> for EffortSubmission {
    fn from(req: SubmitEffortRequest) -> Self {
        EffortSubmission {
            effort_data: req.effort_data,
            validated_by: req.validator_id,
            proof: ProofBundle {
                user_signature: req.user_signature,
                validator_signature: req.validator_signature,
            },
            user_public_key: req.user_public_key,
        }
    }
}

#[derive(Serialize)]
pub struct SubmitEffortResponse {
    pub message: String,
    pub block: Block,
    pub broadcast_results: Vec<PeerOutcome>,
}

#[derive(Deserialize)]
pub struct EffortHistoryQuery {
    pub period: Option<String>,
}

#[derive(Serialize)]
pub struct EffortHistoryResponse {
    pub user_id: String,
    pub effort_count: usize,
    pub efforts: Vec<Block>,
}

/* ---------- Chain API Models ---------- */

#[derive(Serialize)]
pub struct ChainResponse {
    pub length: usize,
    pub chain: Vec<Block>,
}

#[derive(Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub length: usize,
}

#[derive(Serialize)]
pub struct HeightResponse {
    pub height: usize,
}

/// Block pushed by a peer; kept raw so malformed records get a clear error.
#[derive(Deserialize)]
pub struct ReceiveBlockRequest {
    pub block: Option<Value>,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/* ---------- Peer API Models ---------- */

#[derive(Serialize)]
pub struct PeersResponse {
    pub peers: Vec<String>,
}

#[derive(Deserialize)]
pub struct ConnectNodesRequest {
    pub nodes: Vec<String>,
}

#[derive(Serialize)]
pub struct ConnectNodesResponse {
    pub message: String,
    pub total: usize,
    pub nodes: Vec<String>,
    pub discovery: DiscoveryReport,
    pub sync: SyncReport,
}

#[derive(Serialize)]
pub struct SyncResponse {
    pub message: String,
    #[serde(flatten)]
    pub report: SyncReport,
}

#[derive(Serialize)]
pub struct BroadcastLogResponse {
    pub results: Vec<PeerOutcome>,
}

/* ---------- Wallet API Models ---------- */

#[derive(Serialize)]
pub struct NewWalletResponse {
    pub private_key: String,
    pub public_key: String,
}

#[derive(Deserialize)]
pub struct RegisterWalletRequest {
    pub user_id: String,
    pub public_key: String,
    #[serde(default = "default_role")]
    pub role: Role,
}

fn default_role() -> Role {
    Role::Student
}

#[derive(Deserialize)]
pub struct SignEffortRequest {
    pub private_key: String,
    pub effort_data: EffortData,
}

#[derive(Serialize)]
pub struct SignEffortResponse {
    pub signature: String,
}
