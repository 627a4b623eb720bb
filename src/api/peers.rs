use actix_web::{HttpResponse, Responder, get, post, web};

use super::models::{
    AppState, BroadcastLogResponse, ConnectNodesRequest, ConnectNodesResponse, ErrorResponse,
    PeersResponse, SyncResponse,
};

#[get("/peers/")]
pub async fn list_peers(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(PeersResponse {
        peers: state.peers.list_peers(),
    })
}

/// Register peers, run one discovery round, then sync the chain.
#[post("/peers/")]
pub async fn connect_nodes(
    state: web::Data<AppState>,
    body: web::Json<ConnectNodesRequest>,
) -> impl Responder {
    let nodes = body.into_inner().nodes;
    if nodes.is_empty() {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Invalid nodes".into(),
        });
    }
    for node in &nodes {
        state.peers.add_peer(node);
    }

    let discovery = state.sync.discover_peers().await;
    let sync = state.sync.sync_chain().await;
    let nodes = state.peers.list_peers();

    HttpResponse::Ok().json(ConnectNodesResponse {
        message: "Nodes added & chain synced".into(),
        total: nodes.len(),
        nodes,
        discovery,
        sync,
    })
}

#[post("/peers/discover/")]
pub async fn discover_peers(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(state.sync.discover_peers().await)
}

/// Replace the local chain with the longest valid peer chain, if any.
#[get("/sync/")]
pub async fn sync_chain(state: web::Data<AppState>) -> impl Responder {
    let report = state.sync.sync_chain().await;
    let message = if report.replaced {
        "Chain replaced with longest valid chain"
    } else {
        "Current chain is already the longest valid"
    };
    HttpResponse::Ok().json(SyncResponse {
        message: message.into(),
        report,
    })
}

#[get("/broadcasts/")]
pub async fn broadcast_log(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(BroadcastLogResponse {
        results: state.sync.last_broadcast(),
    })
}
