use actix_web::{HttpResponse, Responder, post, web};
use log::debug;
use std::time::Instant;

use super::models::{AppState, ErrorResponse, SubmitEffortRequest, SubmitEffortResponse};

/// Submit an attested effort: admit it into the ledger, then broadcast the
/// new block to every known peer.
#[post("/effort/")]
pub async fn submit_effort(
    state: web::Data<AppState>,
    body: web::Json<SubmitEffortRequest>,
) -> impl Responder {
    let t0 = Instant::now();
    let block = match state.ledger.add_block(body.into_inner().into()) {
        Ok(block) => block,
        Err(e) => {
            return HttpResponse::BadRequest().json(ErrorResponse {
                error: e.to_string(),
            });
        }
    };

    let broadcast_results = state.sync.broadcast(&block).await;
    debug!(
        "POST /effort/ - block #{} done ({} ms)",
        block.index,
        t0.elapsed().as_millis()
    );

    HttpResponse::Ok().json(SubmitEffortResponse {
        message: "Block added locally".into(),
        block,
        broadcast_results,
    })
}
