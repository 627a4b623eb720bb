use actix_web::{HttpResponse, Responder, get, post, web};
use log::{debug, warn};

use super::models::{
    AppState, ChainResponse, EffortHistoryQuery, EffortHistoryResponse, ErrorResponse,
    HeightResponse, MessageResponse, ReceiveBlockRequest, ValidateResponse,
};
use crate::blockchain::Block;

/// Get the full chain.
#[get("/chain/")]
pub async fn get_chain(state: web::Data<AppState>) -> impl Responder {
    let chain = state.ledger.export();
    HttpResponse::Ok().json(ChainResponse {
        length: chain.len(),
        chain,
    })
}

#[get("/chain/last/")]
pub async fn get_last_block(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(state.ledger.last_block())
}

/// Validate the whole chain.
#[get("/validate/")]
pub async fn validate_chain(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(ValidateResponse {
        valid: state.ledger.is_valid_chain(),
        length: state.ledger.height(),
    })
}

#[get("/height/")]
pub async fn block_height(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(HeightResponse {
        height: state.ledger.height(),
    })
}

/// Accept a block pushed by a peer if it extends our tail.
#[post("/receive-block/")]
pub async fn receive_block(
    state: web::Data<AppState>,
    body: web::Json<ReceiveBlockRequest>,
) -> impl Responder {
    let Some(raw) = body.into_inner().block else {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "No block provided".into(),
        });
    };

    let block = match Block::from_value(raw) {
        Ok(block) => block,
        Err(e) => {
            warn!("POST /receive-block/ - {e}");
            return HttpResponse::BadRequest().json(ErrorResponse {
                error: e.to_string(),
            });
        }
    };
    debug!(
        "POST /receive-block/ - block #{} prev={}",
        block.index, block.previous_hash
    );

    match state.ledger.accept_external_block(block) {
        Ok(()) => HttpResponse::Created().json(MessageResponse {
            message: "Block accepted".into(),
        }),
        Err(e) => HttpResponse::BadRequest().json(ErrorResponse {
            error: e.to_string(),
        }),
    }
}

/// Blocks recorded for one user, optionally narrowed to `?period=`.
#[get("/efforts/{user_id}/")]
pub async fn effort_history(
    state: web::Data<AppState>,
    path: web::Path<(String,)>,
    query: web::Query<EffortHistoryQuery>,
) -> impl Responder {
    let user_id = path.into_inner().0;
    let efforts = match &query.period {
        Some(period) => state.ledger.efforts_in_period(&user_id, period),
        None => state.ledger.efforts_for_user(&user_id),
    };
    HttpResponse::Ok().json(EffortHistoryResponse {
        user_id,
        effort_count: efforts.len(),
        efforts,
    })
}
