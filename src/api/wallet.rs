use actix_web::{HttpResponse, Responder, post, web};
use log::info;

use super::models::{
    AppState, ErrorResponse, MessageResponse, NewWalletResponse, RegisterWalletRequest,
    SignEffortRequest, SignEffortResponse,
};
use crate::wallet::{generate_keypair_hex, sign_payload_hex};

/// DEV: generate a fresh keypair. The private key is returned to the caller.
#[post("/wallet/new/")]
pub async fn create_wallet() -> impl Responder {
    let (sk, pk) = generate_keypair_hex();
    HttpResponse::Ok().json(NewWalletResponse {
        private_key: sk,
        public_key: pk,
    })
}

#[post("/wallet/register/")]
pub async fn register_wallet(
    state: web::Data<AppState>,
    body: web::Json<RegisterWalletRequest>,
) -> impl Responder {
    let req = body.into_inner();
    if req.user_id.trim().is_empty() {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "user_id required".into(),
        });
    }
    match state.wallets.register(&req.user_id, &req.public_key, req.role) {
        Ok(()) => {
            info!("WALLET - registered {} as {:?}", req.user_id, req.role);
            HttpResponse::Created().json(MessageResponse {
                message: "Wallet registered".into(),
            })
        }
        Err(e) => HttpResponse::BadRequest().json(ErrorResponse {
            error: e.to_string(),
        }),
    }
}

/// DEV: sign an effort payload with the given private key, producing a
/// signature `/effort/` accepts.
#[post("/wallet/sign/")]
pub async fn sign_effort(body: web::Json<SignEffortRequest>) -> impl Responder {
    match sign_payload_hex(&body.private_key, &body.effort_data) {
        Ok(signature) => HttpResponse::Ok().json(SignEffortResponse { signature }),
        Err(e) => HttpResponse::BadRequest().json(ErrorResponse {
            error: e.to_string(),
        }),
    }
}
