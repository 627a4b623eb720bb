mod chain;
mod effort;
mod health;
pub mod models;
mod peers;
mod wallet;

use actix_web::web::{self, ServiceConfig};

pub use models::AppState;

pub fn init_routes(cfg: &mut ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(health::health_check)
            .service(effort::submit_effort)
            .service(chain::get_chain)
            .service(chain::get_last_block)
            .service(chain::validate_chain)
            .service(chain::block_height)
            .service(chain::receive_block)
            .service(chain::effort_history)
            .service(peers::list_peers)
            .service(peers::connect_nodes)
            .service(peers::discover_peers)
            .service(peers::sync_chain)
            .service(peers::broadcast_log)
            .service(wallet::create_wallet)
            .service(wallet::register_wallet)
            .service(wallet::sign_effort),
    );
}
