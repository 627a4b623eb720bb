mod api;
mod blockchain;
mod config;
mod effort;
mod error;
mod ledger;
mod network;
mod wallet;

use std::io;
use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use dotenvy::dotenv;
use log::info;

use api::AppState;
use config::Config;
use network::HttpTransport;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let _ = dotenv();
    env_logger::init();

    let config = Config::from_env();
    let transport = HttpTransport::new(config.peer_timeout).map_err(io::Error::other)?;
    let state = web::Data::new(AppState::new(&config, Arc::new(transport)));

    if !config.bootstrap_peers.is_empty() {
        let discovery = state.sync.discover_peers().await;
        let report = state.sync.sync_chain().await;
        info!(
            "bootstrap: {} peers known (+{}), chain length {} (replaced={})",
            state.peers.list_peers().len(),
            discovery.added.len(),
            report.length,
            report.replaced
        );
    }

    info!(
        "⛓️ Starting proof-of-effort node at http://{}:{} (advertised as {})",
        config.host, config.port, config.node_address
    );

    HttpServer::new({
        let state = state.clone();
        move || {
            App::new()
                .app_data(state.clone())
                .configure(api::init_routes)
        }
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
