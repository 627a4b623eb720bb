use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::blockchain::Block;
use crate::error::PeerError;

/// Wire operations one node performs against another.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Push a freshly appended block to `peer`.
    async fn send_block(&self, peer: &str, block: &Block) -> Result<(), PeerError>;

    /// Download the full chain held by `peer`.
    async fn fetch_chain(&self, peer: &str) -> Result<Vec<Block>, PeerError>;

    /// Ask `peer` for the peers it knows.
    async fn fetch_peers(&self, peer: &str) -> Result<Vec<String>, PeerError>;
}

#[derive(Deserialize)]
struct ChainEnvelope {
    chain: Vec<Value>,
}

#[derive(Deserialize)]
struct PeersEnvelope {
    peers: Vec<String>,
}

/// `PeerTransport` speaking this node's own HTTP API.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: String) -> Result<T, PeerError> {
        let resp = self.client.get(&url).send().await.map_err(request_error)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PeerError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        resp.json::<T>()
            .await
            .map_err(|e| PeerError::BadResponse(e.to_string()))
    }
}

fn request_error(e: reqwest::Error) -> PeerError {
    if e.is_timeout() {
        PeerError::Timeout
    } else {
        PeerError::Unreachable(e.to_string())
    }
}

#[async_trait]
impl PeerTransport for HttpTransport {
    async fn send_block(&self, peer: &str, block: &Block) -> Result<(), PeerError> {
        let url = format!("{peer}/api/v1/receive-block/");
        let resp = self
            .client
            .post(&url)
            .json(&json!({ "block": block }))
            .send()
            .await
            .map_err(request_error)?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(PeerError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }

    async fn fetch_chain(&self, peer: &str) -> Result<Vec<Block>, PeerError> {
        let envelope: ChainEnvelope = self.get_json(format!("{peer}/api/v1/chain/")).await?;
        envelope
            .chain
            .into_iter()
            .map(|value| Block::from_value(value).map_err(|e| PeerError::BadResponse(e.to_string())))
            .collect()
    }

    async fn fetch_peers(&self, peer: &str) -> Result<Vec<String>, PeerError> {
        let envelope: PeersEnvelope = self.get_json(format!("{peer}/api/v1/peers/")).await?;
        Ok(envelope.peers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{self, AppState};
    use crate::config::Config;
    use crate::ledger::tests::{setup, submission};
    use crate::network::sync::tests::MockTransport;
    use actix_web::{App, HttpResponse, HttpServer, web};
    use std::sync::Arc;

    fn transport() -> HttpTransport {
        HttpTransport::new(Duration::from_secs(5)).unwrap()
    }

    /// Serve the node API on an ephemeral port and return its base URL.
    fn spawn_node(state: web::Data<AppState>) -> String {
        let server = HttpServer::new(move || {
            App::new()
                .app_data(state.clone())
                .configure(api::init_routes)
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .unwrap();
        let addr = server.addrs()[0];
        actix_web::rt::spawn(server.run());
        format!("http://{addr}")
    }

    #[actix_web::test]
    async fn talks_to_a_live_node() {
        let config = Config {
            node_address: "http://self".into(),
            bootstrap_peers: vec!["http://peer-a".into()],
            ..Config::default()
        };
        let state = web::Data::new(AppState::new(&config, Arc::new(MockTransport::default())));
        let node = spawn_node(state.clone());
        let http = transport();

        assert_eq!(http.fetch_chain(&node).await.unwrap(), vec![Block::genesis()]);
        assert_eq!(http.fetch_peers(&node).await.unwrap(), vec!["http://peer-a"]);

        let (origin, keys) = setup();
        let block = origin.add_block(submission(&keys, "w1")).unwrap();
        http.send_block(&node, &block).await.unwrap();
        assert_eq!(state.ledger.export(), origin.export());

        // stale resend no longer extends the tail
        let err = http.send_block(&node, &block).await.unwrap_err();
        assert!(matches!(err, PeerError::Rejected { status: 400, .. }));

        assert_eq!(http.fetch_chain(&node).await.unwrap(), origin.export());
    }

    #[actix_web::test]
    async fn maps_bad_answers_to_peer_errors() {
        let server = HttpServer::new(|| {
            App::new()
                .route(
                    "/api/v1/chain/",
                    web::get().to(|| async {
                        HttpResponse::Ok().json(json!({ "chain": [{ "index": "one" }] }))
                    }),
                )
                .route(
                    "/api/v1/peers/",
                    web::get().to(|| async { HttpResponse::ServiceUnavailable().body("busy") }),
                )
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .unwrap();
        let node = format!("http://{}", server.addrs()[0]);
        actix_web::rt::spawn(server.run());
        let http = transport();

        assert!(matches!(
            http.fetch_chain(&node).await,
            Err(PeerError::BadResponse(_))
        ));
        assert_eq!(
            http.fetch_peers(&node).await,
            Err(PeerError::Rejected {
                status: 503,
                body: "busy".into()
            })
        );
        assert!(matches!(
            http.send_block(&node, &Block::genesis()).await,
            Err(PeerError::Rejected { status: 404, .. })
        ));
    }
}
