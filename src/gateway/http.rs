use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{
    classify_response, ControlCommand, GatewayResult, PlayerAction, SessionGateway, StartOptions,
};

/// [`SessionGateway`] speaking HTTP/JSON to the authority service.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
}

#[derive(Serialize)]
struct ActionRequest<'a> {
    game_id: &'a str,
    #[serde(flatten)]
    action: &'a PlayerAction,
}

impl HttpGateway {
    /// `base_url` is the API root, e.g. `http://localhost:5000/api`.
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn post(&self, path: &str, body: Option<Value>) -> GatewayResult<Value> {
        let url = self.endpoint(path);
        debug!("POST {}", url);
        let request = self.client.post(url);
        let request = match body {
            Some(body) => request.json(&body),
            None => request.header(reqwest::header::CONTENT_TYPE, "application/json"),
        };
        Self::send(request).await
    }

    async fn get(&self, path: &str) -> GatewayResult<Value> {
        let url = self.endpoint(path);
        debug!("GET {}", url);
        Self::send(self.client.get(url)).await
    }

    async fn send(request: RequestBuilder) -> GatewayResult<Value> {
        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        debug!("response {} ({} bytes)", status, body.len());
        classify_response(status, &body)
    }
}

#[async_trait]
impl SessionGateway for HttpGateway {
    async fn start(&self, options: &StartOptions) -> GatewayResult<Value> {
        self.post("game/start", Some(json!(options))).await
    }

    async fn next_turn(&self, game_id: &str) -> GatewayResult<Value> {
        self.post(&format!("game/{game_id}/next-turn"), None).await
    }

    async fn analyze(&self, game_id: &str) -> GatewayResult<Value> {
        self.post(&format!("game/{game_id}/analyze-move"), None)
            .await
    }

    async fn player_action(&self, game_id: &str, action: &PlayerAction) -> GatewayResult<Value> {
        let body = json!(ActionRequest { game_id, action });
        self.post("player/action", Some(body)).await
    }

    async fn end_turn(&self, game_id: &str) -> GatewayResult<Value> {
        self.post("player/end-turn", Some(json!({ "game_id": game_id })))
            .await
    }

    async fn chat(&self, game_id: &str, message: &str) -> GatewayResult<Value> {
        let body = json!({ "game_id": game_id, "message": message });
        self.post("general/chat", Some(body)).await
    }

    async fn fetch_state(&self, game_id: &str) -> GatewayResult<Value> {
        self.get(&format!("game/{game_id}/state")).await
    }

    async fn control(&self, game_id: &str, command: ControlCommand) -> GatewayResult<Value> {
        self.post(&format!("game/{game_id}/control"), Some(json!(command)))
            .await
    }

    async fn list_games(&self) -> GatewayResult<Value> {
        self.get("games").await
    }
}
