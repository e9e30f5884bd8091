//! Transport to the authority service that owns the rules, the dice and the
//! bots. Calls return parsed JSON or a classified [`GatewayError`]; the
//! helpers at the bottom turn that JSON into typed payloads.

mod error;
mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::game::GameState;
pub use error::{classify_response, ErrorKind, GatewayError, GatewayResult};
pub use http::HttpGateway;

/// Fallback chat text when the server answers without a reply.
pub const NO_REPLY: &str = "No reply.";

#[derive(Debug, Serialize, Deserialize, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Speed {
    Slow,
    #[default]
    Normal,
    Fast,
}

/// Options sent when starting a new game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartOptions {
    pub auto_play: bool,
    pub speed: Speed,
    /// `None` asks for a bots-only game to spectate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_human: Option<bool>,
}

impl Default for StartOptions {
    fn default() -> Self {
        Self {
            auto_play: false,
            speed: Speed::Normal,
            include_human: Some(true),
        }
    }
}

/// A move made by the human player. Serializes as the `action` / `params`
/// pair the server expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "params", rename_all = "snake_case")]
pub enum PlayerAction {
    Deploy {
        #[serde(rename = "territorio")]
        territory: String,
        #[serde(rename = "tropas")]
        troops: u32,
    },
    Attack {
        #[serde(rename = "origem")]
        origin: String,
        #[serde(rename = "destino")]
        destination: String,
    },
    Fortify {
        #[serde(rename = "origem")]
        origin: String,
        #[serde(rename = "destino")]
        destination: String,
        #[serde(rename = "tropas")]
        troops: u32,
    },
}

impl PlayerAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Deploy { .. } => "deploy",
            Self::Attack { .. } => "attack",
            Self::Fortify { .. } => "fortify",
        }
    }
}

/// Session-level controls understood by `/game/{id}/control`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ControlCommand {
    Pause,
    Resume,
    ToggleAutoPlay,
    SetSpeed { speed: Speed },
}

/// One row of `/games`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GameSummary {
    pub game_id: String,
    pub status: String,
    #[serde(default)]
    pub round: u32,
    #[serde(default)]
    pub created_at: String,
}

/// The operations offered by the authority service.
#[async_trait]
pub trait SessionGateway: Send + Sync {
    /// `POST /game/start`
    async fn start(&self, options: &StartOptions) -> GatewayResult<Value>;
    /// `POST /game/{id}/next-turn`
    async fn next_turn(&self, game_id: &str) -> GatewayResult<Value>;
    /// `POST /game/{id}/analyze-move`
    async fn analyze(&self, game_id: &str) -> GatewayResult<Value>;
    /// `POST /player/action`
    async fn player_action(&self, game_id: &str, action: &PlayerAction) -> GatewayResult<Value>;
    /// `POST /player/end-turn`
    async fn end_turn(&self, game_id: &str) -> GatewayResult<Value>;
    /// `POST /general/chat`
    async fn chat(&self, game_id: &str, message: &str) -> GatewayResult<Value>;
    /// `GET /game/{id}/state`
    async fn fetch_state(&self, game_id: &str) -> GatewayResult<Value>;
    /// `POST /game/{id}/control`
    async fn control(&self, game_id: &str, command: ControlCommand) -> GatewayResult<Value>;
    /// `GET /games`
    async fn list_games(&self) -> GatewayResult<Value>;
}

/// Game id and initial state from a start response.
pub fn parse_started(json: Value) -> GatewayResult<(String, GameState)> {
    let top_level_id = json.get("game_id").and_then(Value::as_str).map(str::to_string);
    let state = json
        .get("state")
        .cloned()
        .ok_or_else(|| GatewayError::malformed("start response has no state"))?;
    let state = decode_state(state)?;
    let game_id = top_level_id
        .or_else(|| state.game_id.clone())
        .ok_or_else(|| GatewayError::malformed("start response has no game_id"))?;
    Ok((game_id, state))
}

/// State from a response that is either the state itself or `{state}`.
pub fn parse_state(json: Value) -> GatewayResult<GameState> {
    match json {
        Value::Object(mut map) if map.get("state").is_some_and(Value::is_object) => {
            decode_state(map.remove("state").unwrap_or_default())
        }
        other => decode_state(other),
    }
}

/// Deploy answers may say how many troops are still left to place.
pub fn parse_remaining(json: &Value) -> Option<u32> {
    json.get("remaining")
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
}

/// Advisory text from `analyze-move`: `analysis`, then `message`, then the raw
/// payload.
pub fn parse_analysis(json: &Value) -> String {
    text_field(json, &["analysis", "message"]).unwrap_or_else(|| json.to_string())
}

/// Reply text from the General chat.
pub fn parse_reply(json: &Value) -> String {
    text_field(json, &["reply", "message"]).unwrap_or_else(|| NO_REPLY.to_string())
}

pub fn parse_games(json: Value) -> GatewayResult<Vec<GameSummary>> {
    let games = json
        .get("games")
        .cloned()
        .ok_or_else(|| GatewayError::malformed("games listing has no games"))?;
    serde_json::from_value(games).map_err(|e| GatewayError::malformed(e.to_string()))
}

fn decode_state(json: Value) -> GatewayResult<GameState> {
    if !json.is_object() {
        return Err(GatewayError::malformed("state is not an object"));
    }
    serde_json::from_value(json).map_err(|e| GatewayError::malformed(format!("bad state: {e}")))
}

fn text_field(json: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| json.get(key)?.as_str())
        .find(|text| !text.is_empty())
        .map(str::to_string)
}
