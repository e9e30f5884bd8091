use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod board;

/// Player identifier as handed out by the authority service.
pub type PlayerId = u32;

#[derive(Debug, Serialize, Deserialize, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    /// Board is being dealt, nothing can be played yet.
    #[default]
    #[serde(alias = "waiting")]
    Setup,
    /// Game is in progress
    Playing,
    /// Halted by a control command, resumable.
    Paused,
    /// Game is over
    Finished,
}

/// A board region, keyed by name in [`GameState::territories`].
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Territory {
    #[serde(rename = "dono", alias = "owner")]
    pub owner: PlayerId,
    #[serde(rename = "tropas", alias = "troops")]
    pub troops: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    #[serde(default)]
    pub color: String,
    /// Encoded strategy descriptor, opaque to the client.
    #[serde(default, rename = "gene")]
    pub strategy_gene: String,
    /// Human readable name of the strategy, when the server sends one.
    #[serde(default)]
    pub strategy: String,
    #[serde(default)]
    pub is_human: bool,
    #[serde(default)]
    pub eliminated: bool,
    #[serde(default)]
    pub territories_count: u32,
    #[serde(default)]
    pub total_troops: u32,
}

/// What happened on the most recent move, one variant per action kind.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LastAction {
    #[default]
    None,
    Attack {
        player: PlayerId,
        from: String,
        to: String,
        success: bool,
        #[serde(default)]
        troops_moved: u32,
    },
    Deploy {
        player: PlayerId,
        territory: String,
        troops: u32,
    },
    Fortify {
        player: PlayerId,
        from: String,
        to: String,
        troops: u32,
    },
    NoAttack {
        player: PlayerId,
        #[serde(default)]
        reason: String,
    },
}

/// Authoritative game state. Always replaced as a whole from a server
/// response, never patched field by field.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(from = "RawGameState")]
pub struct GameState {
    pub game_id: Option<String>,
    pub status: GameStatus,
    pub current_round: u32,
    /// Turns played so far across all rounds.
    pub total_turns: u32,
    pub current_player: PlayerId,
    pub human_turn: bool,
    pub territories: BTreeMap<String, Territory>,
    pub players: Vec<Player>,
    pub last_action: LastAction,
    pub winner: Option<PlayerId>,
}

impl GameState {
    /// The id of the human player: whoever carries `is_human`, or `fallback`
    /// when the server does not flag anyone.
    pub fn human_player(&self, fallback: PlayerId) -> PlayerId {
        self.players
            .iter()
            .find(|p| p.is_human)
            .map(|p| p.id)
            .unwrap_or(fallback)
    }
    /// True while the human is allowed to pick territories.
    pub fn is_interactive(&self) -> bool {
        self.status == GameStatus::Playing && self.human_turn
    }
    pub fn is_finished(&self) -> bool {
        self.status == GameStatus::Finished
    }
    pub fn owner_of(&self, territory: &str) -> Option<PlayerId> {
        self.territories.get(territory).map(|t| t.owner)
    }
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }
}

/// Wire shape of the state payload. Everything but the territory map is
/// optional because older servers only send a subset.
#[derive(Deserialize)]
struct RawGameState {
    #[serde(default)]
    game_id: Option<String>,
    #[serde(default)]
    status: GameStatus,
    #[serde(default)]
    current_round: u32,
    #[serde(default)]
    total_turns: u32,
    #[serde(default)]
    current_player: PlayerId,
    #[serde(default)]
    human_turn: bool,
    territories: BTreeMap<String, Territory>,
    #[serde(default)]
    players: Vec<Player>,
    #[serde(default)]
    last_action: Option<serde_json::Value>,
    #[serde(default)]
    winner: Option<PlayerId>,
}

impl From<RawGameState> for GameState {
    fn from(raw: RawGameState) -> Self {
        // The server reports the winner inside `last_action` on the final turn.
        let nested_winner = raw
            .last_action
            .as_ref()
            .and_then(|a| a.get("winner"))
            .and_then(|w| w.as_u64())
            .and_then(|w| PlayerId::try_from(w).ok());
        let last_action = match raw.last_action {
            None | Some(serde_json::Value::Null) => LastAction::None,
            Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unrecognised last_action: {}", e);
                LastAction::None
            }),
        };
        Self {
            game_id: raw.game_id,
            status: raw.status,
            current_round: raw.current_round,
            total_turns: raw.total_turns,
            current_player: raw.current_player,
            human_turn: raw.human_turn,
            territories: raw.territories,
            players: raw.players,
            last_action,
            winner: raw.winner.or(nested_winner),
        }
    }
}
