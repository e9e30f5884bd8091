use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use thiserror::Error;
use tokio::sync::Mutex as TokioMutex;
use tracing::{debug, warn};

use crate::{
    game::GameState,
    gateway::{
        self, ControlCommand, GameSummary, GatewayError, GatewayResult, PlayerAction,
        SessionGateway, StartOptions,
    },
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Another action is still in progress.")]
    Busy,
    #[error("No game in progress.")]
    NoSession,
    #[error("The game is already finished.")]
    Finished,
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Who asked for the call. Only manual calls are subject to the in-flight
/// guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Manual,
    Autoplay,
}

/// A call to make against the current game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Player(PlayerAction),
    EndTurn,
    NextTurn,
    Analyze,
    Chat(String),
    Refresh,
    Control(ControlCommand),
}

impl Request {
    fn name(&self) -> &'static str {
        match self {
            Self::Player(action) => action.name(),
            Self::EndTurn => "end-turn",
            Self::NextTurn => "next-turn",
            Self::Analyze => "analyze",
            Self::Chat(_) => "chat",
            Self::Refresh => "refresh",
            Self::Control(_) => "control",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    State {
        state: GameState,
        remaining: Option<u32>,
    },
    Analysis(String),
    Reply(String),
}

/// Wraps gateway calls with one error policy, a manual in-flight guard, a
/// busy token shared with autoplay and a client-side timeout.
#[derive(Clone)]
pub struct ActionDispatcher {
    gateway: Arc<dyn SessionGateway>,
    busy: Arc<TokioMutex<()>>,
    in_flight: Arc<AtomicBool>,
    timeout: Duration,
}

/// Clears the in-flight flag when the manual call ends, however it ends.
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ActionDispatcher {
    pub fn new(gateway: Arc<dyn SessionGateway>, timeout: Duration) -> Self {
        Self {
            gateway,
            busy: Arc::new(TokioMutex::new(())),
            in_flight: Arc::new(AtomicBool::new(false)),
            timeout,
        }
    }

    /// True while a manual call is waiting on the server.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Issue exactly one call for `request` and decode its payload.
    pub async fn dispatch(
        &self,
        game_id: &str,
        request: Request,
        trigger: Trigger,
    ) -> Result<Outcome, DispatchError> {
        let name = request.name();
        let gateway = &self.gateway;
        let result = self
            .guarded(name, trigger, async {
                let json = match &request {
                    Request::Player(action) => gateway.player_action(game_id, action).await?,
                    Request::EndTurn => gateway.end_turn(game_id).await?,
                    Request::NextTurn => gateway.next_turn(game_id).await?,
                    Request::Analyze => gateway.analyze(game_id).await?,
                    Request::Chat(message) => gateway.chat(game_id, message).await?,
                    Request::Refresh => gateway.fetch_state(game_id).await?,
                    Request::Control(command) => gateway.control(game_id, *command).await?,
                };
                let outcome = match request {
                    Request::Analyze => Outcome::Analysis(gateway::parse_analysis(&json)),
                    Request::Chat(_) => Outcome::Reply(gateway::parse_reply(&json)),
                    _ => {
                        let remaining = gateway::parse_remaining(&json);
                        let state = gateway::parse_state(json)?;
                        Outcome::State { state, remaining }
                    }
                };
                Ok::<_, GatewayError>(outcome)
            })
            .await;
        debug!("{} for game {} settled, ok={}", name, game_id, result.is_ok());
        result
    }

    /// Start a new game, returning its id and initial state.
    pub async fn start(&self, options: &StartOptions) -> Result<(String, GameState), DispatchError> {
        self.guarded("start", Trigger::Manual, async {
            gateway::parse_started(self.gateway.start(options).await?)
        })
        .await
    }

    pub async fn list_games(&self) -> Result<Vec<GameSummary>, DispatchError> {
        self.guarded("list-games", Trigger::Manual, async {
            gateway::parse_games(self.gateway.list_games().await?)
        })
        .await
    }

    async fn guarded<T>(
        &self,
        name: &str,
        trigger: Trigger,
        call: impl Future<Output = GatewayResult<T>>,
    ) -> Result<T, DispatchError> {
        let _in_flight = match trigger {
            Trigger::Manual => {
                if self
                    .in_flight
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
                {
                    debug!("{} rejected, a manual action is in flight", name);
                    return Err(DispatchError::Busy);
                }
                Some(InFlight(self.in_flight.clone()))
            }
            Trigger::Autoplay => None,
        };
        let _busy = self.busy.lock().await;
        let result = match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout {
                after_ms: self.timeout.as_millis() as u64,
            }),
        };
        result.map_err(|e| {
            warn!("{} failed ({:?}): {}", name, e.kind(), e);
            DispatchError::Gateway(e)
        })
    }
}
