use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex as TokioMutex;
use tracing::{info, warn};

use crate::{
    autoplay::{AutoplayLoop, AutoplaySettings, LoopExit, TurnDriver},
    chat::{ChatLog, ChatMessage, Speaker},
    config::ClientConfig,
    dispatch::{ActionDispatcher, DispatchError, Outcome, Request, Trigger},
    event::{EventSink, SessionEvent},
    game::{
        board::{BoardOverlay, Hover, HoverTracker, Marker, Placement},
        GameState, GameStatus, PlayerId,
    },
    gateway::{
        ControlCommand, GameSummary, GatewayError, PlayerAction, SessionGateway, StartOptions,
    },
    selection::{ClickOutcome, Selection, SelectionMachine},
};

/// Holds information about the game currently being played.
struct ActiveSession {
    game_id: String,
    state: Arc<GameState>,
    selection: SelectionMachine,
    hover: HoverTracker,
    chat: ChatLog,
    analysis: Option<String>,
    remaining_deploy: Option<u32>,
    last_error: Option<String>,
}

impl ActiveSession {
    fn new(game_id: String, state: GameState) -> Self {
        Self {
            game_id,
            state: Arc::new(state),
            selection: SelectionMachine::default(),
            hover: HoverTracker::default(),
            chat: ChatLog::default(),
            analysis: None,
            remaining_deploy: None,
            last_error: None,
        }
    }
}

/// The parts of the controller the autoplay task needs a handle on.
#[derive(Clone)]
struct SessionCore {
    dispatcher: ActionDispatcher,
    session: Arc<TokioMutex<Option<ActiveSession>>>,
    events: EventSink,
    human_fallback: PlayerId,
}

impl SessionCore {
    async fn game_id(&self) -> Result<String, DispatchError> {
        match self.session.lock().await.as_ref() {
            Some(session) => Ok(session.game_id.clone()),
            None => Err(DispatchError::NoSession),
        }
    }

    /// Swap the held state for `state`. The only place game state changes.
    async fn replace_state(&self, game_id: &str, state: GameState, remaining: Option<u32>) {
        let mut guard = self.session.lock().await;
        let Some(session) = guard.as_mut().filter(|s| s.game_id == game_id) else {
            warn!("Dropping state for {} which is no longer the active game", game_id);
            return;
        };
        let state = Arc::new(state);
        session.state = state.clone();
        session.remaining_deploy = remaining;
        let human = state.human_player(self.human_fallback);
        let before = session.selection.selection().clone();
        session.selection.reconcile(&state, human);
        let after = session.selection.selection().clone();
        drop(guard);

        // Selection first so the new board is drawn with the reconciled origin.
        if before != after {
            self.emit_selection(&after);
        }
        self.events.emit(SessionEvent::StateReplaced { state });
    }

    /// Report a normalized failure once.
    async fn surface(&self, error: &DispatchError) {
        let message = error.to_string();
        if let Some(session) = self.session.lock().await.as_mut() {
            session.last_error = Some(message.clone());
        }
        self.events.emit(SessionEvent::Error { message });
    }

    /// Run a state-returning request and apply its result.
    async fn request_state(
        &self,
        request: Request,
        trigger: Trigger,
    ) -> Result<Arc<GameState>, DispatchError> {
        let game_id = self.game_id().await?;
        let result = match self.dispatcher.dispatch(&game_id, request, trigger).await {
            Ok(Outcome::State { state, remaining }) => {
                self.replace_state(&game_id, state, remaining).await;
                self.current_state().await.ok_or(DispatchError::NoSession)
            }
            Ok(other) => {
                warn!("Expected a game state, got {:?}", other);
                Err(GatewayError::malformed("expected a game state").into())
            }
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            if *e != DispatchError::Busy {
                self.surface(e).await;
            }
        }
        result
    }

    async fn current_state(&self) -> Option<Arc<GameState>> {
        self.session.lock().await.as_ref().map(|s| s.state.clone())
    }

    async fn push_chat(&self, from: Speaker, text: String) {
        let message = match self.session.lock().await.as_mut() {
            Some(session) => session.chat.push(from, text),
            None => return,
        };
        self.events.emit(SessionEvent::Chat { message });
    }

    fn emit_selection(&self, selection: &Selection) {
        self.events.emit(SessionEvent::SelectionChanged {
            origin: selection.origin().map(str::to_string),
        });
    }
}

#[async_trait]
impl TurnDriver for SessionCore {
    async fn status(&self) -> Option<GameStatus> {
        self.current_state().await.map(|s| s.status)
    }

    async fn advance(&self) -> Result<GameStatus, DispatchError> {
        self.request_state(Request::NextTurn, Trigger::Autoplay)
            .await
            .map(|state| state.status)
    }

    async fn stopped(&self, exit: LoopExit) {
        if let LoopExit::TooManyFailures { .. } = &exit {
            self.events.emit(SessionEvent::Error {
                message: format!("Autoplay {}", exit.describe()),
            });
        }
        self.events.emit(SessionEvent::AutoplayStopped {
            reason: exit.describe(),
        });
    }
}

/// Owns the session: the authoritative state, the selection workflow, the
/// autoplay task and the UI-local bits around them.
pub struct SessionController {
    core: SessionCore,
    overlay: BoardOverlay,
    autoplay: TokioMutex<Option<AutoplayLoop>>,
    autoplay_settings: AutoplaySettings,
}

impl SessionController {
    pub fn new(gateway: Arc<dyn SessionGateway>, config: &ClientConfig, events: EventSink) -> Self {
        Self {
            core: SessionCore {
                dispatcher: ActionDispatcher::new(gateway, config.request_timeout()),
                session: Arc::new(TokioMutex::new(None)),
                events,
                human_fallback: config.human_player_id,
            },
            overlay: BoardOverlay::default(),
            autoplay: TokioMutex::new(None),
            autoplay_settings: config.autoplay.clone(),
        }
    }

    /// Start a new game and become the sole owner of its state. Any running
    /// game is left first.
    pub async fn start_session(&self, options: &StartOptions) -> Result<String, DispatchError> {
        self.exit_session().await;
        let (game_id, state) = match self.core.dispatcher.start(options).await {
            Ok(started) => started,
            Err(e) => {
                self.core.events.emit(SessionEvent::Error {
                    message: e.to_string(),
                });
                return Err(e);
            }
        };
        let state_ref = {
            let session = ActiveSession::new(game_id.clone(), state);
            let state = session.state.clone();
            *self.core.session.lock().await = Some(session);
            state
        };
        info!("Started game {}", game_id);
        self.core.events.emit(SessionEvent::SessionStarted {
            game_id: game_id.clone(),
        });
        self.core
            .events
            .emit(SessionEvent::StateReplaced { state: state_ref });
        if options.auto_play {
            self.start_autoplay().await;
        }
        Ok(game_id)
    }

    /// Replace the held state with a server payload. Never merges.
    pub async fn apply_server_state(&self, state: GameState) -> Result<(), DispatchError> {
        let game_id = self.core.game_id().await?;
        self.core.replace_state(&game_id, state, None).await;
        Ok(())
    }

    pub async fn current_state(&self) -> Option<Arc<GameState>> {
        self.core.current_state().await
    }

    pub async fn game_id(&self) -> Option<String> {
        self.core.game_id().await.ok()
    }

    pub async fn selection(&self) -> Selection {
        match self.core.session.lock().await.as_ref() {
            Some(session) => session.selection.selection().clone(),
            None => Selection::Idle,
        }
    }

    pub async fn last_error(&self) -> Option<String> {
        let guard = self.core.session.lock().await;
        guard.as_ref().and_then(|s| s.last_error.clone())
    }

    pub async fn analysis(&self) -> Option<String> {
        let guard = self.core.session.lock().await;
        guard.as_ref().and_then(|s| s.analysis.clone())
    }

    pub async fn remaining_deploy(&self) -> Option<u32> {
        let guard = self.core.session.lock().await;
        guard.as_ref().and_then(|s| s.remaining_deploy)
    }

    pub async fn chat_log(&self) -> Vec<ChatMessage> {
        let guard = self.core.session.lock().await;
        guard
            .as_ref()
            .map(|s| s.chat.messages().to_vec())
            .unwrap_or_default()
    }

    /// True while a manual action waits on the server.
    pub fn is_loading(&self) -> bool {
        self.core.dispatcher.is_in_flight()
    }

    /// Feed a territory click through the selection workflow, dispatching an
    /// attack or fortify when the click completes a pair.
    pub async fn click_territory(&self, name: &str) -> ClickOutcome {
        if self.is_loading() {
            return ClickOutcome::Ignored;
        }
        let outcome = {
            let mut guard = self.core.session.lock().await;
            let Some(session) = guard.as_mut() else {
                return ClickOutcome::Ignored;
            };
            let human = session.state.human_player(self.core.human_fallback);
            let before = session.selection.selection().clone();
            let state = session.state.clone();
            let outcome = session.selection.on_click(&state, human, name);
            let after = session.selection.selection().clone();
            drop(guard);
            if before != after {
                self.core.emit_selection(&after);
            }
            outcome
        };

        if let ClickOutcome::Dispatch(action) = &outcome {
            let _ = self
                .core
                .request_state(Request::Player(action.clone()), Trigger::Manual)
                .await;
            // Back to idle whatever the server said.
            let settled = match self.core.session.lock().await.as_mut() {
                Some(session) => {
                    session.selection.settle();
                    Some(session.selection.selection().clone())
                }
                None => None,
            };
            if let Some(selection) = settled {
                self.core.emit_selection(&selection);
            }
        }
        outcome
    }

    /// Place newly earned troops on an owned territory.
    pub async fn deploy(&self, territory: &str, troops: u32) -> Result<(), DispatchError> {
        let action = PlayerAction::Deploy {
            territory: territory.to_string(),
            troops,
        };
        self.core
            .request_state(Request::Player(action), Trigger::Manual)
            .await
            .map(drop)
    }

    pub async fn end_turn(&self) -> Result<(), DispatchError> {
        self.core
            .request_state(Request::EndTurn, Trigger::Manual)
            .await
            .map(drop)
    }

    /// Manual "next turn" button.
    pub async fn next_turn(&self) -> Result<(), DispatchError> {
        if self.current_state().await.is_some_and(|s| s.is_finished()) {
            return Err(DispatchError::Finished);
        }
        self.core
            .request_state(Request::NextTurn, Trigger::Manual)
            .await
            .map(drop)
    }

    /// Re-read the state from the server.
    pub async fn refresh(&self) -> Result<(), DispatchError> {
        self.core
            .request_state(Request::Refresh, Trigger::Manual)
            .await
            .map(drop)
    }

    pub async fn control(&self, command: ControlCommand) -> Result<(), DispatchError> {
        self.core
            .request_state(Request::Control(command), Trigger::Manual)
            .await
            .map(drop)
    }

    /// Ask the General to analyze the last move. Advisory only.
    pub async fn analyze(&self) -> Result<String, DispatchError> {
        let game_id = self.core.game_id().await?;
        let text = match self
            .core
            .dispatcher
            .dispatch(&game_id, Request::Analyze, Trigger::Manual)
            .await
        {
            Ok(Outcome::Analysis(text)) => text,
            Ok(other) => {
                warn!("Expected an analysis, got {:?}", other);
                return Err(GatewayError::malformed("expected an analysis").into());
            }
            Err(e) => {
                self.core.surface(&e).await;
                return Err(e);
            }
        };
        if let Some(session) = self.core.session.lock().await.as_mut() {
            session.analysis = Some(text.clone());
        }
        self.core
            .events
            .emit(SessionEvent::Analysis { text: text.clone() });
        self.core.push_chat(Speaker::General, text.clone()).await;
        Ok(text)
    }

    /// Send a free-text message to the General. Blank messages are not sent.
    pub async fn send_chat(&self, message: &str) -> Result<Option<String>, DispatchError> {
        let message = message.trim();
        if message.is_empty() {
            return Ok(None);
        }
        let game_id = self.core.game_id().await?;
        self.core.push_chat(Speaker::User, message.to_string()).await;
        let request = Request::Chat(message.to_string());
        match self
            .core
            .dispatcher
            .dispatch(&game_id, request, Trigger::Manual)
            .await
        {
            Ok(Outcome::Reply(reply)) => {
                self.core.push_chat(Speaker::General, reply.clone()).await;
                Ok(Some(reply))
            }
            Ok(other) => {
                warn!("Expected a chat reply, got {:?}", other);
                Ok(None)
            }
            Err(e) => {
                let text = format!("Could not answer: {e}");
                self.core.push_chat(Speaker::General, text).await;
                Err(e)
            }
        }
    }

    pub async fn list_games(&self) -> Result<Vec<GameSummary>, DispatchError> {
        self.core.dispatcher.list_games().await
    }

    /// Start autoplay unless it is already running or the game is over.
    /// Returns whether a loop is running afterwards.
    pub async fn start_autoplay(&self) -> bool {
        match self.current_state().await {
            Some(state) if !state.is_finished() => {}
            _ => return false,
        }
        let mut autoplay = self.autoplay.lock().await;
        if autoplay.as_ref().is_some_and(AutoplayLoop::is_running) {
            return true;
        }
        let driver: Arc<dyn TurnDriver> = Arc::new(self.core.clone());
        *autoplay = Some(AutoplayLoop::start(driver, self.autoplay_settings.clone()));
        self.core.events.emit(SessionEvent::AutoplayStarted);
        true
    }

    /// Stop autoplay between ticks. Returns whether a loop was running.
    pub async fn stop_autoplay(&self) -> bool {
        match self.autoplay.lock().await.as_ref() {
            Some(autoplay) if autoplay.is_running() => {
                autoplay.stop();
                true
            }
            _ => false,
        }
    }

    /// Flip autoplay. Returns whether it is running afterwards.
    pub async fn toggle_autoplay(&self) -> bool {
        if self.stop_autoplay().await {
            false
        } else {
            self.start_autoplay().await
        }
    }

    pub async fn autoplay_running(&self) -> bool {
        self.autoplay
            .lock()
            .await
            .as_ref()
            .is_some_and(AutoplayLoop::is_running)
    }

    /// Pointer entered or moved over a territory marker.
    pub async fn hover(&self, name: &str, x: f32, y: f32) {
        if let Some(session) = self.core.session.lock().await.as_mut() {
            let troops = session.state.territories.get(name).map(|t| t.troops);
            match troops {
                Some(troops) => session.hover.update(name, troops, x, y),
                None => session.hover.leave(),
            }
        }
    }

    /// Hover a territory by name at its board position. A territory with no
    /// marker clears the tooltip.
    pub async fn hover_territory(&self, name: &str) -> Option<Hover> {
        match self.overlay.coordinates_of(name) {
            Placement::Placed(at) => self.hover(name, at.x, at.y).await,
            Placement::Unplaced => self.hover_leave().await,
        }
        self.hovered().await
    }

    pub async fn hover_leave(&self) {
        if let Some(session) = self.core.session.lock().await.as_mut() {
            session.hover.leave();
        }
    }

    pub async fn hovered(&self) -> Option<Hover> {
        let guard = self.core.session.lock().await;
        guard.as_ref().and_then(|s| s.hover.current().cloned())
    }

    pub fn overlay(&self) -> &BoardOverlay {
        &self.overlay
    }

    pub fn coordinates_of(&self, name: &str) -> Placement {
        self.overlay.coordinates_of(name)
    }

    pub async fn markers(&self) -> Vec<Marker> {
        match self.current_state().await {
            Some(state) => self.overlay.markers(&state),
            None => Vec::new(),
        }
    }

    /// Territories of the current game with no known board position.
    pub async fn unplaced_territories(&self) -> Vec<String> {
        match self.current_state().await {
            Some(state) => self.overlay.unplaced(&state),
            None => Vec::new(),
        }
    }

    /// Close the current game. Returns the id of the game that was left.
    pub async fn exit_session(&self) -> Option<String> {
        if let Some(autoplay) = self.autoplay.lock().await.take() {
            autoplay.stop();
        }
        let session = self.core.session.lock().await.take()?;
        info!("Left game {}", session.game_id);
        self.core.events.emit(SessionEvent::SessionEnded {
            game_id: session.game_id.clone(),
        });
        Some(session.game_id)
    }
}
