use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedReceiver;
use warboard_lib::{
    chat::Speaker,
    config::ClientConfig,
    dispatch::DispatchError,
    event::{EventSink, SessionEvent},
    gateway::{
        ControlCommand, GatewayError, GatewayResult, PlayerAction, SessionGateway, StartOptions,
    },
    selection::{ClickOutcome, Selection},
    state::SessionController,
};

/// In-memory server. Records every call and answers from a queue, falling
/// back to `fallback` once the queue is empty. Unscripted next turns are
/// numbered: the n-th one reports round n after `turn_latency`.
struct Scripted {
    start: Value,
    fallback: Value,
    turn_latency: Duration,
    replies: Mutex<VecDeque<GatewayResult<Value>>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl Scripted {
    fn new(start_state: Value) -> Arc<Self> {
        Self::with_turn_latency(start_state, Duration::ZERO)
    }

    fn with_turn_latency(start_state: Value, turn_latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            start: json!({"success": true, "game_id": "g1", "state": start_state}),
            fallback: json!({"state": start_state}),
            turn_latency,
            replies: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn reply(&self, reply: GatewayResult<Value>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    fn answer(&self, name: &str, body: Value) -> GatewayResult<Value> {
        self.calls.lock().unwrap().push((name.to_string(), body));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }

    fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, name: &str) -> usize {
        self.calls().iter().filter(|(n, _)| n == name).count()
    }
}

#[async_trait]
impl SessionGateway for Scripted {
    async fn start(&self, options: &StartOptions) -> GatewayResult<Value> {
        self.calls
            .lock()
            .unwrap()
            .push(("start".into(), serde_json::to_value(options).unwrap()));
        Ok(self.start.clone())
    }
    async fn next_turn(&self, _game_id: &str) -> GatewayResult<Value> {
        let round = self.count("next_turn") + 1;
        let mut reply = self.answer("next_turn", Value::Null)?;
        if !self.turn_latency.is_zero() {
            tokio::time::sleep(self.turn_latency).await;
        }
        if let Some(state) = reply.get_mut("state") {
            state["current_round"] = json!(round);
        }
        Ok(reply)
    }
    async fn analyze(&self, _game_id: &str) -> GatewayResult<Value> {
        self.answer("analyze", Value::Null)
    }
    async fn player_action(&self, _game_id: &str, action: &PlayerAction) -> GatewayResult<Value> {
        self.answer("player_action", serde_json::to_value(action).unwrap())
    }
    async fn end_turn(&self, _game_id: &str) -> GatewayResult<Value> {
        self.answer("end_turn", Value::Null)
    }
    async fn chat(&self, _game_id: &str, message: &str) -> GatewayResult<Value> {
        self.answer("chat", json!(message))
    }
    async fn fetch_state(&self, _game_id: &str) -> GatewayResult<Value> {
        self.answer("fetch_state", Value::Null)
    }
    async fn control(&self, _game_id: &str, command: ControlCommand) -> GatewayResult<Value> {
        self.answer("control", serde_json::to_value(command).unwrap())
    }
    async fn list_games(&self) -> GatewayResult<Value> {
        self.answer("list_games", Value::Null)
    }
}

fn human_turn() -> Value {
    json!({
        "game_id": "g1",
        "status": "playing",
        "current_round": 1,
        "current_player": 0,
        "human_turn": true,
        "territories": {
            "Brasil": {"dono": 0, "tropas": 5},
            "Peru": {"dono": 0, "tropas": 2},
            "Argentina": {"dono": 1, "tropas": 3}
        },
        "players": [
            {"id": 0, "color": "blue", "is_human": true},
            {"id": 1, "color": "red"}
        ]
    })
}

fn bots_turn() -> Value {
    let mut state = human_turn();
    state["human_turn"] = json!(false);
    state["current_player"] = json!(1);
    state
}

async fn session(
    start_state: Value,
) -> (
    Arc<Scripted>,
    SessionController,
    UnboundedReceiver<SessionEvent>,
) {
    session_with(Scripted::new(start_state)).await
}

async fn session_with(
    gateway: Arc<Scripted>,
) -> (
    Arc<Scripted>,
    SessionController,
    UnboundedReceiver<SessionEvent>,
) {
    let (events, rx) = EventSink::channel();
    let controller = SessionController::new(gateway.clone(), &ClientConfig::default(), events);
    controller
        .start_session(&StartOptions::default())
        .await
        .unwrap();
    (gateway, controller, rx)
}

fn drain(rx: &mut UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn clicking_own_territory_selects_it() {
    let (gateway, controller, mut rx) = session(human_turn()).await;
    drain(&mut rx);

    let outcome = controller.click_territory("Brasil").await;
    assert_eq!(outcome, ClickOutcome::Selected("Brasil".into()));
    assert_eq!(
        controller.selection().await,
        Selection::OriginSelected("Brasil".into())
    );
    assert!(drain(&mut rx).iter().any(|e| matches!(
        e,
        SessionEvent::SelectionChanged { origin: Some(o) } if o == "Brasil"
    )));
    assert_eq!(gateway.calls().len(), 1, "only the start call");
}

#[tokio::test]
async fn rejected_attack_keeps_state_and_clears_selection() {
    let (gateway, controller, mut rx) = session(human_turn()).await;
    let before = controller.current_state().await.unwrap();
    controller.click_territory("Brasil").await;
    drain(&mut rx);

    gateway.reply(Err(GatewayError::Rejected {
        status: 400,
        message: "no dice left".into(),
    }));
    let outcome = controller.click_territory("Argentina").await;
    assert!(matches!(outcome, ClickOutcome::Dispatch(PlayerAction::Attack { .. })));

    let (name, body) = gateway.calls().pop().unwrap();
    assert_eq!(name, "player_action");
    assert_eq!(
        body,
        json!({"action": "attack", "params": {"origem": "Brasil", "destino": "Argentina"}})
    );
    assert_eq!(controller.selection().await, Selection::Idle);
    assert_eq!(controller.current_state().await.unwrap(), before);
    assert_eq!(controller.last_error().await.as_deref(), Some("no dice left"));
    let events = drain(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, SessionEvent::Error { message } if message == "no dice left")));
    assert!(!events
        .iter()
        .any(|e| matches!(e, SessionEvent::StateReplaced { .. })));
}

#[tokio::test]
async fn owned_target_fortifies_one_troop() {
    let (gateway, controller, _rx) = session(human_turn()).await;
    controller.click_territory("Brasil").await;
    controller.click_territory("Peru").await;

    let (name, body) = gateway.calls().pop().unwrap();
    assert_eq!(name, "player_action");
    assert_eq!(
        body,
        json!({"action": "fortify", "params": {"origem": "Brasil", "destino": "Peru", "tropas": 1}})
    );
    assert_eq!(controller.selection().await, Selection::Idle);
}

#[tokio::test]
async fn second_click_on_origin_deselects_without_a_call() {
    let (gateway, controller, _rx) = session(human_turn()).await;
    controller.click_territory("Brasil").await;
    let outcome = controller.click_territory("Brasil").await;
    assert_eq!(outcome, ClickOutcome::Deselected);
    assert_eq!(controller.selection().await, Selection::Idle);
    assert_eq!(gateway.calls().len(), 1);
}

#[tokio::test]
async fn clicks_outside_the_human_turn_are_ignored() {
    let (gateway, controller, _rx) = session(bots_turn()).await;
    assert_eq!(controller.click_territory("Brasil").await, ClickOutcome::Ignored);
    assert_eq!(controller.click_territory("Argentina").await, ClickOutcome::Ignored);
    assert_eq!(gateway.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn autoplay_issues_one_request_per_tick() {
    let (gateway, controller, mut rx) = session(bots_turn()).await;
    assert!(controller.start_autoplay().await);

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(gateway.count("next_turn"), 3);

    assert!(controller.stop_autoplay().await);
    tokio::time::sleep(Duration::from_millis(2000)).await;
    assert_eq!(gateway.count("next_turn"), 3);
    assert!(!controller.autoplay_running().await);
    assert!(drain(&mut rx)
        .iter()
        .any(|e| matches!(e, SessionEvent::AutoplayStopped { .. })));
}

fn applied_rounds(events: &[SessionEvent]) -> Vec<u32> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::StateReplaced { state } => Some(state.current_round),
            _ => None,
        })
        .collect()
}

fn stops(events: &[SessionEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, SessionEvent::AutoplayStopped { .. }))
        .count()
}

#[tokio::test(start_paused = true)]
async fn stopping_mid_request_still_applies_that_turn() {
    let gateway = Scripted::with_turn_latency(bots_turn(), Duration::from_millis(1000));
    let (gateway, controller, mut rx) = session_with(gateway).await;
    drain(&mut rx);

    controller.start_autoplay().await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(controller.stop_autoplay().await);
    tokio::time::sleep(Duration::from_millis(3000)).await;

    let events = drain(&mut rx);
    assert_eq!(gateway.count("next_turn"), 1);
    assert_eq!(applied_rounds(&events), [1]);
    assert_eq!(controller.current_state().await.unwrap().current_round, 1);
    assert_eq!(stops(&events), 1);
}

#[tokio::test(start_paused = true)]
async fn restarting_autoplay_keeps_the_pending_turn() {
    let gateway = Scripted::with_turn_latency(bots_turn(), Duration::from_millis(1000));
    let (gateway, controller, mut rx) = session_with(gateway).await;
    drain(&mut rx);

    controller.start_autoplay().await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    controller.stop_autoplay().await;
    assert!(controller.start_autoplay().await);
    tokio::time::sleep(Duration::from_millis(1200)).await;
    controller.stop_autoplay().await;
    tokio::time::sleep(Duration::from_millis(3000)).await;

    let events = drain(&mut rx);
    assert_eq!(gateway.count("next_turn"), 2);
    assert_eq!(applied_rounds(&events), [1, 2]);
    assert_eq!(controller.current_state().await.unwrap().current_round, 2);
    assert_eq!(stops(&events), 2, "each loop reports its own end");
}

#[tokio::test(start_paused = true)]
async fn finished_game_is_never_advanced() {
    let mut state = bots_turn();
    state["status"] = json!("finished");
    state["winner"] = json!(1);
    let (gateway, controller, _rx) = session(state).await;

    assert!(!controller.start_autoplay().await);
    assert_eq!(controller.next_turn().await, Err(DispatchError::Finished));
    tokio::time::sleep(Duration::from_millis(2000)).await;
    assert_eq!(gateway.count("next_turn"), 0);
}

#[tokio::test]
async fn full_capture_replaces_every_territory() {
    let (gateway, controller, _rx) = session(human_turn()).await;
    controller.click_territory("Brasil").await;

    gateway.reply(Ok(json!({
        "status": "playing",
        "human_turn": true,
        "territories": {
            "Alasca": {"dono": 1, "tropas": 4},
            "Japão": {"dono": 1, "tropas": 1}
        }
    })));
    controller.refresh().await.unwrap();

    let state = controller.current_state().await.unwrap();
    let names: Vec<_> = state.territories.keys().cloned().collect();
    assert_eq!(names, ["Alasca", "Japão"]);
    // Brasil is gone, so the origin cannot survive.
    assert_eq!(controller.selection().await, Selection::Idle);
    assert_eq!(controller.unplaced_territories().await, Vec::<String>::new());
}

#[tokio::test]
async fn deploy_reports_remaining_troops() {
    let (gateway, controller, _rx) = session(human_turn()).await;
    gateway.reply(Ok(json!({"state": human_turn(), "remaining": 2})));
    controller.deploy("Peru", 3).await.unwrap();

    assert_eq!(controller.remaining_deploy().await, Some(2));
    let (_, body) = gateway.calls().pop().unwrap();
    assert_eq!(
        body,
        json!({"action": "deploy", "params": {"territorio": "Peru", "tropas": 3}})
    );
}

#[tokio::test]
async fn chat_with_the_general() {
    let (gateway, controller, _rx) = session(human_turn()).await;

    assert_eq!(controller.send_chat("   ").await, Ok(None));
    assert_eq!(gateway.count("chat"), 0);

    gateway.reply(Ok(json!({"reply": "Avante!"})));
    let reply = controller.send_chat("Qual o plano?").await.unwrap();
    assert_eq!(reply.as_deref(), Some("Avante!"));

    gateway.reply(Err(GatewayError::Network("connection refused".into())));
    assert!(controller.send_chat("Alô?").await.is_err());

    let log = controller.chat_log().await;
    assert_eq!(log.len(), 5, "greeting plus two exchanges");
    assert_eq!(log[1].from, Speaker::User);
    assert_eq!(log[2].text, "Avante!");
    assert!(log[4].text.starts_with("Could not answer:"));
    // Chat failures stay in the chat log.
    assert_eq!(controller.last_error().await, None);
}

#[tokio::test]
async fn analysis_is_advisory() {
    let (gateway, controller, _rx) = session(human_turn()).await;
    let before = controller.current_state().await.unwrap();
    gateway.reply(Ok(json!({"analysis": "Boa jogada"})));

    assert_eq!(controller.analyze().await.unwrap(), "Boa jogada");
    assert_eq!(controller.analysis().await.as_deref(), Some("Boa jogada"));
    assert_eq!(controller.current_state().await.unwrap(), before);
}

#[tokio::test]
async fn exit_drops_the_session() {
    let (gateway, controller, mut rx) = session(human_turn()).await;
    assert_eq!(controller.exit_session().await.as_deref(), Some("g1"));
    assert_eq!(controller.game_id().await, None);
    assert_eq!(controller.click_territory("Brasil").await, ClickOutcome::Ignored);
    assert_eq!(controller.end_turn().await, Err(DispatchError::NoSession));
    assert_eq!(gateway.calls().len(), 1);
    assert!(drain(&mut rx)
        .iter()
        .any(|e| matches!(e, SessionEvent::SessionEnded { game_id } if game_id == "g1")));
}

#[tokio::test]
async fn hovering_an_unplaced_territory_clears_the_tooltip() {
    let mut state = human_turn();
    state["territories"]["Atlântida"] = json!({"dono": 1, "tropas": 1});
    let (_gateway, controller, _rx) = session(state).await;

    let brasil = controller.hover_territory("Brasil").await.unwrap();
    assert_eq!((brasil.name.as_str(), brasil.troops), ("Brasil", 5));

    assert_eq!(controller.hover_territory("Atlântida").await, None);
    assert_eq!(controller.hovered().await, None);
}

#[tokio::test]
async fn captured_origin_is_cleared_before_the_board_is_redrawn() {
    let (gateway, controller, mut rx) = session(human_turn()).await;
    controller.click_territory("Brasil").await;
    drain(&mut rx);

    let mut captured = human_turn();
    captured["territories"]["Brasil"] = json!({"dono": 1, "tropas": 2});
    gateway.reply(Ok(json!({"state": captured})));
    controller.refresh().await.unwrap();

    let events = drain(&mut rx);
    let cleared = events
        .iter()
        .position(|e| matches!(e, SessionEvent::SelectionChanged { origin: None }))
        .expect("selection cleared");
    let redrawn = events
        .iter()
        .position(|e| matches!(e, SessionEvent::StateReplaced { .. }))
        .expect("state replaced");
    assert!(cleared < redrawn);
}
