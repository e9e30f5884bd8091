//! Plain-text view of the session for the terminal front end.

use std::{fmt::Write as _, io::Write as _};

use tokio::sync::mpsc::UnboundedReceiver;

use crate::{
    chat::Speaker,
    event::SessionEvent,
    game::{
        board::{BoardOverlay, Placement},
        GameState, LastAction,
    },
};

/// Describe the last move, if there was one.
pub fn last_action_line(action: &LastAction) -> Option<String> {
    let line = match action {
        LastAction::None => return None,
        LastAction::Attack {
            player,
            from,
            to,
            success,
            ..
        } => format!(
            "Player #{player} attacked {to} from {from}: {}",
            if *success { "conquered" } else { "repelled" }
        ),
        LastAction::Deploy {
            player,
            territory,
            troops,
        } => format!("Player #{player} deployed {troops} troops on {territory}"),
        LastAction::Fortify {
            player,
            from,
            to,
            troops,
        } => format!("Player #{player} moved {troops} troops from {from} to {to}"),
        LastAction::NoAttack { player, reason } => {
            format!("Player #{player} did not attack ({reason})")
        }
    };
    Some(line)
}

/// Full board panel: header, players, territories, last move and the
/// territories still missing a map position.
pub fn board_view(state: &GameState, overlay: &BoardOverlay, origin: Option<&str>) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "== Round {} | Turns {} | {:?} | player #{} to move{}",
        state.current_round,
        state.total_turns,
        state.status,
        state.current_player,
        if state.human_turn { " (you)" } else { "" }
    );
    if let Some(winner) = state.winner {
        let _ = writeln!(out, "Winner: player #{winner}");
    }

    let _ = writeln!(out, "-- Players");
    for p in &state.players {
        let _ = writeln!(
            out,
            "  #{} {} gene {}{}: {} territories, {} troops{}",
            p.id,
            p.color,
            p.strategy_gene,
            if p.strategy.is_empty() {
                String::new()
            } else {
                format!(" ({})", p.strategy)
            },
            p.territories_count,
            p.total_troops,
            if p.eliminated { " [eliminated]" } else { "" }
        );
    }

    let _ = writeln!(out, "-- Territories");
    for (name, t) in &state.territories {
        let marker = if origin == Some(name.as_str()) { "*" } else { " " };
        let place = match overlay.coordinates_of(name) {
            Placement::Placed(c) => format!("@ {:.1}%,{:.1}%", c.x, c.y),
            Placement::Unplaced => "unplaced".to_string(),
        };
        let _ = writeln!(
            out,
            " {marker}{name}: #{} x{} {place}",
            t.owner, t.troops
        );
    }

    if let Some(line) = last_action_line(&state.last_action) {
        let _ = writeln!(out, "-- Last action\n  {line}");
    }

    let unplaced = overlay.unplaced(state);
    if !unplaced.is_empty() {
        let _ = writeln!(out, "-- No map position (add a coordinate entry)");
        for name in unplaced {
            let _ = writeln!(out, "  {name}");
        }
    }
    out
}

fn print(text: &str) {
    let mut stdout = std::io::stdout().lock();
    if let Err(e) = writeln!(stdout, "{text}") {
        tracing::error!("Failed to write to terminal: {}", e);
    }
}

/// Print session events until the stream ends.
pub async fn render_events(mut events: UnboundedReceiver<SessionEvent>, overlay: BoardOverlay) {
    let mut origin: Option<String> = None;
    while let Some(event) = events.recv().await {
        match event {
            SessionEvent::SessionStarted { game_id } => print(&format!("Joined game {game_id}")),
            SessionEvent::StateReplaced { state } => {
                print(&board_view(&state, &overlay, origin.as_deref()))
            }
            SessionEvent::SelectionChanged { origin: selected } => {
                match &selected {
                    Some(name) => print(&format!("Origin: {name}. Pick a target.")),
                    None if origin.is_some() => print("Selection cleared."),
                    None => {}
                }
                origin = selected;
            }
            SessionEvent::Analysis { text } => print(&format!("== Analysis\n{text}")),
            SessionEvent::Chat { message } => {
                let who = match message.from {
                    Speaker::General => "General",
                    Speaker::User => "You",
                };
                print(&format!("[{who}] {}", message.text));
            }
            SessionEvent::Error { message } => print(&format!("! {message}")),
            SessionEvent::AutoplayStarted => print("Autoplay on."),
            SessionEvent::AutoplayStopped { reason } => print(&format!("Autoplay off ({reason}).")),
            SessionEvent::SessionEnded { game_id } => {
                origin = None;
                print(&format!("Left game {game_id}"));
            }
        }
    }
    tracing::info!("Event stream ended.");
}
