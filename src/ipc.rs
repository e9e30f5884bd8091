//! Text commands typed by the player, mapped onto controller calls.

use std::str::FromStr;

use anyhow::anyhow;
use tokio::io::{AsyncBufReadExt as _, BufReader};

use crate::{
    gateway::{ControlCommand, Speed, StartOptions},
    render::board_view,
    state::SessionController,
};

pub const HELP: &str = "\
commands:
  start | watch            new game (with you / bots only)
  click <territory>        select origin, then target to attack or fortify
  deploy <troops> <territory>
  end                      end your turn
  next                     advance one turn
  auto                     toggle autoplay
  analyze                  ask the General about the last move
  say <message>            chat with the General
  hover <territory> | leave
  show | refresh | games
  pause | resume | speed <slow|normal|fast>
  exit                     leave the game
  quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start { spectate: bool },
    Click(String),
    Deploy { troops: u32, territory: String },
    EndTurn,
    Next,
    Auto,
    Analyze,
    Say(String),
    Hover(String),
    Leave,
    Show,
    Refresh,
    Games,
    Control(ControlCommand),
    Exit,
    Quit,
    Help,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();
        let needs_arg = |what: &str| {
            if rest.is_empty() {
                Err(anyhow!("missing {what}"))
            } else {
                Ok(rest.to_string())
            }
        };
        let command = match word {
            "start" => Self::Start { spectate: false },
            "watch" => Self::Start { spectate: true },
            "click" => Self::Click(needs_arg("territory")?),
            "deploy" => {
                let (troops, territory) = rest
                    .split_once(' ')
                    .ok_or_else(|| anyhow!("usage: deploy <troops> <territory>"))?;
                Self::Deploy {
                    troops: troops.parse()?,
                    territory: territory.trim().to_string(),
                }
            }
            "end" => Self::EndTurn,
            "next" => Self::Next,
            "auto" => Self::Auto,
            "analyze" => Self::Analyze,
            "say" => Self::Say(needs_arg("message")?),
            "hover" => Self::Hover(needs_arg("territory")?),
            "leave" => Self::Leave,
            "show" => Self::Show,
            "refresh" => Self::Refresh,
            "games" => Self::Games,
            "pause" => Self::Control(ControlCommand::Pause),
            "resume" => Self::Control(ControlCommand::Resume),
            "speed" => {
                let speed = match rest {
                    "slow" => Speed::Slow,
                    "normal" => Speed::Normal,
                    "fast" => Speed::Fast,
                    other => return Err(anyhow!("unknown speed {other:?}")),
                };
                Self::Control(ControlCommand::SetSpeed { speed })
            }
            "exit" => Self::Exit,
            "quit" | "q" => Self::Quit,
            "help" | "?" => Self::Help,
            other => return Err(anyhow!("unknown command {other:?}, try help")),
        };
        Ok(command)
    }
}

/// Run one command. Returns `false` when the player wants to quit.
/// Failures are already surfaced through the event stream, so they are not
/// returned here.
pub async fn execute(
    controller: &SessionController,
    command: Command,
    start: &StartOptions,
) -> bool {
    match command {
        Command::Start { spectate } => {
            let options = StartOptions {
                include_human: if spectate { None } else { start.include_human },
                ..start.clone()
            };
            let _ = controller.start_session(&options).await;
        }
        Command::Click(name) => {
            controller.click_territory(&name).await;
        }
        Command::Deploy { troops, territory } => {
            let _ = controller.deploy(&territory, troops).await;
        }
        Command::EndTurn => {
            let _ = controller.end_turn().await;
        }
        Command::Next => {
            if let Err(e) = controller.next_turn().await {
                tracing::debug!("next turn: {}", e);
            }
        }
        Command::Auto => {
            controller.toggle_autoplay().await;
        }
        Command::Analyze => {
            let _ = controller.analyze().await;
        }
        Command::Say(message) => {
            let _ = controller.send_chat(&message).await;
        }
        Command::Hover(name) => {
            match controller.hover_territory(&name).await {
                Some(h) => println!("{}: {} troops", h.name, h.troops),
                None => println!("{name} has no marker on the map"),
            }
        }
        Command::Leave => controller.hover_leave().await,
        Command::Show => match controller.current_state().await {
            Some(state) => {
                let selection = controller.selection().await;
                let view = board_view(&state, controller.overlay(), selection.origin());
                println!("{view}");
            }
            None => println!("No game in progress."),
        },
        Command::Refresh => {
            let _ = controller.refresh().await;
        }
        Command::Games => match controller.list_games().await {
            Ok(games) => {
                for g in games {
                    println!("{} {} round {} ({})", g.game_id, g.status, g.round, g.created_at);
                }
            }
            Err(e) => println!("! {e}"),
        },
        Command::Control(command) => {
            let _ = controller.control(command).await;
        }
        Command::Exit => {
            if controller.exit_session().await.is_none() {
                println!("No game in progress.");
            }
        }
        Command::Quit => return false,
        Command::Help => println!("{HELP}"),
    }
    true
}

/// Read commands from stdin until `quit` or end of input.
pub async fn repl(controller: &SessionController, start: &StartOptions) -> anyhow::Result<()> {
    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<Command>() {
            Ok(command) => {
                if !execute(controller, command, start).await {
                    break;
                }
            }
            Err(e) => println!("{e}"),
        }
    }
    Ok(())
}
