use std::sync::Arc;

use n0_future::task::{self, AbortOnDropHandle};
use tracing_subscriber::EnvFilter;

use crate::{
    config::Cli,
    event::EventSink,
    gateway::{HttpGateway, SessionGateway},
    state::SessionController,
};

pub mod autoplay;
pub mod chat;
pub mod config;
pub mod dispatch;
pub mod event;
pub mod game;
pub mod gateway;
pub mod ipc;
pub mod render;
pub mod selection;
pub mod state;
mod utils;

/// Log to stderr so the board on stdout stays readable. `RUST_LOG` wins over
/// the configured level.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .pretty()
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .try_init();
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.resolve()?;
    init_tracing(&config.log_level);
    tracing::info!("Starting client against {}", config.server_url);

    let gateway: Arc<dyn SessionGateway> =
        Arc::new(HttpGateway::new(&config.server_url, config.request_timeout())?);
    let (events, rx) = EventSink::channel();
    let controller = SessionController::new(gateway, &config, events);
    let _renderer = AbortOnDropHandle::new(task::spawn(render::render_events(
        rx,
        controller.overlay().clone(),
    )));

    let result = ipc::repl(&controller, &config.start).await;
    controller.exit_session().await;
    tracing::info!("Client stopped.");
    result
}
