//! Unattended turn advancement. The loop asks for the next turn, waits one
//! tick and repeats until it is stopped, the game ends, or the server keeps
//! failing.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use n0_future::task;
use rand::Rng as _;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use crate::{dispatch::DispatchError, game::GameStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoplaySettings {
    /// Pause between two successful turns.
    pub tick_ms: u64,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    /// Upper bound of the random delay added to every backoff.
    pub backoff_jitter_ms: u64,
    /// Consecutive failures after which the loop gives up.
    pub max_consecutive_failures: u32,
}

impl Default for AutoplaySettings {
    fn default() -> Self {
        Self {
            tick_ms: 400,
            backoff_base_ms: 400,
            backoff_max_ms: 10_000,
            backoff_jitter_ms: 100,
            max_consecutive_failures: 5,
        }
    }
}

impl AutoplaySettings {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Delay before retrying after the `failures`-th consecutive failure.
    pub fn backoff(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(16);
        let base = self
            .backoff_base_ms
            .saturating_mul(1 << exponent)
            .min(self.backoff_max_ms);
        let jitter = match self.backoff_jitter_ms {
            0 => 0,
            max => rand::thread_rng().gen_range(0..=max),
        };
        Duration::from_millis(base + jitter)
    }
}

/// What the loop drives. Implemented by the session controller.
#[async_trait]
pub trait TurnDriver: Send + Sync + 'static {
    /// Status of the held game, `None` once the session is gone.
    async fn status(&self) -> Option<GameStatus>;
    /// Request the next turn and apply it, returning the new status.
    async fn advance(&self) -> Result<GameStatus, DispatchError>;
    /// Called once when the loop ends on its own or after `stop()`.
    async fn stopped(&self, exit: LoopExit);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopExit {
    Stopped,
    Finished,
    NoSession,
    TooManyFailures { failures: u32, last_error: String },
}

impl LoopExit {
    pub fn describe(&self) -> String {
        match self {
            Self::Stopped => "stopped".to_string(),
            Self::Finished => "game finished".to_string(),
            Self::NoSession => "no game in progress".to_string(),
            Self::TooManyFailures {
                failures,
                last_error,
            } => format!("gave up after {failures} failed turns: {last_error}"),
        }
    }
}

/// Handle on a running autoplay task. Dropping it stops the loop the same way
/// `stop()` does: a turn already requested is still awaited and applied.
pub struct AutoplayLoop {
    token: CancellationToken,
    running: Arc<AtomicBool>,
    _stop_on_drop: DropGuard,
}

impl AutoplayLoop {
    pub fn start(driver: Arc<dyn TurnDriver>, settings: AutoplaySettings) -> Self {
        let token = CancellationToken::new();
        let running = Arc::new(AtomicBool::new(true));
        // Detached: the task ends by observing the token, never by abort.
        task::spawn({
            let token = token.clone();
            let running = running.clone();
            async move {
                info!("Autoplay started");
                let exit = run(driver.as_ref(), &settings, &token).await;
                running.store(false, Ordering::Release);
                info!("Autoplay ended: {}", exit.describe());
                driver.stopped(exit).await;
            }
        });
        Self {
            _stop_on_drop: token.clone().drop_guard(),
            token,
            running,
        }
    }

    /// Ask the loop to end. Observed between ticks; a request already on the
    /// wire is left to complete.
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire) && !self.token.is_cancelled()
    }
}

/// The loop body. Returns why it ended.
pub async fn run(
    driver: &dyn TurnDriver,
    settings: &AutoplaySettings,
    token: &CancellationToken,
) -> LoopExit {
    let mut failures = 0;
    loop {
        if token.is_cancelled() {
            return LoopExit::Stopped;
        }
        match driver.status().await {
            None => return LoopExit::NoSession,
            Some(GameStatus::Finished) => return LoopExit::Finished,
            Some(_) => {}
        }
        let delay = match driver.advance().await {
            Ok(GameStatus::Finished) => return LoopExit::Finished,
            Ok(status) => {
                debug!("autoplay tick done, status {:?}", status);
                failures = 0;
                settings.tick()
            }
            Err(DispatchError::NoSession) => return LoopExit::NoSession,
            Err(e) => {
                failures += 1;
                if failures >= settings.max_consecutive_failures {
                    return LoopExit::TooManyFailures {
                        failures,
                        last_error: e.to_string(),
                    };
                }
                let delay = settings.backoff(failures);
                warn!("autoplay turn failed ({}), retrying in {:?}", e, delay);
                delay
            }
        };
        tokio::select! {
            _ = token.cancelled() => return LoopExit::Stopped,
            _ = sleep(delay) => {}
        }
    }
}
