//! The human player's two-click territory workflow: pick an origin, then a
//! target. A foreign target means attack, an owned one means fortify.

use serde::Serialize;

use crate::{
    game::{GameState, PlayerId},
    gateway::PlayerAction,
};

/// Troops moved by a single fortify click.
pub const FORTIFY_INCREMENT: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub enum Selection {
    #[default]
    Idle,
    OriginSelected(String),
}

impl Selection {
    pub fn origin(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::OriginSelected(origin) => Some(origin),
        }
    }
}

/// What a click asks the controller to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Nothing changed and nothing is sent.
    Ignored,
    Selected(String),
    Deselected,
    /// Send this action, then call [`SelectionMachine::settle`].
    Dispatch(PlayerAction),
}

#[derive(Debug, Default)]
pub struct SelectionMachine {
    selection: Selection,
}

impl SelectionMachine {
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Handle a click on `name`. `human` is the human player's id.
    pub fn on_click(&mut self, state: &GameState, human: PlayerId, name: &str) -> ClickOutcome {
        if !state.is_interactive() {
            // An origin left over from our own turn is no longer valid.
            self.selection = Selection::Idle;
            return ClickOutcome::Ignored;
        }
        let Some(owner) = state.owner_of(name) else {
            return ClickOutcome::Ignored;
        };
        match &self.selection {
            Selection::Idle if owner == human => {
                self.selection = Selection::OriginSelected(name.to_string());
                ClickOutcome::Selected(name.to_string())
            }
            Selection::Idle => ClickOutcome::Ignored,
            Selection::OriginSelected(origin) if origin == name => {
                self.selection = Selection::Idle;
                ClickOutcome::Deselected
            }
            Selection::OriginSelected(origin) if owner == human => {
                ClickOutcome::Dispatch(PlayerAction::Fortify {
                    origin: origin.clone(),
                    destination: name.to_string(),
                    troops: FORTIFY_INCREMENT,
                })
            }
            Selection::OriginSelected(origin) => ClickOutcome::Dispatch(PlayerAction::Attack {
                origin: origin.clone(),
                destination: name.to_string(),
            }),
        }
    }

    /// The dispatched action finished, whatever its outcome.
    pub fn settle(&mut self) {
        self.selection = Selection::Idle;
    }

    /// Drop the origin if a fresh state no longer allows it.
    pub fn reconcile(&mut self, state: &GameState, human: PlayerId) {
        if let Selection::OriginSelected(origin) = &self.selection {
            if !state.is_interactive() || state.owner_of(origin) != Some(human) {
                self.selection = Selection::Idle;
            }
        }
    }
}
