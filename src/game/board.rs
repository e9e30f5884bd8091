use std::collections::HashMap;
use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use super::{GameState, PlayerId};

/// Position of a territory marker, in percent of the board image.
#[derive(Copy, Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: f32,
    pub y: f32,
}

const fn at(x: f32, y: f32) -> Coordinate {
    Coordinate { x, y }
}

/// Marker positions over the world map image. Anything missing here shows up
/// in [`BoardOverlay::unplaced`] until a position is added.
const COORDINATES: &[(&str, Coordinate)] = &[
    // North America
    ("Ottawa", at(22.4, 34.6)),
    ("Mackenzie", at(11.4, 24.6)),
    ("Alasca", at(6.0, 23.0)),
    ("Vancouver", at(11.0, 32.0)),
    ("Labrador", at(25.6, 30.9)),
    ("Groenlândia", at(35.6, 19.2)),
    ("México", at(14.4, 52.5)),
    ("Nova York", at(24.1, 39.3)),
    ("Califórnia", at(11.0, 43.0)),
    // South America
    ("Venezuela", at(26.3, 61.2)),
    ("Peru", at(23.2, 70.2)),
    ("Brasil", at(30.7, 70.4)),
    ("Argentina", at(27.7, 78.6)),
    // Europe
    ("Suécia", at(49.5, 28.1)),
    ("Polônia", at(50.3, 34.8)),
    ("Alemanha", at(47.5, 35.2)),
    ("Islândia", at(41.0, 23.0)),
    ("Inglaterra", at(44.8, 33.4)),
    ("França", at(46.3, 38.3)),
    // Africa
    ("Sudão", at(56.8, 57.3)),
    ("Egito", at(54.7, 49.8)),
    ("Congo", at(52.9, 61.8)),
    ("África do Sul", at(52.2, 79.2)),
    ("Madagascar", at(60.3, 73.6)),
    ("Argélia", at(43.3, 53.3)),
    // Asia
    ("Moscou", at(53.9, 35.4)),
    ("Vladivostok", at(84.0, 20.8)),
    ("Tchita", at(70.9, 30.4)),
    ("Omsk", at(56.7, 30.1)),
    ("Dudinka", at(65.1, 27.4)),
    ("Aral", at(63.9, 40.8)),
    ("Oriente Médio", at(60.2, 50.5)),
    ("Sibéria", at(77.5, 22.9)),
    ("Mongólia", at(76.8, 36.1)),
    ("China", at(79.0, 43.1)),
    ("Japão", at(87.9, 43.9)),
    ("Índia", at(70.0, 53.9)),
    ("Vietnã", at(80.5, 51.1)),
    // Oceania
    ("Sumatra", at(78.3, 65.7)),
    ("Nova Guiné", at(91.2, 67.1)),
    ("Austrália", at(89.0, 78.9)),
    ("Bornéu", at(83.5, 61.6)),
];

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Placement {
    Placed(Coordinate),
    Unplaced,
}

/// A territory that can be drawn on the board.
#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct Marker {
    pub name: String,
    pub at: Coordinate,
    pub owner: PlayerId,
    pub troops: u32,
    pub color: Option<String>,
}

/// Maps territory names to screen positions over the board image.
#[derive(Clone)]
pub struct BoardOverlay(HashMap<String, Coordinate>);

impl Debug for BoardOverlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BoardOverlay({} placed)", self.0.len())
    }
}

impl Default for BoardOverlay {
    fn default() -> Self {
        Self::new(COORDINATES.iter().map(|(name, c)| (name.to_string(), *c)))
    }
}

impl BoardOverlay {
    pub fn new(entries: impl IntoIterator<Item = (String, Coordinate)>) -> Self {
        Self(entries.into_iter().collect())
    }
    pub fn coordinates_of(&self, name: &str) -> Placement {
        match self.0.get(name) {
            Some(c) => Placement::Placed(*c),
            None => Placement::Unplaced,
        }
    }
    /// Sorted names of territories in `state` without a known position.
    pub fn unplaced(&self, state: &GameState) -> Vec<String> {
        let mut names: Vec<String> = state
            .territories
            .keys()
            .filter(|name| !self.0.contains_key(name.as_str()))
            .cloned()
            .collect();
        names.sort();
        names
    }
    /// Markers for every placed territory. Unplaced ones are never given a
    /// made-up position.
    pub fn markers(&self, state: &GameState) -> Vec<Marker> {
        state
            .territories
            .iter()
            .filter_map(|(name, t)| {
                let at = *self.0.get(name)?;
                Some(Marker {
                    name: name.clone(),
                    at,
                    owner: t.owner,
                    troops: t.troops,
                    color: state.player(t.owner).map(|p| p.color.clone()),
                })
            })
            .collect()
    }
}

/// Pixel rectangle of the rendered board, used by the coordinate picker.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct BoardRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

/// Convert a click inside the rendered board into a table entry, rounded to
/// one decimal. Only meant for the offline coordinate picking tool.
pub fn pick_coordinate(rect: BoardRect, click_x: f32, click_y: f32) -> Option<Coordinate> {
    if rect.width <= 0.0 || rect.height <= 0.0 {
        return None;
    }
    let round = |v: f32| (v * 10.0).round() / 10.0;
    Some(Coordinate {
        x: round((click_x - rect.left) / rect.width * 100.0),
        y: round((click_y - rect.top) / rect.height * 100.0),
    })
}

/// Pointer information shown as a tooltip over a marker.
#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct Hover {
    pub name: String,
    pub troops: u32,
    pub x: f32,
    pub y: f32,
}

/// UI-local pointer tracking. Lives next to the game state but is never part
/// of it.
#[derive(Default, Debug)]
pub struct HoverTracker(Option<Hover>);

impl HoverTracker {
    /// Pointer entered or moved over a marker.
    pub fn update(&mut self, name: &str, troops: u32, x: f32, y: f32) {
        self.0 = Some(Hover {
            name: name.to_string(),
            troops,
            x,
            y,
        });
    }
    pub fn leave(&mut self) {
        self.0 = None;
    }
    pub fn current(&self) -> Option<&Hover> {
        self.0.as_ref()
    }
}
