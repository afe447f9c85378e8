//! Board presets.
//!
//! A preset is a name plus the baud rate the stock sketch for that board
//! talks at. Unknown names fall back to [`BoardKind::Uno`].

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Known board families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BoardKind {
    #[default]
    Uno,
    Mega,
    Due,
}

impl BoardKind {
    /// Every preset, in display order.
    pub const ALL: [BoardKind; 3] = [BoardKind::Uno, BoardKind::Mega, BoardKind::Due];

    /// Look a preset up by name, ignoring case.
    ///
    /// Unrecognised names resolve to the default preset.
    pub fn from_name(name: &str) -> Self {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
            .unwrap_or_else(|| {
                debug!("Unknown board {:?}, using {}", name, BoardKind::default());
                BoardKind::default()
            })
    }

    /// Display name of the preset.
    pub fn name(self) -> &'static str {
        match self {
            BoardKind::Uno => "Uno",
            BoardKind::Mega => "Mega",
            BoardKind::Due => "Due",
        }
    }

    /// The full profile for this preset.
    pub fn profile(self) -> BoardProfile {
        BoardProfile::get(self)
    }
}

impl fmt::Display for BoardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BoardKind {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_name(s))
    }
}

/// Communication parameters of a board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardProfile {
    pub name: String,
    pub baud_rate: u32,
}

impl BoardProfile {
    /// A fresh copy of the preset for `kind`.
    pub fn get(kind: BoardKind) -> Self {
        let baud_rate = match kind {
            BoardKind::Uno | BoardKind::Mega | BoardKind::Due => 115_200,
        };
        Self {
            name: kind.name().to_string(),
            baud_rate,
        }
    }

    pub fn uno() -> Self {
        Self::get(BoardKind::Uno)
    }

    pub fn mega() -> Self {
        Self::get(BoardKind::Mega)
    }

    pub fn due() -> Self {
        Self::get(BoardKind::Due)
    }
}

impl Default for BoardProfile {
    fn default() -> Self {
        Self::get(BoardKind::default())
    }
}
