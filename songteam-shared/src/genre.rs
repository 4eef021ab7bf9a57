/// Musical genres a team can pick for a song
///
/// Genres are stored as their lowercase wire value (`"hype_announcer"`) in
/// the `songs.genre` column and sent verbatim to the generation engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported song genres
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Genre {
    Rap,
    Country,
    Pop,
    Rock,
    Edm,
    Anthem,
    Cinematic,
    Lofi,
    HypeAnnouncer,
    Jazz,
}

/// Error returned when parsing an unknown genre
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown genre: {0}")]
pub struct UnknownGenre(pub String);

impl Genre {
    /// Every genre, in display order
    pub const ALL: [Genre; 10] = [
        Genre::Rap,
        Genre::Country,
        Genre::Pop,
        Genre::Rock,
        Genre::Edm,
        Genre::Anthem,
        Genre::Cinematic,
        Genre::Lofi,
        Genre::HypeAnnouncer,
        Genre::Jazz,
    ];

    /// Wire and storage value
    pub fn as_str(&self) -> &'static str {
        match self {
            Genre::Rap => "rap",
            Genre::Country => "country",
            Genre::Pop => "pop",
            Genre::Rock => "rock",
            Genre::Edm => "edm",
            Genre::Anthem => "anthem",
            Genre::Cinematic => "cinematic",
            Genre::Lofi => "lofi",
            Genre::HypeAnnouncer => "hype_announcer",
            Genre::Jazz => "jazz",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Genre::Rap => "Rap",
            Genre::Country => "Country",
            Genre::Pop => "Pop",
            Genre::Rock => "Rock",
            Genre::Edm => "EDM",
            Genre::Anthem => "Anthem",
            Genre::Cinematic => "Cinematic",
            Genre::Lofi => "Lo-Fi",
            Genre::HypeAnnouncer => "Hype Announcer",
            Genre::Jazz => "Jazz",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Genre::Rap => "🎤",
            Genre::Country => "🤠",
            Genre::Pop => "🎵",
            Genre::Rock => "🎸",
            Genre::Edm => "🎧",
            Genre::Anthem => "🏆",
            Genre::Cinematic => "🎬",
            Genre::Lofi => "🌙",
            Genre::HypeAnnouncer => "📣",
            Genre::Jazz => "🎺",
        }
    }

    /// Title used when the requester doesn't supply one
    pub fn default_title(&self) -> String {
        format!("{} Song", self.label())
    }
}

impl fmt::Display for Genre {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Genre {
    type Err = UnknownGenre;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Genre::ALL
            .iter()
            .copied()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| UnknownGenre(s.to_string()))
    }
}

/// Lets the `songs.genre` TEXT column decode straight into a `Genre`
impl TryFrom<String> for Genre {
    type Error = UnknownGenre;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
