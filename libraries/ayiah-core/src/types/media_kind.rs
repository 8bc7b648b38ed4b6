//! Media kinds a library folder can hold

use crate::error::AyiahError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The fixed kind of a library folder and of every item it owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx-support",
    sqlx(type_name = "TEXT", rename_all = "lowercase")
)]
pub enum MediaKind {
    Movie,
    Tv,
    Comic,
    Book,
}

impl MediaKind {
    /// All kinds, in declaration order
    pub const ALL: [MediaKind; 4] = [Self::Movie, Self::Tv, Self::Comic, Self::Book];

    /// Convert to string for database storage
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Tv => "tv",
            Self::Comic => "comic",
            Self::Book => "book",
        }
    }

    /// Movies and TV share the video extraction strategy
    #[must_use]
    pub fn is_video(&self) -> bool {
        matches!(self, Self::Movie | Self::Tv)
    }
}

impl FromStr for MediaKind {
    type Err = AyiahError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "movie" => Ok(Self::Movie),
            "tv" => Ok(Self::Tv),
            "comic" => Ok(Self::Comic),
            "book" => Ok(Self::Book),
            other => Err(AyiahError::invalid_input(format!(
                "unknown media kind '{other}'"
            ))),
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
