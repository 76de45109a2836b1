// Mood labels - the fixed vocabulary shared by the classifier, the smoother
// and the music catalog

pub mod smoother; // majority-vote window over raw labels

pub use smoother::MoodSmoother;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoodError {
    #[error("'{0}' is not a valid mood (expected one of: neutral, sad, happy, angry, disgust, fear, surprise)")]
    Invalid(String),
}

// Goes through strings so moods can key TOML tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Mood {
    Neutral,
    Sad,
    Happy,
    Angry,
    Disgust,
    Fear,
    Surprise,
}

impl Mood {
    pub const COUNT: usize = 7;

    pub const ALL: [Mood; Mood::COUNT] = [
        Mood::Neutral,
        Mood::Sad,
        Mood::Happy,
        Mood::Angry,
        Mood::Disgust,
        Mood::Fear,
        Mood::Surprise,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Mood::Neutral => "neutral",
            Mood::Sad => "sad",
            Mood::Happy => "happy",
            Mood::Angry => "angry",
            Mood::Disgust => "disgust",
            Mood::Fear => "fear",
            Mood::Surprise => "surprise",
        }
    }

    /// Dense index into per-mood tables, matches the order of [`Mood::ALL`].
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl FromStr for Mood {
    type Err = MoodError;

    // Classifiers are sloppy about case, so normalize before matching
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "neutral" => Ok(Mood::Neutral),
            "sad" => Ok(Mood::Sad),
            "happy" => Ok(Mood::Happy),
            "angry" => Ok(Mood::Angry),
            "disgust" => Ok(Mood::Disgust),
            "fear" => Ok(Mood::Fear),
            "surprise" => Ok(Mood::Surprise),
            _ => Err(MoodError::Invalid(s.to_string())),
        }
    }
}

impl TryFrom<String> for Mood {
    type Error = MoodError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Mood> for String {
    fn from(mood: Mood) -> Self {
        mood.as_str().to_string()
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
