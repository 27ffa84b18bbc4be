//! Value types shared by every Geoduel layer.
//!
//! Identity newtypes follow one rule: they serialize as their bare inner
//! value (`#[serde(transparent)]`), so `PlayerId("p-1")` is `"p-1"` on
//! the wire and `SessionId(7)` is `7`.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Stable, externally supplied player identity.
///
/// Unlike a [`ConnectionId`](geoduel_transport::ConnectionId), a player id
/// survives reconnects: the same player may rejoin under a new handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Externally supplied spectator identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpectatorId(pub String);

impl fmt::Display for SpectatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of one battle session.
///
/// Allocated from a process-wide monotonic counter, so ids order by
/// creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Team
// ---------------------------------------------------------------------------

/// One of the two opposing sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Team {
    A,
    B,
}

impl Team {
    /// The team this one duels against.
    pub fn opponent(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

/// A reported position in degrees.
///
/// Ranges are not validated here; the distance function accepts any
/// finite input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    /// Client-side capture time in Unix milliseconds, when the client
    /// supplies one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Question
// ---------------------------------------------------------------------------

/// One labeled answer option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub label: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

/// A trivia question as supplied by the question source.
///
/// Immutable once fetched. The correct label never leaves the server
/// before a session ends; clients get a [`PublicQuestion`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub prompt: String,
    pub choices: Vec<Choice>,
    pub correct_label: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub difficulty: Difficulty,
}

impl Question {
    /// The built-in question used when no question source is reachable.
    pub fn sample() -> Self {
        let choice = |label: &str, text: &str| Choice {
            label: label.to_string(),
            text: text.to_string(),
        };
        Self {
            prompt: "Which planet is known as the Red Planet?".to_string(),
            choices: vec![
                choice("a", "Mars"),
                choice("b", "Venus"),
                choice("c", "Jupiter"),
                choice("d", "Mercury"),
            ],
            correct_label: "a".to_string(),
            category: "science".to_string(),
            difficulty: Difficulty::Easy,
        }
    }

    /// Whether `label` names the correct choice. Case and surrounding
    /// whitespace are ignored.
    pub fn is_correct(&self, label: &str) -> bool {
        label.trim().eq_ignore_ascii_case(self.correct_label.trim())
    }

    /// The choice label `label` refers to, ignoring case and surrounding
    /// whitespace. Labels naming no choice are lowercased.
    pub fn canonical_label(&self, label: &str) -> String {
        let label = label.trim();
        self.choices
            .iter()
            .find(|c| c.label.trim().eq_ignore_ascii_case(label))
            .map(|c| c.label.trim().to_string())
            .unwrap_or_else(|| label.to_ascii_lowercase())
    }

    /// The question without its answer.
    pub fn public(&self) -> PublicQuestion {
        PublicQuestion {
            prompt: self.prompt.clone(),
            choices: self.choices.clone(),
            category: self.category.clone(),
            difficulty: self.difficulty,
        }
    }
}

/// What participants see while a session is running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    pub prompt: String,
    pub choices: Vec<Choice>,
    pub category: String,
    pub difficulty: Difficulty,
}

/// Current wall-clock time in Unix milliseconds.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&PlayerId::new("p-42")).unwrap();
        assert_eq!(json, "\"p-42\"");
    }

    #[test]
    fn test_session_id_serializes_as_plain_number_and_displays_prefixed() {
        assert_eq!(serde_json::to_string(&SessionId(9)).unwrap(), "9");
        assert_eq!(SessionId(9).to_string(), "B-9");
    }

    #[test]
    fn test_team_opponent_is_involution() {
        assert_eq!(Team::A.opponent(), Team::B);
        assert_eq!(Team::B.opponent(), Team::A);
        assert_eq!(Team::A.opponent().opponent(), Team::A);
    }

    #[test]
    fn test_location_uses_camel_case_and_optional_timestamp() {
        let loc: Location =
            serde_json::from_str(r#"{"latitude": 1.5, "longitude": -2.25}"#).unwrap();
        assert_eq!(loc, Location::new(1.5, -2.25));

        let json = serde_json::to_value(Location {
            timestamp: Some(77),
            ..Location::new(0.0, 0.0)
        })
        .unwrap();
        assert_eq!(json["timestamp"], 77);
    }

    #[test]
    fn test_question_is_correct_ignores_case_and_whitespace() {
        let q = Question::sample();
        assert!(q.is_correct("a"));
        assert!(q.is_correct(" A "));
        assert!(!q.is_correct("b"));
        assert!(!q.is_correct(""));
    }

    #[test]
    fn test_question_canonical_label_maps_to_choice_label() {
        let q = Question::sample();
        assert_eq!(q.canonical_label(" A "), "a");
        assert_eq!(q.canonical_label("d"), "d");
        assert_eq!(q.canonical_label("Z"), "z");
    }

    #[test]
    fn test_question_public_view_omits_correct_label() {
        let json = serde_json::to_value(Question::sample().public()).unwrap();
        assert!(json.get("correctLabel").is_none());
        assert_eq!(json["choices"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_question_sample_has_four_choices_including_correct() {
        let q = Question::sample();
        assert_eq!(q.choices.len(), 4);
        assert!(q.choices.iter().any(|c| q.is_correct(&c.label)));
    }

    #[test]
    fn test_question_deserializes_with_default_category_and_difficulty() {
        let q: Question = serde_json::from_str(
            r#"{"prompt":"2+2?","choices":[{"label":"a","text":"4"}],"correctLabel":"a"}"#,
        )
        .unwrap();
        assert_eq!(q.category, "");
        assert_eq!(q.difficulty, Difficulty::Medium);
    }
}
