use serde::{Deserialize, Serialize};

/// Author of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Written by the person reporting expenses
    Human,
    /// Written by the model (or by the agent on its behalf)
    Ai,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Human => write!(f, "human"),
            Self::Ai => write!(f, "ai"),
        }
    }
}

/// One message in a transcript
///
/// Serialized as `{"type": "human", "content": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Who produced the turn
    #[serde(rename = "type")]
    pub role: Role,
    /// Plain text of the turn
    pub content: String,
}

impl Turn {
    /// Creates a human-authored turn
    ///
    /// # Examples
    ///
    /// ```
    /// use finbot::memory::{Role, Turn};
    ///
    /// let turn = Turn::human("Taxi 15 soles");
    /// assert_eq!(turn.role, Role::Human);
    /// ```
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            content: content.into(),
        }
    }

    /// Creates a model-authored turn
    pub fn ai(content: impl Into<String>) -> Self {
        Self {
            role: Role::Ai,
            content: content.into(),
        }
    }
}

/// Append-only, ordered turn history of one sender
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript(Vec<Turn>);

impl Transcript {
    /// Append a turn at the end
    pub fn push(&mut self, turn: Turn) {
        self.0.push(turn);
    }

    /// All turns, oldest first
    pub fn turns(&self) -> &[Turn] {
        &self.0
    }

    /// Iterate over turns, oldest first
    pub fn iter(&self) -> std::slice::Iter<'_, Turn> {
        self.0.iter()
    }

    /// Most recent turn
    pub fn last(&self) -> Option<&Turn> {
        self.0.last()
    }

    /// Number of turns
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no turn has been recorded
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
