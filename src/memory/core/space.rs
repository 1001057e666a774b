//! Named vector spaces stored per memory record.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An independently queryable embedding dimension.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorSpace {
    /// What was said.
    Content,
    /// Emotional tone of what was said.
    Emotion,
    /// Paraphrase-level meaning.
    Semantic,
}

impl VectorSpace {
    /// Every space, in the fixed order used for diagnostics.
    pub const ALL: [Self; 3] = [Self::Content, Self::Emotion, Self::Semantic];

    /// Stable name used in storage and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Emotion => "emotion",
            Self::Semantic => "semantic",
        }
    }

    /// Position inside [`VectorSpace::ALL`] and weight arrays.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Content => 0,
            Self::Emotion => 1,
            Self::Semantic => 2,
        }
    }
}

impl fmt::Display for VectorSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
