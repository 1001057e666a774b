//! Cue lexicon driving query classification and the temporal override.
//!
//! The lexicon is configuration: serde-loadable from JSON, compiled once, then
//! shared read-only behind an `Arc`. Tests inject their own tables the same way.

use std::fmt;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::memory::core::errors::{MemoryError, MemoryResult};

/// Classification axis.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryAxis {
    /// Factual "what was said" retrieval.
    Content,
    /// Feelings and affect.
    Emotional,
    /// Abstract meaning, motives, values.
    Semantic,
    /// Time references.
    Temporal,
}

impl QueryAxis {
    /// Every axis in scoring order.
    pub const ALL: [Self; 4] = [Self::Content, Self::Emotional, Self::Semantic, Self::Temporal];

    /// Stable name for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Emotional => "emotional",
            Self::Semantic => "semantic",
            Self::Temporal => "temporal",
        }
    }
}

impl fmt::Display for QueryAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-axis confidences in `[0, 1]`; they need not sum to 1.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AxisScores {
    /// Content axis.
    pub content: f32,
    /// Emotional axis.
    pub emotional: f32,
    /// Semantic axis.
    pub semantic: f32,
    /// Temporal axis.
    pub temporal: f32,
}

impl AxisScores {
    /// Score for one axis.
    #[must_use]
    pub const fn get(&self, axis: QueryAxis) -> f32 {
        match axis {
            QueryAxis::Content => self.content,
            QueryAxis::Emotional => self.emotional,
            QueryAxis::Semantic => self.semantic,
            QueryAxis::Temporal => self.temporal,
        }
    }

    fn slot(&mut self, axis: QueryAxis) -> &mut f32 {
        match axis {
            QueryAxis::Content => &mut self.content,
            QueryAxis::Emotional => &mut self.emotional,
            QueryAxis::Semantic => &mut self.semantic,
            QueryAxis::Temporal => &mut self.temporal,
        }
    }

    /// Add to one axis, saturating at 1.0.
    pub fn add(&mut self, axis: QueryAxis, amount: f32) {
        let slot = self.slot(axis);
        *slot = (*slot + amount.max(0.0)).min(1.0);
    }
}

/// One weighted cue.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CueRule {
    /// Regex, matched case-insensitively.
    pub pattern: String,
    /// Confidence added when the pattern matches (once per rule).
    pub weight: f32,
}

impl CueRule {
    fn new(pattern: &str, weight: f32) -> Self {
        Self {
            pattern: pattern.to_string(),
            weight,
        }
    }
}

/// Phrases recognised by the temporal override.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemporalPatterns {
    /// Oldest-first recall constructions ("the first time", "say ... first").
    pub ascending: String,
    /// Newest-first recall constructions ("the last time", "before that").
    pub descending: String,
    /// Conversational recall cues; an ordinal without one is not temporal intent.
    pub recall_context: String,
    /// Topic markers; the filter is the text after the last one.
    pub content_filter: String,
}

impl Default for TemporalPatterns {
    fn default() -> Self {
        Self {
            ascending: r"\b((the )?(first|earliest) (time|thing|message|question|conversation)|(first|initially|originally) (i|we|you) (said|told|mentioned|talked|asked|discussed|shared)|(say|said|tell|told|mention(ed)?|talk(ed)?|ask(ed)?|discuss(ed)?)\b(\W+\w+){0,2}?\W+(first|initially|originally)|at the (start|beginning) of (our|the|this) (conversation|chat)|in the beginning)\b"
                .to_string(),
            descending: r"\b((the )?(last|latest|most recent|previous) (time|thing|message|question|conversation)|before that|(most recently|previously) (i|we|you) (said|told|mentioned|talked|asked|discussed|shared)|(say|said|tell|told|mention(ed)?|talk(ed)?|ask(ed)?|discuss(ed)?)\b(\W+\w+){0,2}?\W+(last|most recently|previously))\b"
                .to_string(),
            recall_context: r"\b(say|said|tell|told|talk(ed|ing)?|mention(ed)?|ask(ed)?|spoke|discuss(ed)?|chat(ted)?|share(d)?|time|thing|message|question|conversation|before that)\b"
                .to_string(),
            content_filter: r"\b(about|regarding|mentioned|mentioning)\b".to_string(),
        }
    }
}

/// Serializable cue table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierLexicon {
    /// Factual retrieval cues.
    pub content: Vec<CueRule>,
    /// Feeling verbs and affect vocabulary.
    pub emotional: Vec<CueRule>,
    /// Abstract or conceptual phrasing.
    pub semantic: Vec<CueRule>,
    /// Soft time references (the hard override lives in `temporal_override`).
    pub temporal: Vec<CueRule>,
    /// Temporal override phrases.
    pub temporal_override: TemporalPatterns,
}

impl Default for ClassifierLexicon {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ClassifierLexicon {
    /// Built-in English cue table.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            content: vec![
                CueRule::new(
                    r"\b(what did (i|we|you) (say|tell|mention|eat|do|buy|order)|told you about|who (is|was)|where (is|was|did|do)|name of|how many|what time|address|phone number|favou?rite)\b",
                    0.4,
                ),
                CueRule::new(r"\b(likes?|liked|prefer(s|red)?|ate|eat|live[sd]?|bought|own(s|ed)?)\b", 0.2),
            ],
            emotional: vec![
                CueRule::new(
                    r"\b(anxious|anxiety|nervous|scared|afraid|fear(ful)?|worr(y|ied|ies)|stress(ed|ful)?|sad(ness)?|depressed|lonely|angry|anger|furious|upset|happy|happiness|joy(ful)?|excited|grateful|ashamed|guilty|jealous|hurt|heartbroken|overwhelmed|frustrat\w*|calm|relieved|proud|love[sd]?|hate[sd]?|cry|cried)\b",
                    0.6,
                ),
                CueRule::new(
                    r"\b(feel|feels|felt|feeling|feelings|emotion(s|al|ally)?|mood|made me (cry|smile|laugh))\b",
                    0.4,
                ),
            ],
            semantic: vec![
                CueRule::new(
                    r"\b(motivat\w*|means? to (me|you)|meaning|why do (i|you)|what drives|values?|purpose|believe|beliefs?|philosoph\w*|principles?|what kind of (person|people)|deep down|in general|concept|essence)\b",
                    0.5,
                ),
                CueRule::new(r"\bwhat does .+ mean\b", 0.4),
                CueRule::new(r"\b(relationship between|perspective|opinion|think about|outlook)\b", 0.3),
            ],
            temporal: vec![CueRule::new(
                r"\b(yesterday|today|tonight|last (week|month|night|year)|recently|earlier|ago|the other day|this (morning|week)|when did)\b",
                0.4,
            )],
            temporal_override: TemporalPatterns::default(),
        }
    }

    /// Parse a JSON lexicon; missing sections fall back to the built-in table.
    ///
    /// # Errors
    /// Returns an error if the JSON is malformed.
    pub fn from_json_str(raw: &str) -> MemoryResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Read a JSON lexicon from disk.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> MemoryResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Compile every pattern.
    ///
    /// # Errors
    /// Returns an error if a pattern is invalid or a weight is outside `[0, 1]`.
    pub fn compile(&self) -> MemoryResult<CompiledLexicon> {
        let mut cues = Vec::new();
        for (axis, rules) in [
            (QueryAxis::Content, &self.content),
            (QueryAxis::Emotional, &self.emotional),
            (QueryAxis::Semantic, &self.semantic),
            (QueryAxis::Temporal, &self.temporal),
        ] {
            for rule in rules {
                if !(rule.weight.is_finite() && (0.0..=1.0).contains(&rule.weight)) {
                    return Err(MemoryError::InvalidConfig(format!(
                        "{axis} cue weight must be in 0..=1, got {}",
                        rule.weight
                    )));
                }
                cues.push(CompiledCue {
                    axis,
                    pattern: case_insensitive(&rule.pattern)?,
                    weight: rule.weight,
                });
            }
        }

        let temporal = &self.temporal_override;
        Ok(CompiledLexicon {
            cues,
            ascending: case_insensitive(&temporal.ascending)?,
            descending: case_insensitive(&temporal.descending)?,
            recall_context: case_insensitive(&temporal.recall_context)?,
            content_filter: case_insensitive(&temporal.content_filter)?,
        })
    }
}

fn case_insensitive(pattern: &str) -> MemoryResult<Regex> {
    Ok(Regex::new(&format!("(?i){pattern}"))?)
}

struct CompiledCue {
    axis: QueryAxis,
    pattern: Regex,
    weight: f32,
}

/// Compiled, immutable lexicon.
pub struct CompiledLexicon {
    cues: Vec<CompiledCue>,
    pub(crate) ascending: Regex,
    pub(crate) descending: Regex,
    pub(crate) recall_context: Regex,
    pub(crate) content_filter: Regex,
}

impl CompiledLexicon {
    /// Compile the built-in table.
    ///
    /// # Errors
    /// Returns an error only if the built-in patterns fail to compile.
    pub fn builtin() -> MemoryResult<Self> {
        ClassifierLexicon::builtin().compile()
    }

    /// Raw cue scores for `text` (no residual, no context).
    #[must_use]
    pub fn score(&self, text: &str) -> AxisScores {
        let mut scores = AxisScores::default();
        for cue in &self.cues {
            if cue.pattern.is_match(text) {
                scores.add(cue.axis, cue.weight);
            }
        }
        scores
    }
}

impl fmt::Debug for CompiledLexicon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledLexicon")
            .field("cues", &self.cues.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_compiles() {
        CompiledLexicon::builtin().unwrap();
    }

    #[test]
    fn test_affect_word_scores_emotional() {
        let lexicon = CompiledLexicon::builtin().unwrap();
        let scores = lexicon.score("What makes me anxious?");
        assert!((scores.emotional - 0.6).abs() < 1e-6);
        assert!(scores.semantic.abs() < f32::EPSILON);
        assert!(scores.content.abs() < f32::EPSILON);
    }

    #[test]
    fn test_scores_saturate() {
        let lexicon = CompiledLexicon::builtin().unwrap();
        let scores = lexicon.score("I feel so anxious and sad");
        assert!((scores.emotional - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_json_lexicon_overrides_sections() {
        let lexicon = ClassifierLexicon::from_json_str(
            r#"{ "emotional": [ { "pattern": "\\bblorp\\b", "weight": 0.9 } ] }"#,
        )
        .unwrap();
        assert_eq!(lexicon.emotional.len(), 1);
        assert_eq!(lexicon.semantic, ClassifierLexicon::builtin().semantic);
        let compiled = lexicon.compile().unwrap();
        assert!((compiled.score("so blorp today").emotional - 0.9).abs() < 1e-6);
        assert!(compiled.score("anxious").emotional.abs() < f32::EPSILON);
    }

    #[test]
    fn test_compile_rejects_bad_weight_and_pattern() {
        let mut lexicon = ClassifierLexicon::builtin();
        lexicon.content.push(CueRule::new("x", 2.0));
        assert!(matches!(lexicon.compile(), Err(MemoryError::InvalidConfig(_))));

        let mut lexicon = ClassifierLexicon::builtin();
        lexicon.semantic.push(CueRule::new("(unclosed", 0.1));
        assert!(matches!(lexicon.compile(), Err(MemoryError::Regex(_))));
    }
}
