//! Query understanding: cue lexicon, classifier and temporal override.

pub mod classifier;
pub mod lexicon;
pub mod temporal;

pub use classifier::{QueryCategory, QueryClassification, QueryClassifier};
pub use lexicon::{AxisScores, ClassifierLexicon, CompiledLexicon, CueRule, QueryAxis, TemporalPatterns};
pub use temporal::{TemporalIntent, TemporalQueryDetector};
