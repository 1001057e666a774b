//! Recall engine orchestration module.

pub mod core;

pub use core::{RecallBackends, RetrievalEngine};
