//! Respondent storage and retrieval for the quota engine.
//!
//! This crate handles:
//! - Per-subset respondent repositories tagged by quota cell
//! - An owned per-subset repository source
//! - Inclusive time-window retrieval grouped by quota cell

pub mod accessor;
pub mod repository;
pub mod source;

pub use accessor::{CellResponseGroup, CellResponses, CellSampleSize, ProfileResponseAccessor};
pub use repository::RespondentRepository;
pub use source::RespondentRepositorySource;
