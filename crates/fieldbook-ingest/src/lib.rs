//! Fieldbook Ingest - turns untrusted uploads into stored entries
//!
//! [`IngestPipeline`] runs each upload through a fixed sequence of gates
//! (shape, project state, permission, version, relationships, answers,
//! quota) and then commits the row together with its counter updates.

pub mod answers;
pub mod config;
pub mod context;
pub mod counters;
pub mod error;
pub mod limits;
pub mod pipeline;
pub mod uniqueness;

pub use config::IngestConfig;
pub use context::UploadContext;
pub use error::Rejection;
pub use limits::EntriesLimitChecker;
pub use pipeline::{IngestPipeline, UploadCode, UploadOutcome};
pub use uniqueness::UniquenessChecker;
