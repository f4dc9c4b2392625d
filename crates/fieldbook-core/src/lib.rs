//! Fieldbook Core - project definitions and entry model
//!
//! This crate provides the project definition types, the recursive
//! definition validator that compiles a [`ProjectExtra`] index, the
//! per-type answer rules and the request-scoped [`EntryStructure`] used
//! by the ingestion pipeline.

pub mod codes;
pub mod definition;
pub mod entry;
pub mod error;
pub mod extra;
pub mod limits;
pub mod payload;
pub mod project;
pub mod rules;
pub mod validate;

pub use codes::{CodedError, ErrorCode, ErrorKind};
pub use definition::{
    Form, Input, InputType, Jump, JumpCondition, PossibleAnswer, ProjectDefinition, Uniqueness,
    JUMP_END,
};
pub use entry::{AnswerValue, BranchEntry, Entry, EntryStructure, EntryType, FileDetails};
pub use error::{Error, Result};
pub use extra::{FormExtra, InputExtra, ProjectExtra};
pub use limits::ProjectLimits;
pub use payload::{EntryStructureBuilder, Requester, UploadData};
pub use project::{Project, ProjectAccess, ProjectId, ProjectRole, ProjectStatus};
pub use rules::{rule_for, InputRule};
pub use validate::{DefinitionErrors, DefinitionValidator};
