//! Machine-readable error codes shared by definition validation and ingestion
//!
//! Clients only ever see these codes (never raw error text), so they can
//! localize messages themselves.

use serde::{Deserialize, Serialize};

/// Broad class of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Project definition rejected at authoring time
    Definition,
    /// Malformed upload payload
    Schema,
    /// Requester may not upload to this project
    Permission,
    /// Payload is well formed but conflicts with stored state
    StateConflict,
    /// Answer failed a type rule or a required check
    AnswerInvalid,
    UniquenessViolation,
    QuotaExceeded,
    /// Transaction or insert failure
    StorageFailure,
}

/// Every code a client can receive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // ─────────────────────────────────────────────────────────────────────────
    // Project definition
    // ─────────────────────────────────────────────────────────────────────────
    NoForms,
    TooManyForms,
    FormRefInvalid,
    FormRefDuplicate,
    FormNameMissing,
    FormNameTooLong,
    FormNameDuplicate,
    FormParentInvalid,
    NoInputs,
    TooManyInputs,
    InputRefInvalid,
    InputRefDuplicate,
    InputNotAllowedHere,
    QuestionMissing,
    QuestionTooLong,
    PossibleAnswersMissing,
    TooManyPossibleAnswers,
    AnswerRefInvalid,
    AnswerRefDuplicate,
    PossibleAnswerTextInvalid,
    DatetimeFormatInvalid,
    NumericRangeInvalid,
    DefaultInvalid,
    DefaultOutOfRange,
    TitleNotAllowed,
    TooManyTitles,
    TooManySearchInputs,
    UniquenessNotAllowed,
    HierarchyUniquenessInBranch,
    BranchEmpty,
    GroupEmpty,
    JumpsNotAllowed,
    JumpMissingFields,
    JumpConditionInvalid,
    JumpConditionNotAllowed,
    JumpAnswerRefInvalid,
    JumpTargetInvalid,
    JumpPositionInvalid,
    EntriesLimitInvalid,

    // ─────────────────────────────────────────────────────────────────────────
    // Upload shape
    // ─────────────────────────────────────────────────────────────────────────
    PayloadInvalid,
    UuidInvalid,
    CreatedAtInvalid,

    // ─────────────────────────────────────────────────────────────────────────
    // Project state and permissions
    // ─────────────────────────────────────────────────────────────────────────
    ProjectNotFound,
    ProjectInactive,
    UploadForbidden,
    ProjectVersionMismatch,

    // ─────────────────────────────────────────────────────────────────────────
    // Relationships
    // ─────────────────────────────────────────────────────────────────────────
    FormNotFound,
    ParentFormMismatch,
    ParentEntryNotFound,
    ParentUuidMismatch,
    BranchInputNotFound,
    OwnerEntryNotFound,
    OwnerUuidMismatch,
    EntryTypeMismatch,
    FileEntryNotFound,
    FileInputInvalid,

    // ─────────────────────────────────────────────────────────────────────────
    // Answers
    // ─────────────────────────────────────────────────────────────────────────
    AnswerMissing,
    AnswerRequired,
    AnswerTypeInvalid,
    AnswerTooLong,
    AnswerHtmlNotAllowed,
    AnswerNotNumeric,
    AnswerOutOfRange,
    AnswerNotInPossibleAnswers,
    AnswerDatetimeInvalid,
    AnswerLocationInvalid,
    AnswerFileNameInvalid,
    AnswerPhoneInvalid,
    AnswerNotUnique,

    // ─────────────────────────────────────────────────────────────────────────
    // Quota and storage
    // ─────────────────────────────────────────────────────────────────────────
    EntriesLimitReached,
    StorageFailure,
}

impl ErrorCode {
    pub fn kind(self) -> ErrorKind {
        use ErrorCode::*;
        match self {
            NoForms
            | TooManyForms
            | FormRefInvalid
            | FormRefDuplicate
            | FormNameMissing
            | FormNameTooLong
            | FormNameDuplicate
            | FormParentInvalid
            | NoInputs
            | TooManyInputs
            | InputRefInvalid
            | InputRefDuplicate
            | InputNotAllowedHere
            | QuestionMissing
            | QuestionTooLong
            | PossibleAnswersMissing
            | TooManyPossibleAnswers
            | AnswerRefInvalid
            | AnswerRefDuplicate
            | PossibleAnswerTextInvalid
            | DatetimeFormatInvalid
            | NumericRangeInvalid
            | DefaultInvalid
            | DefaultOutOfRange
            | TitleNotAllowed
            | TooManyTitles
            | TooManySearchInputs
            | UniquenessNotAllowed
            | HierarchyUniquenessInBranch
            | BranchEmpty
            | GroupEmpty
            | JumpsNotAllowed
            | JumpMissingFields
            | JumpConditionInvalid
            | JumpConditionNotAllowed
            | JumpAnswerRefInvalid
            | JumpTargetInvalid
            | JumpPositionInvalid
            | EntriesLimitInvalid => ErrorKind::Definition,

            PayloadInvalid | UuidInvalid | CreatedAtInvalid => ErrorKind::Schema,

            UploadForbidden => ErrorKind::Permission,

            ProjectNotFound
            | ProjectInactive
            | ProjectVersionMismatch
            | FormNotFound
            | ParentFormMismatch
            | ParentEntryNotFound
            | ParentUuidMismatch
            | BranchInputNotFound
            | OwnerEntryNotFound
            | OwnerUuidMismatch
            | EntryTypeMismatch
            | FileEntryNotFound
            | FileInputInvalid => ErrorKind::StateConflict,

            AnswerMissing
            | AnswerRequired
            | AnswerTypeInvalid
            | AnswerTooLong
            | AnswerHtmlNotAllowed
            | AnswerNotNumeric
            | AnswerOutOfRange
            | AnswerNotInPossibleAnswers
            | AnswerDatetimeInvalid
            | AnswerLocationInvalid
            | AnswerFileNameInvalid
            | AnswerPhoneInvalid => ErrorKind::AnswerInvalid,

            AnswerNotUnique => ErrorKind::UniquenessViolation,
            EntriesLimitReached => ErrorKind::QuotaExceeded,
            StorageFailure => ErrorKind::StorageFailure,
        }
    }

    /// The wire form of the code
    pub fn as_str(self) -> String {
        // serde renders unit variants as plain strings
        match serde_json::to_value(self) {
            Ok(serde_json::Value::String(s)) => s,
            _ => format!("{:?}", self),
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A `{source, code}` pair
///
/// `source` names what failed: usually an input or form ref, otherwise a
/// pipeline stage such as `"upload"` or `"project"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodedError {
    pub source: String,
    pub code: ErrorCode,
}

impl CodedError {
    pub fn new(source: impl Into<String>, code: ErrorCode) -> Self {
        Self {
            source: source.into(),
            code,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }
}

impl std::fmt::Display for CodedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.source, self.code)
    }
}

impl std::error::Error for CodedError {}
