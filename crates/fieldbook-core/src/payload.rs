//! Upload payload shapes and the [`EntryStructureBuilder`]
//!
//! `UploadData` mirrors the wire format one to one. Shape checks live here
//! too (`check_shape`), everything that needs the project or the store lives
//! in the ingestion pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::codes::{CodedError, ErrorCode};
use crate::definition::InputType;
use crate::entry::{AnswerValue, EntryStructure, EntryType, FileDetails};
use crate::project::ProjectId;
use crate::rules::datetime::parse_timestamp;

/// Source used for shape errors that are not tied to an input
pub const UPLOAD_SOURCE: &str = "upload";

/// Body of an `entry` or `branch_entry` upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryBody {
    pub entry_uuid: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub project_version: String,
    #[serde(default)]
    pub answers: BTreeMap<String, AnswerValue>,

    /// Single answer of a pre-submission uniqueness check
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<UniqueAnswer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniqueAnswer {
    pub input_ref: String,
    #[serde(default)]
    pub answer: Value,
}

/// Body of a `file_entry` upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntryBody {
    pub entry_uuid: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub project_version: String,
    pub name: String,
    #[serde(rename = "type")]
    pub file_type: InputType,
    pub input_ref: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormAttribute {
    #[serde(rename = "ref")]
    pub form_ref: String,
    #[serde(rename = "type", default)]
    pub form_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    pub form: FormAttribute,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentLink {
    #[serde(default)]
    pub parent_form_ref: String,
    #[serde(default)]
    pub parent_entry_uuid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchLink {
    #[serde(default)]
    pub owner_input_ref: String,
    #[serde(default)]
    pub owner_entry_uuid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipData<T> {
    #[serde(default)]
    pub data: Option<T>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationships {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<RelationshipData<ParentLink>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<RelationshipData<BranchLink>>,
}

/// One upload as received
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadData {
    pub id: String,

    #[serde(rename = "type")]
    pub entry_type: EntryType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<EntryBody>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_entry: Option<EntryBody>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_entry: Option<FileEntryBody>,

    pub attributes: Attributes,

    #[serde(default)]
    pub relationships: Relationships,
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn shape_error(code: ErrorCode) -> CodedError {
    CodedError::new(UPLOAD_SOURCE, code)
}

/// Parse a client `created_at`; offsets are converted to UTC
pub fn parse_created_at(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw.trim()) {
        return Some(dt.with_timezone(&Utc));
    }
    parse_timestamp(raw).map(|naive| naive.and_utc())
}

impl UploadData {
    pub fn from_value(value: Value) -> Result<Self, CodedError> {
        serde_json::from_value(value).map_err(|e| {
            tracing::debug!(error = %e, "upload payload rejected");
            shape_error(ErrorCode::PayloadInvalid)
        })
    }

    /// `(entry_uuid, created_at, project_version)` of the body matching `type`
    pub fn header(&self) -> Option<(&str, &str, &str)> {
        match self.entry_type {
            EntryType::Entry => self
                .entry
                .as_ref()
                .map(|b| (b.entry_uuid.as_str(), b.created_at.as_str(), b.project_version.as_str())),
            EntryType::BranchEntry => self
                .branch_entry
                .as_ref()
                .map(|b| (b.entry_uuid.as_str(), b.created_at.as_str(), b.project_version.as_str())),
            EntryType::FileEntry => self
                .file_entry
                .as_ref()
                .map(|b| (b.entry_uuid.as_str(), b.created_at.as_str(), b.project_version.as_str())),
        }
    }

    fn body(&self) -> Option<&EntryBody> {
        match self.entry_type {
            EntryType::Entry => self.entry.as_ref(),
            EntryType::BranchEntry => self.branch_entry.as_ref(),
            EntryType::FileEntry => None,
        }
    }

    pub fn form_ref(&self) -> &str {
        self.attributes.form.form_ref.trim()
    }

    /// Parent link, ignoring empty strings
    pub fn parent_link(&self) -> Option<&ParentLink> {
        self.relationships
            .parent
            .as_ref()
            .and_then(|r| r.data.as_ref())
            .filter(|l| !l.parent_form_ref.trim().is_empty() || !l.parent_entry_uuid.trim().is_empty())
    }

    /// Branch owner link, ignoring empty strings
    pub fn branch_link(&self) -> Option<&BranchLink> {
        self.relationships
            .branch
            .as_ref()
            .and_then(|r| r.data.as_ref())
            .filter(|l| !l.owner_input_ref.trim().is_empty() || !l.owner_entry_uuid.trim().is_empty())
    }

    /// The `{input_ref, answer}` pair of a uniqueness check payload
    pub fn unique_answer(&self) -> Option<&UniqueAnswer> {
        self.body().and_then(|b| b.answer.as_ref())
    }

    /// Structural checks that need neither the project nor the store
    pub fn check_shape(&self) -> Result<(), CodedError> {
        let (entry_uuid, created_at, _) = self.header().ok_or_else(|| shape_error(ErrorCode::PayloadInvalid))?;

        if Uuid::parse_str(entry_uuid.trim()).is_err() || self.id.trim() != entry_uuid.trim() {
            return Err(shape_error(ErrorCode::UuidInvalid));
        }
        if parse_created_at(created_at).is_none() {
            return Err(shape_error(ErrorCode::CreatedAtInvalid));
        }
        if self.form_ref().is_empty() {
            return Err(shape_error(ErrorCode::PayloadInvalid));
        }

        if let Some(parent) = self.parent_link() {
            if Uuid::parse_str(parent.parent_entry_uuid.trim()).is_err() {
                return Err(shape_error(ErrorCode::UuidInvalid));
            }
        }

        match self.entry_type {
            EntryType::BranchEntry => {
                let link = self.branch_link().ok_or_else(|| shape_error(ErrorCode::PayloadInvalid))?;
                if link.owner_input_ref.trim().is_empty() {
                    return Err(shape_error(ErrorCode::PayloadInvalid));
                }
                if Uuid::parse_str(link.owner_entry_uuid.trim()).is_err() {
                    return Err(shape_error(ErrorCode::UuidInvalid));
                }
            }
            EntryType::FileEntry => {
                let Some(file) = &self.file_entry else {
                    return Err(shape_error(ErrorCode::PayloadInvalid));
                };
                if file.name.trim().is_empty() || file.input_ref.trim().is_empty() {
                    return Err(shape_error(ErrorCode::PayloadInvalid));
                }
            }
            EntryType::Entry => {}
        }
        Ok(())
    }
}

/// Who is uploading
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Requester {
    /// `None` for anonymous uploads
    pub user_id: Option<u64>,
}

impl Requester {
    pub fn anonymous() -> Self {
        Self { user_id: None }
    }

    pub fn user(user_id: u64) -> Self {
        Self { user_id: Some(user_id) }
    }
}

/// Normalizes any upload shape into an [`EntryStructure`]
pub struct EntryStructureBuilder;

impl EntryStructureBuilder {
    /// Pure transformation; payloads are expected to have passed
    /// [`UploadData::check_shape`]
    pub fn build(data: &UploadData, project_id: &ProjectId, requester: &Requester) -> EntryStructure {
        let (entry_uuid, created_at, project_version) = data.header().unwrap_or(("", "", ""));

        let answers = data.body().map(|b| b.answers.clone()).unwrap_or_default();

        let (parent_uuid, parent_form_ref) = match (data.entry_type, data.parent_link()) {
            (EntryType::BranchEntry, _) | (_, None) => (None, None),
            (_, Some(link)) => (non_empty(&link.parent_entry_uuid), non_empty(&link.parent_form_ref)),
        };

        let (owner_uuid, owner_input_ref) = match (data.entry_type, data.branch_link()) {
            (EntryType::Entry, _) | (_, None) => (None, None),
            (_, Some(link)) => (non_empty(&link.owner_entry_uuid), non_empty(&link.owner_input_ref)),
        };

        let file = data.file_entry.as_ref().map(|f| FileDetails {
            name: f.name.trim().to_string(),
            file_type: f.file_type,
            input_ref: f.input_ref.trim().to_string(),
        });

        EntryStructure {
            entry_type: data.entry_type,
            project_id: project_id.clone(),
            entry_uuid: entry_uuid.trim().to_string(),
            form_ref: data.form_ref().to_string(),
            parent_uuid,
            parent_form_ref,
            owner_uuid,
            owner_input_ref,
            answers,
            created_at: parse_created_at(created_at).unwrap_or_else(Utc::now),
            project_version: project_version.trim().to_string(),
            user_id: requester.user_id.unwrap_or(0),
            file,
            title: String::new(),
        }
    }
}
