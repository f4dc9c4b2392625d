//! Entry model: the request-scoped [`EntryStructure`] and the stored rows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::definition::InputType;
use crate::project::ProjectId;

/// Kind of upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Entry,
    BranchEntry,
    FileEntry,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::BranchEntry => "branch_entry",
            Self::FileEntry => "file_entry",
        }
    }
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One answer as uploaded and stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerValue {
    #[serde(default)]
    pub answer: Value,

    #[serde(default)]
    pub was_jumped: bool,
}

impl AnswerValue {
    pub fn new(answer: impl Into<Value>) -> Self {
        Self {
            answer: answer.into(),
            was_jumped: false,
        }
    }

    pub fn jumped() -> Self {
        Self {
            answer: Value::String(String::new()),
            was_jumped: true,
        }
    }
}

/// File details carried by a `file_entry` upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDetails {
    pub name: String,
    pub file_type: InputType,
    pub input_ref: String,
}

/// Canonical, request-scoped view of one upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryStructure {
    pub entry_type: EntryType,
    pub project_id: ProjectId,
    pub entry_uuid: String,
    pub form_ref: String,

    pub parent_uuid: Option<String>,
    pub parent_form_ref: Option<String>,

    pub owner_uuid: Option<String>,
    pub owner_input_ref: Option<String>,

    pub answers: BTreeMap<String, AnswerValue>,
    pub created_at: DateTime<Utc>,
    pub project_version: String,

    /// 0 for anonymous uploads and private imports
    pub user_id: u64,

    pub file: Option<FileDetails>,

    /// Computed after answers are validated
    #[serde(default)]
    pub title: String,
}

impl EntryStructure {
    pub fn is_branch(&self) -> bool {
        self.entry_type == EntryType::BranchEntry
    }

    pub fn answer(&self, input_ref: &str) -> Option<&AnswerValue> {
        self.answers.get(input_ref)
    }

    pub fn set_answer(&mut self, input_ref: &str, answer: Value) {
        if let Some(existing) = self.answers.get_mut(input_ref) {
            existing.answer = answer;
        } else {
            self.answers.insert(input_ref.to_string(), AnswerValue::new(answer));
        }
    }
}

/// A stored entry of a form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub uuid: String,
    pub project_id: ProjectId,
    pub form_ref: String,

    pub parent_uuid: Option<String>,
    pub parent_form_ref: Option<String>,

    pub title: String,
    pub answers: BTreeMap<String, AnswerValue>,

    /// Child form ref -> number of child entries
    #[serde(default)]
    pub child_counts: BTreeMap<String, u64>,

    /// Branch input ref -> number of branch entries
    #[serde(default)]
    pub branch_counts: BTreeMap<String, u64>,

    pub user_id: u64,
    pub created_at: DateTime<Utc>,
    pub uploaded_at: DateTime<Utc>,
}

impl Entry {
    /// A new row for a validated structure; every branch starts at zero
    pub fn from_structure<'a>(structure: &EntryStructure, branch_refs: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            uuid: structure.entry_uuid.clone(),
            project_id: structure.project_id.clone(),
            form_ref: structure.form_ref.clone(),
            parent_uuid: structure.parent_uuid.clone(),
            parent_form_ref: structure.parent_form_ref.clone(),
            title: structure.title.clone(),
            answers: structure.answers.clone(),
            child_counts: BTreeMap::new(),
            branch_counts: branch_refs.into_iter().map(|b| (b.to_string(), 0)).collect(),
            user_id: structure.user_id,
            created_at: structure.created_at,
            uploaded_at: Utc::now(),
        }
    }

    /// Replace answers and title, keeping `created_at` and the counters
    pub fn apply_edit(&mut self, structure: &EntryStructure) {
        self.answers = structure.answers.clone();
        self.title = structure.title.clone();
        self.uploaded_at = Utc::now();
    }

    pub fn child_count(&self, form_ref: &str) -> u64 {
        self.child_counts.get(form_ref).copied().unwrap_or(0)
    }

    pub fn branch_count(&self, branch_ref: &str) -> u64 {
        self.branch_counts.get(branch_ref).copied().unwrap_or(0)
    }
}

/// A stored entry of a branch, owned by one [`Entry`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchEntry {
    pub uuid: String,
    pub project_id: ProjectId,
    pub form_ref: String,
    pub owner_uuid: String,
    pub owner_input_ref: String,
    pub title: String,
    pub answers: BTreeMap<String, AnswerValue>,
    pub user_id: u64,
    pub created_at: DateTime<Utc>,
    pub uploaded_at: DateTime<Utc>,
}

impl BranchEntry {
    /// `None` when the structure carries no owner link
    pub fn from_structure(structure: &EntryStructure) -> Option<Self> {
        Some(Self {
            uuid: structure.entry_uuid.clone(),
            project_id: structure.project_id.clone(),
            form_ref: structure.form_ref.clone(),
            owner_uuid: structure.owner_uuid.clone()?,
            owner_input_ref: structure.owner_input_ref.clone()?,
            title: structure.title.clone(),
            answers: structure.answers.clone(),
            user_id: structure.user_id,
            created_at: structure.created_at,
            uploaded_at: Utc::now(),
        })
    }

    pub fn apply_edit(&mut self, structure: &EntryStructure) {
        self.answers = structure.answers.clone();
        self.title = structure.title.clone();
        self.uploaded_at = Utc::now();
    }
}
