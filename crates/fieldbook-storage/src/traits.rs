//! Storage trait used by the ingestion pipeline

use crate::error::StorageResult;
use crate::locks::EntryLock;
use async_trait::async_trait;
use fieldbook_core::{BranchEntry, Entry, Project, ProjectId};
use serde_json::Value;

/// Whether a commit creates a row or replaces an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Add,
    Edit,
}

/// Which rows a uniqueness lookup compares against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerScope<'a> {
    /// Entries of a form, optionally only those under one parent entry
    Form {
        form_ref: &'a str,
        parent_uuid: Option<&'a str>,
    },
    /// Branch entries of a branch input, across all owners
    Branch { owner_input_ref: &'a str },
}

/// Lookup of stored answers for one input
#[derive(Debug, Clone, Copy)]
pub struct AnswerQuery<'a> {
    pub project_id: &'a ProjectId,
    pub scope: AnswerScope<'a>,
    pub input_ref: &'a str,
    /// The row being edited, never compared against itself
    pub exclude_uuid: &'a str,
}

/// Trait for storage backend implementations
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Initialize the storage (create tables, etc.)
    async fn initialize(&self) -> StorageResult<()>;

    /// Close the storage connection
    async fn close(&self) -> StorageResult<()>;

    /// Health check
    async fn health_check(&self) -> StorageResult<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Project Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert or replace a project
    async fn save_project(&self, project: &Project) -> StorageResult<()>;

    async fn get_project(&self, id: &ProjectId) -> StorageResult<Option<Project>>;

    async fn get_project_by_name(&self, name: &str) -> StorageResult<Option<Project>>;

    async fn get_all_projects(&self) -> StorageResult<Vec<Project>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Entry Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// Serialize work on one entry UUID until the guard is dropped
    async fn lock_entry(&self, project_id: &ProjectId, uuid: &str) -> EntryLock;

    async fn get_entry(&self, project_id: &ProjectId, uuid: &str) -> StorageResult<Option<Entry>>;

    async fn get_branch_entry(&self, project_id: &ProjectId, uuid: &str) -> StorageResult<Option<BranchEntry>>;

    /// Entries of a form, all of them when `form_ref` is `None`
    async fn list_entries(&self, project_id: &ProjectId, form_ref: Option<&str>) -> StorageResult<Vec<Entry>>;

    async fn list_branch_entries(
        &self,
        project_id: &ProjectId,
        owner_uuid: &str,
        owner_input_ref: &str,
    ) -> StorageResult<Vec<BranchEntry>>;

    /// Entries of a form; only those under `parent_uuid` when given
    async fn count_entries(
        &self,
        project_id: &ProjectId,
        form_ref: &str,
        parent_uuid: Option<&str>,
    ) -> StorageResult<u64>;

    /// Branch entries of one owner entry and branch input
    async fn count_branch_entries(
        &self,
        project_id: &ProjectId,
        owner_uuid: &str,
        owner_input_ref: &str,
    ) -> StorageResult<u64>;

    /// Stored answers for one input, excluding the queried row
    async fn find_answers(&self, query: &AnswerQuery<'_>) -> StorageResult<Vec<Value>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Entry Writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Write an entry; on `Add` the parent's child count is incremented in
    /// the same transaction
    async fn commit_entry(&self, entry: &Entry, mode: WriteMode) -> StorageResult<()>;

    /// Write a branch entry; on `Add` the owner's branch count is incremented
    /// in the same transaction
    async fn commit_branch_entry(&self, entry: &BranchEntry, mode: WriteMode) -> StorageResult<()>;

    /// Delete all branch entries of one owner and branch input and reset the
    /// owner's count for it to zero. Returns the number of deleted rows.
    async fn prune_branch_entries(
        &self,
        project_id: &ProjectId,
        owner_uuid: &str,
        owner_input_ref: &str,
    ) -> StorageResult<u64>;

    /// Overwrite one answer of an entry; `false` when the entry is missing
    async fn set_entry_answer(
        &self,
        project_id: &ProjectId,
        uuid: &str,
        input_ref: &str,
        answer: Value,
    ) -> StorageResult<bool>;

    /// Overwrite one answer of a branch entry; `false` when it is missing
    async fn set_branch_entry_answer(
        &self,
        project_id: &ProjectId,
        uuid: &str,
        input_ref: &str,
        answer: Value,
    ) -> StorageResult<bool>;

    /// Delete every entry and branch entry of a project
    async fn delete_project_entries(&self, project_id: &ProjectId) -> StorageResult<u64>;
}
