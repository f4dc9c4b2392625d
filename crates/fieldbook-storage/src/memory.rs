//! In-memory storage backend for testing

use crate::error::{StorageError, StorageResult};
use crate::locks::{EntryLock, LockTable};
use crate::traits::{AnswerQuery, AnswerScope, EntryStore, WriteMode};
use async_trait::async_trait;
use fieldbook_core::{AnswerValue, BranchEntry, Entry, Project, ProjectId};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

type Key = (ProjectId, String);

fn key(project_id: &ProjectId, uuid: &str) -> Key {
    (project_id.clone(), uuid.to_string())
}

fn lock_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::Database(format!("Lock error: {}", e))
}

/// In-memory storage backend
///
/// Useful for testing and temporary storage. Multi-row writes take the
/// entry map before the branch entry map.
pub struct MemoryStorage {
    projects: RwLock<HashMap<ProjectId, Project>>,
    entries: RwLock<HashMap<Key, Entry>>,
    branch_entries: RwLock<HashMap<Key, BranchEntry>>,
    locks: LockTable,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            projects: RwLock::new(HashMap::new()),
            entries: RwLock::new(HashMap::new()),
            branch_entries: RwLock::new(HashMap::new()),
            locks: LockTable::new(),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntryStore for MemoryStorage {
    async fn initialize(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn health_check(&self) -> StorageResult<bool> {
        Ok(true)
    }

    // Project operations

    async fn save_project(&self, project: &Project) -> StorageResult<()> {
        let mut projects = self.projects.write().map_err(lock_error)?;
        let clash = projects
            .values()
            .any(|p| p.name == project.name && p.id != project.id);
        if clash {
            return Err(StorageError::DuplicateProject(project.name.clone()));
        }
        projects.insert(project.id.clone(), project.clone());
        Ok(())
    }

    async fn get_project(&self, id: &ProjectId) -> StorageResult<Option<Project>> {
        let projects = self.projects.read().map_err(lock_error)?;
        Ok(projects.get(id).cloned())
    }

    async fn get_project_by_name(&self, name: &str) -> StorageResult<Option<Project>> {
        let projects = self.projects.read().map_err(lock_error)?;
        Ok(projects.values().find(|p| p.name == name).cloned())
    }

    async fn get_all_projects(&self) -> StorageResult<Vec<Project>> {
        let projects = self.projects.read().map_err(lock_error)?;
        let mut all: Vec<Project> = projects.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    // Entry reads

    async fn lock_entry(&self, project_id: &ProjectId, uuid: &str) -> EntryLock {
        self.locks.acquire(project_id, uuid).await
    }

    async fn get_entry(&self, project_id: &ProjectId, uuid: &str) -> StorageResult<Option<Entry>> {
        let entries = self.entries.read().map_err(lock_error)?;
        Ok(entries.get(&key(project_id, uuid)).cloned())
    }

    async fn get_branch_entry(&self, project_id: &ProjectId, uuid: &str) -> StorageResult<Option<BranchEntry>> {
        let branch_entries = self.branch_entries.read().map_err(lock_error)?;
        Ok(branch_entries.get(&key(project_id, uuid)).cloned())
    }

    async fn list_entries(&self, project_id: &ProjectId, form_ref: Option<&str>) -> StorageResult<Vec<Entry>> {
        let entries = self.entries.read().map_err(lock_error)?;
        let mut found: Vec<Entry> = entries
            .values()
            .filter(|e| &e.project_id == project_id)
            .filter(|e| form_ref.map(|f| e.form_ref == f).unwrap_or(true))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(found)
    }

    async fn list_branch_entries(
        &self,
        project_id: &ProjectId,
        owner_uuid: &str,
        owner_input_ref: &str,
    ) -> StorageResult<Vec<BranchEntry>> {
        let branch_entries = self.branch_entries.read().map_err(lock_error)?;
        let mut found: Vec<BranchEntry> = branch_entries
            .values()
            .filter(|b| &b.project_id == project_id && b.owner_uuid == owner_uuid && b.owner_input_ref == owner_input_ref)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(found)
    }

    async fn count_entries(
        &self,
        project_id: &ProjectId,
        form_ref: &str,
        parent_uuid: Option<&str>,
    ) -> StorageResult<u64> {
        let entries = self.entries.read().map_err(lock_error)?;
        let count = entries
            .values()
            .filter(|e| &e.project_id == project_id && e.form_ref == form_ref)
            .filter(|e| parent_uuid.map(|p| e.parent_uuid.as_deref() == Some(p)).unwrap_or(true))
            .count();
        Ok(count as u64)
    }

    async fn count_branch_entries(
        &self,
        project_id: &ProjectId,
        owner_uuid: &str,
        owner_input_ref: &str,
    ) -> StorageResult<u64> {
        let branch_entries = self.branch_entries.read().map_err(lock_error)?;
        let count = branch_entries
            .values()
            .filter(|b| &b.project_id == project_id && b.owner_uuid == owner_uuid && b.owner_input_ref == owner_input_ref)
            .count();
        Ok(count as u64)
    }

    async fn find_answers(&self, query: &AnswerQuery<'_>) -> StorageResult<Vec<Value>> {
        let pick = |answers: &BTreeMap<String, AnswerValue>| {
            answers.get(query.input_ref).map(|a| a.answer.clone())
        };

        match query.scope {
            AnswerScope::Form { form_ref, parent_uuid } => {
                let entries = self.entries.read().map_err(lock_error)?;
                Ok(entries
                    .values()
                    .filter(|e| &e.project_id == query.project_id && e.form_ref == form_ref)
                    .filter(|e| e.uuid != query.exclude_uuid)
                    .filter(|e| parent_uuid.map(|p| e.parent_uuid.as_deref() == Some(p)).unwrap_or(true))
                    .filter_map(|e| pick(&e.answers))
                    .collect())
            }
            AnswerScope::Branch { owner_input_ref } => {
                let branch_entries = self.branch_entries.read().map_err(lock_error)?;
                Ok(branch_entries
                    .values()
                    .filter(|b| &b.project_id == query.project_id && b.owner_input_ref == owner_input_ref)
                    .filter(|b| b.uuid != query.exclude_uuid)
                    .filter_map(|b| pick(&b.answers))
                    .collect())
            }
        }
    }

    // Entry writes

    async fn commit_entry(&self, entry: &Entry, mode: WriteMode) -> StorageResult<()> {
        let mut entries = self.entries.write().map_err(lock_error)?;
        let entry_key = key(&entry.project_id, &entry.uuid);

        match mode {
            WriteMode::Add => {
                if entries.contains_key(&entry_key) {
                    return Err(StorageError::DuplicateEntry(entry.uuid.clone()));
                }
                if let Some(parent_uuid) = &entry.parent_uuid {
                    let parent = entries
                        .get_mut(&key(&entry.project_id, parent_uuid))
                        .ok_or_else(|| StorageError::EntryNotFound(parent_uuid.clone()))?;
                    *parent.child_counts.entry(entry.form_ref.clone()).or_insert(0) += 1;
                }
                entries.insert(entry_key, entry.clone());
            }
            WriteMode::Edit => {
                let stored = entries
                    .get_mut(&entry_key)
                    .ok_or_else(|| StorageError::EntryNotFound(entry.uuid.clone()))?;
                let mut updated = entry.clone();
                updated.child_counts = std::mem::take(&mut stored.child_counts);
                updated.branch_counts = std::mem::take(&mut stored.branch_counts);
                *stored = updated;
            }
        }
        Ok(())
    }

    async fn commit_branch_entry(&self, entry: &BranchEntry, mode: WriteMode) -> StorageResult<()> {
        let mut entries = self.entries.write().map_err(lock_error)?;
        let mut branch_entries = self.branch_entries.write().map_err(lock_error)?;
        let entry_key = key(&entry.project_id, &entry.uuid);

        match mode {
            WriteMode::Add => {
                if branch_entries.contains_key(&entry_key) {
                    return Err(StorageError::DuplicateEntry(entry.uuid.clone()));
                }
                let owner = entries
                    .get_mut(&key(&entry.project_id, &entry.owner_uuid))
                    .ok_or_else(|| StorageError::EntryNotFound(entry.owner_uuid.clone()))?;
                *owner.branch_counts.entry(entry.owner_input_ref.clone()).or_insert(0) += 1;
                branch_entries.insert(entry_key, entry.clone());
            }
            WriteMode::Edit => {
                let stored = branch_entries
                    .get_mut(&entry_key)
                    .ok_or_else(|| StorageError::EntryNotFound(entry.uuid.clone()))?;
                *stored = entry.clone();
            }
        }
        Ok(())
    }

    async fn prune_branch_entries(
        &self,
        project_id: &ProjectId,
        owner_uuid: &str,
        owner_input_ref: &str,
    ) -> StorageResult<u64> {
        let mut entries = self.entries.write().map_err(lock_error)?;
        let mut branch_entries = self.branch_entries.write().map_err(lock_error)?;

        let before = branch_entries.len();
        branch_entries.retain(|_, b| {
            !(&b.project_id == project_id && b.owner_uuid == owner_uuid && b.owner_input_ref == owner_input_ref)
        });
        let removed = (before - branch_entries.len()) as u64;

        if let Some(owner) = entries.get_mut(&key(project_id, owner_uuid)) {
            owner.branch_counts.insert(owner_input_ref.to_string(), 0);
        }
        Ok(removed)
    }

    async fn set_entry_answer(
        &self,
        project_id: &ProjectId,
        uuid: &str,
        input_ref: &str,
        answer: Value,
    ) -> StorageResult<bool> {
        let mut entries = self.entries.write().map_err(lock_error)?;
        let Some(entry) = entries.get_mut(&key(project_id, uuid)) else {
            return Ok(false);
        };
        entry
            .answers
            .entry(input_ref.to_string())
            .or_insert_with(|| AnswerValue::new(Value::Null))
            .answer = answer;
        Ok(true)
    }

    async fn set_branch_entry_answer(
        &self,
        project_id: &ProjectId,
        uuid: &str,
        input_ref: &str,
        answer: Value,
    ) -> StorageResult<bool> {
        let mut branch_entries = self.branch_entries.write().map_err(lock_error)?;
        let Some(entry) = branch_entries.get_mut(&key(project_id, uuid)) else {
            return Ok(false);
        };
        entry
            .answers
            .entry(input_ref.to_string())
            .or_insert_with(|| AnswerValue::new(Value::Null))
            .answer = answer;
        Ok(true)
    }

    async fn delete_project_entries(&self, project_id: &ProjectId) -> StorageResult<u64> {
        let mut entries = self.entries.write().map_err(lock_error)?;
        let mut branch_entries = self.branch_entries.write().map_err(lock_error)?;

        let before = entries.len() + branch_entries.len();
        entries.retain(|(p, _), _| p != project_id);
        branch_entries.retain(|(p, _), _| p != project_id);
        Ok((before - entries.len() - branch_entries.len()) as u64)
    }
}
