//! The upload pipeline
//!
//! Every upload runs the same gates in order and stops at the first failure:
//!
//! 1. payload shape
//! 2. project exists and is active
//! 3. requester may upload
//! 4. structure built and project version matched
//! 5. relationships resolved (under the entry UUID lock)
//! 6. answers validated
//! 7. entries limit (adds only)
//! 8. commit, with counters updated in the same transaction

use fieldbook_core::payload::UPLOAD_SOURCE;
use fieldbook_core::rules::media::is_valid_file_name;
use fieldbook_core::rules::{is_empty_answer, rule_for};
use fieldbook_core::{
    BranchEntry, Entry, EntryStructure, EntryStructureBuilder, EntryType, ErrorCode, Project, ProjectAccess,
    ProjectId, Uniqueness, UploadData,
};
use fieldbook_storage::{EntryStore, WriteMode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::answers::AnswerValidator;
use crate::config::IngestConfig;
use crate::context::UploadContext;
use crate::counters::CounterMaintainer;
use crate::error::Rejection;
use crate::limits::EntriesLimitChecker;
use crate::uniqueness::UniquenessChecker;

const PROJECT_SOURCE: &str = "project";

/// Whether the upload created a row or replaced one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadCode {
    EntryCreated,
    EntryUpdated,
}

impl UploadCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EntryCreated => "entry_created",
            Self::EntryUpdated => "entry_updated",
        }
    }
}

impl std::fmt::Display for UploadCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadOutcome {
    pub code: UploadCode,
    pub title: String,
}

impl UploadOutcome {
    fn new(code: UploadCode, title: impl Into<String>) -> Self {
        Self {
            code,
            title: title.into(),
        }
    }
}

fn mode_code(mode: WriteMode) -> UploadCode {
    match mode {
        WriteMode::Add => UploadCode::EntryCreated,
        WriteMode::Edit => UploadCode::EntryUpdated,
    }
}

/// Validates uploads and commits them to an [`EntryStore`]
pub struct IngestPipeline<S: EntryStore + ?Sized> {
    store: Arc<S>,
    config: IngestConfig,
}

impl<S: EntryStore + ?Sized> Clone for IngestPipeline<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

impl<S: EntryStore + ?Sized> IngestPipeline<S> {
    pub fn new(store: Arc<S>, config: IngestConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Run one upload through every gate and commit it
    pub async fn ingest(
        &self,
        project_id: &ProjectId,
        payload: Value,
        ctx: &UploadContext,
    ) -> Result<UploadOutcome, Rejection> {
        let data = UploadData::from_value(payload)?;
        data.check_shape()?;

        let project = self.active_project(project_id).await?;
        check_permission(&project, ctx)?;

        let mut structure = EntryStructureBuilder::build(&data, project_id, &ctx.recorded_requester());
        if structure.project_version != project.project_version() {
            tracing::debug!(
                expected = %project.project_version(),
                got = %structure.project_version,
                "project version mismatch"
            );
            return Err(Rejection::new(PROJECT_SOURCE, ErrorCode::ProjectVersionMismatch));
        }

        let lock = self.store.lock_entry(project_id, &structure.entry_uuid).await;
        let outcome = match structure.entry_type {
            EntryType::Entry => self.ingest_entry(&project, &mut structure).await?,
            EntryType::BranchEntry => self.ingest_branch_entry(&project, &mut structure).await?,
            EntryType::FileEntry => self.ingest_file_entry(&project, &structure).await?,
        };
        drop(lock);

        tracing::info!(
            project = %project_id,
            entry = %structure.entry_uuid,
            entry_type = %structure.entry_type,
            code = %outcome.code,
            "upload committed"
        );

        if let Some(pause) = self.config.throttle() {
            tokio::time::sleep(pause).await;
        }
        Ok(outcome)
    }

    /// Pre-submission check of a single `{input_ref, answer}` pair
    ///
    /// Succeeds when the answer is empty, the input carries no uniqueness
    /// setting, or no sibling entry holds the same value.
    pub async fn check_unique(&self, project_id: &ProjectId, payload: Value, ctx: &UploadContext) -> Result<(), Rejection> {
        let data = UploadData::from_value(payload)?;
        data.check_shape()?;

        let project = self.active_project(project_id).await?;
        check_permission(&project, ctx)?;

        let unique = data
            .unique_answer()
            .ok_or_else(|| Rejection::new(UPLOAD_SOURCE, ErrorCode::PayloadInvalid))?;
        let input_ref = unique.input_ref.trim();
        let input = project
            .extra
            .input(input_ref)
            .ok_or_else(|| Rejection::new(input_ref, ErrorCode::PayloadInvalid))?;

        if input.data.uniqueness == Uniqueness::None || is_empty_answer(&unique.answer) {
            return Ok(());
        }

        let normalized = rule_for(input.input_type())
            .validate(&unique.answer, &input.data)
            .map_err(|code| Rejection::new(input_ref, code))?;

        let structure = EntryStructureBuilder::build(&data, project_id, &ctx.recorded_requester());
        let is_unique = UniquenessChecker::new(self.store.as_ref())
            .is_unique(
                &structure,
                input.data.uniqueness,
                input_ref,
                &normalized,
                input.input_type(),
                input.data.datetime_format.as_deref(),
            )
            .await?;

        if is_unique {
            Ok(())
        } else {
            Err(Rejection::new(input_ref, ErrorCode::AnswerNotUnique))
        }
    }

    async fn active_project(&self, project_id: &ProjectId) -> Result<Project, Rejection> {
        let project = self
            .store
            .get_project(project_id)
            .await?
            .ok_or_else(|| Rejection::new(PROJECT_SOURCE, ErrorCode::ProjectNotFound))?;
        if !project.is_active() {
            return Err(Rejection::new(PROJECT_SOURCE, ErrorCode::ProjectInactive));
        }
        Ok(project)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Entries
    // ─────────────────────────────────────────────────────────────────────────

    async fn ingest_entry(&self, project: &Project, structure: &mut EntryStructure) -> Result<UploadOutcome, Rejection> {
        let extra = &project.extra;
        let store = self.store.as_ref();
        let form_ref = structure.form_ref.clone();

        let form = extra
            .form(&form_ref)
            .ok_or_else(|| Rejection::new(&form_ref, ErrorCode::FormNotFound))?;

        if store.get_branch_entry(&project.id, &structure.entry_uuid).await?.is_some() {
            return Err(Rejection::new(UPLOAD_SOURCE, ErrorCode::EntryTypeMismatch));
        }

        match (form.parent.as_deref(), structure.parent_form_ref.as_deref()) {
            (Some(expected), Some(declared)) if expected == declared => {}
            (None, None) => {}
            _ => return Err(Rejection::new(&form_ref, ErrorCode::ParentFormMismatch)),
        }

        if let (Some(parent_form), Some(parent_uuid)) = (form.parent.as_deref(), structure.parent_uuid.as_deref()) {
            let parent = store.get_entry(&project.id, parent_uuid).await?;
            if !parent.map(|p| p.form_ref == parent_form).unwrap_or(false) {
                return Err(Rejection::new(&form_ref, ErrorCode::ParentEntryNotFound));
            }
        }

        let existing = store.get_entry(&project.id, &structure.entry_uuid).await?;
        if let Some(stored) = &existing {
            if stored.form_ref != form_ref {
                return Err(Rejection::new(&form_ref, ErrorCode::EntryTypeMismatch));
            }
            if stored.parent_uuid != structure.parent_uuid {
                return Err(Rejection::new(&form_ref, ErrorCode::ParentUuidMismatch));
            }
        }

        AnswerValidator::new(store, extra)
            .validate(structure, extra.form_inputs(&form_ref))
            .await?;

        let mode = match existing {
            Some(mut stored) => {
                stored.apply_edit(structure);
                store.commit_entry(&stored, WriteMode::Edit).await?;
                CounterMaintainer::new(store)
                    .prune_jumped_branches(structure, extra)
                    .await;
                WriteMode::Edit
            }
            None => {
                let over = EntriesLimitChecker::new(store)
                    .would_exceed(&project.id, extra, &form_ref, false, structure.parent_uuid.as_deref())
                    .await?;
                if over {
                    return Err(Rejection::new(&form_ref, ErrorCode::EntriesLimitReached));
                }
                let entry = Entry::from_structure(structure, extra.form_branches(&form_ref));
                store.commit_entry(&entry, WriteMode::Add).await?;
                WriteMode::Add
            }
        };

        Ok(UploadOutcome::new(mode_code(mode), structure.title.clone()))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Branch entries
    // ─────────────────────────────────────────────────────────────────────────

    async fn ingest_branch_entry(
        &self,
        project: &Project,
        structure: &mut EntryStructure,
    ) -> Result<UploadOutcome, Rejection> {
        let extra = &project.extra;
        let store = self.store.as_ref();
        let form_ref = structure.form_ref.clone();

        if extra.form(&form_ref).is_none() {
            return Err(Rejection::new(&form_ref, ErrorCode::FormNotFound));
        }

        let (Some(owner_input_ref), Some(owner_uuid)) =
            (structure.owner_input_ref.clone(), structure.owner_uuid.clone())
        else {
            return Err(Rejection::new(UPLOAD_SOURCE, ErrorCode::PayloadInvalid));
        };

        if !extra.is_branch_of(&form_ref, &owner_input_ref) {
            return Err(Rejection::new(&owner_input_ref, ErrorCode::BranchInputNotFound));
        }

        if store.get_entry(&project.id, &structure.entry_uuid).await?.is_some() {
            return Err(Rejection::new(UPLOAD_SOURCE, ErrorCode::EntryTypeMismatch));
        }

        let owner = store.get_entry(&project.id, &owner_uuid).await?;
        if !owner.map(|o| o.form_ref == form_ref).unwrap_or(false) {
            return Err(Rejection::new(&owner_input_ref, ErrorCode::OwnerEntryNotFound));
        }

        let existing = store.get_branch_entry(&project.id, &structure.entry_uuid).await?;
        if let Some(stored) = &existing {
            if stored.owner_uuid != owner_uuid || stored.owner_input_ref != owner_input_ref {
                return Err(Rejection::new(&owner_input_ref, ErrorCode::OwnerUuidMismatch));
            }
        }

        let inputs = extra.branch_inputs(&owner_input_ref).unwrap_or(&[]);
        AnswerValidator::new(store, extra).validate(structure, inputs).await?;

        let mode = match existing {
            Some(mut stored) => {
                stored.apply_edit(structure);
                store.commit_branch_entry(&stored, WriteMode::Edit).await?;
                WriteMode::Edit
            }
            None => {
                let over = EntriesLimitChecker::new(store)
                    .would_exceed(&project.id, extra, &owner_input_ref, true, Some(&owner_uuid))
                    .await?;
                if over {
                    return Err(Rejection::new(&owner_input_ref, ErrorCode::EntriesLimitReached));
                }
                let entry = BranchEntry::from_structure(structure)
                    .ok_or_else(|| Rejection::new(UPLOAD_SOURCE, ErrorCode::PayloadInvalid))?;
                store.commit_branch_entry(&entry, WriteMode::Add).await?;
                WriteMode::Add
            }
        };

        Ok(UploadOutcome::new(mode_code(mode), structure.title.clone()))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // File entries
    // ─────────────────────────────────────────────────────────────────────────

    /// Record the file name as the answer of a media input on an existing row
    async fn ingest_file_entry(&self, project: &Project, structure: &EntryStructure) -> Result<UploadOutcome, Rejection> {
        let store = self.store.as_ref();
        let file = structure
            .file
            .as_ref()
            .ok_or_else(|| Rejection::new(UPLOAD_SOURCE, ErrorCode::PayloadInvalid))?;
        let input_ref = file.input_ref.as_str();

        let input = project
            .extra
            .input(input_ref)
            .filter(|i| i.input_type().is_media() && i.input_type() == file.file_type)
            .ok_or_else(|| Rejection::new(input_ref, ErrorCode::FileInputInvalid))?;

        let missing = || Rejection::new(UPLOAD_SOURCE, ErrorCode::FileEntryNotFound);
        let (title, in_branch) = if structure.owner_input_ref.is_some() {
            let row = store
                .get_branch_entry(&project.id, &structure.entry_uuid)
                .await?
                .ok_or_else(missing)?;
            if input.branch_ref.as_deref() != Some(row.owner_input_ref.as_str()) {
                return Err(Rejection::new(input_ref, ErrorCode::FileInputInvalid));
            }
            (row.title, true)
        } else {
            let row = store
                .get_entry(&project.id, &structure.entry_uuid)
                .await?
                .ok_or_else(missing)?;
            if input.form_ref != row.form_ref || input.branch_ref.is_some() {
                return Err(Rejection::new(input_ref, ErrorCode::FileInputInvalid));
            }
            (row.title, false)
        };

        if !is_valid_file_name(&file.name, file.file_type) {
            return Err(Rejection::new(input_ref, ErrorCode::AnswerFileNameInvalid));
        }

        let answer = Value::String(file.name.clone());
        let recorded = if in_branch {
            store
                .set_branch_entry_answer(&project.id, &structure.entry_uuid, input_ref, answer)
                .await?
        } else {
            store
                .set_entry_answer(&project.id, &structure.entry_uuid, input_ref, answer)
                .await?
        };
        if !recorded {
            return Err(missing());
        }

        Ok(UploadOutcome::new(UploadCode::EntryUpdated, title))
    }
}

/// Private projects only accept uploads from members allowed to collect,
/// unless the request came through the private import channel
fn check_permission(project: &Project, ctx: &UploadContext) -> Result<(), Rejection> {
    if project.access == ProjectAccess::Public || ctx.private_import {
        return Ok(());
    }
    match ctx.requester.user_id.and_then(|id| project.role_of(id)) {
        Some(role) if role.can_upload() => Ok(()),
        _ => {
            tracing::debug!(project = %project.id, user = ?ctx.requester.user_id, "upload forbidden");
            Err(Rejection::new(PROJECT_SOURCE, ErrorCode::UploadForbidden))
        }
    }
}
