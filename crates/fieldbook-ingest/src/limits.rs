//! Entries-limit (quota) checks

use fieldbook_core::{ProjectExtra, ProjectId};
use fieldbook_storage::{EntryStore, StorageResult};

/// Checks configured quotas against live counts
pub struct EntriesLimitChecker<'a, S: EntryStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: EntryStore + ?Sized> EntriesLimitChecker<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Whether one more entry under `owner_ref` would break its quota
    ///
    /// `scope_uuid` is the owner entry for branches and the parent entry for
    /// child forms. Top-level forms pass `None` and count the whole form.
    pub async fn would_exceed(
        &self,
        project_id: &ProjectId,
        extra: &ProjectExtra,
        owner_ref: &str,
        is_branch: bool,
        scope_uuid: Option<&str>,
    ) -> StorageResult<bool> {
        let Some(limit) = extra.entries_limit(owner_ref) else {
            return Ok(false);
        };

        let count = if is_branch {
            match scope_uuid {
                Some(owner_uuid) => {
                    self.store
                        .count_branch_entries(project_id, owner_uuid, owner_ref)
                        .await?
                }
                None => 0,
            }
        } else {
            self.store.count_entries(project_id, owner_ref, scope_uuid).await?
        };

        tracing::debug!(owner_ref, count, limit, "entries limit check");
        Ok(count + 1 > u64::from(limit))
    }
}
