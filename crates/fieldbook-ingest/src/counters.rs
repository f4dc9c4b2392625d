//! Branch counter upkeep that happens outside the insert transaction

use fieldbook_core::{EntryStructure, ProjectExtra};
use fieldbook_storage::EntryStore;

/// Clears branch entries left behind when an edit jumps over their branch
pub struct CounterMaintainer<'a, S: EntryStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: EntryStore + ?Sized> CounterMaintainer<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Delete the branch entries of every branch input the edited entry now
    /// jumps over, resetting its count to zero
    ///
    /// Best-effort: failures are logged and the upload still succeeds.
    pub async fn prune_jumped_branches(&self, structure: &EntryStructure, extra: &ProjectExtra) -> u64 {
        let mut removed = 0;
        for branch_ref in extra.form_branches(&structure.form_ref) {
            let jumped = structure.answer(branch_ref).map(|a| a.was_jumped).unwrap_or(false);
            if !jumped {
                continue;
            }
            match self
                .store
                .prune_branch_entries(&structure.project_id, &structure.entry_uuid, branch_ref)
                .await
            {
                Ok(n) => {
                    if n > 0 {
                        tracing::debug!(branch_ref, removed = n, "pruned jumped branch entries");
                    }
                    removed += n;
                }
                Err(e) => {
                    tracing::warn!(
                        branch_ref,
                        entry = %structure.entry_uuid,
                        error = %e,
                        "failed to prune branch entries"
                    );
                }
            }
        }
        removed
    }
}
