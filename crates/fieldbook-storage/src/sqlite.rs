//! SQLite storage backend
//!
//! Rows are stored as JSON documents next to the columns used for lookups.
//! Every multi-row write runs inside one `BEGIN IMMEDIATE` transaction.

use crate::error::{StorageError, StorageResult};
use crate::locks::{EntryLock, LockTable};
use crate::migration::Migratable;
use crate::traits::{AnswerQuery, AnswerScope, EntryStore, WriteMode};
use async_trait::async_trait;
use fieldbook_core::{AnswerValue, BranchEntry, Entry, Project, ProjectId};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Mutex<Connection>,
    locks: LockTable,
}

fn db_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::Database(e.to_string())
}

fn decode<T: DeserializeOwned>(rows: Vec<String>) -> StorageResult<Vec<T>> {
    rows.iter()
        .map(|data| serde_json::from_str(data).map_err(StorageError::from))
        .collect()
}

impl SqliteStorage {
    /// Open or create a SQLite database at the given path
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let conn = Connection::open(path).map_err(db_error)?;
        Self::with_connection(conn)
    }

    /// Create an in-memory SQLite database (for testing)
    pub fn in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory().map_err(db_error)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> StorageResult<Self> {
        conn.busy_timeout(std::time::Duration::from_secs(5)).map_err(db_error)?;
        let storage = Self {
            conn: Mutex::new(conn),
            locks: LockTable::new(),
        };
        storage.migrate_to_latest()?;
        Ok(storage)
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(db_error)
    }

    fn query_strings(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> StorageResult<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql).map_err(db_error)?;
        let rows = stmt
            .query_map(args, |row| row.get::<_, String>(0))
            .map_err(db_error)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(db_error)?);
        }
        Ok(out)
    }

    fn query_one<T: DeserializeOwned>(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> StorageResult<Option<T>> {
        let conn = self.conn()?;
        let data: Option<String> = conn
            .query_row(sql, args, |row| row.get(0))
            .optional()
            .map_err(db_error)?;
        data.map(|d| serde_json::from_str(&d)).transpose().map_err(StorageError::from)
    }

    fn query_count(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> StorageResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(sql, args, |row| row.get(0)).map_err(db_error)?;
        Ok(count as u64)
    }
}

impl Migratable for SqliteStorage {
    fn get_schema_version(&self) -> StorageResult<u32> {
        let conn = self.conn()?;
        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .map_err(|e| StorageError::Migration(e.to_string()))?;
        Ok(version as u32)
    }

    fn set_schema_version(&self, version: u32) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute_batch(&format!("PRAGMA user_version = {}", version))
            .map_err(|e| StorageError::Migration(e.to_string()))
    }

    fn run_migration(&self, version: u32) -> StorageResult<()> {
        let sql = match version {
            1 => {
                r#"
                CREATE TABLE IF NOT EXISTS projects (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL UNIQUE,
                    data TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS entries (
                    project_id TEXT NOT NULL,
                    uuid TEXT NOT NULL,
                    form_ref TEXT NOT NULL,
                    parent_uuid TEXT,
                    data TEXT NOT NULL,
                    PRIMARY KEY (project_id, uuid)
                );

                CREATE TABLE IF NOT EXISTS branch_entries (
                    project_id TEXT NOT NULL,
                    uuid TEXT NOT NULL,
                    form_ref TEXT NOT NULL,
                    owner_uuid TEXT NOT NULL,
                    owner_input_ref TEXT NOT NULL,
                    data TEXT NOT NULL,
                    PRIMARY KEY (project_id, uuid)
                );

                CREATE INDEX IF NOT EXISTS idx_entries_form ON entries(project_id, form_ref);
                "#
            }
            2 => {
                r#"
                CREATE INDEX IF NOT EXISTS idx_entries_parent ON entries(project_id, form_ref, parent_uuid);
                CREATE INDEX IF NOT EXISTS idx_branch_owner ON branch_entries(project_id, owner_uuid, owner_input_ref);
                CREATE INDEX IF NOT EXISTS idx_branch_input ON branch_entries(project_id, owner_input_ref);
                "#
            }
            other => return Err(StorageError::Migration(format!("Unknown schema version {}", other))),
        };

        let conn = self.conn()?;
        conn.execute_batch(sql)
            .map_err(|e| StorageError::Migration(e.to_string()))
    }
}

/// Read an entry row inside a transaction
fn load_entry(tx: &rusqlite::Transaction<'_>, project_id: &str, uuid: &str) -> StorageResult<Option<Entry>> {
    let data: Option<String> = tx
        .query_row(
            "SELECT data FROM entries WHERE project_id = ?1 AND uuid = ?2",
            params![project_id, uuid],
            |row| row.get(0),
        )
        .optional()?;
    Ok(data.map(|d| serde_json::from_str(&d)).transpose()?)
}

fn store_entry_data(tx: &rusqlite::Transaction<'_>, entry: &Entry) -> StorageResult<()> {
    let data = serde_json::to_string(entry)?;
    tx.execute(
        "UPDATE entries SET data = ?3 WHERE project_id = ?1 AND uuid = ?2",
        params![entry.project_id.to_string(), entry.uuid, data],
    )?;
    Ok(())
}

#[async_trait]
impl EntryStore for SqliteStorage {
    async fn initialize(&self) -> StorageResult<()> {
        self.migrate_to_latest()
    }

    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn health_check(&self) -> StorageResult<bool> {
        let conn = self.conn()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(db_error)?;
        Ok(true)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Projects
    // ─────────────────────────────────────────────────────────────────────────

    async fn save_project(&self, project: &Project) -> StorageResult<()> {
        let conn = self.conn()?;
        let data = serde_json::to_string(project)?;

        let clash: Option<String> = conn
            .query_row(
                "SELECT id FROM projects WHERE name = ?1 AND id != ?2",
                params![project.name, project.id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_error)?;
        if clash.is_some() {
            return Err(StorageError::DuplicateProject(project.name.clone()));
        }

        conn.execute(
            "INSERT OR REPLACE INTO projects (id, name, data) VALUES (?1, ?2, ?3)",
            params![project.id.to_string(), project.name, data],
        )
        .map_err(db_error)?;
        Ok(())
    }

    async fn get_project(&self, id: &ProjectId) -> StorageResult<Option<Project>> {
        self.query_one("SELECT data FROM projects WHERE id = ?1", &[&id.to_string()])
    }

    async fn get_project_by_name(&self, name: &str) -> StorageResult<Option<Project>> {
        self.query_one("SELECT data FROM projects WHERE name = ?1", &[&name])
    }

    async fn get_all_projects(&self) -> StorageResult<Vec<Project>> {
        decode(self.query_strings("SELECT data FROM projects ORDER BY name", &[])?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Entry reads
    // ─────────────────────────────────────────────────────────────────────────

    async fn lock_entry(&self, project_id: &ProjectId, uuid: &str) -> EntryLock {
        self.locks.acquire(project_id, uuid).await
    }

    async fn get_entry(&self, project_id: &ProjectId, uuid: &str) -> StorageResult<Option<Entry>> {
        self.query_one(
            "SELECT data FROM entries WHERE project_id = ?1 AND uuid = ?2",
            &[&project_id.to_string(), &uuid],
        )
    }

    async fn get_branch_entry(&self, project_id: &ProjectId, uuid: &str) -> StorageResult<Option<BranchEntry>> {
        self.query_one(
            "SELECT data FROM branch_entries WHERE project_id = ?1 AND uuid = ?2",
            &[&project_id.to_string(), &uuid],
        )
    }

    async fn list_entries(&self, project_id: &ProjectId, form_ref: Option<&str>) -> StorageResult<Vec<Entry>> {
        let mut entries: Vec<Entry> = match form_ref {
            Some(form_ref) => decode(self.query_strings(
                "SELECT data FROM entries WHERE project_id = ?1 AND form_ref = ?2",
                &[&project_id.to_string(), &form_ref],
            )?)?,
            None => decode(self.query_strings(
                "SELECT data FROM entries WHERE project_id = ?1",
                &[&project_id.to_string()],
            )?)?,
        };
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(entries)
    }

    async fn list_branch_entries(
        &self,
        project_id: &ProjectId,
        owner_uuid: &str,
        owner_input_ref: &str,
    ) -> StorageResult<Vec<BranchEntry>> {
        let mut found: Vec<BranchEntry> = decode(self.query_strings(
            "SELECT data FROM branch_entries WHERE project_id = ?1 AND owner_uuid = ?2 AND owner_input_ref = ?3",
            &[&project_id.to_string(), &owner_uuid, &owner_input_ref],
        )?)?;
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(found)
    }

    async fn count_entries(
        &self,
        project_id: &ProjectId,
        form_ref: &str,
        parent_uuid: Option<&str>,
    ) -> StorageResult<u64> {
        match parent_uuid {
            Some(parent) => self.query_count(
                "SELECT COUNT(*) FROM entries WHERE project_id = ?1 AND form_ref = ?2 AND parent_uuid = ?3",
                &[&project_id.to_string(), &form_ref, &parent],
            ),
            None => self.query_count(
                "SELECT COUNT(*) FROM entries WHERE project_id = ?1 AND form_ref = ?2",
                &[&project_id.to_string(), &form_ref],
            ),
        }
    }

    async fn count_branch_entries(
        &self,
        project_id: &ProjectId,
        owner_uuid: &str,
        owner_input_ref: &str,
    ) -> StorageResult<u64> {
        self.query_count(
            "SELECT COUNT(*) FROM branch_entries WHERE project_id = ?1 AND owner_uuid = ?2 AND owner_input_ref = ?3",
            &[&project_id.to_string(), &owner_uuid, &owner_input_ref],
        )
    }

    async fn find_answers(&self, query: &AnswerQuery<'_>) -> StorageResult<Vec<Value>> {
        let project_id = query.project_id.to_string();
        let rows = match query.scope {
            AnswerScope::Form { form_ref, parent_uuid: Some(parent) } => self.query_strings(
                "SELECT data FROM entries WHERE project_id = ?1 AND form_ref = ?2 AND uuid != ?3 AND parent_uuid = ?4",
                &[&project_id, &form_ref, &query.exclude_uuid, &parent],
            )?,
            AnswerScope::Form { form_ref, parent_uuid: None } => self.query_strings(
                "SELECT data FROM entries WHERE project_id = ?1 AND form_ref = ?2 AND uuid != ?3",
                &[&project_id, &form_ref, &query.exclude_uuid],
            )?,
            AnswerScope::Branch { owner_input_ref } => self.query_strings(
                "SELECT data FROM branch_entries WHERE project_id = ?1 AND owner_input_ref = ?2 AND uuid != ?3",
                &[&project_id, &owner_input_ref, &query.exclude_uuid],
            )?,
        };

        let mut answers = Vec::with_capacity(rows.len());
        for data in rows {
            let mut row: Value = serde_json::from_str(&data)?;
            if let Some(answer) = row
                .get_mut("answers")
                .and_then(|a| a.get_mut(query.input_ref))
                .and_then(|a| a.get_mut("answer"))
            {
                answers.push(answer.take());
            }
        }
        Ok(answers)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Entry writes
    // ─────────────────────────────────────────────────────────────────────────

    async fn commit_entry(&self, entry: &Entry, mode: WriteMode) -> StorageResult<()> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| StorageError::Transaction(e.to_string()))?;
        let project_id = entry.project_id.to_string();

        match mode {
            WriteMode::Add => {
                if load_entry(&tx, &project_id, &entry.uuid)?.is_some() {
                    return Err(StorageError::DuplicateEntry(entry.uuid.clone()));
                }
                if let Some(parent_uuid) = &entry.parent_uuid {
                    let mut parent = load_entry(&tx, &project_id, parent_uuid)?
                        .ok_or_else(|| StorageError::EntryNotFound(parent_uuid.clone()))?;
                    *parent.child_counts.entry(entry.form_ref.clone()).or_insert(0) += 1;
                    store_entry_data(&tx, &parent)?;
                }
                tx.execute(
                    "INSERT INTO entries (project_id, uuid, form_ref, parent_uuid, data) VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        project_id,
                        entry.uuid,
                        entry.form_ref,
                        entry.parent_uuid,
                        serde_json::to_string(entry)?
                    ],
                )?;
            }
            WriteMode::Edit => {
                let stored = load_entry(&tx, &project_id, &entry.uuid)?
                    .ok_or_else(|| StorageError::EntryNotFound(entry.uuid.clone()))?;
                let mut updated = entry.clone();
                updated.child_counts = stored.child_counts;
                updated.branch_counts = stored.branch_counts;
                store_entry_data(&tx, &updated)?;
            }
        }

        tx.commit().map_err(|e| StorageError::Transaction(e.to_string()))
    }

    async fn commit_branch_entry(&self, entry: &BranchEntry, mode: WriteMode) -> StorageResult<()> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| StorageError::Transaction(e.to_string()))?;
        let project_id = entry.project_id.to_string();
        let data = serde_json::to_string(entry)?;

        match mode {
            WriteMode::Add => {
                let exists: Option<i64> = tx
                    .query_row(
                        "SELECT 1 FROM branch_entries WHERE project_id = ?1 AND uuid = ?2",
                        params![project_id, entry.uuid],
                        |row| row.get(0),
                    )
                    .optional()?;
                if exists.is_some() {
                    return Err(StorageError::DuplicateEntry(entry.uuid.clone()));
                }

                let mut owner = load_entry(&tx, &project_id, &entry.owner_uuid)?
                    .ok_or_else(|| StorageError::EntryNotFound(entry.owner_uuid.clone()))?;
                *owner.branch_counts.entry(entry.owner_input_ref.clone()).or_insert(0) += 1;
                store_entry_data(&tx, &owner)?;

                tx.execute(
                    "INSERT INTO branch_entries (project_id, uuid, form_ref, owner_uuid, owner_input_ref, data)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        project_id,
                        entry.uuid,
                        entry.form_ref,
                        entry.owner_uuid,
                        entry.owner_input_ref,
                        data
                    ],
                )?;
            }
            WriteMode::Edit => {
                let changed = tx.execute(
                    "UPDATE branch_entries SET data = ?3 WHERE project_id = ?1 AND uuid = ?2",
                    params![project_id, entry.uuid, data],
                )?;
                if changed == 0 {
                    return Err(StorageError::EntryNotFound(entry.uuid.clone()));
                }
            }
        }

        tx.commit().map_err(|e| StorageError::Transaction(e.to_string()))
    }

    async fn prune_branch_entries(
        &self,
        project_id: &ProjectId,
        owner_uuid: &str,
        owner_input_ref: &str,
    ) -> StorageResult<u64> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| StorageError::Transaction(e.to_string()))?;
        let project_id = project_id.to_string();

        let removed = tx.execute(
            "DELETE FROM branch_entries WHERE project_id = ?1 AND owner_uuid = ?2 AND owner_input_ref = ?3",
            params![project_id, owner_uuid, owner_input_ref],
        )?;

        if let Some(mut owner) = load_entry(&tx, &project_id, owner_uuid)? {
            owner.branch_counts.insert(owner_input_ref.to_string(), 0);
            store_entry_data(&tx, &owner)?;
        }

        tx.commit().map_err(|e| StorageError::Transaction(e.to_string()))?;
        Ok(removed as u64)
    }

    async fn set_entry_answer(
        &self,
        project_id: &ProjectId,
        uuid: &str,
        input_ref: &str,
        answer: Value,
    ) -> StorageResult<bool> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| StorageError::Transaction(e.to_string()))?;

        let Some(mut entry) = load_entry(&tx, &project_id.to_string(), uuid)? else {
            return Ok(false);
        };
        entry
            .answers
            .entry(input_ref.to_string())
            .or_insert_with(|| AnswerValue::new(Value::Null))
            .answer = answer;
        store_entry_data(&tx, &entry)?;

        tx.commit().map_err(|e| StorageError::Transaction(e.to_string()))?;
        Ok(true)
    }

    async fn set_branch_entry_answer(
        &self,
        project_id: &ProjectId,
        uuid: &str,
        input_ref: &str,
        answer: Value,
    ) -> StorageResult<bool> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| StorageError::Transaction(e.to_string()))?;
        let project_id = project_id.to_string();

        let data: Option<String> = tx
            .query_row(
                "SELECT data FROM branch_entries WHERE project_id = ?1 AND uuid = ?2",
                params![project_id, uuid],
                |row| row.get(0),
            )
            .optional()?;
        let Some(data) = data else {
            return Ok(false);
        };

        let mut entry: BranchEntry = serde_json::from_str(&data)?;
        entry
            .answers
            .entry(input_ref.to_string())
            .or_insert_with(|| AnswerValue::new(Value::Null))
            .answer = answer;
        tx.execute(
            "UPDATE branch_entries SET data = ?3 WHERE project_id = ?1 AND uuid = ?2",
            params![project_id, uuid, serde_json::to_string(&entry)?],
        )?;

        tx.commit().map_err(|e| StorageError::Transaction(e.to_string()))?;
        Ok(true)
    }

    async fn delete_project_entries(&self, project_id: &ProjectId) -> StorageResult<u64> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| StorageError::Transaction(e.to_string()))?;
        let project_id = project_id.to_string();

        let branches = tx.execute("DELETE FROM branch_entries WHERE project_id = ?1", params![project_id])?;
        let entries = tx.execute("DELETE FROM entries WHERE project_id = ?1", params![project_id])?;

        tx.commit().map_err(|e| StorageError::Transaction(e.to_string()))?;
        Ok((branches + entries) as u64)
    }
}
