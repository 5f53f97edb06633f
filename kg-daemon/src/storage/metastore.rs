//! MetaStore - DuckDB-based storage for construction metadata.

use chrono::{DateTime, Utc};
use duckdb::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use super::job::{ConstructionJob, GraphShape, JobPatch};
use super::schema::{ConstructionStatus, ACTIVE_STATUS_SQL, SCHEMA_SQL, SCHEMA_VERSION};
use crate::error::{KgError, Result};

const SELECT_COLUMNS: &str = "SELECT graph_id, cluster_id, job_id, status, progress, \
     source_host, source_port, source_path, is_edge_list, is_directed, error, \
     started_at, updated_at FROM constructions";

/// Durable keyed store of construction records.
///
/// Every operation runs under one connection mutex, so reads and
/// read-modify-write updates are linearizable for every key.
pub struct MetaStore {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

/// Raw column values, converted to a `ConstructionJob` outside the row closure.
struct JobRow {
    graph_id: String,
    cluster_id: String,
    job_id: String,
    status: String,
    progress: i32,
    source_host: String,
    source_port: i32,
    source_path: String,
    is_edge_list: bool,
    is_directed: bool,
    error: Option<String>,
    started_at: i64,
    updated_at: i64,
}

impl TryFrom<JobRow> for ConstructionJob {
    type Error = KgError;

    fn try_from(row: JobRow) -> Result<Self> {
        let status = ConstructionStatus::parse(&row.status).ok_or_else(|| KgError::CorruptRecord {
            message: format!("unknown status '{}' stored for {}", row.status, row.graph_id),
        })?;
        Ok(ConstructionJob {
            job_id: row.job_id,
            graph_id: row.graph_id,
            cluster_id: row.cluster_id,
            status,
            progress: row.progress.clamp(0, 100) as u8,
            source_host: row.source_host,
            source_port: u16::try_from(row.source_port).unwrap_or_default(),
            source_path: row.source_path,
            shape: GraphShape {
                is_edge_list: row.is_edge_list,
                is_directed: row.is_directed,
            },
            started_at: from_millis(row.started_at),
            updated_at: from_millis(row.updated_at),
            error: row.error,
        })
    }
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_default()
}

impl MetaStore {
    /// Open or create a store at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Open a throwaway in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(Connection::open_in_memory()?)),
            path: None,
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Database file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Acquire the connection lock, recovering from a poisoned mutex.
    /// The connection itself stays usable when a previous holder panicked.
    fn acquire_conn(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Recovering from poisoned metadata store mutex");
                poisoned.into_inner()
            }
        }
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.acquire_conn();
        conn.execute_batch(SCHEMA_SQL)?;
        conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?)",
            params![SCHEMA_VERSION],
        )?;
        Ok(())
    }

    /// Stored schema version.
    pub fn schema_version(&self) -> Result<String> {
        let conn = self.acquire_conn();
        let version = conn.query_row(
            "SELECT value FROM metadata WHERE key = 'schema_version'",
            [],
            |row| row.get::<_, String>(0),
        )?;
        Ok(version)
    }

    /// Persist a new record for `job`'s (graph, cluster) pair.
    ///
    /// Fails with `Conflict` when the cluster already has an active job, or
    /// when the pair's previous record has not reached a terminal status.
    /// A terminal predecessor is overwritten.
    pub fn create(&self, job: &ConstructionJob) -> Result<String> {
        let conn = self.acquire_conn();

        if job.status.is_active() {
            let active = select_jobs(
                &conn,
                &format!(
                    "WHERE cluster_id = ? AND status IN {} ORDER BY started_at DESC LIMIT 1",
                    ACTIVE_STATUS_SQL
                ),
                params![job.cluster_id],
            )?;
            if let Some(existing) = active.into_iter().next() {
                return Err(KgError::Conflict {
                    cluster_id: existing.cluster_id,
                    graph_id: existing.graph_id,
                });
            }
        }

        let previous = select_jobs(
            &conn,
            "WHERE graph_id = ? AND cluster_id = ?",
            params![job.graph_id, job.cluster_id],
        )?;
        if let Some(existing) = previous.into_iter().next() {
            if !existing.status.is_terminal() {
                return Err(KgError::Conflict {
                    cluster_id: existing.cluster_id,
                    graph_id: existing.graph_id,
                });
            }
            conn.execute(
                "DELETE FROM constructions WHERE graph_id = ? AND cluster_id = ?",
                params![job.graph_id, job.cluster_id],
            )?;
        }

        conn.execute(
            r#"INSERT INTO constructions
               (graph_id, cluster_id, job_id, status, progress, source_host, source_port,
                source_path, is_edge_list, is_directed, error, started_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                job.graph_id,
                job.cluster_id,
                job.job_id,
                job.status.as_str(),
                job.progress as i32,
                job.source_host,
                job.source_port as i32,
                job.source_path,
                job.shape.is_edge_list,
                job.shape.is_directed,
                job.error,
                job.started_at.timestamp_millis(),
                job.updated_at.timestamp_millis(),
            ],
        )?;

        tracing::debug!(
            graph_id = %job.graph_id,
            cluster_id = %job.cluster_id,
            job_id = %job.job_id,
            status = %job.status,
            "construction record created"
        );
        Ok(job.job_id.clone())
    }

    /// Most recently started record for a graph.
    pub fn get(&self, graph_id: &str) -> Result<ConstructionJob> {
        let conn = self.acquire_conn();
        select_jobs(
            &conn,
            "WHERE graph_id = ? ORDER BY started_at DESC LIMIT 1",
            params![graph_id],
        )?
        .into_iter()
        .next()
        .ok_or_else(|| KgError::not_found(format!("graph '{}'", graph_id)))
    }

    /// Patch the most recently started record on a cluster.
    ///
    /// Never creates a record; fails with `NotFound` when the cluster has none.
    pub fn update(&self, cluster_id: &str, patch: &JobPatch) -> Result<ConstructionJob> {
        self.update_tracked(cluster_id, patch).map(|(_, job)| job)
    }

    /// `update`, also returning the record as it was before the patch.
    pub fn update_tracked(
        &self,
        cluster_id: &str,
        patch: &JobPatch,
    ) -> Result<(ConstructionJob, ConstructionJob)> {
        let conn = self.acquire_conn();
        let previous = select_jobs(
            &conn,
            "WHERE cluster_id = ? ORDER BY started_at DESC LIMIT 1",
            params![cluster_id],
        )?
        .into_iter()
        .next()
        .ok_or_else(|| KgError::not_found(format!("cluster '{}'", cluster_id)))?;

        let mut job = previous.clone();
        if patch.apply(&mut job)? {
            write_mutable_fields(&conn, &job)?;
        }
        Ok((previous, job))
    }

    /// Atomic read-modify-write of one (graph, cluster) record.
    ///
    /// `f` sees the current record and may mutate it (normally through
    /// `JobPatch::apply`); the result is written back if it differs.
    pub fn modify<F>(&self, graph_id: &str, cluster_id: &str, f: F) -> Result<ConstructionJob>
    where
        F: FnOnce(&mut ConstructionJob) -> Result<()>,
    {
        let conn = self.acquire_conn();
        let current = find_pair(&conn, graph_id, cluster_id)?;
        let mut job = current.clone();
        f(&mut job)?;
        if job != current {
            write_mutable_fields(&conn, &job)?;
        }
        Ok(job)
    }

    /// Snapshot of every record whose job is still active.
    pub fn list_in_progress(&self) -> Result<Vec<ConstructionJob>> {
        let conn = self.acquire_conn();
        select_jobs(
            &conn,
            &format!("WHERE status IN {} ORDER BY started_at", ACTIVE_STATUS_SQL),
            [],
        )
    }

    /// Fail every record left active by a previous process.
    pub fn fail_interrupted(&self, message: &str) -> Result<usize> {
        let conn = self.acquire_conn();
        let stale = select_jobs(
            &conn,
            &format!("WHERE status IN {}", ACTIVE_STATUS_SQL),
            [],
        )?;
        for mut job in stale.iter().cloned() {
            job.status = ConstructionStatus::Failed;
            job.error = Some(message.to_string());
            job.updated_at = Utc::now();
            write_mutable_fields(&conn, &job)?;
            tracing::warn!(
                graph_id = %job.graph_id,
                cluster_id = %job.cluster_id,
                "marked interrupted construction as failed"
            );
        }
        Ok(stale.len())
    }
}

fn find_pair(conn: &Connection, graph_id: &str, cluster_id: &str) -> Result<ConstructionJob> {
    select_jobs(
        conn,
        "WHERE graph_id = ? AND cluster_id = ?",
        params![graph_id, cluster_id],
    )?
    .into_iter()
    .next()
    .ok_or_else(|| {
        KgError::not_found(format!("graph '{}' on cluster '{}'", graph_id, cluster_id))
    })
}

fn select_jobs<P: duckdb::Params>(
    conn: &Connection,
    where_sql: &str,
    params: P,
) -> Result<Vec<ConstructionJob>> {
    let sql = format!("{} {}", SELECT_COLUMNS, where_sql);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params, |row| {
        Ok(JobRow {
            graph_id: row.get(0)?,
            cluster_id: row.get(1)?,
            job_id: row.get(2)?,
            status: row.get(3)?,
            progress: row.get(4)?,
            source_host: row.get(5)?,
            source_port: row.get(6)?,
            source_path: row.get(7)?,
            is_edge_list: row.get(8)?,
            is_directed: row.get(9)?,
            error: row.get(10)?,
            started_at: row.get(11)?,
            updated_at: row.get(12)?,
        })
    })?;

    let mut jobs = Vec::new();
    for row in rows {
        jobs.push(ConstructionJob::try_from(row?)?);
    }
    Ok(jobs)
}

/// Write back status, progress, error and updated_at. Identity columns never change.
fn write_mutable_fields(conn: &Connection, job: &ConstructionJob) -> Result<()> {
    conn.execute(
        "UPDATE constructions SET status = ?, progress = ?, error = ?, updated_at = ? \
         WHERE graph_id = ? AND cluster_id = ?",
        params![
            job.status.as_str(),
            job.progress as i32,
            job.error,
            job.updated_at.timestamp_millis(),
            job.graph_id,
            job.cluster_id,
        ],
    )?;
    Ok(())
}
