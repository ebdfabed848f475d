use std::path::Path;
use thiserror::Error;
use tokio_rusqlite::Connection;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] tokio_rusqlite::Error),
    #[error("rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
    #[error("attendance already marked for {student} in {subject} today")]
    AlreadyMarked { student: String, subject: String },
}

/// One recorded attendance entry with the liveness evidence it was marked
/// under.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AttendanceRecord {
    pub id: String,
    pub subject: String,
    pub student: String,
    pub marked_at: String,
    pub liveness_score: f64,
    pub anti_spoofing_score: f64,
    pub real_person_score: f64,
    pub reason: String,
}

/// SQLite-backed attendance ledger.
///
/// Each record carries the scores the marking decision was gated on, so an
/// audit can reconstruct why any entry was accepted. A uniqueness index on
/// (subject, student, calendar day) makes duplicate marking a first-class
/// error rather than a silent second row.
#[derive(Clone)]
pub struct AttendanceStore {
    conn: Connection,
}

impl AttendanceStore {
    /// Open (or create) the database at the given path and run migrations.
    pub async fn open(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 CREATE TABLE IF NOT EXISTS attendance (
                     id TEXT PRIMARY KEY,
                     subject TEXT NOT NULL,
                     student TEXT NOT NULL,
                     marked_at TEXT NOT NULL,
                     marked_on TEXT NOT NULL,
                     liveness_score REAL NOT NULL,
                     anti_spoofing_score REAL NOT NULL,
                     real_person_score REAL NOT NULL,
                     reason TEXT NOT NULL
                 );
                 CREATE UNIQUE INDEX IF NOT EXISTS idx_attendance_daily
                     ON attendance(subject, student, marked_on);
                 CREATE INDEX IF NOT EXISTS idx_attendance_subject
                     ON attendance(subject);",
            )?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    /// Record attendance. Returns the generated record id, or
    /// [`StoreError::AlreadyMarked`] for a same-day duplicate.
    pub async fn mark(
        &self,
        subject: &str,
        student: &str,
        liveness_score: f64,
        anti_spoofing_score: f64,
        real_person_score: f64,
        reason: &str,
    ) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now();
        let marked_at = now.to_rfc3339();
        let marked_on = now.date_naive().to_string();

        let id_clone = id.clone();
        let subject = subject.to_string();
        let student = student.to_string();
        let reason = reason.to_string();

        let inserted = self
            .conn
            .call(move |conn| {
                let result = conn.execute(
                    "INSERT OR IGNORE INTO attendance
                         (id, subject, student, marked_at, marked_on,
                          liveness_score, anti_spoofing_score, real_person_score, reason)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    rusqlite::params![
                        id_clone,
                        subject,
                        student,
                        marked_at,
                        marked_on,
                        liveness_score,
                        anti_spoofing_score,
                        real_person_score,
                        reason
                    ],
                )?;
                Ok((result > 0, subject, student))
            })
            .await?;

        let (inserted, subject, student) = inserted;
        if !inserted {
            return Err(StoreError::AlreadyMarked { student, subject });
        }
        Ok(id)
    }

    /// List attendance records for a subject, oldest first.
    pub async fn list_by_subject(
        &self,
        subject: &str,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let subject = subject.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, subject, student, marked_at,
                            liveness_score, anti_spoofing_score, real_person_score, reason
                     FROM attendance WHERE subject = ?1 ORDER BY marked_at",
                )?;
                let rows = stmt.query_map([&subject], |row| {
                    Ok(AttendanceRecord {
                        id: row.get(0)?,
                        subject: row.get(1)?,
                        student: row.get(2)?,
                        marked_at: row.get(3)?,
                        liveness_score: row.get(4)?,
                        anti_spoofing_score: row.get(5)?,
                        real_person_score: row.get(6)?,
                        reason: row.get(7)?,
                    })
                })?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await
            .map_err(StoreError::from)
    }

    /// Count records across all subjects.
    pub async fn count_all(&self) -> Result<u64, StoreError> {
        self.conn
            .call(|conn| {
                let count: u64 =
                    conn.query_row("SELECT COUNT(*) FROM attendance", [], |row| row.get(0))?;
                Ok(count)
            })
            .await
            .map_err(StoreError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> AttendanceStore {
        AttendanceStore::open(Path::new(":memory:")).await.unwrap()
    }

    #[tokio::test]
    async fn mark_and_list_roundtrip() {
        let store = memory_store().await;

        let id = store
            .mark(
                "cs101",
                "s-204",
                92.0,
                100.0,
                90.0,
                "Liveness score: 92% | Anti-spoofing: 100%",
            )
            .await
            .unwrap();
        assert!(!id.is_empty());

        let records = store.list_by_subject("cs101").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, id);
        assert_eq!(records[0].student, "s-204");
        assert_eq!(records[0].liveness_score, 92.0);
    }

    #[tokio::test]
    async fn same_day_duplicate_is_rejected() {
        let store = memory_store().await;

        store
            .mark("cs101", "s-204", 92.0, 100.0, 90.0, "ok")
            .await
            .unwrap();
        let err = store
            .mark("cs101", "s-204", 95.0, 100.0, 95.0, "ok")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyMarked { .. }));

        assert_eq!(store.count_all().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_guard_is_scoped_to_subject() {
        let store = memory_store().await;

        store
            .mark("cs101", "s-204", 92.0, 100.0, 90.0, "ok")
            .await
            .unwrap();
        // Same student, different subject: allowed
        store
            .mark("ma201", "s-204", 92.0, 100.0, 90.0, "ok")
            .await
            .unwrap();

        assert_eq!(store.list_by_subject("cs101").await.unwrap().len(), 1);
        assert_eq!(store.list_by_subject("ma201").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn listing_unknown_subject_is_empty() {
        let store = memory_store().await;
        assert!(store.list_by_subject("none").await.unwrap().is_empty());
        assert_eq!(store.count_all().await.unwrap(), 0);
    }
}
