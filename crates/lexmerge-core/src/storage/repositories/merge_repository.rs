use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use crate::error::{LexiconError, Result};
use crate::models::{MergeRecord, WordId, sorted_ids};

use super::Repository;

pub trait MergeRepository: Repository<Entity = MergeRecord, Id = Uuid> {
    /// The not-yet-undone record with exactly these parent and child id sets.
    fn find_active(&self, parent_ids: &[WordId], child_ids: &[WordId]) -> Result<Option<MergeRecord>>;
    fn mark_undone(&self, id: &Uuid) -> Result<bool>;
    fn list_recent(&self, limit: usize) -> Result<Vec<MergeRecord>>;
}

pub struct SqliteMergeRepository<'a> {
    conn: &'a Connection,
    project_id: &'a str,
}

const RECORD_COLUMNS: &str =
    "id, project_id, user_id, parent_ids, child_ids, snapshots, created_at, undone";

impl<'a> SqliteMergeRepository<'a> {
    pub fn new(conn: &'a Connection, project_id: &'a str) -> Self {
        Self { conn, project_id }
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<RawRecord> {
        Ok(RawRecord {
            id: row.get(0)?,
            project_id: row.get(1)?,
            user_id: row.get(2)?,
            parent_ids: row.get(3)?,
            child_ids: row.get(4)?,
            snapshots: row.get(5)?,
            created_at: row.get(6)?,
            undone: row.get(7)?,
        })
    }
}

struct RawRecord {
    id: String,
    project_id: String,
    user_id: String,
    parent_ids: String,
    child_ids: String,
    snapshots: String,
    created_at: String,
    undone: bool,
}

impl RawRecord {
    fn decode(self) -> Result<MergeRecord> {
        Ok(MergeRecord {
            id: Uuid::parse_str(&self.id).map_err(|e| {
                LexiconError::ValidationError(format!("bad merge record id {}: {e}", self.id))
            })?,
            project_id: self.project_id,
            user_id: self.user_id,
            parent_ids: serde_json::from_str(&self.parent_ids)?,
            child_ids: serde_json::from_str(&self.child_ids)?,
            snapshots: serde_json::from_str(&self.snapshots)?,
            created_at: DateTime::parse_from_rfc3339(&self.created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_default(),
            undone: self.undone,
        })
    }
}

impl<'a> Repository for SqliteMergeRepository<'a> {
    type Entity = MergeRecord;
    type Id = Uuid;

    fn find_by_id(&self, id: &Self::Id) -> Result<Option<Self::Entity>> {
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM merge_records WHERE project_id = ?1 AND id = ?2"),
                params![self.project_id, id.to_string()],
                Self::row_to_record,
            )
            .optional()?;
        raw.map(RawRecord::decode).transpose()
    }

    fn save(&self, record: &Self::Entity) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO merge_records
                (id, project_id, user_id, parent_ids, child_ids, snapshots, created_at, undone)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.id.to_string(),
                self.project_id,
                record.user_id,
                serde_json::to_string(&sorted_ids(record.parent_ids.iter().cloned()))?,
                serde_json::to_string(&sorted_ids(record.child_ids.iter().cloned()))?,
                serde_json::to_string(&record.snapshots)?,
                record.created_at.to_rfc3339(),
                record.undone,
            ],
        )?;
        Ok(())
    }

    fn delete(&self, id: &Self::Id) -> Result<bool> {
        let deleted = self.conn.execute(
            "DELETE FROM merge_records WHERE project_id = ?1 AND id = ?2",
            params![self.project_id, id.to_string()],
        )?;
        Ok(deleted > 0)
    }
}

impl<'a> MergeRepository for SqliteMergeRepository<'a> {
    fn find_active(&self, parent_ids: &[WordId], child_ids: &[WordId]) -> Result<Option<MergeRecord>> {
        let parents = serde_json::to_string(&sorted_ids(parent_ids.iter().cloned()))?;
        let children = serde_json::to_string(&sorted_ids(child_ids.iter().cloned()))?;

        let raw = self
            .conn
            .query_row(
                &format!(
                    "SELECT {RECORD_COLUMNS} FROM merge_records
                     WHERE project_id = ?1 AND parent_ids = ?2 AND child_ids = ?3 AND undone = 0
                     ORDER BY created_at DESC LIMIT 1"
                ),
                params![self.project_id, parents, children],
                Self::row_to_record,
            )
            .optional()?;
        raw.map(RawRecord::decode).transpose()
    }

    fn mark_undone(&self, id: &Uuid) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE merge_records SET undone = 1 WHERE project_id = ?1 AND id = ?2 AND undone = 0",
            params![self.project_id, id.to_string()],
        )?;
        Ok(changed > 0)
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<MergeRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM merge_records WHERE project_id = ?1
             ORDER BY created_at DESC LIMIT ?2"
        ))?;
        let raws = stmt
            .query_map(params![self.project_id, limit as i64], Self::row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        raws.into_iter().map(RawRecord::decode).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Word;
    use crate::storage::database::init_schema;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn record() -> MergeRecord {
        let mut a = Word::new("a");
        a.id = "child-b".to_string();
        let mut b = Word::new("b");
        b.id = "child-a".to_string();
        let children = vec![a.id.clone(), b.id.clone()];
        MergeRecord::new("p1", "u1", vec!["parent".to_string()], children, vec![a, b])
    }

    #[test]
    fn test_find_active_ignores_id_order() {
        let conn = conn();
        let repo = SqliteMergeRepository::new(&conn, "p1");
        let record = record();
        repo.save(&record).unwrap();

        let found = repo
            .find_active(
                &["parent".to_string()],
                &["child-b".to_string(), "child-a".to_string()],
            )
            .unwrap()
            .unwrap();
        assert_eq!(found.id, record.id);
        assert_eq!(found.snapshots, record.snapshots);
    }

    #[test]
    fn test_mark_undone_hides_record() {
        let conn = conn();
        let repo = SqliteMergeRepository::new(&conn, "p1");
        let record = record();
        repo.save(&record).unwrap();

        assert!(repo.mark_undone(&record.id).unwrap());
        assert!(!repo.mark_undone(&record.id).unwrap());
        assert!(
            repo.find_active(&record.parent_ids, &record.child_ids)
                .unwrap()
                .is_none()
        );
        assert!(repo.find_by_id(&record.id).unwrap().unwrap().undone);
    }

    #[test]
    fn test_list_recent_is_project_scoped() {
        let conn = conn();
        SqliteMergeRepository::new(&conn, "p1").save(&record()).unwrap();

        assert_eq!(SqliteMergeRepository::new(&conn, "p1").list_recent(10).unwrap().len(), 1);
        assert!(SqliteMergeRepository::new(&conn, "p2").list_recent(10).unwrap().is_empty());
    }
}
