use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};

use crate::error::Result;
use crate::models::{ReviewEntry, ReviewListKind, WordId, sorted_ids};

/// Blacklist and graylist entries of one project.
///
/// Blacklist entries are project-wide and stored with an empty user id.
/// Graylist entries belong to the user who deferred them.
pub trait ReviewRepository {
    /// Returns false if the same set was already listed.
    fn add(&self, kind: ReviewListKind, user_id: Option<&str>, ids: &[WordId]) -> Result<bool>;
    fn contains(&self, kind: ReviewListKind, user_id: Option<&str>, ids: &[WordId]) -> Result<bool>;
    fn remove(&self, kind: ReviewListKind, user_id: Option<&str>, ids: &[WordId]) -> Result<bool>;
    /// Oldest first.
    fn list(&self, kind: ReviewListKind, user_id: Option<&str>) -> Result<Vec<ReviewEntry>>;
    /// Every listed id set of `kind`, across all users.
    fn id_sets(&self, kind: ReviewListKind) -> Result<Vec<Vec<WordId>>>;
}

pub struct SqliteReviewRepository<'a> {
    conn: &'a Connection,
    project_id: &'a str,
}

impl<'a> SqliteReviewRepository<'a> {
    pub fn new(conn: &'a Connection, project_id: &'a str) -> Self {
        Self { conn, project_id }
    }

    fn key(ids: &[WordId]) -> Result<String> {
        Ok(serde_json::to_string(&sorted_ids(ids.iter().cloned()))?)
    }
}

impl<'a> ReviewRepository for SqliteReviewRepository<'a> {
    fn add(&self, kind: ReviewListKind, user_id: Option<&str>, ids: &[WordId]) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO review_lists (kind, project_id, user_id, word_ids, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                kind.to_string(),
                self.project_id,
                user_id.unwrap_or_default(),
                Self::key(ids)?,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(inserted > 0)
    }

    fn contains(&self, kind: ReviewListKind, user_id: Option<&str>, ids: &[WordId]) -> Result<bool> {
        let found = self
            .conn
            .prepare(
                "SELECT 1 FROM review_lists
                 WHERE kind = ?1 AND project_id = ?2 AND user_id = ?3 AND word_ids = ?4",
            )?
            .exists(params![
                kind.to_string(),
                self.project_id,
                user_id.unwrap_or_default(),
                Self::key(ids)?,
            ])?;
        Ok(found)
    }

    fn remove(&self, kind: ReviewListKind, user_id: Option<&str>, ids: &[WordId]) -> Result<bool> {
        let deleted = self.conn.execute(
            "DELETE FROM review_lists
             WHERE kind = ?1 AND project_id = ?2 AND user_id = ?3 AND word_ids = ?4",
            params![
                kind.to_string(),
                self.project_id,
                user_id.unwrap_or_default(),
                Self::key(ids)?,
            ],
        )?;
        Ok(deleted > 0)
    }

    fn list(&self, kind: ReviewListKind, user_id: Option<&str>) -> Result<Vec<ReviewEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, word_ids, created_at FROM review_lists
             WHERE kind = ?1 AND project_id = ?2 AND user_id = ?3
             ORDER BY created_at, rowid",
        )?;
        let rows = stmt
            .query_map(
                params![kind.to_string(), self.project_id, user_id.unwrap_or_default()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut entries = Vec::with_capacity(rows.len());
        for (user, word_ids, created_at) in rows {
            entries.push(ReviewEntry {
                kind,
                project_id: self.project_id.to_string(),
                user_id: (!user.is_empty()).then_some(user),
                word_ids: serde_json::from_str(&word_ids)?,
                created_at: DateTime::parse_from_rfc3339(&created_at)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_default(),
            });
        }
        Ok(entries)
    }

    fn id_sets(&self, kind: ReviewListKind) -> Result<Vec<Vec<WordId>>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT word_ids FROM review_lists WHERE kind = ?1 AND project_id = ?2",
        )?;
        let keys = stmt
            .query_map(params![kind.to_string(), self.project_id], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        keys.iter()
            .map(|k| Ok(serde_json::from_str(k)?))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::init_schema;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn ids(raw: &[&str]) -> Vec<WordId> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_add_is_order_insensitive_and_idempotent() {
        let conn = conn();
        let repo = SqliteReviewRepository::new(&conn, "p1");

        assert!(repo.add(ReviewListKind::Blacklist, None, &ids(&["b", "a"])).unwrap());
        assert!(!repo.add(ReviewListKind::Blacklist, None, &ids(&["a", "b"])).unwrap());
        assert!(repo.contains(ReviewListKind::Blacklist, None, &ids(&["a", "b"])).unwrap());
        assert_eq!(repo.id_sets(ReviewListKind::Blacklist).unwrap(), vec![ids(&["a", "b"])]);
    }

    #[test]
    fn test_graylist_is_per_user() {
        let conn = conn();
        let repo = SqliteReviewRepository::new(&conn, "p1");
        repo.add(ReviewListKind::Graylist, Some("u1"), &ids(&["a", "b"])).unwrap();

        assert_eq!(repo.list(ReviewListKind::Graylist, Some("u1")).unwrap().len(), 1);
        assert!(repo.list(ReviewListKind::Graylist, Some("u2")).unwrap().is_empty());
        assert!(repo.list(ReviewListKind::Blacklist, None).unwrap().is_empty());

        let entry = &repo.list(ReviewListKind::Graylist, Some("u1")).unwrap()[0];
        assert_eq!(entry.user_id.as_deref(), Some("u1"));
        assert_eq!(entry.word_ids, ids(&["a", "b"]));
    }

    #[test]
    fn test_remove() {
        let conn = conn();
        let repo = SqliteReviewRepository::new(&conn, "p1");
        repo.add(ReviewListKind::Graylist, Some("u1"), &ids(&["a", "b"])).unwrap();

        assert!(repo.remove(ReviewListKind::Graylist, Some("u1"), &ids(&["b", "a"])).unwrap());
        assert!(!repo.remove(ReviewListKind::Graylist, Some("u1"), &ids(&["a", "b"])).unwrap());
    }
}
