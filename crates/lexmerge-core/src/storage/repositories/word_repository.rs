use rusqlite::{Connection, OptionalExtension, params};

use crate::error::Result;
use crate::models::{Word, WordId};

use super::Repository;

/// Words of one project. Retired words stay in the table with
/// `frontier = 0` so merges can be undone and history resolved.
pub trait WordRepository: Repository<Entity = Word, Id = WordId> {
    fn list_frontier(&self) -> Result<Vec<Word>>;
    fn find_frontier(&self, id: &str) -> Result<Option<Word>>;
    fn find_frontier_by_vernacular(&self, vernacular: &str) -> Result<Vec<Word>>;
    fn count_frontier(&self) -> Result<usize>;
    /// Remove from the frontier. Returns false if the id was not there.
    fn retire(&self, id: &str) -> Result<bool>;
}

pub struct SqliteWordRepository<'a> {
    conn: &'a Connection,
    project_id: &'a str,
}

impl<'a> SqliteWordRepository<'a> {
    pub fn new(conn: &'a Connection, project_id: &'a str) -> Self {
        Self { conn, project_id }
    }

    fn row_to_body(row: &rusqlite::Row) -> rusqlite::Result<String> {
        row.get::<_, String>(0)
    }

    fn parse_body(body: &str) -> Result<Word> {
        Ok(serde_json::from_str(body)?)
    }

    fn parse_all(bodies: Vec<String>) -> Result<Vec<Word>> {
        bodies.iter().map(|body| Self::parse_body(body)).collect()
    }
}

impl<'a> Repository for SqliteWordRepository<'a> {
    type Entity = Word;
    type Id = WordId;

    fn find_by_id(&self, id: &Self::Id) -> Result<Option<Self::Entity>> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM words WHERE project_id = ?1 AND id = ?2",
                params![self.project_id, id],
                Self::row_to_body,
            )
            .optional()?;
        body.as_deref().map(Self::parse_body).transpose()
    }

    /// Insert or overwrite the stored record and put it on the frontier.
    fn save(&self, word: &Self::Entity) -> Result<()> {
        let body = serde_json::to_string(word)?;
        self.conn.execute(
            "INSERT INTO words (id, project_id, guid, vernacular, body, frontier, created_at, modified_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                guid = excluded.guid,
                vernacular = excluded.vernacular,
                body = excluded.body,
                frontier = 1,
                modified_at = excluded.modified_at",
            params![
                word.id,
                self.project_id,
                word.guid.to_string(),
                word.vernacular,
                body,
                word.created.to_rfc3339(),
                word.modified.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn delete(&self, id: &Self::Id) -> Result<bool> {
        let deleted = self.conn.execute(
            "DELETE FROM words WHERE project_id = ?1 AND id = ?2",
            params![self.project_id, id],
        )?;
        Ok(deleted > 0)
    }
}

impl<'a> WordRepository for SqliteWordRepository<'a> {
    fn list_frontier(&self) -> Result<Vec<Word>> {
        let mut stmt = self.conn.prepare(
            "SELECT body FROM words WHERE project_id = ?1 AND frontier = 1
             ORDER BY created_at, id",
        )?;
        let bodies = stmt
            .query_map(params![self.project_id], Self::row_to_body)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Self::parse_all(bodies)
    }

    fn find_frontier(&self, id: &str) -> Result<Option<Word>> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM words WHERE project_id = ?1 AND id = ?2 AND frontier = 1",
                params![self.project_id, id],
                Self::row_to_body,
            )
            .optional()?;
        body.as_deref().map(Self::parse_body).transpose()
    }

    fn find_frontier_by_vernacular(&self, vernacular: &str) -> Result<Vec<Word>> {
        let mut stmt = self.conn.prepare(
            "SELECT body FROM words
             WHERE project_id = ?1 AND frontier = 1 AND vernacular = ?2
             ORDER BY created_at, id",
        )?;
        let bodies = stmt
            .query_map(params![self.project_id, vernacular], Self::row_to_body)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Self::parse_all(bodies)
    }

    fn count_frontier(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM words WHERE project_id = ?1 AND frontier = 1",
            params![self.project_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn retire(&self, id: &str) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE words SET frontier = 0 WHERE project_id = ?1 AND id = ?2 AND frontier = 1",
            params![self.project_id, id],
        )?;
        Ok(changed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Sense;
    use crate::storage::database::init_schema;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn test_save_and_find_roundtrip() {
        let conn = conn();
        let repo = SqliteWordRepository::new(&conn, "p1");
        let word = Word::new("nyumba").with_sense(Sense::new().with_gloss("en", "house"));

        repo.save(&word).unwrap();
        assert_eq!(repo.find_by_id(&word.id).unwrap(), Some(word.clone()));
        assert_eq!(repo.find_frontier(&word.id).unwrap(), Some(word));
    }

    #[test]
    fn test_projects_are_isolated() {
        let conn = conn();
        let word = Word::new("a");
        SqliteWordRepository::new(&conn, "p1").save(&word).unwrap();

        let other = SqliteWordRepository::new(&conn, "p2");
        assert!(other.find_by_id(&word.id).unwrap().is_none());
        assert!(other.list_frontier().unwrap().is_empty());
    }

    #[test]
    fn test_retire_removes_from_frontier_only_once() {
        let conn = conn();
        let repo = SqliteWordRepository::new(&conn, "p1");
        let word = Word::new("a");
        repo.save(&word).unwrap();

        assert!(repo.retire(&word.id).unwrap());
        assert!(!repo.retire(&word.id).unwrap());
        assert!(repo.find_frontier(&word.id).unwrap().is_none());
        assert!(repo.find_by_id(&word.id).unwrap().is_some());
        assert_eq!(repo.count_frontier().unwrap(), 0);
    }

    #[test]
    fn test_find_by_vernacular_skips_retired() {
        let conn = conn();
        let repo = SqliteWordRepository::new(&conn, "p1");
        let live = Word::new("mbwa");
        let gone = Word::new("mbwa");
        repo.save(&live).unwrap();
        repo.save(&gone).unwrap();
        repo.retire(&gone.id).unwrap();

        let found = repo.find_frontier_by_vernacular("mbwa").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, live.id);
    }

    #[test]
    fn test_delete() {
        let conn = conn();
        let repo = SqliteWordRepository::new(&conn, "p1");
        let word = Word::new("a");
        repo.save(&word).unwrap();
        assert!(repo.delete(&word.id).unwrap());
        assert!(!repo.delete(&word.id).unwrap());
    }
}
