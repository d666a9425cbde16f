use rusqlite::Connection;

use super::Migration;
use crate::error::Result;
use crate::storage::database::schema;

pub struct V2ReviewLists;

impl Migration for V2ReviewLists {
    fn version(&self) -> u32 {
        2
    }

    fn description(&self) -> &'static str {
        "Add review_lists table for blacklisted and graylisted clusters"
    }

    fn up(&self, conn: &Connection) -> Result<()> {
        schema::create_review_lists(conn)?;
        conn.execute_batch(
            "CREATE INDEX IF NOT EXISTS idx_review_lists_user ON review_lists(kind, project_id, user_id);",
        )?;
        Ok(())
    }
}
