//! Schedule repository for reminders and calendar entries

use chrono::{DateTime, NaiveDateTime, Utc};
use uuid::Uuid;

use super::DbPool;
use crate::protocol::ScheduleOption;
use crate::{Error, Result};

/// A stored reminder or calendar entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleItem {
    pub id: String,
    pub title: String,
    /// When it is due, as the user phrased it ("tomorrow at 3pm")
    pub due: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ScheduleItem {
    /// Disambiguation option for this item
    #[must_use]
    pub fn to_option(&self) -> ScheduleOption {
        ScheduleOption {
            id: self.id.clone(),
            title: self.title.clone(),
            when: self.due.clone(),
        }
    }
}

/// Schedule repository for CRUD operations on schedule items
#[derive(Clone)]
pub struct ScheduleRepo {
    pool: DbPool,
}

impl ScheduleRepo {
    /// Create a new schedule repository
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Add an item
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn create(&self, title: &str, due: Option<&str>) -> Result<ScheduleItem> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        let id = Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO schedule_items (id, title, due) VALUES (?1, ?2, ?3)",
            rusqlite::params![id, title, due],
        )?;

        tracing::info!(item_id = %id, "schedule item created");

        Ok(ScheduleItem {
            id,
            title: title.to_string(),
            due: due.map(str::to_string),
            created_at: Utc::now(),
        })
    }

    /// Get an item by id
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get(&self, id: &str) -> Result<Option<ScheduleItem>> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        let result = conn.query_row(
            "SELECT id, title, due, created_at FROM schedule_items WHERE id = ?1",
            rusqlite::params![id],
            Self::row_to_item,
        );

        match result {
            Ok(item) => Ok(Some(item)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Error::Database(e.to_string())),
        }
    }

    /// List all items, oldest first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list(&self) -> Result<Vec<ScheduleItem>> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn.prepare(
            "SELECT id, title, due, created_at FROM schedule_items ORDER BY created_at, rowid",
        )?;
        let rows = stmt.query_map([], Self::row_to_item)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    /// Items whose title contains `keyword` (case-insensitive), oldest first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn find_matching(&self, keyword: &str) -> Result<Vec<ScheduleItem>> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        let pattern = format!("%{}%", escape_like(keyword));
        let mut stmt = conn.prepare(
            r"
            SELECT id, title, due, created_at
            FROM schedule_items
            WHERE title LIKE ?1 ESCAPE '\'
            ORDER BY created_at, rowid
            ",
        )?;
        let rows = stmt.query_map(rusqlite::params![pattern], Self::row_to_item)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    /// Delete an item by id
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn delete(&self, id: &str) -> Result<bool> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        let rows = conn.execute(
            "DELETE FROM schedule_items WHERE id = ?1",
            rusqlite::params![id],
        )?;

        if rows > 0 {
            tracing::info!(item_id = %id, "schedule item deleted");
        }

        Ok(rows > 0)
    }

    /// Convert a database row to a `ScheduleItem`
    fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScheduleItem> {
        let created_at: String = row.get(3)?;
        let created_at = NaiveDateTime::parse_from_str(&created_at, "%Y-%m-%d %H:%M:%S")
            .map_or_else(|_| Utc::now(), |dt| dt.and_utc());

        Ok(ScheduleItem {
            id: row.get(0)?,
            title: row.get(1)?,
            due: row.get(2)?,
            created_at,
        })
    }
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
