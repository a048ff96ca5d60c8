/// Cover and cover-cell services
///
/// A cover is the target image being mosaic-ed; its grid of cells is
/// generated elsewhere and consumed here as given. Cells are immutable
/// once written.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use std::sync::Arc;

use crate::db::Database;
use crate::model::data::{Cover, CoverPartial};
use crate::service::ServiceResult;

pub struct CoverService {
    db: Arc<Database>,
}

impl CoverService {
    pub fn new(db: Arc<Database>) -> Self {
        CoverService { db }
    }

    pub fn insert(
        &self,
        aspect_id: i64,
        name: &str,
        width: i64,
        height: i64,
    ) -> ServiceResult<Cover> {
        let created_at = Utc::now().timestamp();
        let conn = self.db.conn();
        conn.execute(
            "INSERT INTO covers (aspect_id, name, width, height, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![aspect_id, name, width, height, created_at],
        )?;
        Ok(Cover {
            id: conn.last_insert_rowid(),
            aspect_id,
            name: name.to_string(),
            width,
            height,
            created_at,
        })
    }

    pub fn get(&self, id: i64) -> ServiceResult<Option<Cover>> {
        let conn = self.db.conn();
        let cover = conn
            .query_row(
                "SELECT id, aspect_id, name, width, height, created_at
                 FROM covers WHERE id = ?1",
                [id],
                |row| {
                    Ok(Cover {
                        id: row.get(0)?,
                        aspect_id: row.get(1)?,
                        name: row.get(2)?,
                        width: row.get(3)?,
                        height: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(cover)
    }
}

pub struct CoverPartialService {
    db: Arc<Database>,
}

impl CoverPartialService {
    pub fn new(db: Arc<Database>) -> Self {
        CoverPartialService { db }
    }

    pub fn insert(
        &self,
        cover_id: i64,
        aspect_id: i64,
        x1: i64,
        y1: i64,
        x2: i64,
        y2: i64,
    ) -> ServiceResult<CoverPartial> {
        let conn = self.db.conn();
        conn.execute(
            "INSERT INTO cover_partials (cover_id, aspect_id, x1, y1, x2, y2)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![cover_id, aspect_id, x1, y1, x2, y2],
        )?;
        Ok(CoverPartial {
            id: conn.last_insert_rowid(),
            cover_id,
            aspect_id,
            x1,
            y1,
            x2,
            y2,
        })
    }

    pub fn get(&self, id: i64) -> ServiceResult<Option<CoverPartial>> {
        let conn = self.db.conn();
        let cell = conn
            .query_row(
                "SELECT id, cover_id, aspect_id, x1, y1, x2, y2
                 FROM cover_partials WHERE id = ?1",
                [id],
                Self::map_row,
            )
            .optional()?;
        Ok(cell)
    }

    /// All cells of a cover, ascending id
    pub fn find_all(&self, cover_id: i64) -> ServiceResult<Vec<CoverPartial>> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT id, cover_id, aspect_id, x1, y1, x2, y2
             FROM cover_partials WHERE cover_id = ?1 ORDER BY id ASC",
        )?;
        let cells = stmt
            .query_map([cover_id], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(cells)
    }

    pub fn count(&self, cover_id: i64) -> ServiceResult<i64> {
        let conn = self.db.conn();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM cover_partials WHERE cover_id = ?1",
            [cover_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<CoverPartial> {
        Ok(CoverPartial {
            id: row.get(0)?,
            cover_id: row.get(1)?,
            aspect_id: row.get(2)?,
            x1: row.get(3)?,
            y1: row.get(4)?,
            x2: row.get(5)?,
            y2: row.get(6)?,
        })
    }
}
