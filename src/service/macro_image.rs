/// Macro image and macro-partial services
///
/// The macro is the cover photo at mosaic scale; macro partials are the
/// partial store proper: a content-addressed cache of one Lab signature
/// per (macro, cover cell) pair. Sampling a region is the most expensive
/// per-pair operation in the system, so the store guarantees it runs at
/// most once per pair no matter how often matching probes it.

use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

use crate::db::Database;
use crate::model::data::{Aspect, CoverPartial, MacroImage, MacroPartial};
use crate::model::pixels::Pixels;
use crate::service::{ServiceError, ServiceResult};
use crate::util::color;

pub struct MacroService {
    db: Arc<Database>,
}

impl MacroService {
    pub fn new(db: Arc<Database>) -> Self {
        MacroService { db }
    }

    pub fn insert(
        &self,
        aspect_id: i64,
        cover_id: i64,
        path: &str,
        sha256sum: &str,
        width: i64,
        height: i64,
        orientation: i64,
    ) -> ServiceResult<MacroImage> {
        let conn = self.db.conn();
        conn.execute(
            "INSERT INTO macros (aspect_id, cover_id, path, sha256sum, width, height, orientation)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![aspect_id, cover_id, path, sha256sum, width, height, orientation],
        )?;
        Ok(MacroImage {
            id: conn.last_insert_rowid(),
            aspect_id,
            cover_id,
            path: path.to_string(),
            sha256sum: sha256sum.to_string(),
            width,
            height,
            orientation,
        })
    }

    pub fn get(&self, id: i64) -> ServiceResult<Option<MacroImage>> {
        let conn = self.db.conn();
        let macro_image = conn
            .query_row(
                "SELECT id, aspect_id, cover_id, path, sha256sum, width, height, orientation
                 FROM macros WHERE id = ?1",
                [id],
                |row| {
                    Ok(MacroImage {
                        id: row.get(0)?,
                        aspect_id: row.get(1)?,
                        cover_id: row.get(2)?,
                        path: row.get(3)?,
                        sha256sum: row.get(4)?,
                        width: row.get(5)?,
                        height: row.get(6)?,
                        orientation: row.get(7)?,
                    })
                },
            )
            .optional()?;
        Ok(macro_image)
    }
}

/// The partial store: signatures keyed (macro_id, cover_partial_id).
pub struct MacroPartialService {
    db: Arc<Database>,
    m: Mutex<()>,
}

impl MacroPartialService {
    pub fn new(db: Arc<Database>) -> Self {
        MacroPartialService {
            db,
            m: Mutex::new(()),
        }
    }

    pub fn find(
        &self,
        macro_image: &MacroImage,
        cover_partial: &CoverPartial,
    ) -> ServiceResult<Option<MacroPartial>> {
        let conn = self.db.conn();
        Self::do_find(&conn, macro_image.id, cover_partial.id)
    }

    /// Compute, encode and insert the signature for this (macro, cell)
    /// pair. Assumes the caller already observed `find` returning None.
    pub fn create(
        &self,
        macro_image: &MacroImage,
        cover_partial: &CoverPartial,
    ) -> ServiceResult<MacroPartial> {
        let _guard = self.m.lock().unwrap_or_else(|e| e.into_inner());
        self.do_create(macro_image, cover_partial)
    }

    /// Return the cached signature, computing it on first request.
    /// The find-then-create sequence is one critical section, so racing
    /// callers for the same pair never both sample and insert.
    pub fn find_or_create(
        &self,
        macro_image: &MacroImage,
        cover_partial: &CoverPartial,
    ) -> ServiceResult<MacroPartial> {
        let _guard = self.m.lock().unwrap_or_else(|e| e.into_inner());

        {
            let conn = self.db.conn();
            if let Some(partial) = Self::do_find(&conn, macro_image.id, cover_partial.id)? {
                return Ok(partial);
            }
        }

        self.do_create(macro_image, cover_partial)
    }

    /// Page through this macro's cover cells that have no signature yet,
    /// in a caller-specified deterministic order. Callers repeat with a
    /// growing offset until an empty page signals the gap set is done,
    /// so the full set is never materialized at once.
    ///
    /// `order` must be a column/direction expression over identifier
    /// characters; anything else falls back to ascending id.
    pub fn find_missing(
        &self,
        macro_image: &MacroImage,
        order: &str,
        limit: i64,
        offset: i64,
    ) -> ServiceResult<Vec<CoverPartial>> {
        let order = if order
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || " ._".contains(c))
            && !order.trim().is_empty()
        {
            order
        } else {
            "cover_partials.id asc"
        };

        let sql = format!(
            "SELECT cover_partials.id, cover_id, cover_partials.aspect_id, x1, y1, x2, y2
             FROM cover_partials
             WHERE cover_id = ?1
               AND NOT EXISTS (
                 SELECT 1 FROM macro_partials
                 WHERE macro_partials.macro_id = ?2
                   AND macro_partials.cover_partial_id = cover_partials.id
               )
             ORDER BY {}
             LIMIT ?3 OFFSET ?4",
            order
        );

        let conn = self.db.conn();
        let mut stmt = conn.prepare(&sql)?;
        let cells = stmt
            .query_map(
                params![macro_image.cover_id, macro_image.id, limit, offset],
                |row| {
                    Ok(CoverPartial {
                        id: row.get(0)?,
                        cover_id: row.get(1)?,
                        aspect_id: row.get(2)?,
                        x1: row.get(3)?,
                        y1: row.get(4)?,
                        x2: row.get(5)?,
                        y2: row.get(6)?,
                    })
                },
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(cells)
    }

    pub fn count(&self, macro_id: i64) -> ServiceResult<i64> {
        let conn = self.db.conn();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM macro_partials WHERE macro_id = ?1",
            [macro_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn do_create(
        &self,
        macro_image: &MacroImage,
        cover_partial: &CoverPartial,
    ) -> ServiceResult<MacroPartial> {
        let aspect = self.cell_aspect(cover_partial)?;

        // expensive region sampling happens outside the connection lock
        let pixels = color::partial_lab(macro_image, cover_partial, &aspect)?;
        let data = pixels.encode()?;

        let conn = self.db.conn();
        conn.execute(
            "INSERT INTO macro_partials (macro_id, cover_partial_id, aspect_id, data)
             VALUES (?1, ?2, ?3, ?4)",
            params![macro_image.id, cover_partial.id, cover_partial.aspect_id, data],
        )?;
        Ok(MacroPartial {
            id: conn.last_insert_rowid(),
            macro_id: macro_image.id,
            cover_partial_id: cover_partial.id,
            aspect_id: cover_partial.aspect_id,
            pixels,
        })
    }

    fn cell_aspect(&self, cover_partial: &CoverPartial) -> ServiceResult<Aspect> {
        let conn = self.db.conn();
        conn.query_row(
            "SELECT id, columns, rows FROM aspects WHERE id = ?1",
            [cover_partial.aspect_id],
            |row| {
                Ok(Aspect {
                    id: row.get(0)?,
                    columns: row.get(1)?,
                    rows: row.get(2)?,
                })
            },
        )
        .map_err(ServiceError::Store)
    }

    fn do_find(
        conn: &Connection,
        macro_id: i64,
        cover_partial_id: i64,
    ) -> ServiceResult<Option<MacroPartial>> {
        let row = conn
            .query_row(
                "SELECT id, macro_id, cover_partial_id, aspect_id, data FROM macro_partials
                 WHERE macro_id = ?1 AND cover_partial_id = ?2",
                [macro_id, cover_partial_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, Vec<u8>>(4)?,
                    ))
                },
            )
            .optional()?;

        match row {
            None => Ok(None),
            Some((id, macro_id, cover_partial_id, aspect_id, data)) => Ok(Some(MacroPartial {
                id,
                macro_id,
                cover_partial_id,
                aspect_id,
                pixels: Pixels::decode(&data)?,
            })),
        }
    }
}
