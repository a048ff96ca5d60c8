/// Content index services
///
/// GidxService is the catalog of indexed source images, keyed by content
/// hash: byte-identical files are stored once no matter how many paths
/// point at them. GidxPartialService caches each image's Lab signature
/// per target aspect with at-most-once computation.

use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

use crate::db::Database;
use crate::model::data::{Aspect, Gidx, GidxPartial};
use crate::model::pixels::Pixels;
use crate::service::ServiceResult;
use crate::util::color;

pub struct GidxService {
    db: Arc<Database>,
}

impl GidxService {
    pub fn new(db: Arc<Database>) -> Self {
        GidxService { db }
    }

    /// Insert a new index entry. The caller has already checked that the
    /// content hash is unseen; the unique index backs that up.
    pub fn insert(
        &self,
        aspect_id: i64,
        path: &str,
        sha256sum: &str,
        width: i64,
        height: i64,
        orientation: i64,
    ) -> ServiceResult<Gidx> {
        let conn = self.db.conn();
        conn.execute(
            "INSERT INTO gidx (aspect_id, path, sha256sum, width, height, orientation)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![aspect_id, path, sha256sum, width, height, orientation],
        )?;
        Ok(Gidx {
            id: conn.last_insert_rowid(),
            aspect_id,
            path: path.to_string(),
            sha256sum: sha256sum.to_string(),
            width,
            height,
            orientation,
        })
    }

    pub fn get(&self, id: i64) -> ServiceResult<Option<Gidx>> {
        let conn = self.db.conn();
        let gidx = conn
            .query_row(
                "SELECT id, aspect_id, path, sha256sum, width, height, orientation
                 FROM gidx WHERE id = ?1",
                [id],
                Self::map_row,
            )
            .optional()?;
        Ok(gidx)
    }

    /// Has this exact file content been indexed before?
    pub fn exists_by_hash(&self, sha256sum: &str) -> ServiceResult<bool> {
        let conn = self.db.conn();
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM gidx WHERE sha256sum = ?1 LIMIT 1",
                [sha256sum],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn count(&self) -> ServiceResult<i64> {
        let conn = self.db.conn();
        let count = conn.query_row("SELECT COUNT(*) FROM gidx", [], |row| row.get(0))?;
        Ok(count)
    }

    /// All indexed images, ascending id
    pub fn find_all(&self) -> ServiceResult<Vec<Gidx>> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT id, aspect_id, path, sha256sum, width, height, orientation
             FROM gidx ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map([], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<Gidx> {
        Ok(Gidx {
            id: row.get(0)?,
            aspect_id: row.get(1)?,
            path: row.get(2)?,
            sha256sum: row.get(3)?,
            width: row.get(4)?,
            height: row.get(5)?,
            orientation: row.get(6)?,
        })
    }
}

/// Signature cache for indexed images, keyed (gidx_id, aspect_id).
///
/// Sampling an image is the expensive step, so it runs at most once per
/// key: the find-then-create sequence holds the service mutex, and the
/// catalog's unique index enforces the invariant at rest.
pub struct GidxPartialService {
    db: Arc<Database>,
    m: Mutex<()>,
}

impl GidxPartialService {
    pub fn new(db: Arc<Database>) -> Self {
        GidxPartialService {
            db,
            m: Mutex::new(()),
        }
    }

    pub fn find(&self, gidx: &Gidx, aspect: &Aspect) -> ServiceResult<Option<GidxPartial>> {
        let conn = self.db.conn();
        Self::do_find(&conn, gidx.id, aspect.id)
    }

    /// Compute, encode and insert the signature for (gidx, aspect).
    /// Assumes the caller already observed `find` returning None.
    pub fn create(&self, gidx: &Gidx, aspect: &Aspect) -> ServiceResult<GidxPartial> {
        let _guard = self.m.lock().unwrap_or_else(|e| e.into_inner());
        self.do_create(gidx, aspect)
    }

    /// Return the cached signature, computing it on first request.
    /// Atomic against concurrent callers for the same key.
    pub fn find_or_create(&self, gidx: &Gidx, aspect: &Aspect) -> ServiceResult<GidxPartial> {
        let _guard = self.m.lock().unwrap_or_else(|e| e.into_inner());

        {
            let conn = self.db.conn();
            if let Some(partial) = Self::do_find(&conn, gidx.id, aspect.id)? {
                return Ok(partial);
            }
        }

        self.do_create(gidx, aspect)
    }

    pub fn count(&self) -> ServiceResult<i64> {
        let conn = self.db.conn();
        let count = conn.query_row("SELECT COUNT(*) FROM gidx_partials", [], |row| row.get(0))?;
        Ok(count)
    }

    fn do_create(&self, gidx: &Gidx, aspect: &Aspect) -> ServiceResult<GidxPartial> {
        // expensive pixel sampling happens outside the connection lock
        let pixels = color::aspect_lab(gidx, aspect)?;
        let data = pixels.encode()?;

        let conn = self.db.conn();
        conn.execute(
            "INSERT INTO gidx_partials (gidx_id, aspect_id, data) VALUES (?1, ?2, ?3)",
            params![gidx.id, aspect.id, data],
        )?;
        Ok(GidxPartial {
            id: conn.last_insert_rowid(),
            gidx_id: gidx.id,
            aspect_id: aspect.id,
            pixels,
        })
    }

    fn do_find(
        conn: &Connection,
        gidx_id: i64,
        aspect_id: i64,
    ) -> ServiceResult<Option<GidxPartial>> {
        let row = conn
            .query_row(
                "SELECT id, gidx_id, aspect_id, data FROM gidx_partials
                 WHERE gidx_id = ?1 AND aspect_id = ?2",
                [gidx_id, aspect_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, Vec<u8>>(3)?,
                    ))
                },
            )
            .optional()?;

        match row {
            None => Ok(None),
            Some((id, gidx_id, aspect_id, data)) => Ok(Some(GidxPartial {
                id,
                gidx_id,
                aspect_id,
                pixels: Pixels::decode(&data)?,
            })),
        }
    }
}
