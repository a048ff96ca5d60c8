/// Aspect registry
///
/// Interns width:height ratio classes. `find_or_create` is the classic
/// compare-and-insert race on a uniquely-constrained key: creation
/// attempts serialize behind the service mutex, and an insert that still
/// loses to the catalog's unique index falls back to find.

use rusqlite::{Connection, ErrorCode, OptionalExtension};
use std::sync::{Arc, Mutex};

use crate::db::Database;
use crate::model::data::Aspect;
use crate::service::{ServiceError, ServiceResult};

pub struct AspectService {
    db: Arc<Database>,
    m: Mutex<()>,
}

impl AspectService {
    pub fn new(db: Arc<Database>) -> Self {
        AspectService {
            db,
            m: Mutex::new(()),
        }
    }

    pub fn get(&self, id: i64) -> ServiceResult<Option<Aspect>> {
        let conn = self.db.conn();
        Self::row_by_id(&conn, id)
    }

    pub fn count(&self) -> ServiceResult<i64> {
        let conn = self.db.conn();
        let count = conn.query_row("SELECT COUNT(*) FROM aspects", [], |row| row.get(0))?;
        Ok(count)
    }

    /// The unique interned Aspect for these pixel dimensions, creating it
    /// if no proportional image has been seen before.
    pub fn find_or_create(&self, width: i64, height: i64) -> ServiceResult<Aspect> {
        let (columns, rows) = Aspect::calculate(width, height);

        let _guard = self.m.lock().unwrap_or_else(|e| e.into_inner());

        {
            let conn = self.db.conn();
            if let Some(aspect) = Self::find_ratio(&conn, columns, rows)? {
                return Ok(aspect);
            }
        }

        let conn = self.db.conn();
        match conn.execute(
            "INSERT INTO aspects (columns, rows) VALUES (?1, ?2)",
            [columns, rows],
        ) {
            Ok(_) => Ok(Aspect {
                id: conn.last_insert_rowid(),
                columns,
                rows,
            }),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                // lost the insert race; the row exists now
                Self::find_ratio(&conn, columns, rows)?
                    .ok_or(ServiceError::Store(rusqlite::Error::QueryReturnedNoRows))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn find_ratio(conn: &Connection, columns: i64, rows: i64) -> ServiceResult<Option<Aspect>> {
        let aspect = conn
            .query_row(
                "SELECT id, columns, rows FROM aspects WHERE columns = ?1 AND rows = ?2",
                [columns, rows],
                Self::map_row,
            )
            .optional()?;
        Ok(aspect)
    }

    fn row_by_id(conn: &Connection, id: i64) -> ServiceResult<Option<Aspect>> {
        let aspect = conn
            .query_row(
                "SELECT id, columns, rows FROM aspects WHERE id = ?1",
                [id],
                Self::map_row,
            )
            .optional()?;
        Ok(aspect)
    }

    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<Aspect> {
        Ok(Aspect {
            id: row.get(0)?,
            columns: row.get(1)?,
            rows: row.get(2)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AspectService {
        AspectService::new(Arc::new(Database::open_in_memory().unwrap()))
    }

    #[test]
    fn test_find_or_create_interns_proportional_dimensions() {
        let aspects = service();
        let a = aspects.find_or_create(800, 600).unwrap();
        let b = aspects.find_or_create(4, 3).unwrap();
        let c = aspects.find_or_create(1600, 1200).unwrap();

        assert_eq!(a.id, b.id);
        assert_eq!(a.id, c.id);
        assert_eq!((a.columns, a.rows), (4, 3));
        assert_eq!(aspects.count().unwrap(), 1);
    }

    #[test]
    fn test_find_or_create_distinct_ratios() {
        let aspects = service();
        let wide = aspects.find_or_create(16, 9).unwrap();
        let tall = aspects.find_or_create(9, 16).unwrap();
        assert_ne!(wide.id, tall.id);
        assert_eq!(aspects.count().unwrap(), 2);
    }

    #[test]
    fn test_concurrent_interning_yields_one_row() {
        let aspects = Arc::new(service());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let aspects = Arc::clone(&aspects);
                std::thread::spawn(move || aspects.find_or_create(1920, 1080).unwrap())
            })
            .collect();

        let ids: Vec<i64> = handles.into_iter().map(|h| h.join().unwrap().id).collect();
        assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(aspects.count().unwrap(), 1);
    }

    #[test]
    fn test_get_round_trips() {
        let aspects = service();
        let created = aspects.find_or_create(3, 2).unwrap();
        let fetched = aspects.get(created.id).unwrap().unwrap();
        assert_eq!(fetched, created);
        assert!(aspects.get(created.id + 99).unwrap().is_none());
    }
}
