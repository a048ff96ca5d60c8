/// Mosaic services
///
/// A mosaic is one resolved run: a set of (cell, matched source)
/// assignments over a macro. The compositing engine consumes assignments
/// through `find_all_views`, which joins each one out to the source image
/// and the target cell geometry in ascending id order.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use std::sync::Arc;

use crate::db::Database;
use crate::model::data::{CoverPartial, Gidx, Mosaic, MosaicPartial, MosaicPartialView};
use crate::service::ServiceResult;

pub struct MosaicService {
    db: Arc<Database>,
}

impl MosaicService {
    pub fn new(db: Arc<Database>) -> Self {
        MosaicService { db }
    }

    pub fn insert(&self, name: &str, macro_id: i64) -> ServiceResult<Mosaic> {
        let created_at = Utc::now().timestamp();
        let conn = self.db.conn();
        conn.execute(
            "INSERT INTO mosaics (name, macro_id, created_at) VALUES (?1, ?2, ?3)",
            params![name, macro_id, created_at],
        )?;
        Ok(Mosaic {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
            macro_id,
            created_at,
        })
    }

    pub fn get(&self, id: i64) -> ServiceResult<Option<Mosaic>> {
        let conn = self.db.conn();
        let mosaic = conn
            .query_row(
                "SELECT id, name, macro_id, created_at FROM mosaics WHERE id = ?1",
                [id],
                |row| {
                    Ok(Mosaic {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        macro_id: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(mosaic)
    }
}

pub struct MosaicPartialService {
    db: Arc<Database>,
}

impl MosaicPartialService {
    pub fn new(db: Arc<Database>) -> Self {
        MosaicPartialService { db }
    }

    pub fn insert(
        &self,
        mosaic_id: i64,
        macro_partial_id: i64,
        gidx_partial_id: i64,
    ) -> ServiceResult<MosaicPartial> {
        let conn = self.db.conn();
        conn.execute(
            "INSERT INTO mosaic_partials (mosaic_id, macro_partial_id, gidx_partial_id)
             VALUES (?1, ?2, ?3)",
            params![mosaic_id, macro_partial_id, gidx_partial_id],
        )?;
        Ok(MosaicPartial {
            id: conn.last_insert_rowid(),
            mosaic_id,
            macro_partial_id,
            gidx_partial_id,
        })
    }

    pub fn count(&self, mosaic_id: i64) -> ServiceResult<i64> {
        let conn = self.db.conn();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM mosaic_partials WHERE mosaic_id = ?1",
            [mosaic_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// One page of resolved assignments in strict ascending id order,
    /// joined out to the matched source image and the target cell. Pure
    /// limit/offset pagination; no cursor survives between pages.
    pub fn find_all_views(
        &self,
        mosaic_id: i64,
        limit: i64,
        offset: i64,
    ) -> ServiceResult<Vec<MosaicPartialView>> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            "SELECT g.id, g.aspect_id, g.path, g.sha256sum, g.width, g.height, g.orientation,
                    cp.id, cp.cover_id, cp.aspect_id, cp.x1, cp.y1, cp.x2, cp.y2
             FROM mosaic_partials mp
             JOIN macro_partials map ON map.id = mp.macro_partial_id
             JOIN cover_partials cp ON cp.id = map.cover_partial_id
             JOIN gidx_partials gp ON gp.id = mp.gidx_partial_id
             JOIN gidx g ON g.id = gp.gidx_id
             WHERE mp.mosaic_id = ?1
             ORDER BY mp.id ASC
             LIMIT ?2 OFFSET ?3",
        )?;

        let views = stmt
            .query_map(params![mosaic_id, limit, offset], |row| {
                Ok(MosaicPartialView {
                    gidx: Gidx {
                        id: row.get(0)?,
                        aspect_id: row.get(1)?,
                        path: row.get(2)?,
                        sha256sum: row.get(3)?,
                        width: row.get(4)?,
                        height: row.get(5)?,
                        orientation: row.get(6)?,
                    },
                    cover_partial: CoverPartial {
                        id: row.get(7)?,
                        cover_id: row.get(8)?,
                        aspect_id: row.get(9)?,
                        x1: row.get(10)?,
                        y1: row.get(11)?,
                        x2: row.get(12)?,
                        y2: row.get(13)?,
                    },
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(views)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::aspect::AspectService;
    use crate::service::cover::{CoverPartialService, CoverService};
    use crate::service::gidx::{GidxPartialService, GidxService};
    use crate::service::macro_image::{MacroPartialService, MacroService};
    use image::{Rgba, RgbaImage};

    fn write_png(dir: &std::path::Path, name: &str, w: u32, h: u32, color: [u8; 4]) -> String {
        let mut img = RgbaImage::new(w, h);
        for pixel in img.pixels_mut() {
            *pixel = Rgba(color);
        }
        let path = dir.join(name);
        img.save(&path).unwrap();
        path.to_string_lossy().to_string()
    }

    #[test]
    fn test_views_join_source_and_cell_in_id_order() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::open_in_memory().unwrap());
        let aspects = AspectService::new(Arc::clone(&db));
        let covers = CoverService::new(Arc::clone(&db));
        let cover_partials = CoverPartialService::new(Arc::clone(&db));
        let images = GidxService::new(Arc::clone(&db));
        let gidx_partials = GidxPartialService::new(Arc::clone(&db));
        let macros = MacroService::new(Arc::clone(&db));
        let macro_partials = MacroPartialService::new(Arc::clone(&db));
        let mosaics = MosaicService::new(Arc::clone(&db));
        let assignments = MosaicPartialService::new(Arc::clone(&db));

        let cover_aspect = aspects.find_or_create(20, 10).unwrap();
        let cell_aspect = aspects.find_or_create(10, 10).unwrap();
        let cover = covers.insert(cover_aspect.id, "tiny", 20, 10).unwrap();
        let cells = [
            cover_partials
                .insert(cover.id, cell_aspect.id, 0, 0, 10, 10)
                .unwrap(),
            cover_partials
                .insert(cover.id, cell_aspect.id, 10, 0, 20, 10)
                .unwrap(),
        ];

        let macro_path = write_png(dir.path(), "macro.png", 20, 10, [128, 128, 128, 255]);
        let macro_image = macros
            .insert(cover_aspect.id, cover.id, &macro_path, "m", 20, 10, 1)
            .unwrap();
        let mosaic = mosaics.insert("tiny run", macro_image.id).unwrap();
        assert_eq!(assignments.count(mosaic.id).unwrap(), 0);

        for (i, cell) in cells.iter().enumerate() {
            let tile_path = write_png(
                dir.path(),
                &format!("tile{}.png", i),
                10,
                10,
                [(i as u8 + 1) * 50, 0, 0, 255],
            );
            let gidx = images
                .insert(cell_aspect.id, &tile_path, &format!("t{}", i), 10, 10, 1)
                .unwrap();
            let gp = gidx_partials.find_or_create(&gidx, &cell_aspect).unwrap();
            let map = macro_partials.find_or_create(&macro_image, cell).unwrap();
            assignments.insert(mosaic.id, map.id, gp.id).unwrap();
        }

        assert_eq!(assignments.count(mosaic.id).unwrap(), 2);

        let first_page = assignments.find_all_views(mosaic.id, 1, 0).unwrap();
        let second_page = assignments.find_all_views(mosaic.id, 1, 1).unwrap();
        let empty_page = assignments.find_all_views(mosaic.id, 1, 2).unwrap();

        assert_eq!(first_page.len(), 1);
        assert_eq!(second_page.len(), 1);
        assert!(empty_page.is_empty());
        assert_eq!(first_page[0].cover_partial, cells[0]);
        assert_eq!(second_page[0].cover_partial, cells[1]);
        assert!(first_page[0].gidx.path.ends_with("tile0.png"));
        assert!(second_page[0].gidx.path.ends_with("tile1.png"));
    }
}
