/// Bounded-concurrency indexing pipeline
///
/// Walks a filesystem tree, hashes every candidate image in parallel, and
/// upserts index entries one at a time. The shape is fan-out/fan-in: up
/// to `workers` hashing tasks run concurrently behind a semaphore, and a
/// single consumer performs the exists-check-then-insert sequence so
/// catalog writes are never concurrent. Each permit is held until the
/// consumer has finished storing (or rejecting) that file's result, which
/// caps in-flight file handles and backpressures the producer.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use walkdir::WalkDir;

use crate::db::Database;
use crate::service::aspect::AspectService;
use crate::service::gidx::GidxService;
use crate::service::ServiceResult;
use crate::util::{hash, image as image_util};

/// File extensions the scanner treats as candidate images
const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "tif", "tiff", "webp",
];

/// Fatal pipeline failures. Per-file problems are not here on purpose:
/// they are logged at the item boundary and the run continues.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("failed to enumerate images under {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// A hashed candidate on its way to the consumer
struct HashedImage {
    path: PathBuf,
    sha256sum: String,
}

pub struct Indexer {
    aspects: AspectService,
    images: GidxService,
    workers: usize,
}

impl Indexer {
    pub fn new(db: Arc<Database>, workers: usize) -> Self {
        Indexer {
            aspects: AspectService::new(Arc::clone(&db)),
            images: GidxService::new(db),
            workers: workers.max(1),
        }
    }

    /// One hashing worker per logical CPU
    pub fn with_default_workers(db: Arc<Database>) -> Self {
        Self::new(db, num_cpus::get())
    }

    /// Index every image file under `root`. Returns the number of newly
    /// indexed entries; re-running over the same tree is idempotent
    /// because content hashes dedup across runs.
    pub async fn index(&self, root: &Path) -> Result<usize, IndexError> {
        let paths = collect_image_paths(root)?;
        if paths.is_empty() {
            println!("🔍 No images found at {}", root.display());
            return Ok(0);
        }

        println!("🔍 Processing {} images", paths.len());
        Ok(self.process(paths).await)
    }

    async fn process(&self, paths: Vec<PathBuf>) -> usize {
        let sem = Arc::new(Semaphore::new(self.workers));
        let (tx, mut rx) = mpsc::unbounded_channel::<(HashedImage, OwnedSemaphorePermit)>();

        let producer = tokio::spawn(async move {
            for path in paths {
                let permit = match Arc::clone(&sem).acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                let tx = tx.clone();
                tokio::task::spawn_blocking(move || match hash::sha256sum(&path) {
                    Ok(sha256sum) => {
                        // the permit rides along until the store completes
                        let _ = tx.send((HashedImage { path, sha256sum }, permit));
                    }
                    Err(e) => {
                        eprintln!("⚠️  Unable to hash {}: {}", path.display(), e);
                        drop(permit);
                    }
                });
            }
        });

        let mut indexed = 0;
        while let Some((hashed, permit)) = rx.recv().await {
            if self.store(&hashed) {
                indexed += 1;
            }
            // release the worker slot only after the store finished
            drop(permit);
        }

        let _ = producer.await;

        println!("✅ Indexed {} new images", indexed);
        indexed
    }

    /// One bad file never aborts the run: failures are reported and the
    /// file is simply absent from the index.
    fn store(&self, hashed: &HashedImage) -> bool {
        match self.store_entry(hashed) {
            Ok(inserted) => inserted,
            Err(e) => {
                eprintln!("⚠️  Skipping {}: {}", hashed.path.display(), e);
                false
            }
        }
    }

    fn store_entry(&self, hashed: &HashedImage) -> ServiceResult<bool> {
        if self.images.exists_by_hash(&hashed.sha256sum)? {
            return Ok(false);
        }

        let (raw_width, raw_height) = image_util::dimensions(&hashed.path)?;

        // don't fix orientation here, just determine whether the visual
        // extents are the raw bounds swapped
        let orientation = image_util::read_orientation(&hashed.path);
        let (width, height) = if image_util::swaps_extent(orientation) {
            (raw_height as i64, raw_width as i64)
        } else {
            (raw_width as i64, raw_height as i64)
        };
        let orientation = image_util::normalize_orientation(orientation);

        let aspect = self.aspects.find_or_create(width, height)?;

        println!("📷 {}", hashed.path.display());
        self.images.insert(
            aspect.id,
            &hashed.path.to_string_lossy(),
            &hashed.sha256sum,
            width,
            height,
            orientation as i64,
        )?;
        Ok(true)
    }
}

/// Enumerate candidate image files under `root`. Any traversal error is
/// fatal for the whole run; an empty result is not.
fn collect_image_paths(root: &Path) -> Result<Vec<PathBuf>, IndexError> {
    let mut paths = Vec::new();

    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|source| IndexError::Walk {
            path: root.to_path_buf(),
            source,
        })?;

        if !entry.file_type().is_file() {
            continue;
        }
        let Some(extension) = entry.path().extension() else {
            continue;
        };
        let ext = extension.to_string_lossy().to_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            paths.push(entry.into_path());
        }
    }

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::fs;
    use std::io::Write;

    fn write_png(dir: &Path, name: &str, w: u32, h: u32, seed: u8) {
        let mut img = RgbaImage::new(w, h);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            *pixel = Rgba([seed, (x % 256) as u8, (y % 256) as u8, 255]);
        }
        img.save(dir.join(name)).unwrap();
    }

    fn indexer(db: &Arc<Database>) -> Indexer {
        Indexer::new(Arc::clone(db), 4)
    }

    #[tokio::test]
    async fn test_index_records_dimensions_and_aspect() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png", 40, 30, 1);

        let db = Arc::new(Database::open_in_memory().unwrap());
        let indexed = indexer(&db).index(dir.path()).await.unwrap();
        assert_eq!(indexed, 1);

        let images = GidxService::new(Arc::clone(&db));
        let all = images.find_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!((all[0].width, all[0].height), (40, 30));
        // a PNG carries no EXIF data, so the probe falls back to identity
        assert_eq!(all[0].orientation, 1);

        let aspects = AspectService::new(Arc::clone(&db));
        let aspect = aspects.get(all[0].aspect_id).unwrap().unwrap();
        assert_eq!((aspect.columns, aspect.rows), (4, 3));
    }

    #[tokio::test]
    async fn test_indexing_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png", 16, 16, 1);
        write_png(dir.path(), "b.png", 32, 16, 2);

        let db = Arc::new(Database::open_in_memory().unwrap());
        let idx = indexer(&db);

        assert_eq!(idx.index(dir.path()).await.unwrap(), 2);
        assert_eq!(idx.index(dir.path()).await.unwrap(), 0);

        let images = GidxService::new(Arc::clone(&db));
        assert_eq!(images.count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_content_indexed_once() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png", 16, 16, 7);
        fs::create_dir(dir.path().join("copies")).unwrap();
        fs::copy(dir.path().join("a.png"), dir.path().join("copies/a2.png")).unwrap();

        let db = Arc::new(Database::open_in_memory().unwrap());
        let indexed = indexer(&db).index(dir.path()).await.unwrap();
        assert_eq!(indexed, 1);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "good.png", 16, 16, 3);
        let mut bad = fs::File::create(dir.path().join("bad.jpg")).unwrap();
        bad.write_all(b"this is not an image").unwrap();

        let db = Arc::new(Database::open_in_memory().unwrap());
        let indexed = indexer(&db).index(dir.path()).await.unwrap();
        assert_eq!(indexed, 1);
    }

    #[tokio::test]
    async fn test_empty_directory_is_a_non_error() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::open_in_memory().unwrap());
        assert_eq!(indexer(&db).index(dir.path()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_root_is_fatal() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let result = indexer(&db).index(Path::new("/nonexistent/photos")).await;
        assert!(matches!(result, Err(IndexError::Walk { .. })));
    }

    #[tokio::test]
    async fn test_non_image_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png", 16, 16, 4);
        fs::write(dir.path().join("notes.txt"), b"hello").unwrap();
        fs::write(dir.path().join("noext"), b"hello").unwrap();

        let db = Arc::new(Database::open_in_memory().unwrap());
        assert_eq!(indexer(&db).index(dir.path()).await.unwrap(), 1);
    }
}
