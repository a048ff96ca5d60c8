/// Content hashing for the image index
///
/// The index dedups by a deterministic digest of the file bytes, so the
/// same photo copied to two paths produces one catalog entry.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::Path;

/// SHA-256 of the file's bytes as a lowercase hex string
pub fn sha256sum(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;

    let digest = hasher.finalize();
    Ok(digest.iter().map(|b| format!("{:02x}", b)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_sha256sum_known_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        File::create(&path).unwrap().write_all(b"hello").unwrap();

        assert_eq!(
            sha256sum(&path).unwrap(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_sha256sum_same_bytes_same_digest() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("sub");
        std::fs::create_dir(&b).unwrap();
        let b = b.join("b.bin");
        File::create(&a).unwrap().write_all(b"same bytes").unwrap();
        File::create(&b).unwrap().write_all(b"same bytes").unwrap();

        assert_eq!(sha256sum(&a).unwrap(), sha256sum(&b).unwrap());
    }

    #[test]
    fn test_sha256sum_missing_file() {
        assert!(sha256sum(Path::new("/nonexistent/file.jpg")).is_err());
    }
}
