/// Ordered schema migrations for the mosaic catalog
///
/// Migrations run in strict numeric order, each exactly once. The
/// `versions` table tracks the highest applied version; a fresh database
/// (no versions table yet) is version 0 and receives the full sequence.

use rusqlite::{Connection, Result as SqlResult};

type Migration = fn(&Connection) -> SqlResult<()>;

/// The full migration sequence. Append only: version N is migration
/// index N-1, forever.
const MIGRATIONS: &[Migration] = &[
    create_versions_table,
    create_aspects_table,
    create_gidx_table,
    create_gidx_partials_table,
    create_covers_table,
    create_cover_partials_table,
    create_macros_table,
    create_macro_partials_table,
    create_mosaics_table,
    create_mosaic_partials_table,
];

/// Bring the schema up to date. Returns the resulting version.
pub fn migrate(conn: &Connection) -> SqlResult<i64> {
    let mut version = current_version(conn);

    for (idx, migration) in MIGRATIONS.iter().enumerate() {
        let target = (idx + 1) as i64;
        if version < target {
            migration(conn)?;
            set_version(conn, target)?;
            version = target;
        }
    }

    Ok(version)
}

/// Highest applied migration version, 0 for a fresh database
pub fn current_version(conn: &Connection) -> i64 {
    // The versions table does not exist before the first migration
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM versions",
        [],
        |row| row.get(0),
    )
    .unwrap_or(0)
}

fn set_version(conn: &Connection, version: i64) -> SqlResult<()> {
    conn.execute(
        "INSERT INTO versions (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

fn create_versions_table(conn: &Connection) -> SqlResult<()> {
    conn.execute_batch(
        "CREATE TABLE versions (
            version INTEGER NOT NULL PRIMARY KEY
        );
        CREATE UNIQUE INDEX idx_versions_version ON versions (version);",
    )
}

fn create_aspects_table(conn: &Connection) -> SqlResult<()> {
    conn.execute_batch(
        "CREATE TABLE aspects (
            id      INTEGER NOT NULL PRIMARY KEY,
            columns INTEGER NOT NULL,
            rows    INTEGER NOT NULL
        );
        CREATE UNIQUE INDEX idx_aspects ON aspects (rows, columns);",
    )
}

fn create_gidx_table(conn: &Connection) -> SqlResult<()> {
    conn.execute_batch(
        "CREATE TABLE gidx (
            id          INTEGER NOT NULL PRIMARY KEY,
            aspect_id   INTEGER NOT NULL,
            path        TEXT NOT NULL,
            sha256sum   TEXT NOT NULL,
            width       INTEGER NOT NULL,
            height      INTEGER NOT NULL,
            orientation INTEGER NOT NULL,
            FOREIGN KEY(aspect_id) REFERENCES aspects(id) ON DELETE RESTRICT
        );
        CREATE UNIQUE INDEX idx_gidx_sha256sum ON gidx (sha256sum);",
    )
}

fn create_gidx_partials_table(conn: &Connection) -> SqlResult<()> {
    conn.execute_batch(
        "CREATE TABLE gidx_partials (
            id        INTEGER NOT NULL PRIMARY KEY,
            gidx_id   INTEGER NOT NULL,
            aspect_id INTEGER NOT NULL,
            data      BLOB NOT NULL,
            FOREIGN KEY(gidx_id) REFERENCES gidx(id) ON DELETE CASCADE,
            FOREIGN KEY(aspect_id) REFERENCES aspects(id) ON DELETE RESTRICT
        );
        CREATE UNIQUE INDEX idx_gidx_partials ON gidx_partials (gidx_id, aspect_id);",
    )
}

fn create_covers_table(conn: &Connection) -> SqlResult<()> {
    conn.execute_batch(
        "CREATE TABLE covers (
            id         INTEGER NOT NULL PRIMARY KEY,
            aspect_id  INTEGER NOT NULL,
            name       TEXT NOT NULL,
            width      INTEGER NOT NULL,
            height     INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            FOREIGN KEY(aspect_id) REFERENCES aspects(id) ON DELETE RESTRICT
        );
        CREATE UNIQUE INDEX idx_covers_name ON covers (name);",
    )
}

fn create_cover_partials_table(conn: &Connection) -> SqlResult<()> {
    conn.execute_batch(
        "CREATE TABLE cover_partials (
            id        INTEGER NOT NULL PRIMARY KEY,
            cover_id  INTEGER NOT NULL,
            aspect_id INTEGER NOT NULL,
            x1        INTEGER NOT NULL,
            y1        INTEGER NOT NULL,
            x2        INTEGER NOT NULL,
            y2        INTEGER NOT NULL,
            FOREIGN KEY(cover_id) REFERENCES covers(id) ON DELETE CASCADE,
            FOREIGN KEY(aspect_id) REFERENCES aspects(id) ON DELETE RESTRICT
        );
        CREATE INDEX idx_cover_partials ON cover_partials (cover_id);",
    )
}

fn create_macros_table(conn: &Connection) -> SqlResult<()> {
    conn.execute_batch(
        "CREATE TABLE macros (
            id          INTEGER NOT NULL PRIMARY KEY,
            aspect_id   INTEGER NOT NULL,
            cover_id    INTEGER NOT NULL,
            path        TEXT NOT NULL,
            sha256sum   TEXT NOT NULL,
            width       INTEGER NOT NULL,
            height      INTEGER NOT NULL,
            orientation INTEGER NOT NULL,
            FOREIGN KEY(aspect_id) REFERENCES aspects(id) ON DELETE RESTRICT,
            FOREIGN KEY(cover_id) REFERENCES covers(id) ON DELETE RESTRICT
        );
        CREATE UNIQUE INDEX idx_macros_sha256sum ON macros (sha256sum);",
    )
}

fn create_macro_partials_table(conn: &Connection) -> SqlResult<()> {
    conn.execute_batch(
        "CREATE TABLE macro_partials (
            id               INTEGER NOT NULL PRIMARY KEY,
            macro_id         INTEGER NOT NULL,
            cover_partial_id INTEGER NOT NULL,
            aspect_id        INTEGER NOT NULL,
            data             BLOB NOT NULL,
            FOREIGN KEY(macro_id) REFERENCES macros(id) ON DELETE CASCADE,
            FOREIGN KEY(cover_partial_id) REFERENCES cover_partials(id) ON DELETE CASCADE,
            FOREIGN KEY(aspect_id) REFERENCES aspects(id) ON DELETE RESTRICT
        );
        CREATE INDEX idx_macro_partials_macro_id ON macro_partials (macro_id);
        CREATE UNIQUE INDEX idx_macro_partials ON macro_partials (macro_id, cover_partial_id);",
    )
}

fn create_mosaics_table(conn: &Connection) -> SqlResult<()> {
    conn.execute_batch(
        "CREATE TABLE mosaics (
            id         INTEGER NOT NULL PRIMARY KEY,
            name       TEXT NOT NULL,
            macro_id   INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            FOREIGN KEY(macro_id) REFERENCES macros(id) ON DELETE RESTRICT
        );
        CREATE UNIQUE INDEX idx_mosaics_name ON mosaics (name);",
    )
}

fn create_mosaic_partials_table(conn: &Connection) -> SqlResult<()> {
    conn.execute_batch(
        "CREATE TABLE mosaic_partials (
            id               INTEGER NOT NULL PRIMARY KEY,
            mosaic_id        INTEGER NOT NULL,
            macro_partial_id INTEGER NOT NULL,
            gidx_partial_id  INTEGER NOT NULL,
            FOREIGN KEY(mosaic_id) REFERENCES mosaics(id) ON DELETE CASCADE,
            FOREIGN KEY(macro_partial_id) REFERENCES macro_partials(id) ON DELETE CASCADE,
            FOREIGN KEY(gidx_partial_id) REFERENCES gidx_partials(id) ON DELETE CASCADE
        );
        CREATE INDEX idx_mosaic_partials ON mosaic_partials (mosaic_id);",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_fresh_database() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(current_version(&conn), 0);

        let version = migrate(&conn).unwrap();
        assert_eq!(version, MIGRATIONS.len() as i64);
        assert_eq!(current_version(&conn), version);
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        let first = migrate(&conn).unwrap();
        let second = migrate(&conn).unwrap();
        assert_eq!(first, second);

        // each version was recorded exactly once
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM versions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, first);
    }

    #[test]
    fn test_migrate_creates_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();

        for table in [
            "versions",
            "aspects",
            "gidx",
            "gidx_partials",
            "covers",
            "cover_partials",
            "macros",
            "macro_partials",
            "mosaics",
            "mosaic_partials",
        ] {
            let found: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(found, 1, "missing table {}", table);
        }
    }
}
