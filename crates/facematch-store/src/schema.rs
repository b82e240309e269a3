use rusqlite::Connection;

const PRAGMA_BUSY_TIMEOUT_MS: u32 = 5_000;

/// Connection settings and table definitions. Idempotent.
pub(crate) fn init(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(&format!(
        "\
PRAGMA journal_mode = WAL;\n\
PRAGMA synchronous = NORMAL;\n\
PRAGMA foreign_keys = ON;\n\
PRAGMA busy_timeout = {PRAGMA_BUSY_TIMEOUT_MS};\n\
"
    ))?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS persons (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL CHECK (length(name) > 0),
            age INTEGER,
            email TEXT,
            phone TEXT,
            enrolled_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS face_encodings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            person_id INTEGER NOT NULL REFERENCES persons(id) ON DELETE CASCADE,
            encoding BLOB NOT NULL,
            image_path TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS face_encodings_person ON face_encodings(person_id);
        "#,
    )
}
