//! [`EmbeddingStore`] over a single SQLite connection.

use crate::schema;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use facematch_core::codec;
use facematch_core::{
    Embedding, EmbeddingStore, EnrolledFace, Identity, NewIdentity, PersistenceError,
};
use rusqlite::{params, Connection, ErrorCode, TransactionBehavior};
use std::path::Path;

/// SQLite-backed identity store.
pub struct SqliteStore {
    conn: Connection,
}

/// One joined row before the blob and timestamp are decoded.
struct RawRow {
    id: i64,
    name: String,
    age: Option<u32>,
    email: Option<String>,
    phone: Option<String>,
    enrolled_at: String,
    encoding: Vec<u8>,
    image_path: String,
}

impl SqliteStore {
    /// Open (or create) the database at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self, PersistenceError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                PersistenceError::Unavailable(format!(
                    "failed to create {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let conn = Connection::open(path).map_err(|e| {
            PersistenceError::Unavailable(format!("open {}: {e}", path.display()))
        })?;
        let store = Self::init(conn)?;

        tracing::info!(
            path = %path.display(),
            enrolled = store.count()?,
            "face database opened"
        );
        Ok(store)
    }

    /// Private in-memory database; contents vanish on drop.
    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| PersistenceError::Unavailable(format!("open in-memory db: {e}")))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, PersistenceError> {
        schema::init(&conn).map_err(persistence_error)?;
        Ok(Self { conn })
    }
}

impl EmbeddingStore for SqliteStore {
    fn enroll(
        &mut self,
        identity: &NewIdentity,
        embedding: &Embedding,
    ) -> Result<Identity, PersistenceError> {
        // Stored at microsecond precision; truncate so the returned value matches.
        let enrolled_at = Utc::now().trunc_subsecs(6);
        let blob = codec::encode(embedding.as_slice());

        // Dropping the transaction on any early return rolls back both rows.
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(persistence_error)?;

        tx.execute(
            "INSERT INTO persons (name, age, email, phone, enrolled_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                identity.name,
                identity.age,
                identity.email,
                identity.phone,
                enrolled_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            ],
        )
        .map_err(persistence_error)?;
        let person_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO face_encodings (person_id, encoding, image_path) VALUES (?1, ?2, ?3)",
            params![person_id, blob, identity.image_path],
        )
        .map_err(persistence_error)?;

        tx.commit().map_err(persistence_error)?;
        tracing::debug!(person_id, bytes = blob.len(), "enrollment committed");

        Ok(Identity {
            id: person_id,
            name: identity.name.clone(),
            age: identity.age,
            email: identity.email.clone(),
            phone: identity.phone.clone(),
            image_path: identity.image_path.clone(),
            enrolled_at,
        })
    }

    fn all(&self) -> Result<Vec<EnrolledFace>, PersistenceError> {
        let mut stmt = self
            .conn
            .prepare_cached(
                "SELECT p.id, p.name, p.age, p.email, p.phone, p.enrolled_at, f.encoding, f.image_path \
                 FROM persons p \
                 JOIN face_encodings f ON p.id = f.person_id \
                 ORDER BY p.id",
            )
            .map_err(persistence_error)?;

        let rows = stmt
            .query_map([], |r| {
                Ok(RawRow {
                    id: r.get(0)?,
                    name: r.get(1)?,
                    age: r.get(2)?,
                    email: r.get(3)?,
                    phone: r.get(4)?,
                    enrolled_at: r.get(5)?,
                    encoding: r.get(6)?,
                    image_path: r.get(7)?,
                })
            })
            .map_err(persistence_error)?;

        let mut faces = Vec::new();
        for row in rows {
            let row = row.map_err(persistence_error)?;
            faces.push(decode_row(row)?);
        }

        tracing::debug!(count = faces.len(), "loaded enrolled faces");
        Ok(faces)
    }

    fn count(&self) -> Result<usize, PersistenceError> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM persons p JOIN face_encodings f ON p.id = f.person_id",
                [],
                |r| r.get(0),
            )
            .map_err(persistence_error)?;
        Ok(count as usize)
    }
}

fn decode_row(row: RawRow) -> Result<EnrolledFace, PersistenceError> {
    let values = codec::decode(&row.encoding).map_err(|source| PersistenceError::Corrupt {
        identity_id: row.id,
        source,
    })?;

    let enrolled_at = DateTime::parse_from_rfc3339(&row.enrolled_at)
        .map_err(|e| {
            PersistenceError::Backend(format!(
                "identity {}: bad enrolled_at {:?}: {e}",
                row.id, row.enrolled_at
            ))
        })?
        .with_timezone(&Utc);

    Ok(EnrolledFace {
        identity: Identity {
            id: row.id,
            name: row.name,
            age: row.age,
            email: row.email,
            phone: row.phone,
            image_path: row.image_path,
            enrolled_at,
        },
        embedding: Embedding::new(values),
    })
}

/// Classify a SQLite failure for callers.
fn persistence_error(e: rusqlite::Error) -> PersistenceError {
    let code = match &e {
        rusqlite::Error::SqliteFailure(err, _) => Some(err.code),
        _ => None,
    };

    match code {
        Some(ErrorCode::ConstraintViolation | ErrorCode::ReadOnly | ErrorCode::TooBig) => {
            PersistenceError::Rejected(e.to_string())
        }
        Some(
            ErrorCode::CannotOpen
            | ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::NotADatabase
            | ErrorCode::SystemIoFailure
            | ErrorCode::PermissionDenied,
        ) => PersistenceError::Unavailable(e.to_string()),
        _ => PersistenceError::Backend(e.to_string()),
    }
}
