//! facematch-store — SQLite persistence for enrolled identities.
//!
//! Each identity is one `persons` row plus one `face_encodings` row holding
//! the embedding blob, joined by the person id.

mod schema;
pub mod sqlite;

pub use sqlite::SqliteStore;
