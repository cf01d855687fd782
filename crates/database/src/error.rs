//! Database error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Unique constraint hit on insert.
    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: &'static str, id: String },
}

pub type Result<T> = std::result::Result<T, DatabaseError>;

impl DatabaseError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound { .. })
    }

    /// Map a unique-constraint violation to `AlreadyExists`.
    pub(crate) fn on_unique(entity: &'static str, id: impl Into<String>) -> impl FnOnce(sqlx::Error) -> Self {
        let id = id.into();
        move |e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                DatabaseError::AlreadyExists { entity, id }
            }
            e => DatabaseError::Sqlx(e),
        }
    }
}
