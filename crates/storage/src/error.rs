use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Not found")]
    NotFound,

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// A concurrent transaction won the race; the caller may retry.
    #[error("Concurrent modification")]
    Conflict,
}

pub type Result<T> = std::result::Result<T, StorageError>;

impl StorageError {
    pub fn is_serialization_failure(&self) -> bool {
        matches!(
            self,
            StorageError::Database(sqlx::Error::Database(e))
                if matches!(e.code().as_deref(), Some("40001") | Some("40P01"))
        )
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::Conflict)
    }

    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, StorageError::ConstraintViolation(_))
    }

    /// Folds serialization failures into [`StorageError::Conflict`] and unique
    /// violations into [`StorageError::ConstraintViolation`], the shape the
    /// in-memory store reports them in.
    pub fn classify(self) -> Self {
        if self.is_serialization_failure() {
            return StorageError::Conflict;
        }
        match self {
            StorageError::Database(sqlx::Error::Database(e)) if e.code().as_deref() == Some("23505") => {
                StorageError::ConstraintViolation(e.constraint().unwrap_or("unique").to_string())
            }
            other => other,
        }
    }
}
