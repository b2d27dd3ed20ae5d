// ABOUTME: Storage error types shared by every repository backend
// ABOUTME: Covers missing rows, conflicts, backend failures, and record (de)serialization

/// Errors raised by repository implementations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested record does not exist
    #[error("{entity} not found")]
    NotFound {
        /// Kind of record that was looked up
        entity: &'static str,
    },

    /// A record with the same key already exists
    #[error("{entity} already exists")]
    Conflict {
        /// Kind of record that collided
        entity: &'static str,
    },

    /// The backend (database, cache) failed
    #[error("storage backend failed during {context}: {message}")]
    Backend {
        /// Operation that was running
        context: &'static str,
        /// Backend error message
        message: String,
    },

    /// A stored record could not be encoded or decoded
    #[error("failed to serialize {entity}")]
    Serialization {
        /// Kind of record being processed
        entity: &'static str,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    /// Build a backend error from any displayable cause
    pub fn backend(context: &'static str, cause: impl std::fmt::Display) -> Self {
        Self::Backend {
            context,
            message: cause.to_string(),
        }
    }
}

#[cfg(feature = "database-errors")]
impl From<sqlx::Error> for StorageError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => Self::NotFound { entity: "row" },
            other => Self::backend("query", other),
        }
    }
}
