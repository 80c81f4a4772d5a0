//! Database errors and their translation to `PortError`

use thiserror::Error;

use core_kernel::PortError;

// PostgreSQL SQLSTATE codes, see
// https://www.postgresql.org/docs/current/errcodes-appendix.html
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// An update or lookup by id matched no row
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// Unique constraint violation; `constraint` is the index name when the
    /// server reported one
    #[error("Duplicate entry: {message}")]
    DuplicateEntry {
        constraint: Option<String>,
        message: String,
    },

    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    #[error("Check constraint violation: {0}")]
    ConstraintViolation(String),

    /// Aborted by a deadlock or serialization failure; safe to retry
    #[error("Transaction aborted: {0}")]
    TransactionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored value the domain cannot represent
    #[error("Corrupt row in {table}: {message}")]
    CorruptRow { table: &'static str, message: String },
}

impl DatabaseError {
    /// ```rust
    /// use infra_db::DatabaseError;
    ///
    /// let error = DatabaseError::not_found("Payment", "PAY-123");
    /// assert_eq!(error.to_string(), "Payment PAY-123 not found");
    /// ```
    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        DatabaseError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn corrupt(table: &'static str, message: impl Into<String>) -> Self {
        DatabaseError::CorruptRow {
            table,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound { .. })
    }

    /// Whether this is a unique violation on the named constraint
    pub fn violates(&self, name: &str) -> bool {
        matches!(self, DatabaseError::DuplicateEntry { constraint: Some(c), .. } if c == name)
    }
}

impl From<&sqlx::Error> for DatabaseError {
    fn from(error: &sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => DatabaseError::NotFound {
                entity: "Record",
                id: "?".to_string(),
            },
            sqlx::Error::PoolTimedOut => DatabaseError::PoolExhausted,
            sqlx::Error::Io(_) | sqlx::Error::PoolClosed => {
                DatabaseError::ConnectionFailed(error.to_string())
            }
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                match db_err.code().as_deref() {
                    Some(UNIQUE_VIOLATION) => DatabaseError::DuplicateEntry {
                        constraint: db_err.constraint().map(str::to_string),
                        message,
                    },
                    Some(FOREIGN_KEY_VIOLATION) => DatabaseError::ForeignKeyViolation(message),
                    Some(CHECK_VIOLATION) => DatabaseError::ConstraintViolation(message),
                    Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED) => {
                        DatabaseError::TransactionFailed(message)
                    }
                    _ => DatabaseError::QueryFailed(message),
                }
            }
            _ => DatabaseError::QueryFailed(error.to_string()),
        }
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(error: sqlx::Error) -> Self {
        DatabaseError::from(&error)
    }
}

/// Unique violations become `Conflict`, so a lost insert race reaches the
/// services as an expected outcome rather than a failure.
impl From<DatabaseError> for PortError {
    fn from(error: DatabaseError) -> Self {
        match error {
            DatabaseError::NotFound { entity, id } => PortError::not_found(entity, id),
            DatabaseError::DuplicateEntry { message, .. } => PortError::conflict(message),
            DatabaseError::ForeignKeyViolation(message)
            | DatabaseError::ConstraintViolation(message) => PortError::validation(message),
            DatabaseError::ConnectionFailed(_)
            | DatabaseError::PoolExhausted
            | DatabaseError::TransactionFailed(_) => PortError::Connection {
                message: error.to_string(),
                source: Some(Box::new(error)),
            },
            other => PortError::Internal {
                message: other.to_string(),
                source: Some(Box::new(other)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn duplicate(constraint: &str) -> DatabaseError {
        DatabaseError::DuplicateEntry {
            constraint: Some(constraint.to_string()),
            message: "duplicate key value violates unique constraint".to_string(),
        }
    }

    #[test]
    fn test_duplicate_maps_to_conflict() {
        let port: PortError = duplicate("uq_mpesa_transactions_trans_id").into();
        assert!(port.is_conflict());
    }

    #[test]
    fn test_violates_matches_constraint_name() {
        let err = duplicate("uq_mpesa_transactions_trans_id");
        assert!(err.violates("uq_mpesa_transactions_trans_id"));
        assert!(!err.violates("vote_heads_pkey"));
        assert!(!DatabaseError::PoolExhausted.violates("uq_mpesa_transactions_trans_id"));
    }

    #[test]
    fn test_aborted_transactions_are_transient() {
        let port: PortError = DatabaseError::TransactionFailed("deadlock detected".into()).into();
        assert!(port.is_transient());
        let port: PortError = DatabaseError::PoolExhausted.into();
        assert!(port.is_transient());
    }

    #[test]
    fn test_not_found_keeps_entity() {
        let port: PortError = DatabaseError::not_found("VoteHead", "VH-1").into();
        assert!(port.is_not_found());
        assert!(port.to_string().contains("VoteHead"));
        assert!(port.to_string().contains("VH-1"));
    }

    #[test]
    fn test_row_not_found() {
        assert!(DatabaseError::from(sqlx::Error::RowNotFound).is_not_found());
    }

    #[test]
    fn test_corrupt_row_is_internal() {
        let port: PortError = DatabaseError::corrupt("payments", "unknown payment method 'CHEQUE'").into();
        assert!(matches!(port, PortError::Internal { .. }));
    }
}
