//! Diesel and pool failure classification shared by the repositories.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use super::pool::PoolError;

pub(crate) const USERNAME_CONSTRAINT: &str = "users_username_key";
pub(crate) const EMAIL_CONSTRAINT: &str = "users_email_key";

/// Coarse classification of a Diesel failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DieselFailure {
    /// The connection dropped or could not be used.
    Connection(String),
    /// A unique constraint was violated; carries the constraint name.
    UniqueViolation(Option<String>),
    /// Anything else the database or query builder reported.
    Query(String),
}

pub(crate) fn classify_pool_error(error: PoolError) -> DieselFailure {
    DieselFailure::Connection(error.into_message())
}

pub(crate) fn classify_diesel_error(error: DieselError) -> DieselFailure {
    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(&error),
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            DieselFailure::UniqueViolation(info.constraint_name().map(str::to_owned))
        }
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            DieselFailure::Connection("database connection error".to_owned())
        }
        DieselError::NotFound => DieselFailure::Query("record not found".to_owned()),
        DieselError::QueryBuilderError(_) => DieselFailure::Query("database query error".to_owned()),
        _ => DieselFailure::Query("database error".to_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::result::DatabaseErrorInformation;
    use rstest::rstest;

    struct Info {
        constraint: Option<&'static str>,
    }

    impl DatabaseErrorInformation for Info {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint"
        }
        fn details(&self) -> Option<&str> {
            None
        }
        fn hint(&self) -> Option<&str> {
            None
        }
        fn table_name(&self) -> Option<&str> {
            Some("users")
        }
        fn column_name(&self) -> Option<&str> {
            None
        }
        fn constraint_name(&self) -> Option<&str> {
            self.constraint
        }
        fn statement_position(&self) -> Option<i32> {
            None
        }
    }

    fn database_error(kind: DatabaseErrorKind, constraint: Option<&'static str>) -> DieselError {
        DieselError::DatabaseError(kind, Box::new(Info { constraint }))
    }

    #[rstest]
    #[case(
        database_error(DatabaseErrorKind::UniqueViolation, Some(USERNAME_CONSTRAINT)),
        DieselFailure::UniqueViolation(Some(USERNAME_CONSTRAINT.to_owned()))
    )]
    #[case(
        database_error(DatabaseErrorKind::ClosedConnection, None),
        DieselFailure::Connection("database connection error".to_owned())
    )]
    #[case(DieselError::NotFound, DieselFailure::Query("record not found".to_owned()))]
    #[case(DieselError::RollbackTransaction, DieselFailure::Query("database error".to_owned()))]
    fn classifies_diesel_errors(#[case] error: DieselError, #[case] expected: DieselFailure) {
        assert_eq!(classify_diesel_error(error), expected);
    }

    #[rstest]
    fn pool_errors_are_connection_failures() {
        assert_eq!(
            classify_pool_error(PoolError::checkout("timed out")),
            DieselFailure::Connection("timed out".to_owned())
        );
    }
}
