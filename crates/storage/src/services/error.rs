use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

use crate::error::StorageError;
use crate::repository::Entity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    Begin,
    Commit,
    Query,
    Insert,
    Update,
    Delete,
}

impl StoreOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Begin => "BEGIN",
            Self::Commit => "COMMIT",
            Self::Query => "QUERY",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every failure a core operation can report. The web boundary renders these
/// through [`ServiceError::kind`], [`ServiceError::status_code`],
/// [`ServiceError::title`] and [`ServiceError::description`].
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("No authenticated user")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(&'static str),

    #[error("Registration is incomplete")]
    RegistrationIncomplete,

    #[error("Registration is closed")]
    RegistrationClosed,

    #[error("Event not found")]
    EventNotFound,

    #[error("College is not set on the profile")]
    CollegeNotSet,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Already in a team")]
    AlreadyInTeam,

    #[error("Not a member of this team")]
    NotInTeam,

    #[error("Team already confirmed")]
    TeamAlreadyConfirmed,

    #[error("Minimum team size not met ({actual} of {required})")]
    MinTeamSizeNotMet { required: i64, actual: i64 },

    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(&'static str),

    #[error("Team not found")]
    TeamNotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Payment already completed")]
    PaymentAlreadyCompleted,

    #[error("Only the team leader can create a payment order")]
    OnlyLeaderCanCreatePaymentOrder,

    #[error("Team not completed")]
    TeamNotCompleted,

    #[error("Failed to create payment: {0}")]
    FailedToCreatePayment(String),

    #[error("{entity} {operation} failed: {source}")]
    Store {
        entity: &'static str,
        operation: StoreOperation,
        #[source]
        source: StorageError,
    },

    #[error("Concurrent modification")]
    ConcurrentModification,
}

pub type Result<T> = std::result::Result<T, ServiceError>;

impl ServiceError {
    /// Machine-readable kind carried in the `error` field of the envelope.
    pub fn kind(&self) -> Cow<'static, str> {
        let kind = match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::RegistrationIncomplete => "REGISTRATION_INCOMPLETE",
            Self::RegistrationClosed => "REGISTRATION_CLOSED",
            Self::EventNotFound => "EVENT_NOT_FOUND",
            Self::CollegeNotSet => "COLLEGE_NOT_SET",
            Self::Validation(_) => "VALIDATION",
            Self::AlreadyInTeam => "ALREADY_IN_TEAM",
            Self::NotInTeam => "NOT_IN_TEAM",
            Self::TeamAlreadyConfirmed => "TEAM_ALREADY_CONFIRMED",
            Self::MinTeamSizeNotMet { .. } => "MIN_TEAM_SIZE_NOT_MET",
            Self::CapacityExceeded(_) => "CAPACITY_EXCEEDED",
            Self::TeamNotFound => "TEAM_NOT_FOUND",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::PaymentAlreadyCompleted => "PAYMENT_ALREADY_COMPLETED",
            Self::OnlyLeaderCanCreatePaymentOrder => "ONLY_LEADER_CAN_CREATE_PAYMENT_ORDER",
            Self::TeamNotCompleted => "TEAM_NOT_COMPLETED",
            Self::FailedToCreatePayment(_) => "FAILED_TO_CREATE_PAYMENT",
            Self::Store {
                entity, operation, ..
            } => return Cow::Owned(format!("{entity}_{operation}_FAILED")),
            Self::ConcurrentModification => "CONCURRENT_MODIFICATION",
        };
        Cow::Borrowed(kind)
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::Forbidden(_) | Self::RegistrationClosed => 403,
            Self::EventNotFound | Self::TeamNotFound | Self::UserNotFound => 404,
            Self::RegistrationIncomplete
            | Self::CollegeNotSet
            | Self::Validation(_)
            | Self::AlreadyInTeam
            | Self::NotInTeam
            | Self::TeamAlreadyConfirmed
            | Self::MinTeamSizeNotMet { .. }
            | Self::CapacityExceeded(_)
            | Self::InvalidSignature
            | Self::PaymentAlreadyCompleted
            | Self::OnlyLeaderCanCreatePaymentOrder
            | Self::TeamNotCompleted => 400,
            Self::ConcurrentModification => 409,
            Self::FailedToCreatePayment(_) | Self::Store { .. } => 500,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Unauthorized => "Sign in required",
            Self::Forbidden(_) => "Not allowed",
            Self::RegistrationIncomplete => "Registration incomplete",
            Self::RegistrationClosed => "Registration closed",
            Self::EventNotFound => "Event not found",
            Self::CollegeNotSet => "College not set",
            Self::Validation(_) => "Invalid request",
            Self::AlreadyInTeam => "Already in a team",
            Self::NotInTeam => "Not in this team",
            Self::TeamAlreadyConfirmed => "Team already confirmed",
            Self::MinTeamSizeNotMet { .. } => "Minimum team size not met",
            Self::CapacityExceeded(_) => "Capacity exceeded",
            Self::TeamNotFound => "Team not found",
            Self::UserNotFound => "User not found",
            Self::InvalidSignature => "Invalid signature",
            Self::PaymentAlreadyCompleted => "Payment already completed",
            Self::OnlyLeaderCanCreatePaymentOrder => "Only the leader can pay",
            Self::TeamNotCompleted => "Team not confirmed",
            Self::FailedToCreatePayment(_) => "Payment could not be started",
            Self::Store { .. } => "Something went wrong",
            Self::ConcurrentModification => "Please try again",
        }
    }

    /// User-facing explanation. Downstream failures never include internal
    /// error text.
    pub fn description(&self) -> String {
        match self {
            Self::Unauthorized => "Please sign in to continue.".to_string(),
            Self::Forbidden(reason) => format!("{reason}."),
            Self::RegistrationIncomplete => {
                "Complete your registration before managing a team.".to_string()
            }
            Self::RegistrationClosed => "Registration is not open right now.".to_string(),
            Self::EventNotFound => "This event does not exist or is not published yet.".to_string(),
            Self::CollegeNotSet => "Set your college on your profile first.".to_string(),
            Self::Validation(message) => message.clone(),
            Self::AlreadyInTeam => "You are already a member of a team.".to_string(),
            Self::NotInTeam => "That user is not a member of this team.".to_string(),
            Self::TeamAlreadyConfirmed => {
                "This team is confirmed and its membership can no longer change.".to_string()
            }
            Self::MinTeamSizeNotMet { required, actual } => format!(
                "A team needs at least {required} members to be confirmed; this team has {actual}."
            ),
            Self::CapacityExceeded(what) => format!("No room left: {what}."),
            Self::TeamNotFound => "This team does not exist.".to_string(),
            Self::UserNotFound => "This user does not exist.".to_string(),
            Self::InvalidSignature => "The payment could not be verified.".to_string(),
            Self::PaymentAlreadyCompleted => "This team has already paid.".to_string(),
            Self::OnlyLeaderCanCreatePaymentOrder => {
                "Only the team leader can start a payment for the team.".to_string()
            }
            Self::TeamNotCompleted => "Confirm the team before paying.".to_string(),
            Self::FailedToCreatePayment(_) => {
                "We could not start the payment. Please try again in a moment.".to_string()
            }
            Self::Store { .. } => {
                "We could not complete your request. Please try again.".to_string()
            }
            Self::ConcurrentModification => {
                "Someone else changed this at the same time. Please try again.".to_string()
            }
        }
    }

    /// Whether a fresh attempt may succeed: a lost serialization race, or a
    /// unique violation that a racing insert may have caused. A duplicate that
    /// persists across attempts is reported as the store error.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::ConcurrentModification => true,
            Self::Store { source, .. } => source.is_constraint_violation(),
            _ => false,
        }
    }
}

/// Wraps a storage failure on entity `E` with the operation that failed.
pub(crate) fn store_error<E: Entity>(operation: StoreOperation) -> impl FnOnce(StorageError) -> ServiceError {
    move |source| wrap(E::NAME, operation, source)
}

pub(crate) fn transaction_error(operation: StoreOperation) -> impl FnOnce(StorageError) -> ServiceError {
    move |source| wrap("TRANSACTION", operation, source)
}

fn wrap(entity: &'static str, operation: StoreOperation, source: StorageError) -> ServiceError {
    if source.is_conflict() {
        ServiceError::ConcurrentModification
    } else {
        ServiceError::Store {
            entity,
            operation,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Payment, Team};

    #[test]
    fn test_store_failures_name_entity_and_operation() {
        let err = store_error::<Team>(StoreOperation::Insert)(StorageError::NotFound);
        assert_eq!(err.kind(), "TEAM_INSERT_FAILED");
        assert_eq!(err.status_code(), 500);
        assert!(!err.is_retriable());

        let err = store_error::<Payment>(StoreOperation::Query)(StorageError::NotFound);
        assert_eq!(err.kind(), "PAYMENT_QUERY_FAILED");
    }

    #[test]
    fn test_conflicts_become_concurrent_modification() {
        let err = store_error::<Team>(StoreOperation::Update)(StorageError::Conflict);
        assert!(matches!(err, ServiceError::ConcurrentModification));
        assert_eq!(err.status_code(), 409);
        assert!(err.is_retriable());
    }

    #[test]
    fn test_duplicates_are_retried_as_store_errors() {
        let err = store_error::<Payment>(StoreOperation::Insert)(StorageError::ConstraintViolation(
            "payments_razorpay_payment_id_key".into(),
        ));
        assert!(err.is_retriable());
        assert_eq!(err.kind(), "PAYMENT_INSERT_FAILED");
        assert_eq!(err.status_code(), 500);

        assert!(!ServiceError::FailedToCreatePayment("timeout".into()).is_retriable());
        assert!(!ServiceError::TeamNotFound.is_retriable());
    }

    #[test]
    fn test_downstream_descriptions_do_not_leak_internals() {
        let err = ServiceError::FailedToCreatePayment("connect ECONNREFUSED 10.0.0.4".into());
        assert!(!err.description().contains("ECONNREFUSED"));

        let err = store_error::<Team>(StoreOperation::Delete)(StorageError::ConstraintViolation(
            "teams_pkey".into(),
        ));
        assert!(!err.description().contains("teams_pkey"));
    }

    #[test]
    fn test_state_conflicts_are_bad_requests() {
        for err in [
            ServiceError::AlreadyInTeam,
            ServiceError::TeamAlreadyConfirmed,
            ServiceError::MinTeamSizeNotMet {
                required: 3,
                actual: 2,
            },
            ServiceError::InvalidSignature,
        ] {
            assert_eq!(err.status_code(), 400, "{}", err.kind());
        }
        assert_eq!(ServiceError::TeamNotFound.status_code(), 404);
        assert_eq!(ServiceError::Unauthorized.status_code(), 401);
    }
}
