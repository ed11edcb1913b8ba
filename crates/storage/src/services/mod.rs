pub mod error;
pub mod gateway;
pub mod money;
pub mod principal;
pub mod registration;
pub mod settlement;
pub mod signature;
pub mod team_registry;

#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

use std::future::Future;
use std::time::Duration;

use crate::repository::{Store, Transaction};
use error::{ServiceError, StoreOperation};

/// Attempts made before a racing transaction is reported to the caller.
pub const MAX_ATTEMPTS: u32 = 3;

/// Re-runs `attempt` when it loses a race to a concurrent transaction. Each
/// attempt opens a fresh transaction, so preconditions are re-checked against
/// whatever the winner committed. After [`MAX_ATTEMPTS`] the last error is
/// returned as is.
pub(crate) async fn retry_on_conflict<T, F, Fut>(operation: &'static str, mut attempt: F) -> Result<T, ServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let mut tries = 0;
    loop {
        tries += 1;
        match attempt().await {
            Err(err) if err.is_retriable() && tries < MAX_ATTEMPTS => {
                tracing::debug!(operation, tries, kind = %err.kind(), "Retrying after a conflicting write");
                tokio::time::sleep(Duration::from_millis(5 * u64::from(tries))).await;
            }
            result => return result,
        }
    }
}

pub(crate) async fn begin(store: &dyn Store) -> Result<Box<dyn Transaction>, ServiceError> {
    store
        .begin()
        .await
        .map_err(error::transaction_error(StoreOperation::Begin))
}

pub(crate) async fn commit(tx: Box<dyn Transaction>) -> Result<(), ServiceError> {
    tx.commit()
        .await
        .map_err(error::transaction_error(StoreOperation::Commit))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::error::StorageError;
    use crate::models::Payment;
    use error::store_error;

    #[tokio::test]
    async fn test_retry_recovers_after_one_conflict() {
        let attempts = AtomicU32::new(0);
        let counter = &attempts;

        let result = retry_on_conflict("recover", move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ServiceError::ConcurrentModification)
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let attempts = AtomicU32::new(0);
        let counter = &attempts;

        let err = retry_on_conflict("exhaust", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(ServiceError::ConcurrentModification)
        })
        .await
        .unwrap_err();

        assert_eq!(err.kind(), "CONCURRENT_MODIFICATION");
        assert_eq!(err.status_code(), 409);
        assert_eq!(attempts.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_persistent_duplicate_surfaces_as_store_error() {
        let attempts = AtomicU32::new(0);
        let counter = &attempts;

        let err = retry_on_conflict("duplicate", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(store_error::<Payment>(StoreOperation::Insert)(
                StorageError::ConstraintViolation("payments_razorpay_payment_id_key".into()),
            ))
        })
        .await
        .unwrap_err();

        assert_eq!(err.kind(), "PAYMENT_INSERT_FAILED");
        assert_eq!(attempts.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_domain_errors_are_not_retried() {
        let attempts = AtomicU32::new(0);
        let counter = &attempts;

        let err = retry_on_conflict("domain", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(ServiceError::TeamNotFound)
        })
        .await
        .unwrap_err();

        assert_eq!(err.kind(), "TEAM_NOT_FOUND");
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
