use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::error::{Result, ServiceError, StoreOperation, store_error};
use super::team_registry::load_event;
use super::{begin, commit, retry_on_conflict};
use crate::error::StorageError;
use crate::models::{Event, HACKATHON_WINDOW, RegistrationWindow, WindowField, WindowPatch};
use crate::repository::{Store, eq};

/// Answers whether registration is open, for the hackathon-wide window and
/// for individual events.
#[derive(Clone)]
pub struct RegistrationGate {
    store: Arc<dyn Store>,
}

impl RegistrationGate {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// A missing window row reads as closed.
    pub async fn window(&self) -> Result<RegistrationWindow> {
        let mut tx = begin(self.store.as_ref()).await?;
        let window = tx
            .windows()
            .find_one(&eq(WindowField::Key(HACKATHON_WINDOW.to_string())))
            .await
            .map_err(store_error::<RegistrationWindow>(StoreOperation::Query))?;

        Ok(window.unwrap_or_else(|| RegistrationWindow {
            key: HACKATHON_WINDOW.to_string(),
            is_open: false,
            updated_at: Utc::now(),
        }))
    }

    pub async fn ensure_hackathon_open(&self) -> Result<()> {
        if self.window().await?.is_open {
            Ok(())
        } else {
            Err(ServiceError::RegistrationClosed)
        }
    }

    pub async fn set_hackathon_open(&self, open: bool) -> Result<RegistrationWindow> {
        retry_on_conflict("set_registration_window", move || self.try_set(open)).await
    }

    async fn try_set(&self, open: bool) -> Result<RegistrationWindow> {
        let mut tx = begin(self.store.as_ref()).await?;
        let key = eq(WindowField::Key(HACKATHON_WINDOW.to_string()));

        let updated = tx
            .windows()
            .update(&key, WindowPatch { is_open: Some(open) })
            .await
            .map_err(store_error::<RegistrationWindow>(StoreOperation::Update))?;
        let window = if updated == 0 {
            tx.windows()
                .insert(RegistrationWindow {
                    key: HACKATHON_WINDOW.to_string(),
                    is_open: open,
                    updated_at: Utc::now(),
                })
                .await
                .map_err(store_error::<RegistrationWindow>(StoreOperation::Insert))?
        } else {
            tx.windows()
                .find_one(&key)
                .await
                .and_then(|window| window.ok_or(StorageError::NotFound))
                .map_err(store_error::<RegistrationWindow>(StoreOperation::Query))?
        };
        commit(tx).await?;

        info!(open, "Hackathon registration window updated");
        Ok(window)
    }

    /// The event, provided it is published and still accepting registrations.
    pub async fn ensure_event_open(&self, event_id: Uuid, now: DateTime<Utc>) -> Result<Event> {
        let mut tx = begin(self.store.as_ref()).await?;
        let event = load_event(tx.as_mut(), event_id).await?;
        if !event.is_registration_open(now) {
            return Err(ServiceError::RegistrationClosed);
        }
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rust_decimal::Decimal;

    use super::*;
    use crate::models::EventType;
    use crate::repository::memory::MemoryStore;
    use crate::services::testing::seed_event;

    #[tokio::test]
    async fn test_window_defaults_closed_and_toggles() {
        let store = MemoryStore::new();
        let gate = RegistrationGate::new(Arc::new(store.clone()));

        assert!(!gate.window().await.unwrap().is_open);
        assert_eq!(
            gate.ensure_hackathon_open().await.unwrap_err().kind(),
            "REGISTRATION_CLOSED"
        );

        assert!(gate.set_hackathon_open(true).await.unwrap().is_open);
        gate.ensure_hackathon_open().await.unwrap();

        assert!(!gate.set_hackathon_open(false).await.unwrap().is_open);
        assert!(gate.ensure_hackathon_open().await.is_err());
    }

    #[tokio::test]
    async fn test_event_closes_at_deadline() {
        let store = MemoryStore::new();
        let gate = RegistrationGate::new(Arc::new(store.clone()));
        let event = seed_event(&store, EventType::Team, 2, 4, None, Decimal::from(100)).await;

        gate.ensure_event_open(event.event_id, Utc::now()).await.unwrap();

        let err = gate
            .ensure_event_open(event.event_id, event.deadline + Duration::seconds(1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "REGISTRATION_CLOSED");

        let err = gate
            .ensure_event_open(Uuid::new_v4(), Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "EVENT_NOT_FOUND");
    }
}
