use uuid::Uuid;

use super::begin;
use super::error::{Result, StoreOperation, store_error};
use crate::models::{Participant, ParticipantField, Principal};
use crate::repository::{Store, eq};

/// Resolves an authenticated user id to the principal the services act for.
pub async fn find_principal(store: &dyn Store, user_id: Uuid) -> Result<Option<Principal>> {
    let mut tx = begin(store).await?;
    let participant = tx
        .participants()
        .find_one(&eq(ParticipantField::Id(user_id)))
        .await
        .map_err(store_error::<Participant>(StoreOperation::Query))?;
    Ok(participant.as_ref().map(Principal::from))
}
