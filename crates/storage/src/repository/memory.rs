//! In-process store with serializable transactions.
//!
//! `begin` takes the single store lock and works on a private copy of every
//! table; `commit` writes the copy back. Concurrent transactions therefore
//! run one after another, and each re-reads the state the previous one left.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::entity::Entity;
use super::predicate::Predicate;
use super::{Repository, Store, Transaction};
use crate::error::{Result, StorageError};
use crate::models::{Event, Participant, Payment, RegistrationWindow, Team, TeamMember};

#[derive(Debug, Clone, Default)]
pub struct Tables {
    participants: Vec<Participant>,
    events: Vec<Event>,
    teams: Vec<Team>,
    members: Vec<TeamMember>,
    payments: Vec<Payment>,
    windows: Vec<RegistrationWindow>,
}

/// Table access plus the unique constraints the SQL schema declares.
pub trait MemEntity: Entity {
    fn rows(tables: &Tables) -> &Vec<Self>;

    fn rows_mut(tables: &mut Tables) -> &mut Vec<Self>;

    /// Name of the unique constraint `self` and `other` would both violate.
    fn conflicts_with(&self, other: &Self) -> Option<&'static str>;
}

impl MemEntity for Participant {
    fn rows(tables: &Tables) -> &Vec<Self> {
        &tables.participants
    }

    fn rows_mut(tables: &mut Tables) -> &mut Vec<Self> {
        &mut tables.participants
    }

    fn conflicts_with(&self, other: &Self) -> Option<&'static str> {
        (self.participant_id == other.participant_id).then_some("participants_pkey")
    }
}

impl MemEntity for Event {
    fn rows(tables: &Tables) -> &Vec<Self> {
        &tables.events
    }

    fn rows_mut(tables: &mut Tables) -> &mut Vec<Self> {
        &mut tables.events
    }

    fn conflicts_with(&self, other: &Self) -> Option<&'static str> {
        (self.event_id == other.event_id).then_some("events_pkey")
    }
}

impl MemEntity for Team {
    fn rows(tables: &Tables) -> &Vec<Self> {
        &tables.teams
    }

    fn rows_mut(tables: &mut Tables) -> &mut Vec<Self> {
        &mut tables.teams
    }

    fn conflicts_with(&self, other: &Self) -> Option<&'static str> {
        if self.team_id == other.team_id {
            Some("teams_pkey")
        } else if self.event_id == other.event_id
            && self.name.to_lowercase() == other.name.to_lowercase()
        {
            Some("teams_scope_name_key")
        } else {
            None
        }
    }
}

impl MemEntity for TeamMember {
    fn rows(tables: &Tables) -> &Vec<Self> {
        &tables.members
    }

    fn rows_mut(tables: &mut Tables) -> &mut Vec<Self> {
        &mut tables.members
    }

    fn conflicts_with(&self, other: &Self) -> Option<&'static str> {
        (self.event_id == other.event_id && self.user_id == other.user_id)
            .then_some("team_members_scope_user_key")
    }
}

impl MemEntity for Payment {
    fn rows(tables: &Tables) -> &Vec<Self> {
        &tables.payments
    }

    fn rows_mut(tables: &mut Tables) -> &mut Vec<Self> {
        &mut tables.payments
    }

    fn conflicts_with(&self, other: &Self) -> Option<&'static str> {
        let same = |a: &Option<String>, b: &Option<String>| a.is_some() && a == b;

        if self.payment_id == other.payment_id {
            Some("payments_pkey")
        } else if same(&self.razorpay_order_id, &other.razorpay_order_id) {
            Some("payments_razorpay_order_id_key")
        } else if same(&self.razorpay_payment_id, &other.razorpay_payment_id) {
            Some("payments_razorpay_payment_id_key")
        } else {
            None
        }
    }
}

impl MemEntity for RegistrationWindow {
    fn rows(tables: &Tables) -> &Vec<Self> {
        &tables.windows
    }

    fn rows_mut(tables: &mut Tables) -> &mut Vec<Self> {
        &mut tables.windows
    }

    fn conflicts_with(&self, other: &Self) -> Option<&'static str> {
        (self.key == other.key).then_some("registration_windows_pkey")
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction { guard, working }))
    }
}

pub struct MemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl<E: MemEntity> Repository<E> for MemoryTransaction {
    async fn find_one(&mut self, filter: &Predicate<E>) -> Result<Option<E>> {
        Ok(E::rows(&self.working)
            .iter()
            .find(|row| filter.evaluate(row))
            .cloned())
    }

    async fn find_many(&mut self, filter: &Predicate<E>) -> Result<Vec<E>> {
        Ok(E::rows(&self.working)
            .iter()
            .filter(|row| filter.evaluate(row))
            .cloned()
            .collect())
    }

    async fn count(&mut self, filter: &Predicate<E>) -> Result<i64> {
        let count = E::rows(&self.working)
            .iter()
            .filter(|row| filter.evaluate(row))
            .count();
        Ok(count as i64)
    }

    async fn insert(&mut self, row: E) -> Result<E> {
        let rows = E::rows_mut(&mut self.working);
        if let Some(constraint) = rows.iter().find_map(|existing| row.conflicts_with(existing)) {
            return Err(StorageError::ConstraintViolation(constraint.to_string()));
        }
        rows.push(row.clone());
        Ok(row)
    }

    async fn update(&mut self, filter: &Predicate<E>, patch: E::Patch) -> Result<u64> {
        let rows = E::rows_mut(&mut self.working);
        let mut next = rows.clone();
        let mut touched = Vec::new();

        for (index, row) in next.iter_mut().enumerate() {
            if filter.evaluate(row) {
                row.apply(&patch);
                touched.push(index);
            }
        }

        for &index in &touched {
            let conflict = next
                .iter()
                .enumerate()
                .filter(|(other, _)| *other != index)
                .find_map(|(_, other)| next[index].conflicts_with(other));
            if let Some(constraint) = conflict {
                return Err(StorageError::ConstraintViolation(constraint.to_string()));
            }
        }

        *rows = next;
        Ok(touched.len() as u64)
    }

    async fn delete(&mut self, filter: &Predicate<E>) -> Result<u64> {
        let rows = E::rows_mut(&mut self.working);
        let before = rows.len();
        rows.retain(|row| !filter.evaluate(row));
        Ok((before - rows.len()) as u64)
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    fn participants(&mut self) -> &mut dyn Repository<Participant> {
        self
    }

    fn events(&mut self) -> &mut dyn Repository<Event> {
        self
    }

    fn teams(&mut self) -> &mut dyn Repository<Team> {
        self
    }

    fn members(&mut self) -> &mut dyn Repository<TeamMember> {
        self
    }

    fn payments(&mut self) -> &mut dyn Repository<Payment> {
        self
    }

    fn windows(&mut self) -> &mut dyn Repository<RegistrationWindow> {
        self
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTransaction { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
