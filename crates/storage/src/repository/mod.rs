//! Typed persistence layer.
//!
//! Every entity is reached through [`Repository`], filtered by a closed
//! [`Predicate`] over that entity's field enum. Both backends evaluate the same
//! predicate: [`memory::MemoryStore`] in process, and [`postgres::Database`] by
//! rendering it into bound SQL.

pub mod entity;
pub mod memory;
pub mod postgres;
pub mod predicate;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Event, Participant, Payment, RegistrationWindow, Team, TeamMember};

pub use entity::{Entity, Field};
pub use predicate::{Predicate, all, eq};

#[async_trait]
pub trait Repository<E: Entity>: Send {
    async fn find_one(&mut self, filter: &Predicate<E>) -> Result<Option<E>>;

    async fn find_many(&mut self, filter: &Predicate<E>) -> Result<Vec<E>>;

    async fn count(&mut self, filter: &Predicate<E>) -> Result<i64>;

    async fn insert(&mut self, row: E) -> Result<E>;

    /// Returns the number of rows affected.
    async fn update(&mut self, filter: &Predicate<E>, patch: E::Patch) -> Result<u64>;

    /// Returns the number of rows affected.
    async fn delete(&mut self, filter: &Predicate<E>) -> Result<u64>;
}

/// A unit of work. Every read and write made through the accessors is part of
/// one atomic transaction; dropping it without [`Transaction::commit`] rolls
/// everything back.
#[async_trait]
pub trait Transaction: Send {
    fn participants(&mut self) -> &mut dyn Repository<Participant>;

    fn events(&mut self) -> &mut dyn Repository<Event>;

    fn teams(&mut self) -> &mut dyn Repository<Team>;

    fn members(&mut self) -> &mut dyn Repository<TeamMember>;

    fn payments(&mut self) -> &mut dyn Repository<Payment>;

    fn windows(&mut self) -> &mut dyn Repository<RegistrationWindow>;

    async fn commit(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn Transaction>>;
}
