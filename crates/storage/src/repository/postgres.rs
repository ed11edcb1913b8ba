//! PostgreSQL backend.
//!
//! Queries are composed at runtime from [`Predicate`]s with [`QueryBuilder`],
//! so every value is a bound parameter. Transactions run at `SERIALIZABLE`;
//! serialization failures and unique violations caused by a racing writer
//! surface as [`StorageError::Conflict`].

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::query_builder::Separated;
use sqlx::{FromRow, Postgres, QueryBuilder, Row};
use std::str::FromStr;

use super::entity::Entity;
use super::predicate::Predicate;
use super::{Repository, Store, Transaction};
use crate::error::{Result, StorageError};
use crate::models::{
    Event, EventField, MemberField, MemberPatch, ParseEnumError, Participant, ParticipantField,
    ParticipantPatch, Payment, PaymentField, PaymentPatch, RegistrationWindow, Team, TeamField,
    TeamMember, TeamPatch, WindowField, WindowPatch,
};

#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for Database {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        Ok(Box::new(PgTransaction { tx }))
    }
}

pub struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

fn db_error(error: sqlx::Error) -> StorageError {
    StorageError::from(error).classify()
}

/// SQL mapping for an [`Entity`].
pub trait PgEntity: Entity + for<'r> FromRow<'r, PgRow> + Unpin {
    const TABLE: &'static str;
    const COLUMNS: &'static str;
    const ORDER_BY: &'static str;

    fn push_field(qb: &mut QueryBuilder<'_, Postgres>, field: &Self::Field);

    fn bind_row<'args>(&self, values: &mut Separated<'_, 'args, Postgres, &'static str>);

    /// Pushes `column = $n` assignments and returns how many were pushed.
    fn bind_patch<'args>(
        patch: &Self::Patch,
        set: &mut Separated<'_, 'args, Postgres, &'static str>,
    ) -> usize;
}

fn push_predicate<E: PgEntity>(qb: &mut QueryBuilder<'_, Postgres>, filter: &Predicate<E>) {
    match filter {
        Predicate::All => {
            qb.push("TRUE");
        }
        Predicate::Eq(field) => E::push_field(qb, field),
        Predicate::And(parts) => push_group(qb, parts, " AND ", "TRUE"),
        Predicate::Or(parts) => push_group(qb, parts, " OR ", "FALSE"),
        Predicate::Not(inner) => {
            qb.push("NOT (");
            push_predicate(qb, inner);
            qb.push(")");
        }
    }
}

fn push_group<E: PgEntity>(
    qb: &mut QueryBuilder<'_, Postgres>,
    parts: &[Predicate<E>],
    joiner: &str,
    empty: &str,
) {
    if parts.is_empty() {
        qb.push(empty);
        return;
    }

    qb.push("(");
    for (index, part) in parts.iter().enumerate() {
        if index > 0 {
            qb.push(joiner);
        }
        push_predicate(qb, part);
    }
    qb.push(")");
}

fn select<'args, E: PgEntity>(projection: &str, filter: &Predicate<E>) -> QueryBuilder<'args, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT {} FROM {} WHERE ", projection, E::TABLE));
    push_predicate(&mut qb, filter);
    qb
}

#[async_trait]
impl<E: PgEntity> Repository<E> for PgTransaction {
    async fn find_one(&mut self, filter: &Predicate<E>) -> Result<Option<E>> {
        let mut qb = select::<E>(E::COLUMNS, filter);
        qb.push(format!(" ORDER BY {} LIMIT 1", E::ORDER_BY));

        qb.build_query_as::<E>()
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error)
    }

    async fn find_many(&mut self, filter: &Predicate<E>) -> Result<Vec<E>> {
        let mut qb = select::<E>(E::COLUMNS, filter);
        qb.push(format!(" ORDER BY {}", E::ORDER_BY));

        qb.build_query_as::<E>()
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db_error)
    }

    async fn count(&mut self, filter: &Predicate<E>) -> Result<i64> {
        let mut qb = select::<E>("COUNT(*)", filter);

        qb.build_query_scalar::<i64>()
            .fetch_one(&mut *self.tx)
            .await
            .map_err(db_error)
    }

    async fn insert(&mut self, row: E) -> Result<E> {
        let mut qb = QueryBuilder::new(format!("INSERT INTO {} ({}) VALUES (", E::TABLE, E::COLUMNS));
        {
            let mut values = qb.separated(", ");
            row.bind_row(&mut values);
        }
        qb.push(format!(") RETURNING {}", E::COLUMNS));

        qb.build_query_as::<E>()
            .fetch_one(&mut *self.tx)
            .await
            .map_err(db_error)
    }

    async fn update(&mut self, filter: &Predicate<E>, patch: E::Patch) -> Result<u64> {
        let mut qb = QueryBuilder::new(format!("UPDATE {} SET ", E::TABLE));
        let assigned = {
            let mut set = qb.separated(", ");
            E::bind_patch(&patch, &mut set)
        };
        if assigned == 0 {
            return Ok(0);
        }
        qb.push(" WHERE ");
        push_predicate(&mut qb, filter);

        let result = qb
            .build()
            .execute(&mut *self.tx)
            .await
            .map_err(db_error)?;

        Ok(result.rows_affected())
    }

    async fn delete(&mut self, filter: &Predicate<E>) -> Result<u64> {
        let mut qb = QueryBuilder::new(format!("DELETE FROM {} WHERE ", E::TABLE));
        push_predicate(&mut qb, filter);

        let result = qb
            .build()
            .execute(&mut *self.tx)
            .await
            .map_err(db_error)?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl Transaction for PgTransaction {
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
        self.tx.commit().await.map_err(db_error)
    }
}

// Column decoding helpers

fn decode_enum<T>(row: &PgRow, column: &str) -> sqlx::Result<T>
where
    T: FromStr<Err = ParseEnumError>,
{
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|e: ParseEnumError| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

fn decode_optional_enum<T>(row: &PgRow, column: &str) -> sqlx::Result<Option<T>>
where
    T: FromStr<Err = ParseEnumError>,
{
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|value| value.parse())
        .transpose()
        .map_err(|e: ParseEnumError| sqlx::Error::ColumnDecode {
            index: column.to_string(),
            source: Box::new(e),
        })
}

/// Monetary columns are stored as decimal text.
fn decode_decimal(row: &PgRow, column: &str) -> sqlx::Result<Decimal> {
    let raw: String = row.try_get(column)?;
    Decimal::from_str(&raw).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

fn push_eq<'args, T>(qb: &mut QueryBuilder<'args, Postgres>, column: &str, value: T)
where
    T: 'args + sqlx::Encode<'args, Postgres> + sqlx::Type<Postgres>,
{
    qb.push(column).push(" = ").push_bind(value);
}

fn push_optional_eq<'args, T>(qb: &mut QueryBuilder<'args, Postgres>, column: &str, value: Option<T>)
where
    T: 'args + sqlx::Encode<'args, Postgres> + sqlx::Type<Postgres>,
{
    match value {
        Some(value) => push_eq(qb, column, value),
        None => {
            qb.push(column).push(" IS NULL");
        }
    }
}

fn assign<'args, T>(set: &mut Separated<'_, 'args, Postgres, &'static str>, column: &str, value: T)
where
    T: 'args + sqlx::Encode<'args, Postgres> + sqlx::Type<Postgres>,
{
    set.push(format!("{column} = "));
    set.push_bind_unseparated(value);
}

// Participants

impl<'r> FromRow<'r, PgRow> for Participant {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            participant_id: row.try_get("participant_id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            college_id: row.try_get("college_id")?,
            is_leader: row.try_get("is_leader")?,
            team_id: row.try_get("team_id")?,
            is_registration_complete: row.try_get("is_registration_complete")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl PgEntity for Participant {
    const TABLE: &'static str = "participants";
    const COLUMNS: &'static str = "participant_id, name, email, college_id, is_leader, team_id, \
                                   is_registration_complete, created_at";
    const ORDER_BY: &'static str = "created_at, participant_id";

    fn push_field(qb: &mut QueryBuilder<'_, Postgres>, field: &ParticipantField) {
        match field {
            ParticipantField::Id(id) => push_eq(qb, "participant_id", *id),
            ParticipantField::TeamId(team_id) => push_optional_eq(qb, "team_id", *team_id),
        }
    }

    fn bind_row<'args>(&self, values: &mut Separated<'_, 'args, Postgres, &'static str>) {
        values
            .push_bind(self.participant_id)
            .push_bind(self.name.clone())
            .push_bind(self.email.clone())
            .push_bind(self.college_id)
            .push_bind(self.is_leader)
            .push_bind(self.team_id)
            .push_bind(self.is_registration_complete)
            .push_bind(self.created_at);
    }

    fn bind_patch<'args>(
        patch: &ParticipantPatch,
        set: &mut Separated<'_, 'args, Postgres, &'static str>,
    ) -> usize {
        let mut assigned = 0;
        if let Some(team_id) = patch.team_id {
            assign(set, "team_id", team_id);
            assigned += 1;
        }
        if let Some(is_leader) = patch.is_leader {
            assign(set, "is_leader", is_leader);
            assigned += 1;
        }
        assigned
    }
}

// Events

impl<'r> FromRow<'r, PgRow> for Event {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            event_id: row.try_get("event_id")?,
            name: row.try_get("name")?,
            status: decode_enum(row, "status")?,
            event_type: decode_enum(row, "event_type")?,
            max_teams: row.try_get("max_teams")?,
            min_team_size: row.try_get("min_team_size")?,
            max_team_size: row.try_get("max_team_size")?,
            fee_per_head: decode_decimal(row, "fee_per_head")?,
            deadline: row.try_get("deadline")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl PgEntity for Event {
    const TABLE: &'static str = "events";
    const COLUMNS: &'static str = "event_id, name, status, event_type, max_teams, min_team_size, \
                                   max_team_size, fee_per_head, deadline, created_at";
    const ORDER_BY: &'static str = "created_at, event_id";

    fn push_field(qb: &mut QueryBuilder<'_, Postgres>, field: &EventField) {
        match field {
            EventField::Id(id) => push_eq(qb, "event_id", *id),
        }
    }

    fn bind_row<'args>(&self, values: &mut Separated<'_, 'args, Postgres, &'static str>) {
        values
            .push_bind(self.event_id)
            .push_bind(self.name.clone())
            .push_bind(self.status.as_str())
            .push_bind(self.event_type.as_str())
            .push_bind(self.max_teams)
            .push_bind(self.min_team_size)
            .push_bind(self.max_team_size)
            .push_bind(self.fee_per_head.to_string())
            .push_bind(self.deadline)
            .push_bind(self.created_at);
    }

    fn bind_patch<'args>(_patch: &(), _set: &mut Separated<'_, 'args, Postgres, &'static str>) -> usize {
        0
    }
}

// Teams

impl<'r> FromRow<'r, PgRow> for Team {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            team_id: row.try_get("team_id")?,
            event_id: row.try_get("event_id")?,
            name: row.try_get("name")?,
            leader_id: row.try_get("leader_id")?,
            is_completed: row.try_get("is_completed")?,
            payment_status: decode_optional_enum(row, "payment_status")?,
            attended: row.try_get("attended")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl PgEntity for Team {
    const TABLE: &'static str = "teams";
    const COLUMNS: &'static str = "team_id, event_id, name, leader_id, is_completed, payment_status, \
                                   attended, created_at, updated_at";
    const ORDER_BY: &'static str = "created_at, team_id";

    fn push_field(qb: &mut QueryBuilder<'_, Postgres>, field: &TeamField) {
        match field {
            TeamField::Id(id) => push_eq(qb, "team_id", *id),
            TeamField::EventId(event_id) => push_optional_eq(qb, "event_id", *event_id),
            TeamField::Name(name) => {
                qb.push("lower(name) = lower(")
                    .push_bind(name.clone())
                    .push(")");
            }
            TeamField::LeaderId(id) => push_eq(qb, "leader_id", *id),
            TeamField::IsCompleted(done) => push_eq(qb, "is_completed", *done),
        }
    }

    fn bind_row<'args>(&self, values: &mut Separated<'_, 'args, Postgres, &'static str>) {
        values
            .push_bind(self.team_id)
            .push_bind(self.event_id)
            .push_bind(self.name.clone())
            .push_bind(self.leader_id)
            .push_bind(self.is_completed)
            .push_bind(self.payment_status.map(|s| s.as_str()))
            .push_bind(self.attended)
            .push_bind(self.created_at)
            .push_bind(self.updated_at);
    }

    fn bind_patch<'args>(
        patch: &TeamPatch,
        set: &mut Separated<'_, 'args, Postgres, &'static str>,
    ) -> usize {
        let mut assigned = 0;
        if let Some(leader_id) = patch.leader_id {
            assign(set, "leader_id", leader_id);
            assigned += 1;
        }
        if let Some(is_completed) = patch.is_completed {
            assign(set, "is_completed", is_completed);
            assigned += 1;
        }
        if let Some(status) = patch.payment_status {
            assign(set, "payment_status", status.map(|s| s.as_str()));
            assigned += 1;
        }
        if let Some(attended) = patch.attended {
            assign(set, "attended", attended);
            assigned += 1;
        }
        if assigned > 0 {
            set.push("updated_at = NOW()");
        }
        assigned
    }
}

// Team members

impl<'r> FromRow<'r, PgRow> for TeamMember {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            team_id: row.try_get("team_id")?,
            event_id: row.try_get("event_id")?,
            user_id: row.try_get("user_id")?,
            is_leader: row.try_get("is_leader")?,
            college_id: row.try_get("college_id")?,
            joined_at: row.try_get("joined_at")?,
        })
    }
}

impl PgEntity for TeamMember {
    const TABLE: &'static str = "team_members";
    const COLUMNS: &'static str = "team_id, event_id, user_id, is_leader, college_id, joined_at";
    const ORDER_BY: &'static str = "joined_at, user_id";

    fn push_field(qb: &mut QueryBuilder<'_, Postgres>, field: &MemberField) {
        match field {
            MemberField::TeamId(id) => push_eq(qb, "team_id", *id),
            MemberField::EventId(event_id) => push_optional_eq(qb, "event_id", *event_id),
            MemberField::UserId(id) => push_eq(qb, "user_id", *id),
            MemberField::IsLeader(is_leader) => push_eq(qb, "is_leader", *is_leader),
        }
    }

    fn bind_row<'args>(&self, values: &mut Separated<'_, 'args, Postgres, &'static str>) {
        values
            .push_bind(self.team_id)
            .push_bind(self.event_id)
            .push_bind(self.user_id)
            .push_bind(self.is_leader)
            .push_bind(self.college_id)
            .push_bind(self.joined_at);
    }

    fn bind_patch<'args>(
        patch: &MemberPatch,
        set: &mut Separated<'_, 'args, Postgres, &'static str>,
    ) -> usize {
        match patch.is_leader {
            Some(is_leader) => {
                assign(set, "is_leader", is_leader);
                1
            }
            None => 0,
        }
    }
}

// Payments

impl<'r> FromRow<'r, PgRow> for Payment {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            payment_id: row.try_get("payment_id")?,
            payment_type: row.try_get("payment_type")?,
            payment_name: row.try_get("payment_name")?,
            amount: decode_decimal(row, "amount")?,
            payment_status: decode_enum(row, "payment_status")?,
            razorpay_order_id: row.try_get("razorpay_order_id")?,
            razorpay_payment_id: row.try_get("razorpay_payment_id")?,
            razorpay_signature: row.try_get("razorpay_signature")?,
            user_id: row.try_get("user_id")?,
            team_id: row.try_get("team_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl PgEntity for Payment {
    const TABLE: &'static str = "payments";
    const COLUMNS: &'static str = "payment_id, payment_type, payment_name, amount, payment_status, \
                                   razorpay_order_id, razorpay_payment_id, razorpay_signature, \
                                   user_id, team_id, created_at, updated_at";
    const ORDER_BY: &'static str = "created_at, payment_id";

    fn push_field(qb: &mut QueryBuilder<'_, Postgres>, field: &PaymentField) {
        match field {
            PaymentField::Id(id) => push_eq(qb, "payment_id", *id),
            PaymentField::OrderId(order_id) => push_eq(qb, "razorpay_order_id", order_id.clone()),
            PaymentField::RazorpayPaymentId(payment_id) => {
                push_eq(qb, "razorpay_payment_id", payment_id.clone())
            }
            PaymentField::TeamId(id) => push_eq(qb, "team_id", *id),
            PaymentField::Status(status) => push_eq(qb, "payment_status", status.as_str()),
        }
    }

    fn bind_row<'args>(&self, values: &mut Separated<'_, 'args, Postgres, &'static str>) {
        values
            .push_bind(self.payment_id)
            .push_bind(self.payment_type.clone())
            .push_bind(self.payment_name.clone())
            .push_bind(self.amount.to_string())
            .push_bind(self.payment_status.as_str())
            .push_bind(self.razorpay_order_id.clone())
            .push_bind(self.razorpay_payment_id.clone())
            .push_bind(self.razorpay_signature.clone())
            .push_bind(self.user_id)
            .push_bind(self.team_id)
            .push_bind(self.created_at)
            .push_bind(self.updated_at);
    }

    fn bind_patch<'args>(
        patch: &PaymentPatch,
        set: &mut Separated<'_, 'args, Postgres, &'static str>,
    ) -> usize {
        let mut assigned = 0;
        if let Some(status) = patch.payment_status {
            assign(set, "payment_status", status.as_str());
            assigned += 1;
        }
        if let Some(payment_id) = &patch.razorpay_payment_id {
            assign(set, "razorpay_payment_id", payment_id.clone());
            assigned += 1;
        }
        if let Some(signature) = &patch.razorpay_signature {
            assign(set, "razorpay_signature", signature.clone());
            assigned += 1;
        }
        if assigned > 0 {
            set.push("updated_at = NOW()");
        }
        assigned
    }
}

// Registration windows

impl<'r> FromRow<'r, PgRow> for RegistrationWindow {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            key: row.try_get("key")?,
            is_open: row.try_get("is_open")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl PgEntity for RegistrationWindow {
    const TABLE: &'static str = "registration_windows";
    const COLUMNS: &'static str = "key, is_open, updated_at";
    const ORDER_BY: &'static str = "key";

    fn push_field(qb: &mut QueryBuilder<'_, Postgres>, field: &WindowField) {
        match field {
            WindowField::Key(key) => push_eq(qb, "key", key.clone()),
        }
    }

    fn bind_row<'args>(&self, values: &mut Separated<'_, 'args, Postgres, &'static str>) {
        values
            .push_bind(self.key.clone())
            .push_bind(self.is_open)
            .push_bind(self.updated_at);
    }

    fn bind_patch<'args>(
        patch: &WindowPatch,
        set: &mut Separated<'_, 'args, Postgres, &'static str>,
    ) -> usize {
        match patch.is_open {
            Some(is_open) => {
                assign(set, "is_open", is_open);
                set.push("updated_at = NOW()");
                1
            }
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::models::PaymentStatus;
    use crate::repository::eq;

    #[test]
    fn test_predicate_renders_bound_sql() {
        let team_id = Uuid::new_v4();
        let filter = eq(TeamField::Id(team_id))
            .and(eq(TeamField::EventId(None)))
            .and(eq(TeamField::Name("Kraken".into())));

        let qb = select::<Team>(Team::COLUMNS, &filter);
        assert_eq!(
            qb.sql(),
            format!(
                "SELECT {} FROM teams WHERE (team_id = $1 AND event_id IS NULL AND lower(name) = lower($2))",
                Team::COLUMNS
            )
        );
    }

    #[test]
    fn test_or_and_not_render_grouped() {
        let filter = eq(PaymentField::Status(PaymentStatus::Paid))
            .or(eq(PaymentField::Status(PaymentStatus::Pending)))
            .negate();

        let qb = select::<Payment>("COUNT(*)", &filter);
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM payments WHERE NOT ((payment_status = $1 OR payment_status = $2))"
        );
    }
}
