//! In-memory fixtures and a scripted gateway for exercising the services
//! without PostgreSQL or network access.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::gateway::{GatewayError, GatewayOrder, OrderRequest, PaymentGateway};
use super::settlement::{SettlementConfig, SettlementEngine};
use super::team_registry::{TeamPolicy, TeamRegistry};
use crate::error::{Result as StorageResult, StorageError};
use crate::models::{
    Event, EventStatus, EventType, Participant, Payment, Principal, RegistrationWindow, Scope, Team, TeamMember,
};
use crate::repository::memory::MemoryStore;
use crate::repository::{Repository, Store, Transaction};

pub const KEY_SECRET: &str = "test_key_secret";
pub const WEBHOOK_SECRET: &str = "test_webhook_secret";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayBehavior {
    Succeed,
    Fail,
    /// Never answers; exercises the order timeout.
    Hang,
}

pub struct FakeGateway {
    behavior: GatewayBehavior,
    sequence: AtomicU64,
    requests: Mutex<Vec<OrderRequest>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::with_behavior(GatewayBehavior::Succeed)
    }

    pub fn failing() -> Self {
        Self::with_behavior(GatewayBehavior::Fail)
    }

    pub fn hanging() -> Self {
        Self::with_behavior(GatewayBehavior::Hang)
    }

    pub fn with_behavior(behavior: GatewayBehavior) -> Self {
        Self {
            behavior,
            sequence: AtomicU64::new(1),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub async fn requests(&self) -> Vec<OrderRequest> {
        self.requests.lock().await.clone()
    }
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_order(&self, request: &OrderRequest) -> Result<GatewayOrder, GatewayError> {
        self.requests.lock().await.push(request.clone());
        match self.behavior {
            GatewayBehavior::Succeed => {
                let n = self.sequence.fetch_add(1, Ordering::SeqCst);
                Ok(GatewayOrder {
                    id: format!("order_test{n:06}"),
                    amount: request.amount,
                    currency: request.currency.clone(),
                })
            }
            GatewayBehavior::Fail => Err("gateway responded with 502 Bad Gateway".into()),
            GatewayBehavior::Hang => std::future::pending().await,
        }
    }
}

pub fn settlement_config() -> SettlementConfig {
    SettlementConfig {
        key_secret: KEY_SECRET.to_string(),
        webhook_secret: WEBHOOK_SECRET.to_string(),
        currency: "INR".to_string(),
        fee_per_head: Decimal::from(350),
        gateway_timeout: Duration::from_millis(100),
    }
}

/// A memory store with both services wired to it.
pub struct Fixtures {
    pub store: MemoryStore,
    pub registry: TeamRegistry,
    pub settlement: SettlementEngine,
    pub gateway: Arc<FakeGateway>,
}

impl Fixtures {
    pub fn new() -> Self {
        Self::with_gateway(FakeGateway::new())
    }

    pub fn with_gateway(gateway: FakeGateway) -> Self {
        let store = MemoryStore::new();
        let shared: Arc<dyn Store> = Arc::new(store.clone());
        let gateway = Arc::new(gateway);
        Self {
            registry: TeamRegistry::new(Arc::clone(&shared), TeamPolicy::default()),
            settlement: SettlementEngine::new(shared, gateway.clone(), settlement_config()),
            store,
            gateway,
        }
    }
}

impl Default for Fixtures {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn seed_participant(store: &MemoryStore, name: &str) -> Principal {
    let participant = Participant {
        participant_id: Uuid::new_v4(),
        name: name.to_string(),
        email: format!("{}@example.edu", name.to_lowercase().replace(' ', ".")),
        college_id: Some(Uuid::new_v4()),
        is_leader: false,
        team_id: None,
        is_registration_complete: true,
        created_at: Utc::now(),
    };

    let mut tx = store.begin().await.expect("begin");
    tx.participants().insert(participant.clone()).await.expect("insert participant");
    tx.commit().await.expect("commit");
    Principal::from(&participant)
}

pub async fn seed_event(
    store: &MemoryStore,
    event_type: EventType,
    min_team_size: i32,
    max_team_size: i32,
    max_teams: Option<i32>,
    fee_per_head: Decimal,
) -> Event {
    let event = Event {
        event_id: Uuid::new_v4(),
        name: format!("{event_type} event"),
        status: EventStatus::Published,
        event_type,
        max_teams,
        min_team_size,
        max_team_size,
        fee_per_head,
        deadline: Utc::now() + ChronoDuration::days(7),
        created_at: Utc::now(),
    };

    let mut tx = store.begin().await.expect("begin");
    tx.events().insert(event.clone()).await.expect("insert event");
    tx.commit().await.expect("commit");
    event
}

/// A confirmed hackathon-wide team of `size` members. Returns its leader.
pub async fn confirmed_team(fixtures: &Fixtures, size: usize) -> (Principal, Team) {
    let leader = seed_participant(&fixtures.store, "Leader").await;
    let team = fixtures
        .registry
        .create(&leader, Scope::Global, &format!("Team {}", Uuid::new_v4().simple()), false)
        .await
        .expect("create team");
    for i in 1..size {
        let member = seed_participant(&fixtures.store, &format!("Member {i}")).await;
        fixtures
            .registry
            .join(&member, Scope::Global, team.team_id, None)
            .await
            .expect("join team");
    }
    let team = fixtures
        .registry
        .confirm(&leader, Scope::Global, team.team_id)
        .await
        .expect("confirm team");
    (leader, team)
}

type Interloper = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

/// A [`MemoryStore`] whose first `conflicts` commits lose with
/// [`StorageError::Conflict`], discarding their writes. An optional
/// interloper runs once in place of a losing commit and plays the writer that
/// won the race.
#[derive(Clone)]
pub struct ConflictingStore {
    inner: MemoryStore,
    conflicts: Arc<AtomicU32>,
    commits: Arc<AtomicU32>,
    interloper: Arc<Mutex<Option<Interloper>>>,
}

impl ConflictingStore {
    pub fn new(inner: MemoryStore, conflicts: u32) -> Self {
        Self {
            inner,
            conflicts: Arc::new(AtomicU32::new(conflicts)),
            commits: Arc::new(AtomicU32::new(0)),
            interloper: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_interloper<F, Fut>(self, interloper: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let boxed: Interloper = Box::new(move || Box::pin(interloper()));
        self.interloper
            .try_lock()
            .expect("interloper installed before use")
            .replace(boxed);
        self
    }

    /// Commits attempted so far, lost ones included.
    pub fn commits(&self) -> u32 {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Store for ConflictingStore {
    async fn begin(&self) -> StorageResult<Box<dyn Transaction>> {
        let inner = self.inner.begin().await?;
        Ok(Box::new(ConflictingTransaction {
            inner,
            store: self.clone(),
        }))
    }
}

struct ConflictingTransaction {
    inner: Box<dyn Transaction>,
    store: ConflictingStore,
}

#[async_trait]
impl Transaction for ConflictingTransaction {
    fn participants(&mut self) -> &mut dyn Repository<Participant> {
        self.inner.participants()
    }

    fn events(&mut self) -> &mut dyn Repository<Event> {
        self.inner.events()
    }

    fn teams(&mut self) -> &mut dyn Repository<Team> {
        self.inner.teams()
    }

    fn members(&mut self) -> &mut dyn Repository<TeamMember> {
        self.inner.members()
    }

    fn payments(&mut self) -> &mut dyn Repository<Payment> {
        self.inner.payments()
    }

    fn windows(&mut self) -> &mut dyn Repository<RegistrationWindow> {
        self.inner.windows()
    }

    async fn commit(self: Box<Self>) -> StorageResult<()> {
        let Self { inner, store } = *self;
        store.commits.fetch_add(1, Ordering::SeqCst);
        let loses = store
            .conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if !loses {
            return inner.commit().await;
        }

        // Release the store lock before the winner writes.
        drop(inner);
        let interloper = store.interloper.lock().await.take();
        if let Some(interloper) = interloper {
            interloper().await;
        }
        Err(StorageError::Conflict)
    }
}
