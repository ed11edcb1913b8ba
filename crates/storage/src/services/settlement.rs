use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::error::{Result, ServiceError, StoreOperation, store_error};
use super::gateway::{GatewayOrder, OrderRequest, PaymentGateway, receipt_for};
use super::money::to_minor_units;
use super::signature;
use super::team_registry::{find_member, find_team, load_event, member_count};
use super::{begin, commit, retry_on_conflict};
use crate::models::{Payment, PaymentField, PaymentPatch, PaymentStatus, Team, TeamField, TeamPatch};
use crate::repository::{Transaction, Store, eq};

/// Label stored on payments that arrive without any order context.
pub const UNATTRIBUTED_PAYMENT: &str = "UNATTRIBUTED";

const MAX_PAYMENT_TYPE_LEN: usize = 64;

#[derive(Debug, Clone)]
pub struct SettlementConfig {
    /// Signs client-side checkout confirmations.
    pub key_secret: String,
    /// Signs webhook bodies.
    pub webhook_secret: String,
    pub currency: String,
    /// Per-head fee for hackathon-wide teams. Event teams use the event's fee.
    pub fee_per_head: Decimal,
    pub gateway_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CreatedOrder {
    pub order_id: String,
    /// Minor units, as charged by the gateway.
    pub amount: i64,
    pub currency: String,
    pub payment: Payment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettledPayment {
    pub payment_db_id: Uuid,
    pub razorpay_payment_id: String,
}

/// A verified `payment.captured` notification. `amount` is already in whole
/// currency units.
#[derive(Debug, Clone)]
pub struct CaptureNotice {
    pub payment_id: String,
    pub order_id: String,
    pub amount: Decimal,
    pub payment_type: Option<String>,
    pub payment_name: Option<String>,
    pub signature: String,
    pub team_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// No row existed for the order; one was recorded as paid.
    Recorded,
    /// A pending row was settled.
    Settled,
    AlreadyPaid,
    /// The order's payment is in a state this path does not touch.
    Ignored,
}

#[derive(Debug, Clone)]
struct Quote {
    team: Team,
    members: i64,
    amount: Decimal,
}

/// Moves payments from `Pending` to `Paid` and projects that onto the team.
///
/// Client confirmation and the gateway webhook both converge on the payment
/// row keyed by the gateway order id, so either may arrive first, twice, or
/// concurrently.
#[derive(Clone)]
pub struct SettlementEngine {
    store: Arc<dyn Store>,
    gateway: Arc<dyn PaymentGateway>,
    config: Arc<SettlementConfig>,
}

impl SettlementEngine {
    pub fn new(store: Arc<dyn Store>, gateway: Arc<dyn PaymentGateway>, config: SettlementConfig) -> Self {
        Self {
            store,
            gateway,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }

    /// Opens a gateway order for the team's entry fee and records it as a
    /// pending payment. No transaction is held while the gateway is called.
    pub async fn create_order(&self, user_id: Uuid, team_id: Uuid, payment_type: &str) -> Result<CreatedOrder> {
        let payment_type = payment_type.trim();
        if payment_type.is_empty() || payment_type.chars().count() > MAX_PAYMENT_TYPE_LEN {
            return Err(ServiceError::Validation(format!(
                "paymentType must be between 1 and {MAX_PAYMENT_TYPE_LEN} characters"
            )));
        }

        let quote = retry_on_conflict("quote_order", move || self.quote(user_id, team_id)).await?;
        let amount = to_minor_units(quote.amount)?;
        let request = OrderRequest {
            amount,
            currency: self.config.currency.clone(),
            receipt: receipt_for(team_id),
            payment_type: payment_type.to_string(),
            team_id,
            user_id,
        };

        let order = match tokio::time::timeout(self.config.gateway_timeout, self.gateway.create_order(&request)).await {
            Ok(Ok(order)) => order,
            Ok(Err(e)) => {
                error!(team_id = %team_id, error = %e, "Gateway rejected order creation");
                return Err(ServiceError::FailedToCreatePayment(e.to_string()));
            }
            Err(_) => {
                error!(
                    team_id = %team_id,
                    timeout_ms = self.config.gateway_timeout.as_millis() as u64,
                    "Gateway order creation timed out"
                );
                return Err(ServiceError::FailedToCreatePayment(
                    "gateway request timed out".to_string(),
                ));
            }
        };
        if order.amount != amount {
            warn!(
                order_id = %order.id,
                requested = amount,
                returned = order.amount,
                "Gateway order amount differs from the requested amount"
            );
        }

        let (quoted, opened) = (&quote, &order);
        let payment = retry_on_conflict("record_order", move || {
            self.record_order(user_id, quoted, opened, payment_type)
        })
        .await?;

        info!(
            order_id = %order.id,
            team_id = %team_id,
            user_id = %user_id,
            members = quote.members,
            amount = %quote.amount,
            "Payment order created"
        );
        Ok(CreatedOrder {
            order_id: order.id,
            amount,
            currency: order.currency,
            payment,
        })
    }

    async fn quote(&self, user_id: Uuid, team_id: Uuid) -> Result<Quote> {
        let mut tx = begin(self.store.as_ref()).await?;

        let team = find_team(tx.as_mut(), team_id).await?;
        let is_leader = find_member(tx.as_mut(), team_id, user_id)
            .await?
            .is_some_and(|member| member.is_leader);
        if !is_leader {
            return Err(ServiceError::OnlyLeaderCanCreatePaymentOrder);
        }
        if !team.is_completed {
            return Err(ServiceError::TeamNotCompleted);
        }
        ensure_unpaid(tx.as_mut(), &team).await?;

        let members = member_count(tx.as_mut(), team_id).await?;
        let fee = match team.event_id {
            Some(event_id) => load_event(tx.as_mut(), event_id).await?.fee_per_head,
            None => self.config.fee_per_head,
        };
        commit(tx).await?;

        Ok(Quote {
            team,
            members,
            amount: fee * Decimal::from(members),
        })
    }

    async fn record_order(
        &self,
        user_id: Uuid,
        quote: &Quote,
        order: &GatewayOrder,
        payment_type: &str,
    ) -> Result<Payment> {
        let mut tx = begin(self.store.as_ref()).await?;

        let team = find_team(tx.as_mut(), quote.team.team_id).await?;
        ensure_unpaid(tx.as_mut(), &team).await?;

        let now = Utc::now();
        let payment = tx
            .payments()
            .insert(Payment {
                payment_id: Uuid::new_v4(),
                payment_type: payment_type.to_string(),
                payment_name: None,
                amount: quote.amount,
                payment_status: PaymentStatus::Pending,
                razorpay_order_id: Some(order.id.clone()),
                razorpay_payment_id: None,
                razorpay_signature: None,
                user_id: Some(user_id),
                team_id: Some(team.team_id),
                created_at: now,
                updated_at: now,
            })
            .await
            .map_err(store_error::<Payment>(StoreOperation::Insert))?;
        commit(tx).await?;
        Ok(payment)
    }

    /// Client-driven settlement after checkout. The signature is HMAC-SHA256
    /// over `"{order_id}|{payment_id}"` keyed with the gateway key secret.
    pub async fn confirm_payment(&self, order_id: &str, payment_id: &str, signature: &str) -> Result<SettledPayment> {
        let message = signature::payment_message(order_id, payment_id);
        if !signature::verify(&self.config.key_secret, message.as_bytes(), signature) {
            warn!(order_id, payment_id, "Rejected payment confirmation with an invalid signature");
            if cfg!(debug_assertions) {
                debug!(
                    expected = %signature::sign(&self.config.key_secret, message.as_bytes()),
                    "Expected confirmation signature"
                );
            }
            return Err(ServiceError::InvalidSignature);
        }

        retry_on_conflict("confirm_payment", move || {
            self.try_confirm(order_id, payment_id, signature)
        })
        .await
    }

    async fn try_confirm(&self, order_id: &str, payment_id: &str, signature: &str) -> Result<SettledPayment> {
        let mut tx = begin(self.store.as_ref()).await?;

        let replay = tx
            .payments()
            .find_one(
                &eq(PaymentField::RazorpayPaymentId(payment_id.to_string()))
                    .and(eq(PaymentField::Status(PaymentStatus::Paid))),
            )
            .await
            .map_err(store_error::<Payment>(StoreOperation::Query))?;
        if let Some(paid) = replay {
            debug!(order_id, payment_id, "Payment already settled");
            return Ok(SettledPayment {
                payment_db_id: paid.payment_id,
                razorpay_payment_id: payment_id.to_string(),
            });
        }

        let existing = tx
            .payments()
            .find_one(&eq(PaymentField::OrderId(order_id.to_string())))
            .await
            .map_err(store_error::<Payment>(StoreOperation::Query))?;

        let settled = match existing {
            Some(pending) if pending.payment_status == PaymentStatus::Pending => {
                settle_pending(tx.as_mut(), &pending, payment_id, Some(signature)).await?;
                if let Some(team_id) = pending.team_id {
                    mark_team_paid(tx.as_mut(), team_id).await?;
                }
                info!(order_id, payment_id, team_id = ?pending.team_id, "Payment confirmed");
                SettledPayment {
                    payment_db_id: pending.payment_id,
                    razorpay_payment_id: payment_id.to_string(),
                }
            }
            Some(other) => {
                warn!(
                    order_id,
                    payment_id,
                    status = %other.payment_status,
                    recorded_payment_id = ?other.razorpay_payment_id,
                    "Order already settled under another state"
                );
                return Ok(SettledPayment {
                    payment_db_id: other.payment_id,
                    razorpay_payment_id: other
                        .razorpay_payment_id
                        .unwrap_or_else(|| payment_id.to_string()),
                });
            }
            None => {
                let now = Utc::now();
                let payment = tx
                    .payments()
                    .insert(Payment {
                        payment_id: Uuid::new_v4(),
                        payment_type: UNATTRIBUTED_PAYMENT.to_string(),
                        payment_name: None,
                        amount: Decimal::ZERO,
                        payment_status: PaymentStatus::Paid,
                        razorpay_order_id: Some(order_id.to_string()),
                        razorpay_payment_id: Some(payment_id.to_string()),
                        razorpay_signature: Some(signature.to_string()),
                        user_id: None,
                        team_id: None,
                        created_at: now,
                        updated_at: now,
                    })
                    .await
                    .map_err(store_error::<Payment>(StoreOperation::Insert))?;
                warn!(order_id, payment_id, "Confirmed a payment with no recorded order");
                SettledPayment {
                    payment_db_id: payment.payment_id,
                    razorpay_payment_id: payment_id.to_string(),
                }
            }
        };
        commit(tx).await?;
        Ok(settled)
    }

    /// Authenticates a webhook delivery against the raw, unparsed body.
    pub fn verify_webhook(&self, body: &[u8], signature: Option<&str>) -> Result<()> {
        let Some(signature) = signature else {
            warn!(body_len = body.len(), "Rejected webhook without a signature header");
            return Err(ServiceError::InvalidSignature);
        };
        if !signature::verify(&self.config.webhook_secret, body, signature) {
            warn!(body_len = body.len(), "Rejected webhook with an invalid signature");
            if cfg!(debug_assertions) {
                debug!(
                    expected = %signature::sign(&self.config.webhook_secret, body),
                    "Expected webhook signature"
                );
            }
            return Err(ServiceError::InvalidSignature);
        }
        Ok(())
    }

    /// Gateway-pushed settlement, keyed by order id.
    pub async fn webhook_capture(&self, notice: &CaptureNotice) -> Result<CaptureOutcome> {
        retry_on_conflict("webhook_capture", move || self.try_capture(notice)).await
    }

    async fn try_capture(&self, notice: &CaptureNotice) -> Result<CaptureOutcome> {
        let mut tx = begin(self.store.as_ref()).await?;

        let existing = tx
            .payments()
            .find_one(&eq(PaymentField::OrderId(notice.order_id.clone())))
            .await
            .map_err(store_error::<Payment>(StoreOperation::Query))?;

        let outcome = match existing {
            None => {
                let team_id = match notice.team_id {
                    Some(team_id) => {
                        let exists = tx
                            .teams()
                            .count(&eq(TeamField::Id(team_id)))
                            .await
                            .map_err(store_error::<Team>(StoreOperation::Query))?
                            > 0;
                        if !exists {
                            warn!(order_id = %notice.order_id, team_id = %team_id, "Captured payment names an unknown team");
                        }
                        exists.then_some(team_id)
                    }
                    None => None,
                };

                let now = Utc::now();
                tx.payments()
                    .insert(Payment {
                        payment_id: Uuid::new_v4(),
                        payment_type: notice
                            .payment_type
                            .clone()
                            .unwrap_or_else(|| UNATTRIBUTED_PAYMENT.to_string()),
                        payment_name: notice.payment_name.clone(),
                        amount: notice.amount,
                        payment_status: PaymentStatus::Paid,
                        razorpay_order_id: Some(notice.order_id.clone()),
                        razorpay_payment_id: Some(notice.payment_id.clone()),
                        razorpay_signature: Some(notice.signature.clone()),
                        user_id: None,
                        team_id,
                        created_at: now,
                        updated_at: now,
                    })
                    .await
                    .map_err(store_error::<Payment>(StoreOperation::Insert))?;
                if let Some(team_id) = team_id {
                    mark_team_paid(tx.as_mut(), team_id).await?;
                }
                CaptureOutcome::Recorded
            }
            Some(payment) => match payment.payment_status {
                PaymentStatus::Pending => {
                    settle_pending(tx.as_mut(), &payment, &notice.payment_id, None).await?;
                    if let Some(team_id) = payment.team_id {
                        mark_team_paid(tx.as_mut(), team_id).await?;
                    }
                    CaptureOutcome::Settled
                }
                PaymentStatus::Paid => {
                    if let Some(team_id) = payment.team_id {
                        mark_team_paid(tx.as_mut(), team_id).await?;
                    }
                    CaptureOutcome::AlreadyPaid
                }
                PaymentStatus::Refunded => CaptureOutcome::Ignored,
            },
        };
        commit(tx).await?;

        info!(
            order_id = %notice.order_id,
            payment_id = %notice.payment_id,
            amount = %notice.amount,
            ?outcome,
            "Webhook capture applied"
        );
        Ok(outcome)
    }
}

/// Refuses when the team has already paid, by its status projection or by
/// any paid payment row.
async fn ensure_unpaid(tx: &mut dyn Transaction, team: &Team) -> Result<()> {
    if team.is_paid() {
        return Err(ServiceError::PaymentAlreadyCompleted);
    }
    let paid = tx
        .payments()
        .count(&eq(PaymentField::TeamId(team.team_id)).and(eq(PaymentField::Status(PaymentStatus::Paid))))
        .await
        .map_err(store_error::<Payment>(StoreOperation::Query))?;
    if paid > 0 {
        warn!(team_id = %team.team_id, "Team status does not reflect its paid payment");
        return Err(ServiceError::PaymentAlreadyCompleted);
    }
    Ok(())
}

async fn settle_pending(
    tx: &mut dyn Transaction,
    pending: &Payment,
    payment_id: &str,
    signature: Option<&str>,
) -> Result<()> {
    let updated = tx
        .payments()
        .update(
            &eq(PaymentField::Id(pending.payment_id)).and(eq(PaymentField::Status(PaymentStatus::Pending))),
            PaymentPatch {
                payment_status: Some(PaymentStatus::Paid),
                razorpay_payment_id: Some(payment_id.to_string()),
                razorpay_signature: signature.map(str::to_string),
            },
        )
        .await
        .map_err(store_error::<Payment>(StoreOperation::Update))?;
    if updated == 0 {
        return Err(ServiceError::ConcurrentModification);
    }
    Ok(())
}

async fn mark_team_paid(tx: &mut dyn Transaction, team_id: Uuid) -> Result<()> {
    tx.teams()
        .update(
            &eq(TeamField::Id(team_id)),
            TeamPatch {
                payment_status: Some(Some(PaymentStatus::Paid)),
                ..Default::default()
            },
        )
        .await
        .map_err(store_error::<Team>(StoreOperation::Update))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use futures::future::join_all;

    use super::*;
    use crate::models::{EventType, Scope};
    use crate::repository::all;
    use crate::repository::memory::MemoryStore;
    use crate::services::money::from_minor_units;
    use crate::services::testing::{
        ConflictingStore, FakeGateway, Fixtures, KEY_SECRET, WEBHOOK_SECRET, confirmed_team, seed_event,
        seed_participant, settlement_config,
    };

    async fn payments(store: &MemoryStore) -> Vec<Payment> {
        let mut tx = store.begin().await.unwrap();
        tx.payments().find_many(&all()).await.unwrap()
    }

    async fn stored_team(store: &MemoryStore, team_id: Uuid) -> Team {
        let mut tx = store.begin().await.unwrap();
        tx.teams().find_one(&eq(TeamField::Id(team_id))).await.unwrap().unwrap()
    }

    fn client_signature(order_id: &str, payment_id: &str) -> String {
        signature::sign(KEY_SECRET, signature::payment_message(order_id, payment_id).as_bytes())
    }

    fn notice(order_id: &str, payment_id: &str, team_id: Option<Uuid>) -> CaptureNotice {
        CaptureNotice {
            payment_id: payment_id.to_string(),
            order_id: order_id.to_string(),
            amount: from_minor_units(140_000),
            payment_type: Some("HACKATHON".to_string()),
            payment_name: Some("Team fee".to_string()),
            signature: "webhook".to_string(),
            team_id,
        }
    }

    #[tokio::test]
    async fn test_create_order_charges_per_head_in_paise() {
        let fixtures = Fixtures::new();
        let (leader, team) = confirmed_team(&fixtures, 4).await;

        let order = fixtures
            .settlement
            .create_order(leader.user_id, team.team_id, "HACKATHON")
            .await
            .unwrap();

        assert_eq!(order.amount, 140_000);
        assert_eq!(order.currency, "INR");
        assert_eq!(order.payment.amount, Decimal::from(1400));
        assert_eq!(order.payment.payment_status, PaymentStatus::Pending);
        assert_eq!(order.payment.razorpay_order_id.as_deref(), Some(order.order_id.as_str()));

        let requests = fixtures.gateway.requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].amount, 140_000);
        assert_eq!(requests[0].receipt, receipt_for(team.team_id));
        assert_eq!(from_minor_units(requests[0].amount), order.payment.amount);
    }

    #[tokio::test]
    async fn test_create_order_preconditions() {
        let fixtures = Fixtures::new();
        let store = &fixtures.store;
        let alice = seed_participant(store, "Alice").await;
        let bob = seed_participant(store, "Bob").await;
        let team = fixtures
            .registry
            .create(&alice, Scope::Global, "Kraken", false)
            .await
            .unwrap();
        fixtures
            .registry
            .join(&bob, Scope::Global, team.team_id, None)
            .await
            .unwrap();

        let err = fixtures
            .settlement
            .create_order(bob.user_id, team.team_id, "HACKATHON")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ONLY_LEADER_CAN_CREATE_PAYMENT_ORDER");

        let err = fixtures
            .settlement
            .create_order(alice.user_id, team.team_id, "HACKATHON")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "TEAM_NOT_COMPLETED");

        let err = fixtures
            .settlement
            .create_order(alice.user_id, team.team_id, "")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "VALIDATION");

        assert!(fixtures.gateway.requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_create_order_for_unknown_team() {
        let fixtures = Fixtures::new();
        let alice = seed_participant(&fixtures.store, "Alice").await;

        let err = fixtures
            .settlement
            .create_order(alice.user_id, Uuid::new_v4(), "HACKATHON")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "TEAM_NOT_FOUND");
        assert_eq!(err.status_code(), 404);
        assert!(fixtures.gateway.requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_create_order_rejects_paid_team_even_when_status_drifted() {
        let fixtures = Fixtures::new();
        let (leader, team) = confirmed_team(&fixtures, 3).await;

        let mut tx = fixtures.store.begin().await.unwrap();
        tx.payments()
            .insert(Payment {
                payment_id: Uuid::new_v4(),
                payment_type: "HACKATHON".to_string(),
                payment_name: None,
                amount: Decimal::from(1050),
                payment_status: PaymentStatus::Paid,
                razorpay_order_id: Some("order_old".to_string()),
                razorpay_payment_id: Some("pay_old".to_string()),
                razorpay_signature: None,
                user_id: Some(leader.user_id),
                team_id: Some(team.team_id),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let err = fixtures
            .settlement
            .create_order(leader.user_id, team.team_id, "HACKATHON")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "PAYMENT_ALREADY_COMPLETED");
        assert!(fixtures.gateway.requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_gateway_failure_leaves_no_payment_row() {
        let fixtures = Fixtures::with_gateway(FakeGateway::failing());
        let (leader, team) = confirmed_team(&fixtures, 3).await;

        let err = fixtures
            .settlement
            .create_order(leader.user_id, team.team_id, "HACKATHON")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "FAILED_TO_CREATE_PAYMENT");
        assert!(payments(&fixtures.store).await.is_empty());
    }

    #[tokio::test]
    async fn test_gateway_timeout_fails_closed() {
        let fixtures = Fixtures::with_gateway(FakeGateway::hanging());
        let (leader, team) = confirmed_team(&fixtures, 3).await;

        let err = fixtures
            .settlement
            .create_order(leader.user_id, team.team_id, "HACKATHON")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "FAILED_TO_CREATE_PAYMENT");
        assert!(payments(&fixtures.store).await.is_empty());
    }

    #[tokio::test]
    async fn test_event_team_uses_event_fee() {
        let fixtures = Fixtures::new();
        let event = seed_event(&fixtures.store, EventType::Team, 2, 3, None, Decimal::new(12550, 2)).await;
        let scope = Scope::Event(event.event_id);
        let alice = seed_participant(&fixtures.store, "Alice").await;
        let bob = seed_participant(&fixtures.store, "Bob").await;

        let team = fixtures.registry.create(&alice, scope, "Kraken", false).await.unwrap();
        fixtures.registry.join(&bob, scope, team.team_id, None).await.unwrap();
        fixtures.registry.confirm(&alice, scope, team.team_id).await.unwrap();

        let order = fixtures
            .settlement
            .create_order(alice.user_id, team.team_id, "CTF")
            .await
            .unwrap();
        assert_eq!(order.amount, 25_100);
        assert_eq!(order.payment.amount, Decimal::new(25100, 2));
    }

    #[tokio::test]
    async fn test_confirm_rejects_bad_signature() {
        let fixtures = Fixtures::new();
        let (leader, team) = confirmed_team(&fixtures, 3).await;
        let order = fixtures
            .settlement
            .create_order(leader.user_id, team.team_id, "HACKATHON")
            .await
            .unwrap();

        let forged = signature::sign("wrong", b"whatever");
        let err = fixtures
            .settlement
            .confirm_payment(&order.order_id, "pay_1", &forged)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "INVALID_SIGNATURE");
        assert_eq!(payments(&fixtures.store).await[0].payment_status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_confirm_is_idempotent() {
        let fixtures = Fixtures::new();
        let (leader, team) = confirmed_team(&fixtures, 4).await;
        let order = fixtures
            .settlement
            .create_order(leader.user_id, team.team_id, "HACKATHON")
            .await
            .unwrap();
        let signature = client_signature(&order.order_id, "pay_1");

        let first = fixtures
            .settlement
            .confirm_payment(&order.order_id, "pay_1", &signature)
            .await
            .unwrap();
        let second = fixtures
            .settlement
            .confirm_payment(&order.order_id, "pay_1", &signature)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first.payment_db_id, order.payment.payment_id);

        let rows = payments(&fixtures.store).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].payment_status, PaymentStatus::Paid);
        assert_eq!(rows[0].razorpay_signature.as_deref(), Some(signature.as_str()));
        assert!(stored_team(&fixtures.store, team.team_id).await.is_paid());

        let err = fixtures
            .settlement
            .create_order(leader.user_id, team.team_id, "HACKATHON")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "PAYMENT_ALREADY_COMPLETED");
    }

    #[tokio::test]
    async fn test_confirm_without_order_records_unattributed_payment() {
        let fixtures = Fixtures::new();
        let signature = client_signature("order_ghost", "pay_ghost");

        fixtures
            .settlement
            .confirm_payment("order_ghost", "pay_ghost", &signature)
            .await
            .unwrap();

        let rows = payments(&fixtures.store).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].payment_status, PaymentStatus::Paid);
        assert_eq!(rows[0].payment_type, UNATTRIBUTED_PAYMENT);
        assert!(rows[0].team_id.is_none());
        assert!(rows[0].user_id.is_none());
    }

    #[tokio::test]
    async fn test_webhook_before_confirmation_records_payment() {
        let fixtures = Fixtures::new();
        let (_, team) = confirmed_team(&fixtures, 4).await;

        let outcome = fixtures
            .settlement
            .webhook_capture(&notice("order_early", "pay_early", Some(team.team_id)))
            .await
            .unwrap();
        assert_eq!(outcome, CaptureOutcome::Recorded);

        let rows = payments(&fixtures.store).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].amount, Decimal::from(1400));
        assert_eq!(rows[0].payment_name.as_deref(), Some("Team fee"));
        assert!(stored_team(&fixtures.store, team.team_id).await.is_paid());

        let signature = client_signature("order_early", "pay_early");
        let settled = fixtures
            .settlement
            .confirm_payment("order_early", "pay_early", &signature)
            .await
            .unwrap();
        assert_eq!(settled.payment_db_id, rows[0].payment_id);
        assert_eq!(payments(&fixtures.store).await.len(), 1);
    }

    #[tokio::test]
    async fn test_webhook_is_idempotent() {
        let fixtures = Fixtures::new();
        let (leader, team) = confirmed_team(&fixtures, 3).await;
        let order = fixtures
            .settlement
            .create_order(leader.user_id, team.team_id, "HACKATHON")
            .await
            .unwrap();
        let capture = notice(&order.order_id, "pay_1", Some(team.team_id));

        let first = fixtures.settlement.webhook_capture(&capture).await.unwrap();
        let second = fixtures.settlement.webhook_capture(&capture).await.unwrap();

        assert_eq!(first, CaptureOutcome::Settled);
        assert_eq!(second, CaptureOutcome::AlreadyPaid);
        let rows = payments(&fixtures.store).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].razorpay_payment_id.as_deref(), Some("pay_1"));
        assert_eq!(rows[0].amount, Decimal::from(1050));
    }

    #[tokio::test]
    async fn test_webhook_with_unknown_team_is_still_recorded() {
        let fixtures = Fixtures::new();

        fixtures
            .settlement
            .webhook_capture(&notice("order_x", "pay_x", Some(Uuid::new_v4())))
            .await
            .unwrap();

        let rows = payments(&fixtures.store).await;
        assert_eq!(rows.len(), 1);
        assert!(rows[0].team_id.is_none());
    }

    #[tokio::test]
    async fn test_webhook_reusing_a_payment_id_is_a_store_failure() {
        let fixtures = Fixtures::new();
        fixtures
            .settlement
            .webhook_capture(&notice("order_a", "pay_dup", None))
            .await
            .unwrap();

        let err = fixtures
            .settlement
            .webhook_capture(&notice("order_b", "pay_dup", None))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "PAYMENT_INSERT_FAILED");
        assert_eq!(err.status_code(), 500);
        let rows = payments(&fixtures.store).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].razorpay_order_id.as_deref(), Some("order_a"));
    }

    #[tokio::test]
    async fn test_webhook_retry_sees_the_winning_confirmation() {
        let fixtures = Fixtures::new();
        let (leader, team) = confirmed_team(&fixtures, 3).await;
        let order = fixtures
            .settlement
            .create_order(leader.user_id, team.team_id, "HACKATHON")
            .await
            .unwrap();
        let signature = client_signature(&order.order_id, "pay_1");

        let winner = fixtures.settlement.clone();
        let (order_id, winning_signature) = (order.order_id.clone(), signature.clone());
        let store = ConflictingStore::new(fixtures.store.clone(), 1).with_interloper(move || async move {
            winner
                .confirm_payment(&order_id, "pay_1", &winning_signature)
                .await
                .expect("confirmation wins the race");
        });
        let engine = SettlementEngine::new(Arc::new(store.clone()), fixtures.gateway.clone(), settlement_config());

        let outcome = engine
            .webhook_capture(&notice(&order.order_id, "pay_1", Some(team.team_id)))
            .await
            .unwrap();

        assert_eq!(outcome, CaptureOutcome::AlreadyPaid);
        assert_eq!(store.commits(), 2);
        let rows = payments(&fixtures.store).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].payment_status, PaymentStatus::Paid);
        assert_eq!(rows[0].razorpay_signature.as_deref(), Some(signature.as_str()));
        assert!(stored_team(&fixtures.store, team.team_id).await.is_paid());
    }

    #[tokio::test]
    async fn test_confirm_and_webhook_race_converges() {
        let fixtures = Fixtures::new();
        let (leader, team) = confirmed_team(&fixtures, 4).await;
        let order = fixtures
            .settlement
            .create_order(leader.user_id, team.team_id, "HACKATHON")
            .await
            .unwrap();
        let signature = client_signature(&order.order_id, "pay_race");

        let mut handles = Vec::new();
        for i in 0..6 {
            let engine = fixtures.settlement.clone();
            let order_id = order.order_id.clone();
            let signature = signature.clone();
            let capture = notice(&order.order_id, "pay_race", Some(team.team_id));
            handles.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    engine
                        .confirm_payment(&order_id, "pay_race", &signature)
                        .await
                        .map(|_| ())
                } else {
                    engine.webhook_capture(&capture).await.map(|_| ())
                }
            }));
        }
        for result in join_all(handles).await {
            result.unwrap().unwrap();
        }

        let rows = payments(&fixtures.store).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].payment_status, PaymentStatus::Paid);
        assert_eq!(rows[0].razorpay_payment_id.as_deref(), Some("pay_race"));
        assert!(stored_team(&fixtures.store, team.team_id).await.is_paid());
    }

    #[test]
    fn test_verify_webhook_uses_raw_body() {
        let fixtures = Fixtures::new();
        let body = br#"{"event":"payment.captured"}"#;
        let good = signature::sign(WEBHOOK_SECRET, body);

        assert!(fixtures.settlement.verify_webhook(body, Some(&good)).is_ok());

        let err = fixtures.settlement.verify_webhook(body, None).unwrap_err();
        assert_eq!(err.kind(), "INVALID_SIGNATURE");

        let reformatted = br#"{ "event": "payment.captured" }"#;
        assert!(fixtures.settlement.verify_webhook(reformatted, Some(&good)).is_err());
    }
}
