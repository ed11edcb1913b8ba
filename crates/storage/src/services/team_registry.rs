use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::error::{Result, ServiceError, StoreOperation, store_error};
use super::{begin, commit, retry_on_conflict};
use crate::models::{
    Event, EventField, MemberField, MemberPatch, Participant, ParticipantField, ParticipantPatch,
    Principal, Scope, Team, TeamField, TeamMember, TeamPatch,
};
use crate::repository::{Store, Transaction, eq};

/// Team size bounds for the hackathon-wide flow. Event flows take theirs from
/// the event row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeamPolicy {
    pub min_team_size: i64,
    pub max_team_size: i64,
}

impl Default for TeamPolicy {
    fn default() -> Self {
        Self {
            min_team_size: 3,
            max_team_size: 4,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SizeRules {
    min: i64,
    max: i64,
    max_teams: Option<i64>,
}

/// A team together with its membership rows, leader first.
#[derive(Debug, Clone)]
pub struct TeamRoster {
    pub team: Team,
    pub members: Vec<TeamMember>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    Left,
    /// The caller was the last member; the team was removed with them.
    TeamDeleted,
}

/// Owns the team lifecycle: `Forming` -> `Completed`, and deletion.
///
/// Every operation runs in one store transaction and re-checks its
/// preconditions inside it, so racing callers either observe each other's
/// committed writes or lose with a conflict that is retried.
#[derive(Clone)]
pub struct TeamRegistry {
    store: Arc<dyn Store>,
    policy: TeamPolicy,
}

impl TeamRegistry {
    pub fn new(store: Arc<dyn Store>, policy: TeamPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> TeamPolicy {
        self.policy
    }

    pub async fn create(
        &self,
        principal: &Principal,
        scope: Scope,
        name: &str,
        auto_confirm: bool,
    ) -> Result<Team> {
        let name = name.trim();
        if name.is_empty() || name.chars().count() > 50 {
            return Err(ServiceError::Validation(
                "Team name must be between 1 and 50 characters".to_string(),
            ));
        }

        retry_on_conflict("create_team", move || {
            self.try_create(principal, scope, name, auto_confirm)
        })
        .await
    }

    async fn try_create(
        &self,
        principal: &Principal,
        scope: Scope,
        name: &str,
        auto_confirm: bool,
    ) -> Result<Team> {
        let mut tx = begin(self.store.as_ref()).await?;

        if membership_in_scope(tx.as_mut(), scope, principal.user_id)
            .await?
            .is_some()
        {
            return Err(ServiceError::Validation(
                "You already belong to a team".to_string(),
            ));
        }

        let rules = self.size_rules(tx.as_mut(), scope).await?;
        if let Some(max_teams) = rules.max_teams {
            if completed_teams(tx.as_mut(), scope).await? >= max_teams {
                return Err(ServiceError::CapacityExceeded(
                    "the event has reached its team limit",
                ));
            }
        }

        let taken = tx
            .teams()
            .count(&eq(TeamField::EventId(scope.event_id())).and(eq(TeamField::Name(name.to_string()))))
            .await
            .map_err(store_error::<Team>(StoreOperation::Query))?;
        if taken > 0 {
            return Err(ServiceError::Validation(format!(
                "The team name \"{name}\" is already taken"
            )));
        }

        let now = Utc::now();
        let team = tx
            .teams()
            .insert(Team {
                team_id: Uuid::new_v4(),
                event_id: scope.event_id(),
                name: name.to_string(),
                leader_id: principal.user_id,
                is_completed: auto_confirm,
                payment_status: None,
                attended: false,
                created_at: now,
                updated_at: now,
            })
            .await
            .map_err(store_error::<Team>(StoreOperation::Insert))?;

        tx.members()
            .insert(TeamMember {
                team_id: team.team_id,
                event_id: scope.event_id(),
                user_id: principal.user_id,
                is_leader: true,
                college_id: principal.college_id,
                joined_at: now,
            })
            .await
            .map_err(store_error::<TeamMember>(StoreOperation::Insert))?;

        mirror_membership(tx.as_mut(), scope, principal.user_id, Some(team.team_id), true).await?;
        commit(tx).await?;

        info!(
            team_id = %team.team_id,
            user_id = %principal.user_id,
            event_id = ?scope.event_id(),
            auto_confirm,
            "Team created"
        );
        Ok(team)
    }

    pub async fn join(
        &self,
        principal: &Principal,
        scope: Scope,
        team_id: Uuid,
        college_id: Option<Uuid>,
    ) -> Result<TeamMember> {
        retry_on_conflict("join_team", move || {
            self.try_join(principal, scope, team_id, college_id)
        })
        .await
    }

    async fn try_join(
        &self,
        principal: &Principal,
        scope: Scope,
        team_id: Uuid,
        college_id: Option<Uuid>,
    ) -> Result<TeamMember> {
        let mut tx = begin(self.store.as_ref()).await?;

        let team = load_team(tx.as_mut(), scope, team_id).await?;
        if team.is_completed {
            return Err(ServiceError::TeamAlreadyConfirmed);
        }
        if membership_in_scope(tx.as_mut(), scope, principal.user_id)
            .await?
            .is_some()
        {
            return Err(ServiceError::AlreadyInTeam);
        }

        let rules = self.size_rules(tx.as_mut(), scope).await?;
        if member_count(tx.as_mut(), team_id).await? >= rules.max {
            return Err(ServiceError::CapacityExceeded("the team is full"));
        }

        let member = tx
            .members()
            .insert(TeamMember {
                team_id,
                event_id: scope.event_id(),
                user_id: principal.user_id,
                is_leader: false,
                college_id: college_id.or(principal.college_id),
                joined_at: Utc::now(),
            })
            .await
            .map_err(store_error::<TeamMember>(StoreOperation::Insert))?;

        mirror_membership(tx.as_mut(), scope, principal.user_id, Some(team_id), false).await?;
        commit(tx).await?;

        info!(team_id = %team_id, user_id = %principal.user_id, "Member joined team");
        Ok(member)
    }

    pub async fn leave(&self, principal: &Principal, scope: Scope, team_id: Uuid) -> Result<LeaveOutcome> {
        retry_on_conflict("leave_team", move || self.try_leave(principal, scope, team_id)).await
    }

    async fn try_leave(&self, principal: &Principal, scope: Scope, team_id: Uuid) -> Result<LeaveOutcome> {
        let mut tx = begin(self.store.as_ref()).await?;

        let team = load_team(tx.as_mut(), scope, team_id).await?;
        let member = find_member(tx.as_mut(), team_id, principal.user_id)
            .await?
            .ok_or(ServiceError::NotInTeam)?;
        if team.is_completed {
            return Err(ServiceError::TeamAlreadyConfirmed);
        }

        let remaining = member_count(tx.as_mut(), team_id).await? - 1;
        if member.is_leader && remaining > 0 {
            return Err(ServiceError::Forbidden(
                "The team leader cannot leave while other members remain; delete the team or ask an organizer to transfer leadership",
            ));
        }

        tx.members()
            .delete(&eq(MemberField::TeamId(team_id)).and(eq(MemberField::UserId(principal.user_id))))
            .await
            .map_err(store_error::<TeamMember>(StoreOperation::Delete))?;
        mirror_membership(tx.as_mut(), scope, principal.user_id, None, false).await?;

        let outcome = if remaining == 0 {
            tx.teams()
                .delete(&eq(TeamField::Id(team_id)))
                .await
                .map_err(store_error::<Team>(StoreOperation::Delete))?;
            LeaveOutcome::TeamDeleted
        } else {
            LeaveOutcome::Left
        };
        commit(tx).await?;

        info!(team_id = %team_id, user_id = %principal.user_id, ?outcome, "Member left team");
        Ok(outcome)
    }

    pub async fn kick(&self, principal: &Principal, scope: Scope, team_id: Uuid, member_id: Uuid) -> Result<()> {
        retry_on_conflict("kick_member", move || {
            self.try_kick(principal, scope, team_id, member_id)
        })
        .await
    }

    async fn try_kick(&self, principal: &Principal, scope: Scope, team_id: Uuid, member_id: Uuid) -> Result<()> {
        let mut tx = begin(self.store.as_ref()).await?;

        let team = load_team(tx.as_mut(), scope, team_id).await?;
        if team.leader_id != principal.user_id {
            return Err(ServiceError::Forbidden("Only the team leader can remove members"));
        }
        if member_id == principal.user_id {
            return Err(ServiceError::Validation(
                "You cannot remove yourself; leave or delete the team instead".to_string(),
            ));
        }
        if team.is_completed {
            return Err(ServiceError::TeamAlreadyConfirmed);
        }

        let removed = tx
            .members()
            .delete(&eq(MemberField::TeamId(team_id)).and(eq(MemberField::UserId(member_id))))
            .await
            .map_err(store_error::<TeamMember>(StoreOperation::Delete))?;
        if removed == 0 {
            return Err(ServiceError::NotInTeam);
        }
        mirror_membership(tx.as_mut(), scope, member_id, None, false).await?;
        commit(tx).await?;

        info!(team_id = %team_id, user_id = %member_id, leader_id = %principal.user_id, "Member removed from team");
        Ok(())
    }

    pub async fn confirm(&self, principal: &Principal, scope: Scope, team_id: Uuid) -> Result<Team> {
        retry_on_conflict("confirm_team", move || self.try_confirm(principal, scope, team_id)).await
    }

    async fn try_confirm(&self, principal: &Principal, scope: Scope, team_id: Uuid) -> Result<Team> {
        let mut tx = begin(self.store.as_ref()).await?;

        let team = load_team(tx.as_mut(), scope, team_id).await?;
        if team.leader_id != principal.user_id {
            return Err(ServiceError::Forbidden("Only the team leader can confirm the team"));
        }
        if team.is_completed {
            return Err(ServiceError::TeamAlreadyConfirmed);
        }

        let rules = self.size_rules(tx.as_mut(), scope).await?;
        let members = member_count(tx.as_mut(), team_id).await?;
        if members < rules.min {
            return Err(ServiceError::MinTeamSizeNotMet {
                required: rules.min,
                actual: members,
            });
        }
        if let Some(max_teams) = rules.max_teams {
            if completed_teams(tx.as_mut(), scope).await? >= max_teams {
                return Err(ServiceError::CapacityExceeded(
                    "the event has reached its team limit",
                ));
            }
        }

        let updated = tx
            .teams()
            .update(
                &eq(TeamField::Id(team_id)).and(eq(TeamField::IsCompleted(false))),
                TeamPatch {
                    is_completed: Some(true),
                    ..Default::default()
                },
            )
            .await
            .map_err(store_error::<Team>(StoreOperation::Update))?;
        if updated == 0 {
            return Err(ServiceError::ConcurrentModification);
        }
        let team = load_team(tx.as_mut(), scope, team_id).await?;
        commit(tx).await?;

        info!(team_id = %team_id, members, "Team confirmed");
        Ok(team)
    }

    /// Removes the team and releases every member. Returns how many members
    /// were released.
    pub async fn delete(&self, principal: &Principal, scope: Scope, team_id: Uuid) -> Result<u64> {
        retry_on_conflict("delete_team", move || self.try_delete(principal, scope, team_id)).await
    }

    async fn try_delete(&self, principal: &Principal, scope: Scope, team_id: Uuid) -> Result<u64> {
        let mut tx = begin(self.store.as_ref()).await?;

        let team = load_team(tx.as_mut(), scope, team_id).await?;
        if team.leader_id != principal.user_id {
            return Err(ServiceError::Forbidden("Only the team leader can delete the team"));
        }

        let members = tx
            .members()
            .find_many(&eq(MemberField::TeamId(team_id)))
            .await
            .map_err(store_error::<TeamMember>(StoreOperation::Query))?;
        for member in &members {
            mirror_membership(tx.as_mut(), scope, member.user_id, None, false).await?;
        }
        let released = tx
            .members()
            .delete(&eq(MemberField::TeamId(team_id)))
            .await
            .map_err(store_error::<TeamMember>(StoreOperation::Delete))?;
        tx.teams()
            .delete(&eq(TeamField::Id(team_id)))
            .await
            .map_err(store_error::<Team>(StoreOperation::Delete))?;
        commit(tx).await?;

        info!(team_id = %team_id, released, "Team deleted");
        Ok(released)
    }

    /// Administrative leadership transfer. The target must already be a member.
    pub async fn set_leader(&self, team_id: Uuid, member_id: Uuid) -> Result<Team> {
        retry_on_conflict("set_leader", move || self.try_set_leader(team_id, member_id)).await
    }

    async fn try_set_leader(&self, team_id: Uuid, member_id: Uuid) -> Result<Team> {
        let mut tx = begin(self.store.as_ref()).await?;

        let team = find_team(tx.as_mut(), team_id).await?;
        let target = find_member(tx.as_mut(), team_id, member_id)
            .await?
            .ok_or(ServiceError::NotInTeam)?;
        if target.is_leader && team.leader_id == member_id {
            return Ok(team);
        }

        let scope = team.scope();
        tx.members()
            .update(
                &eq(MemberField::TeamId(team_id)).and(eq(MemberField::IsLeader(true))),
                MemberPatch {
                    is_leader: Some(false),
                },
            )
            .await
            .map_err(store_error::<TeamMember>(StoreOperation::Update))?;
        tx.members()
            .update(
                &eq(MemberField::TeamId(team_id)).and(eq(MemberField::UserId(member_id))),
                MemberPatch {
                    is_leader: Some(true),
                },
            )
            .await
            .map_err(store_error::<TeamMember>(StoreOperation::Update))?;
        tx.teams()
            .update(
                &eq(TeamField::Id(team_id)),
                TeamPatch {
                    leader_id: Some(member_id),
                    ..Default::default()
                },
            )
            .await
            .map_err(store_error::<Team>(StoreOperation::Update))?;

        mirror_membership(tx.as_mut(), scope, team.leader_id, Some(team_id), false).await?;
        mirror_membership(tx.as_mut(), scope, member_id, Some(team_id), true).await?;

        let team = find_team(tx.as_mut(), team_id).await?;
        commit(tx).await?;

        info!(team_id = %team_id, leader_id = %member_id, "Team leader reassigned");
        Ok(team)
    }

    pub async fn mark_attendance(&self, team_id: Uuid, attended: bool) -> Result<Team> {
        retry_on_conflict("mark_attendance", move || self.try_mark_attendance(team_id, attended)).await
    }

    async fn try_mark_attendance(&self, team_id: Uuid, attended: bool) -> Result<Team> {
        let mut tx = begin(self.store.as_ref()).await?;

        let updated = tx
            .teams()
            .update(
                &eq(TeamField::Id(team_id)),
                TeamPatch {
                    attended: Some(attended),
                    ..Default::default()
                },
            )
            .await
            .map_err(store_error::<Team>(StoreOperation::Update))?;
        if updated == 0 {
            return Err(ServiceError::TeamNotFound);
        }
        let team = find_team(tx.as_mut(), team_id).await?;
        commit(tx).await?;

        info!(team_id = %team_id, attended, "Attendance recorded");
        Ok(team)
    }

    /// The caller's team in `scope`, if any.
    pub async fn team_of(&self, principal: &Principal, scope: Scope) -> Result<Option<TeamRoster>> {
        let mut tx = begin(self.store.as_ref()).await?;

        let Some(membership) = membership_in_scope(tx.as_mut(), scope, principal.user_id).await? else {
            return Ok(None);
        };
        let team = find_team(tx.as_mut(), membership.team_id).await?;
        let members = roster(tx.as_mut(), team.team_id).await?;
        Ok(Some(TeamRoster { team, members }))
    }

    /// A team with its members. Only members of the team may read it.
    pub async fn get(&self, principal: &Principal, team_id: Uuid) -> Result<TeamRoster> {
        let mut tx = begin(self.store.as_ref()).await?;

        let team = find_team(tx.as_mut(), team_id).await?;
        let members = roster(tx.as_mut(), team_id).await?;
        if !members.iter().any(|m| m.user_id == principal.user_id) {
            return Err(ServiceError::Forbidden("Only members can view this team"));
        }
        Ok(TeamRoster { team, members })
    }

    async fn size_rules(&self, tx: &mut dyn Transaction, scope: Scope) -> Result<SizeRules> {
        match scope {
            Scope::Global => Ok(SizeRules {
                min: self.policy.min_team_size,
                max: self.policy.max_team_size,
                max_teams: None,
            }),
            Scope::Event(event_id) => {
                let event = load_event(tx, event_id).await?;
                Ok(SizeRules {
                    min: event.min_team_size.into(),
                    max: event.max_team_size.into(),
                    max_teams: event.max_teams.map(i64::from),
                })
            }
        }
    }
}

pub(crate) async fn load_event(tx: &mut dyn Transaction, event_id: Uuid) -> Result<Event> {
    tx.events()
        .find_one(&eq(EventField::Id(event_id)))
        .await
        .map_err(store_error::<Event>(StoreOperation::Query))?
        .filter(Event::is_visible)
        .ok_or(ServiceError::EventNotFound)
}

/// Loads a team by id without regard to scope.
pub(crate) async fn find_team(tx: &mut dyn Transaction, team_id: Uuid) -> Result<Team> {
    tx.teams()
        .find_one(&eq(TeamField::Id(team_id)))
        .await
        .map_err(store_error::<Team>(StoreOperation::Query))?
        .ok_or(ServiceError::TeamNotFound)
}

/// Loads a team only if it lives in `scope`, so an id from another event
/// reads as missing.
async fn load_team(tx: &mut dyn Transaction, scope: Scope, team_id: Uuid) -> Result<Team> {
    tx.teams()
        .find_one(&eq(TeamField::Id(team_id)).and(eq(TeamField::EventId(scope.event_id()))))
        .await
        .map_err(store_error::<Team>(StoreOperation::Query))?
        .ok_or(ServiceError::TeamNotFound)
}

async fn membership_in_scope(tx: &mut dyn Transaction, scope: Scope, user_id: Uuid) -> Result<Option<TeamMember>> {
    tx.members()
        .find_one(&eq(MemberField::EventId(scope.event_id())).and(eq(MemberField::UserId(user_id))))
        .await
        .map_err(store_error::<TeamMember>(StoreOperation::Query))
}

pub(crate) async fn find_member(tx: &mut dyn Transaction, team_id: Uuid, user_id: Uuid) -> Result<Option<TeamMember>> {
    tx.members()
        .find_one(&eq(MemberField::TeamId(team_id)).and(eq(MemberField::UserId(user_id))))
        .await
        .map_err(store_error::<TeamMember>(StoreOperation::Query))
}

pub(crate) async fn member_count(tx: &mut dyn Transaction, team_id: Uuid) -> Result<i64> {
    tx.members()
        .count(&eq(MemberField::TeamId(team_id)))
        .await
        .map_err(store_error::<TeamMember>(StoreOperation::Query))
}

async fn roster(tx: &mut dyn Transaction, team_id: Uuid) -> Result<Vec<TeamMember>> {
    let mut members = tx
        .members()
        .find_many(&eq(MemberField::TeamId(team_id)))
        .await
        .map_err(store_error::<TeamMember>(StoreOperation::Query))?;
    members.sort_by(|a, b| b.is_leader.cmp(&a.is_leader).then(a.joined_at.cmp(&b.joined_at)));
    Ok(members)
}

async fn completed_teams(tx: &mut dyn Transaction, scope: Scope) -> Result<i64> {
    tx.teams()
        .count(&eq(TeamField::EventId(scope.event_id())).and(eq(TeamField::IsCompleted(true))))
        .await
        .map_err(store_error::<Team>(StoreOperation::Query))
}

/// Global memberships are also recorded on the participant row.
async fn mirror_membership(
    tx: &mut dyn Transaction,
    scope: Scope,
    user_id: Uuid,
    team_id: Option<Uuid>,
    is_leader: bool,
) -> Result<()> {
    if !scope.is_global() {
        return Ok(());
    }
    tx.participants()
        .update(
            &eq(ParticipantField::Id(user_id)),
            ParticipantPatch::membership(team_id, is_leader),
        )
        .await
        .map_err(store_error::<Participant>(StoreOperation::Update))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use futures::future::join_all;
    use rust_decimal::Decimal;

    use super::*;
    use crate::models::EventType;
    use crate::repository::memory::MemoryStore;
    use crate::services::MAX_ATTEMPTS;
    use crate::services::principal::find_principal;
    use crate::services::testing::{ConflictingStore, Fixtures, confirmed_team, seed_event, seed_participant};

    async fn leader_count(store: &MemoryStore, team_id: Uuid) -> i64 {
        let mut tx = store.begin().await.unwrap();
        tx.members()
            .count(&eq(MemberField::TeamId(team_id)).and(eq(MemberField::IsLeader(true))))
            .await
            .unwrap()
    }

    async fn roster_size(store: &MemoryStore, team_id: Uuid) -> i64 {
        let mut tx = store.begin().await.unwrap();
        tx.members().count(&eq(MemberField::TeamId(team_id))).await.unwrap()
    }

    fn registry_over(store: &ConflictingStore) -> TeamRegistry {
        TeamRegistry::new(Arc::new(store.clone()), TeamPolicy::default())
    }

    async fn participant(store: &MemoryStore, user_id: Uuid) -> Participant {
        let mut tx = store.begin().await.unwrap();
        tx.participants()
            .find_one(&eq(ParticipantField::Id(user_id)))
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_makes_caller_the_single_leader() {
        let Fixtures { store, registry, .. } = Fixtures::new();
        let alice = seed_participant(&store, "Alice").await;

        let team = registry.create(&alice, Scope::Global, "Kraken", false).await.unwrap();

        assert_eq!(team.leader_id, alice.user_id);
        assert!(!team.is_completed);
        assert_eq!(leader_count(&store, team.team_id).await, 1);

        let row = participant(&store, alice.user_id).await;
        assert_eq!(row.team_id, Some(team.team_id));
        assert!(row.is_leader);
    }

    #[tokio::test]
    async fn test_create_rejects_second_team_in_same_scope() {
        let Fixtures { store, registry, .. } = Fixtures::new();
        let alice = seed_participant(&store, "Alice").await;

        registry.create(&alice, Scope::Global, "Kraken", false).await.unwrap();
        let err = registry
            .create(&alice, Scope::Global, "Leviathan", false)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "VALIDATION");
    }

    #[tokio::test]
    async fn test_team_names_are_unique_per_scope_ignoring_case() {
        let Fixtures { store, registry, .. } = Fixtures::new();
        let alice = seed_participant(&store, "Alice").await;
        let bob = seed_participant(&store, "Bob").await;

        registry.create(&alice, Scope::Global, "Kraken", false).await.unwrap();
        let err = registry.create(&bob, Scope::Global, "kraken", false).await.unwrap_err();
        assert_eq!(err.kind(), "VALIDATION");

        let event = seed_event(&store, EventType::Team, 1, 4, None, Decimal::from(100)).await;
        registry
            .create(&bob, Scope::Event(event.event_id), "Kraken", false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_join_checks_run_in_order() {
        let Fixtures { store, registry, .. } = Fixtures::new();
        let alice = seed_participant(&store, "Alice").await;
        let bob = seed_participant(&store, "Bob").await;

        let err = registry
            .join(&bob, Scope::Global, Uuid::new_v4(), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "TEAM_NOT_FOUND");

        let team = registry.create(&alice, Scope::Global, "Kraken", false).await.unwrap();
        let err = registry
            .join(&alice, Scope::Global, team.team_id, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ALREADY_IN_TEAM");

        let member = registry
            .join(&bob, Scope::Global, team.team_id, None)
            .await
            .unwrap();
        assert!(!member.is_leader);
        assert_eq!(participant(&store, bob.user_id).await.team_id, Some(team.team_id));
    }

    #[tokio::test]
    async fn test_team_ids_do_not_cross_scopes() {
        let Fixtures { store, registry, .. } = Fixtures::new();
        let alice = seed_participant(&store, "Alice").await;
        let bob = seed_participant(&store, "Bob").await;
        let event = seed_event(&store, EventType::Team, 1, 4, None, Decimal::from(100)).await;

        let team = registry
            .create(&alice, Scope::Event(event.event_id), "Kraken", false)
            .await
            .unwrap();

        let err = registry
            .join(&bob, Scope::Global, team.team_id, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "TEAM_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_event_memberships_are_independent() {
        let Fixtures { store, registry, .. } = Fixtures::new();
        let alice = seed_participant(&store, "Alice").await;
        let ctf = seed_event(&store, EventType::Team, 1, 4, None, Decimal::from(100)).await;
        let quiz = seed_event(&store, EventType::Team, 1, 4, None, Decimal::from(100)).await;

        registry.create(&alice, Scope::Global, "Kraken", false).await.unwrap();
        registry
            .create(&alice, Scope::Event(ctf.event_id), "Kraken", false)
            .await
            .unwrap();
        registry
            .create(&alice, Scope::Event(quiz.event_id), "Kraken", false)
            .await
            .unwrap();

        let mine = registry
            .team_of(&alice, Scope::Event(ctf.event_id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(mine.team.event_id, Some(ctf.event_id));
        assert_eq!(mine.members.len(), 1);
    }

    #[tokio::test]
    async fn test_confirm_requires_minimum_then_locks_membership() {
        let Fixtures { store, registry, .. } = Fixtures::new();
        let alice = seed_participant(&store, "Alice").await;
        let bob = seed_participant(&store, "Bob").await;
        let carol = seed_participant(&store, "Carol").await;
        let dave = seed_participant(&store, "Dave").await;

        let team = registry.create(&alice, Scope::Global, "Kraken", false).await.unwrap();
        registry.join(&bob, Scope::Global, team.team_id, None).await.unwrap();

        let err = registry.confirm(&alice, Scope::Global, team.team_id).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::MinTeamSizeNotMet {
                required: 3,
                actual: 2
            }
        ));

        let err = registry.confirm(&bob, Scope::Global, team.team_id).await.unwrap_err();
        assert_eq!(err.kind(), "FORBIDDEN");

        registry.join(&carol, Scope::Global, team.team_id, None).await.unwrap();
        let confirmed = registry.confirm(&alice, Scope::Global, team.team_id).await.unwrap();
        assert!(confirmed.is_completed);

        let err = registry.confirm(&alice, Scope::Global, team.team_id).await.unwrap_err();
        assert_eq!(err.kind(), "TEAM_ALREADY_CONFIRMED");

        let err = registry
            .join(&dave, Scope::Global, team.team_id, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "TEAM_ALREADY_CONFIRMED");

        let err = registry.leave(&bob, Scope::Global, team.team_id).await.unwrap_err();
        assert_eq!(err.kind(), "TEAM_ALREADY_CONFIRMED");
    }

    #[tokio::test]
    async fn test_leader_can_delete_confirmed_team() {
        let fixtures = Fixtures::new();
        let (leader, team) = confirmed_team(&fixtures, 3).await;
        let registry = &fixtures.registry;

        let roster = registry.get(&leader, team.team_id).await.unwrap();
        let bob = roster
            .members
            .iter()
            .find(|member| !member.is_leader)
            .map(|member| member.user_id)
            .unwrap();
        let bob = find_principal(&fixtures.store, bob).await.unwrap().unwrap();
        let err = registry.delete(&bob, Scope::Global, team.team_id).await.unwrap_err();
        assert_eq!(err.kind(), "FORBIDDEN");

        let released = registry.delete(&leader, Scope::Global, team.team_id).await.unwrap();
        assert_eq!(released, 3);

        let err = registry.get(&leader, team.team_id).await.unwrap_err();
        assert_eq!(err.kind(), "TEAM_NOT_FOUND");
        assert!(registry.team_of(&leader, Scope::Global).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_join_rejects_full_team() {
        let Fixtures { store, registry, .. } = Fixtures::new();
        let leader = seed_participant(&store, "Leader").await;
        let team = registry.create(&leader, Scope::Global, "Kraken", false).await.unwrap();
        for name in ["Bob", "Carol", "Dave"] {
            let member = seed_participant(&store, name).await;
            registry.join(&member, Scope::Global, team.team_id, None).await.unwrap();
        }

        let eve = seed_participant(&store, "Eve").await;
        let err = registry
            .join(&eve, Scope::Global, team.team_id, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "CAPACITY_EXCEEDED");
    }

    #[tokio::test]
    async fn test_join_retries_a_lost_commit() {
        let fixtures = Fixtures::new();
        let leader = seed_participant(&fixtures.store, "Leader").await;
        let team = fixtures
            .registry
            .create(&leader, Scope::Global, "Kraken", false)
            .await
            .unwrap();
        let bob = seed_participant(&fixtures.store, "Bob").await;
        let store = ConflictingStore::new(fixtures.store.clone(), 1);

        let member = registry_over(&store)
            .join(&bob, Scope::Global, team.team_id, None)
            .await
            .unwrap();

        assert_eq!(member.user_id, bob.user_id);
        assert_eq!(store.commits(), 2);
        assert_eq!(roster_size(&fixtures.store, team.team_id).await, 2);
        assert_eq!(participant(&fixtures.store, bob.user_id).await.team_id, Some(team.team_id));
    }

    #[tokio::test]
    async fn test_join_retry_rechecks_capacity() {
        let fixtures = Fixtures::new();
        let leader = seed_participant(&fixtures.store, "Leader").await;
        let team = fixtures
            .registry
            .create(&leader, Scope::Global, "Kraken", false)
            .await
            .unwrap();
        for name in ["Bob", "Carol"] {
            let member = seed_participant(&fixtures.store, name).await;
            fixtures
                .registry
                .join(&member, Scope::Global, team.team_id, None)
                .await
                .unwrap();
        }
        let dave = seed_participant(&fixtures.store, "Dave").await;
        let eve = seed_participant(&fixtures.store, "Eve").await;

        let winner = fixtures.registry.clone();
        let team_id = team.team_id;
        let store = ConflictingStore::new(fixtures.store.clone(), 1).with_interloper(move || async move {
            winner
                .join(&eve, Scope::Global, team_id, None)
                .await
                .expect("last slot taken");
        });

        let err = registry_over(&store)
            .join(&dave, Scope::Global, team.team_id, None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "CAPACITY_EXCEEDED");
        assert_eq!(store.commits(), 1);
        assert_eq!(roster_size(&fixtures.store, team.team_id).await, 4);
        assert_eq!(participant(&fixtures.store, dave.user_id).await.team_id, None);
    }

    #[tokio::test]
    async fn test_join_gives_up_after_repeated_conflicts() {
        let fixtures = Fixtures::new();
        let leader = seed_participant(&fixtures.store, "Leader").await;
        let team = fixtures
            .registry
            .create(&leader, Scope::Global, "Kraken", false)
            .await
            .unwrap();
        let bob = seed_participant(&fixtures.store, "Bob").await;
        let store = ConflictingStore::new(fixtures.store.clone(), MAX_ATTEMPTS);

        let err = registry_over(&store)
            .join(&bob, Scope::Global, team.team_id, None)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "CONCURRENT_MODIFICATION");
        assert_eq!(store.commits(), MAX_ATTEMPTS);
        assert_eq!(roster_size(&fixtures.store, team.team_id).await, 1);
        assert_eq!(participant(&fixtures.store, bob.user_id).await.team_id, None);
    }

    #[tokio::test]
    async fn test_concurrent_joins_never_overfill_a_team() {
        let Fixtures { store, registry, .. } = Fixtures::new();
        let leader = seed_participant(&store, "Leader").await;
        let team = registry.create(&leader, Scope::Global, "Kraken", false).await.unwrap();
        for name in ["Bob", "Carol"] {
            let member = seed_participant(&store, name).await;
            registry.join(&member, Scope::Global, team.team_id, None).await.unwrap();
        }

        let mut racers = Vec::new();
        for i in 0..8 {
            racers.push(seed_participant(&store, &format!("Racer {i}")).await);
        }
        let handles = racers.into_iter().map(|racer| {
            let registry = registry.clone();
            tokio::spawn(async move {
                registry
                    .join(&racer, Scope::Global, team.team_id, None)
                    .await
            })
        });
        let results: Vec<_> = join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        for failure in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(
                matches!(
                    failure,
                    ServiceError::CapacityExceeded(_) | ServiceError::ConcurrentModification
                ),
                "unexpected failure {failure:?}"
            );
        }

        let mut tx = store.begin().await.unwrap();
        let members = tx.members().count(&eq(MemberField::TeamId(team.team_id))).await.unwrap();
        assert_eq!(members, 4);
    }

    #[tokio::test]
    async fn test_kick_rules() {
        let Fixtures { store, registry, .. } = Fixtures::new();
        let alice = seed_participant(&store, "Alice").await;
        let bob = seed_participant(&store, "Bob").await;
        let carol = seed_participant(&store, "Carol").await;

        let team = registry.create(&alice, Scope::Global, "Kraken", false).await.unwrap();
        registry.join(&bob, Scope::Global, team.team_id, None).await.unwrap();

        let err = registry
            .kick(&bob, Scope::Global, team.team_id, alice.user_id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "FORBIDDEN");

        let err = registry
            .kick(&alice, Scope::Global, team.team_id, alice.user_id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "VALIDATION");

        let err = registry
            .kick(&alice, Scope::Global, team.team_id, carol.user_id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "NOT_IN_TEAM");

        registry
            .kick(&alice, Scope::Global, team.team_id, bob.user_id)
            .await
            .unwrap();
        assert_eq!(participant(&store, bob.user_id).await.team_id, None);
        assert_eq!(leader_count(&store, team.team_id).await, 1);
    }

    #[tokio::test]
    async fn test_leader_leaves_only_as_last_member() {
        let Fixtures { store, registry, .. } = Fixtures::new();
        let alice = seed_participant(&store, "Alice").await;
        let bob = seed_participant(&store, "Bob").await;

        let team = registry.create(&alice, Scope::Global, "Kraken", false).await.unwrap();
        registry.join(&bob, Scope::Global, team.team_id, None).await.unwrap();

        let err = registry.leave(&alice, Scope::Global, team.team_id).await.unwrap_err();
        assert_eq!(err.kind(), "FORBIDDEN");

        assert_eq!(
            registry.leave(&bob, Scope::Global, team.team_id).await.unwrap(),
            LeaveOutcome::Left
        );
        let err = registry.leave(&bob, Scope::Global, team.team_id).await.unwrap_err();
        assert_eq!(err.kind(), "NOT_IN_TEAM");

        assert_eq!(
            registry.leave(&alice, Scope::Global, team.team_id).await.unwrap(),
            LeaveOutcome::TeamDeleted
        );
        let err = registry.get(&alice, team.team_id).await.unwrap_err();
        assert_eq!(err.kind(), "TEAM_NOT_FOUND");
        assert_eq!(participant(&store, alice.user_id).await.team_id, None);
    }

    #[tokio::test]
    async fn test_delete_releases_every_member() {
        let Fixtures { store, registry, .. } = Fixtures::new();
        let alice = seed_participant(&store, "Alice").await;
        let bob = seed_participant(&store, "Bob").await;

        let team = registry.create(&alice, Scope::Global, "Kraken", false).await.unwrap();
        registry.join(&bob, Scope::Global, team.team_id, None).await.unwrap();

        let err = registry.delete(&bob, Scope::Global, team.team_id).await.unwrap_err();
        assert_eq!(err.kind(), "FORBIDDEN");

        assert_eq!(registry.delete(&alice, Scope::Global, team.team_id).await.unwrap(), 2);
        assert_eq!(participant(&store, alice.user_id).await.team_id, None);
        assert_eq!(participant(&store, bob.user_id).await.team_id, None);
        assert!(registry.team_of(&bob, Scope::Global).await.unwrap().is_none());

        registry.create(&bob, Scope::Global, "Kraken", false).await.unwrap();
    }

    #[tokio::test]
    async fn test_set_leader_keeps_one_leader() {
        let Fixtures { store, registry, .. } = Fixtures::new();
        let alice = seed_participant(&store, "Alice").await;
        let bob = seed_participant(&store, "Bob").await;
        let carol = seed_participant(&store, "Carol").await;

        let team = registry.create(&alice, Scope::Global, "Kraken", false).await.unwrap();
        registry.join(&bob, Scope::Global, team.team_id, None).await.unwrap();

        let err = registry.set_leader(team.team_id, carol.user_id).await.unwrap_err();
        assert_eq!(err.kind(), "NOT_IN_TEAM");

        let team = registry.set_leader(team.team_id, bob.user_id).await.unwrap();
        assert_eq!(team.leader_id, bob.user_id);
        assert_eq!(leader_count(&store, team.team_id).await, 1);
        assert!(participant(&store, bob.user_id).await.is_leader);
        assert!(!participant(&store, alice.user_id).await.is_leader);

        let roster = registry.get(&alice, team.team_id).await.unwrap();
        assert_eq!(roster.members[0].user_id, bob.user_id);
    }

    #[tokio::test]
    async fn test_mark_attendance() {
        let Fixtures { store, registry, .. } = Fixtures::new();
        let alice = seed_participant(&store, "Alice").await;
        let team = registry.create(&alice, Scope::Global, "Kraken", false).await.unwrap();

        assert!(registry.mark_attendance(team.team_id, true).await.unwrap().attended);
        let err = registry.mark_attendance(Uuid::new_v4(), true).await.unwrap_err();
        assert_eq!(err.kind(), "TEAM_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_non_members_cannot_read_a_team() {
        let Fixtures { store, registry, .. } = Fixtures::new();
        let alice = seed_participant(&store, "Alice").await;
        let mallory = seed_participant(&store, "Mallory").await;
        let team = registry.create(&alice, Scope::Global, "Kraken", false).await.unwrap();

        let err = registry.get(&mallory, team.team_id).await.unwrap_err();
        assert_eq!(err.kind(), "FORBIDDEN");
    }

    #[tokio::test]
    async fn test_event_team_limit_counts_completed_teams() {
        let Fixtures { store, registry, .. } = Fixtures::new();
        let event = seed_event(&store, EventType::Solo, 1, 1, Some(1), Decimal::from(50)).await;
        let scope = Scope::Event(event.event_id);
        let alice = seed_participant(&store, "Alice").await;
        let bob = seed_participant(&store, "Bob").await;

        let team = registry.create(&alice, scope, "Alice", true).await.unwrap();
        assert!(team.is_completed);

        let err = registry.create(&bob, scope, "Bob", true).await.unwrap_err();
        assert_eq!(err.kind(), "CAPACITY_EXCEEDED");
    }

    #[tokio::test]
    async fn test_unknown_event_is_not_found() {
        let Fixtures { store, registry, .. } = Fixtures::new();
        let alice = seed_participant(&store, "Alice").await;

        let err = registry
            .create(&alice, Scope::Event(Uuid::new_v4()), "Kraken", false)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "EVENT_NOT_FOUND");
    }
}
