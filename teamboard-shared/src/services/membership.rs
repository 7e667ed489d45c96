//! Membership Registry
//!
//! Source of truth for who belongs to which team and with what role. Every
//! team with at least one membership keeps at least one manager:
//!
//! - adding members and promotions cannot break the rule
//! - [`MembershipRegistry::remove_member`] and demotions through
//!   [`MembershipRegistry::change_role`] are rejected with
//!   [`CoreError::InvariantViolation`] when they target the only manager
//! - [`MembershipRegistry::leave`] by the only manager deletes the whole team
//!   instead of failing
//!
//! The manager count check and the write happen inside one store call, so two
//! concurrent demotions cannot both succeed against the last two managers.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::{ensure_team_exists, non_blank, optional_text, publish};
use crate::auth::authorization::{authorize, AuthzError};
use crate::auth::identity::Identity;
use crate::error::{CoreError, CoreResult};
use crate::models::{
    CreateTeam, MemberDetails, Membership, Team, TeamRole, TeamSummary, UpdateTeam, User,
};
use crate::realtime::events::{MemberChanged, MemberLeft, TeamDeleted, TeamEvent, TeamUpdated};
use crate::realtime::hub::FanoutHub;
use crate::store::{DynStore, GuardedMembershipChange, LeaveOutcome};

/// How a new member is identified
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberIdentifier {
    UserId(Uuid),
    Email(String),
}

/// A team together with the caller's role in it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamView {
    #[serde(flatten)]
    pub team: Team,
    pub role: TeamRole,
}

/// What happened when a user left a team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveResult {
    /// The membership was removed
    Left,

    /// The user was the only manager and the team was deleted
    TeamDeleted,
}

/// Guarded access to teams and memberships
#[derive(Clone)]
pub struct MembershipRegistry {
    store: DynStore,
    hub: FanoutHub,
}

impl MembershipRegistry {
    pub fn new(store: DynStore, hub: FanoutHub) -> Self {
        Self { store, hub }
    }

    /// Mirrors the caller's profile so it can be found by id or email
    pub async fn sync_identity(&self, identity: &Identity) -> CoreResult<User> {
        Ok(self.store.upsert_user(&identity.to_user()).await?)
    }

    /// Returns the caller's role in the team
    ///
    /// # Errors
    ///
    /// [`CoreError::Forbidden`] with the membership gate if the user is not a
    /// member, or with the role gate if `required` is set and not met.
    pub async fn authorize(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        required: Option<TeamRole>,
    ) -> CoreResult<TeamRole> {
        authorize(self.store.as_ref(), team_id, user_id, required)
            .await
            .map_err(|e| {
                warn!(team_id = %team_id, user_id = %user_id, error = %e, "Authorization rejected");
                CoreError::from(e)
            })
    }

    /// IDs of every team the user belongs to
    pub async fn team_ids_for(&self, user_id: Uuid) -> CoreResult<Vec<Uuid>> {
        Ok(self.store.list_team_ids_for_user(user_id).await?)
    }

    /// Re-reads the membership from the store, bypassing any earlier answer
    pub async fn is_member(&self, team_id: Uuid, user_id: Uuid) -> CoreResult<bool> {
        Ok(self.store.find_membership(team_id, user_id).await?.is_some())
    }

    /// Subscribes the user's open connections to the team group
    ///
    /// Removals write the store before revoking, so the membership is read
    /// again after subscribing: a removal that committed earlier is undone
    /// here and one that commits later revokes the subscription itself.
    async fn enroll(&self, user_id: Uuid, team_id: Uuid) -> CoreResult<()> {
        self.hub.enroll_user(user_id, team_id);
        if !self.is_member(team_id, user_id).await? {
            self.hub.revoke_user(user_id, team_id);
        }
        Ok(())
    }

    // Teams

    /// Creates a team; the caller becomes its first manager
    pub async fn create_team(&self, actor: &Identity, data: CreateTeam) -> CoreResult<TeamView> {
        let data = CreateTeam {
            name: non_blank(&data.name, "Team name")?,
            description: optional_text(data.description.as_deref()),
        };

        let (team, membership) = self.store.create_team(&data, actor.user_id).await?;
        self.enroll(actor.user_id, team.id).await?;

        info!(team_id = %team.id, user_id = %actor.user_id, "Team created");
        Ok(TeamView {
            team,
            role: membership.role,
        })
    }

    /// Lists the caller's teams with their role and member count
    pub async fn list_teams(&self, actor: &Identity) -> CoreResult<Vec<TeamSummary>> {
        Ok(self.store.list_teams_for_user(actor.user_id).await?)
    }

    pub async fn get_team(&self, actor: &Identity, team_id: Uuid) -> CoreResult<TeamView> {
        let team = self
            .store
            .find_team(team_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Team"))?;
        let role = self.authorize(team_id, actor.user_id, None).await?;

        Ok(TeamView { team, role })
    }

    /// Renames or re-describes a team (managers only)
    pub async fn update_team(
        &self,
        actor: &Identity,
        team_id: Uuid,
        data: UpdateTeam,
    ) -> CoreResult<Team> {
        ensure_team_exists(self.store.as_ref(), team_id).await?;
        self.authorize(team_id, actor.user_id, Some(TeamRole::Manager))
            .await?;

        if data.is_empty() {
            return Err(CoreError::validation("No fields to update"));
        }
        let data = UpdateTeam {
            name: data
                .name
                .as_deref()
                .map(|name| non_blank(name, "Team name"))
                .transpose()?,
            description: data
                .description
                .map(|description| optional_text(description.as_deref())),
        };

        let team = self
            .store
            .update_team(team_id, &data)
            .await?
            .ok_or_else(|| CoreError::not_found("Team"))?;

        info!(team_id = %team_id, user_id = %actor.user_id, "Team updated");
        publish(
            &self.hub,
            TeamEvent::TeamUpdated(TeamUpdated::new(&team, actor.user_id)),
        );
        Ok(team)
    }

    /// Deletes a team with its roster, tasks and comments (managers only)
    pub async fn delete_team(&self, actor: &Identity, team_id: Uuid) -> CoreResult<()> {
        ensure_team_exists(self.store.as_ref(), team_id).await?;
        self.authorize(team_id, actor.user_id, Some(TeamRole::Manager))
            .await?;

        if !self.store.delete_team(team_id).await? {
            return Err(CoreError::not_found("Team"));
        }

        info!(team_id = %team_id, user_id = %actor.user_id, "Team deleted");
        self.announce_team_deleted(team_id, actor.user_id);
        Ok(())
    }

    fn announce_team_deleted(&self, team_id: Uuid, user_id: Uuid) {
        publish(
            &self.hub,
            TeamEvent::TeamDeleted(TeamDeleted { team_id, user_id }),
        );
        self.hub.close_group(team_id);
    }

    // Roster

    /// Lists the team's members in join order (any member)
    pub async fn list_members(
        &self,
        actor: &Identity,
        team_id: Uuid,
    ) -> CoreResult<Vec<MemberDetails>> {
        ensure_team_exists(self.store.as_ref(), team_id).await?;
        self.authorize(team_id, actor.user_id, None).await?;

        Ok(self.store.list_members(team_id).await?)
    }

    /// Adds a user as a plain member (managers only)
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if no user matches the identifier
    /// - [`CoreError::Conflict`] if the user already belongs to the team
    pub async fn add_member(
        &self,
        actor: &Identity,
        team_id: Uuid,
        identifier: MemberIdentifier,
    ) -> CoreResult<Membership> {
        ensure_team_exists(self.store.as_ref(), team_id).await?;
        self.authorize(team_id, actor.user_id, Some(TeamRole::Manager))
            .await?;

        let user = match &identifier {
            MemberIdentifier::UserId(id) => self.store.find_user(*id).await?,
            MemberIdentifier::Email(email) => {
                let email = non_blank(email, "Email")?;
                self.store.find_user_by_email(&email).await?
            }
        }
        .ok_or_else(|| CoreError::not_found("User"))?;

        let membership = self
            .store
            .insert_membership(team_id, user.id, TeamRole::Member)
            .await?
            .ok_or_else(|| CoreError::Conflict("User is already a member of this team".to_string()))?;

        info!(team_id = %team_id, user_id = %user.id, added_by = %actor.user_id, "Member added");
        self.enroll(user.id, team_id).await?;
        publish(
            &self.hub,
            TeamEvent::MemberAdded(MemberChanged {
                team_id,
                user_id: user.id,
                role: membership.role,
                changed_by: actor.user_id,
            }),
        );
        Ok(membership)
    }

    /// Removes a member (managers only); the only manager cannot be removed
    pub async fn remove_member(
        &self,
        actor: &Identity,
        team_id: Uuid,
        user_id: Uuid,
    ) -> CoreResult<Membership> {
        ensure_team_exists(self.store.as_ref(), team_id).await?;
        self.authorize(team_id, actor.user_id, Some(TeamRole::Manager))
            .await?;

        let removed = match self.store.remove_membership(team_id, user_id).await? {
            GuardedMembershipChange::Applied(membership) => membership,
            GuardedMembershipChange::NotFound => return Err(CoreError::not_found("Member")),
            GuardedMembershipChange::LastManager => {
                warn!(team_id = %team_id, user_id = %user_id, "Refused to remove the last manager");
                return Err(CoreError::InvariantViolation(
                    "Cannot remove the last manager of a team".to_string(),
                ));
            }
        };

        info!(team_id = %team_id, user_id = %user_id, removed_by = %actor.user_id, "Member removed");
        publish(
            &self.hub,
            TeamEvent::MemberRemoved(MemberChanged {
                team_id,
                user_id,
                role: removed.role,
                changed_by: actor.user_id,
            }),
        );
        self.hub.revoke_user(user_id, team_id);
        Ok(removed)
    }

    /// Promotes or demotes a member (managers only); the only manager cannot
    /// be demoted
    pub async fn change_role(
        &self,
        actor: &Identity,
        team_id: Uuid,
        user_id: Uuid,
        role: TeamRole,
    ) -> CoreResult<Membership> {
        ensure_team_exists(self.store.as_ref(), team_id).await?;
        self.authorize(team_id, actor.user_id, Some(TeamRole::Manager))
            .await?;

        let updated = match self.store.set_role(team_id, user_id, role).await? {
            GuardedMembershipChange::Applied(membership) => membership,
            GuardedMembershipChange::NotFound => return Err(CoreError::not_found("Member")),
            GuardedMembershipChange::LastManager => {
                warn!(team_id = %team_id, user_id = %user_id, "Refused to demote the last manager");
                return Err(CoreError::InvariantViolation(
                    "Cannot demote the last manager of a team".to_string(),
                ));
            }
        };

        info!(team_id = %team_id, user_id = %user_id, role = %role, "Member role changed");
        publish(
            &self.hub,
            TeamEvent::MemberRoleChanged(MemberChanged {
                team_id,
                user_id,
                role: updated.role,
                changed_by: actor.user_id,
            }),
        );
        Ok(updated)
    }

    /// Leaves a team
    ///
    /// Always permitted for a member. When the caller is the only manager the
    /// team is deleted, along with every other membership, task and comment.
    pub async fn leave(&self, actor: &Identity, team_id: Uuid) -> CoreResult<LeaveResult> {
        ensure_team_exists(self.store.as_ref(), team_id).await?;

        match self.store.leave_team(team_id, actor.user_id).await? {
            LeaveOutcome::Left(_) => {
                info!(team_id = %team_id, user_id = %actor.user_id, "Member left team");
                self.hub.revoke_user(actor.user_id, team_id);
                publish(
                    &self.hub,
                    TeamEvent::MemberLeft(MemberLeft {
                        team_id,
                        user_id: actor.user_id,
                    }),
                );
                Ok(LeaveResult::Left)
            }
            LeaveOutcome::TeamDeleted => {
                info!(
                    team_id = %team_id,
                    user_id = %actor.user_id,
                    "Last manager left, team deleted"
                );
                self.announce_team_deleted(team_id, actor.user_id);
                Ok(LeaveResult::TeamDeleted)
            }
            LeaveOutcome::NotMember => Err(AuthzError::NotMember(team_id).into()),
        }
    }
}
