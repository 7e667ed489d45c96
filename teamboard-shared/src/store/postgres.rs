//! PostgreSQL store
//!
//! Guarded membership changes run in a transaction that starts by locking the
//! team row (`SELECT ... FOR UPDATE`). Two concurrent demotions of different
//! managers therefore run one after the other, and the second one counts the
//! managers left by the first.
//!
//! Task writes that set an assignee take the same lock before checking the
//! assignee's membership, so they serialize with removals and leaves.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::{
    GuardedMembershipChange, LeaveOutcome, StatusTransition, Store, StoreResult, TaskWrite,
};
use crate::db::pool::health_check;
use crate::models::{
    Comment, CreateComment, CreateTask, CreateTeam, MemberDetails, Membership, Task, TaskChanges,
    TaskFilter, TaskStatus, Team, TeamRole, TeamSummary, UpdateTeam, User,
};

/// Store backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        health_check(&self.pool).await?;
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(User::find_by_id(&self.pool, id).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(User::find_by_email(&self.pool, email).await?)
    }

    async fn upsert_user(&self, user: &User) -> StoreResult<User> {
        Ok(User::upsert(&self.pool, user).await?)
    }

    async fn create_team(
        &self,
        data: &CreateTeam,
        creator: Uuid,
    ) -> StoreResult<(Team, Membership)> {
        let mut tx = self.pool.begin().await?;

        let team = Team::insert(&mut *tx, Uuid::new_v4(), data, creator).await?;
        let membership = Membership::insert(&mut *tx, team.id, creator, TeamRole::Manager)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;

        tx.commit().await?;
        Ok((team, membership))
    }

    async fn find_team(&self, id: Uuid) -> StoreResult<Option<Team>> {
        Ok(Team::find_by_id(&self.pool, id).await?)
    }

    async fn list_teams_for_user(&self, user_id: Uuid) -> StoreResult<Vec<TeamSummary>> {
        Ok(Team::list_for_user(&self.pool, user_id).await?)
    }

    async fn update_team(&self, id: Uuid, data: &UpdateTeam) -> StoreResult<Option<Team>> {
        Ok(Team::update(&self.pool, id, data).await?)
    }

    async fn delete_team(&self, id: Uuid) -> StoreResult<bool> {
        Ok(Team::delete(&self.pool, id).await?)
    }

    async fn find_membership(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<Membership>> {
        Ok(Membership::find(&self.pool, team_id, user_id).await?)
    }

    async fn list_members(&self, team_id: Uuid) -> StoreResult<Vec<MemberDetails>> {
        Ok(Membership::list_members(&self.pool, team_id).await?)
    }

    async fn list_team_ids_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Uuid>> {
        Ok(Membership::team_ids_for_user(&self.pool, user_id).await?)
    }

    async fn insert_membership(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        role: TeamRole,
    ) -> StoreResult<Option<Membership>> {
        Ok(Membership::insert(&self.pool, team_id, user_id, role).await?)
    }

    async fn remove_membership(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<GuardedMembershipChange> {
        let mut tx = self.pool.begin().await?;

        if !Team::lock(&mut *tx, team_id).await? {
            return Ok(GuardedMembershipChange::NotFound);
        }

        let Some(current) = Membership::find(&mut *tx, team_id, user_id).await? else {
            return Ok(GuardedMembershipChange::NotFound);
        };

        if current.role.is_manager() && Membership::count_managers(&mut *tx, team_id).await? <= 1 {
            debug!(team_id = %team_id, user_id = %user_id, "Refusing to remove last manager");
            return Ok(GuardedMembershipChange::LastManager);
        }

        Membership::delete(&mut *tx, team_id, user_id).await?;
        tx.commit().await?;

        Ok(GuardedMembershipChange::Applied(current))
    }

    async fn set_role(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        role: TeamRole,
    ) -> StoreResult<GuardedMembershipChange> {
        let mut tx = self.pool.begin().await?;

        if !Team::lock(&mut *tx, team_id).await? {
            return Ok(GuardedMembershipChange::NotFound);
        }

        let Some(current) = Membership::find(&mut *tx, team_id, user_id).await? else {
            return Ok(GuardedMembershipChange::NotFound);
        };

        let demotion = current.role.is_manager() && !role.is_manager();
        if demotion && Membership::count_managers(&mut *tx, team_id).await? <= 1 {
            debug!(team_id = %team_id, user_id = %user_id, "Refusing to demote last manager");
            return Ok(GuardedMembershipChange::LastManager);
        }

        let updated = Membership::update_role(&mut *tx, team_id, user_id, role)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;
        tx.commit().await?;

        Ok(GuardedMembershipChange::Applied(updated))
    }

    async fn leave_team(&self, team_id: Uuid, user_id: Uuid) -> StoreResult<LeaveOutcome> {
        let mut tx = self.pool.begin().await?;

        if !Team::lock(&mut *tx, team_id).await? {
            return Ok(LeaveOutcome::NotMember);
        }

        let Some(current) = Membership::find(&mut *tx, team_id, user_id).await? else {
            return Ok(LeaveOutcome::NotMember);
        };

        if current.role.is_manager() && Membership::count_managers(&mut *tx, team_id).await? <= 1 {
            Team::delete(&mut *tx, team_id).await?;
            tx.commit().await?;
            return Ok(LeaveOutcome::TeamDeleted);
        }

        Membership::delete(&mut *tx, team_id, user_id).await?;
        tx.commit().await?;

        Ok(LeaveOutcome::Left(current))
    }

    async fn create_task(&self, data: &CreateTask) -> StoreResult<TaskWrite> {
        let mut tx = self.pool.begin().await?;

        if !Team::lock(&mut *tx, data.team_id).await? {
            return Ok(TaskWrite::NotFound);
        }

        if let Some(assignee_id) = data.assignee_id {
            if Membership::find(&mut *tx, data.team_id, assignee_id)
                .await?
                .is_none()
            {
                debug!(team_id = %data.team_id, assignee_id = %assignee_id, "Assignee is not a member");
                return Ok(TaskWrite::AssigneeNotMember);
            }
        }

        let task = Task::insert(&mut *tx, Uuid::new_v4(), data).await?;
        tx.commit().await?;

        Ok(TaskWrite::Written(task))
    }

    async fn find_task(&self, id: Uuid) -> StoreResult<Option<Task>> {
        Ok(Task::find_by_id(&self.pool, id).await?)
    }

    async fn list_tasks(&self, team_id: Uuid, filter: &TaskFilter) -> StoreResult<Vec<Task>> {
        Ok(Task::list_for_team(&self.pool, team_id, filter).await?)
    }

    async fn update_task(&self, id: Uuid, changes: &TaskChanges) -> StoreResult<TaskWrite> {
        let Some(Some(assignee_id)) = changes.assignee_id else {
            let task = Task::update(&self.pool, id, changes).await?;
            return Ok(task.map_or(TaskWrite::NotFound, TaskWrite::Written));
        };

        // Lock order: team row, then task row.
        let Some(current) = Task::find_by_id(&self.pool, id).await? else {
            return Ok(TaskWrite::NotFound);
        };

        let mut tx = self.pool.begin().await?;

        if !Team::lock(&mut *tx, current.team_id).await? {
            return Ok(TaskWrite::NotFound);
        }
        if Task::find_for_update(&mut *tx, id).await?.is_none() {
            return Ok(TaskWrite::NotFound);
        }
        if Membership::find(&mut *tx, current.team_id, assignee_id)
            .await?
            .is_none()
        {
            debug!(team_id = %current.team_id, assignee_id = %assignee_id, "Assignee is not a member");
            return Ok(TaskWrite::AssigneeNotMember);
        }

        let task = Task::update(&mut *tx, id, changes).await?;
        tx.commit().await?;

        Ok(task.map_or(TaskWrite::NotFound, TaskWrite::Written))
    }

    async fn transition_task(
        &self,
        id: Uuid,
        status: TaskStatus,
        comment: Option<&CreateComment>,
    ) -> StoreResult<Option<StatusTransition>> {
        let mut tx = self.pool.begin().await?;

        let Some(before) = Task::find_for_update(&mut *tx, id).await? else {
            return Ok(None);
        };

        let task = Task::set_status(&mut *tx, id, status)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;

        let comment = match comment {
            Some(data) => Some(Comment::insert(&mut *tx, Uuid::new_v4(), data).await?),
            None => None,
        };

        tx.commit().await?;

        Ok(Some(StatusTransition {
            task,
            previous_status: before.status,
            comment,
        }))
    }

    async fn delete_task(&self, id: Uuid) -> StoreResult<bool> {
        Ok(Task::delete(&self.pool, id).await?)
    }

    async fn create_comment(&self, data: &CreateComment) -> StoreResult<Comment> {
        Ok(Comment::insert(&self.pool, Uuid::new_v4(), data).await?)
    }

    async fn find_comment(&self, id: Uuid) -> StoreResult<Option<Comment>> {
        Ok(Comment::find_by_id(&self.pool, id).await?)
    }

    async fn list_comments(&self, task_id: Uuid) -> StoreResult<Vec<Comment>> {
        Ok(Comment::list_for_task(&self.pool, task_id).await?)
    }

    async fn update_comment(&self, id: Uuid, content: &str) -> StoreResult<Option<Comment>> {
        Ok(Comment::update_content(&self.pool, id, content).await?)
    }

    async fn delete_comment(&self, id: Uuid) -> StoreResult<bool> {
        Ok(Comment::delete(&self.pool, id).await?)
    }
}
