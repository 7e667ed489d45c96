//! Store wrapper that holds one call open so a test can interleave a second
//! operation with it

use std::sync::Mutex;

use async_trait::async_trait;
use teamboard_shared::models::{
    Comment, CreateComment, CreateTask, CreateTeam, MemberDetails, Membership, Task, TaskChanges,
    TaskFilter, TaskStatus, Team, TeamRole, TeamSummary, UpdateTeam, User,
};
use teamboard_shared::store::{
    GuardedMembershipChange, LeaveOutcome, MemoryStore, StatusTransition, Store, StoreResult,
    TaskWrite,
};
use tokio::sync::oneshot;
use uuid::Uuid;

/// Call after which the store stops and waits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PausePoint {
    /// After `list_team_ids_for_user` has read the user's teams
    TeamIdsFor(Uuid),

    /// After `find_membership` has read this membership
    Membership { team_id: Uuid, user_id: Uuid },

    /// After `insert_membership` has written this membership
    InsertMembership { team_id: Uuid, user_id: Uuid },
}

struct Armed {
    point: PausePoint,
    reached: oneshot::Sender<()>,
    resume: oneshot::Receiver<()>,
}

/// Test side of an armed pause
pub struct PauseControl {
    reached: oneshot::Receiver<()>,
    resume: oneshot::Sender<()>,
}

impl PauseControl {
    /// Waits until the paused call has done its read or write
    pub async fn reached(&mut self) {
        (&mut self.reached)
            .await
            .expect("paused call was dropped before reaching its pause point");
    }

    /// Lets the paused call return
    pub fn resume(self) {
        let _ = self.resume.send(());
    }
}

/// [`MemoryStore`] that pauses once at an armed [`PausePoint`]
#[derive(Default)]
pub struct PausingStore {
    inner: MemoryStore,
    armed: Mutex<Option<Armed>>,
}

impl PausingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a single pause; the first matching call stops there
    pub fn pause_at(&self, point: PausePoint) -> PauseControl {
        let (reached_tx, reached_rx) = oneshot::channel();
        let (resume_tx, resume_rx) = oneshot::channel();
        *self.armed.lock().unwrap() = Some(Armed {
            point,
            reached: reached_tx,
            resume: resume_rx,
        });
        PauseControl {
            reached: reached_rx,
            resume: resume_tx,
        }
    }

    async fn checkpoint(&self, point: PausePoint) {
        let armed = {
            let mut slot = self.armed.lock().unwrap();
            match slot.as_ref() {
                Some(armed) if armed.point == point => slot.take(),
                _ => None,
            }
        };

        if let Some(armed) = armed {
            let _ = armed.reached.send(());
            let _ = armed.resume.await;
        }
    }
}

#[async_trait]
impl Store for PausingStore {
    async fn ping(&self) -> StoreResult<()> {
        self.inner.ping().await
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        self.inner.find_user(id).await
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.inner.find_user_by_email(email).await
    }

    async fn upsert_user(&self, user: &User) -> StoreResult<User> {
        self.inner.upsert_user(user).await
    }

    async fn create_team(
        &self,
        data: &CreateTeam,
        creator: Uuid,
    ) -> StoreResult<(Team, Membership)> {
        self.inner.create_team(data, creator).await
    }

    async fn find_team(&self, id: Uuid) -> StoreResult<Option<Team>> {
        self.inner.find_team(id).await
    }

    async fn list_teams_for_user(&self, user_id: Uuid) -> StoreResult<Vec<TeamSummary>> {
        self.inner.list_teams_for_user(user_id).await
    }

    async fn update_team(&self, id: Uuid, data: &UpdateTeam) -> StoreResult<Option<Team>> {
        self.inner.update_team(id, data).await
    }

    async fn delete_team(&self, id: Uuid) -> StoreResult<bool> {
        self.inner.delete_team(id).await
    }

    async fn find_membership(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<Membership>> {
        let membership = self.inner.find_membership(team_id, user_id).await;
        self.checkpoint(PausePoint::Membership { team_id, user_id })
            .await;
        membership
    }

    async fn list_members(&self, team_id: Uuid) -> StoreResult<Vec<MemberDetails>> {
        self.inner.list_members(team_id).await
    }

    async fn list_team_ids_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let team_ids = self.inner.list_team_ids_for_user(user_id).await;
        self.checkpoint(PausePoint::TeamIdsFor(user_id)).await;
        team_ids
    }

    async fn insert_membership(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        role: TeamRole,
    ) -> StoreResult<Option<Membership>> {
        let membership = self.inner.insert_membership(team_id, user_id, role).await;
        self.checkpoint(PausePoint::InsertMembership { team_id, user_id })
            .await;
        membership
    }

    async fn remove_membership(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<GuardedMembershipChange> {
        self.inner.remove_membership(team_id, user_id).await
    }

    async fn set_role(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        role: TeamRole,
    ) -> StoreResult<GuardedMembershipChange> {
        self.inner.set_role(team_id, user_id, role).await
    }

    async fn leave_team(&self, team_id: Uuid, user_id: Uuid) -> StoreResult<LeaveOutcome> {
        self.inner.leave_team(team_id, user_id).await
    }

    async fn create_task(&self, data: &CreateTask) -> StoreResult<TaskWrite> {
        self.inner.create_task(data).await
    }

    async fn find_task(&self, id: Uuid) -> StoreResult<Option<Task>> {
        self.inner.find_task(id).await
    }

    async fn list_tasks(&self, team_id: Uuid, filter: &TaskFilter) -> StoreResult<Vec<Task>> {
        self.inner.list_tasks(team_id, filter).await
    }

    async fn update_task(&self, id: Uuid, changes: &TaskChanges) -> StoreResult<TaskWrite> {
        self.inner.update_task(id, changes).await
    }

    async fn transition_task(
        &self,
        id: Uuid,
        status: TaskStatus,
        comment: Option<&CreateComment>,
    ) -> StoreResult<Option<StatusTransition>> {
        self.inner.transition_task(id, status, comment).await
    }

    async fn delete_task(&self, id: Uuid) -> StoreResult<bool> {
        self.inner.delete_task(id).await
    }

    async fn create_comment(&self, data: &CreateComment) -> StoreResult<Comment> {
        self.inner.create_comment(data).await
    }

    async fn find_comment(&self, id: Uuid) -> StoreResult<Option<Comment>> {
        self.inner.find_comment(id).await
    }

    async fn list_comments(&self, task_id: Uuid) -> StoreResult<Vec<Comment>> {
        self.inner.list_comments(task_id).await
    }

    async fn update_comment(&self, id: Uuid, content: &str) -> StoreResult<Option<Comment>> {
        self.inner.update_comment(id, content).await
    }

    async fn delete_comment(&self, id: Uuid) -> StoreResult<bool> {
        self.inner.delete_comment(id).await
    }
}
