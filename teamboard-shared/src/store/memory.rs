//! In-memory store for tests and local development.
//!
//! All state sits behind one mutex and every trait call holds it for its
//! whole duration, so each call is atomic with respect to the others. Rows
//! are kept in insertion order, which doubles as creation order.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{
    GuardedMembershipChange, LeaveOutcome, StatusTransition, Store, StoreError, StoreResult,
    TaskWrite,
};
use crate::models::{
    Comment, CreateComment, CreateTask, CreateTeam, MemberDetails, Membership, Task, TaskChanges,
    TaskFilter, TaskStatus, Team, TeamRole, TeamSummary, UpdateTeam, User,
};

/// Thread-safe in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    teams: Vec<Team>,
    memberships: Vec<Membership>,
    tasks: Vec<Task>,
    comments: Vec<Comment>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|err| StoreError::LockPoisoned(err.to_string()))
    }
}

impl MemoryState {
    fn membership(&self, team_id: Uuid, user_id: Uuid) -> Option<&Membership> {
        self.memberships
            .iter()
            .find(|m| m.team_id == team_id && m.user_id == user_id)
    }

    fn manager_count(&self, team_id: Uuid) -> usize {
        self.memberships
            .iter()
            .filter(|m| m.team_id == team_id && m.role.is_manager())
            .count()
    }

    fn remove_membership_row(&mut self, team_id: Uuid, user_id: Uuid) {
        self.memberships
            .retain(|m| !(m.team_id == team_id && m.user_id == user_id));
    }

    /// Removes a task and its comments.
    fn remove_task_cascade(&mut self, task_id: Uuid) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != task_id);
        self.comments.retain(|c| c.task_id != task_id);
        self.tasks.len() != before
    }

    /// Removes a team with its memberships, tasks and their comments.
    fn remove_team_cascade(&mut self, team_id: Uuid) -> bool {
        let before = self.teams.len();
        self.teams.retain(|t| t.id != team_id);
        if self.teams.len() == before {
            return false;
        }

        self.memberships.retain(|m| m.team_id != team_id);
        let task_ids: Vec<Uuid> = self
            .tasks
            .iter()
            .filter(|t| t.team_id == team_id)
            .map(|t| t.id)
            .collect();
        for task_id in task_ids {
            self.remove_task_cascade(task_id);
        }
        true
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        self.lock().map(|_| ())
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let state = self.lock()?;
        Ok(state
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn upsert_user(&self, user: &User) -> StoreResult<User> {
        let mut state = self.lock()?;
        let stored = state
            .users
            .entry(user.id)
            .and_modify(|existing| {
                existing.email = user.email.clone();
                existing.name = user.name.clone();
            })
            .or_insert_with(|| user.clone());
        Ok(stored.clone())
    }

    async fn create_team(
        &self,
        data: &CreateTeam,
        creator: Uuid,
    ) -> StoreResult<(Team, Membership)> {
        let mut state = self.lock()?;
        let now = Utc::now();

        let team = Team {
            id: Uuid::new_v4(),
            name: data.name.clone(),
            description: data.description.clone(),
            created_by: creator,
            created_at: now,
            updated_at: now,
        };
        let membership = Membership {
            team_id: team.id,
            user_id: creator,
            role: TeamRole::Manager,
            joined_at: now,
        };

        state.teams.push(team.clone());
        state.memberships.push(membership.clone());
        Ok((team, membership))
    }

    async fn find_team(&self, id: Uuid) -> StoreResult<Option<Team>> {
        Ok(self.lock()?.teams.iter().find(|t| t.id == id).cloned())
    }

    async fn list_teams_for_user(&self, user_id: Uuid) -> StoreResult<Vec<TeamSummary>> {
        let state = self.lock()?;
        let summaries = state
            .teams
            .iter()
            .filter_map(|team| {
                let role = state.membership(team.id, user_id)?.role;
                let member_count = state
                    .memberships
                    .iter()
                    .filter(|m| m.team_id == team.id)
                    .count();
                Some(TeamSummary {
                    id: team.id,
                    name: team.name.clone(),
                    description: team.description.clone(),
                    role,
                    member_count: member_count as i64,
                    created_at: team.created_at,
                })
            })
            .collect();
        Ok(summaries)
    }

    async fn update_team(&self, id: Uuid, data: &UpdateTeam) -> StoreResult<Option<Team>> {
        let mut state = self.lock()?;
        let Some(team) = state.teams.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };

        if let Some(name) = &data.name {
            team.name = name.clone();
        }
        if let Some(description) = &data.description {
            team.description = description.clone();
        }
        team.updated_at = Utc::now();
        Ok(Some(team.clone()))
    }

    async fn delete_team(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.lock()?.remove_team_cascade(id))
    }

    async fn find_membership(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<Membership>> {
        Ok(self.lock()?.membership(team_id, user_id).cloned())
    }

    async fn list_members(&self, team_id: Uuid) -> StoreResult<Vec<MemberDetails>> {
        let state = self.lock()?;
        let members = state
            .memberships
            .iter()
            .filter(|m| m.team_id == team_id)
            .filter_map(|m| {
                let user = state.users.get(&m.user_id)?;
                Some(MemberDetails {
                    user_id: m.user_id,
                    email: user.email.clone(),
                    name: user.name.clone(),
                    role: m.role,
                    joined_at: m.joined_at,
                })
            })
            .collect();
        Ok(members)
    }

    async fn list_team_ids_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let state = self.lock()?;
        Ok(state
            .memberships
            .iter()
            .filter(|m| m.user_id == user_id)
            .map(|m| m.team_id)
            .collect())
    }

    async fn insert_membership(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        role: TeamRole,
    ) -> StoreResult<Option<Membership>> {
        let mut state = self.lock()?;
        if state.membership(team_id, user_id).is_some() {
            return Ok(None);
        }

        let membership = Membership {
            team_id,
            user_id,
            role,
            joined_at: Utc::now(),
        };
        state.memberships.push(membership.clone());
        Ok(Some(membership))
    }

    async fn remove_membership(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<GuardedMembershipChange> {
        let mut state = self.lock()?;
        let Some(current) = state.membership(team_id, user_id).cloned() else {
            return Ok(GuardedMembershipChange::NotFound);
        };

        if current.role.is_manager() && state.manager_count(team_id) <= 1 {
            return Ok(GuardedMembershipChange::LastManager);
        }

        state.remove_membership_row(team_id, user_id);
        Ok(GuardedMembershipChange::Applied(current))
    }

    async fn set_role(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        role: TeamRole,
    ) -> StoreResult<GuardedMembershipChange> {
        let mut state = self.lock()?;
        let Some(current) = state.membership(team_id, user_id).cloned() else {
            return Ok(GuardedMembershipChange::NotFound);
        };

        let demotion = current.role.is_manager() && !role.is_manager();
        if demotion && state.manager_count(team_id) <= 1 {
            return Ok(GuardedMembershipChange::LastManager);
        }

        let updated = state
            .memberships
            .iter_mut()
            .find(|m| m.team_id == team_id && m.user_id == user_id)
            .map(|m| {
                m.role = role;
                m.clone()
            });

        Ok(updated.map_or(GuardedMembershipChange::NotFound, GuardedMembershipChange::Applied))
    }

    async fn leave_team(&self, team_id: Uuid, user_id: Uuid) -> StoreResult<LeaveOutcome> {
        let mut state = self.lock()?;
        let Some(current) = state.membership(team_id, user_id).cloned() else {
            return Ok(LeaveOutcome::NotMember);
        };

        if current.role.is_manager() && state.manager_count(team_id) <= 1 {
            state.remove_team_cascade(team_id);
            return Ok(LeaveOutcome::TeamDeleted);
        }

        state.remove_membership_row(team_id, user_id);
        Ok(LeaveOutcome::Left(current))
    }

    async fn create_task(&self, data: &CreateTask) -> StoreResult<TaskWrite> {
        let mut state = self.lock()?;
        if !state.teams.iter().any(|t| t.id == data.team_id) {
            return Ok(TaskWrite::NotFound);
        }
        if let Some(assignee_id) = data.assignee_id {
            if state.membership(data.team_id, assignee_id).is_none() {
                return Ok(TaskWrite::AssigneeNotMember);
            }
        }
        let now = Utc::now();

        let task = Task {
            id: Uuid::new_v4(),
            team_id: data.team_id,
            title: data.title.clone(),
            description: data.description.clone(),
            status: TaskStatus::Todo,
            priority: data.priority,
            due_date: data.due_date,
            assignee_id: data.assignee_id,
            created_by: data.created_by,
            created_at: now,
            updated_at: now,
        };
        state.tasks.push(task.clone());
        Ok(TaskWrite::Written(task))
    }

    async fn find_task(&self, id: Uuid) -> StoreResult<Option<Task>> {
        Ok(self.lock()?.tasks.iter().find(|t| t.id == id).cloned())
    }

    async fn list_tasks(&self, team_id: Uuid, filter: &TaskFilter) -> StoreResult<Vec<Task>> {
        let state = self.lock()?;
        Ok(state
            .tasks
            .iter()
            .filter(|t| t.team_id == team_id && filter.matches(t))
            .cloned()
            .collect())
    }

    async fn update_task(&self, id: Uuid, changes: &TaskChanges) -> StoreResult<TaskWrite> {
        let mut state = self.lock()?;
        let Some(team_id) = state.tasks.iter().find(|t| t.id == id).map(|t| t.team_id) else {
            return Ok(TaskWrite::NotFound);
        };
        if let Some(Some(assignee_id)) = changes.assignee_id {
            if state.membership(team_id, assignee_id).is_none() {
                return Ok(TaskWrite::AssigneeNotMember);
            }
        }
        let Some(task) = state.tasks.iter_mut().find(|t| t.id == id) else {
            return Ok(TaskWrite::NotFound);
        };

        if let Some(title) = &changes.title {
            task.title = title.clone();
        }
        if let Some(description) = &changes.description {
            task.description = description.clone();
        }
        if let Some(priority) = changes.priority {
            task.priority = priority;
        }
        if let Some(due_date) = changes.due_date {
            task.due_date = due_date;
        }
        if let Some(assignee_id) = changes.assignee_id {
            task.assignee_id = assignee_id;
        }
        task.updated_at = Utc::now();
        Ok(TaskWrite::Written(task.clone()))
    }

    async fn transition_task(
        &self,
        id: Uuid,
        status: TaskStatus,
        comment: Option<&CreateComment>,
    ) -> StoreResult<Option<StatusTransition>> {
        let mut state = self.lock()?;
        let now = Utc::now();

        let Some(task) = state.tasks.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };
        let previous_status = task.status;
        task.status = status;
        task.updated_at = now;
        let task = task.clone();

        let comment = comment.map(|data| Comment {
            id: Uuid::new_v4(),
            task_id: data.task_id,
            author_id: data.author_id,
            content: data.content.clone(),
            created_at: now,
            updated_at: now,
        });
        if let Some(comment) = &comment {
            state.comments.push(comment.clone());
        }

        Ok(Some(StatusTransition {
            task,
            previous_status,
            comment,
        }))
    }

    async fn delete_task(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.lock()?.remove_task_cascade(id))
    }

    async fn create_comment(&self, data: &CreateComment) -> StoreResult<Comment> {
        let mut state = self.lock()?;
        let now = Utc::now();

        let comment = Comment {
            id: Uuid::new_v4(),
            task_id: data.task_id,
            author_id: data.author_id,
            content: data.content.clone(),
            created_at: now,
            updated_at: now,
        };
        state.comments.push(comment.clone());
        Ok(comment)
    }

    async fn find_comment(&self, id: Uuid) -> StoreResult<Option<Comment>> {
        Ok(self.lock()?.comments.iter().find(|c| c.id == id).cloned())
    }

    async fn list_comments(&self, task_id: Uuid) -> StoreResult<Vec<Comment>> {
        let state = self.lock()?;
        Ok(state
            .comments
            .iter()
            .filter(|c| c.task_id == task_id)
            .cloned()
            .collect())
    }

    async fn update_comment(&self, id: Uuid, content: &str) -> StoreResult<Option<Comment>> {
        let mut state = self.lock()?;
        let Some(comment) = state.comments.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };

        comment.content = content.to_string();
        comment.updated_at = Utc::now();
        Ok(Some(comment.clone()))
    }

    async fn delete_comment(&self, id: Uuid) -> StoreResult<bool> {
        let mut state = self.lock()?;
        let before = state.comments.len();
        state.comments.retain(|c| c.id != id);
        Ok(state.comments.len() != before)
    }
}
