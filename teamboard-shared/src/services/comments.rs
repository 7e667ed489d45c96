//! Comment Ledger
//!
//! Any member of a task's team may read and add comments. Only the author
//! may edit a comment; the author or any manager may delete it.

use tracing::info;
use uuid::Uuid;

use super::{load_task, non_blank, publish};
use crate::auth::authorization::require_owner_or_manager;
use crate::auth::identity::Identity;
use crate::error::{CoreError, CoreResult};
use crate::models::{Comment, CreateComment, Task};
use crate::realtime::events::{CommentAdded, CommentChanged, CommentDeleted, TeamEvent};
use crate::realtime::hub::FanoutHub;
use crate::services::membership::MembershipRegistry;
use crate::store::DynStore;

/// Per-task discussion guarded by team membership
#[derive(Clone)]
pub struct CommentLedger {
    store: DynStore,
    hub: FanoutHub,
    registry: MembershipRegistry,
}

impl CommentLedger {
    pub fn new(store: DynStore, hub: FanoutHub, registry: MembershipRegistry) -> Self {
        Self {
            store,
            hub,
            registry,
        }
    }

    async fn load_comment(&self, comment_id: Uuid) -> CoreResult<(Comment, Task)> {
        let comment = self
            .store
            .find_comment(comment_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Comment"))?;
        let task = load_task(self.store.as_ref(), comment.task_id).await?;
        Ok((comment, task))
    }

    /// Lists a task's comments, oldest first
    pub async fn list(&self, actor: &Identity, task_id: Uuid) -> CoreResult<Vec<Comment>> {
        let task = load_task(self.store.as_ref(), task_id).await?;
        self.registry
            .authorize(task.team_id, actor.user_id, None)
            .await?;

        Ok(self.store.list_comments(task_id).await?)
    }

    /// Adds a comment (any member)
    pub async fn add(&self, actor: &Identity, task_id: Uuid, content: &str) -> CoreResult<Comment> {
        let task = load_task(self.store.as_ref(), task_id).await?;
        self.registry
            .authorize(task.team_id, actor.user_id, None)
            .await?;

        let comment = self
            .store
            .create_comment(&CreateComment {
                task_id,
                author_id: actor.user_id,
                content: non_blank(content, "Comment")?,
            })
            .await?;

        info!(comment_id = %comment.id, task_id = %task_id, user_id = %actor.user_id, "Comment added");
        publish(
            &self.hub,
            TeamEvent::CommentAdded(CommentAdded::new(
                &comment,
                task.team_id,
                actor.display_name(),
            )),
        );
        Ok(comment)
    }

    /// Replaces a comment's content (author only, while still a member)
    pub async fn edit(
        &self,
        actor: &Identity,
        comment_id: Uuid,
        content: &str,
    ) -> CoreResult<Comment> {
        let (comment, task) = self.load_comment(comment_id).await?;
        let role = self
            .registry
            .authorize(task.team_id, actor.user_id, None)
            .await?;
        require_owner_or_manager(
            actor.user_id,
            role,
            Some(comment.author_id),
            false,
            "Only the author can edit this comment",
        )?;

        let content = non_blank(content, "Comment")?;
        let updated = self
            .store
            .update_comment(comment_id, &content)
            .await?
            .ok_or_else(|| CoreError::not_found("Comment"))?;

        info!(comment_id = %comment_id, user_id = %actor.user_id, "Comment edited");
        publish(
            &self.hub,
            TeamEvent::CommentUpdated(CommentChanged {
                task_id: updated.task_id,
                comment_id: updated.id,
                content: updated.content.clone(),
                author_id: updated.author_id,
                team_id: task.team_id,
            }),
        );
        Ok(updated)
    }

    /// Deletes a comment (author or manager)
    pub async fn delete(&self, actor: &Identity, comment_id: Uuid) -> CoreResult<()> {
        let (comment, task) = self.load_comment(comment_id).await?;
        let role = self
            .registry
            .authorize(task.team_id, actor.user_id, None)
            .await?;
        require_owner_or_manager(
            actor.user_id,
            role,
            Some(comment.author_id),
            true,
            "Only the author or a manager can delete this comment",
        )?;

        if !self.store.delete_comment(comment_id).await? {
            return Err(CoreError::not_found("Comment"));
        }

        info!(comment_id = %comment_id, user_id = %actor.user_id, "Comment deleted");
        publish(
            &self.hub,
            TeamEvent::CommentDeleted(CommentDeleted {
                task_id: comment.task_id,
                comment_id,
                team_id: task.team_id,
                user_id: actor.user_id,
            }),
        );
        Ok(())
    }
}
