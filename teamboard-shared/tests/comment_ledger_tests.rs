/// Integration tests for task comments
///
/// Run with: cargo test --test comment_ledger_tests

mod common;

use common::{event_kinds, TestContext};
use teamboard_shared::error::{CoreError, Gate};
use teamboard_shared::models::TeamRole;
use teamboard_shared::services::NewTask;
use uuid::Uuid;

#[tokio::test]
async fn test_comment_thread() {
    let ctx = TestContext::new();
    let mia = ctx.user("Mia").await;
    let ari = ctx.user("Ari").await;
    let olly = ctx.user("Olly").await;
    let team = ctx.team(&mia, "Eng").await;
    ctx.join(&mia, team, &ari, TeamRole::Member).await;
    let task = ctx
        .services
        .tasks
        .create(
            &mia,
            team,
            NewTask {
                title: "Design review".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let mut watcher = ctx.connect(&mia).await;

    let first = ctx
        .services
        .comments
        .add(&ari, task.id, "Looks good")
        .await
        .unwrap();
    let second = ctx
        .services
        .comments
        .add(&mia, task.id, "Thanks")
        .await
        .unwrap();

    let thread = ctx.services.comments.list(&ari, task.id).await.unwrap();
    let ids: Vec<Uuid> = thread.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![first.id, second.id]);
    assert_eq!(event_kinds(&mut watcher), vec!["comment:added", "comment:added"]);

    let blank = ctx.services.comments.add(&ari, task.id, "  ").await;
    assert!(matches!(blank, Err(CoreError::Validation(_))));

    let outsider = ctx.services.comments.list(&olly, task.id).await;
    assert!(matches!(
        outsider,
        Err(CoreError::Forbidden {
            gate: Gate::Membership,
            ..
        })
    ));

    let missing = ctx.services.comments.add(&ari, Uuid::new_v4(), "Hello").await;
    assert!(matches!(missing, Err(CoreError::NotFound(_))));
}

#[tokio::test]
async fn test_only_author_edits() {
    let ctx = TestContext::new();
    let mia = ctx.user("Mia").await;
    let ari = ctx.user("Ari").await;
    let team = ctx.team(&mia, "Eng").await;
    ctx.join(&mia, team, &ari, TeamRole::Member).await;
    let task = ctx
        .services
        .tasks
        .create(
            &mia,
            team,
            NewTask {
                title: "Design review".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let comment = ctx
        .services
        .comments
        .add(&ari, task.id, "Typo in section 2")
        .await
        .unwrap();

    // Managers cannot rewrite someone else's words
    let by_manager = ctx
        .services
        .comments
        .edit(&mia, comment.id, "Nothing to see")
        .await;
    assert!(matches!(
        by_manager,
        Err(CoreError::Forbidden {
            gate: Gate::Ownership,
            ..
        })
    ));

    let edited = ctx
        .services
        .comments
        .edit(&ari, comment.id, "Typo in section 3")
        .await
        .unwrap();
    assert_eq!(edited.content, "Typo in section 3");
    assert!(edited.updated_at >= comment.updated_at);
}

#[tokio::test]
async fn test_author_or_manager_deletes() {
    let ctx = TestContext::new();
    let mia = ctx.user("Mia").await;
    let ari = ctx.user("Ari").await;
    let bo = ctx.user("Bo").await;
    let team = ctx.team(&mia, "Eng").await;
    ctx.join(&mia, team, &ari, TeamRole::Member).await;
    ctx.join(&mia, team, &bo, TeamRole::Member).await;
    let task = ctx
        .services
        .tasks
        .create(
            &mia,
            team,
            NewTask {
                title: "Design review".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let first = ctx
        .services
        .comments
        .add(&ari, task.id, "One")
        .await
        .unwrap();
    let second = ctx
        .services
        .comments
        .add(&ari, task.id, "Two")
        .await
        .unwrap();

    let by_peer = ctx.services.comments.delete(&bo, first.id).await;
    assert!(matches!(
        by_peer,
        Err(CoreError::Forbidden {
            gate: Gate::Ownership,
            ..
        })
    ));

    ctx.services.comments.delete(&ari, first.id).await.unwrap();
    ctx.services.comments.delete(&mia, second.id).await.unwrap();
    assert!(ctx
        .services
        .comments
        .list(&ari, task.id)
        .await
        .unwrap()
        .is_empty());

    let again = ctx.services.comments.delete(&ari, first.id).await;
    assert!(matches!(again, Err(CoreError::NotFound(_))));
}

#[tokio::test]
async fn test_former_member_loses_comment_rights() {
    let ctx = TestContext::new();
    let mia = ctx.user("Mia").await;
    let ari = ctx.user("Ari").await;
    let team = ctx.team(&mia, "Eng").await;
    ctx.join(&mia, team, &ari, TeamRole::Member).await;
    let task = ctx
        .services
        .tasks
        .create(
            &mia,
            team,
            NewTask {
                title: "Design review".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let comment = ctx
        .services
        .comments
        .add(&ari, task.id, "Mine")
        .await
        .unwrap();

    ctx.services
        .registry
        .remove_member(&mia, team, ari.user_id)
        .await
        .unwrap();

    let edit = ctx.services.comments.edit(&ari, comment.id, "Still mine").await;
    assert!(matches!(
        edit,
        Err(CoreError::Forbidden {
            gate: Gate::Membership,
            ..
        })
    ));
}
