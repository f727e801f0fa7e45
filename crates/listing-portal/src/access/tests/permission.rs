use super::common::*;
use crate::domain::{ActionKind, PropertyId, RequestStatus};
use crate::error::ServiceError;

#[tokio::test]
async fn admin_is_always_allowed() {
    let fx = fixture().await;
    for action in [ActionKind::Add, ActionKind::Edit, ActionKind::Delete] {
        assert!(fx.evaluator.can_perform(Some(&fx.admin), action, None).await);
        assert!(
            fx.evaluator
                .can_perform(Some(&fx.admin), action, Some(PropertyId(999)))
                .await
        );
    }
}

#[tokio::test]
async fn missing_identity_is_denied() {
    let fx = fixture().await;
    assert!(!fx.evaluator.can_perform(None, ActionKind::Add, None).await);
}

#[tokio::test]
async fn agent_without_approval_is_denied() {
    let fx = fixture().await;
    let id = listing(&fx.store, "Studio").await;
    assert!(
        !fx.evaluator
            .can_perform(Some(&fx.agent), ActionKind::Edit, Some(id))
            .await
    );
}

#[tokio::test]
async fn scoped_approval_covers_only_its_property_and_action() {
    let fx = fixture().await;
    let first = listing(&fx.store, "Studio").await;
    let second = listing(&fx.store, "Duplex").await;

    fx.grant(&fx.agent, ActionKind::Edit, Some(first), RequestStatus::Approved)
        .await;

    let can = |action, id| fx.evaluator.can_perform(Some(&fx.agent), action, id);
    assert!(can(ActionKind::Edit, Some(first)).await);
    assert!(!can(ActionKind::Edit, Some(second)).await);
    assert!(!can(ActionKind::Delete, Some(first)).await);
    assert!(!can(ActionKind::Edit, None).await);
}

#[tokio::test]
async fn global_approval_covers_every_property() {
    let fx = fixture().await;
    let first = listing(&fx.store, "Studio").await;
    let second = listing(&fx.store, "Duplex").await;

    fx.grant(&fx.agent, ActionKind::Delete, None, RequestStatus::Approved)
        .await;

    for id in [first, second] {
        assert!(
            fx.evaluator
                .can_perform(Some(&fx.agent), ActionKind::Delete, Some(id))
                .await
        );
    }
    assert!(
        !fx.evaluator
            .can_perform(Some(&fx.other_agent), ActionKind::Delete, Some(first))
            .await
    );
}

#[tokio::test]
async fn pending_and_rejected_requests_grant_nothing() {
    let fx = fixture().await;
    let id = listing(&fx.store, "Studio").await;

    fx.requests
        .create(&fx.agent, payload("add", None, "New mandate"))
        .await
        .expect("pending request files");
    fx.grant(&fx.agent, ActionKind::Edit, Some(id), RequestStatus::Rejected)
        .await;

    assert!(!fx.evaluator.can_perform(Some(&fx.agent), ActionKind::Add, None).await);
    assert!(
        !fx.evaluator
            .can_perform(Some(&fx.agent), ActionKind::Edit, Some(id))
            .await
    );
}

#[tokio::test]
async fn approval_is_visible_to_the_next_check() {
    let fx = fixture().await;
    let request = fx
        .requests
        .create(&fx.agent, payload("add", None, "New mandate"))
        .await
        .expect("request files");
    assert!(!fx.evaluator.can_perform(Some(&fx.agent), ActionKind::Add, None).await);

    fx.requests
        .resolve(&fx.admin, request.id, RequestStatus::Approved)
        .await
        .expect("approve succeeds");

    assert!(fx.evaluator.can_perform(Some(&fx.agent), ActionKind::Add, None).await);
}

#[tokio::test]
async fn ensure_reports_forbidden() {
    let fx = fixture().await;
    let err = fx
        .evaluator
        .ensure(&fx.agent, ActionKind::Add, None)
        .await
        .expect_err("agent lacks add");
    assert!(matches!(err, ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn store_outage_denies_even_with_an_approved_grant() {
    let fx = fixture().await;
    let id = listing(&fx.store, "Studio").await;
    fx.grant(&fx.agent, ActionKind::Edit, None, RequestStatus::Approved)
        .await;
    assert!(
        fx.evaluator
            .can_perform(Some(&fx.agent), ActionKind::Edit, Some(id))
            .await
    );

    fx.store.set_requests_available(false);
    assert!(
        !fx.evaluator
            .can_perform(Some(&fx.agent), ActionKind::Edit, Some(id))
            .await
    );
    let err = fx
        .evaluator
        .ensure(&fx.agent, ActionKind::Edit, Some(id))
        .await
        .expect_err("outage denies");
    assert!(matches!(err, ServiceError::Forbidden(_)));

    fx.store.set_requests_available(true);
    assert!(fx.evaluator.ensure(&fx.agent, ActionKind::Edit, Some(id)).await.is_ok());
}
