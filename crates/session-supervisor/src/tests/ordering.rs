//! Event ordering and subscription lifecycle.

use super::{Harness, SECRET};
use crate::{RevocationReason, SupervisorState};
use profile_store::{ProfileEvent, ProfilePatch, ProfileStore};

#[tokio::test]
async fn stale_push_after_termination_is_ignored() {
    let harness = Harness::new();
    let record = harness.member("member01@render.ai").await;
    harness.context.sign_in("member01", SECRET).await.unwrap();
    harness.wait_for_state(SupervisorState::Active).await;

    harness
        .store
        .update(&record.id, &ProfilePatch::disabled(true))
        .await
        .unwrap();
    harness.wait_for_eviction().await;

    // Re-enabling and re-sending cannot revive the evicted session
    harness
        .store
        .update(&record.id, &ProfilePatch::disabled(false))
        .await
        .unwrap();
    harness
        .store
        .inject(&record.id, ProfileEvent::Present(record.clone()));
    harness.settle().await;

    let snapshot = harness.context.snapshot();
    assert_eq!(snapshot.state, SupervisorState::Unauthenticated);
    assert_eq!(snapshot.revocation, Some(RevocationReason::Disabled));
    assert_eq!(harness.store.subscriber_count(&record.id), 0);
    assert_eq!(harness.gateway.sign_out_calls(), 1);
}

#[tokio::test]
async fn only_one_subscription_is_live() {
    let harness = Harness::new();
    let record = harness.member("member01@render.ai").await;
    harness.context.sign_in("member01", SECRET).await.unwrap();
    harness.wait_for_state(SupervisorState::Active).await;

    assert_eq!(harness.store.subscriber_count(&record.id), 1);

    for version in [1, 1, 1] {
        harness
            .store
            .update(&record.id, &ProfilePatch::password_version(version))
            .await
            .unwrap();
    }
    harness.settle().await;
    assert_eq!(harness.store.subscriber_count(&record.id), 1);
}

#[tokio::test]
async fn identity_switch_moves_the_subscription() {
    let harness = Harness::new();
    let first = harness.member("member01@render.ai").await;
    let second = harness.member("member02@render.ai").await;

    harness.context.sign_in("member01", SECRET).await.unwrap();
    harness.wait_for_state(SupervisorState::Active).await;

    harness.context.sign_in("member02", SECRET).await.unwrap();
    let snapshot = harness
        .wait_for(|s| {
            s.state == SupervisorState::Active
                && s.identity.as_ref().map(|i| i.id.as_str()) == Some(second.id.as_str())
        })
        .await;
    assert_eq!(snapshot.profile.map(|p| p.id), Some(second.id.clone()));
    assert_eq!(harness.store.subscriber_count(&first.id), 0);
    assert_eq!(harness.store.subscriber_count(&second.id), 1);

    // Changes to the previous identity no longer matter
    harness
        .store
        .update(&first.id, &ProfilePatch::disabled(true))
        .await
        .unwrap();
    harness.settle().await;
    assert_eq!(harness.context.snapshot().state, SupervisorState::Active);
    assert_eq!(harness.gateway.sign_out_calls(), 0);
}

#[tokio::test]
async fn sign_out_closes_the_subscription_first() {
    let harness = Harness::new();
    let record = harness.member("member01@render.ai").await;
    harness.context.sign_in("member01", SECRET).await.unwrap();
    harness.wait_for_state(SupervisorState::Active).await;

    harness.context.sign_out().await.unwrap();
    harness.wait_for_state(SupervisorState::Unauthenticated).await;
    assert_eq!(harness.store.subscriber_count(&record.id), 0);

    // Nothing evaluates a record for a signed-out identity
    harness.store.delete(&record.id).await.unwrap();
    harness.settle().await;
    let snapshot = harness.context.snapshot();
    assert!(snapshot.revocation.is_none());
    assert_eq!(harness.gateway.sign_out_calls(), 1);
}

#[tokio::test]
async fn updates_are_applied_in_order() {
    let harness = Harness::new();
    let record = harness.member("member01@render.ai").await;
    harness.context.sign_in("member01", SECRET).await.unwrap();
    harness.wait_for_state(SupervisorState::Active).await;

    // Disable then immediately re-enable: the disable must still evict
    harness
        .store
        .update(&record.id, &ProfilePatch::disabled(true))
        .await
        .unwrap();
    harness
        .store
        .update(&record.id, &ProfilePatch::disabled(false))
        .await
        .unwrap();

    let snapshot = harness.wait_for_eviction().await;
    assert_eq!(snapshot.revocation, Some(RevocationReason::Disabled));
}
