//! Revocation triggers.

use super::{Harness, SECRET};
use crate::{Clock, RevocationReason, SupervisorState, TokioClock};
use chrono::{Duration, Utc};
use profile_store::{ProfilePatch, ProfileStore, Role};
use std::sync::Arc;

#[tokio::test]
async fn disabled_at_sign_in_is_evicted_once() {
    let harness = Harness::new();
    let record = harness.member("member01@render.ai").await;
    harness
        .store
        .update(&record.id, &ProfilePatch::disabled(true))
        .await
        .unwrap();

    harness.context.sign_in("member01", SECRET).await.unwrap();
    let snapshot = harness.wait_for_eviction().await;
    harness.settle().await;

    assert_eq!(snapshot.revocation, Some(RevocationReason::Disabled));
    assert_eq!(
        snapshot.revocation_message(),
        Some("Your account has been disabled by the administrator.")
    );
    assert!(!snapshot.may_render());
    assert_eq!(harness.gateway.sign_out_calls(), 1);
    assert!(harness.gateway.directory().active_session_count() == 0);
}

#[tokio::test]
async fn disabling_an_active_session_evicts_it() {
    let harness = Harness::new();
    let record = harness.member("member01@render.ai").await;
    harness.context.sign_in("member01", SECRET).await.unwrap();
    harness.wait_for_state(SupervisorState::Active).await;

    harness
        .store
        .update(&record.id, &ProfilePatch::disabled(true))
        .await
        .unwrap();

    let snapshot = harness.wait_for_eviction().await;
    harness.settle().await;
    assert_eq!(snapshot.revocation, Some(RevocationReason::Disabled));
    assert!(snapshot.profile.is_none());
    assert_eq!(harness.gateway.sign_out_calls(), 1);
}

#[tokio::test]
async fn past_expiry_is_evicted() {
    let harness = Harness::new();
    let record = harness.member("member01@render.ai").await;
    let at = Utc::now() - Duration::days(1);
    harness
        .store
        .update(&record.id, &ProfilePatch::expiry(Some(at)))
        .await
        .unwrap();

    harness.context.sign_in("member01", SECRET).await.unwrap();
    let snapshot = harness.wait_for_eviction().await;

    assert_eq!(snapshot.revocation, Some(RevocationReason::Expired { at }));
    assert_eq!(snapshot.revocation_message(), Some("Your membership has expired."));
}

#[tokio::test]
async fn disabled_wins_over_expired() {
    let harness = Harness::new();
    let record = harness.member("member01@render.ai").await;
    harness
        .store
        .update(
            &record.id,
            &ProfilePatch {
                is_disabled: Some(true),
                expiry_date: Some(Some(Utc::now() - Duration::days(1))),
                ..ProfilePatch::default()
            },
        )
        .await
        .unwrap();

    harness.context.sign_in("member01", SECRET).await.unwrap();
    let snapshot = harness.wait_for_eviction().await;
    assert_eq!(snapshot.revocation, Some(RevocationReason::Disabled));
}

#[tokio::test]
async fn expiry_is_enforced_without_a_new_push() {
    let harness = Harness::new();
    let record = harness.member("member01@render.ai").await;
    let at = Utc::now() + Duration::milliseconds(300);
    harness
        .store
        .update(&record.id, &ProfilePatch::expiry(Some(at)))
        .await
        .unwrap();

    harness.context.sign_in("member01", SECRET).await.unwrap();
    harness.wait_for_state(SupervisorState::Active).await;

    let snapshot = harness.wait_for_eviction().await;
    assert_eq!(snapshot.revocation, Some(RevocationReason::Expired { at }));
    assert_eq!(harness.gateway.sign_out_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn injected_clock_drives_timed_expiry() {
    let clock = Arc::new(TokioClock::starting_at(Utc::now()));
    let harness = Harness::with_clock(clock.clone());
    let record = harness.member("member01@render.ai").await;
    let at = clock.now() + Duration::hours(1);
    harness
        .store
        .update(&record.id, &ProfilePatch::expiry(Some(at)))
        .await
        .unwrap();

    harness.context.sign_in("member01", SECRET).await.unwrap();
    harness.wait_for_state(SupervisorState::Active).await;

    tokio::time::advance(std::time::Duration::from_secs(30 * 60)).await;
    assert_eq!(harness.context.snapshot().state, SupervisorState::Active);
    assert_eq!(harness.gateway.sign_out_calls(), 0);

    tokio::time::advance(std::time::Duration::from_secs(60 * 60)).await;
    let snapshot = harness.wait_for_eviction().await;
    assert!(clock.now() > at);
    assert_eq!(snapshot.revocation, Some(RevocationReason::Expired { at }));
    assert_eq!(harness.gateway.sign_out_calls(), 1);
}

#[tokio::test]
async fn missing_record_at_sign_in_is_evicted() {
    let harness = Harness::new();
    harness.identity_only("member01@render.ai", Role::Member);

    harness.context.sign_in("member01", SECRET).await.unwrap();
    let snapshot = harness.wait_for_eviction().await;

    assert_eq!(snapshot.revocation, Some(RevocationReason::RecordMissing));
    assert_eq!(
        snapshot.revocation_message(),
        Some("Your account no longer has access.")
    );
}

#[tokio::test]
async fn deleting_the_record_evicts_the_session() {
    let harness = Harness::new();
    let record = harness.member("member01@render.ai").await;
    harness.context.sign_in("member01", SECRET).await.unwrap();
    harness.wait_for_state(SupervisorState::Active).await;

    harness.store.delete(&record.id).await.unwrap();

    let snapshot = harness.wait_for_eviction().await;
    assert_eq!(snapshot.revocation, Some(RevocationReason::RecordMissing));
    // The identity itself still exists; only access was revoked
    assert!(harness.gateway.directory().contains("member01@render.ai"));
}

#[tokio::test]
async fn password_version_bump_forces_logout() {
    let harness = Harness::new();
    let record = harness.member("member01@render.ai").await;
    harness.context.sign_in("member01", SECRET).await.unwrap();
    harness.wait_for_state(SupervisorState::Active).await;

    harness
        .store
        .update(&record.id, &ProfilePatch::password_version(2))
        .await
        .unwrap();

    let snapshot = harness.wait_for_eviction().await;
    assert_eq!(
        snapshot.revocation,
        Some(RevocationReason::PasswordVersionBumped {
            baseline: 1,
            observed: 2
        })
    );
    assert_eq!(harness.gateway.sign_out_calls(), 1);
}

#[tokio::test]
async fn identical_resend_does_not_evict() {
    let harness = Harness::new();
    let record = harness.member("member01@render.ai").await;
    harness.context.sign_in("member01", SECRET).await.unwrap();
    harness.wait_for_state(SupervisorState::Active).await;

    harness.store.set(&record).await.unwrap();
    harness.store.set(&record).await.unwrap();
    harness.settle().await;

    assert_eq!(harness.context.snapshot().state, SupervisorState::Active);
    assert_eq!(harness.gateway.sign_out_calls(), 0);
}

#[tokio::test]
async fn fresh_sign_in_after_forced_logout_is_accepted() {
    let harness = Harness::new();
    let record = harness.member("member01@render.ai").await;
    harness.context.sign_in("member01", SECRET).await.unwrap();
    harness.wait_for_state(SupervisorState::Active).await;

    harness
        .store
        .update(&record.id, &ProfilePatch::password_version(2))
        .await
        .unwrap();
    harness.wait_for_eviction().await;

    harness.context.sign_in("member01", SECRET).await.unwrap();
    let snapshot = harness.wait_for_state(SupervisorState::Active).await;
    assert!(snapshot.revocation.is_none());
    assert_eq!(snapshot.profile.map(|p| p.password_version), Some(2));
}

#[tokio::test]
async fn note_changes_do_not_evict() {
    let harness = Harness::new();
    let record = harness.member("member01@render.ai").await;
    harness.context.sign_in("member01", SECRET).await.unwrap();
    harness.wait_for_state(SupervisorState::Active).await;

    harness
        .store
        .update(&record.id, &ProfilePatch::note(Some("renewed".into())))
        .await
        .unwrap();

    let snapshot = harness
        .wait_for(|s| {
            s.profile
                .as_ref()
                .and_then(|p| p.note.as_deref())
                .map_or(false, |note| note == "renewed")
        })
        .await;
    assert_eq!(snapshot.state, SupervisorState::Active);
    assert_eq!(harness.gateway.sign_out_calls(), 0);
}
