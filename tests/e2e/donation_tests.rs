//! Donation checkout, payment resolution and eligibility.

use super::harness::ORIGIN;
use super::TestHarness;
use busker::backend::{ArtistId, ArtistProfile, SessionId, SessionStatus};
use busker::checkout::minor_units;
use busker::client::ProfileDraft;
use busker::error::Error;
use busker::payment::{Eligibility, PaymentOutcome, Signal};
use busker::ClientEvent;

#[test]
fn test_amount_conversion() {
    assert_eq!(minor_units("5.00").unwrap(), 500);
    assert_eq!(minor_units("12.5").unwrap(), 1250);
    assert!(minor_units("five").is_err());
}

/// Below-minimum amounts are rejected before anything reaches the gateway.
#[tokio::test]
async fn test_donation_below_minimum_creates_no_session() {
    let harness = TestHarness::setup_donations().await;
    let media_id = harness.publish("Song").await;

    let result = harness.client.donate(&media_id, "0.50", None, None).await;

    assert!(matches!(result, Err(Error::Validation(_))));
    assert!(harness.backend.session_ids().is_empty());
}

/// A session envelope without a redirect URL is a creation failure.
#[tokio::test]
async fn test_envelope_without_url_fails() {
    let harness = TestHarness::setup_donations().await;
    let media_id = harness.publish("Song").await;
    harness.backend.override_next_envelope(r#"{"id":"cs_1"}"#);

    let result = harness.client.donate(&media_id, "5", None, None).await;

    assert!(matches!(result, Err(Error::SessionCreation(_))));
    assert_eq!(harness.client.stats().sessions_started, 0);
}

/// A session envelope with only a URL is enough to redirect.
#[tokio::test]
async fn test_envelope_with_url_only_succeeds() {
    let harness = TestHarness::setup_donations().await;
    let media_id = harness.publish("Song").await;
    harness
        .backend
        .override_next_envelope(r#"{"url":"https://pay.example/s/abc"}"#);

    let session = harness
        .client
        .donate(&media_id, "5", None, None)
        .await
        .unwrap();

    assert_eq!(session.url, "https://pay.example/s/abc");
    assert!(session.id.is_none());
}

/// Checkout redirect URLs point back to this origin and carry the media id.
#[tokio::test]
async fn test_checkout_redirect_urls() {
    let harness = TestHarness::setup_donations().await;
    let media_id = harness.publish("Song").await;

    let session = harness
        .client
        .donate(&media_id, "$10", Some("great set"), Some("Sam"))
        .await
        .unwrap();

    assert!(session
        .success_url
        .starts_with(&format!("{ORIGIN}/payment-success?mediaId={media_id}")));
    assert!(session.success_url.ends_with("session_id={CHECKOUT_SESSION_ID}"));
    assert_eq!(
        session.cancel_url,
        format!("{ORIGIN}/payment-failure?mediaId={media_id}")
    );
    assert_eq!(harness.client.stats().sessions_started, 1);
}

/// A donation to an artist without a credential is refused with the notice.
#[tokio::test]
async fn test_donation_refused_when_unavailable() {
    let harness = TestHarness::setup();
    harness.configure_gateway().await;
    harness.onboard("Ada", false).await;
    let media_id = harness.publish("Song").await;

    let result = harness.client.donate(&media_id, "5", None, None).await;

    assert!(
        matches!(result, Err(Error::Validation(ref msg)) if msg == "Donations not available")
    );
    assert!(harness.backend.session_ids().is_empty());
}

/// Pay, return to the success page, and see the totals move.
#[tokio::test]
async fn test_full_donation_flow() {
    let harness = TestHarness::setup_donations().await;
    let media_id = harness.publish("Song").await;
    let mut events = harness.client.subscribe();

    // Prime the card.
    let card = harness.client.media_card(&media_id).await.unwrap().unwrap();
    assert_eq!(card.media_donations, 0);

    let session = harness
        .client
        .donate(&media_id, "7.25", None, None)
        .await
        .unwrap();
    let session_id = session.id.clone().unwrap();
    assert_eq!(session_id, harness.latest_session());

    harness.backend.complete_session(&session_id).unwrap();

    let landing = TestHarness::success_landing(&media_id, &session_id);
    let outcome = harness.client.resolve_payment(&landing).await.unwrap();
    assert!(outcome.is_completed());

    let card = harness.client.media_card(&media_id).await.unwrap().unwrap();
    assert_eq!(card.media_donations, 725);
    assert_eq!(card.artist_donations, 725);
    assert_eq!(harness.client.stats().payments_completed, 1);

    let mut resolved = false;
    while let Ok(event) = events.try_recv() {
        if let ClientEvent::PaymentResolved { completed, media_id: Some(ref id) } = event {
            resolved = completed && id == media_id.as_str();
        }
    }
    assert!(resolved);
}

/// A session that was not paid resolves to failed.
#[tokio::test]
async fn test_unpaid_session_fails() {
    let harness = TestHarness::setup_donations().await;
    let media_id = harness.publish("Song").await;
    harness
        .client
        .donate(&media_id, "5", None, None)
        .await
        .unwrap();
    let session_id = harness.latest_session();
    harness
        .backend
        .fail_session(&session_id, "card declined")
        .unwrap();

    let landing = TestHarness::success_landing(&media_id, &session_id);
    let outcome = harness.client.resolve_payment(&landing).await.unwrap();

    assert_eq!(
        outcome,
        PaymentOutcome::Failed {
            reason: "card declined".into()
        }
    );
}

/// The session is looked up once per arrival.
#[tokio::test]
async fn test_resolver_looks_up_once() {
    let harness = TestHarness::setup_donations().await;
    let media_id = harness.publish("Song").await;
    harness
        .client
        .donate(&media_id, "5", None, None)
        .await
        .unwrap();
    let session_id = harness.latest_session();
    harness.backend.complete_session(&session_id).unwrap();

    let resolver = harness
        .client
        .payment_resolver(&TestHarness::success_landing(&media_id, &session_id))
        .unwrap();
    let before = harness.backend.call_count();
    let (first, second) = tokio::join!(resolver.resolve(), resolver.resolve());
    let lookups = harness.backend.call_count() - before;

    assert_eq!(first.unwrap(), second.unwrap());
    assert_eq!(lookups, 1);
}

/// Returning to the cancel page is a failure without a lookup.
#[tokio::test]
async fn test_cancel_page_fails_without_lookup() {
    let harness = TestHarness::setup();
    let before = harness.backend.call_count();

    let outcome = harness
        .client
        .resolve_payment(&format!("{ORIGIN}/payment-failure?mediaId=m1"))
        .await
        .unwrap();

    assert!(matches!(outcome, PaymentOutcome::Failed { .. }));
    assert_eq!(harness.backend.call_count(), before);
}

/// Without a session id the outcome stays pending.
#[tokio::test]
async fn test_missing_session_id_stays_pending() {
    let harness = TestHarness::setup();
    let outcome = harness
        .client
        .resolve_payment(&format!("{ORIGIN}/payment-success?mediaId=m1"))
        .await
        .unwrap();
    assert_eq!(outcome, PaymentOutcome::Pending);

    let unknown = SessionId::from("cs_404");
    let result = harness
        .client
        .resolve_payment(&TestHarness::success_landing(&"m1".into(), &unknown))
        .await;
    assert!(matches!(result, Err(Error::Backend(_))));
}

/// Eligibility with a loading input is pending, never unavailable.
#[test]
fn test_eligibility_waits_for_both_signals() {
    assert_eq!(
        Eligibility::evaluate(&Signal::Ready(true), &Signal::Loading),
        Eligibility::Pending
    );
    assert_eq!(
        Eligibility::evaluate(&Signal::Loading, &Signal::Ready(false)),
        Eligibility::Pending
    );
    assert_eq!(
        Eligibility::evaluate(&Signal::Refreshing(true), &Signal::Ready(true)),
        Eligibility::Available
    );
}

/// Eligibility follows credential and gateway changes.
#[tokio::test]
async fn test_eligibility_tracks_mutations() {
    let harness = TestHarness::setup();
    let artist = harness.artist();
    harness.onboard("Ada", true).await;

    assert_eq!(
        harness.client.eligibility(&artist).await,
        Eligibility::Unavailable
    );

    harness.client.attach_credential("acct_1").await.unwrap();
    assert_eq!(
        harness.client.eligibility(&artist).await,
        Eligibility::ComingSoon
    );

    harness.configure_gateway().await;
    assert_eq!(
        harness.client.eligibility(&artist).await,
        Eligibility::Available
    );
    assert_eq!(
        harness.client.own_eligibility().await,
        Eligibility::Available
    );

    harness.client.detach_credential().await.unwrap();
    assert_eq!(
        harness.client.eligibility(&artist).await,
        Eligibility::Unavailable
    );
}

/// Another artist's eligibility is independent of the caller's.
#[tokio::test]
async fn test_eligibility_per_artist() {
    let harness = TestHarness::setup_donations().await;
    let other = ArtistId::from("artist-other");
    harness.backend.insert_artist(
        other.clone(),
        ArtistProfile {
            display_name: "Bo".into(),
            donations_enabled: true,
            ..ArtistProfile::default()
        },
        None,
    );

    assert_eq!(
        harness.client.eligibility(&harness.artist()).await,
        Eligibility::Available
    );
    assert_eq!(
        harness.client.eligibility(&other).await,
        Eligibility::Unavailable
    );
}

/// Turning donations off in the profile closes the gate on cached reads.
#[tokio::test]
async fn test_opting_out_closes_the_gate() {
    let harness = TestHarness::setup_donations().await;
    let media_id = harness.publish("Song").await;

    // Prime the flag and the card.
    assert_eq!(
        harness.client.eligibility(&harness.artist()).await,
        Eligibility::Available
    );
    let card = harness.client.media_card(&media_id).await.unwrap().unwrap();
    assert!(card.artist.donations_enabled);

    harness
        .client
        .update_profile(ProfileDraft::named("Ada").with_donations(false))
        .await
        .unwrap();

    assert_eq!(
        harness.client.eligibility(&harness.artist()).await,
        Eligibility::Unavailable
    );
    let card = harness.client.media_card(&media_id).await.unwrap().unwrap();
    assert!(!card.artist.donations_enabled);

    let result = harness.client.donate(&media_id, "5", None, None).await;
    assert!(
        matches!(result, Err(Error::Validation(ref msg)) if msg == "Donations not available")
    );
    assert!(harness.backend.session_ids().is_empty());
}

/// A status read before payment does not hide the later completion.
#[tokio::test]
async fn test_session_status_sees_completion() {
    let harness = TestHarness::setup_donations().await;
    let media_id = harness.publish("Song").await;
    harness
        .client
        .donate(&media_id, "5", None, None)
        .await
        .unwrap();
    let session_id = harness.latest_session();

    let unpaid = harness.client.session_status(&session_id).await.unwrap();
    assert!(matches!(unpaid, SessionStatus::Failed { .. }));

    harness.backend.complete_session(&session_id).unwrap();

    let paid = harness.client.session_status(&session_id).await.unwrap();
    assert!(matches!(paid, SessionStatus::Completed { .. }));

    // Settled now, so the next read is cached.
    let before = harness.backend.call_count();
    harness.client.session_status(&session_id).await.unwrap();
    assert_eq!(harness.backend.call_count(), before);
}

/// Resolving the same landing twice through the client looks up twice;
/// a held resolver does not.
#[tokio::test]
async fn test_one_resolver_per_visit() {
    let harness = TestHarness::setup_donations().await;
    let media_id = harness.publish("Song").await;
    harness
        .client
        .donate(&media_id, "5", None, None)
        .await
        .unwrap();
    let session_id = harness.latest_session();
    harness.backend.complete_session(&session_id).unwrap();
    let landing = TestHarness::success_landing(&media_id, &session_id);

    let before = harness.backend.call_count();
    harness.client.resolve_payment(&landing).await.unwrap();
    harness.client.resolve_payment(&landing).await.unwrap();
    let fresh_lookups = harness.backend.call_count() - before;

    let resolver = harness.client.payment_resolver(&landing).unwrap();
    let before = harness.backend.call_count();
    resolver.resolve().await.unwrap();
    resolver.resolve().await.unwrap();
    let held_lookups = harness.backend.call_count() - before;

    assert_eq!(fresh_lookups, 2);
    assert_eq!(held_lookups, 1);
}

/// A landing whose session id carries path characters is refused before
/// any lookup.
#[tokio::test]
async fn test_crafted_session_id_refused() {
    let harness = TestHarness::setup();
    let before = harness.backend.call_count();

    let result = harness
        .client
        .resolve_payment(&format!(
            "{ORIGIN}/payment-success?mediaId=m1&session_id=..%2F..%2Fartists%2Fme%3Fx%3D"
        ))
        .await;

    assert!(matches!(result, Err(Error::Validation(_))));
    assert_eq!(harness.backend.call_count(), before);
}
