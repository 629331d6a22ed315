//! Integration tests for the capture → normalize → analyze → display pipeline
//!
//! Every test drives a real [`AnalysisSession`] with a generated photo on disk
//! and a scripted inference transport standing in for the network.

mod common;

use std::time::Duration;

use common::{
    GOOD_REPLY, MockCamera, Reply, ScriptedProbe, ScriptedTransport, scripted_session, session_with,
    write_test_photo,
};
use pretty_assertions::assert_eq;
use water_strip_analyzer::analysis::{ANALYSIS_INSTRUCTION, AnalysisClient};
use water_strip_analyzer::capture::{CameraFacing, PermissionState};
use water_strip_analyzer::presenter::StalePolicy;
use water_strip_analyzer::session::{AnalysisSession, CaptureOutcome, Lifecycle};
use water_strip_analyzer::{FailureKind, ReadingSet};

fn expected_readings() -> ReadingSet {
    ReadingSet {
        ph: 7.2,
        ammonia: 0.25,
        nitrite: 0.0,
        nitrate: 5.0,
    }
}

#[tokio::test]
async fn successful_capture_displays_exact_readings() {
    let dir = tempfile::tempdir().unwrap();
    let photo = write_test_photo(dir.path(), 1600, 1200);
    let (mut session, probe) = session_with(&photo, Reply::Text(GOOD_REPLY.into()), None, StalePolicy::KeepVisible);

    assert_eq!(session.start().await, PermissionState::Granted);
    let outcome = session.capture().await;

    assert_eq!(outcome, CaptureOutcome::Displayed(expected_readings()));
    assert_eq!(session.presenter().current(), Some(&expected_readings()));
    assert_eq!(
        session.presenter().render().unwrap(),
        "Analysis Results:\npH: 7.2\nAmmonia: 0.25 ppm\nNitrite: 0 ppm\nNitrate: 5 ppm\n"
    );

    let requests = probe.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].instruction, ANALYSIS_INSTRUCTION);
    assert!(requests[0].image_data_uri.starts_with("data:image/jpeg;base64,"));
}

#[tokio::test]
async fn analyzing_flag_spans_the_request_only() {
    let dir = tempfile::tempdir().unwrap();
    let photo = write_test_photo(dir.path(), 640, 480);
    let (mut session, probe) = session_with(
        &photo,
        Reply::Delayed(Duration::from_millis(20), GOOD_REPLY.into()),
        None,
        StalePolicy::KeepVisible,
    );
    let flag = session.analyzing();

    session.start().await;
    assert!(!flag.is_set());
    session.capture().await;

    assert_eq!(probe.flag_during_call(), vec![true]);
    assert!(!flag.is_set());
}

#[tokio::test]
async fn shutter_is_ignored_while_analysis_in_flight() {
    let dir = tempfile::tempdir().unwrap();
    let photo = write_test_photo(dir.path(), 640, 480);
    let (mut session, probe) = session_with(&photo, Reply::Text(GOOD_REPLY.into()), None, StalePolicy::KeepVisible);
    session.start().await;

    let held = session.analyzing().try_acquire().expect("flag starts clear");
    assert_eq!(session.capture().await, CaptureOutcome::Busy);
    assert_eq!(probe.request_count(), 0);

    drop(held);
    assert!(matches!(session.capture().await, CaptureOutcome::Displayed(_)));
    assert_eq!(probe.request_count(), 1);
}

#[tokio::test]
async fn capture_without_permission_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let photo = write_test_photo(dir.path(), 64, 64);
    let (transport, probe) = ScriptedTransport::text(GOOD_REPLY);
    let mut session = AnalysisSession::builder()
        .with_permission_probe(ScriptedProbe::new(&[PermissionState::Denied]))
        .with_capture_device(MockCamera::new(&photo))
        .with_analysis_client(AnalysisClient::new(Box::new(transport)))
        .build()
        .unwrap();

    // Before the first probe resolves the shutter is not available either.
    assert_eq!(session.capture().await, CaptureOutcome::NotPermitted);
    assert_eq!(session.start().await, PermissionState::Denied);
    assert_eq!(session.capture().await, CaptureOutcome::NotPermitted);
    assert_eq!(probe.request_count(), 0);
}

#[tokio::test]
async fn malformed_reply_is_a_parse_failure_and_keeps_previous_results() {
    let dir = tempfile::tempdir().unwrap();
    let photo = write_test_photo(dir.path(), 640, 480);
    let bad_replies = [
        "The strip looks healthy!",
        r#"{"pH": 7.2, "ammonia": 0.25, "nitrite": 0}"#,
        r#"{"pH": "7.2", "ammonia": 0.25, "nitrite": 0, "nitrate": 5}"#,
        "[7.2, 0.25, 0, 5]",
    ];
    let mut script = vec![Reply::Text(GOOD_REPLY.into())];
    script.extend(bad_replies.iter().map(|bad| Reply::Text(bad.to_string())));
    let (mut session, probe) = scripted_session(&photo, script, None, StalePolicy::KeepVisible);

    session.start().await;
    session.capture().await;
    assert_eq!(session.presenter().current(), Some(&expected_readings()));

    for bad in bad_replies {
        assert_eq!(
            session.capture().await,
            CaptureOutcome::Failed(FailureKind::ParseFailure),
            "reply {:?}",
            bad
        );
        assert_eq!(session.presenter().current(), Some(&expected_readings()));
        assert!(!session.analyzing().is_set());
    }
    assert_eq!(probe.request_count(), 1 + bad_replies.len());
}

#[tokio::test]
async fn fenced_reply_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let photo = write_test_photo(dir.path(), 640, 480);
    let fenced = format!("```json\n{}\n```", GOOD_REPLY);
    let (mut session, _) = session_with(&photo, Reply::Text(fenced), None, StalePolicy::KeepVisible);

    session.start().await;
    assert_eq!(session.capture().await, CaptureOutcome::Displayed(expected_readings()));
}

#[tokio::test]
async fn network_failure_sends_once_and_rearms_shutter() {
    let dir = tempfile::tempdir().unwrap();
    let photo = write_test_photo(dir.path(), 640, 480);
    let (mut session, probe) = session_with(&photo, Reply::NetworkDown, None, StalePolicy::KeepVisible);
    session.start().await;

    assert_eq!(session.capture().await, CaptureOutcome::Failed(FailureKind::NetworkFailure));
    assert_eq!(probe.request_count(), 1);
    assert!(!session.analyzing().is_set());
    assert_eq!(session.presenter().current(), None);

    // The failure is not sticky: the next press goes out again.
    assert_eq!(session.capture().await, CaptureOutcome::Failed(FailureKind::NetworkFailure));
    assert_eq!(probe.request_count(), 2);
}

#[tokio::test]
async fn camera_failure_never_reaches_the_network() {
    let (transport, probe) = ScriptedTransport::text(GOOD_REPLY);
    let mut session = AnalysisSession::builder()
        .with_permission_probe(ScriptedProbe::granted())
        .with_capture_device(MockCamera::failing())
        .with_analysis_client(AnalysisClient::new(Box::new(transport)))
        .build()
        .unwrap();
    session.start().await;

    assert_eq!(session.capture().await, CaptureOutcome::Failed(FailureKind::CaptureFailure));
    assert_eq!(probe.request_count(), 0);
    assert!(!session.analyzing().is_set());
}

#[tokio::test]
async fn unreadable_photo_is_a_capture_failure() {
    let dir = tempfile::tempdir().unwrap();
    let photo = dir.path().join("corrupt.jpg");
    std::fs::write(&photo, b"\xff\xd8 definitely not a jpeg").unwrap();
    let (mut session, probe) = session_with(&photo, Reply::Text(GOOD_REPLY.into()), None, StalePolicy::KeepVisible);
    session.start().await;

    assert_eq!(session.capture().await, CaptureOutcome::Failed(FailureKind::CaptureFailure));
    assert_eq!(probe.request_count(), 0);
}

#[tokio::test]
async fn slow_service_times_out_as_network_failure() {
    let dir = tempfile::tempdir().unwrap();
    let photo = write_test_photo(dir.path(), 320, 240);
    let (mut session, probe) = session_with(
        &photo,
        Reply::Hang,
        Some(Duration::from_millis(50)),
        StalePolicy::KeepVisible,
    );
    session.start().await;

    assert_eq!(session.capture().await, CaptureOutcome::Failed(FailureKind::NetworkFailure));
    assert_eq!(probe.request_count(), 1);
    assert!(!session.analyzing().is_set());
}

#[tokio::test]
async fn toggling_facing_keeps_displayed_readings() {
    let dir = tempfile::tempdir().unwrap();
    let photo = write_test_photo(dir.path(), 320, 240);
    let camera = MockCamera::new(&photo);
    let shots = camera.shots();
    let (transport, _) = ScriptedTransport::text(GOOD_REPLY);
    let mut session = AnalysisSession::builder()
        .with_permission_probe(ScriptedProbe::granted())
        .with_capture_device(camera)
        .with_analysis_client(AnalysisClient::new(Box::new(transport)))
        .build()
        .unwrap();
    session.start().await;
    session.capture().await;

    assert_eq!(session.toggle_facing(), CameraFacing::Front);
    assert_eq!(session.presenter().current(), Some(&expected_readings()));

    session.capture().await;
    assert_eq!(*shots.lock().unwrap(), vec![CameraFacing::Back, CameraFacing::Front]);
}

#[tokio::test]
async fn teardown_discards_in_flight_analysis() {
    let dir = tempfile::tempdir().unwrap();
    let photo = write_test_photo(dir.path(), 320, 240);
    let (mut session, probe) = session_with(&photo, Reply::Hang, None, StalePolicy::KeepVisible);
    session.start().await;

    let lifecycle = session.lifecycle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        lifecycle.teardown();
    });

    assert_eq!(session.capture().await, CaptureOutcome::Discarded);
    assert_eq!(probe.request_count(), 1);
    assert_eq!(session.presenter().current(), None);
    assert!(!session.analyzing().is_set());

    // Once unmounted nothing runs again.
    assert_eq!(session.capture().await, CaptureOutcome::Discarded);
    assert_eq!(probe.request_count(), 1);
}

#[tokio::test]
async fn hide_policy_clears_results_when_a_new_capture_starts() {
    let dir = tempfile::tempdir().unwrap();
    let photo = write_test_photo(dir.path(), 320, 240);
    let script = vec![Reply::Text(GOOD_REPLY.into()), Reply::NetworkDown];
    let (mut session, _) = scripted_session(&photo, script, None, StalePolicy::HideWhileAnalyzing);
    assert_eq!(session.presenter().policy(), StalePolicy::HideWhileAnalyzing);
    session.start().await;

    session.capture().await;
    assert_eq!(session.presenter().current(), Some(&expected_readings()));

    assert_eq!(session.capture().await, CaptureOutcome::Failed(FailureKind::NetworkFailure));
    assert_eq!(session.presenter().current(), None);
}

#[tokio::test]
async fn keep_policy_leaves_stale_results_after_failure() {
    let dir = tempfile::tempdir().unwrap();
    let photo = write_test_photo(dir.path(), 320, 240);
    let script = vec![Reply::Text(GOOD_REPLY.into()), Reply::NetworkDown];
    let (mut session, _) = scripted_session(&photo, script, None, StalePolicy::KeepVisible);
    session.start().await;

    session.capture().await;
    session.capture().await;
    assert_eq!(session.presenter().current(), Some(&expected_readings()));
}

#[tokio::test]
async fn builder_requires_every_device() {
    let (transport, _) = ScriptedTransport::text(GOOD_REPLY);
    let missing_camera = AnalysisSession::builder()
        .with_permission_probe(ScriptedProbe::granted())
        .with_analysis_client(AnalysisClient::new(Box::new(transport)))
        .build();
    assert!(matches!(missing_camera, Err(e) if e.category() == "config"));

    let missing_client = AnalysisSession::builder()
        .with_permission_probe(ScriptedProbe::granted())
        .with_capture_device(MockCamera::failing())
        .build();
    assert!(missing_client.is_err());
}

#[tokio::test]
async fn shutter_readiness_tracks_permission_flag_and_mount() {
    let dir = tempfile::tempdir().unwrap();
    let photo = write_test_photo(dir.path(), 64, 48);
    let (mut session, _) = session_with(&photo, Reply::Text(GOOD_REPLY.into()), None, StalePolicy::KeepVisible);

    assert!(!session.is_ready());
    session.start().await;
    assert!(session.is_ready());

    let held = session.analyzing().try_acquire().unwrap();
    assert!(!session.is_ready());
    drop(held);
    assert!(session.is_ready());

    session.lifecycle().teardown();
    assert!(!session.is_ready());
}

#[tokio::test]
async fn shared_lifecycle_unmounts_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let photo = write_test_photo(dir.path(), 64, 48);
    let screen = Lifecycle::new();
    let (transport, probe) = ScriptedTransport::text(GOOD_REPLY);
    let mut session = AnalysisSession::builder()
        .with_permission_probe(ScriptedProbe::granted())
        .with_capture_device(MockCamera::new(&photo))
        .with_analysis_client(AnalysisClient::new(Box::new(transport)))
        .with_lifecycle(screen.clone())
        .build()
        .unwrap();
    session.start().await;
    assert!(session.lifecycle().is_mounted());

    screen.teardown();
    assert!(!session.lifecycle().is_mounted());
    assert_eq!(session.capture().await, CaptureOutcome::Discarded);
    assert_eq!(probe.request_count(), 0);
}
