//! Integration tests for the streaming session.
//!
//! Tests cover:
//! - Local camera stops at the first failed read and releases the device once
//! - Network camera skips failed reads and detections
//! - Cancellation and source exhaustion
//! - Tracking ids and FPS reported to the sink
//! - Frame limits, including a limit of zero

mod common;

use std::time::Duration;

use firesmoke::detection::IouTracker;

use common::*;

fn session(policy: FailurePolicy, cancel: CancelFlag) -> StreamSession {
    StreamSession::new(policy, cancel, IouTracker::new(0.3, 30))
}

fn network_policy() -> FailurePolicy {
    FailurePolicy::network_camera(Duration::ZERO, None)
}

#[test]
fn test_local_camera_stops_at_failed_read() -> anyhow::Result<()> {
    let mut source = ScriptedSource::failing_at(3, 6);
    let mut detector = FakeDetector::default();
    let mut sink = CollectingSink::default();
    let mut session = session(FailurePolicy::local_camera(), CancelFlag::new());

    let summary = session.run(&mut source, &mut detector, &Annotator::default(), &mut sink)?;

    assert_eq!(summary.reason, StopReason::ReadFailed);
    assert_eq!(summary.frames_shown, 2);
    assert_eq!(source.reads, 3, "no read after the failing one");
    assert_eq!(source.releases, 1);
    assert_eq!(session.state(), SessionState::Stopped);
    Ok(())
}

#[test]
fn test_network_camera_skips_failed_read() -> anyhow::Result<()> {
    let mut source = ScriptedSource::failing_at(3, 6);
    let mut detector = FakeDetector::default();
    let mut sink = CollectingSink::default();

    let summary = session(network_policy(), CancelFlag::new()).run(
        &mut source,
        &mut detector,
        &Annotator::default(),
        &mut sink,
    )?;

    assert_eq!(summary.reason, StopReason::SourceExhausted);
    assert_eq!(summary.frames_shown, 5);
    assert_eq!(summary.frames_skipped, 1);
    // read 4 happened after read 3 failed, then the exhausting read 7
    assert_eq!(source.reads, 7);
    assert_eq!(source.releases, 1);
    Ok(())
}

#[test]
fn test_network_camera_skips_failed_detection() -> anyhow::Result<()> {
    let mut source = ScriptedSource::frames(4);
    let mut detector = FakeDetector::failing_on(&[2]);
    let mut sink = CollectingSink::default();

    let summary = session(network_policy(), CancelFlag::new()).run(
        &mut source,
        &mut detector,
        &Annotator::default(),
        &mut sink,
    )?;

    assert_eq!(summary.frames_shown, 3);
    assert_eq!(summary.frames_skipped, 1);
    assert_eq!(detector.calls, 4);
    Ok(())
}

#[test]
fn test_local_camera_detection_failure_is_an_error() -> anyhow::Result<()> {
    let mut source = ScriptedSource::frames(4);
    let mut detector = FakeDetector::failing_on(&[2]);
    let mut sink = CollectingSink::default();
    let mut session = session(FailurePolicy::local_camera(), CancelFlag::new());

    let err = session
        .run(&mut source, &mut detector, &Annotator::default(), &mut sink)
        .expect_err("detection failure ends a local session");

    assert!(format!("{:#}", err).contains("simulated detector failure"));
    assert_eq!(source.releases, 1, "device released on the error path too");
    assert_eq!(session.state(), SessionState::Stopped);
    Ok(())
}

#[test]
fn test_consecutive_failure_cap() -> anyhow::Result<()> {
    let script = vec![ReadStep::Frame, ReadStep::Fail, ReadStep::Fail, ReadStep::Fail, ReadStep::Frame];
    let mut source = ScriptedSource::new(script);
    let mut detector = FakeDetector::default();
    let mut sink = CollectingSink::default();

    let summary = session(FailurePolicy::network_camera(Duration::ZERO, Some(2)), CancelFlag::new())
        .run(&mut source, &mut detector, &Annotator::default(), &mut sink)?;

    assert_eq!(summary.reason, StopReason::FailureLimit);
    assert_eq!(summary.frames_shown, 1);
    assert_eq!(summary.frames_skipped, 2);
    assert_eq!(source.reads, 3);
    Ok(())
}

#[test]
fn test_cancel_is_checked_before_each_read() -> anyhow::Result<()> {
    let cancel = CancelFlag::new();
    let mut source = ScriptedSource::frames(100).cancelling_after(3, cancel.clone());
    let mut detector = FakeDetector::default();
    let mut sink = CollectingSink::default();

    let summary = session(FailurePolicy::local_camera(), cancel).run(
        &mut source,
        &mut detector,
        &Annotator::default(),
        &mut sink,
    )?;

    // the third frame is still shown; the flag is seen at the top of the next iteration
    assert_eq!(summary.reason, StopReason::Cancelled);
    assert_eq!(summary.frames_shown, 3);
    assert_eq!(source.reads, 3);
    assert_eq!(source.releases, 1);
    Ok(())
}

#[test]
fn test_cancelled_before_start_reads_nothing() -> anyhow::Result<()> {
    let cancel = CancelFlag::new();
    cancel.cancel();
    let mut source = ScriptedSource::frames(5);
    let mut detector = FakeDetector::default();
    let mut sink = CollectingSink::default();

    let summary = session(FailurePolicy::local_camera(), cancel).run(
        &mut source,
        &mut detector,
        &Annotator::default(),
        &mut sink,
    )?;

    assert_eq!(summary.reason, StopReason::Cancelled);
    assert_eq!(source.reads, 0);
    assert_eq!(source.releases, 1);
    Ok(())
}

#[test]
fn test_sink_sees_tracked_frames_and_fps() -> anyhow::Result<()> {
    let mut source = ScriptedSource::frames(3);
    let mut detector = FakeDetector::default();
    let mut sink = CollectingSink::default();

    session(FailurePolicy::local_camera(), CancelFlag::new()).run(
        &mut source,
        &mut detector,
        &Annotator::default(),
        &mut sink,
    )?;

    assert_eq!(sink.frames.len(), 3);
    let indices: Vec<u64> = sink.frames.iter().map(|f| f.0).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert_eq!(sink.frames[0].1, 0.0, "first frame has no FPS estimate");
    assert!(sink.frames.iter().all(|f| f.1 >= 0.0));
    // the same box on every frame keeps one identity
    assert!(sink.frames.iter().all(|f| f.2 == Some(1)));
    Ok(())
}

#[test]
fn test_session_runs_once() -> anyhow::Result<()> {
    let mut session = session(FailurePolicy::local_camera(), CancelFlag::new());
    let mut detector = FakeDetector::default();
    let mut sink = CollectingSink::default();
    session.run(&mut ScriptedSource::frames(1), &mut detector, &Annotator::default(), &mut sink)?;

    let mut second = ScriptedSource::frames(1);
    assert!(
        session
            .run(&mut second, &mut detector, &Annotator::default(), &mut sink)
            .is_err()
    );
    assert_eq!(second.reads, 0);
    Ok(())
}

#[test]
fn test_zero_frame_limit_reads_nothing() -> anyhow::Result<()> {
    let cancel = CancelFlag::new();
    let mut source = ScriptedSource::frames(5);
    let mut detector = FakeDetector::default();
    let mut limited = FrameLimit::new(CollectingSink::default(), 0, cancel.clone());

    let summary = session(FailurePolicy::local_camera(), cancel).run(
        &mut source,
        &mut detector,
        &Annotator::default(),
        &mut limited,
    )?;

    assert_eq!(summary.reason, StopReason::Cancelled);
    assert_eq!(summary.frames_shown, 0);
    assert_eq!(source.reads, 0);
    assert!(limited.into_inner().frames.is_empty());
    Ok(())
}

#[test]
fn test_frame_limit_stops_after_n_frames() -> anyhow::Result<()> {
    let cancel = CancelFlag::new();
    let mut source = ScriptedSource::frames(10);
    let mut detector = FakeDetector::default();
    let mut limited = FrameLimit::new(CollectingSink::default(), 4, cancel.clone());

    let summary = session(FailurePolicy::local_camera(), cancel).run(
        &mut source,
        &mut detector,
        &Annotator::default(),
        &mut limited,
    )?;

    assert_eq!(summary.reason, StopReason::Cancelled);
    assert_eq!(summary.frames_shown, 4);
    assert_eq!(limited.into_inner().frames.len(), 4);
    Ok(())
}
