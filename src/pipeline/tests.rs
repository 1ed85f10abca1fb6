//! Processing-loop behavior tests over synthetic sources.

#![cfg(test)]

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::error::StrideResult;
use crate::frame::{Rotation, SharedRotation};
use crate::testutil::{
    CountingAnnotator, FailingAnnotator, StopAfterAnnotator, SyntheticSource,
};

use super::*;

fn drain(session: &ProcessingSession) -> (Vec<ProgressUpdate>, Vec<u64>, Option<SessionState>) {
    let mut progress = Vec::new();
    let mut previews = Vec::new();
    let mut terminal = None;
    while let Ok(event) = session.events().recv_timeout(Duration::from_secs(5)) {
        match event {
            PipelineEvent::Progress(update) => progress.push(update),
            PipelineEvent::Preview(frame) => previews.push(frame.frame_number),
            PipelineEvent::Finished(state) => {
                terminal = Some(state);
                break;
            }
        }
    }
    (progress, previews, terminal)
}

#[test]
fn test_bounded_session_runs_to_completion() {
    // 100 frames at 30 fps, start=0, end=100, identity annotator
    let source = SyntheticSource::bounded(100).with_fps(30.0);
    let session = ProcessingSession::start(
        SessionInput::Supplied(Box::new(source)),
        Box::new(crate::annotate::IdentityAnnotator),
        SessionConfig::default(),
        30.0,
    );

    let (progress, previews, terminal) = drain(&session);
    assert_eq!(terminal, Some(SessionState::Completed));
    assert_eq!(previews.len(), 100);

    let report = session.wait();
    assert_eq!(report.state, SessionState::Completed);
    assert_eq!(report.frames.len(), 100);
    assert_eq!(report.fps, 30.0);

    // buffer holds frames in original order
    for (i, frame) in report.frames.iter().enumerate() {
        assert_eq!(frame.frame_number, i as u64);
        assert_eq!(frame.data[0], (i % 251) as u8);
    }

    // progress is monotonically non-decreasing and ends at exactly 100
    let percents: Vec<u8> = progress
        .iter()
        .map(|p| match p {
            ProgressUpdate::Percent(v) => *v,
            other => panic!("bounded session published {:?}", other),
        })
        .collect();
    assert_eq!(percents.len(), 100);
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(*percents.last().unwrap(), 100);
}

#[test]
fn test_cancel_at_frame_k_keeps_k_frames() {
    // The annotator sets the stop flag while frame 7 is in flight; the loop
    // observes it at the next iteration boundary, so exactly 7 frames land
    // in the buffer.
    let control = PipelineControl::new();
    let annotator = StopAfterAnnotator::new(std::sync::Arc::clone(&control), 7);
    let session = ProcessingSession::start_with_control(
        SessionInput::Supplied(Box::new(SyntheticSource::bounded(100))),
        Box::new(annotator),
        SessionConfig::default(),
        30.0,
        control,
    );

    let report = session.wait();
    assert_eq!(report.state, SessionState::Cancelled);
    assert_eq!(report.frames.len(), 7);
}

#[test]
fn test_pause_then_resume_completes() {
    // Slow reads keep the worker mid-run while the pause lands.
    let source = SyntheticSource::bounded(200).with_read_delay(Duration::from_millis(5));
    let session = ProcessingSession::start(
        SessionInput::Supplied(Box::new(source)),
        Box::new(CountingAnnotator::new()),
        SessionConfig::default(),
        30.0,
    );

    session.pause();

    // Drain until the worker settles at the pause gate (at most the one
    // in-flight frame arrives after the pause call).
    let mut drained = 0;
    while session
        .events()
        .recv_timeout(Duration::from_millis(200))
        .is_ok()
    {
        drained += 1;
    }
    assert!(drained < 200, "worker ignored the pause");

    // Paused: the counter no longer advances, so no further events arrive.
    assert!(session
        .events()
        .recv_timeout(Duration::from_millis(150))
        .is_err());
    assert!(!session.is_finished());
    assert_eq!(session.state(), SessionState::Paused);

    session.resume();
    let report = session.wait();
    assert_eq!(report.state, SessionState::Completed);
    assert_eq!(report.frames.len(), 200);
}

#[test]
fn test_live_annotator_failure_reports_reason_and_empty_buffer() {
    let source = SyntheticSource::live();
    let session = ProcessingSession::start(
        SessionInput::Supplied(Box::new(source)),
        Box::new(FailingAnnotator::new(5, "tensor shape mismatch")),
        SessionConfig::default(),
        30.0,
    );

    let (_, previews, terminal) = drain(&session);
    match terminal {
        Some(SessionState::Failed { reason }) => {
            assert!(reason.contains("tensor shape mismatch"), "reason: {}", reason)
        }
        other => panic!("expected Failed, got {:?}", other),
    }
    // 4 frames were annotated before the failure, none buffered
    assert_eq!(previews.len(), 4);

    let report = session.wait();
    assert!(report.frames.is_empty());
    assert!(report.source.is_some());
}

#[test]
fn test_live_session_respects_end_cap_and_reports_frame_counts() {
    let source = SyntheticSource::live().with_transient_failures(&[1, 3]);
    let config = SessionConfig {
        end_frame: Some(5),
        ..SessionConfig::default()
    };
    let session = ProcessingSession::start(
        SessionInput::Supplied(Box::new(source)),
        Box::new(CountingAnnotator::new()),
        config,
        30.0,
    );

    let (progress, _, terminal) = drain(&session);
    assert_eq!(terminal, Some(SessionState::Completed));

    // transient grab failures were retried, not treated as end-of-stream
    let lives: Vec<u64> = progress
        .iter()
        .map(|p| match p {
            ProgressUpdate::Live { frames } => *frames,
            other => panic!("live session published {:?}", other),
        })
        .collect();
    assert_eq!(lives, vec![1, 2, 3, 4, 5]);

    let report = session.wait();
    assert!(report.frames.is_empty());
}

#[test]
fn test_early_end_of_stream_completes_with_partial_buffer() {
    let source = SyntheticSource::bounded(10);
    let config = SessionConfig {
        end_frame: Some(20),
        ..SessionConfig::default()
    };
    let session = ProcessingSession::start(
        SessionInput::Supplied(Box::new(source)),
        Box::new(CountingAnnotator::new()),
        config,
        30.0,
    );

    let report = session.wait();
    assert_eq!(report.state, SessionState::Completed);
    assert_eq!(report.frames.len(), 10);
}

#[test]
fn test_start_offset_seeks_before_processing() {
    let source = SyntheticSource::bounded(10);
    let config = SessionConfig {
        start_frame: 4,
        ..SessionConfig::default()
    };
    let session = ProcessingSession::start(
        SessionInput::Supplied(Box::new(source)),
        Box::new(CountingAnnotator::new()),
        config,
        30.0,
    );

    let (progress, _, _) = drain(&session);
    let report = session.wait();
    assert_eq!(report.state, SessionState::Completed);
    assert_eq!(report.frames.len(), 6);
    assert_eq!(report.frames[0].frame_number, 4);

    if let Some(ProgressUpdate::Percent(last)) = progress.last() {
        assert_eq!(*last, 100);
    } else {
        panic!("no progress published");
    }
}

#[test]
fn test_rotation_applies_before_annotation() {
    let source = SyntheticSource::bounded(3); // 16x8 frames
    let config = SessionConfig {
        rotation: SharedRotation::new(Rotation::Cw90),
        ..SessionConfig::default()
    };
    let session = ProcessingSession::start(
        SessionInput::Supplied(Box::new(source)),
        Box::new(CountingAnnotator::new()),
        config,
        30.0,
    );

    let report = session.wait();
    assert_eq!(report.state, SessionState::Completed);
    // width and height swapped by the 90-degree rotation
    assert_eq!(report.frames[0].width, 8);
    assert_eq!(report.frames[0].height, 16);
}

#[test]
fn test_supplied_source_is_returned_not_released() {
    let source = SyntheticSource::bounded(5);
    let released = source.release_flag();
    let session = ProcessingSession::start(
        SessionInput::Supplied(Box::new(source)),
        Box::new(CountingAnnotator::new()),
        SessionConfig::default(),
        30.0,
    );

    let report = session.wait();
    assert_eq!(report.state, SessionState::Completed);
    assert!(report.source.is_some());
    assert!(!released.load(Ordering::SeqCst));
}

#[test]
fn test_unopenable_path_fails_session() {
    let session = ProcessingSession::start(
        SessionInput::Path(PathBuf::from("/definitely/missing/video.mp4")),
        Box::new(CountingAnnotator::new()),
        SessionConfig::default(),
        30.0,
    );

    let report = session.wait();
    match report.state {
        SessionState::Failed { reason } => assert!(reason.contains("missing/video.mp4")),
        other => panic!("expected Failed, got {:?}", other),
    }
    assert!(report.frames.is_empty());
    assert!(report.source.is_none());
}

#[test]
fn test_preview_can_be_disabled() {
    let source = SyntheticSource::bounded(5);
    let config = SessionConfig {
        preview: false,
        ..SessionConfig::default()
    };
    let session = ProcessingSession::start(
        SessionInput::Supplied(Box::new(source)),
        Box::new(CountingAnnotator::new()),
        config,
        30.0,
    );

    let (progress, previews, terminal) = drain(&session);
    assert_eq!(terminal, Some(SessionState::Completed));
    assert!(previews.is_empty());
    assert_eq!(progress.len(), 5);
    session.wait();
}

#[test]
fn test_graceful_stop_returns_partial_report() {
    let source = SyntheticSource::bounded(10_000).with_read_delay(Duration::from_millis(5));
    let session = ProcessingSession::start(
        SessionInput::Supplied(Box::new(source)),
        Box::new(CountingAnnotator::new()),
        SessionConfig::default(),
        30.0,
    );

    std::thread::sleep(Duration::from_millis(50));
    let report = session
        .stop(Duration::from_secs(5))
        .expect("worker should acknowledge stop within the timeout");
    assert_eq!(report.state, SessionState::Cancelled);
    assert!(!report.frames.is_empty());
    assert!(report.frames.len() < 10_000);
}

#[test]
fn test_stop_timeout_abandons_blocked_worker() {
    struct StuckSource;
    impl crate::capture::CaptureSource for StuckSource {
        fn read(&mut self) -> StrideResult<crate::capture::ReadOutcome> {
            std::thread::sleep(Duration::from_millis(500));
            Ok(crate::capture::ReadOutcome::Again)
        }
        fn seek(&mut self, _: u64) -> StrideResult<()> {
            Ok(())
        }
        fn frame_count(&self) -> Option<u64> {
            None
        }
        fn frame_rate(&self) -> f64 {
            30.0
        }
        fn dimensions(&self) -> (u32, u32) {
            (16, 8)
        }
        fn release(&mut self) {}
    }

    let session = ProcessingSession::start(
        SessionInput::Supplied(Box::new(StuckSource)),
        Box::new(CountingAnnotator::new()),
        SessionConfig::default(),
        30.0,
    );

    // Give the worker time to enter its long blocking read, then stop with a
    // deadline far shorter than the read.
    std::thread::sleep(Duration::from_millis(30));
    assert!(session.stop(Duration::from_millis(50)).is_none());
}
