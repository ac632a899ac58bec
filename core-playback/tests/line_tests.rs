mod common;

use common::*;
use core_playback::{LoopCount, PlayUntil, PlaybackError, PlaybackState};
use core_runtime::events::{LineEvent, StopReason};
use std::thread;
use std::time::Duration;

#[test]
fn test_full_pass_learns_length() {
    let sink = RecordingSink::new();
    let line = build_line(counting_stream(10), sink.clone(), true);
    assert_eq!(line.frame_length(), None);
    assert_eq!(line.microsecond_length(), None);

    line.open().unwrap();
    line.start().unwrap();
    wait_until_stopped(&line);

    assert_eq!(line.frame_length(), Some(10));
    assert_eq!(line.frame_position(), 10);
    assert!(line.is_finished());
    assert_eq!(line.state(), PlaybackState::Stopped);
    assert_eq!(sink.samples(), (0..10).collect::<Vec<i16>>());
}

#[test]
fn test_microsecond_length_uses_first_bitrate() {
    let sink = RecordingSink::new();
    let line = build_line(counting_stream(10), sink, true);
    line.start_silent().unwrap();
    wait_until_stopped(&line);

    // 10 bytes at 8000 bit/s
    assert_eq!(line.microsecond_length(), Some(10_000));
    assert_eq!(line.microsecond_position(), Some(10_000));
}

#[test]
fn test_loop_plays_exact_number_of_passes() {
    let sink = RecordingSink::new();
    let line = build_line(counting_stream(10), sink.clone(), true);
    let mut rx = line.subscribe();
    line.open().unwrap();
    line.start().unwrap();
    collect_until(&mut rx, |e| matches!(e, LineEvent::LoopCompleted { .. }));
    wait_until_stopped(&line);
    sink.clear();

    line.loop_playback(LoopCount::Times(3)).unwrap();
    let events = collect_until(&mut rx, |e| {
        matches!(e, LineEvent::LoopCompleted { count: 3, .. })
    });
    wait_until_stopped(&line);

    let completions = events
        .iter()
        .filter(|e| matches!(e, LineEvent::LoopCompleted { .. }))
        .count();
    assert_eq!(completions, 3);
    assert_eq!(line.loop_count(), 3);
    assert_eq!(sink.write_count(), 30);
    assert!(line.is_finished());
}

#[test]
fn test_continuous_loop_keeps_going_until_stopped() {
    let sink = RecordingSink::new();
    let line = build_line(counting_stream(4), sink.clone(), true);
    line.open().unwrap();

    let mut rx = line.subscribe();
    line.loop_playback(LoopCount::Continuously).unwrap();
    collect_until(&mut rx, |e| {
        matches!(e, LineEvent::LoopCompleted { count, .. } if *count >= 5)
    });
    assert!(line.is_active());

    line.stop();
    assert!(!line.is_active());
    assert_eq!(line.loop_count(), 0);
    assert!(sink.write_count() >= 20);
}

#[test]
fn test_seek_then_start_resumes_at_target() {
    let sink = RecordingSink::new();
    let line = build_line(counting_stream(10), sink.clone(), true);
    line.open().unwrap();

    line.set_frame_position(5).unwrap();
    assert_eq!(line.frame_position(), 5);
    assert_eq!(line.state(), PlaybackState::Stopped);
    assert_eq!(line.frame_length(), Some(10));
    // Both the length probe and the skip are silent.
    assert_eq!(sink.write_count(), 0);

    line.start().unwrap();
    wait_until_stopped(&line);
    assert_eq!(sink.samples(), vec![5, 6, 7, 8, 9]);
    assert_eq!(line.frame_position(), 10);
}

#[test]
fn test_seek_to_zero_and_end() {
    let sink = RecordingSink::new();
    let line = build_line(counting_stream(6), sink.clone(), true);
    line.open().unwrap();

    line.set_frame_position(6).unwrap();
    line.start().unwrap();
    wait_until_stopped(&line);
    assert_eq!(sink.write_count(), 0);

    line.set_frame_position(0).unwrap();
    line.start().unwrap();
    wait_until_stopped(&line);
    assert_eq!(sink.samples(), vec![0, 1, 2, 3, 4, 5]);
}

#[test]
fn test_seek_out_of_bounds() {
    let line = build_line(counting_stream(10), RecordingSink::new(), true);
    match line.set_frame_position(11) {
        Err(PlaybackError::SeekOutOfBounds { requested, total }) => {
            assert_eq!(requested, 11);
            assert_eq!(total, 10);
        }
        other => panic!("expected out of bounds, got {:?}", other),
    }
    assert_eq!(line.state(), PlaybackState::Stopped);
}

#[test]
fn test_seek_without_replay_is_unsupported() {
    let sink = RecordingSink::new();
    let line = build_line(counting_stream(10), sink.clone(), false);
    line.open().unwrap();

    let result = line.set_frame_position(3);
    assert!(matches!(result, Err(PlaybackError::Unsupported(_))));
    assert_eq!(line.state(), PlaybackState::Stopped);
    assert_eq!(line.frame_position(), 0);
    assert_eq!(line.frame_length(), None);
    assert_eq!(sink.write_count(), 0);
    assert!(line.seekable().is_none());
}

#[test]
fn test_no_writes_after_stop_returns() {
    let sink = RecordingSink::paced(Duration::from_millis(2));
    let line = build_line(vec![7u8; 200], sink.clone(), false);
    line.open().unwrap();
    line.start().unwrap();
    thread::sleep(Duration::from_millis(20));

    line.stop();
    let written = sink.write_count();
    assert!(written < 200);
    assert_eq!(line.state(), PlaybackState::Stopped);
    assert!(sink.stops() >= 1);

    thread::sleep(Duration::from_millis(20));
    assert_eq!(sink.write_count(), written);
}

#[test]
fn test_stop_then_start_continues_position() {
    let sink = RecordingSink::paced(Duration::from_millis(1));
    let line = build_line(counting_stream(100), sink.clone(), false);
    line.open().unwrap();
    line.start().unwrap();
    thread::sleep(Duration::from_millis(10));
    line.stop();

    let position = line.frame_position();
    assert_eq!(sink.write_count() as u64, position);

    line.start().unwrap();
    wait_until_stopped(&line);
    assert_eq!(sink.samples(), (0..100).collect::<Vec<i16>>());
}

#[test]
fn test_finished_one_shot_line_ignores_start() {
    let sink = RecordingSink::new();
    let line = build_line(counting_stream(3), sink.clone(), false);
    line.open().unwrap();
    line.start().unwrap();
    wait_until_stopped(&line);
    assert!(line.is_finished());

    line.start().unwrap();
    assert!(!line.is_active());
    assert_eq!(sink.write_count(), 3);
}

#[test]
fn test_finished_replay_line_restarts_from_zero() {
    let sink = RecordingSink::new();
    let line = build_line(counting_stream(3), sink.clone(), true);
    line.open().unwrap();
    line.start().unwrap();
    wait_until_stopped(&line);
    line.start().unwrap();
    wait_until_stopped(&line);
    assert_eq!(sink.samples(), vec![0, 1, 2, 0, 1, 2]);
}

#[test]
fn test_frame_limit_stops_early() {
    let sink = RecordingSink::new();
    let line = build_line(counting_stream(10), sink.clone(), false);
    line.open().unwrap();
    line.start_until(PlayUntil::Frame(4)).unwrap();
    wait_until_stopped(&line);

    assert_eq!(sink.samples(), vec![0, 1, 2, 3]);
    assert!(!line.is_finished());
    assert_eq!(line.frame_length(), None);
}

#[test]
fn test_decode_failure_ends_pass_and_is_recorded() {
    let sink = RecordingSink::new();
    let line = build_line(vec![0, 1, 2, CORRUPT, 4], sink.clone(), false);
    let mut rx = line.subscribe();
    line.open().unwrap();
    line.start().unwrap();

    let events = collect_until(&mut rx, |e| matches!(e, LineEvent::Stopped { .. }));
    wait_until_stopped(&line);

    assert!(events.iter().any(|e| matches!(e, LineEvent::Error { .. })));
    assert!(matches!(
        events.last(),
        Some(LineEvent::Stopped {
            reason: StopReason::DecodeFailure,
            frames_processed: 3,
            ..
        })
    ));
    assert!(line.is_finished());
    assert_eq!(sink.samples(), vec![0, 1, 2]);
    assert!(line.last_error().unwrap().contains("bad frame"));
}

#[test]
fn test_format_change_is_a_decode_failure() {
    let sink = RecordingSink::new();
    let line = build_line(vec![0, 1, RATE_CHANGE, 3], sink.clone(), false);
    line.open().unwrap();
    line.start().unwrap();
    wait_until_stopped(&line);

    assert_eq!(sink.samples(), vec![0, 1]);
    assert!(line.last_error().is_some());
}

#[test]
fn test_sink_failure_stops_line() {
    let sink = RecordingSink::failing_after(2);
    let line = build_line(counting_stream(10), sink.clone(), false);
    let mut rx = line.subscribe();
    line.open().unwrap();
    line.start().unwrap();

    collect_until(&mut rx, |e| {
        matches!(
            e,
            LineEvent::Stopped {
                reason: StopReason::SinkFailure,
                ..
            }
        )
    });
    wait_until_stopped(&line);
    assert!(!line.is_finished());
    assert!(line.last_error().is_some());
    assert_eq!(sink.write_count(), 2);
}

#[test]
fn test_rejected_frame_is_written_on_next_start() {
    let sink = RecordingSink::rejecting_once_at(2);
    let line = build_line(counting_stream(10), sink.clone(), true);
    line.open().unwrap();
    line.start().unwrap();
    wait_until_stopped(&line);

    assert_eq!(sink.samples(), vec![0, 1]);
    assert_eq!(line.frame_position(), 2);
    assert!(line.last_error().is_some());

    line.start().unwrap();
    wait_until_stopped(&line);
    assert_eq!(sink.samples(), (0..10).collect::<Vec<i16>>());
    assert_eq!(line.frame_length(), Some(10));

    line.set_frame_position(10).unwrap();
    assert_eq!(line.frame_position(), 10);
}

#[test]
fn test_loop_without_replay_plays_one_pass() {
    let sink = RecordingSink::new();
    let line = build_line(counting_stream(5), sink.clone(), false);
    let mut rx = line.subscribe();
    line.open().unwrap();

    line.loop_playback(LoopCount::Times(3)).unwrap();
    let events = collect_until(&mut rx, |e| matches!(e, LineEvent::LoopCompleted { .. }));
    wait_until_stopped(&line);

    assert!(!events.iter().any(|e| matches!(e, LineEvent::Error { .. })));
    assert_eq!(sink.samples(), vec![0, 1, 2, 3, 4]);
    assert_eq!(line.loop_count(), 1);
    assert!(line.is_finished());
    assert_eq!(line.last_error(), None);

    // Nothing left to play.
    line.loop_playback(LoopCount::Continuously).unwrap();
    assert!(!line.is_active());
    assert_eq!(sink.write_count(), 5);
}

#[tokio::test]
async fn test_events_can_be_awaited() {
    let line = build_line(counting_stream(3), RecordingSink::new(), true);
    let mut rx = line.subscribe();
    line.start_silent().unwrap();

    let mut seen = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("event within timeout")
            .unwrap();
        let done = matches!(event, LineEvent::LoopCompleted { .. });
        seen.push(event);
        if done {
            break;
        }
    }

    assert!(matches!(seen[0], LineEvent::Started { silent: true, .. }));
    assert!(seen.iter().any(|e| matches!(
        e,
        LineEvent::Stopped {
            reason: StopReason::EndOfStream,
            frames_processed: 3,
            ..
        }
    )));
    assert!(seen
        .iter()
        .any(|e| matches!(e, LineEvent::LengthKnown { total_frames: 3, .. })));
}

#[test]
fn test_event_order_for_one_pass() {
    let line = build_line(counting_stream(2), RecordingSink::new(), true);
    let mut rx = line.subscribe();
    line.open().unwrap();
    line.start().unwrap();

    let events = collect_until(&mut rx, |e| matches!(e, LineEvent::LoopCompleted { .. }));
    let kinds: Vec<&str> = events.iter().map(|e| e.description()).collect();
    assert_eq!(
        kinds,
        vec![
            "Line opened",
            "Decoding started",
            "Decoding stopped",
            "Stream length known",
            "Loop pass completed",
        ]
    );
}

#[test]
fn test_close_releases_sink_once() {
    let sink = RecordingSink::paced(Duration::from_millis(1));
    let line = build_line(counting_stream(50), sink.clone(), true);
    line.open().unwrap();
    line.start().unwrap();

    line.close();
    line.close();
    assert!(!line.is_active());
    assert!(!line.is_open());
    assert_eq!(sink.closes(), 1);
    assert!(matches!(line.start(), Err(PlaybackError::LineUnavailable(_))));
}

#[test]
fn test_drop_closes_line() {
    let sink = RecordingSink::new();
    {
        let line = build_line(counting_stream(5), sink.clone(), false);
        line.open().unwrap();
    }
    assert_eq!(sink.closes(), 1);
}
