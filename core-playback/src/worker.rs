//! # Decode Worker
//!
//! One OS thread per decode pass. The worker pulls frames from the line's
//! pipeline and writes them to the sink until the transport says stop, the
//! frame limit is reached or the stream ends.
//!
//! ```text
//! ┌──────────── per frame ─────────────┐
//! │ 1. check transport (state, limit)  │
//! │ 2. pipeline.next_frame()           │
//! │ 3. sink.write() unless silent      │  <- blocks at playback speed
//! │ 4. frames_processed += 1           │
//! └────────────────────────────────────┘
//! ```
//!
//! Neither lock is held across the sink write, so `stop()` can always flip
//! the state while the worker waits on the device. Cancellation is checked
//! once per frame.
//!
//! When a pass ends naturally and the loop target wants another one, the
//! exiting worker restarts the pipeline and spawns its successor itself. The
//! live-worker count is handed over unchanged so the controller never sees
//! the line idle in between. Pass events are published before the transport
//! lock is released, so subscribers see them in order.
//!
//! A frame the sink rejected goes back to the pipeline uncounted, so the
//! next pass starts by writing it. A one-shot line drops its pipeline once a
//! pass has consumed the stream, whether it ended cleanly or not.

use crate::decoder::SampleConverter;
use crate::error::{PlaybackError, Result};
use crate::line::LineShared;
use crate::state::{PlayUntil, PlaybackState, TransportState};
use core_runtime::events::{LineEvent, StopReason};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info, instrument, trace, warn};

pub(crate) struct DecodeWorker {
    shared: Arc<LineShared>,
}

impl DecodeWorker {
    /// Spawn a worker thread for the pass the transport was just set up for.
    ///
    /// The caller must already have counted it in `live_workers`.
    pub(crate) fn spawn(shared: Arc<LineShared>) -> Result<()> {
        let name = format!("clip-line-{}", shared.id);
        thread::Builder::new()
            .name(name)
            .spawn(move || DecodeWorker { shared }.run())
            .map(|_| ())
            .map_err(|e| {
                error!("Failed to spawn decode worker: {}", e);
                PlaybackError::Internal(format!("failed to spawn decode worker: {}", e))
            })
    }

    #[instrument(skip(self), fields(line_id = %self.shared.id))]
    fn run(self) {
        debug!("Decode worker running");
        let reason = self.decode_loop();
        self.finish(reason);
    }

    fn decode_loop(&self) -> StopReason {
        loop {
            let silent = {
                let transport = self.shared.transport.lock();
                if !transport.state.is_active() {
                    return StopReason::Requested;
                }
                if !transport.limit.allows(transport.frames_processed) {
                    return StopReason::FrameLimit;
                }
                transport.silent
            };

            let next = match self.shared.pipeline.lock().as_mut() {
                Some(pipeline) => pipeline.next_frame(),
                None => return StopReason::Requested,
            };

            let frame = match next {
                Ok(Some(frame)) => frame,
                Ok(None) => return StopReason::EndOfStream,
                Err(e) => {
                    error!("Decoding error: {}", e);
                    self.record_error(&e);
                    return StopReason::DecodeFailure;
                }
            };

            if !silent {
                let pcm = SampleConverter::to_le_bytes(&frame.samples);
                if let Err(e) = self.write_all(&pcm) {
                    error!("Sink write failed: {}", e);
                    if let Some(pipeline) = self.shared.pipeline.lock().as_mut() {
                        pipeline.unread(frame);
                    }
                    self.record_error(&e);
                    return StopReason::SinkFailure;
                }
            }

            let mut transport = self.shared.transport.lock();
            transport.frames_processed += 1;
            trace!(frames = transport.frames_processed, silent, "Frame processed");
        }
    }

    /// Write one frame, blocking until the sink has taken every byte.
    fn write_all(&self, mut pcm: &[u8]) -> Result<()> {
        while !pcm.is_empty() {
            let written = self.shared.sink.write(pcm)?;
            if written == 0 {
                return Err(PlaybackError::LineUnavailable(
                    "sink accepted no data".to_string(),
                ));
            }
            pcm = &pcm[written.min(pcm.len())..];
        }
        Ok(())
    }

    fn record_error(&self, err: &PlaybackError) {
        let message = err.to_string();
        self.shared.transport.lock().last_error = Some(message.clone());
        self.shared.emit(LineEvent::Error {
            line_id: self.shared.id,
            message,
        });
    }

    fn finish(self, reason: StopReason) {
        let shared = &self.shared;
        let id = shared.id;
        let mut events = Vec::new();
        let mut transport = shared.transport.lock();
        let frames_processed = transport.frames_processed;

        events.push(LineEvent::Stopped {
            line_id: id,
            reason,
            frames_processed,
        });

        match reason {
            StopReason::EndOfStream | StopReason::DecodeFailure => {
                let first_length = transport.total_frames.is_none();
                {
                    let mut pipeline = shared.pipeline.lock();
                    if let Some(consumed) = pipeline.as_ref().map(|p| p.bytes_consumed()) {
                        transport.stream_bytes = Some(consumed);
                    }
                    if !shared.replay {
                        debug!("One-shot stream consumed, releasing decoder");
                        *pipeline = None;
                    }
                }
                let wants_another = transport.complete_pass();
                if wants_another && !shared.replay {
                    debug!("Loop target ignored, stream cannot be replayed");
                }
                let again = wants_another && shared.replay;
                info!(
                    frames = frames_processed,
                    pass = transport.loop_count,
                    ?reason,
                    "Pass complete"
                );
                if first_length {
                    events.push(LineEvent::LengthKnown {
                        line_id: id,
                        total_frames: frames_processed,
                    });
                }
                events.push(LineEvent::LoopCompleted {
                    line_id: id,
                    count: transport.loop_count,
                });

                if again {
                    match self.continue_loop(&mut transport) {
                        Ok(silent) => {
                            events.push(LineEvent::Started {
                                line_id: id,
                                silent,
                            });
                            shared.emit_all(events);
                            return;
                        }
                        Err(e) => {
                            warn!("Loop restart failed: {}", e);
                            transport.state = PlaybackState::Stopped;
                            transport.last_error = Some(e.to_string());
                            events.push(LineEvent::Error {
                                line_id: id,
                                message: e.to_string(),
                            });
                        }
                    }
                }
            }
            StopReason::FrameLimit => {
                debug!(frames = frames_processed, "Frame limit reached");
                transport.reach_limit();
            }
            StopReason::SinkFailure => transport.state = PlaybackState::Stopped,
            StopReason::Requested => debug!(frames = frames_processed, "Stop requested"),
        }

        transport.live_workers = transport.live_workers.saturating_sub(1);
        // Published under the lock so a successor's events cannot overtake.
        shared.emit_all(events);
        shared.worker_exited.notify_all();
    }

    /// Rewind for the next loop pass and hand over to a new worker.
    ///
    /// Returns whether the new pass is silent.
    fn continue_loop(&self, transport: &mut TransportState) -> Result<bool> {
        {
            let mut pipeline = self.shared.pipeline.lock();
            let pipeline = pipeline
                .as_mut()
                .ok_or_else(|| PlaybackError::LineUnavailable("line is closed".to_string()))?;
            pipeline.restart()?;
        }
        transport.rewound();
        let silent = transport.silent;
        transport.begin(PlayUntil::End, silent);
        DecodeWorker::spawn(Arc::clone(&self.shared))?;
        Ok(silent)
    }
}
