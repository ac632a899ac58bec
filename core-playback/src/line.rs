//! # Audio Line
//!
//! The clip-like facade over the whole engine: a probed stream, one output
//! sink and at most one decode worker at a time.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let line = AudioLine::builder(File::open("hit.mp3")?, sink)
//!     .config(LineConfig::clip())
//!     .build()?;
//!
//! line.open()?;
//! line.loop_playback(LoopCount::Times(3))?;
//! line.drain()?;
//! line.set_frame_position(40)?;
//! line.start()?;
//! ```
//!
//! ## Locking
//!
//! `transport` guards every transport field; `pipeline` guards the byte
//! source and codec. When both are needed, `transport` is taken first. The
//! decode worker never holds either while it writes to the sink.

use crate::config::LineConfig;
use crate::error::{PlaybackError, Result};
use crate::pipeline::FrameDecodePipeline;
use crate::source::ByteSource;
use crate::state::{LoopCount, PlayUntil, PlaybackState, TransportState};
use crate::traits::{AudioCodec, CodecProvider, FormatNegotiable, Seekable, Transport};
use crate::worker::DecodeWorker;
use bridge_traits::playback::{AudioSink, LineId, PcmFormat};
use core_runtime::config::EngineConfig;
use core_runtime::events::{EventBus, LineEvent, Receiver};
use parking_lot::{Condvar, Mutex};
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Gain settings cached on the line and pushed to the sink on `open()`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Gain {
    volume: f32,
    balance: f32,
    muted: bool,
}

impl Default for Gain {
    fn default() -> Self {
        Self {
            volume: 1.0,
            balance: 0.0,
            muted: false,
        }
    }
}

/// State shared between the controlling side and decode workers.
pub(crate) struct LineShared {
    pub(crate) id: LineId,
    pub(crate) transport: Mutex<TransportState>,
    pub(crate) worker_exited: Condvar,
    /// `None` once the line is closed.
    pub(crate) pipeline: Mutex<Option<FrameDecodePipeline>>,
    pub(crate) sink: Arc<dyn AudioSink>,
    pub(crate) events: EventBus,
    format: PcmFormat,
    first_bitrate: u32,
    pub(crate) replay: bool,
    codec: AudioCodec,
    config: LineConfig,
    gain: Mutex<Gain>,
}

impl LineShared {
    pub(crate) fn emit(&self, event: LineEvent) {
        // No subscribers is not an error.
        let _ = self.events.emit(event);
    }

    pub(crate) fn emit_all(&self, events: Vec<LineEvent>) {
        for event in events {
            self.emit(event);
        }
    }
}

/// Builder for [`AudioLine`].
pub struct LineBuilder {
    reader: Box<dyn Read + Send>,
    sink: Arc<dyn AudioSink>,
    config: LineConfig,
    provider: Option<Arc<dyn CodecProvider>>,
    events: Option<EventBus>,
}

impl LineBuilder {
    pub fn config(mut self, config: LineConfig) -> Self {
        self.config = config;
        self
    }

    /// Use the audio settings and event buffer size of an engine
    /// configuration.
    pub fn engine_config(mut self, engine: &EngineConfig) -> Self {
        self.config = LineConfig::from_settings(&engine.audio);
        self.events = Some(EventBus::new(engine.event_buffer_size));
        self
    }

    /// Cache the stream so the line can rewind, seek and loop.
    pub fn replay(mut self, enabled: bool) -> Self {
        self.config.enable_replay = enabled;
        self
    }

    pub fn codec<P: CodecProvider + 'static>(mut self, provider: P) -> Self {
        self.provider = Some(Arc::new(provider));
        self
    }

    pub fn codec_provider(mut self, provider: Arc<dyn CodecProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Publish events on an existing bus instead of a private one.
    pub fn event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Probe the stream and build a stopped line.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::Config`] for an invalid configuration,
    /// [`PlaybackError::FormatUnavailable`] if no frame can be decoded.
    #[instrument(skip(self), fields(replay = self.config.enable_replay))]
    pub fn build(self) -> Result<AudioLine> {
        self.config.validate().map_err(PlaybackError::Config)?;

        let provider = match self.provider {
            Some(provider) => provider,
            None => default_provider(&self.config)?,
        };

        let source = if self.config.enable_replay {
            ByteSource::replayable(self.reader, self.config.initial_cache_bytes)
        } else {
            ByteSource::one_shot(self.reader)
        };

        let pipeline = FrameDecodePipeline::new(source, provider)?;
        let mut transport = TransportState::new();
        transport.mark_probed();

        let shared = LineShared {
            id: LineId::new(),
            format: pipeline.format(),
            first_bitrate: pipeline.first_bitrate(),
            replay: pipeline.is_replayable(),
            codec: pipeline.codec(),
            transport: Mutex::new(transport),
            worker_exited: Condvar::new(),
            pipeline: Mutex::new(Some(pipeline)),
            sink: self.sink,
            events: self.events.unwrap_or_default(),
            config: self.config,
            gain: Mutex::new(Gain::default()),
        };

        info!(
            line_id = %shared.id,
            format = %shared.format,
            codec = ?shared.codec,
            "Audio line ready"
        );

        Ok(AudioLine {
            shared: Arc::new(shared),
        })
    }
}

#[cfg(feature = "core-decoder")]
fn default_provider(config: &LineConfig) -> Result<Arc<dyn CodecProvider>> {
    Ok(Arc::new(crate::decoder::SymphoniaCodecProvider::from_config(
        config,
    )))
}

#[cfg(not(feature = "core-decoder"))]
fn default_provider(_config: &LineConfig) -> Result<Arc<dyn CodecProvider>> {
    Err(PlaybackError::Config(
        "no codec provider given and the 'core-decoder' feature is disabled".to_string(),
    ))
}

/// A streaming clip: decodes a compressed stream on a worker thread and
/// plays it through an [`AudioSink`].
///
/// Dropping the line closes it.
pub struct AudioLine {
    shared: Arc<LineShared>,
}

impl AudioLine {
    /// Start building a line over `reader`, playing through `sink`.
    pub fn builder<R: Read + Send + 'static>(reader: R, sink: Arc<dyn AudioSink>) -> LineBuilder {
        LineBuilder {
            reader: Box::new(reader),
            sink,
            config: LineConfig::default(),
            provider: None,
            events: None,
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Open the sink with the probed format and apply the cached gain.
    #[instrument(skip(self), fields(line_id = %self.shared.id))]
    pub fn open(&self) -> Result<()> {
        let mut transport = self.shared.transport.lock();
        if transport.closed {
            return Err(PlaybackError::LineUnavailable("line is closed".to_string()));
        }
        if transport.open {
            return Ok(());
        }

        self.shared
            .sink
            .open(&self.shared.format, self.shared.config.sink_buffer_frames)
            .map_err(|e| PlaybackError::LineUnavailable(e.to_string()))?;
        transport.open = true;
        drop(transport);

        let gain = *self.shared.gain.lock();
        if let Err(e) = self.apply_gain(gain) {
            warn!("Failed to apply gain on open: {}", e);
        }

        info!(format = %self.shared.format, "Line opened");
        self.shared.emit(LineEvent::Opened {
            line_id: self.shared.id,
            sample_rate: self.shared.format.sample_rate,
            channels: self.shared.format.channels,
        });
        Ok(())
    }

    /// Stop, release the sink and drop the decoder and replay cache.
    ///
    /// Idempotent. A closed line cannot be reopened.
    #[instrument(skip(self), fields(line_id = %self.shared.id))]
    pub fn close(&self) {
        let mut transport = self.shared.transport.lock();
        if transport.closed {
            return;
        }
        transport.closed = true;
        let was_active = transport.state.is_active() || transport.live_workers > 0;
        transport.request_stop();
        while transport.live_workers > 0 {
            self.shared.worker_exited.wait(&mut transport);
        }
        let was_open = transport.open;
        transport.open = false;
        transport.state = PlaybackState::Stopped;
        *self.shared.pipeline.lock() = None;
        drop(transport);

        if was_open {
            if was_active {
                if let Err(e) = self.shared.sink.stop() {
                    warn!("Sink stop failed during close: {}", e);
                }
            }
            self.shared.sink.close();
        }

        info!("Line closed");
        self.shared.emit(LineEvent::Closed {
            line_id: self.shared.id,
        });
    }

    // ------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------

    /// Play from the current position to the end of the stream.
    pub fn start(&self) -> Result<()> {
        self.start_with(PlayUntil::End, false)
    }

    /// Play from the current position until `limit`.
    pub fn start_until(&self, limit: PlayUntil) -> Result<()> {
        self.start_with(limit, false)
    }

    /// Decode to the end of the stream without writing to the sink.
    pub fn start_silent(&self) -> Result<()> {
        self.start_with(PlayUntil::End, true)
    }

    /// Start a decode pass.
    ///
    /// Does nothing if the line is already started, or if the stream is
    /// finished and replay is disabled. A finished replayable stream is
    /// restarted from frame zero.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::LineUnavailable`] if the line is closed, not open
    /// (for audible passes) or the sink refuses to start. The line stays
    /// stopped in every error case.
    #[instrument(skip(self), fields(line_id = %self.shared.id))]
    pub fn start_with(&self, limit: PlayUntil, silent: bool) -> Result<()> {
        let mut transport = self.shared.transport.lock();
        if transport.state.is_active() {
            return Ok(());
        }
        while transport.live_workers > 0 {
            self.shared.worker_exited.wait(&mut transport);
        }
        if transport.state.is_active() {
            return Ok(());
        }
        if transport.closed {
            return Err(PlaybackError::LineUnavailable("line is closed".to_string()));
        }
        if !silent && !transport.open {
            return Err(PlaybackError::LineUnavailable("line is not open".to_string()));
        }

        if transport.finished {
            if !self.shared.replay {
                debug!("Stream finished and replay is disabled, ignoring start");
                return Ok(());
            }
            self.restart_pipeline()?;
            transport.rewound();
        }

        if !silent {
            self.shared
                .sink
                .start()
                .map_err(|e| PlaybackError::LineUnavailable(e.to_string()))?;
        }

        transport.begin(limit, silent);
        transport.live_workers += 1;
        if let Err(e) = DecodeWorker::spawn(Arc::clone(&self.shared)) {
            transport.live_workers -= 1;
            transport.state = PlaybackState::Stopped;
            return Err(e);
        }
        info!(frame = transport.frames_processed, ?limit, silent, "Line started");
        self.shared.emit(LineEvent::Started {
            line_id: self.shared.id,
            silent,
        });
        Ok(())
    }

    /// Stop decoding and block until the worker has exited.
    ///
    /// Cancels any looping. No sink write happens after this returns.
    #[instrument(skip(self), fields(line_id = %self.shared.id))]
    pub fn stop(&self) {
        let mut transport = self.shared.transport.lock();
        let was_active = transport.state.is_active() || transport.live_workers > 0;
        transport.request_stop();
        while transport.live_workers > 0 {
            self.shared.worker_exited.wait(&mut transport);
        }
        let open = transport.open;
        drop(transport);

        if was_active {
            info!("Line stopped");
            if open {
                if let Err(e) = self.shared.sink.stop() {
                    warn!("Sink stop failed: {}", e);
                }
            }
        }
    }

    /// Stop, then play the stream `count` passes (or forever).
    ///
    /// Without replay the stream cannot be rewound, so at most the remaining
    /// part of one pass plays; a finished one-shot line stays silent.
    #[instrument(skip(self), fields(line_id = %self.shared.id))]
    pub fn loop_playback(&self, count: LoopCount) -> Result<()> {
        self.stop();
        {
            let mut transport = self.shared.transport.lock();
            transport.loop_count = 0;
            transport.loop_target = count;
        }
        self.start()
    }

    /// Position the line at `frame`, leaving it stopped there.
    ///
    /// The first time, this decodes the whole stream silently to learn its
    /// length. Frames before `frame` are then decoded and discarded.
    ///
    /// # Errors
    ///
    /// - [`PlaybackError::Unsupported`] without replay; nothing changes
    /// - [`PlaybackError::SeekOutOfBounds`] if `frame` is past the end
    #[instrument(skip(self), fields(line_id = %self.shared.id))]
    pub fn set_frame_position(&self, frame: u64) -> Result<()> {
        self.require_replay("seeking")?;
        self.stop();

        let cache_complete = self.shared.transport.lock().cache_complete;
        if !cache_complete {
            debug!("Reading the whole stream to learn its length");
            self.start_with(PlayUntil::End, true)?;
            self.wait_idle();
        }

        {
            let mut transport = self.shared.transport.lock();
            if transport.closed {
                return Err(PlaybackError::LineUnavailable("line is closed".to_string()));
            }
            let total = transport.total_frames.ok_or_else(|| {
                PlaybackError::Internal("stream length unknown after a full pass".to_string())
            })?;
            if frame > total {
                return Err(PlaybackError::SeekOutOfBounds {
                    requested: frame,
                    total,
                });
            }
            self.restart_pipeline()?;
            transport.rewound();
        }

        if frame > 0 {
            self.start_with(PlayUntil::Frame(frame), true)?;
            self.wait_idle();
        }

        self.shared.transport.lock().loop_count = 0;
        info!(frame, "Line positioned");
        Ok(())
    }

    /// Block until no worker is running.
    fn wait_idle(&self) {
        let mut transport = self.shared.transport.lock();
        while transport.live_workers > 0 {
            self.shared.worker_exited.wait(&mut transport);
        }
    }

    fn restart_pipeline(&self) -> Result<()> {
        let mut pipeline = self.shared.pipeline.lock();
        pipeline
            .as_mut()
            .ok_or_else(|| PlaybackError::LineUnavailable("line is closed".to_string()))?
            .restart()
    }

    fn require_replay(&self, what: &str) -> Result<()> {
        if self.shared.replay {
            Ok(())
        } else {
            Err(PlaybackError::Unsupported(format!(
                "{} requires a line built with replay",
                what
            )))
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn line_id(&self) -> LineId {
        self.shared.id
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.transport.lock().state
    }

    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    pub fn is_open(&self) -> bool {
        self.shared.transport.lock().open
    }

    /// Whether the last pass read the stream to its end.
    pub fn is_finished(&self) -> bool {
        self.shared.transport.lock().finished
    }

    /// Signed 16-bit little-endian interleaved PCM at the probed rate.
    pub fn format(&self) -> PcmFormat {
        self.shared.format
    }

    pub fn codec(&self) -> AudioCodec {
        self.shared.codec.clone()
    }

    pub fn is_replayable(&self) -> bool {
        self.shared.replay
    }

    /// Seek and loop controls; `None` unless built with replay.
    pub fn seekable(&self) -> Option<&dyn Seekable> {
        if self.shared.replay {
            Some(self)
        } else {
            None
        }
    }

    /// Frames in the stream, known once it has been read to its end.
    pub fn frame_length(&self) -> Option<u64> {
        let transport = self.shared.transport.lock();
        if transport.cache_complete {
            transport.total_frames
        } else {
            None
        }
    }

    /// Stream duration estimated from its size and the first frame's bit
    /// rate. Approximate for variable bit rate streams.
    pub fn microsecond_length(&self) -> Option<u64> {
        let transport = self.shared.transport.lock();
        if !transport.cache_complete || self.shared.first_bitrate == 0 {
            return None;
        }
        let bytes = transport.stream_bytes?;
        Some(bytes * 8 * 1_000_000 / self.shared.first_bitrate as u64)
    }

    /// Frames processed in the current pass.
    pub fn frame_position(&self) -> u64 {
        self.shared.transport.lock().frames_processed
    }

    /// Position in microseconds, using the average frame duration. `None`
    /// until the stream length is known.
    pub fn microsecond_position(&self) -> Option<u64> {
        let length_us = self.microsecond_length()?;
        let transport = self.shared.transport.lock();
        match transport.total_frames {
            Some(0) | None => None,
            Some(total) => Some(
                (transport.frames_processed as u128 * length_us as u128 / total as u128) as u64,
            ),
        }
    }

    /// Completed passes since the last stop or loop request.
    pub fn loop_count(&self) -> u32 {
        self.shared.transport.lock().loop_count
    }

    /// Message of the last decode or sink failure, if any.
    pub fn last_error(&self) -> Option<String> {
        self.shared.transport.lock().last_error.clone()
    }

    pub fn subscribe(&self) -> Receiver<LineEvent> {
        self.shared.events.subscribe()
    }

    pub fn config(&self) -> &LineConfig {
        &self.shared.config
    }

    // ------------------------------------------------------------------
    // Gain and buffering
    // ------------------------------------------------------------------

    pub fn set_volume(&self, volume: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&volume) {
            return Err(PlaybackError::InvalidVolume(volume));
        }
        self.shared.gain.lock().volume = volume;
        if self.is_open() {
            self.shared.sink.set_volume(volume)?;
        }
        Ok(())
    }

    pub fn volume(&self) -> f32 {
        self.shared.gain.lock().volume
    }

    /// Stereo balance from -1.0 (left only) to 1.0 (right only).
    pub fn set_balance(&self, balance: f32) -> Result<()> {
        if !(-1.0..=1.0).contains(&balance) {
            return Err(PlaybackError::InvalidBalance(balance));
        }
        self.shared.gain.lock().balance = balance;
        if self.is_open() {
            self.shared.sink.set_balance(balance)?;
        }
        Ok(())
    }

    pub fn balance(&self) -> f32 {
        self.shared.gain.lock().balance
    }

    pub fn set_muted(&self, muted: bool) -> Result<()> {
        self.shared.gain.lock().muted = muted;
        if self.is_open() {
            self.shared.sink.set_muted(muted)?;
        }
        Ok(())
    }

    pub fn is_muted(&self) -> bool {
        self.shared.gain.lock().muted
    }

    fn apply_gain(&self, gain: Gain) -> Result<()> {
        self.shared.sink.set_volume(gain.volume)?;
        self.shared.sink.set_balance(gain.balance)?;
        self.shared.sink.set_muted(gain.muted)?;
        Ok(())
    }

    /// Block until the sink has played everything queued.
    pub fn drain(&self) -> Result<()> {
        if self.is_open() {
            self.shared.sink.drain()?;
        }
        Ok(())
    }

    /// Discard audio queued in the sink.
    pub fn flush(&self) -> Result<()> {
        if self.is_open() {
            self.shared.sink.flush()?;
        }
        Ok(())
    }
}

impl Drop for AudioLine {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for AudioLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let transport = self.shared.transport.lock();
        f.debug_struct("AudioLine")
            .field("id", &self.shared.id)
            .field("format", &self.shared.format)
            .field("replay", &self.shared.replay)
            .field("state", &transport.state)
            .field("frames_processed", &transport.frames_processed)
            .field("total_frames", &transport.total_frames)
            .finish()
    }
}

impl Transport for AudioLine {
    fn start(&self) -> Result<()> {
        AudioLine::start(self)
    }

    fn stop(&self) {
        AudioLine::stop(self)
    }

    fn loop_playback(&self, count: LoopCount) -> Result<()> {
        AudioLine::loop_playback(self, count)
    }

    fn is_active(&self) -> bool {
        AudioLine::is_active(self)
    }

    fn is_finished(&self) -> bool {
        AudioLine::is_finished(self)
    }
}

impl FormatNegotiable for AudioLine {
    fn format(&self) -> PcmFormat {
        AudioLine::format(self)
    }

    fn open(&self) -> Result<()> {
        AudioLine::open(self)
    }

    fn close(&self) {
        AudioLine::close(self)
    }
}

impl Seekable for AudioLine {
    fn set_frame_position(&self, frame: u64) -> Result<()> {
        AudioLine::set_frame_position(self, frame)
    }

    fn frame_length(&self) -> Option<u64> {
        AudioLine::frame_length(self)
    }

    fn microsecond_length(&self) -> Option<u64> {
        AudioLine::microsecond_length(self)
    }
}
