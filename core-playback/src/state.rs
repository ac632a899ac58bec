//! # Playback State Machine
//!
//! Transport bookkeeping shared by the controlling thread and the decode
//! worker. Everything here lives behind the line's transport mutex; the
//! methods only update fields and never block.
//!
//! ```text
//!  Inactive ──probe──> Stopped <──stop / limit / end of stream── Started
//!                         └──────────────start──────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse transport state of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// Not yet probed.
    Inactive,
    /// Probed and idle.
    Stopped,
    /// A decode worker is (or is about to be) running.
    Started,
}

impl PlaybackState {
    pub fn is_active(&self) -> bool {
        matches!(self, PlaybackState::Started)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlaybackState::Inactive => "inactive",
            PlaybackState::Stopped => "stopped",
            PlaybackState::Started => "started",
        };
        f.write_str(name)
    }
}

/// How many times a looped line plays its stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopCount {
    /// Play this many passes in total. Zero behaves like one.
    Times(u32),
    /// Restart on every end of stream until stopped.
    Continuously,
}

impl LoopCount {
    /// Whether another pass follows once `completed` passes have finished.
    pub fn wants_another(&self, completed: u32) -> bool {
        match self {
            LoopCount::Times(target) => completed < *target,
            LoopCount::Continuously => true,
        }
    }
}

impl Default for LoopCount {
    fn default() -> Self {
        LoopCount::Times(0)
    }
}

/// Where a decode pass stops on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayUntil {
    /// Run to the end of the stream.
    #[default]
    End,
    /// Stop once this many frames of the pass have been processed.
    Frame(u64),
}

impl PlayUntil {
    /// Whether a pass that has processed `frames` may pull another frame.
    pub fn allows(&self, frames: u64) -> bool {
        match self {
            PlayUntil::End => true,
            PlayUntil::Frame(limit) => frames < *limit,
        }
    }
}

/// Mutable transport fields of one line.
#[derive(Debug, Clone)]
pub struct TransportState {
    pub state: PlaybackState,
    /// Output sink is open.
    pub open: bool,
    /// Line was closed; terminal.
    pub closed: bool,
    /// Last pass ran to the end of the stream.
    pub finished: bool,
    /// Frames pulled in the current pass. Monotonic within a pass.
    pub frames_processed: u64,
    /// Frames in the whole stream, known after the first full pass.
    pub total_frames: Option<u64>,
    /// Every byte of the stream has been read (and cached, with replay).
    pub cache_complete: bool,
    /// Bytes the stream held, recorded when a pass consumes it.
    pub stream_bytes: Option<u64>,
    pub loop_target: LoopCount,
    /// Passes completed since the last stop or loop request.
    pub loop_count: u32,
    pub limit: PlayUntil,
    /// Current pass discards frames instead of writing them.
    pub silent: bool,
    /// Worker threads that have not finished their exit bookkeeping.
    pub live_workers: usize,
    pub last_error: Option<String>,
}

impl Default for TransportState {
    fn default() -> Self {
        Self {
            state: PlaybackState::Inactive,
            open: false,
            closed: false,
            finished: false,
            frames_processed: 0,
            total_frames: None,
            cache_complete: false,
            stream_bytes: None,
            loop_target: LoopCount::default(),
            loop_count: 0,
            limit: PlayUntil::End,
            silent: false,
            live_workers: 0,
            last_error: None,
        }
    }
}

impl TransportState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probe succeeded.
    pub fn mark_probed(&mut self) {
        if self.state == PlaybackState::Inactive {
            self.state = PlaybackState::Stopped;
        }
    }

    /// Whether the worker may pull the next frame.
    pub fn may_continue(&self) -> bool {
        self.state == PlaybackState::Started && self.limit.allows(self.frames_processed)
    }

    /// Enter `Started` for a new pass segment.
    pub fn begin(&mut self, limit: PlayUntil, silent: bool) {
        self.state = PlaybackState::Started;
        self.limit = limit;
        self.silent = silent;
    }

    /// Forget the current position after the pipeline went back to frame zero.
    pub fn rewound(&mut self) {
        self.finished = false;
        self.frames_processed = 0;
    }

    /// Caller asked to stop: cancel any looping and leave `Started`.
    pub fn request_stop(&mut self) {
        self.loop_target = LoopCount::Times(0);
        self.loop_count = 0;
        if self.state == PlaybackState::Started {
            self.state = PlaybackState::Stopped;
        }
    }

    /// A pass reached the end of the stream.
    ///
    /// Records the stream length and counts the completed pass. Returns
    /// `true` if the loop target asks for another pass.
    pub fn complete_pass(&mut self) -> bool {
        self.finished = true;
        self.total_frames = Some(self.frames_processed);
        self.cache_complete = true;
        self.state = PlaybackState::Stopped;
        self.loop_count = self.loop_count.saturating_add(1);
        self.loop_target.wants_another(self.loop_count)
    }

    /// A pass hit its frame limit.
    pub fn reach_limit(&mut self) {
        self.state = PlaybackState::Stopped;
    }

    /// Whether the controlling thread can touch the pipeline.
    pub fn is_idle(&self) -> bool {
        self.live_workers == 0
    }
}
