//! Line lifecycle notifications.
//!
//! Every `AudioLine` owns one [`EventBus`]. The controller and its decode
//! worker both publish into it, and hosts subscribe instead of polling
//! transport state.
//!
//! ```text
//! ┌──────────────┐    emit     ┌───────────┐
//! │ AudioLine    ├────────────>│           │    subscribe    ┌────────────┐
//! │ (controller) │             │ EventBus  ├────────────────>│ Subscriber │
//! └──────────────┘             │ (broadcast│                 └────────────┘
//! ┌──────────────┐    emit     │  channel) │    subscribe    ┌────────────┐
//! │ DecodeWorker ├────────────>│           ├────────────────>│ Subscriber │
//! └──────────────┘             └───────────┘                 └────────────┘
//! ```
//!
//! Emission never blocks: the decode worker publishes from its real-time
//! loop, and a slow subscriber only lags behind.
//!
//! ## Usage
//!
//! ```rust
//! use bridge_traits::playback::LineId;
//! use core_runtime::events::{EventBus, LineEvent};
//!
//! let bus = EventBus::new(16);
//! let mut rx = bus.subscribe();
//!
//! let line_id = LineId::new();
//! bus.emit(LineEvent::Started { line_id, silent: false }).ok();
//!
//! assert_eq!(rx.try_recv().unwrap(), LineEvent::Started { line_id, silent: false });
//! ```
//!
//! Non-async consumers can block on [`Receiver::blocking_recv`] from a plain
//! thread.
//!
//! A receiver that falls more than the bus capacity behind gets
//! `RecvError::Lagged(n)` once and then resumes with the oldest retained
//! event. `RecvError::Closed` means the line itself was dropped.

use bridge_traits::playback::LineId;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError, TryRecvError};
pub use tokio::sync::broadcast::Receiver;

/// Events retained per receiver when no capacity is configured.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

/// Why a decode pass ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// `stop()` (or `close()`) was called.
    Requested,
    /// The stream was exhausted.
    EndOfStream,
    /// The requested frame limit was reached.
    FrameLimit,
    /// A frame could not be decoded; treated as the end of the stream.
    DecodeFailure,
    /// The output sink rejected a write.
    SinkFailure,
}

impl StopReason {
    /// Whether this pass consumed the whole stream.
    pub fn is_natural_end(&self) -> bool {
        matches!(self, StopReason::EndOfStream | StopReason::DecodeFailure)
    }
}

/// Lifecycle events published by an audio line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LineEvent {
    /// The output sink was opened.
    Opened {
        line_id: LineId,
        /// Negotiated sample rate in hertz.
        sample_rate: u32,
        /// Negotiated channel count.
        channels: u16,
    },
    /// The line released its sink and decoder.
    Closed { line_id: LineId },
    /// A decode worker started.
    Started {
        line_id: LineId,
        /// Whether frames are being decoded without output.
        silent: bool,
    },
    /// A decode worker finished.
    Stopped {
        line_id: LineId,
        reason: StopReason,
        /// Frames processed in this pass when the worker exited.
        frames_processed: u64,
    },
    /// A full pass completed while looping.
    LoopCompleted {
        line_id: LineId,
        /// Completed passes so far.
        count: u32,
    },
    /// The stream was read to its end and the replay cache is complete.
    LengthKnown {
        line_id: LineId,
        total_frames: u64,
    },
    /// A failure that did not surface as a return value.
    Error {
        line_id: LineId,
        message: String,
    },
}

impl LineEvent {
    /// Short label for logs and UIs.
    pub fn description(&self) -> &str {
        match self {
            LineEvent::Opened { .. } => "Line opened",
            LineEvent::Closed { .. } => "Line closed",
            LineEvent::Started { .. } => "Decoding started",
            LineEvent::Stopped { .. } => "Decoding stopped",
            LineEvent::LoopCompleted { .. } => "Loop pass completed",
            LineEvent::LengthKnown { .. } => "Stream length known",
            LineEvent::Error { .. } => "Line error",
        }
    }

    /// The line that published this event.
    pub fn line_id(&self) -> LineId {
        match self {
            LineEvent::Opened { line_id, .. }
            | LineEvent::Closed { line_id }
            | LineEvent::Started { line_id, .. }
            | LineEvent::Stopped { line_id, .. }
            | LineEvent::LoopCompleted { line_id, .. }
            | LineEvent::LengthKnown { line_id, .. }
            | LineEvent::Error { line_id, .. } => *line_id,
        }
    }

    /// How loudly a host should report this event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            LineEvent::Error { .. } => EventSeverity::Error,
            LineEvent::Stopped {
                reason: StopReason::DecodeFailure | StopReason::SinkFailure,
                ..
            } => EventSeverity::Warning,
            LineEvent::Opened { .. } | LineEvent::Closed { .. } => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Broadcast channel for [`LineEvent`]s.
///
/// Cloning the bus clones the sender, so every clone publishes to the same
/// subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LineEvent>,
}

impl EventBus {
    /// Bus retaining up to `capacity` unread events per receiver (at least
    /// one).
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Never blocks. Returns how many receivers got the event; with no
    /// receivers the event is handed back in the error.
    pub fn emit(&self, event: LineEvent) -> Result<usize, SendError<LineEvent>> {
        self.sender.send(event)
    }

    /// Receiver for events published from now on.
    pub fn subscribe(&self) -> Receiver<LineEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

type EventFilter = Box<dyn Fn(&LineEvent) -> bool + Send + Sync>;

/// Receiver that skips events a predicate rejects.
///
/// ```rust
/// use core_runtime::events::{EventBus, EventStream, LineEvent};
///
/// let bus = EventBus::new(16);
/// let loops = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, LineEvent::LoopCompleted { .. }));
/// ```
pub struct EventStream {
    receiver: Receiver<LineEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<LineEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only yield events for which `predicate` holds.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&LineEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &LineEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Wait for the next accepted event.
    pub async fn recv(&mut self) -> Result<LineEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Blocking variant of [`recv`](Self::recv) for plain threads.
    ///
    /// Must not be called from within an async runtime.
    pub fn blocking_recv(&mut self) -> Result<LineEvent, RecvError> {
        loop {
            let event = self.receiver.blocking_recv()?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// `None` when nothing accepted is buffered right now.
    pub fn try_recv(&mut self) -> Option<Result<LineEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Lagged(n)) => return Some(Err(RecvError::Lagged(n))),
                Err(TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }

    /// Drains every matching event currently buffered.
    pub fn drain(&mut self) -> Vec<LineEvent> {
        let mut events = Vec::new();
        while let Some(result) = self.try_recv() {
            match result {
                Ok(event) => events.push(event),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
        events
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
