//! CPAL-backed [`AudioSink`] for desktop platforms.
//!
//! The cpal `Stream` is not `Send` everywhere, so it lives on a dedicated
//! audio thread that takes commands over a channel. PCM written by the line
//! goes through a [`RingBuffer`]; the device callback drains it, pads with
//! silence on underrun and applies volume and balance.

use crate::decoder::SampleConverter;
use crate::ring_buffer::RingBuffer;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::playback::{AudioSink, PcmFormat};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, Stream, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Commands sent to the audio thread
enum SinkCommand {
    Open {
        format: PcmFormat,
        buffer: RingBuffer,
        reply: Sender<Result<()>>,
    },
    Play(Sender<Result<()>>),
    Pause,
    Close,
    Shutdown,
}

/// Gain applied in the device callback.
#[derive(Debug, Clone, Copy)]
struct Gain {
    volume: f32,
    balance: f32,
    muted: bool,
}

/// Desktop audio output through the system's default device.
pub struct CpalSink {
    command_tx: Sender<SinkCommand>,
    buffer: Mutex<Option<RingBuffer>>,
    gain: Arc<Mutex<Gain>>,
    playing: AtomicBool,
    audio_thread: Mutex<Option<JoinHandle<()>>>,
}

impl CpalSink {
    /// Spawn the audio thread. No device is touched until [`AudioSink::open`].
    pub fn new() -> Result<Self> {
        let gain = Arc::new(Mutex::new(Gain {
            volume: 1.0,
            balance: 0.0,
            muted: false,
        }));
        let (command_tx, command_rx) = bounded::<SinkCommand>(32);

        let gain_for_thread = Arc::clone(&gain);
        let audio_thread = thread::Builder::new()
            .name("clip-line-audio".to_string())
            .spawn(move || Self::audio_thread_run(command_rx, gain_for_thread))
            .map_err(BridgeError::Io)?;

        Ok(Self {
            command_tx,
            buffer: Mutex::new(None),
            gain,
            playing: AtomicBool::new(false),
            audio_thread: Mutex::new(Some(audio_thread)),
        })
    }

    fn send(&self, command: SinkCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|_| BridgeError::Device("audio thread has exited".to_string()))
    }

    fn request(&self, make: impl FnOnce(Sender<Result<()>>) -> SinkCommand) -> Result<()> {
        let (reply_tx, reply_rx) = bounded(1);
        self.send(make(reply_tx))?;
        reply_rx
            .recv()
            .map_err(|_| BridgeError::Device("audio thread has exited".to_string()))?
    }

    /// Audio thread main loop. Owns the cpal stream.
    fn audio_thread_run(command_rx: Receiver<SinkCommand>, gain: Arc<Mutex<Gain>>) {
        let mut stream: Option<Stream> = None;

        while let Ok(command) = command_rx.recv() {
            match command {
                SinkCommand::Open {
                    format,
                    buffer,
                    reply,
                } => {
                    stream = None;
                    let result = Self::build_stream(format, buffer, Arc::clone(&gain)).map(|s| {
                        stream = Some(s);
                    });
                    let _ = reply.send(result);
                }
                SinkCommand::Play(reply) => {
                    let result = match &stream {
                        Some(s) => s
                            .play()
                            .map_err(|e| BridgeError::Device(format!("failed to play: {}", e))),
                        None => Err(BridgeError::Device("sink is not open".to_string())),
                    };
                    let _ = reply.send(result);
                }
                SinkCommand::Pause => {
                    if let Some(s) = &stream {
                        if let Err(e) = s.pause() {
                            warn!("Failed to pause output stream: {}", e);
                        }
                    }
                }
                SinkCommand::Close => stream = None,
                SinkCommand::Shutdown => break,
            }
        }
        debug!("Audio thread exiting");
    }

    fn build_stream(format: PcmFormat, buffer: RingBuffer, gain: Arc<Mutex<Gain>>) -> Result<Stream> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| BridgeError::Device("no default output device found".to_string()))?;

        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!("Using audio device: {} ({})", name, format);

        let config = StreamConfig {
            channels: format.channels,
            sample_rate: SampleRate(format.sample_rate),
            buffer_size: BufferSize::Default,
        };
        let channels = format.channels;

        device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let read = buffer.read(data);
                    data[read..].fill(0.0);
                    let gain = *gain.lock();
                    if gain.muted {
                        data.fill(0.0);
                    } else {
                        SampleConverter::apply_gain(data, channels, gain.volume, gain.balance);
                    }
                },
                |err| error!("Audio stream error: {}", err),
                None,
            )
            .map_err(|e| BridgeError::Device(format!("failed to build output stream: {}", e)))
    }

    fn ring(&self) -> Option<RingBuffer> {
        self.buffer.lock().clone()
    }
}

impl AudioSink for CpalSink {
    fn open(&self, format: &PcmFormat, buffer_frames: usize) -> Result<()> {
        let capacity = buffer_frames.max(1) * format.channels.max(1) as usize;
        let buffer = RingBuffer::new(capacity);
        self.request(|reply| SinkCommand::Open {
            format: *format,
            buffer: buffer.clone(),
            reply,
        })?;
        *self.buffer.lock() = Some(buffer);
        Ok(())
    }

    fn start(&self) -> Result<()> {
        self.request(SinkCommand::Play)?;
        self.playing.store(true, Ordering::Release);
        Ok(())
    }

    fn write(&self, pcm: &[u8]) -> Result<usize> {
        let buffer = self
            .ring()
            .ok_or_else(|| BridgeError::Device("sink is not open".to_string()))?;
        let samples = SampleConverter::le_bytes_to_f32(pcm);
        let written = buffer.write_blocking(&samples);
        if written == samples.len() {
            Ok(pcm.len())
        } else {
            Ok(written * 2)
        }
    }

    fn stop(&self) -> Result<()> {
        self.playing.store(false, Ordering::Release);
        self.send(SinkCommand::Pause)
    }

    fn flush(&self) -> Result<()> {
        if let Some(buffer) = self.ring() {
            buffer.clear();
        }
        Ok(())
    }

    fn drain(&self) -> Result<()> {
        if !self.playing.load(Ordering::Acquire) {
            return Ok(());
        }
        if let Some(buffer) = self.ring() {
            buffer.wait_until_empty();
        }
        Ok(())
    }

    fn close(&self) {
        if let Some(buffer) = self.buffer.lock().take() {
            buffer.close();
        }
        self.playing.store(false, Ordering::Release);
        if let Err(e) = self.send(SinkCommand::Close) {
            warn!("Failed to close output stream: {}", e);
        }
    }

    fn is_open(&self) -> bool {
        self.buffer.lock().is_some()
    }

    fn set_volume(&self, volume: f32) -> Result<()> {
        self.gain.lock().volume = volume.clamp(0.0, 1.0);
        Ok(())
    }

    fn set_balance(&self, balance: f32) -> Result<()> {
        self.gain.lock().balance = balance.clamp(-1.0, 1.0);
        Ok(())
    }

    fn set_muted(&self, muted: bool) -> Result<()> {
        self.gain.lock().muted = muted;
        Ok(())
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        AudioSink::close(self);
        let _ = self.command_tx.send(SinkCommand::Shutdown);
        if let Some(handle) = self.audio_thread.lock().take() {
            let _ = handle.join();
        }
    }
}
