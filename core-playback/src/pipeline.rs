//! # Frame Decode Pipeline
//!
//! Owns the byte source and the current codec adapter, and turns them into a
//! sequence of [`Frame`]s with a fixed PCM layout.
//!
//! The first frame is decoded when the pipeline is built (the bootstrap
//! frame) so the output format is known before anything is opened. It is
//! handed out by the first [`next_frame`](FrameDecodePipeline::next_frame)
//! call and then dropped. [`restart`](FrameDecodePipeline::restart) rewinds
//! the source and builds a fresh adapter, so frame zero is decoded again.
//!
//! A frame the caller could not deliver goes back through
//! [`unread`](FrameDecodePipeline::unread) and is handed out again by the
//! next call, ahead of anything the codec still holds.

use crate::error::{PlaybackError, Result};
use crate::source::{ByteSource, SourceReader};
use crate::traits::{AudioCodec, CodecAdapter, CodecProvider, Frame, FrameHeader};
use bridge_traits::playback::PcmFormat;
use std::sync::Arc;
use tracing::{debug, error, instrument, trace};

pub struct FrameDecodePipeline {
    source: SourceReader,
    provider: Arc<dyn CodecProvider>,
    codec: Box<dyn CodecAdapter>,
    /// Frame to hand out before decoding more: the bootstrap frame, or one
    /// given back with `unread`.
    pending: Option<Frame>,
    /// Header of the very first frame; fixes the output layout.
    first_header: FrameHeader,
    codec_name: AudioCodec,
    /// Frames handed out since construction or the last restart.
    position: u64,
}

impl FrameDecodePipeline {
    /// Build a pipeline over `source` and probe its first frame.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::FormatUnavailable`] if no frame can be decoded, or
    /// [`PlaybackError::UnsupportedCodec`] if the codec was recognized but
    /// not compiled in.
    #[instrument(skip(source, provider), fields(replayable = source.is_replayable()))]
    pub fn new(source: ByteSource, provider: Arc<dyn CodecProvider>) -> Result<Self> {
        let source = SourceReader::new(source);
        let mut codec = provider
            .open(source.clone())
            .map_err(Self::probe_error)?;
        let bootstrap = Self::probe_first_frame(codec.as_mut())?;
        let codec_name = codec.codec();

        debug!(
            format = %bootstrap.header.pcm_format(),
            bitrate = bootstrap.header.bitrate,
            codec = ?codec_name,
            "Probed bootstrap frame"
        );

        Ok(Self {
            source,
            provider,
            codec,
            first_header: bootstrap.header,
            pending: Some(bootstrap),
            codec_name,
            position: 0,
        })
    }

    /// Decode exactly one frame from a freshly opened adapter.
    fn probe_first_frame(codec: &mut dyn CodecAdapter) -> Result<Frame> {
        let header = codec
            .read_frame()
            .map_err(Self::probe_error)?
            .ok_or_else(|| {
                error!("Stream ended before the first frame");
                PlaybackError::FormatUnavailable("stream holds no frames".to_string())
            })?;

        if header.channels == 0 || header.sample_rate == 0 {
            return Err(PlaybackError::FormatUnavailable(format!(
                "first frame reports {} Hz with {} channels",
                header.sample_rate, header.channels
            )));
        }

        let samples = codec.decode(&header).map_err(Self::probe_error)?;
        Ok(Frame::new(header, samples))
    }

    fn probe_error(err: PlaybackError) -> PlaybackError {
        match err {
            PlaybackError::FormatUnavailable(_) | PlaybackError::UnsupportedCodec(_) => err,
            other => {
                error!("Probe failed: {}", other);
                PlaybackError::FormatUnavailable(other.to_string())
            }
        }
    }

    /// Next frame of the stream, or `None` at the end.
    ///
    /// # Errors
    ///
    /// Codec failures pass through unchanged. A frame whose sample rate or
    /// channel count differs from the first frame yields
    /// [`PlaybackError::FormatChanged`].
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        if let Some(frame) = self.pending.take() {
            self.position += 1;
            return Ok(Some(frame));
        }

        let header = match self.codec.read_frame()? {
            Some(header) => header,
            None => return Ok(None),
        };
        self.check_format(&header)?;

        let samples = self.codec.decode(&header)?;
        self.position += 1;
        trace!(position = self.position, samples = samples.len(), "Decoded frame");
        Ok(Some(Frame::new(header, samples)))
    }

    /// Give back the frame the last `next_frame` call returned, so the next
    /// call yields it again and the position does not move past it.
    pub fn unread(&mut self, frame: Frame) {
        self.position = self.position.saturating_sub(1);
        trace!(position = self.position, "Frame returned to pipeline");
        self.pending = Some(frame);
    }

    fn check_format(&self, header: &FrameHeader) -> Result<()> {
        if header.same_layout(&self.first_header) {
            return Ok(());
        }
        Err(PlaybackError::FormatChanged {
            expected: self.first_header.pcm_format().to_string(),
            found: header.pcm_format().to_string(),
        })
    }

    /// Rewind the byte source and start decoding from frame zero with a new
    /// codec adapter.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::Unsupported`] if the source was not built with
    /// replay.
    #[instrument(skip(self), fields(position = self.position))]
    pub fn restart(&mut self) -> Result<()> {
        self.source.rewind()?;
        self.codec = self.provider.open(self.source.clone())?;
        self.pending = None;
        self.position = 0;
        debug!("Pipeline restarted at frame 0");
        Ok(())
    }

    /// PCM layout of every frame this pipeline yields.
    pub fn format(&self) -> PcmFormat {
        self.first_header.pcm_format()
    }

    /// Bit rate of the first frame in bits per second.
    pub fn first_bitrate(&self) -> u32 {
        self.first_header.bitrate
    }

    /// Bytes read from the underlying source so far.
    pub fn bytes_consumed(&self) -> u64 {
        self.source.bytes_consumed()
    }

    pub fn is_replayable(&self) -> bool {
        self.source.is_replayable()
    }

    pub fn codec(&self) -> AudioCodec {
        self.codec_name.clone()
    }

    /// Frames handed out since construction or the last restart.
    pub fn position(&self) -> u64 {
        self.position
    }
}

impl std::fmt::Debug for FrameDecodePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameDecodePipeline")
            .field("source", &self.source)
            .field("first_header", &self.first_header)
            .field("codec", &self.codec_name)
            .field("position", &self.position)
            .field("frame_pending", &self.pending.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    /// One byte per frame; the byte value is the frame's sample.
    struct ByteCodec {
        source: SourceReader,
        current: u8,
    }

    impl CodecAdapter for ByteCodec {
        fn read_frame(&mut self) -> Result<Option<FrameHeader>> {
            let mut byte = [0u8; 1];
            match self.source.read(&mut byte)? {
                0 => Ok(None),
                _ if byte[0] == 0xFF => Ok(Some(FrameHeader::new(22_050, 1, 8_000))),
                _ => {
                    self.current = byte[0];
                    Ok(Some(FrameHeader::new(8_000, 1, 64_000)))
                }
            }
        }

        fn decode(&mut self, _header: &FrameHeader) -> Result<Vec<i16>> {
            Ok(vec![self.current as i16])
        }
    }

    fn provider() -> Arc<dyn CodecProvider> {
        Arc::new(|source: SourceReader| -> Result<Box<dyn CodecAdapter>> {
            Ok(Box::new(ByteCodec { source, current: 0 }))
        })
    }

    fn drain(pipeline: &mut FrameDecodePipeline) -> Vec<i16> {
        let mut out = Vec::new();
        while let Some(frame) = pipeline.next_frame().unwrap() {
            out.extend(frame.samples);
        }
        out
    }

    #[test]
    fn test_bootstrap_is_first_frame() {
        let source = ByteSource::replayable(Cursor::new(vec![1u8, 2, 3]), 16);
        let mut pipeline = FrameDecodePipeline::new(source, provider()).unwrap();
        assert_eq!(pipeline.format(), PcmFormat::s16le(8_000, 1));
        assert_eq!(pipeline.first_bitrate(), 64_000);
        assert_eq!(pipeline.position(), 0);
        assert_eq!(drain(&mut pipeline), vec![1, 2, 3]);
        assert_eq!(pipeline.position(), 3);
    }

    #[test]
    fn test_unread_frame_is_yielded_again() {
        let source = ByteSource::one_shot(Cursor::new(vec![1u8, 2, 3]));
        let mut pipeline = FrameDecodePipeline::new(source, provider()).unwrap();
        pipeline.next_frame().unwrap();
        let second = pipeline.next_frame().unwrap().unwrap();
        assert_eq!(pipeline.position(), 2);

        pipeline.unread(second);
        assert_eq!(pipeline.position(), 1);
        assert_eq!(drain(&mut pipeline), vec![2, 3]);
        assert_eq!(pipeline.position(), 3);
    }

    #[test]
    fn test_restart_replays_from_zero() {
        let source = ByteSource::replayable(Cursor::new(vec![1u8, 2, 3]), 16);
        let mut pipeline = FrameDecodePipeline::new(source, provider()).unwrap();
        assert_eq!(drain(&mut pipeline), vec![1, 2, 3]);

        pipeline.restart().unwrap();
        assert_eq!(pipeline.position(), 0);
        assert_eq!(drain(&mut pipeline), vec![1, 2, 3]);
        assert_eq!(pipeline.bytes_consumed(), 3);
    }

    #[test]
    fn test_restart_without_replay_is_unsupported() {
        let source = ByteSource::one_shot(Cursor::new(vec![1u8, 2]));
        let mut pipeline = FrameDecodePipeline::new(source, provider()).unwrap();
        assert!(matches!(
            pipeline.restart(),
            Err(PlaybackError::Unsupported(_))
        ));
    }

    #[test]
    fn test_empty_stream_is_format_unavailable() {
        let source = ByteSource::one_shot(Cursor::new(Vec::<u8>::new()));
        let err = FrameDecodePipeline::new(source, provider()).unwrap_err();
        assert!(matches!(err, PlaybackError::FormatUnavailable(_)));
    }

    #[test]
    fn test_format_change_is_reported() {
        let source = ByteSource::one_shot(Cursor::new(vec![1u8, 0xFF, 2]));
        let mut pipeline = FrameDecodePipeline::new(source, provider()).unwrap();
        assert!(pipeline.next_frame().unwrap().is_some());
        let err = pipeline.next_frame().unwrap_err();
        assert!(matches!(err, PlaybackError::FormatChanged { .. }));
        assert!(err.is_decode_failure());
    }
}
