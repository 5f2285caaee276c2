use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Frame data with zero-copy semantics.
///
/// A frame is immutable once built: cloning shares the pixel storage, and
/// every transformation produces a new frame.
#[derive(Clone)]
pub struct Frame {
    /// Immutable pixel data - can be shared across threads without copying
    pub data: PixelData,

    /// Frame metadata
    pub meta: Arc<FrameMetadata>,

    /// Capture timestamp for latency tracking
    pub timestamp: Instant,
}

/// Interleaved samples, row-major, `channels` samples per pixel.
#[derive(Clone)]
pub enum PixelData {
    U8(Bytes),
    /// Signed samples, so that differences between frames don't wrap.
    I16(Arc<[i16]>),
}

/// Frame metadata
#[derive(Debug, Clone)]
pub struct FrameMetadata {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub depth: PixelDepth,
    pub device_timestamp: Option<Duration>, // Hardware timestamp if available
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelDepth {
    U8,
    I16,
}

/// Payload formats delivered by capture devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Gray8,
    Rgb24,
    Bgr24,
    Yuyv4,
    Mjpeg,
}

impl PixelFormat {
    pub fn channels(self) -> u32 {
        match self {
            PixelFormat::Gray8 => 1,
            _ => 3,
        }
    }
}

fn expected_len(width: u32, height: u32, channels: u32) -> usize {
    width as usize * height as usize * channels as usize
}

impl Frame {
    fn new(data: PixelData, width: u32, height: u32, channels: u32) -> Result<Self, PipelineError> {
        let (len, depth) = match &data {
            PixelData::U8(bytes) => (bytes.len(), PixelDepth::U8),
            PixelData::I16(samples) => (samples.len(), PixelDepth::I16),
        };
        if channels == 0 {
            return Err(PipelineError::InvalidFrame("frame needs at least one channel".into()));
        }
        let expected = expected_len(width, height, channels);
        if len != expected {
            return Err(PipelineError::InvalidFrame(format!(
                "{width}x{height}x{channels} frame needs {expected} samples, got {len}"
            )));
        }

        Ok(Self {
            data,
            meta: Arc::new(FrameMetadata {
                sequence: 0,
                width,
                height,
                channels,
                depth,
                device_timestamp: None,
            }),
            timestamp: Instant::now(),
        })
    }

    /// Build an unsigned 8-bit frame, validating the buffer length.
    pub fn from_u8(
        width: u32,
        height: u32,
        channels: u32,
        data: impl Into<Bytes>,
    ) -> Result<Self, PipelineError> {
        Self::new(PixelData::U8(data.into()), width, height, channels)
    }

    /// Build a signed 16-bit frame, validating the buffer length.
    pub fn from_i16(
        width: u32,
        height: u32,
        channels: u32,
        data: impl Into<Arc<[i16]>>,
    ) -> Result<Self, PipelineError> {
        Self::new(PixelData::I16(data.into()), width, height, channels)
    }

    /// A frame where every sample is `value`.
    pub fn filled(width: u32, height: u32, channels: u32, value: u8) -> Result<Self, PipelineError> {
        let data = vec![value; expected_len(width, height, channels)];
        Self::from_u8(width, height, channels, data)
    }

    pub fn width(&self) -> u32 {
        self.meta.width
    }

    pub fn height(&self) -> u32 {
        self.meta.height
    }

    pub fn channels(&self) -> u32 {
        self.meta.channels
    }

    pub fn depth(&self) -> PixelDepth {
        self.meta.depth
    }

    pub fn sequence(&self) -> u64 {
        self.meta.sequence
    }

    /// Number of samples (pixels × channels).
    pub fn len(&self) -> usize {
        expected_len(self.width(), self.height(), self.channels())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_u8(&self) -> Option<&[u8]> {
        match &self.data {
            PixelData::U8(bytes) => Some(&bytes[..]),
            PixelData::I16(_) => None,
        }
    }

    pub fn as_i16(&self) -> Option<&[i16]> {
        match &self.data {
            PixelData::I16(samples) => Some(&samples[..]),
            PixelData::U8(_) => None,
        }
    }

    /// Returns a copy with the same geometry and new metadata fields.
    fn rebuilt(&self, data: PixelData) -> Self {
        let mut meta = (*self.meta).clone();
        meta.depth = match data {
            PixelData::U8(_) => PixelDepth::U8,
            PixelData::I16(_) => PixelDepth::I16,
        };
        Self {
            data,
            meta: Arc::new(meta),
            timestamp: self.timestamp,
        }
    }

    /// 8-bit view of the frame; i16 samples are clamped into `0..=255`.
    pub fn to_u8_saturating(&self) -> Frame {
        match &self.data {
            PixelData::U8(_) => self.clone(),
            PixelData::I16(samples) => {
                let bytes: Vec<u8> = samples.iter().map(|&s| s.clamp(0, 255) as u8).collect();
                self.rebuilt(PixelData::U8(Bytes::from(bytes)))
            }
        }
    }

    /// Signed 16-bit copy of the frame, for difference-safe arithmetic.
    pub fn to_i16(&self) -> Frame {
        match &self.data {
            PixelData::I16(_) => self.clone(),
            PixelData::U8(bytes) => {
                let samples: Vec<i16> = bytes.iter().map(|&b| b as i16).collect();
                self.rebuilt(PixelData::I16(samples.into()))
            }
        }
    }

    pub fn with_sequence(mut self, sequence: u64) -> Frame {
        Arc::make_mut(&mut self.meta).sequence = sequence;
        self
    }

    pub fn with_device_timestamp(mut self, ts: Duration) -> Frame {
        Arc::make_mut(&mut self.meta).device_timestamp = Some(ts);
        self
    }

    /// Pixel-wise equality: same geometry, depth and samples.
    pub fn sample_eq(&self, other: &Frame) -> bool {
        if self.width() != other.width()
            || self.height() != other.height()
            || self.channels() != other.channels()
        {
            return false;
        }
        match (&self.data, &other.data) {
            (PixelData::U8(a), PixelData::U8(b)) => a == b,
            (PixelData::I16(a), PixelData::I16(b)) => a == b,
            _ => false,
        }
    }

    /// Time elapsed since the frame was captured
    pub fn latency(&self) -> Duration {
        self.timestamp.elapsed()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("sequence", &self.meta.sequence)
            .field("width", &self.meta.width)
            .field("height", &self.meta.height)
            .field("channels", &self.meta.channels)
            .field("depth", &self.meta.depth)
            .finish()
    }
}
