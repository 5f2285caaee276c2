//! V4L2 camera capture with memory-mapped buffers

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use v4l::buffer::Type;
use v4l::capability::Flags as CapFlags;
use v4l::io::traits::CaptureStream;
use v4l::prelude::MmapStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use crate::capture::{decoder, Frame, FrameSource, PixelFormat};
use crate::error::PipelineError;
use crate::SourceConfig;

const BUFFER_COUNT: u32 = 4;

// Detected capture device info
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoundDevice {
    pub path: String,
    pub format: PixelFormat,
}

impl FoundDevice {
    pub fn new(path: String, format: PixelFormat) -> Self {
        Self { path, format }
    }
}

/// Auto-detect best capture device
pub fn auto_detect_device() -> Result<FoundDevice, PipelineError> {
    info!("Auto-detecting capture devices...");

    for i in 0..10 {
        let path = format!("/dev/video{}", i);
        if !Path::new(&path).exists() {
            continue;
        }

        let Ok(dev) = Device::with_path(&path) else {
            continue;
        };
        let Ok(caps) = dev.query_caps() else {
            continue;
        };
        if !caps.capabilities.contains(CapFlags::VIDEO_CAPTURE) {
            continue;
        }
        // Prefer devices with MJPEG support
        if let Ok(formats) = dev.enum_formats() {
            for fmt in formats {
                if fmt.fourcc == FourCC::new(b"MJPG") {
                    info!("Found MJPEG device: {} - {}", path, caps.card);
                    return Ok(FoundDevice::new(path, PixelFormat::Mjpeg));
                } else if fmt.fourcc == FourCC::new(b"YUYV") {
                    info!("Found YUYV device: {} - {}", path, caps.card);
                    return Ok(FoundDevice::new(path, PixelFormat::Yuyv4));
                }
            }
        }
    }

    Err(PipelineError::unavailable(
        "auto",
        "no suitable capture device found",
    ))
}

/// Camera source backed by a V4L2 device node
pub struct V4l2Source {
    identifier: String,
    stream: Option<MmapStream<'static>>,
    _device: Box<Device>,
    format: PixelFormat,
    width: u32,
    height: u32,
    sequence: u64,
}

impl V4l2Source {
    /// Open the device and start streaming at the requested resolution.
    pub fn new(found: FoundDevice, config: &SourceConfig) -> Result<Self, PipelineError> {
        info!("Initializing V4L2 capture: {:?}", found);
        let identifier = found.path.clone();
        let unavailable = |e: std::io::Error| PipelineError::unavailable(&identifier, e);

        let device = Device::with_path(&found.path).map_err(unavailable)?;

        let caps = device.query_caps().map_err(unavailable)?;
        info!("Device: {} ({})", caps.card, caps.driver);
        if !caps.capabilities.contains(CapFlags::VIDEO_CAPTURE) {
            return Err(PipelineError::unavailable(
                &identifier,
                "device doesn't support video capture",
            ));
        }

        let mut fmt = device.format().map_err(unavailable)?;
        if let Some((width, height)) = config.resolution() {
            fmt.width = width;
            fmt.height = height;
        }
        fmt.fourcc = match found.format {
            PixelFormat::Mjpeg => FourCC::new(b"MJPG"),
            PixelFormat::Yuyv4 => FourCC::new(b"YUYV"),
            other => {
                return Err(PipelineError::unavailable(
                    &identifier,
                    format!("unsupported pixel format {other:?}"),
                ))
            }
        };
        // the driver may pick the closest supported mode
        let fmt = device.set_format(&fmt).map_err(unavailable)?;
        let format = if fmt.fourcc == FourCC::new(b"YUYV") {
            PixelFormat::Yuyv4
        } else {
            PixelFormat::Mjpeg
        };

        let device = Box::new(device);
        let stream = MmapStream::with_buffers(&device, Type::VideoCapture, BUFFER_COUNT)
            .map_err(unavailable)?;
        info!(
            "Capture stream started with {} buffers at {}x{}",
            BUFFER_COUNT, fmt.width, fmt.height
        );

        Ok(Self {
            identifier,
            stream: Some(stream),
            _device: device,
            format,
            width: fmt.width,
            height: fmt.height,
            sequence: 0,
        })
    }
}

impl FrameSource for V4l2Source {
    #[instrument(skip(self), fields(device = %self.identifier))]
    fn read_frame(&mut self) -> Result<Frame, PipelineError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| PipelineError::read_failure(&self.identifier))?;

        let (buf, meta) = stream.next().map_err(|e| {
            warn!("Dequeue failed: {}", e);
            PipelineError::read_failure(&self.identifier)
        })?;
        let used = (meta.bytesused as usize).min(buf.len());
        let device_ts = Duration::from_secs(meta.timestamp.sec as u64)
            + Duration::from_micros(meta.timestamp.usec as u64);

        let frame = decoder::decode_frame(&buf[..used], self.format, self.width, self.height)
            .map_err(|e| {
                warn!("Failed to decode frame: {}", e);
                PipelineError::read_failure(&self.identifier)
            })?;

        self.sequence += 1;
        Ok(frame
            .with_sequence(self.sequence)
            .with_device_timestamp(device_ts))
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            debug!("Released {}", self.identifier);
        }
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
