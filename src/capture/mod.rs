pub mod decoder;
pub mod frame;
pub mod pattern;
pub mod sequence;

#[cfg(feature = "gstreamer-source")]
pub mod gst_capture;
#[cfg(feature = "v4l2")]
pub mod v4l2;

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::PipelineError;
use crate::SourceConfig;

pub use frame::{Frame, PixelDepth, PixelFormat};
pub use pattern::PatternSource;
pub use sequence::SequenceSource;

#[cfg(feature = "gstreamer-source")]
pub use gst_capture::GstSource;
#[cfg(feature = "v4l2")]
pub use v4l2::V4l2Source;

/// Anything frames can be pulled from.
///
/// `read_frame` fails with [`PipelineError::FrameReadFailure`] when the source
/// yields nothing. `close` releases the underlying handle and must tolerate
/// being called more than once. Sources are `Send` so an engine can be
/// built on one thread and run on another.
pub trait FrameSource: Send {
    fn read_frame(&mut self) -> Result<Frame, PipelineError>;

    fn close(&mut self);

    /// Identifier the source was opened with, used in logs and errors
    fn identifier(&self) -> &str;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn read_frame(&mut self) -> Result<Frame, PipelineError> {
        (**self).read_frame()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn identifier(&self) -> &str {
        (**self).identifier()
    }
}

/// What an identifier string refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// Synthetic test pattern, optionally ending after `limit` frames
    Pattern { limit: Option<u64> },
    /// Directory of still images played back in name order
    Sequence(PathBuf),
    /// V4L2 device node; `auto` picks the first capture device
    Device(String),
    /// Anything GStreamer's `uridecodebin` understands
    Url(String),
    Unknown,
}

impl SourceKind {
    pub fn classify(identifier: &str) -> Self {
        let id = identifier.trim();
        if id == "pattern" {
            return SourceKind::Pattern { limit: None };
        }
        if let Some(n) = id.strip_prefix("pattern:") {
            return match n.parse() {
                Ok(limit) => SourceKind::Pattern { limit: Some(limit) },
                Err(_) => SourceKind::Unknown,
            };
        }
        if id.contains("://") {
            return SourceKind::Url(id.to_string());
        }
        if id == "auto" {
            return SourceKind::Device(id.to_string());
        }
        if let Ok(index) = id.parse::<u32>() {
            return SourceKind::Device(format!("/dev/video{index}"));
        }
        if id.starts_with("/dev/video") {
            return SourceKind::Device(id.to_string());
        }
        if Path::new(id).is_dir() {
            return SourceKind::Sequence(PathBuf::from(id));
        }
        SourceKind::Unknown
    }
}

/// Open the source named by `config.identifier`.
pub fn open_source(config: &SourceConfig) -> Result<Box<dyn FrameSource>, PipelineError> {
    let kind = SourceKind::classify(&config.identifier);
    info!("Video feed starting up: {:?}", kind);

    let source: Box<dyn FrameSource> = match kind {
        SourceKind::Pattern { limit } => {
            let (width, height) = config.resolution().unwrap_or((320, 240));
            let mut source = PatternSource::new(width, height)?;
            if let Some(limit) = limit {
                source = source.with_limit(limit);
            }
            if let Some(fps) = config.fps {
                source = source.with_rate(fps);
            }
            Box::new(source)
        }
        SourceKind::Sequence(dir) => Box::new(SequenceSource::open(&dir, config.resolution())?),
        SourceKind::Device(path) => open_device(&path, config)?,
        SourceKind::Url(url) => open_url(&url, config)?,
        SourceKind::Unknown => {
            return Err(PipelineError::unavailable(
                &config.identifier,
                "unrecognised source identifier",
            ))
        }
    };

    info!("Ready!");
    Ok(source)
}

#[cfg(feature = "v4l2")]
fn open_device(path: &str, config: &SourceConfig) -> Result<Box<dyn FrameSource>, PipelineError> {
    let device = if path == "auto" {
        v4l2::auto_detect_device()?
    } else {
        v4l2::FoundDevice::new(path.to_string(), PixelFormat::Mjpeg)
    };
    Ok(Box::new(V4l2Source::new(device, config)?))
}

#[cfg(not(feature = "v4l2"))]
fn open_device(path: &str, _config: &SourceConfig) -> Result<Box<dyn FrameSource>, PipelineError> {
    Err(PipelineError::unavailable(
        path,
        "built without the `v4l2` feature",
    ))
}

#[cfg(feature = "gstreamer-source")]
fn open_url(url: &str, config: &SourceConfig) -> Result<Box<dyn FrameSource>, PipelineError> {
    Ok(Box::new(GstSource::new(url, config)?))
}

#[cfg(not(feature = "gstreamer-source"))]
fn open_url(url: &str, _config: &SourceConfig) -> Result<Box<dyn FrameSource>, PipelineError> {
    Err(PipelineError::unavailable(
        url,
        "built without the `gstreamer-source` feature",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_identifiers() {
        assert_eq!(SourceKind::classify("pattern"), SourceKind::Pattern { limit: None });
        assert_eq!(
            SourceKind::classify("pattern:12"),
            SourceKind::Pattern { limit: Some(12) }
        );
        assert_eq!(
            SourceKind::classify("0"),
            SourceKind::Device("/dev/video0".into())
        );
        assert_eq!(
            SourceKind::classify("http://192.168.0.116:4747/video"),
            SourceKind::Url("http://192.168.0.116:4747/video".into())
        );
        assert_eq!(SourceKind::classify("pattern:x"), SourceKind::Unknown);
        assert_eq!(SourceKind::classify("/no/such/place"), SourceKind::Unknown);
    }

    #[test]
    fn unknown_source_is_unavailable() {
        let config = SourceConfig {
            identifier: "/no/such/place".into(),
            ..SourceConfig::default()
        };
        let err = open_source(&config).err().unwrap();
        assert!(matches!(err, PipelineError::SourceUnavailable { .. }));
    }

    #[test]
    fn opens_limited_pattern() {
        let config = SourceConfig {
            identifier: "pattern:2".into(),
            width: Some(16),
            height: Some(8),
            fps: None,
        };
        let mut source = open_source(&config).unwrap();
        let frame = source.read_frame().unwrap();
        assert_eq!((frame.width(), frame.height()), (16, 8));
        source.read_frame().unwrap();
        assert!(source.read_frame().unwrap_err().is_end_of_stream());
        source.close();
    }

    #[test]
    fn sources_move_across_threads() {
        let config = SourceConfig {
            identifier: "pattern:1".into(),
            width: Some(8),
            height: Some(8),
            fps: None,
        };
        let mut source = open_source(&config).unwrap();
        let frame = std::thread::spawn(move || {
            let frame = source.read_frame();
            source.close();
            frame
        })
        .join()
        .unwrap()
        .unwrap();
        assert_eq!(frame.sequence(), 0);
    }
}
