//! Plays back a directory of still images as a video source

use std::fs;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use tracing::{info, warn};

use crate::capture::{Frame, FrameSource};
use crate::error::PipelineError;

const EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

pub struct SequenceSource {
    identifier: String,
    files: Vec<PathBuf>,
    next: usize,
    resolution: Option<(u32, u32)>,
    closed: bool,
}

impl SequenceSource {
    /// Collect the PNG/JPEG files of `dir`, sorted by file name.
    pub fn open(dir: &Path, resolution: Option<(u32, u32)>) -> Result<Self, PipelineError> {
        let identifier = dir.display().to_string();
        let entries = fs::read_dir(dir).map_err(|e| PipelineError::unavailable(&identifier, e))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            })
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(PipelineError::unavailable(identifier, "no image files found"));
        }
        info!("Image sequence with {} frames: {}", files.len(), identifier);

        Ok(Self {
            identifier,
            files,
            next: 0,
            resolution,
            closed: false,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for SequenceSource {
    fn read_frame(&mut self) -> Result<Frame, PipelineError> {
        if self.closed {
            return Err(PipelineError::read_failure(&self.identifier));
        }
        let path = self
            .files
            .get(self.next)
            .ok_or_else(|| PipelineError::read_failure(&self.identifier))?;

        let image = image::open(path).map_err(|e| {
            warn!("Failed to decode {}: {}", path.display(), e);
            PipelineError::read_failure(&self.identifier)
        })?;
        let mut rgb = image.to_rgb8();
        if let Some((w, h)) = self.resolution {
            if rgb.dimensions() != (w, h) {
                rgb = image::imageops::resize(&rgb, w, h, FilterType::Triangle);
            }
        }

        let (width, height) = rgb.dimensions();
        let frame = Frame::from_u8(width, height, 3, rgb.into_raw())?.with_sequence(self.next as u64);
        self.next += 1;
        Ok(frame)
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
