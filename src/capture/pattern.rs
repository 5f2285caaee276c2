//! Synthetic moving test pattern, always available

use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::capture::{Frame, FrameSource};
use crate::error::PipelineError;

const BAR_WIDTH: u32 = 24;

/// RGB gradient with a bright vertical bar sweeping left to right.
pub struct PatternSource {
    identifier: String,
    width: u32,
    height: u32,
    sequence: u64,
    limit: Option<u64>,
    interval: Option<Duration>,
    last_read: Option<Instant>,
    closed: bool,
}

impl PatternSource {
    pub fn new(width: u32, height: u32) -> Result<Self, PipelineError> {
        if width == 0 || height == 0 {
            return Err(PipelineError::unavailable(
                "pattern",
                format!("invalid resolution {width}x{height}"),
            ));
        }
        Ok(Self {
            identifier: "pattern".into(),
            width,
            height,
            sequence: 0,
            limit: None,
            interval: None,
            last_read: None,
            closed: false,
        })
    }

    /// Fail with `FrameReadFailure` after `limit` frames.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Pace reads like a camera delivering `fps` frames per second.
    pub fn with_rate(mut self, fps: u32) -> Self {
        if fps > 0 {
            self.interval = Some(Duration::from_secs(1) / fps);
        }
        self
    }

    fn render(&self) -> Vec<u8> {
        let (w, h) = (self.width, self.height);
        let w64 = u64::from(w);
        let bar_x = ((self.sequence % w64) * 4 % w64) as u32;
        let mut data = Vec::with_capacity((w * h * 3) as usize);
        for y in 0..h {
            for x in 0..w {
                let on_bar = x >= bar_x && x < bar_x + BAR_WIDTH;
                if on_bar {
                    data.extend_from_slice(&[255, 255, 255]);
                } else {
                    data.push((x * 255 / w.max(1)) as u8);
                    data.push((y * 255 / h.max(1)) as u8);
                    data.push((self.sequence % 256) as u8);
                }
            }
        }
        data
    }
}

impl FrameSource for PatternSource {
    fn read_frame(&mut self) -> Result<Frame, PipelineError> {
        if self.closed || self.limit.is_some_and(|limit| self.sequence >= limit) {
            return Err(PipelineError::read_failure(&self.identifier));
        }

        if let (Some(interval), Some(last)) = (self.interval, self.last_read) {
            let elapsed = last.elapsed();
            if elapsed < interval {
                thread::sleep(interval - elapsed);
            }
        }
        self.last_read = Some(Instant::now());

        let frame = Frame::from_u8(self.width, self.height, 3, self.render())?
            .with_sequence(self.sequence);
        self.sequence += 1;
        Ok(frame)
    }

    fn close(&mut self) {
        if !self.closed {
            debug!("Pattern source closed after {} frames", self.sequence);
            self.closed = true;
        }
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_advance() {
        let mut source = PatternSource::new(64, 4).unwrap();
        let a = source.read_frame().unwrap();
        let b = source.read_frame().unwrap();
        assert_eq!((a.sequence(), b.sequence()), (0, 1));
        assert!(!a.sample_eq(&b));
    }

    #[test]
    fn closed_source_reads_nothing() {
        let mut source = PatternSource::new(8, 8).unwrap();
        source.close();
        source.close();
        assert!(source.read_frame().is_err());
    }

    #[test]
    fn bar_position_wraps_for_long_runs() {
        let mut source = PatternSource::new(10, 2).unwrap();
        source.sequence = u64::MAX - 1;
        let frame = source.read_frame().unwrap();
        assert_eq!(frame.sequence(), u64::MAX - 1);
        assert_eq!(frame.len(), 60);

        // same bar position as a sequence with the same residue
        source.sequence = 4;
        let near = source.render();
        source.sequence = 14;
        let far = source.render();
        let bar = |data: &[u8]| data.chunks_exact(3).position(|px| px == [255, 255, 255]);
        assert_eq!(bar(&near), bar(&far));
        assert_eq!(bar(&near), Some(6));
    }

    #[test]
    fn zero_resolution_is_unavailable() {
        assert!(PatternSource::new(0, 10).is_err());
    }
}
