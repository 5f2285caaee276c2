//! Viewer without a window: logs what would have been shown

use std::collections::HashMap;

use color_eyre::Result;
use tracing::{debug, info};

use crate::capture::Frame;
use crate::display::Viewer;

/// Keeps the last frame per window and counts renders.
#[derive(Default)]
pub struct HeadlessViewer {
    last: HashMap<String, Frame>,
    shown: u64,
    closed: bool,
}

impl HeadlessViewer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of `show` calls
    pub fn shown(&self) -> u64 {
        self.shown
    }

    pub fn last(&self, window: &str) -> Option<&Frame> {
        self.last.get(window)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Viewer for HeadlessViewer {
    fn show(&mut self, window: &str, frame: &Frame) -> Result<()> {
        self.shown += 1;
        debug!(
            window,
            sequence = frame.sequence(),
            width = frame.width(),
            height = frame.height(),
            latency_us = frame.latency().as_micros() as u64,
            "frame shown"
        );
        self.last.insert(window.to_string(), frame.clone());
        Ok(())
    }

    fn poll_quit(&mut self) -> bool {
        false
    }

    fn close(&mut self) {
        if !self.closed {
            info!("Headless viewer closed after {} renders", self.shown);
            self.closed = true;
            self.last.clear();
        }
    }
}
