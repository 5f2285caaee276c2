//! Frame rate accounting for the run loop

use std::collections::VecDeque;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// How the reported frame rate is averaged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FpsMode {
    /// Frames since the loop started divided by the time since it started
    Average,
    /// Rate over the last `window` iterations
    Sliding { window: usize },
}

/// Counts loop iterations and derives frames per second on demand.
///
/// Nothing is cached: every call to [`FpsCounter::fps`] reads the clock.
#[derive(Debug)]
pub struct FpsCounter {
    mode: FpsMode,
    frame_count: u64,
    start_time: Instant,
    recent: VecDeque<Instant>,
}

impl FpsCounter {
    pub fn new(mode: FpsMode) -> Self {
        Self {
            mode,
            frame_count: 0,
            start_time: Instant::now(),
            recent: VecDeque::new(),
        }
    }

    /// Reset the counter and record the loop start time
    pub fn start(&mut self) {
        self.frame_count = 0;
        self.start_time = Instant::now();
        self.recent.clear();
    }

    /// Count one loop iteration
    pub fn tick(&mut self) {
        self.frame_count += 1;
        if let FpsMode::Sliding { window } = self.mode {
            self.recent.push_back(Instant::now());
            while self.recent.len() > window.max(1) + 1 {
                self.recent.pop_front();
            }
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    pub fn mode(&self) -> FpsMode {
        self.mode
    }

    pub fn fps(&self) -> u32 {
        self.fps_at(Instant::now())
    }

    /// Frame rate as seen at `now`, 0 while no time has elapsed.
    pub fn fps_at(&self, now: Instant) -> u32 {
        match self.mode {
            FpsMode::Average => average_fps(self.frame_count, self.start_time, now),
            FpsMode::Sliding { .. } => match (self.recent.front(), self.recent.len()) {
                // fall back to the whole-run average until the window has two ticks
                (Some(&first), n) if n >= 2 => average_fps(n as u64 - 1, first, now),
                _ => average_fps(self.frame_count, self.start_time, now),
            },
        }
    }
}

/// `floor(frames / elapsed)`, guarding the zero-elapsed case.
pub fn average_fps(frames: u64, since: Instant, now: Instant) -> u32 {
    let elapsed = now.saturating_duration_since(since).as_secs_f64();
    if frames == 0 || elapsed <= 0.0 {
        return 0;
    }
    (frames as f64 / elapsed).floor().min(u32::MAX as f64) as u32
}
