//! The capture / process / display run loop

use std::time::{Duration, Instant};

use color_eyre::Result;
use tracing::{debug, info, instrument, warn};

use crate::capture::{open_source, Frame, FrameSource};
use crate::display::Viewer;
use crate::error::PipelineError;
use crate::pipeline::buffers::BufferSet;
use crate::pipeline::fps::FpsCounter;
use crate::pipeline::hooks::Hooks;
use crate::pipeline::quit::QuitSignal;
use crate::pipeline::worker::ProcessWorker;
use crate::{Config, PipelineConfig};

/// Why the loop stopped without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The quit signal or the viewer asked to stop
    Quit,
    /// `max_frames` iterations completed
    FrameLimit,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub frames: u64,
    pub elapsed: Duration,
    pub fps: u32,
    pub exit: ExitReason,
}

/// Overlaps display and capture on the calling thread with the process hook
/// running on a worker thread.
///
/// Every iteration runs UPDATE, ROTATE, LAUNCH, DISPLAY, CAPTURE and AWAIT in
/// that order. The process task launched in one iteration is awaited before
/// the next one starts, so at most one task is ever in flight and `input` /
/// `prev_input` are never replaced while the worker reads them. The display
/// stage therefore shows the result of the previous iteration's task.
///
/// There is no timeout: a process hook that never returns stalls the loop.
pub struct PipelineEngine<S: FrameSource = Box<dyn FrameSource>> {
    source: S,
    source_open: bool,
    hooks: Hooks,
    worker: ProcessWorker,
    viewer: Box<dyn Viewer>,
    quit: QuitSignal,
    fps: FpsCounter,
    config: PipelineConfig,
    shut_down: bool,
}

impl PipelineEngine<Box<dyn FrameSource>> {
    /// Open the configured source and build an engine around it.
    pub fn open(config: &Config, hooks: Hooks, viewer: Box<dyn Viewer>) -> Result<Self> {
        let source = open_source(&config.source)?;
        Self::with_source(source, hooks, viewer, config.pipeline.clone())
    }
}

impl<S: FrameSource> PipelineEngine<S> {
    pub fn with_source(
        source: S,
        mut hooks: Hooks,
        viewer: Box<dyn Viewer>,
        config: PipelineConfig,
    ) -> Result<Self> {
        let worker = ProcessWorker::spawn(hooks.take_process(config.process_delay()))?;
        Ok(Self {
            source,
            source_open: true,
            hooks,
            worker,
            viewer,
            quit: QuitSignal::new(),
            fps: FpsCounter::new(config.fps_mode),
            config,
            shut_down: false,
        })
    }

    /// Use an externally owned quit signal
    pub fn with_quit_signal(mut self, quit: QuitSignal) -> Self {
        self.quit = quit;
        self
    }

    pub fn quit_signal(&self) -> QuitSignal {
        self.quit.clone()
    }

    /// Warm up, loop until quit / frame limit / failure, then shut down.
    ///
    /// A [`PipelineError::FrameReadFailure`] or a failing hook ends the loop;
    /// the error is returned after the in-flight task was awaited and all
    /// resources were released.
    pub fn run(mut self) -> Result<RunSummary> {
        let outcome = self.run_loop();
        self.shutdown();

        let exit = outcome?;
        let summary = RunSummary {
            frames: self.fps.frame_count(),
            elapsed: self.fps.start_time().elapsed(),
            fps: self.fps.fps(),
            exit,
        };
        info!(
            frames = summary.frames,
            fps = summary.fps,
            "Processing loop finished: {:?}",
            summary.exit
        );
        Ok(summary)
    }

    fn run_loop(&mut self) -> Result<ExitReason> {
        let mut buffers = self.warm_up()?;

        self.fps.start();
        info!(mode = ?self.fps.mode(), "Processing loop started!");
        loop {
            if let Some(exit) = self.iterate(&mut buffers)? {
                return Ok(exit);
            }
        }
    }

    /// Seed the buffers so the first iteration has a result, a reference and
    /// a staged frame to work with.
    #[instrument(skip_all)]
    fn warm_up(&mut self) -> Result<BufferSet> {
        let raw = self.read_frame()?;
        let converted = (self.hooks.convert)(&raw)?;

        // synchronous first pass, input doubles as its own reference
        self.worker.launch(converted.clone(), converted.clone())?;
        let result = self.worker.wait()?;

        let mut buffers = BufferSet::warm_up(raw, converted, result);
        self.capture(&mut buffers)?;
        debug!("Warm-up complete");
        Ok(buffers)
    }

    fn iterate(&mut self, buffers: &mut BufferSet) -> Result<Option<ExitReason>> {
        self.fps.tick();
        let frame_count = self.fps.frame_count();

        // UPDATE
        let reference = (self.hooks.update_reference)(buffers.input(), buffers.prev_input())?;
        buffers.set_reference(reference);

        // ROTATE
        buffers.rotate()?;

        // LAUNCH
        let (input, prev_input) = buffers.process_inputs();
        self.worker.launch(input, prev_input)?;

        // DISPLAY, overlapping the process task
        let fps = self.fps.fps();
        let started = Instant::now();
        let ctx = buffers.display_context(fps, frame_count, self.viewer.as_mut());
        (self.hooks.display)(ctx)?;
        metrics::histogram!("liveproc_display_time_us")
            .record(started.elapsed().as_micros() as f64);

        // CAPTURE
        self.capture(buffers)?;
        let quit = self.quit_requested();

        // AWAIT
        let result = self.worker.wait()?;
        buffers.store_result(result);
        metrics::counter!("liveproc_frames_total").increment(1);

        if self.config.log_every > 0 && frame_count % self.config.log_every == 0 {
            info!(frames = frame_count, fps, "Pipeline running");
        }

        if quit {
            info!("Quit requested after {} frames", frame_count);
            return Ok(Some(ExitReason::Quit));
        }
        if self.config.max_frames.is_some_and(|max| frame_count >= max) {
            return Ok(Some(ExitReason::FrameLimit));
        }
        Ok(None)
    }

    /// Fetch the next raw frame and stage its converted form.
    fn capture(&mut self, buffers: &mut BufferSet) -> Result<()> {
        let raw = self.read_frame()?;
        let converted = (self.hooks.convert)(&raw)?;
        buffers.stage_input(raw, converted);
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Frame, PipelineError> {
        if !self.source_open {
            return Err(PipelineError::read_failure(self.source.identifier()));
        }
        self.source.read_frame().map_err(|e| {
            warn!("{}", e);
            e
        })
    }

    fn quit_requested(&mut self) -> bool {
        // always pump viewer events, even when the signal is already set
        let viewer_quit = self.viewer.poll_quit();
        viewer_quit || self.quit.is_triggered()
    }

    /// Await the in-flight task, release the source and the display.
    fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        info!("Exiting ...");

        self.worker.shutdown();
        if self.source_open {
            self.source.close();
            self.source_open = false;
        }
        self.viewer.close();
        info!("Done!");
    }
}

impl<S: FrameSource> Drop for PipelineEngine<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
