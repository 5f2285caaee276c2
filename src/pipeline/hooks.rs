//! Pluggable stage hooks injected into the engine
//!
//! Every hook has a default, so an application only supplies the stages it
//! cares about:
//!
//! ```no_run
//! use liveproc::{transforms, Hooks};
//!
//! let hooks = Hooks::new()
//!     .convert(|raw| transforms::grayscale(raw))
//!     .process(|input, _prev| transforms::gaussian_blur(input, 8.0));
//! ```

use std::thread;
use std::time::Duration;

use color_eyre::Result;

use crate::capture::Frame;
use crate::display::{annotate, Viewer};

pub type ConvertFn = Box<dyn FnMut(&Frame) -> Result<Frame>>;
/// Runs on the worker thread, hence `Send`.
pub type ProcessFn = Box<dyn FnMut(&Frame, &Frame) -> Result<Frame> + Send>;
pub type DisplayFn = Box<dyn FnMut(DisplayContext<'_>) -> Result<()>>;
pub type UpdateFn = Box<dyn FnMut(&Frame, &Frame) -> Result<Frame>>;

/// Everything the display hook may read, plus the viewer to render through.
///
/// `result_buf` is the result of the task launched one iteration earlier;
/// the task launched this iteration is still running while the hook executes.
pub struct DisplayContext<'a> {
    pub result_buf: &'a Frame,
    pub input: &'a Frame,
    pub prev_input: &'a Frame,
    pub raw_input: &'a Frame,
    pub fps: u32,
    pub frame_count: u64,
    pub viewer: &'a mut dyn Viewer,
}

/// The four stage hooks: convert, process, display and update-reference.
pub struct Hooks {
    pub(crate) convert: ConvertFn,
    /// `None` selects the default hook, parameterised by the pipeline config
    pub(crate) process: Option<ProcessFn>,
    pub(crate) display: DisplayFn,
    pub(crate) update_reference: UpdateFn,
}

impl Default for Hooks {
    fn default() -> Self {
        Self::new()
    }
}

impl Hooks {
    pub fn new() -> Self {
        Self {
            convert: Box::new(default_convert),
            process: None,
            display: Box::new(default_display),
            update_reference: Box::new(default_update_reference),
        }
    }

    /// Turn a raw source frame into the working format.
    pub fn convert<F>(mut self, f: F) -> Self
    where
        F: FnMut(&Frame) -> Result<Frame> + 'static,
    {
        self.convert = Box::new(f);
        self
    }

    /// Compute the result from `(input, prev_input)` on the worker thread.
    pub fn process<F>(mut self, f: F) -> Self
    where
        F: FnMut(&Frame, &Frame) -> Result<Frame> + Send + 'static,
    {
        self.process = Some(Box::new(f));
        self
    }

    /// Render something; runs while the next result is being processed.
    pub fn display<F>(mut self, f: F) -> Self
    where
        F: FnMut(DisplayContext<'_>) -> Result<()> + 'static,
    {
        self.display = Box::new(f);
        self
    }

    /// Produce the next reference frame from `(input, prev_input)`.
    pub fn update_reference<F>(mut self, f: F) -> Self
    where
        F: FnMut(&Frame, &Frame) -> Result<Frame> + 'static,
    {
        self.update_reference = Box::new(f);
        self
    }

    /// Split off the process hook, falling back to the default one.
    pub(crate) fn take_process(&mut self, default_delay: Duration) -> ProcessFn {
        match self.process.take() {
            Some(process) => process,
            None => Box::new(default_process(default_delay)),
        }
    }
}

pub fn default_convert(raw: &Frame) -> Result<Frame> {
    Ok(raw.clone())
}

/// Identity with an artificial delay standing in for real work.
pub fn default_process(
    delay: Duration,
) -> impl FnMut(&Frame, &Frame) -> Result<Frame> + Send + 'static {
    move |input, _prev_input| {
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        Ok(input.clone())
    }
}

/// Show `result_buf` annotated with the frame rate.
pub fn default_display(ctx: DisplayContext<'_>) -> Result<()> {
    let annotated = annotate(ctx.result_buf, &[format!("FPS: {}", ctx.fps)]);
    ctx.viewer.show("Output", &annotated)
}

/// Track the current frame exactly.
pub fn default_update_reference(input: &Frame, _prev_input: &Frame) -> Result<Frame> {
    Ok(input.clone())
}
