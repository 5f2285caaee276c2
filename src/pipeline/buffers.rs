//! The named frame slots and their hand-off rules

use crate::capture::Frame;
use crate::display::Viewer;
use crate::error::PipelineError;
use crate::pipeline::hooks::DisplayContext;

/// Slots shared by the stages of one iteration.
///
/// Each slot has a single writer:
/// - `raw_input`, `input_buf`: capture (main thread)
/// - `prev_input`: update-reference hook
/// - `input`, `result_buf`: rotation
/// - `result`: the process task, stored only after it was awaited
///
/// Frames are immutable, so the worker gets its own handles to `input` and
/// `prev_input` while the main thread keeps reading them for display.
#[derive(Debug)]
pub struct BufferSet {
    raw_input: Frame,
    input: Frame,
    prev_input: Frame,
    result: Frame,
    input_buf: Option<Frame>,
    result_buf: Frame,
}

impl BufferSet {
    /// Seed every slot from the first captured frame and its processed result.
    ///
    /// `input` and `prev_input` start out identical.
    pub fn warm_up(raw_input: Frame, converted: Frame, result: Frame) -> Self {
        Self {
            raw_input,
            prev_input: converted.clone(),
            input: converted,
            result_buf: result.clone(),
            result,
            input_buf: None,
        }
    }

    pub fn raw_input(&self) -> &Frame {
        &self.raw_input
    }

    pub fn input(&self) -> &Frame {
        &self.input
    }

    pub fn prev_input(&self) -> &Frame {
        &self.prev_input
    }

    pub fn result(&self) -> &Frame {
        &self.result
    }

    pub fn result_buf(&self) -> &Frame {
        &self.result_buf
    }

    pub fn input_buf(&self) -> Option<&Frame> {
        self.input_buf.as_ref()
    }

    /// Replace the reference frame with the update hook's output
    pub fn set_reference(&mut self, prev_input: Frame) {
        self.prev_input = prev_input;
    }

    /// Move the staged input into `input` and publish `result` for display.
    pub fn rotate(&mut self) -> Result<(), PipelineError> {
        self.input = self.input_buf.take().ok_or(PipelineError::NothingStaged)?;
        self.result_buf = self.result.clone();
        Ok(())
    }

    /// Record a freshly captured frame and its converted form.
    pub fn stage_input(&mut self, raw_input: Frame, converted: Frame) {
        self.raw_input = raw_input;
        self.input_buf = Some(converted);
    }

    /// Store the output of a completed process task
    pub fn store_result(&mut self, result: Frame) {
        self.result = result;
    }

    /// Handles to `(input, prev_input)` for the process task
    pub fn process_inputs(&self) -> (Frame, Frame) {
        (self.input.clone(), self.prev_input.clone())
    }

    pub fn display_context<'a>(
        &'a self,
        fps: u32,
        frame_count: u64,
        viewer: &'a mut dyn Viewer,
    ) -> DisplayContext<'a> {
        DisplayContext {
            result_buf: &self.result_buf,
            input: &self.input,
            prev_input: &self.prev_input,
            raw_input: &self.raw_input,
            fps,
            frame_count,
            viewer,
        }
    }
}
