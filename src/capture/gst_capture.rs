//! GStreamer-backed source for URLs (IP cameras, HTTP MJPEG feeds, files)

use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use tracing::{debug, info, warn};

use crate::capture::{Frame, FrameSource};
use crate::error::PipelineError;
use crate::SourceConfig;

pub struct GstSource {
    identifier: String,
    pipeline: gst::Pipeline,
    appsink: gst_app::AppSink,
    sequence: u64,
    closed: bool,
}

impl GstSource {
    /// Build a `uridecodebin` pipeline delivering RGB frames and start it
    pub fn new(url: &str, config: &SourceConfig) -> Result<Self, PipelineError> {
        let unavailable = |reason: String| PipelineError::unavailable(url, reason);

        gst::init().map_err(|e| unavailable(format!("failed to initialize GStreamer: {e}")))?;

        let pipeline_str = Self::build_pipeline_string(url, config);
        info!("Pipeline: {}", pipeline_str);

        let pipeline = gst::parse::launch(&pipeline_str)
            .map_err(|e| unavailable(e.to_string()))?
            .downcast::<gst::Pipeline>()
            .map_err(|_| unavailable("failed to create pipeline".into()))?;

        let appsink = pipeline
            .by_name("appsink")
            .ok_or_else(|| unavailable("failed to find appsink element".into()))?
            .downcast::<gst_app::AppSink>()
            .map_err(|_| unavailable("failed to cast to AppSink".into()))?;

        appsink.set_property("emit-signals", false);
        appsink.set_property("max-buffers", 2u32);
        appsink.set_property("drop", true); // Drop old buffers if we can't keep up
        appsink.set_property("sync", false);

        pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| unavailable(format!("failed to start pipeline: {e:?}")))?;

        // Fails fast on unreachable URLs instead of on the first read
        let (state_change, _, _) = pipeline.state(Some(gst::ClockTime::from_seconds(5)));
        if state_change.is_err() {
            let _ = pipeline.set_state(gst::State::Null);
            return Err(unavailable("pipeline did not reach PLAYING".into()));
        }

        Ok(Self {
            identifier: url.to_string(),
            pipeline,
            appsink,
            sequence: 0,
            closed: false,
        })
    }

    fn build_pipeline_string(url: &str, config: &SourceConfig) -> String {
        let caps = match config.resolution() {
            Some((w, h)) => format!("video/x-raw,format=RGB,width={w},height={h}"),
            None => "video/x-raw,format=RGB".to_string(),
        };
        format!(
            "uridecodebin uri={url} ! \
             queue max-size-buffers=2 max-size-time=0 max-size-bytes=0 ! \
             videoconvert ! videoscale ! {caps} ! \
             appsink name=appsink"
        )
    }
}

impl FrameSource for GstSource {
    fn read_frame(&mut self) -> Result<Frame, PipelineError> {
        let read_failure = || PipelineError::read_failure(&self.identifier);
        if self.closed {
            return Err(read_failure());
        }

        // Blocks until a sample arrives; fails on EOS
        let sample = self.appsink.pull_sample().map_err(|_| read_failure())?;
        let buffer = sample.buffer().ok_or_else(read_failure)?;
        let map = buffer.map_readable().map_err(|_| read_failure())?;
        let caps = sample.caps().ok_or_else(read_failure)?;
        let info = gst_video::VideoInfo::from_caps(caps).map_err(|_| read_failure())?;

        let (width, height) = (info.width(), info.height());
        let stride = info.stride()[0] as usize;
        let row = width as usize * 3;
        let mut data = Vec::with_capacity(row * height as usize);
        for line in map.as_slice().chunks(stride).take(height as usize) {
            data.extend_from_slice(&line[..row.min(line.len())]);
        }

        let frame = Frame::from_u8(width, height, 3, data).map_err(|e| {
            warn!("Malformed sample: {}", e);
            read_failure()
        })?;
        self.sequence += 1;
        Ok(frame.with_sequence(self.sequence))
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            warn!("Failed to stop pipeline: {:?}", e);
        } else {
            debug!("Stopped GStreamer pipeline for {}", self.identifier);
        }
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

impl Drop for GstSource {
    fn drop(&mut self) {
        self.close();
    }
}
