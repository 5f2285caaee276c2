use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use color_eyre::eyre::eyre;
use liveproc::display::HeadlessViewer;
use liveproc::{
    Config, ExitReason, Frame, FrameSource, Hooks, PipelineConfig, PipelineEngine,
    PipelineError, QuitSignal,
};

/// Yields frames whose every sample (and sequence number) is the read index,
/// failing on the `fail_on`-th read (1-based).
struct ScriptedSource {
    reads: u64,
    fail_on: Option<u64>,
    closes: Arc<AtomicUsize>,
}

impl ScriptedSource {
    fn new(fail_on: Option<u64>) -> (Self, Arc<AtomicUsize>) {
        let closes = Arc::new(AtomicUsize::new(0));
        let source = Self {
            reads: 0,
            fail_on,
            closes: closes.clone(),
        };
        (source, closes)
    }
}

impl FrameSource for ScriptedSource {
    fn read_frame(&mut self) -> Result<Frame, PipelineError> {
        self.reads += 1;
        if self.fail_on == Some(self.reads) {
            return Err(PipelineError::read_failure("scripted"));
        }
        let index = self.reads - 1;
        Ok(Frame::filled(8, 4, 1, index as u8)
            .unwrap()
            .with_sequence(index))
    }

    fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }

    fn identifier(&self) -> &str {
        "scripted"
    }
}

fn pipeline_config(max_frames: Option<u64>) -> PipelineConfig {
    PipelineConfig {
        process_delay_ms: 0,
        max_frames,
        log_every: 0,
        ..PipelineConfig::default()
    }
}

fn engine(
    source: ScriptedSource,
    hooks: Hooks,
    max_frames: Option<u64>,
) -> PipelineEngine<ScriptedSource> {
    let viewer = Box::new(HeadlessViewer::new());
    PipelineEngine::with_source(source, hooks, viewer, pipeline_config(max_frames)).unwrap()
}

#[test]
fn first_update_sees_identical_input_and_reference() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    let hooks = Hooks::new().update_reference(move |input, prev| {
        log.lock().unwrap().push(input.sample_eq(prev));
        Ok(input.clone())
    });

    let (source, _) = ScriptedSource::new(None);
    let summary = engine(source, hooks, Some(3)).run().unwrap();

    assert_eq!(summary.exit, ExitReason::FrameLimit);
    assert_eq!(summary.frames, 3);
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert!(seen[0], "warm-up must leave input == prev_input");
    // afterwards prev_input lags input by one frame
    assert!(!seen[1]);
}

#[test]
fn at_most_one_process_task_in_flight() {
    let active = Arc::new(AtomicUsize::new(0));
    let max_seen = Arc::new(AtomicUsize::new(0));
    let (a, m) = (active.clone(), max_seen.clone());
    let hooks = Hooks::new().process(move |input, _| {
        let now = a.fetch_add(1, Ordering::SeqCst) + 1;
        m.fetch_max(now, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(2));
        a.fetch_sub(1, Ordering::SeqCst);
        Ok(input.clone())
    });

    let (source, _) = ScriptedSource::new(None);
    engine(source, hooks, Some(25)).run().unwrap();

    assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    assert_eq!(active.load(Ordering::SeqCst), 0);
}

#[test]
fn display_shows_previous_iterations_result() {
    // (frame_count, result_buf sequence, input sequence)
    let shown = Arc::new(Mutex::new(Vec::new()));
    let log = shown.clone();
    let hooks = Hooks::new()
        .process(|input, _| Ok(input.clone()))
        .display(move |ctx| {
            log.lock().unwrap().push((
                ctx.frame_count,
                ctx.result_buf.sequence(),
                ctx.input.sequence(),
            ));
            ctx.viewer.show("Output", ctx.result_buf)
        });

    let (source, _) = ScriptedSource::new(None);
    engine(source, hooks, Some(6)).run().unwrap();

    let shown = shown.lock().unwrap();
    assert_eq!(shown.len(), 6);
    // iteration 1 displays F0 while F1 is being processed
    assert_eq!(shown[0], (1, 0, 1));
    for window in shown.windows(2) {
        let (_, _, prev_input) = window[0];
        let (_, result_buf, _) = window[1];
        assert_eq!(result_buf, prev_input);
    }
}

#[test]
fn result_buf_is_never_a_partial_result() {
    let hooks = Hooks::new()
        .process(|input, _| {
            // a result built slowly and published whole
            let value = input.as_u8().unwrap()[0];
            thread::sleep(Duration::from_millis(1));
            Ok(Frame::filled(8, 4, 1, value.wrapping_add(100))?.with_sequence(input.sequence()))
        })
        .display(|ctx| {
            let data = ctx.result_buf.as_u8().unwrap();
            assert!(data.iter().all(|&v| v == data[0]));
            assert_eq!(data[0], (ctx.result_buf.sequence() as u8).wrapping_add(100));
            ctx.viewer.show("Output", ctx.result_buf)
        });

    let (source, _) = ScriptedSource::new(None);
    engine(source, hooks, Some(10)).run().unwrap();
}

#[test]
fn read_failure_shuts_down_cleanly() {
    let launched = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicUsize::new(0));
    let displays = Arc::new(AtomicUsize::new(0));
    let (l, f, d) = (launched.clone(), finished.clone(), displays.clone());
    let hooks = Hooks::new()
        .process(move |input, _| {
            l.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(5));
            f.fetch_add(1, Ordering::SeqCst);
            Ok(input.clone())
        })
        .display(move |ctx| {
            d.fetch_add(1, Ordering::SeqCst);
            ctx.viewer.show("Output", ctx.result_buf)
        });

    let (source, closes) = ScriptedSource::new(Some(5));
    let report = engine(source, hooks, None).run().unwrap_err();

    assert!(matches!(
        report.downcast_ref::<PipelineError>(),
        Some(PipelineError::FrameReadFailure { .. })
    ));
    // reads 1-2 warm up, 3-4 feed iterations 1-2, read 5 fails inside iteration 3
    assert_eq!(displays.load(Ordering::SeqCst), 3);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    // warm-up pass plus one task per iteration, all joined
    assert_eq!(launched.load(Ordering::SeqCst), 4);
    assert_eq!(finished.load(Ordering::SeqCst), 4);
}

#[test]
fn quit_during_display_stops_after_await() {
    let quit = QuitSignal::new();
    let trigger = quit.clone();
    let launched = Arc::new(AtomicUsize::new(0));
    let l = launched.clone();
    let hooks = Hooks::new()
        .process(move |input, _| {
            l.fetch_add(1, Ordering::SeqCst);
            Ok(input.clone())
        })
        .display(move |ctx| {
            if ctx.frame_count == 3 {
                trigger.trigger();
            }
            ctx.viewer.show("Output", ctx.result_buf)
        });

    let (source, closes) = ScriptedSource::new(None);
    let summary = engine(source, hooks, None)
        .with_quit_signal(quit)
        .run()
        .unwrap();

    assert_eq!(summary.exit, ExitReason::Quit);
    assert_eq!(summary.frames, 3);
    // no LAUNCH for iteration 4
    assert_eq!(launched.load(Ordering::SeqCst), 4);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[test]
fn hook_errors_propagate_after_shutdown() {
    let calls = Arc::new(AtomicUsize::new(0));
    let c = calls.clone();
    let hooks = Hooks::new().process(move |input, _| {
        if c.fetch_add(1, Ordering::SeqCst) == 2 {
            return Err(eyre!("process exploded"));
        }
        Ok(input.clone())
    });

    let (source, closes) = ScriptedSource::new(None);
    let report = engine(source, hooks, None).run().unwrap_err();
    assert_eq!(report.to_string(), "process exploded");
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[test]
fn convert_errors_abort_warm_up() {
    let hooks = Hooks::new().convert(|_| Err(eyre!("bad frame")));
    let (source, closes) = ScriptedSource::new(None);
    let report = engine(source, hooks, None).run().unwrap_err();
    assert_eq!(report.to_string(), "bad frame");
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[test]
fn update_policy_is_pluggable() {
    let references = Arc::new(Mutex::new(Vec::new()));
    let log = references.clone();
    let hooks = Hooks::new()
        .update_reference(|input, _| Ok(Frame::filled(input.width(), input.height(), 1, 200)?))
        .process(move |input, prev| {
            log.lock().unwrap().push(prev.as_u8().unwrap()[0]);
            Ok(input.clone())
        });

    let (source, _) = ScriptedSource::new(None);
    engine(source, hooks, Some(4)).run().unwrap();

    let references = references.lock().unwrap();
    // warm-up uses the frame itself, every later task sees the hook's output
    assert_eq!(references[0], 0);
    assert!(references[1..].iter().all(|&v| v == 200));
}

#[test]
fn fps_follows_the_paced_frame_rate() {
    // (frame_count, fps) as seen by the display hook
    let rates = Arc::new(Mutex::new(Vec::new()));
    let log = rates.clone();
    let hooks = Hooks::new()
        .process(|input, _| {
            thread::sleep(Duration::from_millis(10));
            Ok(input.clone())
        })
        .display(move |ctx| {
            log.lock().unwrap().push((ctx.frame_count, ctx.fps));
            ctx.viewer.show("Output", ctx.result_buf)
        });

    let (source, _) = ScriptedSource::new(None);
    let summary = engine(source, hooks, Some(8)).run().unwrap();
    assert_eq!(summary.frames, 8);

    let rates = rates.lock().unwrap();
    assert_eq!(rates.len(), 8);
    for &(frame_count, fps) in rates.iter().skip(1) {
        // every finished iteration took at least one 10 ms process task
        let ceiling = frame_count as f64 / ((frame_count - 1) as f64 * 0.010);
        assert!(
            fps as f64 <= ceiling,
            "fps {fps} above {ceiling} at frame {frame_count}"
        );
    }

    let expected = summary.frames as f64 / summary.elapsed.as_secs_f64();
    assert!(summary.fps as f64 <= expected.floor());
    assert!(summary.fps as f64 >= expected * 0.8 - 1.0);
    assert!(summary.fps <= 100);
}

#[test]
fn opens_configured_pattern_source() {
    let mut config = Config::default();
    config.source.identifier = "pattern".into();
    config.source.width = Some(64);
    config.source.height = Some(48);
    config.pipeline = pipeline_config(Some(4));

    let summary = PipelineEngine::open(&config, Hooks::new(), Box::new(HeadlessViewer::new()))
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(summary.exit, ExitReason::FrameLimit);
    assert_eq!(summary.frames, 4);
}

#[test]
fn unavailable_source_fails_at_construction() {
    let mut config = Config::default();
    config.source.identifier = "/definitely/not/a/source".into();

    let report = PipelineEngine::open(&config, Hooks::new(), Box::new(HeadlessViewer::new()))
        .err()
        .unwrap();
    assert!(matches!(
        report.downcast_ref::<PipelineError>(),
        Some(PipelineError::SourceUnavailable { .. })
    ));
}
