//! Single-slot process task running on a reusable worker thread

use std::thread::{self, JoinHandle};
use std::time::Instant;

use color_eyre::{eyre::eyre, Result};
use flume::{Receiver, Sender};
use tracing::{debug, warn};

use crate::capture::Frame;
use crate::error::PipelineError;
use crate::pipeline::hooks::ProcessFn;

struct Job {
    input: Frame,
    prev_input: Frame,
}

/// One worker thread, at most one task in flight.
///
/// `launch` hands a task to the thread and `wait` blocks until its result is
/// back. A second `launch` before the matching `wait` is refused with
/// [`PipelineError::WorkerBusy`].
pub struct ProcessWorker {
    jobs: Option<Sender<Job>>,
    results: Receiver<Result<Frame>>,
    handle: Option<JoinHandle<()>>,
    in_flight: bool,
}

impl ProcessWorker {
    pub fn spawn(mut process: ProcessFn) -> Result<Self> {
        let (job_tx, job_rx) = flume::bounded::<Job>(1);
        let (result_tx, result_rx) = flume::bounded(1);

        let handle = thread::Builder::new()
            .name("liveproc-process".into())
            .spawn(move || {
                for job in job_rx.iter() {
                    let started = Instant::now();
                    let outcome = process(&job.input, &job.prev_input);
                    metrics::histogram!("liveproc_process_time_us")
                        .record(started.elapsed().as_micros() as f64);
                    if result_tx.send(outcome).is_err() {
                        break;
                    }
                }
                debug!("Process worker exiting");
            })?;

        Ok(Self {
            jobs: Some(job_tx),
            results: result_rx,
            handle: Some(handle),
            in_flight: false,
        })
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    /// Start processing `input` against `prev_input` in the background.
    pub fn launch(&mut self, input: Frame, prev_input: Frame) -> Result<(), PipelineError> {
        if self.in_flight {
            return Err(PipelineError::WorkerBusy);
        }
        let jobs = self.jobs.as_ref().ok_or(PipelineError::WorkerGone)?;
        jobs.send(Job { input, prev_input })
            .map_err(|_| PipelineError::WorkerGone)?;
        self.in_flight = true;
        Ok(())
    }

    /// Block until the in-flight task finishes and return what it produced.
    pub fn wait(&mut self) -> Result<Frame> {
        if !self.in_flight {
            return Err(eyre!("no process task in flight"));
        }
        self.in_flight = false;
        match self.results.recv() {
            Ok(outcome) => outcome,
            Err(_) => Err(PipelineError::WorkerGone.into()),
        }
    }

    /// Await any in-flight task, then stop and join the thread.
    pub fn shutdown(&mut self) {
        if self.in_flight {
            if let Err(e) = self.wait() {
                debug!("Discarding result of final process task: {}", e);
            }
        }
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Process worker panicked");
            }
        }
    }
}

impl Drop for ProcessWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
