pub mod buffers;
pub mod engine;
pub mod fps;
pub mod hooks;
pub mod quit;
pub mod worker;

pub use buffers::BufferSet;
pub use engine::{ExitReason, PipelineEngine, RunSummary};
pub use fps::{FpsCounter, FpsMode};
pub use hooks::{DisplayContext, Hooks};
pub use quit::QuitSignal;
pub use worker::ProcessWorker;
