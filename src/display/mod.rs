pub mod annotate;
pub mod headless;

#[cfg(feature = "sdl-display")]
pub mod display;

use color_eyre::Result;

use crate::capture::Frame;
use crate::{DisplayBackend, DisplayConfig};

pub use annotate::annotate;
pub use headless::HeadlessViewer;

#[cfg(feature = "sdl-display")]
pub use display::Sdl2Viewer;

/// Output device the display hook renders through.
pub trait Viewer {
    /// Present `frame` in the window called `window`, creating it on first use.
    fn show(&mut self, window: &str, frame: &Frame) -> Result<()>;

    /// True once the user asked to quit (window closed, `q`, `Esc`).
    fn poll_quit(&mut self) -> bool;

    /// Release windows and any other display resources.
    fn close(&mut self);
}

/// Build the viewer selected by `config.backend`.
pub fn open_viewer(config: &DisplayConfig) -> Result<Box<dyn Viewer>> {
    match config.backend {
        DisplayBackend::Headless => Ok(Box::new(HeadlessViewer::new())),
        #[cfg(feature = "sdl-display")]
        DisplayBackend::Sdl => Ok(Box::new(Sdl2Viewer::new(config)?)),
        #[cfg(not(feature = "sdl-display"))]
        DisplayBackend::Sdl => Err(color_eyre::eyre::eyre!(
            "built without the `sdl-display` feature"
        )),
    }
}
