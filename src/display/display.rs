//! SDL2 Window Display Module
//! Opens one SDL2 window per name and renders frames into it as RGB24
//! textures. Closing any window, `q` or `Esc` requests quit.

use std::collections::HashMap;

use color_eyre::{eyre::eyre, Result};
use sdl2::event::{Event, WindowEvent};
use sdl2::keyboard::Scancode;
use sdl2::pixels::PixelFormatEnum;
use sdl2::render::{Canvas, TextureCreator};
use sdl2::video::{Window, WindowContext};
use sdl2::{EventPump, Sdl, VideoSubsystem};
use tracing::{info, instrument};

use crate::capture::Frame;
use crate::display::Viewer;
use crate::DisplayConfig;

struct WindowSlot {
    canvas: Canvas<Window>,
    texture_creator: TextureCreator<WindowContext>,
}

pub struct Sdl2Viewer {
    _sdl: Sdl,
    video: VideoSubsystem,
    event_pump: EventPump,
    windows: HashMap<String, WindowSlot>,
    title: String,
    quit_requested: bool,
}

impl Sdl2Viewer {
    pub fn new(config: &DisplayConfig) -> Result<Self> {
        let sdl = sdl2::init().map_err(|e| eyre!(e))?;
        let video = sdl.video().map_err(|e| eyre!(e))?;
        let event_pump = sdl.event_pump().map_err(|e| eyre!(e))?;
        info!("SDL2 display ready");

        Ok(Self {
            _sdl: sdl,
            video,
            event_pump,
            windows: HashMap::new(),
            title: config.title.clone(),
            quit_requested: false,
        })
    }

    fn window_for(&mut self, name: &str, width: u32, height: u32) -> Result<&mut WindowSlot> {
        if !self.windows.contains_key(name) {
            let window = self
                .video
                .window(&format!("{} - {}", self.title, name), width, height)
                .position_centered()
                .resizable()
                .build()?;
            let canvas = window.into_canvas().present_vsync().build()?;
            let texture_creator = canvas.texture_creator();
            info!("Opened window {:?} ({}x{})", name, width, height);
            self.windows.insert(
                name.to_string(),
                WindowSlot {
                    canvas,
                    texture_creator,
                },
            );
        }
        self.windows
            .get_mut(name)
            .ok_or_else(|| eyre!("window {name} vanished"))
    }
}

/// Expand a frame into packed RGB24 for texture upload.
fn to_rgb24(frame: &Frame) -> Result<Vec<u8>> {
    let frame = frame.to_u8_saturating();
    let data = frame
        .as_u8()
        .ok_or_else(|| eyre!("frame is not 8-bit after conversion"))?;
    match frame.channels() {
        3 => Ok(data.to_vec()),
        1 => Ok(data.iter().flat_map(|&v| [v, v, v]).collect()),
        n => Err(eyre!("cannot display a {n}-channel frame")),
    }
}

impl Viewer for Sdl2Viewer {
    #[instrument(skip(self, frame), fields(seq = frame.sequence()))]
    fn show(&mut self, window: &str, frame: &Frame) -> Result<()> {
        let (width, height) = (frame.width(), frame.height());
        let rgb = to_rgb24(frame)?;
        let slot = self.window_for(window, width, height)?;

        let mut texture = slot
            .texture_creator
            .create_texture_streaming(PixelFormatEnum::RGB24, width, height)
            .map_err(|e| eyre!(e))?;
        texture
            .update(None, &rgb, (width * 3) as usize)
            .map_err(|e| eyre!(e))?;

        slot.canvas.clear();
        slot.canvas
            .copy(&texture, None, None)
            .map_err(|e| eyre!(e))?;
        slot.canvas.present();
        Ok(())
    }

    fn poll_quit(&mut self) -> bool {
        for event in self.event_pump.poll_iter() {
            match event {
                Event::Quit { .. }
                | Event::Window {
                    win_event: WindowEvent::Close,
                    ..
                } => {
                    info!("Quit event received");
                    self.quit_requested = true;
                }
                Event::KeyDown {
                    scancode: Some(Scancode::Q | Scancode::Escape),
                    ..
                } => {
                    info!("Quit key pressed");
                    self.quit_requested = true;
                }
                _ => {}
            }
        }
        self.quit_requested
    }

    fn close(&mut self) {
        if !self.windows.is_empty() {
            info!("Closing {} windows", self.windows.len());
            self.windows.clear();
        }
    }
}
