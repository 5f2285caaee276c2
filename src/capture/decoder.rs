use color_eyre::{eyre::eyre, Result};
use jpeg_decoder::Decoder;

use super::frame::{Frame, PixelFormat};

/// Turn a device payload into a displayable u8 frame.
///
/// MJPEG carries its own geometry; the other formats rely on `width`/`height`.
pub fn decode_frame(data: &[u8], format: PixelFormat, width: u32, height: u32) -> Result<Frame> {
    match format {
        PixelFormat::Mjpeg => {
            let mut decoder = Decoder::new(data);
            let pixels = decoder.decode()?;
            let info = decoder
                .info()
                .ok_or_else(|| eyre!("JPEG decoder produced no image info"))?;
            let channels = match info.pixel_format {
                jpeg_decoder::PixelFormat::L8 => 1,
                jpeg_decoder::PixelFormat::RGB24 => 3,
                other => return Err(eyre!("Unsupported JPEG pixel format: {:?}", other)),
            };
            Ok(Frame::from_u8(
                info.width as u32,
                info.height as u32,
                channels,
                pixels,
            )?)
        }
        PixelFormat::Rgb24 | PixelFormat::Gray8 => {
            Ok(Frame::from_u8(width, height, format.channels(), data.to_vec())?)
        }
        PixelFormat::Bgr24 => {
            let mut rgb = data.to_vec();
            for px in rgb.chunks_exact_mut(3) {
                px.swap(0, 2);
            }
            Ok(Frame::from_u8(width, height, 3, rgb)?)
        }
        PixelFormat::Yuyv4 => Ok(Frame::from_u8(width, height, 3, yuyv_to_rgb(data))?),
    }
}

/// YUYV 4:2:2 to packed RGB24 (BT.601, studio range).
pub fn yuyv_to_rgb(data: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(data.len() / 2 * 3);
    for chunk in data.chunks_exact(4) {
        let (y0, u, y1, v) = (chunk[0], chunk[1], chunk[2], chunk[3]);
        for y in [y0, y1] {
            rgb.extend_from_slice(&yuv_pixel(y, u, v));
        }
    }
    rgb
}

fn yuv_pixel(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;

    let clamp = |x: i32| ((x + 128) >> 8).clamp(0, 255) as u8;
    [
        clamp(298 * c + 409 * e),
        clamp(298 * c - 100 * d - 208 * e),
        clamp(298 * c + 516 * d),
    ]
}
