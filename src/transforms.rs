//! Ready-made hooks for the demo modes of the binary

use color_eyre::{eyre::eyre, Result};
use image::{imageops, GrayImage, ImageBuffer, Pixel, RgbImage};
use imageproc::filter::median_filter;

use crate::capture::{Frame, PixelDepth};
use crate::display::annotate;
use crate::error::PipelineError;
use crate::pipeline::{DisplayContext, Hooks};

/// RGB to single-channel luma (BT.601 weights). Gray frames pass through.
pub fn grayscale(frame: &Frame) -> Result<Frame> {
    let frame = frame.to_u8_saturating();
    match frame.channels() {
        1 => Ok(frame),
        3 => {
            let data = frame
                .as_u8()
                .ok_or_else(|| eyre!("expected an 8-bit frame"))?;
            let luma: Vec<u8> = data
                .chunks_exact(3)
                .map(|px| ((77 * px[0] as u32 + 150 * px[1] as u32 + 29 * px[2] as u32) >> 8) as u8)
                .collect();
            Ok(Frame::from_u8(frame.width(), frame.height(), 1, luma)?
                .with_sequence(frame.sequence()))
        }
        n => Err(eyre!("cannot convert a {n}-channel frame to grayscale")),
    }
}

fn check_same_geometry(a: &Frame, b: &Frame) -> Result<(), PipelineError> {
    if (a.width(), a.height(), a.channels()) != (b.width(), b.height(), b.channels()) {
        return Err(PipelineError::InvalidFrame(format!(
            "geometry mismatch: {:?} vs {:?}",
            a, b
        )));
    }
    Ok(())
}

/// 255 wherever `|input - reference| > threshold`, 0 elsewhere.
pub fn abs_diff_threshold(input: &Frame, reference: &Frame, threshold: i16) -> Result<Frame> {
    check_same_geometry(input, reference)?;
    let a = input.to_i16();
    let b = reference.to_i16();
    let (a, b) = match (a.as_i16(), b.as_i16()) {
        (Some(a), Some(b)) => (a.to_vec(), b.to_vec()),
        _ => return Err(eyre!("difference needs i16 samples")),
    };

    let mask: Vec<u8> = a
        .iter()
        .zip(&b)
        .map(|(&x, &y)| {
            if (x as i32 - y as i32).abs() > threshold as i32 {
                255
            } else {
                0
            }
        })
        .collect();
    Ok(Frame::from_u8(input.width(), input.height(), input.channels(), mask)?
        .with_sequence(input.sequence()))
}

/// Fraction of non-zero samples, in `0.0..=1.0`.
pub fn activation(mask: &Frame) -> f64 {
    if mask.is_empty() {
        return 0.0;
    }
    let active = match mask.as_u8() {
        Some(data) => data.iter().filter(|&&v| v != 0).count(),
        None => mask.as_i16().map_or(0, |d| d.iter().filter(|&&v| v != 0).count()),
    };
    active as f64 / mask.len() as f64
}

/// Reference update `alpha * prev + (1 - alpha) * input`, for use with
/// [`Hooks::update_reference`]. The blend keeps the input's sample depth.
///
/// The filtered reference is kept at full precision between calls, so it
/// keeps converging on differences smaller than one quantisation step. A
/// `prev` other than the frame returned by the previous call reseeds it.
pub fn exponential_blend(alpha: f32) -> impl FnMut(&Frame, &Frame) -> Result<Frame> + 'static {
    let alpha = alpha.clamp(0.0, 1.0);
    let mut state: Option<(Frame, Vec<f32>)> = None;
    move |input, prev| {
        check_same_geometry(input, prev)?;
        let current = input.to_i16();
        let current = current
            .as_i16()
            .ok_or_else(|| eyre!("blend needs i16 samples"))?;

        let reference = match state.take() {
            Some((emitted, reference)) if emitted.sample_eq(prev) => reference,
            _ => {
                let seed = prev.to_i16();
                seed.as_i16()
                    .ok_or_else(|| eyre!("blend needs i16 samples"))?
                    .iter()
                    .map(|&v| v as f32)
                    .collect()
            }
        };

        let reference: Vec<f32> = reference
            .iter()
            .zip(current)
            .map(|(&old, &cur)| alpha * old + (1.0 - alpha) * cur as f32)
            .collect();
        let rounded: Vec<i16> = reference.iter().map(|v| v.round() as i16).collect();

        let out = Frame::from_i16(input.width(), input.height(), input.channels(), rounded)?
            .with_sequence(input.sequence());
        let out = match input.depth() {
            PixelDepth::U8 => out.to_u8_saturating(),
            PixelDepth::I16 => out,
        };
        state = Some((out.clone(), reference));
        Ok(out)
    }
}

fn to_image<P>(frame: &Frame) -> Result<ImageBuffer<P, Vec<u8>>>
where
    P: Pixel<Subpixel = u8>,
{
    let data = frame
        .as_u8()
        .ok_or_else(|| eyre!("expected an 8-bit frame"))?;
    ImageBuffer::from_raw(frame.width(), frame.height(), data.to_vec())
        .ok_or_else(|| eyre!("frame buffer does not match {}x{}", frame.width(), frame.height()))
}

fn from_image<P>(like: &Frame, image: ImageBuffer<P, Vec<u8>>) -> Result<Frame>
where
    P: Pixel<Subpixel = u8>,
{
    Ok(Frame::from_u8(like.width(), like.height(), like.channels(), image.into_raw())?
        .with_sequence(like.sequence()))
}

/// Run an `image` operation on an 8-bit gray or RGB frame.
fn map_u8<G, C>(frame: &Frame, gray: G, rgb: C) -> Result<Frame>
where
    G: FnOnce(GrayImage) -> GrayImage,
    C: FnOnce(RgbImage) -> RgbImage,
{
    match frame.channels() {
        1 => from_image(frame, gray(to_image(frame)?)),
        3 => from_image(frame, rgb(to_image(frame)?)),
        n => Err(eyre!("unsupported channel count {n}")),
    }
}

/// Gaussian blur with standard deviation `sigma`. 8-bit frames only.
pub fn gaussian_blur(frame: &Frame, sigma: f32) -> Result<Frame> {
    if sigma <= 0.0 || frame.is_empty() {
        return Ok(frame.clone());
    }
    map_u8(
        frame,
        |img| imageops::blur(&img, sigma),
        |img| imageops::blur(&img, sigma),
    )
}

/// Median over a `(2r + 1)²` window. 8-bit frames only.
pub fn median_blur(frame: &Frame, radius: u32) -> Result<Frame> {
    if radius == 0 || frame.is_empty() {
        return Ok(frame.clone());
    }
    map_u8(
        frame,
        |img| median_filter(&img, radius, radius),
        |img| median_filter(&img, radius, radius),
    )
}

const PREWITT_X: [f32; 9] = [1.0, 1.0, 1.0, 0.0, 0.0, 0.0, -1.0, -1.0, -1.0];
const PREWITT_Y: [f32; 9] = [-1.0, 0.0, 1.0, -1.0, 0.0, 1.0, -1.0, 0.0, 1.0];

/// Sum of the two Prewitt responses on a gray frame, each clamped to
/// `0..=255`. The one-pixel border stays black.
pub fn prewitt_edges(frame: &Frame) -> Result<Frame> {
    if frame.channels() != 1 {
        return Err(eyre!("edge detection needs a gray frame"));
    }
    if frame.is_empty() {
        return Ok(frame.clone());
    }
    let gray: GrayImage = to_image(frame)?;
    let gx = imageops::filter3x3(&gray, &PREWITT_X);
    let gy = imageops::filter3x3(&gray, &PREWITT_Y);
    let edges: Vec<u8> = gx
        .as_raw()
        .iter()
        .zip(gy.as_raw())
        .map(|(&x, &y)| x.saturating_add(y))
        .collect();
    Ok(Frame::from_u8(frame.width(), frame.height(), 1, edges)?.with_sequence(frame.sequence()))
}

/// Edge pipeline for gray frames: median 11x11, light Gaussian, Prewitt.
pub fn edge_detect(frame: &Frame) -> Result<Frame> {
    let smoothed = gaussian_blur(&median_blur(frame, 5)?, 0.8)?;
    prewitt_edges(&smoothed)
}

/// Temporal change detector.
///
/// Works on signed grayscale frames, compares each frame against an
/// exponentially filtered reference and flags a change when the share of
/// pixels differing by more than `threshold` exceeds `area`.
#[derive(Debug, Clone, Copy)]
pub struct ChangeDetector {
    /// Activation threshold (0..255)
    pub threshold: i16,
    /// Reference filter strength (0..1)
    pub alpha: f32,
    /// Change detection threshold (0..1)
    pub area: f64,
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self {
            threshold: 15,
            alpha: 0.90,
            area: 0.05,
        }
    }
}

impl ChangeDetector {
    /// Status lines for a threshold mask
    pub fn messages(&self, fps: u32, mask: &Frame) -> Vec<String> {
        let activated = activation(mask);
        let mut messages = vec![
            format!("FPS: {fps}"),
            format!("ACTIVATION: {:.1} %", activated * 100.0),
        ];
        if activated > self.area {
            messages.push("CHANGE DETECTED!".into());
        }
        messages
    }

    pub fn into_hooks(self) -> Hooks {
        let threshold = self.threshold;
        Hooks::new()
            .convert(|raw| Ok(grayscale(raw)?.to_i16()))
            .process(move |input, prev| abs_diff_threshold(input, prev, threshold))
            .update_reference(exponential_blend(self.alpha))
            .display(move |ctx: DisplayContext<'_>| {
                let messages = self.messages(ctx.fps, ctx.result_buf);
                ctx.viewer.show("Input", ctx.raw_input)?;
                ctx.viewer.show("Result", &annotate(ctx.result_buf, &messages))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grayscale_weights() {
        let rgb = Frame::from_u8(2, 1, 3, vec![255, 255, 255, 255, 0, 0]).unwrap();
        let gray = grayscale(&rgb).unwrap();
        assert_eq!(gray.channels(), 1);
        assert_eq!(gray.as_u8().unwrap(), &[255, 76]);
    }

    #[test]
    fn threshold_mask_and_activation() {
        let a = Frame::from_i16(4, 1, 1, vec![0i16, 10, 20, 100]).unwrap();
        let b = Frame::from_i16(4, 1, 1, vec![0i16, 0, 0, 0]).unwrap();
        let mask = abs_diff_threshold(&a, &b, 15).unwrap();
        assert_eq!(mask.as_u8().unwrap(), &[0, 0, 255, 255]);
        assert!((activation(&mask) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn mismatched_geometry_is_rejected() {
        let a = Frame::filled(2, 2, 1, 0).unwrap();
        let b = Frame::filled(4, 1, 1, 0).unwrap();
        assert!(abs_diff_threshold(&a, &b, 1).is_err());
    }

    #[test]
    fn blend_moves_reference_towards_input() {
        let mut blend = exponential_blend(0.9);
        let input = Frame::from_i16(1, 1, 1, vec![100i16]).unwrap();
        let prev = Frame::from_i16(1, 1, 1, vec![0i16]).unwrap();
        let out = blend(&input, &prev).unwrap();
        assert_eq!(out.as_i16().unwrap(), &[10]);

        let mut track = exponential_blend(0.0);
        assert!(track(&input, &prev).unwrap().sample_eq(&input));
    }

    #[test]
    fn blend_converges_on_small_differences() {
        let mut blend = exponential_blend(0.9);
        let input = Frame::from_i16(2, 1, 1, vec![4i16, -3]).unwrap();
        let mut reference = Frame::from_i16(2, 1, 1, vec![0i16, 0]).unwrap();
        for _ in 0..200 {
            reference = blend(&input, &reference).unwrap();
        }
        assert_eq!(reference.as_i16().unwrap(), &[4, -3]);

        let mut blend = exponential_blend(0.9);
        let input = Frame::filled(3, 1, 1, 4).unwrap();
        let mut reference = Frame::filled(3, 1, 1, 0).unwrap();
        for _ in 0..200 {
            reference = blend(&input, &reference).unwrap();
        }
        assert_eq!(reference.as_u8().unwrap(), &[4, 4, 4]);
    }

    #[test]
    fn blend_reseeds_from_a_foreign_reference() {
        let mut blend = exponential_blend(0.5);
        let input = Frame::from_i16(1, 1, 1, vec![100i16]).unwrap();
        let zero = Frame::from_i16(1, 1, 1, vec![0i16]).unwrap();
        assert_eq!(blend(&input, &zero).unwrap().as_i16().unwrap(), &[50]);

        let other = Frame::from_i16(1, 1, 1, vec![-100i16]).unwrap();
        assert_eq!(blend(&input, &other).unwrap().as_i16().unwrap(), &[0]);

        // geometry changes start over as well
        let wide = Frame::from_i16(2, 1, 1, vec![20i16, 20]).unwrap();
        let wide_prev = Frame::from_i16(2, 1, 1, vec![0i16, 0]).unwrap();
        assert_eq!(blend(&wide, &wide_prev).unwrap().as_i16().unwrap(), &[10, 10]);
    }

    #[test]
    fn gaussian_blur_spreads_an_impulse() {
        let mut data = vec![0u8; 81];
        data[40] = 255;
        let frame = Frame::from_u8(9, 9, 1, data).unwrap().with_sequence(7);
        let out = gaussian_blur(&frame, 1.0).unwrap();
        let px = out.as_u8().unwrap();
        assert_eq!(out.sequence(), 7);
        assert!(px[40] < 255);
        assert!(px[41] > 0 && px[39] > 0 && px[31] > 0 && px[49] > 0);
        assert!(px[40] >= px[41]);
        assert_eq!(px[0], 0);

        let rgb = Frame::filled(4, 4, 3, 90).unwrap();
        let out = gaussian_blur(&rgb, 2.0).unwrap();
        assert_eq!((out.width(), out.height(), out.channels()), (4, 4, 3));
        assert!(out.as_u8().unwrap().iter().all(|&v| (89..=91).contains(&v)));
        assert!(gaussian_blur(&rgb.to_i16(), 2.0).is_err());
    }

    #[test]
    fn median_removes_salt_noise() {
        let mut data = vec![30u8; 25];
        data[12] = 255;
        let frame = Frame::from_u8(5, 5, 1, data).unwrap();
        let out = median_blur(&frame, 1).unwrap();
        assert!(out.as_u8().unwrap().iter().all(|&v| v == 30));
    }

    #[test]
    fn prewitt_marks_a_vertical_step() {
        // dark left half, bright right half
        let data: Vec<u8> = (0..24).map(|i| if i % 6 < 3 { 0 } else { 200 }).collect();
        let frame = Frame::from_u8(6, 4, 1, data).unwrap();
        let edges = prewitt_edges(&frame).unwrap();
        let row = &edges.as_u8().unwrap()[6..12];
        assert_eq!(row[1], 0);
        assert_eq!(row[2], 255);
        assert_eq!(row[3], 255);
        assert_eq!(row[4], 0);

        let flat = Frame::filled(6, 6, 1, 80).unwrap();
        assert!(prewitt_edges(&flat).unwrap().as_u8().unwrap().iter().all(|&v| v == 0));
        assert!(prewitt_edges(&Frame::filled(4, 4, 3, 0).unwrap()).is_err());

        let edges = edge_detect(&frame.with_sequence(3)).unwrap();
        assert_eq!((edges.width(), edges.height(), edges.sequence()), (6, 4, 3));
    }

    #[test]
    fn change_banner_above_area() {
        let detector = ChangeDetector::default();
        let quiet = Frame::filled(10, 10, 1, 0).unwrap();
        let busy = Frame::filled(10, 10, 1, 255).unwrap();
        assert_eq!(detector.messages(30, &quiet).len(), 2);
        let messages = detector.messages(30, &busy);
        assert_eq!(messages[1], "ACTIVATION: 100.0 %");
        assert_eq!(messages[2], "CHANGE DETECTED!");
    }
}
