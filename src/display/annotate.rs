//! Burns text into frames with a built-in 5x7 bitmap font

use crate::capture::frame::{Frame, PixelData};

const GLYPH_W: i64 = 5;
const GLYPH_H: i64 = 7;
const SCALE: i64 = 3;
const ADVANCE: i64 = (GLYPH_W + 1) * SCALE;

/// Left edge of every line
pub const MARGIN_X: i64 = 25;
/// Vertical distance between consecutive baselines
pub const LINE_STRIDE: i64 = 50;

/// Return a copy of `frame` with each line drawn at `(25, (i + 1) * 50)`.
///
/// Text is white (255 in every channel). Anything outside the image is
/// clipped.
pub fn annotate<S: AsRef<str>>(frame: &Frame, lines: &[S]) -> Frame {
    let geometry = Geometry {
        width: frame.width() as i64,
        height: frame.height() as i64,
        channels: frame.channels() as usize,
    };

    let data = match &frame.data {
        PixelData::U8(bytes) => {
            let mut buf = bytes.to_vec();
            draw_lines(&mut buf, geometry, lines, 255u8);
            PixelData::U8(buf.into())
        }
        PixelData::I16(samples) => {
            let mut buf = samples.to_vec();
            draw_lines(&mut buf, geometry, lines, 255i16);
            PixelData::I16(buf.into())
        }
    };

    Frame {
        data,
        meta: frame.meta.clone(),
        timestamp: frame.timestamp,
    }
}

#[derive(Clone, Copy)]
struct Geometry {
    width: i64,
    height: i64,
    channels: usize,
}

fn draw_lines<T: Copy, S: AsRef<str>>(buf: &mut [T], geo: Geometry, lines: &[S], ink: T) {
    for (i, line) in lines.iter().enumerate() {
        let baseline = (i as i64 + 1) * LINE_STRIDE;
        let top = baseline - GLYPH_H * SCALE;
        if top >= geo.height {
            break;
        }
        for (n, c) in line.as_ref().chars().enumerate() {
            let left = MARGIN_X + n as i64 * ADVANCE;
            if left >= geo.width {
                break;
            }
            draw_glyph(buf, geo, left, top, glyph(c), ink);
        }
    }
}

fn draw_glyph<T: Copy>(buf: &mut [T], geo: Geometry, left: i64, top: i64, rows: [u8; 7], ink: T) {
    for (row, bits) in rows.iter().enumerate() {
        for col in 0..GLYPH_W {
            if (bits >> (GLYPH_W - 1 - col)) & 1 == 0 {
                continue;
            }
            for dy in 0..SCALE {
                for dx in 0..SCALE {
                    let x = left + col * SCALE + dx;
                    let y = top + row as i64 * SCALE + dy;
                    if x < 0 || y < 0 || x >= geo.width || y >= geo.height {
                        continue;
                    }
                    let idx = (y * geo.width + x) as usize * geo.channels;
                    buf[idx..idx + geo.channels].fill(ink);
                }
            }
        }
    }
}

fn glyph(c: char) -> [u8; 7] {
    match c.to_ascii_uppercase() {
        ' ' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1C, 0x12, 0x11, 0x11, 0x11, 0x12, 0x1C],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04],
        'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        ',' => [0x00, 0x00, 0x00, 0x00, 0x0C, 0x04, 0x08],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        '!' => [0x04, 0x04, 0x04, 0x04, 0x04, 0x00, 0x04],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        '+' => [0x00, 0x04, 0x04, 0x1F, 0x04, 0x04, 0x00],
        '=' => [0x00, 0x00, 0x1F, 0x00, 0x1F, 0x00, 0x00],
        '%' => [0x18, 0x19, 0x02, 0x04, 0x08, 0x13, 0x03],
        '/' => [0x00, 0x01, 0x02, 0x04, 0x08, 0x10, 0x00],
        '(' => [0x02, 0x04, 0x08, 0x08, 0x08, 0x04, 0x02],
        ')' => [0x08, 0x04, 0x02, 0x02, 0x02, 0x04, 0x08],
        '_' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1F],
        // '?' and anything we have no glyph for
        _ => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x00, 0x04],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit_rows(frame: &Frame) -> Vec<u32> {
        let w = frame.width() as usize;
        let data = frame.as_u8().unwrap();
        (0..frame.height())
            .filter(|&y| {
                let row = &data[y as usize * w..(y as usize + 1) * w];
                row.iter().any(|&p| p == 255)
            })
            .collect()
    }

    #[test]
    fn lines_are_stacked_at_fixed_stride() {
        let frame = Frame::filled(300, 160, 1, 0).unwrap();
        let out = annotate(&frame, &["FPS: 30", "CHANGE DETECTED!"]);
        let rows = lit_rows(&out);

        // first line occupies rows 29..50, second 79..100
        assert_eq!(rows.first(), Some(&29));
        assert!(rows.contains(&49));
        assert!(rows.iter().all(|&y| (29..50).contains(&y) || (79..100).contains(&y)));
        assert!(rows.iter().any(|&y| y >= 79));
    }

    #[test]
    fn text_starts_at_left_margin() {
        let frame = Frame::filled(100, 60, 3, 0).unwrap();
        let out = annotate(&frame, &["8"]);
        let data = out.as_u8().unwrap();
        let lit_x: Vec<usize> = (0..100)
            .filter(|&x| (0..60).any(|y| data[(y * 100 + x) * 3] == 255))
            .collect();
        assert_eq!(lit_x.first(), Some(&25));
        // every channel of a lit pixel is inked
        let idx = (29 * 100 + 29) * 3;
        assert_eq!(&data[idx..idx + 3], &[255, 255, 255]);
    }

    #[test]
    fn clips_instead_of_panicking() {
        let frame = Frame::filled(30, 35, 1, 0).unwrap();
        let out = annotate(&frame, &["A VERY LONG LINE", "SECOND", "THIRD"]);
        assert_eq!(out.len(), frame.len());

        let tiny = Frame::filled(1, 1, 1, 0).unwrap();
        assert!(annotate(&tiny, &["FPS: 1"]).sample_eq(&tiny));
    }

    #[test]
    fn annotates_signed_frames() {
        let frame = Frame::from_i16(60, 60, 1, vec![-5i16; 3600]).unwrap();
        let out = annotate(&frame, &["1"]);
        assert!(out.as_i16().unwrap().contains(&255));
        assert_eq!(out.depth(), frame.depth());
    }
}
