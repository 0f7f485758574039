// THEORY:
// Frames reach the converter as plain `f64` matrices, but the producers that
// feed a retina (decoders, cameras, synthetic generators) usually hand over
// `image` buffers or raw RGBA bytes. This module is the thin bridge between
// those in-memory layouts and a `Frame`. It never touches the filesystem.
//
// Colour frames are reduced to a single intensity channel with Rec. 601 luma,
// the same brightness estimate the rest of the vision stack uses for motion
// and heat maps. Alpha is ignored.

use crate::core_modules::converter::Frame;
use crate::core_modules::error::{ConverterError, ConverterResult};
use image::{ImageBuffer, Luma, Pixel, Primitive, Rgba};
use std::ops::Deref;

const RGBA_CHANNELS: usize = 4;

/// Rec. 601 luma of one RGB triple, in the channel's own scale.
pub fn luminance(red: f64, green: f64, blue: f64) -> f64 {
    0.299 * red + 0.587 * green + 0.114 * blue
}

/// Copies a single-channel image into a `(height, width)` frame.
pub fn from_luma<T, C>(image: &ImageBuffer<Luma<T>, C>) -> Frame
where
    T: Primitive + Into<f64>,
    Luma<T>: Pixel<Subpixel = T>,
    C: Deref<Target = [T]>,
{
    let (width, height) = image.dimensions();
    Frame::from_shape_fn((height as usize, width as usize), |(row, col)| {
        image.get_pixel(col as u32, row as u32).0[0].into()
    })
}

/// Reduces an RGBA image to a luminance frame.
pub fn from_rgba<T, C>(image: &ImageBuffer<Rgba<T>, C>) -> Frame
where
    T: Primitive + Into<f64>,
    Rgba<T>: Pixel<Subpixel = T>,
    C: Deref<Target = [T]>,
{
    let (width, height) = image.dimensions();
    Frame::from_shape_fn((height as usize, width as usize), |(row, col)| {
        let [r, g, b, _] = image.get_pixel(col as u32, row as u32).0;
        luminance(r.into(), g.into(), b.into())
    })
}

/// Reduces a raw, row-major RGBA8 buffer to a luminance frame.
pub fn from_rgba8_bytes(width: u32, height: u32, bytes: &[u8]) -> ConverterResult<Frame> {
    let (cols, rows) = (width as usize, height as usize);
    let expected = cols
        .checked_mul(rows)
        .and_then(|pixels| pixels.checked_mul(RGBA_CHANNELS))
        .ok_or(ConverterError::InvalidFrameBuffer {
            expected: usize::MAX,
            actual: bytes.len(),
        })?;
    if bytes.len() != expected {
        return Err(ConverterError::InvalidFrameBuffer {
            expected,
            actual: bytes.len(),
        });
    }

    let data = bytes
        .chunks_exact(RGBA_CHANNELS)
        .map(|px| luminance(px[0] as f64, px[1] as f64, px[2] as f64))
        .collect();
    Frame::from_shape_vec((rows, cols), data).map_err(|_| ConverterError::InvalidFrameBuffer {
        expected,
        actual: bytes.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::{from_luma, from_rgba, from_rgba8_bytes, luminance};
    use crate::core_modules::error::ConverterError;
    use image::{GrayImage, ImageBuffer, Luma, Rgba, RgbaImage};
    use ndarray::array;

    #[test]
    fn gray_image_keeps_row_major_layout() {
        let image = GrayImage::from_raw(3, 2, vec![1, 2, 3, 4, 5, 6]).expect("valid buffer");
        let frame = from_luma(&image);
        assert_eq!(frame, array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
    }

    #[test]
    fn sixteen_bit_gray_image() {
        let image: ImageBuffer<Luma<u16>, Vec<u16>> =
            ImageBuffer::from_raw(1, 2, vec![1000, 65535]).expect("valid buffer");
        assert_eq!(from_luma(&image), array![[1000.0], [65535.0]]);
    }

    #[test]
    fn rgba_image_reduces_to_luminance() {
        let mut image = RgbaImage::new(2, 1);
        image.put_pixel(0, 0, Rgba([255, 255, 255, 0]));
        image.put_pixel(1, 0, Rgba([0, 0, 0, 255]));
        let frame = from_rgba(&image);
        assert!((frame[[0, 0]] - 255.0).abs() < 1e-9);
        assert_eq!(frame[[0, 1]], 0.0);
    }

    #[test]
    fn raw_rgba_bytes_match_image_path() {
        let bytes = vec![10u8, 20, 30, 255, 200, 100, 50, 0];
        let image = RgbaImage::from_raw(2, 1, bytes.clone()).expect("valid buffer");
        let frame = from_rgba8_bytes(2, 1, &bytes).expect("valid buffer");
        assert_eq!(frame, from_rgba(&image));
        assert_eq!(frame[[0, 0]], luminance(10.0, 20.0, 30.0));
    }

    #[test]
    fn raw_rgba_bytes_length_is_checked() {
        assert_eq!(
            from_rgba8_bytes(2, 2, &[0u8; 12]),
            Err(ConverterError::InvalidFrameBuffer {
                expected: 16,
                actual: 12
            })
        );
    }

    #[test]
    fn oversized_dimensions_are_rejected() {
        assert!(matches!(
            from_rgba8_bytes(u32::MAX, u32::MAX, &[0u8; 4]),
            Err(ConverterError::InvalidFrameBuffer { actual: 4, .. })
        ));
    }
}
