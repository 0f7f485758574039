// THEORY:
// `ReceptorGeometry` answers one question: given a kernel, a source image and
// a desired number of receptors, how must a plain strided correlation be set
// up so that its output grid has (about) that many cells in the image's aspect
// ratio?
//
// Key architectural principles:
// 1.  **Aspect First**: The horizontal receptor count is taken from the ideal
//     `sqrt(n * H / V)` and the vertical count is whatever is left of `n` once
//     that row length is fixed. Both are clamped to one, so a tall one-pixel
//     wide image asked for a single receptor rounds its thin axis to zero and
//     is then lifted back to one rather than producing a 2x1 grid.
// 2.  **Stride Follows Count**: Each axis is split into `count` segments of
//     `round(len / count)` pixels. A stride is never zero.
// 3.  **Signed Padding**: Padding is solved from the standard output-size
//     relation and rounded up. It can be negative, which means the kernel
//     already over-covers the image and the receptive fields must be pulled
//     inward (a crop), not extended with zeros.
//
// Rounding is round-half-to-even throughout.

use crate::core_modules::error::{ConverterError, ConverterResult};
use tracing::debug;

/// The frozen sampling layout of a converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceptorGeometry {
    /// Number of receptor rows in every output grid.
    pub vertical: usize,
    /// Number of receptor columns in every output grid.
    pub horizontal: usize,
    /// Source rows between two consecutive receptor rows.
    pub v_stride: usize,
    /// Source columns between two consecutive receptor columns.
    pub h_stride: usize,
    /// Rows of zeros added above the image (negative: rows cropped).
    pub v_padding: isize,
    /// Columns of zeros added left of the image (negative: columns cropped).
    pub h_padding: isize,
}

impl ReceptorGeometry {
    /// Derives the geometry for a `kernel_shape` kernel sampling images of
    /// `image_shape`, both given as `(rows, cols)`.
    pub fn derive(
        kernel_shape: (usize, usize),
        image_shape: (usize, usize),
        receptor_count: usize,
    ) -> ConverterResult<Self> {
        let (kernel_rows, kernel_cols) = kernel_shape;
        let (image_rows, image_cols) = image_shape;

        if kernel_rows == 0 || kernel_cols == 0 {
            return Err(ConverterError::InvalidKernelShape {
                rows: kernel_rows,
                cols: kernel_cols,
            });
        }
        if image_rows == 0 || image_cols == 0 {
            return Err(ConverterError::InvalidImageShape {
                rows: image_rows,
                cols: image_cols,
            });
        }
        if receptor_count == 0 {
            return Err(ConverterError::InvalidReceptorCount(receptor_count));
        }

        let (vertical, horizontal) = receptor_counts(image_shape, receptor_count);
        let v_stride = axis_stride(image_rows, vertical);
        let h_stride = axis_stride(image_cols, horizontal);
        let v_padding = axis_padding(vertical, v_stride, kernel_rows, image_rows);
        let h_padding = axis_padding(horizontal, h_stride, kernel_cols, image_cols);

        let geometry = Self {
            vertical,
            horizontal,
            v_stride,
            h_stride,
            v_padding,
            h_padding,
        };
        debug!(
            ?kernel_shape,
            ?image_shape,
            receptor_count,
            ?geometry,
            "derived receptor geometry"
        );
        Ok(geometry)
    }

    /// The `(rows, cols)` of every grid produced with this geometry.
    pub fn output_shape(&self) -> (usize, usize) {
        (self.vertical, self.horizontal)
    }

    /// Total number of receptors, `vertical * horizontal`.
    pub fn receptor_count(&self) -> usize {
        self.vertical * self.horizontal
    }
}

fn round_count(value: f64) -> usize {
    (value.round_ties_even() as usize).max(1)
}

/// Splits `receptor_count` into `(vertical, horizontal)` under the image's
/// aspect ratio.
fn receptor_counts(image_shape: (usize, usize), receptor_count: usize) -> (usize, usize) {
    let (image_rows, image_cols) = image_shape;
    let aspect = image_cols as f64 / image_rows as f64;
    let total = receptor_count as f64;

    let horizontal = round_count((total * aspect).sqrt());
    let vertical = round_count(total / horizontal as f64);
    (vertical, horizontal)
}

fn axis_stride(len: usize, count: usize) -> usize {
    round_count(len as f64 / count as f64)
}

/// `ceil(((count - 1) * stride + kernel - len) / 2)` in exact integers.
fn axis_padding(count: usize, stride: usize, kernel: usize, len: usize) -> isize {
    let span = (count as isize - 1) * stride as isize + kernel as isize - len as isize;
    -((-span).div_euclid(2))
}
