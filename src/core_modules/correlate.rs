// THEORY:
// The receptive-field loop behind `PhotoreceptorConverter::apply`. Each output
// cell reads a kernel-sized window whose top-left corner sits at
// `index * stride - padding` in source coordinates. That single formula covers
// both padding signs: a positive padding moves the window start before the
// image edge (those reads are zeros), a negative padding moves every read
// inward by the crop amount.
//
// Instead of testing every tap against the image bounds, the valid part of the
// window is resolved once per output row and once per output column, and the
// inner loop only walks taps that land inside the frame. Taps outside
// contribute zero, so skipping them is exactly zero padding.

use crate::core_modules::geometry::ReceptorGeometry;
use ndarray::{Array2, ArrayBase, ArrayView2, Data, Ix2};

/// The slice of one window axis that overlaps the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AxisWindow {
    /// First kernel tap that lands inside the image.
    kernel_start: usize,
    /// Source index read by `kernel_start`.
    source_start: usize,
    /// Number of taps inside the image (may be zero).
    len: usize,
}

fn axis_window(origin: isize, kernel_len: usize, source_len: usize) -> AxisWindow {
    let first = origin.max(0);
    let last = (origin + kernel_len as isize).min(source_len as isize);
    if last <= first {
        return AxisWindow {
            kernel_start: 0,
            source_start: 0,
            len: 0,
        };
    }
    AxisWindow {
        kernel_start: (first - origin) as usize,
        source_start: first as usize,
        len: (last - first) as usize,
    }
}

fn axis_windows(
    count: usize,
    stride: usize,
    padding: isize,
    kernel_len: usize,
    source_len: usize,
) -> Vec<AxisWindow> {
    (0..count)
        .map(|i| axis_window(i as isize * stride as isize - padding, kernel_len, source_len))
        .collect()
}

/// Correlates `kernel` with `frame` at every receptor site of `geometry`.
///
/// The frame shape is not checked here; callers validate it first.
pub(crate) fn correlate<S>(
    frame: &ArrayBase<S, Ix2>,
    kernel: ArrayView2<'_, f64>,
    geometry: &ReceptorGeometry,
) -> Array2<f64>
where
    S: Data<Elem = f64>,
{
    let (rows, cols) = frame.dim();
    let (kernel_rows, kernel_cols) = kernel.dim();

    let row_windows = axis_windows(
        geometry.vertical,
        geometry.v_stride,
        geometry.v_padding,
        kernel_rows,
        rows,
    );
    let col_windows = axis_windows(
        geometry.horizontal,
        geometry.h_stride,
        geometry.h_padding,
        kernel_cols,
        cols,
    );

    let mut grid = Array2::zeros(geometry.output_shape());
    for (i, rw) in row_windows.iter().enumerate() {
        for (j, cw) in col_windows.iter().enumerate() {
            let mut acc = 0.0f64;
            for dy in 0..rw.len {
                let ky = rw.kernel_start + dy;
                let sy = rw.source_start + dy;
                for dx in 0..cw.len {
                    acc += kernel[[ky, cw.kernel_start + dx]] * frame[[sy, cw.source_start + dx]];
                }
            }
            grid[[i, j]] = acc;
        }
    }
    grid
}

#[cfg(test)]
mod tests {
    use super::{AxisWindow, axis_window, correlate};
    use crate::core_modules::geometry::ReceptorGeometry;
    use ndarray::{Array2, array};

    #[test]
    fn window_inside_image() {
        assert_eq!(
            axis_window(2, 3, 8),
            AxisWindow {
                kernel_start: 0,
                source_start: 2,
                len: 3
            }
        );
    }

    #[test]
    fn window_hanging_over_both_edges() {
        assert_eq!(
            axis_window(-2, 5, 1),
            AxisWindow {
                kernel_start: 2,
                source_start: 0,
                len: 1
            }
        );
    }

    #[test]
    fn window_entirely_outside() {
        assert_eq!(axis_window(5, 2, 4).len, 0);
        assert_eq!(axis_window(-3, 2, 4).len, 0);
    }

    #[test]
    fn zero_padding_counts_only_image_pixels() {
        let geometry = ReceptorGeometry {
            vertical: 2,
            horizontal: 2,
            v_stride: 1,
            h_stride: 1,
            v_padding: 1,
            h_padding: 1,
        };
        let frame = array![[1.0, 2.0], [3.0, 4.0]];
        let kernel = Array2::from_elem((3, 3), 1.0);
        let grid = correlate(&frame, kernel.view(), &geometry);
        assert_eq!(grid, array![[10.0, 10.0], [10.0, 10.0]]);
    }

    #[test]
    fn kernel_is_not_flipped() {
        let geometry = ReceptorGeometry {
            vertical: 1,
            horizontal: 1,
            v_stride: 1,
            h_stride: 1,
            v_padding: 0,
            h_padding: 0,
        };
        let frame = array![[1.0, 0.0], [0.0, 0.0]];
        let kernel = array![[5.0, 0.0], [0.0, 7.0]];
        let grid = correlate(&frame, kernel.view(), &geometry);
        assert_eq!(grid, array![[5.0]]);
    }

    #[test]
    fn negative_padding_reads_inward() {
        let geometry = ReceptorGeometry {
            vertical: 1,
            horizontal: 1,
            v_stride: 4,
            h_stride: 4,
            v_padding: -1,
            h_padding: -1,
        };
        let frame = array![
            [9.0, 9.0, 9.0, 9.0],
            [9.0, 3.0, 9.0, 9.0],
            [9.0, 9.0, 9.0, 9.0],
            [9.0, 9.0, 9.0, 9.0]
        ];
        let grid = correlate(&frame, array![[2.0]].view(), &geometry);
        assert_eq!(grid, array![[6.0]]);
    }
}
