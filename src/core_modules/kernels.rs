// Ready-made receptive fields.

use crate::core_modules::error::{ConverterError, ConverterResult};
use ndarray::Array2;

fn check_shape(rows: usize, cols: usize) -> ConverterResult<()> {
    if rows == 0 || cols == 0 {
        return Err(ConverterError::InvalidKernelShape { rows, cols });
    }
    Ok(())
}

/// An all-ones kernel: each receptor reports the plain sum of its field.
pub fn uniform(rows: usize, cols: usize) -> ConverterResult<Array2<f64>> {
    check_shape(rows, cols)?;
    Ok(Array2::ones((rows, cols)))
}

/// A box kernel whose weights sum to one: each receptor reports the mean
/// of its field (zero-padded taps included).
pub fn box_mean(rows: usize, cols: usize) -> ConverterResult<Array2<f64>> {
    check_shape(rows, cols)?;
    Ok(Array2::from_elem((rows, cols), 1.0 / (rows * cols) as f64))
}

/// A square, normalized Gaussian acceptance profile of `size` taps per side.
///
/// `sigma` is in pixels and must be finite and positive.
pub fn gaussian(size: usize, sigma: f64) -> ConverterResult<Array2<f64>> {
    check_shape(size, size)?;
    if !(sigma.is_finite() && sigma > 0.0) {
        return Err(ConverterError::InvalidSigma(sigma));
    }

    let centre = (size as f64 - 1.0) / 2.0;
    let denom = 2.0 * sigma * sigma;
    let mut kernel = Array2::from_shape_fn((size, size), |(r, c)| {
        let dy = r as f64 - centre;
        let dx = c as f64 - centre;
        (-(dx * dx + dy * dy) / denom).exp()
    });
    let total = kernel.sum();
    kernel.mapv_inplace(|w| w / total);
    Ok(kernel)
}

#[cfg(test)]
mod tests {
    use super::{box_mean, gaussian, uniform};
    use crate::core_modules::error::ConverterError;

    #[test]
    fn uniform_is_all_ones() {
        let k = uniform(2, 3).expect("valid kernel");
        assert_eq!(k.dim(), (2, 3));
        assert!(k.iter().all(|&w| w == 1.0));
    }

    #[test]
    fn box_mean_sums_to_one() {
        let k = box_mean(4, 4).expect("valid kernel");
        assert!((k.sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn gaussian_is_normalized_and_peaks_in_centre() {
        let k = gaussian(5, 1.0).expect("valid kernel");
        assert!((k.sum() - 1.0).abs() < 1e-12);
        let peak = k[[2, 2]];
        assert!(k.iter().all(|&w| w <= peak));
        assert!((k[[0, 1]] - k[[1, 0]]).abs() < 1e-15);
    }

    #[test]
    fn rejects_empty_and_bad_sigma() {
        assert_eq!(
            uniform(0, 2),
            Err(ConverterError::InvalidKernelShape { rows: 0, cols: 2 })
        );
        assert_eq!(gaussian(3, 0.0), Err(ConverterError::InvalidSigma(0.0)));
        assert_eq!(gaussian(3, -1.5), Err(ConverterError::InvalidSigma(-1.5)));
        assert!(matches!(
            gaussian(3, f64::NAN),
            Err(ConverterError::InvalidSigma(sigma)) if sigma.is_nan()
        ));
    }
}
