// THEORY:
// Every failure the converter can report lives in one enum. Construction-time
// problems (kernel, image shape, receptor count) surface from `new`, per-frame
// problems surface at the frame that caused them, and the streaming entry
// points validate their own buffer size before any frame is pulled.

use thiserror::Error;

pub type ConverterResult<T> = Result<T, ConverterError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConverterError {
    #[error("invalid kernel shape {rows}x{cols}: both dimensions must be at least 1")]
    InvalidKernelShape { rows: usize, cols: usize },

    #[error("invalid kernel sigma {0}: must be finite and positive")]
    InvalidSigma(f64),

    #[error("invalid receptor count {0}: at least one receptor is required")]
    InvalidReceptorCount(usize),

    #[error("invalid image shape {rows}x{cols}: both dimensions must be at least 1")]
    InvalidImageShape { rows: usize, cols: usize },

    #[error("frame shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("invalid buffer size {0}: buffers must hold at least one frame")]
    InvalidBufferSize(usize),

    #[error("frame buffer holds {actual} bytes, expected {expected}")]
    InvalidFrameBuffer { expected: usize, actual: usize },

    #[error("worker pool is no longer accepting frames")]
    WorkerPoolClosed,
}
