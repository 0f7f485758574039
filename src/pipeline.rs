// THEORY:
// The `pipeline` module is the config-driven entry point to the retina. Callers
// describe the camera once (frame size, how many receptors they want, how many
// converted frames to batch) in a `ConverterConfig`, hand over a kernel, and
// get back a `ReceptorPipeline` that already knows every derived parameter.
//
// It adds nothing to the conversion itself. Its job is to keep the knobs in
// one place, validate them up front, and accept frames in the raw RGBA layout
// that video producers emit.

use crate::core_modules::converter::{Frame, FrameBuffers, PhotoreceptorConverter, Receive};
use crate::core_modules::error::{ConverterError, ConverterResult};
use crate::core_modules::frame;
use ndarray::{Array2, ArrayBase, Data, Ix2};
use std::borrow::Borrow;
use std::num::NonZeroUsize;

// Re-export key data structures for the public API.
pub use crate::core_modules::converter::ReceptorGrid;
pub use crate::core_modules::geometry::ReceptorGeometry;

/// Number of converted frames per buffer when none is configured.
pub const DEFAULT_BUFFER_SIZE: usize = 1;

/// Configuration for the ReceptorPipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterConfig {
    /// Rows of every incoming frame.
    pub image_height: usize,
    /// Columns of every incoming frame.
    pub image_width: usize,
    /// Desired total number of receptors per converted frame.
    pub receptor_count: usize,
    /// Converted frames grouped into one buffer by `stream`.
    pub buffer_size: usize,
}

impl ConverterConfig {
    pub fn new(image_height: usize, image_width: usize, receptor_count: usize) -> Self {
        Self {
            image_height,
            image_width,
            receptor_count,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// The `(rows, cols)` every frame must have.
    pub fn image_shape(&self) -> (usize, usize) {
        (self.image_height, self.image_width)
    }
}

/// A converter bound to its configuration.
#[derive(Debug, Clone)]
pub struct ReceptorPipeline {
    converter: PhotoreceptorConverter,
    config: ConverterConfig,
    buffer_size: NonZeroUsize,
}

impl ReceptorPipeline {
    pub fn new(kernel: Array2<f64>, config: ConverterConfig) -> ConverterResult<Self> {
        let buffer_size = NonZeroUsize::new(config.buffer_size)
            .ok_or(ConverterError::InvalidBufferSize(config.buffer_size))?;
        let converter =
            PhotoreceptorConverter::new(kernel, config.image_shape(), config.receptor_count)?;
        Ok(Self {
            converter,
            config,
            buffer_size,
        })
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    pub fn converter(&self) -> &PhotoreceptorConverter {
        &self.converter
    }

    pub fn geometry(&self) -> &ReceptorGeometry {
        self.converter.geometry()
    }

    pub fn apply<S>(&self, frame: &ArrayBase<S, Ix2>) -> ConverterResult<ReceptorGrid>
    where
        S: Data<Elem = f64>,
    {
        self.converter.apply(frame)
    }

    /// Converts one raw RGBA8 frame buffer of the configured size.
    pub fn apply_rgba8(&self, frame_buffer: &[u8]) -> ConverterResult<ReceptorGrid> {
        let invalid_shape = || ConverterError::InvalidImageShape {
            rows: self.config.image_height,
            cols: self.config.image_width,
        };
        let width = u32::try_from(self.config.image_width).map_err(|_| invalid_shape())?;
        let height = u32::try_from(self.config.image_height).map_err(|_| invalid_shape())?;
        let frame = frame::from_rgba8_bytes(width, height, frame_buffer)?;
        self.converter.apply(&frame)
    }

    pub fn receive<I>(&self, frames: I) -> Receive<'_, I::IntoIter>
    where
        I: IntoIterator,
        I::Item: Borrow<Frame>,
    {
        self.converter.receive(frames)
    }

    /// Streams `frames` in buffers of the configured `buffer_size`.
    pub fn stream<I>(&self, frames: I) -> FrameBuffers<'_, I::IntoIter>
    where
        I: IntoIterator,
        I::Item: Borrow<Frame>,
    {
        self.converter.stream_buffered(frames, self.buffer_size)
    }
}
