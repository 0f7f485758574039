// THEORY:
// The `PhotoreceptorConverter` is the whole retina in one object. It owns the
// kernel and the `ReceptorGeometry` derived for one image shape, and it never
// changes after construction.
//
// Key architectural principles:
// 1.  **Frozen Configuration**: Everything that depends on the kernel, the image
//     shape and the receptor count is computed once in `new`. Converting a frame
//     reads that state and nothing else, so `apply` is pure and a converter can
//     be shared across threads without a lock.
// 2.  **Pull, Don't Push**: `receive` and `stream` return iterators. No frame is
//     converted until the caller asks for the next item, and no more than one
//     buffer of converted frames is ever held.
// 3.  **Fail at the Frame**: A frame of the wrong shape fails where it is met.
//     Results already yielded stay valid; the sequence ends after the error.

use crate::core_modules::correlate::correlate;
use crate::core_modules::error::{ConverterError, ConverterResult};
use crate::core_modules::geometry::ReceptorGeometry;
use ndarray::{Array2, ArrayBase, Data, Ix2};
use std::borrow::Borrow;
use std::num::NonZeroUsize;
use tracing::{trace, warn};

/// One 2D image sample.
pub type Frame = Array2<f64>;
/// The receptor responses for one frame, shaped `(vertical, horizontal)`.
pub type ReceptorGrid = Array2<f64>;

/// Samples frames of a fixed shape through a kernel at a fixed receptor layout.
#[derive(Debug, Clone)]
pub struct PhotoreceptorConverter {
    kernel: Array2<f64>,
    image_shape: (usize, usize),
    geometry: ReceptorGeometry,
}

impl PhotoreceptorConverter {
    /// Builds a converter for frames of `image_shape` (`(rows, cols)`) that
    /// produces about `receptor_count` receptors per frame.
    pub fn new(
        kernel: Array2<f64>,
        image_shape: (usize, usize),
        receptor_count: usize,
    ) -> ConverterResult<Self> {
        let geometry = ReceptorGeometry::derive(kernel.dim(), image_shape, receptor_count)?;
        Ok(Self {
            kernel,
            image_shape,
            geometry,
        })
    }

    pub fn kernel(&self) -> &Array2<f64> {
        &self.kernel
    }

    pub fn image_shape(&self) -> (usize, usize) {
        self.image_shape
    }

    pub fn geometry(&self) -> &ReceptorGeometry {
        &self.geometry
    }

    pub fn vertical(&self) -> usize {
        self.geometry.vertical
    }

    pub fn horizontal(&self) -> usize {
        self.geometry.horizontal
    }

    pub fn v_stride(&self) -> usize {
        self.geometry.v_stride
    }

    pub fn h_stride(&self) -> usize {
        self.geometry.h_stride
    }

    pub fn v_padding(&self) -> isize {
        self.geometry.v_padding
    }

    pub fn h_padding(&self) -> isize {
        self.geometry.h_padding
    }

    /// Converts a single frame into its receptor grid.
    pub fn apply<S>(&self, frame: &ArrayBase<S, Ix2>) -> ConverterResult<ReceptorGrid>
    where
        S: Data<Elem = f64>,
    {
        let actual = frame.dim();
        if actual != self.image_shape {
            return Err(ConverterError::ShapeMismatch {
                expected: self.image_shape,
                actual,
            });
        }
        Ok(correlate(frame, self.kernel.view(), &self.geometry))
    }

    /// Lazily converts every frame of `frames`, in order.
    pub fn receive<I>(&self, frames: I) -> Receive<'_, I::IntoIter>
    where
        I: IntoIterator,
        I::Item: Borrow<Frame>,
    {
        Receive {
            converter: self,
            frames: frames.into_iter(),
            index: 0,
            failed: false,
        }
    }

    /// Lazily converts `frames` and groups the results into buffers of
    /// `buffer_size` consecutive grids. The last buffer may be shorter.
    pub fn stream<I>(
        &self,
        frames: I,
        buffer_size: usize,
    ) -> ConverterResult<FrameBuffers<'_, I::IntoIter>>
    where
        I: IntoIterator,
        I::Item: Borrow<Frame>,
    {
        let buffer_size =
            NonZeroUsize::new(buffer_size).ok_or(ConverterError::InvalidBufferSize(buffer_size))?;
        Ok(self.stream_buffered(frames, buffer_size))
    }

    /// [`stream`](Self::stream) with a buffer size that is already known to be valid.
    pub fn stream_buffered<I>(
        &self,
        frames: I,
        buffer_size: NonZeroUsize,
    ) -> FrameBuffers<'_, I::IntoIter>
    where
        I: IntoIterator,
        I::Item: Borrow<Frame>,
    {
        FrameBuffers {
            received: self.receive(frames),
            buffer_size: buffer_size.get(),
            emitted: 0,
        }
    }
}

/// Iterator returned by [`PhotoreceptorConverter::receive`].
#[derive(Debug)]
pub struct Receive<'a, I> {
    converter: &'a PhotoreceptorConverter,
    frames: I,
    index: usize,
    failed: bool,
}

impl<I> Iterator for Receive<'_, I>
where
    I: Iterator,
    I::Item: Borrow<Frame>,
{
    type Item = ConverterResult<ReceptorGrid>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.frames.next()?;
        let frame: &Frame = item.borrow();
        let index = self.index;
        self.index += 1;

        match self.converter.apply(frame) {
            Ok(grid) => {
                trace!(frame = index, "converted frame");
                Some(Ok(grid))
            }
            Err(err) => {
                warn!(frame = index, %err, "aborting frame sequence");
                self.failed = true;
                Some(Err(err))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            return (0, Some(0));
        }
        let (_, upper) = self.frames.size_hint();
        (0, upper)
    }
}

impl<I> std::iter::FusedIterator for Receive<'_, I>
where
    I: std::iter::FusedIterator,
    I::Item: Borrow<Frame>,
{
}

/// Iterator returned by [`PhotoreceptorConverter::stream`].
#[derive(Debug)]
pub struct FrameBuffers<'a, I> {
    received: Receive<'a, I>,
    buffer_size: usize,
    emitted: usize,
}

impl<I> FrameBuffers<'_, I> {
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }
}

impl<I> Iterator for FrameBuffers<'_, I>
where
    I: Iterator,
    I::Item: Borrow<Frame>,
{
    type Item = ConverterResult<Vec<ReceptorGrid>>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut buffer = Vec::with_capacity(self.buffer_size);
        while buffer.len() < self.buffer_size {
            match self.received.next() {
                Some(Ok(grid)) => buffer.push(grid),
                // The partially filled buffer is dropped with the failure.
                Some(Err(err)) => return Some(Err(err)),
                None => break,
            }
        }
        if buffer.is_empty() {
            return None;
        }
        trace!(buffer = self.emitted, len = buffer.len(), "emitting buffer");
        self.emitted += 1;
        Some(Ok(buffer))
    }
}
