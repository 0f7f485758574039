// THEORY:
// This file is the main entry point for the `retina_vision` library crate.
// It models a patch of retina: an array of photoreceptors, each looking at the
// image through the same receptive field (a convolution kernel), laid out so
// that the whole array has about as many receptors as requested in the
// image's aspect ratio. Every frame in, one receptor response grid out.
//
// The public API is layered:
// - `PhotoreceptorConverter` (in `core_modules::converter`) is the engine:
//   derive the sampling geometry once, then `apply` it to single frames or
//   pull converted frames lazily with `receive` and `stream`.
// - `pipeline` wraps the engine in a `ConverterConfig` so a caller configures
//   frame size, receptor count and buffering in one place.
// - `parallel_pipeline` shares one converter across a Tokio worker pool for
//   callers that want many frames converted at once, in order.
//
// Frames are `ndarray` matrices of `f64`. `core_modules::frame` turns in-memory
// `image` buffers and raw RGBA bytes into frames; decoding files or video is
// left to the caller.

pub mod core_modules;
pub mod parallel_pipeline;
pub mod pipeline;

pub use core_modules::converter::{
    Frame, FrameBuffers, PhotoreceptorConverter, ReceptorGrid, Receive,
};
pub use core_modules::error::{ConverterError, ConverterResult};
pub use core_modules::geometry::ReceptorGeometry;
pub use parallel_pipeline::{ParallelConfig, ParallelConverter};
pub use pipeline::{ConverterConfig, ReceptorPipeline};
