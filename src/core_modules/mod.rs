pub mod converter;
pub(crate) mod correlate;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod kernels;
