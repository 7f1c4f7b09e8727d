//! Image preparation and coordinate handling.

pub mod coordinates;
mod normalizer;

pub use coordinates::{
    parse_relative, parse_relative_value, resolve, AbsoluteCoordinate, CoordinateError,
    RelativeCoordinate,
};
pub use normalizer::{
    normalize, NormalizeError, NormalizedImage, DEFAULT_MAX_DIMENSION, DEFAULT_QUALITY,
};
