//! Coordinate fields: named frames calibrated against the world frame.
//!
//! A field is defined by four corner correspondences between world meters and
//! its own local units. The registry turns each calibration into an exact
//! projective transform and caches the composed transform for every ordered
//! pair of registered frames, so converting between two fields is one matrix
//! application per point.

mod homography;
mod registry;

pub use homography::Homography;
pub use registry::{DEFAULT_PROBE_DISTANCE, Field, FieldPairs, FieldRegistry, SCREEN, WORLD};
