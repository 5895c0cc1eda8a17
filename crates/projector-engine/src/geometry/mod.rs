//! Shape descriptions and their expansion into projected vertices.
//!
//! Pipeline per frame:
//! 1. expand each primitive in its source frame (`expand`)
//! 2. place entity bodies in the world frame (scale + rotate before projection)
//! 3. batch every vertex by source frame and convert once per frame (`batch`)
//! 4. pattern trails in pixel space (`trail`)

mod batch;
mod expand;
mod primitive;
mod trail;

pub use batch::{BatchProjector, Span};
pub use expand::{
    ARROW_WING_ANGLE, Expanded, MIN_ARROW_WING_PX, Outline, Placement, TRIANGLE, arrow_wings,
    body_parts, bounds, box_corners, circle_points, expand, place_body,
};
pub use primitive::{DEFAULT_FONT_SIZE, Primitive};
pub use trail::{TrailGeometry, pattern_trail};
