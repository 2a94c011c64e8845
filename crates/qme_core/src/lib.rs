//! Leaf primitives shared by the map simulation: integer geometry, the
//! engine clock and terrain classification.

pub mod geometry;
pub mod ground;
pub mod time;

pub use geometry::{Direction4, Direction8, Layer, Point, Rect};
pub use ground::Ground;
pub use time::{Clock, SimClock, TickTimer, Timestamp};
