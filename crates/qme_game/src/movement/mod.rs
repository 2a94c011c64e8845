//! Movements: the drivers that compute where an entity wants to be next.
//!
//! A movement never writes the entity position itself. Each tick the map
//! asks [`Movement::next_position`] for a candidate, walks the entity there
//! one pixel at a time, and reports a veto through
//! [`Movement::notify_obstacle_reached`]. What happens after a veto is up
//! to the movement: stop, keep pressing, or pick another course.

mod circle;
mod follow;
mod path;
mod random;
mod straight;

pub use circle::{CircleCenter, CircleMovement};
pub use follow::FollowMovement;
pub use path::PathMovement;
pub use random::RandomMovement;
pub use straight::StraightMovement;

use serde::Deserialize;

use qme_core::{Point, Timestamp};

use crate::entity::EntityId;

/// Movement attached to an entity when the map loads.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MovementDef {
    Straight {
        angle_deg: f64,
        speed: u32,
        #[serde(default)]
        max_distance: Option<u32>,
    },
    Path {
        path: String,
        speed: u32,
        #[serde(default)]
        looping: bool,
    },
    Random {
        speed: u32,
        #[serde(default)]
        max_radius: Option<i32>,
    },
    Circle {
        center_x: i32,
        center_y: i32,
        radius: i32,
        angular_speed: f64,
        #[serde(default)]
        clockwise: bool,
    },
}

impl MovementDef {
    /// `seed` only matters for random movements.
    pub fn build(&self, seed: u64) -> Result<Box<dyn Movement>, String> {
        let movement: Box<dyn Movement> = match self {
            Self::Straight {
                angle_deg,
                speed,
                max_distance,
            } => {
                let movement = StraightMovement::new(angle_deg.to_radians(), *speed);
                Box::new(match max_distance {
                    Some(distance) => movement.with_max_distance(*distance),
                    None => movement,
                })
            }
            Self::Path {
                path,
                speed,
                looping,
            } => {
                if *speed == 0 {
                    return Err("path movement speed must be > 0".to_string());
                }
                Box::new(PathMovement::new(PathMovement::parse_path(path)?, *speed, *looping))
            }
            Self::Random { speed, max_radius } => {
                Box::new(RandomMovement::new(*speed, *max_radius, seed))
            }
            Self::Circle {
                center_x,
                center_y,
                radius,
                angular_speed,
                clockwise,
            } => {
                if *radius < 0 {
                    return Err(format!("circle movement radius must be >= 0, got {radius}"));
                }
                let movement = CircleMovement::new(
                    CircleCenter::Point(Point::new(*center_x, *center_y)),
                    *radius,
                    *angular_speed,
                    0.0,
                );
                Box::new(if *clockwise { movement.clockwise() } else { movement })
            }
        };
        Ok(movement)
    }
}

/// What the map tells a movement before asking for the next position.
#[derive(Debug, Clone, Copy)]
pub struct MovementEnv {
    pub now: Timestamp,
    /// Current position of [`Movement::target`], if it has one and the
    /// target is still on the map.
    pub target: Option<Point>,
}

pub trait Movement: std::fmt::Debug {
    fn label(&self) -> &'static str;

    /// Candidate position for this tick, or `None` to stay in place.
    fn next_position(&mut self, current: Point, env: &MovementEnv) -> Option<Point>;

    /// Entity whose position this movement depends on.
    fn target(&self) -> Option<EntityId> {
        None
    }

    fn ignores_obstacles(&self) -> bool {
        false
    }

    fn notify_obstacle_reached(&mut self, _now: Timestamp) {}

    fn is_finished(&self) -> bool {
        false
    }
}

/// Integrates a velocity in pixels per second into whole-pixel steps,
/// carrying the fractional part over to the next call.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PixelIntegrator {
    last_update: Option<Timestamp>,
    remainder_x: f64,
    remainder_y: f64,
}

impl PixelIntegrator {
    /// First call only starts the clock and returns a zero step.
    pub(crate) fn advance(&mut self, now: Timestamp, velocity_x: f64, velocity_y: f64) -> Point {
        let elapsed_ms = match self.last_update {
            Some(last) => now.saturating_sub(last),
            None => 0,
        };
        self.last_update = Some(now);
        if elapsed_ms == 0 {
            return Point::ZERO;
        }

        let elapsed_ms = elapsed_ms as f64;
        let total_x = self.remainder_x + velocity_x * elapsed_ms / 1000.0;
        let total_y = self.remainder_y + velocity_y * elapsed_ms / 1000.0;
        let step_x = total_x.trunc();
        let step_y = total_y.trunc();
        self.remainder_x = total_x - step_x;
        self.remainder_y = total_y - step_y;
        Point::new(step_x as i32, step_y as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrator_starts_with_zero_step() {
        let mut integrator = PixelIntegrator::default();
        assert_eq!(integrator.advance(1000, 100.0, 0.0), Point::ZERO);
        assert_eq!(integrator.advance(1010, 100.0, 0.0), Point::new(1, 0));
    }

    #[test]
    fn integrator_carries_fractions() {
        let mut integrator = PixelIntegrator::default();
        integrator.advance(0, 50.0, -50.0);
        let mut total = Point::ZERO;
        for tick in 1..=25 {
            total += integrator.advance(tick * 10, 50.0, -50.0);
        }
        // 50 px/s for 250 ms, the last half pixel is still pending
        assert_eq!(total, Point::new(12, -12));
    }

    #[test]
    fn movement_def_parses_tagged_json() {
        let def: MovementDef =
            serde_json::from_str(r#"{ "kind": "path", "path": "0044", "speed": 32 }"#)
                .expect("movement def should parse");
        assert_eq!(
            def,
            MovementDef::Path {
                path: "0044".to_string(),
                speed: 32,
                looping: false
            }
        );
        assert_eq!(def.build(0).expect("valid path").label(), "path");
    }

    #[test]
    fn movement_def_rejects_bad_path() {
        let def = MovementDef::Path {
            path: "09".to_string(),
            speed: 32,
            looping: true,
        };
        let err = def.build(0).expect_err("digit 9 is not a direction");
        assert!(err.contains("Invalid path direction"));
    }
}
