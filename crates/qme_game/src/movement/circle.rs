use qme_core::{Point, Timestamp};

use super::{Movement, MovementEnv};
use crate::entity::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircleCenter {
    Point(Point),
    Entity(EntityId),
}

/// Turns around a fixed point or around another entity.
#[derive(Debug, Clone)]
pub struct CircleMovement {
    center: CircleCenter,
    radius: i32,
    /// Degrees per second.
    angular_speed: f64,
    clockwise: bool,
    /// Degrees, counter-clockwise from east.
    angle: f64,
    max_rotations: Option<u32>,
    swept: f64,
    last_update: Option<Timestamp>,
    finished: bool,
}

impl CircleMovement {
    pub fn new(center: CircleCenter, radius: i32, angular_speed: f64, initial_angle: f64) -> Self {
        Self {
            center,
            radius,
            angular_speed,
            clockwise: false,
            angle: initial_angle,
            max_rotations: None,
            swept: 0.0,
            last_update: None,
            finished: false,
        }
    }

    pub fn clockwise(mut self) -> Self {
        self.clockwise = true;
        self
    }

    pub fn with_max_rotations(mut self, rotations: u32) -> Self {
        self.max_rotations = Some(rotations);
        self
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }
}

impl Movement for CircleMovement {
    fn label(&self) -> &'static str {
        "circle"
    }

    fn next_position(&mut self, current: Point, env: &MovementEnv) -> Option<Point> {
        if self.finished {
            return None;
        }
        let center = match self.center {
            CircleCenter::Point(point) => point,
            CircleCenter::Entity(_) => match env.target {
                Some(point) => point,
                None => {
                    self.finished = true;
                    return None;
                }
            },
        };

        let elapsed_ms = self
            .last_update
            .map_or(0, |last| env.now.saturating_sub(last));
        self.last_update = Some(env.now);

        let mut step = self.angular_speed * elapsed_ms as f64 / 1000.0;
        if let Some(rotations) = self.max_rotations {
            let limit = f64::from(rotations) * 360.0;
            if self.swept + step >= limit {
                step = limit - self.swept;
                self.finished = true;
            }
        }
        self.swept += step;
        self.angle = if self.clockwise {
            self.angle - step
        } else {
            self.angle + step
        }
        .rem_euclid(360.0);

        let radians = self.angle.to_radians();
        let radius = f64::from(self.radius);
        let wanted = center
            + Point::new(
                (radians.cos() * radius).round() as i32,
                (-radians.sin() * radius).round() as i32,
            );
        (wanted != current).then_some(wanted)
    }

    fn target(&self) -> Option<EntityId> {
        match self.center {
            CircleCenter::Entity(id) => Some(id),
            CircleCenter::Point(_) => None,
        }
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}
