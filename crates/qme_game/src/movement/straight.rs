use qme_core::{Direction4, Direction8, Point, Timestamp};

use super::{Movement, MovementEnv, PixelIntegrator};

/// Constant velocity along a fixed angle, optionally limited in distance.
#[derive(Debug, Clone)]
pub struct StraightMovement {
    velocity_x: f64,
    velocity_y: f64,
    max_distance: Option<u32>,
    traveled: u32,
    stop_on_obstacle: bool,
    finished: bool,
    integrator: PixelIntegrator,
}

impl StraightMovement {
    /// `angle` in radians, counter-clockwise from east; `speed` in pixels
    /// per second.
    pub fn new(angle: f64, speed: u32) -> Self {
        let speed = f64::from(speed);
        Self::with_velocity(snap(angle.cos() * speed), snap(-angle.sin() * speed))
    }

    pub fn towards(direction: Direction4, speed: u32) -> Self {
        Self::towards8(Direction8::from_direction4(direction), speed)
    }

    pub fn towards8(direction: Direction8, speed: u32) -> Self {
        let unit = direction.offset();
        let speed = f64::from(speed);
        Self::with_velocity(f64::from(unit.x) * speed, f64::from(unit.y) * speed)
    }

    fn with_velocity(velocity_x: f64, velocity_y: f64) -> Self {
        Self {
            velocity_x,
            velocity_y,
            max_distance: None,
            traveled: 0,
            stop_on_obstacle: true,
            finished: false,
            integrator: PixelIntegrator::default(),
        }
    }

    pub fn with_max_distance(mut self, max_distance: u32) -> Self {
        self.max_distance = Some(max_distance);
        self
    }

    /// Keep pressing against obstacles instead of stopping at the first one.
    pub fn keep_trying_on_obstacle(mut self) -> Self {
        self.stop_on_obstacle = false;
        self
    }

    pub fn traveled(&self) -> u32 {
        self.traveled
    }
}

impl Movement for StraightMovement {
    fn label(&self) -> &'static str {
        "straight"
    }

    fn next_position(&mut self, current: Point, env: &MovementEnv) -> Option<Point> {
        if self.finished {
            return None;
        }

        let mut delta = self
            .integrator
            .advance(env.now, self.velocity_x, self.velocity_y);
        if delta == Point::ZERO {
            return None;
        }

        if let Some(max_distance) = self.max_distance {
            let step = delta.x.unsigned_abs().max(delta.y.unsigned_abs());
            let remaining = max_distance.saturating_sub(self.traveled);
            if step >= remaining {
                if step > remaining {
                    let remaining = remaining as i32;
                    let step = step as i32;
                    delta = Point::new(delta.x * remaining / step, delta.y * remaining / step);
                }
                self.traveled = max_distance;
                self.finished = true;
            } else {
                self.traveled += step;
            }
        }

        (delta != Point::ZERO).then_some(current + delta)
    }

    fn notify_obstacle_reached(&mut self, _now: Timestamp) {
        if self.stop_on_obstacle {
            self.finished = true;
        }
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

fn snap(component: f64) -> f64 {
    if component.abs() < 1e-9 {
        0.0
    } else {
        component
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(now: Timestamp) -> MovementEnv {
        MovementEnv { now, target: None }
    }

    #[test]
    fn moves_right_at_speed() {
        let mut movement = StraightMovement::towards(Direction4::Right, 100);
        let mut position = Point::new(0, 0);
        for tick in 0..=10 {
            if let Some(next) = movement.next_position(position, &env(tick * 10)) {
                position = next;
            }
        }
        assert_eq!(position, Point::new(10, 0));
    }

    #[test]
    fn angle_up_moves_toward_negative_y() {
        let mut movement = StraightMovement::new(std::f64::consts::FRAC_PI_2, 100);
        movement.next_position(Point::ZERO, &env(0));
        let next = movement
            .next_position(Point::ZERO, &env(100))
            .expect("should move");
        assert_eq!(next, Point::new(0, -10));
    }

    #[test]
    fn stops_exactly_at_max_distance() {
        let mut movement = StraightMovement::towards(Direction4::Left, 100).with_max_distance(16);
        let mut position = Point::new(50, 0);
        movement.next_position(position, &env(0));
        for tick in 1..=30 {
            if let Some(next) = movement.next_position(position, &env(tick * 30)) {
                position = next;
            }
        }
        assert_eq!(position, Point::new(34, 0));
        assert_eq!(movement.traveled(), 16);
        assert!(movement.is_finished());
    }

    #[test]
    fn obstacle_stops_unless_asked_to_keep_trying() {
        let mut stopping = StraightMovement::towards(Direction4::Down, 50);
        stopping.notify_obstacle_reached(0);
        assert!(stopping.is_finished());

        let mut pressing = StraightMovement::towards(Direction4::Down, 50).keep_trying_on_obstacle();
        pressing.notify_obstacle_reached(0);
        assert!(!pressing.is_finished());
    }
}
