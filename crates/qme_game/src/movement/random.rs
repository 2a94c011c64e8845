use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use qme_core::{Direction8, Point, Timestamp};

use super::{Movement, MovementEnv, StraightMovement};

const MIN_DIRECTION_MS: u64 = 500;
const MAX_DIRECTION_MS: u64 = 3000;

/// Wanders in one of the eight directions, changing course every few
/// seconds or as soon as an obstacle is hit. With a radius set, an entity
/// that strays too far from where it started heads back.
#[derive(Debug, Clone)]
pub struct RandomMovement {
    speed: u32,
    max_radius: Option<i32>,
    anchor: Option<Point>,
    rng: StdRng,
    leg: Option<StraightMovement>,
    next_change: Option<Timestamp>,
}

impl RandomMovement {
    pub fn new(speed: u32, max_radius: Option<i32>, seed: u64) -> Self {
        Self {
            speed,
            max_radius,
            anchor: None,
            rng: StdRng::seed_from_u64(seed),
            leg: None,
            next_change: None,
        }
    }

    fn pick_direction(&mut self, current: Point, anchor: Point, now: Timestamp) {
        let away = current - anchor;
        let strayed = self
            .max_radius
            .is_some_and(|radius| away.x.abs().max(away.y.abs()) > radius);

        let direction = if strayed {
            direction_towards(-away)
        } else {
            None
        }
        .unwrap_or_else(|| Direction8::ALL[self.rng.gen_range(0..Direction8::ALL.len())]);

        log::trace!("random movement heads {:?}", direction);
        self.leg = Some(StraightMovement::towards8(direction, self.speed));
        self.next_change = Some(now + self.rng.gen_range(MIN_DIRECTION_MS..=MAX_DIRECTION_MS));
    }
}

impl Movement for RandomMovement {
    fn label(&self) -> &'static str {
        "random"
    }

    fn next_position(&mut self, current: Point, env: &MovementEnv) -> Option<Point> {
        let anchor = *self.anchor.get_or_insert(current);
        let due = self.next_change.map_or(true, |at| env.now >= at);
        if due || self.leg.is_none() {
            self.pick_direction(current, anchor, env.now);
        }
        self.leg.as_mut()?.next_position(current, env)
    }

    fn notify_obstacle_reached(&mut self, _now: Timestamp) {
        self.next_change = None;
    }
}

fn direction_towards(delta: Point) -> Option<Direction8> {
    let unit = delta.signum();
    Direction8::ALL.into_iter().find(|d| d.offset() == unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(movement: &mut RandomMovement, start: Point, until: Timestamp) -> Vec<Point> {
        let mut position = start;
        let mut trail = Vec::new();
        let mut now = 0;
        while now <= until {
            let env = MovementEnv { now, target: None };
            if let Some(next) = movement.next_position(position, &env) {
                position = next;
            }
            trail.push(position);
            now += 16;
        }
        trail
    }

    #[test]
    fn same_seed_same_trail() {
        let mut a = RandomMovement::new(48, None, 7);
        let mut b = RandomMovement::new(48, None, 7);
        assert_eq!(
            run(&mut a, Point::new(100, 100), 5000),
            run(&mut b, Point::new(100, 100), 5000)
        );
    }

    #[test]
    fn radius_keeps_entity_near_anchor() {
        let mut movement = RandomMovement::new(64, Some(24), 3);
        let start = Point::new(200, 200);
        for position in run(&mut movement, start, 20_000) {
            let away = position - start;
            // One direction leg may overshoot before the next check turns it back.
            assert!(away.x.abs() <= 24 + 3 * 64, "strayed to {:?}", position);
            assert!(away.y.abs() <= 24 + 3 * 64, "strayed to {:?}", position);
        }
    }

    #[test]
    fn direction_towards_matches_signs() {
        assert_eq!(direction_towards(Point::new(5, -3)), Some(Direction8::NorthEast));
        assert_eq!(direction_towards(Point::new(0, 9)), Some(Direction8::South));
        assert_eq!(direction_towards(Point::ZERO), None);
    }
}
