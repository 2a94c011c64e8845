use qme_core::{Direction8, Point, Timestamp};

use super::{Movement, MovementEnv};

/// Pixels covered by one element of a path.
pub const PATH_STEP_PX: u32 = 8;

/// Follows a sequence of 8-direction steps, one pixel at a time.
#[derive(Debug, Clone)]
pub struct PathMovement {
    path: Vec<Direction8>,
    speed: u32,
    looping: bool,
    index: usize,
    pixels_in_step: u32,
    next_move: Option<Timestamp>,
    finished: bool,
}

impl PathMovement {
    pub fn new(path: Vec<Direction8>, speed: u32, looping: bool) -> Self {
        let finished = path.is_empty();
        Self {
            path,
            speed,
            looping,
            index: 0,
            pixels_in_step: 0,
            next_move: None,
            finished,
        }
    }

    /// Parses a path written as direction digits, e.g. `"0022"` for two
    /// steps east then two steps north.
    pub fn parse_path(digits: &str) -> Result<Vec<Direction8>, String> {
        digits
            .chars()
            .map(|c| {
                c.to_digit(10)
                    .and_then(|d| Direction8::from_index(d as i32))
                    .ok_or_else(|| format!("Invalid path direction '{c}' in \"{digits}\""))
            })
            .collect()
    }

    pub fn current_step(&self) -> usize {
        self.index
    }

    fn delay_ms(&self) -> u64 {
        (1000 / u64::from(self.speed)).max(1)
    }

    fn advance_step(&mut self) {
        self.pixels_in_step = 0;
        self.index += 1;
        if self.index >= self.path.len() {
            if self.looping {
                self.index = 0;
            } else {
                self.finished = true;
            }
        }
    }
}

impl Movement for PathMovement {
    fn label(&self) -> &'static str {
        "path"
    }

    fn next_position(&mut self, current: Point, env: &MovementEnv) -> Option<Point> {
        if self.finished || self.speed == 0 {
            return None;
        }

        let delay = self.delay_ms();
        let mut next_move = *self.next_move.get_or_insert(env.now + delay);
        let mut delta = Point::ZERO;
        while !self.finished && env.now >= next_move {
            delta += self.path[self.index].offset();
            next_move += delay;
            self.pixels_in_step += 1;
            if self.pixels_in_step == PATH_STEP_PX {
                self.advance_step();
            }
        }
        self.next_move = Some(next_move);

        (delta != Point::ZERO).then_some(current + delta)
    }

    /// A blocked step is abandoned and the path resumes with the next one.
    fn notify_obstacle_reached(&mut self, _now: Timestamp) {
        if !self.finished {
            self.advance_step();
        }
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}
