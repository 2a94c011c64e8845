use qme_core::Point;

use super::{Movement, MovementEnv};
use crate::entity::EntityId;

/// Keeps the entity at a fixed offset from another entity.
///
/// Used for blocks while the hero pushes or pulls them: the offset is
/// captured when the movement starts and stays constant until detached.
#[derive(Debug, Clone)]
pub struct FollowMovement {
    target: EntityId,
    offset: Point,
    ignore_obstacles: bool,
    finished: bool,
}

impl FollowMovement {
    pub fn new(target: EntityId, offset: Point, ignore_obstacles: bool) -> Self {
        Self {
            target,
            offset,
            ignore_obstacles,
            finished: false,
        }
    }

    pub fn offset(&self) -> Point {
        self.offset
    }
}

impl Movement for FollowMovement {
    fn label(&self) -> &'static str {
        "follow"
    }

    fn next_position(&mut self, current: Point, env: &MovementEnv) -> Option<Point> {
        let Some(target) = env.target else {
            // Target left the map.
            self.finished = true;
            return None;
        };
        let wanted = target + self.offset;
        (wanted != current).then_some(wanted)
    }

    fn target(&self) -> Option<EntityId> {
        Some(self.target)
    }

    fn ignores_obstacles(&self) -> bool {
        self.ignore_obstacles
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}
