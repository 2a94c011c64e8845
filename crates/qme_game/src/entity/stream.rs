use serde::Deserialize;

use qme_core::{Direction8, Layer, Point, Timestamp};

use super::{CollisionMode, EntityBase, EntityContext, EntityId, EntityKind, MapEntity};

const STREAM_SIZE: Point = Point::new(16, 16);
const STREAM_ORIGIN: Point = Point::new(8, 13);

fn default_speed() -> u32 {
    64
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StreamConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub layer: Layer,
    pub x: i32,
    pub y: i32,
    pub direction: Direction8,
    /// Pixels per second.
    #[serde(default = "default_speed")]
    pub speed: u32,
    #[serde(default = "default_true")]
    pub allow_movement: bool,
    #[serde(default = "default_true")]
    pub allow_attack: bool,
    #[serde(default = "default_true")]
    pub allow_item: bool,
    #[serde(default)]
    pub sprite: Option<String>,
}

/// What a stream imposes on whatever it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamPush {
    pub direction: Direction8,
    pub speed: u32,
    /// The carried entity may still walk on its own.
    pub allow_movement: bool,
    pub allow_attack: bool,
    pub allow_item: bool,
}

/// A stream currently carrying an entity. The stream refreshes it every
/// tick the entity stays on it; once it is stale the map drops it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamAction {
    pub stream: EntityId,
    pub push: StreamPush,
    pub last_activated_tick: u64,
    next_move: Option<Timestamp>,
}

impl StreamAction {
    pub fn new(stream: EntityId, push: StreamPush, tick: u64) -> Self {
        Self {
            stream,
            push,
            last_activated_tick: tick,
            next_move: None,
        }
    }

    /// Still valid at `tick` if refreshed during this tick or the previous one.
    pub fn is_active(&self, tick: u64) -> bool {
        self.last_activated_tick + 1 >= tick
    }

    /// Number of one-pixel steps owed at `now`. The first call only
    /// schedules the first step.
    pub fn due_steps(&mut self, now: Timestamp) -> u32 {
        if self.push.speed == 0 {
            return 0;
        }
        let delay = (1000 / u64::from(self.push.speed)).max(1);
        let mut next_move = *self.next_move.get_or_insert(now + delay);
        let mut steps = 0;
        while now >= next_move {
            steps += 1;
            next_move += delay;
        }
        self.next_move = Some(next_move);
        steps
    }
}

/// Terrain that drags whoever stands on it towards one of eight directions.
#[derive(Debug)]
pub struct Stream {
    base: EntityBase,
    direction: Direction8,
    speed: u32,
    allow_movement: bool,
    allow_attack: bool,
    allow_item: bool,
    sprite: Option<String>,
}

impl Stream {
    pub fn new(config: &StreamConfig) -> Self {
        Self {
            base: EntityBase::new(
                config.name.clone(),
                config.layer,
                Point::new(config.x, config.y),
                STREAM_SIZE,
                STREAM_ORIGIN,
            ),
            direction: config.direction,
            speed: config.speed,
            allow_movement: config.allow_movement,
            allow_attack: config.allow_attack,
            allow_item: config.allow_item,
            sprite: config.sprite.clone(),
        }
    }

    pub fn direction(&self) -> Direction8 {
        self.direction
    }

    /// Changes the direction. The map retargets the entities already on
    /// the stream, see `Map::set_stream_direction`.
    pub fn set_direction(&mut self, direction: Direction8) {
        if self.direction != direction {
            self.direction = direction;
            self.notify_direction_changed();
        }
    }

    fn notify_direction_changed(&self) {
        log::debug!("stream {} now flows {:?}", self.entity_ref(), self.direction);
    }

    pub fn speed(&self) -> u32 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: u32) {
        self.speed = speed;
    }

    pub fn allow_movement(&self) -> bool {
        self.allow_movement
    }

    pub fn set_allow_movement(&mut self, allow: bool) {
        self.allow_movement = allow;
    }

    pub fn allow_attack(&self) -> bool {
        self.allow_attack
    }

    pub fn set_allow_attack(&mut self, allow: bool) {
        self.allow_attack = allow;
    }

    pub fn allow_item(&self) -> bool {
        self.allow_item
    }

    pub fn set_allow_item(&mut self, allow: bool) {
        self.allow_item = allow;
    }

    pub fn sprite(&self) -> Option<&str> {
        self.sprite.as_deref()
    }

    pub fn push(&self) -> StreamPush {
        StreamPush {
            direction: self.direction,
            speed: self.speed,
            allow_movement: self.allow_movement,
            allow_attack: self.allow_attack,
            allow_item: self.allow_item,
        }
    }

    /// Starts or refreshes the push of this stream on `target`.
    pub fn activate(&self, target: &mut dyn MapEntity, ctx: &mut EntityContext<'_>) {
        let id = self.base.id();
        let push = self.push();
        let base = target.base_mut();
        match base.stream_action_mut() {
            Some(action) if action.stream == id => {
                action.push = push;
                action.last_activated_tick = ctx.tick;
            }
            _ => {
                log::debug!("stream {} takes entity {}", id, base.id());
                base.set_stream_action(Some(StreamAction::new(id, push, ctx.tick)));
            }
        }
    }
}

impl MapEntity for Stream {
    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EntityBase {
        &mut self.base
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Stream
    }

    fn collision_modes(&self) -> &'static [CollisionMode] {
        &[CollisionMode::Origin]
    }

    fn as_stream(&self) -> Option<&Stream> {
        Some(self)
    }

    fn as_stream_mut(&mut self) -> Option<&mut Stream> {
        Some(self)
    }

    fn is_obstacle_for(&self, other: &dyn MapEntity) -> bool {
        other.is_stream_obstacle(self)
    }

    fn notify_collision(
        &mut self,
        other: &mut dyn MapEntity,
        _mode: CollisionMode,
        ctx: &mut EntityContext<'_>,
    ) {
        other.notify_collision_with_stream(self, ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{hero_at, stream_at, RecordingAudio, RecordingScripts};
    use qme_core::Direction4;

    #[test]
    fn config_defaults_allow_everything() {
        let config: StreamConfig =
            serde_json::from_str(r#"{ "x": 0, "y": 0, "direction": "north_east" }"#)
                .expect("stream config should parse");
        assert_eq!(config.speed, 64);
        assert!(config.allow_movement && config.allow_attack && config.allow_item);
        assert_eq!(config.direction, Direction8::NorthEast);
    }

    #[test]
    fn activation_refreshes_instead_of_stacking() {
        let mut audio = RecordingAudio::default();
        let mut scripts = RecordingScripts::default();
        let stream = stream_at(0, 0, Direction8::East);
        let mut hero = hero_at(0, 0, Direction4::Down);

        let mut ctx = EntityContext::new(0, 4, &mut audio, &mut scripts);
        stream.activate(&mut hero, &mut ctx);
        ctx.tick = 5;
        stream.activate(&mut hero, &mut ctx);

        let action = hero.base().stream_action().copied().expect("hero is carried");
        assert_eq!(action.last_activated_tick, 5);
        assert!(action.is_active(6));
        assert!(!action.is_active(7));
    }

    #[test]
    fn due_steps_follow_speed() {
        let stream = stream_at(0, 0, Direction8::South);
        let mut action = StreamAction::new(stream.base().id(), stream.push(), 0);
        // 64 px/s is one pixel every 15 ms.
        assert_eq!(action.due_steps(0), 0);
        assert_eq!(action.due_steps(15), 1);
        assert_eq!(action.due_steps(60), 3);
    }

    #[test]
    fn push_reflects_current_settings() {
        let mut stream = stream_at(0, 0, Direction8::East);
        stream.set_direction(Direction8::West);
        stream.set_speed(32);
        stream.set_allow_item(false);
        let push = stream.push();
        assert_eq!(push.direction, Direction8::West);
        assert_eq!(push.speed, 32);
        assert!(!push.allow_item && push.allow_attack);
    }

    #[test]
    fn hero_walks_over_streams() {
        let stream = stream_at(0, 0, Direction8::East);
        let hero = hero_at(0, 0, Direction4::Down);
        assert!(!stream.is_obstacle_for(&hero));
    }
}
