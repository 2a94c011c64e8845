//! Map entities and the protocol they use to judge each other.
//!
//! Obstacles are resolved by double dispatch: `a.is_obstacle_for(b)` is
//! implemented by every kind as `b.is_<kind of a>_obstacle(a)`, so the
//! moving entity gives the final opinion about the concrete kind in its
//! way without anyone switching on a kind tag. Opinions default to
//! "obstacle" and kinds override only the pairs they care about.
//!
//! Collisions use the same trick for notifications: a detector that finds
//! an entity in its shape calls `notify_collision`, which forwards to the
//! `notify_collision_with_<kind>` hook of the other entity.
//!
//! Entities never touch the map directly. Requests that affect other
//! entities (removal, teleport, releasing a grabbed block) are queued as
//! [`EntityEvent`]s on the [`EntityContext`] and drained by the map right
//! after the step that raised them.

mod block;
mod destructible;
mod enemy;
mod hero;
mod stream;
mod switch;
mod teletransporter;

pub use block::{Block, BlockConfig, MaximumMoves, BLOCK_MOVING_DELAY_MS};
pub use destructible::{Destructible, DestructibleConfig};
pub use enemy::{Enemy, EnemyConfig};
pub use hero::{GrabbedEntity, Hero, HeroConfig, HeroInput, HeroState};
pub use stream::{Stream, StreamAction, StreamConfig, StreamPush};
pub use switch::{Switch, SwitchConfig, SwitchSubtype};
pub use teletransporter::{Teletransporter, TeletransporterConfig};

use std::fmt;

use qme_core::{Ground, Layer, Point, Rect, Timestamp};

use crate::audio::AudioSink;
use crate::movement::Movement;
use crate::script::ScriptSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Hero,
    Block,
    Stream,
    Switch,
    Teletransporter,
    Enemy,
    Destructible,
}

impl EntityKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Hero => "hero",
            Self::Block => "block",
            Self::Stream => "stream",
            Self::Switch => "switch",
            Self::Teletransporter => "teletransporter",
            Self::Enemy => "enemy",
            Self::Destructible => "destructible",
        }
    }
}

/// Borrowed identity of an entity, handed to script notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityRef<'a> {
    pub id: EntityId,
    pub name: Option<&'a str>,
    pub kind: EntityKind,
}

impl fmt::Display for EntityRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name {
            Some(name) => f.write_str(name),
            None => write!(f, "{}{}", self.kind.label(), self.id),
        }
    }
}

/// How a detector tests an entity against its own bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollisionMode {
    Overlapping,
    /// The entity's bounding box lies entirely inside the detector.
    Containing,
    /// The entity's origin point lies inside the detector.
    Origin,
    /// The point just in front of the entity lies inside the detector.
    Facing,
}

pub fn test_collision(detector: &dyn MapEntity, entity: &dyn MapEntity, mode: CollisionMode) -> bool {
    let shape = detector.base().bounding_box();
    match mode {
        CollisionMode::Overlapping => shape.overlaps(&entity.base().bounding_box()),
        CollisionMode::Containing => shape.contains_rect(&entity.base().bounding_box()),
        CollisionMode::Origin => shape.contains_point(entity.base().position()),
        CollisionMode::Facing => entity
            .facing_point()
            .is_some_and(|point| shape.contains_point(point)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityEvent {
    /// The entity has been marked removed; it is erased at the end of the tick.
    Remove(EntityId),
    /// A grabbed entity could not follow the hero any further.
    GrabbedEntityCollision { entity: EntityId },
    Teleport {
        entity: EntityId,
        destination: Point,
        layer: Layer,
    },
    /// The entity was put somewhere without walking there.
    Repositioned(EntityId),
}

/// Everything an entity hook may touch besides itself, for one tick.
pub struct EntityContext<'a> {
    /// The single clock reading of this tick.
    pub now: Timestamp,
    pub tick: u64,
    pub audio: &'a mut dyn AudioSink,
    pub scripts: &'a mut dyn ScriptSink,
    events: Vec<EntityEvent>,
}

impl<'a> EntityContext<'a> {
    pub fn new(
        now: Timestamp,
        tick: u64,
        audio: &'a mut dyn AudioSink,
        scripts: &'a mut dyn ScriptSink,
    ) -> Self {
        Self {
            now,
            tick,
            audio,
            scripts,
            events: Vec::new(),
        }
    }

    pub fn push_event(&mut self, event: EntityEvent) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<EntityEvent> {
        std::mem::take(&mut self.events)
    }
}

/// State shared by every kind of entity.
#[derive(Debug)]
pub struct EntityBase {
    id: EntityId,
    name: Option<String>,
    layer: Layer,
    position: Point,
    origin: Point,
    size: Point,
    movement: Option<Box<dyn Movement>>,
    ground_below: Option<Ground>,
    removed: bool,
    movement_notifications: bool,
    drawn_in_y_order: bool,
    stream_action: Option<StreamAction>,
}

impl EntityBase {
    pub fn new(name: Option<String>, layer: Layer, position: Point, size: Point, origin: Point) -> Self {
        Self {
            id: EntityId::default(),
            name,
            layer,
            position,
            origin,
            size,
            movement: None,
            ground_below: None,
            removed: false,
            movement_notifications: true,
            drawn_in_y_order: false,
            stream_action: None,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn entity_ref(&self, kind: EntityKind) -> EntityRef<'_> {
        EntityRef {
            id: self.id,
            name: self.name(),
            kind,
        }
    }

    pub fn layer(&self) -> Layer {
        self.layer
    }

    pub fn set_layer(&mut self, layer: Layer) {
        self.layer = layer;
    }

    /// Position of the origin point.
    pub fn position(&self) -> Point {
        self.position
    }

    /// Moves the entity without obstacle checks or notifications.
    pub fn set_position(&mut self, position: Point) {
        self.position = position;
    }

    pub fn origin(&self) -> Point {
        self.origin
    }

    pub fn size(&self) -> Point {
        self.size
    }

    pub fn bounding_box(&self) -> Rect {
        self.bounding_box_at(self.position)
    }

    pub fn bounding_box_at(&self, position: Point) -> Rect {
        Rect::new(
            position.x - self.origin.x,
            position.y - self.origin.y,
            self.size.x,
            self.size.y,
        )
    }

    pub fn movement(&self) -> Option<&dyn Movement> {
        self.movement.as_deref()
    }

    pub fn movement_mut(&mut self) -> Option<&mut (dyn Movement + 'static)> {
        self.movement.as_deref_mut()
    }

    pub fn has_movement(&self) -> bool {
        self.movement.is_some()
    }

    /// Attaches a movement, dropping whichever one was attached before.
    pub fn set_movement(&mut self, movement: Box<dyn Movement>) {
        if let Some(previous) = self.movement.replace(movement) {
            log::trace!("entity {} drops its {} movement", self.id, previous.label());
        }
    }

    pub fn clear_movement(&mut self) -> Option<Box<dyn Movement>> {
        self.movement.take()
    }

    pub fn ground_below(&self) -> Option<Ground> {
        self.ground_below
    }

    pub(crate) fn set_ground_below(&mut self, ground: Option<Ground>) {
        self.ground_below = ground;
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// Marks the entity removed. Repeated calls queue a single removal.
    pub fn remove_from_map(&mut self, ctx: &mut EntityContext<'_>) {
        if !self.removed {
            self.removed = true;
            ctx.push_event(EntityEvent::Remove(self.id));
        }
    }

    pub fn are_movement_notifications_enabled(&self) -> bool {
        self.movement_notifications
    }

    pub fn set_movement_notifications_enabled(&mut self, enabled: bool) {
        self.movement_notifications = enabled;
    }

    pub fn is_drawn_in_y_order(&self) -> bool {
        self.drawn_in_y_order
    }

    pub fn set_drawn_in_y_order(&mut self, drawn_in_y_order: bool) {
        self.drawn_in_y_order = drawn_in_y_order;
    }

    pub fn stream_action(&self) -> Option<&StreamAction> {
        self.stream_action.as_ref()
    }

    pub fn stream_action_mut(&mut self) -> Option<&mut StreamAction> {
        self.stream_action.as_mut()
    }

    pub fn set_stream_action(&mut self, action: Option<StreamAction>) {
        self.stream_action = action;
    }

    pub(crate) fn notify_scripts_position_changed(&self, kind: EntityKind, ctx: &mut EntityContext<'_>) {
        if self.movement_notifications {
            ctx.scripts
                .entity_position_changed(self.entity_ref(kind), self.position, self.layer);
        }
    }
}

/// Terrain that stops an entity unless its kind says otherwise.
pub fn default_ground_obstacle(ground: Ground) -> bool {
    match ground {
        Ground::Wall
        | Ground::LowWall
        | Ground::DeepWater
        | Ground::Hole
        | Ground::Lava
        | Ground::Prickles
        | Ground::Ladder => true,
        Ground::Empty
        | Ground::Traversable
        | Ground::ShallowWater
        | Ground::Grass
        | Ground::Ice => false,
    }
}

/// Bookkeeping every entity does when its movement was vetoed.
pub fn default_obstacle_reached(base: &mut EntityBase, now: Timestamp) {
    if let Some(movement) = base.movement_mut() {
        movement.notify_obstacle_reached(now);
    }
}

pub trait MapEntity: fmt::Debug {
    fn base(&self) -> &EntityBase;
    fn base_mut(&mut self) -> &mut EntityBase;
    fn kind(&self) -> EntityKind;

    fn entity_ref(&self) -> EntityRef<'_> {
        self.base().entity_ref(self.kind())
    }

    fn collision_modes(&self) -> &'static [CollisionMode] {
        &[]
    }

    fn is_detector(&self) -> bool {
        !self.collision_modes().is_empty()
    }

    fn is_ground_observer(&self) -> bool {
        false
    }

    /// Point just in front of the entity, for entities that face a direction.
    fn facing_point(&self) -> Option<Point> {
        None
    }

    fn as_hero(&self) -> Option<&Hero> {
        None
    }

    fn as_hero_mut(&mut self) -> Option<&mut Hero> {
        None
    }

    fn as_block(&self) -> Option<&Block> {
        None
    }

    fn as_block_mut(&mut self) -> Option<&mut Block> {
        None
    }

    fn as_stream(&self) -> Option<&Stream> {
        None
    }

    fn as_stream_mut(&mut self) -> Option<&mut Stream> {
        None
    }

    // Obstacle protocol. Queries are pure: they never change state.

    /// Whether `self` stops `other` from moving.
    fn is_obstacle_for(&self, other: &dyn MapEntity) -> bool;

    fn is_hero_obstacle(&self, _hero: &Hero) -> bool {
        true
    }

    fn is_enemy_obstacle(&self, _enemy: &Enemy) -> bool {
        true
    }

    fn is_destructible_obstacle(&self, _destructible: &Destructible) -> bool {
        true
    }

    fn is_teletransporter_obstacle(&self, _teletransporter: &Teletransporter) -> bool {
        true
    }

    fn is_block_obstacle(&self, _block: &Block) -> bool {
        true
    }

    fn is_switch_obstacle(&self, _switch: &Switch) -> bool {
        true
    }

    fn is_stream_obstacle(&self, _stream: &Stream) -> bool {
        true
    }

    fn is_ground_obstacle(&self, ground: Ground) -> bool {
        default_ground_obstacle(ground)
    }

    // Notifications. These may change state and may run several times a tick.

    fn notify_collision(
        &mut self,
        _other: &mut dyn MapEntity,
        _mode: CollisionMode,
        _ctx: &mut EntityContext<'_>,
    ) {
    }

    fn notify_collision_with_block(&mut self, _block: &mut Block, _ctx: &mut EntityContext<'_>) {}

    fn notify_collision_with_switch(
        &mut self,
        _switch: &mut Switch,
        _mode: CollisionMode,
        _ctx: &mut EntityContext<'_>,
    ) {
    }

    fn notify_collision_with_stream(&mut self, _stream: &mut Stream, _ctx: &mut EntityContext<'_>) {}

    fn notify_collision_with_teletransporter(
        &mut self,
        _teletransporter: &mut Teletransporter,
        _ctx: &mut EntityContext<'_>,
    ) {
    }

    fn notify_position_changed(&mut self, _ctx: &mut EntityContext<'_>) {}

    fn notify_obstacle_reached(&mut self, ctx: &mut EntityContext<'_>) {
        default_obstacle_reached(self.base_mut(), ctx.now);
    }

    fn notify_moving_by(&mut self, _actor: &dyn MapEntity, _ctx: &mut EntityContext<'_>) {}

    fn notify_moved_by(&mut self, _actor: &dyn MapEntity, _ctx: &mut EntityContext<'_>) {}

    fn notify_ground_below_changed(&mut self, _ctx: &mut EntityContext<'_>) {}

    /// Per-tick timers, before the movement step.
    fn update(&mut self, _ctx: &mut EntityContext<'_>) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{block_at, hero_at, RecordingAudio, RecordingScripts};
    use qme_core::Direction4;

    #[test]
    fn ground_defaults_block_walls_and_hazards() {
        assert!(default_ground_obstacle(Ground::Wall));
        assert!(default_ground_obstacle(Ground::Hole));
        assert!(default_ground_obstacle(Ground::Lava));
        assert!(!default_ground_obstacle(Ground::Traversable));
        assert!(!default_ground_obstacle(Ground::ShallowWater));
    }

    #[test]
    fn facing_collision_uses_point_in_front_of_hero() {
        let block = block_at(10, 20, 1);
        // Hero box spans x -14..2, the block starts at x 2.
        let hero = hero_at(-6, 20, Direction4::Right);
        assert!(test_collision(&block, &hero, CollisionMode::Facing));
        assert!(!test_collision(&block, &hero, CollisionMode::Overlapping));

        let looking_away = hero_at(-6, 20, Direction4::Left);
        assert!(!test_collision(&block, &looking_away, CollisionMode::Facing));
    }

    #[test]
    fn remove_from_map_queues_a_single_event() {
        let mut audio = RecordingAudio::default();
        let mut scripts = RecordingScripts::default();
        let mut ctx = EntityContext::new(0, 1, &mut audio, &mut scripts);
        let mut block = block_at(0, 0, 2);
        block.base_mut().remove_from_map(&mut ctx);
        block.base_mut().remove_from_map(&mut ctx);
        assert!(block.base().is_removed());
        assert_eq!(ctx.take_events(), vec![EntityEvent::Remove(block.base().id())]);
    }

    #[test]
    fn entity_ref_display_prefers_name() {
        let named = EntityRef {
            id: EntityId(3),
            name: Some("crate"),
            kind: EntityKind::Block,
        };
        let anonymous = EntityRef {
            id: EntityId(3),
            name: None,
            kind: EntityKind::Block,
        };
        assert_eq!(named.to_string(), "crate");
        assert_eq!(anonymous.to_string(), "block#3");
    }

    #[test]
    fn bounding_box_is_anchored_on_origin() {
        let base = EntityBase::new(None, Layer::Low, Point::new(10, 20), Point::new(16, 16), Point::new(8, 13));
        assert_eq!(base.bounding_box(), Rect::new(2, 7, 16, 16));
    }
}
