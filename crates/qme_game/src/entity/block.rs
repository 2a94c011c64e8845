use serde::Deserialize;

use qme_core::{Direction4, Ground, Layer, Point, Timestamp};

use super::{
    default_ground_obstacle, default_obstacle_reached, CollisionMode, Destructible, Enemy,
    EntityBase, EntityContext, EntityEvent, EntityKind, Hero, MapEntity, Switch, Teletransporter,
};
use crate::movement::FollowMovement;

/// Cooldown between the end of a push and the next one.
pub const BLOCK_MOVING_DELAY_MS: u64 = 500;

const BLOCK_SIZE: Point = Point::new(16, 16);
const BLOCK_ORIGIN: Point = Point::new(8, 13);

const PUSH_SOUND: &str = "hero_pushes";
const FALL_SOUND: &str = "jump";
const SPLASH_SOUND: &str = "splash";

/// How many more times a block may be moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaximumMoves {
    Never,
    Once,
    Unlimited,
}

impl MaximumMoves {
    pub fn count(self) -> i32 {
        match self {
            Self::Never => 0,
            Self::Once => 1,
            Self::Unlimited => 2,
        }
    }
}

impl TryFrom<i32> for MaximumMoves {
    type Error = String;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Never),
            1 => Ok(Self::Once),
            2 => Ok(Self::Unlimited),
            other => Err(format!(
                "maximum_moves must be 0, 1 or 2 (unlimited), got {other}"
            )),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_maximum_moves() -> i32 {
    1
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BlockConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub layer: Layer,
    pub x: i32,
    pub y: i32,
    /// Only direction the block may be moved in; any when absent.
    #[serde(default)]
    pub direction: Option<Direction4>,
    #[serde(default)]
    pub sprite: Option<String>,
    #[serde(default = "default_true")]
    pub pushable: bool,
    #[serde(default)]
    pub pullable: bool,
    #[serde(default = "default_maximum_moves")]
    pub maximum_moves: i32,
}

impl BlockConfig {
    pub fn at(x: i32, y: i32) -> Self {
        Self {
            name: None,
            layer: Layer::Low,
            x,
            y,
            direction: None,
            sprite: None,
            pushable: true,
            pullable: false,
            maximum_moves: 1,
        }
    }
}

/// An entity the hero can push or pull.
///
/// While the hero moves it, the block carries a follow movement locked on
/// the hero at the offset they had when the push started. Detaching the
/// movement settles the block, starts the cooldown and may spend its only
/// move.
#[derive(Debug)]
pub struct Block {
    base: EntityBase,
    allowed_direction: Option<Direction4>,
    sprite: Option<String>,
    maximum_moves: MaximumMoves,
    initial_maximum_moves: MaximumMoves,
    can_be_pushed: bool,
    can_be_pulled: bool,
    sound_played: bool,
    when_can_move: Timestamp,
    last_position: Point,
    initial_position: Point,
}

impl Block {
    /// `sprite_size` is the frame size of the block's sprite if it has one.
    /// Blocks taller than one cell are drawn in y order with the hero.
    pub fn new(config: &BlockConfig, sprite_size: Option<Point>, now: Timestamp) -> Result<Self, String> {
        let maximum_moves = MaximumMoves::try_from(config.maximum_moves)?;
        let position = Point::new(config.x, config.y);
        let mut base = EntityBase::new(
            config.name.clone(),
            config.layer,
            position,
            BLOCK_SIZE,
            BLOCK_ORIGIN,
        );
        base.set_drawn_in_y_order(sprite_size.is_some_and(|size| size.y > BLOCK_SIZE.y));

        Ok(Self {
            base,
            allowed_direction: config.direction,
            sprite: config.sprite.clone(),
            maximum_moves,
            initial_maximum_moves: maximum_moves,
            can_be_pushed: config.pushable,
            can_be_pulled: config.pullable,
            sound_played: false,
            when_can_move: now,
            last_position: position,
            initial_position: position,
        })
    }

    pub fn allowed_direction(&self) -> Option<Direction4> {
        self.allowed_direction
    }

    pub fn sprite(&self) -> Option<&str> {
        self.sprite.as_deref()
    }

    pub fn maximum_moves(&self) -> MaximumMoves {
        self.maximum_moves
    }

    pub fn initial_maximum_moves(&self) -> MaximumMoves {
        self.initial_maximum_moves
    }

    /// Re-arms the block: both the current and the initial counters change,
    /// so a later `reset` keeps the new value.
    pub fn set_maximum_moves(&mut self, value: i32) -> Result<(), String> {
        let moves = MaximumMoves::try_from(value)?;
        self.maximum_moves = moves;
        self.initial_maximum_moves = moves;
        Ok(())
    }

    pub fn is_pushable(&self) -> bool {
        self.can_be_pushed
    }

    pub fn set_pushable(&mut self, pushable: bool) {
        self.can_be_pushed = pushable;
    }

    pub fn is_pullable(&self) -> bool {
        self.can_be_pulled
    }

    pub fn set_pullable(&mut self, pullable: bool) {
        self.can_be_pulled = pullable;
    }

    pub fn when_can_move(&self) -> Timestamp {
        self.when_can_move
    }

    /// Where the block stood when its last movement ended.
    pub fn last_position(&self) -> Point {
        self.last_position
    }

    pub fn initial_position(&self) -> Point {
        self.initial_position
    }

    pub fn is_moving(&self) -> bool {
        self.base.has_movement()
    }

    /// Tries to start moving with the hero. The hero must already be in its
    /// pushing or pulling state; a pull reverses the direction it faces.
    pub fn start_movement_by_hero(&mut self, hero: &Hero, now: Timestamp) -> bool {
        let pulling = hero.is_grabbing_or_pulling();
        let direction = if pulling {
            hero.animation_direction().opposite()
        } else {
            hero.animation_direction()
        };
        let allowed = if pulling {
            self.can_be_pulled
        } else {
            self.can_be_pushed
        };

        if self.base.has_movement()
            || self.maximum_moves == MaximumMoves::Never
            || now < self.when_can_move
            || !allowed
            || self.allowed_direction.is_some_and(|d| d != direction)
        {
            return false;
        }

        let offset = self.base.position() - hero.base().position();
        self.base
            .set_movement(Box::new(FollowMovement::new(hero.base().id(), offset, false)));
        self.sound_played = false;
        log::debug!(
            "block {} starts moving {:?} with the hero",
            self.entity_ref(),
            direction
        );
        true
    }

    /// Detaches the hero's movement. Without a movement this does nothing,
    /// so repeated calls within a tick apply the cooldown once.
    pub fn stop_movement_by_hero(&mut self, now: Timestamp) {
        if self.base.clear_movement().is_none() {
            return;
        }
        self.when_can_move = now + BLOCK_MOVING_DELAY_MS;

        let position = self.base.position();
        if position != self.last_position {
            self.last_position = position;
            if self.maximum_moves == MaximumMoves::Once {
                self.maximum_moves = MaximumMoves::Never;
            }
        }
        log::debug!(
            "block {} settles at ({}, {}), moves left: {:?}",
            self.entity_ref(),
            position.x,
            position.y,
            self.maximum_moves
        );
    }

    /// Puts the block back where it was created, with its initial number of
    /// moves. The position is not checked against obstacles.
    pub fn reset(&mut self, now: Timestamp) {
        if self.base.has_movement() {
            self.stop_movement_by_hero(now);
        }
        self.base.set_position(self.initial_position);
        self.last_position = self.initial_position;
        self.maximum_moves = self.initial_maximum_moves;
    }
}

impl MapEntity for Block {
    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EntityBase {
        &mut self.base
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Block
    }

    fn collision_modes(&self) -> &'static [CollisionMode] {
        &[CollisionMode::Facing]
    }

    fn is_ground_observer(&self) -> bool {
        true
    }

    fn as_block(&self) -> Option<&Block> {
        Some(self)
    }

    fn as_block_mut(&mut self) -> Option<&mut Block> {
        Some(self)
    }

    fn is_obstacle_for(&self, other: &dyn MapEntity) -> bool {
        other.is_block_obstacle(self)
    }

    /// The hero walks through a block while it moves with them.
    fn is_hero_obstacle(&self, _hero: &Hero) -> bool {
        !self.base.has_movement()
    }

    fn is_enemy_obstacle(&self, _enemy: &Enemy) -> bool {
        true
    }

    fn is_destructible_obstacle(&self, _destructible: &Destructible) -> bool {
        true
    }

    fn is_teletransporter_obstacle(&self, _teletransporter: &Teletransporter) -> bool {
        false
    }

    fn is_switch_obstacle(&self, switch: &Switch) -> bool {
        !switch.is_walkable()
    }

    /// Hazards are walkable so the block can be pushed into them and sink.
    fn is_ground_obstacle(&self, ground: Ground) -> bool {
        match ground {
            Ground::Hole | Ground::DeepWater | Ground::Lava => false,
            other => default_ground_obstacle(other),
        }
    }

    fn notify_collision(
        &mut self,
        other: &mut dyn MapEntity,
        _mode: CollisionMode,
        ctx: &mut EntityContext<'_>,
    ) {
        other.notify_collision_with_block(self, ctx);
    }

    fn notify_collision_with_switch(
        &mut self,
        switch: &mut Switch,
        mode: CollisionMode,
        ctx: &mut EntityContext<'_>,
    ) {
        if mode == CollisionMode::Containing {
            switch.try_activate_by(EntityKind::Block, ctx);
        }
    }

    fn notify_position_changed(&mut self, ctx: &mut EntityContext<'_>) {
        if self.base.has_movement() && !self.sound_played {
            ctx.audio.play(PUSH_SOUND);
            self.sound_played = true;
        }
        self.base.notify_scripts_position_changed(EntityKind::Block, ctx);
    }

    /// The hero has to stop pushing too.
    fn notify_obstacle_reached(&mut self, ctx: &mut EntityContext<'_>) {
        ctx.push_event(EntityEvent::GrabbedEntityCollision {
            entity: self.base.id(),
        });
        default_obstacle_reached(&mut self.base, ctx.now);
    }

    fn notify_moving_by(&mut self, _actor: &dyn MapEntity, ctx: &mut EntityContext<'_>) {
        ctx.scripts.block_moving(self.base.entity_ref(EntityKind::Block));
    }

    fn notify_moved_by(&mut self, _actor: &dyn MapEntity, ctx: &mut EntityContext<'_>) {
        ctx.scripts.block_moved(self.base.entity_ref(EntityKind::Block));
    }

    fn notify_ground_below_changed(&mut self, ctx: &mut EntityContext<'_>) {
        let sound = match self.base.ground_below() {
            Some(Ground::Hole) => FALL_SOUND,
            Some(Ground::Lava | Ground::DeepWater) => SPLASH_SOUND,
            _ => return,
        };
        log::debug!("block {} sinks into the ground", self.entity_ref());
        ctx.audio.play(sound);
        self.base.remove_from_map(ctx);
    }
}
