use serde::Deserialize;

use qme_core::{Layer, Point};

use super::{EntityBase, EntityKind, Hero, MapEntity};
use crate::movement::MovementDef;

const ENEMY_SIZE: Point = Point::new(16, 16);
const ENEMY_ORIGIN: Point = Point::new(8, 13);

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EnemyConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub layer: Layer,
    pub x: i32,
    pub y: i32,
    pub breed: String,
    #[serde(default)]
    pub movement: Option<MovementDef>,
}

/// A roaming enemy. Fighting is handled elsewhere; here it only moves and
/// gets in the way.
#[derive(Debug)]
pub struct Enemy {
    base: EntityBase,
    breed: String,
}

impl Enemy {
    /// `seed` feeds the random movement, if the enemy has one.
    pub fn new(config: &EnemyConfig, seed: u64) -> Result<Self, String> {
        let mut base = EntityBase::new(
            config.name.clone(),
            config.layer,
            Point::new(config.x, config.y),
            ENEMY_SIZE,
            ENEMY_ORIGIN,
        );
        base.set_drawn_in_y_order(true);
        if let Some(def) = &config.movement {
            base.set_movement(def.build(seed)?);
        }
        Ok(Self {
            base,
            breed: config.breed.clone(),
        })
    }

    pub fn breed(&self) -> &str {
        &self.breed
    }
}

impl MapEntity for Enemy {
    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EntityBase {
        &mut self.base
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Enemy
    }

    fn is_obstacle_for(&self, other: &dyn MapEntity) -> bool {
        other.is_enemy_obstacle(self)
    }

    /// Enemies and the hero overlap when they touch; that is how they hurt.
    fn is_hero_obstacle(&self, _hero: &Hero) -> bool {
        false
    }
}
