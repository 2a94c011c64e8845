use serde::Deserialize;

use qme_core::{Layer, Point};

use super::{EntityBase, EntityKind, MapEntity};

const DESTRUCTIBLE_SIZE: Point = Point::new(16, 16);
const DESTRUCTIBLE_ORIGIN: Point = Point::new(8, 13);

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DestructibleConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub layer: Layer,
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub sprite: Option<String>,
}

/// Pot, bush or stone: an obstacle for everyone until it is lifted or cut.
#[derive(Debug)]
pub struct Destructible {
    base: EntityBase,
    sprite: Option<String>,
}

impl Destructible {
    pub fn new(config: &DestructibleConfig) -> Self {
        Self {
            base: EntityBase::new(
                config.name.clone(),
                config.layer,
                Point::new(config.x, config.y),
                DESTRUCTIBLE_SIZE,
                DESTRUCTIBLE_ORIGIN,
            ),
            sprite: config.sprite.clone(),
        }
    }

    pub fn sprite(&self) -> Option<&str> {
        self.sprite.as_deref()
    }
}

impl MapEntity for Destructible {
    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EntityBase {
        &mut self.base
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Destructible
    }

    fn is_obstacle_for(&self, other: &dyn MapEntity) -> bool {
        other.is_destructible_obstacle(self)
    }
}
