use serde::Deserialize;

use qme_core::{Layer, Point};

use super::{CollisionMode, EntityBase, EntityContext, EntityEvent, EntityKind, MapEntity};

fn default_side() -> i32 {
    16
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TeletransporterConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub layer: Layer,
    /// Top-left corner.
    pub x: i32,
    pub y: i32,
    #[serde(default = "default_side")]
    pub width: i32,
    #[serde(default = "default_side")]
    pub height: i32,
    pub destination_x: i32,
    pub destination_y: i32,
    /// Same layer as the teletransporter when absent.
    #[serde(default)]
    pub destination_layer: Option<Layer>,
}

/// Sends the hero to another place of the map when its origin enters.
#[derive(Debug)]
pub struct Teletransporter {
    base: EntityBase,
    destination: Point,
    destination_layer: Layer,
}

impl Teletransporter {
    pub fn new(config: &TeletransporterConfig) -> Self {
        Self {
            base: EntityBase::new(
                config.name.clone(),
                config.layer,
                Point::new(config.x, config.y),
                Point::new(config.width, config.height),
                Point::ZERO,
            ),
            destination: Point::new(config.destination_x, config.destination_y),
            destination_layer: config.destination_layer.unwrap_or(config.layer),
        }
    }

    pub fn destination(&self) -> Point {
        self.destination
    }

    pub fn destination_layer(&self) -> Layer {
        self.destination_layer
    }

    pub fn transport(&self, entity: &dyn MapEntity, ctx: &mut EntityContext<'_>) {
        log::info!(
            "{} teleports {} to ({}, {})",
            self.entity_ref(),
            entity.entity_ref(),
            self.destination.x,
            self.destination.y
        );
        ctx.push_event(EntityEvent::Teleport {
            entity: entity.base().id(),
            destination: self.destination,
            layer: self.destination_layer,
        });
    }
}

impl MapEntity for Teletransporter {
    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EntityBase {
        &mut self.base
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Teletransporter
    }

    fn collision_modes(&self) -> &'static [CollisionMode] {
        &[CollisionMode::Origin]
    }

    fn is_obstacle_for(&self, other: &dyn MapEntity) -> bool {
        other.is_teletransporter_obstacle(self)
    }

    fn notify_collision(
        &mut self,
        other: &mut dyn MapEntity,
        _mode: CollisionMode,
        ctx: &mut EntityContext<'_>,
    ) {
        other.notify_collision_with_teletransporter(self, ctx);
    }
}
