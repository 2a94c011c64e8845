use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use qme_core::Point;

use crate::entity::{
    BlockConfig, DestructibleConfig, EnemyConfig, HeroConfig, MaximumMoves, StreamConfig,
    SwitchConfig, TeletransporterConfig,
};
use crate::ground_grid::{validate_ground_file, GroundFile};

#[derive(Debug, Deserialize, Clone)]
pub struct MapFile {
    pub version: String,
    pub map_id: String,
    pub ground: GroundFile,
    /// Frame sizes of the sprites entities refer to.
    #[serde(default)]
    pub sprites: HashMap<String, SpriteSize>,
    pub entities: Vec<EntityDef>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct SpriteSize {
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntityDef {
    Hero(HeroConfig),
    Block(BlockConfig),
    Stream(StreamConfig),
    Switch(SwitchConfig),
    Teletransporter(TeletransporterConfig),
    Enemy(EnemyConfig),
    Destructible(DestructibleConfig),
}

impl EntityDef {
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Hero(c) => c.name.as_deref(),
            Self::Block(c) => c.name.as_deref(),
            Self::Stream(c) => c.name.as_deref(),
            Self::Switch(c) => c.name.as_deref(),
            Self::Teletransporter(c) => c.name.as_deref(),
            Self::Enemy(c) => c.name.as_deref(),
            Self::Destructible(c) => c.name.as_deref(),
        }
    }

    fn sprite(&self) -> Option<&str> {
        match self {
            Self::Block(c) => c.sprite.as_deref(),
            Self::Stream(c) => c.sprite.as_deref(),
            Self::Destructible(c) => c.sprite.as_deref(),
            _ => None,
        }
    }
}

/// Read-only lookup of sprite geometry.
pub trait SpriteQuery {
    fn sprite_size(&self, sprite: &str) -> Option<Point>;
}

impl SpriteQuery for MapFile {
    fn sprite_size(&self, sprite: &str) -> Option<Point> {
        self.sprites
            .get(sprite)
            .map(|size| Point::new(size.width, size.height))
    }
}

pub fn load_map_from_path(map_path: &Path) -> Result<MapFile, String> {
    let raw = fs::read_to_string(map_path)
        .map_err(|e| format!("Failed to read map file {}: {e}", map_path.display()))?;
    parse_map(&raw).map_err(|e| format!("{e} ({})", map_path.display()))
}

pub fn parse_map(raw: &str) -> Result<MapFile, String> {
    let map: MapFile =
        serde_json::from_str(raw).map_err(|e| format!("Failed to parse map JSON: {e}"))?;
    validate_map(&map)?;
    Ok(map)
}

fn validate_map(map: &MapFile) -> Result<(), String> {
    validate_ground_file(&map.ground)?;

    let heroes = map
        .entities
        .iter()
        .filter(|def| matches!(def, EntityDef::Hero(_)))
        .count();
    if heroes > 1 {
        return Err(format!(
            "Map validation failed: {heroes} heroes declared, at most one is allowed"
        ));
    }
    if heroes == 0 {
        log::warn!("Map '{}' has no hero. Nothing will react to input.", map.map_id);
    }

    let mut names = HashSet::new();
    for def in &map.entities {
        if let Some(name) = def.name() {
            if !names.insert(name) {
                return Err(format!(
                    "Map validation failed: duplicate entity name '{name}'"
                ));
            }
        }
        if let EntityDef::Block(block) = def {
            MaximumMoves::try_from(block.maximum_moves).map_err(|e| {
                format!(
                    "Map validation failed: block '{}': {e}",
                    block.name.as_deref().unwrap_or("<unnamed>")
                )
            })?;
        }
        if let Some(sprite) = def.sprite() {
            if !map.sprites.contains_key(sprite) {
                log::warn!(
                    "Map '{}' refers to sprite '{}' without a size; it is drawn flat.",
                    map.map_id,
                    sprite
                );
            }
        }
    }
    Ok(())
}
