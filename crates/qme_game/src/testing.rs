//! Recording sinks and small builders shared by the unit tests.

use qme_core::{Clock, Direction4, Direction8, Ground, Layer, Point, SimClock, Timestamp};

use crate::audio::AudioSink;
use crate::entity::{
    Block, BlockConfig, EntityId, EntityRef, Hero, HeroConfig, HeroInput, Stream, StreamConfig,
};
use crate::ground_grid::{GridOrigin, GroundGrid};
use crate::map::Map;
use crate::script::ScriptSink;

#[derive(Debug, Default)]
pub struct RecordingAudio {
    pub sounds: Vec<String>,
}

impl AudioSink for RecordingAudio {
    fn play(&mut self, sound_id: &str) {
        self.sounds.push(sound_id.to_string());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptEvent {
    PositionChanged {
        id: EntityId,
        position: Point,
        layer: Layer,
    },
    BlockMoving(EntityId),
    BlockMoved(EntityId),
    SwitchActivated(EntityId),
    Removed(EntityId),
}

#[derive(Debug, Default)]
pub struct RecordingScripts {
    pub events: Vec<ScriptEvent>,
}

impl RecordingScripts {
    pub fn count(&self, event: ScriptEvent) -> usize {
        self.events.iter().filter(|e| **e == event).count()
    }

    /// Every position reported for `id`, in order.
    pub fn positions_of(&self, id: EntityId) -> Vec<Point> {
        self.events
            .iter()
            .filter_map(|event| match event {
                ScriptEvent::PositionChanged {
                    id: moved,
                    position,
                    ..
                } if *moved == id => Some(*position),
                _ => None,
            })
            .collect()
    }
}

impl ScriptSink for RecordingScripts {
    fn entity_position_changed(&mut self, entity: EntityRef<'_>, position: Point, layer: Layer) {
        self.events.push(ScriptEvent::PositionChanged {
            id: entity.id,
            position,
            layer,
        });
    }

    fn block_moving(&mut self, block: EntityRef<'_>) {
        self.events.push(ScriptEvent::BlockMoving(block.id));
    }

    fn block_moved(&mut self, block: EntityRef<'_>) {
        self.events.push(ScriptEvent::BlockMoved(block.id));
    }

    fn switch_activated(&mut self, switch: EntityRef<'_>) {
        self.events.push(ScriptEvent::SwitchActivated(switch.id));
    }

    fn entity_removed(&mut self, entity: EntityRef<'_>) {
        self.events.push(ScriptEvent::Removed(entity.id));
    }
}

pub fn hero_at(x: i32, y: i32, direction: Direction4) -> Hero {
    Hero::new(
        &HeroConfig {
            name: Some("hero".to_string()),
            layer: Layer::Low,
            x,
            y,
            direction,
        },
        1000,
    )
}

pub fn block_at(x: i32, y: i32, maximum_moves: i32) -> Block {
    let config = BlockConfig {
        maximum_moves,
        ..BlockConfig::at(x, y)
    };
    Block::new(&config, None, 0).expect("test block should be valid")
}

pub fn stream_at(x: i32, y: i32, direction: Direction8) -> Stream {
    Stream::new(&StreamConfig {
        name: None,
        layer: Layer::Low,
        x,
        y,
        direction,
        speed: 64,
        allow_movement: true,
        allow_attack: true,
        allow_item: true,
        sprite: None,
    })
}

/// Traversable 8 px grid spanning -128..384 on both axes.
pub fn open_grid() -> GroundGrid {
    GroundGrid::filled(
        8,
        GridOrigin { x: -128, y: -128 },
        64,
        64,
        Ground::Traversable,
    )
}

/// Drives a map with a deterministic clock and recording sinks.
pub struct TestRig {
    pub clock: SimClock,
    pub audio: RecordingAudio,
    pub scripts: RecordingScripts,
    pub tick_ms: u64,
}

impl TestRig {
    pub fn new() -> Self {
        Self {
            clock: SimClock::new(),
            audio: RecordingAudio::default(),
            scripts: RecordingScripts::default(),
            tick_ms: 16,
        }
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn tick(&mut self, map: &mut Map, input: HeroInput) {
        map.tick(input, &self.clock, &mut self.audio, &mut self.scripts);
        self.clock.advance(self.tick_ms);
    }

    pub fn run(&mut self, map: &mut Map, input: HeroInput, ticks: usize) {
        for _ in 0..ticks {
            self.tick(map, input);
        }
    }
}
