//! Notification sink towards the scripting layer.
//!
//! The simulation pushes facts out and never waits for an answer, so a map
//! runs the same with or without scripts attached.

use qme_core::{Layer, Point};

use crate::entity::EntityRef;

pub trait ScriptSink {
    fn entity_position_changed(&mut self, entity: EntityRef<'_>, position: Point, layer: Layer);
    fn block_moving(&mut self, block: EntityRef<'_>);
    fn block_moved(&mut self, block: EntityRef<'_>);
    fn switch_activated(&mut self, _switch: EntityRef<'_>) {}
    fn entity_removed(&mut self, _entity: EntityRef<'_>) {}
}

/// Sink that drops every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullScripts;

impl ScriptSink for NullScripts {
    fn entity_position_changed(&mut self, _entity: EntityRef<'_>, _position: Point, _layer: Layer) {
    }

    fn block_moving(&mut self, _block: EntityRef<'_>) {}

    fn block_moved(&mut self, _block: EntityRef<'_>) {}
}
