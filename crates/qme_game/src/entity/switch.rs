use serde::Deserialize;

use qme_core::{Layer, Point};

use super::{CollisionMode, EntityBase, EntityContext, EntityKind, MapEntity};

const SWITCH_SIZE: Point = Point::new(16, 16);
const SWITCH_ORIGIN: Point = Point::new(8, 13);

const ACTIVATION_SOUND: &str = "switch";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchSubtype {
    /// Pressed by walking on it, or by a block pushed onto it.
    #[default]
    Walkable,
    /// Has to be hit; stops whoever walks into it.
    Solid,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SwitchConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub layer: Layer,
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub subtype: SwitchSubtype,
    /// Only a block sitting entirely on the switch presses it.
    #[serde(default)]
    pub needs_block: bool,
}

#[derive(Debug)]
pub struct Switch {
    base: EntityBase,
    subtype: SwitchSubtype,
    needs_block: bool,
    activated: bool,
    locked: bool,
}

impl Switch {
    pub fn new(config: &SwitchConfig) -> Self {
        Self {
            base: EntityBase::new(
                config.name.clone(),
                config.layer,
                Point::new(config.x, config.y),
                SWITCH_SIZE,
                SWITCH_ORIGIN,
            ),
            subtype: config.subtype,
            needs_block: config.needs_block,
            activated: false,
            locked: false,
        }
    }

    pub fn subtype(&self) -> SwitchSubtype {
        self.subtype
    }

    pub fn is_walkable(&self) -> bool {
        self.subtype == SwitchSubtype::Walkable
    }

    pub fn is_activated(&self) -> bool {
        self.activated
    }

    pub fn set_activated(&mut self, activated: bool) {
        self.activated = activated;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// A locked switch keeps its current state.
    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    /// Presses the switch if `activator` is allowed to. Returns whether
    /// this call activated it.
    pub fn try_activate_by(&mut self, activator: EntityKind, ctx: &mut EntityContext<'_>) -> bool {
        if self.activated || self.locked || !self.is_walkable() {
            return false;
        }
        if self.needs_block && activator != EntityKind::Block {
            return false;
        }
        self.activated = true;
        log::info!(
            "switch {} activated by {}",
            self.entity_ref(),
            activator.label()
        );
        ctx.audio.play(ACTIVATION_SOUND);
        ctx.scripts
            .switch_activated(self.base.entity_ref(EntityKind::Switch));
        true
    }
}

impl MapEntity for Switch {
    fn base(&self) -> &EntityBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EntityBase {
        &mut self.base
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Switch
    }

    fn collision_modes(&self) -> &'static [CollisionMode] {
        &[CollisionMode::Containing, CollisionMode::Origin]
    }

    fn is_obstacle_for(&self, other: &dyn MapEntity) -> bool {
        other.is_switch_obstacle(self)
    }

    fn notify_collision(
        &mut self,
        other: &mut dyn MapEntity,
        mode: CollisionMode,
        ctx: &mut EntityContext<'_>,
    ) {
        other.notify_collision_with_switch(self, mode, ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingAudio, RecordingScripts, ScriptEvent};

    fn switch(needs_block: bool) -> Switch {
        Switch::new(&SwitchConfig {
            name: Some("gate_switch".to_string()),
            layer: Layer::Low,
            x: 40,
            y: 40,
            subtype: SwitchSubtype::Walkable,
            needs_block,
        })
    }

    #[test]
    fn activates_once_and_tells_scripts() {
        let mut audio = RecordingAudio::default();
        let mut scripts = RecordingScripts::default();
        let mut sw = switch(false);
        {
            let mut ctx = EntityContext::new(0, 1, &mut audio, &mut scripts);
            assert!(sw.try_activate_by(EntityKind::Hero, &mut ctx));
            assert!(!sw.try_activate_by(EntityKind::Hero, &mut ctx));
        }
        assert!(sw.is_activated());
        assert_eq!(audio.sounds, vec![ACTIVATION_SOUND.to_string()]);
        assert_eq!(
            scripts.events,
            vec![ScriptEvent::SwitchActivated(sw.base().id())]
        );
    }

    #[test]
    fn block_only_switch_ignores_hero() {
        let mut audio = RecordingAudio::default();
        let mut scripts = RecordingScripts::default();
        let mut ctx = EntityContext::new(0, 1, &mut audio, &mut scripts);
        let mut sw = switch(true);
        assert!(!sw.try_activate_by(EntityKind::Hero, &mut ctx));
        assert!(sw.try_activate_by(EntityKind::Block, &mut ctx));
    }

    #[test]
    fn locked_switch_stays_put() {
        let mut audio = RecordingAudio::default();
        let mut scripts = RecordingScripts::default();
        let mut ctx = EntityContext::new(0, 1, &mut audio, &mut scripts);
        let mut sw = switch(false);
        sw.set_locked(true);
        assert!(!sw.try_activate_by(EntityKind::Hero, &mut ctx));
        assert!(!sw.is_activated());
    }
}
