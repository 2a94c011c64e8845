//! Scripted hero input for headless runs and regression tests.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use qme_core::Direction4;

use crate::entity::HeroInput;

#[derive(Debug, Deserialize, Clone)]
pub struct ReplaySequence {
    pub frames: Vec<ReplayFrame>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReplayFrame {
    #[serde(default)]
    pub direction: Option<Direction4>,
    #[serde(default)]
    pub action: bool,
    #[serde(default = "default_repeat")]
    pub repeat: u32,
}

impl ReplaySequence {
    /// One input per tick.
    pub fn expanded_inputs(&self) -> Vec<HeroInput> {
        let mut out = Vec::new();
        for frame in &self.frames {
            for _ in 0..frame.repeat.max(1) {
                out.push(HeroInput {
                    direction: frame.direction,
                    action: frame.action,
                });
            }
        }
        out
    }
}

pub fn load_replay_from_path(path: &Path) -> Result<ReplaySequence, String> {
    let raw =
        fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    let replay: ReplaySequence = serde_json::from_str(&raw)
        .map_err(|e| format!("Failed to parse replay JSON {}: {e}", path.display()))?;
    validate_replay(&replay)?;
    Ok(replay)
}

fn validate_replay(replay: &ReplaySequence) -> Result<(), String> {
    if replay.frames.is_empty() {
        return Err("Replay validation failed: frames list is empty".to_string());
    }
    Ok(())
}

const fn default_repeat() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use crate::map::Map;
    use crate::testing::{block_at, hero_at, open_grid, stream_at, TestRig};
    use qme_core::{Direction8, Point};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_file_path(name_hint: &str) -> std::path::PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "qme_replay_test_{}_{}_{}.json",
            name_hint,
            std::process::id(),
            nanos
        ))
    }

    fn sample_map() -> Map {
        let mut map = Map::new("replay", open_grid(), SimulationConfig::default());
        map.add_entity(Box::new(hero_at(-6, 20, Direction4::Right)));
        map.add_entity(Box::new(block_at(10, 20, 2)));
        map.add_entity(Box::new(stream_at(40, 80, Direction8::SouthEast)));
        map
    }

    fn positions(map: &Map) -> Vec<Point> {
        map.entities().map(|e| e.base().position()).collect()
    }

    #[test]
    fn replay_file_parses_and_expands() {
        let path = temp_file_path("parse");
        fs::write(
            &path,
            r#"{
              "frames": [
                { "direction": "right", "repeat": 3 },
                { "action": true }
              ]
            }"#,
        )
        .expect("write replay file");

        let replay = load_replay_from_path(&path).expect("replay should load");
        let expanded = replay.expanded_inputs();
        assert_eq!(expanded.len(), 4);
        assert_eq!(expanded[0], HeroInput::walk(Direction4::Right));
        assert!(expanded[3].action && expanded[3].direction.is_none());

        let _ = fs::remove_file(path);
    }

    #[test]
    fn empty_replay_is_rejected() {
        let path = temp_file_path("empty");
        fs::write(&path, r#"{ "frames": [] }"#).expect("write replay file");
        let err = load_replay_from_path(&path).expect_err("empty replay should fail");
        assert!(err.contains("frames list is empty"));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn replay_run_is_deterministic() {
        let replay: ReplaySequence = serde_json::from_str(
            r#"{
              "frames": [
                { "direction": "right", "repeat": 90 },
                { "repeat": 10 },
                { "direction": "down", "repeat": 40 },
                { "direction": "right", "repeat": 60 },
                { "direction": "up", "action": true, "repeat": 20 }
              ]
            }"#,
        )
        .expect("replay should parse");
        let inputs = replay.expanded_inputs();

        let mut map_a = sample_map();
        let mut map_b = sample_map();
        let mut rig_a = TestRig::new();
        let mut rig_b = TestRig::new();
        for input in &inputs {
            rig_a.tick(&mut map_a, *input);
        }
        for input in &inputs {
            rig_b.tick(&mut map_b, *input);
        }

        assert_eq!(positions(&map_a), positions(&map_b));
        assert_eq!(rig_a.audio.sounds, rig_b.audio.sounds);
        assert_eq!(rig_a.scripts.events, rig_b.scripts.events);
        assert_eq!(map_a.tick_count(), inputs.len() as u64);
    }
}
