use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Tunables of the map simulation. Every field falls back to its default
/// when missing from the JSON file.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub tick_ms: u64,
    /// Hero walking speed in pixels per second.
    pub walking_speed: u32,
    /// Hero speed while pushing or pulling a block.
    pub push_speed: u32,
    /// Distance covered by one push or pull.
    pub push_distance: u32,
    /// How long the hero must walk against a block before pushing it.
    pub push_delay_ms: u64,
    /// Time spent falling, drowning or burning before the hero is put back.
    pub hazard_recovery_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_ms: 16,
            walking_speed: 88,
            push_speed: 40,
            push_distance: 16,
            push_delay_ms: 800,
            hazard_recovery_ms: 1000,
        }
    }
}

pub fn load_config_from_path(path: &Path) -> Result<SimulationConfig, String> {
    let raw =
        fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    let config: SimulationConfig = serde_json::from_str(&raw)
        .map_err(|e| format!("Failed to parse config JSON {}: {e}", path.display()))?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &SimulationConfig) -> Result<(), String> {
    if config.tick_ms == 0 {
        return Err("Config validation failed: tick_ms must be > 0".to_string());
    }
    if config.walking_speed == 0 || config.push_speed == 0 {
        return Err("Config validation failed: speeds must be > 0".to_string());
    }
    if config.push_distance == 0 {
        return Err("Config validation failed: push_distance must be > 0".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_file_path(name_hint: &str) -> std::path::PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "qme_config_test_{}_{}_{}.json",
            name_hint,
            std::process::id(),
            nanos
        ))
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let path = temp_file_path("partial");
        fs::write(&path, r#"{ "push_speed": 32 }"#).expect("write temp file");

        let config = load_config_from_path(&path).expect("partial config should load");
        assert_eq!(config.push_speed, 32);
        assert_eq!(config.walking_speed, SimulationConfig::default().walking_speed);
        assert_eq!(config.tick_ms, 16);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn zero_tick_is_rejected() {
        let path = temp_file_path("zero_tick");
        fs::write(&path, r#"{ "tick_ms": 0 }"#).expect("write temp file");

        let err = load_config_from_path(&path).expect_err("zero tick should fail");
        assert!(err.contains("tick_ms must be > 0"));
        let _ = fs::remove_file(path);
    }
}
