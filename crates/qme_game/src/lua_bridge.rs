//! Lua side of the script notifications.
//!
//! A map script defines any of these globals; missing ones are skipped:
//!
//!   on_entity_position_changed(entity, x, y, layer)
//!   on_block_moving(block)
//!   on_block_moved(block)
//!   on_switch_activated(switch)
//!   on_entity_removed(entity)
//!
//! `entity` is a table `{ id = 3, name = "statue" or nil, kind = "block" }`
//! and `layer` is 0, 1 or 2. Scripts never write back into the map: the
//! simulation only reports facts to them.
//!
//! Reload creates a fresh Lua state and runs the file again, so globals
//! kept by the previous version are lost.

use std::path::PathBuf;
use std::time::SystemTime;

use mlua::prelude::*;

use qme_core::{Layer, Point};

use crate::entity::EntityRef;
use crate::script::ScriptSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LuaStatus {
    Loaded,
    /// The script failed to load; notifications are dropped.
    Error,
    /// No script file; notifications are dropped.
    Missing,
}

impl LuaStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Loaded => "Lua: loaded",
            Self::Error => "Lua: ERROR",
            Self::Missing => "Lua: no script",
        }
    }
}

impl std::fmt::Display for LuaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

pub struct LuaScripts {
    lua: Lua,
    script_path: PathBuf,
    last_modified: Option<SystemTime>,
    status: LuaStatus,
    last_error: Option<String>,
}

impl LuaScripts {
    /// Loads `script_path` right away. A missing file is not an error.
    pub fn new(script_path: PathBuf) -> Self {
        let mut scripts = Self {
            lua: Lua::new(),
            script_path,
            last_modified: None,
            status: LuaStatus::Missing,
            last_error: None,
        };
        scripts.try_load_script();
        scripts
    }

    pub fn status(&self) -> LuaStatus {
        self.status
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Reloads the script if its file changed. Call between ticks only.
    pub fn check_reload(&mut self) {
        let current_mtime = match std::fs::metadata(&self.script_path) {
            Ok(meta) => meta.modified().ok(),
            Err(_) => return,
        };

        if current_mtime != self.last_modified {
            log::info!("Lua script changed, reloading: {}", self.script_path.display());
            self.try_load_script();
        }
    }

    pub fn force_reload(&mut self) {
        log::info!("Lua script force reload: {}", self.script_path.display());
        self.try_load_script();
    }

    fn try_load_script(&mut self) {
        if !self.script_path.exists() {
            log::warn!(
                "Lua script not found: {}. Script notifications are dropped.",
                self.script_path.display()
            );
            self.status = LuaStatus::Missing;
            self.last_error = None;
            self.last_modified = None;
            return;
        }

        self.last_modified = std::fs::metadata(&self.script_path)
            .ok()
            .and_then(|m| m.modified().ok());
        self.lua = Lua::new();

        if let Err(err) = self.setup_engine_api() {
            self.fail(format!("Failed to setup Lua engine API: {err}"));
            return;
        }

        let source = match std::fs::read_to_string(&self.script_path) {
            Ok(source) => source,
            Err(err) => {
                self.fail(format!("Failed to read Lua script: {err}"));
                return;
            }
        };
        match self
            .lua
            .load(&source)
            .set_name(self.script_path.to_string_lossy())
            .exec()
        {
            Ok(()) => {
                self.status = LuaStatus::Loaded;
                self.last_error = None;
                log::info!("Lua script loaded: {}", self.script_path.display());
            }
            Err(err) => self.fail(format!("Lua script load error: {err}")),
        }
    }

    fn fail(&mut self, msg: String) {
        log::error!("{}", msg);
        self.status = LuaStatus::Error;
        self.last_error = Some(msg);
    }

    /// `engine.log(msg)` writes to the engine log.
    fn setup_engine_api(&self) -> LuaResult<()> {
        let lua = &self.lua;
        let engine = lua.create_table()?;
        let log_fn = lua.create_function(|_, msg: String| {
            log::info!("[lua] {}", msg);
            Ok(())
        })?;
        engine.set("log", log_fn)?;
        lua.globals().set("engine", engine)?;
        Ok(())
    }

    fn call_hook<A, F>(&mut self, hook: &str, build_args: F)
    where
        A: IntoLuaMulti,
        F: FnOnce(&Lua) -> LuaResult<A>,
    {
        if self.status != LuaStatus::Loaded {
            return;
        }
        if let Err(err) = self.call_hook_inner(hook, build_args) {
            let msg = format!("Lua {hook} error: {err}");
            log::error!("{}", msg);
            self.last_error = Some(msg);
        }
    }

    fn call_hook_inner<A, F>(&self, hook: &str, build_args: F) -> LuaResult<()>
    where
        A: IntoLuaMulti,
        F: FnOnce(&Lua) -> LuaResult<A>,
    {
        let Some(function) = self.lua.globals().get::<Option<LuaFunction>>(hook)? else {
            return Ok(());
        };
        function.call::<()>(build_args(&self.lua)?)
    }
}

fn entity_table(lua: &Lua, entity: EntityRef<'_>) -> LuaResult<LuaTable> {
    let table = lua.create_table()?;
    table.set("id", entity.id.0)?;
    table.set("name", entity.name)?;
    table.set("kind", entity.kind.label())?;
    Ok(table)
}

impl ScriptSink for LuaScripts {
    fn entity_position_changed(&mut self, entity: EntityRef<'_>, position: Point, layer: Layer) {
        self.call_hook("on_entity_position_changed", |lua| {
            Ok((entity_table(lua, entity)?, position.x, position.y, layer.index()))
        });
    }

    fn block_moving(&mut self, block: EntityRef<'_>) {
        self.call_hook("on_block_moving", |lua| entity_table(lua, block));
    }

    fn block_moved(&mut self, block: EntityRef<'_>) {
        self.call_hook("on_block_moved", |lua| entity_table(lua, block));
    }

    fn switch_activated(&mut self, switch: EntityRef<'_>) {
        self.call_hook("on_switch_activated", |lua| entity_table(lua, switch));
    }

    fn entity_removed(&mut self, entity: EntityRef<'_>) {
        self.call_hook("on_entity_removed", |lua| entity_table(lua, entity));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{EntityId, EntityKind};
    use std::io::Write;

    const RECORDING_SCRIPT: &str = r#"
moved = 0
last_x = nil
last_kind = nil
removed_name = nil

function on_entity_position_changed(entity, x, y, layer)
    last_x = x
    last_kind = entity.kind
end

function on_block_moved(block)
    moved = moved + 1
    engine.log("block " .. block.id .. " moved")
end

function on_entity_removed(entity)
    removed_name = entity.name
end
"#;

    fn temp_lua_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "qme_test_lua_scripts_{}_{}.lua",
            name,
            std::process::id()
        ))
    }

    fn write_temp_script(path: &PathBuf, content: &str) {
        let mut f = std::fs::File::create(path).expect("failed to create temp script");
        f.write_all(content.as_bytes())
            .expect("failed to write temp script");
        f.flush().expect("failed to flush temp script");
    }

    fn block_ref(name: Option<&str>) -> EntityRef<'_> {
        EntityRef {
            id: EntityId(4),
            name,
            kind: EntityKind::Block,
        }
    }

    #[test]
    fn missing_script_drops_notifications() {
        let mut scripts = LuaScripts::new(PathBuf::from("__nonexistent_map_script_42__.lua"));
        assert_eq!(scripts.status(), LuaStatus::Missing);
        scripts.block_moved(block_ref(None));
        assert!(scripts.last_error().is_none());
    }

    #[test]
    fn invalid_script_reports_error() {
        let path = temp_lua_path("invalid");
        write_temp_script(&path, "this is not valid lua !@#$");

        let scripts = LuaScripts::new(path.clone());
        assert_eq!(scripts.status(), LuaStatus::Error);
        assert!(scripts
            .last_error()
            .is_some_and(|e| e.contains("load error")));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn hooks_receive_entity_tables() {
        let path = temp_lua_path("hooks");
        write_temp_script(&path, RECORDING_SCRIPT);

        let mut scripts = LuaScripts::new(path.clone());
        assert_eq!(
            scripts.status(),
            LuaStatus::Loaded,
            "Error: {:?}",
            scripts.last_error()
        );

        scripts.entity_position_changed(block_ref(None), Point::new(26, 20), Layer::Low);
        scripts.block_moved(block_ref(None));
        scripts.block_moved(block_ref(None));
        scripts.entity_removed(block_ref(Some("statue")));
        // No hook defined for these two.
        scripts.block_moving(block_ref(None));
        scripts.switch_activated(block_ref(None));

        let globals = scripts.lua.globals();
        assert_eq!(globals.get::<i64>("moved").expect("moved"), 2);
        assert_eq!(globals.get::<i64>("last_x").expect("last_x"), 26);
        assert_eq!(globals.get::<String>("last_kind").expect("last_kind"), "block");
        assert_eq!(
            globals.get::<String>("removed_name").expect("removed_name"),
            "statue"
        );
        assert!(scripts.last_error().is_none());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn runtime_error_is_kept_and_script_stays_loaded() {
        let path = temp_lua_path("runtime_error");
        write_temp_script(
            &path,
            r#"
function on_block_moving(block)
    error("no moving allowed")
end
"#,
        );

        let mut scripts = LuaScripts::new(path.clone());
        scripts.block_moving(block_ref(None));
        assert_eq!(scripts.status(), LuaStatus::Loaded);
        assert!(scripts
            .last_error()
            .is_some_and(|e| e.contains("on_block_moving")));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn force_reload_picks_up_new_file() {
        let path = temp_lua_path("reload");
        let _ = std::fs::remove_file(&path);
        let mut scripts = LuaScripts::new(path.clone());
        assert_eq!(scripts.status(), LuaStatus::Missing);

        write_temp_script(&path, RECORDING_SCRIPT);
        scripts.force_reload();
        assert_eq!(scripts.status(), LuaStatus::Loaded);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn status_display_matches_label() {
        for status in [LuaStatus::Loaded, LuaStatus::Error, LuaStatus::Missing] {
            assert_eq!(status.to_string(), status.label());
        }
    }
}
