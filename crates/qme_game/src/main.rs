//! Headless map runner.
//!
//! Loads a map, optionally a simulation config, a Lua map script and a
//! replay of hero input, then runs the fixed-step tick either as fast as
//! possible or paced in real time. Scripts are hot reloaded between ticks.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use qme_core::{SimClock, TickTimer};
use qme_game::audio::LogAudio;
use qme_game::config::{load_config_from_path, SimulationConfig};
use qme_game::entity::{HeroInput, MapEntity};
use qme_game::lua_bridge::LuaScripts;
use qme_game::map::Map;
use qme_game::map_file::load_map_from_path;
use qme_game::replay::load_replay_from_path;
use qme_game::script::{NullScripts, ScriptSink};

#[derive(Parser)]
#[command(name = "qme_game")]
#[command(about = "Run a map simulation without a window")]
struct Args {
    /// Map JSON file.
    map: PathBuf,

    /// Replay JSON file with the hero input, one frame per tick.
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Lua script receiving the map notifications.
    #[arg(long)]
    script: Option<PathBuf>,

    /// Simulation config JSON file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ticks to run when no replay is given.
    #[arg(long, default_value = "600")]
    ticks: u64,

    /// Pace ticks with the wall clock.
    #[arg(long)]
    realtime: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run(Args::parse()) {
        log::error!("{}", err);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), String> {
    let config = match &args.config {
        Some(path) => load_config_from_path(path)?,
        None => SimulationConfig::default(),
    };
    let file = load_map_from_path(&args.map)?;
    let mut clock = SimClock::new();
    let mut map = Map::from_file(&file, config, 0)?;

    let inputs = match &args.replay {
        Some(path) => load_replay_from_path(path)?.expanded_inputs(),
        None => vec![HeroInput::default(); args.ticks as usize],
    };

    let mut lua = args.script.clone().map(LuaScripts::new);
    if let Some(lua) = &lua {
        log::info!("{}", lua.status());
    }
    let mut null_scripts = NullScripts;
    let mut audio = LogAudio::new();
    let mut timer = TickTimer::new(config.tick_ms);

    let mut inputs = inputs.into_iter();
    'run: loop {
        let steps = if args.realtime {
            std::thread::sleep(Duration::from_millis(1));
            timer.begin_frame();
            let mut steps = 0;
            while timer.should_step() {
                steps += 1;
            }
            steps
        } else {
            1
        };

        for _ in 0..steps {
            let Some(input) = inputs.next() else {
                break 'run;
            };
            let scripts: &mut dyn ScriptSink = match lua.as_mut() {
                Some(lua) => {
                    lua.check_reload();
                    lua
                }
                None => &mut null_scripts,
            };
            map.tick(input, &clock, &mut audio, scripts);
            clock.advance(config.tick_ms);
        }
    }

    let hero = map
        .hero()
        .map(|hero| {
            let position = hero.base().position();
            format!("hero at ({}, {}) {:?}", position.x, position.y, hero.state())
        })
        .unwrap_or_else(|| "no hero".to_string());
    log::info!(
        "Map '{}' ran {} ticks: {} entities left, {}, {} sounds played",
        map.map_id(),
        map.tick_count(),
        map.entities().count(),
        hero,
        audio.played()
    );
    Ok(())
}
