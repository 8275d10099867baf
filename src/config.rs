/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory (or CWD).
/// Falls back to sensible defaults if the file is missing or incomplete.

use serde::Deserialize;
use std::path::PathBuf;

use crate::session::engine::SessionParams;

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub tick_rate_ms: u64,
    /// Base-space pixels the player covers per tick.
    pub player_speed: i32,
    pub door_cooldown_ms: u64,
    /// How long transient feedback stays on screen.
    pub feedback_ms: u64,
    /// Uniform scale applied to the 1920x1080 base geometry.
    pub scale: f32,
    pub data_dir: PathBuf,
    pub student_id: String,
}

impl GameConfig {
    /// The engine's tuning knobs, with durations converted to ticks.
    pub fn session_params(&self) -> SessionParams {
        let tick = self.tick_rate_ms.max(1);
        SessionParams {
            scale: self.scale,
            ticks_per_second: (1000 / tick).max(1) as u32,
            player_speed: self.player_speed,
            door_cooldown_ticks: (self.door_cooldown_ms / tick) as u32,
            feedback_ticks: (self.feedback_ms / tick) as u32,
        }
    }
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    game: TomlGame,
    #[serde(default)]
    general: TomlGeneral,
}

#[derive(Deserialize, Debug)]
struct TomlGame {
    #[serde(default = "default_tick_rate")]
    tick_rate_ms: u64,
    #[serde(default = "default_player_speed")]
    player_speed: i32,
    #[serde(default = "default_door_cooldown")]
    door_cooldown_ms: u64,
    #[serde(default = "default_feedback")]
    feedback_ms: u64,
    #[serde(default = "default_scale")]
    scale: f32,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_data_dir")]
    data_dir: String,
    #[serde(default = "default_student_id")]
    student_id: String,
}

// ── Defaults ──

fn default_tick_rate() -> u64 { 16 }        // ~60 Hz
fn default_player_speed() -> i32 { 6 }
fn default_door_cooldown() -> u64 { 500 }
fn default_feedback() -> u64 { 2000 }
fn default_scale() -> f32 { 0.75 }
fn default_data_dir() -> String { "data".into() }
fn default_student_id() -> String { "guest".into() }

impl Default for TomlGame {
    fn default() -> Self {
        TomlGame {
            tick_rate_ms: default_tick_rate(),
            player_speed: default_player_speed(),
            door_cooldown_ms: default_door_cooldown(),
            feedback_ms: default_feedback(),
            scale: default_scale(),
        }
    }
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral {
            data_dir: default_data_dir(),
            student_id: default_student_id(),
        }
    }
}

// ── Loading ──

impl GameConfig {
    /// Load config from `config.toml`.
    /// Search order: (1) exe directory, (2) current working directory.
    /// Missing file or missing keys gracefully fall back to defaults.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        let toml_cfg = load_toml(&search_dirs);

        // Resolve the data directory against the same search path.
        let data_dir_str = &toml_cfg.general.data_dir;
        let data_dir = if PathBuf::from(data_dir_str).is_absolute() {
            PathBuf::from(data_dir_str)
        } else {
            search_dirs
                .iter()
                .map(|d| d.join(data_dir_str))
                .find(|p| p.is_dir())
                .unwrap_or_else(|| PathBuf::from(data_dir_str))
        };

        GameConfig {
            tick_rate_ms: toml_cfg.game.tick_rate_ms,
            player_speed: toml_cfg.game.player_speed,
            door_cooldown_ms: toml_cfg.game.door_cooldown_ms,
            feedback_ms: toml_cfg.game.feedback_ms,
            scale: toml_cfg.game.scale,
            data_dir,
            student_id: toml_cfg.general.student_id,
        }
    }
}

/// Candidate directories to search: exe dir + CWD (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Search for config.toml in candidate directories.
fn load_toml(search_dirs: &[PathBuf]) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(text) => match toml::from_str::<TomlConfig>(&text) {
                    Ok(cfg) => return cfg,
                    Err(e) => {
                        log::warn!("config.toml parse error, using defaults: {e}");
                        return TomlConfig::default();
                    }
                },
                Err(e) => {
                    log::warn!("could not read {}: {e}", path.display());
                }
            }
        }
    }
    TomlConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_round_to_sensible_ticks() {
        let cfg = GameConfig {
            tick_rate_ms: 16,
            player_speed: 6,
            door_cooldown_ms: 500,
            feedback_ms: 2000,
            scale: 0.75,
            data_dir: PathBuf::from("data"),
            student_id: "guest".into(),
        };
        let p = cfg.session_params();
        assert_eq!(p.ticks_per_second, 62); // 1000 / 16
        assert_eq!(p.door_cooldown_ticks, 31);
        assert_eq!(p.feedback_ticks, 125);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let cfg: TomlConfig = toml::from_str("[game]\ntick_rate_ms = 20\n").unwrap();
        assert_eq!(cfg.game.tick_rate_ms, 20);
        assert_eq!(cfg.game.player_speed, 6);
        assert_eq!(cfg.general.data_dir, "data");
    }
}
