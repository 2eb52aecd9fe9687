//! Reads/writes `~/.wayguard/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use wayguard_runtime::EngineConfig;

/// Persisted configuration.  The `[engine]` table mirrors
/// [`EngineConfig`]; any key left out keeps its default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Return the path to `~/.wayguard/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".wayguard").join("config.toml")
}

/// Load the config from disk and apply env overrides.  `None` when the
/// file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    let Some(mut cfg) = load_from(&config_path())? else {
        return Ok(None);
    };
    apply_env_overrides(&mut cfg);
    cfg.engine.validate().map_err(|e| e.to_string())?;
    Ok(Some(cfg))
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    cfg.engine
        .validate()
        .map_err(|e| format!("Config at {} is invalid: {}", path.display(), e))?;
    Ok(Some(cfg))
}

/// The on-disk config, or defaults (with env overrides) when absent.
pub fn load_or_default() -> Result<Config, String> {
    match load()? {
        Some(cfg) => Ok(cfg),
        None => {
            let mut cfg = Config::default();
            apply_env_overrides(&mut cfg);
            cfg.engine.validate().map_err(|e| e.to_string())?;
            Ok(cfg)
        }
    }
}

/// Apply `WAYGUARD_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `WAYGUARD_CONE_DEG` | `engine.filter.cone_width_deg` |
/// | `WAYGUARD_MAX_HAZARDS` | `engine.scoring.max_hazards` |
/// | `WAYGUARD_EVICT_S` | `engine.lifecycle.eviction_timeout_s` |
/// | `WAYGUARD_DETECT_INTERVAL_S` | `engine.detect_interval_s` |
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("WAYGUARD_CONE_DEG")
        && let Ok(deg) = v.parse::<f32>()
    {
        cfg.engine.filter.cone_width_deg = deg;
    }
    if let Ok(v) = std::env::var("WAYGUARD_MAX_HAZARDS")
        && let Ok(k) = v.parse::<usize>()
    {
        cfg.engine.scoring.max_hazards = k;
    }
    if let Ok(v) = std::env::var("WAYGUARD_EVICT_S")
        && let Ok(s) = v.parse::<f64>()
    {
        cfg.engine.lifecycle.eviction_timeout_s = s;
    }
    if let Ok(v) = std::env::var("WAYGUARD_DETECT_INTERVAL_S")
        && let Ok(s) = v.parse::<f64>()
    {
        cfg.engine.detect_interval_s = s;
    }
}

/// Save the config to disk, creating `~/.wayguard/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");
        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.engine.scoring.max_hazards, 3);
        assert_eq!(loaded.engine.filter.cone_width_deg, 60.0);
        assert_eq!(loaded.engine.lifecycle.eviction_timeout_s, 1.2);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "[engine.filter]\ncone_width_deg = 90.0\n").expect("write");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.engine.filter.cone_width_deg, 90.0);
        assert_eq!(loaded.engine.filter.crowd_threshold, 5);
        assert_eq!(loaded.engine.detect_interval_s, 0.25);
    }

    #[test]
    fn invalid_file_is_reported() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "[engine.scoring]\nmax_hazards = 9\n").expect("write");
        let err = load_from(&path).unwrap_err();
        assert!(err.contains("max_hazards"));
    }

    #[test]
    fn config_path_points_to_wayguard_dir() {
        let p = config_path_for_home("/home/walker");
        assert!(p.to_string_lossy().contains(".wayguard"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    // All env-var cases live in one test so they cannot race each other.
    #[test]
    fn apply_env_overrides_reads_wayguard_vars() {
        // SAFETY: the only test in this crate that touches WAYGUARD_* vars.
        unsafe {
            std::env::set_var("WAYGUARD_CONE_DEG", "45");
            std::env::set_var("WAYGUARD_MAX_HAZARDS", "2");
            std::env::set_var("WAYGUARD_EVICT_S", "not-a-number");
            std::env::set_var("WAYGUARD_DETECT_INTERVAL_S", "0.5");
        }
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.engine.filter.cone_width_deg, 45.0);
        assert_eq!(cfg.engine.scoring.max_hazards, 2);
        assert_eq!(cfg.engine.lifecycle.eviction_timeout_s, 1.2);
        assert_eq!(cfg.engine.detect_interval_s, 0.5);
        unsafe {
            std::env::remove_var("WAYGUARD_CONE_DEG");
            std::env::remove_var("WAYGUARD_MAX_HAZARDS");
            std::env::remove_var("WAYGUARD_EVICT_S");
            std::env::remove_var("WAYGUARD_DETECT_INTERVAL_S");
        }
    }
}
